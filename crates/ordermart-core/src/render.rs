//! Text rendering of column values.
//!
//! Output files and stringified columns must stay byte-compatible with the existing
//! dataframe-based exports, so floats use the shortest round-trip form with a trailing
//! `.0` for whole numbers, integer columns containing nulls render as floats, and
//! datetime columns drop the time part when every value sits on midnight.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Timelike};
use polars::prelude::*;

/// Shortest round-trip representation, switching to exponent form outside
/// `1e-4 <= |v| < 1e16`.
pub fn shortest_float_repr(value: f64) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    if value == 0.0 {
        return if value.is_sign_negative() { "-0.0" } else { "0.0" }.to_string();
    }

    let formatted = format!("{value:e}");
    let (mantissa, exponent) = match formatted.split_once('e') {
        Some(parts) => parts,
        None => return formatted,
    };
    let exponent: i32 = exponent.parse().unwrap_or(0);
    let negative = mantissa.starts_with('-');
    let digits: String = mantissa.chars().filter(char::is_ascii_digit).collect();
    let sign = if negative { "-" } else { "" };

    if !(-4..16).contains(&exponent) {
        let (head, tail) = digits.split_at(1);
        let mantissa = if tail.is_empty() {
            head.to_string()
        } else {
            format!("{head}.{tail}")
        };
        let exp_sign = if exponent < 0 { '-' } else { '+' };
        return format!("{sign}{mantissa}e{exp_sign}{:02}", exponent.abs());
    }

    if exponent < 0 {
        let zeros = "0".repeat((-exponent - 1) as usize);
        return format!("{sign}0.{zeros}{digits}");
    }

    let int_len = exponent as usize + 1;
    if digits.len() <= int_len {
        let zeros = "0".repeat(int_len - digits.len());
        format!("{sign}{digits}{zeros}.0")
    } else {
        let (int_part, frac_part) = digits.split_at(int_len);
        format!("{sign}{int_part}.{frac_part}")
    }
}

/// Converts a temporal series into naive date-times. Non-temporal input is an error.
pub fn datetime_values(series: &Series) -> PolarsResult<Vec<Option<NaiveDateTime>>> {
    match series.dtype() {
        DataType::Datetime(unit, _) => {
            let unit = *unit;
            let physical = series.cast(&DataType::Int64)?;
            Ok(physical
                .i64()?
                .into_iter()
                .map(|value| value.and_then(|raw| from_physical(raw, unit)))
                .collect())
        }
        DataType::Date => {
            let physical = series.cast(&DataType::Int32)?;
            Ok(physical
                .i32()?
                .into_iter()
                .map(|value| {
                    value
                        .and_then(|days| NaiveDate::from_num_days_from_ce_opt(days + 719_163))
                        .and_then(|date| date.and_hms_opt(0, 0, 0))
                })
                .collect())
        }
        other => Err(PolarsError::InvalidOperation(
            format!("expected a temporal column, found {other}").into(),
        )),
    }
}

fn from_physical(raw: i64, unit: TimeUnit) -> Option<NaiveDateTime> {
    let dt = match unit {
        TimeUnit::Milliseconds => DateTime::from_timestamp_millis(raw)?,
        TimeUnit::Microseconds => DateTime::from_timestamp_micros(raw)?,
        TimeUnit::Nanoseconds => DateTime::from_timestamp_nanos(raw),
    };
    Some(dt.naive_utc())
}

/// Formats datetimes as one column: date only when every value is midnight, otherwise
/// with the time (and microseconds when any value carries them).
pub fn format_datetimes(values: &[Option<NaiveDateTime>]) -> Vec<Option<String>> {
    let present = values.iter().flatten();
    let dates_only = present
        .clone()
        .all(|dt| dt.num_seconds_from_midnight() == 0 && dt.nanosecond() == 0);
    let with_fraction = present.clone().any(|dt| dt.nanosecond() != 0);
    let pattern = if dates_only {
        "%Y-%m-%d"
    } else if with_fraction {
        "%Y-%m-%d %H:%M:%S%.6f"
    } else {
        "%Y-%m-%d %H:%M:%S"
    };
    values
        .iter()
        .map(|value| value.map(|dt| dt.format(pattern).to_string()))
        .collect()
}

/// Renders every value of a series to text; nulls stay `None`.
pub fn render_values(series: &Series) -> PolarsResult<Vec<Option<String>>> {
    let dtype = series.dtype().clone();
    let rendered = match dtype {
        DataType::String => series
            .str()?
            .into_iter()
            .map(|value| value.map(str::to_string))
            .collect(),
        DataType::Boolean => series
            .bool()?
            .into_iter()
            .map(|value| value.map(|flag| if flag { "True" } else { "False" }.to_string()))
            .collect(),
        DataType::Float32 | DataType::Float64 => series
            .cast(&DataType::Float64)?
            .f64()?
            .into_iter()
            .map(|value| value.filter(|v| !v.is_nan()).map(shortest_float_repr))
            .collect(),
        DataType::Datetime(_, _) | DataType::Date => format_datetimes(&datetime_values(series)?),
        ref int if int.is_integer() => {
            let as_float = series.null_count() > 0;
            series
                .cast(&DataType::Int64)?
                .i64()?
                .into_iter()
                .map(|value| {
                    value.map(|v| {
                        if as_float {
                            shortest_float_repr(v as f64)
                        } else {
                            v.to_string()
                        }
                    })
                })
                .collect()
        }
        _ => series
            .cast(&DataType::String)?
            .str()?
            .into_iter()
            .map(|value| value.map(str::to_string))
            .collect(),
    };
    Ok(rendered)
}

/// Text substituted for nulls when a whole column is converted to strings.
pub fn null_token(dtype: &DataType) -> &'static str {
    match dtype {
        DataType::Datetime(_, _) | DataType::Date => "NaT",
        _ => "nan",
    }
}

/// Converts a series to a string series using the canonical representation, nulls
/// included.
pub fn stringify(series: &Series) -> PolarsResult<Series> {
    let token = null_token(series.dtype());
    let values: Vec<String> = render_values(series)?
        .into_iter()
        .map(|value| value.unwrap_or_else(|| token.to_string()))
        .collect();
    Ok(Series::new(series.name().clone(), values))
}
