use std::collections::BTreeSet;

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use polars::prelude::*;

use crate::error::{EtlError, Result};
use crate::render::{datetime_values, stringify};
use crate::transform::{
    require_columns, CUSTOMER_ID, CUSTOMER_MEAN_DISCOUNT, CUSTOMER_ORDER_COUNT, ORDER_DATE,
    ORDER_ID, PRODUCT_ID, PRODUCT_ORDER_COUNT, PRODUCT_TOTAL_QUANTITY, SHIP_DATE,
};

pub const FACT_COLUMNS: [&str; 9] = [
    ORDER_ID,
    CUSTOMER_ID,
    PRODUCT_ID,
    ORDER_DATE,
    SHIP_DATE,
    CUSTOMER_ORDER_COUNT,
    CUSTOMER_MEAN_DISCOUNT,
    PRODUCT_ORDER_COUNT,
    PRODUCT_TOTAL_QUANTITY,
];

pub const TIME_COLUMNS: [&str; 6] = ["Date", "TimeID", "Year", "Month", "Day", "WeekDay"];

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];
const DAY_FORMATS: [&str; 2] = ["%Y-%m-%d", "%m/%d/%Y"];

/// Selects the nine fact columns, in order.
pub fn project_fact(enriched: &DataFrame) -> Result<DataFrame> {
    require_columns(enriched, "order fact", &FACT_COLUMNS)?;
    Ok(enriched.select(FACT_COLUMNS)?)
}

/// One row per distinct order or ship date of every order, ascending.
pub fn build_time_dimension(orders: &DataFrame) -> Result<DataFrame> {
    require_columns(orders, "orders", &[ORDER_DATE, SHIP_DATE])?;

    let mut dates: BTreeSet<NaiveDateTime> = BTreeSet::new();
    for name in [ORDER_DATE, SHIP_DATE] {
        let series = orders.column(name)?.as_materialized_series();
        dates.extend(parse_dates(series)?.into_iter().flatten());
    }

    let millis: Vec<i64> = dates
        .iter()
        .map(|dt| dt.and_utc().timestamp_millis())
        .collect();
    let time_ids: Vec<String> = dates.iter().map(|dt| dt.format("%Y%m%d").to_string()).collect();
    let years: Vec<i32> = dates.iter().map(|dt| dt.year()).collect();
    let months: Vec<i32> = dates.iter().map(|dt| dt.month() as i32).collect();
    let days: Vec<i32> = dates.iter().map(|dt| dt.day() as i32).collect();
    let weekdays: Vec<String> = dates.iter().map(|dt| dt.format("%A").to_string()).collect();

    let date_column = Series::new(TIME_COLUMNS[0].into(), millis)
        .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))?;

    Ok(DataFrame::new(vec![
        date_column.into(),
        Series::new(TIME_COLUMNS[1].into(), time_ids).into(),
        Series::new(TIME_COLUMNS[2].into(), years).into(),
        Series::new(TIME_COLUMNS[3].into(), months).into(),
        Series::new(TIME_COLUMNS[4].into(), days).into(),
        Series::new(TIME_COLUMNS[5].into(), weekdays).into(),
    ])?)
}

fn parse_dates(series: &Series) -> Result<Vec<Option<NaiveDateTime>>> {
    match series.dtype() {
        DataType::Datetime(_, _) | DataType::Date => Ok(datetime_values(series)?),
        DataType::Null => Ok(vec![None; series.len()]),
        DataType::String => parse_text_dates(series.name(), series.str()?),
        dtype if dtype.is_float() && series.null_count() == series.len() => {
            Ok(vec![None; series.len()])
        }
        _ => {
            let text = series.cast(&DataType::String)?;
            parse_text_dates(series.name(), text.str()?)
        }
    }
}

fn parse_text_dates(
    column: &PlSmallStr,
    values: &StringChunked,
) -> Result<Vec<Option<NaiveDateTime>>> {
    values
        .into_iter()
        .map(|value| match value.map(str::trim) {
            None | Some("") => Ok(None),
            Some(text) => parse_date_text(text).map(Some).ok_or_else(|| EtlError::Parse {
                object: "orders".to_string(),
                message: format!("column {column} holds unparseable date {text:?}"),
            }),
        })
        .collect()
}

fn parse_date_text(text: &str) -> Option<NaiveDateTime> {
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .or_else(|| {
            DAY_FORMATS
                .iter()
                .find_map(|format| NaiveDate::parse_from_str(text, format).ok())
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}

/// Replaces the named columns with their canonical string rendering.
pub fn stringify_columns(df: &mut DataFrame, table: &'static str, columns: &[&str]) -> Result<()> {
    require_columns(df, table, columns)?;
    for name in columns {
        let rendered = stringify(df.column(name)?.as_materialized_series())?;
        df.with_column(rendered)?;
    }
    Ok(())
}

/// Replaces every column with its canonical string rendering.
pub fn stringify_all(df: &mut DataFrame, table: &'static str) -> Result<()> {
    let names: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|name| name.to_string())
        .collect();
    let names: Vec<&str> = names.iter().map(String::as_str).collect();
    stringify_columns(df, table, &names)
}
