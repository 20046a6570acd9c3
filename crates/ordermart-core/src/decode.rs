//! Spreadsheet decoding: first worksheet, first row as header, one typed column per
//! header cell.

use std::collections::HashMap;
use std::io::Cursor;

use calamine::{open_workbook_auto_from_rs, Data, Range, Reader};
use chrono::NaiveDateTime;
use polars::prelude::*;

use crate::error::{EtlError, Result};
use crate::render::shortest_float_repr;

pub trait SheetDecoder: Send + Sync {
    fn decode(&self, object: &str, bytes: &[u8]) -> Result<DataFrame>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct XlsxDecoder;

impl SheetDecoder for XlsxDecoder {
    fn decode(&self, object: &str, bytes: &[u8]) -> Result<DataFrame> {
        let parse_err = |message: String| EtlError::Parse {
            object: object.to_string(),
            message,
        };

        let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
            .map_err(|err| parse_err(err.to_string()))?;
        let range = workbook
            .worksheet_range_at(0)
            .ok_or_else(|| parse_err("workbook has no worksheets".to_string()))?
            .map_err(|err| parse_err(err.to_string()))?;

        frame_from_range(&range).map_err(|err| match err {
            EtlError::Polars(source) => parse_err(source.to_string()),
            other => other,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Cell {
    Empty,
    Bool(bool),
    Int(i64),
    Float(f64),
    DateTime(NaiveDateTime),
    Text(String),
}

impl Cell {
    fn from_data(data: &Data) -> Self {
        match data {
            Data::Empty | Data::Error(_) => Cell::Empty,
            Data::Bool(value) => Cell::Bool(*value),
            Data::Int(value) => Cell::Int(*value),
            Data::Float(value) => Cell::Float(*value),
            Data::String(value) if value.is_empty() => Cell::Empty,
            Data::String(value) => Cell::Text(value.clone()),
            Data::DateTime(value) if value.is_datetime() => match value.as_datetime() {
                Some(dt) => Cell::DateTime(dt),
                None => Cell::Float(value.as_f64()),
            },
            Data::DateTime(value) => Cell::Float(value.as_f64()),
            Data::DateTimeIso(value) => match parse_iso(value) {
                Some(dt) => Cell::DateTime(dt),
                None => Cell::Text(value.clone()),
            },
            Data::DurationIso(value) => Cell::Text(value.clone()),
        }
    }

    fn as_text(&self) -> Option<String> {
        match self {
            Cell::Empty => None,
            Cell::Bool(true) => Some("True".to_string()),
            Cell::Bool(false) => Some("False".to_string()),
            Cell::Int(value) => Some(value.to_string()),
            Cell::Float(value) if is_integral(*value) => Some(format!("{}", *value as i64)),
            Cell::Float(value) => Some(shortest_float_repr(*value)),
            Cell::DateTime(dt) => Some(dt.format("%Y-%m-%d %H:%M:%S").to_string()),
            Cell::Text(value) => Some(value.clone()),
        }
    }
}

fn parse_iso(value: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .or_else(|| {
            chrono::NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}

fn is_integral(value: f64) -> bool {
    value.is_finite() && value.fract() == 0.0 && value.abs() < 9.007_199_254_740_992e15
}

/// Converts a worksheet range to a frame. An empty range yields an empty frame.
pub fn frame_from_range(range: &Range<Data>) -> Result<DataFrame> {
    let mut rows = range.rows();
    let Some(header) = rows.next() else {
        return Ok(DataFrame::default());
    };

    let names = header_names(header);
    let mut cells: Vec<Vec<Cell>> = vec![Vec::with_capacity(range.height()); names.len()];
    for row in rows {
        for (idx, column) in cells.iter_mut().enumerate() {
            column.push(row.get(idx).map(Cell::from_data).unwrap_or(Cell::Empty));
        }
    }

    let columns = names
        .iter()
        .zip(cells)
        .map(|(name, column)| build_column(name, column))
        .collect::<Result<Vec<_>>>()?;

    Ok(DataFrame::new(columns)?)
}

fn header_names(header: &[Data]) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut names = Vec::with_capacity(header.len());

    for (idx, data) in header.iter().enumerate() {
        let base = Cell::from_data(data)
            .as_text()
            .unwrap_or_else(|| format!("Unnamed: {idx}"));

        let mut name = base.clone();
        while let Some(count) = seen.get_mut(&name) {
            *count += 1;
            name = format!("{base}.{count}");
        }
        seen.insert(name.clone(), 0);
        if name != base {
            seen.entry(base).or_insert(0);
        }
        names.push(name);
    }

    names
}

fn build_column(name: &str, cells: Vec<Cell>) -> Result<Column> {
    let present: Vec<&Cell> = cells.iter().filter(|cell| **cell != Cell::Empty).collect();
    let has_empty = present.len() != cells.len();
    let name: PlSmallStr = name.into();

    if present.is_empty() {
        let values: Vec<Option<f64>> = vec![None; cells.len()];
        return Ok(Series::new(name, values).into());
    }

    if present.iter().all(|cell| matches!(cell, Cell::Bool(_))) {
        let values: Vec<Option<bool>> = cells
            .iter()
            .map(|cell| match cell {
                Cell::Bool(value) => Some(*value),
                _ => None,
            })
            .collect();
        return Ok(Series::new(name, values).into());
    }

    let numeric = present
        .iter()
        .all(|cell| matches!(cell, Cell::Int(_) | Cell::Float(_)));
    if numeric {
        let integral = !has_empty
            && present.iter().all(|cell| match cell {
                Cell::Int(_) => true,
                Cell::Float(value) => is_integral(*value),
                _ => false,
            });
        if integral {
            let values: Vec<i64> = cells
                .iter()
                .map(|cell| match cell {
                    Cell::Int(value) => *value,
                    Cell::Float(value) => *value as i64,
                    _ => 0,
                })
                .collect();
            return Ok(Series::new(name, values).into());
        }
        let values: Vec<Option<f64>> = cells
            .iter()
            .map(|cell| match cell {
                Cell::Int(value) => Some(*value as f64),
                Cell::Float(value) => Some(*value),
                _ => None,
            })
            .collect();
        return Ok(Series::new(name, values).into());
    }

    if present.iter().all(|cell| matches!(cell, Cell::DateTime(_))) {
        let millis: Vec<Option<i64>> = cells
            .iter()
            .map(|cell| match cell {
                Cell::DateTime(dt) => Some(dt.and_utc().timestamp_millis()),
                _ => None,
            })
            .collect();
        let series = Series::new(name, millis)
            .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))?;
        return Ok(series.into());
    }

    let values: Vec<Option<String>> = cells.iter().map(Cell::as_text).collect();
    Ok(Series::new(name, values).into())
}
