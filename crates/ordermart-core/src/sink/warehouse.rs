use std::ops::Range;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use polars::prelude::{DataFrame, DataType, PolarsResult, Series};
use sqlx::{Postgres, QueryBuilder};
use tracing::info;

use super::{OutputSink, SinkReceipt};
use crate::config::{EtlConfig, SinkKind};
use crate::db::DbPool;
use crate::error::SinkError;
use crate::render::{datetime_values, render_values};
use crate::star::{OutputTable, ShapeOptions, StarSchema};

/// Postgres caps a statement at 65535 bind parameters.
const MAX_BIND_PARAMS: usize = 65_535;

/// Truncate-and-replace loader. The dataset is a Postgres schema; each output table is
/// dropped and recreated from the frame's inferred schema inside one transaction.
#[derive(Clone)]
pub struct WarehouseSink {
    pool: DbPool,
    dataset: String,
    stringify_time_dimension: bool,
}

impl WarehouseSink {
    pub fn new(pool: DbPool, dataset: impl Into<String>, stringify_time_dimension: bool) -> Self {
        Self {
            pool,
            dataset: dataset.into(),
            stringify_time_dimension,
        }
    }

    /// Sink for the configured dataset, sharing `pool`.
    pub fn from_config(pool: DbPool, config: &EtlConfig) -> Self {
        Self::new(pool, config.dataset.clone(), config.warehouse_stringify_time)
    }

    pub fn table_id(&self, table: &str) -> String {
        format!("{}.{}", self.dataset, table)
    }

    /// Replaces one table and waits for the commit. Returns the number of rows written.
    pub async fn load_table(&self, table: OutputTable<'_>) -> Result<u64, SinkError> {
        let table_id = self.table_id(table.name);
        let wrap = |source: sqlx::Error| SinkError::Warehouse {
            table: table_id.clone(),
            source,
        };

        let columns = warehouse_columns(table.frame)?;
        let qualified = format!("{}.{}", quote_ident(&self.dataset), quote_ident(table.name));

        let mut tx = self.pool.begin().await.map_err(wrap)?;
        sqlx::query(&format!(
            "CREATE SCHEMA IF NOT EXISTS {}",
            quote_ident(&self.dataset)
        ))
        .execute(tx.as_mut())
        .await
        .map_err(wrap)?;
        sqlx::query(&format!("DROP TABLE IF EXISTS {qualified}"))
            .execute(tx.as_mut())
            .await
            .map_err(wrap)?;
        sqlx::query(&create_table_sql(&qualified, &columns))
            .execute(tx.as_mut())
            .await
            .map_err(wrap)?;

        let mut written = 0u64;
        let column_list = columns
            .iter()
            .map(|column| quote_ident(&column.name))
            .collect::<Vec<_>>()
            .join(", ");
        for rows in insert_batches(table.frame.height(), columns.len()) {
            let mut builder: QueryBuilder<'_, Postgres> =
                QueryBuilder::new(format!("INSERT INTO {qualified} ({column_list}) "));
            builder.push_values(rows, |mut row, idx| {
                for column in &columns {
                    column.values.push_bind(&mut row, idx);
                }
            });
            let result = builder.build().execute(tx.as_mut()).await.map_err(wrap)?;
            written += result.rows_affected();
        }

        tx.commit().await.map_err(wrap)?;
        info!(table = %table_id, rows = written, "replaced warehouse table");
        Ok(written)
    }
}

#[async_trait]
impl OutputSink for WarehouseSink {
    fn kind(&self) -> SinkKind {
        SinkKind::Warehouse
    }

    fn shape_options(&self) -> ShapeOptions {
        ShapeOptions {
            stringify_time_dimension: self.stringify_time_dimension,
        }
    }

    async fn deliver(&self, schema: &StarSchema) -> Result<SinkReceipt, SinkError> {
        let mut receipt = SinkReceipt::default();
        for table in schema.tables() {
            self.load_table(table).await?;
            receipt.destinations.push(self.table_id(table.name));
        }
        Ok(receipt)
    }
}

pub struct WarehouseColumn {
    pub name: String,
    pub sql_type: &'static str,
    values: ColumnValues,
}

enum ColumnValues {
    Int(Vec<Option<i64>>),
    Float(Vec<Option<f64>>),
    Bool(Vec<Option<bool>>),
    Timestamp(Vec<Option<NaiveDateTime>>),
    Date(Vec<Option<NaiveDate>>),
    Text(Vec<Option<String>>),
}

impl ColumnValues {
    fn push_bind(&self, row: &mut sqlx::query_builder::Separated<'_, '_, Postgres, &'static str>, idx: usize) {
        match self {
            ColumnValues::Int(values) => row.push_bind(values[idx]),
            ColumnValues::Float(values) => row.push_bind(values[idx]),
            ColumnValues::Bool(values) => row.push_bind(values[idx]),
            ColumnValues::Timestamp(values) => row.push_bind(values[idx]),
            ColumnValues::Date(values) => row.push_bind(values[idx]),
            ColumnValues::Text(values) => row.push_bind(values[idx].clone()),
        };
    }
}

/// Column type a frame column is stored as.
pub fn sql_type(dtype: &DataType) -> &'static str {
    match dtype {
        DataType::Boolean => "BOOLEAN",
        DataType::Float32 | DataType::Float64 => "DOUBLE PRECISION",
        DataType::Datetime(_, _) => "TIMESTAMP",
        DataType::Date => "DATE",
        dtype if dtype.is_integer() => "BIGINT",
        _ => "TEXT",
    }
}

/// Row ranges for successive INSERT statements, each binding at most
/// `MAX_BIND_PARAMS` values. Empty when there is nothing to insert.
pub fn insert_batches(rows: usize, columns: usize) -> Vec<Range<usize>> {
    if rows == 0 || columns == 0 {
        return Vec::new();
    }
    let batch = (MAX_BIND_PARAMS / columns).max(1);
    (0..rows)
        .step_by(batch)
        .map(|start| start..(start + batch).min(rows))
        .collect()
}

pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

pub fn create_table_sql(qualified: &str, columns: &[WarehouseColumn]) -> String {
    let definitions = columns
        .iter()
        .map(|column| format!("{} {}", quote_ident(&column.name), column.sql_type))
        .collect::<Vec<_>>()
        .join(", ");
    format!("CREATE TABLE {qualified} ({definitions})")
}

fn warehouse_columns(frame: &DataFrame) -> PolarsResult<Vec<WarehouseColumn>> {
    frame
        .get_columns()
        .iter()
        .map(|column| {
            let series = column.as_materialized_series();
            Ok(WarehouseColumn {
                name: series.name().to_string(),
                sql_type: sql_type(series.dtype()),
                values: column_values(series)?,
            })
        })
        .collect()
}

fn column_values(series: &Series) -> PolarsResult<ColumnValues> {
    let values = match series.dtype() {
        DataType::Boolean => ColumnValues::Bool(series.bool()?.into_iter().collect()),
        DataType::Float32 | DataType::Float64 => {
            ColumnValues::Float(series.cast(&DataType::Float64)?.f64()?.into_iter().collect())
        }
        DataType::Datetime(_, _) => ColumnValues::Timestamp(datetime_values(series)?),
        DataType::Date => ColumnValues::Date(
            datetime_values(series)?
                .into_iter()
                .map(|value| value.map(|dt| dt.date()))
                .collect(),
        ),
        dtype if dtype.is_integer() => {
            ColumnValues::Int(series.cast(&DataType::Int64)?.i64()?.into_iter().collect())
        }
        _ => ColumnValues::Text(render_values(series)?),
    };
    Ok(values)
}
