//! Output strategies for a finished star schema.

mod archive;
mod csv_writer;
mod warehouse;

use async_trait::async_trait;
use serde::Serialize;

pub use archive::{build_archive, ArchiveSink};
pub use csv_writer::write_csv;
pub use warehouse::{create_table_sql, insert_batches, quote_ident, sql_type, WarehouseSink};

use crate::config::SinkKind;
use crate::error::SinkError;
use crate::star::{ShapeOptions, StarSchema};

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct SinkReceipt {
    /// Table ids or object locations written, in delivery order.
    pub destinations: Vec<String>,
}

#[async_trait]
pub trait OutputSink: Send + Sync {
    fn kind(&self) -> SinkKind;

    /// How the shaper should prepare tables for this sink.
    fn shape_options(&self) -> ShapeOptions;

    /// Replaces the sink's previous output with `schema`.
    async fn deliver(&self, schema: &StarSchema) -> Result<SinkReceipt, SinkError>;
}
