use std::sync::Arc;

use ordermart_bucket::{BucketConnector, BucketStore};
use serde::Serialize;
use tracing::{error, info};

use crate::config::{EtlConfig, SinkKind};
use crate::decode::SheetDecoder;
use crate::error::{ConfigError, EtlError, Result};
use crate::event::StorageEvent;
use crate::loader::load_inputs;
use crate::sink::{ArchiveSink, OutputSink, WarehouseSink};
use crate::star::build_star_schema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Success,
    Failed,
}

/// Outcome of one invocation, returned in place of an error.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub status: RunStatus,
    pub bucket: String,
    pub event_id: Option<String>,
    pub object: String,
    pub sink: SinkKind,
    pub destinations: Vec<String>,
    pub error: Option<String>,
}

impl RunReport {
    pub fn succeeded(&self) -> bool {
        self.status == RunStatus::Success
    }
}

/// Shared state for every invocation in a process: the storage connector, the
/// spreadsheet decoder and, when configured, the warehouse pool.
#[derive(Clone)]
pub struct EtlRunner {
    connector: Arc<dyn BucketConnector>,
    decoder: Arc<dyn SheetDecoder>,
    warehouse: Option<WarehouseSink>,
    config: Arc<EtlConfig>,
}

impl EtlRunner {
    pub fn new(
        connector: Arc<dyn BucketConnector>,
        decoder: Arc<dyn SheetDecoder>,
        config: EtlConfig,
    ) -> Self {
        Self {
            connector,
            decoder,
            warehouse: None,
            config: Arc::new(config),
        }
    }

    pub fn with_warehouse(mut self, warehouse: WarehouseSink) -> Self {
        self.warehouse = Some(warehouse);
        self
    }

    pub fn config(&self) -> &EtlConfig {
        &self.config
    }

    /// Runs the whole transform for `event`. Never fails: every error is logged once
    /// and reported in the returned [`RunReport`].
    pub async fn run_event(&self, event: &StorageEvent) -> RunReport {
        let sink_kind = self.config.sink;
        info!(
            bucket = %event.bucket,
            event_id = event.id.as_deref().unwrap_or("-"),
            event_type = event.event_type.as_deref().unwrap_or("-"),
            object = %event.name,
            sink = %sink_kind,
            "starting run"
        );

        let mut report = RunReport {
            status: RunStatus::Success,
            bucket: event.bucket.clone(),
            event_id: event.id.clone(),
            object: event.name.clone(),
            sink: sink_kind,
            destinations: Vec::new(),
            error: None,
        };

        match self.execute(event).await {
            Ok(destinations) => {
                info!(
                    bucket = %event.bucket,
                    destinations = destinations.len(),
                    "run completed"
                );
                report.destinations = destinations;
            }
            Err(err) => {
                error!(
                    bucket = %event.bucket,
                    event_id = event.id.as_deref().unwrap_or("-"),
                    object = %event.name,
                    error = %err,
                    "an error occurred"
                );
                report.status = RunStatus::Failed;
                report.error = Some(err.to_string());
            }
        }
        report
    }

    async fn execute(&self, event: &StorageEvent) -> Result<Vec<String>> {
        let store = self.connector.open(&event.bucket)?;
        let sources = load_inputs(store.as_ref(), &self.config.inputs, self.decoder.as_ref()).await?;

        let sink = self.sink_for(store)?;
        let schema = build_star_schema(&sources, sink.shape_options())?;
        let receipt = sink.deliver(&schema).await?;
        Ok(receipt.destinations)
    }

    fn sink_for(&self, store: Arc<dyn BucketStore>) -> Result<Box<dyn OutputSink>> {
        match self.config.sink {
            SinkKind::Archive => Ok(Box::new(ArchiveSink::new(
                store,
                self.config.archive_name.clone(),
                self.config.scratch_root.clone(),
            ))),
            SinkKind::Warehouse => match &self.warehouse {
                Some(warehouse) => Ok(Box::new(warehouse.clone())),
                None => Err(EtlError::Config(ConfigError::Missing(
                    "DATABASE_URL (or ORDERMART_DATABASE_URL)",
                ))),
            },
        }
    }
}
