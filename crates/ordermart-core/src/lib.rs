// crates/ordermart-core/src/lib.rs

pub mod config;
pub mod db;
pub mod decode;
pub mod error;
pub mod event;
pub mod loader;
pub mod render;
pub mod runner;
pub mod scratch;
pub mod shaper;
pub mod sink;
pub mod star;
pub mod transform;

pub use config::{EtlConfig, InputNames, SinkKind};
pub use decode::{SheetDecoder, XlsxDecoder};
pub use error::{EtlError, Result, SinkError};
pub use event::StorageEvent;
pub use runner::{EtlRunner, RunReport, RunStatus};
pub use star::{build_star_schema, ShapeOptions, StarSchema};
