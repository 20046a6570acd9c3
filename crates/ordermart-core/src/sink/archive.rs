use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use ordermart_bucket::BucketStore;
use tracing::info;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::{csv_writer::write_csv, OutputSink, SinkReceipt};
use crate::config::SinkKind;
use crate::error::SinkError;
use crate::scratch::ScratchDir;
use crate::star::{ShapeOptions, StarSchema};

/// Packs the four tables as CSV files into one zip and uploads it to the triggering
/// bucket.
pub struct ArchiveSink {
    store: Arc<dyn BucketStore>,
    archive_name: String,
    scratch_root: Option<PathBuf>,
}

impl ArchiveSink {
    pub fn new(
        store: Arc<dyn BucketStore>,
        archive_name: impl Into<String>,
        scratch_root: Option<PathBuf>,
    ) -> Self {
        Self {
            store,
            archive_name: archive_name.into(),
            scratch_root,
        }
    }

    async fn deliver_in(
        &self,
        scratch: &ScratchDir,
        schema: &StarSchema,
    ) -> Result<SinkReceipt, SinkError> {
        for table in schema.tables() {
            let path = scratch.path().join(format!("{}.csv", table.name));
            let mut writer = BufWriter::new(File::create(&path)?);
            write_csv(table.frame, &mut writer)?;
            writer.flush()?;
        }

        let archive_path = scratch.path().join(&self.archive_name);
        let entries = build_archive(scratch.path(), &archive_path)?;
        let bytes = fs::read(&archive_path)?;
        let size = bytes.len();

        self.store
            .put_object(&self.archive_name, Bytes::from(bytes), "application/zip")
            .await
            .map_err(SinkError::Upload)?;

        info!(
            bucket = self.store.bucket(),
            key = %self.archive_name,
            bytes = size,
            entries = entries.len(),
            "uploaded output archive"
        );

        Ok(SinkReceipt {
            destinations: vec![format!("{}/{}", self.store.bucket(), self.archive_name)],
        })
    }
}

#[async_trait]
impl OutputSink for ArchiveSink {
    fn kind(&self) -> SinkKind {
        SinkKind::Archive
    }

    fn shape_options(&self) -> ShapeOptions {
        ShapeOptions {
            stringify_time_dimension: true,
        }
    }

    async fn deliver(&self, schema: &StarSchema) -> Result<SinkReceipt, SinkError> {
        let scratch = ScratchDir::create(self.scratch_root.as_deref())?;
        let result = self.deliver_in(&scratch, schema).await;
        scratch.release();
        result
    }
}

/// Zips the `.csv` files directly inside `dir`, sorted by name, into `target`. Returns
/// the entry names.
pub fn build_archive(dir: &Path, target: &Path) -> Result<Vec<String>, SinkError> {
    let mut members: Vec<(String, PathBuf)> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && path != target)
        .filter(|path| path.extension().is_some_and(|ext| ext == "csv"))
        .filter_map(|path| {
            let name = path.file_name()?.to_str()?.to_string();
            Some((name, path))
        })
        .collect();
    members.sort();

    let mut zip = ZipWriter::new(BufWriter::new(File::create(target)?));
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
    for (name, path) in &members {
        zip.start_file(name.as_str(), options)?;
        let mut source = File::open(path)?;
        io::copy(&mut source, &mut zip)?;
    }
    let mut writer = zip.finish()?;
    writer.flush()?;

    Ok(members.into_iter().map(|(name, _)| name).collect())
}
