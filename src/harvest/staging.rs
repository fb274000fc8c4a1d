//! Staging Writer: a single append-only CSV file per harvest, header
//! `(domain_name, price_numeric, length_numeric)`. Writes are serialized
//! behind a mutex since many streams share one file handle. Grounded on
//! `original_source/backend/scraper_service.py::save_to_csv`, which builds
//! each row with Python's stdlib `csv.writer` rather than string
//! concatenation - this does the same with the `csv` crate.

use std::path::{Path, PathBuf};

use csv::WriterBuilder;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::error::IngestError;
use crate::parse::ParsedListing;

pub const STAGING_HEADER: [&str; 3] = ["domain_name", "price_numeric", "length_numeric"];

pub struct StagingWriter {
    path: PathBuf,
    file: Mutex<File>,
}

impl StagingWriter {
    /// Creates an empty staging file (with header) for one harvest.
    pub async fn create(dir: &Path, snapshot_id: i64) -> Result<Self, IngestError> {
        let path = dir.join(format!("snapshot_{snapshot_id}.csv"));
        let mut file = File::create(&path).await?;
        let mut writer = WriterBuilder::new().has_headers(false).from_writer(Vec::new());
        writer.write_record(STAGING_HEADER)?;
        let buf = writer.into_inner().map_err(|e| IngestError::Csv(e.into_error()))?;
        file.write_all(&buf).await?;
        Ok(Self { path, file: Mutex::new(file) })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends new (already-deduplicated) listings. Empty string means null
    /// price, per the staging wire format.
    pub async fn append(&self, listings: &[ParsedListing]) -> Result<(), IngestError> {
        if listings.is_empty() {
            return Ok(());
        }
        let mut writer = WriterBuilder::new().has_headers(false).from_writer(Vec::new());
        for listing in listings {
            let price = listing.price.map(|p| p.to_string()).unwrap_or_default();
            let length = listing.length.to_string();
            writer.write_record([listing.name.as_str(), price.as_str(), length.as_str()])?;
        }
        let buf = writer.into_inner().map_err(|e| IngestError::Csv(e.into_error()))?;

        let mut file = self.file.lock().await;
        file.write_all(&buf).await?;
        Ok(())
    }

    pub async fn delete(self) -> Result<(), IngestError> {
        drop(self.file.into_inner());
        tokio::fs::remove_file(&self.path).await?;
        Ok(())
    }
}
