//! Append-only CSV store of HIGH-risk classifications.

use std::sync::Arc;

use crate::core::storage::{Storage, StorageError};
use crate::models::{AlertRecord, ClassificationResult, RiskLevel};

/// Alert store over one CSV file; the header is written with the first row
#[derive(Clone)]
pub struct AlertStore {
    storage: Arc<dyn Storage>,
    key: String,
}

impl AlertStore {
    pub fn new(storage: Arc<dyn Storage>, key: impl Into<String>) -> Self {
        Self { storage, key: key.into() }
    }

    fn csv_error(&self, source: csv::Error) -> StorageError {
        StorageError::Csv { key: self.key.clone(), source }
    }

    /// Stamp the HIGH results of a run and append them
    pub fn record_run(
        &self,
        run_id: &str,
        timestamp: &str,
        results: &[ClassificationResult],
    ) -> Result<Vec<AlertRecord>, StorageError> {
        let records: Vec<AlertRecord> = results
            .iter()
            .filter(|r| r.risk_level == RiskLevel::High)
            .map(|r| AlertRecord {
                timestamp: timestamp.to_string(),
                run_id: run_id.to_string(),
                source_address: r.source_address,
                packet_count: r.packet_count,
                confidence: r.confidence,
                risk_level: r.risk_level,
            })
            .collect();
        self.append(&records)?;
        Ok(records)
    }

    pub fn append(&self, records: &[AlertRecord]) -> Result<(), StorageError> {
        if records.is_empty() {
            return Ok(());
        }
        let needs_header = self.storage.size(&self.key)?.unwrap_or(0) == 0;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(needs_header)
            .from_writer(Vec::new());
        for record in records {
            writer.serialize(record).map_err(|e| self.csv_error(e))?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|e| self.csv_error(csv::Error::from(e.into_error())))?;
        self.storage.append(&self.key, &String::from_utf8_lossy(&bytes))
    }

    pub fn load(&self) -> Result<Vec<AlertRecord>, StorageError> {
        let contents = match self.storage.read(&self.key)? {
            Some(contents) => contents,
            None => return Ok(Vec::new()),
        };
        let mut reader = csv::Reader::from_reader(contents.as_bytes());
        reader
            .deserialize()
            .collect::<Result<Vec<AlertRecord>, csv::Error>>()
            .map_err(|e| self.csv_error(e))
    }
}
