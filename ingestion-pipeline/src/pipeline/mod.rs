use std::collections::BTreeMap;
use std::sync::Arc;

use bytes::Bytes;
use common::{
    error::AppError,
    storage::{store::StorageManager, types::row_document::RowDocument},
};
use retrieval_pipeline::VectorIndex;
use tracing::{error, info, warn};

use crate::progress::ProgressSink;

/// Rows between progress reports while documents are prepared.
const PROGRESS_ROW_STRIDE: usize = 10;

/// Terminal result of one ingestion run.
///
/// Parse and indexing failures are reported here rather than raised, so the
/// caller can surface the message verbatim. Connectivity failures (blob store
/// unreachable, database down) do raise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestionOutcome {
    pub success: bool,
    pub message: String,
}

impl IngestionOutcome {
    fn ok(message: String) -> Self {
        Self {
            success: true,
            message,
        }
    }

    fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// Turns a raw CSV upload into embedded row documents.
///
/// Steps are strictly sequential: persist the raw bytes, parse, build one
/// document per row, then replace and re-embed everything previously indexed
/// from the same file.
pub struct CsvIngestionPipeline {
    storage: StorageManager,
    index: Arc<VectorIndex>,
}

impl CsvIngestionPipeline {
    pub fn new(storage: StorageManager, index: Arc<VectorIndex>) -> Self {
        Self { storage, index }
    }

    #[tracing::instrument(skip_all, fields(file_name = %file_name))]
    pub async fn process(
        &self,
        raw: Bytes,
        file_name: &str,
        progress: &ProgressSink,
    ) -> Result<IngestionOutcome, AppError> {
        // The raw file is stored before any validation so a failed indexing
        // run can be retried without a re-upload.
        progress.report(0.1, "Uploading raw file...");
        self.storage.upload(file_name, raw.clone()).await?;

        progress.report(0.2, "Parsing CSV...");
        let rows = match parse_rows(raw.as_ref()) {
            Ok(rows) => rows,
            Err(err) => {
                warn!(file_name, error = %err, "CSV parse failed");
                return Ok(IngestionOutcome::failed("Invalid CSV format"));
            }
        };
        info!(file_name, rows = rows.len(), "loaded CSV");

        let total = rows.len();
        let mut documents = Vec::with_capacity(total);
        for (index, row) in rows.iter().enumerate() {
            if index % PROGRESS_ROW_STRIDE == 0 {
                let fraction = 0.2 + 0.5 * (index as f32 / total.max(1) as f32);
                let prepared = index.saturating_add(1);
                progress.report(fraction, format!("Preparing documents ({prepared}/{total})..."));
            }
            documents.push(RowDocument::from_row(row, file_name, index));
        }

        progress.report(0.8, "Indexing to vector store...");
        match self.reindex_source(file_name, documents).await {
            Ok(count) => {
                progress.report(1.0, "Done!");
                Ok(IngestionOutcome::ok(format!(
                    "Successfully processed {count} records."
                )))
            }
            Err(err) => {
                // The blob upload stays in place; only the index is stale.
                error!(file_name, error = %err, "indexing failed");
                Ok(IngestionOutcome::failed(format!(
                    "Error indexing documents: {err}"
                )))
            }
        }
    }

    /// Delete-then-insert keeps repeated ingestion of one file idempotent at
    /// the vector layer.
    async fn reindex_source(
        &self,
        file_name: &str,
        documents: Vec<RowDocument>,
    ) -> Result<usize, AppError> {
        self.index.delete_by_source(file_name).await?;
        self.index.index_documents(documents).await
    }
}

fn parse_rows(bytes: &[u8]) -> Result<Vec<BTreeMap<String, String>>, csv::Error> {
    let mut reader = csv::Reader::from_reader(bytes);
    let headers = reader.headers()?.clone();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let row = headers
            .iter()
            .zip(record.iter())
            .map(|(header, value)| (header.to_owned(), value.to_owned()))
            .collect();
        rows.push(row);
    }

    Ok(rows)
}

#[cfg(test)]
mod tests;
