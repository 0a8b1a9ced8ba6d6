use std::sync::Arc;

use bytes::Bytes;
use common::{
    storage::{
        db::SurrealDbClient,
        store::StorageManager,
        types::row_document::RowDocument,
    },
    utils::{config::StorageKind, embedding::EmbeddingProvider},
};
use object_store::memory::InMemory;
use retrieval_pipeline::VectorIndex;
use uuid::Uuid;

use super::CsvIngestionPipeline;
use crate::progress::{ProgressSink, ProgressUpdate};

const THREE_ROW_CSV: &str = "\
SupplierName,SupplierID,ItemName,TotalAmount
Acme Industrial,SUP-001,Steel Bolts,1500
Globex Logistics,,Shipping Pallets,800
Initech Supplies,SUP-003,Office Chairs,2400
";

struct TestHarness {
    pipeline: CsvIngestionPipeline,
    storage: StorageManager,
    db: Arc<SurrealDbClient>,
}

async fn harness() -> TestHarness {
    let db = Arc::new(
        SurrealDbClient::memory("test_ns", &Uuid::new_v4().to_string())
            .await
            .expect("Failed to start in-memory surrealdb"),
    );
    db.ensure_vector_index(64)
        .await
        .expect("Failed to define vector index");

    let storage = StorageManager::with_backend(Arc::new(InMemory::new()), StorageKind::Memory);
    let index = Arc::new(VectorIndex::open(
        Arc::clone(&db),
        Arc::new(EmbeddingProvider::new_hashed(64)),
    ));

    TestHarness {
        pipeline: CsvIngestionPipeline::new(storage.clone(), index),
        storage,
        db,
    }
}

#[tokio::test]
async fn three_row_csv_is_ingested_with_defaults() {
    let harness = harness().await;

    let outcome = harness
        .pipeline
        .process(
            Bytes::from_static(THREE_ROW_CSV.as_bytes()),
            "orders.csv",
            &ProgressSink::disabled(),
        )
        .await
        .expect("process");

    assert!(outcome.success);
    assert_eq!(outcome.message, "Successfully processed 3 records.");

    let documents = harness
        .db
        .get_all_stored_items::<RowDocument>()
        .await
        .expect("fetch documents");
    assert_eq!(documents.len(), 3);

    let second = documents
        .iter()
        .find(|document| document.row_index == "1")
        .expect("second row present");
    assert!(second.text.contains("(ID: N/A)"));
    assert_eq!(second.supplier_name, "Globex Logistics");
    assert!(documents
        .iter()
        .all(|document| document.source == "orders.csv" && !document.embedding.is_empty()));

    assert!(harness
        .storage
        .exists("orders.csv")
        .await
        .expect("blob exists"));
}

#[tokio::test]
async fn malformed_csv_fails_soft_but_keeps_the_blob() {
    let harness = harness().await;

    // Ragged second row: three headers, one field.
    let outcome = harness
        .pipeline
        .process(
            Bytes::from_static(b"SupplierName,SupplierID,ItemName\nAcme\n"),
            "broken.csv",
            &ProgressSink::disabled(),
        )
        .await
        .expect("process");

    assert!(!outcome.success);
    assert_eq!(outcome.message, "Invalid CSV format");

    // The upload happens before parsing and is deliberately not rolled back.
    assert!(harness
        .storage
        .exists("broken.csv")
        .await
        .expect("blob exists"));
    assert_eq!(
        RowDocument::count_by_source("broken.csv", &harness.db)
            .await
            .expect("count"),
        0
    );
}

#[tokio::test]
async fn reingesting_the_same_file_replaces_its_documents() {
    let harness = harness().await;
    let sink = ProgressSink::disabled();

    for _ in 0..2 {
        let outcome = harness
            .pipeline
            .process(
                Bytes::from_static(THREE_ROW_CSV.as_bytes()),
                "orders.csv",
                &sink,
            )
            .await
            .expect("process");
        assert!(outcome.success);
    }

    assert_eq!(
        RowDocument::count_by_source("orders.csv", &harness.db)
            .await
            .expect("count"),
        3
    );
}

#[tokio::test]
async fn headers_only_csv_processes_zero_records() {
    let harness = harness().await;

    let outcome = harness
        .pipeline
        .process(
            Bytes::from_static(b"SupplierName,SupplierID\n"),
            "empty.csv",
            &ProgressSink::disabled(),
        )
        .await
        .expect("process");

    assert!(outcome.success);
    assert_eq!(outcome.message, "Successfully processed 0 records.");
}

#[tokio::test]
async fn progress_moves_monotonically_from_upload_to_done() {
    let harness = harness().await;
    let (sender, mut receiver) = tokio::sync::mpsc::unbounded_channel();

    harness
        .pipeline
        .process(
            Bytes::from_static(THREE_ROW_CSV.as_bytes()),
            "orders.csv",
            &ProgressSink::new(sender),
        )
        .await
        .expect("process");

    let mut updates: Vec<ProgressUpdate> = Vec::new();
    while let Ok(update) = receiver.try_recv() {
        updates.push(update);
    }

    let first = updates.first().expect("at least one update");
    assert_eq!(first.fraction, 0.1);
    assert_eq!(first.label, "Uploading raw file...");

    let last = updates.last().expect("final update");
    assert_eq!(last.fraction, 1.0);
    assert_eq!(last.label, "Done!");

    assert!(updates
        .windows(2)
        .all(|pair| pair[0].fraction <= pair[1].fraction));
    assert!(updates
        .iter()
        .any(|update| update.label.starts_with("Preparing documents")));
    assert!(updates
        .iter()
        .any(|update| update.label == "Indexing to vector store..."));
}
