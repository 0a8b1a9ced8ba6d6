use std::sync::Arc;
use std::time::Instant;

use common::{
    error::AppError,
    storage::{
        db::SurrealDbClient,
        types::{row_document::RowDocument, StoredObject},
    },
    utils::{config::AppConfig, embedding::EmbeddingProvider},
};
use serde::Deserialize;
use tokio::sync::{OnceCell, RwLock};
use tracing::{debug, info};

pub const DEFAULT_TOP_K: usize = 4;

/// KNN search candidate pool, passed as the ef parameter of the operator.
const KNN_EF: usize = 40;

/// One KNN hit, projected to what prompts and logging need.
///
/// Distance is ascending-better (0 is an exact match); ordering between
/// equal-distance rows follows whatever the index returns.
#[derive(Debug, Clone, Deserialize)]
pub struct RetrievedRow {
    pub text: String,
    pub supplier_id: String,
    pub supplier_name: String,
    pub item_category: String,
    pub risk_level: String,
    pub source: String,
    pub row_index: String,
    pub distance: f32,
}

/// The queryable structure over embedded row documents.
///
/// Queries take the read side of the gate and ingestion the write side, so
/// analysis runs never observe a half-replaced source file.
pub struct VectorIndex {
    db: Arc<SurrealDbClient>,
    embedder: Arc<EmbeddingProvider>,
    gate: RwLock<()>,
}

impl VectorIndex {
    pub fn open(db: Arc<SurrealDbClient>, embedder: Arc<EmbeddingProvider>) -> Self {
        Self {
            db,
            embedder,
            gate: RwLock::new(()),
        }
    }

    pub fn embedder(&self) -> &EmbeddingProvider {
        &self.embedder
    }

    /// Top-k rows by embedding similarity to the query text.
    pub async fn search(&self, query: &str, take: usize) -> Result<Vec<RetrievedRow>, AppError> {
        let _read = self.gate.read().await;

        let embedding = self.embedder.embed(query).await?;

        let mut response = self
            .db
            .query(format!(
                "SELECT text, supplier_id, supplier_name, item_category, risk_level, \
                 source, row_index, vector::distance::knn() AS distance \
                 FROM {table} WHERE embedding <|{take},{KNN_EF}|> $embedding \
                 ORDER BY distance",
                table = RowDocument::table_name(),
            ))
            .bind(("embedding", embedding))
            .await?;

        let rows: Vec<RetrievedRow> = response.take(0)?;
        debug!(query, rows = rows.len(), "vector search completed");

        Ok(rows)
    }

    /// Embeds and stores a document batch. Returns how many were indexed.
    ///
    /// Embedding the whole batch in one backend call is the dominant cost of
    /// ingestion; callers should treat this as long-running.
    pub async fn index_documents(&self, documents: Vec<RowDocument>) -> Result<usize, AppError> {
        let _write = self.gate.write().await;

        let texts: Vec<String> = documents
            .iter()
            .map(|document| document.text.clone())
            .collect();
        let embeddings = self.embedder.embed_batch(texts).await?;

        if embeddings.len() != documents.len() {
            return Err(AppError::InternalError(format!(
                "embedding backend returned {} vectors for {} documents",
                embeddings.len(),
                documents.len()
            )));
        }

        let total = documents.len();
        for (document, embedding) in documents.into_iter().zip(embeddings) {
            self.db
                .store_item(document.with_embedding(embedding))
                .await?;
        }

        Ok(total)
    }

    /// Drops every indexed document originating from the named source file.
    pub async fn delete_by_source(&self, source: &str) -> Result<(), AppError> {
        let _write = self.gate.write().await;

        RowDocument::delete_by_source(source, &self.db).await
    }
}

enum IndexSource {
    Config {
        config: AppConfig,
        embedder: Arc<EmbeddingProvider>,
    },
    Seeded,
}

/// Lazily-connected, shared handle to the vector index.
///
/// Replaces a process-global cache with a constructor-injected cell: every
/// caller that holds the gateway gets the same `Arc<VectorIndex>` back, and
/// the connection cost is paid once, on first use. The first call blocks on
/// the network and may take seconds; there is no automatic retry.
pub struct IndexGateway {
    source: IndexSource,
    cell: OnceCell<Arc<VectorIndex>>,
}

impl IndexGateway {
    pub fn new(config: AppConfig, embedder: Arc<EmbeddingProvider>) -> Self {
        Self {
            source: IndexSource::Config { config, embedder },
            cell: OnceCell::new(),
        }
    }

    /// Wrap an already-open index, used by tests and in-process embedding
    /// setups that manage their own connection.
    pub fn with_open_index(index: Arc<VectorIndex>) -> Self {
        Self {
            source: IndexSource::Seeded,
            cell: OnceCell::new_with(Some(index)),
        }
    }

    /// The shared index, connecting on first use.
    pub async fn index(&self) -> Result<Arc<VectorIndex>, AppError> {
        if let Some(index) = self.cell.get() {
            return Ok(Arc::clone(index));
        }

        let index = self
            .cell
            .get_or_try_init(|| async {
                match &self.source {
                    IndexSource::Seeded => Err(AppError::InternalError(
                        "seeded index gateway lost its index".into(),
                    )),
                    IndexSource::Config { config, embedder } => {
                        let started = Instant::now();
                        info!(
                            address = %config.surrealdb_address,
                            "connecting vector index"
                        );

                        let db = Arc::new(
                            SurrealDbClient::new(
                                &config.surrealdb_address,
                                &config.surrealdb_username,
                                &config.surrealdb_password,
                                &config.surrealdb_namespace,
                                &config.surrealdb_database,
                            )
                            .await?,
                        );
                        db.ensure_vector_index(embedder.dimension()).await?;

                        info!(
                            elapsed_ms = started.elapsed().as_millis() as u64,
                            embedding_backend = embedder.backend_label(),
                            "vector index ready"
                        );

                        Ok(Arc::new(VectorIndex::open(db, Arc::clone(embedder))))
                    }
                }
            })
            .await?;

        Ok(Arc::clone(index))
    }
}
