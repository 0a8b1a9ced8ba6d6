use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;
use futures::TryStreamExt;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::{path::Path as ObjPath, ObjectStore};

use crate::utils::config::{AppConfig, StorageKind};

pub type DynStore = Arc<dyn ObjectStore>;

/// Blob storage for raw uploads.
///
/// Ingestion persists the original CSV here before any parsing, so a failed
/// indexing run can be retried from the stored bytes without re-uploading.
#[derive(Clone)]
pub struct StorageManager {
    store: DynStore,
    backend_kind: StorageKind,
}

impl StorageManager {
    pub async fn new(cfg: &AppConfig) -> object_store::Result<Self> {
        let backend_kind = cfg.storage.clone();
        let store = create_storage_backend(cfg).await?;

        Ok(Self {
            store,
            backend_kind,
        })
    }

    /// Inject a specific backend, used by tests.
    pub fn with_backend(store: DynStore, backend_kind: StorageKind) -> Self {
        Self {
            store,
            backend_kind,
        }
    }

    pub fn backend_kind(&self) -> &StorageKind {
        &self.backend_kind
    }

    /// Store raw file bytes under the given object name, overwriting any
    /// previous upload of the same name.
    pub async fn upload(&self, name: &str, data: Bytes) -> object_store::Result<()> {
        let path = ObjPath::from(name);
        let payload = object_store::PutPayload::from_bytes(data);
        self.store.put(&path, payload).await.map(|_| ())
    }

    /// Retrieve a stored file, `None` when no such object exists.
    pub async fn get(&self, name: &str) -> object_store::Result<Option<Bytes>> {
        let path = ObjPath::from(name);
        match self.store.get(&path).await {
            Ok(result) => Ok(Some(result.bytes().await?)),
            Err(object_store::Error::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Names of every stored file.
    pub async fn list(&self) -> object_store::Result<Vec<String>> {
        let objects: Vec<object_store::ObjectMeta> = self.store.list(None).try_collect().await?;
        Ok(objects
            .into_iter()
            .map(|meta| meta.location.to_string())
            .collect())
    }

    /// Delete a stored file. Returns whether the object existed.
    pub async fn delete(&self, name: &str) -> object_store::Result<bool> {
        let path = ObjPath::from(name);
        match self.store.delete(&path).await {
            Ok(()) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    pub async fn exists(&self, name: &str) -> object_store::Result<bool> {
        let path = ObjPath::from(name);
        self.store
            .head(&path)
            .await
            .map(|_| true)
            .or_else(|e| match e {
                object_store::Error::NotFound { .. } => Ok(false),
                _ => Err(e),
            })
    }
}

/// Create a storage backend based on configuration.
async fn create_storage_backend(cfg: &AppConfig) -> object_store::Result<DynStore> {
    match cfg.storage {
        StorageKind::Local => {
            let base = resolve_base_dir(cfg);
            if !base.exists() {
                tokio::fs::create_dir_all(&base).await.map_err(|e| {
                    object_store::Error::Generic {
                        store: "LocalFileSystem",
                        source: e.into(),
                    }
                })?;
            }
            let store = LocalFileSystem::new_with_prefix(base)?;
            Ok(Arc::new(store))
        }
        StorageKind::Memory => Ok(Arc::new(InMemory::new())),
    }
}

/// Resolve the absolute base directory used for local storage from config.
///
/// If `data_dir` is relative, it is resolved against the current working directory.
fn resolve_base_dir(cfg: &AppConfig) -> PathBuf {
    if cfg.data_dir.starts_with('/') {
        PathBuf::from(&cfg.data_dir)
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(&cfg.data_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_storage() -> StorageManager {
        StorageManager::with_backend(Arc::new(InMemory::new()), StorageKind::Memory)
    }

    #[tokio::test]
    async fn upload_get_roundtrip() {
        let storage = memory_storage();
        let data = b"SupplierName,TotalAmount\nAcme,1500\n";

        storage
            .upload("orders.csv", Bytes::from(data.to_vec()))
            .await
            .expect("upload");

        let retrieved = storage.get("orders.csv").await.expect("get");
        assert_eq!(retrieved.as_deref(), Some(data.as_slice()));
        assert!(storage.exists("orders.csv").await.expect("exists"));
    }

    #[tokio::test]
    async fn get_missing_object_is_none() {
        let storage = memory_storage();

        let retrieved = storage.get("missing.csv").await.expect("get");

        assert!(retrieved.is_none());
        assert!(!storage.exists("missing.csv").await.expect("exists"));
    }

    #[tokio::test]
    async fn upload_overwrites_previous_object() {
        let storage = memory_storage();

        storage
            .upload("orders.csv", Bytes::from_static(b"first"))
            .await
            .expect("upload first");
        storage
            .upload("orders.csv", Bytes::from_static(b"second"))
            .await
            .expect("upload second");

        let retrieved = storage.get("orders.csv").await.expect("get");
        assert_eq!(retrieved.as_deref(), Some(b"second".as_slice()));
    }

    #[tokio::test]
    async fn list_and_delete() {
        let storage = memory_storage();

        storage
            .upload("a.csv", Bytes::from_static(b"a"))
            .await
            .expect("upload a");
        storage
            .upload("b.csv", Bytes::from_static(b"b"))
            .await
            .expect("upload b");

        let mut names = storage.list().await.expect("list");
        names.sort();
        assert_eq!(names, vec!["a.csv".to_string(), "b.csv".to_string()]);

        assert!(storage.delete("a.csv").await.expect("delete existing"));
        assert!(!storage.delete("a.csv").await.expect("delete missing"));
        assert_eq!(storage.list().await.expect("list").len(), 1);
    }
}
