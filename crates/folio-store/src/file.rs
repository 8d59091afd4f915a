use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use folio_core::{Clock, SystemClock};
use tokio::sync::Mutex;
use tracing::debug;

use crate::document::Document;
use crate::error::Result;
use crate::memory::DocumentSet;
use crate::traits::{DocumentStore, Query, Write};

/// Document store persisted as a single JSON snapshot on disk.
///
/// Every commit rewrites the snapshot (write to a sibling temp file, then
/// rename), so a crash mid-write leaves the previous snapshot intact.
pub struct FileDocumentStore {
    path: PathBuf,
    state: Mutex<DocumentSet>,
    clock: Arc<dyn Clock>,
}

impl FileDocumentStore {
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_clock(path, Arc::new(SystemClock)).await
    }

    pub async fn open_with_clock(path: impl AsRef<Path>, clock: Arc<dyn Clock>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let state = match tokio::fs::read(&path).await {
            Ok(bytes) if !bytes.is_empty() => serde_json::from_slice(&bytes)?,
            Ok(_) => DocumentSet::new(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => DocumentSet::new(),
            Err(e) => return Err(e.into()),
        };
        debug!("Opened document snapshot at {:?}", path);

        Ok(Self {
            path,
            state: Mutex::new(state),
            clock,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, state: &DocumentSet) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let bytes = serde_json::to_vec_pretty(state)?;
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for FileDocumentStore {
    fn backend_name(&self) -> &'static str {
        "file"
    }

    async fn commit(&self, writes: Vec<Write>) -> Result<()> {
        let now = self.clock.now();
        let mut state = self.state.lock().await;
        let mut next = state.clone();
        next.apply(writes, now)?;
        self.persist(&next).await?;
        *state = next;
        Ok(())
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        Ok(self.state.lock().await.get(collection, id))
    }

    async fn query(&self, collection: &str, query: Query) -> Result<Vec<Document>> {
        Ok(self.state.lock().await.query(collection, &query))
    }
}
