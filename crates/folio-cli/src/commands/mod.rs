pub mod dashboard;
pub mod recent;
pub mod simulate;

pub use dashboard::DashboardCommand;
pub use recent::RecentCommand;
pub use simulate::SimulateCommand;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use folio_store::{AnalyticsStore, FileDocumentStore};

/// Location of the file-backed document store
#[derive(Args, Debug, Clone)]
pub struct StoreArgs {
    /// Path of the JSON snapshot holding all analytics documents
    #[arg(long = "store", env = "FOLIO_STORE_PATH", default_value = "folio-analytics.json")]
    pub path: PathBuf,
}

impl StoreArgs {
    pub async fn open(&self) -> anyhow::Result<AnalyticsStore> {
        let documents = FileDocumentStore::open(&self.path).await?;
        Ok(AnalyticsStore::new(Arc::new(documents)))
    }
}
