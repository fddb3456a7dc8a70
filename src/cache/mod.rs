// Holder for the most recent alert batch

use crate::models::AlertBatch;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Single-slot store for the latest pipeline result.
///
/// `replace` swaps the whole batch in one write; readers only ever see a
/// complete batch or nothing.
#[async_trait::async_trait]
pub trait AlertStore: Send + Sync {
    async fn latest(&self) -> Option<Arc<AlertBatch>>;
    async fn replace(&self, batch: AlertBatch) -> Arc<AlertBatch>;
}

// In-memory implementation, lost on restart
#[derive(Debug, Clone, Default)]
pub struct InMemoryAlertStore {
    slot: Arc<RwLock<Option<Arc<AlertBatch>>>>,
}

impl InMemoryAlertStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl AlertStore for InMemoryAlertStore {
    async fn latest(&self) -> Option<Arc<AlertBatch>> {
        self.slot.read().await.clone()
    }

    async fn replace(&self, batch: AlertBatch) -> Arc<AlertBatch> {
        let batch = Arc::new(batch);
        *self.slot.write().await = Some(batch.clone());
        batch
    }
}
