use std::sync::Arc;

use crate::accrual::AccrualWorker;
use crate::store::Store;

/// Shared state of the HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Ledger backend
    pub store: Arc<dyn Store>,
    /// Spawns one accrual task per accepted order
    pub worker: Arc<AccrualWorker>,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, worker: Arc<AccrualWorker>) -> Self {
        Self { store, worker }
    }
}
