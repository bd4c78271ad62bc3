//! Offline synchronization: the per-record status machine, the progress
//! watermark, the debounced position reporter and the reconciliation engine.

pub mod engine;
pub mod reporter;
pub mod resume;
pub mod status;
pub mod watermark;

use std::sync::Arc;

use crate::{connectivity::Connectivity, remote_client::RemoteAuthority, storage::OfflineStore};

pub use engine::{ReconciliationEngine, SyncLock, SyncOutcome, SyncReport};
pub use reporter::PositionReporter;

/// Collaborators shared by the reporter and the reconciliation engine.
#[derive(Clone)]
pub struct SyncContext {
    pub store: Arc<dyn OfflineStore>,
    pub remote: Arc<dyn RemoteAuthority>,
    pub connectivity: Arc<dyn Connectivity>,
}

impl SyncContext {
    pub fn new(
        store: Arc<dyn OfflineStore>,
        remote: Arc<dyn RemoteAuthority>,
        connectivity: Arc<dyn Connectivity>,
    ) -> Self {
        Self {
            store,
            remote,
            connectivity,
        }
    }
}
