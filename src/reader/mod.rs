//! Reading sessions and the user-facing highlight flows built on top of the
//! offline store and the sync subsystem.

pub mod highlights;
pub mod sessions;

pub use highlights::HighlightEditor;
pub use sessions::{OpenedBook, ReaderSessions};

pub use crate::domain::HighlightEdit;

use std::sync::Arc;

use crate::{connectivity::Connectivity, sync::ReconciliationEngine};

/// Start a best-effort reconciliation pass in the background when online.
pub(crate) fn kick_sync(
    engine: &Arc<ReconciliationEngine>,
    connectivity: &Arc<dyn Connectivity>,
    user_id: &str,
) {
    if !connectivity.is_online() {
        return;
    }
    let engine = Arc::clone(engine);
    let user_id = user_id.to_string();
    tokio::spawn(async move {
        engine.sync_all(&user_id).await;
    });
}
