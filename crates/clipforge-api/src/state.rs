//! Application state.

use std::sync::Arc;

use clipforge_blob::{BlobStore, DeliveryUrlSigner};
use clipforge_queue::{EventBus, Scheduler};
use clipforge_store::Store;

use crate::config::ApiConfig;

/// Shared application state.
///
/// Construction order mirrors process initialization: config first, then
/// blob store, job store, event bus, scheduler; the HTTP surface comes
/// last and only holds handles.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub blobs: BlobStore,
    pub store: Store,
    pub events: EventBus,
    pub scheduler: Arc<Scheduler>,
    pub signer: DeliveryUrlSigner,
}

impl AppState {
    pub fn new(
        config: ApiConfig,
        blobs: BlobStore,
        store: Store,
        events: EventBus,
        scheduler: Arc<Scheduler>,
        signer: DeliveryUrlSigner,
    ) -> Self {
        Self {
            config,
            blobs,
            store,
            events,
            scheduler,
            signer,
        }
    }
}
