use std::time::Duration;

use crate::auth::middleware::AuthGate;
use crate::domains::store::BlobStore;

/// Shared application state passed to all handlers via axum State extractor.
#[derive(Clone)]
pub struct AppState {
    /// Versioned domain settings storage
    pub store: BlobStore,
    /// Credential store and realm for Basic auth
    pub auth: AuthGate,
    /// Upper bound for a single store call; `None` waits indefinitely
    pub store_timeout: Option<Duration>,
    /// Largest accepted blob in bytes
    pub max_blob_bytes: usize,
}
