use std::sync::Arc;
use std::time::Duration;

use crate::broadcast::UpdateBroadcaster;
use crate::queue::JobQueue;
use crate::quota::QuotaPolicy;
use crate::store::{SessionStore, UsageStore};

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn SessionStore>,
    pub usage: Arc<dyn UsageStore>,
    pub queue: Arc<dyn JobQueue>,
    /// Same instance the workers publish progress to.
    pub broadcaster: Arc<UpdateBroadcaster>,
    pub quota: QuotaPolicy,
    pub sse_keep_alive: Duration,
}
