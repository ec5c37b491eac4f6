use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Per-user analysis counter for the rolling quota window.
/// Created lazily on the first gated request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct UsageRecord {
    pub user_id: Uuid,
    pub max_daily: i32,
    pub count: i32,
    pub last_used_at: DateTime<Utc>,
}
