//! Persistence Sink and the session/resume reads the pipeline needs.
//!
//! Handlers and workers depend on these traits only; `PgStore` is the
//! production implementation.

mod pg;

pub use pg::PgStore;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::analysis::{AnalysisEntry, AnalysisResultSet};
use crate::models::resume::ResumeRow;
use crate::models::session::{Session, SessionStatus};
use crate::quota::{QuotaDecision, QuotaPolicy};

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get_session(&self, id: Uuid) -> Result<Option<Session>>;

    /// Resumes of a session ordered by `(created_at, id)`.
    async fn list_resumes(&self, session_id: Uuid) -> Result<Vec<ResumeRow>>;

    /// Moves the session forward to `status`. Returns `false` (and changes
    /// nothing) when the session is missing or already at or past `status`.
    async fn advance_status(&self, id: Uuid, status: SessionStatus) -> Result<bool>;

    /// Inserts the session's result set, or overwrites its entries and bumps
    /// `updated_at` when one exists.
    async fn upsert_results(
        &self,
        session_id: Uuid,
        entries: &[AnalysisEntry],
    ) -> Result<AnalysisResultSet>;

    async fn get_results(&self, session_id: Uuid) -> Result<Option<AnalysisResultSet>>;
}

#[async_trait]
pub trait UsageStore: Send + Sync {
    /// Counts one gated request against the user's window, atomically.
    async fn consume(
        &self,
        user_id: Uuid,
        policy: &QuotaPolicy,
        now: DateTime<Utc>,
    ) -> Result<QuotaDecision>;
}
