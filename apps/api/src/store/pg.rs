use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use super::{SessionStore, UsageStore};
use crate::models::analysis::{AnalysisEntry, AnalysisResultRow, AnalysisResultSet};
use crate::models::resume::ResumeRow;
use crate::models::session::{Session, SessionRow, SessionStatus};
use crate::models::usage::UsageRecord;
use crate::quota::{remaining_in_window, QuotaDecision, QuotaPolicy};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionStore for PgStore {
    async fn get_session(&self, id: Uuid) -> Result<Option<Session>> {
        let row: Option<SessionRow> = sqlx::query_as(
            "SELECT id, user_id, name, job_title, job_description, status, created_at \
             FROM sessions WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Session::try_from).transpose()
    }

    async fn list_resumes(&self, session_id: Uuid) -> Result<Vec<ResumeRow>> {
        Ok(sqlx::query_as::<_, ResumeRow>(
            r#"
            SELECT id, session_id, file_name, object_key, text_content, mime_type,
                   upload_status, created_at
            FROM resumes
            WHERE session_id = $1
            ORDER BY created_at, id
            "#,
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn advance_status(&self, id: Uuid, status: SessionStatus) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE sessions SET status = $2
            WHERE id = $1
              AND CASE status
                    WHEN 'created' THEN 0
                    WHEN 'pending' THEN 1
                    WHEN 'completed' THEN 2
                  END < $3
            "#,
        )
        .bind(id)
        .bind(status.as_str())
        .bind(status.rank())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn upsert_results(
        &self,
        session_id: Uuid,
        entries: &[AnalysisEntry],
    ) -> Result<AnalysisResultSet> {
        let row: AnalysisResultRow = sqlx::query_as(
            r#"
            INSERT INTO analyses_results (id, session_id, results, created_at, updated_at)
            VALUES ($1, $2, $3, NOW(), NOW())
            ON CONFLICT (session_id)
            DO UPDATE SET results = EXCLUDED.results, updated_at = NOW()
            RETURNING id, session_id, results, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(session_id)
        .bind(Json(entries))
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }

    async fn get_results(&self, session_id: Uuid) -> Result<Option<AnalysisResultSet>> {
        let row: Option<AnalysisResultRow> = sqlx::query_as(
            "SELECT id, session_id, results, created_at, updated_at \
             FROM analyses_results WHERE session_id = $1",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }
}

#[async_trait]
impl UsageStore for PgStore {
    async fn consume(
        &self,
        user_id: Uuid,
        policy: &QuotaPolicy,
        now: DateTime<Utc>,
    ) -> Result<QuotaDecision> {
        // One statement covers no_record / window_expired / under_limit.
        // At limit the WHERE fails, nothing is written and no row comes back.
        let admitted: Option<i32> = sqlx::query_scalar(
            r#"
            INSERT INTO user_usages AS u (user_id, max_daily, count, last_used_at)
            VALUES ($1, $2, 1, $3)
            ON CONFLICT (user_id) DO UPDATE
            SET count = CASE
                    WHEN $3 - u.last_used_at >= make_interval(secs => $4) THEN 1
                    ELSE u.count + 1
                END,
                last_used_at = $3
            WHERE $3 - u.last_used_at >= make_interval(secs => $4)
               OR u.count < u.max_daily
            RETURNING count
            "#,
        )
        .bind(user_id)
        .bind(policy.max_daily)
        .bind(now)
        .bind(policy.window.as_secs_f64())
        .fetch_optional(&self.pool)
        .await?;

        if let Some(count) = admitted {
            return Ok(QuotaDecision::Allowed { count });
        }

        let record: UsageRecord = sqlx::query_as(
            "SELECT user_id, max_daily, count, last_used_at FROM user_usages WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| anyhow!("usage record for {user_id} vanished during quota check"))?;

        Ok(QuotaDecision::Exceeded {
            remaining: remaining_in_window(record.last_used_at, policy.window, now),
        })
    }
}
