use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Lifecycle of an analysis session. Ordered: a session only ever moves
/// forward along `Created → Pending → Completed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Created,
    Pending,
    Completed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Created => "created",
            SessionStatus::Pending => "pending",
            SessionStatus::Completed => "completed",
        }
    }

    /// Position in the lifecycle, used by the storage layer to reject regressions.
    pub fn rank(&self) -> i32 {
        match self {
            SessionStatus::Created => 0,
            SessionStatus::Pending => 1,
            SessionStatus::Completed => 2,
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created" => Ok(SessionStatus::Created),
            "pending" => Ok(SessionStatus::Pending),
            "completed" => Ok(SessionStatus::Completed),
            other => Err(anyhow::anyhow!("unknown session status '{other}'")),
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct SessionRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub job_title: String,
    pub job_description: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

/// One job-match analysis request. This is also the queue envelope:
/// the trigger publishes it as JSON and workers deserialize it back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub job_title: String,
    pub job_description: String,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<SessionRow> for Session {
    type Error = anyhow::Error;

    fn try_from(row: SessionRow) -> Result<Self, Self::Error> {
        Ok(Session {
            id: row.id,
            user_id: row.user_id,
            name: row.name,
            job_title: row.job_title,
            job_description: row.job_description,
            status: row.status.parse()?,
            created_at: row.created_at,
        })
    }
}
