use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

/// Per-resume outcome. Success entries carry the candidate fields;
/// failure entries carry only `is_error_result = true` and `error`.
/// Build them through [`AnalysisEntry::success`] and [`AnalysisEntry::failure`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisEntry {
    #[serde(default)]
    pub resume_id: Option<Uuid>,
    #[serde(default)]
    pub file_name: String,
    #[serde(default)]
    pub candidate_name: String,
    #[serde(default)]
    pub candidate_email: Option<String>,
    #[serde(default)]
    pub match_score: f64,
    #[serde(default)]
    pub relevant_skills: Vec<String>,
    #[serde(default)]
    pub missing_skills: Vec<String>,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub recommendation: String,
    #[serde(default)]
    pub is_error_result: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error: String,
}

/// The structured verdict the analysis agent is instructed to return.
/// Every field except the email is required; a response missing one is
/// treated as malformed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentVerdict {
    pub candidate_name: String,
    #[serde(default)]
    pub candidate_email: Option<String>,
    pub match_score: f64,
    pub relevant_skills: Vec<String>,
    pub missing_skills: Vec<String>,
    pub summary: String,
    pub recommendation: String,
}

impl AnalysisEntry {
    pub fn success(resume_id: Uuid, file_name: &str, verdict: AgentVerdict) -> Self {
        Self {
            resume_id: Some(resume_id),
            file_name: file_name.to_string(),
            candidate_name: verdict.candidate_name,
            candidate_email: verdict.candidate_email,
            match_score: verdict.match_score.clamp(0.0, 100.0),
            relevant_skills: verdict.relevant_skills,
            missing_skills: verdict.missing_skills,
            summary: verdict.summary,
            recommendation: verdict.recommendation,
            is_error_result: false,
            error: String::new(),
        }
    }

    pub fn failure(resume_id: Uuid, file_name: &str, error: impl Into<String>) -> Self {
        Self {
            resume_id: Some(resume_id),
            file_name: file_name.to_string(),
            is_error_result: true,
            error: error.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct AnalysisResultRow {
    pub id: Uuid,
    pub session_id: Uuid,
    pub results: Json<Vec<AnalysisEntry>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// All entries for one session. At most one per session (upsert on `session_id`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResultSet {
    pub id: Uuid,
    pub session_id: Uuid,
    pub results: Vec<AnalysisEntry>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<AnalysisResultRow> for AnalysisResultSet {
    fn from(row: AnalysisResultRow) -> Self {
        Self {
            id: row.id,
            session_id: row.session_id,
            results: row.results.0,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}
