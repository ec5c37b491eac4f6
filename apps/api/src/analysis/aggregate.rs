use std::time::Duration;

use thiserror::Error;
use uuid::Uuid;

use crate::extract::ExtractError;
use crate::llm_client::{strip_json_fences, LlmError};
use crate::models::analysis::{AgentVerdict, AnalysisEntry};
use crate::storage::FetchError;

/// Why one resume produced no verdict. Rendered into the entry's `error`.
#[derive(Debug, Error)]
pub enum ResumeError {
    #[error("file download error: {0}")]
    Fetch(#[from] FetchError),

    #[error("file download error: timed out after {}s", .0.as_secs())]
    FetchTimeout(Duration),

    #[error("text extraction error: {0}")]
    Extract(#[from] ExtractError),

    #[error("text extraction error: extractor task failed: {0}")]
    ExtractTask(String),

    #[error("agent stream error: {0}")]
    Agent(LlmError),

    #[error("agent timeout after {}s", .0.as_secs())]
    AgentTimeout(Duration),

    #[error("empty response from agent")]
    EmptyResponse,

    #[error("json unmarshal error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<LlmError> for ResumeError {
    fn from(e: LlmError) -> Self {
        match e {
            LlmError::EmptyContent => ResumeError::EmptyResponse,
            other => ResumeError::Agent(other),
        }
    }
}

/// Parses the agent's final text into a verdict.
pub fn parse_verdict(text: &str) -> Result<AgentVerdict, ResumeError> {
    let text = strip_json_fences(text);
    if text.is_empty() {
        return Err(ResumeError::EmptyResponse);
    }
    Ok(serde_json::from_str(text)?)
}

/// Collects one entry per resume, in processing order.
#[derive(Debug, Default)]
pub struct ResultAggregator {
    entries: Vec<AnalysisEntry>,
    failures: usize,
}

impl ResultAggregator {
    pub fn with_capacity(n: usize) -> Self {
        Self {
            entries: Vec::with_capacity(n),
            failures: 0,
        }
    }

    pub fn record(
        &mut self,
        resume_id: Uuid,
        file_name: &str,
        outcome: Result<AgentVerdict, ResumeError>,
    ) -> &AnalysisEntry {
        let entry = match outcome {
            Ok(verdict) => AnalysisEntry::success(resume_id, file_name, verdict),
            Err(e) => {
                self.failures += 1;
                AnalysisEntry::failure(resume_id, file_name, e.to_string())
            }
        };
        self.entries.push(entry);
        &self.entries[self.entries.len() - 1]
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn failures(&self) -> usize {
        self.failures
    }

    pub fn into_entries(self) -> Vec<AnalysisEntry> {
        self.entries
    }
}
