//! Per-job pipeline: for every resume of a session, fetch → extract →
//! analyze, then persist the whole result set in one upsert.
//!
//! A resume-level failure becomes a tagged entry and processing moves on to
//! the next resume. Only a failure to read the resume list or to persist
//! the results fails the job.

mod aggregate;

pub use aggregate::{parse_verdict, ResultAggregator, ResumeError};

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::broadcast::{StatusUpdate, UpdateBroadcaster, UpdateStatus};
use crate::extract::extract;
use crate::llm_client::prompts::build_analysis_prompt;
use crate::llm_client::Agent;
use crate::models::analysis::{AgentVerdict, AnalysisResultSet};
use crate::models::resume::ResumeRow;
use crate::models::session::Session;
use crate::storage::ObjectStore;
use crate::store::SessionStore;

/// Everything a worker needs to run one job. Shared by all workers.
#[derive(Clone)]
pub struct PipelineDeps {
    pub store: Arc<dyn SessionStore>,
    pub objects: Arc<dyn ObjectStore>,
    pub agent: Arc<dyn Agent>,
    pub broadcaster: Arc<UpdateBroadcaster>,
    pub bucket: String,
    pub fetch_timeout: Duration,
    pub agent_timeout: Duration,
}

/// Runs the analysis for `session` and commits its result set.
/// Does not touch the session status; that is the caller's step.
pub async fn run_session(deps: &PipelineDeps, session: &Session) -> Result<AnalysisResultSet> {
    let resumes = deps
        .store
        .list_resumes(session.id)
        .await
        .with_context(|| format!("list resumes of session {}", session.id))?;
    let total = resumes.len();

    let mut aggregator = ResultAggregator::with_capacity(total);
    for (index, resume) in resumes.iter().enumerate() {
        let outcome = analyze_resume(deps, session, resume).await;
        if let Err(e) = &outcome {
            warn!(session_id = %session.id, resume_id = %resume.id, "resume analysis failed: {e}");
        }
        let entry = aggregator.record(resume.id, &resume.file_name, outcome);

        let progress = StatusUpdate {
            session_id: session.id,
            status: UpdateStatus::Processing,
            processed: index + 1,
            total,
            message: if entry.is_error_result {
                format!("{} failed", resume.file_name)
            } else {
                format!("{} analyzed", resume.file_name)
            },
        };
        deps.broadcaster.broadcast(session.id, &progress.to_json());
    }

    let failures = aggregator.failures();
    let processed = aggregator.len();
    let results = deps
        .store
        .upsert_results(session.id, &aggregator.into_entries())
        .await
        .with_context(|| format!("persist results of session {}", session.id))?;

    info!(
        session_id = %session.id,
        resumes = processed,
        failures,
        "analysis results persisted"
    );
    Ok(results)
}

async fn analyze_resume(
    deps: &PipelineDeps,
    session: &Session,
    resume: &ResumeRow,
) -> Result<AgentVerdict, ResumeError> {
    let text = resume_text(deps, resume).await?;
    debug!(resume_id = %resume.id, chars = text.len(), "resume text ready");

    let prompt = build_analysis_prompt(&session.job_title, &session.job_description, &text);
    let reply = tokio::time::timeout(deps.agent_timeout, deps.agent.analyze(&prompt))
        .await
        .map_err(|_| ResumeError::AgentTimeout(deps.agent_timeout))??;

    parse_verdict(&reply)
}

async fn resume_text(deps: &PipelineDeps, resume: &ResumeRow) -> Result<String, ResumeError> {
    if let Some(text) = resume.text_content.as_deref().filter(|t| !t.trim().is_empty()) {
        return Ok(text.to_string());
    }

    let key = resume.storage_key();
    let bytes = tokio::time::timeout(deps.fetch_timeout, deps.objects.fetch(&deps.bucket, &key))
        .await
        .map_err(|_| ResumeError::FetchTimeout(deps.fetch_timeout))??;

    let mime_type = resume.mime_type.clone();
    tokio::task::spawn_blocking(move || extract(&mime_type, &bytes))
        .await
        .map_err(|e| ResumeError::ExtractTask(e.to_string()))?
        .map_err(ResumeError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::{MIME_PDF, MIME_TEXT};
    use crate::testing::{verdict_json, MemoryObjects, MemoryStore, ScriptedAgent};

    fn deps(
        store: Arc<MemoryStore>,
        objects: Arc<MemoryObjects>,
        agent: Arc<ScriptedAgent>,
    ) -> PipelineDeps {
        PipelineDeps {
            store,
            objects,
            agent,
            broadcaster: Arc::new(UpdateBroadcaster::new()),
            bucket: "resumes".to_string(),
            fetch_timeout: Duration::from_secs(5),
            agent_timeout: Duration::from_secs(5),
        }
    }

    #[tokio::test]
    async fn test_every_resume_yields_one_entry() {
        let store = Arc::new(MemoryStore::new());
        let objects = Arc::new(MemoryObjects::new());
        let session = store.insert_pending_session();
        store.add_object_resume(session.id, "jane.txt", MIME_TEXT);
        objects.put(
            &format!("sessions/{}/jane.txt", session.id),
            b"Jane Doe, Rust engineer".to_vec(),
        );
        store.add_object_resume(session.id, "photo.png", "image/png");
        objects.put(&format!("sessions/{}/photo.png", session.id), vec![0x89, b'P']);
        store.add_object_resume(session.id, "missing.pdf", MIME_PDF);
        store.add_text_resume(session.id, "inline.txt", "John Roe, Go developer");

        let agent = Arc::new(ScriptedAgent::always(verdict_json("Jane Doe", 80.0)));
        let deps = deps(store.clone(), objects, agent.clone());

        let results = run_session(&deps, &session).await.unwrap();
        assert_eq!(results.results.len(), 4);

        let errors: Vec<_> = results.results.iter().filter(|e| e.is_error_result).collect();
        assert_eq!(errors.len(), 2);
        assert!(errors[0].error.contains("unsupported file type"), "{}", errors[0].error);
        assert!(errors[1].error.starts_with("file download error"), "{}", errors[1].error);
        assert_eq!(agent.calls(), 2, "agent is called only for readable resumes");
        assert!(store.results_for(session.id).is_some());
    }

    #[tokio::test]
    async fn test_malformed_agent_reply_is_an_entry_not_a_failure() {
        let store = Arc::new(MemoryStore::new());
        let session = store.insert_pending_session();
        store.add_text_resume(session.id, "a.txt", "Alice");
        store.add_text_resume(session.id, "b.txt", "Bob");

        let agent = Arc::new(ScriptedAgent::new(|prompt| {
            if prompt.contains("Alice") {
                Ok("not json".to_string())
            } else {
                Ok(verdict_json("Bob", 65.0))
            }
        }));
        let deps = deps(store.clone(), Arc::new(MemoryObjects::new()), agent);

        let results = run_session(&deps, &session).await.unwrap();
        assert_eq!(results.results.len(), 2);
        assert!(results.results[0].error.starts_with("json unmarshal error: "));
        assert_eq!(results.results[1].candidate_name, "Bob");
        assert_eq!(results.results[1].file_name, "b.txt");
    }

    #[tokio::test(start_paused = true)]
    async fn test_agent_timeout_becomes_entry() {
        let store = Arc::new(MemoryStore::new());
        let session = store.insert_pending_session();
        store.add_text_resume(session.id, "slow.txt", "Slow Sam");

        let agent = Arc::new(
            ScriptedAgent::always(verdict_json("Sam", 50.0)).with_delay(Duration::from_secs(600)),
        );
        let deps = deps(store, Arc::new(MemoryObjects::new()), agent);

        let results = run_session(&deps, &session).await.unwrap();
        assert_eq!(results.results.len(), 1);
        assert!(results.results[0].error.starts_with("agent timeout"));
    }

    #[tokio::test]
    async fn test_persist_failure_fails_the_job() {
        let store = Arc::new(MemoryStore::new());
        let session = store.insert_pending_session();
        store.add_text_resume(session.id, "a.txt", "Alice");
        store.fail_upserts(true);

        let agent = Arc::new(ScriptedAgent::always(verdict_json("Alice", 90.0)));
        let deps = deps(store.clone(), Arc::new(MemoryObjects::new()), agent);

        assert!(run_session(&deps, &session).await.is_err());
        assert!(store.results_for(session.id).is_none());
    }

    #[tokio::test]
    async fn test_progress_is_broadcast_per_resume() {
        let store = Arc::new(MemoryStore::new());
        let session = store.insert_pending_session();
        store.add_text_resume(session.id, "a.txt", "Alice");
        store.add_text_resume(session.id, "b.txt", "Bob");

        let agent = Arc::new(ScriptedAgent::always(verdict_json("X", 10.0)));
        let deps = deps(store, Arc::new(MemoryObjects::new()), agent);
        let mut sub = deps.broadcaster.subscribe(session.id);

        run_session(&deps, &session).await.unwrap();

        for expected in 1..=2 {
            let msg = sub.recv().await.unwrap();
            let update: StatusUpdate = serde_json::from_str(&msg).unwrap();
            assert_eq!(update.status, UpdateStatus::Processing);
            assert_eq!(update.processed, expected);
            assert_eq!(update.total, 2);
        }
    }
}
