//! In-memory fakes for the storage, queue, blob and agent seams.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use tokio::sync::Notify;
use uuid::Uuid;

use crate::llm_client::{Agent, LlmError};
use crate::models::analysis::{AnalysisEntry, AnalysisResultSet};
use crate::models::resume::ResumeRow;
use crate::models::session::{Session, SessionStatus};
use crate::models::usage::UsageRecord;
use crate::queue::{Delivery, JobQueue, QueueConsumer, QueueError};
use crate::quota::{self, QuotaDecision, QuotaPolicy};
use crate::storage::{FetchError, ObjectStore};
use crate::store::{SessionStore, UsageStore};

// ─────────────────────────────────────────────────────────────────────────────
// Store
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MemoryStore {
    sessions: Mutex<HashMap<Uuid, Session>>,
    resumes: Mutex<Vec<ResumeRow>>,
    results: Mutex<HashMap<Uuid, AnalysisResultSet>>,
    usage: Mutex<HashMap<Uuid, UsageRecord>>,
    history: Mutex<Vec<(Uuid, SessionStatus)>>,
    fail_upserts: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_session(&self, user_id: Uuid, status: SessionStatus) -> Session {
        let session = Session {
            id: Uuid::new_v4(),
            user_id,
            name: "Backend hiring".to_string(),
            job_title: "Rust Engineer".to_string(),
            job_description: "Async services, Postgres, Redis".to_string(),
            status,
            created_at: Utc::now(),
        };
        self.sessions
            .lock()
            .unwrap()
            .insert(session.id, session.clone());
        self.history.lock().unwrap().push((session.id, status));
        session
    }

    pub fn insert_pending_session(&self) -> Session {
        self.insert_session(Uuid::new_v4(), SessionStatus::Pending)
    }

    fn add_resume(
        &self,
        session_id: Uuid,
        file_name: &str,
        mime_type: &str,
        text: Option<&str>,
    ) -> ResumeRow {
        let mut resumes = self.resumes.lock().unwrap();
        // strictly increasing creation times keep insertion order
        let created_at = Utc::now() + chrono::Duration::seconds(resumes.len() as i64);
        let resume = ResumeRow {
            id: Uuid::new_v4(),
            session_id,
            file_name: file_name.to_string(),
            object_key: None,
            text_content: text.map(String::from),
            mime_type: mime_type.to_string(),
            upload_status: "uploaded".to_string(),
            created_at,
        };
        resumes.push(resume.clone());
        resume
    }

    pub fn add_text_resume(&self, session_id: Uuid, file_name: &str, text: &str) -> ResumeRow {
        self.add_resume(session_id, file_name, crate::extract::MIME_TEXT, Some(text))
    }

    pub fn add_object_resume(&self, session_id: Uuid, file_name: &str, mime_type: &str) -> ResumeRow {
        self.add_resume(session_id, file_name, mime_type, None)
    }

    pub fn status_of(&self, id: Uuid) -> Option<SessionStatus> {
        self.sessions.lock().unwrap().get(&id).map(|s| s.status)
    }

    /// Every status the session has been observed in, oldest first.
    pub fn status_history(&self, id: Uuid) -> Vec<SessionStatus> {
        self.history
            .lock()
            .unwrap()
            .iter()
            .filter(|(sid, _)| *sid == id)
            .map(|(_, s)| *s)
            .collect()
    }

    pub fn results_for(&self, session_id: Uuid) -> Option<AnalysisResultSet> {
        self.results.lock().unwrap().get(&session_id).cloned()
    }

    pub fn usage_of(&self, user_id: Uuid) -> Option<UsageRecord> {
        self.usage.lock().unwrap().get(&user_id).cloned()
    }

    pub fn fail_upserts(&self, fail: bool) {
        self.fail_upserts.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn get_session(&self, id: Uuid) -> Result<Option<Session>> {
        Ok(self.sessions.lock().unwrap().get(&id).cloned())
    }

    async fn list_resumes(&self, session_id: Uuid) -> Result<Vec<ResumeRow>> {
        let mut rows: Vec<ResumeRow> = self
            .resumes
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.session_id == session_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| (a.created_at, a.id).cmp(&(b.created_at, b.id)));
        Ok(rows)
    }

    async fn advance_status(&self, id: Uuid, status: SessionStatus) -> Result<bool> {
        let mut sessions = self.sessions.lock().unwrap();
        let Some(session) = sessions.get_mut(&id) else {
            return Ok(false);
        };
        if session.status >= status {
            return Ok(false);
        }
        session.status = status;
        self.history.lock().unwrap().push((id, status));
        Ok(true)
    }

    async fn upsert_results(
        &self,
        session_id: Uuid,
        entries: &[AnalysisEntry],
    ) -> Result<AnalysisResultSet> {
        if self.fail_upserts.load(Ordering::SeqCst) {
            bail!("connection reset while writing results");
        }
        let now = Utc::now();
        let mut results = self.results.lock().unwrap();
        let set = results
            .entry(session_id)
            .and_modify(|set| {
                set.results = entries.to_vec();
                set.updated_at = now;
            })
            .or_insert_with(|| AnalysisResultSet {
                id: Uuid::new_v4(),
                session_id,
                results: entries.to_vec(),
                created_at: now,
                updated_at: now,
            });
        Ok(set.clone())
    }

    async fn get_results(&self, session_id: Uuid) -> Result<Option<AnalysisResultSet>> {
        Ok(self.results_for(session_id))
    }
}

#[async_trait]
impl UsageStore for MemoryStore {
    async fn consume(
        &self,
        user_id: Uuid,
        policy: &QuotaPolicy,
        now: DateTime<Utc>,
    ) -> Result<QuotaDecision> {
        let mut usage = self.usage.lock().unwrap();
        let (record, decision) = quota::apply(usage.get(&user_id).cloned(), user_id, policy, now);
        if let Some(record) = record {
            usage.insert(user_id, record);
        }
        Ok(decision)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Queue
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
struct QueueInner {
    ready: Mutex<VecDeque<String>>,
    in_flight: Mutex<Vec<String>>,
    notify: Notify,
    fail_publish: AtomicBool,
}

#[derive(Clone, Default)]
pub struct MemoryQueue {
    inner: Arc<QueueInner>,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_publish(&self, fail: bool) {
        self.inner.fail_publish.store(fail, Ordering::SeqCst);
    }

    pub fn ready_len(&self) -> usize {
        self.inner.ready.lock().unwrap().len()
    }

    pub fn in_flight_len(&self) -> usize {
        self.inner.in_flight.lock().unwrap().len()
    }

    pub fn ready_payloads(&self) -> Vec<String> {
        self.inner.ready.lock().unwrap().iter().cloned().collect()
    }
}

#[async_trait]
impl JobQueue for MemoryQueue {
    async fn publish(&self, payload: String) -> Result<(), QueueError> {
        if self.inner.fail_publish.load(Ordering::SeqCst) {
            let refused = redis::RedisError::from((redis::ErrorKind::IoError, "broker unavailable"));
            return Err(QueueError::Redis(refused));
        }
        self.inner.ready.lock().unwrap().push_back(payload);
        self.inner.notify.notify_one();
        Ok(())
    }

    async fn consumer(&self) -> Result<Box<dyn QueueConsumer>, QueueError> {
        Ok(Box::new(MemoryConsumer {
            inner: Arc::clone(&self.inner),
        }))
    }

    async fn recover_unacked(&self) -> Result<usize, QueueError> {
        let mut in_flight = self.inner.in_flight.lock().unwrap();
        let mut ready = self.inner.ready.lock().unwrap();
        let moved = in_flight.len();
        // newest first, so the oldest ends up at the front
        for payload in in_flight.drain(..).rev() {
            ready.push_front(payload);
        }
        Ok(moved)
    }
}

struct MemoryConsumer {
    inner: Arc<QueueInner>,
}

#[async_trait]
impl QueueConsumer for MemoryConsumer {
    async fn receive(&mut self) -> Result<Option<Delivery>, QueueError> {
        let next = self.inner.ready.lock().unwrap().pop_front();
        let payload = match next {
            Some(p) => p,
            None => {
                let _ = tokio::time::timeout(Duration::from_millis(20), self.inner.notify.notified())
                    .await;
                match self.inner.ready.lock().unwrap().pop_front() {
                    Some(p) => p,
                    None => return Ok(None),
                }
            }
        };
        self.inner.in_flight.lock().unwrap().push(payload.clone());
        Ok(Some(Delivery { payload }))
    }

    async fn ack(&mut self, delivery: &Delivery) -> Result<(), QueueError> {
        let mut in_flight = self.inner.in_flight.lock().unwrap();
        if let Some(pos) = in_flight.iter().position(|p| *p == delivery.payload) {
            in_flight.remove(pos);
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Blob store
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MemoryObjects {
    objects: Mutex<HashMap<String, Bytes>>,
}

impl MemoryObjects {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, key: &str, data: Vec<u8>) {
        self.objects
            .lock()
            .unwrap()
            .insert(key.to_string(), Bytes::from(data));
    }
}

#[async_trait]
impl ObjectStore for MemoryObjects {
    async fn fetch(&self, _bucket: &str, key: &str) -> Result<Bytes, FetchError> {
        self.objects
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or_else(|| FetchError::Get {
                key: key.to_string(),
                message: "NoSuchKey".to_string(),
            })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Agent
// ─────────────────────────────────────────────────────────────────────────────

type Responder = Box<dyn Fn(&str) -> Result<String, LlmError> + Send + Sync>;

pub struct ScriptedAgent {
    respond: Responder,
    delay: Duration,
    calls: AtomicUsize,
}

impl ScriptedAgent {
    pub fn new<F>(respond: F) -> Self
    where
        F: Fn(&str) -> Result<String, LlmError> + Send + Sync + 'static,
    {
        Self {
            respond: Box::new(respond),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn always(reply: String) -> Self {
        Self::new(move |_| Ok(reply.clone()))
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Agent for ScriptedAgent {
    async fn analyze(&self, prompt: &str) -> Result<String, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        (self.respond)(prompt)
    }
}

pub fn verdict_json(name: &str, score: f64) -> String {
    serde_json::json!({
        "candidate_name": name,
        "candidate_email": null,
        "match_score": score,
        "relevant_skills": ["rust", "postgres"],
        "missing_skills": ["kubernetes"],
        "summary": format!("{name} has relevant backend experience"),
        "recommendation": "Proceed to technical interview"
    })
    .to_string()
}
