//! Worker Pool: N long-lived consumers that turn queued sessions into
//! persisted analysis results.
//!
//! Each worker owns a queue consumer and loops until the shared
//! cancellation token fires. A job failure is logged and broadcast; the
//! session stays `pending`.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::analysis::{run_session, PipelineDeps};
use crate::broadcast::{StatusUpdate, UpdateStatus};
use crate::models::session::{Session, SessionStatus};
use crate::queue::{AckMode, Delivery, JobQueue, QueueConsumer, QueueError};

/// Pause after a failed receive before polling again.
const RECEIVE_ERROR_BACKOFF: Duration = Duration::from_secs(1);

pub struct WorkerPool {
    token: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Opens one consumer per worker and spawns the workers. Messages left
    /// unacknowledged by a previous run are put back on the queue first.
    ///
    /// Recovery runs in both ack modes: cancelling a worker drops its
    /// pending receive, and a message the broker already moved in flight
    /// is only returned here.
    pub async fn start(
        count: usize,
        queue: Arc<dyn JobQueue>,
        deps: PipelineDeps,
        ack_mode: AckMode,
        token: CancellationToken,
    ) -> Result<Self, QueueError> {
        let recovered = queue.recover_unacked().await?;
        if recovered > 0 {
            warn!(recovered, "requeued unacknowledged jobs from a previous run");
        }

        let mut handles = Vec::with_capacity(count);
        for worker in 0..count {
            let consumer = queue.consumer().await?;
            handles.push(tokio::spawn(run_worker(
                worker,
                consumer,
                deps.clone(),
                ack_mode,
                token.clone(),
            )));
        }

        info!(workers = count, %ack_mode, "worker pool started");
        Ok(Self { token, handles })
    }

    /// Signals every worker to stop and waits for them. A job already in
    /// progress runs to completion first.
    pub async fn shutdown(self) {
        self.token.cancel();
        for handle in self.handles {
            if let Err(e) = handle.await {
                error!("worker task ended abnormally: {e}");
            }
        }
        info!("worker pool stopped");
    }
}

async fn run_worker(
    worker: usize,
    mut consumer: Box<dyn QueueConsumer>,
    deps: PipelineDeps,
    ack_mode: AckMode,
    token: CancellationToken,
) {
    debug!(worker, "worker started");

    loop {
        let received = tokio::select! {
            _ = token.cancelled() => break,
            received = consumer.receive() => received,
        };

        let delivery = match received {
            Ok(Some(delivery)) => delivery,
            Ok(None) => continue,
            Err(e) => {
                error!(worker, "queue receive failed: {e}");
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = tokio::time::sleep(RECEIVE_ERROR_BACKOFF) => continue,
                }
            }
        };

        if ack_mode == AckMode::OnReceipt {
            ack(worker, consumer.as_mut(), &delivery).await;
        }

        let session: Session = match serde_json::from_str(&delivery.payload) {
            Ok(session) => session,
            Err(e) => {
                error!(worker, "dropping malformed job payload: {e}");
                if ack_mode == AckMode::AfterCommit {
                    ack(worker, consumer.as_mut(), &delivery).await;
                }
                continue;
            }
        };

        info!(worker, session_id = %session.id, "analysis job received");
        if run_job(worker, &deps, session).await && ack_mode == AckMode::AfterCommit {
            ack(worker, consumer.as_mut(), &delivery).await;
        }
    }

    debug!(worker, "worker stopped");
}

async fn ack(worker: usize, consumer: &mut dyn QueueConsumer, delivery: &Delivery) {
    if let Err(e) = consumer.ack(delivery).await {
        error!(worker, "failed to acknowledge job: {e}");
    }
}

/// Runs one job on its own task so a panic is contained to that job.
/// Returns whether the session was completed.
async fn run_job(worker: usize, deps: &PipelineDeps, session: Session) -> bool {
    let session_id = session.id;
    let job_deps = deps.clone();
    let outcome = tokio::spawn(async move { process_job(&job_deps, &session).await }).await;

    let failure = match outcome {
        Ok(Ok(())) => {
            info!(worker, %session_id, "analysis job completed");
            return true;
        }
        Ok(Err(e)) => format!("{e:#}"),
        Err(join_error) if join_error.is_panic() => "analysis job panicked".to_string(),
        Err(join_error) => join_error.to_string(),
    };

    error!(worker, %session_id, "analysis job failed: {failure}");
    let update = StatusUpdate {
        session_id,
        status: UpdateStatus::Failed,
        processed: 0,
        total: 0,
        message: "analysis failed".to_string(),
    };
    deps.broadcaster.broadcast(session_id, &update.to_json());
    false
}

/// Analyze, persist, then mark completed and notify subscribers.
pub async fn process_job(deps: &PipelineDeps, session: &Session) -> Result<()> {
    let results = run_session(deps, session).await?;

    if !deps
        .store
        .advance_status(session.id, SessionStatus::Completed)
        .await?
    {
        debug!(session_id = %session.id, "session was already completed");
    }

    let total = results.results.len();
    let update = StatusUpdate {
        session_id: session.id,
        status: UpdateStatus::Completed,
        processed: total,
        total,
        message: "analysis completed".to_string(),
    };
    deps.broadcaster.broadcast(session.id, &update.to_json());
    Ok(())
}
