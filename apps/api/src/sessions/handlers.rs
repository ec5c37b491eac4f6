use std::convert::Infallible;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio_stream::{wrappers::ReceiverStream, Stream};
use tracing::debug;
use uuid::Uuid;

use super::trigger::trigger_analysis;
use crate::auth::Caller;
use crate::broadcast::{is_terminal_message, StatusUpdate, SUBSCRIBER_BUFFER};
use crate::errors::AppError;
use crate::models::analysis::AnalysisResultSet;
use crate::models::session::{Session, SessionStatus};
use crate::state::AppState;

async fn owned_session(state: &AppState, caller: &Caller, id: Uuid) -> Result<Session, AppError> {
    let session = state
        .store
        .get_session(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("session {id} not found")))?;
    if session.user_id != caller.user_id {
        return Err(AppError::Forbidden);
    }
    Ok(session)
}

/// POST /api/v1/sessions/:id/analyze
/// Queues the session for analysis. Answers 202 before any work is done.
pub async fn handle_analyze(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let session = trigger_analysis(state.store.as_ref(), state.queue.as_ref(), &caller, id).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(json!({
            "session_id": session.id,
            "status": "queued"
        })),
    ))
}

/// GET /api/v1/sessions/:id/updates
/// Server-sent events: a status snapshot first, then live broadcasts until a
/// terminal update or client disconnect.
pub async fn handle_updates(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    // Subscribe before reading the status: a completion that lands before
    // the read shows in the snapshot, one after it arrives as a broadcast.
    let mut subscription = state.broadcaster.subscribe(id);
    let session = owned_session(&state, &caller, id).await?;

    let total = state.store.list_resumes(id).await?.len();
    let snapshot = StatusUpdate {
        session_id: id,
        status: session.status.into(),
        processed: if session.status == SessionStatus::Completed { total } else { 0 },
        total,
        message: format!("session is {}", session.status),
    };

    debug!(
        session_id = %id,
        subscribers = state.broadcaster.subscriber_count(id),
        "update stream opened"
    );

    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(SUBSCRIBER_BUFFER);
    tokio::spawn(async move {
        if tx.send(Ok(Event::default().data(snapshot.to_json()))).await.is_err()
            || snapshot.is_terminal()
        {
            return;
        }
        loop {
            tokio::select! {
                _ = tx.closed() => break,
                message = subscription.recv() => {
                    let Some(message) = message else { break };
                    let terminal = is_terminal_message(&message);
                    if tx.send(Ok(Event::default().data(message))).await.is_err() || terminal {
                        break;
                    }
                }
            }
        }
        debug!(session_id = %id, "update stream closed");
    });

    Ok(Sse::new(ReceiverStream::new(rx)).keep_alive(
        KeepAlive::new()
            .interval(state.sse_keep_alive)
            .text("keep-alive"),
    ))
}

/// GET /api/v1/sessions/:id/results
pub async fn handle_results(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> Result<Json<AnalysisResultSet>, AppError> {
    owned_session(&state, &caller, id).await?;
    let results = state
        .store
        .get_results(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("no analysis results for session {id}")))?;
    Ok(Json(results))
}
