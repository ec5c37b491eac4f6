use tracing::{error, info};
use uuid::Uuid;

use crate::auth::Caller;
use crate::errors::AppError;
use crate::models::session::{Session, SessionStatus};
use crate::queue::{publish_session, JobQueue};
use crate::store::SessionStore;

/// Validates that the caller's session can be analyzed, marks it `pending`
/// and publishes it. If publishing fails the session is left `pending`;
/// the error is returned to the caller and nothing is rolled back.
pub async fn trigger_analysis(
    store: &dyn SessionStore,
    queue: &dyn JobQueue,
    caller: &Caller,
    session_id: Uuid,
) -> Result<Session, AppError> {
    let mut session = store
        .get_session(session_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("session {session_id} not found")))?;

    if session.user_id != caller.user_id {
        return Err(AppError::Forbidden);
    }

    if session.status != SessionStatus::Created {
        return Err(AppError::Conflict(format!(
            "session is already {}",
            session.status
        )));
    }

    if store.list_resumes(session_id).await?.is_empty() {
        return Err(AppError::UnprocessableEntity(
            "upload at least one resume before starting the analysis".to_string(),
        ));
    }

    if !store.advance_status(session_id, SessionStatus::Pending).await? {
        return Err(AppError::Conflict("session was triggered concurrently".to_string()));
    }
    session.status = SessionStatus::Pending;

    if let Err(e) = publish_session(queue, &session).await {
        error!(%session_id, "publish failed, session left pending: {e}");
        return Err(AppError::Queue(e));
    }

    info!(%session_id, user_id = %caller.user_id, "analysis queued");
    Ok(session)
}
