use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use tracing::debug;

use super::QuotaDecision;
use crate::auth::Caller;
use crate::errors::AppError;
use crate::state::AppState;

/// Consumes one unit of the caller's allowance before the wrapped handler
/// runs. Privileged callers pass straight through.
pub async fn enforce(
    State(state): State<AppState>,
    caller: Caller,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if caller.has_role(&state.quota.privileged_role) {
        return Ok(next.run(request).await);
    }

    match state
        .usage
        .consume(caller.user_id, &state.quota, Utc::now())
        .await?
    {
        QuotaDecision::Allowed { count } => {
            debug!(user_id = %caller.user_id, count, "quota admitted");
            Ok(next.run(request).await)
        }
        QuotaDecision::Exceeded { remaining } => {
            debug!(user_id = %caller.user_id, remaining_secs = remaining.as_secs(), "quota exceeded");
            Err(AppError::QuotaExceeded {
                remaining_seconds: remaining.as_secs() as i64,
            })
        }
    }
}
