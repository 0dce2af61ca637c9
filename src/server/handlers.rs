//! Request handlers.

use super::request::{parse_check_request, RequestError};
use super::AppState;
use crate::proxy::VerificationResult;
use axum::body::Bytes;
use axum::extract::State;
use axum::Json;
use tracing::{info, warn};

/// `POST /api/check-proxy`: validate the payload, then run one verification.
///
/// A proxy that fails the check is still a 200 with `working: false`.
pub async fn check_proxy_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<VerificationResult>, RequestError> {
    let target = parse_check_request(&body).inspect_err(|e| {
        warn!(error = %e, "rejected check request");
    })?;

    info!(proxy = %target, "testing proxy");
    let result = state.checker.verify(&target).await;
    info!(
        proxy = %target,
        working = result.working,
        response_time_ms = result.response_time_millis,
        "proxy test finished"
    );

    Ok(Json(result))
}
