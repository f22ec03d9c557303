//! Operator routes.

use secrecy::ExposeSecret;
use sha2::{Digest, Sha256};

use super::common::*;

// Digest-then-compare keeps the check constant time in the token bytes.
fn token_matches(provided: &str, expected: &str) -> bool {
    Sha256::digest(provided.as_bytes()) == Sha256::digest(expected.as_bytes())
}

#[derive(Debug, Serialize)]
struct SweepResponse {
    ok: bool,
    processed: u64,
    downgrades: u64,
}

/// POST /api/ops/sweep
/// Runs one full sweep pass on demand. The same pass also runs on the
/// background interval; both are idempotent.
async fn trigger_sweep(
    State(app_state): State<AppState>,
    headers: HeaderMap,
) -> AppResult<impl IntoResponse> {
    let token = bearer_token(&headers).ok_or(AppError::Unauthorized)?;
    if !token_matches(token, app_state.config.operator_token.expose_secret()) {
        return Err(AppError::Unauthorized);
    }

    let report = app_state.sweep_use_cases.run().await?;
    Ok(Json(SweepResponse {
        ok: true,
        processed: report.processed,
        downgrades: report.downgrades,
    }))
}

pub(crate) fn router() -> Router<AppState> {
    Router::new().route("/sweep", post(trigger_sweep))
}
