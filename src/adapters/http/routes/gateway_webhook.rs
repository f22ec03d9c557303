//! Card-gateway webhook ingestion.
//!
//! The gateway treats any non-2xx as a delivery failure and retries with
//! backoff, so every classified outcome is acknowledged with 200. Replays are
//! harmless: the ledger guard makes reprocessing a no-op.

use secrecy::ExposeSecret;

use super::common::*;
use crate::application::normalizer;
use crate::application::use_cases::reconcile::ReconcileOutcome;
use crate::infra::webhook_verifier;

pub const SIGNATURE_HEADER: &str = "x-gateway-signature";

#[derive(Debug, Serialize)]
struct WebhookAck {
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
    #[serde(rename = "alreadyProcessed", skip_serializing_if = "Option::is_none")]
    already_processed: Option<bool>,
}

impl WebhookAck {
    fn accepted() -> Self {
        Self {
            ok: true,
            reason: None,
            already_processed: None,
        }
    }

    fn replay() -> Self {
        Self {
            ok: true,
            reason: None,
            already_processed: Some(true),
        }
    }

    fn ignored(reason: impl Into<String>) -> Self {
        Self {
            ok: true,
            reason: Some(reason.into()),
            already_processed: None,
        }
    }

    fn rejected(reason: impl Into<String>) -> Self {
        Self {
            ok: false,
            reason: Some(reason.into()),
            already_processed: None,
        }
    }
}

/// POST /api/webhooks/gateway
/// Verifies the HMAC signature over the raw body, classifies the event and
/// runs it through reconciliation.
async fn handle_gateway_webhook(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> impl IntoResponse {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let secret = app_state.config.gateway_webhook_secret.expose_secret();
    if !webhook_verifier::verify_signature(secret, body.as_bytes(), signature) {
        warn!("Rejected gateway webhook with bad signature");
        return Json(WebhookAck::rejected("bad-signature"));
    }

    let payload: serde_json::Value = match serde_json::from_str(&body) {
        Ok(value) => value,
        Err(_) => {
            warn!("Rejected unparseable gateway webhook payload");
            return Json(WebhookAck::rejected("malformed-payload"));
        }
    };

    let normalized = normalizer::normalize_gateway(&payload);
    match app_state.reconcile_use_cases.reconcile(normalized).await {
        Ok(ReconcileOutcome::Applied(_)) => Json(WebhookAck::accepted()),
        Ok(ReconcileOutcome::AlreadyProcessed) => Json(WebhookAck::replay()),
        Ok(ReconcileOutcome::Ignored { event_type }) => {
            Json(WebhookAck::ignored(format!("ignored:{event_type}")))
        }
        Ok(ReconcileOutcome::Dropped { reason }) => Json(WebhookAck::rejected(reason)),
        Ok(ReconcileOutcome::Unresolved) => Json(WebhookAck::rejected("no-identity")),
        // Transient failure: still 200, the provider's retry plus the ledger
        // guard is the recovery path.
        Err(e) => {
            error!(error = ?e, "Gateway webhook processing failed");
            Json(WebhookAck::rejected("internal"))
        }
    }
}

pub(crate) fn router() -> Router<AppState> {
    Router::new().route("/gateway", post(handle_gateway_webhook))
}
