//! Client-initiated billing routes: gateway charge confirmation and app-store
//! subscription verification.
//!
//! Unlike the webhook path these are request/response: the caller is the
//! account holder's client, so transient failures surface as real error codes
//! instead of being swallowed into an acknowledgement.

use super::common::*;
use crate::application::normalizer::{self, Normalized, extension_days_from};
use crate::application::ports::payment_gateway::VerifyOutcome;
use crate::application::use_cases::reconcile::ReconcileOutcome;
use crate::domain::entities::payment_event::{PaymentEvent, Provider};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfirmPaymentPayload {
    account_id: String,
    reference: String,
    days: Option<i64>,
    months: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VerifySubscriptionPayload {
    account_id: String,
    package_name: String,
    product_id: String,
    purchase_token: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EntitlementResponse {
    ok: bool,
    already_processed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    plan: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    expires_at: Option<i64>,
}

impl EntitlementResponse {
    fn applied(plan: &str, expires_at: Option<i64>) -> Self {
        Self {
            ok: true,
            already_processed: false,
            plan: Some(plan.to_string()),
            expires_at,
        }
    }

    fn replay() -> Self {
        Self {
            ok: true,
            already_processed: true,
            plan: None,
            expires_at: None,
        }
    }
}

/// POST /api/billing/confirm
/// Synchronously verifies a gateway charge by reference and applies it.
async fn confirm_payment(
    State(app_state): State<AppState>,
    Json(payload): Json<ConfirmPaymentPayload>,
) -> AppResult<impl IntoResponse> {
    if payload.account_id.trim().is_empty() {
        return Err(AppError::InvalidInput("accountId is required".into()));
    }
    if payload.reference.trim().is_empty() {
        return Err(AppError::InvalidInput("reference is required".into()));
    }

    let mut event = PaymentEvent::new(
        Provider::Gateway,
        "charge.confirm",
        payload.reference.clone(),
    );
    event.account_id = Some(payload.account_id.clone());
    event.requested_extension_days = Some(extension_days_from(payload.days, payload.months));

    match app_state.payment_gateway.verify(&payload.reference).await? {
        VerifyOutcome::Success {
            amount_minor,
            currency,
            raw_status,
        } => {
            event.amount_minor = amount_minor;
            event.currency = currency;
            event.raw_status = Some(raw_status);
        }
        VerifyOutcome::Failed { raw_status } => {
            warn!(
                reference = %payload.reference,
                raw_status = %raw_status,
                "Gateway reported non-success for confirmed charge"
            );
            return Err(AppError::PaymentNotVerified(format!(
                "gateway reported '{raw_status}' for this reference"
            )));
        }
    }

    to_entitlement_response(
        app_state
            .reconcile_use_cases
            .reconcile(Normalized::Success(event))
            .await?,
    )
}

/// POST /api/billing/subscription/verify
/// Checks a purchase token against the billing service and applies the result.
async fn verify_subscription(
    State(app_state): State<AppState>,
    Json(payload): Json<VerifySubscriptionPayload>,
) -> AppResult<impl IntoResponse> {
    if payload.account_id.trim().is_empty() {
        return Err(AppError::InvalidInput("accountId is required".into()));
    }
    if payload.purchase_token.trim().is_empty() {
        return Err(AppError::InvalidInput("purchaseToken is required".into()));
    }

    let info = app_state
        .billing_service
        .get_subscription(
            &payload.package_name,
            &payload.product_id,
            &payload.purchase_token,
        )
        .await?;

    let normalized =
        normalizer::normalize_subscription(&payload.account_id, &payload.purchase_token, &info);

    let outcome = app_state.reconcile_use_cases.reconcile(normalized).await?;

    if let ReconcileOutcome::Applied(_) = &outcome {
        // Best-effort: the entitlement is already committed, an acknowledge
        // failure must not fail the request or undo the mutation.
        let billing = app_state.billing_service.clone();
        let package_name = payload.package_name.clone();
        let product_id = payload.product_id.clone();
        let purchase_token = payload.purchase_token.clone();
        tokio::spawn(async move {
            if let Err(e) = billing
                .acknowledge(&package_name, &product_id, &purchase_token)
                .await
            {
                error!(error = ?e, "Failed to acknowledge subscription purchase");
            }
        });
    }

    match outcome {
        ReconcileOutcome::Ignored { event_type } => Err(AppError::PaymentNotVerified(format!(
            "subscription is not active ({event_type})"
        ))),
        other => to_entitlement_response(other),
    }
}

fn to_entitlement_response(outcome: ReconcileOutcome) -> AppResult<Json<EntitlementResponse>> {
    match outcome {
        ReconcileOutcome::Applied(entitlement) => Ok(Json(EntitlementResponse::applied(
            entitlement.plan.as_str(),
            entitlement.effective_expires_at(),
        ))),
        ReconcileOutcome::AlreadyProcessed => Ok(Json(EntitlementResponse::replay())),
        ReconcileOutcome::Ignored { event_type } => Err(AppError::PaymentNotVerified(format!(
            "event '{event_type}' does not grant an entitlement"
        ))),
        ReconcileOutcome::Dropped { reason } => Err(AppError::InvalidInput(format!(
            "payment could not be classified ({reason})"
        ))),
        // Both routes set the account id up front, so resolution cannot fail.
        ReconcileOutcome::Unresolved => Err(AppError::Internal(
            "account resolution failed for an authenticated request".into(),
        )),
    }
}

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/confirm", post(confirm_payment))
        .route("/subscription/verify", post(verify_subscription))
}
