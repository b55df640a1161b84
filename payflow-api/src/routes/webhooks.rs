/// Inbound processor webhook endpoint
///
/// `POST /v1/webhooks/stripe` receives signed push events. Authentication is
/// the `Stripe-Signature` HMAC over the raw body; there is no caller
/// identity. Responses are deliberately terse (a status code and a short
/// text body) so nothing internal leaks to the event source.
///
/// # Behavior
///
/// 1. Verify the signature against the configured secret; failure answers
///    400 with no ledger mutation.
/// 2. Dispatch on the event type:
///    - `account.updated`: reverse-look up the ledger row by account id and
///      reconcile the embedded snapshot into it
///    - `account.application.deauthorized`: clear the account id and mark
///      the row disconnected
///    - anything else: acknowledged untouched, so new processor event types
///      never fail delivery
/// 3. Acknowledge with `{"received": true}` whether or not a row matched.
///    Deliveries for unknown accounts are legitimate (e.g. redelivery after
///    local cleanup) and retrying them forever helps no one.
///
/// Deliveries are at-least-once; both mutations are pure functions of the
/// payload, so redelivery converges on the same ledger state. Only a store
/// failure answers 500, which makes the processor redeliver.

use crate::app::AppState;
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use payflow_shared::models::merchant_account::{AccountStatus, MerchantAccount};
use payflow_shared::stripe::types::{Event, EVENT_ACCOUNT_DEAUTHORIZED, EVENT_ACCOUNT_UPDATED};
use payflow_shared::stripe::webhook;
use serde::Serialize;

/// Acknowledgement body for verified deliveries
#[derive(Debug, Serialize)]
pub struct ReceivedResponse {
    /// Always true
    pub received: bool,
}

/// Webhook endpoint handler
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let Some(signature) = headers
        .get(webhook::SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
    else {
        return (StatusCode::BAD_REQUEST, "missing signature header").into_response();
    };

    let event = match webhook::construct_event(
        &body,
        signature,
        &state.config.stripe.webhook_secret,
        state.config.stripe.webhook_tolerance_seconds,
    ) {
        Ok(event) => event,
        Err(e) => {
            tracing::warn!(error = %e, "Rejecting webhook delivery");
            return (StatusCode::BAD_REQUEST, format!("Webhook error: {}", e)).into_response();
        }
    };

    match apply_event(&state, &event).await {
        Ok(()) => (StatusCode::OK, Json(ReceivedResponse { received: true })).into_response(),
        Err(e) => {
            tracing::error!(event = %event.id, error = %e, "Failed to apply webhook event");
            (StatusCode::INTERNAL_SERVER_ERROR, "internal error").into_response()
        }
    }
}

/// Applies a verified event to the ledger
///
/// A missing ledger row is not an error; the delivery is still acknowledged.
async fn apply_event(state: &AppState, event: &Event) -> Result<(), sqlx::Error> {
    match event.kind.as_str() {
        EVENT_ACCOUNT_UPDATED => {
            let Ok(account) = event.account() else {
                tracing::warn!(event = %event.id, "account.updated without an account object");
                return Ok(());
            };

            let status = AccountStatus::from_snapshot(&account.snapshot());

            match MerchantAccount::set_status_by_stripe_account(&state.db, &account.id, status)
                .await?
            {
                Some(record) => tracing::info!(
                    user_id = %record.user_id,
                    account = %account.id,
                    status = status.as_str(),
                    "Reconciled account status from event"
                ),
                None => tracing::warn!(
                    account = %account.id,
                    "account.updated for an account with no ledger record"
                ),
            }
        }
        EVENT_ACCOUNT_DEAUTHORIZED => {
            let Some(account_id) = event.object_id() else {
                tracing::warn!(event = %event.id, "deauthorization event without an object id");
                return Ok(());
            };

            match MerchantAccount::disconnect_by_stripe_account(&state.db, account_id).await? {
                Some(record) => tracing::info!(
                    user_id = %record.user_id,
                    account = %account_id,
                    "Merchant account disconnected"
                ),
                None => tracing::warn!(
                    account = %account_id,
                    "Deauthorization for an account with no ledger record"
                ),
            }
        }
        other => {
            tracing::debug!(event = %event.id, kind = %other, "Ignoring unhandled event type");
        }
    }

    Ok(())
}
