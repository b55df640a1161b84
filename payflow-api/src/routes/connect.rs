/// Merchant onboarding endpoints
///
/// The two request/response halves of the reconciliation protocol:
///
/// - `POST /v1/connect/account` provisions a Stripe Connect account for the
///   authenticated user (or reuses the existing one) and returns a fresh
///   onboarding link.
/// - `GET /v1/connect/account` polls the processor for the live account
///   status, reconciles it into the ledger, and returns it.
///
/// The third half, asynchronous processor events, lives in
/// [`crate::routes::webhooks`]; both paths converge on
/// `AccountStatus::from_snapshot`.
///
/// # Concurrency
///
/// Two concurrent provisioning calls for the same user must not create two
/// processor accounts. The check-then-create sequence runs inside a
/// transaction holding a per-user advisory lock, so exactly one call
/// proceeds past the check; the loser re-reads the winner's account id and
/// just issues a link for it.

use crate::app::AppState;
use crate::error::{ApiError, ApiResult};
use axum::{extract::State, Extension, Json};
use payflow_shared::auth::middleware::AuthContext;
use payflow_shared::models::merchant_account::{AccountStatus, MerchantAccount};
use payflow_shared::stripe::types::AccountLink;
use serde::Serialize;

/// Response for account provisioning
#[derive(Debug, Clone, Serialize)]
pub struct CreateAccountResponse {
    /// Short-lived onboarding URL to send the user to
    pub onboarding_url: String,
}

/// Response for a status poll
#[derive(Debug, Clone, Serialize)]
pub struct AccountStatusResponse {
    /// Connected account id, or null if none was provisioned
    pub account_id: Option<String>,

    /// Reconciled onboarding status
    pub status: AccountStatus,
}

/// Provision endpoint handler
///
/// "Already provisioned" is success: the handler then only mints a new
/// onboarding link. Otherwise it creates the account and the link at the
/// processor before recording the account id in the ledger, so a processor
/// failure leaves no ledger write behind.
///
/// # Errors
///
/// - 401 Unauthorized: missing or invalid authentication
/// - 502 Bad Gateway: processor account or link creation failed (retryable)
/// - 500 Internal Server Error: ledger store failure
pub async fn create_account(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<CreateAccountResponse>> {
    tracing::debug!(user_id = %auth.user_id, "Provisioning merchant account");

    // Fast path: an account already exists, no lock needed.
    if let Some(account_id) = MerchantAccount::find_by_user(&state.db, auth.user_id)
        .await?
        .and_then(|record| record.stripe_account_id)
    {
        let link = issue_onboarding_link(&state, &account_id).await?;
        return Ok(Json(CreateAccountResponse {
            onboarding_url: link.url,
        }));
    }

    let mut tx = state.db.begin().await?;
    MerchantAccount::acquire_provisioning_lock(&mut *tx, auth.user_id).await?;

    // Re-check under the lock: a concurrent call may have provisioned while
    // we waited for it.
    if let Some(account_id) = MerchantAccount::find_by_user(&mut *tx, auth.user_id)
        .await?
        .and_then(|record| record.stripe_account_id)
    {
        tx.commit().await?;
        let link = issue_onboarding_link(&state, &account_id).await?;
        return Ok(Json(CreateAccountResponse {
            onboarding_url: link.url,
        }));
    }

    let account = state.stripe.create_account(&auth.email).await?;

    let link = match issue_onboarding_link(&state, &account.id).await {
        Ok(link) => link,
        Err(e) => {
            // The account exists upstream but has no local reference yet.
            // Keep its id in the log so it can be reconciled out-of-band.
            tracing::warn!(
                user_id = %auth.user_id,
                account = %account.id,
                "Link issuance failed after account creation; account is orphaned"
            );
            return Err(e);
        }
    };

    let record = MerchantAccount::attach_stripe_account(&mut *tx, auth.user_id, &account.id).await?;
    if record.is_none() {
        tracing::warn!(
            user_id = %auth.user_id,
            account = %account.id,
            "Ledger already holds an account for this user; new account is orphaned"
        );
        return Err(ApiError::Conflict(
            "Merchant account already provisioned".to_string(),
        ));
    }
    tx.commit().await?;

    tracing::info!(
        user_id = %auth.user_id,
        account = %account.id,
        "Merchant account provisioned"
    );

    Ok(Json(CreateAccountResponse {
        onboarding_url: link.url,
    }))
}

/// Status poll endpoint handler
///
/// A read with a side effect: every poll re-synchronizes the ledger, so its
/// status is never staler than the most recent poll or push event. With no
/// provisioned account the handler answers `{account_id: null, status:
/// "none"}` without contacting the processor.
///
/// # Errors
///
/// - 401 Unauthorized: missing or invalid authentication
/// - 502 Bad Gateway: processor status query failed
/// - 500 Internal Server Error: ledger store failure
pub async fn account_status(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<AccountStatusResponse>> {
    let record = MerchantAccount::find_by_user(&state.db, auth.user_id).await?;

    let Some(account_id) = record.and_then(|r| r.stripe_account_id) else {
        return Ok(Json(AccountStatusResponse {
            account_id: None,
            status: AccountStatus::None,
        }));
    };

    let account = state.stripe.retrieve_account(&account_id).await?;
    let status = AccountStatus::from_snapshot(&account.snapshot());

    // Keyed by the polled account id: if a disconnection landed while we
    // were talking to the processor, this write is a no-op.
    let written =
        MerchantAccount::set_status_for_polled_account(&state.db, auth.user_id, &account_id, status)
            .await?;

    if written.is_none() {
        tracing::debug!(
            user_id = %auth.user_id,
            account = %account_id,
            "Account changed during poll; snapshot discarded"
        );
    } else {
        tracing::debug!(
            user_id = %auth.user_id,
            account = %account_id,
            status = status.as_str(),
            "Reconciled account status from poll"
        );
    }

    Ok(Json(AccountStatusResponse {
        account_id: Some(account_id),
        status,
    }))
}

/// Requests a fresh onboarding link for an account
///
/// Stateless; safe to call repeatedly. The refresh/return URLs come from
/// injected configuration.
async fn issue_onboarding_link(state: &AppState, account_id: &str) -> Result<AccountLink, ApiError> {
    let stripe_config = &state.config.stripe;

    let link = state
        .stripe
        .create_account_link(
            account_id,
            &stripe_config.refresh_url,
            &stripe_config.return_url,
        )
        .await?;

    Ok(link)
}
