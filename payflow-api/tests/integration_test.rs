/// Integration tests for the PayFlow API
///
/// These exercise the full system end-to-end against a real database and a
/// mock processor:
/// - provisioning (creation, idempotence, partial-failure behavior)
/// - status polling and ledger reconciliation
/// - webhook signature verification and event dispatch
/// - the disconnect → re-provision cycle
/// - authentication enforcement
///
/// Requires `DATABASE_URL`; migrations run automatically.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::TestContext;
use payflow_shared::models::merchant_account::{AccountStatus, MerchantAccount};
use serde_json::json;
use tower::Service as _;

/// Provisioning a user with no record creates a pending ledger row and
/// returns the onboarding link for the new account
#[tokio::test]
async fn test_provision_account_creates_pending_record() {
    let ctx = TestContext::new().await.unwrap();

    let request = common::authed_request("POST", "/v1/connect/account", &ctx.jwt_token);
    let response = ctx.app.clone().call(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let account_id = ctx.stripe.account_ids()[0].clone();

    let body = common::response_json(response).await;
    let onboarding_url = body["onboarding_url"].as_str().unwrap();
    assert!(onboarding_url.contains(&account_id));

    let record = MerchantAccount::find_by_user(&ctx.db, ctx.user.id)
        .await
        .unwrap()
        .expect("ledger row must exist after provisioning");
    assert_eq!(record.stripe_account_id.as_deref(), Some(account_id.as_str()));
    assert_eq!(record.status, AccountStatus::Pending);

    assert_eq!(ctx.stripe.create_account_calls(), 1);
    assert_eq!(ctx.stripe.create_link_calls(), 1);

    ctx.cleanup().await.unwrap();
}

/// Provisioning twice never creates a second processor account; both calls
/// return a usable onboarding link
#[tokio::test]
async fn test_provision_account_is_idempotent() {
    let ctx = TestContext::new().await.unwrap();

    for _ in 0..2 {
        let request = common::authed_request("POST", "/v1/connect/account", &ctx.jwt_token);
        let response = ctx.app.clone().call(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = common::response_json(response).await;
        let account_id = ctx.stripe.account_ids()[0].clone();
        assert!(body["onboarding_url"].as_str().unwrap().contains(&account_id));
    }

    assert_eq!(ctx.stripe.create_account_calls(), 1);
    assert_eq!(ctx.stripe.create_link_calls(), 2);
    assert_eq!(ctx.stripe.account_ids().len(), 1);

    ctx.cleanup().await.unwrap();
}

/// A processor failure during provisioning leaves no ledger row behind, and
/// a retry succeeds cleanly
#[tokio::test]
async fn test_provision_failure_leaves_no_record() {
    let ctx = TestContext::new().await.unwrap();

    ctx.stripe.fail_account_creation(true);
    let request = common::authed_request("POST", "/v1/connect/account", &ctx.jwt_token);
    let response = ctx.app.clone().call(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

    let body = common::response_json(response).await;
    assert_eq!(body["error"], "upstream_failure");

    let record = MerchantAccount::find_by_user(&ctx.db, ctx.user.id)
        .await
        .unwrap();
    assert!(record.is_none(), "failed provisioning must not write the ledger");

    // Retry after the upstream recovers
    ctx.stripe.fail_account_creation(false);
    let request = common::authed_request("POST", "/v1/connect/account", &ctx.jwt_token);
    let response = ctx.app.clone().call(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    ctx.cleanup().await.unwrap();
}

/// A link-issuance failure after account creation also leaves no ledger row
#[tokio::test]
async fn test_link_failure_leaves_no_record() {
    let ctx = TestContext::new().await.unwrap();

    ctx.stripe.fail_link_creation(true);
    let request = common::authed_request("POST", "/v1/connect/account", &ctx.jwt_token);
    let response = ctx.app.clone().call(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

    // The processor account exists (orphaned) but the ledger is untouched
    assert_eq!(ctx.stripe.create_account_calls(), 1);
    let record = MerchantAccount::find_by_user(&ctx.db, ctx.user.id)
        .await
        .unwrap();
    assert!(record.is_none());

    ctx.cleanup().await.unwrap();
}

/// Status for a user with no provisioned account short-circuits without any
/// processor call
#[tokio::test]
async fn test_account_status_without_account() {
    let ctx = TestContext::new().await.unwrap();

    let request = common::authed_request("GET", "/v1/connect/account", &ctx.jwt_token);
    let response = ctx.app.clone().call(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = common::response_json(response).await;
    assert_eq!(body["account_id"], serde_json::Value::Null);
    assert_eq!(body["status"], "none");

    assert_eq!(ctx.stripe.retrieve_calls(), 0);

    ctx.cleanup().await.unwrap();
}

/// Polling reconciles the live snapshot into the ledger
#[tokio::test]
async fn test_account_status_polls_and_reconciles() {
    let ctx = TestContext::new().await.unwrap();

    let request = common::authed_request("POST", "/v1/connect/account", &ctx.jwt_token);
    ctx.app.clone().call(request).await.unwrap();
    let account_id = ctx.stripe.account_ids()[0].clone();

    // Onboarding not finished yet
    let request = common::authed_request("GET", "/v1/connect/account", &ctx.jwt_token);
    let body = common::response_json(ctx.app.clone().call(request).await.unwrap()).await;
    assert_eq!(body["status"], "pending");

    // Details submitted but charges still disabled: still pending
    ctx.stripe.set_account_flags(&account_id, true, false);
    let request = common::authed_request("GET", "/v1/connect/account", &ctx.jwt_token);
    let body = common::response_json(ctx.app.clone().call(request).await.unwrap()).await;
    assert_eq!(body["status"], "pending");

    // Fully onboarded
    ctx.stripe.set_account_flags(&account_id, true, true);
    let request = common::authed_request("GET", "/v1/connect/account", &ctx.jwt_token);
    let body = common::response_json(ctx.app.clone().call(request).await.unwrap()).await;
    assert_eq!(body["account_id"], account_id.as_str());
    assert_eq!(body["status"], "complete");

    let record = MerchantAccount::find_by_user(&ctx.db, ctx.user.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.status, AccountStatus::Complete);

    ctx.cleanup().await.unwrap();
}

/// A delivery with a bad signature is rejected with 400 and the ledger is
/// untouched
#[tokio::test]
async fn test_webhook_rejects_invalid_signature() {
    let ctx = TestContext::new().await.unwrap();

    let request = common::authed_request("POST", "/v1/connect/account", &ctx.jwt_token);
    ctx.app.clone().call(request).await.unwrap();
    let account_id = ctx.stripe.account_ids()[0].clone();

    let payload = common::account_updated_event(&account_id, true, true);
    let request = common::signed_webhook_request(&payload, "whsec_wrong_secret");
    let response = ctx.app.clone().call(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let record = MerchantAccount::find_by_user(&ctx.db, ctx.user.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.status, AccountStatus::Pending);

    // Missing header entirely
    let request = Request::builder()
        .method("POST")
        .uri("/v1/webhooks/stripe")
        .header("content-type", "application/json")
        .body(Body::from(payload))
        .unwrap();
    let response = ctx.app.clone().call(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    ctx.cleanup().await.unwrap();
}

/// `account.updated` reconciles status through the reverse lookup, and
/// redelivering the identical payload converges on the same state
#[tokio::test]
async fn test_webhook_account_updated_reconciles_and_converges() {
    let ctx = TestContext::new().await.unwrap();

    let request = common::authed_request("POST", "/v1/connect/account", &ctx.jwt_token);
    ctx.app.clone().call(request).await.unwrap();
    let account_id = ctx.stripe.account_ids()[0].clone();

    let payload = common::account_updated_event(&account_id, true, true);

    for _ in 0..2 {
        let request =
            common::signed_webhook_request(&payload, &ctx.config.stripe.webhook_secret);
        let response = ctx.app.clone().call(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = common::response_json(response).await;
        assert_eq!(body["received"], true);

        let record = MerchantAccount::find_by_user(&ctx.db, ctx.user.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.status, AccountStatus::Complete);
        assert_eq!(record.stripe_account_id.as_deref(), Some(account_id.as_str()));
    }

    ctx.cleanup().await.unwrap();
}

/// An event only mutates the record holding its account id, never another
/// user's record
#[tokio::test]
async fn test_webhook_targets_only_matching_record() {
    let ctx = TestContext::new().await.unwrap();
    let (second_user, second_token) = ctx.create_secondary_user().await.unwrap();

    let request = common::authed_request("POST", "/v1/connect/account", &ctx.jwt_token);
    ctx.app.clone().call(request).await.unwrap();
    let request = common::authed_request("POST", "/v1/connect/account", &second_token);
    ctx.app.clone().call(request).await.unwrap();

    let first = MerchantAccount::find_by_user(&ctx.db, ctx.user.id)
        .await
        .unwrap()
        .unwrap();
    let first_account = first.stripe_account_id.clone().unwrap();

    let payload = common::account_updated_event(&first_account, true, true);
    let request = common::signed_webhook_request(&payload, &ctx.config.stripe.webhook_secret);
    let response = ctx.app.clone().call(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // The reverse lookup resolves to the first user's row, and only that row
    // changed status
    let first = MerchantAccount::find_by_stripe_account(&ctx.db, &first_account)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first.user_id, ctx.user.id);
    assert_eq!(first.status, AccountStatus::Complete);

    let second = MerchantAccount::find_by_user(&ctx.db, second_user.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(second.status, AccountStatus::Pending);

    payflow_shared::models::user::User::delete(&ctx.db, second_user.id)
        .await
        .unwrap();
    ctx.cleanup().await.unwrap();
}

/// Deauthorization clears the account id, and re-provisioning allocates a
/// distinct account
#[tokio::test]
async fn test_webhook_deauthorized_clears_account_and_reprovisions() {
    let ctx = TestContext::new().await.unwrap();

    let request = common::authed_request("POST", "/v1/connect/account", &ctx.jwt_token);
    ctx.app.clone().call(request).await.unwrap();
    let old_account = ctx.stripe.account_ids()[0].clone();

    let payload = common::deauthorized_event(&old_account);
    let request = common::signed_webhook_request(&payload, &ctx.config.stripe.webhook_secret);
    let response = ctx.app.clone().call(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let record = MerchantAccount::find_by_user(&ctx.db, ctx.user.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.status, AccountStatus::Disconnected);
    assert!(record.stripe_account_id.is_none());

    // Status poll now short-circuits: no account id on file
    let request = common::authed_request("GET", "/v1/connect/account", &ctx.jwt_token);
    let body = common::response_json(ctx.app.clone().call(request).await.unwrap()).await;
    assert_eq!(body["status"], "none");

    // Re-provisioning allocates a fresh account rather than reusing the old
    let request = common::authed_request("POST", "/v1/connect/account", &ctx.jwt_token);
    let response = ctx.app.clone().call(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let record = MerchantAccount::find_by_user(&ctx.db, ctx.user.id)
        .await
        .unwrap()
        .unwrap();
    let new_account = record.stripe_account_id.clone().unwrap();
    assert_ne!(new_account, old_account);
    assert_eq!(record.status, AccountStatus::Pending);
    assert_eq!(ctx.stripe.create_account_calls(), 2);

    ctx.cleanup().await.unwrap();
}

/// Unknown event kinds and events for unknown accounts are acknowledged
/// without failing the delivery
#[tokio::test]
async fn test_webhook_acknowledges_unknown_events() {
    let ctx = TestContext::new().await.unwrap();

    // Unknown kind
    let payload = json!({
        "id": "evt_unknown_kind",
        "type": "payout.paid",
        "data": { "object": { "id": "po_1" } }
    })
    .to_string();
    let request = common::signed_webhook_request(&payload, &ctx.config.stripe.webhook_secret);
    let response = ctx.app.clone().call(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Known kind, no matching ledger record
    let payload = common::account_updated_event("acct_nobody_knows", true, true);
    let request = common::signed_webhook_request(&payload, &ctx.config.stripe.webhook_secret);
    let response = ctx.app.clone().call(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = common::response_json(response).await;
    assert_eq!(body["received"], true);

    ctx.cleanup().await.unwrap();
}

/// Unauthenticated calls fail before any ledger or processor interaction
#[tokio::test]
async fn test_unauthenticated_requests_rejected() {
    let ctx = TestContext::new().await.unwrap();

    for method in ["POST", "GET"] {
        let request = Request::builder()
            .method(method)
            .uri("/v1/connect/account")
            .body(Body::empty())
            .unwrap();

        let response = ctx.app.clone().call(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    // Garbage token is also rejected
    let request = common::authed_request("POST", "/v1/connect/account", "not.a.jwt");
    let response = ctx.app.clone().call(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    assert_eq!(ctx.stripe.create_account_calls(), 0);
    assert_eq!(ctx.stripe.retrieve_calls(), 0);

    let record = MerchantAccount::find_by_user(&ctx.db, ctx.user.id)
        .await
        .unwrap();
    assert!(record.is_none());

    ctx.cleanup().await.unwrap();
}

/// Register and login issue tokens that work against the connect endpoints
#[tokio::test]
async fn test_register_login_and_provision_flow() {
    let ctx = TestContext::new().await.unwrap();

    let email = format!("flow-{}@example.com", uuid::Uuid::new_v4());
    let request = Request::builder()
        .method("POST")
        .uri("/v1/auth/register")
        .header("content-type", "application/json")
        .body(Body::from(
            json!({
                "email": email,
                "password": "SecureP4ssword",
                "name": "Flow Tester"
            })
            .to_string(),
        ))
        .unwrap();

    let response = ctx.app.clone().call(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = common::response_json(response).await;
    let user_id: uuid::Uuid = body["user_id"].as_str().unwrap().parse().unwrap();

    // Login with the same credentials
    let request = Request::builder()
        .method("POST")
        .uri("/v1/auth/login")
        .header("content-type", "application/json")
        .body(Body::from(
            json!({ "email": email, "password": "SecureP4ssword" }).to_string(),
        ))
        .unwrap();
    let response = ctx.app.clone().call(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = common::response_json(response).await;
    let access_token = body["access_token"].as_str().unwrap().to_string();

    // The issued token drives provisioning
    let request = common::authed_request("POST", "/v1/connect/account", &access_token);
    let response = ctx.app.clone().call(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let record = MerchantAccount::find_by_user(&ctx.db, user_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.status, AccountStatus::Pending);

    payflow_shared::models::user::User::delete(&ctx.db, user_id)
        .await
        .unwrap();
    ctx.cleanup().await.unwrap();
}
