/// Common test utilities for integration tests
///
/// Provides the shared infrastructure the integration tests build on:
/// - database setup with migrations applied
/// - a router wired to a `MockStripe` processor
/// - test user creation and JWT token generation
/// - signed webhook request construction

use axum::body::Body;
use axum::http::Request;
use payflow_api::app::{build_router, AppState};
use payflow_api::config::{ApiConfig, Config, DatabaseConfig, JwtConfig, StripeConfig};
use payflow_shared::auth::jwt::{create_token, Claims, TokenType};
use payflow_shared::db::migrations::{ensure_database_exists, run_migrations};
use payflow_shared::models::user::{CreateUser, User};
use payflow_shared::stripe::mock::MockStripe;
use payflow_shared::stripe::webhook;
use payflow_shared::stripe::StripeApi;
use serde_json::json;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

/// Everything a test needs: database, router, mock processor, and a user
pub struct TestContext {
    pub db: PgPool,
    pub app: axum::Router,
    pub config: Config,
    pub stripe: Arc<MockStripe>,
    pub user: User,
    pub jwt_token: String,
}

impl TestContext {
    /// Creates a new test context with a fresh user and a mock processor
    pub async fn new() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set for integration tests"))?;

        let config = test_config(database_url);

        ensure_database_exists(&config.database.url).await?;
        let db = PgPool::connect(&config.database.url).await?;
        run_migrations(&db).await?;

        let user = create_user(&db).await?;
        let jwt_token = token_for(&user, &config);

        let stripe = Arc::new(MockStripe::new());
        let stripe_api: Arc<dyn StripeApi> = stripe.clone();

        let state = AppState::new(db.clone(), config.clone(), stripe_api);
        let app = build_router(state);

        Ok(TestContext {
            db,
            app,
            config,
            stripe,
            user,
            jwt_token,
        })
    }

    /// Returns the authorization header value for the primary test user
    pub fn auth_header(&self) -> String {
        format!("Bearer {}", self.jwt_token)
    }

    /// Creates an additional user with their own token
    pub async fn create_secondary_user(&self) -> anyhow::Result<(User, String)> {
        let user = create_user(&self.db).await?;
        let token = token_for(&user, &self.config);
        Ok((user, token))
    }

    /// Deletes test users; the ledger rows cascade
    pub async fn cleanup(&self) -> anyhow::Result<()> {
        User::delete(&self.db, self.user.id).await?;
        Ok(())
    }
}

fn test_config(database_url: String) -> Config {
    Config {
        api: ApiConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            cors_origins: vec!["*".to_string()],
            production: false,
        },
        database: DatabaseConfig {
            url: database_url,
            max_connections: 5,
        },
        jwt: JwtConfig {
            secret: "integration-test-secret-key-0123456789abcdef".to_string(),
        },
        stripe: StripeConfig {
            secret_key: "sk_test_integration".to_string(),
            webhook_secret: "whsec_integration_test".to_string(),
            api_base: None,
            webhook_tolerance_seconds: 300,
            refresh_url: "https://app.example.com/payment-setup?refresh=true".to_string(),
            return_url: "https://app.example.com/payment-setup?success=true".to_string(),
        },
    }
}

async fn create_user(db: &PgPool) -> anyhow::Result<User> {
    let user = User::create(
        db,
        CreateUser {
            email: format!("test-{}@example.com", Uuid::new_v4()),
            password_hash: "test_hash".to_string(), // Login is not exercised here
            name: Some("Test User".to_string()),
        },
    )
    .await?;

    Ok(user)
}

fn token_for(user: &User, config: &Config) -> String {
    let claims = Claims::new(user.id, user.email.clone(), TokenType::Access);
    create_token(&claims, &config.jwt.secret).expect("token creation")
}

/// Builds an authenticated request with an optional JSON body
pub fn authed_request(method: &str, uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("authorization", format!("Bearer {}", token))
        .header("content-type", "application/json")
        .body(Body::empty())
        .unwrap()
}

/// Builds an `account.updated` event payload
pub fn account_updated_event(
    account_id: &str,
    details_submitted: bool,
    charges_enabled: bool,
) -> String {
    json!({
        "id": format!("evt_{}", Uuid::new_v4().simple()),
        "type": "account.updated",
        "data": {
            "object": {
                "id": account_id,
                "object": "account",
                "details_submitted": details_submitted,
                "charges_enabled": charges_enabled
            }
        }
    })
    .to_string()
}

/// Builds an `account.application.deauthorized` event payload
pub fn deauthorized_event(account_id: &str) -> String {
    json!({
        "id": format!("evt_{}", Uuid::new_v4().simple()),
        "type": "account.application.deauthorized",
        "data": {
            "object": {
                "id": account_id,
                "object": "application"
            }
        }
    })
    .to_string()
}

/// Builds a webhook delivery signed with the given secret
pub fn signed_webhook_request(payload: &str, secret: &str) -> Request<Body> {
    let header = webhook::signature_header(
        payload.as_bytes(),
        secret,
        chrono::Utc::now().timestamp(),
    );

    Request::builder()
        .method("POST")
        .uri("/v1/webhooks/stripe")
        .header(webhook::SIGNATURE_HEADER, header)
        .header("content-type", "application/json")
        .body(Body::from(payload.to_string()))
        .unwrap()
}

/// Reads a response body as JSON
pub async fn response_json(response: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}
