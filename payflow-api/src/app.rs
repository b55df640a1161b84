/// Application state and router builder
///
/// Defines the shared application state and builds the Axum router with all
/// routes and middleware.
///
/// # Example
///
/// ```no_run
/// use payflow_api::{app::AppState, config::Config};
/// use payflow_shared::stripe::StripeClient;
/// use sqlx::PgPool;
/// use std::sync::Arc;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let pool = PgPool::connect(&config.database.url).await?;
/// let stripe = Arc::new(StripeClient::new(
///     config.stripe.secret_key.clone(),
///     config.stripe.api_base.clone(),
/// )?);
/// let state = AppState::new(pool, config, stripe);
/// let app = payflow_api::app::build_router(state);
/// # Ok(())
/// # }
/// ```

use crate::{config::Config, middleware::security::SecurityHeadersLayer};
use axum::{
    extract::Request,
    http::{header, HeaderValue, Method},
    middleware::Next,
    response::Response,
    routing::{get, post},
    Router,
};
use payflow_shared::auth::{jwt, middleware::AuthContext};
use payflow_shared::stripe::StripeApi;
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Shared application state
///
/// Cloned for each request handler via Axum's `State` extractor; Arc keeps
/// the clone cheap. The Stripe client is held behind the `StripeApi` trait
/// so tests can substitute the mock.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: PgPool,

    /// Application configuration
    pub config: Arc<Config>,

    /// Processor client
    pub stripe: Arc<dyn StripeApi>,
}

impl AppState {
    /// Creates new application state
    pub fn new(db: PgPool, config: Config, stripe: Arc<dyn StripeApi>) -> Self {
        Self {
            db,
            config: Arc::new(config),
            stripe,
        }
    }

    /// Gets JWT secret for token operations
    pub fn jwt_secret(&self) -> &str {
        &self.config.jwt.secret
    }
}

/// Builds the complete Axum router with all routes and middleware
///
/// # Architecture
///
/// ```text
/// /
/// ├── /health                     # Health check (public)
/// └── /v1/                        # API v1 (versioned)
///     ├── /auth/                  # Authentication endpoints (public)
///     │   ├── POST /register
///     │   ├── POST /login
///     │   └── POST /refresh
///     ├── /connect/               # Merchant onboarding (JWT)
///     │   ├── POST /account       # Provision account + onboarding link
///     │   └── GET  /account       # Poll + reconcile account status
///     └── /webhooks/
///         └── POST /stripe        # Signed processor events (no JWT)
/// ```
///
/// The webhook route is deliberately outside the JWT layer: it is
/// authenticated by the delivery signature over the raw body instead.
pub fn build_router(state: AppState) -> Router {
    use crate::routes;

    let health_routes = Router::new().route("/health", get(routes::health::health_check));

    // Public: no verified identity yet
    let auth_routes = Router::new()
        .route("/register", post(routes::auth::register))
        .route("/login", post(routes::auth::login))
        .route("/refresh", post(routes::auth::refresh));

    // Connect routes (require JWT authentication)
    let connect_routes = Router::new()
        .route("/account", post(routes::connect::create_account))
        .route("/account", get(routes::connect::account_status))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            jwt_auth_layer,
        ));

    // Signature-authenticated over the raw body, so no JWT layer here
    let webhook_routes = Router::new().route("/stripe", post(routes::webhooks::stripe_webhook));

    let v1_routes = Router::new()
        .nest("/auth", auth_routes)
        .nest("/connect", connect_routes)
        .nest("/webhooks", webhook_routes);

    let cors = if state.config.api.cors_origins.contains(&"*".to_string()) {
        CorsLayer::permissive()
    } else {
        let origins: Vec<HeaderValue> = state
            .config
            .api
            .cors_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
            .allow_credentials(true)
            .max_age(std::time::Duration::from_secs(3600))
    };

    Router::new()
        .merge(health_routes)
        .nest("/v1", v1_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors)
        .layer(SecurityHeadersLayer::new(state.config.api.production))
        .with_state(state)
}

/// JWT authentication middleware layer
///
/// Validates the bearer token from the Authorization header and injects an
/// `AuthContext` into the request extensions. Requests failing here never
/// reach a handler, so no ledger or processor interaction can happen for an
/// unauthenticated caller.
async fn jwt_auth_layer(
    state: axum::extract::State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, crate::error::ApiError> {
    let auth_header = req
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            crate::error::ApiError::Unauthorized("Missing authorization header".to_string())
        })?;

    let token = auth_header.strip_prefix("Bearer ").ok_or_else(|| {
        crate::error::ApiError::BadRequest("Expected Bearer token".to_string())
    })?;

    let claims = jwt::validate_access_token(token, state.jwt_secret())?;

    let auth_context = AuthContext::from_claims(&claims);
    req.extensions_mut().insert(auth_context);

    Ok(next.run(req).await)
}
