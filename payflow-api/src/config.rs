/// Configuration management for the API server
///
/// Loads configuration from environment variables into a typed struct. The
/// Stripe secret key, the webhook signing secret, and the onboarding-link
/// URLs are all injected here at startup and carried in the application
/// state; nothing reads the environment mid-request.
///
/// # Environment Variables
///
/// - `DATABASE_URL`: PostgreSQL connection string (required)
/// - `DATABASE_MAX_CONNECTIONS`: pool size (default: 10)
/// - `API_HOST`: host to bind to (default: 0.0.0.0)
/// - `API_PORT`: port to bind to (default: 8080)
/// - `API_CORS_ORIGINS`: comma-separated allowed origins (default: *)
/// - `API_PRODUCTION`: enables HSTS and strict CORS (default: false)
/// - `JWT_SECRET`: secret for token signing, at least 32 bytes (required)
/// - `STRIPE_SECRET_KEY`: Stripe API secret key (required)
/// - `STRIPE_WEBHOOK_SECRET`: webhook signing secret (required)
/// - `STRIPE_API_BASE`: API host override, for stub servers (optional)
/// - `STRIPE_WEBHOOK_TOLERANCE_SECONDS`: replay window (default: 300)
/// - `CONNECT_REFRESH_URL`: link-expired re-entry URL (required)
/// - `CONNECT_RETURN_URL`: post-onboarding landing URL (required)
///
/// # Example
///
/// ```no_run
/// use payflow_api::config::Config;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// println!("Server will listen on {}", config.bind_address());
/// # Ok(())
/// # }
/// ```

use serde::{Deserialize, Serialize};
use std::env;

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// API server configuration
    pub api: ApiConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// JWT configuration
    pub jwt: JwtConfig,

    /// Stripe Connect configuration
    pub stripe: StripeConfig,
}

/// API server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Host to bind to
    pub host: String,

    /// Port to bind to
    pub port: u16,

    /// Allowed CORS origins; "*" enables permissive CORS
    pub cors_origins: Vec<String>,

    /// Production hardening (HSTS)
    pub production: bool,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections in pool
    pub max_connections: u32,
}

/// JWT configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    /// Secret key for JWT signing
    ///
    /// Must be at least 32 bytes. Generate with: `openssl rand -hex 32`
    pub secret: String,
}

/// Stripe Connect configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StripeConfig {
    /// API secret key (`sk_live_...` / `sk_test_...`)
    pub secret_key: String,

    /// Webhook signing secret (`whsec_...`)
    pub webhook_secret: String,

    /// API host override; None means the live API
    pub api_base: Option<String>,

    /// Accepted age of a signed webhook delivery, in seconds
    pub webhook_tolerance_seconds: i64,

    /// URL Stripe sends users to when an onboarding link expired
    pub refresh_url: String,

    /// URL Stripe sends users to after onboarding
    pub return_url: String,
}

impl Config {
    /// Loads configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing or a value fails
    /// to parse.
    pub fn from_env() -> anyhow::Result<Self> {
        // A .env file is optional; real deployments set the environment
        dotenvy::dotenv().ok();

        let api_host = env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let api_port = env::var("API_PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse::<u16>()?;
        let cors_origins = env::var("API_CORS_ORIGINS")
            .unwrap_or_else(|_| "*".to_string())
            .split(',')
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty())
            .collect();
        let production = env::var("API_PRODUCTION")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        let database_url = env::var("DATABASE_URL")
            .map_err(|_| anyhow::anyhow!("DATABASE_URL environment variable is required"))?;
        let max_connections = env::var("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "10".to_string())
            .parse::<u32>()?;

        let jwt_secret = env::var("JWT_SECRET")
            .map_err(|_| anyhow::anyhow!("JWT_SECRET environment variable is required"))?;
        if jwt_secret.len() < 32 {
            anyhow::bail!("JWT_SECRET must be at least 32 characters long");
        }

        let stripe_secret_key = env::var("STRIPE_SECRET_KEY")
            .map_err(|_| anyhow::anyhow!("STRIPE_SECRET_KEY environment variable is required"))?;
        let webhook_secret = env::var("STRIPE_WEBHOOK_SECRET").map_err(|_| {
            anyhow::anyhow!("STRIPE_WEBHOOK_SECRET environment variable is required")
        })?;
        let api_base = env::var("STRIPE_API_BASE").ok();
        let webhook_tolerance_seconds = env::var("STRIPE_WEBHOOK_TOLERANCE_SECONDS")
            .unwrap_or_else(|_| "300".to_string())
            .parse::<i64>()?;

        let refresh_url = env::var("CONNECT_REFRESH_URL")
            .map_err(|_| anyhow::anyhow!("CONNECT_REFRESH_URL environment variable is required"))?;
        let return_url = env::var("CONNECT_RETURN_URL")
            .map_err(|_| anyhow::anyhow!("CONNECT_RETURN_URL environment variable is required"))?;

        Ok(Self {
            api: ApiConfig {
                host: api_host,
                port: api_port,
                cors_origins,
                production,
            },
            database: DatabaseConfig {
                url: database_url,
                max_connections,
            },
            jwt: JwtConfig { secret: jwt_secret },
            stripe: StripeConfig {
                secret_key: stripe_secret_key,
                webhook_secret,
                api_base,
                webhook_tolerance_seconds,
                refresh_url,
                return_url,
            },
        })
    }

    /// Returns the server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }
}
