/// Stripe REST client
///
/// The [`StripeApi`] trait is the seam between PayFlow and the processor:
/// route handlers talk to `Arc<dyn StripeApi>`, production wires in
/// [`StripeClient`], and the integration tests wire in
/// [`crate::stripe::mock::MockStripe`].
///
/// # Operations
///
/// - `create_account`: provisions an Express connected account for an email,
///   requesting the `card_payments` and `transfers` capabilities
/// - `create_account_link`: issues a short-lived onboarding URL
/// - `retrieve_account`: fetches the live verification flags
///
/// # Example
///
/// ```no_run
/// use payflow_shared::stripe::client::{StripeApi, StripeClient};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = StripeClient::new("sk_test_...".to_string(), None)?;
/// let account = client.create_account("seller@example.com").await?;
/// let link = client
///     .create_account_link(&account.id, "https://app/payment-setup?refresh=true", "https://app/payment-setup?success=true")
///     .await?;
/// println!("send the user to {}", link.url);
/// # Ok(())
/// # }
/// ```

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

use super::types::{Account, AccountLink};

/// Default Stripe API base URL
pub const DEFAULT_API_BASE: &str = "https://api.stripe.com";

/// Request timeout for processor calls
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Error type for processor API calls
#[derive(Debug, thiserror::Error)]
pub enum StripeError {
    /// The API answered with a non-success status
    #[error("stripe api error ({status}): {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// The processor's error message
        message: String,
    },

    /// The request never completed (connect, TLS, timeout)
    #[error("stripe request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The response body did not have the expected shape
    #[error("unexpected stripe response: {0}")]
    Decode(String),
}

/// Processor operations PayFlow depends on
#[async_trait]
pub trait StripeApi: Send + Sync {
    /// Creates a new Express connected account scoped to an email
    async fn create_account(&self, email: &str) -> Result<Account, StripeError>;

    /// Issues a fresh onboarding link for an account
    ///
    /// Always safe to call again; every call returns a new short-lived URL.
    async fn create_account_link(
        &self,
        account_id: &str,
        refresh_url: &str,
        return_url: &str,
    ) -> Result<AccountLink, StripeError>;

    /// Fetches the live account, including its verification flags
    async fn retrieve_account(&self, account_id: &str) -> Result<Account, StripeError>;
}

/// reqwest-backed implementation of [`StripeApi`]
pub struct StripeClient {
    http: reqwest::Client,
    api_base: String,
    secret_key: String,
}

/// Stripe's error envelope: `{"error": {"message": ..., "type": ...}}`
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

impl StripeClient {
    /// Creates a client holding the secret key injected from configuration
    ///
    /// `api_base` overrides the live API host; used to point the client at a
    /// stub server.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new(secret_key: String, api_base: Option<String>) -> Result<Self, StripeError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            http,
            api_base: api_base.unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            secret_key,
        })
    }

    /// Sends a form-encoded POST and decodes the JSON response
    async fn post_form<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, &str)],
    ) -> Result<T, StripeError> {
        let response = self
            .http
            .post(format!("{}{}", self.api_base, path))
            .bearer_auth(&self.secret_key)
            .form(params)
            .send()
            .await?;

        Self::decode(response).await
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, StripeError> {
        let response = self
            .http
            .get(format!("{}{}", self.api_base, path))
            .bearer_auth(&self.secret_key)
            .send()
            .await?;

        Self::decode(response).await
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, StripeError> {
        let status = response.status();
        let body = response.bytes().await?;

        if !status.is_success() {
            let message = serde_json::from_slice::<ErrorEnvelope>(&body)
                .map(|envelope| envelope.error.message)
                .unwrap_or_else(|_| String::from_utf8_lossy(&body).into_owned());

            return Err(StripeError::Api {
                status: status.as_u16(),
                message,
            });
        }

        serde_json::from_slice(&body).map_err(|e| StripeError::Decode(e.to_string()))
    }
}

#[async_trait]
impl StripeApi for StripeClient {
    async fn create_account(&self, email: &str) -> Result<Account, StripeError> {
        self.post_form(
            "/v1/accounts",
            &[
                ("type", "express"),
                ("email", email),
                ("business_type", "individual"),
                ("capabilities[card_payments][requested]", "true"),
                ("capabilities[transfers][requested]", "true"),
            ],
        )
        .await
    }

    async fn create_account_link(
        &self,
        account_id: &str,
        refresh_url: &str,
        return_url: &str,
    ) -> Result<AccountLink, StripeError> {
        self.post_form(
            "/v1/account_links",
            &[
                ("account", account_id),
                ("refresh_url", refresh_url),
                ("return_url", return_url),
                ("type", "account_onboarding"),
            ],
        )
        .await
    }

    async fn retrieve_account(&self, account_id: &str) -> Result<Account, StripeError> {
        self.get(&format!("/v1/accounts/{}", account_id)).await
    }
}
