/// Mock Stripe client for tests
///
/// An in-memory [`StripeApi`] implementation with call counters and failure
/// injection. The integration tests wire it into the application state in
/// place of [`crate::stripe::StripeClient`] so the full HTTP surface can be
/// exercised without the live API:
///
/// - account ids are unique per mock instance, so test runs sharing one
///   database never collide on the ledger's account-id index
/// - verification flags are mutated with [`MockStripe::set_account_flags`]
///   to simulate onboarding progress
/// - `fail_account_creation` / `fail_link_creation` make subsequent calls
///   return an API error, for partial-failure paths
///
/// # Example
///
/// ```
/// use payflow_shared::stripe::client::StripeApi;
/// use payflow_shared::stripe::mock::MockStripe;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let stripe = MockStripe::new();
/// let account = stripe.create_account("seller@example.com").await?;
///
/// stripe.set_account_flags(&account.id, true, true);
/// let live = stripe.retrieve_account(&account.id).await?;
/// assert!(live.charges_enabled);
/// # Ok(())
/// # }
/// ```

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use super::client::{StripeApi, StripeError};
use super::types::{Account, AccountLink};

/// In-memory mock of the processor
pub struct MockStripe {
    /// Distinguishes account ids across mock instances
    instance: String,
    state: Mutex<MockState>,
}

#[derive(Default)]
struct MockState {
    accounts: HashMap<String, Account>,
    created: Vec<String>,
    fail_account_creation: bool,
    fail_link_creation: bool,
    create_account_calls: u64,
    create_link_calls: u64,
    retrieve_calls: u64,
}

impl Default for MockStripe {
    fn default() -> Self {
        Self::new()
    }
}

impl MockStripe {
    /// Creates an empty mock
    pub fn new() -> Self {
        Self {
            instance: Uuid::new_v4().simple().to_string(),
            state: Mutex::new(MockState::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().expect("mock state lock poisoned")
    }

    /// Makes subsequent `create_account` calls fail until reset
    pub fn fail_account_creation(&self, fail: bool) {
        self.state().fail_account_creation = fail;
    }

    /// Makes subsequent `create_account_link` calls fail until reset
    pub fn fail_link_creation(&self, fail: bool) {
        self.state().fail_link_creation = fail;
    }

    /// Sets the verification flags on an existing mock account
    ///
    /// Returns false if the account id is unknown.
    pub fn set_account_flags(
        &self,
        account_id: &str,
        details_submitted: bool,
        charges_enabled: bool,
    ) -> bool {
        match self.state().accounts.get_mut(account_id) {
            Some(account) => {
                account.details_submitted = details_submitted;
                account.charges_enabled = charges_enabled;
                true
            }
            None => false,
        }
    }

    /// Number of `create_account` calls seen (including failed ones)
    pub fn create_account_calls(&self) -> u64 {
        self.state().create_account_calls
    }

    /// Number of `create_account_link` calls seen
    pub fn create_link_calls(&self) -> u64 {
        self.state().create_link_calls
    }

    /// Number of `retrieve_account` calls seen
    pub fn retrieve_calls(&self) -> u64 {
        self.state().retrieve_calls
    }

    /// Ids of all accounts created so far, in creation order
    pub fn account_ids(&self) -> Vec<String> {
        self.state().created.clone()
    }
}

#[async_trait]
impl StripeApi for MockStripe {
    async fn create_account(&self, email: &str) -> Result<Account, StripeError> {
        let mut state = self.state();
        state.create_account_calls += 1;

        if state.fail_account_creation {
            return Err(StripeError::Api {
                status: 500,
                message: "simulated account creation failure".to_string(),
            });
        }

        let account = Account {
            id: format!("acct_{}_{}", self.instance, state.created.len() + 1),
            details_submitted: false,
            charges_enabled: false,
            email: Some(email.to_string()),
        };

        state.created.push(account.id.clone());
        state.accounts.insert(account.id.clone(), account.clone());
        Ok(account)
    }

    async fn create_account_link(
        &self,
        account_id: &str,
        _refresh_url: &str,
        _return_url: &str,
    ) -> Result<AccountLink, StripeError> {
        let mut state = self.state();
        state.create_link_calls += 1;

        if state.fail_link_creation {
            return Err(StripeError::Api {
                status: 500,
                message: "simulated link creation failure".to_string(),
            });
        }

        if !state.accounts.contains_key(account_id) {
            return Err(StripeError::Api {
                status: 404,
                message: format!("No such account: {}", account_id),
            });
        }

        Ok(AccountLink {
            url: format!("https://connect.stripe.example/setup/{}", account_id),
            expires_at: chrono::Utc::now().timestamp() + 300,
        })
    }

    async fn retrieve_account(&self, account_id: &str) -> Result<Account, StripeError> {
        let mut state = self.state();
        state.retrieve_calls += 1;

        state
            .accounts
            .get(account_id)
            .cloned()
            .ok_or_else(|| StripeError::Api {
                status: 404,
                message: format!("No such account: {}", account_id),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_accounts_are_unique_across_instances() {
        let first = MockStripe::new();
        let second = MockStripe::new();

        let a = first.create_account("a@example.com").await.unwrap();
        let b = second.create_account("a@example.com").await.unwrap();

        assert_ne!(a.id, b.id);
        assert_eq!(first.account_ids(), vec![a.id.clone()]);
        assert_eq!(first.create_account_calls(), 1);
    }

    #[tokio::test]
    async fn test_failure_injection() {
        let stripe = MockStripe::new();
        stripe.fail_account_creation(true);

        let result = stripe.create_account("a@example.com").await;
        assert!(matches!(result, Err(StripeError::Api { status: 500, .. })));
        assert_eq!(stripe.create_account_calls(), 1);
        assert!(stripe.account_ids().is_empty());

        stripe.fail_account_creation(false);
        assert!(stripe.create_account("a@example.com").await.is_ok());
    }

    #[tokio::test]
    async fn test_flags_show_up_in_retrieve() {
        let stripe = MockStripe::new();
        let account = stripe.create_account("a@example.com").await.unwrap();
        assert!(!account.charges_enabled);

        assert!(stripe.set_account_flags(&account.id, true, true));
        let live = stripe.retrieve_account(&account.id).await.unwrap();
        assert!(live.details_submitted);
        assert!(live.charges_enabled);

        assert!(!stripe.set_account_flags("acct_unknown", true, true));
    }

    #[tokio::test]
    async fn test_link_requires_existing_account() {
        let stripe = MockStripe::new();
        let result = stripe
            .create_account_link("acct_missing", "https://r", "https://s")
            .await;
        assert!(matches!(result, Err(StripeError::Api { status: 404, .. })));

        let account = stripe.create_account("a@example.com").await.unwrap();
        let link = stripe
            .create_account_link(&account.id, "https://r", "https://s")
            .await
            .unwrap();
        assert!(link.url.ends_with(&account.id));
    }
}
