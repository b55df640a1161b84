/// Stripe wire types
///
/// Only the fields PayFlow consumes are modeled; everything else in the
/// processor's responses is ignored by serde. Verification flags default to
/// `false` when absent so a sparse `account.updated` payload reconciles to
/// `pending` rather than failing to decode.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::models::merchant_account::AccountSnapshot;

/// Event type for connected-account changes
pub const EVENT_ACCOUNT_UPDATED: &str = "account.updated";

/// Event type for a connected account revoking access
pub const EVENT_ACCOUNT_DEAUTHORIZED: &str = "account.application.deauthorized";

/// A connected account as returned by the Stripe API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    /// Opaque account id (`acct_...`)
    pub id: String,

    /// Whether the user has submitted all requested onboarding details
    #[serde(default)]
    pub details_submitted: bool,

    /// Whether Stripe has enabled charges on the account
    #[serde(default)]
    pub charges_enabled: bool,

    /// Email the account was created with
    #[serde(default)]
    pub email: Option<String>,
}

impl Account {
    /// Extracts the verification flags the reconciliation rule consumes
    pub fn snapshot(&self) -> AccountSnapshot {
        AccountSnapshot {
            details_submitted: self.details_submitted,
            charges_enabled: self.charges_enabled,
        }
    }
}

/// A short-lived onboarding link for a connected account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountLink {
    /// The URL to send the user to
    pub url: String,

    /// Unix timestamp after which the link no longer works
    #[serde(default)]
    pub expires_at: i64,
}

/// A signed webhook event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Event id (`evt_...`)
    pub id: String,

    /// Event type, e.g. `account.updated`
    #[serde(rename = "type")]
    pub kind: String,

    /// Event payload
    pub data: EventData,
}

/// The `data` envelope of an event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventData {
    /// The object the event describes; shape depends on the event type
    pub object: JsonValue,
}

impl Event {
    /// The id of the object the event describes
    pub fn object_id(&self) -> Option<&str> {
        self.data.object.get("id").and_then(|v| v.as_str())
    }

    /// Decodes the event object as a connected account
    ///
    /// # Errors
    ///
    /// Returns a decode error when the object is not account-shaped.
    pub fn account(&self) -> Result<Account, serde_json::Error> {
        serde_json::from_value(self.data.object.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::merchant_account::{AccountStatus, AccountSnapshot};
    use serde_json::json;

    #[test]
    fn test_account_decodes_from_api_response() {
        let account: Account = serde_json::from_value(json!({
            "id": "acct_1RqG4u",
            "object": "account",
            "details_submitted": true,
            "charges_enabled": false,
            "email": "seller@example.com",
            "country": "US"
        }))
        .unwrap();

        assert_eq!(account.id, "acct_1RqG4u");
        assert!(account.details_submitted);
        assert!(!account.charges_enabled);
    }

    #[test]
    fn test_account_flags_default_to_false() {
        let account: Account = serde_json::from_value(json!({ "id": "acct_sparse" })).unwrap();

        assert_eq!(
            account.snapshot(),
            AccountSnapshot {
                details_submitted: false,
                charges_enabled: false,
            }
        );
        assert_eq!(
            AccountStatus::from_snapshot(&account.snapshot()),
            AccountStatus::Pending
        );
    }

    #[test]
    fn test_event_decodes_and_exposes_object_id() {
        let event: Event = serde_json::from_value(json!({
            "id": "evt_123",
            "type": "account.updated",
            "data": {
                "object": {
                    "id": "acct_1RqG4u",
                    "details_submitted": true,
                    "charges_enabled": true
                }
            }
        }))
        .unwrap();

        assert_eq!(event.kind, EVENT_ACCOUNT_UPDATED);
        assert_eq!(event.object_id(), Some("acct_1RqG4u"));

        let account = event.account().unwrap();
        assert!(account.charges_enabled);
    }

    #[test]
    fn test_event_with_non_account_object() {
        let event: Event = serde_json::from_value(json!({
            "id": "evt_456",
            "type": "account.application.deauthorized",
            "data": {
                "object": {
                    "id": "ca_application",
                    "object": "application"
                }
            }
        }))
        .unwrap();

        assert_eq!(event.object_id(), Some("ca_application"));
    }
}
