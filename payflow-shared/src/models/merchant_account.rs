/// Merchant account ledger model and reconciliation rule
///
/// One row per user, recording the connected Stripe account id and the
/// user's onboarding status. The row is mutated from three places (the
/// provisioning endpoint, the status poll, and the webhook handler), and all
/// three converge on the same status because every path that observes a
/// processor snapshot maps it through [`AccountStatus::from_snapshot`].
///
/// # State Machine
///
/// ```text
/// none → pending → complete
/// pending | complete → disconnected
/// ```
///
/// `disconnected` is terminal for a given Stripe account: re-entering the
/// flow goes through provisioning again, which attaches a fresh account id
/// and returns the row to `pending`.
///
/// # Schema
///
/// ```sql
/// CREATE TYPE account_status AS ENUM ('none', 'pending', 'complete', 'disconnected');
///
/// CREATE TABLE merchant_accounts (
///     user_id UUID PRIMARY KEY REFERENCES users(id) ON DELETE CASCADE,
///     stripe_account_id VARCHAR(255),
///     status account_status NOT NULL DEFAULT 'none',
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
///
/// CREATE UNIQUE INDEX merchant_accounts_stripe_account_id_idx
///     ON merchant_accounts (stripe_account_id)
///     WHERE stripe_account_id IS NOT NULL;
/// ```
///
/// `stripe_account_id` is NULL until provisioning attaches one and is
/// cleared again on deauthorization, so only `pending` and `complete` rows
/// carry an id. Every write sets `updated_at = NOW()` in the same statement,
/// so ordering between a racing poll and webhook delivery is decided by
/// server-assigned timestamps, never client clocks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

/// Onboarding status of a user's merchant account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "account_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    /// No Stripe account has been provisioned yet
    None,

    /// Account exists but onboarding is incomplete
    Pending,

    /// Onboarding finished; the account can receive charges
    Complete,

    /// The account was deauthorized and its id cleared
    Disconnected,
}

/// The processor's view of an account's verification flags
///
/// Extracted from a live account query or from an `account.updated` webhook
/// payload; both paths feed the same [`AccountStatus::from_snapshot`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSnapshot {
    /// Whether the user has submitted all requested onboarding details
    pub details_submitted: bool,

    /// Whether Stripe has enabled charges on the account
    pub charges_enabled: bool,
}

impl AccountStatus {
    /// Maps a processor snapshot to a ledger status
    ///
    /// This is the single reconciliation rule shared by the status poll and
    /// the webhook handler. It is pure: disconnection is never derived from
    /// a snapshot, only from an explicit deauthorization event.
    pub fn from_snapshot(snapshot: &AccountSnapshot) -> AccountStatus {
        if snapshot.details_submitted && snapshot.charges_enabled {
            AccountStatus::Complete
        } else {
            AccountStatus::Pending
        }
    }

    /// Converts status to its wire/database string
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountStatus::None => "none",
            AccountStatus::Pending => "pending",
            AccountStatus::Complete => "complete",
            AccountStatus::Disconnected => "disconnected",
        }
    }
}

/// Ledger row for one user's merchant account
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct MerchantAccount {
    /// Owning user
    pub user_id: Uuid,

    /// Connected Stripe account id (None until provisioned, cleared on
    /// disconnection)
    pub stripe_account_id: Option<String>,

    /// Current onboarding status
    pub status: AccountStatus,

    /// When the row was created
    pub created_at: DateTime<Utc>,

    /// When the row was last written
    pub updated_at: DateTime<Utc>,
}

impl MerchantAccount {
    /// Finds the ledger row for a user
    pub async fn find_by_user<'e>(
        executor: impl PgExecutor<'e>,
        user_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let record = sqlx::query_as::<_, MerchantAccount>(
            r#"
            SELECT user_id, stripe_account_id, status, created_at, updated_at
            FROM merchant_accounts
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(executor)
        .await?;

        Ok(record)
    }

    /// Finds the ledger row holding a Stripe account id
    ///
    /// Backed by the partial unique index on `stripe_account_id`; at most
    /// one row can match.
    pub async fn find_by_stripe_account(
        pool: &PgPool,
        stripe_account_id: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        let record = sqlx::query_as::<_, MerchantAccount>(
            r#"
            SELECT user_id, stripe_account_id, status, created_at, updated_at
            FROM merchant_accounts
            WHERE stripe_account_id = $1
            "#,
        )
        .bind(stripe_account_id)
        .fetch_optional(pool)
        .await?;

        Ok(record)
    }

    /// Takes the per-user provisioning lock for the current transaction
    ///
    /// `pg_advisory_xact_lock` serializes concurrent provisioning attempts
    /// for the same user; the lock is released when the transaction ends.
    pub async fn acquire_provisioning_lock<'e>(
        executor: impl PgExecutor<'e>,
        user_id: Uuid,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(Self::advisory_lock_key(user_id))
            .execute(executor)
            .await?;

        Ok(())
    }

    /// Derives the advisory lock key from a user id
    ///
    /// Uses the high 64 bits of the UUID; stable across processes.
    fn advisory_lock_key(user_id: Uuid) -> i64 {
        (user_id.as_u128() >> 64) as i64
    }

    /// Attaches a freshly created Stripe account to a user's ledger row
    ///
    /// Inserts the row (or updates an existing one whose account id was
    /// cleared by a disconnection) and moves the status to `pending`. The
    /// update is conditional on `stripe_account_id IS NULL`: a row that
    /// already holds an account id is never overwritten, so at most one
    /// account id can ever be attached per provisioning cycle. Returns
    /// `None` if another writer attached an account first.
    pub async fn attach_stripe_account<'e>(
        executor: impl PgExecutor<'e>,
        user_id: Uuid,
        stripe_account_id: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        let record = sqlx::query_as::<_, MerchantAccount>(
            r#"
            INSERT INTO merchant_accounts (user_id, stripe_account_id, status)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id) DO UPDATE
            SET stripe_account_id = EXCLUDED.stripe_account_id,
                status = EXCLUDED.status,
                updated_at = NOW()
            WHERE merchant_accounts.stripe_account_id IS NULL
            RETURNING user_id, stripe_account_id, status, created_at, updated_at
            "#,
        )
        .bind(user_id)
        .bind(stripe_account_id)
        .bind(AccountStatus::Pending)
        .fetch_optional(executor)
        .await?;

        Ok(record)
    }

    /// Writes a reconciled status for a user, keyed by the polled account id
    ///
    /// The `stripe_account_id` guard makes the write a no-op when a
    /// disconnection landed between the poll and this statement; the stale
    /// snapshot must not resurrect a cleared account.
    pub async fn set_status_for_polled_account(
        pool: &PgPool,
        user_id: Uuid,
        stripe_account_id: &str,
        status: AccountStatus,
    ) -> Result<Option<Self>, sqlx::Error> {
        let record = sqlx::query_as::<_, MerchantAccount>(
            r#"
            UPDATE merchant_accounts
            SET status = $3, updated_at = NOW()
            WHERE user_id = $1 AND stripe_account_id = $2
            RETURNING user_id, stripe_account_id, status, created_at, updated_at
            "#,
        )
        .bind(user_id)
        .bind(stripe_account_id)
        .bind(status)
        .fetch_optional(pool)
        .await?;

        Ok(record)
    }

    /// Writes a reconciled status by reverse lookup on the Stripe account id
    ///
    /// Returns `None` when no row holds the account id; webhook deliveries
    /// for unknown accounts are legitimate (e.g. redelivery after cleanup)
    /// and the caller acknowledges them anyway.
    pub async fn set_status_by_stripe_account(
        pool: &PgPool,
        stripe_account_id: &str,
        status: AccountStatus,
    ) -> Result<Option<Self>, sqlx::Error> {
        let record = sqlx::query_as::<_, MerchantAccount>(
            r#"
            UPDATE merchant_accounts
            SET status = $2, updated_at = NOW()
            WHERE stripe_account_id = $1
            RETURNING user_id, stripe_account_id, status, created_at, updated_at
            "#,
        )
        .bind(stripe_account_id)
        .bind(status)
        .fetch_optional(pool)
        .await?;

        Ok(record)
    }

    /// Records a deauthorization: clears the account id and marks the row
    /// disconnected in one statement
    pub async fn disconnect_by_stripe_account(
        pool: &PgPool,
        stripe_account_id: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        let record = sqlx::query_as::<_, MerchantAccount>(
            r#"
            UPDATE merchant_accounts
            SET stripe_account_id = NULL, status = $2, updated_at = NOW()
            WHERE stripe_account_id = $1
            RETURNING user_id, stripe_account_id, status, created_at, updated_at
            "#,
        )
        .bind(stripe_account_id)
        .bind(AccountStatus::Disconnected)
        .fetch_optional(pool)
        .await?;

        Ok(record)
    }
}
