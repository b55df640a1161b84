/// Database models for PayFlow
///
/// # Models
///
/// - `user`: User accounts and authentication
/// - `merchant_account`: The per-user merchant account ledger tracking
///   Stripe Connect onboarding status
///
/// # Example
///
/// ```no_run
/// use payflow_shared::models::user::{CreateUser, User};
/// use payflow_shared::db::pool::{create_pool, PoolSettings};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(PoolSettings::default()).await?;
///
/// let user = User::create(&pool, CreateUser {
///     email: "seller@example.com".to_string(),
///     password_hash: "$argon2id$...".to_string(),
///     name: Some("Sample Seller".to_string()),
/// })
/// .await?;
/// # Ok(())
/// # }
/// ```

pub mod merchant_account;
pub mod user;
