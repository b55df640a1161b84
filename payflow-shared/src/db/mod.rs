/// Database access layer
///
/// # Modules
///
/// - [`pool`]: PostgreSQL connection pool construction and health checks
/// - [`migrations`]: sqlx migration runner for the workspace `migrations/` dir

pub mod migrations;
pub mod pool;
