/// Request authentication context
///
/// After the API server's JWT middleware validates a bearer token, it inserts
/// an [`AuthContext`] into the request extensions; handlers extract it with
/// Axum's `Extension` extractor. Handlers behind the middleware can rely on
/// the identity being verified, since unauthenticated requests never reach
/// them.
///
/// # Example
///
/// ```
/// use axum::Extension;
/// use payflow_shared::auth::middleware::AuthContext;
///
/// async fn handler(Extension(auth): Extension<AuthContext>) -> String {
///     format!("User: {} <{}>", auth.user_id, auth.email)
/// }
/// ```

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::jwt::Claims;

/// Authenticated caller identity added to request extensions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthContext {
    /// Authenticated user ID
    pub user_id: Uuid,

    /// The user's email, as carried in the token
    pub email: String,
}

impl AuthContext {
    /// Builds the context from validated JWT claims
    pub fn from_claims(claims: &Claims) -> Self {
        Self {
            user_id: claims.sub,
            email: claims.email.clone(),
        }
    }
}
