/// Identity middleware for Axum
///
/// Validates the upstream identity token from `Authorization: Bearer <token>`,
/// resolves the caller against `martial_base_users`, and stores an
/// [`AuthContext`] in the request extensions.
///
/// A valid token whose external id is not linked to any person still passes:
/// the context then has no `person_id`, and entity-scoped checks answer
/// `AzureUserNotRegistered`. Claiming an invitation code is the way out of
/// that state, so the claim endpoint must be reachable.
///
/// # Example
///
/// ```no_run
/// use axum::{middleware, routing::get, Extension, Router};
/// use martialbase_shared::auth::middleware::{identity_auth_middleware, AuthContext, IdentityAuthState};
/// use sqlx::PgPool;
///
/// async fn whoami(Extension(auth): Extension<AuthContext>) -> String {
///     format!("external id {}", auth.external_id)
/// }
///
/// # fn build(pool: PgPool) -> Router {
/// let state = IdentityAuthState::new(pool, "identity-secret-at-least-32-bytes-long", "martialbase");
///
/// Router::new()
///     .route("/whoami", get(whoami))
///     .layer(middleware::from_fn_with_state(state, identity_auth_middleware))
/// # }
/// ```

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::{debug, error};
use uuid::Uuid;

use super::jwt::{validate_token, IdentityClaims, JwtError};
use super::roles::{Capability, RoleSet};
use crate::models::{user::MartialBaseUser, user_role::MartialBaseUserRole};

/// Who is calling
///
/// `roles` is the union of the role claims in the token and the roles
/// assigned to the linked user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthContext {
    pub external_id: Uuid,
    pub user_id: Option<Uuid>,
    pub person_id: Option<Uuid>,
    pub roles: RoleSet,
}

impl AuthContext {
    /// Context for an identity with no MartialBase user yet
    pub fn unregistered(external_id: Uuid, roles: RoleSet) -> Self {
        Self {
            external_id,
            user_id: None,
            person_id: None,
            roles,
        }
    }

    /// Resolves validated claims against the database
    pub async fn resolve(pool: &PgPool, claims: &IdentityClaims) -> Result<Self, sqlx::Error> {
        let mut roles: RoleSet = claims.roles.iter().copied().collect();

        let Some(user) = MartialBaseUser::find_by_external_id(pool, claims.sub).await? else {
            return Ok(Self::unregistered(claims.sub, roles));
        };

        roles.extend(MartialBaseUserRole::roles_for_user(pool, user.id).await?);

        Ok(Self {
            external_id: claims.sub,
            user_id: Some(user.id),
            person_id: user.person_id,
            roles,
        })
    }

    pub fn has_capability(&self, capability: Capability) -> bool {
        self.roles.has_capability(capability)
    }

    /// True for holders of the super-role
    pub fn bypasses_entity_checks(&self) -> bool {
        self.has_capability(Capability::BypassEntityChecks)
    }
}

#[derive(Debug)]
pub enum AuthError {
    MissingCredentials,
    InvalidFormat(String),
    InvalidToken(String),
    DatabaseError(String),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, error, message) = match self {
            AuthError::MissingCredentials => (
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                "Missing credentials".to_string(),
            ),
            AuthError::InvalidFormat(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            AuthError::InvalidToken(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg),
            AuthError::DatabaseError(msg) => {
                error!(error = %msg, "Identity resolution failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "Internal server error".to_string(),
                )
            }
        };

        (
            status,
            Json(serde_json::json!({ "error": error, "message": message })),
        )
            .into_response()
    }
}

/// State the identity middleware needs
#[derive(Clone)]
pub struct IdentityAuthState {
    pub pool: PgPool,
    secret: Arc<str>,
    issuer: Arc<str>,
}

impl IdentityAuthState {
    pub fn new(pool: PgPool, secret: &str, issuer: &str) -> Self {
        Self {
            pool,
            secret: Arc::from(secret),
            issuer: Arc::from(issuer),
        }
    }
}

/// Extracts the bearer token from an `Authorization` header value
pub fn bearer_token(header_value: &str) -> Result<&str, AuthError> {
    header_value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| AuthError::InvalidFormat("Expected Bearer token".to_string()))
}

/// Validates the identity token and attaches an [`AuthContext`]
///
/// # Errors
///
/// - 401 when the header is missing or the token fails validation
/// - 400 when the header is not a bearer token
/// - 500 when the user lookup fails
pub async fn identity_auth_middleware(
    State(state): State<IdentityAuthState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let auth_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(AuthError::MissingCredentials)?;

    let token = bearer_token(auth_header)?;

    let claims = validate_token(token, &state.secret, &state.issuer).map_err(|e| match e {
        JwtError::Expired => AuthError::InvalidToken("Token expired".to_string()),
        JwtError::InvalidIssuer { .. } => AuthError::InvalidToken("Invalid issuer".to_string()),
        _ => AuthError::InvalidToken(format!("Invalid token: {}", e)),
    })?;

    let auth_context = AuthContext::resolve(&state.pool, &claims)
        .await
        .map_err(|e| AuthError::DatabaseError(e.to_string()))?;

    debug!(
        external_id = %auth_context.external_id,
        person_id = ?auth_context.person_id,
        roles = auth_context.roles.len(),
        "Caller identified"
    );

    req.extensions_mut().insert(auth_context);

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::roles::UserRole;

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(bearer_token("Bearer abc.def.ghi").unwrap(), "abc.def.ghi");
        assert!(matches!(
            bearer_token("Basic dXNlcjpwYXNz"),
            Err(AuthError::InvalidFormat(_))
        ));
        assert!(matches!(bearer_token("Bearer "), Err(AuthError::InvalidFormat(_))));
    }

    #[test]
    fn test_unregistered_context() {
        let external_id = Uuid::new_v4();
        let ctx = AuthContext::unregistered(external_id, RoleSet::new());

        assert_eq!(ctx.external_id, external_id);
        assert!(ctx.person_id.is_none());
        assert!(!ctx.bypasses_entity_checks());
        assert!(!ctx.has_capability(Capability::OrganisationScoped));
    }

    #[test]
    fn test_super_role_context() {
        let roles: RoleSet = [UserRole::Thanos].into_iter().collect();
        let ctx = AuthContext::unregistered(Uuid::new_v4(), roles);
        assert!(ctx.bypasses_entity_checks());
    }

    #[test]
    fn test_auth_error_status_codes() {
        assert_eq!(
            AuthError::MissingCredentials.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AuthError::InvalidFormat("x".to_string()).into_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AuthError::InvalidToken("x".to_string()).into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AuthError::DatabaseError("x".to_string()).into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
