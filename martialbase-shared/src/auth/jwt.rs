/// Identity token handling
///
/// The upstream identity provider is opaque to MartialBase: it hands us a
/// bearer token whose `sub` is a stable external user id. Tokens are HS256
/// signed with a shared secret and may carry a `roles` claim with
/// organisation-scoped role names granted upstream.
///
/// # Validation
///
/// - **Algorithm**: HS256
/// - **Checks**: signature, `exp`, `nbf`, issuer
/// - **Secret**: at least 32 bytes
///
/// # Example
///
/// ```
/// use martialbase_shared::auth::jwt::{create_token, validate_token, IdentityClaims};
/// use uuid::Uuid;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let external_id = Uuid::new_v4();
/// let secret = "identity-secret-at-least-32-bytes-long";
///
/// let claims = IdentityClaims::new(external_id, "martialbase");
/// let token = create_token(&claims, secret)?;
///
/// let validated = validate_token(&token, secret, "martialbase")?;
/// assert_eq!(validated.sub, external_id);
/// # Ok(())
/// # }
/// ```

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::roles::UserRole;

/// Default lifetime of tokens minted by [`IdentityClaims::new`]
pub const DEFAULT_TOKEN_LIFETIME_HOURS: i64 = 1;

#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("Failed to create token: {0}")]
    CreateError(String),

    #[error("Failed to validate token: {0}")]
    ValidationError(String),

    #[error("Token has expired")]
    Expired,

    #[error("Invalid issuer: expected {expected}")]
    InvalidIssuer { expected: String },
}

/// Claims carried by an identity token
///
/// - `sub`: external user id (stable across sessions)
/// - `iss`, `iat`, `nbf`, `exp`: standard registered claims
/// - `roles`: roles granted by the identity provider, empty when absent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityClaims {
    pub sub: Uuid,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
    pub nbf: i64,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<UserRole>,
}

impl IdentityClaims {
    pub fn new(external_id: Uuid, issuer: &str) -> Self {
        Self::with_expiration(
            external_id,
            issuer,
            Duration::hours(DEFAULT_TOKEN_LIFETIME_HOURS),
        )
    }

    pub fn with_expiration(external_id: Uuid, issuer: &str, expires_in: Duration) -> Self {
        let now = Utc::now();

        Self {
            sub: external_id,
            iss: issuer.to_string(),
            iat: now.timestamp(),
            exp: (now + expires_in).timestamp(),
            nbf: now.timestamp(),
            roles: Vec::new(),
        }
    }

    /// Adds upstream role claims
    pub fn with_roles(mut self, roles: impl IntoIterator<Item = UserRole>) -> Self {
        self.roles.extend(roles);
        self
    }

    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() >= self.exp
    }
}

/// Signs `claims` with HS256
///
/// Used by tests and local tooling; production tokens come from the identity
/// provider.
pub fn create_token(claims: &IdentityClaims, secret: &str) -> Result<String, JwtError> {
    let header = Header::new(Algorithm::HS256);
    let key = EncodingKey::from_secret(secret.as_bytes());

    encode(&header, claims, &key)
        .map_err(|e| JwtError::CreateError(format!("Token encoding failed: {}", e)))
}

/// Verifies signature, validity window and issuer, then returns the claims
///
/// # Errors
///
/// - `JwtError::Expired` once `exp` has passed
/// - `JwtError::InvalidIssuer` when `iss` differs from `issuer`
/// - `JwtError::ValidationError` for anything else (bad signature, malformed
///   token, unknown role name in `roles`)
pub fn validate_token(token: &str, secret: &str, issuer: &str) -> Result<IdentityClaims, JwtError> {
    let key = DecodingKey::from_secret(secret.as_bytes());

    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[issuer]);
    validation.validate_exp = true;
    validation.validate_nbf = true;

    let token_data = decode::<IdentityClaims>(token, &key, &validation).map_err(|e| {
        match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => JwtError::Expired,
            jsonwebtoken::errors::ErrorKind::InvalidIssuer => JwtError::InvalidIssuer {
                expected: issuer.to_string(),
            },
            _ => JwtError::ValidationError(format!("Token validation failed: {}", e)),
        }
    })?;

    Ok(token_data.claims)
}
