//! Authentication and authorization

use chrono::{Duration, Utc};
use core_kernel::{ActorId, OrgId, RequestContext};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// JWT claims
///
/// Every token is scoped to one organization; the request context handed
/// to the engine is built from `org` and `sub`, never from ambient state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (actor ID)
    pub sub: String,
    /// Organization the token is scoped to
    pub org: String,
    /// Actor's roles
    pub roles: Vec<String>,
    /// Expiration timestamp
    pub exp: i64,
    /// Issued at timestamp
    pub iat: i64,
}

/// Auth errors
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid token")]
    InvalidToken,
    #[error("Token expired")]
    TokenExpired,
    #[error("Malformed claims: {0}")]
    MalformedClaims(String),
}

impl Claims {
    /// Builds the tenancy context the engine operates under
    ///
    /// # Errors
    ///
    /// Returns `AuthError::MalformedClaims` when `org` or `sub` is not a
    /// valid identifier.
    pub fn request_context(&self) -> Result<RequestContext, AuthError> {
        let org_id: OrgId = self
            .org
            .parse()
            .map_err(|_| AuthError::MalformedClaims(format!("invalid org claim: {}", self.org)))?;
        let actor_id: ActorId = self
            .sub
            .parse()
            .map_err(|_| AuthError::MalformedClaims(format!("invalid sub claim: {}", self.sub)))?;
        Ok(RequestContext::new(org_id, actor_id))
    }
}

/// Creates a new JWT token
///
/// # Arguments
///
/// * `org_id` - Organization the token grants access to
/// * `actor_id` - Acting user or system identity
/// * `roles` - Actor's roles
/// * `secret` - JWT secret key
/// * `expiration_secs` - Token validity in seconds
pub fn create_token(
    org_id: OrgId,
    actor_id: ActorId,
    roles: Vec<String>,
    secret: &str,
    expiration_secs: u64,
) -> Result<String, AuthError> {
    let now = Utc::now();
    let exp = now + Duration::seconds(expiration_secs as i64);

    let claims = Claims {
        sub: actor_id.to_string(),
        org: org_id.to_string(),
        roles,
        exp: exp.timestamp(),
        iat: now.timestamp(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|_| AuthError::InvalidToken)
}

/// Validates a JWT token
///
/// # Arguments
///
/// * `token` - The JWT token to validate
/// * `secret` - JWT secret key
pub fn validate_token(token: &str, secret: &str) -> Result<Claims, AuthError> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| {
        if e.to_string().contains("ExpiredSignature") {
            AuthError::TokenExpired
        } else {
            AuthError::InvalidToken
        }
    })?;

    Ok(token_data.claims)
}

/// Checks if the actor has the required role
pub fn has_role(claims: &Claims, required_role: &str) -> bool {
    claims.roles.iter().any(|r| r == required_role || r == "admin")
}

/// Role definitions
pub mod roles {
    pub const CUSTOMER_WRITE: &str = "customer:write";
    pub const SERVICE_WRITE: &str = "service:write";
    pub const RULE_WRITE: &str = "rule:write";
    pub const LEDGER_WRITE: &str = "ledger:write";
    pub const LEDGER_ADJUST: &str = "ledger:adjust";
    pub const LEDGER_SWEEP: &str = "ledger:sweep";
}
