//! JWT authentication module.
//!
//! Tokens carry the caller identity the workflows authorize against:
//! `{ sub, role, companyId, branchId? }`. Token issuance is provided for the
//! `issue-token` command and tests; credential checking lives elsewhere.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use chrono::{Duration, Utc};
use gon_core::{CallerIdentity, Role};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, TokenData, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ServiceError;
use crate::AppState;

/// JWT claims structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    /// Subject (user id)
    pub sub: String,

    pub role: Role,

    pub company_id: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch_id: Option<i64>,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration (Unix timestamp)
    pub exp: i64,

    /// JWT ID (unique identifier for this token)
    pub jti: String,
}

impl Claims {
    pub fn identity(&self) -> Result<CallerIdentity, ServiceError> {
        let user_id = self
            .sub
            .parse::<i64>()
            .map_err(|_| ServiceError::Unauthenticated("Token subject is not a user id".to_string()))?;

        Ok(CallerIdentity {
            user_id,
            role: self.role,
            company_id: self.company_id,
            branch_id: self.branch_id,
        })
    }
}

/// JWT token manager.
pub struct JwtManager {
    secret: String,
    lifetime_secs: i64,
}

impl JwtManager {
    pub fn new(secret: String, lifetime_secs: i64) -> Self {
        JwtManager {
            secret,
            lifetime_secs,
        }
    }

    /// Signs a token for `identity`.
    pub fn issue_token(&self, identity: &CallerIdentity) -> Result<String, ServiceError> {
        let now = Utc::now();
        let exp = now + Duration::seconds(self.lifetime_secs);

        let claims = Claims {
            sub: identity.user_id.to_string(),
            role: identity.role,
            company_id: identity.company_id,
            branch_id: identity.branch_id,
            iat: now.timestamp(),
            exp: exp.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| ServiceError::Unexpected(format!("Failed to generate token: {}", e)))
    }

    /// Validate and decode a token.
    pub fn validate_token(&self, token: &str) -> Result<Claims, ServiceError> {
        let token_data: TokenData<Claims> = decode(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::default(),
        )
        .map_err(|e| ServiceError::Unauthenticated(format!("Invalid token: {}", e)))?;

        Ok(token_data.claims)
    }
}

/// Extract bearer token from authorization header.
pub fn extract_bearer_token(auth_header: &str) -> Option<&str> {
    auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Authenticated caller, extracted from the `Authorization` header.
#[derive(Debug, Clone, Copy)]
pub struct Caller(pub CallerIdentity);

#[async_trait]
impl FromRequestParts<AppState> for Caller {
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| ServiceError::Unauthenticated("Missing bearer token".to_string()))?;

        let token = extract_bearer_token(header)
            .ok_or_else(|| ServiceError::Unauthenticated("Malformed authorization header".to_string()))?;

        let claims = state.jwt.validate_token(token)?;
        Ok(Caller(claims.identity()?))
    }
}
