//! JWT authentication.
//!
//! Tokens carry the caller's tenant and role. Issuing tokens belongs to the
//! account service; this server only validates them (the `token`
//! subcommand issues development tokens with the same key).
//!
//! Handlers take a [`TenantContext`] argument. The extractor reads the
//! bearer token from the `Authorization` header, or from `?token=` for
//! browser WebSockets that cannot set headers, and refuses tenants that are
//! not ACTIVE.

use axum::extract::{FromRequestParts, Query};
use axum::http::request::Parts;
use axum::http::header::AUTHORIZATION;
use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use vyapar_core::{Role, TenantContext};

use crate::error::{ApiError, ErrorCode};
use crate::AppState;

/// JWT claims structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (staff user id)
    pub sub: String,

    pub tenant_id: String,

    pub role: Role,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration (Unix timestamp)
    pub exp: i64,
}

/// JWT token manager.
pub struct JwtManager {
    secret: String,
    lifetime_secs: i64,
}

impl std::fmt::Debug for JwtManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtManager")
            .field("lifetime_secs", &self.lifetime_secs)
            .finish_non_exhaustive()
    }
}

impl JwtManager {
    pub fn new(secret: impl Into<String>, lifetime_secs: i64) -> Self {
        JwtManager {
            secret: secret.into(),
            lifetime_secs,
        }
    }

    pub fn issue(&self, subject: &str, tenant_id: &str, role: Role) -> Result<String, ApiError> {
        let now = Utc::now();
        let claims = Claims {
            sub: subject.to_string(),
            tenant_id: tenant_id.to_string(),
            role,
            iat: now.timestamp(),
            exp: (now + Duration::seconds(self.lifetime_secs)).timestamp(),
        };
        self.encode(&claims)
    }

    fn encode(&self, claims: &Claims) -> Result<String, ApiError> {
        encode(
            &Header::default(),
            claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| ApiError::internal(format!("Failed to generate token: {e}")))
    }

    /// Validate and decode a token.
    pub fn validate(&self, token: &str) -> Result<Claims, ApiError> {
        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::default(),
        )
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => ApiError::new(ErrorCode::TokenExpired, "Token expired"),
            _ => ApiError::unauthorized(format!("Invalid token: {e}")),
        })
    }
}

/// Extract bearer token from authorization header.
pub fn extract_bearer_token(auth_header: &str) -> Option<&str> {
    auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

#[derive(Debug, Default, Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

fn token_from_parts(parts: &Parts) -> Result<String, ApiError> {
    if let Some(header) = parts.headers.get(AUTHORIZATION) {
        return header
            .to_str()
            .ok()
            .and_then(extract_bearer_token)
            .map(str::to_string)
            .ok_or_else(|| ApiError::unauthorized("Invalid authorization header"));
    }

    Query::<TokenQuery>::try_from_uri(&parts.uri)
        .ok()
        .and_then(|Query(q)| q.token)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::unauthorized("Please login first"))
}

impl FromRequestParts<AppState> for TenantContext {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if let Some(tenant) = parts.extensions.get::<TenantContext>() {
            return Ok(tenant.clone());
        }

        let token = token_from_parts(parts).inspect_err(|_| {
            debug!(uri = %parts.uri, "Request without credentials");
        })?;
        let claims = state.jwt.validate(&token).inspect_err(|e| {
            warn!(uri = %parts.uri, error = %e, "Token rejected");
        })?;

        if !state.db.tenants().is_active(&claims.tenant_id).await? {
            warn!(tenant_id = %claims.tenant_id, "Request for inactive tenant");
            return Err(ApiError::new(
                ErrorCode::TenantInactive,
                format!("Tenant {} is not active", claims.tenant_id),
            ));
        }

        let tenant = TenantContext::new(claims.tenant_id, claims.role);
        parts.extensions.insert(tenant.clone());
        Ok(tenant)
    }
}

/// Catalogue and floor-plan changes are reserved for admins and managers.
pub fn require_manager(tenant: &TenantContext) -> Result<(), ApiError> {
    if tenant.can_manage() {
        Ok(())
    } else {
        Err(ApiError::forbidden(
            "This action requires the admin or manager role",
        ))
    }
}
