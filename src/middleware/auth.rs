//! Bearer-token authentication.
//!
//! Access tokens are issued by the identity provider and signed with a shared
//! HS256 secret. The `sub` claim carries the user's UUID.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::settings::AuthConfig;
use crate::models::AppRole;
use crate::utils::error::{AppError, AppResult};
use crate::AppState;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// Decoding key and validation rules, built once from settings.
#[derive(Clone)]
pub struct JwtVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    pub fn new(config: &AuthConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        match config.jwt_audience.as_deref().filter(|a| !a.trim().is_empty()) {
            Some(audience) => validation.set_audience(&[audience]),
            None => validation.validate_aud = false,
        }

        Self {
            key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            validation,
        }
    }

    pub fn verify(&self, token: &str) -> AppResult<Uuid> {
        let data = decode::<Claims>(token, &self.key, &self.validation).map_err(|e| {
            tracing::debug!(error = %e, "Rejected access token");
            unauthorized()
        })?;

        Uuid::parse_str(&data.claims.sub).map_err(|_| unauthorized())
    }
}

fn unauthorized() -> AppError {
    AppError::AuthError("Unauthorized".to_string())
}

/// The caller of an authenticated route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser {
    pub user_id: Uuid,
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or_else(unauthorized)?;

        let user_id = state.jwt.verify(token)?;
        Ok(AuthUser { user_id })
    }
}

pub async fn require_admin(state: &AppState, user: &AuthUser) -> AppResult<()> {
    if state.store.has_role(user.user_id, AppRole::Admin).await? {
        Ok(())
    } else {
        Err(AppError::Forbidden("Admin only".to_string()))
    }
}
