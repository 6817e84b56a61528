/*!
 * # Authentication and Authorization
 *
 * Two kinds of credentials are accepted on protected routes:
 *
 * - HS256 JWTs issued by [`AuthService::login`], sent as `Authorization: Bearer <token>`
 * - the static legacy API key, sent as `X-API-Key` or as the bearer value
 *
 * [`require_auth`] resolves either into an [`AuthPrincipal`] stored in the
 * request extensions; [`require_admin`] then checks the role.
 */

pub mod password;

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::models::{user, UserRole};
use crate::store::UserStore;

const API_KEY_HEADER: &str = "x-api-key";

/// Claims carried by issued tokens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenClaims {
    pub id: Uuid,
    pub employee_code: String,
    pub role: UserRole,
    pub iat: i64,
    pub exp: i64,
}

/// Who is calling, as resolved by [`require_auth`].
#[derive(Debug, Clone, PartialEq)]
pub enum AuthPrincipal {
    User(TokenClaims),
    /// The shared legacy key. It predates roles and keeps full access.
    LegacyKey,
}

impl AuthPrincipal {
    pub fn is_admin(&self) -> bool {
        match self {
            AuthPrincipal::User(claims) => claims.role == UserRole::Admin,
            AuthPrincipal::LegacyKey => true,
        }
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Authentication required")]
    MissingCredentials,
    #[error("Invalid or expired token")]
    InvalidToken,
    #[error("Invalid API key")]
    InvalidApiKey,
    #[error("Invalid employee code or account inactive")]
    UnknownEmployee,
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Admin access required")]
    AdminRequired,
    #[error("Token creation failed: {0}")]
    TokenCreation(String),
}

impl From<AuthError> for ServiceError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::AdminRequired => ServiceError::Forbidden(err.to_string()),
            AuthError::TokenCreation(msg) => ServiceError::InternalError(msg),
            other => ServiceError::Unauthorized(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub employee_code: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct LoginUser {
    pub id: Uuid,
    pub employee_code: String,
    pub name: String,
    pub role: UserRole,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LoginResponse {
    pub token: String,
    pub token_type: String,
    /// Token lifetime in seconds.
    pub expires_in: u64,
    pub user: LoginUser,
}

/// Issues and checks credentials.
#[derive(Clone)]
pub struct AuthService {
    jwt_secret: String,
    expiration: Duration,
    legacy_api_key: Option<String>,
    users: Arc<dyn UserStore>,
}

impl AuthService {
    pub fn new(
        jwt_secret: impl Into<String>,
        expiration: Duration,
        legacy_api_key: Option<String>,
        users: Arc<dyn UserStore>,
    ) -> Self {
        Self {
            jwt_secret: jwt_secret.into(),
            expiration,
            legacy_api_key: legacy_api_key.filter(|k| !k.is_empty()),
            users,
        }
    }

    pub fn issue_token(&self, user: &user::Model) -> Result<String, AuthError> {
        let now = Utc::now();
        let lifetime = ChronoDuration::from_std(self.expiration)
            .map_err(|_| AuthError::TokenCreation("Invalid token duration".to_string()))?;
        let claims = TokenClaims {
            id: user.id,
            employee_code: user.employee_code.clone(),
            role: user.role,
            iat: now.timestamp(),
            exp: (now + lifetime).timestamp(),
        };
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_bytes()),
        )
        .map_err(|e| AuthError::TokenCreation(e.to_string()))
    }

    pub fn validate_token(&self, token: &str) -> Result<TokenClaims, AuthError> {
        decode::<TokenClaims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_bytes()),
            &Validation::new(Algorithm::HS256),
        )
        .map(|data| data.claims)
        .map_err(|e| {
            debug!(error = %e, "token rejected");
            AuthError::InvalidToken
        })
    }

    fn is_legacy_key(&self, candidate: &str) -> bool {
        self.legacy_api_key
            .as_deref()
            .is_some_and(|key| constant_time_eq(key.as_bytes(), candidate.as_bytes()))
    }

    /// Resolves request headers into a principal.
    pub fn authenticate(&self, headers: &HeaderMap) -> Result<AuthPrincipal, AuthError> {
        if let Some(value) = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
        {
            let token = value.strip_prefix("Bearer ").unwrap_or(value).trim();
            if token.is_empty() {
                return Err(AuthError::MissingCredentials);
            }
            if self.is_legacy_key(token) {
                return Ok(AuthPrincipal::LegacyKey);
            }
            return self.validate_token(token).map(AuthPrincipal::User);
        }

        if let Some(key) = headers.get(API_KEY_HEADER).and_then(|v| v.to_str().ok()) {
            return if self.is_legacy_key(key.trim()) {
                Ok(AuthPrincipal::LegacyKey)
            } else {
                Err(AuthError::InvalidApiKey)
            };
        }

        Err(AuthError::MissingCredentials)
    }

    /// Signs a staff member in by employee code, or by username and password.
    ///
    /// Only active accounts may sign in. An account with a password hash must
    /// also present the matching password, whichever identifier was used.
    pub async fn login(&self, request: LoginRequest) -> Result<LoginResponse, ServiceError> {
        let employee_code = request
            .employee_code
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty());
        let username = request
            .username
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty());

        let user = match (employee_code, username) {
            (Some(code), _) => self
                .users
                .find_user_by_employee_code(code)
                .await
                .map_err(|e| ServiceError::dependency("Failed to look up user", e))?
                .filter(user::Model::is_active)
                .ok_or(AuthError::UnknownEmployee)?,
            (None, Some(username)) => {
                if request.password.is_none() {
                    return Err(AuthError::InvalidCredentials.into());
                }
                self.users
                    .find_user_by_username(username)
                    .await
                    .map_err(|e| ServiceError::dependency("Failed to look up user", e))?
                    .filter(user::Model::is_active)
                    .ok_or(AuthError::InvalidCredentials)?
            }
            (None, None) => {
                return Err(ServiceError::ValidationError(
                    "Employee code is required".to_string(),
                ))
            }
        };

        if let Some(hash) = user.password_hash.as_deref() {
            let supplied = request.password.as_deref().unwrap_or_default();
            if !password::verify_password(supplied, hash) {
                warn!(employee_code = %user.employee_code, "password mismatch on login");
                return Err(AuthError::InvalidCredentials.into());
            }
        }

        let token = self.issue_token(&user)?;
        info!(employee_code = %user.employee_code, "login succeeded");
        Ok(LoginResponse {
            token,
            token_type: "Bearer".to_string(),
            expires_in: self.expiration.as_secs(),
            user: LoginUser {
                id: user.id,
                employee_code: user.employee_code,
                name: user.name,
                role: user.role,
            },
        })
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Rejects requests without valid credentials and stores the resolved
/// [`AuthPrincipal`] in the request extensions.
pub async fn require_auth(
    State(auth): State<Arc<AuthService>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ServiceError> {
    let principal = auth.authenticate(request.headers())?;
    request.extensions_mut().insert(principal);
    Ok(next.run(request).await)
}

/// Must run after [`require_auth`].
pub async fn require_admin(request: Request, next: Next) -> Result<Response, ServiceError> {
    match request.extensions().get::<AuthPrincipal>() {
        Some(principal) if principal.is_admin() => Ok(next.run(request).await),
        Some(_) => Err(AuthError::AdminRequired.into()),
        None => Err(AuthError::MissingCredentials.into()),
    }
}

/// Extension methods for Router to add auth middleware
pub trait AuthRouterExt {
    fn with_auth(self, auth: Arc<AuthService>) -> Self;
    fn with_admin(self, auth: Arc<AuthService>) -> Self;
}

impl<S> AuthRouterExt for axum::Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn with_auth(self, auth: Arc<AuthService>) -> Self {
        self.layer(axum::middleware::from_fn_with_state(auth, require_auth))
    }

    fn with_admin(self, auth: Arc<AuthService>) -> Self {
        self.layer(axum::middleware::from_fn(require_admin))
            .with_auth(auth)
    }
}
