/**
 * Authentication Routes
 * Admin login/logout with a JWT carried as a Bearer header or an HttpOnly cookie
 */
use axum::{
    extract::{ConnectInfo, FromRequestParts, State},
    http::{header, request::Parts, HeaderMap, HeaderValue, StatusCode},
    response::IntoResponse,
    Json,
};
use bcrypt::verify;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    net::{IpAddr, Ipv4Addr, SocketAddr},
    time::Instant,
};
use tokio::sync::RwLock;

use crate::config::AuthConfig;
use crate::error::{AppError, AppResult};
use crate::routes::AppJson;
use crate::state::AppState;

/// Name of the cookie holding the admin token
pub const AUTH_COOKIE: &str = "admin_token";

// ============================================================================
// Types
// ============================================================================

/// JWT Claims structure
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,   // Admin ID
    pub email: String, // Admin email
    pub exp: i64,      // Expiry timestamp
    pub iat: i64,      // Issued at timestamp
}

/// Admin info returned to the frontend
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct AdminInfo {
    pub admin_id: String,
    pub email: String,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub success: bool,
    pub admin: AdminInfo,
    pub access_token: String,
    pub expires_in: i64,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
    pub success: bool,
    pub is_valid: bool,
    pub admin: Option<AdminInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct LogoutResponse {
    pub success: bool,
}

// ============================================================================
// Token helpers
// ============================================================================

pub fn create_access_token(
    auth: &AuthConfig,
    admin_id: &str,
    email: &str,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = Utc::now();
    let exp = now + Duration::hours(auth.token_expiry_hours);

    let claims = Claims {
        sub: admin_id.to_string(),
        email: email.to_string(),
        exp: exp.timestamp(),
        iat: now.timestamp(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(auth.jwt_secret.as_bytes()),
    )
}

pub fn verify_access_token(
    auth: &AuthConfig,
    token: &str,
) -> Result<Claims, jsonwebtoken::errors::Error> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(auth.jwt_secret.as_bytes()),
        &Validation::default(),
    )?;
    Ok(token_data.claims)
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|s| s.trim().to_string())
}

fn cookie_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == AUTH_COOKIE)
        .map(|(_, value)| value.to_string())
        .filter(|value| !value.is_empty())
}

/// Bearer header first, then the auth cookie.
pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    bearer_token(headers).or_else(|| cookie_token(headers))
}

fn auth_cookie(value: &str, max_age_secs: i64, secure: bool) -> String {
    let mut cookie = format!(
        "{AUTH_COOKIE}={value}; HttpOnly; SameSite=Lax; Path=/; Max-Age={max_age_secs}"
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

fn set_cookie_header(cookie: String) -> AppResult<[(header::HeaderName, HeaderValue); 1]> {
    let value = HeaderValue::from_str(&cookie)
        .map_err(|e| AppError::Internal(format!("invalid cookie header: {e}")))?;
    Ok([(header::SET_COOKIE, value)])
}

// ============================================================================
// Rate limiting
// ============================================================================

/// Fixed-window login throttle keyed by client IP.
#[derive(Debug)]
pub struct LoginLimiter {
    max_attempts: u32,
    window: std::time::Duration,
    attempts: RwLock<HashMap<IpAddr, (Instant, u32)>>,
}

impl LoginLimiter {
    pub fn new(max_attempts: u32, window: std::time::Duration) -> Self {
        Self {
            max_attempts,
            window,
            attempts: RwLock::new(HashMap::new()),
        }
    }

    pub fn from_config(auth: &AuthConfig) -> Self {
        Self::new(
            auth.login_max_attempts,
            std::time::Duration::from_secs(auth.login_window_secs),
        )
    }

    /// Records an attempt from `ip`. Returns `false` once the window's budget is spent.
    ///
    /// Expired windows are evicted on every call so the map only holds active IPs.
    pub async fn check(&self, ip: IpAddr) -> bool {
        let now = Instant::now();
        let mut attempts = self.attempts.write().await;
        attempts.retain(|_, (started, _)| now.duration_since(*started) < self.window);

        let (_, count) = attempts.entry(ip).or_insert((now, 0));
        if *count >= self.max_attempts {
            return false;
        }
        *count += 1;
        true
    }

    /// Forget `ip` after a successful login.
    pub async fn reset(&self, ip: IpAddr) {
        self.attempts.write().await.remove(&ip);
    }
}

// ============================================================================
// Extractor
// ============================================================================

/// Peer address of the connection. Unspecified when the server was not
/// started with connect info.
#[derive(Debug, Clone, Copy)]
pub struct ClientIp(pub IpAddr);

impl<S: Send + Sync> FromRequestParts<S> for ClientIp {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let ip = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip())
            .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        Ok(ClientIp(ip))
    }
}

/// An authenticated administrator. Rejects with 401 when the token is
/// missing, malformed or expired.
#[derive(Debug, Clone)]
pub struct AdminSession {
    pub admin_id: String,
    pub email: String,
}

impl FromRequestParts<AppState> for AdminSession {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_token(&parts.headers)
            .ok_or_else(|| AppError::Unauthorized("Authorization required".to_string()))?;

        let claims = verify_access_token(&state.config.auth, &token).map_err(|e| {
            tracing::debug!("Token verification failed: {}", e);
            AppError::Unauthorized("Invalid or expired token".to_string())
        })?;

        Ok(AdminSession {
            admin_id: claims.sub,
            email: claims.email,
        })
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    AppJson(payload): AppJson<LoginRequest>,
) -> AppResult<impl IntoResponse> {
    if !state.login_limiter.check(ip).await {
        tracing::warn!(ip = %ip, "Login rate limit exceeded");
        return Err(AppError::TooManyRequests(
            "Too many login attempts. Please try again later.".to_string(),
        ));
    }

    if payload.email.trim().is_empty() || payload.password.is_empty() {
        return Err(AppError::Validation(
            "Email and password are required".to_string(),
        ));
    }

    if !payload.email.contains('@') {
        return Err(AppError::Validation("Invalid email format".to_string()));
    }

    let invalid = || AppError::Unauthorized("Invalid credentials".to_string());

    let admin = match state.store.find_admin_by_email(&payload.email).await {
        Ok(Some(admin)) => admin,
        Ok(None) => {
            tracing::warn!("Login attempt for unknown admin: {}", payload.email);
            return Err(invalid());
        }
        Err(e) => return Err(AppError::Database(e)),
    };

    // bcrypt is CPU-bound; keep the async executor free.
    let password = payload.password;
    let hash = admin.password_hash.clone();
    let password_ok = tokio::task::spawn_blocking(move || verify(password, &hash).unwrap_or(false))
        .await
        .unwrap_or(false);

    if !password_ok {
        tracing::warn!("Failed login attempt for: {}", admin.email);
        return Err(invalid());
    }

    let admin_id = admin.id.to_string();
    let access_token = create_access_token(&state.config.auth, &admin_id, &admin.email)
        .map_err(|e| AppError::Internal(format!("Failed to create token: {e}")))?;

    let expires_in = state.config.auth.token_expiry_hours * 3600;
    let cookie = auth_cookie(&access_token, expires_in, state.config.is_production());

    state.login_limiter.reset(ip).await;
    tracing::info!("Successful login for admin: {}", admin.email);

    Ok((
        StatusCode::OK,
        set_cookie_header(cookie)?,
        Json(LoginResponse {
            success: true,
            admin: AdminInfo {
                admin_id,
                email: admin.email,
            },
            access_token,
            expires_in,
        }),
    ))
}

/// POST /api/auth/verify
pub async fn verify_token(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    let Some(token) = extract_token(&headers) else {
        return Json(VerifyResponse {
            success: false,
            is_valid: false,
            admin: None,
            error: Some("No authorization token provided".to_string()),
        });
    };

    match verify_access_token(&state.config.auth, &token) {
        Ok(claims) => Json(VerifyResponse {
            success: true,
            is_valid: true,
            admin: Some(AdminInfo {
                admin_id: claims.sub,
                email: claims.email,
            }),
            error: None,
        }),
        Err(e) => {
            tracing::debug!("Token verification failed: {}", e);
            Json(VerifyResponse {
                success: false,
                is_valid: false,
                admin: None,
                error: Some("Invalid or expired token".to_string()),
            })
        }
    }
}

/// POST /api/auth/logout
/// Always succeeds; expires the auth cookie.
pub async fn logout(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let cookie = auth_cookie("", 0, state.config.is_production());
    Ok((
        StatusCode::OK,
        set_cookie_header(cookie)?,
        Json(LogoutResponse { success: true }),
    ))
}
