//! Admin authentication handlers.
//!
//! Login:
//! ```bash
//! curl -X POST http://localhost:6969/api/v1/auth/login \
//!   -H "Content-Type: application/json" \
//!   -d '{"username": "race_control", "password": "Pass123!"}'
//! ```

use axum::{Json, extract::State, http::StatusCode};
use kart_league::{
    audit::{Actor, AuditEntry, actions},
    auth::LoginRequest,
    security::{RateLimitResult, rate_limiter::LOGIN},
};
use serde::{Deserialize, Serialize};

use super::{
    AppState,
    error::{ApiError, ApiResult},
    extract::ClientIp,
};
use crate::{logging, metrics};

#[derive(Debug, Deserialize)]
pub struct LoginPayload {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshPayload {
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds
    pub expires_in: i64,
    pub user_id: i64,
    pub username: String,
}

/// Authenticate an admin and issue session tokens.
///
/// # Errors
///
/// - `401 Unauthorized`: Unknown user or wrong password (same message for both)
/// - `403 Forbidden`: Account disabled
/// - `429 Too Many Requests`: Too many attempts from this client
pub async fn login(
    State(state): State<AppState>,
    client_ip: ClientIp,
    Json(payload): Json<LoginPayload>,
) -> ApiResult<Json<AuthResponse>> {
    let identity = client_ip.identity(&payload.username);
    if let Ok(RateLimitResult::Locked { retry_after }) =
        state.rate_limiter.check_and_record(LOGIN, &identity).await
    {
        metrics::rate_limit_hits_total(LOGIN);
        logging::log_security_event(
            "login_rate_limited",
            None,
            client_ip.0.as_deref(),
            "Login attempts locked out",
        );
        return Err(ApiError::RateLimited { retry_after });
    }

    let request = LoginRequest {
        username: payload.username,
        password: payload.password,
    };

    match state.auth_manager.login(request).await {
        Ok((user, tokens)) => {
            metrics::login_attempts_total(true);
            state.rate_limiter.reset(LOGIN, &identity).await;
            state
                .audit
                .record(
                    AuditEntry::new(
                        Actor::Admin { user_id: user.id },
                        actions::ADMIN_LOGIN,
                        "user",
                        Some(user.id),
                    )
                    .with_client(client_ip.0.clone(), None),
                )
                .await;
            Ok(Json(AuthResponse {
                access_token: tokens.access_token,
                refresh_token: tokens.refresh_token,
                expires_in: tokens.expires_in,
                user_id: user.id,
                username: user.username,
            }))
        }
        Err(e) => {
            metrics::login_attempts_total(false);
            logging::log_security_event(
                "failed_login",
                None,
                client_ip.0.as_deref(),
                &e.to_string(),
            );
            Err(e.into())
        }
    }
}

/// Exchange a refresh token for a new token pair.
///
/// The old refresh token is consumed; replaying it fails with `401`.
pub async fn refresh_token(
    State(state): State<AppState>,
    Json(payload): Json<RefreshPayload>,
) -> ApiResult<Json<AuthResponse>> {
    let tokens = state
        .auth_manager
        .refresh_token(&payload.refresh_token)
        .await?;
    let claims = state.auth_manager.verify_access_token(&tokens.access_token)?;
    Ok(Json(AuthResponse {
        access_token: tokens.access_token,
        refresh_token: tokens.refresh_token,
        expires_in: tokens.expires_in,
        user_id: claims.sub,
        username: claims.username,
    }))
}

/// Invalidate a refresh token. Access tokens stay valid until they expire.
pub async fn logout(
    State(state): State<AppState>,
    Json(payload): Json<RefreshPayload>,
) -> ApiResult<StatusCode> {
    state.auth_manager.logout(&payload.refresh_token).await?;
    Ok(StatusCode::NO_CONTENT)
}
