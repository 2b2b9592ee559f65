//! Admin authentication and request metrics middleware.
//!
//! # Usage
//!
//! ```rust,no_run
//! use axum::{Router, routing::post, middleware};
//! # use kl_server::api::middleware::auth_middleware;
//! # use kl_server::api::AppState;
//! # async fn handler() {}
//! # let state: AppState = unimplemented!();
//!
//! let admin_routes: Router<AppState> = Router::new()
//!     .route("/tournaments", post(handler))
//!     .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));
//! # let _ = admin_routes;
//! ```
//!
//! Handlers behind the layer read the admin from request extensions:
//!
//! ```rust,no_run
//! use axum::extract::Extension;
//! # use kl_server::api::middleware::AdminUser;
//!
//! async fn protected_handler(Extension(admin): Extension<AdminUser>) -> String {
//!     format!("Authenticated as {}", admin.username)
//! }
//! # let _ = protected_handler;
//! ```

use axum::{
    extract::{MatchedPath, Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::{IntoResponse, Response},
};
use kart_league::{audit::Actor, auth::UserId};
use std::time::Instant;

use super::{AppState, error::ApiError};
use crate::metrics;

/// The authenticated admin of a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminUser {
    pub user_id: UserId,
    pub username: String,
}

impl AdminUser {
    pub fn actor(&self) -> Actor {
        Actor::Admin {
            user_id: self.user_id,
        }
    }
}

/// Extract the token of an `Authorization: Bearer <token>` header
pub fn bearer_token(request: &Request) -> Option<&str> {
    request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Validate the JWT access token and inject [`AdminUser`].
///
/// Missing, malformed, invalid and expired tokens all answer `401 Unauthorized`.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(token) = bearer_token(&request) else {
        return ApiError::Unauthorized.into_response();
    };

    match state.auth_manager.verify_access_token(token) {
        Ok(claims) => {
            request.extensions_mut().insert(AdminUser {
                user_id: claims.sub,
                username: claims.username,
            });
            next.run(request).await
        }
        Err(e) => {
            tracing::debug!(error = %e, "Rejected access token");
            ApiError::Unauthorized.into_response()
        }
    }
}

/// Count requests and record their duration per route template
pub async fn track_metrics(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());

    let response = next.run(request).await;

    let elapsed = start.elapsed();
    metrics::http_requests_total(&method, &path, response.status().as_u16());
    metrics::http_request_duration_ms(&method, &path, elapsed.as_secs_f64() * 1000.0);
    response
}
