//! HTTP API for the kart league server.
//!
//! # Modules
//!
//! - [`auth`]: Admin login, token refresh and logout
//! - [`tournaments`], [`players`], [`matches`]: records with soft delete
//! - [`qualification`]: Group setup, standings and Time Attack times
//! - [`finals`]: Bracket creation and results, one handler set for every mode
//! - [`time_attack`]: Time Attack elimination phase
//! - [`participant`]: Score reports authenticated by tournament token
//! - [`export`]: CSV downloads
//! - [`middleware`], [`extract`], [`request_id`]: Cross-cutting request handling
//!
//! # Access
//!
//! Reads are public. Writes need an admin access token
//! (`Authorization: Bearer <jwt>`), except participant reports which carry
//! the tournament's `x-tournament-token`.
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use kl_server::{api::{create_router, AppState}, config::ServerConfig};
//! use kart_league::db::Database;
//! use std::sync::Arc;
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ServerConfig::from_env(None, None)?;
//! let db = Database::new(&config.database).await?;
//!
//! let state = AppState::new(Arc::new(db.pool().clone()), &config);
//! let app = create_router(state);
//!
//! let listener = tokio::net::TcpListener::bind(config.bind).await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```

pub mod audit;
pub mod auth;
pub mod error;
pub mod export;
pub mod extract;
pub mod finals;
pub mod matches;
pub mod middleware;
pub mod participant;
pub mod players;
pub mod qualification;
pub mod request_id;
pub mod time_attack;
pub mod tournaments;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{delete, get, patch, post, put},
};
use kart_league::{
    audit::AuditLogger,
    auth::AuthManager,
    cache::{MemoryStore, StandingsCache},
    db::PageRequest,
    finals::FinalsManager,
    matches::MatchManager,
    player::PlayerManager,
    qualification::QualificationManager,
    reporting::ReportManager,
    security::RateLimiter,
    time_attack::PhaseManager,
    tournament::TournamentManager,
};
use serde_json::json;
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::config::ServerConfig;

/// Application state shared across all HTTP handlers.
///
/// Cloned for each request; every manager is a thin handle over the pool.
#[derive(Clone)]
pub struct AppState {
    pub pool: Arc<PgPool>,
    pub auth_manager: Arc<AuthManager>,
    pub tournaments: TournamentManager,
    pub players: PlayerManager,
    pub matches: MatchManager,
    pub qualification: QualificationManager,
    pub finals: FinalsManager,
    pub phases: PhaseManager,
    pub reports: ReportManager,
    pub audit: AuditLogger,
    pub cache: StandingsCache,
    /// Backing store of `cache`, kept for periodic eviction
    pub cache_store: MemoryStore,
    pub rate_limiter: RateLimiter,
    /// Lifetime of participant tokens issued without an explicit one
    pub participant_token_ttl_hours: i64,
}

impl AppState {
    /// Wire every manager over one pool and one in-memory standings cache
    pub fn new(pool: Arc<PgPool>, config: &ServerConfig) -> Self {
        let cache_store = MemoryStore::new();
        let cache = StandingsCache::new(Arc::new(cache_store.clone()), config.cache_ttl);
        let audit = AuditLogger::new(pool.clone());
        let tournaments = TournamentManager::new(pool.clone());
        let qualification = QualificationManager::new(pool.clone(), cache.clone());
        let finals = FinalsManager::new(
            pool.clone(),
            tournaments.clone(),
            qualification.clone(),
            cache.clone(),
            audit.clone(),
        );
        let phases = PhaseManager::new(
            pool.clone(),
            tournaments.clone(),
            qualification.clone(),
            cache.clone(),
        );
        let reports = ReportManager::new(
            pool.clone(),
            tournaments.clone(),
            qualification.clone(),
            finals.clone(),
            audit.clone(),
        );

        Self {
            auth_manager: Arc::new(AuthManager::new(
                pool.clone(),
                config.security.password_pepper.clone(),
                config.security.jwt_secret.clone(),
            )),
            players: PlayerManager::new(pool.clone()),
            matches: MatchManager::new(pool.clone()),
            tournaments,
            qualification,
            finals,
            phases,
            reports,
            audit,
            cache,
            cache_store,
            rate_limiter: config.rate_limits.limiter(),
            participant_token_ttl_hours: config.participant_token_ttl_hours,
            pool,
        }
    }
}

/// Page request from optional `page` / `per_page` query parameters
pub fn page_request(page: Option<u32>, per_page: Option<u32>) -> PageRequest {
    let default = PageRequest::default();
    PageRequest::new(
        page.unwrap_or(default.page),
        per_page.unwrap_or(default.per_page),
    )
}

/// Create the complete API router.
///
/// ```text
/// GET    /health
///
/// POST   /api/v1/auth/login | /auth/refresh | /auth/logout
///
/// GET    /api/v1/tournaments                              public
/// GET    /api/v1/tournaments/{id}                         public
/// POST   /api/v1/tournaments                              admin
/// PATCH  /api/v1/tournaments/{id}                         admin
/// DELETE /api/v1/tournaments/{id}                         admin
/// POST   /api/v1/tournaments/{id}/restore                 admin
/// POST   /api/v1/tournaments/{id}/transition              admin
/// POST   /api/v1/tournaments/{id}/reopen                  admin
/// POST   /api/v1/tournaments/{id}/token                   admin
/// DELETE /api/v1/tournaments/{id}/token                   admin
///
/// GET    /api/v1/players[/{id}]                           public
/// POST   /api/v1/players, PATCH|DELETE /players/{id}      admin
/// POST   /api/v1/players/{id}/restore, PUT /players/{id}/user   admin
///
/// POST   /api/v1/tournaments/{id}/qualification/{mode}/groups     admin
/// GET    /api/v1/tournaments/{id}/qualification/{mode}/standings  public
/// GET    /api/v1/tournaments/{id}/qualification/{mode}/records    public
/// POST   /api/v1/tournaments/{id}/qualification/{mode}/recompute  admin
/// GET    /api/v1/tournaments/{id}/ta/times | /ta/ranking          public
/// POST   /api/v1/tournaments/{id}/ta/times                        admin
///
/// GET    /api/v1/matches[/{id}]                           public
/// PUT    /api/v1/matches/{id}/score                       admin
/// GET    /api/v1/matches/{id}/reports                     admin
/// DELETE /api/v1/matches/{id}, POST /matches/{id}/restore admin
///
/// GET    /api/v1/tournaments/{id}/finals/{mode}                    public
/// POST   /api/v1/tournaments/{id}/finals/{mode}                    admin
/// POST   /api/v1/tournaments/{id}/finals/{mode}/matches/{number}   admin
///
/// GET    /api/v1/tournaments/{id}/ta/phase                public
/// POST   /api/v1/tournaments/{id}/ta/phase                admin
/// DELETE /api/v1/tournaments/{id}/ta/phase                admin
/// POST   /api/v1/tournaments/{id}/ta/phase/rounds         admin
///
/// POST   /api/v1/tournaments/{id}/matches/{match_id}/report        tournament token
///
/// GET    /api/v1/tournaments/{id}/export/{mode}/{standings|matches|placements}  admin
/// GET    /api/v1/audit                                    admin
/// ```
pub fn create_router(state: AppState) -> Router {
    let v1_routes = create_v1_router(state.clone());

    Router::new()
        .route("/health", get(health_check))
        .nest("/api/v1", v1_routes)
        .route_layer(axum::middleware::from_fn(middleware::track_metrics))
        .layer(axum::middleware::from_fn(request_id::request_id_middleware))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn create_v1_router(state: AppState) -> Router<AppState> {
    let public_routes = Router::new()
        .route("/auth/login", post(auth::login))
        .route("/auth/refresh", post(auth::refresh_token))
        .route("/auth/logout", post(auth::logout))
        .route("/tournaments", get(tournaments::list_tournaments))
        .route("/tournaments/{id}", get(tournaments::get_tournament))
        .route("/players", get(players::list_players))
        .route("/players/{id}", get(players::get_player))
        .route(
            "/tournaments/{id}/qualification/{mode}/standings",
            get(qualification::standings),
        )
        .route(
            "/tournaments/{id}/qualification/{mode}/records",
            get(qualification::records),
        )
        .route("/tournaments/{id}/ta/times", get(qualification::ta_entries))
        .route("/tournaments/{id}/ta/ranking", get(qualification::ta_ranking))
        .route("/matches", get(matches::list_matches))
        .route("/matches/{id}", get(matches::get_match))
        .route("/tournaments/{id}/finals/{mode}", get(finals::get_bracket))
        .route("/tournaments/{id}/ta/phase", get(time_attack::get_phase))
        .route(
            "/tournaments/{id}/matches/{match_id}/report",
            post(participant::report_score),
        );

    // Same paths as some public GETs; merged method routers keep both
    let admin_routes = Router::new()
        .route("/tournaments", post(tournaments::create_tournament))
        .route(
            "/tournaments/{id}",
            patch(tournaments::update_tournament)
                .delete(tournaments::delete_tournament),
        )
        .route("/tournaments/{id}/restore", post(tournaments::restore_tournament))
        .route(
            "/tournaments/{id}/transition",
            post(tournaments::transition_tournament),
        )
        .route("/tournaments/{id}/reopen", post(tournaments::reopen_tournament))
        .route(
            "/tournaments/{id}/token",
            post(tournaments::issue_token).delete(tournaments::revoke_token),
        )
        .route("/players", post(players::create_player))
        .route(
            "/players/{id}",
            patch(players::update_player).delete(players::delete_player),
        )
        .route("/players/{id}/restore", post(players::restore_player))
        .route("/players/{id}/user", put(players::link_user))
        .route(
            "/tournaments/{id}/qualification/{mode}/groups",
            post(qualification::setup_groups),
        )
        .route(
            "/tournaments/{id}/qualification/{mode}/recompute",
            post(qualification::recompute),
        )
        .route("/tournaments/{id}/ta/times", post(qualification::record_ta_time))
        .route("/matches/{id}", delete(matches::delete_match))
        .route("/matches/{id}/score", put(matches::update_score))
        .route("/matches/{id}/reports", get(matches::list_reports))
        .route("/matches/{id}/restore", post(matches::restore_match))
        .route(
            "/tournaments/{id}/finals/{mode}",
            post(finals::create_bracket),
        )
        .route(
            "/tournaments/{id}/finals/{mode}/matches/{number}",
            post(finals::record_result),
        )
        .route(
            "/tournaments/{id}/ta/phase",
            post(time_attack::start_phase).delete(time_attack::reset_phase),
        )
        .route("/tournaments/{id}/ta/phase/rounds", post(time_attack::submit_round))
        .route(
            "/tournaments/{id}/export/{mode}/standings",
            get(export::standings_csv),
        )
        .route(
            "/tournaments/{id}/export/{mode}/matches",
            get(export::matches_csv),
        )
        .route(
            "/tournaments/{id}/export/{mode}/placements",
            get(export::placements_csv),
        )
        .route("/audit", get(audit::list_audit))
        .route_layer(axum::middleware::from_fn_with_state(
            state,
            middleware::auth_middleware,
        ));

    Router::new().merge(public_routes).merge(admin_routes)
}

/// Health check endpoint for monitoring and load balancers.
///
/// Returns `200 OK` when the database answers, `503 Service Unavailable` otherwise.
///
/// ```bash
/// curl http://localhost:6969/health
/// # {"status":"healthy","database":true,"cache":{"hits":12,"misses":3},...}
/// ```
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let db_healthy = kart_league::db::timeouts::with_default_timeout(
        sqlx::query("SELECT 1").execute(state.pool.as_ref()),
    )
    .await
    .is_ok();

    let status_code = if db_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let response = json!({
        "status": if db_healthy { "healthy" } else { "unhealthy" },
        "version": env!("CARGO_PKG_VERSION"),
        "database": db_healthy,
        "cache": state.cache.stats(),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    });

    (status_code, Json(response))
}
