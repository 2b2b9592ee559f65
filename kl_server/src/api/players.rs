//! Player handlers.

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use kart_league::{
    audit::{AuditEntry, actions},
    db::{Page, SoftDeletable},
    player::{CreatePlayer, Player, PlayerId, UpdatePlayer},
};
use serde::Deserialize;

use super::{AppState, error::ApiResult, middleware::AdminUser, page_request};

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    /// Matches name or nickname
    pub search: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct LinkUserPayload {
    pub user_id: Option<i64>,
}

pub async fn list_players(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Page<Player>>> {
    let page = state
        .players
        .list(
            query.search.as_deref(),
            page_request(query.page, query.per_page),
        )
        .await?;
    Ok(Json(page))
}

pub async fn get_player(
    State(state): State<AppState>,
    Path(id): Path<PlayerId>,
) -> ApiResult<Json<Player>> {
    Ok(Json(state.players.get(id).await?))
}

pub async fn create_player(
    State(state): State<AppState>,
    Json(payload): Json<CreatePlayer>,
) -> ApiResult<(StatusCode, Json<Player>)> {
    Ok((StatusCode::CREATED, Json(state.players.create(payload).await?)))
}

pub async fn update_player(
    State(state): State<AppState>,
    Path(id): Path<PlayerId>,
    Json(payload): Json<UpdatePlayer>,
) -> ApiResult<Json<Player>> {
    Ok(Json(state.players.update(id, payload).await?))
}

/// Link or unlink an admin account
pub async fn link_user(
    State(state): State<AppState>,
    Path(id): Path<PlayerId>,
    Json(payload): Json<LinkUserPayload>,
) -> ApiResult<Json<Player>> {
    Ok(Json(state.players.link_user(id, payload.user_id).await?))
}

pub async fn delete_player(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminUser>,
    Path(id): Path<PlayerId>,
) -> ApiResult<StatusCode> {
    state.players.delete(id).await?;
    state
        .audit
        .record(AuditEntry::new(
            admin.actor(),
            actions::ENTITY_DELETED,
            SoftDeletable::Player.entity(),
            Some(id),
        ))
        .await;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn restore_player(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminUser>,
    Path(id): Path<PlayerId>,
) -> ApiResult<Json<Player>> {
    let player = state.players.restore(id).await?;
    state
        .audit
        .record(AuditEntry::new(
            admin.actor(),
            actions::ENTITY_RESTORED,
            SoftDeletable::Player.entity(),
            Some(id),
        ))
        .await;
    Ok(Json(player))
}
