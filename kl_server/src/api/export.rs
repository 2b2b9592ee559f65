//! CSV download handlers.

use axum::{
    extract::{Path, State},
    http::header::{CONTENT_DISPOSITION, CONTENT_TYPE},
    response::{IntoResponse, Response},
};
use kart_league::{
    export::{self, PlayerNames},
    modes::{GameMode, Stage},
    player::PlayerId,
    tournament::TournamentId,
};

use super::{AppState, error::ApiResult};

const CSV_CONTENT_TYPE: &str = "text/csv; charset=utf-8";

fn csv_response(filename: String, body: String) -> Response {
    (
        [
            (CONTENT_TYPE, CSV_CONTENT_TYPE.to_string()),
            (
                CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        body,
    )
        .into_response()
}

/// Nicknames of the given players, live ones only
async fn names_for(
    state: &AppState,
    ids: impl IntoIterator<Item = PlayerId>,
) -> ApiResult<PlayerNames> {
    let mut ids: Vec<PlayerId> = ids.into_iter().collect();
    ids.sort_unstable();
    ids.dedup();
    let players = state.players.get_many(&ids).await?;
    Ok(players.into_iter().map(|p| (p.id, p.nickname)).collect())
}

/// Group standings, or the qualification ranking for Time Attack
pub async fn standings_csv(
    State(state): State<AppState>,
    Path((tournament_id, mode)): Path<(TournamentId, GameMode)>,
) -> ApiResult<Response> {
    let body = if mode.is_head_to_head() {
        let groups = state.qualification.standings(tournament_id, mode).await?;
        let names = names_for(
            &state,
            groups
                .iter()
                .flat_map(|g| g.standings.iter().map(|s| s.player_id))
                .collect::<Vec<PlayerId>>(),
        )
        .await?;
        export::standings_csv(&groups, &names)
    } else {
        let ranking = state.qualification.ta_ranking(tournament_id).await?;
        let names = names_for(&state, ranking.iter().map(|s| s.player_id)).await?;
        export::ta_ranking_csv(&ranking, &names)
    };
    Ok(csv_response(
        format!("tournament-{tournament_id}-{}-standings.csv", mode.code()),
        body,
    ))
}

/// Qualification and finals matches of one mode
pub async fn matches_csv(
    State(state): State<AppState>,
    Path((tournament_id, mode)): Path<(TournamentId, GameMode)>,
) -> ApiResult<Response> {
    let mut matches = state
        .matches
        .list_for(tournament_id, mode, Stage::Qualification)
        .await?;
    matches.extend(
        state
            .matches
            .list_for(tournament_id, mode, Stage::Finals)
            .await?,
    );
    let names = names_for(
        &state,
        matches
            .iter()
            .flat_map(|m| [m.player1_id, m.player2_id])
            .flatten()
            .collect::<Vec<PlayerId>>(),
    )
    .await?;
    Ok(csv_response(
        format!("tournament-{tournament_id}-{}-matches.csv", mode.code()),
        export::matches_csv(&matches, &names),
    ))
}

/// Final placements from the bracket, or from the elimination phase for Time Attack
pub async fn placements_csv(
    State(state): State<AppState>,
    Path((tournament_id, mode)): Path<(TournamentId, GameMode)>,
) -> ApiResult<Response> {
    let placements = if mode.is_head_to_head() {
        state.finals.bracket(tournament_id, mode).await?.placements
    } else {
        state.phases.phase(tournament_id).await?.placements
    };
    let names = names_for(&state, placements.iter().map(|p| p.player_id)).await?;
    Ok(csv_response(
        format!("tournament-{tournament_id}-{}-placements.csv", mode.code()),
        export::placements_csv(&placements, &names),
    ))
}
