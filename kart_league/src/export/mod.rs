//! CSV exports of standings, match results and placements.
//!
//! Exports take player names as a lookup so they can be built from data
//! already loaded by the caller; unknown ids fall back to `#<id>`.

pub mod csv;

pub use csv::{CsvWriter, escape_field};

use crate::{
    bracket::{Placement, PlayerId},
    matches::Match,
    qualification::GroupStandings,
    time_attack::{TaStanding, format_time},
};
use std::collections::HashMap;

/// Player id to display name
pub type PlayerNames = HashMap<PlayerId, String>;

fn name_of(names: &PlayerNames, id: PlayerId) -> String {
    names.get(&id).cloned().unwrap_or_else(|| format!("#{id}"))
}

fn optional_name(names: &PlayerNames, id: Option<PlayerId>) -> String {
    id.map(|id| name_of(names, id)).unwrap_or_default()
}

/// Group tables, one row per player
pub fn standings_csv(groups: &[GroupStandings], names: &PlayerNames) -> String {
    let mut writer = CsvWriter::with_header(&[
        "group", "rank", "player", "played", "wins", "ties", "losses", "points", "for", "against",
        "diff",
    ]);
    for group in groups {
        for s in &group.standings {
            writer.write_record(&[
                group.group_label.clone(),
                s.rank.to_string(),
                name_of(names, s.player_id),
                s.matches_played.to_string(),
                s.wins.to_string(),
                s.ties.to_string(),
                s.losses.to_string(),
                s.points.to_string(),
                s.score_for.to_string(),
                s.score_against.to_string(),
                s.score_diff().to_string(),
            ]);
        }
    }
    writer.finish()
}

/// Match results in number order
pub fn matches_csv(matches: &[Match], names: &PlayerNames) -> String {
    let mut writer = CsvWriter::with_header(&[
        "match", "mode", "stage", "group", "round", "player1", "player2", "score1", "score2",
        "completed",
    ]);
    for m in matches {
        writer.write_record(&[
            m.match_number.to_string(),
            m.mode.code().to_string(),
            m.stage.as_str().to_string(),
            m.group_label.clone().unwrap_or_default(),
            m.round_label.clone(),
            optional_name(names, m.player1_id),
            optional_name(names, m.player2_id),
            m.score1.to_string(),
            m.score2.to_string(),
            m.completed.to_string(),
        ]);
    }
    writer.finish()
}

/// Final placements
pub fn placements_csv(placements: &[Placement], names: &PlayerNames) -> String {
    let mut writer = CsvWriter::with_header(&["place", "player"]);
    for p in placements {
        writer.write_record(&[p.place.to_string(), name_of(names, p.player_id)]);
    }
    writer.finish()
}

/// Time Attack qualification ranking
pub fn ta_ranking_csv(ranking: &[TaStanding], names: &PlayerNames) -> String {
    let mut writer = CsvWriter::with_header(&["rank", "player", "courses", "total"]);
    for s in ranking {
        let total = u32::try_from(s.total_ms)
            .map(format_time)
            .unwrap_or_else(|_| s.total_ms.to_string());
        writer.write_record(&[
            s.rank.to_string(),
            name_of(names, s.player_id),
            s.courses_completed.to_string(),
            total,
        ]);
    }
    writer.finish()
}
