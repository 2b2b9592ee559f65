//! Tournament data models.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Tournament ID type
pub type TournamentId = i64;

/// Tournament lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TournamentStatus {
    /// Being set up; players and groups can change freely
    Draft,
    /// Qualification matches and time trials are being played
    Qualification,
    /// Bracket and Time Attack elimination are being played
    Finals,
    /// All finals decided
    Completed,
}

impl TournamentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TournamentStatus::Draft => "draft",
            TournamentStatus::Qualification => "qualification",
            TournamentStatus::Finals => "finals",
            TournamentStatus::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(TournamentStatus::Draft),
            "qualification" => Some(TournamentStatus::Qualification),
            "finals" => Some(TournamentStatus::Finals),
            "completed" => Some(TournamentStatus::Completed),
            _ => None,
        }
    }

    /// The status a tournament moves to when advanced
    pub fn next(self) -> Option<Self> {
        match self {
            TournamentStatus::Draft => Some(TournamentStatus::Qualification),
            TournamentStatus::Qualification => Some(TournamentStatus::Finals),
            TournamentStatus::Finals => Some(TournamentStatus::Completed),
            TournamentStatus::Completed => None,
        }
    }

    /// Whether `to` is reachable in one step. Only `reopen` goes backwards.
    pub fn can_transition_to(self, to: Self) -> bool {
        self.next() == Some(to)
    }

    /// Whether scores may still be written
    pub fn accepts_scores(self) -> bool {
        matches!(
            self,
            TournamentStatus::Qualification | TournamentStatus::Finals
        )
    }
}

/// A tournament
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tournament {
    pub id: TournamentId,
    pub name: String,
    pub event_date: Option<NaiveDate>,
    pub status: TournamentStatus,
    /// Whether a participant token is active (the token itself is never serialized)
    pub has_participant_token: bool,
    pub token_expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Create request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateTournament {
    pub name: String,
    #[serde(default)]
    pub event_date: Option<NaiveDate>,
}

/// Partial update
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateTournament {
    pub name: Option<String>,
    pub event_date: Option<NaiveDate>,
}

/// A freshly issued participant token. Shown once to the admin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}
