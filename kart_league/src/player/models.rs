//! Player models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use crate::bracket::PlayerId;

/// A league player
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    /// Unique among live players (case-insensitive)
    pub nickname: String,
    /// Linked admin account, if any
    pub user_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatePlayer {
    pub name: String,
    pub nickname: String,
    #[serde(default)]
    pub user_id: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdatePlayer {
    pub name: Option<String>,
    pub nickname: Option<String>,
}
