//! League players.

pub mod manager;
pub mod models;

pub use manager::{PlayerError, PlayerManager, PlayerResult};
pub use models::{CreatePlayer, Player, PlayerId, UpdatePlayer};
