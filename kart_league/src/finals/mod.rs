//! Finals stage.
//!
//! One service covers Battle Mode, Match Race and Grand Prix: the mode is a
//! parameter, not a separate code path. Time Attack finals are the
//! elimination phase in [`crate::time_attack`].

pub mod errors;
pub mod manager;

pub use errors::{FinalsError, FinalsResult};
pub use manager::{BracketView, FinalsManager, FinalsUpdate};
