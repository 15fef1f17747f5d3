//! CSV inputs (match outcomes, player box scores, rosters) and dataset output.

pub mod outcomes;
pub mod players;
pub mod writer;

pub use outcomes::{load_match_outcomes, parse_match_outcomes};
pub use players::{load_player_games, player_weeks, PlayerWeeks, Roster};
pub use writer::{unique_path, write_accumulated, write_training};
