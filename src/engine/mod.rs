pub mod accumulator;
pub mod aggregate;
pub mod merger;
pub mod rating;
pub mod types;

pub use accumulator::accumulate;
pub use merger::{merge, FeatureIndex, GapPolicy, MatchOutcome, TrainingRow};
pub use types::{AccumulatedRow, EntitySeason, GameRow, Outcome, StatValue};
