// Domain records shared by the scoring, evaluation, and ranking passes.

pub mod competition;
pub mod fixture;
pub mod prediction;
pub mod standings;

pub use competition::{Competition, Membership, ScoringRules};
pub use fixture::{EndingType, Match, MatchResult, MatchStatus};
pub use prediction::{Prediction, PredictionStatus};
pub use standings::{Entry, RankUpdate, Snapshot, Tally, UserStats};
