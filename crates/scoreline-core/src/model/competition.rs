// Competitions, their scoring rules, and the membership tiers used for tie-breaks.

use serde::{Deserialize, Serialize};

use crate::scoring::PointTable;

/// Per-competition point overrides. Unset values fall back to the configured
/// defaults when resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ScoringRules {
    pub exact_score: Option<u32>,
    pub winner_only: Option<u32>,
}

impl ScoringRules {
    /// Fill unset values from `defaults`.
    pub fn resolve(&self, defaults: &PointTable) -> PointTable {
        PointTable {
            exact_score: self.exact_score.unwrap_or(defaults.exact_score),
            winner_only: self.winner_only.unwrap_or(defaults.winner_only),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Competition {
    pub id: i64,
    pub name: String,
    pub active: bool,
    /// Hour of day (UTC, 0-23) at which the scheduled ranking pass may run.
    pub recalculation_hour: Option<u32>,
    pub scoring_rules: ScoringRules,
}

/// A user's membership level, supplied by the membership collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    pub user_id: i64,
    pub tier_rank: i64,
    pub active: bool,
}
