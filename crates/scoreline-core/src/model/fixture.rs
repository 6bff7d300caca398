// Match records as written by the ingestion side: lifecycle status and final result.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of a match. Only the ingestion collaborator moves a match
/// between these states; the engine reacts to the transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    Scheduled,
    Live,
    Finished,
    Cancelled,
}

impl MatchStatus {
    /// Parse the stored status string. Returns `None` for unknown values.
    pub fn from_str_status(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "scheduled" => Some(MatchStatus::Scheduled),
            "live" => Some(MatchStatus::Live),
            "finished" => Some(MatchStatus::Finished),
            "cancelled" | "canceled" => Some(MatchStatus::Cancelled),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStatus::Scheduled => "scheduled",
            MatchStatus::Live => "live",
            MatchStatus::Finished => "finished",
            MatchStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the match was decided. Scoring only looks at the goal counts, but the
/// ending is kept alongside them so corrections can round-trip it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndingType {
    #[default]
    Regular,
    ExtraTime,
    Penalties,
}

/// Final goal counts of a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchResult {
    pub home_score: u32,
    pub away_score: u32,
    #[serde(default)]
    pub ending_type: EndingType,
}

impl MatchResult {
    /// A result decided in regular time.
    pub fn new(home_score: u32, away_score: u32) -> Self {
        Self {
            home_score,
            away_score,
            ending_type: EndingType::Regular,
        }
    }

    pub fn with_ending(mut self, ending_type: EndingType) -> Self {
        self.ending_type = ending_type;
        self
    }
}

/// A match as the engine sees it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Match {
    pub id: i64,
    pub competition_id: i64,
    pub status: MatchStatus,
    pub result: Option<MatchResult>,
    /// Set by the store when the match enters `finished`, cleared when it
    /// leaves.
    pub finished_at: Option<DateTime<Utc>>,
    /// Set by the realtime ranking pass once the match has been folded into
    /// the standings.
    pub ranked_at: Option<DateTime<Utc>>,
}

impl Match {
    pub fn is_finished(&self) -> bool {
        self.status == MatchStatus::Finished
    }
}
