// Per-competition entries, global user totals, and rank snapshots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::scoring::ScoreCard;

/// The aggregate contribution of one evaluated prediction. Added to entries
/// and user stats on evaluate, subtracted on revert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Tally {
    pub points: u32,
    pub matches: u32,
    pub exact: u32,
    pub trends: u32,
    pub wrong: u32,
}

impl From<&ScoreCard> for Tally {
    fn from(card: &ScoreCard) -> Self {
        Tally {
            points: card.points,
            matches: 1,
            exact: u32::from(card.is_exact),
            trends: u32::from(card.is_trend),
            wrong: u32::from(card.is_wrong),
        }
    }
}

/// Per-user, per-competition aggregate. Counter fields belong to the match
/// evaluator; rank fields belong to the ranking pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub user_id: i64,
    pub competition_id: i64,
    pub total_points: u32,
    pub total_matches: u32,
    pub exact_guesses: u32,
    /// Reserved goal-difference tier. Nothing increments it today, but it
    /// keeps its slot in the standings order.
    pub correct_diffs: u32,
    pub correct_trends: u32,
    pub wrong_guesses: u32,
    pub current_rank: u32,
    pub previous_rank: u32,
    pub rank_change: i64,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Entry {
    /// An empty entry, as created lazily on a user's first evaluation.
    pub fn new(user_id: i64, competition_id: i64) -> Self {
        Self {
            user_id,
            competition_id,
            total_points: 0,
            total_matches: 0,
            exact_guesses: 0,
            correct_diffs: 0,
            correct_trends: 0,
            wrong_guesses: 0,
            current_rank: 0,
            previous_rank: 0,
            rank_change: 0,
            updated_at: None,
        }
    }

    pub fn add(&mut self, tally: &Tally) {
        self.total_points += tally.points;
        self.total_matches += tally.matches;
        self.exact_guesses += tally.exact;
        self.correct_trends += tally.trends;
        self.wrong_guesses += tally.wrong;
    }

    /// Remove a previously added tally. Counters saturate at zero.
    pub fn subtract(&mut self, tally: &Tally) {
        self.total_points = self.total_points.saturating_sub(tally.points);
        self.total_matches = self.total_matches.saturating_sub(tally.matches);
        self.exact_guesses = self.exact_guesses.saturating_sub(tally.exact);
        self.correct_trends = self.correct_trends.saturating_sub(tally.trends);
        self.wrong_guesses = self.wrong_guesses.saturating_sub(tally.wrong);
    }
}

/// A user's totals across every competition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserStats {
    pub user_id: i64,
    pub total_points: u32,
    pub total_predictions: u32,
    pub exact_guesses: u32,
    pub correct_trends: u32,
    pub wrong_guesses: u32,
}

impl UserStats {
    pub fn new(user_id: i64) -> Self {
        Self {
            user_id,
            total_points: 0,
            total_predictions: 0,
            exact_guesses: 0,
            correct_trends: 0,
            wrong_guesses: 0,
        }
    }

    pub fn add(&mut self, tally: &Tally) {
        self.total_points += tally.points;
        self.total_predictions += tally.matches;
        self.exact_guesses += tally.exact;
        self.correct_trends += tally.trends;
        self.wrong_guesses += tally.wrong;
    }

    pub fn subtract(&mut self, tally: &Tally) {
        self.total_points = self.total_points.saturating_sub(tally.points);
        self.total_predictions = self.total_predictions.saturating_sub(tally.matches);
        self.exact_guesses = self.exact_guesses.saturating_sub(tally.exact);
        self.correct_trends = self.correct_trends.saturating_sub(tally.trends);
        self.wrong_guesses = self.wrong_guesses.saturating_sub(tally.wrong);
    }
}

/// The rank fields written for one entry by a ranking pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankUpdate {
    pub user_id: i64,
    pub competition_id: i64,
    pub current_rank: u32,
    pub previous_rank: u32,
    pub rank_change: i64,
}

/// Immutable copy of an entry's standing at a point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub competition_id: i64,
    pub user_id: i64,
    pub rank: u32,
    pub total_points: u32,
    pub total_matches: u32,
    pub exact_guesses: u32,
    pub correct_diffs: u32,
    pub correct_trends: u32,
    pub wrong_guesses: u32,
    pub taken_at: DateTime<Utc>,
}

impl Snapshot {
    /// Capture `entry` at `rank`.
    pub fn capture(entry: &Entry, rank: u32, taken_at: DateTime<Utc>) -> Self {
        Self {
            competition_id: entry.competition_id,
            user_id: entry.user_id,
            rank,
            total_points: entry.total_points,
            total_matches: entry.total_matches,
            exact_guesses: entry.exact_guesses,
            correct_diffs: entry.correct_diffs,
            correct_trends: entry.correct_trends,
            wrong_guesses: entry.wrong_guesses,
            taken_at,
        }
    }
}
