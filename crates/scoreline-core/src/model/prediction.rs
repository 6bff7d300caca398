// User predictions and their pending -> evaluated -> pending lifecycle.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::scoring::ScoreCard;

/// Evaluation state of a prediction. This is the evaluator's idempotency
/// guard: `evaluate` only touches `Pending` rows and `revert` only touches
/// `Evaluated` rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictionStatus {
    #[default]
    Pending,
    Evaluated,
}

impl PredictionStatus {
    pub fn from_str_status(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(PredictionStatus::Pending),
            "evaluated" => Some(PredictionStatus::Evaluated),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PredictionStatus::Pending => "pending",
            PredictionStatus::Evaluated => "evaluated",
        }
    }
}

impl fmt::Display for PredictionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A user's forecast of a match's final goal counts, plus the points and
/// classification flags the evaluator stored on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prediction {
    pub id: i64,
    pub match_id: i64,
    pub user_id: i64,
    /// `None` on either side means the user abstained.
    pub home_goals: Option<u32>,
    pub away_goals: Option<u32>,
    pub points: u32,
    pub is_exact: bool,
    pub is_trend: bool,
    pub is_wrong: bool,
    pub status: PredictionStatus,
}

impl Prediction {
    /// A fresh, unevaluated prediction.
    pub fn new(
        id: i64,
        match_id: i64,
        user_id: i64,
        home_goals: Option<u32>,
        away_goals: Option<u32>,
    ) -> Self {
        Self {
            id,
            match_id,
            user_id,
            home_goals,
            away_goals,
            points: 0,
            is_exact: false,
            is_trend: false,
            is_wrong: false,
            status: PredictionStatus::Pending,
        }
    }

    /// Both goal values, or `None` when the prediction is abstained.
    pub fn goals(&self) -> Option<(u32, u32)> {
        self.home_goals.zip(self.away_goals)
    }

    /// Store a scoring result and move the prediction to `Evaluated`.
    pub fn mark_evaluated(&mut self, card: &ScoreCard) {
        self.points = card.points;
        self.is_exact = card.is_exact;
        self.is_trend = card.is_trend;
        self.is_wrong = card.is_wrong;
        self.status = PredictionStatus::Evaluated;
    }

    /// Clear points and flags and move the prediction back to `Pending`.
    pub fn reset(&mut self) {
        self.points = 0;
        self.is_exact = false;
        self.is_trend = false;
        self.is_wrong = false;
        self.status = PredictionStatus::Pending;
    }

    /// The points and flags currently stored on the prediction.
    pub fn stored_card(&self) -> ScoreCard {
        ScoreCard {
            points: self.points,
            is_exact: self.is_exact,
            is_trend: self.is_trend,
            is_wrong: self.is_wrong,
        }
    }
}
