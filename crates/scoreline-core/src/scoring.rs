// Scoring rules: one prediction against one final result.
//
// Rules, first match wins:
// 1. No result, or the prediction is abstained -> nothing.
// 2. Exact goal counts -> `exact_score` points.
// 3. Same sign of goal difference (home win, draw, away win) -> `winner_only`.
// 4. Anything else -> wrong, zero points.
//
// Integer arithmetic only, so identical inputs always give identical cards.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::model::{MatchResult, Prediction};

/// Concrete point values for a competition, after per-competition overrides
/// have been applied to the configured defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointTable {
    pub exact_score: u32,
    pub winner_only: u32,
}

/// Classification of a scored prediction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Exact,
    Trend,
    Wrong,
    Abstained,
}

/// Points and classification flags for one prediction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ScoreCard {
    pub points: u32,
    pub is_exact: bool,
    pub is_trend: bool,
    pub is_wrong: bool,
}

impl ScoreCard {
    fn for_outcome(outcome: Outcome, table: &PointTable) -> Self {
        match outcome {
            Outcome::Exact => ScoreCard {
                points: table.exact_score,
                is_exact: true,
                ..ScoreCard::default()
            },
            Outcome::Trend => ScoreCard {
                points: table.winner_only,
                is_trend: true,
                ..ScoreCard::default()
            },
            Outcome::Wrong => ScoreCard {
                is_wrong: true,
                ..ScoreCard::default()
            },
            Outcome::Abstained => ScoreCard::default(),
        }
    }

    pub fn outcome(&self) -> Outcome {
        if self.is_exact {
            Outcome::Exact
        } else if self.is_trend {
            Outcome::Trend
        } else if self.is_wrong {
            Outcome::Wrong
        } else {
            Outcome::Abstained
        }
    }
}

/// Classify predicted goals against a result.
pub fn classify(predicted: Option<(u32, u32)>, result: Option<&MatchResult>) -> Outcome {
    let (Some((home, away)), Some(result)) = (predicted, result) else {
        return Outcome::Abstained;
    };

    if home == result.home_score && away == result.away_score {
        return Outcome::Exact;
    }

    if trend(home, away) == trend(result.home_score, result.away_score) {
        Outcome::Trend
    } else {
        Outcome::Wrong
    }
}

/// Score `prediction` against `result` using `table`.
pub fn score_prediction(
    prediction: &Prediction,
    result: Option<&MatchResult>,
    table: &PointTable,
) -> ScoreCard {
    ScoreCard::for_outcome(classify(prediction.goals(), result), table)
}

/// Sign of the goal difference: home win, draw, or away win.
fn trend(home: u32, away: u32) -> Ordering {
    home.cmp(&away)
}
