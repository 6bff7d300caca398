// Errors that abort an engine operation as a whole.

use thiserror::Error;

use crate::model::MatchStatus;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("match {0} not found")]
    MatchNotFound(i64),

    #[error("competition {0} not found")]
    CompetitionNotFound(i64),

    #[error("match {match_id} is {status}, not finished with a result")]
    MatchNotFinished { match_id: i64, status: MatchStatus },

    #[error("match {match_id}: {failed} predictions could not be reverted")]
    RevertIncomplete { match_id: i64, failed: usize },

    #[error("record store error: {0:#}")]
    Store(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, EngineError>;
