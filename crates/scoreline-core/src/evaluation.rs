// Match evaluation: fold scored predictions into entries and user stats, or
// take them back out again.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::error::{EngineError, Result};
use crate::model::{
    Competition, Entry, Match, MatchResult, MatchStatus, Prediction, PredictionStatus, Tally,
    UserStats,
};
use crate::scoring::{score_prediction, PointTable, ScoreCard};
use crate::store::RecordStore;
use crate::triggers::{match_transition, Transition};

/// Outcome of one evaluate or revert pass over a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EvaluationReport {
    pub match_id: i64,
    /// Predictions whose writes landed.
    pub processed: usize,
    /// Predictions skipped after an error. They keep their previous status
    /// and are picked up again by the next pass.
    pub failed: usize,
}

/// Applies and reverts scoring for every prediction of a match.
///
/// Each prediction is handled in its own store unit of work, so a failure
/// rolls back that prediction's writes and leaves it for the next pass
/// without stopping the rest of the batch.
pub struct MatchEvaluator<'a, S> {
    store: &'a S,
    defaults: PointTable,
}

impl<'a, S: RecordStore> MatchEvaluator<'a, S> {
    /// `defaults` fills in point values a competition leaves unset.
    pub fn new(store: &'a S, defaults: PointTable) -> Self {
        Self { store, defaults }
    }

    /// Score every pending prediction of a finished match.
    pub fn evaluate(&self, match_id: i64) -> Result<EvaluationReport> {
        let (fixture, competition) = self.load(match_id)?;

        let finished = fixture.is_finished();
        let Some(result) = fixture.result.filter(|_| finished) else {
            warn!(
                "Match {} is {} without a final result, not evaluating",
                match_id, fixture.status
            );
            return Err(EngineError::MatchNotFinished {
                match_id,
                status: fixture.status,
            });
        };

        let table = competition.scoring_rules.resolve(&self.defaults);
        let pending = self
            .store
            .predictions_for_match(match_id, PredictionStatus::Pending)?;
        debug!("Evaluating {} pending predictions for match {}", pending.len(), match_id);

        let mut report = EvaluationReport {
            match_id,
            processed: 0,
            failed: 0,
        };
        for prediction in pending {
            let prediction_id = prediction.id;
            let applied = self.store.unit_of_work(|| {
                self.apply(competition.id, prediction, &result, &table)
            });
            match applied {
                Ok(()) => report.processed += 1,
                Err(e) => {
                    error!(
                        "Failed to evaluate prediction {} of match {}: {:#}",
                        prediction_id, match_id, e
                    );
                    report.failed += 1;
                }
            }
        }

        info!(
            "Evaluated match {}: {} predictions processed, {} failed",
            match_id, report.processed, report.failed
        );
        Ok(report)
    }

    /// Take every evaluated prediction of a match back out of the aggregates
    /// and return it to pending.
    pub fn revert(&self, match_id: i64) -> Result<EvaluationReport> {
        let (_, competition) = self.load(match_id)?;

        let evaluated = self
            .store
            .predictions_for_match(match_id, PredictionStatus::Evaluated)?;
        debug!("Reverting {} evaluated predictions for match {}", evaluated.len(), match_id);

        let mut report = EvaluationReport {
            match_id,
            processed: 0,
            failed: 0,
        };
        for prediction in evaluated {
            let prediction_id = prediction.id;
            match self
                .store
                .unit_of_work(|| self.withdraw(competition.id, prediction))
            {
                Ok(()) => report.processed += 1,
                Err(e) => {
                    error!(
                        "Failed to revert prediction {} of match {}: {:#}",
                        prediction_id, match_id, e
                    );
                    report.failed += 1;
                }
            }
        }

        info!(
            "Reverted match {}: {} predictions processed, {} failed",
            match_id, report.processed, report.failed
        );
        Ok(report)
    }

    /// Manual score correction: revert the match, store the new result, and
    /// evaluate again. Returns the revert and evaluate reports.
    ///
    /// If any prediction fails to revert the match keeps its old result, so
    /// the correction can simply be retried.
    pub fn correct_result(
        &self,
        match_id: i64,
        result: MatchResult,
        now: DateTime<Utc>,
    ) -> Result<(EvaluationReport, EvaluationReport)> {
        let reverted = self.revert_fully(match_id)?;
        self.store
            .update_match_state(match_id, MatchStatus::Finished, Some(&result), now)?;
        let evaluated = self.evaluate(match_id)?;
        Ok((reverted, evaluated))
    }

    /// Record a status/result change from ingestion and run whichever pass
    /// the transition calls for. Reverts happen before the write, while the
    /// match still holds the result its predictions were scored against.
    pub fn apply_match_update(
        &self,
        match_id: i64,
        status: MatchStatus,
        result: Option<MatchResult>,
        now: DateTime<Utc>,
    ) -> Result<Option<EvaluationReport>> {
        let fixture = self
            .store
            .find_match(match_id)?
            .ok_or(EngineError::MatchNotFound(match_id))?;

        let transition = match_transition(
            fixture.status,
            fixture.result.as_ref(),
            status,
            result.as_ref(),
        );
        debug!(
            "Match {} {} -> {}: {:?}",
            match_id, fixture.status, status, transition
        );

        match transition {
            Transition::None => {
                self.store
                    .update_match_state(match_id, status, result.as_ref(), now)?;
                Ok(None)
            }
            Transition::Evaluate => {
                self.store
                    .update_match_state(match_id, status, result.as_ref(), now)?;
                self.evaluate(match_id).map(Some)
            }
            Transition::Revert => {
                let report = self.revert_fully(match_id)?;
                self.store
                    .update_match_state(match_id, status, result.as_ref(), now)?;
                Ok(Some(report))
            }
            Transition::Reevaluate => {
                // `Reevaluate` only comes out of finished -> finished with a
                // different result.
                let Some(result) = result else {
                    return Ok(None);
                };
                let (_, evaluated) = self.correct_result(match_id, result, now)?;
                Ok(Some(evaluated))
            }
        }
    }

    /// Revert a match that is about to lose its result. Evaluated predictions
    /// left behind would never be picked up again once the result changes,
    /// so any failure aborts before the caller writes the new state.
    fn revert_fully(&self, match_id: i64) -> Result<EvaluationReport> {
        let report = self.revert(match_id)?;
        if report.failed > 0 {
            error!(
                "Match {}: {} predictions failed to revert, leaving match state unchanged",
                match_id, report.failed
            );
            return Err(EngineError::RevertIncomplete {
                match_id,
                failed: report.failed,
            });
        }
        Ok(report)
    }

    /// Load a match and its competition, aborting the whole pass when either
    /// is missing.
    fn load(&self, match_id: i64) -> Result<(Match, Competition)> {
        let Some(fixture) = self.store.find_match(match_id)? else {
            error!("Match {} not found, aborting", match_id);
            return Err(EngineError::MatchNotFound(match_id));
        };
        let Some(competition) = self.store.find_competition(fixture.competition_id)? else {
            error!(
                "Competition {} of match {} not found, aborting",
                fixture.competition_id, match_id
            );
            return Err(EngineError::CompetitionNotFound(fixture.competition_id));
        };
        Ok((fixture, competition))
    }

    fn apply(
        &self,
        competition_id: i64,
        mut prediction: Prediction,
        result: &MatchResult,
        table: &PointTable,
    ) -> anyhow::Result<()> {
        let card = score_prediction(&prediction, Some(result), table);
        prediction.mark_evaluated(&card);
        self.store.save_prediction(&prediction)?;

        let tally = Tally::from(&card);
        let mut entry = self
            .store
            .find_entry(prediction.user_id, competition_id)?
            .unwrap_or_else(|| Entry::new(prediction.user_id, competition_id));
        entry.add(&tally);
        self.store.save_entry_totals(&entry)?;

        let mut stats = self
            .store
            .find_user_stats(prediction.user_id)?
            .unwrap_or_else(|| UserStats::new(prediction.user_id));
        stats.add(&tally);
        self.store.save_user_stats(&stats)?;

        Ok(())
    }

    fn withdraw(&self, competition_id: i64, mut prediction: Prediction) -> anyhow::Result<()> {
        let card: ScoreCard = prediction.stored_card();
        let tally = Tally::from(&card);

        match self.store.find_entry(prediction.user_id, competition_id)? {
            Some(mut entry) => {
                entry.subtract(&tally);
                self.store.save_entry_totals(&entry)?;
            }
            None => warn!(
                "No entry for user {} in competition {} while reverting prediction {}",
                prediction.user_id, competition_id, prediction.id
            ),
        }

        match self.store.find_user_stats(prediction.user_id)? {
            Some(mut stats) => {
                stats.subtract(&tally);
                self.store.save_user_stats(&stats)?;
            }
            None => warn!(
                "No stats for user {} while reverting prediction {}",
                prediction.user_id, prediction.id
            ),
        }

        prediction.reset();
        self.store.save_prediction(&prediction)?;
        Ok(())
    }
}
