// Entry points invoked by the CLI and the scheduler loop.
//
// Every job accepts an optional match/competition id (absent means all
// active) and reports a message plus a processed count.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{EngineError, Result};
use crate::evaluation::MatchEvaluator;
use crate::model::{Competition, Entry, MatchResult};
use crate::ranking::RankingRecalculator;
use crate::store::RecordStore;
use crate::triggers::{day_bounds, realtime_batches, scheduled_pass_decision};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobReport {
    pub message: String,
    pub processed_count: usize,
}

impl JobReport {
    fn new(message: impl Into<String>, processed_count: usize) -> Self {
        Self {
            message: message.into(),
            processed_count,
        }
    }
}

// ---------------------------------------------------------------------------
// Evaluation jobs
// ---------------------------------------------------------------------------

/// Evaluate one match, or every finished match that still has pending
/// predictions. With `force`, each match is reverted first so its
/// predictions are scored again from scratch.
pub fn evaluate_matches<S: RecordStore>(
    store: &S,
    config: &Config,
    match_id: Option<i64>,
    force: bool,
) -> Result<JobReport> {
    let evaluator = MatchEvaluator::new(store, config.scoring);
    let match_ids = match match_id {
        Some(id) => vec![id],
        None => store.matches_with_pending_predictions()?,
    };
    debug!("Evaluation job over {} matches (force={})", match_ids.len(), force);

    let mut processed = 0;
    let mut failed = 0;
    for id in &match_ids {
        if force {
            evaluator.revert(*id)?;
        }
        let report = evaluator.evaluate(*id)?;
        processed += report.processed;
        failed += report.failed;
    }

    let message = if failed > 0 {
        format!(
            "Evaluated {} matches: {} predictions processed, {} failed",
            match_ids.len(),
            processed,
            failed
        )
    } else {
        format!(
            "Evaluated {} matches: {} predictions processed",
            match_ids.len(),
            processed
        )
    };
    Ok(JobReport::new(message, processed))
}

pub fn revert_match<S: RecordStore>(store: &S, config: &Config, match_id: i64) -> Result<JobReport> {
    let report = MatchEvaluator::new(store, config.scoring).revert(match_id)?;
    Ok(JobReport::new(
        format!(
            "Reverted match {}: {} predictions processed",
            match_id, report.processed
        ),
        report.processed,
    ))
}

/// Replace a finished match's result and rescore its predictions.
pub fn correct_match<S: RecordStore>(
    store: &S,
    config: &Config,
    match_id: i64,
    result: MatchResult,
    now: DateTime<Utc>,
) -> Result<JobReport> {
    let (reverted, evaluated) =
        MatchEvaluator::new(store, config.scoring).correct_result(match_id, result, now)?;
    Ok(JobReport::new(
        format!(
            "Corrected match {} to {}-{}: {} predictions reverted, {} evaluated",
            match_id, result.home_score, result.away_score, reverted.processed, evaluated.processed
        ),
        evaluated.processed,
    ))
}

// ---------------------------------------------------------------------------
// Ranking jobs
// ---------------------------------------------------------------------------

/// Scheduled ranking pass. Each active competition is ranked, with
/// snapshots, when its recalculation hour and recent finishes say so. `force`
/// ranks regardless, and with an explicit id also ranks an inactive
/// competition.
pub fn recalculate_rankings<S: RecordStore>(
    store: &S,
    config: &Config,
    competition_id: Option<i64>,
    force: bool,
    now: DateTime<Utc>,
) -> Result<JobReport> {
    let competitions: Vec<Competition> = match competition_id {
        Some(id) => {
            let competition = store
                .find_competition(id)?
                .ok_or(EngineError::CompetitionNotFound(id))?;
            if competition.active || force {
                vec![competition]
            } else {
                warn!("Competition {} is inactive, not ranking", id);
                Vec::new()
            }
        }
        None => store.active_competitions()?,
    };

    let window = Duration::hours(config.schedule.recent_window_hours);
    let recalculator = RankingRecalculator::new(store, config.ranking.page_size);
    let mut ranked = 0;
    let mut entries = 0;
    for competition in &competitions {
        let last_finished = store.latest_finish(competition.id)?;
        let decision = scheduled_pass_decision(competition, now, last_finished, window, force);
        if !decision.should_run() {
            debug!("Skipping competition {}: {:?}", competition.id, decision);
            continue;
        }
        let report = recalculator.recalculate(competition.id, true, now)?;
        ranked += 1;
        entries += report.ranked;
    }

    info!(
        "Scheduled ranking pass: {} of {} competitions ranked",
        ranked,
        competitions.len()
    );
    Ok(JobReport::new(
        format!(
            "Ranked {} competitions ({} entries)",
            ranked, entries
        ),
        ranked,
    ))
}

/// Real-time ranking pass over today's unranked finished matches. Ranks
/// each affected competition without snapshots and marks its matches
/// ranked, so a second run finds nothing to do.
pub fn realtime_rankings<S: RecordStore>(
    store: &S,
    config: &Config,
    competition_id: Option<i64>,
    now: DateTime<Utc>,
) -> Result<JobReport> {
    let (from, until) = day_bounds(now);
    let candidates = store.unranked_finished_matches(from, until)?;
    let mut batches = realtime_batches(&candidates, now.date_naive());
    if let Some(id) = competition_id {
        batches.retain(|competition, _| *competition == id);
    }

    let recalculator = RankingRecalculator::new(store, config.ranking.page_size);
    let mut marked = 0;
    for (competition, match_ids) in &batches {
        recalculator.recalculate(*competition, false, now)?;
        for match_id in match_ids {
            store.mark_ranked(*match_id, now)?;
            marked += 1;
        }
    }

    if marked > 0 {
        info!(
            "Real-time ranking: {} matches across {} competitions",
            marked,
            batches.len()
        );
    }
    Ok(JobReport::new(
        format!(
            "Ranked {} competitions for {} newly finished matches",
            batches.len(),
            marked
        ),
        marked,
    ))
}

/// Current standings of a competition, best rank first. Entries that have
/// never been ranked come last.
pub fn load_standings<S: RecordStore>(
    store: &S,
    config: &Config,
    competition_id: i64,
) -> Result<Vec<Entry>> {
    if store.find_competition(competition_id)?.is_none() {
        return Err(EngineError::CompetitionNotFound(competition_id));
    }

    let page_size = config.ranking.page_size.max(1);
    let mut entries = Vec::new();
    loop {
        let page = store.entries_page(competition_id, entries.len(), page_size)?;
        let last_page = page.len() < page_size;
        entries.extend(page);
        if last_page {
            break;
        }
    }
    entries.sort_by_key(|e| (e.current_rank == 0, e.current_rank, e.user_id));
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::model::{MatchStatus, PredictionStatus, ScoringRules};
    use crate::store::{AggregateStore, MatchStore, PredictionStore, SnapshotStore};
    use chrono::TimeZone;

    fn config() -> Config {
        let mut config = Config::default();
        config.ranking.page_size = 2;
        config
    }

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, day, hour, 0, 0).unwrap()
    }

    /// Helper: competition ranked at 03:00 with one match finished at
    /// `finished` and predictions (user, home, away) against a 1-0 result.
    fn seeded(db: &Database, finished: DateTime<Utc>, predictions: &[(i64, u32, u32)]) -> (i64, i64) {
        let comp = db
            .insert_competition("League", Some(3), &ScoringRules::default())
            .unwrap();
        let m = db.insert_match(comp).unwrap();
        for &(user, home, away) in predictions {
            db.insert_prediction(m, user, Some(home), Some(away)).unwrap();
        }
        db.update_match_state(m, MatchStatus::Finished, Some(&MatchResult::new(1, 0)), finished)
            .unwrap();
        (comp, m)
    }

    // ------------------------------------------------------------------
    // evaluation jobs
    // ------------------------------------------------------------------

    #[test]
    fn evaluate_all_picks_up_pending_matches() {
        let db = Database::open(":memory:").unwrap();
        let (comp, m) = seeded(&db, at(10, 20), &[(1, 1, 0), (2, 0, 2), (3, 2, 0)]);

        let report = evaluate_matches(&db, &config(), None, false).unwrap();
        assert_eq!(report.processed_count, 3);
        assert!(db
            .predictions_for_match(m, PredictionStatus::Pending)
            .unwrap()
            .is_empty());
        assert_eq!(db.find_entry(1, comp).unwrap().unwrap().total_points, 3);

        let again = evaluate_matches(&db, &config(), None, false).unwrap();
        assert_eq!(again.processed_count, 0);
    }

    #[test]
    fn forced_evaluation_rescores_without_double_counting() {
        let db = Database::open(":memory:").unwrap();
        let (comp, m) = seeded(&db, at(10, 20), &[(1, 1, 0)]);
        evaluate_matches(&db, &config(), Some(m), false).unwrap();

        let forced = evaluate_matches(&db, &config(), Some(m), true).unwrap();
        assert_eq!(forced.processed_count, 1);
        let entry = db.find_entry(1, comp).unwrap().unwrap();
        assert_eq!((entry.total_points, entry.total_matches), (3, 1));
    }

    #[test]
    fn revert_job_reports_processed_predictions() {
        let db = Database::open(":memory:").unwrap();
        let (_, m) = seeded(&db, at(10, 20), &[(1, 1, 0), (2, 0, 0)]);
        evaluate_matches(&db, &config(), Some(m), false).unwrap();

        let report = revert_match(&db, &config(), m).unwrap();
        assert_eq!(report.processed_count, 2);
        assert_eq!(report.message, format!("Reverted match {m}: 2 predictions processed"));
    }

    #[test]
    fn correct_job_rescores() {
        let db = Database::open(":memory:").unwrap();
        let (comp, m) = seeded(&db, at(10, 20), &[(1, 1, 0)]);
        evaluate_matches(&db, &config(), Some(m), false).unwrap();

        correct_match(&db, &config(), m, MatchResult::new(0, 1), at(10, 22)).unwrap();
        let entry = db.find_entry(1, comp).unwrap().unwrap();
        assert_eq!((entry.total_points, entry.wrong_guesses), (0, 1));
    }

    #[test]
    fn unknown_match_aborts_the_job() {
        let db = Database::open(":memory:").unwrap();
        let err = evaluate_matches(&db, &config(), Some(404), false).unwrap_err();
        assert!(matches!(err, EngineError::MatchNotFound(404)));
    }

    // ------------------------------------------------------------------
    // ranking jobs
    // ------------------------------------------------------------------

    #[test]
    fn scheduled_pass_respects_hour_and_snapshots() {
        let db = Database::open(":memory:").unwrap();
        let (comp, m) = seeded(&db, at(10, 20), &[(1, 1, 0), (2, 2, 0)]);
        evaluate_matches(&db, &config(), Some(m), false).unwrap();

        let wrong_hour = recalculate_rankings(&db, &config(), None, false, at(11, 4)).unwrap();
        assert_eq!(wrong_hour.processed_count, 0);

        let on_time = recalculate_rankings(&db, &config(), None, false, at(11, 3)).unwrap();
        assert_eq!(on_time.processed_count, 1);
        assert_eq!(db.snapshots_for(comp).unwrap().len(), 2);

        // More than a day after the last finish.
        let stale = recalculate_rankings(&db, &config(), None, false, at(12, 3)).unwrap();
        assert_eq!(stale.processed_count, 0);
    }

    #[test]
    fn forced_pass_ranks_inactive_competition() {
        let db = Database::open(":memory:").unwrap();
        let (comp, m) = seeded(&db, at(10, 20), &[(1, 1, 0)]);
        evaluate_matches(&db, &config(), Some(m), false).unwrap();
        db.set_competition_active(comp, false).unwrap();

        let skipped = recalculate_rankings(&db, &config(), Some(comp), false, at(11, 3)).unwrap();
        assert_eq!(skipped.processed_count, 0);

        let forced = recalculate_rankings(&db, &config(), Some(comp), true, at(15, 9)).unwrap();
        assert_eq!(forced.processed_count, 1);
        assert_eq!(db.find_entry(1, comp).unwrap().unwrap().current_rank, 1);
    }

    #[test]
    fn realtime_pass_marks_matches_once() {
        let db = Database::open(":memory:").unwrap();
        let (comp, m) = seeded(&db, at(10, 18), &[(1, 0, 1), (2, 1, 0)]);
        evaluate_matches(&db, &config(), Some(m), false).unwrap();

        let first = realtime_rankings(&db, &config(), None, at(10, 21)).unwrap();
        assert_eq!(first.processed_count, 1);
        assert_eq!(db.find_match(m).unwrap().unwrap().ranked_at, Some(at(10, 21)));
        assert_eq!(db.find_entry(2, comp).unwrap().unwrap().current_rank, 1);
        assert!(db.snapshots_for(comp).unwrap().is_empty());

        let second = realtime_rankings(&db, &config(), None, at(10, 22)).unwrap();
        assert_eq!(second.processed_count, 0);
    }

    #[test]
    fn realtime_pass_ignores_other_days_and_competitions() {
        let db = Database::open(":memory:").unwrap();
        let (_, yesterday) = seeded(&db, at(9, 23), &[(1, 1, 0)]);
        let (other, _) = seeded(&db, at(10, 1), &[(1, 1, 0)]);
        evaluate_matches(&db, &config(), None, false).unwrap();

        let filtered = realtime_rankings(&db, &config(), Some(other + 1), at(10, 8)).unwrap();
        assert_eq!(filtered.processed_count, 0);

        let today = realtime_rankings(&db, &config(), Some(other), at(10, 8)).unwrap();
        assert_eq!(today.processed_count, 1);
        assert!(db.find_match(yesterday).unwrap().unwrap().ranked_at.is_none());
    }

    #[test]
    fn standings_come_back_in_rank_order() {
        let db = Database::open(":memory:").unwrap();
        let (comp, m) = seeded(&db, at(10, 20), &[(1, 0, 0), (2, 1, 0), (3, 3, 1)]);
        evaluate_matches(&db, &config(), Some(m), false).unwrap();
        recalculate_rankings(&db, &config(), Some(comp), true, at(10, 21)).unwrap();

        let standings = load_standings(&db, &config(), comp).unwrap();
        let order: Vec<_> = standings.iter().map(|e| (e.user_id, e.current_rank)).collect();
        assert_eq!(order, vec![(2, 1), (3, 2), (1, 3)]);
    }
}
