// When to evaluate, revert, and rank.
//
// Pure decision functions. The jobs module and the scheduler loop feed them
// store reads and the current time; nothing in here touches the store.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, NaiveDate, Timelike, Utc};

use crate::model::{Competition, Match, MatchResult, MatchStatus};

// ---------------------------------------------------------------------------
// Scheduled recalculation
// ---------------------------------------------------------------------------

/// Whether a competition gets a scheduled ranking pass right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleDecision {
    /// Configured hour matches and a match finished recently.
    Run,
    /// Caller asked to force the pass; every other check is skipped.
    Forced,
    /// The competition has no recalculation hour.
    NotConfigured,
    WrongHour { expected: u32, actual: u32 },
    /// Nothing finished inside the recent window.
    NoRecentMatches,
}

impl ScheduleDecision {
    pub fn should_run(self) -> bool {
        matches!(self, ScheduleDecision::Run | ScheduleDecision::Forced)
    }
}

/// Decide whether `competition` gets its scheduled pass at `now` (UTC).
///
/// The pass runs only during the configured hour and only if the
/// competition's most recent finish lies within `window` before `now`.
pub fn scheduled_pass_decision(
    competition: &Competition,
    now: DateTime<Utc>,
    last_finished: Option<DateTime<Utc>>,
    window: Duration,
    force: bool,
) -> ScheduleDecision {
    if force {
        return ScheduleDecision::Forced;
    }

    let Some(expected) = competition.recalculation_hour else {
        return ScheduleDecision::NotConfigured;
    };
    let actual = now.hour();
    if actual != expected {
        return ScheduleDecision::WrongHour { expected, actual };
    }

    match last_finished {
        Some(finished) if finished > now - window && finished <= now => ScheduleDecision::Run,
        _ => ScheduleDecision::NoRecentMatches,
    }
}

// ---------------------------------------------------------------------------
// Match state transitions
// ---------------------------------------------------------------------------

/// Evaluation work implied by a match status/result change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Became finished: score pending predictions.
    Evaluate,
    /// Left finished: take scored predictions back out.
    Revert,
    /// Stayed finished with a different result: revert then evaluate.
    Reevaluate,
    None,
}

pub fn match_transition(
    prev_status: MatchStatus,
    prev_result: Option<&MatchResult>,
    next_status: MatchStatus,
    next_result: Option<&MatchResult>,
) -> Transition {
    let was_finished = prev_status == MatchStatus::Finished;
    let is_finished = next_status == MatchStatus::Finished;

    match (was_finished, is_finished) {
        (false, true) => Transition::Evaluate,
        (true, false) => Transition::Revert,
        (true, true) if prev_result != next_result && next_result.is_some() => {
            Transition::Reevaluate
        }
        _ => Transition::None,
    }
}

// ---------------------------------------------------------------------------
// Real-time ranking
// ---------------------------------------------------------------------------

/// `[start, end)` of the UTC day containing `now`.
pub fn day_bounds(now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = now
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .map(|midnight| midnight.and_utc())
        .unwrap_or(now);
    (start, start + Duration::days(1))
}

/// Group unranked finished matches by competition, keeping only those that
/// finished on `today`. Match ids within a batch are sorted.
pub fn realtime_batches(matches: &[Match], today: NaiveDate) -> BTreeMap<i64, Vec<i64>> {
    let mut batches: BTreeMap<i64, Vec<i64>> = BTreeMap::new();
    for m in matches {
        let finished_today = m
            .finished_at
            .is_some_and(|finished| finished.date_naive() == today);
        if m.is_finished() && m.ranked_at.is_none() && finished_today {
            batches.entry(m.competition_id).or_default().push(m.id);
        }
    }
    for ids in batches.values_mut() {
        ids.sort_unstable();
    }
    batches
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ScoringRules;
    use chrono::TimeZone;

    fn competition(hour: Option<u32>) -> Competition {
        Competition {
            id: 1,
            name: "League".into(),
            active: true,
            recalculation_hour: hour,
            scoring_rules: ScoringRules::default(),
        }
    }

    fn at(day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, day, hour, minute, 0).unwrap()
    }

    fn finished(id: i64, competition_id: i64, at: DateTime<Utc>) -> Match {
        Match {
            id,
            competition_id,
            status: MatchStatus::Finished,
            result: Some(MatchResult::new(1, 0)),
            finished_at: Some(at),
            ranked_at: None,
        }
    }

    // ------------------------------------------------------------------
    // scheduled_pass_decision
    // ------------------------------------------------------------------

    #[test]
    fn runs_at_configured_hour_with_recent_finish() {
        let decision = scheduled_pass_decision(
            &competition(Some(3)),
            at(10, 3, 15),
            Some(at(9, 22, 0)),
            Duration::hours(24),
            false,
        );
        assert_eq!(decision, ScheduleDecision::Run);
        assert!(decision.should_run());
    }

    #[test]
    fn skips_outside_configured_hour() {
        let decision = scheduled_pass_decision(
            &competition(Some(3)),
            at(10, 4, 0),
            Some(at(10, 1, 0)),
            Duration::hours(24),
            false,
        );
        assert_eq!(decision, ScheduleDecision::WrongHour { expected: 3, actual: 4 });
        assert!(!decision.should_run());
    }

    #[test]
    fn skips_without_configured_hour() {
        let decision = scheduled_pass_decision(
            &competition(None),
            at(10, 3, 0),
            Some(at(10, 1, 0)),
            Duration::hours(24),
            false,
        );
        assert_eq!(decision, ScheduleDecision::NotConfigured);
    }

    #[test]
    fn skips_when_last_finish_is_stale_or_missing() {
        let comp = competition(Some(3));
        let stale = scheduled_pass_decision(
            &comp,
            at(10, 3, 0),
            Some(at(8, 23, 0)),
            Duration::hours(24),
            false,
        );
        assert_eq!(stale, ScheduleDecision::NoRecentMatches);

        let never = scheduled_pass_decision(&comp, at(10, 3, 0), None, Duration::hours(24), false);
        assert_eq!(never, ScheduleDecision::NoRecentMatches);
    }

    #[test]
    fn force_bypasses_every_check() {
        let decision =
            scheduled_pass_decision(&competition(None), at(10, 9, 0), None, Duration::hours(24), true);
        assert_eq!(decision, ScheduleDecision::Forced);
        assert!(decision.should_run());
    }

    // ------------------------------------------------------------------
    // match_transition
    // ------------------------------------------------------------------

    #[test]
    fn finishing_evaluates() {
        let result = MatchResult::new(2, 1);
        assert_eq!(
            match_transition(MatchStatus::Live, None, MatchStatus::Finished, Some(&result)),
            Transition::Evaluate
        );
        assert_eq!(
            match_transition(MatchStatus::Scheduled, None, MatchStatus::Finished, Some(&result)),
            Transition::Evaluate
        );
    }

    #[test]
    fn leaving_finished_reverts() {
        let result = MatchResult::new(2, 1);
        for next in [MatchStatus::Live, MatchStatus::Cancelled, MatchStatus::Scheduled] {
            assert_eq!(
                match_transition(MatchStatus::Finished, Some(&result), next, None),
                Transition::Revert
            );
        }
    }

    #[test]
    fn changed_final_result_reevaluates() {
        let old = MatchResult::new(2, 1);
        let new = MatchResult::new(2, 2);
        assert_eq!(
            match_transition(MatchStatus::Finished, Some(&old), MatchStatus::Finished, Some(&new)),
            Transition::Reevaluate
        );
        assert_eq!(
            match_transition(MatchStatus::Finished, Some(&old), MatchStatus::Finished, Some(&old)),
            Transition::None
        );
    }

    #[test]
    fn non_final_changes_do_nothing() {
        let score = MatchResult::new(1, 0);
        assert_eq!(
            match_transition(MatchStatus::Scheduled, None, MatchStatus::Live, Some(&score)),
            Transition::None
        );
        assert_eq!(
            match_transition(MatchStatus::Live, Some(&score), MatchStatus::Cancelled, None),
            Transition::None
        );
    }

    // ------------------------------------------------------------------
    // realtime_batches / day_bounds
    // ------------------------------------------------------------------

    #[test]
    fn day_bounds_cover_the_utc_day() {
        let (start, end) = day_bounds(at(10, 17, 42));
        assert_eq!(start, at(10, 0, 0));
        assert_eq!(end, at(11, 0, 0));
    }

    #[test]
    fn batches_group_todays_matches_by_competition() {
        let today = at(10, 0, 0).date_naive();
        let matches = vec![
            finished(5, 2, at(10, 20, 0)),
            finished(3, 1, at(10, 18, 0)),
            finished(4, 1, at(10, 12, 0)),
            finished(6, 1, at(9, 23, 0)),
        ];

        let batches = realtime_batches(&matches, today);
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[&1], vec![3, 4]);
        assert_eq!(batches[&2], vec![5]);
    }

    #[test]
    fn batches_skip_ranked_and_unfinished_matches() {
        let today = at(10, 0, 0).date_naive();
        let mut ranked = finished(1, 1, at(10, 9, 0));
        ranked.ranked_at = Some(at(10, 9, 5));
        let mut live = finished(2, 1, at(10, 9, 0));
        live.status = MatchStatus::Live;

        assert!(realtime_batches(&[ranked, live], today).is_empty());
    }
}
