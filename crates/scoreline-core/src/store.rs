// Record store seams the engine depends on.
//
// The traits are split by write region. Counter fields of entries and user
// stats are written through `AggregateStore` only, rank fields through
// `StandingsStore` only, and snapshots through `SnapshotStore`, which has no
// update or delete path at all.

use anyhow::Result;
use chrono::{DateTime, Utc};

use crate::model::{
    Competition, Entry, Match, MatchResult, MatchStatus, Membership, Prediction,
    PredictionStatus, RankUpdate, Snapshot, UserStats,
};

pub trait CompetitionStore {
    fn find_competition(&self, id: i64) -> Result<Option<Competition>>;

    /// All competitions with `active` set, ordered by id.
    fn active_competitions(&self) -> Result<Vec<Competition>>;

    /// All active memberships. A user may appear more than once.
    fn active_memberships(&self) -> Result<Vec<Membership>>;
}

pub trait MatchStore {
    fn find_match(&self, id: i64) -> Result<Option<Match>>;

    /// Ids of finished matches in active competitions that still have
    /// pending predictions, ordered by id.
    fn matches_with_pending_predictions(&self) -> Result<Vec<i64>>;

    /// Most recent `finished_at` among the competition's finished matches.
    fn latest_finish(&self, competition_id: i64) -> Result<Option<DateTime<Utc>>>;

    /// Finished matches in active competitions with no `ranked_at`, whose
    /// `finished_at` lies in `[from, until)`.
    fn unranked_finished_matches(
        &self,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<Match>>;

    /// Record a status/result change coming from ingestion. Maintains
    /// `finished_at` and clears `ranked_at`.
    fn update_match_state(
        &self,
        id: i64,
        status: MatchStatus,
        result: Option<&MatchResult>,
        at: DateTime<Utc>,
    ) -> Result<()>;

    fn mark_ranked(&self, id: i64, at: DateTime<Utc>) -> Result<()>;
}

pub trait PredictionStore {
    fn predictions_for_match(
        &self,
        match_id: i64,
        status: PredictionStatus,
    ) -> Result<Vec<Prediction>>;

    /// Persist points, flags and status of an existing prediction.
    fn save_prediction(&self, prediction: &Prediction) -> Result<()>;
}

pub trait AggregateStore {
    fn find_entry(&self, user_id: i64, competition_id: i64) -> Result<Option<Entry>>;

    /// Insert the entry or overwrite its counter fields. Rank fields of an
    /// existing row are left alone.
    fn save_entry_totals(&self, entry: &Entry) -> Result<()>;

    fn find_user_stats(&self, user_id: i64) -> Result<Option<UserStats>>;

    fn save_user_stats(&self, stats: &UserStats) -> Result<()>;
}

pub trait StandingsStore {
    /// One page of a competition's entries, ordered by user id.
    fn entries_page(&self, competition_id: i64, offset: usize, limit: usize)
        -> Result<Vec<Entry>>;

    /// Overwrite the rank fields of one entry.
    fn save_rank(&self, update: &RankUpdate) -> Result<()>;
}

pub trait SnapshotStore {
    fn append_snapshot(&self, snapshot: &Snapshot) -> Result<()>;

    /// Every snapshot of a competition in insertion order.
    fn snapshots_for(&self, competition_id: i64) -> Result<Vec<Snapshot>>;
}

pub trait UnitOfWork {
    /// Run `work` so that its writes land together or not at all.
    fn unit_of_work<T, F>(&self, work: F) -> Result<T>
    where
        F: FnOnce() -> Result<T>;
}

/// Everything the engine needs from a record store.
pub trait RecordStore:
    CompetitionStore
    + MatchStore
    + PredictionStore
    + AggregateStore
    + StandingsStore
    + SnapshotStore
    + UnitOfWork
{
}

impl<T> RecordStore for T where
    T: CompetitionStore
        + MatchStore
        + PredictionStore
        + AggregateStore
        + StandingsStore
        + SnapshotStore
        + UnitOfWork
{
}
