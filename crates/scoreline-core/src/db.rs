// SQLite persistence layer for competitions, matches, predictions, and standings.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::{ReentrantMutex, ReentrantMutexGuard};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::warn;

use crate::model::{
    Competition, Entry, Match, MatchResult, MatchStatus, Membership, Prediction,
    PredictionStatus, RankUpdate, ScoringRules, Snapshot, UserStats,
};
use crate::store::{
    AggregateStore, CompetitionStore, MatchStore, PredictionStore, SnapshotStore,
    StandingsStore, UnitOfWork,
};

/// SQL expression for "now" in the same RFC 3339 shape `timestamp()` writes.
const NOW_SQL: &str = "strftime('%Y-%m-%dT%H:%M:%fZ', 'now')";

const MATCH_COLUMNS: &str = "id, competition_id, status, result, finished_at, ranked_at";

const PREDICTION_COLUMNS: &str =
    "id, match_id, user_id, home_goals, away_goals, points, is_exact, is_trend, is_wrong, status";

const ENTRY_COLUMNS: &str = "user_id, competition_id, total_points, total_matches, exact_guesses, \
     correct_diffs, correct_trends, wrong_guesses, current_rank, previous_rank, rank_change, updated_at";

const COMPETITION_COLUMNS: &str =
    "id, name, active, recalculation_hour, exact_score, winner_only";

/// SQLite-backed record store. Implements every store trait the engine uses;
/// the inherent `insert_*` methods are the ingestion side's write path.
///
/// The connection sits behind a reentrant lock so a unit of work can hold it
/// from `SAVEPOINT` to `RELEASE` while its body calls back into the store.
pub struct Database {
    conn: ReentrantMutex<Connection>,
}

impl Database {
    /// Open (or create) a SQLite database at `path` and ensure all tables
    /// exist. Pass `":memory:"` for an ephemeral in-memory database (useful
    /// for tests).
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database at {path}"))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;
             PRAGMA foreign_keys = ON;",
        )
        .context("failed to set database pragmas")?;

        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS competitions (
                id                 INTEGER PRIMARY KEY,
                name               TEXT NOT NULL,
                active             INTEGER NOT NULL DEFAULT 1,
                recalculation_hour INTEGER CHECK (recalculation_hour BETWEEN 0 AND 23),
                exact_score        INTEGER,
                winner_only        INTEGER
            );

            CREATE TABLE IF NOT EXISTS matches (
                id             INTEGER PRIMARY KEY,
                competition_id INTEGER NOT NULL REFERENCES competitions(id),
                status         TEXT NOT NULL DEFAULT 'scheduled',
                result         TEXT,
                finished_at    TEXT,
                ranked_at      TEXT
            );

            CREATE TABLE IF NOT EXISTS predictions (
                id         INTEGER PRIMARY KEY,
                match_id   INTEGER NOT NULL REFERENCES matches(id),
                user_id    INTEGER NOT NULL,
                home_goals INTEGER,
                away_goals INTEGER,
                points     INTEGER NOT NULL DEFAULT 0,
                is_exact   INTEGER NOT NULL DEFAULT 0,
                is_trend   INTEGER NOT NULL DEFAULT 0,
                is_wrong   INTEGER NOT NULL DEFAULT 0,
                status     TEXT NOT NULL DEFAULT 'pending',
                UNIQUE(match_id, user_id)
            );

            CREATE TABLE IF NOT EXISTS entries (
                user_id        INTEGER NOT NULL,
                competition_id INTEGER NOT NULL REFERENCES competitions(id),
                total_points   INTEGER NOT NULL DEFAULT 0 CHECK (total_points >= 0),
                total_matches  INTEGER NOT NULL DEFAULT 0 CHECK (total_matches >= 0),
                exact_guesses  INTEGER NOT NULL DEFAULT 0 CHECK (exact_guesses >= 0),
                correct_diffs  INTEGER NOT NULL DEFAULT 0 CHECK (correct_diffs >= 0),
                correct_trends INTEGER NOT NULL DEFAULT 0 CHECK (correct_trends >= 0),
                wrong_guesses  INTEGER NOT NULL DEFAULT 0 CHECK (wrong_guesses >= 0),
                current_rank   INTEGER NOT NULL DEFAULT 0,
                previous_rank  INTEGER NOT NULL DEFAULT 0,
                rank_change    INTEGER NOT NULL DEFAULT 0,
                updated_at     TEXT,
                PRIMARY KEY (user_id, competition_id)
            );

            CREATE TABLE IF NOT EXISTS user_stats (
                user_id           INTEGER PRIMARY KEY,
                total_points      INTEGER NOT NULL DEFAULT 0 CHECK (total_points >= 0),
                total_predictions INTEGER NOT NULL DEFAULT 0 CHECK (total_predictions >= 0),
                exact_guesses     INTEGER NOT NULL DEFAULT 0 CHECK (exact_guesses >= 0),
                correct_trends    INTEGER NOT NULL DEFAULT 0 CHECK (correct_trends >= 0),
                wrong_guesses     INTEGER NOT NULL DEFAULT 0 CHECK (wrong_guesses >= 0)
            );

            CREATE TABLE IF NOT EXISTS memberships (
                id        INTEGER PRIMARY KEY,
                user_id   INTEGER NOT NULL,
                tier_rank INTEGER NOT NULL,
                active    INTEGER NOT NULL DEFAULT 1
            );

            CREATE TABLE IF NOT EXISTS snapshots (
                id             INTEGER PRIMARY KEY AUTOINCREMENT,
                competition_id INTEGER NOT NULL REFERENCES competitions(id),
                user_id        INTEGER NOT NULL,
                rank           INTEGER NOT NULL,
                total_points   INTEGER NOT NULL,
                total_matches  INTEGER NOT NULL,
                exact_guesses  INTEGER NOT NULL,
                correct_diffs  INTEGER NOT NULL,
                correct_trends INTEGER NOT NULL,
                wrong_guesses  INTEGER NOT NULL,
                taken_at       TEXT NOT NULL
            );

            CREATE TRIGGER IF NOT EXISTS snapshots_no_update
            BEFORE UPDATE ON snapshots
            BEGIN
                SELECT RAISE(ABORT, 'snapshots are append-only');
            END;

            CREATE TRIGGER IF NOT EXISTS snapshots_no_delete
            BEFORE DELETE ON snapshots
            BEGIN
                SELECT RAISE(ABORT, 'snapshots are append-only');
            END;

            CREATE INDEX IF NOT EXISTS idx_predictions_match_status
                ON predictions(match_id, status);
            CREATE INDEX IF NOT EXISTS idx_matches_status_finished
                ON matches(status, finished_at);
            CREATE INDEX IF NOT EXISTS idx_snapshots_competition
                ON snapshots(competition_id);
            ",
        )
        .context("failed to create database schema")?;

        Ok(Self {
            conn: ReentrantMutex::new(conn),
        })
    }

    /// Acquire the database connection. Other threads wait; the owning
    /// thread may lock again.
    fn conn(&self) -> ReentrantMutexGuard<'_, Connection> {
        self.conn.lock()
    }

    // ------------------------------------------------------------------
    // Ingestion-side writes
    // ------------------------------------------------------------------

    /// Create an active competition and return its id.
    pub fn insert_competition(
        &self,
        name: &str,
        recalculation_hour: Option<u32>,
        rules: &ScoringRules,
    ) -> Result<i64> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO competitions (name, recalculation_hour, exact_score, winner_only)
             VALUES (?1, ?2, ?3, ?4)",
            params![name, recalculation_hour, rules.exact_score, rules.winner_only],
        )
        .context("failed to insert competition")?;
        Ok(conn.last_insert_rowid())
    }

    pub fn set_competition_active(&self, id: i64, active: bool) -> Result<()> {
        let changed = self
            .conn()
            .execute(
                "UPDATE competitions SET active = ?2 WHERE id = ?1",
                params![id, active],
            )
            .context("failed to update competition")?;
        if changed == 0 {
            bail!("competition {id} not found");
        }
        Ok(())
    }

    /// Create a scheduled match without a result and return its id.
    pub fn insert_match(&self, competition_id: i64) -> Result<i64> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO matches (competition_id) VALUES (?1)",
            params![competition_id],
        )
        .context("failed to insert match")?;
        Ok(conn.last_insert_rowid())
    }

    /// Record a user's prediction for a match and return its id. One
    /// prediction per user and match.
    pub fn insert_prediction(
        &self,
        match_id: i64,
        user_id: i64,
        home_goals: Option<u32>,
        away_goals: Option<u32>,
    ) -> Result<i64> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO predictions (match_id, user_id, home_goals, away_goals)
             VALUES (?1, ?2, ?3, ?4)",
            params![match_id, user_id, home_goals, away_goals],
        )
        .context("failed to insert prediction")?;
        Ok(conn.last_insert_rowid())
    }

    pub fn insert_membership(&self, user_id: i64, tier_rank: i64, active: bool) -> Result<i64> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO memberships (user_id, tier_rank, active) VALUES (?1, ?2, ?3)",
            params![user_id, tier_rank, active],
        )
        .context("failed to insert membership")?;
        Ok(conn.last_insert_rowid())
    }

    pub fn find_prediction(&self, id: i64) -> Result<Option<Prediction>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {PREDICTION_COLUMNS} FROM predictions WHERE id = ?1"),
            params![id],
            prediction_from_row,
        )
        .optional()
        .context("failed to load prediction")
    }
}

// ---------------------------------------------------------------------------
// Store trait implementations
// ---------------------------------------------------------------------------

impl CompetitionStore for Database {
    fn find_competition(&self, id: i64) -> Result<Option<Competition>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {COMPETITION_COLUMNS} FROM competitions WHERE id = ?1"),
            params![id],
            competition_from_row,
        )
        .optional()
        .context("failed to load competition")
    }

    fn active_competitions(&self) -> Result<Vec<Competition>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {COMPETITION_COLUMNS} FROM competitions WHERE active = 1 ORDER BY id"
            ))
            .context("failed to prepare active_competitions query")?;
        let competitions = stmt
            .query_map([], competition_from_row)
            .context("failed to query competitions")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map competition rows")?;
        Ok(competitions)
    }

    fn active_memberships(&self) -> Result<Vec<Membership>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare("SELECT user_id, tier_rank, active FROM memberships WHERE active = 1")
            .context("failed to prepare memberships query")?;
        let memberships = stmt
            .query_map([], |row| {
                Ok(Membership {
                    user_id: row.get(0)?,
                    tier_rank: row.get(1)?,
                    active: row.get(2)?,
                })
            })
            .context("failed to query memberships")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map membership rows")?;
        Ok(memberships)
    }
}

impl MatchStore for Database {
    fn find_match(&self, id: i64) -> Result<Option<Match>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {MATCH_COLUMNS} FROM matches WHERE id = ?1"),
            params![id],
            match_from_row,
        )
        .optional()
        .context("failed to load match")
    }

    fn matches_with_pending_predictions(&self) -> Result<Vec<i64>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT DISTINCT m.id
                 FROM matches m
                 INNER JOIN competitions c ON c.id = m.competition_id
                 INNER JOIN predictions p ON p.match_id = m.id
                 WHERE c.active = 1
                   AND m.status = 'finished'
                   AND m.result IS NOT NULL
                   AND p.status = 'pending'
                 ORDER BY m.id",
            )
            .context("failed to prepare pending matches query")?;
        let ids = stmt
            .query_map([], |row| row.get(0))
            .context("failed to query pending matches")?
            .collect::<std::result::Result<Vec<i64>, _>>()
            .context("failed to map pending match rows")?;
        Ok(ids)
    }

    fn latest_finish(&self, competition_id: i64) -> Result<Option<DateTime<Utc>>> {
        let conn = self.conn();
        let raw: Option<String> = conn
            .query_row(
                "SELECT MAX(finished_at) FROM matches
                 WHERE competition_id = ?1 AND status = 'finished'",
                params![competition_id],
                |row| row.get(0),
            )
            .context("failed to query latest finish")?;
        parse_timestamp(0, raw).context("failed to parse finished_at")
    }

    fn unranked_finished_matches(
        &self,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<Match>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT m.id, m.competition_id, m.status, m.result, m.finished_at, m.ranked_at
                 FROM matches m
                 INNER JOIN competitions c ON c.id = m.competition_id
                 WHERE c.active = 1
                   AND m.status = 'finished'
                   AND m.ranked_at IS NULL
                   AND m.finished_at >= ?1
                   AND m.finished_at < ?2
                 ORDER BY m.id",
            )
            .context("failed to prepare unranked matches query")?;
        let matches = stmt
            .query_map(params![timestamp(&from), timestamp(&until)], match_from_row)
            .context("failed to query unranked matches")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map unranked match rows")?;
        Ok(matches)
    }

    fn update_match_state(
        &self,
        id: i64,
        status: MatchStatus,
        result: Option<&MatchResult>,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let result_json = result
            .map(serde_json::to_string)
            .transpose()
            .context("failed to serialize match result")?;

        // Column references on the right-hand side see the pre-update row.
        let changed = self
            .conn()
            .execute(
                "UPDATE matches SET
                    finished_at = CASE
                        WHEN ?2 = 'finished' AND status = 'finished' THEN finished_at
                        WHEN ?2 = 'finished' THEN ?4
                        ELSE NULL
                    END,
                    status    = ?2,
                    result    = ?3,
                    ranked_at = NULL
                 WHERE id = ?1",
                params![id, status.as_str(), result_json, timestamp(&at)],
            )
            .context("failed to update match state")?;
        if changed == 0 {
            bail!("match {id} not found");
        }
        Ok(())
    }

    fn mark_ranked(&self, id: i64, at: DateTime<Utc>) -> Result<()> {
        let changed = self
            .conn()
            .execute(
                "UPDATE matches SET ranked_at = ?2 WHERE id = ?1",
                params![id, timestamp(&at)],
            )
            .context("failed to mark match ranked")?;
        if changed == 0 {
            bail!("match {id} not found");
        }
        Ok(())
    }
}

impl PredictionStore for Database {
    fn predictions_for_match(
        &self,
        match_id: i64,
        status: PredictionStatus,
    ) -> Result<Vec<Prediction>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {PREDICTION_COLUMNS} FROM predictions
                 WHERE match_id = ?1 AND status = ?2 ORDER BY id"
            ))
            .context("failed to prepare predictions query")?;
        let predictions = stmt
            .query_map(params![match_id, status.as_str()], prediction_from_row)
            .context("failed to query predictions")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map prediction rows")?;
        Ok(predictions)
    }

    fn save_prediction(&self, prediction: &Prediction) -> Result<()> {
        let changed = self
            .conn()
            .execute(
                "UPDATE predictions
                 SET points = ?2, is_exact = ?3, is_trend = ?4, is_wrong = ?5, status = ?6
                 WHERE id = ?1",
                params![
                    prediction.id,
                    prediction.points,
                    prediction.is_exact,
                    prediction.is_trend,
                    prediction.is_wrong,
                    prediction.status.as_str(),
                ],
            )
            .context("failed to save prediction")?;
        if changed == 0 {
            bail!("prediction {} not found", prediction.id);
        }
        Ok(())
    }
}

impl AggregateStore for Database {
    fn find_entry(&self, user_id: i64, competition_id: i64) -> Result<Option<Entry>> {
        let conn = self.conn();
        conn.query_row(
            &format!(
                "SELECT {ENTRY_COLUMNS} FROM entries WHERE user_id = ?1 AND competition_id = ?2"
            ),
            params![user_id, competition_id],
            entry_from_row,
        )
        .optional()
        .context("failed to load entry")
    }

    fn save_entry_totals(&self, entry: &Entry) -> Result<()> {
        self.conn()
            .execute(
                &format!(
                    "INSERT INTO entries
                        (user_id, competition_id, total_points, total_matches, exact_guesses,
                         correct_diffs, correct_trends, wrong_guesses, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, {NOW_SQL})
                     ON CONFLICT(user_id, competition_id) DO UPDATE SET
                        total_points   = excluded.total_points,
                        total_matches  = excluded.total_matches,
                        exact_guesses  = excluded.exact_guesses,
                        correct_diffs  = excluded.correct_diffs,
                        correct_trends = excluded.correct_trends,
                        wrong_guesses  = excluded.wrong_guesses,
                        updated_at     = excluded.updated_at"
                ),
                params![
                    entry.user_id,
                    entry.competition_id,
                    entry.total_points,
                    entry.total_matches,
                    entry.exact_guesses,
                    entry.correct_diffs,
                    entry.correct_trends,
                    entry.wrong_guesses,
                ],
            )
            .context("failed to save entry totals")?;
        Ok(())
    }

    fn find_user_stats(&self, user_id: i64) -> Result<Option<UserStats>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT user_id, total_points, total_predictions, exact_guesses, correct_trends,
                    wrong_guesses
             FROM user_stats WHERE user_id = ?1",
            params![user_id],
            |row| {
                Ok(UserStats {
                    user_id: row.get(0)?,
                    total_points: row.get(1)?,
                    total_predictions: row.get(2)?,
                    exact_guesses: row.get(3)?,
                    correct_trends: row.get(4)?,
                    wrong_guesses: row.get(5)?,
                })
            },
        )
        .optional()
        .context("failed to load user stats")
    }

    fn save_user_stats(&self, stats: &UserStats) -> Result<()> {
        self.conn()
            .execute(
                "INSERT INTO user_stats
                    (user_id, total_points, total_predictions, exact_guesses, correct_trends,
                     wrong_guesses)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(user_id) DO UPDATE SET
                    total_points      = excluded.total_points,
                    total_predictions = excluded.total_predictions,
                    exact_guesses     = excluded.exact_guesses,
                    correct_trends    = excluded.correct_trends,
                    wrong_guesses     = excluded.wrong_guesses",
                params![
                    stats.user_id,
                    stats.total_points,
                    stats.total_predictions,
                    stats.exact_guesses,
                    stats.correct_trends,
                    stats.wrong_guesses,
                ],
            )
            .context("failed to save user stats")?;
        Ok(())
    }
}

impl StandingsStore for Database {
    fn entries_page(
        &self,
        competition_id: i64,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Entry>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {ENTRY_COLUMNS} FROM entries
                 WHERE competition_id = ?1
                 ORDER BY user_id
                 LIMIT ?2 OFFSET ?3"
            ))
            .context("failed to prepare entries page query")?;
        let entries = stmt
            .query_map(
                params![competition_id, limit as i64, offset as i64],
                entry_from_row,
            )
            .context("failed to query entries page")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map entry rows")?;
        Ok(entries)
    }

    fn save_rank(&self, update: &RankUpdate) -> Result<()> {
        let changed = self
            .conn()
            .execute(
                &format!(
                    "UPDATE entries
                     SET current_rank = ?3, previous_rank = ?4, rank_change = ?5,
                         updated_at = {NOW_SQL}
                     WHERE user_id = ?1 AND competition_id = ?2"
                ),
                params![
                    update.user_id,
                    update.competition_id,
                    update.current_rank,
                    update.previous_rank,
                    update.rank_change,
                ],
            )
            .context("failed to save rank")?;
        if changed == 0 {
            bail!(
                "entry for user {} in competition {} not found",
                update.user_id,
                update.competition_id
            );
        }
        Ok(())
    }
}

impl SnapshotStore for Database {
    fn append_snapshot(&self, snapshot: &Snapshot) -> Result<()> {
        self.conn()
            .execute(
                "INSERT INTO snapshots
                    (competition_id, user_id, rank, total_points, total_matches, exact_guesses,
                     correct_diffs, correct_trends, wrong_guesses, taken_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    snapshot.competition_id,
                    snapshot.user_id,
                    snapshot.rank,
                    snapshot.total_points,
                    snapshot.total_matches,
                    snapshot.exact_guesses,
                    snapshot.correct_diffs,
                    snapshot.correct_trends,
                    snapshot.wrong_guesses,
                    timestamp(&snapshot.taken_at),
                ],
            )
            .context("failed to append snapshot")?;
        Ok(())
    }

    fn snapshots_for(&self, competition_id: i64) -> Result<Vec<Snapshot>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT competition_id, user_id, rank, total_points, total_matches, exact_guesses,
                        correct_diffs, correct_trends, wrong_guesses, taken_at
                 FROM snapshots WHERE competition_id = ?1 ORDER BY id",
            )
            .context("failed to prepare snapshots query")?;
        let snapshots = stmt
            .query_map(params![competition_id], |row| {
                let taken_at = parse_timestamp(9, row.get(9)?)?
                    .ok_or_else(|| invalid_column(9, "snapshot without taken_at".into()))?;
                Ok(Snapshot {
                    competition_id: row.get(0)?,
                    user_id: row.get(1)?,
                    rank: row.get(2)?,
                    total_points: row.get(3)?,
                    total_matches: row.get(4)?,
                    exact_guesses: row.get(5)?,
                    correct_diffs: row.get(6)?,
                    correct_trends: row.get(7)?,
                    wrong_guesses: row.get(8)?,
                    taken_at,
                })
            })
            .context("failed to query snapshots")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map snapshot rows")?;
        Ok(snapshots)
    }
}

impl UnitOfWork for Database {
    /// Wraps `work` in a SQLite savepoint. The connection stays locked for
    /// the whole unit, so writes from other threads cannot land inside it;
    /// `work` itself re-enters the lock on this thread.
    fn unit_of_work<T, F>(&self, work: F) -> Result<T>
    where
        F: FnOnce() -> Result<T>,
    {
        let conn = self.conn();
        conn.execute_batch("SAVEPOINT unit_of_work")
            .context("failed to open savepoint")?;

        match work() {
            Ok(value) => {
                conn.execute_batch("RELEASE unit_of_work")
                    .context("failed to release savepoint")?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback) =
                    conn.execute_batch("ROLLBACK TO unit_of_work; RELEASE unit_of_work")
                {
                    warn!("Failed to roll back savepoint: {}", rollback);
                }
                Err(err)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Row mapping helpers
// ---------------------------------------------------------------------------

fn timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_timestamp(idx: usize, raw: Option<String>) -> rusqlite::Result<Option<DateTime<Utc>>> {
    raw.map(|text| {
        DateTime::parse_from_rfc3339(&text)
            .map(|at| at.with_timezone(&Utc))
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    })
    .transpose()
}

fn invalid_column(idx: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, message.into())
}

fn competition_from_row(row: &Row<'_>) -> rusqlite::Result<Competition> {
    Ok(Competition {
        id: row.get(0)?,
        name: row.get(1)?,
        active: row.get(2)?,
        recalculation_hour: row.get(3)?,
        scoring_rules: ScoringRules {
            exact_score: row.get(4)?,
            winner_only: row.get(5)?,
        },
    })
}

fn match_from_row(row: &Row<'_>) -> rusqlite::Result<Match> {
    let status_text: String = row.get(2)?;
    let status = MatchStatus::from_str_status(&status_text)
        .ok_or_else(|| invalid_column(2, format!("unknown match status `{status_text}`")))?;

    let result = row
        .get::<_, Option<String>>(3)?
        .map(|json| {
            serde_json::from_str::<MatchResult>(&json)
                .map_err(|e| rusqlite::Error::FromSqlConversionFailure(3, Type::Text, Box::new(e)))
        })
        .transpose()?;

    Ok(Match {
        id: row.get(0)?,
        competition_id: row.get(1)?,
        status,
        result,
        finished_at: parse_timestamp(4, row.get(4)?)?,
        ranked_at: parse_timestamp(5, row.get(5)?)?,
    })
}

fn prediction_from_row(row: &Row<'_>) -> rusqlite::Result<Prediction> {
    let status_text: String = row.get(9)?;
    let status = PredictionStatus::from_str_status(&status_text)
        .ok_or_else(|| invalid_column(9, format!("unknown prediction status `{status_text}`")))?;

    Ok(Prediction {
        id: row.get(0)?,
        match_id: row.get(1)?,
        user_id: row.get(2)?,
        home_goals: row.get(3)?,
        away_goals: row.get(4)?,
        points: row.get(5)?,
        is_exact: row.get(6)?,
        is_trend: row.get(7)?,
        is_wrong: row.get(8)?,
        status,
    })
}

fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<Entry> {
    Ok(Entry {
        user_id: row.get(0)?,
        competition_id: row.get(1)?,
        total_points: row.get(2)?,
        total_matches: row.get(3)?,
        exact_guesses: row.get(4)?,
        correct_diffs: row.get(5)?,
        correct_trends: row.get(6)?,
        wrong_guesses: row.get(7)?,
        current_rank: row.get(8)?,
        previous_rank: row.get(9)?,
        rank_change: row.get(10)?,
        updated_at: parse_timestamp(11, row.get(11)?)?,
    })
}
