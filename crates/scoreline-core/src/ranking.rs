// Standings: order a competition's entries, assign competition ranks, and
// optionally record a snapshot of the result.

use std::cmp::Ordering;
use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

use crate::error::{EngineError, Result};
use crate::model::{Entry, RankUpdate, Snapshot};
use crate::store::RecordStore;

// ---------------------------------------------------------------------------
// Tie-break order
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

/// One tier of the standings order.
#[derive(Clone, Copy)]
pub struct TieBreak {
    pub name: &'static str,
    pub key: fn(&Standing) -> i64,
    pub direction: Direction,
}

impl TieBreak {
    fn compare(&self, a: &Standing, b: &Standing) -> Ordering {
        let ordering = (self.key)(a).cmp(&(self.key)(b));
        match self.direction {
            Direction::Ascending => ordering,
            Direction::Descending => ordering.reverse(),
        }
    }
}

/// Standings order, most significant tier first.
pub const STANDINGS_ORDER: [TieBreak; 5] = [
    TieBreak {
        name: "total_points",
        key: |s| i64::from(s.entry.total_points),
        direction: Direction::Descending,
    },
    TieBreak {
        name: "exact_guesses",
        key: |s| i64::from(s.entry.exact_guesses),
        direction: Direction::Descending,
    },
    TieBreak {
        name: "correct_diffs",
        key: |s| i64::from(s.entry.correct_diffs),
        direction: Direction::Descending,
    },
    TieBreak {
        name: "correct_trends",
        key: |s| i64::from(s.entry.correct_trends),
        direction: Direction::Descending,
    },
    TieBreak {
        name: "tier_rank",
        key: |s| s.tier_rank,
        direction: Direction::Descending,
    },
];

/// An entry paired with its owner's membership tier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Standing {
    pub entry: Entry,
    pub tier_rank: i64,
}

/// Compare two standings tier by tier. `Equal` means the pair is tied on
/// every tier and shares a rank.
pub fn compare_standings(a: &Standing, b: &Standing) -> Ordering {
    STANDINGS_ORDER
        .iter()
        .map(|tier| tier.compare(a, b))
        .find(|ordering| ordering.is_ne())
        .unwrap_or(Ordering::Equal)
}

/// Competition ranks ("1,1,3") for standings already sorted by
/// [`compare_standings`]: a tie group takes the 1-based position of its first
/// member.
pub fn competition_ranks(sorted: &[Standing]) -> Vec<u32> {
    let mut ranks = Vec::with_capacity(sorted.len());
    for (index, standing) in sorted.iter().enumerate() {
        let position = (index + 1) as u32;
        let rank = match index.checked_sub(1) {
            Some(prev) if compare_standings(&sorted[prev], standing).is_eq() => ranks[prev],
            _ => position,
        };
        ranks.push(rank);
    }
    ranks
}

/// Places gained since the previous pass. Zero for an entry never ranked.
pub fn rank_change(previous_rank: u32, new_rank: u32) -> i64 {
    if previous_rank == 0 {
        0
    } else {
        i64::from(previous_rank) - i64::from(new_rank)
    }
}

// ---------------------------------------------------------------------------
// Recalculation pass
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RankingReport {
    pub competition_id: i64,
    pub ranked: usize,
    pub snapshots: usize,
}

pub struct RankingRecalculator<'a, S> {
    store: &'a S,
    page_size: usize,
}

impl<'a, S: RecordStore> RankingRecalculator<'a, S> {
    pub fn new(store: &'a S, page_size: usize) -> Self {
        Self {
            store,
            page_size: page_size.max(1),
        }
    }

    /// Rank every entry of a competition. Rank fields are written for every
    /// entry even when unchanged. With `snapshot`, one snapshot row per entry
    /// is appended, stamped `now`.
    ///
    /// A store failure part way through propagates and leaves the ranks
    /// written so far in place.
    pub fn recalculate(
        &self,
        competition_id: i64,
        snapshot: bool,
        now: DateTime<Utc>,
    ) -> Result<RankingReport> {
        if self.store.find_competition(competition_id)?.is_none() {
            return Err(EngineError::CompetitionNotFound(competition_id));
        }

        let tiers = self.tier_map()?;
        let mut standings: Vec<Standing> = self
            .load_entries(competition_id)?
            .into_iter()
            .map(|entry| Standing {
                tier_rank: tiers.get(&entry.user_id).copied().unwrap_or(0),
                entry,
            })
            .collect();
        standings.sort_by(compare_standings);
        let ranks = competition_ranks(&standings);

        for (standing, &rank) in standings.iter().zip(&ranks) {
            let previous_rank = standing.entry.current_rank;
            self.store.save_rank(&RankUpdate {
                user_id: standing.entry.user_id,
                competition_id,
                current_rank: rank,
                previous_rank,
                rank_change: rank_change(previous_rank, rank),
            })?;
        }

        let mut snapshots = 0;
        if snapshot {
            for (standing, &rank) in standings.iter().zip(&ranks) {
                self.store
                    .append_snapshot(&Snapshot::capture(&standing.entry, rank, now))?;
                snapshots += 1;
            }
        }

        info!(
            "Ranked {} entries in competition {} ({} snapshots)",
            standings.len(),
            competition_id,
            snapshots
        );
        Ok(RankingReport {
            competition_id,
            ranked: standings.len(),
            snapshots,
        })
    }

    /// Highest active tier per user.
    fn tier_map(&self) -> Result<HashMap<i64, i64>> {
        let mut tiers: HashMap<i64, i64> = HashMap::new();
        for membership in self.store.active_memberships()? {
            tiers
                .entry(membership.user_id)
                .and_modify(|tier| *tier = (*tier).max(membership.tier_rank))
                .or_insert(membership.tier_rank);
        }
        Ok(tiers)
    }

    fn load_entries(&self, competition_id: i64) -> Result<Vec<Entry>> {
        let mut entries = Vec::new();
        loop {
            let page = self
                .store
                .entries_page(competition_id, entries.len(), self.page_size)?;
            let last_page = page.len() < self.page_size;
            entries.extend(page);
            if last_page {
                break;
            }
        }
        debug!(
            "Loaded {} entries for competition {}",
            entries.len(),
            competition_id
        );
        Ok(entries)
    }
}
