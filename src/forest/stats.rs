//! Forest counters

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::parallel::UpdateSummary;

/// Thread-safe counters shared by every tree of a forest
#[derive(Debug, Default)]
pub struct ForestStats {
    /// Raw points accepted by `update`
    pub points_observed: AtomicU64,
    /// Shingles produced (the readiness counter)
    pub shingles_seen: AtomicU64,
    /// Per-tree admissions
    pub admitted: AtomicU64,
    /// Per-tree evictions
    pub evicted: AtomicU64,
    /// Per-tree rejections
    pub rejected: AtomicU64,
}

/// Point-in-time copy of [`ForestStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub points_observed: u64,
    pub shingles_seen: u64,
    pub admitted: u64,
    pub evicted: u64,
    pub rejected: u64,
}

impl ForestStats {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn add_point(&self) {
        self.points_observed.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a new shingle, returning the updated total
    #[inline]
    pub fn next_shingle(&self) -> u64 {
        self.shingles_seen.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub fn record(&self, summary: &UpdateSummary) {
        self.admitted.fetch_add(summary.admitted as u64, Ordering::Relaxed);
        self.evicted.fetch_add(summary.evicted as u64, Ordering::Relaxed);
        self.rejected.fetch_add(summary.rejected as u64, Ordering::Relaxed);
    }

    pub fn get_points(&self) -> u64 {
        self.points_observed.load(Ordering::Relaxed)
    }

    pub fn get_shingles(&self) -> u64 {
        self.shingles_seen.load(Ordering::Acquire)
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            points_observed: self.get_points(),
            shingles_seen: self.get_shingles(),
            admitted: self.admitted.load(Ordering::Relaxed),
            evicted: self.evicted.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
        }
    }
}
