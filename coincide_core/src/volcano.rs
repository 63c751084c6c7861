// Copyright (c) 2022 10X Genomics, Inc. All rights reserved.
//
// Background density grid for volcano plots.  Every evaluated pair deposits one count at its
// (log10 p-value, log10 odds) cell, whether or not the pair passes the significance filters.
// The grid is fixed: 100 bins spanning [-10, 0] on the p axis and 100 bins spanning [-1, 1]
// on the odds axis, with 101 boundary coordinates per axis.  Coordinates are linear with
// truncation toward zero.  A pair mapping outside the grid is dropped without comment; that
// is the intended policy for extreme values, not an error.

use std::sync::atomic::{AtomicU64, Ordering};

pub const LOG_ODDS_BINS: usize = 100;
pub const LOG_P_BINS: usize = 100;
pub const MIN_LOG_ODDS: f64 = -1.0;
pub const MAX_LOG_ODDS: f64 = 1.0;
pub const MIN_LOG_P: f64 = -10.0;
pub const MAX_LOG_P: f64 = 0.0;

pub fn log_odds_coord(log_odds: f64) -> i64 {
    ((log_odds - MIN_LOG_ODDS) * LOG_ODDS_BINS as f64 / (MAX_LOG_ODDS - MIN_LOG_ODDS)) as i64
}

pub fn log_odds_value(coord: usize) -> f64 {
    MIN_LOG_ODDS + coord as f64 / LOG_ODDS_BINS as f64 * (MAX_LOG_ODDS - MIN_LOG_ODDS)
}

pub fn log_p_coord(log_p: f64) -> i64 {
    ((log_p - MIN_LOG_P) * LOG_P_BINS as f64 / (MAX_LOG_P - MIN_LOG_P)) as i64
}

pub fn log_p_value(coord: usize) -> f64 {
    MIN_LOG_P + coord as f64 / LOG_P_BINS as f64 * (MAX_LOG_P - MIN_LOG_P)
}

pub struct VolcanoGrid {
    // (LOG_P_BINS + 1) x (LOG_ODDS_BINS + 1) cells, row-major in the p coordinate
    counts: Vec<AtomicU64>,
}

impl VolcanoGrid {
    pub fn new() -> Self {
        let n = (LOG_P_BINS + 1) * (LOG_ODDS_BINS + 1);
        let mut counts = Vec::with_capacity(n);
        for _ in 0..n {
            counts.push(AtomicU64::new(0));
        }
        VolcanoGrid { counts }
    }

    // Deposit one count for a pair.  Out-of-range coordinates are dropped.

    pub fn add(&self, log_p: f64, log_odds: f64) {
        let pc = log_p_coord(log_p);
        let oc = log_odds_coord(log_odds);
        if (0..=LOG_P_BINS as i64).contains(&pc) && (0..=LOG_ODDS_BINS as i64).contains(&oc) {
            self.counts[pc as usize * (LOG_ODDS_BINS + 1) + oc as usize]
                .fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn count(&self, pc: usize, oc: usize) -> u64 {
        self.counts[pc * (LOG_ODDS_BINS + 1) + oc].load(Ordering::Relaxed)
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().map(|c| c.load(Ordering::Relaxed)).sum()
    }
}

impl Default for VolcanoGrid {
    fn default() -> Self {
        VolcanoGrid::new()
    }
}
