// Copyright (c) 2022 10X Genomics, Inc. All rights reserved.

// Fixed column layout for the tab-separated clonotype tables (VDJtools convention).
// Deviation from this layout is treated as a parse error, not recovered from.

pub const CDR3AA_COL: usize = 3;
pub const V_COL: usize = 4;
pub const J_COL: usize = 6;
pub const INCIDENCE_COL: usize = 11;

// Column layout for per-sample tables.

pub const READS_COL: usize = 0;

// Control structure for a coincidence run, filled in from the command line.

#[derive(Default, Debug)]
pub struct CoincideOpt {
    // incidence-ratio threshold: keep a clonotype iff its raw incidence exceeds
    // this fraction of the cohort size
    pub incidence_ratio_threshold: f64,
    // emit a pair iff p-value <= this
    pub p_value_threshold: f64,
    // emit a pair iff |log odds| >= this
    pub log_odds_threshold: f64,
    // candidate public clonotype table
    pub public_list_file: String,
    // per-sample tables, in cohort order; the position of a file in this list
    // is the sample index for the run
    pub sample_files: Vec<String>,
    // output path prefix
    pub out_prefix: String,
}

impl CoincideOpt {
    pub fn n_samples(&self) -> usize {
        self.sample_files.len()
    }
}
