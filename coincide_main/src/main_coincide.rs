// Copyright (c) 2022 10X Genomics, Inc. All rights reserved.
//
// Top level for coincide: load the public clonotype incidence model, evaluate all pairs,
// and write the three output tables.

use crate::evaluate::{evaluate_pairs, PairStats};
use crate::load::{read_public_list, scan_samples, Clonotype};
use crate::proc::proc_args;
use coincide_core::timestamp;
use coincide_core::volcano::{
    log_odds_value, log_p_value, VolcanoGrid, LOG_ODDS_BINS, LOG_P_BINS,
};
use io_utils::{fwriteln, open_for_write_new};
use perf_stats::elapsed;
use std::io::Write;
use std::time::Instant;

fn write_error(file: &str, e: std::io::Error) -> String {
    format!("\nError writing the file\n{}\n: {}.\n", file, e)
}

pub fn main_coincide(args: &[String]) -> Result<(), String> {
    let t = Instant::now();
    let opt = proc_args(args)?;
    let n_samples = opt.n_samples();

    // Pass 1: read the candidate list, histogram raw incidence over all candidates, and
    // retain the public clonotypes.

    let (mut retained, hist) = read_public_list(
        &opt.public_list_file,
        opt.incidence_ratio_threshold,
        n_samples,
    )?;

    // Write the incidence histogram.

    let hist_file = format!("{}.incidence.hist.txt", opt.out_prefix);
    {
        let mut out = open_for_write_new![&hist_file];
        fwriteln!(out, "incidence\tcount");
        for (incidence, count) in &hist {
            fwriteln!(out, "{}\t{}", incidence, count);
        }
        out.flush().map_err(|e| write_error(&hist_file, e))?;
    }

    println!(
        "[{}] Loaded {} public clonotypes",
        timestamp(),
        retained.len()
    );

    // Pass 2: scan each sample and fill in the presence bit-vectors.

    scan_samples(&mut retained, &opt.sample_files)?;

    // Sort by CDR3 so the canonical pair ordering is the triangle below the diagonal.

    let mut clonotypes = retained.into_iter().map(|x| x.1).collect::<Vec<Clonotype>>();
    clonotypes.sort_by(|a, b| a.cdr3aa.cmp(&b.cdr3aa));

    // Evaluate all pairs.

    let grid = VolcanoGrid::new();
    let PairStats {
        pairs_checked,
        good_pairs,
    } = evaluate_pairs(
        &clonotypes,
        n_samples,
        opt.p_value_threshold,
        opt.log_odds_threshold,
        &grid,
        &format!("{}.txt", opt.out_prefix),
    );

    // Write the volcano background grid, zero-count cells included.

    let volcano_file = format!("{}.volcano.txt", opt.out_prefix);
    {
        let mut out = open_for_write_new![&volcano_file];
        fwriteln!(out, "log.p\tlog.odds\tcount");
        for pc in 0..=LOG_P_BINS {
            for oc in 0..=LOG_ODDS_BINS {
                fwriteln!(
                    out,
                    "{}\t{}\t{}",
                    log_p_value(pc),
                    log_odds_value(oc),
                    grid.count(pc, oc)
                );
            }
        }
        out.flush().map_err(|e| write_error(&volcano_file, e))?;
    }

    println!(
        "[{}] DONE.  Checked {} pairs, {} passing the filtering criteria, used {:.2} seconds.",
        timestamp(),
        pairs_checked,
        good_pairs,
        elapsed(&t)
    );
    Ok(())
}
