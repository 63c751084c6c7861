// Copyright (c) 2022 10X Genomics, Inc. All rights reserved.
//
// Pairwise coincidence evaluation.  The retained clonotypes are sorted by CDR3, and the
// canonical pair ordering (first key lexicographically greater than the second, each
// unordered pair once, no self-pairs) is then exactly the triangle j < i, which we walk with
// a parallel outer loop.  Every evaluated pair updates the volcano background grid; pairs
// passing both significance filters additionally fan in through a channel drained by a
// single writer thread that owns the output file.

use crate::load::Clonotype;
use coincide_core::hyper::{log10_floored, log_odds, two_sided_p};
use coincide_core::timestamp;
use coincide_core::volcano::VolcanoGrid;
use crossbeam_channel::unbounded;
use io_utils::{fwriteln, open_for_write_new};
use rayon::prelude::*;
use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};

pub const PAIR_TABLE_HEADER: &str =
    "cdr3aa.1\tv.1\tj.1\tcdr3aa.2\tv.2\tj.2\tn12\tn1\tn2\tn.total\tlog.odds\tlog.p.value";

pub struct PairStats {
    pub pairs_checked: u64,
    pub good_pairs: u64,
}

// clonotypes must be sorted ascending by cdr3aa; main_coincide guarantees this.

pub fn evaluate_pairs(
    clonotypes: &[Clonotype],
    n_samples: usize,
    p_value_threshold: f64,
    log_odds_threshold: f64,
    grid: &VolcanoGrid,
    out_file: &str,
) -> PairStats {
    let n = clonotypes.len();
    let all_pairs = n as u64 * (n as u64).saturating_sub(1) / 2;
    let pairs = AtomicU64::new(0);
    let good = AtomicU64::new(0);
    let (send, recv) = unbounded::<String>();
    let mut out = open_for_write_new![&out_file];
    fwriteln!(out, "{}", PAIR_TABLE_HEADER);
    crossbeam_utils::thread::scope(|sc| {
        let writer = sc.spawn(move |_| {
            let mut out = out;
            for row in recv.iter() {
                fwriteln!(out, "{}", row);
            }
            out.flush().unwrap();
        });
        (0..n).into_par_iter().for_each(|i| {
            let c1 = &clonotypes[i];
            let n1 = c1.bits.count();
            for c2 in clonotypes.iter().take(i) {
                let n2 = c2.bits.count();

                // No evaluable evidence unless both clonotypes were actually seen.

                if n1 > 0 && n2 > 0 {
                    let n12 = c1.bits.count_and(&c2.bits);
                    let lo = log_odds(n12, n1, n2, n_samples);
                    let p = two_sided_p(n12, n1, n2, n_samples);
                    let lp = log10_floored(p);
                    grid.add(lp, lo);
                    if p <= p_value_threshold && lo.abs() >= log_odds_threshold {
                        good.fetch_add(1, Ordering::Relaxed);
                        send.send(format!(
                            "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
                            c1.cdr3aa,
                            c1.v_gene,
                            c1.j_gene,
                            c2.cdr3aa,
                            c2.v_gene,
                            c2.j_gene,
                            n12,
                            n1,
                            n2,
                            n_samples,
                            lo,
                            lp
                        ))
                        .unwrap();
                    }
                }
                let done = pairs.fetch_add(1, Ordering::Relaxed) + 1;
                if done % 50_000_000 == 0 {
                    println!(
                        "[{}] Checked ~{} of {} pairs, {} passing the filters so far.",
                        timestamp(),
                        done,
                        all_pairs,
                        good.load(Ordering::Relaxed)
                    );
                }
            }
        });
        drop(send);
        writer.join().unwrap();
    })
    .unwrap();
    PairStats {
        pairs_checked: pairs.load(Ordering::Relaxed),
        good_pairs: good.load(Ordering::Relaxed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coincide_core::bitset::IncidenceBits;

    fn clonotype(cdr3: &str, samples: &[usize], n_samples: usize) -> Clonotype {
        let mut bits = IncidenceBits::new(n_samples);
        for &s in samples {
            bits.set(s);
        }
        Clonotype {
            cdr3aa: cdr3.to_string(),
            v_gene: format!("TRBV-{}", cdr3),
            j_gene: format!("TRBJ-{}", cdr3),
            bits,
        }
    }

    fn read_rows(path: &std::path::Path) -> Vec<String> {
        let text = std::fs::read_to_string(path).unwrap();
        text.lines().skip(1).map(str::to_string).collect()
    }

    #[test]
    fn test_triangle_visitation_and_emission() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("pairs.txt");
        let mut clonotypes = vec![
            clonotype("CASSA", &[0, 1, 2, 3, 4], 10),
            clonotype("CASSB", &[3, 4, 5, 6, 7], 10),
            clonotype("CASSC", &[], 10),
            clonotype("CASSD", &[0, 9], 10),
        ];
        clonotypes.sort_by(|a, b| a.cdr3aa.cmp(&b.cdr3aa));
        let grid = VolcanoGrid::new();
        let stats = evaluate_pairs(&clonotypes, 10, 1.0, 0.0, &grid, out.to_str().unwrap());
        // C(4,2) pairs visited, including the ones skipped for lack of evidence
        assert_eq!(stats.pairs_checked, 6);
        // CASSC is present in no sample, so its three pairs are not evaluated and every
        // remaining pair passes the wide-open thresholds
        assert_eq!(stats.good_pairs, 3);
        let rows = read_rows(&out);
        assert_eq!(rows.len(), 3);
        // canonical ordering puts the lexicographically greater CDR3 first
        for row in &rows {
            let f = row.split('\t').collect::<Vec<&str>>();
            assert_eq!(f.len(), 12);
            assert!(f[0] > f[3], "row not canonically ordered: {}", row);
        }
        // the A-B pair: n1 = n2 = 5, n12 = 2; the emitting side is B
        let ab = rows
            .iter()
            .find(|r| r.starts_with("CASSB\t") && r.contains("\tCASSA\t"))
            .unwrap();
        let f = ab.split('\t').collect::<Vec<&str>>();
        assert_eq!(&f[6..10], &["2", "5", "5", "10"]);
        let lo = f[10].parse::<f64>().unwrap();
        let lp = f[11].parse::<f64>().unwrap();
        assert!((lo - (20.0_f64 / 25.0).log10()).abs() < 1e-9);
        let expect_p: f64 = 0.5 - 50.0 / 252.0;
        assert!((lp - (expect_p + 1e-100).log10()).abs() < 1e-9);
    }

    #[test]
    fn test_volcano_counts_match_evaluated_pairs() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("pairs.txt");
        let mut clonotypes = vec![
            clonotype("CASSA", &[0, 1, 2, 3, 4], 10),
            clonotype("CASSB", &[3, 4, 5, 6, 7], 10),
            clonotype("CASSD", &[0, 9], 10),
            clonotype("CASSE", &[5], 10),
        ];
        clonotypes.sort_by(|a, b| a.cdr3aa.cmp(&b.cdr3aa));
        let grid = VolcanoGrid::new();
        let stats = evaluate_pairs(&clonotypes, 10, 1.0, 0.0, &grid, out.to_str().unwrap());
        assert_eq!(stats.pairs_checked, 6);
        // every evaluated pair with an in-range (log p, log odds) coordinate lands in the
        // grid; disjoint pairs have log odds -20 and are dropped
        use coincide_core::volcano::{log_odds_coord, log_p_coord};
        let mut in_range = 0u64;
        for i in 0..clonotypes.len() {
            for j in 0..i {
                let n1 = clonotypes[i].bits.count();
                let n2 = clonotypes[j].bits.count();
                if n1 == 0 || n2 == 0 {
                    continue;
                }
                let n12 = clonotypes[i].bits.count_and(&clonotypes[j].bits);
                let lo = log_odds(n12, n1, n2, 10);
                let lp = log10_floored(two_sided_p(n12, n1, n2, 10));
                if (0..=100).contains(&log_p_coord(lp)) && (0..=100).contains(&log_odds_coord(lo))
                {
                    in_range += 1;
                }
            }
        }
        assert!(in_range < 6);
        assert_eq!(grid.total(), in_range);
    }

    #[test]
    fn test_rerun_deterministic_as_set() {
        let dir = tempfile::tempdir().unwrap();
        let mut clonotypes = Vec::new();
        for i in 0..12usize {
            let samples = (0..10usize)
                .filter(|&s| (s * 7 + i) % 3 != 0)
                .collect::<Vec<usize>>();
            clonotypes.push(clonotype(&format!("CASS{:02}", i), &samples, 10));
        }
        clonotypes.sort_by(|a, b| a.cdr3aa.cmp(&b.cdr3aa));
        let out1 = dir.path().join("run1.txt");
        let out2 = dir.path().join("run2.txt");
        let grid1 = VolcanoGrid::new();
        let grid2 = VolcanoGrid::new();
        evaluate_pairs(&clonotypes, 10, 0.9, 0.0, &grid1, out1.to_str().unwrap());
        evaluate_pairs(&clonotypes, 10, 0.9, 0.0, &grid2, out2.to_str().unwrap());
        let mut rows1 = read_rows(&out1);
        let mut rows2 = read_rows(&out2);
        rows1.sort();
        rows2.sort();
        assert!(!rows1.is_empty());
        assert_eq!(rows1, rows2);
        assert_eq!(grid1.total(), grid2.total());
    }
}
