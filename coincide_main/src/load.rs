// Copyright (c) 2022 10X Genomics, Inc. All rights reserved.
//
// Two-pass loader for the public clonotype incidence model.
//
// Pass 1 reads the candidate table once, histogramming the raw incidence of every candidate
// and retaining those whose incidence exceeds RATIO times the cohort size, each with a fresh
// all-zero presence bit-vector.  Pass 2 scans each sample table once and sets the sample's
// bit for every retained clonotype it contains.  Keys not in the retained set are ignored.

use coincide_core::bitset::IncidenceBits;
use coincide_core::defs::{CDR3AA_COL, INCIDENCE_COL, J_COL, V_COL};
use coincide_core::{require_readable_file, timestamp};
use io_utils::open_for_read;
use std::collections::HashMap;
use std::io::BufRead;

#[derive(Debug)]
pub struct Clonotype {
    pub cdr3aa: String,
    pub v_gene: String,
    pub j_gene: String,
    pub bits: IncidenceBits,
}

fn read_error(file: &str, e: std::io::Error) -> String {
    format!("\nError reading the file\n{}\n: {}.\n", file, e)
}

fn short_row_error(file: &str, line: usize, found: usize, needed: usize) -> String {
    format!(
        "\nThe file\n{}\nis malformed at line {}: found {} tab-separated fields but at least \
         {} are needed.\n",
        file, line, found, needed
    )
}

// Pass 1.  Returns the retained clonotypes keyed by CDR3, and the raw incidence histogram
// over all candidates as (incidence, count), ascending.

pub fn read_public_list(
    file: &str,
    ratio: f64,
    n_samples: usize,
) -> Result<(HashMap<String, Clonotype>, Vec<(usize, u64)>), String> {
    require_readable_file(file, "PUBLIC")?;
    let f = open_for_read![&file];
    let mut retained = HashMap::<String, Clonotype>::new();
    let mut hist = HashMap::<usize, u64>::new();
    for (i, line) in f.lines().enumerate() {
        let s = line.map_err(|e| read_error(file, e))?;
        if i == 0 {
            continue; // header
        }
        let fields = s.split('\t').collect::<Vec<&str>>();
        if fields.len() <= INCIDENCE_COL {
            return Err(short_row_error(file, i + 1, fields.len(), INCIDENCE_COL + 1));
        }
        let incidence = fields[INCIDENCE_COL].parse::<usize>().map_err(|_| {
            format!(
                "\nThe file\n{}\nis malformed at line {}: the incidence field \"{}\" is not \
                 a nonnegative integer.\n",
                file,
                i + 1,
                fields[INCIDENCE_COL]
            )
        })?;
        *hist.entry(incidence).or_insert(0) += 1;
        if incidence as f64 > ratio * n_samples as f64 {
            retained.insert(
                fields[CDR3AA_COL].to_string(),
                Clonotype {
                    cdr3aa: fields[CDR3AA_COL].to_string(),
                    v_gene: fields[V_COL].to_string(),
                    j_gene: fields[J_COL].to_string(),
                    bits: IncidenceBits::new(n_samples),
                },
            );
        }
    }
    let mut hist = hist.into_iter().collect::<Vec<(usize, u64)>>();
    hist.sort_unstable();
    Ok((retained, hist))
}

// Pass 2.  The position of a file in sample_files is its sample index.

pub fn scan_samples(
    retained: &mut HashMap<String, Clonotype>,
    sample_files: &[String],
) -> Result<(), String> {
    for (i, sf) in sample_files.iter().enumerate() {
        require_readable_file(sf, "SAMPLES")?;
        let f = open_for_read![&sf];
        for (j, line) in f.lines().enumerate() {
            let s = line.map_err(|e| read_error(sf, e))?;
            if j == 0 {
                continue; // header
            }
            let fields = s.split('\t').collect::<Vec<&str>>();
            if fields.len() <= CDR3AA_COL {
                return Err(short_row_error(sf, j + 1, fields.len(), CDR3AA_COL + 1));
            }
            if let Some(c) = retained.get_mut(fields[CDR3AA_COL]) {
                c.bits.set(i);
            }
        }
        if i % 10 == 0 {
            println!(
                "[{}] Scanned {} of {} samples for public incidence.",
                timestamp(),
                i,
                sample_files.len()
            );
        }
    }
    Ok(())
}
