// Copyright (c) 2022 10X Genomics, Inc. All rights reserved.
//
// Build per-sample positional amino-acid usage factors for CDR3 sequences.
//
// build_factors SAMPLES=file1,...,fileN OUT=file
//
// Every clonotype row in a sample table contributes, for each position j of its CDR3, one
// unique count and its read count to the (cdr3 length, j, amino acid at j) signature.  The
// output has one row per sample and signature, with the per-sample totals appended, so that
// downstream normalization needs no second pass.

use coincide_core::defs::{CDR3AA_COL, READS_COL};
use coincide_core::{require_readable_file, timestamp};
use io_utils::{fwriteln, open_for_read, open_for_write_new};
use pretty_trace::PrettyTrace;
use std::collections::HashMap;
use std::env;
use std::io::{BufRead, Write};
use string_utils::TextUtils;

#[derive(Default, Debug)]
struct Counter {
    unique: u64,
    reads: u64,
}

fn count_sample(file: &str) -> Result<(HashMap<(usize, usize, u8), Counter>, Counter), String> {
    require_readable_file(file, "SAMPLES")?;
    let f = open_for_read![&file];
    let mut table = HashMap::<(usize, usize, u8), Counter>::new();
    let mut totals = Counter::default();
    for (i, line) in f.lines().enumerate() {
        let s = line.map_err(|e| format!("\nError reading the file\n{}\n: {}.\n", file, e))?;
        if i == 0 {
            continue; // header
        }
        let fields = s.split('\t').collect::<Vec<&str>>();
        if fields.len() <= CDR3AA_COL {
            return Err(format!(
                "\nThe file\n{}\nis malformed at line {}: found {} tab-separated fields but \
                 at least {} are needed.\n",
                file,
                i + 1,
                fields.len(),
                CDR3AA_COL + 1
            ));
        }
        let reads = fields[READS_COL].parse::<u64>().map_err(|_| {
            format!(
                "\nThe file\n{}\nis malformed at line {}: the read count field \"{}\" is not \
                 a nonnegative integer.\n",
                file,
                i + 1,
                fields[READS_COL]
            )
        })?;
        let cdr3 = fields[CDR3AA_COL].as_bytes();
        for (j, aa) in cdr3.iter().enumerate() {
            let c = table.entry((cdr3.len(), j, *aa)).or_default();
            c.unique += 1;
            c.reads += reads;
        }
        totals.unique += 1;
        totals.reads += reads;
    }
    Ok((table, totals))
}

fn run(args: &[String]) -> Result<(), String> {
    let mut sample_files = Vec::<String>::new();
    let mut out_file = String::new();
    for arg in args.iter().skip(1) {
        if arg.starts_with("SAMPLES=") {
            sample_files = arg
                .after("SAMPLES=")
                .split(',')
                .map(str::to_string)
                .collect();
        } else if arg.starts_with("OUT=") {
            out_file = arg.after("OUT=").to_string();
        } else {
            return Err(format!(
                "\nYour command line includes \"{}\", which is not a valid argument.\n",
                arg
            ));
        }
    }
    if sample_files.is_empty() || sample_files.iter().any(String::is_empty) || out_file.is_empty()
    {
        return Err(
            "\nUsage: build_factors SAMPLES=file1,...,fileN OUT=file\n".to_string(),
        );
    }
    let mut out = open_for_write_new![&out_file];
    fwriteln!(
        out,
        "sample\tlen\tpos\taa\tunique\treads\tunique.total\treads.total"
    );
    for (i, sf) in sample_files.iter().enumerate() {
        let (table, totals) = count_sample(sf)?;
        let mut signatures = table.keys().cloned().collect::<Vec<(usize, usize, u8)>>();
        signatures.sort_unstable();
        for sig in signatures {
            let c = &table[&sig];
            fwriteln!(
                out,
                "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
                i,
                sig.0,
                sig.1,
                sig.2 as char,
                c.unique,
                c.reads,
                totals.unique,
                totals.reads
            );
        }
        if i % 10 == 0 {
            println!(
                "[{}] Scanned {} of {} samples.",
                timestamp(),
                i,
                sample_files.len()
            );
        }
    }
    out.flush()
        .map_err(|e| format!("\nError writing the file\n{}\n: {}.\n", out_file, e))?;
    Ok(())
}

fn main() {
    PrettyTrace::new().on();
    let args = env::args().collect::<Vec<String>>();
    if let Err(err) = run(&args) {
        eprintln!("{}", err);
        std::process::exit(1);
    }
}
