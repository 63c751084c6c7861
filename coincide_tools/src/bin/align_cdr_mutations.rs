// Copyright (c) 2022 10X Genomics, Inc. All rights reserved.
//
// Tabulate mutations between near-identical CDR3 sequences annotated with antigen
// specificities.
//
// align_cdr_mutations SUBST=n INDELS=n IN=file OUT=file
//
// Input rows: cdr3 <tab> vEnd <tab> jStart <tab> gene <tab> antigen <tab> set, no header.
// Rows sharing a CDR3 pool their antigens.  For every CDR3 with an informative antigen set,
// every same-gene near neighbor within the substitution and indel limits is aligned
// globally, and each alignment contributes one row per substitution, insertion and deletion
// plus one row per exactly matching position, classified as V, N or J territory by the
// vEnd/jStart annotation of the query.

use bio::alignment::pairwise::Aligner;
use bio::alignment::AlignmentOperation;
use coincide_core::{require_readable_file, timestamp};
use crossbeam_channel::unbounded;
use io_utils::{fwriteln, open_for_read, open_for_write_new};
use pretty_trace::PrettyTrace;
use rayon::prelude::*;
use std::collections::HashMap;
use std::env;
use std::io::{BufRead, Write};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use string_utils::TextUtils;
use triple_accel::levenshtein::levenshtein_simd_k;
use vector_utils::unique_sort;

const NA_ANTIGEN: &str = ".";

const HEADER: &str = "unknown.ag\tsame.ag\tcdr3.len\tweight\talign.id\talign.sub.id\t\
     subst\tins\tdel\tmut.type\tmut.pos\tmut.from\tmut.to\tmut.region\tgene\tset";

struct CdrInfo {
    cdr3: Vec<u8>,
    v_end: usize,
    j_start: usize,
    gene: String,
    set: String,
    antigens: Vec<String>, // unique-sorted
}

impl CdrInfo {
    fn unknown_antigen(&self) -> bool {
        self.antigens.len() == 1 && self.antigens[0] == NA_ANTIGEN
    }

    fn antigens_overlap(&self, other: &CdrInfo) -> bool {
        self.antigens
            .iter()
            .any(|a| a != NA_ANTIGEN && other.antigens.binary_search(a).is_ok())
    }

    // A candidate is compared against this query if it is an antigen-unknown sequence other
    // than the query itself, or lexicographically smaller than the query; the second arm
    // deduplicates known-known comparisons.

    fn eligible(&self, other: &CdrInfo) -> bool {
        self.gene == other.gene
            && ((other.unknown_antigen() && self.cdr3 != other.cdr3) || other.cdr3 < self.cdr3)
    }

    fn region(&self, pos: usize) -> &'static str {
        if pos < self.v_end {
            "V"
        } else if pos > self.j_start {
            "J"
        } else {
            "N"
        }
    }
}

fn load_cdr3_table(file: &str) -> Result<Vec<CdrInfo>, String> {
    require_readable_file(file, "IN")?;
    let f = open_for_read![&file];
    let mut map = HashMap::<String, CdrInfo>::new();
    for (i, line) in f.lines().enumerate() {
        let s = line.map_err(|e| format!("\nError reading the file\n{}\n: {}.\n", file, e))?;
        let fields = s.split('\t').collect::<Vec<&str>>();
        if fields.len() < 6 {
            return Err(format!(
                "\nThe file\n{}\nis malformed at line {}: found {} tab-separated fields but \
                 6 are needed.\n",
                file,
                i + 1,
                fields.len()
            ));
        }
        let parse_pos = |j: usize| -> Result<usize, String> {
            fields[j].parse::<usize>().map_err(|_| {
                format!(
                    "\nThe file\n{}\nis malformed at line {}: the field \"{}\" is not a \
                     nonnegative integer.\n",
                    file,
                    i + 1,
                    fields[j]
                )
            })
        };
        let v_end = parse_pos(1)?;
        let j_start = parse_pos(2)?;
        let info = map.entry(fields[0].to_string()).or_insert_with(|| CdrInfo {
            cdr3: fields[0].as_bytes().to_vec(),
            v_end,
            j_start,
            gene: fields[3].to_string(),
            set: fields[5].to_string(),
            antigens: Vec::new(),
        });
        info.antigens.push(fields[4].to_string());
    }
    let mut infos = map.into_iter().map(|x| x.1).collect::<Vec<CdrInfo>>();
    for info in infos.iter_mut() {
        unique_sort(&mut info.antigens);
    }
    infos.sort_by(|a, b| a.cdr3.cmp(&b.cdr3));
    Ok(infos)
}

// Align one eligible pair and send its rows.  Returns the number of mutation rows sent, or
// None if the alignment exceeds the substitution or indel limits.

fn emit_alignment(
    query: &CdrInfo,
    cand: &CdrInfo,
    max_subst: usize,
    max_indels: usize,
    align_id: usize,
    send: &crossbeam_channel::Sender<String>,
) -> Option<u64> {
    let score = |a: u8, b: u8| if a == b { 1i32 } else { -1i32 };
    let mut aligner =
        Aligner::with_capacity(query.cdr3.len(), cand.cdr3.len(), -2, -1, &score);
    let aln = aligner.global(&query.cdr3, &cand.cdr3);

    // Classify operations relative to the query: a residue present only in the candidate is
    // an insertion, one present only in the query is a deletion.

    let (mut subst, mut ins, mut del) = (0usize, 0usize, 0usize);
    for op in &aln.operations {
        match op {
            AlignmentOperation::Subst => subst += 1,
            AlignmentOperation::Del => ins += 1,
            AlignmentOperation::Ins => del += 1,
            _ => {}
        }
    }
    if subst > max_subst || ins > max_indels || del > max_indels {
        return None;
    }
    let unknown_ag = if cand.unknown_antigen() { "TRUE" } else { "FALSE" };
    let same_ag = if query.antigens_overlap(cand) {
        "TRUE"
    } else {
        "FALSE"
    };
    let prefix = format!(
        "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
        unknown_ag,
        same_ag,
        query.cdr3.len(),
        1.0,
        align_id,
        0,
        subst,
        ins,
        del
    );
    let mut mutation_rows = 0u64;
    let (mut xi, mut yi) = (0usize, 0usize);
    for op in &aln.operations {
        match op {
            AlignmentOperation::Match => {
                send.send(format!(
                    "{}\tE\t{}\t{}\t{}\t{}\t{}\t{}",
                    prefix,
                    xi,
                    query.cdr3[xi] as char,
                    query.cdr3[xi] as char,
                    query.region(xi),
                    query.gene,
                    query.set
                ))
                .unwrap();
                xi += 1;
                yi += 1;
            }
            AlignmentOperation::Subst => {
                send.send(format!(
                    "{}\tS\t{}\t{}\t{}\t{}\t{}\t{}",
                    prefix,
                    xi,
                    query.cdr3[xi] as char,
                    cand.cdr3[yi] as char,
                    query.region(xi),
                    query.gene,
                    query.set
                ))
                .unwrap();
                mutation_rows += 1;
                xi += 1;
                yi += 1;
            }
            AlignmentOperation::Del => {
                send.send(format!(
                    "{}\tI\t{}\t-\t{}\t{}\t{}\t{}",
                    prefix,
                    xi,
                    cand.cdr3[yi] as char,
                    query.region(xi),
                    query.gene,
                    query.set
                ))
                .unwrap();
                mutation_rows += 1;
                yi += 1;
            }
            AlignmentOperation::Ins => {
                send.send(format!(
                    "{}\tD\t{}\t{}\t-\t{}\t{}\t{}",
                    prefix,
                    xi,
                    query.cdr3[xi] as char,
                    query.region(xi),
                    query.gene,
                    query.set
                ))
                .unwrap();
                mutation_rows += 1;
                xi += 1;
            }
            _ => {}
        }
    }
    Some(mutation_rows)
}

fn run(args: &[String]) -> Result<(), String> {
    let mut max_subst = None::<usize>;
    let mut max_indels = None::<usize>;
    let mut in_file = String::new();
    let mut out_file = String::new();
    for arg in args.iter().skip(1) {
        if arg.starts_with("SUBST=") {
            max_subst = Some(arg.after("SUBST=").parse::<usize>().map_err(|_| {
                format!("\nThe value of SUBST in \"{}\" must be a nonnegative integer.\n", arg)
            })?);
        } else if arg.starts_with("INDELS=") {
            max_indels = Some(arg.after("INDELS=").parse::<usize>().map_err(|_| {
                format!("\nThe value of INDELS in \"{}\" must be a nonnegative integer.\n", arg)
            })?);
        } else if arg.starts_with("IN=") {
            in_file = arg.after("IN=").to_string();
        } else if arg.starts_with("OUT=") {
            out_file = arg.after("OUT=").to_string();
        } else {
            return Err(format!(
                "\nYour command line includes \"{}\", which is not a valid argument.\n",
                arg
            ));
        }
    }
    let (max_subst, max_indels) = match (max_subst, max_indels) {
        (Some(s), Some(i)) if !in_file.is_empty() && !out_file.is_empty() => (s, i),
        _ => {
            return Err(
                "\nUsage: align_cdr_mutations SUBST=n INDELS=n IN=file OUT=file\n".to_string(),
            )
        }
    };

    let infos = load_cdr3_table(&in_file)?;
    println!("[{}] Loaded {} cdr3 sequences.", timestamp(), infos.len());

    let mut by_gene = HashMap::<&str, Vec<usize>>::new();
    for (i, info) in infos.iter().enumerate() {
        by_gene.entry(info.gene.as_str()).or_default().push(i);
    }
    let max_edit = (max_subst + 2 * max_indels) as u32;

    let mut out = open_for_write_new![&out_file];
    fwriteln!(out, "{}", HEADER);
    let (send, recv) = unbounded::<String>();
    let queried = AtomicUsize::new(0);
    let mutations = AtomicU64::new(0);
    let align_ids = AtomicUsize::new(0);
    crossbeam_utils::thread::scope(|sc| {
        let writer = sc.spawn(move |_| {
            let mut out = out;
            for row in recv.iter() {
                fwriteln!(out, "{}", row);
            }
            out.flush().unwrap();
        });
        infos.par_iter().for_each(|query| {
            if query.unknown_antigen() {
                return;
            }
            for &ci in &by_gene[query.gene.as_str()] {
                let cand = &infos[ci];
                if !query.eligible(cand) {
                    continue;
                }
                if levenshtein_simd_k(&query.cdr3, &cand.cdr3, max_edit).is_none() {
                    continue;
                }
                let align_id = align_ids.fetch_add(1, Ordering::Relaxed) + 1;
                if let Some(n) =
                    emit_alignment(query, cand, max_subst, max_indels, align_id, &send)
                {
                    mutations.fetch_add(n, Ordering::Relaxed);
                }
            }
            let count = queried.fetch_add(1, Ordering::Relaxed) + 1;
            if count % 100 == 0 {
                println!(
                    "[{}] Queried {} of {} cdr3 sequences.  Recorded ~{} mutations so far.",
                    timestamp(),
                    count,
                    infos.len(),
                    mutations.load(Ordering::Relaxed)
                );
            }
        });
        drop(send);
        writer.join().unwrap();
    })
    .unwrap();

    println!(
        "[{}] Done.  Queried {} cdr3 sequences, recorded {} mutations.",
        timestamp(),
        infos.len(),
        mutations.load(Ordering::Relaxed)
    );
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
