// Copyright (c) 2022 10X Genomics, Inc. All rights reserved.
//
// Process command-line arguments for coincide.

use coincide_core::defs::CoincideOpt;
use coincide_core::require_readable_file;
use io_utils::path_exists;
use itertools::Itertools;
use std::fs::{remove_file, File};
use string_utils::TextUtils;

const USAGE: &str = "\nUsage: coincide RATIO=f PVAL=f LOG_ODDS=f PUBLIC=file \
     SAMPLES=file1,...,fileN OUT=prefix\n\n\
     RATIO     incidence-ratio threshold: keep a clonotype iff its incidence exceeds\n\
     \x20         RATIO times the number of samples; must lie in (0, 1]\n\
     PVAL      p-value threshold for reporting a pair\n\
     LOG_ODDS  |log10 odds| threshold for reporting a pair\n\
     PUBLIC    candidate public clonotype table\n\
     SAMPLES   comma-separated per-sample clonotype tables; defines the cohort order\n\
     OUT       output path prefix; writes OUT.incidence.hist.txt, OUT.txt and\n\
     \x20         OUT.volcano.txt\n";

fn parse_f64_arg(arg: &str, x: &str) -> Result<f64, String> {
    arg.after(&format!("{}=", x)).parse::<f64>().map_err(|_| {
        format!(
            "\nYour command line includes \"{}\", but the value of {} must be a floating \
             point number.\n",
            arg, x
        )
    })
}

// Verify that an output file can be created, then remove the probe.

pub fn test_writeable(val: &str) -> Result<(), String> {
    if File::create(val).is_err() {
        let mut msg = format!(
            "\nYou've specified an output path prefix\n{}\nthat cannot be written.\n",
            val
        );
        if val.contains('/') {
            let dir = val.rev_before("/");
            if path_exists(dir) {
                msg += &format!("Note that the path {} exists.\n", dir);
            } else {
                msg += &format!("Note that the path {} does not exist.\n", dir);
            }
        }
        return Err(msg);
    }
    remove_file(val).map_err(|_| format!("\nCould not remove the probe file {}.\n", val))?;
    Ok(())
}

pub fn proc_args(args: &[String]) -> Result<CoincideOpt, String> {
    if args.len() == 1 {
        return Err(USAGE.to_string());
    }
    let mut opt = CoincideOpt::default();
    let (mut have_ratio, mut have_pval, mut have_log_odds) = (false, false, false);
    for arg in args.iter().skip(1) {
        if arg.starts_with("RATIO=") {
            opt.incidence_ratio_threshold = parse_f64_arg(arg, "RATIO")?;
            have_ratio = true;
        } else if arg.starts_with("PVAL=") {
            opt.p_value_threshold = parse_f64_arg(arg, "PVAL")?;
            have_pval = true;
        } else if arg.starts_with("LOG_ODDS=") {
            opt.log_odds_threshold = parse_f64_arg(arg, "LOG_ODDS")?;
            have_log_odds = true;
        } else if arg.starts_with("PUBLIC=") {
            opt.public_list_file = arg.after("PUBLIC=").to_string();
        } else if arg.starts_with("SAMPLES=") {
            opt.sample_files = arg
                .after("SAMPLES=")
                .split(',')
                .map(str::to_string)
                .collect();
        } else if arg.starts_with("OUT=") {
            opt.out_prefix = arg.after("OUT=").to_string();
        } else {
            return Err(format!(
                "\nYour command line includes \"{}\", which is not a valid argument.\n{}",
                arg, USAGE
            ));
        }
    }
    let mut missing = Vec::<&str>::new();
    if !have_ratio {
        missing.push("RATIO");
    }
    if !have_pval {
        missing.push("PVAL");
    }
    if !have_log_odds {
        missing.push("LOG_ODDS");
    }
    if opt.public_list_file.is_empty() {
        missing.push("PUBLIC");
    }
    if opt.sample_files.is_empty() || opt.sample_files.iter().any(String::is_empty) {
        missing.push("SAMPLES");
    }
    if opt.out_prefix.is_empty() {
        missing.push("OUT");
    }
    if !missing.is_empty() {
        return Err(format!(
            "\nYour command line is missing required arguments: {}.\n{}",
            missing.iter().join(", "),
            USAGE
        ));
    }
    if opt.incidence_ratio_threshold <= 0.0 || opt.incidence_ratio_threshold > 1.0 {
        return Err(format!(
            "\nThe value RATIO={} is out of range: RATIO must lie in (0, 1].\n",
            opt.incidence_ratio_threshold
        ));
    }
    require_readable_file(&opt.public_list_file, "PUBLIC")?;
    for f in &opt.sample_files {
        require_readable_file(f, "SAMPLES")?;
    }
    test_writeable(&format!("{}.txt", opt.out_prefix))?;
    Ok(opt)
}
