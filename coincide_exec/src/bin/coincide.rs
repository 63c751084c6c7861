// Copyright (c) 2022 10X Genomics, Inc. All rights reserved.
//
// Find statistically coincident pairs of public clonotypes across a sample cohort.
// Run with no arguments for usage.

use coincide_main::main_coincide::main_coincide;
use pretty_trace::PrettyTrace;
use std::env;

fn main() {
    PrettyTrace::new().on();
    let args = env::args().collect::<Vec<String>>();
    if let Err(err) = main_coincide(&args) {
        eprintln!("{}", err);
        std::process::exit(1);
    }
}
