// Copyright (c) 2022 10X Genomics, Inc. All rights reserved.

pub mod bitset;
pub mod defs;
pub mod hyper;
pub mod volcano;

use chrono::Local;
use io_utils::path_exists;
use std::fs::File;

// Verify that a file exists and can be opened for reading.  The context string says which
// command-line argument named the file.

pub fn require_readable_file(f: &str, context: &str) -> Result<(), String> {
    if !path_exists(f) {
        return Err(format!(
            "\nThe file\n{}\nspecified by {} does not exist.\n",
            f, context
        ));
    }
    if File::open(f).is_err() {
        return Err(format!(
            "\nThe file\n{}\nspecified by {} exists but could not be opened for reading.\n",
            f, context
        ));
    }
    Ok(())
}

// Timestamp used in progress messages.

pub fn timestamp() -> String {
    Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}
