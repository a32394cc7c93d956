pub mod bct_accuracy;
pub mod chi_square;
pub mod info;
pub mod rem;
pub mod respiration;
pub mod rrv_ttest;
pub mod stage;

use crate::exit_codes;
use crate::output;
use serde::Serialize;
use std::path::Path;
use tmr_rs::TmrError;

/// Report a failed analysis on stderr and pick its exit code.
pub(crate) fn fail(e: &TmrError) -> i32 {
    eprintln!("Error: {}", e);
    if e.is_input_error() {
        exit_codes::INPUT_ERROR
    } else {
        exit_codes::EXECUTION_ERROR
    }
}

/// Print a summary as pretty JSON on stdout, or write it to `path`.
pub(crate) fn print_json<T: Serialize>(summary: &T, path: Option<&Path>) -> i32 {
    match output::to_json(summary).and_then(|json| output::write_output(&json, path)) {
        Ok(()) => exit_codes::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            exit_codes::EXECUTION_ERROR
        }
    }
}
