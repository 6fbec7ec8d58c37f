//! CLI Exit Code Registry
//!
//! Single source of truth for `apfleet` exit codes. Scripts and schedulers
//! branch on these, so existing values never change meaning.
//!
//! # Exit Codes
//!
//! | Code | Meaning                                                   |
//! |------|-----------------------------------------------------------|
//! | 0    | Success (every device exported)                           |
//! | 1    | General error (unspecified)                               |
//! | 2    | Usage error (bad args, missing hosts file, no credentials) |
//! | 3    | Partial: at least one device failed, at least one worked  |
//! | 4    | Every device failed                                       |
//! | 5    | I/O error outside the per-device loop                     |
//! | 6    | Field catalogue missing, malformed or invalid             |
//!
//! Per-device failures never surface as 1/5; they are folded into 3 or 4
//! and detailed in the run summary.

use apfleet_cli::orchestrator::RunReport;

pub const EXIT_SUCCESS: u8 = 0;

/// Avoid; prefer a specific code.
pub const EXIT_ERROR: u8 = 1;

pub const EXIT_USAGE: u8 = 2;

pub const EXIT_PARTIAL: u8 = 3;

pub const EXIT_ALL_FAILED: u8 = 4;

pub const EXIT_IO: u8 = 5;

pub const EXIT_CATALOGUE: u8 = 6;

/// Exit code for a finished run.
pub fn run_exit_code(report: &RunReport) -> u8 {
    if report.all_failed() {
        EXIT_ALL_FAILED
    } else if report.failed > 0 {
        EXIT_PARTIAL
    } else {
        EXIT_SUCCESS
    }
}
