//! Exit codes for the ban-them CLI.

use crate::app::AppError;
use crate::reconciler::ReconcileError;

/// Exit code constants.
pub mod codes {
    /// Successful execution, or help requested.
    pub const SUCCESS: i32 = 0;
    /// Invalid `-s`/`-n` value, or unreadable log.
    pub const INVALID_ARGS: i32 = 1;
    /// Malformed command line.
    pub const USAGE: i32 = 2;
    /// Ledger could not be opened or written.
    pub const LEDGER_ERROR: i32 = 3;
    /// Firewall control failed.
    pub const FIREWALL_ERROR: i32 = 4;
    /// Configuration file could not be read or parsed.
    pub const CONFIG_ERROR: i32 = 5;
    /// Run summary could not be written.
    pub const OUTPUT_ERROR: i32 = 6;
}

/// Map an AppError to an exit code.
pub fn exit_code(error: &AppError) -> i32 {
    match error {
        AppError::Cli(_) => codes::INVALID_ARGS,
        AppError::Config(_) => codes::CONFIG_ERROR,
        AppError::Reconcile(ReconcileError::Source(_)) => codes::INVALID_ARGS,
        AppError::Reconcile(ReconcileError::Ledger(_)) => codes::LEDGER_ERROR,
        AppError::Reconcile(ReconcileError::Firewall(_)) => codes::FIREWALL_ERROR,
        AppError::Output(_) => codes::OUTPUT_ERROR,
    }
}
