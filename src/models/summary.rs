use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::path::PathBuf;

use super::BanRecord;

/// State of the dedicated chain after `ensure_chain`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainStatus {
    /// Chain and jump rule were already in place
    Present,
    /// Chain was created and spliced into the entry chain
    Created,
    /// Chain existed but its jump rule was missing and has been re-inserted
    JumpRestored,
}

/// Outcome of one reconciliation pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub source: PathBuf,
    pub threshold: i64,
    /// Records above the threshold
    pub candidates: usize,
    /// Records newly written to the ledger
    pub admitted: Vec<BanRecord>,
    pub chain: ChainStatus,
    /// IPs a DROP rule was appended for
    pub banned: Vec<Ipv4Addr>,
}
