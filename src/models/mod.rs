pub mod ban_record;
pub mod summary;

pub use ban_record::{BanRecord, LedgerEntry};
pub use summary::{ChainStatus, RunSummary};
