pub mod app;
pub mod cli;
pub mod config;
pub mod exit;
pub mod firewall;
pub mod input;
pub mod models;
pub mod output;
pub mod persistence;
pub mod reconciler;

mod process;

// Re-export commonly used types
pub use config::Config;
pub use firewall::{FirewallController, InMemoryFirewall, IptablesController, RuleListing};
pub use input::{LogAggregator, NativeAggregator, ScriptAggregator};
pub use models::{BanRecord, ChainStatus, LedgerEntry, RunSummary};
pub use persistence::{LedgerStore, SqliteLedger};
pub use reconciler::{filter, ReconcileError, Reconciler};
