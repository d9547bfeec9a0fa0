//! Reconciliation of ban counts, the ledger and the live firewall
//!
//! One pass: aggregate the log, keep the IPs banned more often than the
//! threshold, admit the unknown ones to the ledger, make sure the dedicated
//! chain exists, then append a DROP rule for every ledger entry the firewall
//! does not block yet. Every step is idempotent, so a pass interrupted
//! halfway is completed by the next one.

use crate::config::{FirewallConfig, MembershipMode};
use crate::firewall::{FirewallController, FirewallError, RuleListing};
use crate::input::{LogAggregator, SourceError};
use crate::models::{BanRecord, ChainStatus, RunSummary};
use crate::persistence::{LedgerStore, PersistenceError};
use chrono::Utc;
use std::net::Ipv4Addr;
use std::path::Path;
use thiserror::Error;

/// Errors that abort a reconciliation pass
#[derive(Error, Debug)]
pub enum ReconcileError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] PersistenceError),

    #[error("Firewall error: {0}")]
    Firewall(#[from] FirewallError),
}

/// Keep the records banned strictly more often than `threshold`
pub fn filter(records: Vec<BanRecord>, threshold: i64) -> Vec<BanRecord> {
    records
        .into_iter()
        .filter(|record| record.occurrence_count > threshold)
        .collect()
}

/// Drives one batch pass over its three collaborators
pub struct Reconciler<'a> {
    firewall_config: FirewallConfig,
    aggregator: &'a dyn LogAggregator,
    ledger: &'a dyn LedgerStore,
    firewall: &'a dyn FirewallController,
}

impl<'a> Reconciler<'a> {
    pub fn new(
        firewall_config: FirewallConfig,
        aggregator: &'a dyn LogAggregator,
        ledger: &'a dyn LedgerStore,
        firewall: &'a dyn FirewallController,
    ) -> Self {
        Reconciler {
            firewall_config,
            aggregator,
            ledger,
            firewall,
        }
    }

    /// Ranked ban counts from the log at `source`
    pub fn aggregate(&self, source: &Path) -> Result<Vec<BanRecord>, ReconcileError> {
        Ok(self.aggregator.aggregate(source)?)
    }

    /// Write unknown candidates to the ledger, returning the ones admitted
    pub fn admit_to_ledger(
        &self,
        candidates: &[BanRecord],
    ) -> Result<Vec<BanRecord>, ReconcileError> {
        let admitted = self.ledger.admit_new(candidates)?;
        for record in &admitted {
            log::info!("Added IP : {}", record.ip);
        }
        Ok(admitted)
    }

    /// Create the dedicated chain and its jump rule when they are missing
    pub fn ensure_chain(&self) -> Result<ChainStatus, ReconcileError> {
        let config = &self.firewall_config;
        let text = self.firewall.list_rules(None)?;

        let (chain_present, jump_present) = match config.membership {
            MembershipMode::Structured => {
                let listing = RuleListing::parse(&text);
                (
                    listing.has_chain(&config.chain),
                    listing.jump_count(&config.entry_chain, &config.chain) > 0,
                )
            }
            // A present chain name is taken to mean the jump rule is in place
            MembershipMode::Substring => {
                let present = text.contains(config.chain.as_str());
                (present, present)
            }
        };

        let status = match (chain_present, jump_present) {
            (true, true) => ChainStatus::Present,
            (true, false) => ChainStatus::JumpRestored,
            (false, _) => {
                self.firewall.create_chain(&config.chain)?;
                ChainStatus::Created
            }
        };

        if status != ChainStatus::Present {
            self.firewall.insert_jump(
                &config.entry_chain,
                &config.protocol,
                &config.ports,
                &config.chain,
            )?;
            log::info!(
                "Chain {} spliced into {} for {} ports {:?}",
                config.chain,
                config.entry_chain,
                config.protocol,
                config.ports
            );
        }

        Ok(status)
    }

    /// Append a DROP rule for every ledger entry not blocked yet
    ///
    /// Returns the IPs a rule was appended for.
    pub fn sync_firewall(&self) -> Result<Vec<Ipv4Addr>, ReconcileError> {
        let config = &self.firewall_config;
        let blocked = self.blocked_check()?;
        let mut banned = Vec::new();

        for entry in self.ledger.entries()? {
            if blocked(&entry.ip) || banned.contains(&entry.ip) {
                log::debug!("IP {} already banned.", entry.ip);
                continue;
            }

            self.firewall.append_drop(&config.chain, &entry.ip)?;
            log::info!("The IP {} has been banned.", entry.ip);
            banned.push(entry.ip);
        }

        Ok(banned)
    }

    /// Membership test against the current firewall state
    fn blocked_check(&self) -> Result<Box<dyn Fn(&Ipv4Addr) -> bool>, ReconcileError> {
        let config = &self.firewall_config;
        match config.membership {
            MembershipMode::Structured => {
                let text = self.firewall.list_rules(Some(&config.chain))?;
                let sources = RuleListing::parse(&text).sources(&config.chain);
                Ok(Box::new(move |ip: &Ipv4Addr| sources.contains(ip)))
            }
            MembershipMode::Substring => {
                let text = self.firewall.list_rules(None)?;
                Ok(Box::new(move |ip: &Ipv4Addr| text.contains(&ip.to_string())))
            }
        }
    }

    /// Full pass: aggregate, filter, admit, ensure the chain, sync
    ///
    /// Source errors surface before the ledger or firewall is touched.
    pub fn run(&self, source: &Path, threshold: i64) -> Result<RunSummary, ReconcileError> {
        let started_at = Utc::now();

        let records = self.aggregate(source)?;
        let candidates = filter(records, threshold);
        log::debug!(
            "{} IP(s) banned more than {} times in {:?}",
            candidates.len(),
            threshold,
            source
        );

        let admitted = self.admit_to_ledger(&candidates)?;
        let chain = self.ensure_chain()?;
        let banned = self.sync_firewall()?;

        Ok(RunSummary {
            started_at,
            source: source.to_path_buf(),
            threshold,
            candidates: candidates.len(),
            admitted,
            chain,
            banned,
        })
    }
}
