//! Firewall control
//!
//! The reconciler only needs four operations from the firewall: list the
//! rules as text, create a chain, insert a jump rule and append a DROP rule.
//! `IptablesController` performs them with the iptables binary,
//! `InMemoryFirewall` simulates them for tests.

pub mod iptables;
pub mod listing;
pub mod memory;

pub use iptables::IptablesController;
pub use listing::RuleListing;
pub use memory::InMemoryFirewall;

use std::net::Ipv4Addr;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while talking to the firewall
#[derive(Error, Debug)]
pub enum FirewallError {
    #[error("Firewall control unavailable ({binary:?}): {source}")]
    Unavailable {
        binary: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` failed with {status}: {stderr}")]
    Command {
        command: String,
        status: String,
        stderr: String,
    },
}

/// Capability to inspect and extend the live rule set
pub trait FirewallController {
    /// List rules with numeric addresses, for one chain or for the whole table
    fn list_rules(&self, chain: Option<&str>) -> Result<String, FirewallError>;

    /// Create an empty user-defined chain
    fn create_chain(&self, chain: &str) -> Result<(), FirewallError>;

    /// Insert a rule at the head of `entry_chain` jumping to `target` for
    /// `protocol` traffic to any of `ports`
    fn insert_jump(
        &self,
        entry_chain: &str,
        protocol: &str,
        ports: &[u16],
        target: &str,
    ) -> Result<(), FirewallError>;

    /// Append a rule dropping all traffic from `ip` to `chain`
    fn append_drop(&self, chain: &str, ip: &Ipv4Addr) -> Result<(), FirewallError>;
}

/// Render a port list the way multiport expects it
pub fn join_ports(ports: &[u16]) -> String {
    ports
        .iter()
        .map(u16::to_string)
        .collect::<Vec<_>>()
        .join(",")
}
