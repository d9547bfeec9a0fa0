//! In-memory firewall (useful for testing)

use super::{join_ports, FirewallController, FirewallError};
use std::cell::RefCell;
use std::net::Ipv4Addr;

/// A mutating call received by the in-memory firewall
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FirewallCall {
    CreateChain(String),
    InsertJump {
        entry_chain: String,
        protocol: String,
        ports: Vec<u16>,
        target: String,
    },
    AppendDrop {
        chain: String,
        ip: Ipv4Addr,
    },
}

#[derive(Debug, Clone)]
struct Rule {
    target: String,
    protocol: String,
    source: Option<Ipv4Addr>,
    options: String,
}

#[derive(Debug, Clone)]
struct Chain {
    name: String,
    builtin: bool,
    rules: Vec<Rule>,
}

/// Firewall kept in memory, listing itself in `iptables -L -n` layout
pub struct InMemoryFirewall {
    chains: RefCell<Vec<Chain>>,
    calls: RefCell<Vec<FirewallCall>>,
    unavailable: bool,
}

impl InMemoryFirewall {
    /// Firewall with the empty INPUT, FORWARD and OUTPUT chains
    pub fn new() -> Self {
        let builtin = |name: &str| Chain {
            name: name.to_string(),
            builtin: true,
            rules: Vec::new(),
        };
        InMemoryFirewall {
            chains: RefCell::new(vec![builtin("INPUT"), builtin("FORWARD"), builtin("OUTPUT")]),
            calls: RefCell::new(Vec::new()),
            unavailable: false,
        }
    }

    /// Firewall whose every operation fails as if the control binary were missing
    pub fn unavailable() -> Self {
        InMemoryFirewall {
            unavailable: true,
            ..Self::new()
        }
    }

    /// Add a chain without recording a call
    pub fn seed_chain(&self, chain: &str) {
        let mut chains = self.chains.borrow_mut();
        if !chains.iter().any(|c| c.name == chain) {
            chains.push(Chain {
                name: chain.to_string(),
                builtin: false,
                rules: Vec::new(),
            });
        }
    }

    /// Add a DROP rule for `ip` to `chain` without recording a call
    pub fn seed_drop(&self, chain: &str, ip: Ipv4Addr) {
        self.seed_chain(chain);
        if let Some(c) = self.chains.borrow_mut().iter_mut().find(|c| c.name == chain) {
            c.rules.push(Self::drop_rule(ip));
        }
    }

    /// Every mutating call received so far
    pub fn calls(&self) -> Vec<FirewallCall> {
        self.calls.borrow().clone()
    }

    /// IPs appended as DROP rules, in call order
    pub fn appended_drops(&self) -> Vec<Ipv4Addr> {
        self.calls
            .borrow()
            .iter()
            .filter_map(|call| match call {
                FirewallCall::AppendDrop { ip, .. } => Some(*ip),
                _ => None,
            })
            .collect()
    }

    fn drop_rule(ip: Ipv4Addr) -> Rule {
        Rule {
            target: "DROP".to_string(),
            protocol: "all".to_string(),
            source: Some(ip),
            options: String::new(),
        }
    }

    fn check_available(&self) -> Result<(), FirewallError> {
        if self.unavailable {
            return Err(FirewallError::Unavailable {
                binary: "iptables".into(),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            });
        }
        Ok(())
    }

    fn no_such_chain(command: String) -> FirewallError {
        FirewallError::Command {
            command,
            status: "exit status: 1".to_string(),
            stderr: "iptables: No chain/target/match by that name.".to_string(),
        }
    }

    fn render_chain(chain: &Chain, references: usize, out: &mut String) {
        if chain.builtin {
            out.push_str(&format!("Chain {} (policy ACCEPT)\n", chain.name));
        } else {
            out.push_str(&format!("Chain {} ({} references)\n", chain.name, references));
        }
        out.push_str(&format!(
            "{:<10} {:<4} {:<3} {:<20} {:<20}\n",
            "target", "prot", "opt", "source", "destination"
        ));
        for rule in &chain.rules {
            let source = rule
                .source
                .map(|ip| ip.to_string())
                .unwrap_or_else(|| "0.0.0.0/0".to_string());
            let row = format!(
                "{:<10} {:<4} {:<3} {:<20} {:<20} {}",
                rule.target, rule.protocol, "--", source, "0.0.0.0/0", rule.options
            );
            out.push_str(row.trim_end());
            out.push('\n');
        }
    }
}

impl Default for InMemoryFirewall {
    fn default() -> Self {
        Self::new()
    }
}

impl FirewallController for InMemoryFirewall {
    fn list_rules(&self, chain: Option<&str>) -> Result<String, FirewallError> {
        self.check_available()?;
        let chains = self.chains.borrow();
        let references = |name: &str| {
            chains
                .iter()
                .flat_map(|c| c.rules.iter())
                .filter(|r| r.target == name)
                .count()
        };

        let mut out = String::new();
        match chain {
            Some(name) => {
                let found = chains
                    .iter()
                    .find(|c| c.name == name)
                    .ok_or_else(|| Self::no_such_chain(format!("iptables -L {} -n", name)))?;
                Self::render_chain(found, references(name), &mut out);
            }
            None => {
                for (i, c) in chains.iter().enumerate() {
                    if i > 0 {
                        out.push('\n');
                    }
                    Self::render_chain(c, references(&c.name), &mut out);
                }
            }
        }
        Ok(out)
    }

    fn create_chain(&self, chain: &str) -> Result<(), FirewallError> {
        self.check_available()?;
        self.calls
            .borrow_mut()
            .push(FirewallCall::CreateChain(chain.to_string()));

        let mut chains = self.chains.borrow_mut();
        if chains.iter().any(|c| c.name == chain) {
            return Err(FirewallError::Command {
                command: format!("iptables -N {}", chain),
                status: "exit status: 1".to_string(),
                stderr: "iptables: Chain already exists.".to_string(),
            });
        }
        chains.push(Chain {
            name: chain.to_string(),
            builtin: false,
            rules: Vec::new(),
        });
        Ok(())
    }

    fn insert_jump(
        &self,
        entry_chain: &str,
        protocol: &str,
        ports: &[u16],
        target: &str,
    ) -> Result<(), FirewallError> {
        self.check_available()?;
        self.calls.borrow_mut().push(FirewallCall::InsertJump {
            entry_chain: entry_chain.to_string(),
            protocol: protocol.to_string(),
            ports: ports.to_vec(),
            target: target.to_string(),
        });

        let mut chains = self.chains.borrow_mut();
        if !chains.iter().any(|c| c.name == target) {
            return Err(Self::no_such_chain(format!("iptables -I {} -j {}", entry_chain, target)));
        }
        let entry = chains
            .iter_mut()
            .find(|c| c.name == entry_chain)
            .ok_or_else(|| Self::no_such_chain(format!("iptables -I {}", entry_chain)))?;
        entry.rules.insert(
            0,
            Rule {
                target: target.to_string(),
                protocol: protocol.to_string(),
                source: None,
                options: format!("multiport dports {}", join_ports(ports)),
            },
        );
        Ok(())
    }

    fn append_drop(&self, chain: &str, ip: &Ipv4Addr) -> Result<(), FirewallError> {
        self.check_available()?;
        self.calls.borrow_mut().push(FirewallCall::AppendDrop {
            chain: chain.to_string(),
            ip: *ip,
        });

        let mut chains = self.chains.borrow_mut();
        let target = chains
            .iter_mut()
            .find(|c| c.name == chain)
            .ok_or_else(|| Self::no_such_chain(format!("iptables -A {}", chain)))?;
        target.rules.push(Self::drop_rule(*ip));
        Ok(())
    }
}
