use super::{join_ports, FirewallController, FirewallError};
use crate::process;
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::process::Command;

/// Drives the firewall through the iptables binary
pub struct IptablesController {
    binary: PathBuf,
}

impl IptablesController {
    pub fn new(binary: PathBuf) -> Self {
        IptablesController { binary }
    }

    /// Run iptables with `args`, returning its stdout
    fn run(&self, args: &[&str]) -> Result<String, FirewallError> {
        log::debug!("Running {} {}", self.binary.display(), args.join(" "));

        let output = process::output(Command::new(&self.binary).args(args)).map_err(|source| {
            FirewallError::Unavailable {
                binary: self.binary.clone(),
                source,
            }
        })?;

        if !output.status.success() {
            return Err(FirewallError::Command {
                command: format!("{} {}", self.binary.display(), args.join(" ")),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl FirewallController for IptablesController {
    fn list_rules(&self, chain: Option<&str>) -> Result<String, FirewallError> {
        match chain {
            Some(chain) => self.run(&["-L", chain, "-n"]),
            None => self.run(&["-L", "-n"]),
        }
    }

    fn create_chain(&self, chain: &str) -> Result<(), FirewallError> {
        self.run(&["-N", chain]).map(|_| ())
    }

    fn insert_jump(
        &self,
        entry_chain: &str,
        protocol: &str,
        ports: &[u16],
        target: &str,
    ) -> Result<(), FirewallError> {
        let ports = join_ports(ports);
        self.run(&[
            "-I",
            entry_chain,
            "-p",
            protocol,
            "-m",
            "multiport",
            "--dports",
            &ports,
            "-j",
            target,
        ])
        .map(|_| ())
    }

    fn append_drop(&self, chain: &str, ip: &Ipv4Addr) -> Result<(), FirewallError> {
        let ip = ip.to_string();
        self.run(&["-A", chain, "-s", &ip, "-j", "DROP"]).map(|_| ())
    }
}
