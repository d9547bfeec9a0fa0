use super::{open_source, LogAggregator, SourceError};
use crate::models::BanRecord;
use regex::Regex;
use std::collections::HashMap;
use std::io::{BufRead, BufReader};
use std::net::Ipv4Addr;
use std::path::Path;

/// Jail reported when a ban line carries no bracketed jail name
const UNKNOWN_JAIL: &str = "unknown";

/// Aggregates the log in-process, without the helper script
///
/// Recognises both fail2ban line layouts:
/// `... fail2ban.actions: WARNING [sshd] Ban 1.2.3.4` and
/// `... fail2ban.actions [812]: NOTICE  [sshd] Ban 1.2.3.4`, as well as
/// `Restore Ban` lines written when fail2ban restarts.
pub struct NativeAggregator {
    pattern: Regex,
}

impl NativeAggregator {
    pub fn new() -> Result<Self, regex::Error> {
        let pattern = Regex::new(r"(?:\[(?P<jail>[^\]\s]+)\]\s+)?(?:Restore\s+)?\bBan\s+(?P<ip>\S+)")?;
        Ok(NativeAggregator { pattern })
    }

    /// Extract `(jail, ip)` from one raw log line
    fn parse_ban_line(&self, line: &str) -> Option<(String, Ipv4Addr)> {
        let caps = self.pattern.captures(line)?;
        let ip = caps.name("ip")?.as_str().parse::<Ipv4Addr>().ok()?;
        let jail = caps
            .name("jail")
            .map(|m| m.as_str())
            .unwrap_or(UNKNOWN_JAIL);
        Some((jail.to_string(), ip))
    }
}

impl LogAggregator for NativeAggregator {
    fn aggregate(&self, source: &Path) -> Result<Vec<BanRecord>, SourceError> {
        let mut reader = BufReader::new(open_source(source)?);
        let mut counts: HashMap<(String, Ipv4Addr), i64> = HashMap::new();
        let mut buffer = Vec::new();

        // Lines may carry raw bytes from client input, so decode lossily
        loop {
            buffer.clear();
            let read = reader
                .read_until(b'\n', &mut buffer)
                .map_err(|source_err| SourceError::Unavailable {
                    path: source.to_path_buf(),
                    source: source_err,
                })?;
            if read == 0 {
                break;
            }

            let line = String::from_utf8_lossy(&buffer);
            if let Some(key) = self.parse_ban_line(line.trim_end()) {
                *counts.entry(key).or_insert(0) += 1;
            }
        }

        let mut records: Vec<BanRecord> = counts
            .into_iter()
            .map(|((jail, ip), count)| BanRecord::new(ip, jail, count))
            .collect();
        BanRecord::sort_by_rank(&mut records);

        log::debug!("Aggregated {} (jail, ip) pairs from {:?}", records.len(), source);
        Ok(records)
    }
}
