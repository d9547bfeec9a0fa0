use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;

/// Number of temporary bans seen for one IP within one jail
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BanRecord {
    pub ip: Ipv4Addr,
    /// Jail name, without the surrounding brackets
    pub attack_type: String,
    pub occurrence_count: i64,
}

impl BanRecord {
    pub fn new(ip: Ipv4Addr, attack_type: impl Into<String>, occurrence_count: i64) -> Self {
        BanRecord {
            ip,
            attack_type: attack_type.into(),
            occurrence_count,
        }
    }

    /// Parse one line of aggregated output: `<count> [<jail>] <ip>`
    ///
    /// Blank and malformed lines yield `None`.
    pub fn from_aggregate_line(line: &str) -> Option<Self> {
        let mut fields = line.split_whitespace();
        let count = fields.next()?.parse::<i64>().ok()?;
        let attack_type = fields.next()?.trim_matches(|c| c == '[' || c == ']');
        let ip = fields.next()?.parse::<Ipv4Addr>().ok()?;

        if attack_type.is_empty() {
            return None;
        }

        Some(BanRecord::new(ip, attack_type, count))
    }

    /// Order records the way the aggregation step ranks them
    pub fn sort_by_rank(records: &mut [BanRecord]) {
        records.sort_by(|a, b| {
            b.occurrence_count
                .cmp(&a.occurrence_count)
                .then_with(|| a.attack_type.cmp(&b.attack_type))
                .then_with(|| a.ip.cmp(&b.ip))
        });
    }
}

/// A row of the `ips` table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: i64,
    pub ip: Ipv4Addr,
    pub attack_type: String,
    /// Ban count recorded at admission, never updated
    pub quantity: i64,
}
