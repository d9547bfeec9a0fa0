//! Structured view of `iptables -L -n` output
//!
//! Parses the text listing into chains and rules so membership questions
//! compare addresses instead of searching text: `10.0.0.5` is not blocked
//! just because a rule for `10.0.0.55` exists.

use std::collections::{HashMap, HashSet};
use std::net::Ipv4Addr;

/// One rule row of a listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleLine {
    /// Jump target, `None` for rules without one
    pub target: Option<String>,
    /// Source address when the rule matches a single host
    pub source: Option<Ipv4Addr>,
}

/// Chains and their rules, as listed by iptables
#[derive(Debug, Clone, Default)]
pub struct RuleListing {
    chains: HashMap<String, Vec<RuleLine>>,
}

impl RuleListing {
    pub fn parse(text: &str) -> Self {
        let mut chains: HashMap<String, Vec<RuleLine>> = HashMap::new();
        let mut current: Option<String> = None;
        // Offset of the target column, taken from the header row
        let mut target_column = 0;

        for line in text.lines() {
            if line.trim().is_empty() {
                continue;
            }

            if let Some(header) = line.strip_prefix("Chain ") {
                let name = header.split_whitespace().next().map(str::to_string);
                if let Some(ref name) = name {
                    chains.entry(name.clone()).or_default();
                }
                current = name;
                target_column = 0;
                continue;
            }

            let first = line.split_whitespace().next().unwrap_or_default();
            if first == "target" || first == "pkts" {
                target_column = line.find("target").unwrap_or(0);
                continue;
            }

            if let Some(ref chain) = current {
                if let Some(rule) = Self::parse_rule(line, target_column) {
                    chains.entry(chain.clone()).or_default().push(rule);
                }
            }
        }

        RuleListing { chains }
    }

    /// Parse one rule row; the source is the first address-shaped column
    ///
    /// The target is the word starting exactly at `target_column`, so rows
    /// with an empty target column have none.
    fn parse_rule(line: &str, target_column: usize) -> Option<RuleLine> {
        let starts_word = target_column == 0
            || line
                .get(..target_column)
                .map_or(false, |head| head.ends_with(char::is_whitespace));
        let target = line
            .get(target_column..)
            .filter(|rest| starts_word && !rest.starts_with(char::is_whitespace))
            .and_then(|rest| rest.split_whitespace().next())
            .map(str::to_string);

        let source_column = line.split_whitespace().find_map(parse_address)?;
        Some(RuleLine {
            target,
            source: source_column,
        })
    }

    pub fn has_chain(&self, chain: &str) -> bool {
        self.chains.contains_key(chain)
    }

    pub fn rules(&self, chain: &str) -> &[RuleLine] {
        self.chains.get(chain).map(Vec::as_slice).unwrap_or_default()
    }

    /// Single-host source addresses of the rules in `chain`
    pub fn sources(&self, chain: &str) -> HashSet<Ipv4Addr> {
        self.rules(chain).iter().filter_map(|rule| rule.source).collect()
    }

    /// Number of rules in `from` that jump to `to`
    pub fn jump_count(&self, from: &str, to: &str) -> usize {
        self.rules(from)
            .iter()
            .filter(|rule| rule.target.as_deref() == Some(to))
            .count()
    }
}

/// Parse an address column: `Some(Some(ip))` for a single host,
/// `Some(None)` for a network, `None` when the token is not an address
fn parse_address(token: &str) -> Option<Option<Ipv4Addr>> {
    match token.split_once('/') {
        Some((addr, prefix)) => {
            let addr = addr.parse::<Ipv4Addr>().ok()?;
            let prefix = prefix.parse::<u8>().ok()?;
            Some((prefix == 32).then_some(addr))
        }
        None => token.parse::<Ipv4Addr>().ok().map(Some),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = "\
Chain INPUT (policy ACCEPT)
target     prot opt source               destination
ban-them   tcp  --  0.0.0.0/0            0.0.0.0/0            multiport dports 20,21,22
ACCEPT     all  --  192.168.1.0/24       0.0.0.0/0

Chain FORWARD (policy DROP)
target     prot opt source               destination

Chain OUTPUT (policy ACCEPT)
target     prot opt source               destination
           all  --  10.0.0.77            0.0.0.0/0

Chain ban-them (1 references)
target     prot opt source               destination
DROP       all  --  10.0.0.55            0.0.0.0/0
DROP       all  --  10.0.0.6/32          0.0.0.0/0
";

    #[test]
    fn test_parse_chains() {
        let listing = RuleListing::parse(LISTING);
        assert!(listing.has_chain("INPUT"));
        assert!(listing.has_chain("FORWARD"));
        assert!(listing.has_chain("ban-them"));
        assert!(!listing.has_chain("DOCKER"));
        assert!(listing.rules("FORWARD").is_empty());
    }

    #[test]
    fn test_sources_are_exact() {
        let listing = RuleListing::parse(LISTING);
        let sources = listing.sources("ban-them");

        assert!(sources.contains(&Ipv4Addr::new(10, 0, 0, 55)));
        assert!(sources.contains(&Ipv4Addr::new(10, 0, 0, 6)));
        assert!(!sources.contains(&Ipv4Addr::new(10, 0, 0, 5)));
        assert_eq!(sources.len(), 2);
    }

    #[test]
    fn test_networks_are_not_hosts() {
        let listing = RuleListing::parse(LISTING);
        assert!(listing.sources("INPUT").is_empty());
        assert_eq!(listing.rules("INPUT").len(), 2);
    }

    #[test]
    fn test_rule_without_target() {
        let listing = RuleListing::parse(LISTING);
        let rules = listing.rules("OUTPUT");
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].target, None);
        assert_eq!(rules[0].source, Some(Ipv4Addr::new(10, 0, 0, 77)));
    }

    #[test]
    fn test_jump_count() {
        let listing = RuleListing::parse(LISTING);
        assert_eq!(listing.jump_count("INPUT", "ban-them"), 1);
        assert_eq!(listing.jump_count("OUTPUT", "ban-them"), 0);
        assert_eq!(listing.jump_count("missing", "ban-them"), 0);
    }

    #[test]
    fn test_verbose_listing() {
        let text = "\
Chain ban-them (1 references)
 pkts bytes target     prot opt in     out     source               destination
   12   720 DROP       all  --  *      *       10.0.0.5             0.0.0.0/0
";
        let listing = RuleListing::parse(text);
        assert!(listing.sources("ban-them").contains(&Ipv4Addr::new(10, 0, 0, 5)));
        assert_eq!(listing.rules("ban-them")[0].target.as_deref(), Some("DROP"));
    }

    #[test]
    fn test_verbose_listing_jump_count() {
        let text = "\
Chain INPUT (policy ACCEPT 0 packets, 0 bytes)
 pkts bytes target     prot opt in     out     source               destination
 1042 61230 ban-them   tcp  --  *      *       0.0.0.0/0            0.0.0.0/0            multiport dports 20,21,22
    0     0            all  --  *      *       10.0.0.77            0.0.0.0/0
";
        let listing = RuleListing::parse(text);
        assert_eq!(listing.jump_count("INPUT", "ban-them"), 1);
        assert_eq!(listing.rules("INPUT")[1].target, None);
        assert!(listing.sources("INPUT").contains(&Ipv4Addr::new(10, 0, 0, 77)));
    }

    #[test]
    fn test_empty_listing() {
        let listing = RuleListing::parse("");
        assert!(!listing.has_chain("INPUT"));
        assert!(listing.sources("ban-them").is_empty());
    }
}
