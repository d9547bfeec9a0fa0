use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Ports the dedicated chain is spliced in front of
pub const DEFAULT_PORTS: [u16; 15] = [
    20, 21, 22, 25, 53, 80, 110, 143, 443, 465, 993, 995, 3306, 8080, 8081,
];

/// Errors that can occur while loading or saving configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Configuration for a ban-them run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// An IP is banned forever once it was banned strictly more often than this
    pub threshold: i64,
    /// Log source configuration
    pub source: SourceConfig,
    /// Ledger configuration
    pub ledger: LedgerConfig,
    /// Firewall configuration
    pub firewall: FirewallConfig,
    /// Run summary output configuration
    pub output: OutputConfig,
}

/// Log source configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Path to the fail2ban log
    pub log_path: PathBuf,
    /// Helper script producing `<count> [<jail>] <ip>` lines
    pub helper_script: PathBuf,
    /// Aggregator to use: "script" or "native"
    pub aggregator: AggregatorKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregatorKind {
    /// Run the helper script, generating it first if missing
    Script,
    /// Parse the log in-process
    Native,
}

/// Ledger configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Path to the SQLite database holding the `ips` table
    pub database_path: PathBuf,
}

/// Firewall configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FirewallConfig {
    /// Path to the iptables binary
    pub binary: PathBuf,
    /// Dedicated chain holding the DROP rules
    pub chain: String,
    /// Chain the jump rule is inserted into
    pub entry_chain: String,
    /// Protocol matched by the jump rule
    pub protocol: String,
    /// Destination ports matched by the jump rule
    pub ports: Vec<u16>,
    /// How an IP is recognised as already blocked
    pub membership: MembershipMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MembershipMode {
    /// Parse the rule listing and compare source addresses of the dedicated chain
    Structured,
    /// Search the raw listing text for the IP, as older deployments did
    Substring,
}

/// Output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Output format: "none", "console", "json" or "jsonl"
    pub format: String,
    /// Output file path; stdout when absent
    pub file_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = default_data_dir();
        Config {
            threshold: 10,
            source: SourceConfig {
                log_path: PathBuf::from("/var/log/fail2ban.log"),
                helper_script: data_dir.join("sort-fail2ban-log.sh"),
                aggregator: AggregatorKind::Script,
            },
            ledger: LedgerConfig {
                database_path: data_dir.join("data.db"),
            },
            firewall: FirewallConfig {
                binary: PathBuf::from("/sbin/iptables"),
                chain: "ban-them".to_string(),
                entry_chain: "INPUT".to_string(),
                protocol: "tcp".to_string(),
                ports: DEFAULT_PORTS.to_vec(),
                membership: MembershipMode::Structured,
            },
            output: OutputConfig {
                format: "none".to_string(),
                file_path: None,
            },
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Save configuration to a file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        std::fs::write(path, self.to_toml()?)?;
        Ok(())
    }

    /// Render the configuration as TOML
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

/// Directory holding the executable, where the helper script and ledger live by default
fn default_data_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| std::fs::canonicalize(exe).ok())
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."))
}
