//! Command line surface
//!
//! Flags override values from the configuration file. Argument errors are
//! detected before anything touches the ledger or the firewall.

use std::ffi::OsString;
use std::fs::File;
use std::path::PathBuf;
use structopt::StructOpt;
use thiserror::Error;

use crate::config::Config;

/// Errors from CLI argument validation
#[derive(Debug, Error)]
pub enum CliError {
    #[error("Option -n, --number must be an integer, got {0:?}")]
    InvalidNumber(String),

    #[error("Unable to find or open the log file {path:?}: {source}")]
    SourceUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Definitely ban the IPs that fail2ban has banned a lot of times
#[derive(StructOpt, Debug)]
#[structopt(name = "ban-them")]
pub struct Cli {
    /// Verbose, let you know what is being done
    #[structopt(short, long)]
    pub verbose: bool,

    /// The fail2ban log to analyse [default: /var/log/fail2ban.log]
    #[structopt(short, long, parse(from_os_str))]
    pub source: Option<PathBuf>,

    /// Number of times an IP has to be banned before being banned forever [default: 10]
    #[structopt(short, long)]
    pub number: Option<String>,

    /// Path to a configuration file
    #[structopt(short, long, parse(from_os_str))]
    pub config: Option<PathBuf>,

    /// Print the default configuration and exit
    #[structopt(long)]
    pub print_config: bool,
}

impl Cli {
    /// Parse arguments without exiting the process
    pub fn parse_from<I>(args: I) -> Result<Self, structopt::clap::Error>
    where
        I: IntoIterator,
        I::Item: Into<OsString> + Clone,
    {
        Cli::from_iter_safe(args)
    }

    /// Usage text, as printed by `--help`
    pub fn usage() -> String {
        let mut buffer = Vec::new();
        if Cli::clap().write_help(&mut buffer).is_err() {
            return String::new();
        }
        String::from_utf8_lossy(&buffer).into_owned()
    }

    /// Threshold given with `-n`, if any
    pub fn threshold(&self) -> Result<Option<i64>, CliError> {
        self.number
            .as_deref()
            .map(|n| {
                n.trim()
                    .parse::<i64>()
                    .map_err(|_| CliError::InvalidNumber(n.to_string()))
            })
            .transpose()
    }

    /// Check `-n` and `-s` without touching any configuration
    ///
    /// A source given with `-s` must be openable.
    pub fn validate(&self) -> Result<(), CliError> {
        self.threshold()?;
        if let Some(ref path) = self.source {
            File::open(path).map_err(|source| CliError::SourceUnavailable {
                path: path.clone(),
                source,
            })?;
        }
        Ok(())
    }

    /// Apply the flags on top of `config`
    pub fn apply(&self, config: &mut Config) -> Result<(), CliError> {
        self.validate()?;

        if let Some(ref path) = self.source {
            config.source.log_path = path.clone();
        }
        if let Some(threshold) = self.threshold()? {
            config.threshold = threshold;
        }

        Ok(())
    }
}
