use thiserror::Error;

use crate::cli::{Cli, CliError};
use crate::config::{AggregatorKind, Config, ConfigError};
use crate::firewall::IptablesController;
use crate::input::{self, LogAggregator, NativeAggregator, ScriptAggregator, SourceError};
use crate::models::RunSummary;
use crate::output::{OutputError, OutputFormat, OutputHandler};
use crate::persistence::SqliteLedger;
use crate::reconciler::{ReconcileError, Reconciler};

/// Everything that can end a ban-them invocation early
#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Cli(#[from] CliError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Reconcile(#[from] ReconcileError),

    #[error("Output error: {0}")]
    Output(#[from] OutputError),
}

impl From<SourceError> for AppError {
    fn from(error: SourceError) -> Self {
        AppError::Reconcile(error.into())
    }
}

/// Configuration file (or defaults) with the command line flags applied
///
/// Argument errors are reported before the configuration file is read.
pub fn load_config(cli: &Cli) -> Result<Config, AppError> {
    cli.validate()?;

    let mut config = match cli.config {
        Some(ref path) => {
            log::debug!("Loading configuration from {:?}", path);
            Config::from_file(path)?
        }
        None => Config::default(),
    };
    cli.apply(&mut config)?;
    Ok(config)
}

/// Run one reconciliation pass against the real log, ledger and iptables
pub fn execute(config: &Config) -> Result<RunSummary, AppError> {
    // Fail on an unreadable log before the ledger file gets created
    input::open_source(&config.source.log_path)?;

    let aggregator: Box<dyn LogAggregator> = match config.source.aggregator {
        AggregatorKind::Script => Box::new(ScriptAggregator::new(config.source.helper_script.clone())),
        AggregatorKind::Native => Box::new(
            NativeAggregator::new().map_err(|e| SourceError::Aggregation(e.to_string()))?,
        ),
    };
    let ledger = SqliteLedger::new(&config.ledger.database_path).map_err(ReconcileError::from)?;
    let firewall = IptablesController::new(config.firewall.binary.clone());

    let reconciler = Reconciler::new(
        config.firewall.clone(),
        aggregator.as_ref(),
        &ledger,
        &firewall,
    );
    let summary = reconciler.run(&config.source.log_path, config.threshold)?;

    let mut output = OutputHandler::new(
        OutputFormat::from_str(&config.output.format),
        config.output.file_path.clone(),
    )?;
    output.write_summary(&summary)?;

    Ok(summary)
}

/// Load the configuration for `cli` and run one pass
pub fn run(cli: &Cli) -> Result<RunSummary, AppError> {
    let config = load_config(cli)?;
    execute(&config)
}
