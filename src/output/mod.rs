use crate::models::RunSummary;
use std::fs::OpenOptions;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while writing a run summary
#[derive(Error, Debug)]
pub enum OutputError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Output handler for run summaries
pub struct OutputHandler {
    format: OutputFormat,
    writer: Option<Box<dyn Write>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputFormat {
    None,
    Console,
    Json,
    Jsonl,
}

impl OutputFormat {
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "console" => OutputFormat::Console,
            "json" => OutputFormat::Json,
            "jsonl" => OutputFormat::Jsonl,
            _ => OutputFormat::None, // Default
        }
    }
}

impl OutputHandler {
    /// Create a new output handler
    ///
    /// Summaries are appended to `file_path` when given, printed to stdout otherwise.
    pub fn new(format: OutputFormat, file_path: Option<PathBuf>) -> Result<Self, OutputError> {
        let writer: Option<Box<dyn Write>> = match (&format, file_path) {
            (OutputFormat::None, _) => None,
            (_, Some(path)) => {
                let file = OpenOptions::new().create(true).append(true).open(path)?;
                Some(Box::new(BufWriter::new(file)))
            }
            (_, None) => None,
        };

        Ok(OutputHandler { format, writer })
    }

    /// Write a run summary
    pub fn write_summary(&mut self, summary: &RunSummary) -> Result<(), OutputError> {
        match &self.format {
            OutputFormat::None => {}
            OutputFormat::Json => {
                let json = serde_json::to_string_pretty(summary)?;
                self.write_output(&format!("{}\n", json))?;
            }
            OutputFormat::Jsonl => {
                let json = serde_json::to_string(summary)?;
                self.write_output(&format!("{}\n", json))?;
            }
            OutputFormat::Console => {
                let output = Self::render_console(summary);
                self.write_output(&output)?;
            }
        }
        Ok(())
    }

    fn render_console(summary: &RunSummary) -> String {
        let mut output = format!(
            "[{}] {:?}: {} IP(s) over threshold {}, {} admitted, chain {:?}, {} banned\n",
            summary.started_at.to_rfc3339(),
            summary.source,
            summary.candidates,
            summary.threshold,
            summary.admitted.len(),
            summary.chain,
            summary.banned.len()
        );
        for record in &summary.admitted {
            output.push_str(&format!(
                "  admitted {} ({}, {} bans)\n",
                record.ip, record.attack_type, record.occurrence_count
            ));
        }
        for ip in &summary.banned {
            output.push_str(&format!("  banned {}\n", ip));
        }
        output
    }

    fn write_output(&mut self, data: &str) -> Result<(), OutputError> {
        match &mut self.writer {
            Some(writer) => {
                writer.write_all(data.as_bytes())?;
                writer.flush()?;
            }
            None => {
                let mut stdout = io::stdout();
                stdout.write_all(data.as_bytes())?;
                stdout.flush()?;
            }
        }
        Ok(())
    }
}
