use super::{open_source, LogAggregator, SourceError};
use crate::models::BanRecord;
use crate::process;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Helper written when none exists at the configured path
pub const DEFAULT_HELPER: &str = r#"#!/bin/sh
# Count fail2ban bans per jail and IP, most frequent first.
# Output lines: <count> [<jail>] <ip>
[ -r "$1" ] || exit 66
grep -w 'Ban' "$1" | awk '{
    jail = "[unknown]"
    for (i = 1; i < NF; i++) {
        if ($i ~ /^\[.*\]$/) jail = $i
        if ($i == "Ban") { print jail " " $(i + 1); break }
    }
}' | sort | uniq -c | sort -nr
"#;

/// Aggregates the log by running an external helper script
pub struct ScriptAggregator {
    script: PathBuf,
}

impl ScriptAggregator {
    pub fn new(script: PathBuf) -> Self {
        ScriptAggregator { script }
    }

    pub fn script(&self) -> &Path {
        &self.script
    }

    /// Write the default helper if the configured one is missing
    ///
    /// Returns `true` when the helper was generated.
    pub fn ensure_helper(&self) -> Result<bool, SourceError> {
        if self.script.exists() {
            return Ok(false);
        }

        fs::write(&self.script, DEFAULT_HELPER)
            .and_then(|_| fs::set_permissions(&self.script, fs::Permissions::from_mode(0o755)))
            .map_err(|e| {
                SourceError::Aggregation(format!(
                    "unable to create helper script {:?}: {}",
                    self.script, e
                ))
            })?;

        log::info!("Generated helper script {:?}", self.script);
        Ok(true)
    }
}

impl LogAggregator for ScriptAggregator {
    fn aggregate(&self, source: &Path) -> Result<Vec<BanRecord>, SourceError> {
        open_source(source)?;
        self.ensure_helper()?;

        let output = process::output(Command::new(&self.script).arg(source)).map_err(|e| {
            SourceError::Aggregation(format!("unable to run {:?}: {}", self.script, e))
        })?;

        if !output.status.success() {
            return Err(SourceError::Aggregation(format!(
                "{:?} exited with {}: {}",
                self.script,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let stdout = String::from_utf8(output.stdout).map_err(|_| {
            SourceError::Aggregation(format!("{:?} produced non UTF-8 output", self.script))
        })?;

        let mut records: Vec<BanRecord> = stdout
            .lines()
            .filter_map(BanRecord::from_aggregate_line)
            .collect();
        BanRecord::sort_by_rank(&mut records);

        log::debug!("Aggregated {} (jail, ip) pairs from {:?}", records.len(), source);
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::net::Ipv4Addr;
    use tempfile::tempdir;

    fn write_script(path: &Path, body: &str) {
        fs::write(path, body).unwrap();
        fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
    }

    #[test]
    fn test_generates_missing_helper() {
        let dir = tempdir().unwrap();
        let aggregator = ScriptAggregator::new(dir.path().join("sort-fail2ban-log.sh"));

        assert!(aggregator.ensure_helper().unwrap());
        assert!(!aggregator.ensure_helper().unwrap());

        let metadata = fs::metadata(aggregator.script()).unwrap();
        assert_eq!(metadata.permissions().mode() & 0o777, 0o755);
        assert_eq!(fs::read_to_string(aggregator.script()).unwrap(), DEFAULT_HELPER);
    }

    #[test]
    fn test_keeps_existing_helper() {
        let dir = tempdir().unwrap();
        let script = dir.path().join("custom.sh");
        write_script(&script, "#!/bin/sh\necho '     12 [sshd] 10.0.0.5'\n");

        let aggregator = ScriptAggregator::new(script.clone());
        assert!(!aggregator.ensure_helper().unwrap());
        assert!(fs::read_to_string(&script).unwrap().contains("echo"));
    }

    #[test]
    fn test_default_helper_aggregates_log() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("fail2ban.log");
        let mut log = fs::File::create(&log_path).unwrap();
        for _ in 0..15 {
            writeln!(log, "2024-05-06 12:00:00,456 fail2ban.actions        [812]: NOTICE  [sshd] Ban 10.0.0.5").unwrap();
        }
        for _ in 0..2 {
            writeln!(log, "2016-02-03 10:15:01,123 fail2ban.actions: WARNING [ssh] Ban 10.0.0.6").unwrap();
        }
        writeln!(log, "2024-05-06 12:00:00,456 fail2ban.actions        [812]: NOTICE  [sshd] Unban 10.0.0.5").unwrap();
        writeln!(log, "2024-05-06 12:00:00,456 fail2ban.filter         [812]: INFO    [sshd] Found 10.0.0.7").unwrap();
        drop(log);

        let aggregator = ScriptAggregator::new(dir.path().join("sort-fail2ban-log.sh"));
        let records = aggregator.aggregate(&log_path).unwrap();

        assert_eq!(
            records,
            vec![
                BanRecord::new(Ipv4Addr::new(10, 0, 0, 5), "sshd", 15),
                BanRecord::new(Ipv4Addr::new(10, 0, 0, 6), "ssh", 2),
            ]
        );
    }

    #[test]
    fn test_skips_malformed_helper_output() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("fail2ban.log");
        fs::write(&log_path, "").unwrap();
        let script = dir.path().join("helper.sh");
        write_script(
            &script,
            "#!/bin/sh\necho '     12 [sshd] 10.0.0.5'\necho ''\necho 'oops'\necho '3 [sshd] 10.0.0.9'\n",
        );

        let records = ScriptAggregator::new(script).aggregate(&log_path).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].occurrence_count, 12);
        assert_eq!(records[1].ip, Ipv4Addr::new(10, 0, 0, 9));
    }

    #[test]
    fn test_helper_failure() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("fail2ban.log");
        fs::write(&log_path, "").unwrap();
        let script = dir.path().join("helper.sh");
        write_script(&script, "#!/bin/sh\necho boom >&2\nexit 3\n");

        let result = ScriptAggregator::new(script).aggregate(&log_path);
        match result {
            Err(SourceError::Aggregation(message)) => assert!(message.contains("boom")),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_missing_log_fails_before_helper_runs() {
        let dir = tempdir().unwrap();
        let aggregator = ScriptAggregator::new(dir.path().join("sort-fail2ban-log.sh"));

        let result = aggregator.aggregate(&dir.path().join("missing.log"));
        assert!(matches!(result, Err(SourceError::Unavailable { .. })));
        assert!(!aggregator.script().exists());
    }
}
