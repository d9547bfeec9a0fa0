//! Child process execution
//!
//! `ScriptAggregator` writes its helper and executes it in the same pass. If
//! any other thread of the host process forks in between, the child briefly
//! inherits the write descriptor and exec fails with ETXTBSY until it closes.

use std::io;
use std::process::{Command, Output};
use std::time::Duration;

/// ETXTBSY: the executable is still open for writing somewhere
const TEXT_FILE_BUSY: i32 = 26;

const MAX_RETRIES: u32 = 3;

/// Run a command to completion, retrying briefly when the executable is busy
pub(crate) fn output(command: &mut Command) -> io::Result<Output> {
    let mut attempt = 0;
    loop {
        match command.output() {
            Err(e) if is_text_file_busy(&e) && attempt < MAX_RETRIES => {
                attempt += 1;
                log::debug!("{:?} busy, retrying ({}/{})", command.get_program(), attempt, MAX_RETRIES);
                std::thread::sleep(Duration::from_millis(50 * u64::from(attempt)));
            }
            result => return result,
        }
    }
}

fn is_text_file_busy(error: &io::Error) -> bool {
    error.raw_os_error() == Some(TEXT_FILE_BUSY)
}
