//! Terminal consumer used by the `logtap` binary.

use logtap_core::{LogConsumer, LogRecord, Origin};
use std::io::Write;

/// Writes stdout records to this process's stdout and stderr records to its
/// stderr, byte for byte.
///
/// `accept` blocks on the terminal write, so a stalled terminal stalls the
/// follow loop. Write errors (closed pipe) are ignored.
#[derive(Debug, Default)]
pub struct PrintConsumer;

impl PrintConsumer {
    pub fn new() -> Self {
        Self
    }
}

impl LogConsumer for PrintConsumer {
    fn accept(&self, record: &LogRecord) {
        let _ = match record.origin() {
            Origin::Stdout => write_all(std::io::stdout().lock(), record.content()),
            Origin::Stderr => write_all(std::io::stderr().lock(), record.content()),
        };
    }
}

fn write_all(mut out: impl Write, bytes: &[u8]) -> std::io::Result<()> {
    out.write_all(bytes)?;
    out.flush()
}
