//! Line-oriented stand-in for a statsd host: every line on the input is
//! either a JSON metrics snapshot (emitted as a flush) or the word `status`.

use std::io::Write;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::warn;

use crate::events::EventBus;
use crate::snapshot::MetricsSnapshot;
use crate::status::unix_now;

#[derive(Debug, PartialEq)]
pub enum Command {
    Flush(u64, Box<MetricsSnapshot>),
    Status,
}

/// Parse one input line. Blank lines yield `None`; a snapshot without a
/// timestamp is stamped with the current time.
pub fn parse_line(line: &str) -> Result<Option<Command>, serde_json::Error> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    if line == "status" {
        return Ok(Some(Command::Status));
    }

    let snapshot: MetricsSnapshot = serde_json::from_str(line)?;
    let ts = match snapshot.timestamp {
        0 => unix_now(),
        ts => ts,
    };
    Ok(Some(Command::Flush(ts, Box::new(snapshot))))
}

/// Drive `events` from `input` until EOF. Status reports are written to `out`
/// as `backend.stat: value` lines.
pub async fn run<R, W>(events: &EventBus, input: R, out: &mut W) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut lines = input.lines();
    while let Some(line) = lines.next_line().await? {
        match parse_line(&line) {
            Ok(Some(Command::Flush(ts, snapshot))) => events.emit_flush(ts, &snapshot),
            Ok(Some(Command::Status)) => {
                let mut result = Ok(());
                events.emit_status(&mut |err, backend, stat, value| {
                    if let Some(err) = err {
                        warn!(error = %err, backend, stat, "status error");
                    }
                    if result.is_ok() {
                        result = writeln!(out, "{backend}.{stat}: {value}");
                    }
                });
                result?;
                out.flush()?;
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "skipping malformed snapshot"),
        }
    }
    Ok(())
}
