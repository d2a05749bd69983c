//! Stdio transport: reads host messages from stdin, one JSON object per line.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::types::{AgentResult, HostMessage};

use super::framing;

/// Forwards stdin lines to the page loop.
pub struct StdioTransport;

impl StdioTransport {
    /// Spawn the reader. The channel closes when stdin reaches EOF.
    pub fn spawn(tx: mpsc::Sender<HostMessage>) -> JoinHandle<AgentResult<usize>> {
        tokio::spawn(async move { forward_lines(BufReader::new(tokio::io::stdin()), tx).await })
    }
}

/// Read `reader` line by line and send every well-formed message on `tx`.
/// Malformed lines are logged and skipped. Returns the number forwarded.
pub async fn forward_lines<R>(reader: R, tx: mpsc::Sender<HostMessage>) -> AgentResult<usize>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut forwarded = 0;

    tracing::info!("Stdio transport started");

    while let Some(line) = lines.next_line().await? {
        match framing::decode_line(&line) {
            Ok(None) => continue,
            Ok(Some(msg)) => {
                if tx.send(msg).await.is_err() {
                    tracing::debug!("page loop gone, stopping transport");
                    break;
                }
                forwarded += 1;
            }
            Err(e) => tracing::warn!(error = %e, "skipping malformed host line"),
        }
    }

    tracing::info!("EOF on stdin, shutting down");
    Ok(forwarded)
}
