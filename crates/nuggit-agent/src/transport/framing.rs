//! Line framing for the host protocol: one JSON message per line in, one
//! exchange report per line out.

use nuggit::ExchangeRequest;

use crate::types::{AgentError, AgentResult, HostMessage};

/// Longest excerpt of a rejected line quoted in its error.
const EXCERPT_CHARS: usize = 48;

/// Decode one host line. Blank lines carry no message.
pub fn decode_line(line: &str) -> AgentResult<Option<HostMessage>> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    serde_json::from_str(trimmed)
        .map(Some)
        .map_err(|e| AgentError::Parse(format!("{e} in `{}`", excerpt(trimmed))))
}

/// Encode a report as a single newline-terminated line.
pub fn encode_report(report: &ExchangeRequest) -> AgentResult<String> {
    let mut line = serde_json::to_string(report)?;
    line.push('\n');
    Ok(line)
}

fn excerpt(line: &str) -> String {
    match line.char_indices().nth(EXCERPT_CHARS) {
        Some((cut, _)) => format!("{}...", &line[..cut]),
        None => line.to_string(),
    }
}
