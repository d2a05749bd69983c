//! Messages the host sends to the agent.

use serde::{Deserialize, Serialize};

/// One "subtree added" record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MutationRecord {
    /// CSS selector of the parent the markup was added under. Defaults to
    /// the document body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    /// Markup of the added nodes.
    pub html: String,
}

/// A message relayed from the page context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HostMessage {
    /// A batch of structural mutations, delivered together.
    Mutations { records: Vec<MutationRecord> },
    /// The page navigated. `html` carries the new page when the host has
    /// it; otherwise the agent fetches `url`.
    Navigate {
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        html: Option<String>,
    },
    /// User-requested re-run over the whole document. Uses the cached plan
    /// when the page already has one.
    Trigger,
}

impl HostMessage {
    /// Convenience constructor for a batch appended under one target.
    pub fn added(target: Option<&str>, html: &[&str]) -> Self {
        HostMessage::Mutations {
            records: html
                .iter()
                .map(|h| MutationRecord {
                    target: target.map(str::to_string),
                    html: h.to_string(),
                })
                .collect(),
        }
    }
}
