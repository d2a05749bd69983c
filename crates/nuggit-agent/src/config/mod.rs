//! Configuration loading and resolution.
//!
//! Every setting resolves in the same order: explicit value (CLI flag),
//! then environment variable, then built-in default.

use std::time::Duration;

use url::Url;

use crate::types::{AgentError, AgentResult};

pub const DEFAULT_BACKEND: &str = "http://localhost:9402";
pub const DEFAULT_DEBOUNCE_MS: u64 = 500;
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;

pub const ENV_BACKEND: &str = "NUGGIT_BACKEND";
pub const ENV_DEBOUNCE_MS: &str = "NUGGIT_DEBOUNCE_MS";
pub const ENV_TIMEOUT_MS: &str = "NUGGIT_TIMEOUT_MS";

/// Values given explicitly on the command line.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub backend: Option<String>,
    pub debounce_ms: Option<u64>,
    pub timeout_ms: Option<u64>,
}

/// Resolved agent settings.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Backend base address, always ending in `/`.
    pub backend: Url,
    /// Quiescence window for mutation batches.
    pub debounce: Duration,
    /// Per-request network timeout.
    pub timeout: Duration,
}

impl AgentConfig {
    /// Resolve against the process environment.
    pub fn resolve(overrides: &ConfigOverrides) -> AgentResult<Self> {
        Self::resolve_with(overrides, |key| std::env::var(key).ok())
    }

    /// Resolve against an arbitrary environment lookup.
    pub fn resolve_with<F>(overrides: &ConfigOverrides, env: F) -> AgentResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let raw_backend = overrides
            .backend
            .clone()
            .or_else(|| env(ENV_BACKEND))
            .unwrap_or_else(|| DEFAULT_BACKEND.to_string());
        let backend = parse_backend(&raw_backend)?;
        let debounce_ms = resolve_millis(overrides.debounce_ms, &env, ENV_DEBOUNCE_MS)?
            .unwrap_or(DEFAULT_DEBOUNCE_MS);
        let timeout_ms = resolve_millis(overrides.timeout_ms, &env, ENV_TIMEOUT_MS)?
            .unwrap_or(DEFAULT_TIMEOUT_MS);

        Ok(Self {
            backend,
            debounce: Duration::from_millis(debounce_ms),
            timeout: Duration::from_millis(timeout_ms),
        })
    }

    /// Absolute address of a backend endpoint such as `api/trigger`.
    pub fn endpoint(&self, path: &str) -> AgentResult<Url> {
        self.backend
            .join(path.trim_start_matches('/'))
            .map_err(|e| AgentError::Config(format!("bad endpoint {path}: {e}")))
    }
}

fn parse_backend(raw: &str) -> AgentResult<Url> {
    let url = Url::parse(raw.trim())
        .map_err(|e| AgentError::Config(format!("invalid backend address {raw:?}: {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(with_trailing_slash(url)),
        other => Err(AgentError::Config(format!(
            "backend address must be http or https, got {other}"
        ))),
    }
}

fn resolve_millis<F>(explicit: Option<u64>, env: &F, key: &str) -> AgentResult<Option<u64>>
where
    F: Fn(&str) -> Option<String>,
{
    if explicit.is_some() {
        return Ok(explicit);
    }
    match env(key) {
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|e| AgentError::Config(format!("{key}={raw:?}: {e}"))),
        None => Ok(None),
    }
}

fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}
