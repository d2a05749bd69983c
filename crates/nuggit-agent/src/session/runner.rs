//! Host message loop: one page session at a time, torn down on navigation.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use url::Url;

use nuggit::{Document, NodeId, Value};

use super::debounce::Debouncer;
use super::page::{PageSession, SessionState};
use crate::backend::{http::fetch_page, Backend};
use crate::config::AgentConfig;
use crate::types::HostMessage;

/// A loaded page: its address and markup.
#[derive(Debug, Clone)]
pub struct Page {
    pub url: String,
    pub html: String,
}

/// Why a page session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchExit {
    Navigate { url: String, html: Option<String> },
    /// The host channel closed.
    Closed,
}

/// Totals over a whole run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub pages: usize,
    pub passes: usize,
}

/// Watch mutation batches for a session with a cached plan.
///
/// Batches are applied to the document as they arrive. Their added nodes are
/// debounced: a batch arriving inside the window replaces the pending one,
/// and only the surviving batch is run. Navigation discards the pending
/// batch; a closed channel flushes it first.
pub async fn watch(
    session: &mut PageSession,
    rx: &mut mpsc::Receiver<HostMessage>,
    window: Duration,
) -> WatchExit {
    let mut pending: Debouncer<Vec<NodeId>> = Debouncer::new(window);
    tracing::debug!(url = %session.url(), window = ?window, "watching mutations");

    loop {
        tokio::select! {
            msg = rx.recv() => match msg {
                Some(HostMessage::Mutations { records }) => {
                    let added = session.apply_mutations(&records);
                    if added.is_empty() {
                        continue;
                    }
                    if pending.push(added) {
                        tracing::debug!("coalesced mutation batch");
                    }
                }
                Some(HostMessage::Trigger) => {
                    session.trigger(false).await;
                }
                Some(HostMessage::Navigate { url, html }) => {
                    if pending.cancel().is_some() {
                        tracing::debug!("dropping pending batch on navigation");
                    }
                    return WatchExit::Navigate { url, html };
                }
                None => {
                    if let Some(nodes) = pending.cancel() {
                        session.run_pass(&Value::from(nodes), true).await;
                    }
                    return WatchExit::Closed;
                }
            },
            nodes = pending.fired() => {
                session.run_pass(&Value::from(nodes), true).await;
            }
        }
    }
}

/// Wait out a page the engine is off for. Mutations and triggers are
/// ignored until the host navigates or closes the channel.
async fn idle(rx: &mut mpsc::Receiver<HostMessage>) -> WatchExit {
    loop {
        match rx.recv().await {
            Some(HostMessage::Mutations { .. }) => continue,
            Some(HostMessage::Trigger) => {
                tracing::debug!("engine off for this page, ignoring trigger");
            }
            Some(HostMessage::Navigate { url, html }) => return WatchExit::Navigate { url, html },
            None => return WatchExit::Closed,
        }
    }
}

/// Run one page from load to teardown. An unreachable backend or a missing
/// plan leaves the page idle until the next load.
pub async fn serve_page(
    session: &mut PageSession,
    rx: &mut mpsc::Receiver<HostMessage>,
    window: Duration,
) -> WatchExit {
    match session.start().await {
        SessionState::Watching => watch(session, rx, window).await,
        SessionState::Unreachable | SessionState::NoPlan => idle(rx).await,
    }
}

/// Serve pages until the host channel closes, starting with `first`.
pub async fn run_agent(
    backend: Arc<dyn Backend>,
    config: &AgentConfig,
    first: Page,
    rx: &mut mpsc::Receiver<HostMessage>,
) -> RunSummary {
    let mut summary = RunSummary::default();
    let mut next = Some(first);

    while let Some(page) = next.take() {
        summary.pages += 1;
        tracing::info!(url = %page.url, "page loaded");
        let mut session = PageSession::new(backend.clone(), page.url, Document::parse(&page.html));
        let exit = serve_page(&mut session, rx, config.debounce).await;
        summary.passes += session.passes();
        drop(session);
        next = next_page(exit, rx, config.timeout).await;
    }

    tracing::info!(pages = summary.pages, passes = summary.passes, "host channel closed");
    summary
}

/// Resolve the page to serve after `exit`. A failed load waits for the
/// next navigation.
async fn next_page(
    mut exit: WatchExit,
    rx: &mut mpsc::Receiver<HostMessage>,
    timeout: Duration,
) -> Option<Page> {
    loop {
        let WatchExit::Navigate { url, html } = exit else {
            return None;
        };
        if let Some(page) = load(url, html, timeout).await {
            return Some(page);
        }
        exit = idle(rx).await;
    }
}

async fn load(url: String, html: Option<String>, timeout: Duration) -> Option<Page> {
    if let Some(html) = html {
        return Some(Page { url, html });
    }
    let parsed = match Url::parse(&url) {
        Ok(u) => u,
        Err(e) => {
            tracing::warn!(url = %url, error = %e, "cannot load page");
            return None;
        }
    };
    match fetch_page(&parsed, timeout).await {
        Ok(html) => Some(Page { url, html }),
        Err(e) => {
            tracing::warn!(url = %url, error = %e, "page fetch failed");
            None
        }
    }
}
