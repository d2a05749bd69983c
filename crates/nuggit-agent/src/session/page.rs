//! Per-page session: plan negotiation, pass execution and reporting.

use std::sync::Arc;

use chrono::Utc;

use nuggit::{CompiledPlan, Document, NodeId, ReportContext, TriggerRequest, Value};

use crate::backend::Backend;
use crate::types::MutationRecord;

/// The plan a page negotiated, built once and reused for every pass.
#[derive(Debug)]
pub struct ActivePlan {
    pub id: String,
    pub plan: CompiledPlan,
}

/// Where a session ended up after a trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Backend did not answer the reachability probe.
    Unreachable,
    /// Backend has no plan for this page, or the plan was unusable.
    NoPlan,
    /// A plan is cached and mutations should be watched.
    Watching,
}

/// Result of one execution pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassOutcome {
    /// A report with this many results was delivered.
    Reported(usize),
    /// Every exchange value was zero; nothing was sent.
    Empty,
    /// The report could not be delivered.
    Failed,
    /// No plan is cached.
    NoPlan,
}

/// State owned by one page for its whole lifetime.
pub struct PageSession {
    backend: Arc<dyn Backend>,
    url: String,
    document: Document,
    plan: Option<ActivePlan>,
    passes: usize,
}

impl PageSession {
    pub fn new(backend: Arc<dyn Backend>, url: impl Into<String>, document: Document) -> Self {
        Self {
            backend,
            url: url.into(),
            document,
            plan: None,
            passes: 0,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn plan(&self) -> Option<&ActivePlan> {
        self.plan.as_ref()
    }

    /// Number of passes run so far.
    pub fn passes(&self) -> usize {
        self.passes
    }

    /// Page-load entry point: probe the backend once, then trigger.
    pub async fn start(&mut self) -> SessionState {
        if let Err(e) = self.backend.status().await {
            tracing::warn!(url = %self.url, error = %e, "backend unreachable, page left alone");
            return SessionState::Unreachable;
        }
        self.trigger(true).await
    }

    /// Make sure a plan is cached, then run a pass over the whole document.
    /// `implicit` is false only when the host asked for the pass explicitly.
    pub async fn trigger(&mut self, implicit: bool) -> SessionState {
        if !self.ensure_plan(implicit).await {
            return SessionState::NoPlan;
        }
        let root = Value::Node(self.document.root());
        self.run_pass(&root, implicit).await;
        SessionState::Watching
    }

    async fn ensure_plan(&mut self, implicit: bool) -> bool {
        if let Some(active) = &self.plan {
            tracing::debug!(plan = %active.id, "using cached plan");
            return true;
        }

        let request = TriggerRequest::new(implicit, self.url.clone(), Utc::now());
        let response = match self.backend.trigger(&request).await {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(url = %self.url, error = %e, "plan request failed");
                return false;
            }
        };
        let Some((id, plan)) = response.into_plan() else {
            tracing::info!(url = %self.url, "no plan for page");
            return false;
        };
        match CompiledPlan::compile(plan) {
            Ok(plan) => {
                tracing::info!(plan = %id, steps = plan.len(), "plan cached");
                self.plan = Some(ActivePlan { id, plan });
                true
            }
            Err(e) => {
                tracing::warn!(plan = %id, error = %e, "rejecting invalid plan");
                false
            }
        }
    }

    /// Execute the cached plan against `root` and deliver the report.
    pub async fn run_pass(&mut self, root: &Value, implicit: bool) -> PassOutcome {
        let report = {
            let Some(active) = &self.plan else {
                return PassOutcome::NoPlan;
            };
            self.passes += 1;
            let ctx = ReportContext {
                plan_id: active.id.clone(),
                implicit,
                url: self.url.clone(),
                timestamp: Utc::now(),
            };
            nuggit::run_pass(&active.plan, &self.document, root, &ctx)
        };

        let Some(report) = report else {
            tracing::debug!(pass = self.passes, "nothing to report");
            return PassOutcome::Empty;
        };
        let count = report.results.len();
        match self.backend.exchange(&report).await {
            Ok(()) => {
                tracing::info!(pass = self.passes, results = count, "exchange delivered");
                PassOutcome::Reported(count)
            }
            Err(e) => {
                tracing::warn!(pass = self.passes, error = %e, "exchange failed");
                PassOutcome::Failed
            }
        }
    }

    /// Apply a batch of added subtrees to the document and return the added
    /// top-level nodes in record order.
    pub fn apply_mutations(&mut self, records: &[MutationRecord]) -> Vec<NodeId> {
        let mut added = Vec::new();
        for record in records {
            let parent = match &record.target {
                Some(selector) => match self.document.select_first(selector) {
                    Ok(Some(id)) => id,
                    Ok(None) => {
                        tracing::warn!(selector = %selector, "mutation target not found");
                        continue;
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "bad mutation target");
                        continue;
                    }
                },
                None => self.document.body().unwrap_or_else(|| self.document.root()),
            };
            match self.document.append_html(parent, &record.html) {
                Ok(nodes) => added.extend(nodes),
                Err(e) => tracing::warn!(error = %e, "could not apply mutation"),
            }
        }
        added
    }
}

impl std::fmt::Debug for PageSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageSession")
            .field("url", &self.url)
            .field("plan", &self.plan.as_ref().map(|p| p.id.as_str()))
            .field("passes", &self.passes)
            .finish()
    }
}
