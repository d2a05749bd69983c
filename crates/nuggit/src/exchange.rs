//! Selecting, casting and packaging exchanged step results.

use chrono::{DateTime, Utc};

use crate::document::Document;
use crate::executor::{execute, StepResults};
use crate::plan::CompiledPlan;
use crate::protocol::{ExchangeRequest, ExchangeTrigger, PipeResult};
use crate::value::{cast, is_zero, Value};

/// Context stamped on every report of a pass.
#[derive(Debug, Clone)]
pub struct ReportContext {
    pub plan_id: String,
    pub implicit: bool,
    pub url: String,
    pub timestamp: DateTime<Utc>,
}

/// Cast every exchange result and drop the zero ones, in step order.
pub fn collect_results(plan: &CompiledPlan, results: &StepResults) -> Vec<PipeResult> {
    let mut out = Vec::new();
    for &i in plan.exchanges() {
        let (Some(pipe), Some(value)) = (plan.pipe(i), results.get(i)) else {
            continue;
        };
        let result = cast(value, &pipe.scalar);
        if is_zero(&result, &pipe.scalar) {
            tracing::debug!(step = i, pipe = %pipe.id(), "dropping zero value");
            continue;
        }
        out.push(PipeResult {
            pipe: pipe.id(),
            result,
        });
    }
    out
}

/// Package results into a report. Returns `None` when there is nothing to
/// send, so the caller can skip the network entirely.
pub fn build_report(ctx: &ReportContext, results: Vec<PipeResult>) -> Option<ExchangeRequest> {
    if results.is_empty() {
        return None;
    }
    Some(ExchangeRequest {
        trigger: ExchangeTrigger {
            plan: ctx.plan_id.clone(),
            implicit: ctx.implicit,
            url: ctx.url.clone(),
            timestamp: ctx.timestamp,
        },
        results,
    })
}

/// One full pass: execute, collect, package. The result table is dropped
/// before returning, so no node handle escapes the pass.
pub fn run_pass(
    plan: &CompiledPlan,
    doc: &Document,
    root: &Value,
    ctx: &ReportContext,
) -> Option<ExchangeRequest> {
    let results = execute(plan, doc, root);
    build_report(ctx, collect_results(plan, &results))
}
