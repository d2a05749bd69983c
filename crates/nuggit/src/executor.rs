//! Sequential plan execution.
//!
//! Steps run strictly in index order. A plan's compile step guarantees every
//! input refers to an earlier index, so a single forward pass is enough.

use crate::document::Document;
use crate::plan::{CompiledPlan, Program, Source};
use crate::value::{normalize, Value};

/// Classification of a step within a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    Root,
    Exchange,
    Regular,
}

/// Per-pass result table, index-aligned with the plan's steps.
#[derive(Debug, Default)]
pub struct StepResults {
    values: Vec<Option<Value>>,
    failed: Vec<bool>,
}

impl StepResults {
    fn with_len(n: usize) -> Self {
        Self {
            values: vec![None; n],
            failed: vec![false; n],
        }
    }

    /// Result of step `i`, unset if it never ran.
    pub fn get(&self, i: usize) -> Option<&Value> {
        self.values.get(i).and_then(Option::as_ref)
    }

    /// Whether step `i` was skipped because it, or a step it depends on,
    /// failed to build.
    pub fn is_failed(&self, i: usize) -> bool {
        self.failed.get(i).copied().unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Kind of step `i` in `plan`.
pub fn step_kind(plan: &CompiledPlan, i: usize) -> StepKind {
    match plan.steps().get(i).map(|s| (&s.program, s.source)) {
        Some((Ok(Program::Exchange(_)), _)) => StepKind::Exchange,
        Some((_, Source::Root)) => StepKind::Root,
        _ => StepKind::Regular,
    }
}

/// Run every step of `plan` against `doc`, feeding `root` to root steps.
pub fn execute(plan: &CompiledPlan, doc: &Document, root: &Value) -> StepResults {
    let mut results = StepResults::with_len(plan.len());
    let unset = Value::Null;

    for (i, step) in plan.steps().iter().enumerate() {
        let program = match &step.program {
            Ok(p) => p,
            Err(e) => {
                tracing::debug!(step = i, error = %e, "skipping step that failed to build");
                results.failed[i] = true;
                continue;
            }
        };

        let input = match step.source {
            Source::Root => root,
            Source::Step(j) if results.failed[j] => {
                tracing::debug!(step = i, input = j, "skipping step downstream of a failure");
                results.failed[i] = true;
                continue;
            }
            Source::Step(j) => results.values[j].as_ref().unwrap_or(&unset),
        };

        let out = match program {
            Program::Exchange(pipe) => {
                tracing::debug!(step = i, pipe = %pipe.id(), "normalizing exchange value");
                normalize(doc, input)
            }
            Program::Action(action) => {
                tracing::debug!(step = i, action = action.tag(), "executing step");
                action.execute(doc, input)
            }
        };
        results.values[i] = Some(out);
    }

    results
}
