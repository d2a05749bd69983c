//! Extraction plans and their compiled form.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::action::{Action, ActionSpec};
use crate::error::{NuggitError, NuggitResult};
use crate::value::ScalarKind;

/// One step of a plan.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub action: ActionSpec,
    /// 1-based index of the step whose result feeds this one. Ignored for
    /// root steps.
    #[serde(default)]
    pub input: usize,
}

/// A plan as issued by the backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    #[serde(default)]
    pub roots: Vec<usize>,
    #[serde(default)]
    pub exchanges: Vec<usize>,
    #[serde(default)]
    pub steps: Vec<Step>,
}

impl Plan {
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Check index sets and step references.
    ///
    /// Every non-root step must reference an earlier step, which rules out
    /// forward references and cycles.
    pub fn validate(&self) -> NuggitResult<()> {
        let n = self.steps.len();
        if let Some(&bad) = self.roots.iter().find(|&&r| r >= n) {
            return Err(NuggitError::InvalidPlan(format!(
                "root index {bad} out of range for {n} steps"
            )));
        }
        if let Some(&bad) = self.exchanges.iter().find(|&&e| e >= n) {
            return Err(NuggitError::InvalidPlan(format!(
                "exchange index {bad} out of range for {n} steps"
            )));
        }
        let roots: BTreeSet<usize> = self.roots.iter().copied().collect();
        for (i, step) in self.steps.iter().enumerate() {
            if roots.contains(&i) {
                continue;
            }
            if step.input == 0 || step.input > i {
                return Err(NuggitError::InvalidPlan(format!(
                    "step {i} references input {} which is not an earlier step",
                    step.input
                )));
            }
        }
        Ok(())
    }
}

/// Reporting identity and wire type of an exchanged value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pipe {
    pub name: String,
    pub digest: String,
    pub scalar: ScalarKind,
}

impl Pipe {
    fn from_spec(spec: &ActionSpec) -> NuggitResult<Self> {
        let name = spec.name.clone().ok_or(NuggitError::MissingField {
            action: "exchange",
            field: "name",
        })?;
        let digest = spec.digest.clone().ok_or(NuggitError::MissingField {
            action: "exchange",
            field: "digest",
        })?;
        Ok(Self {
            name,
            digest,
            scalar: ScalarKind::from_name(spec.scalar.as_deref().unwrap_or("")),
        })
    }

    /// `name@digest`.
    pub fn id(&self) -> String {
        format!("{}@{}", self.name, self.digest)
    }
}

/// Where a step reads its input from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    /// The externally supplied root (document or mutated subtree).
    Root,
    /// The result of an earlier step, 0-based.
    Step(usize),
}

/// What a step does once its input is available.
#[derive(Debug, Clone)]
pub enum Program {
    Action(Action),
    Exchange(Pipe),
}

/// A step with its program built and its input resolved.
#[derive(Debug, Clone)]
pub struct CompiledStep {
    pub source: Source,
    /// Construction result; an error disables this step and its dependents.
    pub program: NuggitResult<Program>,
}

/// A validated plan with every action constructed once.
#[derive(Debug, Clone)]
pub struct CompiledPlan {
    plan: Plan,
    steps: Vec<CompiledStep>,
    exchanges: Vec<usize>,
}

impl CompiledPlan {
    /// Validate `plan` and build its steps.
    ///
    /// Structural errors reject the whole plan. Construction errors are kept
    /// per step so independent chains still run.
    pub fn compile(plan: Plan) -> NuggitResult<Self> {
        plan.validate()?;
        let roots: BTreeSet<usize> = plan.roots.iter().copied().collect();
        let exchanges: BTreeSet<usize> = plan.exchanges.iter().copied().collect();

        let steps = plan
            .steps
            .iter()
            .enumerate()
            .map(|(i, step)| {
                let source = if roots.contains(&i) {
                    Source::Root
                } else {
                    Source::Step(step.input - 1)
                };
                let program = if exchanges.contains(&i) {
                    Pipe::from_spec(&step.action).map(Program::Exchange)
                } else if step.action.action == "exchange" {
                    Err(NuggitError::InvalidPlan(format!(
                        "step {i} is an exchange but is not listed in exchanges"
                    )))
                } else {
                    Action::from_spec(&step.action).map(Program::Action)
                };
                if let Err(e) = &program {
                    tracing::warn!(step = i, error = %e, "step failed to build");
                }
                CompiledStep { source, program }
            })
            .collect();

        Ok(Self {
            plan,
            steps,
            exchanges: exchanges.into_iter().collect(),
        })
    }

    pub fn plan(&self) -> &Plan {
        &self.plan
    }

    pub fn steps(&self) -> &[CompiledStep] {
        &self.steps
    }

    /// Exchange step indices in ascending order.
    pub fn exchanges(&self) -> &[usize] {
        &self.exchanges
    }

    /// The pipe of an exchange step, if it built.
    pub fn pipe(&self, index: usize) -> Option<&Pipe> {
        match self.steps.get(index).map(|s| &s.program) {
            Some(Ok(Program::Exchange(pipe))) => Some(pipe),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}
