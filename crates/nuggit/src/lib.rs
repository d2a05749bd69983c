//! Nuggit: plan execution engine for extracting structured data from HTML pages.

pub mod action;
pub mod document;
pub mod error;
pub mod exchange;
pub mod executor;
pub mod plan;
pub mod protocol;
pub mod value;

pub use action::{Action, ActionSpec};
pub use document::{Document, NodeId};
pub use error::{NuggitError, NuggitResult};
pub use exchange::{build_report, collect_results, run_pass, ReportContext};
pub use executor::{execute, StepKind, StepResults};
pub use plan::{CompiledPlan, Pipe, Plan, Step};
pub use protocol::*;
pub use value::{cast, is_zero, normalize, ScalarKind, Value};
