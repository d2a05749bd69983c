//! Page sessions and the host message loop.

pub mod debounce;
pub mod page;
pub mod runner;

pub use debounce::Debouncer;
pub use page::{ActivePlan, PageSession, PassOutcome, SessionState};
pub use runner::{run_agent, serve_page, watch, Page, RunSummary, WatchExit};
