//! Nuggit page agent: negotiates plans with the backend, runs them against
//! a page and its mutations, and reports the exchanged results.

pub mod backend;
pub mod config;
pub mod offline;
pub mod session;
pub mod transport;
pub mod types;

pub use backend::{Backend, HttpBackend};
pub use config::{AgentConfig, ConfigOverrides};
pub use session::{run_agent, Page, PageSession, RunSummary};
pub use transport::StdioTransport;
pub use types::{AgentError, AgentResult, HostMessage, MutationRecord};
