//! Backend access: plan negotiation, exchange reports, reachability.

pub mod http;

use async_trait::async_trait;

use nuggit::{ExchangeRequest, TriggerRequest, TriggerResponse};

use crate::types::AgentResult;

pub use http::HttpBackend;

/// The three backend calls a page session makes.
///
/// Every call is attempted once. Callers log failures and carry on.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Reachability probe, consulted once before any trigger logic.
    async fn status(&self) -> AgentResult<()>;

    /// Ask for the plan that applies to a page. A response without a plan
    /// means the page is not tracked.
    async fn trigger(&self, request: &TriggerRequest) -> AgentResult<TriggerResponse>;

    /// Deliver the results of one pass.
    async fn exchange(&self, report: &ExchangeRequest) -> AgentResult<()>;
}
