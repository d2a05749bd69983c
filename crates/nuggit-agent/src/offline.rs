//! Offline extraction: run a plan file against a saved page, no backend.

use std::path::Path;

use chrono::Utc;

use nuggit::{CompiledPlan, Document, ExchangeRequest, Plan, ReportContext, TriggerResponse, Value};

use crate::types::{AgentError, AgentResult};

/// Id reported for plans loaded without a backend trigger record.
pub const OFFLINE_PLAN_ID: &str = "offline";

/// Parse a plan document. Accepts either a bare plan or a full trigger
/// response as saved from the backend.
pub fn parse_plan(json: &str) -> AgentResult<(String, Plan)> {
    let value: serde_json::Value = serde_json::from_str(json)?;
    if value.get("steps").is_some() {
        return Ok((OFFLINE_PLAN_ID.to_string(), serde_json::from_value(value)?));
    }
    let response: TriggerResponse = serde_json::from_value(value)?;
    response
        .into_plan()
        .ok_or_else(|| AgentError::Config("plan file contains no steps".to_string()))
}

/// Execute `plan_json` against `html` once. Returns the report the agent
/// would have sent, or `None` when every exchange value was zero.
pub fn extract(plan_json: &str, html: &str, url: &str) -> AgentResult<Option<ExchangeRequest>> {
    let (plan_id, plan) = parse_plan(plan_json)?;
    let plan = CompiledPlan::compile(plan)?;
    let doc = Document::parse(html);
    let ctx = ReportContext {
        plan_id,
        implicit: false,
        url: url.to_string(),
        timestamp: Utc::now(),
    };
    Ok(nuggit::run_pass(&plan, &doc, &Value::Node(doc.root()), &ctx))
}

/// [`extract`] over files on disk.
pub async fn extract_files(
    plan_path: &Path,
    html_path: &Path,
    url: &str,
) -> AgentResult<Option<ExchangeRequest>> {
    let plan_json = tokio::fs::read_to_string(plan_path).await?;
    let html = tokio::fs::read_to_string(html_path).await?;
    extract(&plan_json, &html, url)
}
