//! Wire types exchanged with the Nuggit backend.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

use crate::plan::Plan;

/// Body of `POST /api/trigger`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerRequest {
    pub trigger: TriggerCriteria,
}

/// What caused a plan request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerCriteria {
    /// True when the page load, not the user, caused the trigger.
    pub implicit: bool,
    pub url: String,
    pub timestamp: DateTime<Utc>,
}

impl TriggerRequest {
    pub fn new(implicit: bool, url: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            trigger: TriggerCriteria {
                implicit,
                url: url.into(),
                timestamp,
            },
        }
    }
}

/// Trigger record echoed by the backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TriggerInfo {
    #[serde(default)]
    pub id: String,
    /// Identity of the plan the trigger resolved to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<String>,
}

/// Response of `POST /api/trigger`. `{}` means the page has no plan.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TriggerResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger: Option<TriggerInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<Plan>,
}

impl TriggerResponse {
    /// Plan identity: the trigger's plan reference, else the trigger id.
    pub fn plan_id(&self) -> String {
        match &self.trigger {
            Some(TriggerInfo { plan: Some(p), .. }) => p.clone(),
            Some(t) => t.id.clone(),
            None => String::new(),
        }
    }

    /// Split into plan identity and plan, or `None` when there is nothing
    /// to run.
    pub fn into_plan(self) -> Option<(String, Plan)> {
        let id = self.plan_id();
        match self.plan {
            Some(plan) if !plan.is_empty() => Some((id, plan)),
            _ => None,
        }
    }
}

/// Trigger section of an exchange report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeTrigger {
    pub plan: String,
    pub implicit: bool,
    pub url: String,
    pub timestamp: DateTime<Utc>,
}

/// One reported value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipeResult {
    /// `name@digest` of the exchange step.
    pub pipe: String,
    pub result: Json,
}

/// Body of `POST /api/exchange`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeRequest {
    pub trigger: ExchangeTrigger,
    pub results: Vec<PipeResult>,
}

/// Error body the backend may attach to a non-success response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    #[serde(default)]
    pub reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_response_has_no_plan() {
        let resp: TriggerResponse = serde_json::from_value(json!({})).unwrap();
        assert!(resp.into_plan().is_none());
    }

    #[test]
    fn test_plan_id_prefers_plan_reference() {
        let resp: TriggerResponse = serde_json::from_value(json!({
            "trigger": {"id": "t-1", "plan": "p-9"},
            "plan": {"roots": [0], "steps": [{"action": {"action": "documentRoot"}}]}
        }))
        .unwrap();
        let (id, plan) = resp.into_plan().unwrap();
        assert_eq!(id, "p-9");
        assert_eq!(plan.steps.len(), 1);

        let bare: TriggerResponse =
            serde_json::from_value(json!({"trigger": {"id": "t-2"}})).unwrap();
        assert_eq!(bare.plan_id(), "t-2");
    }

    #[test]
    fn test_trigger_request_shape() {
        let ts = DateTime::parse_from_rfc3339("2024-05-01T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let req = TriggerRequest::new(true, "https://example.com/", ts);
        let v = serde_json::to_value(&req).unwrap();
        assert_eq!(v["trigger"]["implicit"], json!(true));
        assert_eq!(v["trigger"]["url"], json!("https://example.com/"));
        assert_eq!(v["trigger"]["timestamp"], json!("2024-05-01T10:00:00Z"));
    }
}
