//! Backend client over HTTP.

use std::time::Duration;

use async_trait::async_trait;
use url::Url;

use nuggit::{ErrorResponse, ExchangeRequest, TriggerRequest, TriggerResponse};

use super::Backend;
use crate::config::AgentConfig;
use crate::types::{AgentError, AgentResult};

const STATUS_PATH: &str = "api/status";
const TRIGGER_PATH: &str = "api/trigger";
const EXCHANGE_PATH: &str = "api/exchange";

/// `Backend` implementation talking JSON to the Nuggit server.
#[derive(Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    status_url: Url,
    trigger_url: Url,
    exchange_url: Url,
}

impl HttpBackend {
    pub fn new(config: &AgentConfig) -> AgentResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("nuggit-agent/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            status_url: config.endpoint(STATUS_PATH)?,
            trigger_url: config.endpoint(TRIGGER_PATH)?,
            exchange_url: config.endpoint(EXCHANGE_PATH)?,
        })
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn status(&self) -> AgentResult<()> {
        let resp = self.client.get(self.status_url.clone()).send().await?;
        check_status(resp).await.map(|_| ())
    }

    async fn trigger(&self, request: &TriggerRequest) -> AgentResult<TriggerResponse> {
        let resp = self
            .client
            .post(self.trigger_url.clone())
            .json(request)
            .send()
            .await?;
        let body = check_status(resp).await?.text().await?;
        if body.trim().is_empty() {
            return Ok(TriggerResponse::default());
        }
        Ok(serde_json::from_str(&body)?)
    }

    async fn exchange(&self, report: &ExchangeRequest) -> AgentResult<()> {
        let resp = self
            .client
            .post(self.exchange_url.clone())
            .json(report)
            .send()
            .await?;
        check_status(resp).await.map(|_| ())
    }
}

/// Turn a non-success response into `AgentError::Status`, reading the
/// backend's `reason` when the body carries one.
async fn check_status(resp: reqwest::Response) -> AgentResult<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let reason = resp
        .text()
        .await
        .ok()
        .and_then(|body| serde_json::from_str::<ErrorResponse>(&body).ok())
        .and_then(|e| e.reason);
    Err(AgentError::Status {
        status: status.as_u16(),
        reason,
    })
}

/// Fetch a page's markup for the `run` command.
pub async fn fetch_page(url: &Url, timeout: Duration) -> AgentResult<String> {
    let client = reqwest::Client::builder()
        .timeout(timeout)
        .redirect(reqwest::redirect::Policy::limited(5))
        .build()?;
    let resp = client.get(url.clone()).send().await?;
    let status = resp.status();
    if !status.is_success() {
        return Err(AgentError::Status {
            status: status.as_u16(),
            reason: None,
        });
    }
    Ok(resp.text().await?)
}
