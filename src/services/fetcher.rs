//! VAST 拉取
//!
//! ureq 是同步客户端，请求放在 `spawn_blocking` 中执行。
//! 每次调用都有独立的整体超时，重定向最多 3 跳，TLS 证书校验始终开启。

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, trace};
use ureq::Agent;
use url::Url;

use crate::vast::{VastDocument, VastParseError};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("unreachable: {0}")]
    Unreachable(String),
    #[error("invalid VAST: {0}")]
    InvalidVast(#[from] VastParseError),
}

#[async_trait]
pub trait VastFetcher: Send + Sync {
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<VastDocument, FetchError>;
}

/// 只接受带 host 的 http / https 地址
pub fn validate_url(raw: &str) -> Result<Url, FetchError> {
    let url = Url::parse(raw.trim()).map_err(|e| FetchError::InvalidUrl(format!("{}: {}", raw, e)))?;
    match url.scheme() {
        "http" | "https" if url.host_str().is_some_and(|h| !h.is_empty()) => Ok(url),
        _ => Err(FetchError::InvalidUrl(raw.to_string())),
    }
}

pub struct HttpVastFetcher {
    agent: Agent,
    user_agent: String,
}

impl HttpVastFetcher {
    pub fn new(user_agent: &str) -> Self {
        let agent: Agent = Agent::config_builder()
            .max_redirects(3)
            .http_status_as_error(false)
            .build()
            .into();

        Self {
            agent,
            user_agent: user_agent.to_string(),
        }
    }

    fn fetch_sync(
        agent: Agent,
        user_agent: String,
        url: Url,
        timeout: Duration,
    ) -> Result<String, FetchError> {
        let mut resp = agent
            .get(url.as_str())
            .header("User-Agent", &user_agent)
            .header("Accept", "application/xml, text/xml")
            .config()
            .timeout_global(Some(timeout))
            .build()
            .call()
            .map_err(|e| FetchError::Unreachable(format!("{}: {}", url, e)))?;

        let status = resp.status().as_u16();
        if status != 200 {
            return Err(FetchError::Unreachable(format!(
                "{} returned HTTP {}",
                url, status
            )));
        }

        resp.body_mut()
            .read_to_string()
            .map_err(|e| FetchError::Unreachable(format!("{}: body read failed: {}", url, e)))
    }
}

#[async_trait]
impl VastFetcher for HttpVastFetcher {
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<VastDocument, FetchError> {
        let parsed = validate_url(url)?;
        trace!("Fetching VAST from {}", parsed);

        let agent = self.agent.clone();
        let user_agent = self.user_agent.clone();
        let body = tokio::task::spawn_blocking(move || {
            Self::fetch_sync(agent, user_agent, parsed, timeout)
        })
        .await
        .map_err(|e| FetchError::Unreachable(format!("fetch task failed: {}", e)))??;

        let doc = VastDocument::parse(&body)?;
        debug!("Fetched valid VAST from {} ({} bytes)", url, body.len());
        Ok(doc)
    }
}
