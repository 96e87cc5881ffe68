//! Debug endpoint parsing and target discovery

use crate::CdpError;
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;
use tracing::debug;
use url::Url;

/// Default remote debugging port (`--inspect`, `--remote-debugging-port`)
pub const DEFAULT_PORT: u16 = 9222;

/// Where to find the remote debugger
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// HTTP discovery endpoint; the socket url is read from `/json/list`
    Http { host: String, port: u16 },
    /// Explicit debugger socket url
    WebSocket(String),
}

impl FromStr for Endpoint {
    type Err = CdpError;

    /// Accepts `ws://...`/`wss://...`, `host[:port]`, `http://host[:port]`
    /// or a bare port (taken as localhost).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let invalid = || CdpError::InvalidEndpoint(s.to_string());

        if s.is_empty() {
            return Err(invalid());
        }

        if let Ok(port) = s.parse::<u16>() {
            return Ok(Endpoint::Http {
                host: "127.0.0.1".to_string(),
                port,
            });
        }

        if s.starts_with("ws://") || s.starts_with("wss://") {
            Url::parse(s).map_err(|_| invalid())?;
            return Ok(Endpoint::WebSocket(s.to_string()));
        }

        let with_scheme = if s.contains("://") {
            s.to_string()
        } else {
            format!("http://{}", s)
        };
        let url = Url::parse(&with_scheme).map_err(|_| invalid())?;
        if url.scheme() != "http" {
            return Err(invalid());
        }
        let host = url.host_str().ok_or_else(invalid)?.to_string();

        Ok(Endpoint::Http {
            host,
            port: url.port().unwrap_or(DEFAULT_PORT),
        })
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Http { host, port } => write!(f, "{}:{}", host, port),
            Endpoint::WebSocket(url) => f.write_str(url),
        }
    }
}

impl Endpoint {
    /// Resolve to the debugger socket url
    pub async fn resolve(&self) -> Result<String, CdpError> {
        match self {
            Endpoint::WebSocket(url) => Ok(url.clone()),
            Endpoint::Http { host, port } => {
                let list_url = format!("http://{}:{}/json/list", host, port);
                debug!(target: "hmr::remote", "Listing debug targets at {}", list_url);

                let targets: Vec<TargetInfo> = reqwest::get(&list_url)
                    .await?
                    .error_for_status()?
                    .json()
                    .await?;

                let target = select_target(&targets)
                    .ok_or_else(|| CdpError::NoTarget(self.to_string()))?;
                debug!(
                    target: "hmr::remote",
                    "Selected {} target '{}' ({})",
                    target.kind,
                    target.title,
                    target.id
                );

                target
                    .web_socket_debugger_url
                    .clone()
                    .ok_or_else(|| CdpError::NoTarget(self.to_string()))
            }
        }
    }
}

/// One entry of the `/json/list` response
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetInfo {
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    /// Absent when another client is already attached
    pub web_socket_debugger_url: Option<String>,
}

/// Pick the target to attach to: node first, then page, then anything
pub fn select_target(targets: &[TargetInfo]) -> Option<&TargetInfo> {
    let attachable = || targets.iter().filter(|t| t.web_socket_debugger_url.is_some());

    attachable()
        .find(|t| t.kind == "node")
        .or_else(|| attachable().find(|t| t.kind == "page"))
        .or_else(|| attachable().next())
}
