//! Chrome DevTools Protocol session for hmr
//!
//! Implements [`hmr_core::DebugSession`] on top of a CDP WebSocket, as
//! exposed by `node --inspect` and Chromium's remote debugging port:
//! - Endpoint parsing and target discovery (`/json/list`)
//! - Request/response correlation over one socket
//! - Script enumeration through `Debugger.enable`
//! - Live source replacement through `Debugger.setScriptSource`

pub mod endpoint;
pub mod protocol;
pub mod session;

pub use endpoint::{Endpoint, TargetInfo, DEFAULT_PORT};
pub use session::{CdpSession, DEFAULT_SETUP_TIMEOUT};

use thiserror::Error;

/// Errors while locating or connecting to a debug target
#[derive(Debug, Error)]
pub enum CdpError {
    #[error("invalid endpoint '{0}'")]
    InvalidEndpoint(String),

    #[error("failed to list debug targets: {0}")]
    Discovery(#[from] reqwest::Error),

    #[error("no debuggable target found at {0}")]
    NoTarget(String),

    #[error("websocket connection failed: {0}")]
    Connect(#[from] tokio_tungstenite::tungstenite::Error),

    #[error(transparent)]
    Remote(#[from] hmr_core::RemoteError),
}
