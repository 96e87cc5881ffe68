//! Remote debug session interface
//!
//! The engine only needs two things from the remote side: the list of
//! scripts it has already loaded, and a way to replace one script's source.

use async_trait::async_trait;
use std::fmt;
use thiserror::Error;

/// Opaque handle the remote side uses for a loaded script
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScriptId(String);

impl ScriptId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ScriptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A script as enumerated by the remote session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteScript {
    pub script_id: ScriptId,
    pub url: String,
}

impl RemoteScript {
    pub fn new(script_id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            script_id: ScriptId::new(script_id),
            url: url.into(),
        }
    }
}

/// Errors reported by the remote session
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemoteError {
    /// Transport is gone; no further calls can succeed
    #[error("connection to remote debugger lost: {0}")]
    ConnectionLost(String),

    /// Remote refused the edit (syntax error, incompatible live change, ...)
    #[error("remote rejected update: {0}")]
    Rejected(String),

    /// Malformed or unexpected protocol traffic
    #[error("remote protocol error: {0}")]
    Protocol(String),
}

impl RemoteError {
    pub fn is_connection_lost(&self) -> bool {
        matches!(self, RemoteError::ConnectionLost(_))
    }
}

/// An already-connected remote debugging session
#[async_trait]
pub trait DebugSession: Send + Sync {
    /// Enumerate scripts the remote side has parsed so far
    async fn list_scripts(&self) -> Result<Vec<RemoteScript>, RemoteError>;

    /// Replace the source of a loaded script
    async fn set_source(&self, script_id: &ScriptId, source: &str) -> Result<(), RemoteError>;
}
