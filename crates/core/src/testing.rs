//! In-memory debug session for unit tests

use crate::session::{DebugSession, RemoteError, RemoteScript, ScriptId};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::time::Duration;

/// Scriptable fake of a remote debug session
///
/// Records every `set_source` call and the start/finish order of calls.
#[derive(Default)]
pub(crate) struct FakeSession {
    scripts: Mutex<Vec<RemoteScript>>,
    unreachable: bool,
    failures: Mutex<HashMap<ScriptId, RemoteError>>,
    hanging: Mutex<HashSet<ScriptId>>,
    latency: Mutex<Option<Duration>>,
    calls: Mutex<Vec<(ScriptId, String)>>,
    journal: Mutex<Vec<String>>,
}

impl FakeSession {
    pub fn with_scripts(scripts: Vec<RemoteScript>) -> Self {
        Self {
            scripts: Mutex::new(scripts),
            ..Default::default()
        }
    }

    pub fn unreachable() -> Self {
        Self {
            unreachable: true,
            ..Default::default()
        }
    }

    pub fn push_script(&self, script: RemoteScript) {
        self.scripts.lock().push(script);
    }

    /// Make every update of `script_id` fail with `error`
    pub fn fail(&self, script_id: &str, error: RemoteError) {
        self.failures.lock().insert(ScriptId::new(script_id), error);
    }

    /// Make every update of `script_id` never complete
    pub fn hang(&self, script_id: &str) {
        self.hanging.lock().insert(ScriptId::new(script_id));
    }

    /// Delay each update by `latency`
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock() = Some(latency);
    }

    pub fn calls(&self) -> Vec<(ScriptId, String)> {
        self.calls.lock().clone()
    }

    /// `start:<id>` / `end:<id>` markers in the order they happened
    pub fn journal(&self) -> Vec<String> {
        self.journal.lock().clone()
    }
}

#[async_trait]
impl DebugSession for FakeSession {
    async fn list_scripts(&self) -> Result<Vec<RemoteScript>, RemoteError> {
        if self.unreachable {
            return Err(RemoteError::ConnectionLost("connection refused".to_string()));
        }
        Ok(self.scripts.lock().clone())
    }

    async fn set_source(&self, script_id: &ScriptId, source: &str) -> Result<(), RemoteError> {
        self.journal.lock().push(format!("start:{}", script_id));
        self.calls.lock().push((script_id.clone(), source.to_string()));

        let hang = self.hanging.lock().contains(script_id);
        if hang {
            std::future::pending::<()>().await;
        }

        let latency = *self.latency.lock();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        self.journal.lock().push(format!("end:{}", script_id));

        match self.failures.lock().get(script_id) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}
