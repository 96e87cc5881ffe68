//! CDP client session
//!
//! One WebSocket, two tasks: the writer drains an outgoing queue into the
//! socket, the reader correlates responses with pending requests by id and
//! collects `Debugger.scriptParsed` events while scripts are being listed.

use crate::protocol::{
    Incoming, Message, ProtocolError, Request, ScriptParsed, SetScriptSourceResult,
    DEBUGGER_ENABLE, DEBUGGER_SCRIPT_PARSED, DEBUGGER_SET_SCRIPT_SOURCE,
    DEBUGGER_SET_SKIP_ALL_PAUSES,
};
use crate::{CdpError, Endpoint};
use async_trait::async_trait;
use dashmap::DashMap;
use futures_util::{SinkExt, StreamExt};
use hmr_core::{DebugSession, RemoteError, RemoteScript, ScriptId};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message as Frame;
use tracing::{debug, trace, warn};

type Reply = Result<Value, ProtocolError>;

/// Bound on each setup command issued while listing scripts
pub const DEFAULT_SETUP_TIMEOUT: Duration = Duration::from_secs(10);

/// State shared between the session handle and its socket tasks
struct Shared {
    pending: DashMap<u64, oneshot::Sender<Reply>>,
    /// Set once the socket is gone, with the reason
    closed: Mutex<Option<String>>,
    /// `Some` while a script listing is in progress
    listing: Mutex<Option<Listing>>,
}

/// Scripts reported in answer to one `Debugger.enable`
struct Listing {
    enable_id: u64,
    scripts: Vec<RemoteScript>,
    /// The enable response arrived; later events are not part of the burst
    complete: bool,
}

impl Shared {
    fn new() -> Self {
        Self {
            pending: DashMap::new(),
            closed: Mutex::new(None),
            listing: Mutex::new(None),
        }
    }

    fn closed_reason(&self) -> Option<String> {
        self.closed.lock().clone()
    }

    /// Mark the session closed and fail everything in flight
    fn close(&self, reason: String) {
        {
            let mut closed = self.closed.lock();
            if closed.is_some() {
                return;
            }
            debug!(target: "hmr::remote", "Debugger connection closed: {}", reason);
            *closed = Some(reason);
        }

        // Dropping the senders wakes every waiter
        self.pending.clear();
    }

    fn handle_text(&self, text: &str) {
        let incoming: Incoming = match serde_json::from_str(text) {
            Ok(incoming) => incoming,
            Err(e) => {
                warn!(target: "hmr::remote", "Ignoring malformed frame: {}", e);
                return;
            }
        };

        match incoming.into_message() {
            Some(Message::Response { id, result }) => {
                if let Some(listing) = self.listing.lock().as_mut() {
                    if listing.enable_id == id {
                        listing.complete = true;
                    }
                }
                match self.pending.remove(&id) {
                    Some((_, tx)) => {
                        let _ = tx.send(result);
                    }
                    None => trace!(target: "hmr::remote", "Response {} has no waiter", id),
                }
            }
            Some(Message::Event { method, params }) if method == DEBUGGER_SCRIPT_PARSED => {
                let mut listing = self.listing.lock();
                let Some(listing) = listing.as_mut().filter(|l| !l.complete) else {
                    return;
                };
                match serde_json::from_value::<ScriptParsed>(params) {
                    Ok(script) => listing
                        .scripts
                        .push(RemoteScript::new(script.script_id, script.url)),
                    Err(e) => debug!(target: "hmr::remote", "Bad scriptParsed event: {}", e),
                }
            }
            Some(Message::Event { method, .. }) => {
                trace!(target: "hmr::remote", "Event {}", method);
            }
            None => {}
        }
    }
}

/// Removes a pending entry if the caller gives up (e.g. on timeout)
struct PendingGuard<'a> {
    shared: &'a Shared,
    id: u64,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.shared.pending.remove(&self.id);
    }
}

/// [`DebugSession`] over the Chrome DevTools Protocol
pub struct CdpSession {
    outgoing: mpsc::UnboundedSender<Frame>,
    shared: Arc<Shared>,
    next_id: AtomicU64,
    setup_timeout: Duration,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl CdpSession {
    /// Connect to a debugger WebSocket url
    pub async fn connect(url: &str) -> Result<Self, CdpError> {
        debug!(target: "hmr::remote", "Connecting to {}", url);
        let (socket, _) = tokio_tungstenite::connect_async(url).await?;
        let (mut sink, mut stream) = socket.split();

        let shared = Arc::new(Shared::new());
        let (outgoing, mut queue) = mpsc::unbounded_channel::<Frame>();

        let writer = {
            let shared = Arc::clone(&shared);
            tokio::spawn(async move {
                while let Some(frame) = queue.recv().await {
                    if let Err(e) = sink.send(frame).await {
                        shared.close(e.to_string());
                        return;
                    }
                }
                let _ = sink.close().await;
            })
        };

        let reader = {
            let shared = Arc::clone(&shared);
            tokio::spawn(async move {
                let mut reason = "socket closed by remote".to_string();
                while let Some(frame) = stream.next().await {
                    match frame {
                        Ok(Frame::Text(text)) => shared.handle_text(&text),
                        Ok(Frame::Close(_)) => break,
                        Ok(_) => {}
                        Err(e) => {
                            reason = e.to_string();
                            break;
                        }
                    }
                }
                shared.close(reason);
            })
        };

        Ok(Self {
            outgoing,
            shared,
            next_id: AtomicU64::new(1),
            setup_timeout: DEFAULT_SETUP_TIMEOUT,
            reader,
            writer,
        })
    }

    /// Resolve the endpoint and connect to the selected target
    pub async fn connect_endpoint(endpoint: &Endpoint) -> Result<Self, CdpError> {
        let url = endpoint.resolve().await?;
        Self::connect(&url).await
    }

    /// Bound `Debugger.enable` and the other setup commands
    pub fn with_setup_timeout(mut self, timeout: Duration) -> Self {
        self.setup_timeout = timeout;
        self
    }

    /// Whether the socket is gone
    pub fn is_closed(&self) -> bool {
        self.shared.closed_reason().is_some()
    }

    /// Requests sent and still waiting for a response
    pub fn pending_requests(&self) -> usize {
        self.shared.pending.len()
    }

    /// Send a command and wait for its response
    ///
    /// The outer error is transport loss; the inner one is the remote's
    /// error response.
    async fn call(&self, method: &str, params: Value) -> Result<Reply, RemoteError> {
        self.call_with_id(self.next_id(), method, params).await
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    async fn call_with_id(
        &self,
        id: u64,
        method: &str,
        params: Value,
    ) -> Result<Reply, RemoteError> {
        let (tx, rx) = oneshot::channel();

        // Register before checking `closed` so `Shared::close` cannot miss us
        self.shared.pending.insert(id, tx);
        let _guard = PendingGuard {
            shared: &self.shared,
            id,
        };

        if let Some(reason) = self.shared.closed_reason() {
            return Err(RemoteError::ConnectionLost(reason));
        }

        let text = serde_json::to_string(&Request { id, method, params })
            .map_err(|e| RemoteError::Protocol(e.to_string()))?;
        trace!(target: "hmr::remote", "-> {} {}", id, method);

        if self.outgoing.send(Frame::Text(text)).is_err() {
            return Err(self.connection_lost());
        }

        rx.await.map_err(|_| self.connection_lost())
    }

    /// `call_with_id` limited by the setup timeout
    async fn setup_call(
        &self,
        id: u64,
        method: &str,
        params: Value,
    ) -> Result<Reply, RemoteError> {
        match tokio::time::timeout(self.setup_timeout, self.call_with_id(id, method, params)).await
        {
            Ok(reply) => reply,
            Err(_) => Err(RemoteError::Protocol(format!(
                "{} got no response within {:?}",
                method, self.setup_timeout
            ))),
        }
    }

    fn connection_lost(&self) -> RemoteError {
        let reason = self
            .shared
            .closed_reason()
            .unwrap_or_else(|| "socket closed".to_string());
        RemoteError::ConnectionLost(reason)
    }
}

impl Drop for CdpSession {
    fn drop(&mut self) {
        self.reader.abort();
        self.writer.abort();
    }
}

#[async_trait]
impl DebugSession for CdpSession {
    /// Enables the debugger and gathers the `scriptParsed` burst it triggers
    ///
    /// The runtime reports every loaded script before answering
    /// `Debugger.enable`, so the listing is complete once the response
    /// arrives. Calling this on an already enabled session yields only the
    /// scripts the runtime chooses to report again.
    async fn list_scripts(&self) -> Result<Vec<RemoteScript>, RemoteError> {
        let enable_id = self.next_id();
        *self.shared.listing.lock() = Some(Listing {
            enable_id,
            scripts: Vec::new(),
            complete: false,
        });
        let reply = self.setup_call(enable_id, DEBUGGER_ENABLE, json!({})).await;
        let scripts = self
            .shared
            .listing
            .lock()
            .take()
            .map(|l| l.scripts)
            .unwrap_or_default();

        reply?.map_err(|e| RemoteError::Protocol(e.to_string()))?;
        debug!(target: "hmr::remote", "Runtime reported {} scripts", scripts.len());

        // Attaching must not stop the program on `debugger;` statements
        let skip_id = self.next_id();
        match self
            .setup_call(skip_id, DEBUGGER_SET_SKIP_ALL_PAUSES, json!({ "skip": true }))
            .await
        {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => warn!(target: "hmr::remote", "Could not disable pauses: {}", e),
            Err(e) => return Err(e),
        }

        Ok(scripts)
    }

    async fn set_source(&self, script_id: &ScriptId, source: &str) -> Result<(), RemoteError> {
        let params = json!({
            "scriptId": script_id.as_str(),
            "scriptSource": source,
        });

        let value = self
            .call(DEBUGGER_SET_SCRIPT_SOURCE, params)
            .await?
            .map_err(|e| RemoteError::Rejected(e.to_string()))?;

        let result: Option<SetScriptSourceResult> =
            serde_json::from_value(value).map_err(|e| RemoteError::Protocol(e.to_string()))?;

        result
            .unwrap_or_default()
            .check()
            .map_err(RemoteError::Rejected)
    }
}
