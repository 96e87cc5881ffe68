//! CDP wire messages
//!
//! Only the handful of commands and events hmr needs are modelled.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

pub const DEBUGGER_ENABLE: &str = "Debugger.enable";
pub const DEBUGGER_SET_SKIP_ALL_PAUSES: &str = "Debugger.setSkipAllPauses";
pub const DEBUGGER_SET_SCRIPT_SOURCE: &str = "Debugger.setScriptSource";
pub const DEBUGGER_SCRIPT_PARSED: &str = "Debugger.scriptParsed";

/// Outgoing command
#[derive(Debug, Serialize)]
pub struct Request<'a> {
    pub id: u64,
    pub method: &'a str,
    pub params: Value,
}

/// Any incoming frame: a response (has `id`) or an event (has `method`)
#[derive(Debug, Deserialize)]
pub struct Incoming {
    pub id: Option<u64>,
    pub method: Option<String>,
    #[serde(default)]
    pub params: Value,
    pub result: Option<Value>,
    pub error: Option<ProtocolError>,
}

/// Error object of a failed command
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProtocolError {
    pub code: i64,
    pub message: String,
    #[serde(default)]
    pub data: Option<Value>,
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.data {
            Some(Value::String(data)) => write!(f, "{} ({})", self.message, data),
            Some(Value::Null) | None => f.write_str(&self.message),
            Some(data) => write!(f, "{} ({})", self.message, data),
        }
    }
}

/// Incoming frame after classification
#[derive(Debug)]
pub enum Message {
    Response {
        id: u64,
        result: Result<Value, ProtocolError>,
    },
    Event {
        method: String,
        params: Value,
    },
}

impl Incoming {
    /// Classify the frame; `None` for frames that are neither
    pub fn into_message(self) -> Option<Message> {
        match (self.id, self.method) {
            (Some(id), _) => {
                let result = match self.error {
                    Some(error) => Err(error),
                    None => Ok(self.result.unwrap_or(Value::Null)),
                };
                Some(Message::Response { id, result })
            }
            (None, Some(method)) => Some(Message::Event {
                method,
                params: self.params,
            }),
            (None, None) => None,
        }
    }
}

/// `Debugger.scriptParsed` event parameters
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptParsed {
    pub script_id: String,
    #[serde(default)]
    pub url: String,
}

/// `Debugger.setScriptSource` result
///
/// Older runtimes report compile errors only through `exceptionDetails`;
/// newer ones also set `status`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetScriptSourceResult {
    pub status: Option<String>,
    pub exception_details: Option<ExceptionDetails>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExceptionDetails {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub line_number: u32,
    #[serde(default)]
    pub column_number: u32,
    pub exception: Option<RemoteObject>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RemoteObject {
    pub description: Option<String>,
}

impl SetScriptSourceResult {
    /// `Err` with a readable reason when the runtime refused the new source
    pub fn check(&self) -> Result<(), String> {
        if let Some(details) = &self.exception_details {
            let text = details
                .exception
                .as_ref()
                .and_then(|e| e.description.clone())
                .unwrap_or_else(|| details.text.clone());
            // CDP positions are zero-based
            return Err(format!(
                "{} at {}:{}",
                text,
                details.line_number + 1,
                details.column_number + 1
            ));
        }

        match self.status.as_deref() {
            None | Some("Ok") => Ok(()),
            Some(status) => Err(status.to_string()),
        }
    }
}
