//! Change aggregation and propagation engine for hmr
//!
//! This crate provides:
//! - File event data model (add / change / remove)
//! - Path identity mapping (local path -> canonical id)
//! - Script registry snapshot taken from the remote session
//! - Trailing-edge batch aggregation
//! - Concurrent update dispatch with per-item outcomes
//!
//! The remote debugger and the filesystem watcher live in their own crates;
//! this crate only sees them through [`DebugSession`] and [`FileEvent`].

pub mod config;
pub mod debounce;
pub mod dispatch;
pub mod event;
pub mod pathmap;
pub mod pipeline;
pub mod registry;
pub mod session;

// Re-exports
pub use config::EngineConfig;
pub use debounce::{Aggregator, BatchStream};
pub use dispatch::{BatchReport, Dispatcher, FailureReason, ItemReport, UpdateOutcome};
pub use event::{Batch, EventKind, FileEvent};
pub use pathmap::{CanonicalId, PathMapper};
pub use pipeline::PipelineStats;
pub use registry::{ScriptRecord, ScriptRegistry};
pub use session::{DebugSession, RemoteError, RemoteScript, ScriptId};

#[cfg(test)]
pub(crate) mod testing;
