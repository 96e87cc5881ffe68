//! Script registry
//!
//! Snapshot of the scripts the remote session had loaded when we connected,
//! keyed by canonical id. Built once and never modified afterwards; scripts
//! the remote loads later are not tracked.

use crate::pathmap::{CanonicalId, PathMapper};
use crate::session::{DebugSession, RemoteError, RemoteScript, ScriptId};
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

/// A remote script resolved to its canonical id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptRecord {
    /// Remote handle used to address the script
    pub script_id: ScriptId,
    /// Identity matched against local paths
    pub canonical_id: CanonicalId,
    /// Url as reported by the remote side
    pub url: String,
}

/// Read-only index of remote scripts by canonical id
#[derive(Debug, Default)]
pub struct ScriptRegistry {
    scripts: HashMap<CanonicalId, ScriptRecord>,
}

impl ScriptRegistry {
    /// Populate the registry from the session's current script list
    ///
    /// Must run once, before any batch is dispatched. An error here means the
    /// engine cannot operate at all.
    pub async fn load(
        session: &dyn DebugSession,
        remote_root: Option<&str>,
    ) -> Result<Self, RemoteError> {
        let scripts = session.list_scripts().await?;
        let total = scripts.len();
        let registry = Self::from_scripts(scripts, remote_root);

        debug!(
            target: "hmr::remote",
            "Loaded {} scripts ({} addressable)",
            total,
            registry.len()
        );

        Ok(registry)
    }

    /// Build a registry from an already-fetched script list
    ///
    /// Scripts without a file identity are skipped. When two scripts share an
    /// id, the later one wins.
    pub fn from_scripts(
        scripts: impl IntoIterator<Item = RemoteScript>,
        remote_root: Option<&str>,
    ) -> Self {
        let mut map = HashMap::new();

        for script in scripts {
            let Some(canonical_id) = CanonicalId::from_remote_url(&script.url, remote_root) else {
                continue;
            };

            let record = ScriptRecord {
                script_id: script.script_id,
                canonical_id: canonical_id.clone(),
                url: script.url,
            };

            if let Some(previous) = map.insert(canonical_id, record) {
                debug!(
                    target: "hmr::remote",
                    "Script {} ({}) superseded by a later script with the same identity",
                    previous.script_id,
                    previous.url
                );
            }
        }

        Self { scripts: map }
    }

    /// Find the script loaded for a canonical id
    pub fn lookup(&self, id: &CanonicalId) -> Option<&ScriptRecord> {
        self.scripts.get(id)
    }

    pub fn len(&self) -> usize {
        self.scripts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scripts.is_empty()
    }

    /// Number of `files` that have a loaded script
    ///
    /// Zero against a non-empty registry usually means the remote process
    /// loads its sources from another directory and `remote_root` is unset.
    pub fn count_mapped<'a, I>(&self, mapper: &PathMapper, files: I) -> usize
    where
        I: IntoIterator<Item = &'a Path>,
    {
        files
            .into_iter()
            .filter_map(|path| mapper.canonical_id(path))
            .filter(|id| self.scripts.contains_key(id))
            .count()
    }

    /// All records, sorted by canonical id
    pub fn iter(&self) -> impl Iterator<Item = &ScriptRecord> {
        let mut records: Vec<_> = self.scripts.values().collect();
        records.sort_by(|a, b| a.canonical_id.cmp(&b.canonical_id));
        records.into_iter()
    }
}
