//! Path identity mapping
//!
//! Converts local paths (and remote script urls) into the canonical identity
//! both sides agree on: `/` followed by the root-relative path with `/`
//! separators, e.g. `/lib/index.js`.

use std::fmt;
use std::path::{Component, Path, PathBuf};
use url::Url;

/// Root-relative identity of a file, shared by local paths and remote scripts
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CanonicalId(String);

impl CanonicalId {
    /// Build an id from path segments, resolving `.` and `..` lexically
    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut parts: Vec<String> = Vec::new();
        for segment in segments {
            match segment.as_ref() {
                "" | "." => {}
                ".." => {
                    parts.pop();
                }
                name => parts.push(name.to_string()),
            }
        }
        CanonicalId(format!("/{}", parts.join("/")))
    }

    /// Build an id from a remote script url
    ///
    /// Accepts `file://` urls and bare absolute paths (POSIX or Windows). When
    /// `remote_root` is given the url must lie under it and the prefix is
    /// stripped. Returns `None` for empty urls, non-file schemes
    /// (`node:`, `http:`), relative names like `evalmachine.<anonymous>`, and
    /// urls outside `remote_root`.
    pub fn from_remote_url(url: &str, remote_root: Option<&str>) -> Option<Self> {
        let path = remote_path(url)?.replace('\\', "/");

        let relative = match remote_root.map(|root| root.replace('\\', "/")) {
            Some(root) => {
                let root = root.trim_end_matches('/');
                if root.is_empty() {
                    path
                } else {
                    let rest = path.strip_prefix(root)?;
                    if !rest.is_empty() && !rest.starts_with('/') {
                        return None;
                    }
                    rest.to_string()
                }
            }
            None => path,
        };

        Some(Self::from_segments(relative.split('/')))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CanonicalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Extract the filesystem path portion of a remote script url
fn remote_path(url: &str) -> Option<String> {
    if url.is_empty() {
        return None;
    }

    if url.starts_with('/') || url.starts_with('\\') || has_drive_prefix(url) {
        return Some(url.to_string());
    }

    let parsed = Url::parse(url).ok()?;
    if parsed.scheme() != "file" {
        return None;
    }

    match parsed.to_file_path() {
        Ok(path) => Some(path.to_string_lossy().into_owned()),
        // Foreign-platform file urls (e.g. a Windows drive on a POSIX host)
        Err(()) => Some(parsed.path().to_string()),
    }
}

fn has_drive_prefix(s: &str) -> bool {
    let bytes = s.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

/// Maps local paths under the watch root to canonical ids
///
/// Purely lexical: never consults the filesystem, so the same path always
/// yields the same id.
#[derive(Debug, Clone)]
pub struct PathMapper {
    root: PathBuf,
}

impl PathMapper {
    /// Create a mapper for the given watch root
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: normalize(root.as_ref()),
        }
    }

    /// Watch root this mapper resolves against
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Canonical id for a path
    ///
    /// Relative paths are taken as already relative to the root. Absolute
    /// paths outside the root have no id.
    pub fn canonical_id(&self, path: &Path) -> Option<CanonicalId> {
        let relative = if path.is_absolute() {
            normalize(path).strip_prefix(&self.root).ok()?.to_path_buf()
        } else {
            path.to_path_buf()
        };

        let segments = relative.components().filter_map(|component| match component {
            Component::Normal(name) => Some(name.to_string_lossy().into_owned()),
            Component::ParentDir => Some("..".to_string()),
            _ => None,
        });

        Some(CanonicalId::from_segments(segments))
    }

    /// Absolute location of a path on disk (joins root-relative paths onto the root)
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}

/// Lexical normalization: drops `.` and folds `..` without touching the filesystem
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
