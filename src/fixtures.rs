//! Fixture loading.
//!
//! Fixtures are plain JSON documents stored under a fixed root directory
//! and referenced by filename from the endpoint configuration.

use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};

/// Source of canned response bodies.
///
/// `Ok(None)` means the named fixture does not exist; that is a normal
/// outcome the resolver handles, not an error.
#[async_trait]
pub trait FixtureStore: Send + Sync {
    async fn load(&self, name: &str) -> anyhow::Result<Option<serde_json::Value>>;
}

/// Directory backed fixture store.
///
/// Filenames must resolve inside the root: absolute names and names with
/// parent-directory components are treated as missing.
#[derive(Debug, Clone)]
pub struct DirFixtureStore {
    root: PathBuf,
}

impl DirFixtureStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a fixture name to a path under the root, rejecting anything
    /// that would escape it.
    fn resolve(&self, name: &str) -> Option<PathBuf> {
        if name.is_empty() {
            return None;
        }
        let path = Path::new(name);
        if path.is_absolute() {
            return None;
        }
        if path
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            return None;
        }
        Some(self.root.join(path))
    }
}

#[async_trait]
impl FixtureStore for DirFixtureStore {
    async fn load(&self, name: &str) -> anyhow::Result<Option<serde_json::Value>> {
        let path = match self.resolve(name) {
            Some(path) => path,
            None => {
                tracing::warn!(fixture = %name, "Rejected fixture name outside the fixture root");
                return Ok(None);
            }
        };

        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(anyhow::anyhow!("Failed to read {}: {}", path.display(), e));
            }
        };

        let value = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Invalid JSON in {}: {}", path.display(), e))?;
        Ok(Some(value))
    }
}
