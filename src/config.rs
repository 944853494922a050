//! Endpoint configuration for the mock server.
//!
//! Defines the configuration document mapping request paths to canned
//! responses, and the store that re-reads it from disk on every request.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Default HTTP method set when an endpoint omits `methods`.
pub const DEFAULT_METHODS: &[&str] = &["GET"];

/// Main configuration document.
///
/// Keys of `endpoints` are exact request paths and must start with `/`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct MockConfig {
    /// Endpoint definitions keyed by request path
    #[serde(default)]
    pub endpoints: HashMap<String, EndpointConfig>,
}

impl MockConfig {
    /// Parse a configuration document from a YAML string.
    ///
    /// An empty or whitespace-only document yields the default (no
    /// endpoints), mirroring an absent file.
    pub fn from_yaml(yaml: &str) -> anyhow::Result<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration document.
    pub fn validate(&self) -> anyhow::Result<()> {
        for (path, endpoint) in &self.endpoints {
            if !path.starts_with('/') {
                anyhow::bail!("Endpoint path {:?} must start with '/'", path);
            }
            endpoint
                .validate()
                .map_err(|e| anyhow::anyhow!("Endpoint {}: {}", path, e))?;
        }
        Ok(())
    }
}

/// Configuration for a single endpoint path.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EndpointConfig {
    /// Allowed HTTP methods. Absent means exactly `[GET]`; an explicit
    /// empty list allows nothing.
    #[serde(default)]
    pub methods: Option<Vec<String>>,

    /// Free-text description, informational only
    #[serde(default)]
    pub description: String,

    /// Default fixture filename when `responses` has no entry for the method
    #[serde(default)]
    pub response_file: Option<String>,

    /// Per-method fixture filename overrides
    #[serde(default)]
    pub responses: HashMap<String, String>,

    /// HTTP status to return on success
    #[serde(default = "default_status")]
    pub status_code: u16,

    /// Artificial delay in seconds applied before responding
    #[serde(default)]
    pub delay: f64,
}

fn default_status() -> u16 {
    200
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            methods: None,
            description: String::new(),
            response_file: None,
            responses: HashMap::new(),
            status_code: default_status(),
            delay: 0.0,
        }
    }
}

impl EndpointConfig {
    /// Validate the endpoint definition.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.status_code < 100 || self.status_code > 599 {
            anyhow::bail!("Invalid status code: {}", self.status_code);
        }
        if self.delay < 0.0 || !self.delay.is_finite() {
            anyhow::bail!("Invalid delay: {}", self.delay);
        }
        if let Some(methods) = &self.methods {
            if methods.iter().any(|m| m.trim().is_empty()) {
                anyhow::bail!("Method tokens must not be empty");
            }
        }
        Ok(())
    }

    /// Whether `method` is in the allowed set (case-insensitive).
    pub fn allows_method(&self, method: &str) -> bool {
        let method = method.to_uppercase();
        match &self.methods {
            Some(methods) => methods.iter().any(|m| m.to_uppercase() == method),
            None => DEFAULT_METHODS.contains(&method.as_str()),
        }
    }

    /// The allowed method tokens, uppercased, for listings.
    pub fn allowed_methods(&self) -> Vec<String> {
        match &self.methods {
            Some(methods) => methods.iter().map(|m| m.to_uppercase()).collect(),
            None => DEFAULT_METHODS.iter().map(|m| m.to_string()).collect(),
        }
    }

    /// Fixture filename for `method`: the per-method mapping wins, then
    /// `response_file`. Empty strings count as absent.
    pub fn fixture_for(&self, method: &str) -> Option<&str> {
        let method = method.to_uppercase();
        self.responses
            .iter()
            .find(|(m, _)| m.to_uppercase() == method)
            .map(|(_, f)| f.as_str())
            .filter(|f| !f.is_empty())
            .or_else(|| self.response_file.as_deref().filter(|f| !f.is_empty()))
    }
}

/// Source of the current endpoint configuration.
///
/// Loaded fresh on every resolution so edits take effect without a restart;
/// implementations must not cache across calls.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    async fn load(&self) -> anyhow::Result<MockConfig>;
}

/// YAML file backed configuration store.
///
/// An absent file degrades to "no endpoints configured" rather than an
/// error; malformed content is an error surfaced to the caller.
#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

#[async_trait]
impl ConfigStore for FileConfigStore {
    async fn load(&self) -> anyhow::Result<MockConfig> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(MockConfig::default());
            }
            Err(e) => {
                return Err(anyhow::anyhow!(
                    "Failed to read {}: {}",
                    self.path.display(),
                    e
                ));
            }
        };
        MockConfig::from_yaml(&content)
            .map_err(|e| anyhow::anyhow!("Invalid configuration {}: {}", self.path.display(), e))
    }
}
