//! Request resolution.
//!
//! Turns an inbound request plus the current endpoint configuration into a
//! response, or a typed failure. The resolver is stateless: configuration
//! and fixtures are re-read through the injected stores on every call, so
//! it is safe to share across request tasks without locking.

use crate::config::ConfigStore;
use crate::error::ResolveError;
use crate::fixtures::FixtureStore;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

/// Expected values for the cross-cutting authentication gate.
///
/// When set on the resolver, every configured endpoint requires the
/// `applicationId` and `accessKey` headers, a JSON content type, and a JSON
/// body carrying `affiliateId` and `url`.
#[derive(Debug, Clone)]
pub struct AuthOptions {
    pub application_id: String,
    pub access_key: String,
}

impl Default for AuthOptions {
    fn default() -> Self {
        Self {
            application_id: "sample_app_Id".to_string(),
            access_key: "sample_access_key".to_string(),
        }
    }
}

/// A successfully resolved response, ready for the server to send.
///
/// The caller applies `delay` before responding; the resolver never sleeps.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedResponse {
    pub status: u16,
    pub body: serde_json::Value,
    pub content_type: &'static str,
    pub delay: Duration,
}

/// The decision engine.
pub struct Resolver<C, F> {
    config: C,
    fixtures: F,
    auth: Option<AuthOptions>,
}

impl<C: ConfigStore, F: FixtureStore> Resolver<C, F> {
    /// Create a resolver over the given stores, with the auth gate disabled.
    pub fn new(config: C, fixtures: F) -> Self {
        Self {
            config,
            fixtures,
            auth: None,
        }
    }

    /// Enable the authentication gate with the given expected credentials.
    pub fn with_auth(mut self, auth: AuthOptions) -> Self {
        self.auth = Some(auth);
        self
    }

    /// Resolve one request.
    ///
    /// Checks run in a fixed order; a later check only runs once every
    /// earlier one has passed: path lookup, authentication, method,
    /// fixture selection, fixture load.
    pub async fn resolve(
        &self,
        method: &str,
        path: &str,
        headers: &HashMap<String, String>,
        body: Option<&[u8]>,
    ) -> Result<ResolvedResponse, ResolveError> {
        let path = normalize_path(path);
        let config = self.config.load().await?;

        let endpoint = config
            .endpoints
            .get(&path)
            .ok_or_else(|| ResolveError::NotConfigured { path: path.clone() })?;

        if let Some(auth) = &self.auth {
            validate_authentication(auth, &path, headers, body)?;
        }

        if !endpoint.allows_method(method) {
            return Err(ResolveError::MethodNotAllowed {
                method: method.to_uppercase(),
                path,
            });
        }

        let fixture_name = endpoint.fixture_for(method).map(str::to_string).ok_or(
            ResolveError::NoResponseFile {
                method: method.to_uppercase(),
                path: path.clone(),
            },
        )?;

        let body = self
            .fixtures
            .load(&fixture_name)
            .await?
            .ok_or(ResolveError::FixtureMissing { file: fixture_name })?;

        debug!(%path, method = %method, status = endpoint.status_code, "Resolved request");

        Ok(ResolvedResponse {
            status: endpoint.status_code,
            body,
            content_type: "application/json",
            delay: Duration::try_from_secs_f64(endpoint.delay).unwrap_or(Duration::ZERO),
        })
    }
}

/// Normalize a request path to exactly one leading slash.
///
/// No trailing-slash folding and no case folding: configuration keys are
/// matched by exact equality.
pub fn normalize_path(path: &str) -> String {
    format!("/{}", path.trim_start_matches('/'))
}

/// Case-insensitive header lookup (first value wins at the server layer).
fn header<'a>(headers: &'a HashMap<String, String>, name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// The cross-cutting authentication gate.
///
/// Applies uniformly to every configured endpoint, independent of the
/// endpoint definition.
fn validate_authentication(
    auth: &AuthOptions,
    path: &str,
    headers: &HashMap<String, String>,
    body: Option<&[u8]>,
) -> Result<(), ResolveError> {
    let header_ok = |name: &str, expected: &str| header(headers, name) == Some(expected);

    if !header_ok("Content-Type", "application/json")
        || !header_ok("applicationId", &auth.application_id)
        || !header_ok("accessKey", &auth.access_key)
    {
        return Err(ResolveError::InvalidKey {
            path: path.to_string(),
        });
    }

    let data: serde_json::Value = body
        .and_then(|b| serde_json::from_slice(b).ok())
        .ok_or_else(|| ResolveError::MissingField {
            path: path.to_string(),
        })?;

    let has_required = data.get("affiliateId").is_some() && data.get("url").is_some();
    if !has_required {
        return Err(ResolveError::MissingField {
            path: path.to_string(),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigStore, MockConfig};
    use crate::fixtures::FixtureStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU64, Ordering};

    /// In-memory configuration store for resolver tests.
    struct FakeConfig(MockConfig);

    impl FakeConfig {
        fn from_yaml(yaml: &str) -> Self {
            Self(MockConfig::from_yaml(yaml).unwrap())
        }
    }

    #[async_trait]
    impl ConfigStore for FakeConfig {
        async fn load(&self) -> anyhow::Result<MockConfig> {
            Ok(self.0.clone())
        }
    }

    /// Store whose configuration source is broken.
    struct BrokenConfig;

    #[async_trait]
    impl ConfigStore for BrokenConfig {
        async fn load(&self) -> anyhow::Result<MockConfig> {
            Err(anyhow::anyhow!("mapping values are not allowed here"))
        }
    }

    /// In-memory fixture store that counts loads.
    #[derive(Default)]
    struct FakeFixtures {
        files: HashMap<String, serde_json::Value>,
        loads: AtomicU64,
    }

    impl FakeFixtures {
        fn with(name: &str, value: serde_json::Value) -> Self {
            let mut files = HashMap::new();
            files.insert(name.to_string(), value);
            Self {
                files,
                loads: AtomicU64::new(0),
            }
        }

        fn load_count(&self) -> u64 {
            self.loads.load(Ordering::Relaxed)
        }
    }

    #[async_trait]
    impl FixtureStore for FakeFixtures {
        async fn load(&self, name: &str) -> anyhow::Result<Option<serde_json::Value>> {
            self.loads.fetch_add(1, Ordering::Relaxed);
            Ok(self.files.get(name).cloned())
        }
    }

    const ORDERS_CONFIG: &str = r#"
endpoints:
  /orders:
    methods: [GET]
    response_file: orders.json
    status_code: 201
"#;

    fn orders_resolver() -> Resolver<FakeConfig, FakeFixtures> {
        Resolver::new(
            FakeConfig::from_yaml(ORDERS_CONFIG),
            FakeFixtures::with("orders.json", serde_json::json!({"id": 1})),
        )
    }

    fn auth_headers() -> HashMap<String, String> {
        let mut headers = HashMap::new();
        headers.insert("Content-Type".to_string(), "application/json".to_string());
        headers.insert("applicationId".to_string(), "sample_app_Id".to_string());
        headers.insert("accessKey".to_string(), "sample_access_key".to_string());
        headers
    }

    const AUTH_BODY: &[u8] = br#"{"affiliateId": "aff-1", "url": "https://example.com"}"#;

    #[tokio::test]
    async fn test_configured_endpoint_resolves() {
        let resolver = orders_resolver();
        let resolved = resolver
            .resolve("GET", "/orders", &HashMap::new(), None)
            .await
            .unwrap();

        assert_eq!(resolved.status, 201);
        assert_eq!(resolved.body, serde_json::json!({"id": 1}));
        assert_eq!(resolved.content_type, "application/json");
        assert_eq!(resolved.delay, Duration::ZERO);
    }

    #[tokio::test]
    async fn test_unconfigured_path_is_404() {
        let resolver = orders_resolver();
        let err = resolver
            .resolve("GET", "/unknown", &HashMap::new(), None)
            .await
            .unwrap_err();

        assert!(matches!(err, ResolveError::NotConfigured { .. }));
        assert_eq!(err.error_code(), 1001);
        assert_eq!(err.http_status(), 404);

        // Method and headers are irrelevant for an unconfigured path
        let err = resolver
            .resolve("DELETE", "/unknown", &auth_headers(), Some(AUTH_BODY))
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::NotConfigured { .. }));
    }

    #[tokio::test]
    async fn test_disallowed_method_is_405() {
        let resolver = orders_resolver();
        let err = resolver
            .resolve("POST", "/orders", &HashMap::new(), None)
            .await
            .unwrap_err();

        assert!(matches!(err, ResolveError::MethodNotAllowed { .. }));
        assert_eq!(err.http_status(), 405);
    }

    #[tokio::test]
    async fn test_disallowed_method_wins_over_valid_auth() {
        let resolver = orders_resolver().with_auth(AuthOptions::default());
        let err = resolver
            .resolve("POST", "/orders", &auth_headers(), Some(AUTH_BODY))
            .await
            .unwrap_err();

        assert!(matches!(err, ResolveError::MethodNotAllowed { .. }));
    }

    #[tokio::test]
    async fn test_path_normalization() {
        let resolver = orders_resolver();
        assert!(resolver
            .resolve("GET", "orders", &HashMap::new(), None)
            .await
            .is_ok());
        assert!(resolver
            .resolve("GET", "//orders", &HashMap::new(), None)
            .await
            .is_ok());

        // No trailing-slash folding: /orders/ is a different key
        let err = resolver
            .resolve("GET", "/orders/", &HashMap::new(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::NotConfigured { .. }));
    }

    #[tokio::test]
    async fn test_idempotent_resolution() {
        let resolver = orders_resolver();
        let first = resolver
            .resolve("GET", "/orders", &HashMap::new(), None)
            .await
            .unwrap();
        let second = resolver
            .resolve("GET", "/orders", &HashMap::new(), None)
            .await
            .unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_method_responses_without_default_file() {
        let yaml = r#"
endpoints:
  /orders:
    methods: [GET, POST]
    responses:
      POST: order-created.json
"#;
        let resolver = Resolver::new(
            FakeConfig::from_yaml(yaml),
            FakeFixtures::with("order-created.json", serde_json::json!({"created": true})),
        );

        // POST resolves through the per-method mapping
        let resolved = resolver
            .resolve("POST", "/orders", &HashMap::new(), None)
            .await
            .unwrap();
        assert_eq!(resolved.body, serde_json::json!({"created": true}));

        // GET is allowed but has no fixture anywhere: misconfiguration
        let err = resolver
            .resolve("GET", "/orders", &HashMap::new(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::NoResponseFile { .. }));
        assert_eq!(err.error_code(), 5001);
        assert_eq!(err.http_status(), 500);
    }

    #[tokio::test]
    async fn test_missing_fixture_is_5002() {
        let resolver = Resolver::new(FakeConfig::from_yaml(ORDERS_CONFIG), FakeFixtures::default());
        let err = resolver
            .resolve("GET", "/orders", &HashMap::new(), None)
            .await
            .unwrap_err();

        assert!(matches!(err, ResolveError::FixtureMissing { .. }));
        assert_eq!(err.error_code(), 5002);
        assert_eq!(err.http_status(), 500);
    }

    #[tokio::test]
    async fn test_broken_config_source_is_internal() {
        let resolver = Resolver::new(BrokenConfig, FakeFixtures::default());
        let err = resolver
            .resolve("GET", "/orders", &HashMap::new(), None)
            .await
            .unwrap_err();

        assert!(matches!(err, ResolveError::Internal(_)));
        assert_eq!(err.http_status(), 500);
    }

    #[tokio::test]
    async fn test_auth_passes_with_expected_credentials() {
        let resolver = orders_resolver().with_auth(AuthOptions::default());
        let resolved = resolver
            .resolve("GET", "/orders", &auth_headers(), Some(AUTH_BODY))
            .await
            .unwrap();
        assert_eq!(resolved.status, 201);
    }

    #[tokio::test]
    async fn test_auth_header_names_are_case_insensitive() {
        let resolver = orders_resolver().with_auth(AuthOptions::default());

        let mut headers = HashMap::new();
        headers.insert("content-type".to_string(), "application/json".to_string());
        headers.insert("applicationid".to_string(), "sample_app_Id".to_string());
        headers.insert("accesskey".to_string(), "sample_access_key".to_string());

        assert!(resolver
            .resolve("GET", "/orders", &headers, Some(AUTH_BODY))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_wrong_access_key_skips_fixture_load() {
        let config = FakeConfig::from_yaml(ORDERS_CONFIG);
        let fixtures = FakeFixtures::with("orders.json", serde_json::json!({"id": 1}));
        let resolver = Resolver::new(config, fixtures).with_auth(AuthOptions::default());

        let mut headers = auth_headers();
        headers.insert("accessKey".to_string(), "wrong".to_string());

        let err = resolver
            .resolve("GET", "/orders", &headers, Some(AUTH_BODY))
            .await
            .unwrap_err();

        assert!(matches!(err, ResolveError::InvalidKey { .. }));
        assert_eq!(err.error_code(), 1010);
        assert_eq!(err.http_status(), 400);
        assert_eq!(resolver.fixtures.load_count(), 0);
    }

    #[tokio::test]
    async fn test_auth_requires_json_content_type() {
        let resolver = orders_resolver().with_auth(AuthOptions::default());

        let mut headers = auth_headers();
        headers.insert("Content-Type".to_string(), "text/plain".to_string());

        let err = resolver
            .resolve("GET", "/orders", &headers, Some(AUTH_BODY))
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::InvalidKey { .. }));
    }

    #[tokio::test]
    async fn test_auth_body_requires_both_fields() {
        let resolver = orders_resolver().with_auth(AuthOptions::default());
        let headers = auth_headers();

        for body in [
            None,
            Some(&b"not json"[..]),
            Some(&br#"{"affiliateId": "aff-1"}"#[..]),
            Some(&br#"{"url": "https://example.com"}"#[..]),
        ] {
            let err = resolver
                .resolve("GET", "/orders", &headers, body)
                .await
                .unwrap_err();
            assert!(matches!(err, ResolveError::MissingField { .. }));
            assert_eq!(err.error_code(), 1001);
            assert_eq!(err.http_status(), 400);
        }
    }

    #[tokio::test]
    async fn test_delay_propagates_to_caller() {
        let yaml = r#"
endpoints:
  /slow:
    methods: [GET]
    response_file: slow.json
    delay: 2
"#;
        let resolver = Resolver::new(
            FakeConfig::from_yaml(yaml),
            FakeFixtures::with("slow.json", serde_json::json!({"ok": true})),
        );

        let resolved = resolver
            .resolve("GET", "/slow", &HashMap::new(), None)
            .await
            .unwrap();
        assert_eq!(resolved.delay, Duration::from_secs(2));
        assert_eq!(resolved.body, serde_json::json!({"ok": true}));
    }

    #[tokio::test]
    async fn test_empty_methods_list_allows_nothing() {
        let yaml = r#"
endpoints:
  /locked:
    methods: []
    response_file: locked.json
"#;
        let resolver = Resolver::new(
            FakeConfig::from_yaml(yaml),
            FakeFixtures::with("locked.json", serde_json::json!({})),
        );

        for method in ["GET", "POST", "PUT", "DELETE", "PATCH"] {
            let err = resolver
                .resolve(method, "/locked", &HashMap::new(), None)
                .await
                .unwrap_err();
            assert!(matches!(err, ResolveError::MethodNotAllowed { .. }));
        }
    }
}
