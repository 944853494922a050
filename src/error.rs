//! Resolution error taxonomy and wire shapes.
//!
//! Every failure maps to a stable error code, a fixed client-facing
//! message, and an HTTP status. Internal causes stay in the logs; the
//! wire body only ever carries the fixed message.

use serde_json::json;

/// Failure outcome of a resolution.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// No endpoint configured for the request path
    #[error("no endpoint configured for {path}")]
    NotConfigured { path: String },

    /// Authentication header missing or mismatched
    #[error("invalid authentication for {path}")]
    InvalidKey { path: String },

    /// Request body absent, unparseable, or missing a required field
    #[error("missing required request field for {path}")]
    MissingField { path: String },

    /// Request method not in the endpoint's allowed set
    #[error("method {method} not allowed for {path}")]
    MethodNotAllowed { method: String, path: String },

    /// Endpoint has no fixture filename for the request method
    #[error("no response file configured for {method} {path}")]
    NoResponseFile { method: String, path: String },

    /// Named fixture file absent under the fixture root
    #[error("response fixture {file} not found")]
    FixtureMissing { file: String },

    /// Configuration or fixture source failed in an unexpected way
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// How failure bodies are rendered on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ErrorShape {
    /// `{"error_code": <int>, "message": <string>}`
    #[default]
    Simple,
    /// `{"error": <slug>, "message": <string>, "hint": <string>}`
    Detailed,
}

impl ResolveError {
    /// Stable numeric error code.
    pub fn error_code(&self) -> u32 {
        match self {
            Self::NotConfigured { .. } => 1001,
            Self::InvalidKey { .. } => 1010,
            Self::MissingField { .. } => 1001,
            Self::MethodNotAllowed { .. } => 1001,
            Self::NoResponseFile { .. } => 5001,
            Self::FixtureMissing { .. } => 5002,
            Self::Internal(_) => 5002,
        }
    }

    /// HTTP status of the failure response.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::NotConfigured { .. } => 404,
            Self::InvalidKey { .. } => 400,
            Self::MissingField { .. } => 400,
            Self::MethodNotAllowed { .. } => 405,
            Self::NoResponseFile { .. } => 500,
            Self::FixtureMissing { .. } => 500,
            Self::Internal(_) => 500,
        }
    }

    /// Fixed client-facing message.
    pub fn message(&self) -> &'static str {
        match self {
            Self::NotConfigured { .. } => "Missing required field",
            Self::InvalidKey { .. } => "Invalid Key",
            Self::MissingField { .. } => "Missing required field",
            Self::MethodNotAllowed { .. } => "Missing required field",
            Self::NoResponseFile { .. } => "Service Not Available Temporarily",
            Self::FixtureMissing { .. } => "Internal server error",
            Self::Internal(_) => "Internal server error",
        }
    }

    /// Short identifier used by the detailed wire shape.
    pub fn slug(&self) -> &'static str {
        match self {
            Self::NotConfigured { .. } => "not_configured",
            Self::InvalidKey { .. } => "invalid_key",
            Self::MissingField { .. } => "missing_field",
            Self::MethodNotAllowed { .. } => "method_not_allowed",
            Self::NoResponseFile { .. } => "no_response_file",
            Self::FixtureMissing { .. } => "fixture_missing",
            Self::Internal(_) => "internal_error",
        }
    }

    /// Operator hint used by the detailed wire shape.
    pub fn hint(&self) -> &'static str {
        match self {
            Self::NotConfigured { .. } => "Add the path under 'endpoints' in the configuration file",
            Self::InvalidKey { .. } => {
                "Send Content-Type, applicationId and accessKey headers with the expected values"
            }
            Self::MissingField { .. } => {
                "Send a JSON body containing both 'affiliateId' and 'url'"
            }
            Self::MethodNotAllowed { .. } => "Add the method to the endpoint's 'methods' list",
            Self::NoResponseFile { .. } => {
                "Set 'response_file' or a 'responses' entry for this method"
            }
            Self::FixtureMissing { .. } => "Create the response file under the fixtures directory",
            Self::Internal(_) => "Check the server logs for the underlying cause",
        }
    }

    /// Whether this failure is the server's fault rather than the client's.
    pub fn is_server_error(&self) -> bool {
        self.http_status() >= 500
    }

    /// Render the wire body in the given shape.
    pub fn to_body(&self, shape: ErrorShape) -> serde_json::Value {
        match shape {
            ErrorShape::Simple => json!({
                "error_code": self.error_code(),
                "message": self.message(),
            }),
            ErrorShape::Detailed => json!({
                "error": self.slug(),
                "message": self.message(),
                "hint": self.hint(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_and_status_mapping() {
        let err = ResolveError::NotConfigured {
            path: "/orders".into(),
        };
        assert_eq!(err.error_code(), 1001);
        assert_eq!(err.http_status(), 404);

        let err = ResolveError::InvalidKey {
            path: "/orders".into(),
        };
        assert_eq!(err.error_code(), 1010);
        assert_eq!(err.http_status(), 400);

        let err = ResolveError::NoResponseFile {
            method: "GET".into(),
            path: "/orders".into(),
        };
        assert_eq!(err.error_code(), 5001);
        assert_eq!(err.http_status(), 500);
        assert!(err.is_server_error());

        let err = ResolveError::FixtureMissing {
            file: "orders.json".into(),
        };
        assert_eq!(err.error_code(), 5002);
        assert_eq!(err.http_status(), 500);
    }

    #[test]
    fn test_simple_body_shape() {
        let err = ResolveError::InvalidKey {
            path: "/orders".into(),
        };
        assert_eq!(
            err.to_body(ErrorShape::Simple),
            serde_json::json!({"error_code": 1010, "message": "Invalid Key"})
        );
    }

    #[test]
    fn test_detailed_body_shape() {
        let err = ResolveError::MethodNotAllowed {
            method: "POST".into(),
            path: "/orders".into(),
        };
        let body = err.to_body(ErrorShape::Detailed);
        assert_eq!(body["error"], "method_not_allowed");
        assert_eq!(body["message"], "Missing required field");
        assert!(body["hint"].as_str().unwrap().contains("methods"));
    }

    #[test]
    fn test_internal_error_hides_cause() {
        let err = ResolveError::Internal(anyhow::anyhow!("yaml: mapping values are not allowed"));
        let body = err.to_body(ErrorShape::Simple);
        assert_eq!(body["message"], "Internal server error");
        assert!(!body.to_string().contains("yaml"));
    }
}
