//! Ingress validation boundary
//!
//! The HTTP layer hands raw request bodies and the `Authorization` header to
//! an [`IngressValidator`]; only its validated [`RawReport`] output reaches the
//! pipeline.

use super::report::{RawReport, ReportKind};
use crate::error::IngressError;

/// Authenticates and schema-checks external submissions
pub trait IngressValidator: Send + Sync {
    /// Accept a raw payload of the given kind
    fn accept(
        &self,
        kind: ReportKind,
        raw_payload: &[u8],
        auth_header: Option<&str>,
    ) -> Result<RawReport, IngressError>;
}

/// Bearer-token validator backed by a shared API key
pub struct ApiKeyValidator {
    api_key: String,
}

impl ApiKeyValidator {
    /// Create a validator for the given key
    ///
    /// An empty key rejects every request.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
        }
    }

    fn authenticate(&self, auth_header: Option<&str>) -> Result<(), IngressError> {
        if self.api_key.is_empty() {
            return Err(IngressError::Auth("ingress API key not configured".into()));
        }

        let header = auth_header.ok_or_else(|| IngressError::Auth("missing credentials".into()))?;

        let token = header
            .strip_prefix("Bearer ")
            .or_else(|| header.strip_prefix("bearer "))
            .map(str::trim)
            .ok_or_else(|| IngressError::Auth("expected bearer token".into()))?;

        if !constant_time_eq(token.as_bytes(), self.api_key.as_bytes()) {
            return Err(IngressError::Auth("invalid API key".into()));
        }

        Ok(())
    }
}

impl IngressValidator for ApiKeyValidator {
    fn accept(
        &self,
        kind: ReportKind,
        raw_payload: &[u8],
        auth_header: Option<&str>,
    ) -> Result<RawReport, IngressError> {
        self.authenticate(auth_header)?;
        Ok(RawReport::from_json(kind, raw_payload)?)
    }
}

impl std::fmt::Debug for ApiKeyValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiKeyValidator")
            .field("api_key", &"<redacted>")
            .finish()
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &[u8] = br#"{"event_type": "deployment", "source": "ci"}"#;

    #[test]
    fn test_valid_token_accepted() {
        let validator = ApiKeyValidator::new("s3cret");
        let report = validator
            .accept(ReportKind::Event, BODY, Some("Bearer s3cret"))
            .unwrap();
        assert_eq!(report.kind(), ReportKind::Event);
    }

    #[test]
    fn test_missing_header_rejected() {
        let validator = ApiKeyValidator::new("s3cret");
        let err = validator.accept(ReportKind::Event, BODY, None).unwrap_err();
        assert!(matches!(err, IngressError::Auth(_)));
    }

    #[test]
    fn test_wrong_token_rejected() {
        let validator = ApiKeyValidator::new("s3cret");
        let err = validator
            .accept(ReportKind::Event, BODY, Some("Bearer nope"))
            .unwrap_err();
        assert!(matches!(err, IngressError::Auth(_)));
    }

    #[test]
    fn test_non_bearer_scheme_rejected() {
        let validator = ApiKeyValidator::new("s3cret");
        let err = validator
            .accept(ReportKind::Event, BODY, Some("Basic s3cret"))
            .unwrap_err();
        assert!(matches!(err, IngressError::Auth(_)));
    }

    #[test]
    fn test_empty_key_rejects_everything() {
        let validator = ApiKeyValidator::new("");
        assert!(validator
            .accept(ReportKind::Event, BODY, Some("Bearer "))
            .is_err());
    }

    #[test]
    fn test_schema_error_after_auth() {
        let validator = ApiKeyValidator::new("s3cret");
        let err = validator
            .accept(ReportKind::Event, b"{not json", Some("Bearer s3cret"))
            .unwrap_err();
        assert!(matches!(err, IngressError::Schema(_)));
    }

    #[test]
    fn test_debug_redacts_key() {
        let validator = ApiKeyValidator::new("s3cret");
        assert!(!format!("{:?}", validator).contains("s3cret"));
    }
}
