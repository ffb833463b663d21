//! Error types for VIEWGRANT operations

use crate::CatalogObjectRef;
use thiserror::Error;

/// Catalog ARN parsing errors.
///
/// A malformed ARN in an inbound event is a fatal input error.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ArnError {
    #[error("Malformed ARN {arn}: expected {expected} colon-separated fields, got {got}")]
    FieldCount {
        arn: String,
        expected: usize,
        got: usize,
    },

    #[error("Malformed ARN {arn}: {reason}")]
    Malformed { arn: String, reason: String },
}

/// Event boundary validation errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PayloadError {
    #[error("Unknown detail-type: {detail_type}")]
    UnknownDetailType { detail_type: String },

    #[error("Invalid {event} payload: {reason}")]
    Invalid { event: String, reason: String },

    #[error("Required field missing in {event} payload: {field}")]
    MissingField { event: String, field: String },

    #[error("Invalid value for {field} in {event} payload: {reason}")]
    InvalidValue {
        event: String,
        field: String,
        reason: String,
    },
}

/// Lineage resolution errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResolutionError {
    /// A view's stored definition could not be decoded. Aborts the whole
    /// resolution call, not just the branch.
    #[error("Malformed definition for view {object}: {reason}")]
    MalformedDefinition {
        object: CatalogObjectRef,
        reason: String,
    },
}

/// Failures reported by external collaborators.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GatewayError {
    #[error("{service}: {resource} not found")]
    NotFound { service: String, resource: String },

    #[error("{service}: {resource} already exists")]
    AlreadyExists { service: String, resource: String },

    #[error("{service} {operation} failed: {message}")]
    Service {
        service: String,
        operation: String,
        message: String,
    },

    #[error("Failed to build {service} request: {reason}")]
    Build { service: String, reason: String },
}

impl GatewayError {
    /// Build a `Service` error.
    pub fn service(
        service: impl Into<String>,
        operation: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Service {
            service: service.into(),
            operation: operation.into(),
            message: message.into(),
        }
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Choreography-level failures.
#[derive(Debug, Clone, Error)]
pub enum ChoreographyError {
    /// The transport reported failed entries. The whole invocation fails so
    /// that redelivery re-runs the fan-out.
    #[error("Failed to publish {failed_count} event(s) to {bus}")]
    PublishFailed { failed_count: i32, bus: String },

    /// A subscriber's grant sequence failed. Remaining subscribers are not
    /// processed in this invocation.
    #[error("Grant sequence failed for subscriber {principal}: {source}")]
    Subscriber {
        principal: String,
        #[source]
        source: Box<ViewgrantError>,
    },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for all VIEWGRANT errors.
#[derive(Debug, Clone, Error)]
pub enum ViewgrantError {
    #[error("ARN error: {0}")]
    Arn(#[from] ArnError),

    #[error("Payload error: {0}")]
    Payload(#[from] PayloadError),

    #[error("Resolution error: {0}")]
    Resolution(#[from] ResolutionError),

    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Choreography error: {0}")]
    Choreography(#[from] ChoreographyError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type alias for VIEWGRANT operations.
pub type ViewgrantResult<T> = Result<T, ViewgrantError>;

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arn_error_display_field_count() {
        let err = ArnError::FieldCount {
            arn: "arn:aws:glue".to_string(),
            expected: 6,
            got: 3,
        };
        let msg = format!("{}", err);
        assert!(msg.contains("arn:aws:glue"));
        assert!(msg.contains("6"));
        assert!(msg.contains("3"));
    }

    #[test]
    fn test_resolution_error_display_names_object() {
        let err = ResolutionError::MalformedDefinition {
            object: CatalogObjectRef::new("111111111111", "sales", "v_orders"),
            reason: "bad base64".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("sales.v_orders"));
        assert!(msg.contains("bad base64"));
    }

    #[test]
    fn test_gateway_error_predicates() {
        let exists = GatewayError::AlreadyExists {
            service: "glue".to_string(),
            resource: "db.t".to_string(),
        };
        assert!(exists.is_already_exists());
        assert!(!exists.is_not_found());

        let missing = GatewayError::NotFound {
            service: "glue".to_string(),
            resource: "db.t".to_string(),
        };
        assert!(missing.is_not_found());

        let svc = GatewayError::service("lakeformation", "GrantPermissions", "throttled");
        assert_eq!(
            format!("{}", svc),
            "lakeformation GrantPermissions failed: throttled"
        );
    }

    #[test]
    fn test_subscriber_error_keeps_source() {
        let inner = ViewgrantError::from(GatewayError::service("glue", "GetTable", "boom"));
        let err = ChoreographyError::Subscriber {
            principal: "222222222222".to_string(),
            source: Box::new(inner),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("222222222222"));
        assert!(msg.contains("boom"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_viewgrant_error_from_variants() {
        let arn = ViewgrantError::from(ArnError::Malformed {
            arn: "x".to_string(),
            reason: "y".to_string(),
        });
        assert!(matches!(arn, ViewgrantError::Arn(_)));

        let payload = ViewgrantError::from(PayloadError::UnknownDetailType {
            detail_type: "Other".to_string(),
        });
        assert!(matches!(payload, ViewgrantError::Payload(_)));

        let publish = ViewgrantError::from(ChoreographyError::PublishFailed {
            failed_count: 1,
            bus: "bus".to_string(),
        });
        assert!(matches!(publish, ViewgrantError::Choreography(_)));

        let config = ViewgrantError::from(ConfigError::MissingRequired {
            field: "EVENT_BUS_NAME".to_string(),
        });
        assert!(matches!(config, ViewgrantError::Config(_)));
    }
}
