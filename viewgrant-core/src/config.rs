//! Choreography configuration
//!
//! Loaded from environment variables with defaults matching the deployed
//! event bus. Only the managed policy ARN has no default; it is required by
//! the consumer leg.

use crate::{event::CONSUMER_PHASE_DETAIL_TYPE, ConfigError};

pub const DEFAULT_EVENT_BUS_NAME: &str = "datazone-custom-bus";
pub const DEFAULT_EVENT_SOURCE: &str = "custom.datazone";
pub const DEFAULT_PARTITION: &str = "aws";

/// Settings shared by both choreography legs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChoreographyConfig {
    /// Name of the bus consumer-phase events are published to, in each
    /// subscriber's account and region.
    pub event_bus_name: String,
    /// `source` of outbound events.
    pub event_source: String,
    /// `detail-type` of outbound consumer-phase events.
    pub consumer_detail_type: String,
    /// Partition used when building bus ARNs.
    pub partition: String,
    /// Baseline cross-account read policy attached to consumer roles.
    pub consumer_managed_policy_arn: Option<String>,
}

impl Default for ChoreographyConfig {
    fn default() -> Self {
        Self {
            event_bus_name: DEFAULT_EVENT_BUS_NAME.to_string(),
            event_source: DEFAULT_EVENT_SOURCE.to_string(),
            consumer_detail_type: CONSUMER_PHASE_DETAIL_TYPE.to_string(),
            partition: DEFAULT_PARTITION.to_string(),
            consumer_managed_policy_arn: None,
        }
    }
}

impl ChoreographyConfig {
    /// Create a ChoreographyConfig from environment variables.
    ///
    /// Environment variables:
    /// - `EVENT_BUS_NAME`: target bus name (default: datazone-custom-bus)
    /// - `EVENT_SOURCE`: outbound event source (default: custom.datazone)
    /// - `CONSUMER_DETAIL_TYPE`: outbound detail-type
    /// - `AWS_PARTITION`: ARN partition (default: aws)
    /// - `DATAZONE_USER_CUSTOM_MANAGED_POLICY_ARN`: policy attached to consumer roles
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            event_bus_name: env_or("EVENT_BUS_NAME", defaults.event_bus_name),
            event_source: env_or("EVENT_SOURCE", defaults.event_source),
            consumer_detail_type: env_or("CONSUMER_DETAIL_TYPE", defaults.consumer_detail_type),
            partition: env_or("AWS_PARTITION", defaults.partition),
            consumer_managed_policy_arn: std::env::var("DATAZONE_USER_CUSTOM_MANAGED_POLICY_ARN")
                .ok()
                .filter(|s| !s.trim().is_empty()),
        }
    }

    pub fn with_consumer_managed_policy_arn(mut self, arn: impl Into<String>) -> Self {
        self.consumer_managed_policy_arn = Some(arn.into());
        self
    }

    /// Check the fields every leg relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("EVENT_BUS_NAME", &self.event_bus_name),
            ("EVENT_SOURCE", &self.event_source),
            ("CONSUMER_DETAIL_TYPE", &self.consumer_detail_type),
            ("AWS_PARTITION", &self.partition),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::MissingRequired {
                    field: field.to_string(),
                });
            }
        }
        if let Some(arn) = &self.consumer_managed_policy_arn {
            if !arn.starts_with("arn:") || !arn.contains(":policy/") {
                return Err(ConfigError::InvalidValue {
                    field: "DATAZONE_USER_CUSTOM_MANAGED_POLICY_ARN".to_string(),
                    value: arn.clone(),
                    reason: "must be an IAM policy ARN".to_string(),
                });
            }
        }
        Ok(())
    }

    /// The managed policy ARN, required by the consumer leg.
    pub fn require_consumer_managed_policy_arn(&self) -> Result<&str, ConfigError> {
        self.consumer_managed_policy_arn
            .as_deref()
            .ok_or_else(|| ConfigError::MissingRequired {
                field: "DATAZONE_USER_CUSTOM_MANAGED_POLICY_ARN".to_string(),
            })
    }
}

fn env_or(key: &str, default: String) -> String {
    std::env::var(key)
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default)
}
