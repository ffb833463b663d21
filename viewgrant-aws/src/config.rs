//! AWS Client Configuration
//!
//! Region, retry and table settings shared by every SDK client. Loaded from
//! environment variables; credentials come from the default provider chain.

use aws_config::retry::RetryConfig;
use aws_config::BehaviorVersion;
use aws_types::region::Region;
use aws_types::SdkConfig;
use viewgrant_core::ConfigError;

/// Default number of attempts per SDK call, first attempt included.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

// ============================================================================
// AWS CLIENT CONFIGURATION
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AwsClientConfig {
    /// Region override. `None` defers to the default provider chain.
    pub region: Option<String>,

    /// Attempts per call under adaptive retry. Throttling-class failures
    /// back off and retry up to this bound.
    pub max_attempts: u32,

    /// DynamoDB table backing the subscription ledger.
    pub ledger_table: Option<String>,

    /// `VIEWGRANT_MAX_ATTEMPTS` as given when it is not a number. Reported by
    /// [`AwsClientConfig::validate`].
    pub unparsed_max_attempts: Option<String>,
}

impl Default for AwsClientConfig {
    fn default() -> Self {
        Self {
            region: None,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            ledger_table: None,
            unparsed_max_attempts: None,
        }
    }
}

impl AwsClientConfig {
    /// Create AwsClientConfig from environment variables.
    ///
    /// Environment variables:
    /// - `AWS_REGION`: Region override (default: provider chain)
    /// - `VIEWGRANT_MAX_ATTEMPTS`: Attempts per SDK call (default: 5)
    /// - `SUBSCRIPTION_TABLE_NAME`: Ledger table (required by the producer leg)
    pub fn from_env() -> Self {
        let region = std::env::var("AWS_REGION")
            .ok()
            .filter(|s| !s.trim().is_empty());

        let (max_attempts, unparsed_max_attempts) =
            parse_max_attempts(std::env::var("VIEWGRANT_MAX_ATTEMPTS").ok());

        let ledger_table = std::env::var("SUBSCRIPTION_TABLE_NAME")
            .ok()
            .filter(|s| !s.trim().is_empty());

        Self {
            region,
            max_attempts,
            ledger_table,
            unparsed_max_attempts,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(raw) = &self.unparsed_max_attempts {
            return Err(ConfigError::InvalidValue {
                field: "VIEWGRANT_MAX_ATTEMPTS".to_string(),
                value: raw.clone(),
                reason: "must be a positive integer".to_string(),
            });
        }
        if self.max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                field: "VIEWGRANT_MAX_ATTEMPTS".to_string(),
                value: self.max_attempts.to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    pub fn require_ledger_table(&self) -> Result<&str, ConfigError> {
        self.ledger_table
            .as_deref()
            .ok_or_else(|| ConfigError::MissingRequired {
                field: "SUBSCRIPTION_TABLE_NAME".to_string(),
            })
    }

    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig::adaptive().with_max_attempts(self.max_attempts)
    }

    /// Load the shared SDK configuration.
    pub async fn load(&self) -> SdkConfig {
        let mut loader =
            aws_config::defaults(BehaviorVersion::latest()).retry_config(self.retry_config());
        if let Some(region) = &self.region {
            loader = loader.region(Region::new(region.clone()));
        }
        loader.load().await
    }
}

/// Unset or blank falls back to the default. Anything else that is not a
/// number is kept so that validation can name it.
fn parse_max_attempts(raw: Option<String>) -> (u32, Option<String>) {
    match raw {
        None => (DEFAULT_MAX_ATTEMPTS, None),
        Some(s) if s.trim().is_empty() => (DEFAULT_MAX_ATTEMPTS, None),
        Some(s) => match s.trim().parse() {
            Ok(n) => (n, None),
            Err(_) => (DEFAULT_MAX_ATTEMPTS, Some(s)),
        },
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AwsClientConfig::default();
        assert_eq!(config.max_attempts, DEFAULT_MAX_ATTEMPTS);
        assert!(config.validate().is_ok());
        assert!(config.require_ledger_table().is_err());
    }

    #[test]
    fn test_zero_attempts_rejected() {
        let config = AwsClientConfig {
            max_attempts: 0,
            ..AwsClientConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_parse_max_attempts() {
        assert_eq!(parse_max_attempts(None), (DEFAULT_MAX_ATTEMPTS, None));
        assert_eq!(parse_max_attempts(Some("  ".to_string())), (DEFAULT_MAX_ATTEMPTS, None));
        assert_eq!(parse_max_attempts(Some(" 3 ".to_string())), (3, None));
        assert_eq!(
            parse_max_attempts(Some("five".to_string())),
            (DEFAULT_MAX_ATTEMPTS, Some("five".to_string()))
        );
        assert_eq!(
            parse_max_attempts(Some("-1".to_string())),
            (DEFAULT_MAX_ATTEMPTS, Some("-1".to_string()))
        );
    }

    #[test]
    fn test_non_numeric_attempts_rejected() {
        let (max_attempts, unparsed_max_attempts) = parse_max_attempts(Some("five".to_string()));
        let config = AwsClientConfig {
            max_attempts,
            unparsed_max_attempts,
            ..AwsClientConfig::default()
        };
        match config.validate() {
            Err(ConfigError::InvalidValue { field, value, .. }) => {
                assert_eq!(field, "VIEWGRANT_MAX_ATTEMPTS");
                assert_eq!(value, "five");
            }
            other => panic!("expected invalid value, got {:?}", other),
        }
    }

    #[test]
    fn test_retry_config_is_adaptive() {
        let config = AwsClientConfig {
            max_attempts: 7,
            ..AwsClientConfig::default()
        };
        let retry = config.retry_config();
        assert_eq!(retry.max_attempts(), 7);
        assert_eq!(retry.mode(), aws_config::retry::RetryMode::Adaptive);
    }
}
