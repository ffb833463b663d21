//! VIEWGRANT AWS - Production Gateways
//!
//! Gateway implementations on the AWS SDK:
//!
//! | Gateway | Service |
//! |---------|---------|
//! | [`GlueCatalog`] | Glue Data Catalog (objects and resource links) |
//! | [`LakeFormationPermissions`] | Lake Formation grants |
//! | [`AwsIdentity`] | STS caller identity, IAM role policies |
//! | [`EventBridgeTransport`] | EventBridge |
//! | [`DynamoDbLedger`] | DynamoDB |
//!
//! Retries for throttling-class failures are configured once on the shared
//! SDK config (see [`AwsClientConfig`]); gateways never retry on their own.

pub mod config;
pub mod events;
pub mod glue;
pub mod identity;
pub mod lakeformation;
pub mod ledger;

pub use config::AwsClientConfig;
pub use events::EventBridgeTransport;
pub use glue::GlueCatalog;
pub use identity::AwsIdentity;
pub use lakeformation::LakeFormationPermissions;
pub use ledger::{DynamoDbLedger, UnconfiguredLedger};

use std::sync::Arc;

use aws_sdk_glue::error::{DisplayErrorContext, SdkError};
use aws_types::SdkConfig;
use viewgrant_core::GatewayError;
use viewgrant_gateway::{Gateways, SubscriptionLedger};

/// Build every gateway from one loaded SDK config.
///
/// Only the producer leg writes to the ledger, so a missing table name is
/// not an error here; writes fail instead. Callers that know they run the
/// producer leg should check [`AwsClientConfig::require_ledger_table`] first.
pub fn gateways(sdk: &SdkConfig, config: &AwsClientConfig) -> Gateways {
    let ledger: Arc<dyn SubscriptionLedger> = match config.ledger_table.as_deref() {
        Some(table) => Arc::new(DynamoDbLedger::new(sdk, table)),
        None => Arc::new(UnconfiguredLedger),
    };
    Gateways {
        catalog: Arc::new(GlueCatalog::new(sdk)),
        permissions: Arc::new(LakeFormationPermissions::new(sdk)),
        identity: Arc::new(AwsIdentity::new(sdk)),
        transport: Arc::new(EventBridgeTransport::new(sdk)),
        ledger,
    }
}

/// Flatten an SDK error, including its source chain, into a gateway error.
pub(crate) fn sdk_error<E, R>(service: &str, operation: &str, err: SdkError<E, R>) -> GatewayError
where
    E: std::error::Error + Send + Sync + 'static,
    R: std::fmt::Debug + Send + Sync + 'static,
{
    let message = DisplayErrorContext(&err).to_string();
    tracing::error!(service, operation, error = %message, "AWS call failed");
    GatewayError::service(service, operation, message)
}

/// A request builder rejected its input.
pub(crate) fn build_error(service: &str, err: impl std::fmt::Display) -> GatewayError {
    GatewayError::Build {
        service: service.to_string(),
        reason: err.to_string(),
    }
}
