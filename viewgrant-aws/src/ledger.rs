//! DynamoDB subscription ledger.
//!
//! One item per (principal, root asset, dependent asset). The principal is
//! the partition key and `<root>#<dependent>` the sort key, so re-recording
//! the same grant overwrites the existing item.

use std::collections::HashMap;

use async_trait::async_trait;
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client;
use aws_types::SdkConfig;
use chrono::{SecondsFormat, Utc};
use viewgrant_core::{GatewayError, GrantRecord, Timestamp};
use viewgrant_gateway::{GatewayResult, SubscriptionLedger};

use crate::sdk_error;

const SERVICE: &str = "dynamodb";

#[derive(Debug, Clone)]
pub struct DynamoDbLedger {
    client: Client,
    table: String,
}

impl DynamoDbLedger {
    pub fn new(sdk: &SdkConfig, table: &str) -> Self {
        Self {
            client: Client::new(sdk),
            table: table.to_string(),
        }
    }
}

fn item(record: &GrantRecord, now: Timestamp) -> HashMap<String, AttributeValue> {
    let s = |v: String| AttributeValue::S(v);
    HashMap::from([
        ("principalArn".to_string(), s(record.principal_arn.clone())),
        ("targetGlueAsset".to_string(), s(record.sort_key())),
        (
            "targetAsset".to_string(),
            s(record.target_asset.qualified_name()),
        ),
        (
            "dependentAsset".to_string(),
            s(record.dependent_asset.qualified_name()),
        ),
        ("recordKey".to_string(), s(record.record_key())),
        (
            "recordedAt".to_string(),
            s(now.to_rfc3339_opts(SecondsFormat::Millis, true)),
        ),
    ])
}

#[async_trait]
impl SubscriptionLedger for DynamoDbLedger {
    async fn put_record(&self, record: &GrantRecord) -> GatewayResult<()> {
        self.client
            .put_item()
            .table_name(&self.table)
            .set_item(Some(item(record, Utc::now())))
            .send()
            .await
            .map_err(|e| sdk_error(SERVICE, "PutItem", e))?;
        tracing::debug!(
            table = %self.table,
            principal = %record.principal_arn,
            key = %record.sort_key(),
            "Recorded grant"
        );
        Ok(())
    }
}

/// Stands in when no table is configured. Every write fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnconfiguredLedger;

#[async_trait]
impl SubscriptionLedger for UnconfiguredLedger {
    async fn put_record(&self, _record: &GrantRecord) -> GatewayResult<()> {
        Err(GatewayError::Build {
            service: SERVICE.to_string(),
            reason: "SUBSCRIPTION_TABLE_NAME is not set".to_string(),
        })
    }
}
