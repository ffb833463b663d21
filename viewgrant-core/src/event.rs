//! Typed event payloads for both choreography phases.
//!
//! Inbound payloads are validated at the boundary: once a
//! [`ProducerPhaseEvent`] or [`ConsumerPhaseEvent`] exists, its asset ARN
//! parses and every subscription field is populated.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::{
    CatalogObjectRef, LineageSet, PayloadError, SubscriptionAccount, TableArn, ViewgrantResult,
};

/// Detail-type of the raw catalog subscription event.
pub const SUBSCRIPTION_ACCEPTED_DETAIL_TYPE: &str = "Subscription Request Accepted";
/// Detail-type of the enriched event that triggers the producer leg.
pub const PRODUCER_PHASE_DETAIL_TYPE: &str = "Unmanaged Asset Subscription Request Accepted";
/// Detail-type of the event that triggers the consumer leg.
pub const CONSUMER_PHASE_DETAIL_TYPE: &str =
    "Unmanaged Asset Successfully Granted in Pub Environment";

const PRODUCER_EVENT: &str = "producer-phase";
const CONSUMER_EVENT: &str = "consumer-phase";

// ============================================================================
// ENVELOPE
// ============================================================================

/// Transport envelope around every inbound event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    #[serde(rename = "detail-type")]
    pub detail_type: String,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
    pub detail: Value,
}

/// A validated inbound event, routed by detail-type.
#[derive(Debug, Clone, PartialEq)]
pub enum ChoreographyEvent {
    Producer(ProducerPhaseEvent),
    Consumer(ConsumerPhaseEvent),
    /// `data.isManagedAsset` is set. The rest of the detail is not validated.
    Managed { detail_type: String },
}

impl EventEnvelope {
    /// Decode an envelope from raw JSON text.
    pub fn from_json(raw: &str) -> Result<Self, PayloadError> {
        serde_json::from_str(raw).map_err(|e| PayloadError::Invalid {
            event: "envelope".to_string(),
            reason: e.to_string(),
        })
    }

    /// Validate the detail against the shape its detail-type announces.
    ///
    /// A managed asset is recognized before validation, so its detail may
    /// omit every other field.
    pub fn route(&self) -> ViewgrantResult<ChoreographyEvent> {
        let known = matches!(
            self.detail_type.as_str(),
            PRODUCER_PHASE_DETAIL_TYPE
                | SUBSCRIPTION_ACCEPTED_DETAIL_TYPE
                | CONSUMER_PHASE_DETAIL_TYPE
        );
        if known && is_managed_asset(&self.detail) {
            return Ok(ChoreographyEvent::Managed {
                detail_type: self.detail_type.clone(),
            });
        }
        match self.detail_type.as_str() {
            PRODUCER_PHASE_DETAIL_TYPE | SUBSCRIPTION_ACCEPTED_DETAIL_TYPE => Ok(
                ChoreographyEvent::Producer(ProducerPhaseEvent::from_detail(&self.detail)?),
            ),
            CONSUMER_PHASE_DETAIL_TYPE => Ok(ChoreographyEvent::Consumer(
                ConsumerPhaseEvent::from_detail(&self.detail)?,
            )),
            other => Err(PayloadError::UnknownDetailType {
                detail_type: other.to_string(),
            }
            .into()),
        }
    }
}

/// Whether a raw detail flags its asset as centrally managed.
pub fn is_managed_asset(detail: &Value) -> bool {
    detail
        .pointer("/data/isManagedAsset")
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

// ============================================================================
// SHARED PARTS
// ============================================================================

/// The opaque `data` object. Only `isManagedAsset` is interpreted; everything
/// else is carried through to the consumer-phase event unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventData {
    #[serde(rename = "isManagedAsset")]
    pub is_managed_asset: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The subscribed asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetDescriptor {
    pub table_arn: String,
    pub table_name: String,
}

impl AssetDescriptor {
    pub fn arn(&self) -> Result<TableArn, crate::ArnError> {
        TableArn::parse(&self.table_arn)
    }
}

/// A dependent object as carried on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GlueDependency {
    pub database_name: String,
    pub table_name: String,
}

impl From<&CatalogObjectRef> for GlueDependency {
    fn from(object: &CatalogObjectRef) -> Self {
        Self {
            database_name: object.database_name.clone(),
            table_name: object.object_name.clone(),
        }
    }
}

// ============================================================================
// PRODUCER PHASE
// ============================================================================

/// Subscription accepted for a root asset; handled in the producer account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProducerPhaseEvent {
    pub data: EventData,
    pub asset: AssetDescriptor,
    pub subscriptions: Vec<SubscriptionAccount>,
}

impl ProducerPhaseEvent {
    pub fn from_detail(detail: &Value) -> ViewgrantResult<Self> {
        let event: Self = decode(PRODUCER_EVENT, detail)?;
        event.validate()?;
        Ok(event)
    }

    /// The parsed root asset ARN.
    pub fn root_arn(&self) -> ViewgrantResult<TableArn> {
        Ok(self.asset.arn()?)
    }

    fn validate(&self) -> ViewgrantResult<()> {
        self.asset.arn()?;
        for (idx, subscription) in self.subscriptions.iter().enumerate() {
            validate_subscription(PRODUCER_EVENT, &format!("subscriptions[{}]", idx), subscription)?;
        }
        Ok(())
    }
}

// ============================================================================
// CONSUMER PHASE
// ============================================================================

/// Emitted by the producer leg, one per subscribing environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsumerPhaseEvent {
    pub data: EventData,
    pub asset: AssetDescriptor,
    pub subscription: SubscriptionAccount,
    pub glue_dependencies: Vec<GlueDependency>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<Uuid>,
}

impl ConsumerPhaseEvent {
    pub fn new(
        data: EventData,
        asset: AssetDescriptor,
        subscription: SubscriptionAccount,
        lineage: &LineageSet,
    ) -> Self {
        Self {
            data,
            asset,
            subscription,
            glue_dependencies: lineage.iter().map(GlueDependency::from).collect(),
            correlation_id: Some(Uuid::now_v7()),
        }
    }

    pub fn from_detail(detail: &Value) -> ViewgrantResult<Self> {
        let event: Self = decode(CONSUMER_EVENT, detail)?;
        event.validate()?;
        Ok(event)
    }

    pub fn root_arn(&self) -> ViewgrantResult<TableArn> {
        Ok(self.asset.arn()?)
    }

    /// Dependent objects, all in the producer's catalog.
    pub fn dependencies(&self) -> ViewgrantResult<LineageSet> {
        let producer = self.root_arn()?.account_id;
        Ok(self
            .glue_dependencies
            .iter()
            .map(|d| CatalogObjectRef::new(producer.clone(), &d.database_name, &d.table_name))
            .collect())
    }

    fn validate(&self) -> ViewgrantResult<()> {
        self.asset.arn()?;
        validate_subscription(CONSUMER_EVENT, "subscription", &self.subscription)?;
        for (idx, dep) in self.glue_dependencies.iter().enumerate() {
            if dep.database_name.is_empty() || dep.table_name.is_empty() {
                return Err(PayloadError::InvalidValue {
                    event: CONSUMER_EVENT.to_string(),
                    field: format!("glueDependencies[{}]", idx),
                    reason: "database_name and table_name must be non-empty".to_string(),
                }
                .into());
            }
        }
        Ok(())
    }
}

// ============================================================================
// HELPERS
// ============================================================================

fn decode<T: for<'de> Deserialize<'de>>(event: &str, detail: &Value) -> Result<T, PayloadError> {
    if !detail.is_object() {
        return Err(PayloadError::Invalid {
            event: event.to_string(),
            reason: "detail must be a JSON object".to_string(),
        });
    }
    serde_json::from_value(detail.clone()).map_err(|e| PayloadError::Invalid {
        event: event.to_string(),
        reason: e.to_string(),
    })
}

fn validate_subscription(
    event: &str,
    path: &str,
    subscription: &SubscriptionAccount,
) -> Result<(), PayloadError> {
    let fields = [
        ("awsAccountId", &subscription.aws_account_id),
        ("region", &subscription.region),
        ("environmentId", &subscription.environment_id),
        ("glueConsumerDBName", &subscription.consumer_database_name),
        ("athenaUserRoleArn", &subscription.consumer_role_arn),
    ];
    for (name, value) in fields {
        if value.trim().is_empty() {
            return Err(PayloadError::MissingField {
                event: event.to_string(),
                field: format!("{}.{}", path, name),
            });
        }
    }
    if !subscription.aws_account_id.chars().all(|c| c.is_ascii_digit()) {
        return Err(PayloadError::InvalidValue {
            event: event.to_string(),
            field: format!("{}.awsAccountId", path),
            reason: format!("'{}' is not an account id", subscription.aws_account_id),
        });
    }
    Ok(())
}
