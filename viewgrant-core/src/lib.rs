//! VIEWGRANT Core - Data Model
//!
//! Pure data structures shared by the lineage resolver, the grant
//! choreography and the gateway implementations. No I/O lives here.

pub mod arn;
pub mod config;
pub mod error;
pub mod event;

pub use arn::{event_bus_arn, TableArn};
pub use config::ChoreographyConfig;
pub use error::{
    ArnError, ChoreographyError, ConfigError, GatewayError, PayloadError, ResolutionError,
    ViewgrantError, ViewgrantResult,
};
pub use event::{
    AssetDescriptor, ChoreographyEvent, ConsumerPhaseEvent, EventData, EventEnvelope,
    GlueDependency, ProducerPhaseEvent, CONSUMER_PHASE_DETAIL_TYPE, PRODUCER_PHASE_DETAIL_TYPE,
    is_managed_asset, SUBSCRIPTION_ACCEPTED_DETAIL_TYPE,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::fmt;

// ============================================================================
// IDENTITY TYPES
// ============================================================================

/// Principal identifier understood by the permission service: an account id
/// for cross-account shares, or a role ARN for local principals.
pub type PrincipalId = String;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// Catalog table type reported for engine views.
pub const VIRTUAL_VIEW_TABLE_TYPE: &str = "VIRTUAL_VIEW";

// ============================================================================
// CATALOG OBJECTS
// ============================================================================

/// Identifies a table or view. Equality is structural.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CatalogObjectRef {
    pub catalog_id: String,
    pub database_name: String,
    pub object_name: String,
}

impl CatalogObjectRef {
    pub fn new(
        catalog_id: impl Into<String>,
        database_name: impl Into<String>,
        object_name: impl Into<String>,
    ) -> Self {
        Self {
            catalog_id: catalog_id.into(),
            database_name: database_name.into(),
            object_name: object_name.into(),
        }
    }

    /// `<database>.<object>`
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.database_name, self.object_name)
    }

    /// Another object in the same catalog.
    pub fn sibling(&self, database_name: &str, object_name: &str) -> Self {
        Self::new(self.catalog_id.clone(), database_name, object_name)
    }

    /// The database this object lives in.
    pub fn database(&self) -> DatabaseRef {
        DatabaseRef {
            catalog_id: self.catalog_id.clone(),
            database_name: self.database_name.clone(),
        }
    }
}

impl fmt::Display for CatalogObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.database_name, self.object_name)
    }
}

/// A database inside a catalog.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DatabaseRef {
    pub catalog_id: String,
    pub database_name: String,
}

impl fmt::Display for DatabaseRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.database_name)
    }
}

/// Kind of catalog object as far as lineage is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectKind {
    Table,
    View,
    /// The catalog reported "not found". A resolution leaf, not an error.
    Unknown,
}

impl ObjectKind {
    /// Map a catalog table-type string to a kind.
    pub fn from_table_type(table_type: Option<&str>) -> Self {
        match table_type {
            Some(t) if t == VIRTUAL_VIEW_TABLE_TYPE => ObjectKind::View,
            _ => ObjectKind::Table,
        }
    }
}

/// A fetched catalog object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogObject {
    pub reference: CatalogObjectRef,
    pub kind: ObjectKind,
    /// Stored (engine-encoded) view definition, when the object is a view.
    pub definition: Option<String>,
}

impl CatalogObject {
    pub fn table(reference: CatalogObjectRef) -> Self {
        Self {
            reference,
            kind: ObjectKind::Table,
            definition: None,
        }
    }

    pub fn view(reference: CatalogObjectRef, definition: impl Into<String>) -> Self {
        Self {
            reference,
            kind: ObjectKind::View,
            definition: Some(definition.into()),
        }
    }

    pub fn unknown(reference: CatalogObjectRef) -> Self {
        Self {
            reference,
            kind: ObjectKind::Unknown,
            definition: None,
        }
    }

    pub fn is_view(&self) -> bool {
        self.kind == ObjectKind::View
    }
}

// ============================================================================
// LINEAGE
// ============================================================================

/// Deduplicated set of catalog objects a root object depends on.
///
/// Recomputed on demand, never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineageSet {
    objects: BTreeSet<CatalogObjectRef>,
}

impl LineageSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if the object was not already present.
    pub fn insert(&mut self, object: CatalogObjectRef) -> bool {
        self.objects.insert(object)
    }

    pub fn union_with(&mut self, other: &LineageSet) {
        self.objects.extend(other.objects.iter().cloned());
    }

    pub fn contains(&self, object: &CatalogObjectRef) -> bool {
        self.objects.contains(object)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CatalogObjectRef> {
        self.objects.iter()
    }

    /// Distinct databases touched by the set.
    pub fn databases(&self) -> BTreeSet<DatabaseRef> {
        self.objects.iter().map(CatalogObjectRef::database).collect()
    }

    pub fn into_vec(self) -> Vec<CatalogObjectRef> {
        self.objects.into_iter().collect()
    }
}

impl FromIterator<CatalogObjectRef> for LineageSet {
    fn from_iter<I: IntoIterator<Item = CatalogObjectRef>>(iter: I) -> Self {
        Self {
            objects: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for LineageSet {
    type Item = CatalogObjectRef;
    type IntoIter = std::collections::btree_set::IntoIter<CatalogObjectRef>;

    fn into_iter(self) -> Self::IntoIter {
        self.objects.into_iter()
    }
}

// ============================================================================
// SUBSCRIPTIONS & GRANTS
// ============================================================================

/// One environment subscribed to a listing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionAccount {
    pub aws_account_id: String,
    pub region: String,
    pub environment_id: String,
    #[serde(rename = "glueConsumerDBName")]
    pub consumer_database_name: String,
    #[serde(rename = "athenaUserRoleArn")]
    pub consumer_role_arn: String,
}

/// Permissions understood by the permission service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Permission {
    All,
    Select,
    Describe,
}

impl Permission {
    /// SELECT + DESCRIBE.
    pub const READ: &'static [Permission] = &[Permission::Select, Permission::Describe];
    /// DESCRIBE only.
    pub const DESCRIBE: &'static [Permission] = &[Permission::Describe];
    /// Full control.
    pub const ALL: &'static [Permission] = &[Permission::All];
    /// No grant option.
    pub const NONE: &'static [Permission] = &[];

    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::All => "ALL",
            Permission::Select => "SELECT",
            Permission::Describe => "DESCRIBE",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ledger entry: `principal` was granted access to `dependent_asset`
/// because it subscribed to `target_asset`. Keyed by the triple.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GrantRecord {
    pub principal_arn: PrincipalId,
    pub target_asset: CatalogObjectRef,
    pub dependent_asset: CatalogObjectRef,
}

impl GrantRecord {
    pub fn new(
        principal_arn: impl Into<PrincipalId>,
        target_asset: CatalogObjectRef,
        dependent_asset: CatalogObjectRef,
    ) -> Self {
        Self {
            principal_arn: principal_arn.into(),
            target_asset,
            dependent_asset,
        }
    }

    /// Sort key under the principal partition: `<root>#<dependent>`.
    pub fn sort_key(&self) -> String {
        format!(
            "{}#{}",
            self.target_asset.qualified_name(),
            self.dependent_asset.qualified_name()
        )
    }

    /// Hex SHA-256 over the full triple, catalog ids included.
    pub fn record_key(&self) -> String {
        let mut hasher = Sha256::new();
        for part in [
            self.principal_arn.as_str(),
            self.target_asset.catalog_id.as_str(),
            self.target_asset.database_name.as_str(),
            self.target_asset.object_name.as_str(),
            self.dependent_asset.catalog_id.as_str(),
            self.dependent_asset.database_name.as_str(),
            self.dependent_asset.object_name.as_str(),
        ] {
            hasher.update(part.as_bytes());
            hasher.update([0u8]);
        }
        hex::encode(hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obj(db: &str, name: &str) -> CatalogObjectRef {
        CatalogObjectRef::new("111111111111", db, name)
    }

    #[test]
    fn test_catalog_object_ref_structural_equality() {
        assert_eq!(obj("sales", "orders"), obj("sales", "orders"));
        assert_ne!(obj("sales", "orders"), obj("crm", "orders"));
        assert_ne!(
            obj("sales", "orders"),
            CatalogObjectRef::new("222222222222", "sales", "orders")
        );
    }

    #[test]
    fn test_lineage_set_dedups() {
        let mut set = LineageSet::new();
        assert!(set.insert(obj("sales", "orders")));
        assert!(!set.insert(obj("sales", "orders")));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_lineage_set_databases_distinct() {
        let set: LineageSet = [obj("sales", "orders"), obj("sales", "items"), obj("crm", "c")]
            .into_iter()
            .collect();
        let dbs: Vec<String> = set.databases().into_iter().map(|d| d.database_name).collect();
        assert_eq!(dbs, vec!["crm".to_string(), "sales".to_string()]);
    }

    #[test]
    fn test_object_kind_from_table_type() {
        assert_eq!(ObjectKind::from_table_type(Some("VIRTUAL_VIEW")), ObjectKind::View);
        assert_eq!(ObjectKind::from_table_type(Some("EXTERNAL_TABLE")), ObjectKind::Table);
        assert_eq!(ObjectKind::from_table_type(None), ObjectKind::Table);
    }

    #[test]
    fn test_grant_record_keys() {
        let a = GrantRecord::new("222222222222", obj("sales", "v_orders"), obj("crm", "customers"));
        let b = GrantRecord::new("222222222222", obj("sales", "v_orders"), obj("crm", "customers"));
        let c = GrantRecord::new("333333333333", obj("sales", "v_orders"), obj("crm", "customers"));
        assert_eq!(a.sort_key(), "sales.v_orders#crm.customers");
        assert_eq!(a.record_key(), b.record_key());
        assert_ne!(a.record_key(), c.record_key());
        assert_eq!(a.record_key().len(), 64);
    }

    #[test]
    fn test_subscription_account_wire_names() {
        let json = serde_json::json!({
            "awsAccountId": "222222222222",
            "region": "us-east-1",
            "environmentId": "env-1",
            "athenaUserRoleArn": "arn:aws:iam::222222222222:role/datazone_usr_x",
            "glueConsumerDBName": "consumer_db",
        });
        let sub: SubscriptionAccount = serde_json::from_value(json).expect("valid subscription");
        assert_eq!(sub.consumer_database_name, "consumer_db");
        assert_eq!(sub.consumer_role_arn, "arn:aws:iam::222222222222:role/datazone_usr_x");
    }

    #[test]
    fn test_permission_wire_names() {
        assert_eq!(
            serde_json::to_value(Permission::Select).expect("serialize"),
            serde_json::json!("SELECT")
        );
        assert_eq!(Permission::All.to_string(), "ALL");
    }
}
