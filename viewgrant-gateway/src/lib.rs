//! VIEWGRANT Gateway - External Collaborator Traits and Mocks
//!
//! Defines the boundary to the catalog, permission, identity, transport and
//! ledger services. Production implementations live in `viewgrant-aws`;
//! the in-memory mocks in [`mock`] back tests and dry runs.

pub mod mock;

pub use mock::{
    GrantCall, GrantTarget, MockCatalog, MockIdentity, MockLedger, MockPermissions,
    MockTransport,
};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use viewgrant_core::{
    CatalogObject, CatalogObjectRef, DatabaseRef, GatewayError, GrantRecord, Permission,
};

/// Result type for gateway calls.
pub type GatewayResult<T> = Result<T, GatewayError>;

// ============================================================================
// REQUEST TYPES
// ============================================================================

/// A table resource link: `database_name.name` in the local catalog pointing
/// at `target` in `target_region`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableLink {
    pub database_name: String,
    pub name: String,
    pub target: CatalogObjectRef,
    pub target_region: String,
}

/// A database resource link: `name` in the local catalog pointing at
/// `target` in `target_region`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DatabaseLink {
    pub name: String,
    pub target: DatabaseRef,
    pub target_region: String,
}

/// Outcome of a resource-link creation. An existing link is not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkOutcome {
    Created,
    AlreadyExists,
}

/// One outbound event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundEvent {
    pub bus_arn: String,
    pub source: String,
    pub detail_type: String,
    /// JSON-encoded detail.
    pub detail: String,
}

/// Transport response to a publish call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PublishOutcome {
    pub failed_count: i32,
}

// ============================================================================
// GATEWAY TRAITS
// ============================================================================

/// Read access to object definitions plus resource-link creation.
#[async_trait]
pub trait CatalogGateway: Send + Sync {
    /// Fetch an object. `Ok(None)` when the catalog reports it does not exist.
    async fn get_object(&self, object: &CatalogObjectRef) -> GatewayResult<Option<CatalogObject>>;

    /// Create a table resource link.
    async fn create_table_link(&self, link: &TableLink) -> GatewayResult<LinkOutcome>;

    /// Create a database resource link.
    async fn create_database_link(&self, link: &DatabaseLink) -> GatewayResult<LinkOutcome>;
}

/// Grant operations against an authorization domain.
///
/// The domain is selected by the catalog id carried in the resource.
#[async_trait]
pub trait PermissionGateway: Send + Sync {
    async fn grant_database(
        &self,
        database: &DatabaseRef,
        principal: &str,
        permissions: &[Permission],
        grantable: &[Permission],
    ) -> GatewayResult<()>;

    async fn grant_table(
        &self,
        table: &CatalogObjectRef,
        principal: &str,
        permissions: &[Permission],
        grantable: &[Permission],
    ) -> GatewayResult<()>;
}

/// Caller identity and role policy management.
#[async_trait]
pub trait IdentityGateway: Send + Sync {
    /// ARN of the principal the service runs as.
    async fn current_principal_arn(&self) -> GatewayResult<String>;

    async fn has_managed_policy(&self, role_arn: &str, policy_arn: &str) -> GatewayResult<bool>;

    async fn attach_managed_policy(&self, role_arn: &str, policy_arn: &str) -> GatewayResult<()>;
}

/// Asynchronous event transport.
#[async_trait]
pub trait EventTransport: Send + Sync {
    async fn publish(&self, event: &OutboundEvent) -> GatewayResult<PublishOutcome>;
}

/// Durable record of issued grants.
#[async_trait]
pub trait SubscriptionLedger: Send + Sync {
    /// Idempotent upsert keyed by the record triple.
    async fn put_record(&self, record: &GrantRecord) -> GatewayResult<()>;
}

// ============================================================================
// BUNDLE
// ============================================================================

/// The full set of collaborators one invocation talks to.
#[derive(Clone)]
pub struct Gateways {
    pub catalog: Arc<dyn CatalogGateway>,
    pub permissions: Arc<dyn PermissionGateway>,
    pub identity: Arc<dyn IdentityGateway>,
    pub transport: Arc<dyn EventTransport>,
    pub ledger: Arc<dyn SubscriptionLedger>,
}

impl std::fmt::Debug for Gateways {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateways").finish_non_exhaustive()
    }
}

/// Handles to in-memory gateways, kept for inspection after a run.
#[derive(Debug, Clone, Default)]
pub struct MockGateways {
    pub catalog: Arc<MockCatalog>,
    pub permissions: Arc<MockPermissions>,
    pub identity: Arc<MockIdentity>,
    pub transport: Arc<MockTransport>,
    pub ledger: Arc<MockLedger>,
}

impl MockGateways {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mocks whose identity reports `principal_arn`.
    pub fn with_principal(principal_arn: impl Into<String>) -> Self {
        Self {
            identity: Arc::new(MockIdentity::new(principal_arn)),
            ..Self::default()
        }
    }

    /// Trait-object view over the same mocks.
    pub fn gateways(&self) -> Gateways {
        Gateways {
            catalog: self.catalog.clone(),
            permissions: self.permissions.clone(),
            identity: self.identity.clone(),
            transport: self.transport.clone(),
            ledger: self.ledger.clone(),
        }
    }
}
