//! In-memory gateway implementations.
//!
//! Every call is recorded so tests can assert on the exact sequence of grants,
//! links, publishes and ledger writes an invocation issued.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use viewgrant_core::{
    CatalogObject, CatalogObjectRef, DatabaseRef, GatewayError, GrantRecord, Permission,
};

use crate::{
    CatalogGateway, DatabaseLink, EventTransport, GatewayResult, IdentityGateway, LinkOutcome,
    OutboundEvent, PermissionGateway, PublishOutcome, SubscriptionLedger, TableLink,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ============================================================================
// CATALOG
// ============================================================================

/// In-memory catalog.
#[derive(Debug, Default)]
pub struct MockCatalog {
    objects: Mutex<HashMap<CatalogObjectRef, CatalogObject>>,
    failing: Mutex<HashSet<CatalogObjectRef>>,
    get_calls: Mutex<Vec<CatalogObjectRef>>,
    table_links: Mutex<BTreeMap<(String, String), TableLink>>,
    database_links: Mutex<BTreeMap<String, DatabaseLink>>,
    table_link_attempts: Mutex<usize>,
    database_link_attempts: Mutex<usize>,
}

impl MockCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, object: CatalogObject) {
        lock(&self.objects).insert(object.reference.clone(), object);
    }

    pub fn insert_table(&self, reference: CatalogObjectRef) {
        self.insert(CatalogObject::table(reference));
    }

    /// Insert a view with an already-encoded stored definition.
    pub fn insert_view(&self, reference: CatalogObjectRef, definition: impl Into<String>) {
        self.insert(CatalogObject::view(reference, definition));
    }

    /// Make `get_object` fail with a service error for this object.
    pub fn fail_on(&self, reference: CatalogObjectRef) {
        lock(&self.failing).insert(reference);
    }

    /// Number of `get_object` calls issued for an object.
    pub fn get_count(&self, reference: &CatalogObjectRef) -> usize {
        lock(&self.get_calls).iter().filter(|r| *r == reference).count()
    }

    pub fn total_get_count(&self) -> usize {
        lock(&self.get_calls).len()
    }

    pub fn table_links(&self) -> Vec<TableLink> {
        lock(&self.table_links).values().cloned().collect()
    }

    pub fn database_links(&self) -> Vec<DatabaseLink> {
        lock(&self.database_links).values().cloned().collect()
    }

    pub fn table_link_attempts(&self) -> usize {
        *lock(&self.table_link_attempts)
    }

    pub fn database_link_attempts(&self) -> usize {
        *lock(&self.database_link_attempts)
    }
}

#[async_trait]
impl CatalogGateway for MockCatalog {
    async fn get_object(&self, object: &CatalogObjectRef) -> GatewayResult<Option<CatalogObject>> {
        lock(&self.get_calls).push(object.clone());
        if lock(&self.failing).contains(object) {
            return Err(GatewayError::service(
                "catalog",
                "GetTable",
                format!("injected failure for {}", object),
            ));
        }
        Ok(lock(&self.objects).get(object).cloned())
    }

    async fn create_table_link(&self, link: &TableLink) -> GatewayResult<LinkOutcome> {
        *lock(&self.table_link_attempts) += 1;
        let mut links = lock(&self.table_links);
        let key = (link.database_name.clone(), link.name.clone());
        if links.contains_key(&key) {
            return Ok(LinkOutcome::AlreadyExists);
        }
        links.insert(key, link.clone());
        Ok(LinkOutcome::Created)
    }

    async fn create_database_link(&self, link: &DatabaseLink) -> GatewayResult<LinkOutcome> {
        *lock(&self.database_link_attempts) += 1;
        let mut links = lock(&self.database_links);
        if links.contains_key(&link.name) {
            return Ok(LinkOutcome::AlreadyExists);
        }
        links.insert(link.name.clone(), link.clone());
        Ok(LinkOutcome::Created)
    }
}

// ============================================================================
// PERMISSIONS
// ============================================================================

/// Resource a grant was issued on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum GrantTarget {
    Database(DatabaseRef),
    Table(CatalogObjectRef),
}

/// One recorded grant call.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GrantCall {
    pub target: GrantTarget,
    pub principal: String,
    pub permissions: Vec<Permission>,
    pub grantable: Vec<Permission>,
}

impl GrantCall {
    pub fn is_grantable(&self) -> bool {
        !self.grantable.is_empty()
    }
}

/// Records every grant; can be told to fail for specific principals.
#[derive(Debug, Default)]
pub struct MockPermissions {
    calls: Mutex<Vec<GrantCall>>,
    failing_principals: Mutex<HashSet<String>>,
}

impl MockPermissions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_for_principal(&self, principal: impl Into<String>) {
        lock(&self.failing_principals).insert(principal.into());
    }

    pub fn calls(&self) -> Vec<GrantCall> {
        lock(&self.calls).clone()
    }

    pub fn call_count(&self) -> usize {
        lock(&self.calls).len()
    }

    pub fn calls_for(&self, principal: &str) -> Vec<GrantCall> {
        lock(&self.calls)
            .iter()
            .filter(|c| c.principal == principal)
            .cloned()
            .collect()
    }

    /// Distinct grants issued, independent of call count or order.
    pub fn effective_grants(&self) -> BTreeSet<GrantCall> {
        lock(&self.calls).iter().cloned().collect()
    }

    fn record(&self, call: GrantCall) -> GatewayResult<()> {
        if lock(&self.failing_principals).contains(&call.principal) {
            return Err(GatewayError::service(
                "permissions",
                "GrantPermissions",
                format!("injected failure for {}", call.principal),
            ));
        }
        lock(&self.calls).push(call);
        Ok(())
    }
}

#[async_trait]
impl PermissionGateway for MockPermissions {
    async fn grant_database(
        &self,
        database: &DatabaseRef,
        principal: &str,
        permissions: &[Permission],
        grantable: &[Permission],
    ) -> GatewayResult<()> {
        self.record(GrantCall {
            target: GrantTarget::Database(database.clone()),
            principal: principal.to_string(),
            permissions: permissions.to_vec(),
            grantable: grantable.to_vec(),
        })
    }

    async fn grant_table(
        &self,
        table: &CatalogObjectRef,
        principal: &str,
        permissions: &[Permission],
        grantable: &[Permission],
    ) -> GatewayResult<()> {
        self.record(GrantCall {
            target: GrantTarget::Table(table.clone()),
            principal: principal.to_string(),
            permissions: permissions.to_vec(),
            grantable: grantable.to_vec(),
        })
    }
}

// ============================================================================
// IDENTITY
// ============================================================================

/// Fixed caller identity with an in-memory role policy table.
#[derive(Debug)]
pub struct MockIdentity {
    principal_arn: String,
    attached: Mutex<HashMap<String, BTreeSet<String>>>,
    attach_calls: Mutex<usize>,
}

impl Default for MockIdentity {
    fn default() -> Self {
        Self::new("arn:aws:iam::000000000000:role/viewgrant-handler")
    }
}

impl MockIdentity {
    pub fn new(principal_arn: impl Into<String>) -> Self {
        Self {
            principal_arn: principal_arn.into(),
            attached: Mutex::new(HashMap::new()),
            attach_calls: Mutex::new(0),
        }
    }

    pub fn principal_arn(&self) -> &str {
        &self.principal_arn
    }

    pub fn attached_policies(&self, role_arn: &str) -> BTreeSet<String> {
        lock(&self.attached).get(role_arn).cloned().unwrap_or_default()
    }

    pub fn attach_calls(&self) -> usize {
        *lock(&self.attach_calls)
    }
}

#[async_trait]
impl IdentityGateway for MockIdentity {
    async fn current_principal_arn(&self) -> GatewayResult<String> {
        Ok(self.principal_arn.clone())
    }

    async fn has_managed_policy(&self, role_arn: &str, policy_arn: &str) -> GatewayResult<bool> {
        Ok(lock(&self.attached)
            .get(role_arn)
            .is_some_and(|policies| policies.contains(policy_arn)))
    }

    async fn attach_managed_policy(&self, role_arn: &str, policy_arn: &str) -> GatewayResult<()> {
        *lock(&self.attach_calls) += 1;
        lock(&self.attached)
            .entry(role_arn.to_string())
            .or_default()
            .insert(policy_arn.to_string());
        Ok(())
    }
}

// ============================================================================
// TRANSPORT
// ============================================================================

/// Records published events; can simulate failed entries.
#[derive(Debug, Default)]
pub struct MockTransport {
    published: Mutex<Vec<OutboundEvent>>,
    failed_count: Mutex<i32>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report `failed_count` failed entries on every subsequent publish.
    pub fn set_failed_count(&self, failed_count: i32) {
        *lock(&self.failed_count) = failed_count;
    }

    pub fn published(&self) -> Vec<OutboundEvent> {
        lock(&self.published).clone()
    }

    pub fn published_count(&self) -> usize {
        lock(&self.published).len()
    }
}

#[async_trait]
impl EventTransport for MockTransport {
    async fn publish(&self, event: &OutboundEvent) -> GatewayResult<PublishOutcome> {
        let failed_count = *lock(&self.failed_count);
        if failed_count == 0 {
            lock(&self.published).push(event.clone());
        }
        Ok(PublishOutcome { failed_count })
    }
}

// ============================================================================
// LEDGER
// ============================================================================

/// Ledger keyed by the record triple.
#[derive(Debug, Default)]
pub struct MockLedger {
    records: Mutex<BTreeMap<String, GrantRecord>>,
    put_calls: Mutex<usize>,
}

impl MockLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<GrantRecord> {
        lock(&self.records).values().cloned().collect()
    }

    pub fn record_count(&self) -> usize {
        lock(&self.records).len()
    }

    pub fn put_calls(&self) -> usize {
        *lock(&self.put_calls)
    }
}

#[async_trait]
impl SubscriptionLedger for MockLedger {
    async fn put_record(&self, record: &GrantRecord) -> GatewayResult<()> {
        *lock(&self.put_calls) += 1;
        lock(&self.records).insert(record.record_key(), record.clone());
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================
