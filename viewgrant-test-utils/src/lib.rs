//! VIEWGRANT Test Utilities
//!
//! Centralized test infrastructure for the VIEWGRANT workspace:
//! - Proptest generators for catalog references, subscriptions and ARNs
//! - Test fixtures for the producer/consumer scenarios
//! - Custom assertions over recorded gateway calls and error variants

// Re-export mock gateways from their source crate
pub use viewgrant_gateway::{
    GrantCall, GrantTarget, MockCatalog, MockGateways, MockIdentity, MockLedger, MockPermissions,
    MockTransport,
};

// Re-export core types for convenience
pub use viewgrant_core::{
    AssetDescriptor, CatalogObjectRef, ChoreographyConfig, ChoreographyError, ConsumerPhaseEvent,
    DatabaseRef, EventData, GatewayError, LineageSet, PayloadError, Permission,
    ProducerPhaseEvent, ResolutionError, SubscriptionAccount, TableArn, ViewgrantError,
    ViewgrantResult,
};

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for VIEWGRANT types.

    use super::*;
    use proptest::prelude::*;

    /// Generate a 12-digit account id.
    pub fn arb_account_id() -> impl Strategy<Value = String> {
        "[1-9][0-9]{11}"
    }

    pub fn arb_region() -> impl Strategy<Value = String> {
        prop_oneof![
            Just("us-east-1".to_string()),
            Just("us-west-2".to_string()),
            Just("eu-west-1".to_string()),
            Just("ap-southeast-2".to_string()),
        ]
    }

    /// Generate a lower-case catalog identifier.
    pub fn arb_identifier() -> impl Strategy<Value = String> {
        "[a-z][a-z0-9_]{0,15}"
    }

    pub fn arb_catalog_object_ref(catalog_id: String) -> impl Strategy<Value = CatalogObjectRef> {
        (arb_identifier(), arb_identifier())
            .prop_map(move |(db, name)| CatalogObjectRef::new(catalog_id.clone(), db, name))
    }

    /// Generate a lineage set of up to `max` objects in one catalog.
    pub fn arb_lineage_set(catalog_id: String, max: usize) -> impl Strategy<Value = LineageSet> {
        proptest::collection::vec(arb_catalog_object_ref(catalog_id), 0..=max)
            .prop_map(|objects| objects.into_iter().collect())
    }

    pub fn arb_table_arn() -> impl Strategy<Value = TableArn> {
        (arb_region(), arb_account_id(), arb_identifier(), arb_identifier()).prop_map(
            |(region, account_id, database, table)| TableArn {
                partition: "aws".to_string(),
                service: "glue".to_string(),
                region,
                account_id,
                database,
                table,
            },
        )
    }

    /// Generate a subscription for a given account.
    pub fn arb_subscription_account(account_id: String) -> impl Strategy<Value = SubscriptionAccount> {
        (arb_region(), "[a-z0-9]{8,14}", arb_identifier()).prop_map(
            move |(region, environment_id, database)| SubscriptionAccount {
                aws_account_id: account_id.clone(),
                region,
                environment_id: environment_id.clone(),
                consumer_database_name: format!("{}_sub_db", database),
                consumer_role_arn: format!(
                    "arn:aws:iam::{}:role/datazone_usr_{}",
                    account_id, environment_id
                ),
            },
        )
    }

    /// Generate up to `max` subscriptions, drawing accounts from a small pool
    /// so duplicates occur.
    pub fn arb_subscriptions(max: usize) -> impl Strategy<Value = Vec<SubscriptionAccount>> {
        proptest::collection::vec(
            prop_oneof![
                Just(super::fixtures::PRODUCER_ACCOUNT.to_string()),
                Just(super::fixtures::CONSUMER_ACCOUNT.to_string()),
                Just("333333333333".to_string()),
                Just("444444444444".to_string()),
            ]
            .prop_flat_map(arb_subscription_account),
            1..=max,
        )
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built fixtures for the common producer/consumer scenarios.

    use super::*;
    use viewgrant_lineage::encode_view_definition;

    pub const PRODUCER_ACCOUNT: &str = "111111111111";
    pub const CONSUMER_ACCOUNT: &str = "222222222222";
    pub const REGION: &str = "us-east-1";
    pub const CONSUMER_POLICY_ARN: &str =
        "arn:aws:iam::222222222222:policy/datazone-user-cross-account-read";
    pub const HANDLER_ROLE_ARN: &str = "arn:aws:iam::222222222222:role/viewgrant-handler";

    /// An object in the producer catalog.
    pub fn producer_object(database: &str, name: &str) -> CatalogObjectRef {
        CatalogObjectRef::new(PRODUCER_ACCOUNT, database, name)
    }

    pub fn table_arn(database: &str, table: &str) -> String {
        format!(
            "arn:aws:glue:{}:{}:table/{}/{}",
            REGION, PRODUCER_ACCOUNT, database, table
        )
    }

    /// Populate `catalog` with:
    ///
    /// ```text
    /// sales.v_orders    -> sales.orders, sales.v_customers
    /// sales.v_customers -> crm.customers
    /// ```
    pub fn orders_catalog(catalog: &MockCatalog) {
        catalog.insert_view(
            producer_object("sales", "v_orders"),
            encode_view_definition(
                "SELECT o.id, o.total, c.name \
                 FROM orders o JOIN v_customers c ON o.customer_id = c.id",
            ),
        );
        catalog.insert_view(
            producer_object("sales", "v_customers"),
            encode_view_definition("SELECT id, name FROM crm.customers WHERE active = true"),
        );
        catalog.insert_table(producer_object("sales", "orders"));
        catalog.insert_table(producer_object("crm", "customers"));
    }

    /// The expected lineage of `sales.v_orders` in [`orders_catalog`].
    pub fn orders_lineage() -> LineageSet {
        [
            producer_object("sales", "orders"),
            producer_object("sales", "v_customers"),
            producer_object("crm", "customers"),
        ]
        .into_iter()
        .collect()
    }

    pub fn subscription(account_id: &str) -> SubscriptionAccount {
        SubscriptionAccount {
            aws_account_id: account_id.to_string(),
            region: REGION.to_string(),
            environment_id: format!("env{}", &account_id[..4.min(account_id.len())]),
            consumer_database_name: "orders_sub_db".to_string(),
            consumer_role_arn: format!("arn:aws:iam::{}:role/datazone_usr_role", account_id),
        }
    }

    pub fn event_data(is_managed_asset: bool) -> EventData {
        let mut extra = serde_json::Map::new();
        extra.insert(
            "listingId".to_string(),
            serde_json::Value::String("listing-42".to_string()),
        );
        EventData {
            is_managed_asset,
            extra,
        }
    }

    pub fn asset(database: &str, table: &str) -> AssetDescriptor {
        AssetDescriptor {
            table_arn: table_arn(database, table),
            table_name: table.to_string(),
        }
    }

    /// Producer-phase event for `sales.v_orders`.
    pub fn producer_event(subscriptions: Vec<SubscriptionAccount>, managed: bool) -> ProducerPhaseEvent {
        ProducerPhaseEvent {
            data: event_data(managed),
            asset: asset("sales", "v_orders"),
            subscriptions,
        }
    }

    /// Consumer-phase event for `sales.v_orders` carrying `dependencies`.
    pub fn consumer_event(
        subscription: SubscriptionAccount,
        dependencies: &LineageSet,
    ) -> ConsumerPhaseEvent {
        ConsumerPhaseEvent::new(
            event_data(false),
            asset("sales", "v_orders"),
            subscription,
            dependencies,
        )
    }

    pub fn config() -> ChoreographyConfig {
        ChoreographyConfig::default().with_consumer_managed_policy_arn(CONSUMER_POLICY_ARN)
    }

    /// Mocks running as the handler role in the consumer account.
    pub fn mock_gateways() -> MockGateways {
        MockGateways::with_principal(HANDLER_ROLE_ARN)
    }

    /// Raw envelope JSON as delivered by the event bus.
    pub fn envelope_json(detail_type: &str, detail: &serde_json::Value) -> String {
        serde_json::json!({
            "version": "0",
            "id": "6a7e8feb-b491-4cf7-a9f1-bf3703467718",
            "detail-type": detail_type,
            "source": "custom.datazone",
            "account": PRODUCER_ACCOUNT,
            "time": "2026-10-16T09:00:00Z",
            "region": REGION,
            "resources": [],
            "detail": detail,
        })
        .to_string()
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions over recorded gateway calls and error variants.

    use super::*;

    /// Assert that a ViewgrantResult is Ok.
    #[track_caller]
    pub fn assert_ok<T: std::fmt::Debug>(result: &ViewgrantResult<T>) {
        assert!(result.is_ok(), "Expected Ok, got Err: {:?}", result);
    }

    /// Assert that a ViewgrantResult is a Payload error.
    #[track_caller]
    pub fn assert_payload_error<T: std::fmt::Debug>(result: &ViewgrantResult<T>) {
        match result {
            Err(ViewgrantError::Payload(_)) => {}
            other => panic!("Expected Payload error, got: {:?}", other),
        }
    }

    /// Assert that a ViewgrantResult is a malformed-definition error.
    #[track_caller]
    pub fn assert_malformed_definition<T: std::fmt::Debug>(result: &ViewgrantResult<T>) {
        match result {
            Err(ViewgrantError::Resolution(ResolutionError::MalformedDefinition { .. })) => {}
            other => panic!("Expected MalformedDefinition error, got: {:?}", other),
        }
    }

    /// Assert that a ViewgrantResult is a publish failure.
    #[track_caller]
    pub fn assert_publish_failed<T: std::fmt::Debug>(result: &ViewgrantResult<T>) {
        match result {
            Err(ViewgrantError::Choreography(ChoreographyError::PublishFailed { .. })) => {}
            other => panic!("Expected PublishFailed error, got: {:?}", other),
        }
    }

    /// Assert that a ViewgrantResult is a subscriber failure for `principal`.
    #[track_caller]
    pub fn assert_subscriber_failed<T: std::fmt::Debug>(result: &ViewgrantResult<T>, principal: &str) {
        match result {
            Err(ViewgrantError::Choreography(ChoreographyError::Subscriber {
                principal: failed,
                ..
            })) => assert_eq!(failed, principal, "Wrong subscriber in error"),
            other => panic!("Expected Subscriber error for {}, got: {:?}", principal, other),
        }
    }

    /// Assert that a ViewgrantResult is a Config error.
    #[track_caller]
    pub fn assert_config_error<T: std::fmt::Debug>(result: &ViewgrantResult<T>) {
        match result {
            Err(ViewgrantError::Config(_)) => {}
            other => panic!("Expected Config error, got: {:?}", other),
        }
    }

    /// Assert that exactly one call granted `permissions` with `grantable` on
    /// `target` to `principal`.
    #[track_caller]
    pub fn assert_granted_once(
        calls: &[GrantCall],
        target: &GrantTarget,
        principal: &str,
        permissions: &[Permission],
        grantable: &[Permission],
    ) {
        let matching = calls
            .iter()
            .filter(|c| {
                &c.target == target
                    && c.principal == principal
                    && c.permissions == permissions
                    && c.grantable == grantable
            })
            .count();
        assert_eq!(
            matching, 1,
            "Expected exactly one grant of {:?} (grantable {:?}) on {:?} to {}, found {}",
            permissions, grantable, target, principal, matching
        );
    }

    /// Assert that no call granted anything to `principal`.
    #[track_caller]
    pub fn assert_no_grants_for(calls: &[GrantCall], principal: &str) {
        let found: Vec<_> = calls.iter().filter(|c| c.principal == principal).collect();
        assert!(found.is_empty(), "Expected no grants to {}, found {:?}", principal, found);
    }

    pub fn table(object: &CatalogObjectRef) -> GrantTarget {
        GrantTarget::Table(object.clone())
    }

    pub fn database(catalog_id: &str, database_name: &str) -> GrantTarget {
        GrantTarget::Database(DatabaseRef {
            catalog_id: catalog_id.to_string(),
            database_name: database_name.to_string(),
        })
    }
}

// ============================================================================
// TESTS
// ============================================================================
