//! Consumer leg scenarios against in-memory gateways.
//!
//! **Property: Redelivery idempotence**
//!
//! Delivering the same consumer-phase event twice leaves the same grants,
//! resource links and role policies as delivering it once.

use proptest::prelude::*;
use viewgrant_choreography::Choreography;
use viewgrant_core::{ChoreographyConfig, LineageSet, Permission};
use viewgrant_gateway::LinkOutcome;
use viewgrant_test_utils::assertions::{
    assert_config_error, assert_granted_once, database, table,
};
use viewgrant_test_utils::fixtures::{
    self, consumer_event, producer_object, subscription, CONSUMER_ACCOUNT, CONSUMER_POLICY_ARN,
    HANDLER_ROLE_ARN, PRODUCER_ACCOUNT,
};
use viewgrant_test_utils::generators::arb_lineage_set;
use viewgrant_test_utils::MockGateways;

fn choreography(mocks: &MockGateways) -> Choreography {
    Choreography::new(mocks.gateways(), fixtures::config())
}

fn two_database_lineage() -> LineageSet {
    [
        producer_object("analytics", "daily_orders"),
        producer_object("finance", "invoices"),
    ]
    .into_iter()
    .collect()
}

#[tokio::test]
async fn test_two_tables_across_two_databases() {
    let mocks = fixtures::mock_gateways();
    let sub = subscription(CONSUMER_ACCOUNT);
    let role = sub.consumer_role_arn.clone();
    let lineage = two_database_lineage();
    let event = consumer_event(sub, &lineage);

    let summary = choreography(&mocks)
        .handle_consumer_phase(&event)
        .await
        .expect("consumer phase succeeds");

    assert_eq!(summary.self_principal, HANDLER_ROLE_ARN);
    assert_eq!(summary.table_link, LinkOutcome::Created);
    assert_eq!(summary.dependencies, 2);
    assert!(summary.policy_attached);

    let calls = mocks.permissions.calls();
    let me = HANDLER_ROLE_ARN;

    // Full control over the local consumer database.
    assert_granted_once(
        &calls,
        &database(CONSUMER_ACCOUNT, "orders_sub_db"),
        me,
        Permission::ALL,
        Permission::ALL,
    );

    // One self-grant with grant option per (database, table) pair.
    let root = producer_object("sales", "v_orders");
    assert_granted_once(&calls, &database(PRODUCER_ACCOUNT, "sales"), me, Permission::DESCRIBE, Permission::DESCRIBE);
    assert_granted_once(&calls, &table(&root), me, Permission::READ, Permission::READ);
    for dependent in lineage.iter() {
        assert_granted_once(
            &calls,
            &database(PRODUCER_ACCOUNT, &dependent.database_name),
            me,
            Permission::DESCRIBE,
            Permission::DESCRIBE,
        );
        assert_granted_once(&calls, &table(dependent), me, Permission::READ, Permission::READ);

        // One end-user grant per dependent table, without grant option.
        assert_granted_once(&calls, &table(dependent), &role, Permission::READ, Permission::NONE);
    }
    assert_eq!(mocks.permissions.calls_for(me).len(), 7);

    // Describe on every touched database, in both domains.
    for db in ["sales", "analytics", "finance"] {
        assert_granted_once(&calls, &database(PRODUCER_ACCOUNT, db), &role, Permission::DESCRIBE, Permission::NONE);
        assert_granted_once(&calls, &database(CONSUMER_ACCOUNT, db), &role, Permission::DESCRIBE, Permission::NONE);
    }
    assert_granted_once(&calls, &table(&root), &role, Permission::READ, Permission::NONE);
    assert_eq!(mocks.permissions.calls_for(&role).len(), 9);

    // One database link per distinct database, root database included.
    let links = mocks.catalog.database_links();
    assert_eq!(summary.database_links_created, 3);
    assert_eq!(
        links.iter().map(|l| l.name.as_str()).collect::<Vec<_>>(),
        vec!["analytics", "finance", "sales"]
    );
    assert!(links.iter().all(|l| l.target.catalog_id == PRODUCER_ACCOUNT));

    let table_links = mocks.catalog.table_links();
    assert_eq!(table_links.len(), 1);
    assert_eq!(table_links[0].database_name, "orders_sub_db");
    assert_eq!(table_links[0].name, "v_orders");
    assert_eq!(table_links[0].target, root);
    assert_eq!(table_links[0].target_region, "us-east-1");

    assert!(mocks.identity.attached_policies(&role).contains(CONSUMER_POLICY_ARN));
}

#[tokio::test]
async fn test_self_grants_precede_end_user_grants() {
    let mocks = fixtures::mock_gateways();
    let sub = subscription(CONSUMER_ACCOUNT);
    let role = sub.consumer_role_arn.clone();
    let lineage = two_database_lineage();

    choreography(&mocks)
        .handle_consumer_phase(&consumer_event(sub, &lineage))
        .await
        .expect("consumer phase succeeds");

    let calls = mocks.permissions.calls();
    for dependent in lineage.iter() {
        let target = table(dependent);
        let self_grant = calls
            .iter()
            .position(|c| c.target == target && c.principal == HANDLER_ROLE_ARN)
            .expect("self grant issued");
        let role_grant = calls
            .iter()
            .position(|c| c.target == target && c.principal == role)
            .expect("role grant issued");
        assert!(self_grant < role_grant);
    }
}

#[tokio::test]
async fn test_redelivery_converges() {
    let mocks = fixtures::mock_gateways();
    let sub = subscription(CONSUMER_ACCOUNT);
    let event = consumer_event(sub.clone(), &two_database_lineage());
    let choreography = choreography(&mocks);

    choreography.handle_consumer_phase(&event).await.expect("first delivery");
    let grants = mocks.permissions.effective_grants();
    let table_links = mocks.catalog.table_links();
    let database_links = mocks.catalog.database_links();

    let second = choreography.handle_consumer_phase(&event).await.expect("second delivery");

    assert_eq!(second.table_link, LinkOutcome::AlreadyExists);
    assert_eq!(second.database_links_created, 0);
    assert!(!second.policy_attached);
    assert_eq!(mocks.permissions.effective_grants(), grants);
    assert_eq!(mocks.catalog.table_links(), table_links);
    assert_eq!(mocks.catalog.database_links(), database_links);
    assert_eq!(mocks.identity.attach_calls(), 1);
    assert_eq!(
        mocks.identity.attached_policies(&sub.consumer_role_arn).len(),
        1
    );
}

#[tokio::test]
async fn test_same_account_skips_database_links() {
    let mocks = fixtures::mock_gateways();
    let sub = subscription(PRODUCER_ACCOUNT);
    let role = sub.consumer_role_arn.clone();

    let summary = choreography(&mocks)
        .handle_consumer_phase(&consumer_event(sub, &two_database_lineage()))
        .await
        .expect("consumer phase succeeds");

    assert_eq!(summary.database_links_created, 0);
    assert_eq!(mocks.catalog.database_link_attempts(), 0);

    // Producer and consumer domains coincide: one describe grant per database.
    let calls = mocks.permissions.calls();
    for db in ["sales", "analytics", "finance"] {
        assert_granted_once(&calls, &database(PRODUCER_ACCOUNT, db), &role, Permission::DESCRIBE, Permission::NONE);
    }
}

#[tokio::test]
async fn test_policy_already_attached_is_not_reattached() {
    let mocks = fixtures::mock_gateways();
    let sub = subscription(CONSUMER_ACCOUNT);
    {
        use viewgrant_gateway::IdentityGateway;
        mocks
            .identity
            .attach_managed_policy(&sub.consumer_role_arn, CONSUMER_POLICY_ARN)
            .await
            .expect("seed policy");
    }

    let summary = choreography(&mocks)
        .handle_consumer_phase(&consumer_event(sub, &LineageSet::new()))
        .await
        .expect("consumer phase succeeds");

    assert!(!summary.policy_attached);
    assert_eq!(mocks.identity.attach_calls(), 1);
}

#[tokio::test]
async fn test_missing_policy_config_fails_before_any_call() {
    let mocks = fixtures::mock_gateways();
    let choreography = Choreography::new(mocks.gateways(), ChoreographyConfig::default());

    let result = choreography
        .handle_consumer_phase(&consumer_event(subscription(CONSUMER_ACCOUNT), &two_database_lineage()))
        .await;

    assert_config_error(&result);
    assert_eq!(mocks.permissions.call_count(), 0);
    assert_eq!(mocks.catalog.table_link_attempts(), 0);
}

#[tokio::test]
async fn test_grant_failure_propagates() {
    let mocks = fixtures::mock_gateways();
    mocks.permissions.fail_for_principal(HANDLER_ROLE_ARN);

    let result = choreography(&mocks)
        .handle_consumer_phase(&consumer_event(subscription(CONSUMER_ACCOUNT), &two_database_lineage()))
        .await;

    assert!(matches!(result, Err(viewgrant_core::ViewgrantError::Gateway(_))));
    assert_eq!(mocks.catalog.table_link_attempts(), 0);
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .expect("Failed to build test runtime")
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    /// For any lineage and either account layout, two deliveries leave the
    /// same state as one.
    #[test]
    fn prop_consumer_phase_is_idempotent(
        lineage in arb_lineage_set(PRODUCER_ACCOUNT.to_string(), 6),
        cross_account in any::<bool>(),
    ) {
        let account = if cross_account { CONSUMER_ACCOUNT } else { PRODUCER_ACCOUNT };
        let event = consumer_event(subscription(account), &lineage);

        let once = fixtures::mock_gateways();
        let twice = fixtures::mock_gateways();
        let rt = runtime();
        rt.block_on(async {
            choreography(&once).handle_consumer_phase(&event).await?;
            let repeated = choreography(&twice);
            repeated.handle_consumer_phase(&event).await?;
            repeated.handle_consumer_phase(&event).await?;
            Ok::<_, viewgrant_core::ViewgrantError>(())
        })
        .map_err(|e| TestCaseError::fail(e.to_string()))?;

        prop_assert_eq!(once.permissions.effective_grants(), twice.permissions.effective_grants());
        prop_assert_eq!(once.catalog.table_links(), twice.catalog.table_links());
        prop_assert_eq!(once.catalog.database_links(), twice.catalog.database_links());
        prop_assert_eq!(
            once.identity.attached_policies(&event.subscription.consumer_role_arn),
            twice.identity.attached_policies(&event.subscription.consumer_role_arn)
        );
    }
}
