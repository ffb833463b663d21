//! Envelope-to-outcome scenarios against in-memory gateways.
//!
//! The producer leg's outbound event is fed back through the handler as the
//! consumer leg's inbound envelope, covering the full two-phase flow.

use viewgrant_choreography::Outcome;
use viewgrant_core::{
    ChoreographyEvent, CONSUMER_PHASE_DETAIL_TYPE, PRODUCER_PHASE_DETAIL_TYPE,
    SUBSCRIPTION_ACCEPTED_DETAIL_TYPE,
};
use viewgrant_gateway::LinkOutcome;
use viewgrant_handler::{decode, dispatch, DryRunReport};
use viewgrant_test_utils::assertions::{assert_granted_once, assert_payload_error, table};
use viewgrant_test_utils::fixtures::{
    self, orders_catalog, orders_lineage, producer_event, producer_object, subscription,
    CONSUMER_ACCOUNT,
};
use viewgrant_test_utils::{MockGateways, Permission};

fn producer_envelope(detail_type: &str) -> String {
    let event = producer_event(vec![subscription(CONSUMER_ACCOUNT)], false);
    let detail = serde_json::to_value(&event).expect("serialize producer event");
    fixtures::envelope_json(detail_type, &detail)
}

#[test]
fn test_routes_both_producer_detail_types() {
    for detail_type in [PRODUCER_PHASE_DETAIL_TYPE, SUBSCRIPTION_ACCEPTED_DETAIL_TYPE] {
        let event = decode(&producer_envelope(detail_type)).expect("routable");
        assert!(matches!(event, ChoreographyEvent::Producer(_)));
    }
}

#[test]
fn test_unknown_detail_type_is_rejected() {
    let raw = fixtures::envelope_json("Listing Created", &serde_json::json!({}));
    assert_payload_error(&decode(&raw));
}

#[test]
fn test_producer_detail_missing_asset_is_rejected() {
    let raw = fixtures::envelope_json(
        PRODUCER_PHASE_DETAIL_TYPE,
        &serde_json::json!({ "data": {}, "subscriptions": [] }),
    );
    assert_payload_error(&decode(&raw));
}

#[tokio::test]
async fn test_managed_asset_without_asset_is_a_no_op() {
    let raw = fixtures::envelope_json(
        SUBSCRIPTION_ACCEPTED_DETAIL_TYPE,
        &serde_json::json!({ "data": { "isManagedAsset": true } }),
    );
    let event = decode(&raw).expect("managed asset needs no other field");
    assert!(matches!(event, ChoreographyEvent::Managed { .. }));

    let mocks = fixtures::mock_gateways();
    let outcome = dispatch(&event, mocks.gateways(), fixtures::config())
        .await
        .expect("managed asset succeeds");
    assert_eq!(
        outcome,
        Outcome::Skipped {
            detail_type: SUBSCRIPTION_ACCEPTED_DETAIL_TYPE.to_string()
        }
    );
    assert_eq!(mocks.permissions.call_count(), 0);
    assert!(mocks.transport.published().is_empty());
    assert!(mocks.ledger.records().is_empty());

    let report = DryRunReport::collect(outcome, &mocks);
    let json = serde_json::to_value(&report).expect("report serializes");
    assert_eq!(json["outcome"]["leg"], "skipped");
}

#[tokio::test]
async fn test_producer_then_consumer_round_trip() {
    // Producer account.
    let producer = MockGateways::with_principal("arn:aws:iam::111111111111:role/viewgrant-handler");
    orders_catalog(&producer.catalog);

    let event = decode(&producer_envelope(PRODUCER_PHASE_DETAIL_TYPE)).expect("routable");
    let outcome = dispatch(&event, producer.gateways(), fixtures::config())
        .await
        .expect("producer leg succeeds");
    match outcome {
        Outcome::Producer(summary) => {
            assert_eq!(summary.principals, vec![CONSUMER_ACCOUNT.to_string()]);
            assert_eq!(summary.dependencies, 3);
            assert_eq!(summary.events_published, 1);
        }
        other => panic!("expected producer outcome, got {:?}", other),
    }

    let published = producer.transport.published();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].detail_type, CONSUMER_PHASE_DETAIL_TYPE);

    // Consumer account receives the published detail.
    let detail: serde_json::Value =
        serde_json::from_str(&published[0].detail).expect("detail is JSON");
    let raw = fixtures::envelope_json(&published[0].detail_type, &detail);
    let event = decode(&raw).expect("routable");
    let ChoreographyEvent::Consumer(consumer_event) = &event else {
        panic!("expected consumer event");
    };
    assert_eq!(consumer_event.dependencies().expect("valid"), orders_lineage());

    let consumer = fixtures::mock_gateways();
    let outcome = dispatch(&event, consumer.gateways(), fixtures::config())
        .await
        .expect("consumer leg succeeds");
    match outcome {
        Outcome::Consumer(summary) => {
            assert_eq!(summary.table_link, LinkOutcome::Created);
            assert_eq!(summary.dependencies, 3);
            assert!(summary.policy_attached);
        }
        other => panic!("expected consumer outcome, got {:?}", other),
    }

    let role = subscription(CONSUMER_ACCOUNT).consumer_role_arn;
    let calls = consumer.permissions.calls();
    for object in orders_lineage() {
        assert_granted_once(&calls, &table(&object), &role, Permission::READ, Permission::NONE);
    }
    assert_granted_once(
        &calls,
        &table(&producer_object("sales", "v_orders")),
        &role,
        Permission::READ,
        Permission::NONE,
    );
}

#[tokio::test]
async fn test_dry_run_report_lists_recorded_calls() {
    let mocks = MockGateways::with_principal("arn:aws:iam::111111111111:role/viewgrant-handler");
    orders_catalog(&mocks.catalog);

    let event = decode(&producer_envelope(PRODUCER_PHASE_DETAIL_TYPE)).expect("routable");
    let outcome = dispatch(&event, mocks.gateways(), fixtures::config())
        .await
        .expect("producer leg succeeds");
    let report = DryRunReport::collect(outcome, &mocks);

    assert_eq!(report.grants.len(), mocks.permissions.call_count());
    assert_eq!(report.ledger.len(), 3);
    assert_eq!(report.published.len(), 1);
    assert!(report.table_links.is_empty());

    let json = serde_json::to_value(&report).expect("report serializes");
    assert_eq!(json["outcome"]["leg"], "producer");
    assert_eq!(json["policy_attachments"], 0);
}
