//! Producer leg.

use std::collections::BTreeSet;

use serde::Serialize;
use tracing::{error, info, instrument};
use viewgrant_core::{
    event_bus_arn, CatalogObjectRef, ChoreographyError, ConsumerPhaseEvent, GatewayError,
    GrantRecord, LineageSet, Permission, ProducerPhaseEvent, SubscriptionAccount, TableArn,
    ViewgrantError, ViewgrantResult,
};
use viewgrant_gateway::OutboundEvent;

use crate::Choreography;

/// Result of one producer-phase invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProducerSummary {
    /// The asset is centrally managed and nothing was done.
    pub skipped_managed: bool,
    /// Cross-account principals the asset was shared with.
    pub principals: Vec<String>,
    pub dependencies: usize,
    pub ledger_records: usize,
    pub events_published: usize,
}

impl Choreography {
    /// Share a subscribed asset and its lineage with every subscribing
    /// account, then notify each subscribing environment.
    ///
    /// Lineage is resolved once, before any grant is issued, so a malformed
    /// view definition fails the invocation without leaving partial grants.
    /// Subscribers are processed in account order and the first gateway
    /// failure aborts the phase; redelivery re-runs it from the start.
    #[instrument(skip_all, fields(asset = %event.asset.table_arn))]
    pub async fn handle_producer_phase(
        &self,
        event: &ProducerPhaseEvent,
    ) -> ViewgrantResult<ProducerSummary> {
        if event.data.is_managed_asset {
            info!("Managed asset, handled by the managed grant path");
            return Ok(ProducerSummary {
                skipped_managed: true,
                ..ProducerSummary::default()
            });
        }

        let root_arn = event.root_arn()?;
        let root = root_arn.object_ref();
        let principals = subscribing_principals(&root_arn, &event.subscriptions);

        let lineage = self.resolver.resolve(&root).await?;
        info!(
            root = %root,
            dependencies = lineage.len(),
            subscribers = principals.len(),
            "Resolved subscribed asset lineage"
        );

        let mut ledger_records = 0;
        for principal in &principals {
            ledger_records += self
                .share_with(principal, &root, &lineage)
                .await
                .map_err(|source| {
                    error!(principal = %principal, error = %source, "Subscriber grant sequence failed");
                    ChoreographyError::Subscriber {
                        principal: principal.clone(),
                        source: Box::new(source),
                    }
                })?;
        }

        let mut events_published = 0;
        for subscription in &event.subscriptions {
            self.notify(event, subscription, &lineage).await?;
            events_published += 1;
        }

        Ok(ProducerSummary {
            skipped_managed: false,
            principals: principals.into_iter().collect(),
            dependencies: lineage.len(),
            ledger_records,
            events_published,
        })
    }

    /// One subscriber's unit of work. Returns the number of ledger records
    /// written.
    async fn share_with(
        &self,
        principal: &str,
        root: &CatalogObjectRef,
        lineage: &LineageSet,
    ) -> ViewgrantResult<usize> {
        let permissions = &self.gateways.permissions;

        permissions
            .grant_database(&root.database(), principal, Permission::DESCRIBE, Permission::DESCRIBE)
            .await?;
        permissions
            .grant_table(root, principal, Permission::READ, Permission::READ)
            .await?;
        info!(principal = %principal, root = %root, "Shared root asset");

        for dependent in lineage.iter() {
            permissions
                .grant_table(dependent, principal, Permission::READ, Permission::READ)
                .await?;
            self.gateways
                .ledger
                .put_record(&GrantRecord::new(principal, root.clone(), dependent.clone()))
                .await?;
            info!(principal = %principal, dependent = %dependent, "Shared dependent object");
        }

        let root_database = root.database();
        for database in lineage.databases() {
            if database == root_database {
                continue;
            }
            permissions
                .grant_database(&database, principal, Permission::DESCRIBE, Permission::DESCRIBE)
                .await?;
        }

        Ok(lineage.len())
    }

    async fn notify(
        &self,
        event: &ProducerPhaseEvent,
        subscription: &SubscriptionAccount,
        lineage: &LineageSet,
    ) -> ViewgrantResult<()> {
        let consumer_event = ConsumerPhaseEvent::new(
            event.data.clone(),
            event.asset.clone(),
            subscription.clone(),
            lineage,
        );
        let detail = serde_json::to_string(&consumer_event).map_err(|e| GatewayError::Build {
            service: "transport".to_string(),
            reason: e.to_string(),
        })?;

        let outbound = OutboundEvent {
            bus_arn: event_bus_arn(
                &self.config.partition,
                &subscription.region,
                &subscription.aws_account_id,
                &self.config.event_bus_name,
            ),
            source: self.config.event_source.clone(),
            detail_type: self.config.consumer_detail_type.clone(),
            detail,
        };

        let outcome = self.gateways.transport.publish(&outbound).await?;
        if outcome.failed_count > 0 {
            error!(
                bus = %outbound.bus_arn,
                failed_count = outcome.failed_count,
                "Consumer-phase event was not accepted"
            );
            return Err(ViewgrantError::from(ChoreographyError::PublishFailed {
                failed_count: outcome.failed_count,
                bus: outbound.bus_arn,
            }));
        }

        info!(
            bus = %outbound.bus_arn,
            environment = %subscription.environment_id,
            correlation_id = ?consumer_event.correlation_id,
            "Published consumer-phase event"
        );
        Ok(())
    }
}

/// Distinct subscribing accounts other than the producer's own.
fn subscribing_principals(
    root: &TableArn,
    subscriptions: &[SubscriptionAccount],
) -> BTreeSet<String> {
    subscriptions
        .iter()
        .map(|s| s.aws_account_id.clone())
        .filter(|account| *account != root.account_id)
        .collect()
}
