//! Consumer leg.

use std::collections::BTreeSet;

use serde::Serialize;
use tracing::{debug, info, instrument, warn};
use viewgrant_core::{ConsumerPhaseEvent, DatabaseRef, Permission, ViewgrantResult};
use viewgrant_gateway::{DatabaseLink, LinkOutcome, TableLink};

use crate::Choreography;

/// Result of one consumer-phase invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConsumerSummary {
    pub self_principal: String,
    pub table_link: LinkOutcome,
    pub dependencies: usize,
    /// Database links created by this invocation. Links found already in
    /// place are not counted.
    pub database_links_created: usize,
    /// The managed policy had to be attached by this invocation.
    pub policy_attached: bool,
}

impl Choreography {
    /// Materialize a subscribed asset in the consumer account and extend read
    /// access to the environment's end-user role.
    ///
    /// Self-grants with grant option always precede the end-user grants they
    /// enable. Re-delivery converges to the same state: links report
    /// `AlreadyExists`, grants are upserts, and the policy is only attached
    /// when missing.
    #[instrument(
        skip_all,
        fields(
            asset = %event.asset.table_arn,
            environment = %event.subscription.environment_id,
            correlation_id = ?event.correlation_id,
        )
    )]
    pub async fn handle_consumer_phase(
        &self,
        event: &ConsumerPhaseEvent,
    ) -> ViewgrantResult<ConsumerSummary> {
        let policy_arn = self.config.require_consumer_managed_policy_arn()?;
        let root_arn = event.root_arn()?;
        let root = root_arn.object_ref();
        let dependencies = event.dependencies()?;

        let subscription = &event.subscription;
        let consumer_account = subscription.aws_account_id.as_str();
        let role = subscription.consumer_role_arn.as_str();
        let cross_account = consumer_account != root_arn.account_id;
        let consumer_database = DatabaseRef {
            catalog_id: consumer_account.to_string(),
            database_name: subscription.consumer_database_name.clone(),
        };

        let permissions = &self.gateways.permissions;
        let catalog = &self.gateways.catalog;
        let me = self.gateways.identity.current_principal_arn().await?;

        permissions
            .grant_database(&consumer_database, &me, Permission::ALL, Permission::ALL)
            .await?;

        let table_link = catalog
            .create_table_link(&TableLink {
                database_name: consumer_database.database_name.clone(),
                name: root_arn.table.clone(),
                target: root.clone(),
                target_region: root_arn.region.clone(),
            })
            .await?;
        match table_link {
            LinkOutcome::Created => {
                info!(database = %consumer_database, link = %root_arn.table, "Table resource link created")
            }
            LinkOutcome::AlreadyExists => {
                warn!(database = %consumer_database, link = %root_arn.table, "Table resource link already exists")
            }
        }

        let mut self_granted: BTreeSet<DatabaseRef> = BTreeSet::new();
        permissions
            .grant_database(&root.database(), &me, Permission::DESCRIBE, Permission::DESCRIBE)
            .await?;
        self_granted.insert(root.database());
        permissions
            .grant_table(&root, &me, Permission::READ, Permission::READ)
            .await?;

        for dependent in dependencies.iter() {
            let database = dependent.database();
            if !self_granted.contains(&database) {
                permissions
                    .grant_database(&database, &me, Permission::DESCRIBE, Permission::DESCRIBE)
                    .await?;
                self_granted.insert(database);
            }
            permissions
                .grant_table(dependent, &me, Permission::READ, Permission::READ)
                .await?;
            permissions
                .grant_table(dependent, role, Permission::READ, Permission::NONE)
                .await?;
            info!(dependent = %dependent, role = %role, "Granted dependent object to end-user role");
        }

        let mut databases = dependencies.databases();
        databases.insert(root.database());

        let mut database_links_created = 0;
        for database in &databases {
            if cross_account {
                let outcome = catalog
                    .create_database_link(&DatabaseLink {
                        name: database.database_name.clone(),
                        target: database.clone(),
                        target_region: root_arn.region.clone(),
                    })
                    .await?;
                if outcome == LinkOutcome::Created {
                    database_links_created += 1;
                    info!(database = %database, "Database resource link created");
                } else {
                    warn!(database = %database, "Database resource link already exists");
                }
            }

            permissions
                .grant_database(database, role, Permission::DESCRIBE, Permission::NONE)
                .await?;
            if cross_account {
                let local = DatabaseRef {
                    catalog_id: consumer_account.to_string(),
                    database_name: database.database_name.clone(),
                };
                permissions
                    .grant_database(&local, role, Permission::DESCRIBE, Permission::NONE)
                    .await?;
            }
        }

        permissions
            .grant_table(&root, role, Permission::READ, Permission::NONE)
            .await?;

        let identity = &self.gateways.identity;
        let policy_attached = if identity.has_managed_policy(role, policy_arn).await? {
            debug!(role = %role, policy = %policy_arn, "Managed policy already attached");
            false
        } else {
            identity.attach_managed_policy(role, policy_arn).await?;
            info!(role = %role, policy = %policy_arn, "Managed policy attached");
            true
        };

        Ok(ConsumerSummary {
            self_principal: me,
            table_link,
            dependencies: dependencies.len(),
            database_links_created,
            policy_attached,
        })
    }
}
