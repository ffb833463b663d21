//! Lake Formation permission gateway.
//!
//! The authorization domain of each grant is the catalog that owns the
//! resource, so grants on producer objects and on local consumer databases
//! go through the same client.

use async_trait::async_trait;
use aws_sdk_lakeformation::types::{
    DataLakePrincipal, DatabaseResource, Permission as LfPermission, Resource, TableResource,
};
use aws_sdk_lakeformation::Client;
use aws_types::SdkConfig;
use viewgrant_core::{CatalogObjectRef, DatabaseRef, Permission};
use viewgrant_gateway::{GatewayResult, PermissionGateway};

use crate::{build_error, sdk_error};

const SERVICE: &str = "lakeformation";

fn lf_permissions(permissions: &[Permission]) -> Vec<LfPermission> {
    permissions
        .iter()
        .map(|p| match p {
            Permission::All => LfPermission::All,
            Permission::Select => LfPermission::Select,
            Permission::Describe => LfPermission::Describe,
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct LakeFormationPermissions {
    client: Client,
}

impl LakeFormationPermissions {
    pub fn new(sdk: &SdkConfig) -> Self {
        Self {
            client: Client::new(sdk),
        }
    }

    async fn grant(
        &self,
        resource: Resource,
        principal: &str,
        permissions: &[Permission],
        grantable: &[Permission],
    ) -> GatewayResult<()> {
        let principal = DataLakePrincipal::builder()
            .data_lake_principal_identifier(principal)
            .build();

        let mut request = self
            .client
            .grant_permissions()
            .principal(principal)
            .resource(resource)
            .set_permissions(Some(lf_permissions(permissions)));
        if !grantable.is_empty() {
            request = request.set_permissions_with_grant_option(Some(lf_permissions(grantable)));
        }

        request
            .send()
            .await
            .map(|_| ())
            .map_err(|e| sdk_error(SERVICE, "GrantPermissions", e))
    }
}

#[async_trait]
impl PermissionGateway for LakeFormationPermissions {
    async fn grant_database(
        &self,
        database: &DatabaseRef,
        principal: &str,
        permissions: &[Permission],
        grantable: &[Permission],
    ) -> GatewayResult<()> {
        tracing::info!(
            catalog_id = %database.catalog_id,
            database = %database.database_name,
            principal,
            ?permissions,
            ?grantable,
            "Granting database permissions"
        );
        let resource = DatabaseResource::builder()
            .catalog_id(&database.catalog_id)
            .name(&database.database_name)
            .build()
            .map_err(|e| build_error(SERVICE, e))?;

        self.grant(
            Resource::builder().database(resource).build(),
            principal,
            permissions,
            grantable,
        )
        .await
    }

    async fn grant_table(
        &self,
        table: &CatalogObjectRef,
        principal: &str,
        permissions: &[Permission],
        grantable: &[Permission],
    ) -> GatewayResult<()> {
        tracing::info!(
            catalog_id = %table.catalog_id,
            table = %table,
            principal,
            ?permissions,
            ?grantable,
            "Granting table permissions"
        );
        let resource = TableResource::builder()
            .catalog_id(&table.catalog_id)
            .database_name(&table.database_name)
            .name(&table.object_name)
            .build()
            .map_err(|e| build_error(SERVICE, e))?;

        self.grant(
            Resource::builder().table(resource).build(),
            principal,
            permissions,
            grantable,
        )
        .await
    }
}
