//! Glue Data Catalog gateway.

use async_trait::async_trait;
use aws_sdk_glue::error::SdkError;
use aws_sdk_glue::types::{DatabaseIdentifier, DatabaseInput, TableIdentifier, TableInput};
use aws_sdk_glue::Client;
use aws_types::SdkConfig;
use viewgrant_core::{CatalogObject, CatalogObjectRef, ObjectKind};
use viewgrant_gateway::{CatalogGateway, DatabaseLink, GatewayResult, LinkOutcome, TableLink};

use crate::{build_error, sdk_error};

const SERVICE: &str = "glue";

#[derive(Debug, Clone)]
pub struct GlueCatalog {
    client: Client,
}

impl GlueCatalog {
    pub fn new(sdk: &SdkConfig) -> Self {
        Self {
            client: Client::new(sdk),
        }
    }
}

#[async_trait]
impl CatalogGateway for GlueCatalog {
    async fn get_object(&self, object: &CatalogObjectRef) -> GatewayResult<Option<CatalogObject>> {
        let result = self
            .client
            .get_table()
            .catalog_id(&object.catalog_id)
            .database_name(&object.database_name)
            .name(&object.object_name)
            .send()
            .await;

        let table = match result {
            Ok(output) => match output.table {
                Some(table) => table,
                None => return Ok(None),
            },
            Err(SdkError::ServiceError(err)) if err.err().is_entity_not_found_exception() => {
                return Ok(None)
            }
            Err(err) => return Err(sdk_error(SERVICE, "GetTable", err)),
        };

        let kind = ObjectKind::from_table_type(table.table_type());
        let definition = match kind {
            ObjectKind::View => table.view_original_text().map(str::to_string),
            _ => None,
        };
        Ok(Some(CatalogObject {
            reference: object.clone(),
            kind,
            definition,
        }))
    }

    async fn create_table_link(&self, link: &TableLink) -> GatewayResult<LinkOutcome> {
        let target = TableIdentifier::builder()
            .catalog_id(&link.target.catalog_id)
            .database_name(&link.target.database_name)
            .name(&link.target.object_name)
            .region(&link.target_region)
            .build();
        let input = TableInput::builder()
            .name(&link.name)
            .target_table(target)
            .build()
            .map_err(|e| build_error(SERVICE, e))?;

        let result = self
            .client
            .create_table()
            .database_name(&link.database_name)
            .table_input(input)
            .send()
            .await;

        match result {
            Ok(_) => Ok(LinkOutcome::Created),
            Err(SdkError::ServiceError(err)) if err.err().is_already_exists_exception() => {
                Ok(LinkOutcome::AlreadyExists)
            }
            Err(err) => Err(sdk_error(SERVICE, "CreateTable", err)),
        }
    }

    async fn create_database_link(&self, link: &DatabaseLink) -> GatewayResult<LinkOutcome> {
        let target = DatabaseIdentifier::builder()
            .catalog_id(&link.target.catalog_id)
            .database_name(&link.target.database_name)
            .region(&link.target_region)
            .build();
        let input = DatabaseInput::builder()
            .name(&link.name)
            .target_database(target)
            .build()
            .map_err(|e| build_error(SERVICE, e))?;

        let result = self
            .client
            .create_database()
            .database_input(input)
            .send()
            .await;

        match result {
            Ok(_) => Ok(LinkOutcome::Created),
            Err(SdkError::ServiceError(err)) if err.err().is_already_exists_exception() => {
                Ok(LinkOutcome::AlreadyExists)
            }
            Err(err) => Err(sdk_error(SERVICE, "CreateDatabase", err)),
        }
    }
}
