//! Catalog ARN parsing.
//!
//! Table ARNs have the shape
//! `arn:<partition>:<service>:<region>:<accountId>:table/<database>/<table>`
//! and are parsed positionally.

use std::fmt;
use std::str::FromStr;

use crate::{ArnError, CatalogObjectRef};

const ARN_FIELDS: usize = 6;

/// A parsed catalog table ARN.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableArn {
    pub partition: String,
    pub service: String,
    pub region: String,
    pub account_id: String,
    pub database: String,
    pub table: String,
}

impl TableArn {
    /// Parse a table ARN. Every field must be non-empty.
    pub fn parse(arn: &str) -> Result<Self, ArnError> {
        let fields: Vec<&str> = arn.splitn(ARN_FIELDS, ':').collect();
        if fields.len() != ARN_FIELDS {
            return Err(ArnError::FieldCount {
                arn: arn.to_string(),
                expected: ARN_FIELDS,
                got: fields.len(),
            });
        }
        if fields[0] != "arn" {
            return Err(malformed(arn, "missing 'arn' prefix"));
        }

        let (partition, service, region, account_id) = (fields[1], fields[2], fields[3], fields[4]);
        for (name, value) in [
            ("partition", partition),
            ("service", service),
            ("region", region),
            ("account id", account_id),
        ] {
            if value.is_empty() {
                return Err(malformed(arn, &format!("empty {}", name)));
            }
        }
        if !account_id.chars().all(|c| c.is_ascii_digit()) {
            return Err(malformed(arn, "account id must be numeric"));
        }

        let resource: Vec<&str> = fields[5].split('/').collect();
        let (database, table) = match resource.as_slice() {
            ["table", database, table] if !database.is_empty() && !table.is_empty() => {
                (*database, *table)
            }
            _ => {
                return Err(malformed(
                    arn,
                    "resource must be 'table/<database>/<table>'",
                ))
            }
        };

        Ok(Self {
            partition: partition.to_string(),
            service: service.to_string(),
            region: region.to_string(),
            account_id: account_id.to_string(),
            database: database.to_string(),
            table: table.to_string(),
        })
    }

    /// The catalog object this ARN points at. The catalog id is the owning account.
    pub fn object_ref(&self) -> CatalogObjectRef {
        CatalogObjectRef::new(&self.account_id, &self.database, &self.table)
    }
}

impl FromStr for TableArn {
    type Err = ArnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for TableArn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "arn:{}:{}:{}:{}:table/{}/{}",
            self.partition, self.service, self.region, self.account_id, self.database, self.table
        )
    }
}

/// Build the ARN of a named event bus in a given account and region.
pub fn event_bus_arn(partition: &str, region: &str, account_id: &str, bus_name: &str) -> String {
    format!(
        "arn:{}:events:{}:{}:event-bus/{}",
        partition, region, account_id, bus_name
    )
}

fn malformed(arn: &str, reason: &str) -> ArnError {
    ArnError::Malformed {
        arn: arn.to_string(),
        reason: reason.to_string(),
    }
}
