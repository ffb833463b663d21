//! VIEWGRANT Handler - Event Entry Point
//!
//! Reads one EventBridge envelope, routes it by detail-type and runs the
//! matching choreography leg. A failed invocation exits non-zero so that the
//! trigger redelivers the event.
//!
//! ## Configuration
//!
//! - `EVENT_BUS_NAME`, `EVENT_SOURCE`, `CONSUMER_DETAIL_TYPE`,
//!   `DATAZONE_USER_CUSTOM_MANAGED_POLICY_ARN`: see [`ChoreographyConfig`]
//! - `AWS_REGION`, `VIEWGRANT_MAX_ATTEMPTS`, `SUBSCRIPTION_TABLE_NAME`: see
//!   [`AwsClientConfig`]
//! - `VIEWGRANT_LOG_FORMAT`, `RUST_LOG`: see [`telemetry::TelemetryConfig`]

pub mod error;
pub mod telemetry;

pub use error::{HandlerError, HandlerResult};

use std::io::Read;
use std::path::{Path, PathBuf};

use clap::Parser;
use serde::Serialize;
use viewgrant_aws::AwsClientConfig;
use viewgrant_choreography::{Choreography, Outcome};
use viewgrant_core::{
    CatalogObject, ChoreographyConfig, ChoreographyEvent, EventEnvelope, GrantRecord,
    ViewgrantResult,
};
use viewgrant_gateway::{DatabaseLink, GrantCall, Gateways, MockGateways, OutboundEvent, TableLink};

/// Identity the in-memory gateways report during a dry run.
pub const DRY_RUN_PRINCIPAL: &str = "arn:aws:iam::000000000000:role/viewgrant-dry-run";

/// Grant choreography event handler.
#[derive(Debug, Parser)]
#[command(name = "viewgrant-handler")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// EventBridge envelope to handle. Read from stdin when omitted.
    #[arg(long, value_name = "PATH")]
    pub event: Option<PathBuf>,

    /// Run against in-memory gateways and print every recorded call.
    #[arg(long)]
    pub dry_run: bool,

    /// Caller identity reported by the in-memory gateways.
    #[arg(long, env = "VIEWGRANT_DRY_RUN_PRINCIPAL", default_value = DRY_RUN_PRINCIPAL)]
    pub principal: String,

    /// JSON array of catalog objects seeding the in-memory catalog.
    #[arg(long, value_name = "PATH", requires = "dry_run")]
    pub catalog: Option<PathBuf>,
}

// ============================================================================
// DISPATCH
// ============================================================================

/// Decode an envelope and validate its detail.
pub fn decode(raw: &str) -> ViewgrantResult<ChoreographyEvent> {
    let envelope = EventEnvelope::from_json(raw)?;
    tracing::info!(
        detail_type = %envelope.detail_type,
        source = ?envelope.source,
        id = ?envelope.id,
        "Received event"
    );
    envelope.route()
}

/// Run the leg an event belongs to.
pub async fn dispatch(
    event: &ChoreographyEvent,
    gateways: Gateways,
    config: ChoreographyConfig,
) -> ViewgrantResult<Outcome> {
    Choreography::new(gateways, config).handle(event).await
}

/// Everything a dry run would have done.
#[derive(Debug, Clone, Serialize)]
pub struct DryRunReport {
    pub outcome: Outcome,
    pub grants: Vec<GrantCall>,
    pub table_links: Vec<TableLink>,
    pub database_links: Vec<DatabaseLink>,
    pub published: Vec<OutboundEvent>,
    pub ledger: Vec<GrantRecord>,
    pub policy_attachments: usize,
}

impl DryRunReport {
    pub fn collect(outcome: Outcome, mocks: &MockGateways) -> Self {
        Self {
            outcome,
            grants: mocks.permissions.calls(),
            table_links: mocks.catalog.table_links(),
            database_links: mocks.catalog.database_links(),
            published: mocks.transport.published(),
            ledger: mocks.ledger.records(),
            policy_attachments: mocks.identity.attach_calls(),
        }
    }
}

/// Build the in-memory gateways for a dry run.
pub fn dry_run_gateways(principal: &str, catalog: Option<&Path>) -> HandlerResult<MockGateways> {
    let mocks = MockGateways::with_principal(principal);
    if let Some(path) = catalog {
        let raw = std::fs::read_to_string(path).map_err(|source| HandlerError::Input {
            path: path.to_path_buf(),
            source,
        })?;
        let objects: Vec<CatalogObject> =
            serde_json::from_str(&raw).map_err(|e| HandlerError::CatalogSeed {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        tracing::debug!(count = objects.len(), "Seeding in-memory catalog");
        for object in objects {
            mocks.catalog.insert(object);
        }
    }
    Ok(mocks)
}

fn read_event(path: Option<&Path>) -> HandlerResult<String> {
    match path {
        Some(path) => std::fs::read_to_string(path).map_err(|source| HandlerError::Input {
            path: path.to_path_buf(),
            source,
        }),
        None => {
            let mut raw = String::new();
            std::io::stdin()
                .read_to_string(&mut raw)
                .map_err(HandlerError::Stdin)?;
            Ok(raw)
        }
    }
}

/// Handle one invocation end to end. The report is written to stdout.
pub async fn run(cli: &Cli) -> HandlerResult<()> {
    let raw = read_event(cli.event.as_deref())?;
    let config = ChoreographyConfig::from_env();
    config.validate()?;
    let event = decode(&raw)?;

    if cli.dry_run {
        let mocks = dry_run_gateways(&cli.principal, cli.catalog.as_deref())?;
        let outcome = dispatch(&event, mocks.gateways(), config).await?;
        let report = DryRunReport::collect(outcome, &mocks);
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let aws_config = AwsClientConfig::from_env();
    aws_config.validate()?;
    if matches!(event, ChoreographyEvent::Producer(_)) {
        aws_config.require_ledger_table()?;
    }
    let sdk = aws_config.load().await;
    let gateways = viewgrant_aws::gateways(&sdk, &aws_config);

    let outcome = dispatch(&event, gateways, config).await?;
    println!("{}", serde_json::to_string(&outcome)?);
    Ok(())
}
