//! VIEWGRANT Choreography - Cross-Account Grant Propagation
//!
//! Two legs driven by asynchronous events:
//!
//! - the **producer leg** runs in the account that owns the subscribed asset.
//!   It resolves the asset's lineage, shares the asset and every dependency
//!   with each subscribing account, records each share in the ledger and
//!   publishes one consumer-phase event per subscribing environment.
//! - the **consumer leg** runs in the subscribing account. It materializes
//!   resource links, self-grants what it needs to re-grant, extends read
//!   access to the environment's end-user role and attaches the baseline
//!   cross-account read policy to that role.
//!
//! Every step is idempotent so redelivery completes a partially applied
//! invocation.

mod consumer;
mod producer;

pub use consumer::ConsumerSummary;
pub use producer::ProducerSummary;

use serde::Serialize;
use tracing::info;
use viewgrant_core::{ChoreographyConfig, ChoreographyEvent, ViewgrantResult};
use viewgrant_gateway::Gateways;
use viewgrant_lineage::LineageResolver;

/// What one invocation did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "leg", rename_all = "snake_case")]
pub enum Outcome {
    Producer(ProducerSummary),
    Consumer(ConsumerSummary),
    /// The asset is centrally managed. Nothing was read beyond the flag and
    /// no call was made.
    Skipped { detail_type: String },
}

/// Entry point for both legs.
#[derive(Debug, Clone)]
pub struct Choreography {
    gateways: Gateways,
    resolver: LineageResolver,
    config: ChoreographyConfig,
}

impl Choreography {
    pub fn new(gateways: Gateways, config: ChoreographyConfig) -> Self {
        let resolver = LineageResolver::new(gateways.catalog.clone());
        Self {
            gateways,
            resolver,
            config,
        }
    }

    pub fn config(&self) -> &ChoreographyConfig {
        &self.config
    }

    /// Run the leg a routed event belongs to.
    pub async fn handle(&self, event: &ChoreographyEvent) -> ViewgrantResult<Outcome> {
        match event {
            ChoreographyEvent::Producer(event) => {
                self.handle_producer_phase(event).await.map(Outcome::Producer)
            }
            ChoreographyEvent::Consumer(event) => {
                self.handle_consumer_phase(event).await.map(Outcome::Consumer)
            }
            ChoreographyEvent::Managed { detail_type } => {
                info!(detail_type = %detail_type, "Managed asset, handled by the managed grant path");
                Ok(Outcome::Skipped {
                    detail_type: detail_type.clone(),
                })
            }
        }
    }
}
