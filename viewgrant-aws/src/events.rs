//! EventBridge transport.

use async_trait::async_trait;
use aws_sdk_eventbridge::types::PutEventsRequestEntry;
use aws_sdk_eventbridge::Client;
use aws_types::SdkConfig;
use viewgrant_gateway::{EventTransport, GatewayResult, OutboundEvent, PublishOutcome};

use crate::sdk_error;

const SERVICE: &str = "eventbridge";

/// Publishes to a bus addressed by full ARN, which lets one client reach
/// buses in other accounts and regions.
#[derive(Debug, Clone)]
pub struct EventBridgeTransport {
    client: Client,
}

impl EventBridgeTransport {
    pub fn new(sdk: &SdkConfig) -> Self {
        Self {
            client: Client::new(sdk),
        }
    }
}

fn entry(event: &OutboundEvent) -> PutEventsRequestEntry {
    PutEventsRequestEntry::builder()
        .event_bus_name(&event.bus_arn)
        .source(&event.source)
        .detail_type(&event.detail_type)
        .detail(&event.detail)
        .build()
}

#[async_trait]
impl EventTransport for EventBridgeTransport {
    async fn publish(&self, event: &OutboundEvent) -> GatewayResult<PublishOutcome> {
        let output = self
            .client
            .put_events()
            .entries(entry(event))
            .send()
            .await
            .map_err(|e| sdk_error(SERVICE, "PutEvents", e))?;

        let failed_count = output.failed_entry_count();
        for failed in output
            .entries()
            .iter()
            .filter(|e| e.error_code().is_some())
        {
            tracing::warn!(
                bus = %event.bus_arn,
                code = failed.error_code().unwrap_or_default(),
                message = failed.error_message().unwrap_or_default(),
                "Event entry rejected"
            );
        }
        Ok(PublishOutcome { failed_count })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_addresses_bus_by_arn() {
        let event = OutboundEvent {
            bus_arn: "arn:aws:events:eu-west-1:222222222222:event-bus/default".to_string(),
            source: "viewgrant".to_string(),
            detail_type: "ConsumerPhase".to_string(),
            detail: "{}".to_string(),
        };
        let entry = entry(&event);
        assert_eq!(entry.event_bus_name(), Some(event.bus_arn.as_str()));
        assert_eq!(entry.detail_type(), Some("ConsumerPhase"));
        assert_eq!(entry.source(), Some("viewgrant"));
        assert_eq!(entry.detail(), Some("{}"));
    }
}
