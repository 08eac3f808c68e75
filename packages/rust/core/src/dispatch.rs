//! Per-record webhook delivery.

use chrono::Utc;
use tracing::{debug, warn};

use leadflow_shared::{ClassifiedRecord, DeliveryPayload, LeadSink};

/// Statuses the downstream consumer uses to acknowledge a lead.
pub const ACKNOWLEDGED_STATUSES: [u16; 2] = [200, 201];

pub fn is_acknowledged(status: u16) -> bool {
    ACKNOWLEDGED_STATUSES.contains(&status)
}

/// Post one classified record. Returns whether the sink acknowledged it.
pub async fn deliver_record(sink: &dyn LeadSink, record: &ClassifiedRecord) -> bool {
    let payload = DeliveryPayload::new(record, Utc::now());

    match sink.deliver(&payload).await {
        Ok(status) if is_acknowledged(status) => {
            debug!(email = %payload.email, status, "delivered");
            true
        }
        Ok(status) => {
            warn!(email = %payload.email, status, "webhook rejected lead");
            false
        }
        Err(e) => {
            warn!(email = %payload.email, error = %e, "webhook delivery failed");
            false
        }
    }
}
