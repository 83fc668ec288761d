//! Consumer that drains a broadcast subscription into the log.

use tokio::sync::broadcast::{Receiver, error::RecvError};
use tracing::{info, warn};

use super::broadcast::EventEnvelope;

/// Logs every transaction-logged envelope it receives.
#[derive(Debug)]
pub struct TransactionLoggedConsumer {
    receiver: Receiver<EventEnvelope>,
}

impl TransactionLoggedConsumer {
    /// Wraps a subscription.
    #[must_use]
    pub const fn new(receiver: Receiver<EventEnvelope>) -> Self {
        Self { receiver }
    }

    /// Runs until every publisher is dropped and returns how many envelopes
    /// were handled. Lagging drops envelopes with a warning and keeps going.
    pub async fn run(mut self) -> usize {
        let mut handled = 0;
        loop {
            match self.receiver.recv().await {
                Ok(envelope) => {
                    Self::handle(&envelope);
                    handled += 1;
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "transaction event consumer lagged");
                }
                Err(RecvError::Closed) => return handled,
            }
        }
    }

    fn handle(envelope: &EventEnvelope) {
        let event = &envelope.event;
        info!(
            event_id = %envelope.event_id,
            routing_key = %envelope.routing_key,
            transaction_log_id = %event.transaction_log_id,
            account_id = %event.account_id,
            transaction_type = %event.transaction_type,
            amount = %event.amount,
            status = %event.status,
            "transaction logged"
        );
    }
}
