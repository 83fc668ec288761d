//! Ledger write gateway: records transaction logs and announces them.
//!
//! Writing and publishing are two separate phases. The log is made durable
//! first; only then is an event offered to the publisher, and whatever the
//! publisher does is observed through its own error type and dropped.

use std::sync::Arc;

use coffer_shared::types::AccountId;
use tracing::{debug, error, info, warn};

use super::error::{LedgerError, PersistenceError};
use super::types::{NewTransactionLog, TransactionLog};
use super::validation::validate_new_log;
use crate::clock::{Clock, SystemClock};
use crate::events::{EventPublisher, TransactionLoggedEvent};
use crate::store::{Repository, Store, TransactionLogRepository, UnitOfWork};

/// Routing key used when none is configured.
pub const DEFAULT_ROUTING_KEY: &str = "transaction.logged";

/// Creates transaction logs and publishes a best-effort event per write.
pub struct TransactionLogGateway<S: Store> {
    store: S,
    clock: Arc<dyn Clock>,
    publisher: Option<Arc<dyn EventPublisher>>,
    routing_key: String,
}

impl<S: Store> TransactionLogGateway<S> {
    /// Creates a gateway without a publisher, stamping with the wall clock.
    #[must_use]
    pub fn new(store: S) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
            publisher: None,
            routing_key: DEFAULT_ROUTING_KEY.to_string(),
        }
    }

    /// Replaces the clock.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Attaches a publisher and the routing key its events go out under.
    #[must_use]
    pub fn with_publisher(
        mut self,
        publisher: Arc<dyn EventPublisher>,
        routing_key: impl Into<String>,
    ) -> Self {
        self.publisher = Some(publisher);
        self.routing_key = routing_key.into();
        self
    }

    /// Returns true if events will be offered to a publisher.
    #[must_use]
    pub const fn has_publisher(&self) -> bool {
        self.publisher.is_some()
    }

    /// Persists a transaction log stamped with the gateway's clock, then
    /// tries to publish a [`TransactionLoggedEvent`] for it.
    ///
    /// Any timestamp on `input` is discarded. A missing or failing publisher
    /// is logged and never affects the result.
    ///
    /// # Errors
    ///
    /// - `Validation` for a blank type or status, or a sub-cent amount
    /// - `AccountNotFound` if the referenced account does not exist
    /// - `Persistence` if the write fails
    pub async fn create_transaction_log(
        &self,
        input: NewTransactionLog,
    ) -> Result<TransactionLog, LedgerError> {
        validate_new_log(&input)?;

        let mut uow = UnitOfWork::new(self.store.open_session());
        if uow.accounts().get_by_id(input.account_id).await?.is_none() {
            return Err(LedgerError::AccountNotFound(input.account_id));
        }
        if let Some(supplied) = input.timestamp {
            debug!(%supplied, "Discarding caller-supplied timestamp");
        }

        let log = input.into_log(self.clock.now());
        uow.transaction_logs_mut().add(log);
        uow.save_changes()
            .await
            .inspect_err(|err| error!(error = %err, "Failed to create transaction log"))?;
        let log = uow.transaction_logs_mut().take_inserted().pop().ok_or_else(|| {
            PersistenceError::Store("store did not return the transaction log".to_string())
        })?;

        info!(
            transaction_log_id = %log.id,
            account_id = %log.account_id,
            transaction_type = %log.transaction_type,
            amount = %log.amount,
            "Transaction log created"
        );

        self.publish(&log).await;
        Ok(log)
    }

    /// Logs of one account, newest first.
    ///
    /// # Errors
    ///
    /// Returns `Persistence` if the read fails.
    pub async fn transaction_logs_for_account(
        &self,
        account_id: AccountId,
    ) -> Result<Vec<TransactionLog>, LedgerError> {
        let uow = UnitOfWork::new(self.store.open_session());
        let logs = uow
            .transaction_logs()
            .find_by_account(account_id)
            .await
            .inspect_err(|err| error!(%account_id, error = %err, "Failed to load transaction logs"))?;
        Ok(logs)
    }

    async fn publish(&self, log: &TransactionLog) {
        let Some(publisher) = &self.publisher else {
            warn!(
                transaction_log_id = %log.id,
                "No event publisher configured, skipping transaction event"
            );
            return;
        };

        let event = TransactionLoggedEvent::from(log);
        if let Err(err) = publisher.publish(&event, &self.routing_key).await {
            error!(
                transaction_log_id = %log.id,
                routing_key = %self.routing_key,
                error = %err,
                "Failed to publish transaction event"
            );
        }
    }
}
