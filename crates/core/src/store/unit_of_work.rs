//! Unit of work: one logical transaction over one session.

use tracing::{debug, warn};

use super::{Repository, Session};
use crate::ledger::PersistenceError;

/// Lifecycle of a [`UnitOfWork`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitOfWorkState {
    /// No transaction opened yet.
    Idle,
    /// A store transaction is open.
    TransactionOpen,
    /// Committed. Terminal.
    Committed,
    /// Rolled back. Terminal.
    RolledBack,
}

impl UnitOfWorkState {
    /// Returns true once the unit of work can no longer open a transaction.
    #[must_use]
    pub const fn is_completed(self) -> bool {
        matches!(self, Self::Committed | Self::RolledBack)
    }
}

/// Owns one session and its repositories for a single logical operation.
///
/// `Idle -> TransactionOpen -> (Committed | RolledBack)`. Terminal states
/// are final: a completed unit of work cannot begin again, and `commit` or
/// `rollback` on it are no-ops. Nothing here retries.
#[derive(Debug)]
pub struct UnitOfWork<S: Session> {
    session: S,
    state: UnitOfWorkState,
}

impl<S: Session> UnitOfWork<S> {
    /// Wraps a freshly opened session.
    #[must_use]
    pub const fn new(session: S) -> Self {
        Self {
            session,
            state: UnitOfWorkState::Idle,
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> UnitOfWorkState {
        self.state
    }

    /// Account repository.
    pub fn accounts(&self) -> &S::Accounts {
        self.session.accounts()
    }

    /// Mutable account repository.
    pub fn accounts_mut(&mut self) -> &mut S::Accounts {
        self.session.accounts_mut()
    }

    /// Transaction log repository.
    pub fn transaction_logs(&self) -> &S::TransactionLogs {
        self.session.transaction_logs()
    }

    /// Mutable transaction log repository.
    pub fn transaction_logs_mut(&mut self) -> &mut S::TransactionLogs {
        self.session.transaction_logs_mut()
    }

    /// Opens the store transaction. Does nothing if one is already open.
    ///
    /// # Errors
    ///
    /// Returns `PersistenceError::Completed` on a committed or rolled back
    /// unit of work, or the store error if the transaction cannot be opened.
    pub async fn begin_transaction(&mut self) -> Result<(), PersistenceError> {
        match self.state {
            UnitOfWorkState::TransactionOpen => Ok(()),
            UnitOfWorkState::Committed | UnitOfWorkState::RolledBack => {
                Err(PersistenceError::Completed)
            }
            UnitOfWorkState::Idle => {
                self.session.begin().await?;
                self.state = UnitOfWorkState::TransactionOpen;
                debug!("unit of work transaction opened");
                Ok(())
            }
        }
    }

    /// Flushes staged writes and finalizes the transaction.
    ///
    /// On failure the transaction is rolled back, staged writes are dropped
    /// and the original error is returned. Without an open transaction the
    /// flush runs atomically on its own.
    ///
    /// # Errors
    ///
    /// Returns the flush or commit error.
    pub async fn commit(&mut self) -> Result<(), PersistenceError> {
        if self.state.is_completed() {
            self.drop_late_writes();
            return Ok(());
        }

        let outcome = match self.session.flush().await {
            Ok(applied) if self.state == UnitOfWorkState::TransactionOpen => {
                debug!(applied, "unit of work flushed");
                self.session.commit().await
            }
            Ok(applied) => {
                debug!(applied, "unit of work flushed without transaction");
                Ok(())
            }
            Err(err) => Err(err),
        };

        match outcome {
            Ok(()) => {
                self.state = UnitOfWorkState::Committed;
                debug!("unit of work committed");
                Ok(())
            }
            Err(err) => {
                if self.state == UnitOfWorkState::TransactionOpen {
                    if let Err(rollback_err) = self.session.rollback().await {
                        warn!(error = %rollback_err, "rollback after failed commit also failed");
                    }
                }
                self.discard_staged();
                self.state = UnitOfWorkState::RolledBack;
                Err(err)
            }
        }
    }

    /// Aborts the open transaction and drops staged writes.
    ///
    /// Calling this with no open transaction only drops staged writes.
    ///
    /// # Errors
    ///
    /// Returns the store error if aborting the transaction fails. The unit of
    /// work is still marked rolled back.
    pub async fn rollback(&mut self) -> Result<(), PersistenceError> {
        self.discard_staged();
        if self.state != UnitOfWorkState::TransactionOpen {
            return Ok(());
        }

        self.state = UnitOfWorkState::RolledBack;
        self.session.rollback().await?;
        debug!("unit of work rolled back");
        Ok(())
    }

    /// Flushes staged writes without touching the transaction boundary.
    ///
    /// # Errors
    ///
    /// Returns `PersistenceError::Completed` on a completed unit of work, or
    /// the flush error. Staged writes are kept on failure.
    pub async fn save_changes(&mut self) -> Result<usize, PersistenceError> {
        if self.state.is_completed() {
            return Err(PersistenceError::Completed);
        }
        let applied = self.session.flush().await?;
        debug!(applied, "unit of work saved changes");
        Ok(applied)
    }

    fn discard_staged(&mut self) {
        self.session.accounts_mut().discard();
        self.session.transaction_logs_mut().discard();
    }

    fn drop_late_writes(&mut self) {
        let late = self.session.accounts().pending() + self.session.transaction_logs().pending();
        if late > 0 {
            warn!(late, "dropping writes staged on a completed unit of work");
            self.discard_staged();
        }
    }
}
