//! Staged writes held by a repository until its session flushes.

/// One staged write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StagedWrite<T> {
    /// Insert a new row.
    Add(T),
    /// Replace an existing row.
    Update(T),
    /// Delete an existing row.
    Remove(T),
}

impl<T> StagedWrite<T> {
    /// The entity carried by this write.
    pub fn entity(&self) -> &T {
        match self {
            Self::Add(entity) | Self::Update(entity) | Self::Remove(entity) => entity,
        }
    }
}

/// Ordered staged writes plus the inserts a flush has confirmed.
#[derive(Debug, Clone)]
pub struct ChangeSet<T> {
    staged: Vec<StagedWrite<T>>,
    inserted: Vec<T>,
}

impl<T> Default for ChangeSet<T> {
    fn default() -> Self {
        Self {
            staged: Vec::new(),
            inserted: Vec::new(),
        }
    }
}

impl<T> ChangeSet<T> {
    /// Creates an empty change set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stages a write.
    pub fn stage(&mut self, write: StagedWrite<T>) {
        self.staged.push(write);
    }

    /// Staged writes in the order they were made.
    #[must_use]
    pub fn staged(&self) -> &[StagedWrite<T>] {
        &self.staged
    }

    /// Staged adds and updates, in staging order.
    pub fn upserts(&self) -> impl Iterator<Item = &StagedWrite<T>> {
        self.staged
            .iter()
            .filter(|write| !matches!(write, StagedWrite::Remove(_)))
    }

    /// Staged removes, in staging order.
    pub fn removals(&self) -> impl Iterator<Item = &StagedWrite<T>> {
        self.staged
            .iter()
            .filter(|write| matches!(write, StagedWrite::Remove(_)))
    }

    /// Number of staged writes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.staged.len()
    }

    /// Returns true if nothing is staged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.staged.is_empty()
    }

    /// Marks the staged writes as applied and records the confirmed inserts.
    pub fn applied(&mut self, inserted: Vec<T>) {
        self.staged.clear();
        self.inserted.extend(inserted);
    }

    /// Drops every staged write.
    pub fn discard(&mut self) {
        self.staged.clear();
    }

    /// Takes the confirmed inserts.
    pub fn take_inserted(&mut self) -> Vec<T> {
        std::mem::take(&mut self.inserted)
    }
}
