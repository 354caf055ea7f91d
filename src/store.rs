use std::sync::{Mutex, PoisonError};

use serde::Serialize;
use serde_with::{hex::Hex, serde_as};
use thiserror::Error;

use crate::protocol::MessageType;

/// One FIT record received from the device.
#[serde_as]
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct StoredRecord {
    message_type: MessageType,
    #[serde_as(as = "Hex")]
    body: Vec<u8>,
}

impl StoredRecord {
    #[must_use]
    pub fn new(message_type: MessageType, body: Vec<u8>) -> Self {
        Self { message_type, body }
    }

    #[must_use]
    pub fn message_type(&self) -> MessageType {
        self.message_type
    }

    #[must_use]
    pub fn body(&self) -> &[u8] {
        &self.body
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sample store rejected record: {reason}")]
    Rejected { reason: String },
}

/// Sink for decoded device samples.
pub trait SampleStore: Send + Sync {
    /// Persists one record.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the record cannot be kept.
    fn persist(&self, record: StoredRecord) -> Result<(), StoreError>;
}

/// In-process store that keeps every record in arrival order.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<Vec<StoredRecord>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of the stored records.
    #[must_use]
    pub fn records(&self) -> Vec<StoredRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl SampleStore for MemoryStore {
    fn persist(&self, record: StoredRecord) -> Result<(), StoreError> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record);
        Ok(())
    }
}

/// Store that drops everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiscardStore;

impl SampleStore for DiscardStore {
    fn persist(&self, _record: StoredRecord) -> Result<(), StoreError> {
        Ok(())
    }
}
