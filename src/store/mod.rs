//! Durable, ordered, per-topic notification storage.

mod sled_store;
mod types;


#[doc(hidden)]
pub use sled_store::*;
#[doc(hidden)]
pub use types::*;

use crate::Result;
use crate::StorageError;
use chrono::DateTime;
use chrono::Utc;
use std::path::Path;
use tracing::warn;

#[cfg(test)]
use mockall::automock;

/// Read/write contract of the notification log, shared by the transport and
/// watch layers. Lifecycle (open, background GC, close) lives on the
/// concrete store.
#[cfg_attr(test, automock)]
pub trait NotificationStore: Send + Sync + 'static {
    /// Appends one notification to the topic, assigning the next index.
    fn append(&self, topic: &str, data: Payload) -> Result<()>;

    /// Returns stored notifications for the topic starting at the first
    /// index >= `from_index`, or from the first entry when `generation_id`
    /// does not match the store's current generation. An unknown topic reads
    /// as an empty log.
    fn get(&self, topic: &str, generation_id: &str, from_index: u64) -> Result<NotificationsResponse>;

    /// Deletes every notification strictly older than the cutoff, across
    /// all topics. Returns the number of entries removed.
    fn collect_garbage(&self, older_than: DateTime<Utc>) -> Result<u64>;
}

/// Opens (creating if absent) the sled volume backing the notification log.
pub fn init_sled_db(path: impl AsRef<Path> + std::fmt::Debug) -> Result<sled::Db> {
    sled::Config::default()
        .path(path.as_ref())
        .use_compression(true)
        .open()
        .map_err(|e| {
            warn!("Try to open DB at this location: {:?} and failed: {:?}", path, e);
            StorageError::Db(e).into()
        })
}
