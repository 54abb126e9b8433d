use crate::constants::METADATA_KEY_GENERATION_ID;
use crate::constants::METADATA_TREE;
use crate::constants::SEQUENCE_TREE;
use crate::constants::TOPIC_TREE_PREFIX;
use crate::init_sled_db;
use crate::Notification;
use crate::NotificationStore;
use crate::NotificationsResponse;
use crate::Payload;
use crate::Result;
use crate::StorageConfig;
use crate::StorageError;
use chrono::DateTime;
use chrono::Utc;
use nanoid::nanoid;
use parking_lot::Mutex;
use sled::transaction::ConflictableTransactionError;
use sled::transaction::TransactionError;
use sled::Batch;
use sled::Transactional;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::error;
use tracing::info;
use tracing::trace;

/// Notification store backed by an embedded sled volume.
///
/// One tree per topic holds serialized records keyed by big-endian index;
/// a sequence tree holds the per-topic counters and a metadata tree holds
/// the generation ID.
pub struct SledNotificationStore {
    db: sled::Db,
    seq_tree: sled::Tree,
    generation_id: String,
    retention: chrono::Duration,
    gc_interval: Duration,
    gc_task: Mutex<Option<GcTask>>,
}

struct GcTask {
    stop: watch::Sender<()>,
    handle: JoinHandle<()>,
}

impl NotificationStore for SledNotificationStore {
    fn append(&self, topic: &str, data: Payload) -> Result<()> {
        let log_tree = self.db.open_tree(Self::topic_tree_name(topic))?;
        let timestamp = Utc::now();

        // The counter bump and the log insert commit together, so concurrent
        // appenders never observe a reused index.
        (&self.seq_tree, &log_tree)
            .transaction(|(seq, log)| {
                let index = match seq.get(topic.as_bytes())? {
                    Some(raw) => {
                        Self::key_to_index(&raw).map_err(ConflictableTransactionError::Abort)? + 1
                    }
                    None => 1,
                };
                seq.insert(topic.as_bytes(), &Self::index_to_key(index))?;

                let notification = Notification {
                    index,
                    timestamp,
                    data: data.clone(),
                };
                let buf = serde_json::to_vec(&notification)
                    .map_err(|e| ConflictableTransactionError::Abort(StorageError::Record(e)))?;
                log.insert(&Self::index_to_key(index), buf)?;
                Ok(())
            })
            .map_err(|e| match e {
                TransactionError::Abort(err) => err,
                TransactionError::Storage(err) => StorageError::Db(err),
            })?;

        trace!(topic, "notification appended");
        Ok(())
    }

    fn get(&self, topic: &str, generation_id: &str, from_index: u64) -> Result<NotificationsResponse> {
        let mut notifications = Vec::new();

        if let Some(log_tree) = self.existing_topic_tree(topic)? {
            // A stale cursor is meaningless against this volume's data, so
            // iteration restarts from the first stored entry.
            let start = if generation_id == self.generation_id {
                from_index
            } else {
                0
            };

            for item in log_tree.range(Self::index_to_key(start)..) {
                let (_, value) = item?;
                let notification: Notification = serde_json::from_slice(&value)?;
                notifications.push(notification);
            }
        }

        Ok(NotificationsResponse {
            generation_id: self.generation_id.clone(),
            notifications,
        })
    }

    fn collect_garbage(&self, older_than: DateTime<Utc>) -> Result<u64> {
        let mut deleted = 0u64;

        for name in self.db.tree_names() {
            if !name.as_ref().starts_with(TOPIC_TREE_PREFIX.as_bytes()) {
                continue;
            }
            let tree = self.db.open_tree(&name)?;
            let mut batch = Batch::default();
            let mut removed = 0u64;

            // Entries are scanned in full instead of stopping at the first
            // fresh one: wall clocks can step, so timestamps are not assumed
            // ordered by index.
            for item in tree.iter() {
                let (key, value) = item?;
                let notification: Notification = serde_json::from_slice(&value)?;
                if notification.timestamp < older_than {
                    batch.remove(key);
                    removed += 1;
                }
            }

            if removed > 0 {
                tree.apply_batch(batch)?;
                deleted += removed;
            }
        }

        Ok(deleted)
    }
}

impl SledNotificationStore {
    /// Opens (creating if absent) the volume at the configured path and
    /// loads or bootstraps the generation ID.
    pub fn open(config: &StorageConfig) -> Result<Self> {
        let db = init_sled_db(&config.path)?;
        let meta_tree = db.open_tree(METADATA_TREE)?;
        let seq_tree = db.open_tree(SEQUENCE_TREE)?;
        let generation_id = Self::load_or_init_generation_id(&meta_tree)?;

        info!(generation_id = %generation_id, path = ?config.path, "notification store opened");

        Ok(Self {
            db,
            seq_tree,
            generation_id,
            retention: chrono::Duration::seconds(config.retention_secs as i64),
            gc_interval: config.gc_interval(),
            gc_task: Mutex::new(None),
        })
    }

    /// The token identifying this lifetime of the volume's data.
    pub fn generation_id(&self) -> &str {
        &self.generation_id
    }

    /// Starts the background garbage collection loop. Failed cycles are
    /// logged and retried on the next tick; a stop signal ends the loop
    /// after any in-flight sweep completes.
    pub fn start_gc(store: &Arc<Self>) {
        let (stop_tx, mut stop_rx) = watch::channel(());
        let gc_store = Arc::clone(store);

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(gc_store.gc_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // the interval's first tick completes immediately; the first
            // sweep waits one full period
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = stop_rx.changed() => {
                        info!("garbage collection loop stopped");
                        return;
                    }
                    _ = ticker.tick() => {
                        let cutoff = Utc::now() - gc_store.retention;
                        match gc_store.collect_garbage(cutoff) {
                            Ok(deleted) => info!(deleted, "garbage collection cycle finished"),
                            Err(e) => error!(error = %e, "garbage collection cycle failed"),
                        }
                    }
                }
            }
        });

        *store.gc_task.lock() = Some(GcTask {
            stop: stop_tx,
            handle,
        });
    }

    /// Stops the garbage collection loop, waits for it to finish its current
    /// cycle, and flushes the volume. A second call is a no-op for the GC
    /// task.
    pub async fn close(&self) -> Result<()> {
        let task = self.gc_task.lock().take();
        if let Some(GcTask { stop, handle }) = task {
            let _ = stop.send(());
            if let Err(e) = handle.await {
                error!(error = %e, "garbage collection task join failed");
            }
        }

        self.db.flush_async().await?;
        info!("notification store closed");
        Ok(())
    }

    fn load_or_init_generation_id(meta_tree: &sled::Tree) -> Result<String> {
        let fresh = nanoid!();
        // create-if-absent: the ID is set exactly once per volume and is
        // immutable afterwards
        let existing = match meta_tree.compare_and_swap(
            METADATA_KEY_GENERATION_ID,
            None::<&[u8]>,
            Some(fresh.as_bytes()),
        )? {
            Ok(()) => {
                meta_tree.flush()?;
                return Ok(fresh);
            }
            Err(cas) => cas.current.ok_or_else(|| StorageError::Corruption {
                location: format!("{}/{}", METADATA_TREE, METADATA_KEY_GENERATION_ID),
            })?,
        };

        String::from_utf8(existing.to_vec()).map_err(|_| {
            StorageError::Corruption {
                location: format!("{}/{}", METADATA_TREE, METADATA_KEY_GENERATION_ID),
            }
            .into()
        })
    }

    fn topic_tree_name(topic: &str) -> String {
        format!("{}{}", TOPIC_TREE_PREFIX, topic)
    }

    /// Probes for the topic's tree without creating it; a read must not
    /// bring a topic into existence.
    fn existing_topic_tree(&self, topic: &str) -> Result<Option<sled::Tree>> {
        let name = Self::topic_tree_name(topic);
        if !self
            .db
            .tree_names()
            .iter()
            .any(|n| n.as_ref() == name.as_bytes())
        {
            return Ok(None);
        }
        Ok(Some(self.db.open_tree(name)?))
    }

    /// Helper: convert index to big-endian bytes. Fixed-width keys keep the
    /// engine's byte-lexicographic order equal to numeric order.
    pub(crate) fn index_to_key(index: u64) -> [u8; 8] {
        index.to_be_bytes()
    }

    /// Helper: convert key bytes back to an index
    pub(crate) fn key_to_index(key: &[u8]) -> std::result::Result<u64, StorageError> {
        let bytes: [u8; 8] = key.try_into().map_err(|_| StorageError::Corruption {
            location: format!("sequence key of width {}", key.len()),
        })?;
        Ok(u64::from_be_bytes(bytes))
    }
}

impl std::fmt::Debug for SledNotificationStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SledNotificationStore")
            .field("generation_id", &self.generation_id)
            .finish()
    }
}

impl Drop for SledNotificationStore {
    fn drop(&mut self) {
        if let Err(e) = self.db.flush() {
            error!(error = %e, "failed to flush notification store");
        }
    }
}
