//! Download queue for offline content.
//!
//! Requests flow through the queue in this order:
//! 1. `enqueue()` - add to the back (duplicates rejected)
//! 2. `start_next()` - mark the front entry active
//! 3. `complete()` - pop the active entry once its download ends
//!
//! Only one entry is active at a time. Cancelling a queued entry removes it
//! before it starts; the active entry cannot be cancelled.

use std::collections::VecDeque;
use sync_types::{ContentType, DownloadQueueEntry};

/// Error type for queue operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueError {
    /// Queue is at capacity.
    Full {
        /// Current queue capacity.
        capacity: usize,
    },
    /// The same item is already queued.
    Duplicate {
        /// Type of the item.
        content_type: ContentType,
        /// Id of the item.
        content_id: String,
    },
    /// The item is downloading right now.
    Active {
        /// Type of the item.
        content_type: ContentType,
        /// Id of the item.
        content_id: String,
    },
    /// The item is not in the queue.
    NotQueued {
        /// Type of the item.
        content_type: ContentType,
        /// Id of the item.
        content_id: String,
    },
}

impl std::fmt::Display for QueueError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueueError::Full { capacity } => {
                write!(f, "download queue full (capacity: {})", capacity)
            }
            QueueError::Duplicate {
                content_type,
                content_id,
            } => write!(f, "{} {} is already queued", content_type, content_id),
            QueueError::Active {
                content_type,
                content_id,
            } => write!(f, "{} {} is downloading", content_type, content_id),
            QueueError::NotQueued {
                content_type,
                content_id,
            } => write!(f, "{} {} is not queued", content_type, content_id),
        }
    }
}

impl std::error::Error for QueueError {}

/// FIFO of pending downloads with a single active slot at the front.
#[derive(Debug)]
pub struct DownloadQueue {
    /// Maximum number of entries, active one included.
    max_size: usize,
    /// Entries in request order; the front is active when `active` is set.
    entries: VecDeque<DownloadQueueEntry>,
    /// Whether the front entry is downloading.
    active: bool,
}

impl DownloadQueue {
    /// Create a new queue with the given maximum size.
    pub fn new(max_size: usize) -> Self {
        Self {
            max_size,
            entries: VecDeque::new(),
            active: false,
        }
    }

    /// Add a request to the back of the queue.
    ///
    /// Rejects a request for an item already queued or downloading, and
    /// any request once `max_size` entries are held.
    pub fn enqueue(&mut self, entry: DownloadQueueEntry) -> Result<(), QueueError> {
        if self.contains(entry.content_type, &entry.content_id) {
            return Err(QueueError::Duplicate {
                content_type: entry.content_type,
                content_id: entry.content_id,
            });
        }
        if self.entries.len() >= self.max_size {
            return Err(QueueError::Full {
                capacity: self.max_size,
            });
        }
        self.entries.push_back(entry);
        Ok(())
    }

    /// Mark the front entry active and return it.
    ///
    /// Returns `None` if an entry is already active or the queue is empty.
    pub fn start_next(&mut self) -> Option<DownloadQueueEntry> {
        if self.active {
            return None;
        }
        let entry = self.entries.front()?.clone();
        self.active = true;
        Some(entry)
    }

    /// Remove the active entry, whether its download succeeded or not.
    pub fn complete(&mut self) -> Option<DownloadQueueEntry> {
        if !self.active {
            return None;
        }
        self.active = false;
        self.entries.pop_front()
    }

    /// Remove a queued entry that has not started.
    pub fn cancel(
        &mut self,
        content_type: ContentType,
        content_id: &str,
    ) -> Result<DownloadQueueEntry, QueueError> {
        let position = self
            .entries
            .iter()
            .position(|e| e.matches(content_type, content_id))
            .ok_or_else(|| QueueError::NotQueued {
                content_type,
                content_id: content_id.to_string(),
            })?;

        if position == 0 && self.active {
            return Err(QueueError::Active {
                content_type,
                content_id: content_id.to_string(),
            });
        }

        self.entries
            .remove(position)
            .ok_or_else(|| QueueError::NotQueued {
                content_type,
                content_id: content_id.to_string(),
            })
    }

    /// Drop every entry that has not started. Returns how many were dropped.
    pub fn cancel_all(&mut self) -> usize {
        let keep = usize::from(self.active);
        let dropped = self.entries.len().saturating_sub(keep);
        self.entries.truncate(keep);
        dropped
    }

    /// Whether the item is queued or downloading.
    pub fn contains(&self, content_type: ContentType, content_id: &str) -> bool {
        self.entries.iter().any(|e| e.matches(content_type, content_id))
    }

    /// Whether a download is in progress.
    pub fn is_downloading(&self) -> bool {
        self.active
    }

    /// The entry currently downloading.
    pub fn active(&self) -> Option<&DownloadQueueEntry> {
        if self.active {
            self.entries.front()
        } else {
            None
        }
    }

    /// Number of entries, active one included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum number of entries.
    pub fn capacity(&self) -> usize {
        self.max_size
    }

    /// Snapshot of all entries in order.
    pub fn entries(&self) -> Vec<DownloadQueueEntry> {
        self.entries.iter().cloned().collect()
    }
}
