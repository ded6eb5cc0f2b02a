//! In-process event bus for pipeline lifecycle notifications.
//!
//! The bus assigns sequential identifiers, keeps a bounded replay ring so SSE
//! clients can resume with `Last-Event-ID`, and fans events out through
//! `tokio::broadcast`. When the channel overflows the oldest events are dropped.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::{self, Receiver, Sender};
use uuid::Uuid;

/// Identifier assigned to each published event.
pub type EventId = u64;

const DEFAULT_REPLAY_CAPACITY: usize = 512;

/// Why an artifact left the scratch directory.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RemovalReason {
    /// Deferred cleanup after the last stream released the artifact.
    Cleanup,
    /// Periodic sweep of orphaned artifacts past their TTL.
    Sweep,
}

impl RemovalReason {
    /// Label used for metrics and logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cleanup => "cleanup",
            Self::Sweep => "sweep",
        }
    }
}

/// Typed lifecycle events surfaced by the fetch and stream pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// The orchestrator accepted a fetch and allocated its unique id.
    FetchStarted {
        /// Unique id namespacing the fetch's artifacts.
        fetch_id: Uuid,
        /// Platform tag supplied by the caller.
        platform: String,
    },
    /// The downloader produced an artifact.
    FetchCompleted {
        /// Unique id namespacing the fetch's artifacts.
        fetch_id: Uuid,
        /// Artifact file name inside the scratch directory.
        artifact: String,
        /// Artifact size on disk.
        size_bytes: u64,
    },
    /// The fetch failed before producing a usable artifact.
    FetchFailed {
        /// Unique id namespacing the fetch's artifacts.
        fetch_id: Uuid,
        /// Platform tag supplied by the caller.
        platform: String,
        /// Client-safe failure summary.
        message: String,
    },
    /// Transcoding failed and the original artifact is streamed instead.
    TranscodeFallback {
        /// Artifact that could not be transcoded.
        artifact: String,
    },
    /// A stream of an artifact began.
    StreamStarted {
        /// Artifact being streamed.
        artifact: String,
        /// Whether a byte range was requested.
        partial: bool,
    },
    /// A stream ended, either fully delivered or interrupted.
    StreamFinished {
        /// Artifact that was streamed.
        artifact: String,
        /// Bytes written to the client.
        bytes_sent: u64,
        /// `false` when the client went away before the body completed.
        completed: bool,
    },
    /// An artifact was deleted from the scratch directory.
    ArtifactRemoved {
        /// Artifact file name.
        artifact: String,
        /// What triggered the deletion.
        reason: RemovalReason,
    },
}

impl Event {
    /// Machine-friendly discriminator for SSE consumers.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::FetchStarted { .. } => "fetch_started",
            Self::FetchCompleted { .. } => "fetch_completed",
            Self::FetchFailed { .. } => "fetch_failed",
            Self::TranscodeFallback { .. } => "transcode_fallback",
            Self::StreamStarted { .. } => "stream_started",
            Self::StreamFinished { .. } => "stream_finished",
            Self::ArtifactRemoved { .. } => "artifact_removed",
        }
    }

    /// Fetch id this event belongs to, when it can be attributed to one.
    ///
    /// Artifact events are attributed through the `{uniqueId}_` file name prefix.
    #[must_use]
    pub fn fetch_id(&self) -> Option<Uuid> {
        match self {
            Self::FetchStarted { fetch_id, .. }
            | Self::FetchCompleted { fetch_id, .. }
            | Self::FetchFailed { fetch_id, .. } => Some(*fetch_id),
            Self::TranscodeFallback { artifact }
            | Self::StreamStarted { artifact, .. }
            | Self::StreamFinished { artifact, .. }
            | Self::ArtifactRemoved { artifact, .. } => artifact
                .split_once('_')
                .and_then(|(prefix, _)| Uuid::parse_str(prefix).ok()),
        }
    }
}

/// Metadata wrapper tracking the event id and emission timestamp.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EventEnvelope {
    /// Sequential identifier.
    pub id: EventId,
    /// Emission time.
    pub timestamp: DateTime<Utc>,
    /// Event payload.
    pub event: Event,
}

/// Shared event bus built on top of `tokio::broadcast`.
#[derive(Clone)]
pub struct EventBus {
    sender: Sender<EventEnvelope>,
    buffer: Arc<Mutex<VecDeque<EventEnvelope>>>,
    next_id: Arc<AtomicU64>,
    replay_capacity: usize,
}

impl EventBus {
    /// Construct a new bus with the provided broadcast and replay capacity.
    ///
    /// A zero capacity is bumped to one.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            buffer: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            next_id: Arc::new(AtomicU64::new(1)),
            replay_capacity: capacity,
        }
    }

    /// Construct a bus with the default replay buffer size.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_REPLAY_CAPACITY)
    }

    /// Publish an event, assigning it the next sequential identifier.
    pub fn publish(&self, event: Event) -> EventId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let envelope = EventEnvelope {
            id,
            timestamp: Utc::now(),
            event,
        };

        {
            let mut buffer = self.buffer.lock().unwrap_or_else(PoisonError::into_inner);
            if buffer.len() == self.replay_capacity {
                buffer.pop_front();
            }
            buffer.push_back(envelope.clone());
        }

        // No subscribers is not an error; the replay ring still holds the event.
        let _ = self.sender.send(envelope);
        id
    }

    /// Subscribe to the bus, replaying buffered events newer than `since_id`.
    #[must_use]
    pub fn subscribe(&self, since_id: Option<EventId>) -> EventStream {
        let receiver = self.sender.subscribe();
        let mut backlog = VecDeque::new();
        if let Some(since) = since_id {
            let buffer = self.buffer.lock().unwrap_or_else(PoisonError::into_inner);
            backlog.extend(buffer.iter().filter(|item| item.id > since).cloned());
        }
        let replayed_through = backlog.back().map(|envelope| envelope.id);
        EventStream {
            backlog,
            receiver,
            replayed_through,
        }
    }

    /// Returns the last assigned identifier, if any events have been published.
    #[must_use]
    pub fn last_event_id(&self) -> Option<EventId> {
        let buffer = self.buffer.lock().unwrap_or_else(PoisonError::into_inner);
        buffer.back().map(|event| event.id)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Stream that yields the replay backlog first, then live events.
pub struct EventStream {
    backlog: VecDeque<EventEnvelope>,
    receiver: Receiver<EventEnvelope>,
    replayed_through: Option<EventId>,
}

impl EventStream {
    /// Receive the next event. Returns `None` once the bus is gone.
    pub async fn next(&mut self) -> Option<EventEnvelope> {
        if let Some(event) = self.backlog.pop_front() {
            return Some(event);
        }

        loop {
            match self.receiver.recv().await {
                Ok(event) => {
                    // The receiver subscribed before the backlog snapshot, so the
                    // same event can arrive on both paths.
                    if self.replayed_through.is_some_and(|seen| event.id <= seen) {
                        continue;
                    }
                    return Some(event);
                }
                Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    fn started(n: u128) -> Event {
        Event::FetchStarted {
            fetch_id: Uuid::from_u128(n),
            platform: "YouTube".to_string(),
        }
    }

    #[tokio::test]
    async fn sequential_ids_and_replay() {
        let bus = EventBus::with_capacity(16);
        let mut last_id = 0;
        for n in 0..5 {
            last_id = bus.publish(started(n));
        }
        assert_eq!(last_id, 5);
        assert_eq!(bus.last_event_id(), Some(5));

        let mut stream = bus.subscribe(Some(2));
        let mut ids = Vec::new();
        for _ in 0..3 {
            if let Some(envelope) = stream.next().await {
                ids.push(envelope.id);
            }
        }
        assert_eq!(ids, vec![3, 4, 5]);
    }

    #[tokio::test]
    async fn replay_ring_drops_oldest() {
        let bus = EventBus::with_capacity(2);
        for n in 0..4 {
            bus.publish(started(n));
        }
        let mut stream = bus.subscribe(Some(0));
        let first = stream.next().await.map(|envelope| envelope.id);
        assert_eq!(first, Some(3));
    }

    #[tokio::test]
    async fn live_events_follow_backlog_without_duplicates() -> Result<(), Box<dyn std::error::Error>>
    {
        let bus = EventBus::with_capacity(8);
        bus.publish(started(1));
        let mut stream = bus.subscribe(Some(0));
        bus.publish(started(2));

        let first = timeout(Duration::from_secs(1), stream.next()).await?;
        let second = timeout(Duration::from_secs(1), stream.next()).await?;
        assert_eq!(first.map(|e| e.id), Some(1));
        assert_eq!(second.map(|e| e.id), Some(2));
        Ok(())
    }

    #[test]
    fn artifact_events_attribute_fetch_id_from_prefix() {
        let id = Uuid::new_v4();
        let event = Event::StreamStarted {
            artifact: format!("{id}_clip.mp4"),
            partial: false,
        };
        assert_eq!(event.fetch_id(), Some(id));
        assert_eq!(event.kind(), "stream_started");

        let unattributed = Event::ArtifactRemoved {
            artifact: "abc123_movie.mp4".to_string(),
            reason: RemovalReason::Sweep,
        };
        assert_eq!(unattributed.fetch_id(), None);
    }

    #[test]
    fn events_serialize_with_type_tag() -> Result<(), serde_json::Error> {
        let value = serde_json::to_value(Event::TranscodeFallback {
            artifact: "a_b.mp4".to_string(),
        })?;
        assert_eq!(value["type"], "transcode_fallback");
        assert_eq!(value["artifact"], "a_b.mp4");
        Ok(())
    }
}
