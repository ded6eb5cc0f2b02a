//! `GET /events`: server-sent pipeline lifecycle events.

use std::collections::HashSet;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use async_stream::stream;
use axum::{
    extract::{Query, State},
    http::HeaderMap,
    response::sse::{self, Sse},
};
use futures_util::{Stream, StreamExt, future};
use mediadrop_events::{EventBus, EventEnvelope, EventId};
use serde::Deserialize;
use tracing::error;
use uuid::Uuid;

use crate::http::constants::{HEADER_LAST_EVENT_ID, SSE_KEEP_ALIVE_SECS};
use crate::http::errors::ApiError;
use crate::state::ApiState;

const EVENT_KINDS: &[&str] = &[
    "fetch_started",
    "fetch_completed",
    "fetch_failed",
    "transcode_fallback",
    "stream_started",
    "stream_finished",
    "artifact_removed",
];

#[derive(Debug, Default, Deserialize)]
pub(crate) struct SseQuery {
    #[serde(default)]
    pub(crate) fetch: Option<String>,
    #[serde(default)]
    pub(crate) event: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct SseFilter {
    pub(crate) fetch_id: Option<Uuid>,
    pub(crate) event_kinds: HashSet<String>,
}

pub(crate) async fn stream_events(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
    Query(query): Query<SseQuery>,
) -> Result<Sse<impl Stream<Item = Result<sse::Event, Infallible>> + Send>, ApiError> {
    let last_id = headers
        .get(HEADER_LAST_EVENT_ID)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<EventId>().ok());
    let filter = build_sse_filter(&query)?;

    Ok(Sse::new(event_sse_stream(state.events.clone(), last_id, filter)).keep_alive(
        sse::KeepAlive::new()
            .interval(Duration::from_secs(SSE_KEEP_ALIVE_SECS))
            .text("keep-alive"),
    ))
}

pub(crate) fn build_sse_filter(query: &SseQuery) -> Result<SseFilter, ApiError> {
    let mut filter = SseFilter::default();

    if let Some(fetch) = query.fetch.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
        let parsed = Uuid::parse_str(fetch).map_err(|_| {
            ApiError::bad_request(format!("fetch filter '{fetch}' is not a valid id"))
        })?;
        filter.fetch_id = Some(parsed);
    }

    if let Some(events) = query.event.as_deref() {
        for value in events.split(',').map(str::trim).filter(|v| !v.is_empty()) {
            if !EVENT_KINDS.contains(&value) {
                return Err(ApiError::bad_request(format!(
                    "event filter '{value}' is not recognised"
                )));
            }
            filter.event_kinds.insert(value.to_string());
        }
    }

    Ok(filter)
}

pub(crate) fn matches_sse_filter(envelope: &EventEnvelope, filter: &SseFilter) -> bool {
    if !filter.event_kinds.is_empty() && !filter.event_kinds.contains(envelope.event.kind()) {
        return false;
    }
    filter
        .fetch_id
        .is_none_or(|wanted| envelope.event.fetch_id() == Some(wanted))
}

fn event_replay_stream(
    bus: EventBus,
    since: Option<EventId>,
) -> impl Stream<Item = EventEnvelope> + Send {
    stream! {
        let mut events = bus.subscribe(since);
        while let Some(envelope) = events.next().await {
            yield envelope;
        }
    }
}

pub(crate) fn event_sse_stream(
    bus: EventBus,
    since: Option<EventId>,
    filter: SseFilter,
) -> impl Stream<Item = Result<sse::Event, Infallible>> + Send {
    let filter = Arc::new(filter);
    event_replay_stream(bus, since)
        .filter(move |envelope| future::ready(matches_sse_filter(envelope, &filter)))
        .filter_map(|envelope| async move {
            match serde_json::to_string(&envelope) {
                Ok(payload) => Some(Ok(sse::Event::default()
                    .id(envelope.id.to_string())
                    .event(envelope.event.kind())
                    .data(payload))),
                Err(err) => {
                    error!(error = %err, "failed to serialise SSE event payload");
                    None
                }
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use mediadrop_events::Event;
    use tokio::time::timeout;

    #[test]
    fn filter_parses_fetch_and_kinds() -> Result<(), Box<dyn std::error::Error>> {
        let id = Uuid::new_v4();
        let filter = build_sse_filter(&SseQuery {
            fetch: Some(id.to_string()),
            event: Some("stream_started, artifact_removed".to_string()),
        })
        .map_err(|err| format!("{err:?}"))?;
        assert_eq!(filter.fetch_id, Some(id));
        assert_eq!(filter.event_kinds.len(), 2);
        Ok(())
    }

    #[test]
    fn filter_rejects_unknown_values() {
        assert!(
            build_sse_filter(&SseQuery {
                fetch: Some("not-a-uuid".to_string()),
                event: None,
            })
            .is_err()
        );
        assert!(
            build_sse_filter(&SseQuery {
                fetch: None,
                event: Some("progress".to_string()),
            })
            .is_err()
        );
    }

    #[tokio::test]
    async fn stream_replays_only_matching_fetch() -> Result<(), Box<dyn std::error::Error>> {
        let bus = EventBus::with_capacity(16);
        let wanted = Uuid::new_v4();
        bus.publish(Event::FetchStarted {
            fetch_id: Uuid::new_v4(),
            platform: "TikTok".to_string(),
        });
        bus.publish(Event::StreamStarted {
            artifact: format!("{wanted}_clip.mp4"),
            partial: true,
        });

        let filter = SseFilter {
            fetch_id: Some(wanted),
            event_kinds: HashSet::new(),
        };
        let envelopes: Vec<EventEnvelope> = {
            let mut replay = Box::pin(
                event_replay_stream(bus.clone(), Some(0))
                    .filter(move |envelope| future::ready(matches_sse_filter(envelope, &filter))),
            );
            let first = timeout(Duration::from_secs(1), replay.next()).await?;
            first.into_iter().collect()
        };
        assert_eq!(envelopes.len(), 1);
        assert_eq!(envelopes[0].id, 2);
        assert_eq!(envelopes[0].event.kind(), "stream_started");
        Ok(())
    }
}
