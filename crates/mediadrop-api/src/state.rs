//! Shared application state handed to every handler.

use std::time::Instant;

use mediadrop_events::EventBus;
use mediadrop_pipeline::{FetchOrchestrator, Transcoder};
use mediadrop_runtime::HistoryStore;
use mediadrop_scratch::{ArtifactLeases, HandleSigner, ScratchDir};
use mediadrop_telemetry::Metrics;

/// Services the API is built on, assembled by the application bootstrap.
#[derive(Clone)]
pub struct ApiDependencies {
    /// Scratch directory holding artifacts.
    pub scratch: ScratchDir,
    /// In-flight stream leases driving deferred cleanup.
    pub leases: ArtifactLeases,
    /// Signer used to verify `/stream` handles.
    pub signer: HandleSigner,
    /// Fetch pipeline.
    pub orchestrator: FetchOrchestrator,
    /// On-demand MP3 conversion.
    pub transcoder: Transcoder,
    /// Download history store.
    pub history: HistoryStore,
    /// Lifecycle event bus.
    pub events: EventBus,
    /// Prometheus collectors.
    pub metrics: Metrics,
}

pub(crate) struct ApiState {
    pub(crate) scratch: ScratchDir,
    pub(crate) leases: ArtifactLeases,
    pub(crate) signer: HandleSigner,
    pub(crate) orchestrator: FetchOrchestrator,
    pub(crate) transcoder: Transcoder,
    pub(crate) history: HistoryStore,
    pub(crate) events: EventBus,
    pub(crate) telemetry: Metrics,
    pub(crate) started_at: Instant,
}

impl ApiState {
    pub(crate) fn new(deps: ApiDependencies) -> Self {
        Self {
            scratch: deps.scratch,
            leases: deps.leases,
            signer: deps.signer,
            orchestrator: deps.orchestrator,
            transcoder: deps.transcoder,
            history: deps.history,
            events: deps.events,
            telemetry: deps.metrics,
            started_at: Instant::now(),
        }
    }
}
