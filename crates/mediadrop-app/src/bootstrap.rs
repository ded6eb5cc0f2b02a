use std::future::Future;
use std::sync::Arc;

use mediadrop_api::{ApiDependencies, ApiServer};
use mediadrop_config::AppConfig;
use mediadrop_events::EventBus;
use mediadrop_pipeline::{
    FetchOrchestrator, PipelineSettings, ProcessRunner, ToolRunner, Transcoder, YouTubeEnricher,
};
use mediadrop_runtime::HistoryStore;
use mediadrop_scratch::{ArtifactLeases, HandleSigner, ScratchDir, SweeperHandle, spawn_sweeper};
use mediadrop_telemetry::{GlobalContextGuard, LogFormat, LoggingConfig, Metrics};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::error::{AppError, AppResult};

/// Dependencies required to bootstrap the application.
pub(crate) struct BootstrapDependencies {
    config: AppConfig,
    events: EventBus,
    telemetry: Metrics,
}

impl BootstrapDependencies {
    /// Construct production dependencies from the environment.
    pub(crate) fn from_env() -> AppResult<Self> {
        let config = AppConfig::from_env().map_err(|err| AppError::config("config.from_env", err))?;
        Self::with_config(config)
    }

    pub(crate) fn with_config(config: AppConfig) -> AppResult<Self> {
        let telemetry =
            Metrics::new().map_err(|err| AppError::telemetry("telemetry.metrics", err))?;
        Ok(Self {
            config,
            events: EventBus::new(),
            telemetry,
        })
    }
}

/// Long-lived services assembled from configuration.
pub(crate) struct Services {
    pub(crate) api: ApiDependencies,
    pub(crate) scratch: ScratchDir,
    pub(crate) leases: ArtifactLeases,
}

/// Entry point for the application boot sequence.
///
/// # Errors
///
/// Returns an error if configuration, logging, service construction or the
/// HTTP listener fails.
pub async fn run_app() -> AppResult<()> {
    let dependencies = BootstrapDependencies::from_env()?;
    let logging = LoggingConfig {
        level: &dependencies.config.telemetry.log_level,
        format: LogFormat::from_name(dependencies.config.telemetry.log_format.as_deref()),
        build_version: env!("CARGO_PKG_VERSION"),
    };
    mediadrop_telemetry::init_logging(&logging)
        .map_err(|err| AppError::telemetry("telemetry.init", err))?;

    let addr = dependencies.config.http.socket_addr();
    let listener = ApiServer::bind(addr)
        .await
        .map_err(|err| AppError::api_server("api_server.bind", err))?;
    info!(addr = %addr, "api listener bound");
    run_app_with(dependencies, listener, shutdown_signal()).await
}

/// Boot sequence over injected dependencies; serves `listener` until
/// `shutdown` resolves.
pub(crate) async fn run_app_with<F>(
    dependencies: BootstrapDependencies,
    listener: TcpListener,
    shutdown: F,
) -> AppResult<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let _context = GlobalContextGuard::new("mediadrop");
    info!("mediadrop bootstrap starting");

    let BootstrapDependencies {
        config,
        events,
        telemetry,
    } = dependencies;

    let event_metrics = spawn_event_metrics(events.clone(), telemetry.clone());
    let services = build_services(&config, events, telemetry).await?;
    let sweeper = start_sweeper(&config, &services);

    info!(scratch = %services.scratch.root().display(), "serving api");
    let serve_result = ApiServer::new(services.api).serve(listener, shutdown).await;

    sweeper.shutdown().await;
    event_metrics.abort();

    serve_result.map_err(|err| AppError::api_server("api_server.serve", err))?;
    info!("api server shutdown complete");
    Ok(())
}

/// Wire the scratch directory, signer, tools and stores from configuration.
pub(crate) async fn build_services(
    config: &AppConfig,
    events: EventBus,
    telemetry: Metrics,
) -> AppResult<Services> {
    let scratch = ScratchDir::ensure(&config.storage.scratch_dir)
        .await
        .map_err(|err| AppError::scratch("scratch.ensure", err))?;
    let leases = ArtifactLeases::new(config.cleanup.delay, events.clone(), telemetry.clone());
    let signer = match config.handles.secret.as_deref() {
        Some(secret) => HandleSigner::new(secret.as_bytes(), config.handles.ttl)
            .map_err(|err| AppError::scratch("handles.signer", err))?,
        None => {
            info!("no handle secret configured; stream links expire with the process");
            HandleSigner::random(config.handles.ttl)
        }
    };

    let runner: Arc<dyn ToolRunner> = Arc::new(ProcessRunner);
    let mut orchestrator = FetchOrchestrator::new(
        scratch.clone(),
        signer.clone(),
        Arc::clone(&runner),
        PipelineSettings {
            downloader_bin: config.tools.downloader_bin.clone(),
            metadata_timeout: config.tools.metadata_timeout,
            download_timeout: config.tools.download_timeout,
        },
        events.clone(),
        telemetry.clone(),
    );
    if let Some(key) = config.youtube_api_key.as_deref() {
        let enricher =
            YouTubeEnricher::new(key).map_err(|err| AppError::http("youtube.client", err))?;
        orchestrator = orchestrator.with_enricher(enricher);
    }
    let transcoder = Transcoder::new(
        runner,
        config.tools.transcoder_bin.clone(),
        config.tools.transcode_timeout,
        telemetry.clone(),
    );

    Ok(Services {
        api: ApiDependencies {
            scratch: scratch.clone(),
            leases: leases.clone(),
            signer,
            orchestrator,
            transcoder,
            history: HistoryStore::new(config.storage.history_file.clone()),
            events,
            metrics: telemetry,
        },
        scratch,
        leases,
    })
}

fn start_sweeper(config: &AppConfig, services: &Services) -> SweeperHandle {
    spawn_sweeper(
        services.scratch.clone(),
        services.leases.clone(),
        config.cleanup.sweep_interval,
        config.cleanup.artifact_ttl,
    )
}

/// Count every published event in `events_emitted_total`.
pub(crate) fn spawn_event_metrics(events: EventBus, telemetry: Metrics) -> JoinHandle<()> {
    let mut stream = events.subscribe(None);
    tokio::spawn(async move {
        while let Some(envelope) = stream.next().await {
            telemetry.inc_event(envelope.event.kind());
        }
    })
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("shutdown signal received"),
        Err(err) => {
            warn!(error = %err, "failed to listen for shutdown signal; serving until killed");
            std::future::pending::<()>().await;
        }
    }
}
