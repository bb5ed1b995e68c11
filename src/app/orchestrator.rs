use super::types::{Component, ComponentState, ShutdownReason};
use crate::config::FacecamConfig;
use crate::controller::{
    CaptureController, CaptureControllerBuilder, ControllerCommand, ControllerHandle,
};
use crate::error::Result;
use crate::events::EventBus;
use crate::identity::IdentityStore;
use crate::oracle::{EmbeddingOracle, FrameSource, ReplayOracle, SyntheticFrameSource};
use crate::persistence::{FileKeyValueStore, KeyValueStore};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Main application coordinator owning the controller task and its
/// satellites
pub struct FacecamOrchestrator {
    pub(super) config: FacecamConfig,
    pub(super) event_bus: Arc<EventBus>,
    pub(super) handle: ControllerHandle,

    // Components
    pub(super) controller: Option<CaptureController>,
    pub(super) commands: Option<mpsc::Receiver<ControllerCommand>>,
    pub(super) controller_task: Option<JoinHandle<Result<()>>>,
    pub(super) event_logger_task: Option<JoinHandle<()>>,
    pub(super) console_task: Option<JoinHandle<()>>,
    pub(super) console_enabled: bool,

    // Lifecycle management
    pub(super) component_states: Arc<Mutex<HashMap<Component, ComponentState>>>,
    pub(super) shutdown_sender: Option<oneshot::Sender<ShutdownReason>>,
    pub(super) shutdown_receiver: Option<oneshot::Receiver<ShutdownReason>>,
    pub(super) cancellation_token: CancellationToken,
}

impl FacecamOrchestrator {
    /// Create an orchestrator backed by the on-disk store, the configured
    /// replay recording and a synthetic frame source
    pub async fn new(config: FacecamConfig) -> Result<Self> {
        let backend: Arc<dyn KeyValueStore> =
            Arc::new(FileKeyValueStore::open(&config.store.path).await?);

        let oracle: Arc<dyn EmbeddingOracle> = match &config.oracle.replay_path {
            Some(path) => Arc::new(ReplayOracle::from_file(path, config.oracle.loop_replay).await?),
            None => {
                warn!("No oracle recording configured; every frame will be empty");
                Arc::new(ReplayOracle::from_jsonl("[]", true)?)
            }
        };

        let frames: Arc<dyn FrameSource> = Arc::new(SyntheticFrameSource::new(
            config.camera.resolution,
            config.camera.fps,
        ));

        Self::with_collaborators(config, backend, oracle, frames)
    }

    /// Create an orchestrator around caller-supplied collaborators
    pub fn with_collaborators(
        config: FacecamConfig,
        backend: Arc<dyn KeyValueStore>,
        oracle: Arc<dyn EmbeddingOracle>,
        frames: Arc<dyn FrameSource>,
    ) -> Result<Self> {
        let event_bus = Arc::new(EventBus::new(config.system.event_bus_capacity));
        let (handle, commands) = ControllerHandle::channel(config.capture.command_queue_capacity);
        let (shutdown_sender, shutdown_receiver) = oneshot::channel();

        let controller = CaptureControllerBuilder::new()
            .config(config.clone())
            .store(IdentityStore::new(backend))
            .oracle(oracle)
            .frame_source(frames)
            .event_bus(Arc::clone(&event_bus))
            .build()?;

        info!("Facecam orchestrator created");

        Ok(Self {
            config,
            event_bus,
            handle,
            controller: Some(controller),
            commands: Some(commands),
            controller_task: None,
            event_logger_task: None,
            console_task: None,
            console_enabled: false,
            component_states: Arc::new(Mutex::new(HashMap::new())),
            shutdown_sender: Some(shutdown_sender),
            shutdown_receiver: Some(shutdown_receiver),
            cancellation_token: CancellationToken::new(),
        })
    }

    /// Enable or disable the stdin operator console
    pub fn set_console_enabled(&mut self, enabled: bool) {
        self.console_enabled = enabled;
    }

    /// Handle for sending commands to the controller
    pub fn handle(&self) -> ControllerHandle {
        self.handle.clone()
    }

    pub fn event_bus(&self) -> Arc<EventBus> {
        Arc::clone(&self.event_bus)
    }

    pub fn config(&self) -> &FacecamConfig {
        &self.config
    }
}
