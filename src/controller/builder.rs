use super::core::CaptureController;
use crate::config::FacecamConfig;
use crate::error::{FacecamError, Result};
use crate::events::EventBus;
use crate::identity::IdentityStore;
use crate::oracle::{EmbeddingOracle, FrameSource};
use std::sync::Arc;

/// Builder wiring a controller to its collaborators
pub struct CaptureControllerBuilder {
    config: Option<FacecamConfig>,
    store: Option<IdentityStore>,
    oracle: Option<Arc<dyn EmbeddingOracle>>,
    frames: Option<Arc<dyn FrameSource>>,
    event_bus: Option<Arc<EventBus>>,
}

impl CaptureControllerBuilder {
    pub fn new() -> Self {
        Self {
            config: None,
            store: None,
            oracle: None,
            frames: None,
            event_bus: None,
        }
    }

    pub fn config(mut self, config: FacecamConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Identity store the controller takes ownership of; loaded by
    /// [`CaptureController::warm_up`]
    pub fn store(mut self, store: IdentityStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn oracle(mut self, oracle: Arc<dyn EmbeddingOracle>) -> Self {
        self.oracle = Some(oracle);
        self
    }

    pub fn frame_source(mut self, frames: Arc<dyn FrameSource>) -> Self {
        self.frames = Some(frames);
        self
    }

    pub fn event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn build(self) -> Result<CaptureController> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        let store = self
            .store
            .ok_or_else(|| FacecamError::system("Identity store must be specified"))?;
        let oracle = self
            .oracle
            .ok_or_else(|| FacecamError::system("Embedding oracle must be specified"))?;
        let frames = self
            .frames
            .ok_or_else(|| FacecamError::system("Frame source must be specified"))?;
        let event_bus = self
            .event_bus
            .unwrap_or_else(|| Arc::new(EventBus::new(config.system.event_bus_capacity)));

        Ok(CaptureController::new(
            config.recognition,
            config.enrollment,
            config.capture,
            store,
            oracle,
            frames,
            event_bus,
        ))
    }
}

impl Default for CaptureControllerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
