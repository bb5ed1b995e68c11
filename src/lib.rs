pub mod app;
pub mod config;
pub mod controller;
pub mod error;
pub mod events;
pub mod frame;
pub mod identity;
pub mod oracle;
pub mod persistence;

pub use app::{Component, ComponentState, FacecamOrchestrator, ShutdownReason};
pub use config::FacecamConfig;
pub use controller::{CaptureController, CaptureControllerBuilder, CaptureMode, ControllerHandle};
pub use error::{FacecamError, Result};
pub use events::{EventBus, FacecamEvent, LabelColor};
pub use frame::{BoundingBox, Frame, FrameFormat};
pub use identity::{Classification, Embedding, Identity, IdentityStore, IdentitySummary, Match};
pub use oracle::{Detection, EmbeddingOracle, FrameSource};
pub use persistence::{FileKeyValueStore, KeyValueStore, MemoryKeyValueStore};
