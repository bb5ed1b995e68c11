mod builder;
mod commands;
mod core;
mod state;
mod stats;


pub use builder::CaptureControllerBuilder;
pub use commands::{ControllerCommand, ControllerHandle};
pub use self::core::CaptureController;
pub use state::CaptureMode;
pub use stats::PassTimings;
