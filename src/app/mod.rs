pub mod console;

mod orchestrator;
mod runtime;
mod shutdown;
mod startup;
mod state;
mod types;

#[cfg(test)]
mod tests;

pub use console::{ConsoleCommand, ConsoleError, OperatorConsole};
pub use orchestrator::FacecamOrchestrator;
pub use types::{Component, ComponentState, ShutdownReason};
