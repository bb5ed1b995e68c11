use super::{Component, ComponentState, FacecamOrchestrator};
use crate::error::Result;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{error, info, warn};

const STOP_TIMEOUT: Duration = Duration::from_secs(10);

impl FacecamOrchestrator {
    /// Cancel every task, wait for the controller to let go of the store
    /// and report the exit code
    pub async fn shutdown(&mut self) -> Result<i32> {
        info!("Beginning graceful shutdown");
        self.cancellation_token.cancel();

        if let Some(console_task) = self.console_task.take() {
            // stdin reads cannot be interrupted, so the console is not awaited
            console_task.abort();
            self.set_component_state(Component::Console, ComponentState::Stopped)
                .await;
        }

        if let Some(controller_task) = self.controller_task.take() {
            self.set_component_state(Component::Controller, ComponentState::Stopping)
                .await;

            let state = match timeout(STOP_TIMEOUT, controller_task).await {
                Ok(Ok(Ok(()))) => {
                    info!("Capture controller stopped");
                    ComponentState::Stopped
                }
                Ok(Ok(Err(e))) => {
                    error!("Capture controller stopped with error: {}", e);
                    ComponentState::Failed
                }
                Ok(Err(e)) => {
                    error!("Capture controller task failed: {}", e);
                    ComponentState::Failed
                }
                Err(_) => {
                    error!("Capture controller did not stop within {:?}", STOP_TIMEOUT);
                    ComponentState::Failed
                }
            };
            self.set_component_state(Component::Controller, state).await;
        }

        if let Some(event_logger_task) = self.event_logger_task.take() {
            if timeout(STOP_TIMEOUT, event_logger_task).await.is_err() {
                warn!("Event logger did not stop in time");
            }
            self.set_component_state(Component::EventLogger, ComponentState::Stopped)
                .await;
        }

        let exit_code = if self.has_failed_component().await { 1 } else { 0 };
        info!("Graceful shutdown completed with exit code: {}", exit_code);
        Ok(exit_code)
    }
}
