use super::console::OperatorConsole;
use super::{Component, ComponentState, FacecamOrchestrator, ShutdownReason};
use crate::error::{FacecamError, Result};
use std::sync::Arc;
use tokio::io::BufReader;
use tokio::signal;
use tokio::sync::{oneshot, Mutex};
use tracing::{error, info};

type SharedShutdown = Arc<Mutex<Option<oneshot::Sender<ShutdownReason>>>>;

async fn request_shutdown(sender: &SharedShutdown, reason: ShutdownReason) {
    if let Some(sender) = sender.lock().await.take() {
        let _ = sender.send(reason);
    }
}

impl FacecamOrchestrator {
    /// Run until a signal, console `quit` or controller failure, then shut
    /// down gracefully
    pub async fn run(&mut self) -> Result<i32> {
        info!("Facecam system is running");

        let shutdown_sender = self
            .shutdown_sender
            .take()
            .ok_or_else(|| FacecamError::system("Shutdown sender already taken"))?;

        let shutdown_receiver = self
            .shutdown_receiver
            .take()
            .ok_or_else(|| FacecamError::system("Shutdown receiver already taken"))?;

        let shutdown_sender: SharedShutdown = Arc::new(Mutex::new(Some(shutdown_sender)));

        self.setup_signal_handlers(Arc::clone(&shutdown_sender));
        self.watch_controller(Arc::clone(&shutdown_sender));
        if self.console_enabled {
            self.start_console(Arc::clone(&shutdown_sender)).await;
        }

        let shutdown_reason = shutdown_receiver
            .await
            .map_err(|_| FacecamError::system("Shutdown channel closed unexpectedly"))?;

        info!("Shutdown initiated: {}", shutdown_reason);

        let exit_code = self.shutdown().await?.max(shutdown_reason.exit_code());

        info!("Facecam system shutdown complete");
        Ok(exit_code)
    }

    /// Set up signal handlers for graceful shutdown
    fn setup_signal_handlers(&self, shutdown_sender: SharedShutdown) {
        // Handle SIGTERM (systemd stop) - Unix only
        #[cfg(unix)]
        {
            let shutdown_sender_sigterm = Arc::clone(&shutdown_sender);
            tokio::spawn(async move {
                let mut sigterm = match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                    Ok(sigterm) => sigterm,
                    Err(e) => {
                        error!("Failed to register SIGTERM handler: {}", e);
                        return;
                    }
                };
                if sigterm.recv().await.is_some() {
                    info!("Received SIGTERM signal");
                    request_shutdown(
                        &shutdown_sender_sigterm,
                        ShutdownReason::Signal("SIGTERM".to_string()),
                    )
                    .await;
                }
            });
        }

        // Handle SIGINT (Ctrl+C) - Cross-platform
        tokio::spawn(async move {
            if let Ok(()) = signal::ctrl_c().await {
                info!("Received SIGINT signal (Ctrl+C)");
                request_shutdown(
                    &shutdown_sender,
                    ShutdownReason::Signal("SIGINT".to_string()),
                )
                .await;
            }
        });
    }

    /// Shut down if the controller task ends on its own
    fn watch_controller(&self, shutdown_sender: SharedShutdown) {
        let handle = self.handle.clone();
        let token = self.cancellation_token.clone();

        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = handle.closed() => {
                    error!("Capture controller exited unexpectedly");
                    request_shutdown(
                        &shutdown_sender,
                        ShutdownReason::Error("controller exited".to_string()),
                    )
                    .await;
                }
            }
        });
    }

    async fn start_console(&mut self, shutdown_sender: SharedShutdown) {
        let console = OperatorConsole::new(self.handle(), self.config.enrollment.default_samples);
        let token = self.cancellation_token.child_token();

        info!("Operator console ready, type 'help' for commands");
        self.console_task = Some(tokio::spawn(async move {
            let reader = BufReader::new(tokio::io::stdin());
            if let Some(reason) = console.run(reader, tokio::io::stdout(), token).await {
                request_shutdown(&shutdown_sender, reason).await;
            }
        }));

        self.set_component_state(Component::Console, ComponentState::Running)
            .await;
    }
}
