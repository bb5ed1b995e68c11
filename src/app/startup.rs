use super::{Component, ComponentState, FacecamOrchestrator};
use crate::error::{FacecamError, Result};
use crate::events::{EventFilter, EventReceiver, FacecamEvent};
use tracing::{debug, error, info};

impl FacecamOrchestrator {
    /// Register components
    pub async fn initialize(&mut self) -> Result<()> {
        info!("Initializing Facecam components");

        let mut components = vec![Component::EventLogger, Component::Controller];
        if self.console_enabled {
            components.push(Component::Console);
        }

        for component in components {
            self.set_component_state(component, ComponentState::Stopped)
                .await;
        }

        info!("All components initialized successfully");
        Ok(())
    }

    /// Warm up the controller and start its task
    pub async fn start(&mut self) -> Result<()> {
        info!("Starting Facecam system");

        // Logger first so warm-up status reaches the log
        self.start_event_logger().await;

        let mut controller = self
            .controller
            .take()
            .ok_or_else(|| FacecamError::system("Controller already started"))?;
        let commands = self
            .commands
            .take()
            .ok_or_else(|| FacecamError::system("Controller command channel already taken"))?;

        self.set_component_state(Component::Controller, ComponentState::Starting)
            .await;

        if let Err(e) = controller.warm_up().await {
            error!("Controller warm-up failed: {}", e);
            self.set_component_state(Component::Controller, ComponentState::Failed)
                .await;
            return Err(e);
        }

        let token = self.cancellation_token.child_token();
        self.controller_task = Some(tokio::spawn(async move {
            controller.run(commands, token).await
        }));

        self.set_component_state(Component::Controller, ComponentState::Running)
            .await;
        info!("Capture controller started successfully");

        Ok(())
    }

    async fn start_event_logger(&mut self) {
        let mut receiver = EventReceiver::new(
            self.event_bus.subscribe(),
            EventFilter::All,
            Component::EventLogger.to_string(),
        );
        let token = self.cancellation_token.child_token();

        self.event_logger_task = Some(tokio::spawn(async move {
            loop {
                let event = tokio::select! {
                    _ = token.cancelled() => break,
                    event = receiver.recv() => event,
                };

                match event {
                    Ok(event @ FacecamEvent::StatusChanged { .. })
                    | Ok(event @ FacecamEvent::DetectionResult { .. }) => {
                        info!("{}", event.description())
                    }
                    Ok(event) => debug!("Event: {}", event.description()),
                    Err(_) => {
                        debug!("Event bus closed; stopping event logger");
                        break;
                    }
                }
            }
        }));

        self.set_component_state(Component::EventLogger, ComponentState::Running)
            .await;
    }
}
