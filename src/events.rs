use crate::controller::CaptureMode;
use crate::error::EventBusError;
use crate::frame::BoundingBox;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

/// Colour hint attached to a drawn detection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LabelColor {
    /// Matched an operator-enrolled identity
    Green,
    /// Matched or created an anonymous identity
    Red,
    /// Sample taken for an enrollment
    Blue,
}

impl fmt::Display for LabelColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LabelColor::Green => "green",
            LabelColor::Red => "red",
            LabelColor::Blue => "blue",
        };
        f.write_str(name)
    }
}

/// Notifications published for the UI/CLI layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FacecamEvent {
    /// Operator-facing status line changed
    StatusChanged { text: String },
    /// Capture mode transitioned
    ModeChanged { mode: CaptureMode },
    /// A face was labelled on a frame
    DetectionResult {
        frame_id: u64,
        bounding_box: BoundingBox,
        label: String,
        color: LabelColor,
    },
    /// Rolling forward pass throughput
    FpsUpdated { fps: f64, average_ms: f64 },
    /// An identity was stored
    IdentityAdded { name: String, descriptor_count: usize },
    /// An identity changed its name
    IdentityRenamed { old_name: String, new_name: String },
    /// An identity was deleted
    IdentityRemoved { name: String },
    /// A component hit an error it recovered from
    SystemError { component: String, error: String },
}

impl FacecamEvent {
    /// Get a human-readable description of the event
    pub fn description(&self) -> String {
        match self {
            FacecamEvent::StatusChanged { text } => format!("Status: {}", text),
            FacecamEvent::ModeChanged { mode } => format!("Mode changed to {}", mode),
            FacecamEvent::DetectionResult {
                frame_id,
                label,
                color,
                ..
            } => format!("Frame {}: {} [{}]", frame_id, label, color),
            FacecamEvent::FpsUpdated { fps, average_ms } => {
                format!("{:.0} fps ({:.0} ms)", fps, average_ms)
            }
            FacecamEvent::IdentityAdded {
                name,
                descriptor_count,
            } => format!("Identity added: {} ({} descriptors)", name, descriptor_count),
            FacecamEvent::IdentityRenamed { old_name, new_name } => {
                format!("Identity renamed: {} -> {}", old_name, new_name)
            }
            FacecamEvent::IdentityRemoved { name } => format!("Identity removed: {}", name),
            FacecamEvent::SystemError { component, error } => {
                format!("Error in {}: {}", component, error)
            }
        }
    }

    /// Get the event type as a string for filtering
    pub fn event_type(&self) -> &'static str {
        match self {
            FacecamEvent::StatusChanged { .. } => "status_changed",
            FacecamEvent::ModeChanged { .. } => "mode_changed",
            FacecamEvent::DetectionResult { .. } => "detection_result",
            FacecamEvent::FpsUpdated { .. } => "fps_updated",
            FacecamEvent::IdentityAdded { .. } => "identity_added",
            FacecamEvent::IdentityRenamed { .. } => "identity_renamed",
            FacecamEvent::IdentityRemoved { .. } => "identity_removed",
            FacecamEvent::SystemError { .. } => "system_error",
        }
    }
}

/// Broadcast bus carrying controller notifications to the UI layer.
///
/// Publishing with no subscriber fails; the controller treats that as
/// nobody watching.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<FacecamEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Subscribe to events and get a receiver
    pub fn subscribe(&self) -> broadcast::Receiver<FacecamEvent> {
        self.sender.subscribe()
    }

    /// Publish an event to all subscribers
    pub async fn publish(&self, event: FacecamEvent) -> Result<usize, EventBusError> {
        debug!("Publishing event: {}", event.event_type());

        match &event {
            FacecamEvent::ModeChanged { mode } => {
                info!("Capture mode: {}", mode);
            }
            FacecamEvent::IdentityAdded { name, .. } => {
                info!("Identity added: {}", name);
            }
            FacecamEvent::SystemError { component, error } => {
                error!("System error in {}: {}", component, error);
            }
            _ => {}
        }

        self.sender
            .send(event)
            .map_err(|e| EventBusError::PublishFailed {
                details: e.to_string(),
            })
    }

    pub fn has_subscribers(&self) -> bool {
        self.sender.receiver_count() > 0
    }
}

/// Event filter for selective event handling
#[derive(Debug, Clone)]
pub enum EventFilter {
    /// Accept all events
    All,
    /// Accept only specific event types
    EventTypes(Vec<&'static str>),
}

impl EventFilter {
    /// Check if an event passes this filter
    pub fn matches(&self, event: &FacecamEvent) -> bool {
        match self {
            EventFilter::All => true,
            EventFilter::EventTypes(types) => types.contains(&event.event_type()),
        }
    }
}

/// Event receiver with filtering
pub struct EventReceiver {
    receiver: broadcast::Receiver<FacecamEvent>,
    filter: EventFilter,
    name: String,
}

impl EventReceiver {
    /// Create a new event receiver with a filter
    pub fn new(
        receiver: broadcast::Receiver<FacecamEvent>,
        filter: EventFilter,
        name: String,
    ) -> Self {
        Self {
            receiver,
            filter,
            name,
        }
    }

    /// Receive the next filtered event.
    ///
    /// A lagging receiver skips the lost events and keeps going.
    pub async fn recv(&mut self) -> Result<FacecamEvent, EventBusError> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => {
                    if self.filter.matches(&event) {
                        return Ok(event);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("Receiver '{}' lagged behind by {} events", self.name, n);
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Event bus closed for receiver '{}'", self.name);
                    return Err(EventBusError::ChannelClosed);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{timeout, Duration};

    #[tokio::test]
    async fn test_event_bus_basic_operations() {
        let event_bus = EventBus::new(10);
        let mut receiver = event_bus.subscribe();

        let subscriber_count = event_bus
            .publish(FacecamEvent::StatusChanged {
                text: "READY".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(subscriber_count, 1);

        match receiver.recv().await.unwrap() {
            FacecamEvent::StatusChanged { text } => assert_eq!(text, "READY"),
            other => panic!("Unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_fails() {
        let event_bus = EventBus::new(10);
        assert!(!event_bus.has_subscribers());

        let result = event_bus
            .publish(FacecamEvent::IdentityRemoved {
                name: "alice".to_string(),
            })
            .await;
        assert!(matches!(result, Err(EventBusError::PublishFailed { .. })));
    }

    #[tokio::test]
    async fn test_filtered_receiver() {
        let event_bus = EventBus::new(10);
        let filter = EventFilter::EventTypes(vec!["mode_changed"]);
        let mut filtered = EventReceiver::new(event_bus.subscribe(), filter, "test".to_string());

        event_bus
            .publish(FacecamEvent::FpsUpdated {
                fps: 30.0,
                average_ms: 33.0,
            })
            .await
            .unwrap();
        event_bus
            .publish(FacecamEvent::ModeChanged {
                mode: CaptureMode::DetectLoop,
            })
            .await
            .unwrap();

        let received = timeout(Duration::from_millis(100), filtered.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            received,
            FacecamEvent::ModeChanged {
                mode: CaptureMode::DetectLoop
            }
        );
    }

    #[test]
    fn test_event_properties() {
        let event = FacecamEvent::DetectionResult {
            frame_id: 3,
            bounding_box: BoundingBox::new(0.0, 0.0, 10.0, 10.0),
            label: "alice (0.12)".to_string(),
            color: LabelColor::Green,
        };

        assert_eq!(event.event_type(), "detection_result");
        assert_eq!(event.description(), "Frame 3: alice (0.12) [green]");
    }
}
