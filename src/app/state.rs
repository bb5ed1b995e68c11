use super::types::Component;
use super::{ComponentState, FacecamOrchestrator};
use std::collections::HashMap;
use tracing::debug;

impl FacecamOrchestrator {
    pub async fn set_component_state(&self, component: Component, state: ComponentState) {
        let previous = self.component_states.lock().await.insert(component, state);
        debug!("{}: {:?} -> {:?}", component, previous, state);
    }

    pub async fn get_component_state(&self, component: Component) -> Option<ComponentState> {
        self.component_states.lock().await.get(&component).copied()
    }

    /// Snapshot of every registered component
    pub async fn get_all_component_states(&self) -> HashMap<Component, ComponentState> {
        self.component_states.lock().await.clone()
    }

    /// Whether any supervised task ended in `Failed`
    pub async fn has_failed_component(&self) -> bool {
        self.component_states
            .lock()
            .await
            .values()
            .any(|state| *state == ComponentState::Failed)
    }
}
