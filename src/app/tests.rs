use super::*;
use crate::config::FacecamConfig;
use crate::controller::CaptureMode;
use crate::error::{FacecamError, OracleError};
use crate::events::FacecamEvent;
use crate::frame::BoundingBox;
use crate::oracle::{Detection, MockEmbeddingOracle, MockFrameSource};
use crate::persistence::{FileKeyValueStore, KeyValueStore, MemoryKeyValueStore};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

fn orchestrator_with(oracle: MockEmbeddingOracle, backend: Arc<dyn KeyValueStore>) -> FacecamOrchestrator {
    FacecamOrchestrator::with_collaborators(
        FacecamConfig::default(),
        backend,
        Arc::new(oracle),
        Arc::new(MockFrameSource::default()),
    )
    .unwrap()
}

#[tokio::test]
async fn test_orchestrator_lifecycle() {
    let oracle = MockEmbeddingOracle::new();
    let mut orchestrator = orchestrator_with(oracle.clone(), Arc::new(MemoryKeyValueStore::new()));

    orchestrator.initialize().await.unwrap();
    let states = orchestrator.get_all_component_states().await;
    assert_eq!(
        states.get(&Component::Controller),
        Some(&ComponentState::Stopped)
    );
    assert!(!states.contains_key(&Component::Console));

    orchestrator.start().await.unwrap();
    assert_eq!(
        orchestrator.get_component_state(Component::Controller).await,
        Some(ComponentState::Running)
    );

    let handle = orchestrator.handle();
    assert_eq!(handle.mode().await.unwrap(), CaptureMode::Idle);

    let exit_code = orchestrator.shutdown().await.unwrap();
    assert_eq!(exit_code, 0);
    assert_eq!(
        orchestrator.get_component_state(Component::Controller).await,
        Some(ComponentState::Stopped)
    );
    assert!(handle.mode().await.is_err());
}

#[tokio::test]
async fn test_failed_warm_up_marks_controller_failed() {
    let oracle = MockEmbeddingOracle::new();
    oracle.push_error(OracleError::fatal("model missing"));
    let mut orchestrator = orchestrator_with(oracle, Arc::new(MemoryKeyValueStore::new()));

    orchestrator.initialize().await.unwrap();
    assert!(matches!(
        orchestrator.start().await,
        Err(FacecamError::Oracle(OracleError::Fatal { .. }))
    ));
    assert_eq!(
        orchestrator.get_component_state(Component::Controller).await,
        Some(ComponentState::Failed)
    );
    assert_eq!(orchestrator.shutdown().await.unwrap(), 1);
}

#[tokio::test]
async fn test_identities_survive_restart_on_disk() {
    let dir = tempfile::tempdir().unwrap();

    let backend = Arc::new(FileKeyValueStore::open(dir.path()).await.unwrap());
    let oracle = MockEmbeddingOracle::new();
    let mut orchestrator = orchestrator_with(oracle.clone(), backend);
    orchestrator.start().await.unwrap();

    let mut events = orchestrator.event_bus().subscribe();
    oracle.push_detections(vec![Detection {
        bounding_box: BoundingBox::new(1.0, 1.0, 4.0, 4.0),
        score: 0.99,
        embedding: vec![0.3, 0.7],
    }]);
    orchestrator.handle().single_shot().await.unwrap();

    timeout(Duration::from_secs(2), async {
        loop {
            if let Ok(FacecamEvent::ModeChanged {
                mode: CaptureMode::Idle,
            }) = events.recv().await
            {
                break;
            }
        }
    })
    .await
    .unwrap();
    orchestrator.shutdown().await.unwrap();

    // A second process over the same directory sees the anonymous identity
    let backend = Arc::new(FileKeyValueStore::open(dir.path()).await.unwrap());
    let mut orchestrator = orchestrator_with(MockEmbeddingOracle::new(), backend);
    orchestrator.start().await.unwrap();

    let identities = orchestrator.handle().list_identities().await.unwrap();
    assert_eq!(identities.len(), 1);
    assert_eq!(identities[0].name, "Unknown #1");
    orchestrator.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_start_twice_fails() {
    let mut orchestrator =
        orchestrator_with(MockEmbeddingOracle::new(), Arc::new(MemoryKeyValueStore::new()));
    orchestrator.start().await.unwrap();
    assert!(matches!(
        orchestrator.start().await,
        Err(FacecamError::System { .. })
    ));
    orchestrator.shutdown().await.unwrap();
}
