//! Scriptable collaborators for exercising the controller without a camera
//! or a model.

use super::interface::{EmbeddingOracle, FrameSource};
use super::types::Detection;
use crate::error::OracleError;
use crate::frame::{Frame, FrameFormat};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;

type Response = Result<Vec<Detection>, OracleError>;

/// Oracle answering from a queue of scripted responses.
///
/// Once the script runs out every call returns no detections. A gated oracle
/// holds each call until [`MockEmbeddingOracle::release`] lets it through.
#[derive(Clone, Default)]
pub struct MockEmbeddingOracle {
    script: Arc<Mutex<VecDeque<Response>>>,
    calls: Arc<AtomicUsize>,
    delay: Option<Duration>,
    gate: Option<Arc<Semaphore>>,
}

impl MockEmbeddingOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn gated(mut self) -> Self {
        self.gate = Some(Arc::new(Semaphore::new(0)));
        self
    }

    pub fn push_detections(&self, detections: Vec<Detection>) {
        self.push(Ok(detections));
    }

    pub fn push_error(&self, error: OracleError) {
        self.push(Err(error));
    }

    fn push(&self, response: Response) {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(response);
        }
    }

    /// Let `passes` gated calls complete
    pub fn release(&self, passes: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(passes);
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn remaining(&self) -> usize {
        self.script.lock().map(|s| s.len()).unwrap_or(0)
    }
}

#[async_trait]
impl EmbeddingOracle for MockEmbeddingOracle {
    async fn detect(&self, _frame: &Frame) -> Result<Vec<Detection>, OracleError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(gate) = &self.gate {
            gate.acquire()
                .await
                .map_err(|_| OracleError::fatal("mock gate closed"))?
                .forget();
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let next = self.script.lock().ok().and_then(|mut s| s.pop_front());
        next.unwrap_or_else(|| Ok(Vec::new()))
    }
}

/// Frame source handing out small blank frames immediately, or failing on
/// demand.
#[derive(Clone)]
pub struct MockFrameSource {
    width: u32,
    height: u32,
    next_id: Arc<AtomicU64>,
    failures: Arc<Mutex<VecDeque<OracleError>>>,
}

impl MockFrameSource {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            next_id: Arc::new(AtomicU64::new(0)),
            failures: Arc::new(Mutex::new(VecDeque::new())),
        }
    }

    /// Make the next acquisition fail with `error`
    pub fn fail_next(&self, error: OracleError) {
        if let Ok(mut failures) = self.failures.lock() {
            failures.push_back(error);
        }
    }

    pub fn frames_produced(&self) -> u64 {
        self.next_id.load(Ordering::SeqCst)
    }
}

impl Default for MockFrameSource {
    fn default() -> Self {
        Self::new(16, 16)
    }
}

#[async_trait]
impl FrameSource for MockFrameSource {
    async fn next_frame(&self) -> Result<Frame, OracleError> {
        let failure = self.failures.lock().ok().and_then(|mut f| f.pop_front());
        if let Some(error) = failure {
            return Err(error);
        }

        tokio::task::yield_now().await;
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        Ok(Frame::blank(id, self.width, self.height, FrameFormat::Gray8))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::BoundingBox;
    use tokio::time::timeout;

    fn detection() -> Detection {
        Detection {
            bounding_box: BoundingBox::new(0.0, 0.0, 4.0, 4.0),
            score: 0.95,
            embedding: vec![0.5, 0.5],
        }
    }

    #[tokio::test]
    async fn test_script_then_empty() {
        let oracle = MockEmbeddingOracle::new();
        let frame = Frame::blank(0, 4, 4, FrameFormat::Gray8);
        oracle.push_detections(vec![detection()]);
        oracle.push_error(OracleError::transient("busy"));

        assert_eq!(oracle.detect(&frame).await.unwrap(), vec![detection()]);
        assert!(oracle.detect(&frame).await.is_err());
        assert!(oracle.detect(&frame).await.unwrap().is_empty());
        assert_eq!(oracle.calls(), 3);
    }

    #[tokio::test]
    async fn test_gate_holds_calls() {
        let oracle = MockEmbeddingOracle::new().gated();
        let frame = Frame::blank(0, 4, 4, FrameFormat::Gray8);

        let held = timeout(Duration::from_millis(50), oracle.detect(&frame)).await;
        assert!(held.is_err());

        oracle.release(1);
        let released = timeout(Duration::from_millis(500), oracle.detect(&frame)).await;
        assert!(released.is_ok());
    }

    #[tokio::test]
    async fn test_frame_source_failures() {
        let source = MockFrameSource::default();
        source.fail_next(OracleError::fatal("unplugged"));

        assert!(source.next_frame().await.unwrap_err().is_fatal());
        assert_eq!(source.next_frame().await.unwrap().id, 0);
        assert_eq!(source.frames_produced(), 1);
    }
}
