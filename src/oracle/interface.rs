use super::types::Detection;
use crate::error::OracleError;
use crate::frame::Frame;
use async_trait::async_trait;

/// Turns a frame into face detections with embeddings.
///
/// Detections are returned in the order the controller must process them.
#[async_trait]
pub trait EmbeddingOracle: Send + Sync {
    async fn detect(&self, frame: &Frame) -> Result<Vec<Detection>, OracleError>;
}

/// Supplies frames to the forward pass.
///
/// Acquisition is part of the pass, so it reports failures with the
/// oracle's transient/fatal taxonomy.
#[async_trait]
pub trait FrameSource: Send + Sync {
    async fn next_frame(&self) -> Result<Frame, OracleError>;
}
