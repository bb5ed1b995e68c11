use crate::frame::BoundingBox;
use crate::identity::Embedding;
use serde::{Deserialize, Serialize};

/// One face found by the embedding oracle on a frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub bounding_box: BoundingBox,
    /// Detector confidence in `[0, 1]`
    pub score: f64,
    pub embedding: Embedding,
}

impl Detection {
    pub fn passes(&self, min_confidence: f64) -> bool {
        self.score >= min_confidence
    }
}
