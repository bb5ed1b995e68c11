use super::interface::EmbeddingOracle;
use super::types::Detection;
use crate::error::{FacecamError, OracleError, Result};
use crate::frame::Frame;
use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
enum FailureKind {
    Transient,
    Fatal,
}

/// One recorded forward pass
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum ReplayEntry {
    Detections(Vec<Detection>),
    Failure {
        error: FailureKind,
        #[serde(default)]
        details: String,
    },
}

/// Oracle replaying recorded detections, one JSON line per frame.
///
/// A line is either an array of detections or an object such as
/// `{"error": "transient", "details": "model busy"}`.
pub struct ReplayOracle {
    entries: Vec<ReplayEntry>,
    cursor: AtomicUsize,
    loop_replay: bool,
}

impl ReplayOracle {
    /// Load a recording from disk
    pub async fn from_file<P: AsRef<Path>>(path: P, loop_replay: bool) -> Result<Self> {
        let path = path.as_ref();
        let contents = tokio::fs::read_to_string(path).await.map_err(|e| {
            FacecamError::component(
                "replay_oracle",
                &format!("Failed to read {}: {}", path.display(), e),
            )
        })?;

        let oracle = Self::from_jsonl(&contents, loop_replay)?;
        info!(
            "Loaded {} recorded passes from {}",
            oracle.entries.len(),
            path.display()
        );
        Ok(oracle)
    }

    /// Parse a recording held in memory
    pub fn from_jsonl(contents: &str, loop_replay: bool) -> Result<Self> {
        let mut entries = Vec::new();
        for (index, line) in contents.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let entry: ReplayEntry = serde_json::from_str(line).map_err(|e| {
                FacecamError::component("replay_oracle", &format!("Line {}: {}", index + 1, e))
            })?;
            entries.push(entry);
        }

        if entries.is_empty() {
            return Err(FacecamError::component(
                "replay_oracle",
                "Recording contains no passes",
            ));
        }

        Ok(Self {
            entries,
            cursor: AtomicUsize::new(0),
            loop_replay,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl EmbeddingOracle for ReplayOracle {
    async fn detect(&self, frame: &Frame) -> std::result::Result<Vec<Detection>, OracleError> {
        let position = self.cursor.fetch_add(1, Ordering::SeqCst);
        let index = if self.loop_replay {
            position % self.entries.len()
        } else if position < self.entries.len() {
            position
        } else {
            return Err(OracleError::fatal("recording exhausted"));
        };

        debug!("Replaying pass {} for frame {}", index, frame.id);
        match &self.entries[index] {
            ReplayEntry::Detections(detections) => Ok(detections.clone()),
            ReplayEntry::Failure {
                error: FailureKind::Transient,
                details,
            } => Err(OracleError::transient(details.clone())),
            ReplayEntry::Failure {
                error: FailureKind::Fatal,
                details,
            } => Err(OracleError::fatal(details.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::FrameFormat;

    const RECORDING: &str = r#"
[{"bounding_box": {"x": 1.0, "y": 2.0, "width": 3.0, "height": 4.0}, "score": 0.95, "embedding": [0.1, 0.2]}]
[]
{"error": "transient", "details": "model busy"}
"#;

    fn frame() -> Frame {
        Frame::blank(0, 4, 4, FrameFormat::Rgb24)
    }

    #[tokio::test]
    async fn test_replays_in_order_and_loops() {
        let oracle = ReplayOracle::from_jsonl(RECORDING, true).unwrap();
        assert_eq!(oracle.len(), 3);

        let first = oracle.detect(&frame()).await.unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].embedding, vec![0.1, 0.2]);
        assert_eq!(first[0].bounding_box.height, 4.0);

        assert!(oracle.detect(&frame()).await.unwrap().is_empty());
        assert_eq!(
            oracle.detect(&frame()).await,
            Err(OracleError::transient("model busy"))
        );
        assert_eq!(oracle.detect(&frame()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_exhausted_recording_is_fatal() {
        let oracle = ReplayOracle::from_jsonl("[]\n", false).unwrap();
        assert!(oracle.detect(&frame()).await.is_ok());

        let err = oracle.detect(&frame()).await.unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_rejects_bad_recordings() {
        assert!(ReplayOracle::from_jsonl("", true).is_err());
        assert!(ReplayOracle::from_jsonl("{\"error\": \"sideways\"}", true).is_err());
    }

    #[tokio::test]
    async fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("passes.jsonl");
        std::fs::write(&path, "{\"error\": \"fatal\", \"details\": \"camera gone\"}\n").unwrap();

        let oracle = ReplayOracle::from_file(&path, true).await.unwrap();
        assert_eq!(
            oracle.detect(&frame()).await,
            Err(OracleError::fatal("camera gone"))
        );
    }
}
