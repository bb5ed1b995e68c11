use super::interface::FrameSource;
use crate::error::OracleError;
use crate::frame::{Frame, FrameFormat};
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

/// Frame source producing blank frames at a fixed rate.
///
/// Used when recognition is driven by a replayed oracle and real pixels
/// are not needed.
pub struct SyntheticFrameSource {
    width: u32,
    height: u32,
    frame_interval: Duration,
    next_id: AtomicU64,
    next_due: Mutex<Option<Instant>>,
}

impl SyntheticFrameSource {
    pub fn new(resolution: (u32, u32), fps: u32) -> Self {
        Self {
            width: resolution.0,
            height: resolution.1,
            frame_interval: Duration::from_secs_f64(1.0 / fps.max(1) as f64),
            next_id: AtomicU64::new(0),
            next_due: Mutex::new(None),
        }
    }

    pub fn frames_produced(&self) -> u64 {
        self.next_id.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl FrameSource for SyntheticFrameSource {
    async fn next_frame(&self) -> Result<Frame, OracleError> {
        let due = {
            let mut next_due = self
                .next_due
                .lock()
                .map_err(|_| OracleError::fatal("frame pacing state poisoned"))?;
            let now = Instant::now();
            let due = next_due.map_or(now, |d| d.max(now));
            *next_due = Some(due + self.frame_interval);
            due
        };
        tokio::time::sleep_until(due).await;

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        Ok(Frame::blank(id, self.width, self.height, FrameFormat::Rgb24))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_frames_are_numbered_and_sized() {
        let source = SyntheticFrameSource::new((8, 4), 1000);

        let first = source.next_frame().await.unwrap();
        let second = source.next_frame().await.unwrap();

        assert_eq!((first.id, second.id), (0, 1));
        assert_eq!((first.width, first.height), (8, 4));
        assert_eq!(first.format, FrameFormat::Rgb24);
        assert!(first.validate_size());
        assert_eq!(source.frames_produced(), 2);
    }

    #[tokio::test]
    async fn test_frames_are_paced() {
        let source = SyntheticFrameSource::new((2, 2), 50);
        let start = Instant::now();

        for _ in 0..3 {
            source.next_frame().await.unwrap();
        }

        assert!(start.elapsed() >= Duration::from_millis(40));
    }
}
