use super::matcher::mean_distance;
use super::store::IdentityStore;
use super::types::{Embedding, RepresentativeImage};
use crate::error::EnrollmentError;
use crate::frame::Frame;
use crate::oracle::Detection;
use tracing::{debug, info};

/// Result of offering one sample to the accumulator
#[derive(Debug, Clone, PartialEq)]
pub enum SampleOutcome {
    /// Sample kept; `count` samples are now accumulated
    Accepted { count: usize },
    /// Sample too close to what is already accumulated
    Rejected { distance: f64 },
}

#[derive(Debug)]
struct Session {
    name: String,
    target: usize,
    samples: Vec<Embedding>,
    image: Option<RepresentativeImage>,
}

/// Collects diverse samples of one face before committing them as an
/// identity.
#[derive(Debug)]
pub struct EnrollmentAccumulator {
    diversity_threshold: f64,
    unconditional_samples: usize,
    session: Option<Session>,
}

impl EnrollmentAccumulator {
    /// `diversity_threshold` is the minimum mean distance a sample needs
    /// from the accumulated ones; the first `unconditional_samples` samples
    /// skip that check.
    pub fn new(diversity_threshold: f64, unconditional_samples: usize) -> Self {
        Self {
            diversity_threshold,
            unconditional_samples,
            session: None,
        }
    }

    /// Begin a session, discarding anything accumulated before
    pub fn start(&mut self, name: &str, target_count: usize) {
        debug!("Enrollment started for '{}' ({} samples)", name, target_count);
        self.session = Some(Session {
            name: name.to_string(),
            target: target_count,
            samples: Vec::with_capacity(target_count),
            image: None,
        });
    }

    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    pub fn name(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.name.as_str())
    }

    pub fn target(&self) -> usize {
        self.session.as_ref().map_or(0, |s| s.target)
    }

    pub fn accumulated(&self) -> &[Embedding] {
        self.session
            .as_ref()
            .map(|s| s.samples.as_slice())
            .unwrap_or(&[])
    }

    pub fn image(&self) -> Option<&RepresentativeImage> {
        self.session.as_ref().and_then(|s| s.image.as_ref())
    }

    /// Offer a detection's embedding.
    ///
    /// The first accepted sample also captures the face crop as the
    /// identity's representative image.
    pub fn accept(
        &mut self,
        frame: &Frame,
        detection: &Detection,
    ) -> Result<SampleOutcome, EnrollmentError> {
        let session = self.session.as_mut().ok_or(EnrollmentError::NotStarted)?;

        if session.samples.len() >= self.unconditional_samples {
            // Raw distance; only classification rounds
            let distance = mean_distance(&session.samples, &detection.embedding);
            if distance < self.diversity_threshold {
                debug!("Rejected enrollment sample, distance {:.3}", distance);
                return Ok(SampleOutcome::Rejected { distance });
            }
            debug!("Accepted enrollment sample, distance {:.3}", distance);
        }

        session.samples.push(detection.embedding.clone());
        if session.samples.len() == 1 {
            session.image = RepresentativeImage::from_frame(frame, &detection.bounding_box);
        }

        Ok(SampleOutcome::Accepted {
            count: session.samples.len(),
        })
    }

    pub fn is_complete(&self) -> bool {
        self.session
            .as_ref()
            .map_or(false, |s| s.samples.len() >= s.target)
    }

    /// Store the accumulated samples as a new identity and reset.
    ///
    /// On failure nothing is reset, so the commit can be retried.
    pub async fn commit(&mut self, store: &mut IdentityStore) -> Result<String, EnrollmentError> {
        let session = self.session.as_ref().ok_or(EnrollmentError::NotStarted)?;
        if session.samples.len() < session.target {
            return Err(EnrollmentError::Incomplete {
                name: session.name.clone(),
                accumulated: session.samples.len(),
                target: session.target,
            });
        }

        store
            .add_identity(&session.name, session.samples.clone(), session.image.clone())
            .await?;

        let name = session.name.clone();
        info!(
            "Enrollment committed for '{}' ({} samples)",
            name,
            session.samples.len()
        );
        self.reset();
        Ok(name)
    }

    /// Drop the current session
    pub fn reset(&mut self) {
        self.session = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::frame::{BoundingBox, FrameFormat};
    use crate::persistence::MemoryKeyValueStore;
    use std::sync::Arc;

    fn frame() -> Frame {
        Frame::blank(1, 8, 8, FrameFormat::Gray8)
    }

    fn detection(embedding: Vec<f32>) -> Detection {
        Detection {
            bounding_box: BoundingBox::new(2.0, 2.0, 4.0, 4.0),
            score: 0.99,
            embedding,
        }
    }

    async fn store() -> IdentityStore {
        let mut store = IdentityStore::new(Arc::new(MemoryKeyValueStore::new()));
        store.load().await.unwrap();
        store
    }

    #[test]
    fn test_repeated_sample_is_rejected() {
        let mut acc = EnrollmentAccumulator::new(0.6, 1);
        acc.start("bob", 3);
        let v = vec![0.0, 0.0];

        assert_eq!(
            acc.accept(&frame(), &detection(v.clone())).unwrap(),
            SampleOutcome::Accepted { count: 1 }
        );
        assert_eq!(
            acc.accept(&frame(), &detection(v)).unwrap(),
            SampleOutcome::Rejected { distance: 0.0 }
        );
        assert_eq!(acc.accumulated().len(), 1);

        // mean_distance([v], v2) == 1.0 >= 0.6
        assert_eq!(
            acc.accept(&frame(), &detection(vec![1.0, 0.0])).unwrap(),
            SampleOutcome::Accepted { count: 2 }
        );
        assert_eq!(acc.accumulated().len(), 2);
    }

    #[test]
    fn test_two_unconditional_samples() {
        let mut acc = EnrollmentAccumulator::new(0.6, 2);
        acc.start("bob", 3);
        let v = vec![0.0, 0.0];

        acc.accept(&frame(), &detection(v.clone())).unwrap();
        acc.accept(&frame(), &detection(v.clone())).unwrap();
        assert_eq!(acc.accumulated().len(), 2);

        assert!(matches!(
            acc.accept(&frame(), &detection(v)).unwrap(),
            SampleOutcome::Rejected { .. }
        ));
    }

    #[test]
    fn test_sample_exactly_at_threshold_is_accepted() {
        let mut acc = EnrollmentAccumulator::new(0.5, 1);
        acc.start("carol", 2);
        acc.accept(&frame(), &detection(vec![0.0])).unwrap();

        assert_eq!(
            acc.accept(&frame(), &detection(vec![0.5])).unwrap(),
            SampleOutcome::Accepted { count: 2 }
        );
        assert!(acc.is_complete());
    }

    #[test]
    fn test_diversity_check_is_not_rounded() {
        let mut acc = EnrollmentAccumulator::new(0.6, 1);
        acc.start("carol", 2);
        acc.accept(&frame(), &detection(vec![0.0])).unwrap();

        // 0.596 would round to 0.60; the raw distance is what counts
        assert!(matches!(
            acc.accept(&frame(), &detection(vec![0.596])).unwrap(),
            SampleOutcome::Rejected { distance } if distance < 0.6
        ));
        assert_eq!(acc.accumulated().len(), 1);
    }

    #[test]
    fn test_first_sample_captures_image() {
        let mut acc = EnrollmentAccumulator::new(0.6, 1);
        acc.start("bob", 2);
        assert!(acc.image().is_none());

        acc.accept(&frame(), &detection(vec![0.0])).unwrap();
        let image = acc.image().unwrap().clone();
        assert_eq!((image.width, image.height), (4, 4));

        let mut far = detection(vec![5.0]);
        far.bounding_box = BoundingBox::new(0.0, 0.0, 2.0, 2.0);
        acc.accept(&frame(), &far).unwrap();
        assert_eq!(acc.image(), Some(&image));
    }

    #[test]
    fn test_accept_without_session() {
        let mut acc = EnrollmentAccumulator::new(0.6, 1);
        assert_eq!(
            acc.accept(&frame(), &detection(vec![0.0])),
            Err(EnrollmentError::NotStarted)
        );
        assert!(!acc.is_complete());
    }

    #[test]
    fn test_start_resets_samples() {
        let mut acc = EnrollmentAccumulator::new(0.6, 1);
        acc.start("bob", 3);
        acc.accept(&frame(), &detection(vec![0.0])).unwrap();

        acc.start("dave", 1);
        assert_eq!(acc.name(), Some("dave"));
        assert!(acc.accumulated().is_empty());
        assert!(acc.image().is_none());
    }

    #[tokio::test]
    async fn test_commit_stores_identity_and_resets() {
        let mut store = store().await;
        let mut acc = EnrollmentAccumulator::new(0.6, 1);
        acc.start("bob", 2);
        acc.accept(&frame(), &detection(vec![0.0, 0.0])).unwrap();
        acc.accept(&frame(), &detection(vec![1.0, 1.0])).unwrap();

        assert_eq!(acc.commit(&mut store).await.unwrap(), "bob");
        assert!(!acc.is_active());

        let bob = store.get("bob").unwrap();
        assert_eq!(bob.descriptors, vec![vec![0.0, 0.0], vec![1.0, 1.0]]);
        assert!(bob.image.is_some());
    }

    #[tokio::test]
    async fn test_commit_before_complete_fails() {
        let mut store = store().await;
        let mut acc = EnrollmentAccumulator::new(0.6, 1);
        acc.start("bob", 2);
        acc.accept(&frame(), &detection(vec![0.0])).unwrap();

        assert!(matches!(
            acc.commit(&mut store).await,
            Err(EnrollmentError::Incomplete {
                accumulated: 1,
                target: 2,
                ..
            })
        ));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_failed_commit_keeps_samples() {
        let mut store = store().await;
        store.add_identity("bob", vec![vec![9.0]], None).await.unwrap();

        let mut acc = EnrollmentAccumulator::new(0.6, 1);
        acc.start("bob", 1);
        acc.accept(&frame(), &detection(vec![0.0])).unwrap();

        let result = acc.commit(&mut store).await;
        assert_eq!(
            result,
            Err(EnrollmentError::Store(StoreError::DuplicateName {
                name: "bob".to_string()
            }))
        );
        assert!(acc.is_complete());
        assert_eq!(acc.accumulated(), &[vec![0.0]]);

        store.delete_identity("bob").await.unwrap();
        assert_eq!(acc.commit(&mut store).await.unwrap(), "bob");
        assert_eq!(store.get("bob").unwrap().descriptors, vec![vec![0.0]]);
    }
}
