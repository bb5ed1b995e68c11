use crate::frame::{BoundingBox, Frame, FrameFormat};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Fixed-length face embedding produced by the oracle
pub type Embedding = Vec<f32>;

/// Cropped face kept as an identity's display picture.
///
/// Raw pixels in the frame's layout; no encoding is applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepresentativeImage {
    pub width: u32,
    pub height: u32,
    pub format: FrameFormat,
    pub pixels: Vec<u8>,
}

impl RepresentativeImage {
    /// Crop `bbox` out of `frame`, `None` if the box misses the frame
    pub fn from_frame(frame: &Frame, bbox: &BoundingBox) -> Option<Self> {
        let (width, height, pixels) = frame.crop(bbox)?;
        Some(Self {
            width,
            height,
            format: frame.format,
            pixels,
        })
    }
}

/// A named face with its stored samples
#[derive(Debug, Clone, PartialEq)]
pub struct Identity {
    pub name: String,
    pub descriptors: Vec<Embedding>,
    pub image: Option<RepresentativeImage>,
    pub enrolled_at: DateTime<Utc>,
}

impl Identity {
    pub fn summary(&self) -> IdentitySummary {
        IdentitySummary {
            name: self.name.clone(),
            descriptor_count: self.descriptors.len(),
            has_image: self.image.is_some(),
            enrolled_at: self.enrolled_at,
        }
    }
}

/// Lightweight listing entry handed to the UI/CLI layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentitySummary {
    pub name: String,
    pub descriptor_count: usize,
    pub has_image: bool,
    pub enrolled_at: DateTime<Utc>,
}

/// Persisted form of a single identity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct IdentityRecord {
    pub descriptors: Vec<Embedding>,
    #[serde(default)]
    pub image: Option<RepresentativeImage>,
    #[serde(default = "Utc::now")]
    pub enrolled_at: DateTime<Utc>,
}

impl IdentityRecord {
    pub fn from_identity(identity: &Identity) -> Self {
        Self {
            descriptors: identity.descriptors.clone(),
            image: identity.image.clone(),
            enrolled_at: identity.enrolled_at,
        }
    }

    pub fn into_identity(self, name: String) -> Identity {
        Identity {
            name,
            descriptors: self.descriptors,
            image: self.image,
            enrolled_at: self.enrolled_at,
        }
    }
}

/// Closest stored identity for a query embedding
#[derive(Debug, Clone, PartialEq)]
pub struct Match {
    pub identity_name: String,
    pub distance: f64,
}

/// Outcome of thresholded classification
#[derive(Debug, Clone, PartialEq)]
pub enum Classification {
    /// Rounded mean distance fell under the threshold
    Known { name: String, distance: f64 },
    /// No identity was close enough, or the store is empty
    Unknown,
}

impl Classification {
    pub fn is_known(&self) -> bool {
        matches!(self, Classification::Known { .. })
    }
}
