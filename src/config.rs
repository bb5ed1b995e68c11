use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct FacecamConfig {
    pub recognition: RecognitionConfig,
    pub enrollment: EnrollmentConfig,
    pub camera: CameraConfig,
    pub capture: CaptureConfig,
    pub store: StoreConfig,
    pub oracle: OracleConfig,
    pub system: SystemConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct RecognitionConfig {
    /// Maximum mean euclidean distance for a face to count as a known identity
    #[serde(default = "default_max_face_distance")]
    pub max_face_distance: f64,

    /// Detections scoring below this are ignored by every capture mode
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f64,

    /// Prefix given to auto-registered identities
    #[serde(default = "default_unknown_prefix")]
    pub unknown_prefix: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct EnrollmentConfig {
    /// Samples collected by `train` when no count is given
    #[serde(default = "default_enrollment_samples")]
    pub default_samples: usize,

    /// Upper bound accepted for a training sample count
    #[serde(default = "default_enrollment_max_samples")]
    pub max_samples: usize,

    /// Samples accepted before the diversity check kicks in
    #[serde(default = "default_unconditional_samples")]
    pub unconditional_samples: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct CameraConfig {
    /// Frame resolution (width, height)
    #[serde(default = "default_camera_resolution")]
    pub resolution: (u32, u32),

    /// Frames per second delivered by the frame source
    #[serde(default = "default_camera_fps")]
    pub fps: u32,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct CaptureConfig {
    /// Warm-up forward passes attempted before giving up
    #[serde(default = "default_warmup_attempts")]
    pub warmup_attempts: u32,

    /// Number of forward pass timings averaged for the fps readout
    #[serde(default = "default_timing_window")]
    pub timing_window: usize,

    /// Pending operator commands buffered by the controller
    #[serde(default = "default_command_queue_capacity")]
    pub command_queue_capacity: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct StoreConfig {
    /// Directory holding the identity records
    #[serde(default = "default_store_path")]
    pub path: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct OracleConfig {
    /// JSON-lines file of recorded detections to replay
    pub replay_path: Option<String>,

    /// Restart the replay from the top when it runs out
    #[serde(default = "default_loop_replay")]
    pub loop_replay: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct SystemConfig {
    /// Event bus capacity
    #[serde(default = "default_event_bus_capacity")]
    pub event_bus_capacity: usize,
}

impl FacecamConfig {
    /// Load configuration from default sources (file + environment variables)
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_file("facecam.toml")
    }

    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let settings = Config::builder()
            .set_default("recognition.max_face_distance", default_max_face_distance())?
            .set_default("recognition.min_confidence", default_min_confidence())?
            .set_default("recognition.unknown_prefix", default_unknown_prefix())?
            .set_default(
                "enrollment.default_samples",
                default_enrollment_samples() as i64,
            )?
            .set_default(
                "enrollment.max_samples",
                default_enrollment_max_samples() as i64,
            )?
            .set_default(
                "enrollment.unconditional_samples",
                default_unconditional_samples() as i64,
            )?
            .set_default(
                "camera.resolution",
                vec![default_camera_resolution().0, default_camera_resolution().1],
            )?
            .set_default("camera.fps", default_camera_fps())?
            .set_default("capture.warmup_attempts", default_warmup_attempts())?
            .set_default("capture.timing_window", default_timing_window() as i64)?
            .set_default(
                "capture.command_queue_capacity",
                default_command_queue_capacity() as i64,
            )?
            .set_default("store.path", default_store_path())?
            .set_default("oracle.loop_replay", default_loop_replay())?
            .set_default(
                "system.event_bus_capacity",
                default_event_bus_capacity() as i64,
            )?
            .add_source(File::with_name(&path_str).required(false))
            // FACECAM_RECOGNITION__MIN_CONFIDENCE=0.8 style overrides
            .add_source(
                Environment::with_prefix("FACECAM")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        let config: FacecamConfig = settings.try_deserialize()?;

        info!("Configuration loaded successfully");
        debug!("Final configuration: {:#?}", config);

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        let recognition = &self.recognition;
        if recognition.max_face_distance.is_nan() || recognition.max_face_distance <= 0.0 {
            return Err(ConfigError::Message(
                "Recognition max_face_distance must be greater than 0".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&recognition.min_confidence) {
            return Err(ConfigError::Message(
                "Recognition min_confidence must be within [0, 1]".to_string(),
            ));
        }

        if recognition.unknown_prefix.trim().is_empty() {
            return Err(ConfigError::Message(
                "Recognition unknown_prefix must not be empty".to_string(),
            ));
        }

        if self.enrollment.max_samples == 0 {
            return Err(ConfigError::Message(
                "Enrollment max_samples must be greater than 0".to_string(),
            ));
        }

        if self.enrollment.default_samples == 0
            || self.enrollment.default_samples > self.enrollment.max_samples
        {
            return Err(ConfigError::Message(format!(
                "Enrollment default_samples must be within 1..={}",
                self.enrollment.max_samples
            )));
        }

        if self.camera.resolution.0 == 0 || self.camera.resolution.1 == 0 {
            return Err(ConfigError::Message(
                "Camera resolution must be greater than 0".to_string(),
            ));
        }

        if self.camera.fps == 0 {
            return Err(ConfigError::Message(
                "Camera fps must be greater than 0".to_string(),
            ));
        }

        if self.capture.warmup_attempts == 0 {
            return Err(ConfigError::Message(
                "Capture warmup_attempts must be greater than 0".to_string(),
            ));
        }

        if self.capture.timing_window == 0 {
            return Err(ConfigError::Message(
                "Capture timing_window must be greater than 0".to_string(),
            ));
        }

        if self.capture.command_queue_capacity == 0 {
            return Err(ConfigError::Message(
                "Capture command_queue_capacity must be greater than 0".to_string(),
            ));
        }

        if self.store.path.trim().is_empty() {
            return Err(ConfigError::Message(
                "Store path must not be empty".to_string(),
            ));
        }

        if self.system.event_bus_capacity == 0 {
            return Err(ConfigError::Message(
                "Event bus capacity must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Render the configuration as TOML
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

impl Default for FacecamConfig {
    fn default() -> Self {
        Self {
            recognition: RecognitionConfig {
                max_face_distance: default_max_face_distance(),
                min_confidence: default_min_confidence(),
                unknown_prefix: default_unknown_prefix(),
            },
            enrollment: EnrollmentConfig {
                default_samples: default_enrollment_samples(),
                max_samples: default_enrollment_max_samples(),
                unconditional_samples: default_unconditional_samples(),
            },
            camera: CameraConfig {
                resolution: default_camera_resolution(),
                fps: default_camera_fps(),
            },
            capture: CaptureConfig {
                warmup_attempts: default_warmup_attempts(),
                timing_window: default_timing_window(),
                command_queue_capacity: default_command_queue_capacity(),
            },
            store: StoreConfig {
                path: default_store_path(),
            },
            oracle: OracleConfig {
                replay_path: None,
                loop_replay: default_loop_replay(),
            },
            system: SystemConfig {
                event_bus_capacity: default_event_bus_capacity(),
            },
        }
    }
}

// Default value functions
fn default_max_face_distance() -> f64 {
    0.6
}
fn default_min_confidence() -> f64 {
    0.9
}
fn default_unknown_prefix() -> String {
    "Unknown #".to_string()
}

fn default_enrollment_samples() -> usize {
    3
}
fn default_enrollment_max_samples() -> usize {
    10
}
fn default_unconditional_samples() -> usize {
    1
}

fn default_camera_resolution() -> (u32, u32) {
    (640, 480)
}
fn default_camera_fps() -> u32 {
    30
}

fn default_warmup_attempts() -> u32 {
    3
}
fn default_timing_window() -> usize {
    30
}
fn default_command_queue_capacity() -> usize {
    32
}

fn default_store_path() -> String {
    "./facecam_store".to_string()
}

fn default_loop_replay() -> bool {
    true
}

fn default_event_bus_capacity() -> usize {
    100
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = FacecamConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.recognition.max_face_distance, 0.6);
        assert_eq!(config.recognition.min_confidence, 0.9);
        assert_eq!(config.recognition.unknown_prefix, "Unknown #");
    }

    #[test]
    fn test_config_validation() {
        let mut config = FacecamConfig::default();
        config.recognition.min_confidence = 1.5;
        assert!(config.validate().is_err());

        config.recognition.min_confidence = 0.9;
        config.enrollment.default_samples = 11;
        assert!(config.validate().is_err());

        config.enrollment.default_samples = 3;
        config.camera.resolution = (0, 480);
        assert!(config.validate().is_err());

        config.camera.resolution = (640, 480);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[recognition]\nmax_face_distance = 0.5\n\n[store]\npath = \"/tmp/faces\"\n\n[oracle]\nreplay_path = \"frames.jsonl\""
        )
        .unwrap();

        let config = FacecamConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.recognition.max_face_distance, 0.5);
        assert_eq!(config.recognition.min_confidence, 0.9);
        assert_eq!(config.store.path, "/tmp/faces");
        assert_eq!(config.oracle.replay_path.as_deref(), Some("frames.jsonl"));
        assert!(config.oracle.loop_replay);
        assert_eq!(config.camera.resolution, (640, 480));
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = FacecamConfig::load_from_file(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, FacecamConfig::default());
    }

    #[test]
    fn test_toml_rendering_round_trips_through_loader() {
        let rendered = FacecamConfig::default().to_toml().unwrap();
        assert!(rendered.contains("[recognition]"));

        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(rendered.as_bytes()).unwrap();
        let loaded = FacecamConfig::load_from_file(file.path()).unwrap();
        assert_eq!(loaded, FacecamConfig::default());
    }
}
