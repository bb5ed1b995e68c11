use super::commands::ControllerCommand;
use super::state::CaptureMode;
use super::stats::PassTimings;
use crate::config::{CaptureConfig, EnrollmentConfig, RecognitionConfig};
use crate::error::{ControllerError, EnrollmentError, OracleError, Result, StoreError};
use crate::events::{EventBus, FacecamEvent, LabelColor};
use crate::frame::Frame;
use crate::identity::{
    classify, Classification, EnrollmentAccumulator, IdentityStore, RepresentativeImage,
    SampleOutcome,
};
use crate::oracle::{Detection, EmbeddingOracle, FrameSource};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Output of one successful forward pass
struct PassOutput {
    frame: Frame,
    detections: Vec<Detection>,
    elapsed: Duration,
}

type PassResult = std::result::Result<PassOutput, OracleError>;

/// The single forward pass currently running, tagged with the state it was
/// launched for
struct InFlightPass {
    mode: CaptureMode,
    session: u64,
    handle: JoinHandle<PassResult>,
}

async fn forward_pass(
    frames: Arc<dyn FrameSource>,
    oracle: Arc<dyn EmbeddingOracle>,
) -> PassResult {
    let started = Instant::now();
    let frame = frames.next_frame().await?;
    let detections = oracle.detect(&frame).await?;
    Ok(PassOutput {
        frame,
        detections,
        elapsed: started.elapsed(),
    })
}

/// Resolves when the in-flight pass finishes; never resolves without one
async fn wait_for_pass(
    pass: &mut Option<InFlightPass>,
) -> std::result::Result<PassResult, JoinError> {
    match pass {
        Some(pass) => (&mut pass.handle).await,
        None => std::future::pending().await,
    }
}

/// Capture-mode state machine.
///
/// Owns the identity store and the enrollment accumulator and runs as a
/// single task: commands and forward pass results are handled one at a
/// time, so store mutations are never concurrent. At most one forward pass
/// is in flight; its result is dropped if the controller has left the state
/// the pass was launched for.
pub struct CaptureController {
    recognition: RecognitionConfig,
    enrollment_config: EnrollmentConfig,
    capture: CaptureConfig,
    store: IdentityStore,
    enrollment: EnrollmentAccumulator,
    oracle: Arc<dyn EmbeddingOracle>,
    frames: Arc<dyn FrameSource>,
    event_bus: Arc<EventBus>,
    mode: CaptureMode,
    session: u64,
    timings: PassTimings,
}

impl CaptureController {
    pub(super) fn new(
        recognition: RecognitionConfig,
        enrollment_config: EnrollmentConfig,
        capture: CaptureConfig,
        store: IdentityStore,
        oracle: Arc<dyn EmbeddingOracle>,
        frames: Arc<dyn FrameSource>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        let enrollment = EnrollmentAccumulator::new(
            recognition.max_face_distance,
            enrollment_config.unconditional_samples,
        );
        let timings = PassTimings::new(capture.timing_window);

        Self {
            recognition,
            enrollment_config,
            capture,
            store,
            enrollment,
            oracle,
            frames,
            event_bus,
            mode: CaptureMode::Loading,
            session: 0,
            timings,
        }
    }

    pub fn mode(&self) -> CaptureMode {
        self.mode
    }

    pub fn store(&self) -> &IdentityStore {
        &self.store
    }

    pub fn enrollment(&self) -> &EnrollmentAccumulator {
        &self.enrollment
    }

    /// Load the identity store and run forward passes until one succeeds.
    ///
    /// Transient failures are retried up to `capture.warmup_attempts` times.
    /// On failure the controller stays in `Loading`.
    pub async fn warm_up(&mut self) -> Result<()> {
        if self.mode != CaptureMode::Loading {
            debug!("Controller already warmed up");
            return Ok(());
        }

        self.publish_status("Loading identities").await;
        self.store.load().await?;
        info!("Loaded {} identities", self.store.len());

        self.publish_status("Warming up face model").await;
        let attempts = self.capture.warmup_attempts.max(1);
        let mut last_error = None;

        for attempt in 1..=attempts {
            match forward_pass(Arc::clone(&self.frames), Arc::clone(&self.oracle)).await {
                Ok(output) => {
                    info!(
                        "Warm-up pass succeeded in {:.1}ms (attempt {}/{})",
                        output.elapsed.as_secs_f64() * 1000.0,
                        attempt,
                        attempts
                    );
                    self.set_mode(CaptureMode::Idle).await;
                    return Ok(());
                }
                Err(e) if e.is_fatal() => {
                    error!("Warm-up failed: {}", e);
                    self.publish_status(&e.user_message()).await;
                    return Err(e.into());
                }
                Err(e) => {
                    warn!("Warm-up attempt {}/{} failed: {}", attempt, attempts, e);
                    self.publish_status(&e.user_message()).await;
                    last_error = Some(e);
                }
            }
        }

        let error = last_error.unwrap_or_else(|| OracleError::fatal("warm-up did not run"));
        error!("Warm-up gave up after {} attempts", attempts);
        Err(error.into())
    }

    /// Process commands and forward passes until cancelled or every
    /// [`ControllerHandle`](super::ControllerHandle) is dropped.
    pub async fn run(
        &mut self,
        mut commands: mpsc::Receiver<ControllerCommand>,
        cancel: CancellationToken,
    ) -> Result<()> {
        info!("Capture controller running in {} mode", self.mode);
        let mut in_flight: Option<InFlightPass> = None;

        loop {
            // Commands queued while the previous result was processed apply
            // before the next frame is fetched.
            if in_flight.is_none() && self.mode.is_active() {
                while let Ok(command) = commands.try_recv() {
                    self.handle_command(command).await;
                }
                if self.mode.is_active() && !cancel.is_cancelled() {
                    in_flight = Some(self.launch_pass());
                }
            }

            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    info!("Capture controller cancelled");
                    break;
                }

                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    None => {
                        info!("All controller handles dropped");
                        break;
                    }
                },

                finished = wait_for_pass(&mut in_flight) => {
                    if let Some(pass) = in_flight.take() {
                        self.complete_pass(pass.mode, pass.session, finished).await;
                    }
                }
            }
        }

        if let Some(pass) = in_flight.take() {
            debug!("Aborting in-flight pass on shutdown");
            pass.handle.abort();
        }

        info!("Capture controller stopped");
        Ok(())
    }

    fn launch_pass(&self) -> InFlightPass {
        let frames = Arc::clone(&self.frames);
        let oracle = Arc::clone(&self.oracle);
        debug!("Launching forward pass (session {})", self.session);

        InFlightPass {
            mode: self.mode,
            session: self.session,
            handle: tokio::spawn(forward_pass(frames, oracle)),
        }
    }

    async fn handle_command(&mut self, command: ControllerCommand) {
        debug!("Handling command: {}", command.name());
        let command_name = command.name();

        match command {
            ControllerCommand::StartRealtime { reply } => {
                let result = self.start(CaptureMode::DetectLoop, command_name).await;
                let _ = reply.send(result);
            }
            ControllerCommand::SingleShot { reply } => {
                let result = self.start(CaptureMode::DetectSingle, command_name).await;
                let _ = reply.send(result);
            }
            ControllerCommand::Stop { reply } => {
                self.stop().await;
                let _ = reply.send(Ok(()));
            }
            ControllerCommand::Train {
                name,
                sample_count,
                reply,
            } => {
                let result = self.train(&name, sample_count).await;
                let _ = reply.send(result);
            }
            ControllerCommand::CommitEnrollment { reply } => {
                let result = self.retry_commit(command_name).await;
                let _ = reply.send(result);
            }
            ControllerCommand::DeleteIdentity { name, reply } => {
                let result = self.delete_identity(&name, command_name).await;
                let _ = reply.send(result);
            }
            ControllerCommand::RenameIdentity {
                old_name,
                new_name,
                reply,
            } => {
                let result = self
                    .rename_identity(&old_name, &new_name, command_name)
                    .await;
                let _ = reply.send(result);
            }
            ControllerCommand::ListIdentities { reply } => {
                let result = self
                    .ensure_ready(command_name)
                    .map(|_| self.store.summaries());
                let _ = reply.send(result);
            }
            ControllerCommand::Mode { reply } => {
                let _ = reply.send(self.mode);
            }
        }
    }

    fn ensure_idle(&self, command: &str) -> std::result::Result<(), ControllerError> {
        if self.mode == CaptureMode::Idle {
            Ok(())
        } else {
            Err(self.invalid_transition(command))
        }
    }

    fn ensure_ready(&self, command: &str) -> Result<()> {
        if self.mode == CaptureMode::Loading {
            Err(self.invalid_transition(command).into())
        } else {
            Ok(())
        }
    }

    fn invalid_transition(&self, command: &str) -> ControllerError {
        warn!("Rejected '{}' while in {} mode", command, self.mode);
        ControllerError::InvalidTransition {
            mode: self.mode.to_string(),
            command: command.to_string(),
        }
    }

    async fn start(&mut self, mode: CaptureMode, command: &str) -> Result<()> {
        self.ensure_idle(command)?;
        self.set_mode(mode).await;
        Ok(())
    }

    async fn stop(&mut self) {
        match self.mode {
            CaptureMode::Enroll => {
                if let Some(name) = self.enrollment.name() {
                    info!("Enrollment of '{}' abandoned", name);
                }
                self.enrollment.reset();
                self.set_mode(CaptureMode::Idle).await;
            }
            mode if mode.is_active() => self.set_mode(CaptureMode::Idle).await,
            mode => debug!("Stop ignored in {} mode", mode),
        }
    }

    async fn train(&mut self, name: &str, sample_count: usize) -> Result<()> {
        self.ensure_idle("train")?;

        let name = name.trim();
        if name.is_empty() {
            return Err(StoreError::InvalidName {
                reason: "name must not be empty".to_string(),
            }
            .into());
        }

        let max = self.enrollment_config.max_samples;
        if sample_count == 0 || sample_count > max {
            return Err(EnrollmentError::InvalidSampleCount {
                requested: sample_count,
                max,
            }
            .into());
        }

        if self.store.contains(name) {
            return Err(StoreError::DuplicateName {
                name: name.to_string(),
            }
            .into());
        }

        self.enrollment.start(name, sample_count);
        self.set_mode(CaptureMode::Enroll).await;
        Ok(())
    }

    async fn retry_commit(&mut self, command: &str) -> Result<String> {
        self.ensure_idle(command)?;
        let name = self.enrollment.commit(&mut self.store).await?;
        self.announce_enrolled(&name).await;
        Ok(name)
    }

    async fn delete_identity(&mut self, name: &str, command: &str) -> Result<()> {
        self.ensure_ready(command)?;
        self.store.delete_identity(name).await?;

        self.publish(FacecamEvent::IdentityRemoved {
            name: name.to_string(),
        })
        .await;
        self.publish_status(&format!("Deleted '{}'", name)).await;
        Ok(())
    }

    async fn rename_identity(&mut self, old_name: &str, new_name: &str, command: &str) -> Result<()> {
        self.ensure_ready(command)?;
        self.store.rename_identity(old_name, new_name).await?;

        self.publish(FacecamEvent::IdentityRenamed {
            old_name: old_name.to_string(),
            new_name: new_name.to_string(),
        })
        .await;
        self.publish_status(&format!("Renamed '{}' to '{}'", old_name, new_name))
            .await;
        Ok(())
    }

    async fn complete_pass(
        &mut self,
        mode: CaptureMode,
        session: u64,
        finished: std::result::Result<PassResult, JoinError>,
    ) {
        if mode != self.mode || session != self.session {
            debug!(
                "Discarding stale pass from {} mode (session {})",
                mode, session
            );
            return;
        }

        let output = match finished {
            Ok(Ok(output)) => output,
            Ok(Err(e)) if e.is_fatal() => {
                error!("Forward pass failed: {}", e);
                self.publish_status(&e.user_message()).await;
                self.halt().await;
                return;
            }
            Ok(Err(e)) => {
                warn!("Forward pass skipped: {}", e);
                self.publish_status(&e.user_message()).await;
                return;
            }
            Err(e) => {
                error!("Forward pass task failed: {}", e);
                self.publish_error("forward_pass", &e.to_string()).await;
                self.halt().await;
                return;
            }
        };

        self.timings.record(output.elapsed);
        if let (Some(fps), Some(average_ms)) = (self.timings.fps(), self.timings.average_ms()) {
            self.publish(FacecamEvent::FpsUpdated { fps, average_ms })
                .await;
        }

        let min_confidence = self.recognition.min_confidence;
        let detections: Vec<Detection> = output
            .detections
            .into_iter()
            .filter(|d| d.passes(min_confidence))
            .collect();

        debug!(
            "Frame {}: {} detections above confidence {}",
            output.frame.id,
            detections.len(),
            min_confidence
        );

        match self.mode {
            CaptureMode::DetectLoop | CaptureMode::DetectSingle => {
                for detection in &detections {
                    self.classify_detection(&output.frame, detection).await;
                }
                if self.mode == CaptureMode::DetectSingle && !detections.is_empty() {
                    self.set_mode(CaptureMode::Idle).await;
                }
            }
            CaptureMode::Enroll => {
                for detection in &detections {
                    self.enroll_detection(&output.frame, detection).await;
                    if self.enrollment.is_complete() {
                        self.finish_enrollment().await;
                        break;
                    }
                }
            }
            CaptureMode::Loading | CaptureMode::Idle => {}
        }
    }

    /// Leave the active mode after an unrecoverable pass failure
    async fn halt(&mut self) {
        if self.mode == CaptureMode::Enroll {
            self.enrollment.reset();
        }
        self.set_mode(CaptureMode::Idle).await;
    }

    async fn classify_detection(&mut self, frame: &Frame, detection: &Detection) {
        let classification = classify(
            &detection.embedding,
            self.store.embeddings(),
            self.recognition.max_face_distance,
        );

        let (label, color) = match classification {
            Classification::Known { name, distance } => {
                let color = if name.starts_with(&self.recognition.unknown_prefix) {
                    LabelColor::Red
                } else {
                    LabelColor::Green
                };
                (format!("{} ({:.2})", name, distance), color)
            }
            Classification::Unknown => match self.register_unknown(frame, detection).await {
                Ok(name) => (name, LabelColor::Red),
                Err(e) => {
                    warn!("Could not register unknown face: {}", e);
                    self.publish_status(&format!("Could not register face: {}", e))
                        .await;
                    self.publish_error("identity_store", &e.to_string()).await;
                    return;
                }
            },
        };

        debug!("Frame {}: {} [{}]", frame.id, label, color);
        self.publish(FacecamEvent::DetectionResult {
            frame_id: frame.id,
            bounding_box: detection.bounding_box,
            label,
            color,
        })
        .await;
    }

    async fn register_unknown(
        &mut self,
        frame: &Frame,
        detection: &Detection,
    ) -> std::result::Result<String, StoreError> {
        let id = self.store.next_anonymous_id().await?;
        let name = format!("{}{}", self.recognition.unknown_prefix, id);
        let image = RepresentativeImage::from_frame(frame, &detection.bounding_box);

        self.store
            .add_identity(&name, vec![detection.embedding.clone()], image)
            .await?;

        info!("Registered new face as '{}'", name);
        self.publish(FacecamEvent::IdentityAdded {
            name: name.clone(),
            descriptor_count: 1,
        })
        .await;
        Ok(name)
    }

    async fn enroll_detection(&mut self, frame: &Frame, detection: &Detection) {
        let count = match self.enrollment.accept(frame, detection) {
            Ok(SampleOutcome::Accepted { count }) => count,
            Ok(SampleOutcome::Rejected { distance }) => {
                debug!("Enrollment sample too similar ({:.2})", distance);
                return;
            }
            Err(e) => {
                warn!("Enrollment sample dropped: {}", e);
                return;
            }
        };

        let name = self.enrollment.name().unwrap_or_default().to_string();
        let target = self.enrollment.target();
        debug!("Enrollment sample {}/{} for '{}'", count, target, name);

        self.publish(FacecamEvent::DetectionResult {
            frame_id: frame.id,
            bounding_box: detection.bounding_box,
            label: name.clone(),
            color: LabelColor::Blue,
        })
        .await;
        self.publish_status(&format!("Enrolling {}: {}/{}", name, count, target))
            .await;
    }

    async fn finish_enrollment(&mut self) {
        match self.enrollment.commit(&mut self.store).await {
            Ok(name) => {
                self.announce_enrolled(&name).await;
                self.set_mode(CaptureMode::Idle).await;
            }
            Err(e) => {
                error!("Enrollment commit failed: {}", e);
                self.publish_status(&format!("Enrollment not saved: {}; commit to retry", e))
                    .await;
                self.publish_error("enrollment", &e.to_string()).await;
                self.set_mode(CaptureMode::Idle).await;
            }
        }
    }

    async fn announce_enrolled(&self, name: &str) {
        let descriptor_count = self
            .store
            .get(name)
            .map_or(0, |identity| identity.descriptors.len());

        self.publish(FacecamEvent::IdentityAdded {
            name: name.to_string(),
            descriptor_count,
        })
        .await;
        self.publish_status(&format!("Enrolled '{}'", name)).await;
    }

    async fn set_mode(&mut self, mode: CaptureMode) {
        if self.mode == mode {
            return;
        }

        let previous = self.mode;
        self.mode = mode;
        if mode.is_active() {
            self.session += 1;
        }
        info!("Capture mode {} -> {}", previous, mode);

        self.publish(FacecamEvent::ModeChanged { mode }).await;
        let status = match mode {
            CaptureMode::Loading => "Loading".to_string(),
            CaptureMode::Idle => "Ready".to_string(),
            CaptureMode::DetectLoop => "Detecting faces".to_string(),
            CaptureMode::DetectSingle => "Looking for a face".to_string(),
            CaptureMode::Enroll => format!(
                "Enrolling {}: 0/{}",
                self.enrollment.name().unwrap_or_default(),
                self.enrollment.target()
            ),
        };
        self.publish_status(&status).await;
    }

    async fn publish_status(&self, text: &str) {
        self.publish(FacecamEvent::StatusChanged {
            text: text.to_string(),
        })
        .await;
    }

    async fn publish_error(&self, component: &str, error: &str) {
        self.publish(FacecamEvent::SystemError {
            component: component.to_string(),
            error: error.to_string(),
        })
        .await;
    }

    async fn publish(&self, event: FacecamEvent) {
        if let Err(e) = self.event_bus.publish(event).await {
            debug!("Event not delivered: {}", e);
        }
    }
}

impl std::fmt::Debug for CaptureController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureController")
            .field("mode", &self.mode)
            .field("session", &self.session)
            .field("identities", &self.store.len())
            .finish()
    }
}
