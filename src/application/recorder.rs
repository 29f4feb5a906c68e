//! Audio recorder control service
//!
//! Owns the session state machine, device acquisition, the processing
//! worker's lifecycle, artifact delivery, elapsed-time tracking, and
//! error aggregation. The worker owns the encoder and the in-flight
//! buffer; this side only ever sees snapshots.

use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::application::ports::{CodecFactory, DeviceError, DeviceHandle, DeviceSource};
use crate::application::worker::{ProcessingWorker, WorkerCommand, WorkerEvent, WorkerHandle};
use crate::domain::error::{ErrorRecord, InvalidStateTransition};
use crate::domain::recording::{
    Artifact, EncodedBuffer, RecorderStatus, SessionConstraints, SessionState,
};

/// Bounded wait for a worker acknowledgment before forcing a reset
pub const ACK_TIMEOUT: Duration = Duration::from_secs(5);

/// How long a superseded artifact's storage is kept alive after
/// replacement, so in-flight readers can finish.
const ARTIFACT_GRACE: Duration = Duration::from_secs(1);

/// Errors from the recorder service
#[derive(Debug, Error)]
pub enum RecorderError {
    #[error("Device acquisition failed: {0}")]
    DeviceAcquisition(#[from] DeviceError),

    #[error("Failed to set up the processing context: {0}")]
    ContextSetup(String),

    #[error("No active session: there is no processing context to command")]
    NoActiveSession,

    #[error("Encoder not initialized in the processing context")]
    EncoderNotInitialized,

    #[error("Encoding failed: {0}")]
    Encoding(String),

    #[error("Invalid message received from the processing worker: {0}")]
    InvalidWorkerMessage(String),

    #[error(transparent)]
    InvalidTransition(#[from] InvalidStateTransition),

    #[error("Processing worker did not acknowledge {command} in time")]
    AckTimeout { command: &'static str },
}

/// Options for [`AudioRecorderService::clear`]
#[derive(Debug, Clone, Copy, Default)]
pub struct ClearOptions {
    /// Keep the produced artifact and elapsed time
    pub keep_recording: bool,
    /// Keep the current status instead of resetting to IDLE
    pub keep_state: bool,
}

/// Holds the single current artifact. The previous artifact's storage is
/// released only after a grace period once superseded.
#[derive(Default)]
struct ArtifactSlot {
    current: Option<Artifact>,
}

impl ArtifactSlot {
    fn publish(&mut self, artifact: Artifact) {
        let previous = self.current.replace(artifact);
        Self::defer_release(previous);
    }

    fn clear(&mut self) {
        let previous = self.current.take();
        Self::defer_release(previous);
    }

    fn current(&self) -> Option<Artifact> {
        self.current.clone()
    }

    fn defer_release(previous: Option<Artifact>) {
        if let Some(previous) = previous {
            tokio::spawn(async move {
                tokio::time::sleep(ARTIFACT_GRACE).await;
                drop(previous);
            });
        }
    }
}

/// The control-plane recorder.
///
/// One session may be active at a time. `start` acquires the device and
/// spawns the processing worker; `pause` tears both down after storing a
/// carry-over snapshot, so `resume` re-acquires them and seeds the new
/// encoder with the snapshot. All commands are acknowledged over a
/// bounded channel within [`ACK_TIMEOUT`].
pub struct AudioRecorderService<D: DeviceSource> {
    device_source: D,
    codec_factory: Arc<dyn CodecFactory>,
    session: SessionState,
    status_tx: watch::Sender<RecorderStatus>,
    constraints: SessionConstraints,
    device: Option<DeviceHandle>,
    worker: Option<WorkerHandle>,
    carry_over: Option<EncodedBuffer>,
    artifacts: ArtifactSlot,
    pause_preview: bool,
    previous_secs: f64,
    session_started: Option<Instant>,
    errors: Vec<ErrorRecord>,
}

impl<D: DeviceSource> AudioRecorderService<D> {
    pub fn new(device_source: D, codec_factory: Arc<dyn CodecFactory>) -> Self {
        let (status_tx, _) = watch::channel(RecorderStatus::Idle);
        Self {
            device_source,
            codec_factory,
            session: SessionState::new(),
            status_tx,
            constraints: SessionConstraints::default(),
            device: None,
            worker: None,
            carry_over: None,
            artifacts: ArtifactSlot::default(),
            pause_preview: false,
            previous_secs: 0.0,
            session_started: None,
            errors: Vec::new(),
        }
    }

    //
    // Observable state
    //

    pub fn status(&self) -> RecorderStatus {
        self.session.status()
    }

    /// Subscribe to status changes.
    pub fn subscribe_status(&self) -> watch::Receiver<RecorderStatus> {
        self.status_tx.subscribe()
    }

    /// Elapsed recording time in seconds, accumulated across pauses.
    pub fn elapsed_secs(&self) -> f64 {
        let running = self
            .session_started
            .map(|started| started.elapsed().as_secs_f64())
            .unwrap_or(0.0);
        self.previous_secs + running
    }

    /// The current preview or terminal artifact, if any.
    pub fn artifact(&self) -> Option<Artifact> {
        self.artifacts.current()
    }

    /// Failures recorded this session, deduplicated by message.
    pub fn errors(&self) -> &[ErrorRecord] {
        &self.errors
    }

    pub fn constraints(&self) -> &SessionConstraints {
        &self.constraints
    }

    //
    // Control operations
    //

    /// Start a new recording session. Only valid from IDLE; constraints
    /// given here replace the stored ones for this and later sessions
    /// until `clear`.
    pub async fn start(
        &mut self,
        constraints: Option<SessionConstraints>,
    ) -> Result<(), RecorderError> {
        self.session.begin_start()?;
        self.publish_status();

        if let Some(constraints) = constraints {
            self.constraints = constraints;
        }

        match self.initialize(None).await {
            Ok(()) => Ok(()),
            Err(e) => {
                self.abort_session();
                Err(e)
            }
        }
    }

    /// Resume a paused session. Re-acquires the device and processing
    /// context, seeding the new encoder with the carry-over snapshot so
    /// the output stays contiguous.
    pub async fn resume(&mut self) -> Result<(), RecorderError> {
        self.session.begin_resume()?;
        self.publish_status();

        let carry_over = self.carry_over.clone();
        match self.initialize(carry_over).await {
            Ok(()) => {
                self.carry_over = None;
                Ok(())
            }
            Err(e) => {
                self.abort_session();
                Err(e)
            }
        }
    }

    /// Pause the running session. Always stores a carry-over snapshot of
    /// the committed buffer; with `emit_preview` the stream is also
    /// flushed into a playable preview artifact. The device and
    /// processing context are released before the PAUSED transition.
    pub async fn pause(&mut self, emit_preview: bool) -> Result<(), RecorderError> {
        if self.worker.is_none() {
            self.record_error("cannot pause: no processing context is active");
            return Err(RecorderError::NoActiveSession);
        }

        self.session.begin_pause()?;
        self.publish_status();

        self.send_command(WorkerCommand::Pause { emit_preview })?;
        match self.await_event("PAUSE").await? {
            WorkerEvent::Paused {
                carry_over,
                preview,
            } => {
                debug!(
                    chunks = carry_over.chunk_count(),
                    preview = preview.is_some(),
                    "paused"
                );
                self.carry_over = Some(carry_over);
                self.pause_preview = preview.is_some();
                if let Some(buffer) = preview {
                    self.artifacts
                        .publish(Artifact::from_buffer(&buffer, self.codec_factory.mime_type()));
                }
                self.release_session_resources();
                self.accumulate_elapsed();
                self.session.mark_paused()?;
                self.publish_status();
                Ok(())
            }
            WorkerEvent::EncoderMissing => {
                self.record_error("pause acknowledged with no encoder present");
                self.abort_session();
                Err(RecorderError::EncoderNotInitialized)
            }
            WorkerEvent::Failed { message } => {
                self.record_error(message.clone());
                self.abort_session();
                Err(RecorderError::Encoding(message))
            }
            other => Err(self.invalid_ack("PAUSE", &other)),
        }
    }

    /// Stop the session and produce the terminal artifact. Valid while
    /// recording or paused. Afterwards the status stays STOPPED and the
    /// artifact remains observable until `clear`.
    pub async fn stop(&mut self) -> Result<(), RecorderError> {
        if self.session.status() == RecorderStatus::Paused {
            return self.stop_from_paused();
        }

        if self.worker.is_none() {
            self.record_error("cannot stop: no processing context is active");
            return Err(RecorderError::NoActiveSession);
        }

        self.session.begin_stop()?;
        self.publish_status();

        self.send_command(WorkerCommand::Stop)?;
        match self.await_event("STOP").await? {
            WorkerEvent::Stopped { audio } => {
                info!(bytes = audio.byte_len(), "recording stopped");
                self.artifacts
                    .publish(Artifact::from_buffer(&audio, self.codec_factory.mime_type()));
                self.release_session_resources();
                self.accumulate_elapsed();
                self.session.mark_stopped()?;
                self.publish_status();
                self.clear(ClearOptions {
                    keep_recording: true,
                    keep_state: true,
                });
                Ok(())
            }
            WorkerEvent::EncoderMissing => {
                self.record_error("stop acknowledged with no encoder present");
                self.abort_session();
                Err(RecorderError::EncoderNotInitialized)
            }
            WorkerEvent::Failed { message } => {
                self.record_error(message.clone());
                self.abort_session();
                Err(RecorderError::Encoding(message))
            }
            other => Err(self.invalid_ack("STOP", &other)),
        }
    }

    /// Reset the service. Unconditionally releases the device, context,
    /// carry-over buffer, stored constraints, and error set; the status,
    /// artifact, and elapsed time survive only when the respective
    /// options ask for it.
    pub fn clear(&mut self, options: ClearOptions) {
        if !options.keep_state {
            self.session.reset();
            self.publish_status();
        }
        if !options.keep_recording {
            self.previous_secs = 0.0;
            self.session_started = None;
            self.artifacts.clear();
            self.pause_preview = false;
        }
        self.carry_over = None;
        self.worker = None;
        self.device = None;
        self.constraints = SessionConstraints::default();
        self.errors.clear();
    }

    //
    // Internals
    //

    async fn initialize(
        &mut self,
        carry_over: Option<EncodedBuffer>,
    ) -> Result<(), RecorderError> {
        let stream = match self.device_source.acquire(&self.constraints).await {
            Ok(stream) => stream,
            Err(e) => {
                self.record_error(e.to_string());
                return Err(RecorderError::DeviceAcquisition(e));
            }
        };
        let (quanta, device) = stream.split();
        self.device = Some(device);
        self.worker = Some(ProcessingWorker::spawn(
            Arc::clone(&self.codec_factory),
            quanta,
        ));

        self.send_command(WorkerCommand::Start {
            constraints: self.constraints.clone(),
            carry_over,
        })?;
        match self.await_event("START").await? {
            WorkerEvent::Recording => {
                self.session.mark_recording()?;
                self.publish_status();
                self.session_started = Some(Instant::now());
                info!(
                    sample_rate = self.constraints.sample_rate(),
                    bit_rate = self.constraints.bit_rate(),
                    "recording"
                );
                Ok(())
            }
            WorkerEvent::Failed { message } => {
                self.record_error(message.clone());
                Err(RecorderError::ContextSetup(message))
            }
            other => Err(self.invalid_ack("START", &other)),
        }
    }

    fn stop_from_paused(&mut self) -> Result<(), RecorderError> {
        self.session.begin_stop()?;
        self.publish_status();

        // The context was torn down at pause. Finalize from the
        // pause-time buffers: the flushed preview already published when
        // one was emitted, otherwise the carried-over chunks.
        if !self.pause_preview {
            let buffer = self.carry_over.take().unwrap_or_default();
            self.artifacts
                .publish(Artifact::from_buffer(&buffer, self.codec_factory.mime_type()));
        }

        self.session.mark_stopped()?;
        self.publish_status();
        self.clear(ClearOptions {
            keep_recording: true,
            keep_state: true,
        });
        Ok(())
    }

    fn send_command(&mut self, command: WorkerCommand) -> Result<(), RecorderError> {
        let Some(worker) = self.worker.as_ref() else {
            self.record_error("cannot send command: no processing context is active");
            return Err(RecorderError::NoActiveSession);
        };
        if worker.send(command) {
            Ok(())
        } else {
            self.record_error("processing worker rejected the command");
            self.abort_session();
            Err(RecorderError::NoActiveSession)
        }
    }

    async fn await_event(&mut self, command: &'static str) -> Result<WorkerEvent, RecorderError> {
        let worker = self
            .worker
            .as_mut()
            .ok_or(RecorderError::NoActiveSession)?;

        match tokio::time::timeout(ACK_TIMEOUT, worker.next_event()).await {
            Ok(Some(event)) => Ok(event),
            Ok(None) => {
                self.record_error("processing worker terminated without acknowledging");
                self.abort_session();
                Err(RecorderError::InvalidWorkerMessage(
                    "worker closed the acknowledgment channel".to_string(),
                ))
            }
            Err(_) => {
                self.record_error(format!("{command} was not acknowledged in time"));
                self.abort_session();
                Err(RecorderError::AckTimeout { command })
            }
        }
    }

    fn invalid_ack(&mut self, command: &'static str, event: &WorkerEvent) -> RecorderError {
        let message = format!(
            "unexpected {} acknowledgment for {command}",
            event.describe()
        );
        self.record_error(message.clone());
        self.abort_session();
        RecorderError::InvalidWorkerMessage(message)
    }

    /// Release the device and the processing context. Called before any
    /// status transition that implies they are gone.
    fn release_session_resources(&mut self) {
        if let Some(device) = self.device.take() {
            device.release();
        }
        self.worker = None;
    }

    /// Forced reset after a failure: release partial resources and fall
    /// back to IDLE. Recording data (artifact, carry-over) and the error
    /// set are preserved for inspection.
    fn abort_session(&mut self) {
        warn!("aborting session after failure");
        self.release_session_resources();
        self.session_started = None;
        self.session.reset();
        self.publish_status();
    }

    fn accumulate_elapsed(&mut self) {
        if let Some(started) = self.session_started.take() {
            self.previous_secs += started.elapsed().as_secs_f64();
        }
    }

    fn record_error(&mut self, message: impl Into<String>) {
        let record = ErrorRecord::new(message);
        if self.errors.iter().any(|e| e.message == record.message) {
            return;
        }
        warn!("{}", record.message);
        self.errors.push(record);
    }

    fn publish_status(&self) {
        self.status_tx.send_replace(self.session.status());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::{BlockCodec, CodecError, DeviceStream};
    use crate::domain::recording::AudioMimeType;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicBool;
    use tokio::sync::mpsc;

    struct NeverAcquired;

    #[async_trait]
    impl DeviceSource for NeverAcquired {
        async fn acquire(
            &self,
            _constraints: &SessionConstraints,
        ) -> Result<DeviceStream, DeviceError> {
            panic!("device must not be acquired in this test");
        }
    }

    struct DeniedDevice;

    #[async_trait]
    impl DeviceSource for DeniedDevice {
        async fn acquire(
            &self,
            _constraints: &SessionConstraints,
        ) -> Result<DeviceStream, DeviceError> {
            Err(DeviceError::ConstraintsRejected("permission denied".to_string()))
        }
    }

    struct OpenDevice;

    #[async_trait]
    impl DeviceSource for OpenDevice {
        async fn acquire(
            &self,
            _constraints: &SessionConstraints,
        ) -> Result<DeviceStream, DeviceError> {
            let (_tx, rx) = mpsc::channel(8);
            let handle = DeviceHandle::new(Arc::new(AtomicBool::new(false)));
            Ok(DeviceStream::new(rx, handle))
        }
    }

    struct MarkerCodec;

    impl BlockCodec for MarkerCodec {
        fn block_size(&self) -> usize {
            1152
        }

        fn encode_block(&mut self, samples: &[i16]) -> Result<Vec<u8>, CodecError> {
            Ok(vec![samples.len() as u8])
        }

        fn flush(&mut self) -> Result<Vec<u8>, CodecError> {
            Ok(vec![0xFF])
        }

        fn mime_type(&self) -> AudioMimeType {
            AudioMimeType::Ogg
        }
    }

    struct MarkerFactory;

    impl CodecFactory for MarkerFactory {
        fn create(
            &self,
            _constraints: &SessionConstraints,
        ) -> Result<Box<dyn BlockCodec>, CodecError> {
            Ok(Box::new(MarkerCodec))
        }
    }

    fn service<D: DeviceSource>(device: D) -> AudioRecorderService<D> {
        AudioRecorderService::new(device, Arc::new(MarkerFactory))
    }

    #[tokio::test]
    async fn new_service_is_idle() {
        let service = service(NeverAcquired);
        assert_eq!(service.status(), RecorderStatus::Idle);
        assert_eq!(service.elapsed_secs(), 0.0);
        assert!(service.artifact().is_none());
        assert!(service.errors().is_empty());
    }

    #[tokio::test]
    async fn pause_without_session_leaves_status_unchanged() {
        let mut service = service(NeverAcquired);
        let err = service.pause(true).await.unwrap_err();
        assert!(matches!(err, RecorderError::NoActiveSession));
        assert_eq!(service.status(), RecorderStatus::Idle);
    }

    #[tokio::test]
    async fn stop_without_session_leaves_status_unchanged() {
        let mut service = service(NeverAcquired);
        let err = service.stop().await.unwrap_err();
        assert!(matches!(err, RecorderError::NoActiveSession));
        assert_eq!(service.status(), RecorderStatus::Idle);
    }

    #[tokio::test]
    async fn device_denial_aborts_to_idle_and_records() {
        let mut service = service(DeniedDevice);
        let err = service.start(None).await.unwrap_err();
        assert!(matches!(err, RecorderError::DeviceAcquisition(_)));
        assert_eq!(service.status(), RecorderStatus::Idle);
        assert_eq!(service.errors().len(), 1);
    }

    #[tokio::test]
    async fn repeated_failure_is_recorded_once() {
        let mut service = service(DeniedDevice);
        let _ = service.start(None).await;
        let _ = service.start(None).await;
        assert_eq!(service.errors().len(), 1);
    }

    #[tokio::test]
    async fn start_while_recording_is_a_caller_error() {
        let mut service = service(OpenDevice);
        service.start(None).await.unwrap();
        let err = service.start(None).await.unwrap_err();
        assert!(matches!(err, RecorderError::InvalidTransition(_)));
    }

    #[tokio::test]
    async fn clear_resets_everything_by_default() {
        let mut service = service(DeniedDevice);
        let _ = service.start(None).await;
        service.clear(ClearOptions::default());

        assert_eq!(service.status(), RecorderStatus::Idle);
        assert!(service.errors().is_empty());
        assert!(service.artifact().is_none());
        assert_eq!(service.elapsed_secs(), 0.0);
        assert_eq!(*service.constraints(), SessionConstraints::default());
    }

    #[tokio::test]
    async fn clear_keep_state_preserves_status() {
        let mut service = service(OpenDevice);
        service.start(None).await.unwrap();
        assert_eq!(service.status(), RecorderStatus::Recording);

        service.clear(ClearOptions {
            keep_recording: false,
            keep_state: true,
        });
        assert_eq!(service.status(), RecorderStatus::Recording);
        assert!(service.errors().is_empty());
    }

    #[tokio::test]
    async fn status_subscription_sees_transitions() {
        let mut service = service(OpenDevice);
        let rx = service.subscribe_status();
        service.start(None).await.unwrap();
        assert_eq!(*rx.borrow(), RecorderStatus::Recording);
    }
}
