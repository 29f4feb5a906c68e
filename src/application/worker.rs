//! Real-time processing worker
//!
//! Runs as its own task, fed by the device's quanta channel. Control
//! commands arrive on a second bounded channel and are acknowledged on a
//! third; both sides communicate by value only, so buffers crossing the
//! boundary are snapshots. Commands are processed one at a time in
//! arrival order and never interleave with an encode call.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use crate::application::encoder::SessionEncoder;
use crate::application::ports::{CodecFactory, Quantum};
use crate::domain::recording::{EncodedBuffer, SessionConstraints};

/// Capacity of the command and acknowledgment channels
pub const CONTROL_CHANNEL_CAPACITY: usize = 8;

/// Commands sent from the control side to the worker
#[derive(Debug)]
pub enum WorkerCommand {
    Start {
        constraints: SessionConstraints,
        carry_over: Option<EncodedBuffer>,
    },
    Pause {
        emit_preview: bool,
    },
    Stop,
}

/// Acknowledgments and failures sent back to the control side.
///
/// An acknowledgment is sent only after all side effects of the command
/// have completed, so the receiver may tear down resources immediately.
#[derive(Debug)]
pub enum WorkerEvent {
    /// START completed; an encoder is live.
    Recording,
    /// PAUSE completed. `carry_over` is a snapshot of the committed
    /// buffer taken before any flush; `preview` is the flushed stream
    /// when a preview was requested.
    Paused {
        carry_over: EncodedBuffer,
        preview: Option<EncodedBuffer>,
    },
    /// STOP completed; `audio` is the finalized stream.
    Stopped { audio: EncodedBuffer },
    /// PAUSE or STOP arrived with no live encoder.
    EncoderMissing,
    /// Encoder construction or encoding failed.
    Failed { message: String },
}

impl WorkerEvent {
    pub fn describe(&self) -> &'static str {
        match self {
            Self::Recording => "RECORDING",
            Self::Paused { .. } => "PAUSED",
            Self::Stopped { .. } => "STOPPED",
            Self::EncoderMissing => "ENCODER_MISSING",
            Self::Failed { .. } => "FAILED",
        }
    }
}

/// Worker-local status mirror, driven by control commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum WorkerStatus {
    #[default]
    NotInitiated,
    Recording,
    Paused,
    Stopped,
}

/// Control side's view of a spawned worker. Dropping it closes the
/// command channel, which terminates the worker task.
pub struct WorkerHandle {
    commands: mpsc::Sender<WorkerCommand>,
    events: mpsc::Receiver<WorkerEvent>,
}

impl WorkerHandle {
    /// Enqueue a command without blocking. Returns false when the worker
    /// is gone or its command backlog is full.
    pub fn send(&self, command: WorkerCommand) -> bool {
        self.commands.try_send(command).is_ok()
    }

    /// Await the next acknowledgment. `None` means the worker terminated.
    pub async fn next_event(&mut self) -> Option<WorkerEvent> {
        self.events.recv().await
    }
}

/// The processing context: owns the encoder and the committed buffer for
/// the current session.
pub struct ProcessingWorker {
    factory: Arc<dyn CodecFactory>,
    commands: mpsc::Receiver<WorkerCommand>,
    events: mpsc::Sender<WorkerEvent>,
    quanta: mpsc::Receiver<Quantum>,
    encoder: Option<SessionEncoder>,
    status: WorkerStatus,
}

impl ProcessingWorker {
    /// Spawn a worker task consuming the given quanta stream.
    pub fn spawn(factory: Arc<dyn CodecFactory>, quanta: mpsc::Receiver<Quantum>) -> WorkerHandle {
        let (command_tx, command_rx) = mpsc::channel(CONTROL_CHANNEL_CAPACITY);
        let (event_tx, event_rx) = mpsc::channel(CONTROL_CHANNEL_CAPACITY);

        let worker = Self {
            factory,
            commands: command_rx,
            events: event_tx,
            quanta,
            encoder: None,
            status: WorkerStatus::NotInitiated,
        };
        tokio::spawn(worker.run());

        WorkerHandle {
            commands: command_tx,
            events: event_rx,
        }
    }

    async fn run(mut self) {
        let mut quanta_open = true;
        loop {
            tokio::select! {
                biased;

                command = self.commands.recv() => {
                    match command {
                        Some(command) => {
                            if self.handle_command(command).await {
                                break;
                            }
                        }
                        // Control side dropped the handle
                        None => break,
                    }
                }

                quantum = self.quanta.recv(), if quanta_open => {
                    match quantum {
                        Some(quantum) => self.process(&quantum),
                        None => quanta_open = false,
                    }
                }
            }
        }
        debug!("processing worker terminated");
    }

    /// Handle one control command. Returns true when the worker should
    /// terminate.
    async fn handle_command(&mut self, command: WorkerCommand) -> bool {
        match command {
            WorkerCommand::Start {
                constraints,
                carry_over,
            } => {
                match self.factory.create(&constraints) {
                    Ok(codec) => {
                        self.encoder = Some(SessionEncoder::new(codec, carry_over));
                        self.status = WorkerStatus::Recording;
                        self.emit(WorkerEvent::Recording).await;
                    }
                    Err(e) => {
                        error!("encoder construction failed: {e}");
                        self.emit(WorkerEvent::Failed {
                            message: e.to_string(),
                        })
                        .await;
                    }
                }
                false
            }

            WorkerCommand::Pause { emit_preview } => {
                self.status = WorkerStatus::Paused;
                match self.encoder.take() {
                    None => self.emit(WorkerEvent::EncoderMissing).await,
                    Some(encoder) => {
                        // The snapshot is taken before any flush so it stays
                        // usable as a seed for a resumed session.
                        let carry_over = encoder.snapshot();
                        if emit_preview {
                            match encoder.finish() {
                                Ok(audio) => {
                                    self.emit(WorkerEvent::Paused {
                                        carry_over,
                                        preview: Some(audio),
                                    })
                                    .await
                                }
                                Err(e) => {
                                    error!("flush for preview failed: {e}");
                                    self.emit(WorkerEvent::Failed {
                                        message: e.to_string(),
                                    })
                                    .await
                                }
                            }
                        } else {
                            self.emit(WorkerEvent::Paused {
                                carry_over,
                                preview: None,
                            })
                            .await
                        }
                    }
                }
                false
            }

            WorkerCommand::Stop => {
                self.status = WorkerStatus::Stopped;
                match self.encoder.take() {
                    None => self.emit(WorkerEvent::EncoderMissing).await,
                    Some(encoder) => match encoder.finish() {
                        Ok(audio) => self.emit(WorkerEvent::Stopped { audio }).await,
                        Err(e) => {
                            error!("final flush failed: {e}");
                            self.emit(WorkerEvent::Failed {
                                message: e.to_string(),
                            })
                            .await
                        }
                    },
                }
                true
            }
        }
    }

    /// Per-quantum processing. Quanta arriving with no live encoder, or
    /// while not recording, are discarded. Failures are reported over the
    /// event channel; nothing propagates into the delivery path.
    fn process(&mut self, quantum: &[f32]) {
        if self.status != WorkerStatus::Recording {
            return;
        }
        if let Some(encoder) = self.encoder.as_mut() {
            if let Err(e) = encoder.encode(quantum) {
                error!("encoding failed, dropping encoder: {e}");
                self.encoder = None;
                let _ = self.events.try_send(WorkerEvent::Failed {
                    message: e.to_string(),
                });
            }
        }
    }

    async fn emit(&mut self, event: WorkerEvent) {
        if self.events.send(event).await.is_err() {
            warn!("control side closed the event channel");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::{BlockCodec, CodecError};
    use crate::domain::recording::AudioMimeType;
    use std::time::Duration;

    /// Emits each block's sample count as a chunk and a marker on flush.
    struct CountingCodec;

    impl BlockCodec for CountingCodec {
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

    struct CountingFactory;

    impl CodecFactory for CountingFactory {
        fn create(
            &self,
            _constraints: &SessionConstraints,
        ) -> Result<Box<dyn BlockCodec>, CodecError> {
            Ok(Box::new(CountingCodec))
        }
    }

    struct FailingFactory;

    impl CodecFactory for FailingFactory {
        fn create(
            &self,
            _constraints: &SessionConstraints,
        ) -> Result<Box<dyn BlockCodec>, CodecError> {
            Err(CodecError::Construction("no encoder".to_string()))
        }
    }

    fn start_command() -> WorkerCommand {
        WorkerCommand::Start {
            constraints: SessionConstraints::default(),
            carry_over: None,
        }
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    #[tokio::test]
    async fn start_acknowledges_recording() {
        let (_tx, rx) = mpsc::channel(8);
        let mut handle = ProcessingWorker::spawn(Arc::new(CountingFactory), rx);

        assert!(handle.send(start_command()));
        assert!(matches!(
            handle.next_event().await,
            Some(WorkerEvent::Recording)
        ));
    }

    #[tokio::test]
    async fn construction_failure_is_reported_not_panicked() {
        let (_tx, rx) = mpsc::channel(8);
        let mut handle = ProcessingWorker::spawn(Arc::new(FailingFactory), rx);

        assert!(handle.send(start_command()));
        match handle.next_event().await {
            Some(WorkerEvent::Failed { message }) => assert!(message.contains("no encoder")),
            other => panic!("expected Failed, got {:?}", other.map(|e| e.describe())),
        }
    }

    #[tokio::test]
    async fn quanta_before_start_are_discarded() {
        let (tx, rx) = mpsc::channel(8);
        let mut handle = ProcessingWorker::spawn(Arc::new(CountingFactory), rx);

        tx.send(vec![0.0; 128]).await.unwrap();
        settle().await;

        handle.send(start_command());
        assert!(matches!(
            handle.next_event().await,
            Some(WorkerEvent::Recording)
        ));

        handle.send(WorkerCommand::Stop);
        match handle.next_event().await {
            Some(WorkerEvent::Stopped { audio }) => {
                // Only the flush marker: the pre-start quantum was dropped
                assert_eq!(audio.chunk_count(), 1);
            }
            other => panic!("expected Stopped, got {:?}", other.map(|e| e.describe())),
        }
    }

    #[tokio::test]
    async fn stop_finalizes_all_quanta() {
        let (tx, rx) = mpsc::channel(8);
        let mut handle = ProcessingWorker::spawn(Arc::new(CountingFactory), rx);

        handle.send(start_command());
        assert!(matches!(
            handle.next_event().await,
            Some(WorkerEvent::Recording)
        ));

        for _ in 0..3 {
            tx.send(vec![0.0; 128]).await.unwrap();
        }
        settle().await;

        handle.send(WorkerCommand::Stop);
        match handle.next_event().await {
            Some(WorkerEvent::Stopped { audio }) => {
                // One chunk per quantum plus the flush marker
                assert_eq!(audio.chunk_count(), 4);
                assert_eq!(*audio.chunks().last().unwrap(), vec![0xFF]);
            }
            other => panic!("expected Stopped, got {:?}", other.map(|e| e.describe())),
        }
    }

    #[tokio::test]
    async fn pause_snapshots_carry_over_without_preview() {
        let (tx, rx) = mpsc::channel(8);
        let mut handle = ProcessingWorker::spawn(Arc::new(CountingFactory), rx);

        handle.send(start_command());
        handle.next_event().await.unwrap();

        tx.send(vec![0.0; 128]).await.unwrap();
        settle().await;

        handle.send(WorkerCommand::Pause {
            emit_preview: false,
        });
        match handle.next_event().await {
            Some(WorkerEvent::Paused {
                carry_over,
                preview,
            }) => {
                assert_eq!(carry_over.chunk_count(), 1);
                assert!(preview.is_none());
            }
            other => panic!("expected Paused, got {:?}", other.map(|e| e.describe())),
        }
    }

    #[tokio::test]
    async fn pause_with_preview_flushes_and_keeps_carry_over_unflushed() {
        let (tx, rx) = mpsc::channel(8);
        let mut handle = ProcessingWorker::spawn(Arc::new(CountingFactory), rx);

        handle.send(start_command());
        handle.next_event().await.unwrap();

        tx.send(vec![0.0; 128]).await.unwrap();
        settle().await;

        handle.send(WorkerCommand::Pause { emit_preview: true });
        match handle.next_event().await {
            Some(WorkerEvent::Paused {
                carry_over,
                preview: Some(preview),
            }) => {
                assert_eq!(carry_over.chunk_count(), 1);
                assert_eq!(preview.chunk_count(), 2);
                assert_eq!(*preview.chunks().last().unwrap(), vec![0xFF]);
            }
            other => panic!("expected Paused+preview, got {:?}", other.map(|e| e.describe())),
        }
    }

    #[tokio::test]
    async fn pause_without_encoder_reports_missing() {
        let (_tx, rx) = mpsc::channel(8);
        let mut handle = ProcessingWorker::spawn(Arc::new(CountingFactory), rx);

        handle.send(WorkerCommand::Pause {
            emit_preview: false,
        });
        assert!(matches!(
            handle.next_event().await,
            Some(WorkerEvent::EncoderMissing)
        ));
    }

    #[tokio::test]
    async fn quanta_after_pause_are_discarded() {
        let (tx, rx) = mpsc::channel(8);
        let mut handle = ProcessingWorker::spawn(Arc::new(CountingFactory), rx);

        handle.send(start_command());
        handle.next_event().await.unwrap();

        handle.send(WorkerCommand::Pause {
            emit_preview: false,
        });
        handle.next_event().await.unwrap();

        // Delivered while paused: must not be encoded anywhere
        tx.send(vec![0.0; 128]).await.unwrap();
        settle().await;

        handle.send(WorkerCommand::Stop);
        assert!(matches!(
            handle.next_event().await,
            Some(WorkerEvent::EncoderMissing)
        ));
    }
}
