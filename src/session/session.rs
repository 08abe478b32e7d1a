use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::audio::{
    pcm, CaptureBackend, CpalMicBackend, CpalPlaybackSink, PlaybackQueue, PlaybackSink,
};
use crate::realtime::{
    close_warning, ClientEvent, EventTransport, RealtimeConnection, ResponseSpec, SessionSettings,
    TokenProvider, TranscriptionSettings, TransportEvent, TurnDetection,
};

use super::config::SessionConfig;
use super::instructions::build_instructions;
use super::reconciler::{EventReconciler, Reconciled, SpeakingFlags};
use super::stats::{ConnectionStatus, SessionSnapshot, SpeakingState};
use super::transcript::Transcript;

/// Delay between the session configuration and the request for the opening
/// interviewer response, giving the provider time to apply the settings.
const RESPONSE_KICKOFF_DELAY: Duration = Duration::from_millis(500);

/// Errors that keep a session from reaching the connected state, plus the
/// microphone case, which is surfaced as a warning while the session runs
/// on without capture.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("realtime credential unavailable: {0}")]
    TokenUnavailable(anyhow::Error),

    #[error("microphone unavailable: {0}")]
    MicrophoneDenied(anyhow::Error),

    #[error("realtime connection failed: {0}")]
    ConnectionFailed(anyhow::Error),
}

/// Why the session left the connected state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CloseReason {
    QuestionLimit,
    TimeLimit,
    UserAction,
    ConnectionLost,
}

fn recover<'a, T>(lock: &'a Mutex<T>) -> std::sync::MutexGuard<'a, T> {
    lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// A live interview session.
///
/// Owns the realtime connection, both audio pipelines and the accumulated
/// transcript. All provider events are consumed by one task; presentation
/// layers observe the session exclusively through [`SessionSnapshot`]s.
pub struct InterviewSession {
    config: SessionConfig,
    status: Arc<Mutex<ConnectionStatus>>,
    recording: Arc<AtomicBool>,
    speaking: SpeakingFlags,
    question_count: Arc<AtomicU32>,
    transcript: Arc<Mutex<Transcript>>,
    final_transcript: Arc<Mutex<Option<Transcript>>>,
    last_warning: Arc<Mutex<Option<String>>>,
    started_at: Instant,
    stop_tx: watch::Sender<bool>,
    done_rx: watch::Receiver<bool>,
    event_task: Mutex<Option<JoinHandle<()>>>,
}

impl InterviewSession {
    /// Full start path: fetch credentials, dial the provider and run on the
    /// machine's default microphone and speaker.
    pub async fn connect(
        mut config: SessionConfig,
        token_provider: &dyn TokenProvider,
    ) -> Result<Self, SessionError> {
        let credentials = token_provider
            .fetch()
            .await
            .map_err(SessionError::TokenUnavailable)?;

        config.time_limit = Duration::from_secs(credentials.session_time_limit_secs);
        config.voice = credentials.voice.clone();

        let connection = RealtimeConnection::connect(&credentials)
            .await
            .map_err(SessionError::ConnectionFailed)?;

        let sink: Arc<dyn PlaybackSink> =
            Arc::new(CpalPlaybackSink::new().map_err(SessionError::ConnectionFailed)?);

        Self::start(
            config,
            Box::new(connection),
            Box::new(CpalMicBackend::new()),
            sink,
        )
        .await
    }

    /// Start a session over an already-established transport.
    ///
    /// This is the seam `connect` goes through and tests drive directly
    /// with scripted transports and channel-backed audio doubles.
    pub async fn start(
        config: SessionConfig,
        mut transport: Box<dyn EventTransport>,
        mut capture: Box<dyn CaptureBackend>,
        sink: Arc<dyn PlaybackSink>,
    ) -> Result<Self, SessionError> {
        let status = Arc::new(Mutex::new(ConnectionStatus::Connecting));
        let recording = Arc::new(AtomicBool::new(false));
        let speaking = SpeakingFlags::default();
        let question_count = Arc::new(AtomicU32::new(0));
        let transcript = Arc::new(Mutex::new(Transcript::new()));
        let last_warning = Arc::new(Mutex::new(None));

        info!("Starting interview session: {}", config.session_id);

        // Session configuration is the first thing on the wire.
        let settings = SessionSettings {
            modalities: vec!["text".to_string(), "audio".to_string()],
            instructions: build_instructions(&config.job, config.question_limit),
            voice: config.voice.clone(),
            input_audio_format: "pcm16".to_string(),
            output_audio_format: "pcm16".to_string(),
            input_audio_transcription: TranscriptionSettings {
                model: "whisper-1".to_string(),
            },
            turn_detection: TurnDetection::default(),
            temperature: config.temperature,
        };

        transport
            .send(ClientEvent::SessionUpdate { session: settings })
            .await
            .map_err(SessionError::ConnectionFailed)?;

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel::<ClientEvent>();

        // Microphone denial is a warning, not a failure: the session runs
        // on, the candidate just is not heard.
        let mut capture_task = None;
        match capture.start().await {
            Ok(frame_rx) => {
                recording.store(true, Ordering::SeqCst);
                capture_task = Some(spawn_capture_forwarder(frame_rx, outbound_tx.clone()));
            }
            Err(e) => {
                let denied = SessionError::MicrophoneDenied(e);
                warn!("{}", denied);
                *recover(&last_warning) = Some(denied.to_string());
            }
        }

        let playback = PlaybackQueue::new(sink, Arc::clone(&speaking.bot));

        let reconciler = EventReconciler::new(
            Arc::clone(&transcript),
            Arc::clone(&question_count),
            config.question_limit,
            speaking.clone(),
            playback.clone(),
            outbound_tx,
            Arc::clone(&last_warning),
        );

        *recover(&status) = ConnectionStatus::Connected;

        let (stop_tx, stop_rx) = watch::channel(false);
        let (done_tx, done_rx) = watch::channel(false);
        let final_transcript = Arc::new(Mutex::new(None));

        let event_loop = EventLoop {
            config: config.clone(),
            transport,
            capture,
            capture_task,
            playback,
            reconciler,
            outbound_rx,
            stop_rx,
            status: Arc::clone(&status),
            recording: Arc::clone(&recording),
            speaking: speaking.clone(),
            transcript: Arc::clone(&transcript),
            final_transcript: Arc::clone(&final_transcript),
            last_warning: Arc::clone(&last_warning),
            done_tx,
        };

        let event_task = tokio::spawn(event_loop.run());

        Ok(Self {
            config,
            status,
            recording,
            speaking,
            question_count,
            transcript,
            final_transcript,
            last_warning,
            started_at: Instant::now(),
            stop_tx,
            done_rx,
            event_task: Mutex::new(Some(event_task)),
        })
    }

    /// End the session and return the finalized transcript.
    ///
    /// Idempotent: repeat calls (including concurrent ones, or calls after
    /// an automatic limit already closed the session) return the same
    /// transcript without touching any resource twice.
    pub async fn end(&self) -> Transcript {
        if let Some(finalized) = recover(&self.final_transcript).clone() {
            return finalized;
        }

        // Wake the event loop; it owns all teardown.
        let _ = self.stop_tx.send(true);

        self.closed().await;

        if let Some(task) = recover(&self.event_task).take() {
            if let Err(e) = task.await {
                error!("Session event task panicked: {}", e);
            }
        }

        recover(&self.final_transcript).clone().unwrap_or_default()
    }

    /// Wait until the session has closed, for any reason.
    pub async fn closed(&self) {
        let mut done = self.done_rx.clone();
        while !*done.borrow() {
            if done.changed().await.is_err() {
                return;
            }
        }
    }

    /// Read-only state for rendering.
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            status: *recover(&self.status),
            recording: self.recording.load(Ordering::SeqCst),
            question_count: self.question_count.load(Ordering::SeqCst),
            elapsed_secs: self.started_at.elapsed().as_secs_f64(),
            speaking: SpeakingState {
                bot: self.speaking.bot.load(Ordering::SeqCst),
                user: self.speaking.user.load(Ordering::SeqCst),
            },
            last_warning: recover(&self.last_warning).clone(),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Copy of the transcript accumulated so far. `end` returns the
    /// authoritative finalized transcript.
    pub fn transcript(&self) -> Transcript {
        recover(&self.transcript).clone()
    }
}

/// Forward captured microphone frames to the outbound channel as
/// append-audio events. Frames arriving after the channel closes are
/// dropped; nothing is buffered locally.
fn spawn_capture_forwarder(
    mut frame_rx: mpsc::Receiver<Vec<f32>>,
    outbound: mpsc::UnboundedSender<ClientEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(frame) = frame_rx.recv().await {
            let audio = pcm::encode_wire_frame(&frame);
            if outbound.send(ClientEvent::AppendAudio { audio }).is_err() {
                debug!("Dropping capture frame: session closed");
                break;
            }
        }
        debug!("Capture forwarding stopped");
    })
}

/// Everything the single event-consuming task owns.
struct EventLoop {
    config: SessionConfig,
    transport: Box<dyn EventTransport>,
    capture: Box<dyn CaptureBackend>,
    capture_task: Option<JoinHandle<()>>,
    playback: PlaybackQueue,
    reconciler: EventReconciler,
    outbound_rx: mpsc::UnboundedReceiver<ClientEvent>,
    stop_rx: watch::Receiver<bool>,
    status: Arc<Mutex<ConnectionStatus>>,
    recording: Arc<AtomicBool>,
    speaking: SpeakingFlags,
    transcript: Arc<Mutex<Transcript>>,
    final_transcript: Arc<Mutex<Option<Transcript>>>,
    last_warning: Arc<Mutex<Option<String>>>,
    done_tx: watch::Sender<bool>,
}

impl EventLoop {
    async fn run(mut self) {
        let reason = self.drive().await;

        match reason {
            CloseReason::QuestionLimit => info!(
                "{} questions completed. Ending interview",
                self.config.question_limit
            ),
            CloseReason::TimeLimit => info!(
                "{} seconds elapsed. Ending interview",
                self.config.time_limit.as_secs()
            ),
            CloseReason::UserAction => info!("Interview ended by user"),
            CloseReason::ConnectionLost => info!("Interview connection closed by provider"),
        }

        self.teardown().await;
    }

    /// Consume events until one of the termination triggers fires. The
    /// wall-clock deadline, the question-limit grace timer and the user
    /// stop signal race; whichever fires first wins and the loop exits,
    /// which disarms the others.
    async fn drive(&mut self) -> CloseReason {
        let deadline = tokio::time::sleep(self.config.time_limit);
        tokio::pin!(deadline);

        let kickoff = tokio::time::sleep(RESPONSE_KICKOFF_DELAY);
        tokio::pin!(kickoff);
        let mut kickoff_pending = true;

        // Armed only once the question limit is reached; the grace delay
        // lets the interviewer's closing sentence finish playing.
        let grace = tokio::time::sleep(Duration::from_secs(3600));
        tokio::pin!(grace);
        let mut grace_armed = false;

        loop {
            tokio::select! {
                _ = &mut deadline => return CloseReason::TimeLimit,

                _ = &mut grace, if grace_armed => return CloseReason::QuestionLimit,

                changed = self.stop_rx.changed() => {
                    if changed.is_err() || *self.stop_rx.borrow() {
                        return CloseReason::UserAction;
                    }
                }

                _ = &mut kickoff, if kickoff_pending => {
                    kickoff_pending = false;
                    self.reconciler.mark_response_requested();
                    if let Err(e) = self
                        .transport
                        .send(ClientEvent::CreateResponse { response: ResponseSpec::default() })
                        .await
                    {
                        warn!("Failed to request opening response: {}", e);
                    }
                }

                outbound = self.outbound_rx.recv() => {
                    if let Some(event) = outbound {
                        if let Err(e) = self.transport.send(event).await {
                            debug!("Dropping outbound event: {}", e);
                        }
                    }
                }

                inbound = self.transport.next_event() => match inbound {
                    Some(TransportEvent::Event(event)) => {
                        if self.reconciler.apply(event) == Reconciled::QuestionLimitReached
                            && !grace_armed
                        {
                            grace_armed = true;
                            grace.as_mut().reset(
                                tokio::time::Instant::now() + self.config.question_limit_grace,
                            );
                        }
                    }
                    Some(TransportEvent::Closed { code, reason }) => {
                        if let Some(warning) = close_warning(code, &reason) {
                            warn!("{}", warning);
                            *recover(&self.last_warning) = Some(warning);
                        }
                        return CloseReason::ConnectionLost;
                    }
                    None => return CloseReason::ConnectionLost,
                },
            }
        }
    }

    /// Release every session resource exactly once. Each step tolerates
    /// "already stopped", so teardown is safe however the loop exited.
    async fn teardown(mut self) {
        *recover(&self.status) = ConnectionStatus::Closing;

        if let Err(e) = self.capture.stop().await {
            warn!("Capture stop failed: {}", e);
        }
        self.recording.store(false, Ordering::SeqCst);

        if let Some(task) = self.capture_task.take() {
            if let Err(e) = task.await {
                warn!("Capture forwarding task panicked: {}", e);
            }
        }

        self.playback.shutdown().await;

        if let Err(e) = self.transport.close().await {
            debug!("Transport close failed: {}", e);
        }

        self.speaking.bot.store(false, Ordering::SeqCst);
        self.speaking.user.store(false, Ordering::SeqCst);

        *recover(&self.final_transcript) = Some(recover(&self.transcript).clone());
        *recover(&self.status) = ConnectionStatus::Disconnected;

        let _ = self.done_tx.send(true);

        info!("Interview session closed");
    }
}
