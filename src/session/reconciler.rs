use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::audio::{pcm, PlaybackQueue};
use crate::realtime::{ClientEvent, ProviderError, ServerEvent};

use super::transcript::{is_question, Speaker, Transcript};

/// Turn-taking flags shared between the reconciler, the playback queue and
/// session snapshots. Cheap to clone; clones observe the same flags.
#[derive(Debug, Clone, Default)]
pub struct SpeakingFlags {
    pub bot: Arc<AtomicBool>,
    pub user: Arc<AtomicBool>,
}

/// What the event loop should do after an event has been applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciled {
    Continue,
    QuestionLimitReached,
}

/// Single consumer of the provider's event stream.
///
/// Applies one effect per event kind, in arrival order, on one task. The
/// barge-in rule is the only effect that touches playback, the connection
/// and the transcript buffer together; `apply` performs it without yielding
/// so no chunk of already-cancelled speech slips through. Outbound commands
/// go through an unbounded channel for the same reason.
pub struct EventReconciler {
    transcript: Arc<Mutex<Transcript>>,
    question_count: Arc<AtomicU32>,
    question_limit: u32,
    speaking: SpeakingFlags,
    playback: PlaybackQueue,
    outbound: mpsc::UnboundedSender<ClientEvent>,
    last_warning: Arc<Mutex<Option<String>>>,

    /// In-progress interviewer utterance, flushed on finalization
    bot_buffer: String,

    /// Whether an interviewer response is currently in flight
    active_response: bool,
}

fn recover<'a, T>(lock: &'a Mutex<T>) -> std::sync::MutexGuard<'a, T> {
    lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl EventReconciler {
    pub fn new(
        transcript: Arc<Mutex<Transcript>>,
        question_count: Arc<AtomicU32>,
        question_limit: u32,
        speaking: SpeakingFlags,
        playback: PlaybackQueue,
        outbound: mpsc::UnboundedSender<ClientEvent>,
        last_warning: Arc<Mutex<Option<String>>>,
    ) -> Self {
        Self {
            transcript,
            question_count,
            question_limit,
            speaking,
            playback,
            outbound,
            last_warning,
            bot_buffer: String::new(),
            active_response: false,
        }
    }

    /// Record that a response was explicitly requested, so a barge-in
    /// before the first delta still has something to cancel.
    pub fn mark_response_requested(&mut self) {
        self.active_response = true;
    }

    pub fn has_active_response(&self) -> bool {
        self.active_response
    }

    /// Apply one provider event to the session state.
    pub fn apply(&mut self, event: ServerEvent) -> Reconciled {
        match event {
            ServerEvent::AudioDelta { delta } => {
                if let Some(delta) = delta {
                    self.active_response = true;
                    match pcm::decode_wire_frame(&delta) {
                        Ok(samples) => self.playback.enqueue(samples),
                        Err(e) => warn!("Dropping undecodable audio delta: {}", e),
                    }
                }
                Reconciled::Continue
            }

            ServerEvent::BotTranscriptDelta { delta } => {
                if let Some(delta) = delta {
                    self.active_response = true;
                    self.bot_buffer.push_str(&delta);
                }
                Reconciled::Continue
            }

            ServerEvent::BotTranscriptDone { transcript } => self.finalize_bot_utterance(transcript),

            ServerEvent::UserTranscriptionCompleted { transcript } => {
                if let Some(text) = transcript {
                    if !text.trim().is_empty() {
                        recover(&self.transcript).push_finalized(Speaker::Candidate, &text);
                        self.speaking.user.store(false, Ordering::SeqCst);
                    }
                }
                Reconciled::Continue
            }

            ServerEvent::SpeechStarted => {
                self.on_speech_started();
                Reconciled::Continue
            }

            ServerEvent::SpeechStopped => {
                self.speaking.user.store(false, Ordering::SeqCst);
                Reconciled::Continue
            }

            ServerEvent::ResponseCancelled => {
                debug!("Provider acknowledged response cancellation");
                self.active_response = false;
                self.speaking.bot.store(false, Ordering::SeqCst);
                self.bot_buffer.clear();
                Reconciled::Continue
            }

            ServerEvent::ResponseDone | ServerEvent::ContentPartDone => {
                self.active_response = false;
                self.speaking.bot.store(false, Ordering::SeqCst);
                Reconciled::Continue
            }

            ServerEvent::Error { error } => {
                self.on_provider_error(error);
                Reconciled::Continue
            }

            ServerEvent::Unknown => Reconciled::Continue,
        }
    }

    /// Flush the in-progress interviewer utterance as a transcript entry.
    ///
    /// The question count moves on every finalized utterance containing a
    /// question mark, even when de-duplication rejects the entry itself.
    fn finalize_bot_utterance(&mut self, transcript: Option<String>) -> Reconciled {
        let text = transcript
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| std::mem::take(&mut self.bot_buffer));
        self.bot_buffer.clear();

        let text = text.trim();
        if text.is_empty() {
            return Reconciled::Continue;
        }

        let mut count = self.question_count.load(Ordering::SeqCst);
        if is_question(text) {
            count = self.question_count.fetch_add(1, Ordering::SeqCst) + 1;
            info!("Question {}/{}", count, self.question_limit);
        }

        recover(&self.transcript).push_finalized(Speaker::Interviewer, text);

        if count >= self.question_limit {
            Reconciled::QuestionLimitReached
        } else {
            Reconciled::Continue
        }
    }

    /// Server-side VAD heard the candidate start speaking.
    ///
    /// When the interviewer is mid-speech with a response in flight, this is
    /// a barge-in: stop playback, drop everything queued, discard the
    /// partial utterance buffer and tell the provider to cancel. All of it
    /// happens before the next event is consumed.
    fn on_speech_started(&mut self) {
        let bot_speaking = self.speaking.bot.load(Ordering::SeqCst);

        if bot_speaking && self.active_response {
            info!("Candidate barge-in: cancelling interviewer response");

            self.playback.interrupt();
            self.bot_buffer.clear();
            self.active_response = false;

            if self.outbound.send(ClientEvent::CancelResponse).is_err() {
                debug!("Cancel not sent: outbound channel closed");
            }
        }

        self.speaking.user.store(true, Ordering::SeqCst);
    }

    fn on_provider_error(&mut self, error: Option<serde_json::Value>) {
        let error = ProviderError(error.unwrap_or(serde_json::Value::Null));

        // Expected race: our cancel crossed the response finishing on its
        // own. Either outcome ends the cancellation attempt.
        if error.is_benign_cancel_race() {
            debug!("No active response to cancel");
            self.active_response = false;
            return;
        }

        match error.message() {
            Some(message) => {
                warn!("Provider error: {}", message);
                *recover(&self.last_warning) = Some(message);
            }
            None => {
                debug!("Ignoring empty provider error payload");
            }
        }
    }
}
