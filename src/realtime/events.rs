use serde::{Deserialize, Serialize};

/// Inbound event stream from the realtime provider, one variant per wire
/// event kind. Unrecognized kinds land in `Unknown` and are ignored.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    /// Chunk of synthesized speech (base64 PCM16)
    #[serde(rename = "response.audio.delta")]
    AudioDelta { delta: Option<String> },

    /// Partial interviewer transcript text
    #[serde(rename = "response.audio_transcript.delta")]
    BotTranscriptDelta { delta: Option<String> },

    /// Finalized interviewer utterance
    #[serde(rename = "response.audio_transcript.done")]
    BotTranscriptDone { transcript: Option<String> },

    /// Finalized candidate utterance from server-side transcription
    #[serde(rename = "conversation.item.input_audio_transcription.completed")]
    UserTranscriptionCompleted { transcript: Option<String> },

    /// Server-side VAD detected candidate speech starting
    #[serde(rename = "input_audio_buffer.speech_started")]
    SpeechStarted,

    /// Server-side VAD detected candidate speech stopping
    #[serde(rename = "input_audio_buffer.speech_stopped")]
    SpeechStopped,

    /// The active response was cancelled (barge-in acknowledged)
    #[serde(rename = "response.cancelled")]
    ResponseCancelled,

    /// The active response completed naturally
    #[serde(rename = "response.done")]
    ResponseDone,

    #[serde(rename = "response.content_part.done")]
    ContentPartDone,

    #[serde(rename = "error")]
    Error { error: Option<serde_json::Value> },

    #[serde(other)]
    Unknown,
}

/// Outbound messages to the realtime provider.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    #[serde(rename = "session.update")]
    SessionUpdate { session: SessionSettings },

    #[serde(rename = "input_audio_buffer.append")]
    AppendAudio { audio: String },

    #[serde(rename = "response.cancel")]
    CancelResponse,

    #[serde(rename = "response.create")]
    CreateResponse { response: ResponseSpec },
}

/// Session configuration transmitted right after the connection opens.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSettings {
    pub modalities: Vec<String>,
    pub instructions: String,
    pub voice: String,
    pub input_audio_format: String,
    pub output_audio_format: String,
    pub input_audio_transcription: TranscriptionSettings,
    pub turn_detection: TurnDetection,
    pub temperature: f32,
}

#[derive(Debug, Clone, Serialize)]
pub struct TranscriptionSettings {
    pub model: String,
}

/// Server-side VAD parameters. Turn taking is delegated entirely to the
/// provider; no local gating happens on captured audio.
#[derive(Debug, Clone, Serialize)]
pub struct TurnDetection {
    #[serde(rename = "type")]
    pub kind: String,
    pub threshold: f32,
    pub prefix_padding_ms: u32,
    pub silence_duration_ms: u32,
}

impl Default for TurnDetection {
    fn default() -> Self {
        Self {
            kind: "server_vad".to_string(),
            threshold: 0.5,
            prefix_padding_ms: 300,
            silence_duration_ms: 500,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ResponseSpec {
    pub modalities: Vec<String>,
}

impl Default for ResponseSpec {
    fn default() -> Self {
        Self {
            modalities: vec!["text".to_string(), "audio".to_string()],
        }
    }
}

/// Error payload attached to a provider `error` event. The provider is not
/// consistent about the shape, so extraction handles a bare string, an
/// object with a message, an object with only a code or type, and arbitrary
/// non-empty objects.
#[derive(Debug, Clone)]
pub struct ProviderError(pub serde_json::Value);

impl ProviderError {
    /// A cancel was sent when no response was active. This is an expected
    /// race after barge-in, not an error worth surfacing.
    pub fn is_benign_cancel_race(&self) -> bool {
        self.0
            .get("code")
            .and_then(|c| c.as_str())
            .map(|c| c == "response_cancel_not_active")
            .unwrap_or(false)
    }

    /// Extract a human-readable message, or `None` when the payload is
    /// empty and should be dropped as noise.
    pub fn message(&self) -> Option<String> {
        match &self.0 {
            serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
            serde_json::Value::Object(map) if !map.is_empty() => {
                if let Some(message) = map.get("message").and_then(|m| m.as_str()) {
                    Some(message.to_string())
                } else if let Some(code) = map.get("code").and_then(|c| c.as_str()) {
                    Some(format!("Error code: {}", code))
                } else if let Some(kind) = map.get("type").and_then(|t| t.as_str()) {
                    Some(format!("Error type: {}", kind))
                } else {
                    Some(self.0.to_string())
                }
            }
            _ => None,
        }
    }
}

/// Classify a close frame. Normal (1000) and going-away (1001) closures are
/// expected and silent; other codes warn unless the reason is empty noise.
pub fn close_warning(code: u16, reason: &str) -> Option<String> {
    if code == 1000 || code == 1001 {
        return None;
    }
    if reason.is_empty() || reason == "Unknown reason" {
        return None;
    }
    Some(format!("Connection closed: {} (code {})", reason, code))
}
