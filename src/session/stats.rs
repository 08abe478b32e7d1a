use serde::Serialize;

/// Where the session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
    Closing,
}

/// Transient turn-taking signal, recomputed from provider events. Only used
/// to decide when barge-in is permitted and for rendering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SpeakingState {
    pub bot: bool,
    pub user: bool,
}

/// Read-only view of a live session for presentation layers.
///
/// The UI renders snapshots; it never mutates session internals.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    /// Connection lifecycle state
    pub status: ConnectionStatus,

    /// Whether microphone capture is running
    pub recording: bool,

    /// Finalized interviewer questions so far
    pub question_count: u32,

    /// Seconds since the session started
    pub elapsed_secs: f64,

    /// Current turn-taking state
    pub speaking: SpeakingState,

    /// Most recent non-fatal warning, if any
    pub last_warning: Option<String>,
}
