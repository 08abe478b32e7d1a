pub mod analysis;
pub mod audio;
pub mod config;
pub mod realtime;
pub mod session;

pub use analysis::{
    AnalysisError, AnalysisGateway, AnalysisRequest, AssessmentStore, CompletedInterview,
    GeminiAnalyzer, InterviewAnalysis, NewAssessment, TranscriptAnalyzer,
};
pub use audio::{CaptureBackend, CpalMicBackend, CpalPlaybackSink, PlaybackQueue, PlaybackSink};
pub use config::Config;
pub use realtime::{
    ClientEvent, EnvTokenProvider, EventTransport, RealtimeConnection, RealtimeCredentials,
    ServerEvent, TokenProvider, TransportEvent,
};
pub use session::{
    ConnectionStatus, InterviewSession, JobContext, SessionConfig, SessionError, SessionSnapshot,
    Speaker, SpeakingState, Transcript, TranscriptEntry,
};
