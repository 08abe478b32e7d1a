use serde::{Deserialize, Serialize};
use std::time::Duration;

/// The position the candidate is interviewing for. Embedded into the
/// interviewer's behavioral instructions and forwarded to the analyzer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobContext {
    pub title: String,
    pub company: String,
    pub description: String,
}

/// Configuration for one live interview session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Unique session identifier (e.g., "interview-<uuid>")
    pub session_id: String,

    /// Position under discussion
    pub job: JobContext,

    /// The session closes once this many finalized interviewer questions
    /// have been asked. Default: 5.
    pub question_limit: u32,

    /// Wall-clock limit; races against the question limit, whichever fires
    /// first wins. Default: 30 seconds.
    pub time_limit: Duration,

    /// Delay between reaching the question limit and teardown, so the
    /// interviewer's closing sentence can finish playing. Default: 2 seconds.
    pub question_limit_grace: Duration,

    /// Synthesized voice identity
    pub voice: String,

    /// Provider sampling temperature
    pub temperature: f32,
}

impl SessionConfig {
    pub fn new(job: JobContext) -> Self {
        Self {
            session_id: format!("interview-{}", uuid::Uuid::new_v4()),
            job,
            question_limit: 5,
            time_limit: Duration::from_secs(30),
            question_limit_grace: Duration::from_secs(2),
            voice: "cedar".to_string(),
            temperature: 0.8,
        }
    }
}
