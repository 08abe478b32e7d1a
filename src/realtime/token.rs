use anyhow::{Context, Result};

/// Connection credentials and per-session settings issued by the token
/// collaborator.
#[derive(Debug, Clone)]
pub struct RealtimeCredentials {
    pub api_key: String,
    pub model: String,
    pub session_time_limit_secs: u64,
    pub voice: String,
}

/// Credential issuing collaborator. A failure here is fatal to session
/// start; there is no retry inside the session controller.
#[async_trait::async_trait]
pub trait TokenProvider: Send + Sync {
    async fn fetch(&self) -> Result<RealtimeCredentials>;
}

/// Token provider backed by process environment variables, with the same
/// defaults the hosted token endpoint applies.
pub struct EnvTokenProvider;

#[async_trait::async_trait]
impl TokenProvider for EnvTokenProvider {
    async fn fetch(&self) -> Result<RealtimeCredentials> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .context("OPENAI_API_KEY is not configured")?;

        let model = std::env::var("OPENAI_REALTIME_MODEL")
            .unwrap_or_else(|_| "gpt-realtime-mini".to_string());

        let session_time_limit_secs = std::env::var("INTERVIEW_TIME_LIMIT_SECONDS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(30);

        let voice = std::env::var("OPENAI_REALTIME_VOICE")
            .unwrap_or_else(|_| "cedar".to_string());

        Ok(RealtimeCredentials {
            api_key,
            model,
            session_time_limit_secs,
            voice,
        })
    }
}
