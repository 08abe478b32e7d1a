use anyhow::Result;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub interview: InterviewConfig,
}

#[derive(Debug, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
}

/// Session policy defaults; per-session credentials and time limits can
/// still be overridden by the token collaborator.
#[derive(Debug, Deserialize)]
pub struct InterviewConfig {
    pub question_limit: u32,
    pub time_limit_secs: u64,
    pub question_limit_grace_secs: u64,
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}
