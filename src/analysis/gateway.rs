use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

use super::types::{
    validate_analysis, AnalysisRequest, CompletedInterview, InterviewAnalysis, NewAssessment,
};

/// Scores a finished transcript. Implementations call out to an LLM; tests
/// script the responses.
#[async_trait::async_trait]
pub trait TranscriptAnalyzer: Send + Sync {
    /// Produce a raw analysis payload for the transcript. The gateway owns
    /// validation and retries; implementations just make one attempt.
    async fn analyze(&self, request: &AnalysisRequest) -> Result<serde_json::Value>;
}

/// Persists finished assessments. Not on the critical path for returning
/// a result to the caller.
#[async_trait::async_trait]
pub trait AssessmentStore: Send + Sync {
    /// Store one assessment, returning the stored record id.
    async fn create_assessment(&self, assessment: &NewAssessment) -> Result<String>;
}

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("analysis failed after {attempts} attempts: {last_error}")]
    Exhausted { attempts: u32, last_error: String },
}

/// Termination gateway: turns a finished session into a scored assessment.
///
/// Analysis gets up to `max_attempts` tries with linear backoff; transport
/// failures and validation failures retry the same way. Exhaustion is
/// terminal: no synthetic fallback analysis is ever substituted, and the
/// caller still holds the raw transcript. A successful analysis is returned
/// even when persisting it fails.
pub struct AnalysisGateway {
    analyzer: Arc<dyn TranscriptAnalyzer>,
    store: Arc<dyn AssessmentStore>,
    max_attempts: u32,
    base_delay: Duration,
}

impl AnalysisGateway {
    pub fn new(analyzer: Arc<dyn TranscriptAnalyzer>, store: Arc<dyn AssessmentStore>) -> Self {
        Self {
            analyzer,
            store,
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }

    /// Override the linear backoff base delay (tests use zero).
    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    pub async fn run(
        &self,
        user_id: &str,
        request: AnalysisRequest,
    ) -> Result<CompletedInterview, AnalysisError> {
        let analysis = self.analyze_with_retry(&request).await?;

        let assessment = NewAssessment {
            user_id: user_id.to_string(),
            score: analysis.overall_score,
            questions: serde_json::to_value(&analysis).unwrap_or(serde_json::Value::Null),
            category: format!(
                "Live Interview: {} at {}",
                request.job.title, request.job.company
            ),
            improvement_tip: analysis.improvement_tip.clone(),
        };

        match self.store.create_assessment(&assessment).await {
            Ok(id) => {
                info!("Assessment stored: {}", id);
                Ok(CompletedInterview {
                    analysis,
                    assessment_id: Some(id),
                    persistence_warning: None,
                })
            }
            Err(e) => {
                // The computed analysis is not lost on a storage failure;
                // the caller gets it with the warning attached.
                let warning = format!("Failed to store assessment: {}", e);
                warn!("{}", warning);
                Ok(CompletedInterview {
                    analysis,
                    assessment_id: None,
                    persistence_warning: Some(warning),
                })
            }
        }
    }

    async fn analyze_with_retry(
        &self,
        request: &AnalysisRequest,
    ) -> Result<InterviewAnalysis, AnalysisError> {
        let mut last_error = String::new();

        for attempt in 1..=self.max_attempts {
            match self.analyzer.analyze(request).await {
                Ok(raw) => match validate_analysis(&raw) {
                    Ok(analysis) => {
                        info!("Transcript analysis succeeded on attempt {}", attempt);
                        return Ok(analysis);
                    }
                    Err(e) => {
                        warn!("Analysis attempt {} failed validation: {}", attempt, e);
                        last_error = e.to_string();
                    }
                },
                Err(e) => {
                    warn!("Analysis attempt {} failed: {}", attempt, e);
                    last_error = e.to_string();
                }
            }

            if attempt < self.max_attempts {
                tokio::time::sleep(self.base_delay * attempt).await;
            }
        }

        Err(AnalysisError::Exhausted {
            attempts: self.max_attempts,
            last_error,
        })
    }
}
