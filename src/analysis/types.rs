use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::session::{JobContext, Transcript};

/// Everything the analyze-transcript collaborator receives. Each retry
/// attempt sends the same request.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisRequest {
    pub transcript: Transcript,
    pub question_count: u32,
    pub job: JobContext,
}

/// Review of a single question/answer exchange.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionReview {
    pub question: String,

    #[serde(default)]
    pub answer: String,

    #[serde(default)]
    pub feedback: String,

    #[serde(default)]
    pub score: Option<f64>,
}

/// Structured scoring of a finished interview.
///
/// The four top-level scores are required; an analysis payload missing any
/// of them fails validation and is retried rather than patched up.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterviewAnalysis {
    pub overall_score: f64,
    pub communication_score: f64,
    pub technical_score: f64,
    pub response_quality_score: f64,

    #[serde(default)]
    pub strengths: Vec<String>,

    #[serde(default)]
    pub weaknesses: Vec<String>,

    #[serde(default)]
    pub feedback: String,

    #[serde(default)]
    pub question_breakdown: Vec<QuestionReview>,

    #[serde(default)]
    pub improvement_tip: Option<String>,
}

const REQUIRED_SCORES: [&str; 4] = [
    "overallScore",
    "communicationScore",
    "technicalScore",
    "responseQualityScore",
];

/// Validate a raw analysis payload into the typed result.
///
/// Missing or non-numeric required scores are named in the error so retry
/// logs say what the model left out.
pub fn validate_analysis(raw: &serde_json::Value) -> Result<InterviewAnalysis> {
    let missing: Vec<&str> = REQUIRED_SCORES
        .iter()
        .filter(|field| !raw.get(**field).map(|v| v.is_number()).unwrap_or(false))
        .copied()
        .collect();

    if !missing.is_empty() {
        bail!("analysis is missing required score fields: {}", missing.join(", "));
    }

    Ok(serde_json::from_value(raw.clone())?)
}

/// Record handed to the persistence collaborator.
#[derive(Debug, Clone, Serialize)]
pub struct NewAssessment {
    pub user_id: String,
    pub score: f64,
    pub questions: serde_json::Value,
    pub category: String,
    pub improvement_tip: Option<String>,
}

/// Outcome of the termination gateway: the analysis always comes back to
/// the caller; persistence trouble rides along as a warning.
#[derive(Debug, Clone)]
pub struct CompletedInterview {
    pub analysis: InterviewAnalysis,
    pub assessment_id: Option<String>,
    pub persistence_warning: Option<String>,
}
