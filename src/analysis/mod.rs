//! Termination and analysis gateway
//!
//! Turns a finished interview transcript into a scored assessment: bounded
//! retries against an external analyzer, validation of the returned scores,
//! and best-effort persistence that never blocks the result.

mod gateway;
mod gemini;
mod types;

pub use gateway::{AnalysisError, AnalysisGateway, AssessmentStore, TranscriptAnalyzer};
pub use gemini::GeminiAnalyzer;
pub use types::{
    validate_analysis, AnalysisRequest, CompletedInterview, InterviewAnalysis, NewAssessment,
    QuestionReview,
};
