// Tests for the termination and analysis gateway: the three-attempt retry
// bound, validation of required score fields, and persistence staying off
// the critical path.

use anyhow::{anyhow, Result};
use prepvoice::analysis::{
    validate_analysis, AnalysisError, AnalysisGateway, AnalysisRequest, AssessmentStore,
    NewAssessment, TranscriptAnalyzer,
};
use prepvoice::session::{JobContext, Speaker, Transcript};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Analyzer that replays a scripted sequence of outcomes.
struct ScriptedAnalyzer {
    responses: Mutex<VecDeque<Result<Value, String>>>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedAnalyzer {
    fn new(responses: Vec<Result<Value, String>>) -> (Arc<Self>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let analyzer = Arc::new(Self {
            responses: Mutex::new(responses.into()),
            calls: Arc::clone(&calls),
        });
        (analyzer, calls)
    }
}

#[async_trait::async_trait]
impl TranscriptAnalyzer for ScriptedAnalyzer {
    async fn analyze(&self, _request: &AnalysisRequest) -> Result<Value> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.responses.lock().unwrap().pop_front() {
            Some(Ok(value)) => Ok(value),
            Some(Err(message)) => Err(anyhow!(message)),
            None => Err(anyhow!("script exhausted")),
        }
    }
}

struct RecordingStore {
    stored: Arc<Mutex<Vec<NewAssessment>>>,
}

#[async_trait::async_trait]
impl AssessmentStore for RecordingStore {
    async fn create_assessment(&self, assessment: &NewAssessment) -> Result<String> {
        self.stored.lock().unwrap().push(assessment.clone());
        Ok("assessment-1".to_string())
    }
}

struct FailingStore;

#[async_trait::async_trait]
impl AssessmentStore for FailingStore {
    async fn create_assessment(&self, _assessment: &NewAssessment) -> Result<String> {
        Err(anyhow!("database unreachable"))
    }
}

fn valid_analysis() -> Value {
    json!({
        "overallScore": 82,
        "communicationScore": 85,
        "technicalScore": 78,
        "responseQualityScore": 80,
        "strengths": ["clear structure", "good examples"],
        "weaknesses": ["rushed endings"],
        "feedback": "Solid interview with concrete examples throughout.",
        "questionBreakdown": [
            { "question": "Tell me about yourself?", "answer": "…", "feedback": "good", "score": 80 }
        ],
        "improvementTip": "Slow down at the end of each answer."
    })
}

fn request() -> AnalysisRequest {
    let mut transcript = Transcript::new();
    transcript.push_finalized(Speaker::Interviewer, "Tell me about yourself?");
    transcript.push_finalized(Speaker::Candidate, "I build backend services in Rust.");

    AnalysisRequest {
        transcript,
        question_count: 1,
        job: JobContext {
            title: "Backend Engineer".to_string(),
            company: "Acme".to_string(),
            description: "Distributed systems role.".to_string(),
        },
    }
}

fn gateway(
    analyzer: Arc<dyn TranscriptAnalyzer>,
    store: Arc<dyn AssessmentStore>,
) -> AnalysisGateway {
    AnalysisGateway::new(analyzer, store).with_base_delay(Duration::ZERO)
}

#[tokio::test]
async fn test_retries_stop_after_three_attempts() {
    let (analyzer, calls) = ScriptedAnalyzer::new(vec![
        Err("timeout".to_string()),
        Err("timeout".to_string()),
        Err("still down".to_string()),
        // A fourth scripted success must never be reached.
        Ok(valid_analysis()),
    ]);

    let result = gateway(analyzer, Arc::new(FailingStore))
        .run("user-1", request())
        .await;

    assert_eq!(calls.load(Ordering::SeqCst), 3, "never a fourth attempt");

    match result {
        Err(AnalysisError::Exhausted { attempts, last_error }) => {
            assert_eq!(attempts, 3);
            assert!(last_error.contains("still down"));
        }
        other => panic!("expected exhaustion, got {:?}", other.map(|_| ())),
    }
}

#[tokio::test]
async fn test_validation_failure_retries_like_a_transport_failure() {
    let missing_scores = json!({
        "overallScore": 70,
        "feedback": "incomplete payload"
    });

    let (analyzer, calls) =
        ScriptedAnalyzer::new(vec![Ok(missing_scores), Ok(valid_analysis())]);

    let stored = Arc::new(Mutex::new(Vec::new()));
    let store = Arc::new(RecordingStore {
        stored: Arc::clone(&stored),
    });

    let completed = gateway(analyzer, store)
        .run("user-1", request())
        .await
        .expect("second attempt succeeds");

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(completed.analysis.overall_score, 82.0);
    assert_eq!(completed.assessment_id.as_deref(), Some("assessment-1"));
    assert!(completed.persistence_warning.is_none());
}

#[tokio::test]
async fn test_first_attempt_success_makes_one_call() {
    let (analyzer, calls) = ScriptedAnalyzer::new(vec![Ok(valid_analysis())]);

    let stored = Arc::new(Mutex::new(Vec::new()));
    let store = Arc::new(RecordingStore {
        stored: Arc::clone(&stored),
    });

    let completed = gateway(analyzer, store)
        .run("user-1", request())
        .await
        .expect("succeeds");

    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let assessments = stored.lock().unwrap();
    assert_eq!(assessments.len(), 1);
    assert_eq!(assessments[0].user_id, "user-1");
    assert_eq!(assessments[0].score, 82.0);
    assert!(assessments[0].category.contains("Backend Engineer"));
    assert_eq!(
        assessments[0].improvement_tip.as_deref(),
        Some("Slow down at the end of each answer.")
    );

    assert_eq!(
        completed.analysis.improvement_tip.as_deref(),
        Some("Slow down at the end of each answer.")
    );
}

#[tokio::test]
async fn test_persistence_failure_keeps_the_analysis() {
    let (analyzer, _calls) = ScriptedAnalyzer::new(vec![Ok(valid_analysis())]);

    let completed = gateway(analyzer, Arc::new(FailingStore))
        .run("user-1", request())
        .await
        .expect("analysis survives a storage failure");

    assert_eq!(completed.analysis.overall_score, 82.0);
    assert!(completed.assessment_id.is_none());
    assert!(completed
        .persistence_warning
        .as_deref()
        .unwrap_or_default()
        .contains("database unreachable"));
}

#[test]
fn test_validation_names_the_missing_scores() {
    let payload = json!({
        "overallScore": 90,
        "communicationScore": 88,
        "feedback": "missing two scores"
    });

    let error = validate_analysis(&payload).expect_err("must fail");
    let message = error.to_string();
    assert!(message.contains("technicalScore"), "got: {}", message);
    assert!(message.contains("responseQualityScore"), "got: {}", message);
}

#[test]
fn test_validation_rejects_non_numeric_scores() {
    let mut payload = valid_analysis();
    payload["technicalScore"] = json!("very good");

    assert!(validate_analysis(&payload).is_err());
}

#[test]
fn test_validation_accepts_a_complete_payload() {
    let analysis = validate_analysis(&valid_analysis()).expect("valid");

    assert_eq!(analysis.overall_score, 82.0);
    assert_eq!(analysis.strengths.len(), 2);
    assert_eq!(analysis.question_breakdown.len(), 1);
}
