use anyhow::{Context, Result};
use clap::Parser;
use prepvoice::analysis::{
    AnalysisGateway, AnalysisRequest, AssessmentStore, GeminiAnalyzer, NewAssessment,
};
use prepvoice::session::{InterviewSession, JobContext, SessionConfig, Speaker};
use prepvoice::realtime::EnvTokenProvider;
use prepvoice::Config;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(name = "prepvoice", about = "Live voice interview practice session")]
struct Args {
    /// Position title the interview is for
    #[arg(long)]
    job_title: String,

    /// Company name
    #[arg(long)]
    company: String,

    /// Job description text
    #[arg(long, conflicts_with = "description_file")]
    description: Option<String>,

    /// Read the job description from a file
    #[arg(long)]
    description_file: Option<PathBuf>,

    /// User id the assessment is stored under
    #[arg(long, default_value = "local-user")]
    user_id: String,

    /// Configuration file
    #[arg(long, default_value = "config/prepvoice")]
    config: String,
}

/// Writes finished assessments as JSON files. Stands in for the hosted
/// assessment database when running locally.
struct FileAssessmentStore {
    dir: PathBuf,
}

#[async_trait::async_trait]
impl AssessmentStore for FileAssessmentStore {
    async fn create_assessment(&self, assessment: &NewAssessment) -> Result<String> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let id = uuid::Uuid::new_v4().to_string();
        let path = self.dir.join(format!("{}.json", id));
        let payload = serde_json::to_vec_pretty(assessment)?;
        tokio::fs::write(&path, payload).await?;
        Ok(id)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let cfg = Config::load(&args.config)?;

    info!("{} starting", cfg.service.name);

    let description = match (&args.description, &args.description_file) {
        (Some(text), _) => text.clone(),
        (None, Some(path)) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?,
        (None, None) => String::new(),
    };

    let job = JobContext {
        title: args.job_title.clone(),
        company: args.company.clone(),
        description,
    };

    let mut session_config = SessionConfig::new(job.clone());
    session_config.question_limit = cfg.interview.question_limit;
    session_config.time_limit = Duration::from_secs(cfg.interview.time_limit_secs);
    session_config.question_limit_grace =
        Duration::from_secs(cfg.interview.question_limit_grace_secs);

    info!(
        "Interview for {} at {} ({} questions / {}s limit)",
        job.title,
        job.company,
        session_config.question_limit,
        session_config.time_limit.as_secs()
    );

    let session = InterviewSession::connect(session_config, &EnvTokenProvider).await?;

    // Run until a limit fires or the user interrupts.
    tokio::select! {
        _ = session.closed() => {}
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted; ending interview");
        }
    }

    let transcript = session.end().await;
    let snapshot = session.snapshot();

    if let Some(warning) = &snapshot.last_warning {
        warn!("Session warning: {}", warning);
    }

    println!("\n--- Transcript ({} entries) ---", transcript.len());
    for entry in transcript.entries() {
        let who = match entry.speaker {
            Speaker::Interviewer => "Interviewer",
            Speaker::Candidate => "You",
        };
        println!("{}: {}", who, entry.text);
    }

    if transcript.is_empty() {
        info!("Nothing to analyze");
        return Ok(());
    }

    info!("Processing interview results");

    let analyzer = Arc::new(GeminiAnalyzer::from_env()?);
    let store = Arc::new(FileAssessmentStore {
        dir: PathBuf::from("assessments"),
    });
    let gateway = AnalysisGateway::new(analyzer, store);

    let request = AnalysisRequest {
        transcript,
        question_count: snapshot.question_count,
        job,
    };

    let completed = gateway.run(&args.user_id, request).await?;

    println!("\n--- Results ---");
    println!("Overall:          {:.0}", completed.analysis.overall_score);
    println!("Communication:    {:.0}", completed.analysis.communication_score);
    println!("Technical:        {:.0}", completed.analysis.technical_score);
    println!("Response quality: {:.0}", completed.analysis.response_quality_score);
    println!("\n{}", completed.analysis.feedback);

    if let Some(tip) = &completed.analysis.improvement_tip {
        println!("\nTip: {}", tip);
    }

    match (&completed.assessment_id, &completed.persistence_warning) {
        (Some(id), _) => info!("Saved assessment {}", id),
        (None, Some(warning)) => warn!("{}", warning),
        _ => {}
    }

    Ok(())
}
