use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

use crate::session::Speaker;

use super::gateway::TranscriptAnalyzer;
use super::types::AnalysisRequest;

const GEMINI_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const DEFAULT_MODEL: &str = "gemini-2.0-flash";

/// Transcript analyzer backed by the Gemini `generateContent` endpoint.
///
/// Thin glue: one prompt in, one JSON payload out. Validation and retry
/// live in the gateway.
pub struct GeminiAnalyzer {
    client: Client,
    api_key: String,
    model: String,
}

impl GeminiAnalyzer {
    pub fn new(api_key: String, model: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            client,
            api_key,
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        })
    }

    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("GEMINI_API_KEY").context("GEMINI_API_KEY is not configured")?;
        let model = std::env::var("GEMINI_MODEL").ok();
        Self::new(api_key, model)
    }

    fn build_prompt(request: &AnalysisRequest) -> String {
        let conversation: String = request
            .transcript
            .entries()
            .iter()
            .map(|entry| {
                let who = match entry.speaker {
                    Speaker::Interviewer => "Interviewer",
                    Speaker::Candidate => "Candidate",
                };
                format!("{}: {}\n", who, entry.text)
            })
            .collect();

        let description: String = request.job.description.chars().take(2000).collect();

        format!(
            "You are an expert interview evaluator. Review this live interview transcript.\n\
             \n\
             Job Title: {title}\n\
             Company: {company}\n\
             Job Description (excerpt): {description}\n\
             \n\
             The interviewer asked {questions} questions.\n\
             \n\
             Transcript:\n\
             {conversation}\n\
             Provide a comprehensive review in this JSON format only, no additional text:\n\
             {{\n\
               \"overallScore\": number (0-100),\n\
               \"communicationScore\": number (0-100),\n\
               \"technicalScore\": number (0-100),\n\
               \"responseQualityScore\": number (0-100),\n\
               \"strengths\": [\"string\", \"string\"],\n\
               \"weaknesses\": [\"string\", \"string\"],\n\
               \"feedback\": \"string (2-3 sentences of constructive feedback)\",\n\
               \"questionBreakdown\": [\n\
                 {{\"question\": \"string\", \"answer\": \"string\", \"feedback\": \"string\", \"score\": number}}\n\
               ],\n\
               \"improvementTip\": \"string (concise, encouraging, 2-3 sentences)\"\n\
             }}\n\
             \n\
             Evaluation criteria:\n\
             - Relevance of answers to the questions and job requirements\n\
             - Depth of understanding demonstrated\n\
             - Clarity and organization of responses\n\
             - Professional knowledge and insights",
            title = request.job.title,
            company = request.job.company,
            description = description,
            questions = request.question_count,
            conversation = conversation,
        )
    }
}

/// Strip markdown fences and surrounding chatter from a model reply so the
/// JSON body parses.
fn clean_model_json(text: &str) -> String {
    let cleaned = text
        .replace("```json", "")
        .replace("```", "")
        .trim()
        .to_string();

    let cleaned = match cleaned.strip_prefix("json") {
        Some(rest) => rest.trim().to_string(),
        None => cleaned,
    };

    // The model sometimes wraps the JSON in prose; keep the outermost
    // object if one is present.
    if let (Some(start), Some(end)) = (cleaned.find('{'), cleaned.rfind('}')) {
        if start < end {
            return cleaned[start..=end].to_string();
        }
    }

    cleaned
}

#[async_trait::async_trait]
impl TranscriptAnalyzer for GeminiAnalyzer {
    async fn analyze(&self, request: &AnalysisRequest) -> Result<serde_json::Value> {
        let url = format!(
            "{}/{}:generateContent?key={}",
            GEMINI_API_URL, self.model, self.api_key
        );

        let body = json!({
            "contents": [{
                "parts": [{ "text": Self::build_prompt(request) }]
            }]
        });

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .context("analysis request failed")?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(anyhow!("analysis API returned {}: {}", status, detail));
        }

        let payload: serde_json::Value = response
            .json()
            .await
            .context("analysis response was not JSON")?;

        let text = payload
            .pointer("/candidates/0/content/parts/0/text")
            .and_then(|t| t.as_str())
            .ok_or_else(|| anyhow!("analysis response contained no text"))?;

        debug!("Raw analysis reply: {} chars", text.len());

        let cleaned = clean_model_json(text);
        serde_json::from_str(&cleaned).context("analysis reply was not valid JSON")
    }
}
