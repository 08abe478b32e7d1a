use super::config::JobContext;

/// Longest slice of the job description shipped to the provider. Postings
/// routinely run much longer and the tail adds nothing to question quality.
const MAX_DESCRIPTION_CHARS: usize = 2000;

/// Build the interviewer's behavioral instruction block for the session
/// configuration message.
///
/// The rule set keeps the remote model inside the session contract: exactly
/// `question_limit` questions, silence-gated turn taking, no self-answering,
/// and tolerance of candidate barge-in.
pub fn build_instructions(job: &JobContext, question_limit: u32) -> String {
    let description: String = job.description.chars().take(MAX_DESCRIPTION_CHARS).collect();

    format!(
        "You are conducting a live interview for the position of {title} at {company}.\n\
         \n\
         CRITICAL RULES:\n\
         1. Ask EXACTLY {limit} interview questions - count them carefully\n\
         2. After asking a question, STOP TALKING COMPLETELY and WAIT for the candidate to respond\n\
         3. DO NOT continue speaking after asking a question until the candidate provides a complete answer\n\
         4. DO NOT answer your own questions\n\
         5. DO NOT interrupt the candidate while they are speaking\n\
         6. DO NOT react to background noise or silence - wait for actual speech from the candidate\n\
         7. After the candidate finishes answering, wait 2 seconds of silence, then provide brief positive feedback (1-2 sentences), then ask the next question\n\
         8. Keep questions concise and conversational (2-3 sentences max per question)\n\
         9. Only speak when the candidate has finished speaking and there has been silence\n\
         10. Start with: \"Hello! I'm excited to interview you for the {title} position at {company}. Let's begin with the first question.\"\n\
         \n\
         Job description: {description}",
        title = job.title,
        company = job.company,
        limit = question_limit,
        description = description,
    )
}
