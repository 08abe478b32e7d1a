use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who produced an utterance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    Interviewer,
    Candidate,
}

/// One finalized utterance. Interim/delta fragments never become entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub speaker: Speaker,

    /// Finalized natural-language content, trimmed
    pub text: String,

    /// When the utterance was finalized
    pub timestamp: DateTime<Utc>,
}

/// Append-only conversation transcript.
///
/// Entries are appended in event-arrival order. The provider sometimes
/// finalizes the same utterance twice, so an entry identical to the
/// immediately preceding entry from the same speaker is rejected.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Transcript {
    entries: Vec<TranscriptEntry>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a finalized utterance. Returns false when the text is empty
    /// after trimming or duplicates the previous entry from this speaker.
    pub fn push_finalized(&mut self, speaker: Speaker, text: &str) -> bool {
        let text = text.trim();
        if text.is_empty() {
            return false;
        }

        if let Some(last) = self.entries.last() {
            if last.speaker == speaker && last.text == text {
                return false;
            }
        }

        self.entries.push(TranscriptEntry {
            speaker,
            text: text.to_string(),
            timestamp: Utc::now(),
        });

        true
    }

    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn last(&self) -> Option<&TranscriptEntry> {
        self.entries.last()
    }
}

/// Question heuristic used for the termination policy: an utterance counts
/// as a question when it contains a question mark. The question limit is
/// calibrated against this rule, so it stays deliberately simple.
pub fn is_question(text: &str) -> bool {
    text.contains('?')
}
