//! Live interview session management
//!
//! This module provides the `InterviewSession` abstraction that manages:
//! - The realtime provider connection and its event stream
//! - Microphone streaming and synthesized speech playback
//! - Transcript reconciliation with barge-in interruption
//! - Question-count and wall-clock termination policies
//! - Read-only snapshots for presentation layers

mod config;
mod instructions;
mod reconciler;
mod session;
mod stats;
mod transcript;

pub use config::{JobContext, SessionConfig};
pub use instructions::build_instructions;
pub use reconciler::{EventReconciler, Reconciled, SpeakingFlags};
pub use session::{InterviewSession, SessionError};
pub use stats::{ConnectionStatus, SessionSnapshot, SpeakingState};
pub use transcript::{is_question, Speaker, Transcript, TranscriptEntry};
