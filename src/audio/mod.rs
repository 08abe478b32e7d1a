pub mod capture;
pub mod pcm;
pub mod playback;

pub use capture::{CaptureBackend, CpalMicBackend};
pub use playback::{CpalPlaybackSink, PlaybackQueue, PlaybackSink};
