//! Verse-by-verse playback of the featured poem

pub mod controller;
pub mod state;

pub use controller::{VersePlaybackController, SPEECH_FAILED_TO_START, VISUAL_ONLY_NOTICE};
pub use state::{
    PlaybackConfig, PlaybackEvent, PlaybackSnapshot, ReadAloudOutcome, TransportState,
};
