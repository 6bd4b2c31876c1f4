//! Playback state, configuration and events
//!
//! The controller owns the mutable state; callers observe it through
//! [`PlaybackSnapshot`] or by listening to [`PlaybackEvent`]s.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for verse playback
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// How long each verse stays on screen
    pub verse_duration_ms: u64,

    /// Progress indicator update period
    pub progress_interval_ms: u64,

    /// Delay before checking that a freshly started session is audible
    pub speech_check_delay_ms: u64,

    /// Delay after mount before availability is checked again
    pub availability_recheck_delay_ms: u64,

    /// Capacity of the event queue
    pub event_queue_size: usize,

    /// Start with speech muted
    pub start_muted: bool,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            verse_duration_ms: 3_000,
            progress_interval_ms: 30,
            speech_check_delay_ms: 500,
            availability_recheck_delay_ms: 2_000,
            event_queue_size: 64,
            start_muted: false,
        }
    }
}

impl PlaybackConfig {
    /// Set the verse duration
    pub fn with_verse_duration(mut self, duration: Duration) -> Self {
        self.verse_duration_ms = duration.as_millis() as u64;
        self
    }

    /// Set the progress tick period
    pub fn with_progress_interval(mut self, interval: Duration) -> Self {
        self.progress_interval_ms = interval.as_millis() as u64;
        self
    }

    /// Start muted (visual-only until unmuted)
    pub fn muted(mut self) -> Self {
        self.start_muted = true;
        self
    }

    pub fn verse_duration(&self) -> Duration {
        Duration::from_millis(self.verse_duration_ms)
    }

    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms)
    }

    pub fn speech_check_delay(&self) -> Duration {
        Duration::from_millis(self.speech_check_delay_ms)
    }

    pub fn availability_recheck_delay(&self) -> Duration {
        Duration::from_millis(self.availability_recheck_delay_ms)
    }

    /// Progress ticks per verse (100 with the defaults)
    pub fn progress_steps(&self) -> u32 {
        let steps = self.verse_duration_ms / self.progress_interval_ms.max(1);
        steps.clamp(1, u32::MAX as u64) as u32
    }
}

/// Transport state of the featured poem
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TransportState {
    #[default]
    Stopped,
    Playing,
}

impl TransportState {
    pub fn is_playing(&self) -> bool {
        matches!(self, TransportState::Playing)
    }

    pub fn is_stopped(&self) -> bool {
        matches!(self, TransportState::Stopped)
    }
}

impl std::fmt::Display for TransportState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportState::Stopped => write!(f, "Stopped"),
            TransportState::Playing => write!(f, "Playing"),
        }
    }
}

/// Timers owned by the playback controller
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum PlaybackTimer {
    /// Fast progress indicator tick
    ProgressTick,
    /// One-shot move to the next verse
    VerseAdvance,
    /// Checks that a session actually became audible
    SpeechCheck,
    /// Re-reads availability once after mount
    AvailabilityRecheck,
}

/// What started the session being checked
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum SpeechOrigin {
    Playback,
    ReadAloud,
}

/// Result of the read-aloud toggle
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReadAloudOutcome {
    /// Reading the current verse
    Started,
    /// Reading stopped and speech muted
    Stopped,
    /// Speech is unavailable; nothing changed except the status message
    Unavailable,
}

/// Notifications for the UI layer
#[derive(Clone, Debug, PartialEq)]
pub enum PlaybackEvent {
    /// Playback started at this verse
    Started { verse: usize },
    /// The visible verse changed
    VerseChanged { verse: usize },
    /// Playback stopped (pause, stop, manual selection)
    Stopped,
    /// A full pass over the verses completed
    Finished,
    MuteChanged(bool),
    ReadAloudChanged(bool),
    /// Whether speech may be used changed
    SpeechAvailabilityChanged(bool),
    /// Advisory message for the user
    Status(String),
}

/// Immutable view of the controller's observable state
#[derive(Clone, Debug, PartialEq)]
pub struct PlaybackSnapshot {
    pub state: TransportState,
    pub current_verse: usize,
    pub verse_count: usize,
    pub progress: f32,
    pub is_muted: bool,
    pub is_reading_aloud: bool,
    pub speech_supported: bool,
    pub is_visual_only: bool,
    pub last_error_message: Option<String>,
}

impl PlaybackSnapshot {
    pub fn is_playing(&self) -> bool {
        self.state.is_playing()
    }

    /// Progress as a percentage for display
    pub fn progress_percent(&self) -> f32 {
        self.progress * 100.0
    }
}
