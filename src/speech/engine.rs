//! Host text-to-speech capability
//!
//! [`SpeechEngine`] is the seam between the crate and whatever actually
//! produces audio (a browser's speech synthesis, a platform TTS service, or
//! the in-process [`SimulatedEngine`](super::simulated::SimulatedEngine)).

use crate::{QasidaError, Result};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A voice offered by the host engine
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voice {
    /// Display name
    pub name: String,
    /// Language tag, e.g. `ar-SA`
    pub lang: String,
    /// Whether the host uses this voice when none is requested
    #[serde(default)]
    pub is_default: bool,
}

impl Voice {
    pub fn new(name: impl Into<String>, lang: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            lang: lang.into(),
            is_default: false,
        }
    }

    /// Mark as the host default voice
    pub fn as_default(mut self) -> Self {
        self.is_default = true;
        self
    }
}

/// A single unit of text submitted to the engine
#[derive(Clone, Debug, PartialEq)]
pub struct Utterance {
    /// Identifies the session this utterance belongs to
    pub id: Uuid,
    pub text: String,
    pub lang: String,
    /// Speaking rate (1.0 = normal)
    pub rate: f32,
    /// Pitch (1.0 = normal)
    pub pitch: f32,
    /// Volume (0.0 to 1.0)
    pub volume: f32,
    /// Explicit voice; `None` lets the host pick its default
    pub voice: Option<Voice>,
}

impl Utterance {
    /// Build an utterance, rejecting parameters hosts refuse to speak
    pub fn new(
        text: impl Into<String>,
        lang: impl Into<String>,
        rate: f32,
        pitch: f32,
        volume: f32,
    ) -> Result<Self> {
        let lang = lang.into();
        if lang.trim().is_empty() {
            return Err(QasidaError::TransientSpeechFailure(
                "Utterance language tag is empty".into(),
            ));
        }
        if !(0.1..=10.0).contains(&rate) {
            return Err(QasidaError::TransientSpeechFailure(format!(
                "Speech rate {} out of range",
                rate
            )));
        }
        if !(0.0..=2.0).contains(&pitch) {
            return Err(QasidaError::TransientSpeechFailure(format!(
                "Speech pitch {} out of range",
                pitch
            )));
        }
        if !(0.0..=1.0).contains(&volume) {
            return Err(QasidaError::TransientSpeechFailure(format!(
                "Speech volume {} out of range",
                volume
            )));
        }

        Ok(Self {
            id: Uuid::new_v4(),
            text: text.into(),
            lang,
            rate,
            pitch,
            volume,
            voice: None,
        })
    }

    /// Silent, empty utterance used to warm up the engine
    pub fn silent_probe(lang: impl Into<String>) -> Result<Self> {
        Self::new("", lang, 1.0, 1.0, 0.0)
    }

    /// Set the voice
    pub fn with_voice(mut self, voice: Voice) -> Self {
        self.voice = Some(voice);
        self
    }

    /// Primary language subtag (`ar` for `ar-SA`)
    pub fn primary_language(&self) -> &str {
        primary_subtag(&self.lang)
    }
}

/// Primary subtag of a BCP-47-like language tag
pub fn primary_subtag(lang: &str) -> &str {
    lang.split(['-', '_']).next().unwrap_or(lang)
}

/// Notification from the engine
///
/// Engines without an event source never emit these; callers then fall back
/// to polling [`SpeechEngine::is_speaking`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EngineEvent {
    /// The utterance began producing audio
    Started(Uuid),
    /// The utterance finished normally
    Ended(Uuid),
    /// The utterance failed
    Error { utterance: Uuid, message: String },
    /// The list of voices changed
    VoicesChanged,
}

/// Host text-to-speech capability
///
/// The engine holds at most one live utterance; `speak` while another is
/// live is the caller's problem, so callers `cancel` first.
pub trait SpeechEngine: Send + Sync {
    /// Whether the host currently exposes speech synthesis at all
    fn is_supported(&self) -> bool {
        true
    }

    /// Enumerate available voices
    fn voices(&self) -> Result<Vec<Voice>>;

    /// Start speaking an utterance
    fn speak(&self, utterance: &Utterance) -> Result<()>;

    /// Drop the live utterance, if any
    fn cancel(&self) -> Result<()>;

    fn pause(&self) -> Result<()>;

    fn resume(&self) -> Result<()>;

    /// Live "currently speaking" flag
    fn is_speaking(&self) -> Result<bool>;

    fn is_paused(&self) -> Result<bool>;

    /// Next pending notification, if the host provides any
    fn poll_event(&self) -> Option<EngineEvent> {
        None
    }
}
