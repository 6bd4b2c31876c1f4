//! Qasida - read-aloud verse playback for an Arabic poetry collection
//!
//! The crate wraps a host text-to-speech engine behind a failure-tolerant
//! session manager and drives a featured poem's verses through a
//! timer-based playback controller.

pub mod catalog;
pub mod integration;
pub mod playback;
pub mod speech;
pub mod utils;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum QasidaError {
    #[error("Speech capability absent on this host")]
    CapabilityAbsent,

    #[error("Speech failure: {0}")]
    TransientSpeechFailure(String),

    #[error("Speech rate limited after {recent_errors} recent errors")]
    RateLimited { recent_errors: usize },

    #[error("Voice selection failed: {0}")]
    VoiceSelectionFailure(String),

    #[error("Poem has no verses")]
    EmptyPoem,

    #[error("Verse index {index} out of range for poem with {len} verses")]
    VerseOutOfRange { index: usize, len: usize },

    #[error("Poem not found: {0}")]
    PoemNotFound(String),

    #[error("Catalog error: {0}")]
    CatalogError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IOError(String),
}

impl From<std::io::Error> for QasidaError {
    fn from(e: std::io::Error) -> Self {
        QasidaError::IOError(e.to_string())
    }
}

impl From<serde_json::Error> for QasidaError {
    fn from(e: serde_json::Error) -> Self {
        QasidaError::CatalogError(e.to_string())
    }
}

impl From<toml::de::Error> for QasidaError {
    fn from(e: toml::de::Error) -> Self {
        QasidaError::ConfigError(e.to_string())
    }
}

impl QasidaError {
    /// Check if this error is recoverable
    pub fn is_recoverable(&self) -> bool {
        match self {
            // No speech engine on the host, nothing will bring it back
            QasidaError::CapabilityAbsent => false,
            // A single utterance failed, the next one may work
            QasidaError::TransientSpeechFailure(_) => true,
            // Clears once the error counter decays
            QasidaError::RateLimited { .. } => true,
            // Falls back to the default voice
            QasidaError::VoiceSelectionFailure(_) => true,
            QasidaError::EmptyPoem => false,
            QasidaError::VerseOutOfRange { .. } => true,
            QasidaError::PoemNotFound(_) => true,
            QasidaError::CatalogError(_) => false,
            QasidaError::ConfigError(_) => false,
            QasidaError::IOError(_) => false,
        }
    }

    /// Get a user-friendly description
    pub fn user_message(&self) -> String {
        match self {
            QasidaError::CapabilityAbsent => {
                "Text-to-speech is not supported on this device".to_string()
            }
            QasidaError::TransientSpeechFailure(_) => {
                "Could not start text-to-speech".to_string()
            }
            QasidaError::RateLimited { .. } => {
                "Text-to-speech paused after repeated errors".to_string()
            }
            QasidaError::VoiceSelectionFailure(_) => {
                "Using the default voice".to_string()
            }
            QasidaError::EmptyPoem => "This poem has no verses to play".to_string(),
            QasidaError::VerseOutOfRange { .. } => "That verse does not exist".to_string(),
            QasidaError::PoemNotFound(_) => "Poem not found".to_string(),
            QasidaError::CatalogError(_) => "The poem collection could not be read".to_string(),
            QasidaError::ConfigError(_) => {
                "Configuration error. Please check settings.".to_string()
            }
            QasidaError::IOError(_) => "File system error occurred.".to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, QasidaError>;
