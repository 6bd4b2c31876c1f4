//! Configuration for the featured poem view
//!
//! Groups the speech, rate-limit and playback settings and loads them from a
//! TOML file. Every section and field is optional; omitted values keep their
//! defaults.

use crate::playback::state::PlaybackConfig;
use crate::speech::availability::AvailabilityConfig;
use crate::speech::session::SpeechConfig;
use crate::{QasidaError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Configuration for the complete view
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QasidaConfig {
    /// Utterance parameters and deferred start
    pub speech: SpeechConfig,

    /// Rate limiter thresholds
    pub availability: AvailabilityConfig,

    /// Verse timing
    pub playback: PlaybackConfig,
}

impl QasidaConfig {
    /// Load and validate a TOML configuration file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            QasidaError::ConfigError(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: QasidaConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Set the speech configuration
    pub fn with_speech(mut self, speech: SpeechConfig) -> Self {
        self.speech = speech;
        self
    }

    /// Set the rate limiter thresholds
    pub fn with_availability(mut self, availability: AvailabilityConfig) -> Self {
        self.availability = availability;
        self
    }

    /// Set the playback timing
    pub fn with_playback(mut self, playback: PlaybackConfig) -> Self {
        self.playback = playback;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        let speech = &self.speech;
        if speech.language.trim().is_empty() {
            return Err(QasidaError::ConfigError(
                "speech.language must not be empty".to_string(),
            ));
        }
        if !(0.1..=10.0).contains(&speech.rate) {
            return Err(QasidaError::ConfigError(format!(
                "speech.rate {} must be between 0.1 and 10",
                speech.rate
            )));
        }
        if !(0.0..=2.0).contains(&speech.pitch) {
            return Err(QasidaError::ConfigError(format!(
                "speech.pitch {} must be between 0 and 2",
                speech.pitch
            )));
        }
        if !(0.0..=1.0).contains(&speech.volume) {
            return Err(QasidaError::ConfigError(format!(
                "speech.volume {} must be between 0 and 1",
                speech.volume
            )));
        }

        let availability = &self.availability;
        if availability.window_ms == 0 || availability.decay_ms == 0 {
            return Err(QasidaError::ConfigError(
                "availability windows must be non-zero".to_string(),
            ));
        }

        let playback = &self.playback;
        if playback.verse_duration_ms == 0 {
            return Err(QasidaError::ConfigError(
                "playback.verse_duration_ms must be non-zero".to_string(),
            ));
        }
        if playback.progress_interval_ms == 0
            || playback.progress_interval_ms > playback.verse_duration_ms
        {
            return Err(QasidaError::ConfigError(format!(
                "playback.progress_interval_ms must be between 1 and {}",
                playback.verse_duration_ms
            )));
        }
        if playback.event_queue_size == 0 {
            return Err(QasidaError::ConfigError(
                "playback.event_queue_size must be non-zero".to_string(),
            ));
        }

        Ok(())
    }
}
