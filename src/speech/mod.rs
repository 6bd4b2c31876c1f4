//! Speech synthesis for verse recitation
//!
//! This module provides:
//! - The host engine seam ([`SpeechEngine`])
//! - A rolling failure tracker that disables speech after repeated errors
//! - The session manager that keeps at most one utterance alive
//! - An in-process simulated engine

pub mod availability;
pub mod engine;
pub mod session;
pub mod simulated;

// Re-export commonly used types
pub use availability::{AvailabilityConfig, SpeechAvailabilityTracker};
pub use engine::{EngineEvent, SpeechEngine, Utterance, Voice};
pub use session::{
    select_voice, SessionState, SpeechConfig, SpeechControl, SpeechSessionManager,
    DEFAULT_LANGUAGE,
};
pub use simulated::SimulatedEngine;
