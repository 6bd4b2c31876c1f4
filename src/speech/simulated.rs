//! In-process speech engine
//!
//! Utterances "play" for `chars × ms_per_char` on the injected clock and are
//! logged through `tracing`. Faults can be injected to exercise the failure
//! paths of the session manager and the playback controller.

use crate::speech::engine::{EngineEvent, SpeechEngine, Utterance, Voice};
use crate::utils::clock::Clock;
use crate::{QasidaError, Result};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Default speaking pace
pub const DEFAULT_MS_PER_CHAR: u64 = 80;

struct LiveUtterance {
    utterance: Utterance,
    /// Audio left to play, frozen while paused
    remaining: Duration,
    /// Clock reading when `remaining` was last settled
    settled_at: Duration,
}

#[derive(Default)]
struct SimState {
    voices: Vec<Voice>,
    live: Option<LiveUtterance>,
    paused: bool,
    events: VecDeque<EngineEvent>,
    history: Vec<Utterance>,
    failing_speaks: usize,
    fail_cancel: bool,
    fail_voices: bool,
}

/// Speech engine that runs against a [`Clock`] instead of an audio device
pub struct SimulatedEngine {
    clock: Arc<dyn Clock>,
    ms_per_char: u64,
    supported: bool,
    state: Mutex<SimState>,
}

impl SimulatedEngine {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            ms_per_char: DEFAULT_MS_PER_CHAR,
            supported: true,
            state: Mutex::new(SimState::default()),
        }
    }

    /// Set the voices the engine offers
    pub fn with_voices(self, voices: Vec<Voice>) -> Self {
        self.state.lock().voices = voices;
        self
    }

    /// Set the speaking pace
    pub fn with_ms_per_char(mut self, ms_per_char: u64) -> Self {
        self.ms_per_char = ms_per_char;
        self
    }

    /// Report the capability as missing
    pub fn unsupported(mut self) -> Self {
        self.supported = false;
        self
    }

    /// Make the next `count` calls to `speak` fail
    pub fn fail_next_speaks(&self, count: usize) {
        self.state.lock().failing_speaks = count;
    }

    pub fn fail_cancel(&self, fail: bool) {
        self.state.lock().fail_cancel = fail;
    }

    pub fn fail_voices(&self, fail: bool) {
        self.state.lock().fail_voices = fail;
    }

    /// Fail the live utterance asynchronously
    pub fn inject_error(&self, message: impl Into<String>) {
        let mut state = self.state.lock();
        if let Some(live) = state.live.take() {
            let event = EngineEvent::Error {
                utterance: live.utterance.id,
                message: message.into(),
            };
            state.events.push_back(event);
        }
    }

    /// Replace the voice list and announce the change
    pub fn set_voices(&self, voices: Vec<Voice>) {
        let mut state = self.state.lock();
        state.voices = voices;
        state.events.push_back(EngineEvent::VoicesChanged);
    }

    /// Every utterance handed to `speak`, probes included
    pub fn spoken(&self) -> Vec<Utterance> {
        self.state.lock().history.clone()
    }

    /// Text of the utterance currently playing
    pub fn current_text(&self) -> Option<String> {
        let mut state = self.state.lock();
        self.settle(&mut state);
        state.live.as_ref().map(|l| l.utterance.text.clone())
    }

    fn duration_of(&self, utterance: &Utterance) -> Duration {
        let chars = utterance.text.chars().count() as u64;
        let base = Duration::from_millis(chars * self.ms_per_char);
        // slower rate plays longer
        base.div_f32(utterance.rate.max(0.1))
    }

    /// Finish the live utterance if its audio has run out
    fn settle(&self, state: &mut SimState) {
        let now = self.clock.now();
        let paused = state.paused;
        let Some(live) = state.live.as_mut() else {
            return;
        };
        if !paused {
            let elapsed = now.saturating_sub(live.settled_at);
            live.remaining = live.remaining.saturating_sub(elapsed);
        }
        live.settled_at = now;

        if live.remaining.is_zero() {
            let id = live.utterance.id;
            state.live = None;
            state.events.push_back(EngineEvent::Ended(id));
            debug!("Simulated utterance {} finished", id);
        }
    }
}

impl SpeechEngine for SimulatedEngine {
    fn is_supported(&self) -> bool {
        self.supported
    }

    fn voices(&self) -> Result<Vec<Voice>> {
        let state = self.state.lock();
        if state.fail_voices {
            return Err(QasidaError::TransientSpeechFailure("voice list unavailable".into()));
        }
        Ok(state.voices.clone())
    }

    fn speak(&self, utterance: &Utterance) -> Result<()> {
        let mut state = self.state.lock();
        if state.failing_speaks > 0 {
            state.failing_speaks -= 1;
            return Err(QasidaError::TransientSpeechFailure("speak rejected".into()));
        }

        state.history.push(utterance.clone());
        if utterance.volume > 0.0 && !utterance.text.is_empty() {
            info!(lang = %utterance.lang, "Reciting: {}", utterance.text);
        }

        state.paused = false;
        state.live = Some(LiveUtterance {
            utterance: utterance.clone(),
            remaining: self.duration_of(utterance),
            settled_at: self.clock.now(),
        });
        state.events.push_back(EngineEvent::Started(utterance.id));
        Ok(())
    }

    fn cancel(&self) -> Result<()> {
        let mut state = self.state.lock();
        if state.fail_cancel {
            return Err(QasidaError::TransientSpeechFailure("cancel rejected".into()));
        }
        state.live = None;
        state.paused = false;
        Ok(())
    }

    fn pause(&self) -> Result<()> {
        let mut state = self.state.lock();
        self.settle(&mut state);
        if state.live.is_some() {
            state.paused = true;
        }
        Ok(())
    }

    fn resume(&self) -> Result<()> {
        let mut state = self.state.lock();
        self.settle(&mut state);
        state.paused = false;
        Ok(())
    }

    fn is_speaking(&self) -> Result<bool> {
        let mut state = self.state.lock();
        self.settle(&mut state);
        Ok(state.live.is_some())
    }

    fn is_paused(&self) -> Result<bool> {
        let mut state = self.state.lock();
        self.settle(&mut state);
        Ok(state.paused)
    }

    fn poll_event(&self) -> Option<EngineEvent> {
        let mut state = self.state.lock();
        self.settle(&mut state);
        state.events.pop_front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::clock::ManualClock;

    fn engine() -> (SimulatedEngine, ManualClock) {
        let clock = ManualClock::new();
        (SimulatedEngine::new(Arc::new(clock.clone())), clock)
    }

    fn utterance(text: &str) -> Utterance {
        Utterance::new(text, "ar-SA", 1.0, 1.0, 1.0).unwrap()
    }

    #[test]
    fn test_utterance_runs_for_its_length() {
        let (engine, clock) = engine();
        engine.speak(&utterance("abcd")).unwrap();

        clock.advance_ms(319);
        assert!(engine.is_speaking().unwrap());
        clock.advance_ms(1);
        assert!(!engine.is_speaking().unwrap());
    }

    #[test]
    fn test_events_in_order() {
        let (engine, clock) = engine();
        let u = utterance("ab");
        engine.speak(&u).unwrap();
        clock.advance_ms(1_000);

        assert_eq!(engine.poll_event(), Some(EngineEvent::Started(u.id)));
        assert_eq!(engine.poll_event(), Some(EngineEvent::Ended(u.id)));
        assert_eq!(engine.poll_event(), None);
    }

    #[test]
    fn test_pause_freezes_playback() {
        let (engine, clock) = engine();
        engine.speak(&utterance("ab")).unwrap();

        clock.advance_ms(100);
        engine.pause().unwrap();
        clock.advance_ms(5_000);
        assert!(engine.is_speaking().unwrap());
        assert!(engine.is_paused().unwrap());

        engine.resume().unwrap();
        clock.advance_ms(59);
        assert!(engine.is_speaking().unwrap());
        clock.advance_ms(1);
        assert!(!engine.is_speaking().unwrap());
    }

    #[test]
    fn test_fault_injection() {
        let (engine, _clock) = engine();
        engine.fail_next_speaks(1);
        assert!(engine.speak(&utterance("a")).is_err());
        assert!(engine.speak(&utterance("a")).is_ok());

        engine.inject_error("boom");
        assert!(!engine.is_speaking().unwrap());

        engine.fail_voices(true);
        assert!(engine.voices().is_err());
    }

    #[test]
    fn test_voices_changed_event() {
        let (engine, _clock) = engine();
        engine.set_voices(vec![Voice::new("Maged", "ar-SA")]);
        assert_eq!(engine.poll_event(), Some(EngineEvent::VoicesChanged));
        assert_eq!(engine.voices().unwrap().len(), 1);
    }
}
