//! Verse playback controller
//!
//! Drives the featured poem: a fast progress tick and a per-verse advance
//! timer run while playing, and each verse change hands the new verse to the
//! speech session manager unless muted or speech is unavailable.
//!
//! Speech failures never stop the verses; the controller falls back to
//! visual-only playback and reports a status message instead.

use crate::playback::state::{
    PlaybackConfig, PlaybackEvent, PlaybackSnapshot, PlaybackTimer, ReadAloudOutcome,
    SpeechOrigin, TransportState,
};
use crate::speech::session::{SessionState, SpeechControl, SpeechSessionManager};
use crate::utils::channels::EventChannel;
use crate::utils::clock::Clock;
use crate::utils::timers::TimerSet;
use crate::{QasidaError, Result};
use crossbeam_channel::Receiver;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Status shown when a read-aloud session never became audible
pub const SPEECH_FAILED_TO_START: &str = "Speech synthesis failed to start";

/// Status shown while verses play without audio after a failure
pub const VISUAL_ONLY_NOTICE: &str = "Playing in visual mode only (audio unavailable)";

pub struct VersePlaybackController {
    verses: Vec<String>,
    language: String,
    config: PlaybackConfig,
    speech: SpeechSessionManager,
    clock: Arc<dyn Clock>,
    timers: TimerSet<PlaybackTimer>,

    state: TransportState,
    current_verse: usize,
    progress_step: u32,
    muted: bool,
    reading_aloud: bool,
    speech_supported: bool,
    /// The current verse lost its speech to a failure
    speech_interrupted: bool,

    /// Session for the verse being spoken
    control: Option<SpeechControl>,
    speech_origin: SpeechOrigin,
    last_error_message: Option<String>,
    events: EventChannel<PlaybackEvent>,
}

impl VersePlaybackController {
    /// Mount a controller for `verses`
    ///
    /// Preloads the speech engine and schedules a second availability check
    /// to catch late initialization failures.
    pub fn new(
        verses: Vec<String>,
        speech: SpeechSessionManager,
        clock: Arc<dyn Clock>,
        config: PlaybackConfig,
    ) -> Result<Self> {
        if verses.is_empty() {
            return Err(QasidaError::EmptyPoem);
        }

        let language = speech.config().language;
        let speech_supported = speech.preload();
        if !speech_supported {
            warn!("Speech unavailable at mount, playback will be visual only");
        }

        let mut timers = TimerSet::new();
        timers.schedule_once(
            PlaybackTimer::AvailabilityRecheck,
            clock.now(),
            config.availability_recheck_delay(),
        );

        info!("Playback controller mounted with {} verses", verses.len());

        Ok(Self {
            verses,
            language,
            muted: config.start_muted,
            events: EventChannel::new(config.event_queue_size),
            config,
            speech,
            clock,
            timers,
            state: TransportState::Stopped,
            current_verse: 0,
            progress_step: 0,
            reading_aloud: false,
            speech_supported,
            speech_interrupted: false,
            control: None,
            speech_origin: SpeechOrigin::Playback,
            last_error_message: None,
        })
    }

    /// Speak verses in `language` instead of the manager's default
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    // === Transport ===

    /// Start playback from the current verse
    pub fn play(&mut self) {
        if self.state.is_playing() {
            debug!("Already playing");
            return;
        }

        self.refresh_speech_support();

        let now = self.clock.now();
        self.state = TransportState::Playing;
        self.last_error_message = None;
        self.progress_step = 0;
        if !self.speech_supported && !self.muted {
            self.set_status(VISUAL_ONLY_NOTICE.to_string());
        }

        // progress is armed first so it wins ties with the verse advance
        self.timers
            .schedule_repeating(PlaybackTimer::ProgressTick, now, self.config.progress_interval());

        if self.should_speak() {
            self.start_speech(SpeechOrigin::Playback, now);
        }

        self.timers
            .schedule_once(PlaybackTimer::VerseAdvance, now, self.config.verse_duration());

        info!("Playback started at verse {}", self.current_verse);
        self.events.emit(PlaybackEvent::Started {
            verse: self.current_verse,
        });
    }

    /// Pause playback; a no-op when already stopped
    pub fn pause(&mut self) {
        if self.state.is_playing() {
            self.stop_playback();
        }
    }

    /// Stop playback and any speech
    pub fn stop(&mut self) {
        self.stop_playback();
    }

    /// Play/pause button
    pub fn toggle_play(&mut self) {
        if self.state.is_playing() {
            self.pause();
        } else {
            self.play();
        }
    }

    /// Mute or unmute speech
    ///
    /// Muting keeps the verses moving without audio; unmuting while playing
    /// speaks the current verse right away.
    pub fn set_muted(&mut self, muted: bool) {
        if self.muted == muted {
            return;
        }
        self.muted = muted;
        self.events.emit(PlaybackEvent::MuteChanged(muted));

        if muted {
            self.stop_speech();
            self.set_reading_aloud(false);
            if self.state.is_playing() {
                info!("Muted, continuing in visual-only mode");
            }
        } else if self.state.is_playing() && self.speech_supported {
            self.last_error_message = None;
            let now = self.clock.now();
            self.start_speech(SpeechOrigin::Playback, now);
        }
    }

    pub fn toggle_mute(&mut self) {
        self.set_muted(!self.muted);
    }

    /// Jump to a verse; always stops playback and does not resume it
    pub fn select_verse(&mut self, index: usize) -> Result<()> {
        if index >= self.verses.len() {
            return Err(QasidaError::VerseOutOfRange {
                index,
                len: self.verses.len(),
            });
        }

        self.stop_playback();
        if self.current_verse != index {
            self.current_verse = index;
            self.events.emit(PlaybackEvent::VerseChanged { verse: index });
        }
        Ok(())
    }

    /// Read the current verse aloud, or stop reading
    ///
    /// Independent of play/pause: the progress timer is left alone.
    pub fn toggle_read_aloud(&mut self) -> ReadAloudOutcome {
        if self.reading_aloud {
            self.stop_speech();
            self.set_reading_aloud(false);
            if !self.muted {
                self.muted = true;
                self.events.emit(PlaybackEvent::MuteChanged(true));
            }
            return ReadAloudOutcome::Stopped;
        }

        // A failed utterance earlier does not mean speech is gone
        self.refresh_speech_support();
        if !self.speech_supported {
            let reason = self.speech.unavailable_reason().unwrap_or_else(|| {
                QasidaError::TransientSpeechFailure("speech unavailable".into())
            });
            warn!("Read aloud requested but speech is unavailable: {}", reason);
            self.set_status(reason.user_message());
            return ReadAloudOutcome::Unavailable;
        }

        let now = self.clock.now();
        if !self.start_speech(SpeechOrigin::ReadAloud, now) {
            return ReadAloudOutcome::Unavailable;
        }

        self.last_error_message = None;
        if self.muted {
            self.muted = false;
            self.events.emit(PlaybackEvent::MuteChanged(false));
        }
        ReadAloudOutcome::Started
    }

    /// Advance timers and observe speech; call from the host event loop
    pub fn tick(&mut self) {
        self.speech.poll();
        self.watch_session();

        let now = self.clock.now();
        while let Some((timer, at)) = self.timers.pop_due(now) {
            match timer {
                PlaybackTimer::ProgressTick => self.progress_tick(),
                PlaybackTimer::VerseAdvance => self.advance(at),
                PlaybackTimer::SpeechCheck => self.check_speech(),
                PlaybackTimer::AvailabilityRecheck => self.refresh_speech_support(),
            }
        }
    }

    /// Clear every timer and silence speech; safe from any state, repeatable
    pub fn teardown(&mut self) {
        self.timers.clear();
        self.stop_speech();
        self.state = TransportState::Stopped;
        self.progress_step = 0;
        self.reading_aloud = false;
        self.speech_interrupted = false;
        debug!("Playback controller torn down");
    }

    // === Observable state ===

    pub fn current_verse_index(&self) -> usize {
        self.current_verse
    }

    pub fn current_verse(&self) -> &str {
        &self.verses[self.current_verse]
    }

    pub fn verses(&self) -> &[String] {
        &self.verses
    }

    pub fn transport_state(&self) -> TransportState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state.is_playing()
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    pub fn is_reading_aloud(&self) -> bool {
        self.reading_aloud
    }

    pub fn is_speech_supported(&self) -> bool {
        self.speech_supported
    }

    /// Playing without audio, by choice or after a failure
    pub fn is_visual_only(&self) -> bool {
        self.state.is_playing() && (self.muted || !self.speech_supported || self.speech_interrupted)
    }

    /// Fraction of the current verse elapsed, in `[0, 1)`
    pub fn progress_fraction(&self) -> f32 {
        self.progress_step as f32 / self.config.progress_steps() as f32
    }

    pub fn last_error_message(&self) -> Option<&str> {
        self.last_error_message.as_deref()
    }

    /// Whether a speech session owned by this controller is pending or live
    pub fn has_active_speech(&self) -> bool {
        self.control.as_ref().is_some_and(|c| c.state().is_live())
    }

    /// Number of armed timers
    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    /// Time until the next timer fires
    pub fn next_timer_in(&self) -> Option<Duration> {
        let now = self.clock.now();
        self.timers
            .next_deadline()
            .map(|deadline| deadline.saturating_sub(now))
    }

    pub fn snapshot(&self) -> PlaybackSnapshot {
        PlaybackSnapshot {
            state: self.state,
            current_verse: self.current_verse,
            verse_count: self.verses.len(),
            progress: self.progress_fraction(),
            is_muted: self.muted,
            is_reading_aloud: self.reading_aloud,
            speech_supported: self.speech_supported,
            is_visual_only: self.is_visual_only(),
            last_error_message: self.last_error_message.clone(),
        }
    }

    /// Get a receiver for playback events
    pub fn event_receiver(&self) -> Receiver<PlaybackEvent> {
        self.events.receiver()
    }

    /// Take all queued events
    pub fn drain_events(&self) -> Vec<PlaybackEvent> {
        self.events.drain()
    }

    // === Internals ===

    fn should_speak(&self) -> bool {
        !self.muted && self.speech_supported
    }

    fn stop_playback(&mut self) {
        let was_playing = self.state.is_playing();
        self.state = TransportState::Stopped;

        self.timers.cancel(PlaybackTimer::ProgressTick);
        self.timers.cancel(PlaybackTimer::VerseAdvance);
        self.timers.cancel(PlaybackTimer::SpeechCheck);
        self.progress_step = 0;
        self.speech_interrupted = false;

        self.stop_speech();
        self.set_reading_aloud(false);

        if was_playing {
            info!("Playback stopped at verse {}", self.current_verse);
            self.events.emit(PlaybackEvent::Stopped);
        }
    }

    fn progress_tick(&mut self) {
        self.progress_step += 1;
        if self.progress_step >= self.config.progress_steps() {
            self.progress_step = 0;
        }
    }

    fn advance(&mut self, at: Duration) {
        let next = (self.current_verse + 1) % self.verses.len();

        // One full pass, then stop
        if next == 0 {
            info!("Finished all {} verses", self.verses.len());
            self.stop_playback();
            if self.current_verse != 0 {
                self.current_verse = 0;
                self.events.emit(PlaybackEvent::VerseChanged { verse: 0 });
            }
            self.events.emit(PlaybackEvent::Finished);
            return;
        }

        self.current_verse = next;
        self.progress_step = 0;
        debug!("Advanced to verse {}", next);
        self.events.emit(PlaybackEvent::VerseChanged { verse: next });

        if self.should_speak() {
            self.start_speech(SpeechOrigin::Playback, at);
        }

        self.timers
            .schedule_once(PlaybackTimer::VerseAdvance, at, self.config.verse_duration());
    }

    /// Speak the current verse, replacing any previous session
    ///
    /// Returns false when the manager refused and the controller degraded.
    fn start_speech(&mut self, origin: SpeechOrigin, at: Duration) -> bool {
        self.stop_speech();

        let verse = &self.verses[self.current_verse];
        let control = self.speech.start_session(verse, &self.language);
        if control.is_noop() {
            let reason = self.speech.unavailable_reason().unwrap_or_else(|| {
                QasidaError::TransientSpeechFailure("session did not start".into())
            });
            self.degrade(reason);
            return false;
        }

        self.control = Some(control);
        self.speech_origin = origin;
        self.speech_interrupted = false;
        self.set_reading_aloud(true);
        self.timers
            .schedule_once(PlaybackTimer::SpeechCheck, at, self.config.speech_check_delay());
        true
    }

    fn stop_speech(&mut self) {
        if let Some(control) = self.control.take() {
            control.stop();
        }
        self.timers.cancel(PlaybackTimer::SpeechCheck);
    }

    /// Drop the current verse to visual-only after a speech failure
    ///
    /// Later verses try again unless the manager has disabled speech.
    fn degrade(&mut self, reason: QasidaError) {
        warn!("Speech failed, falling back to visual playback: {}", reason);
        self.stop_speech();
        self.set_reading_aloud(false);
        self.speech_interrupted = true;
        self.refresh_speech_support();

        let message = if self.state.is_playing() {
            VISUAL_ONLY_NOTICE.to_string()
        } else {
            reason.user_message()
        };
        self.set_status(message);
    }

    /// React to sessions that errored or finished on their own
    fn watch_session(&mut self) {
        let Some(control) = &self.control else {
            return;
        };

        let state = control.state();
        // Engines without end events only expose the speaking flag
        let finished = state == SessionState::Stopped
            || (state == SessionState::Speaking && !control.is_speaking() && !control.is_paused());

        if state == SessionState::Errored {
            self.degrade(QasidaError::TransientSpeechFailure(
                "speech engine reported an error".into(),
            ));
        } else if finished {
            debug!("Speech for verse {} finished", self.current_verse);
            self.control = None;
            self.timers.cancel(PlaybackTimer::SpeechCheck);
            self.set_reading_aloud(false);
        }
    }

    fn check_speech(&mut self) {
        let Some(control) = &self.control else {
            return;
        };
        if control.is_speaking() || control.is_paused() || control.state() == SessionState::Stopped
        {
            return;
        }

        match self.speech_origin {
            SpeechOrigin::ReadAloud => {
                warn!("Speech didn't start properly");
                self.stop_speech();
                self.set_reading_aloud(false);
                self.set_status(SPEECH_FAILED_TO_START.to_string());
            }
            SpeechOrigin::Playback => {
                warn!("Speech didn't start properly, continuing with visual playback");
            }
        }
    }

    fn refresh_speech_support(&mut self) {
        let available = self.speech.is_available();
        self.set_speech_supported(available);
    }

    fn set_speech_supported(&mut self, supported: bool) {
        if self.speech_supported != supported {
            info!("Speech {}", if supported { "available" } else { "unavailable" });
            self.speech_supported = supported;
            self.events
                .emit(PlaybackEvent::SpeechAvailabilityChanged(supported));
        }
    }

    fn set_reading_aloud(&mut self, reading: bool) {
        if self.reading_aloud != reading {
            self.reading_aloud = reading;
            self.events.emit(PlaybackEvent::ReadAloudChanged(reading));
        }
    }

    fn set_status(&mut self, message: String) {
        self.last_error_message = Some(message.clone());
        self.events.emit(PlaybackEvent::Status(message));
    }
}

impl Drop for VersePlaybackController {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::speech::availability::AvailabilityConfig;
    use crate::speech::engine::Voice;
    use crate::speech::session::SpeechConfig;
    use crate::speech::simulated::SimulatedEngine;
    use crate::utils::clock::ManualClock;

    struct Fixture {
        controller: VersePlaybackController,
        engine: Arc<SimulatedEngine>,
        manager: SpeechSessionManager,
        clock: ManualClock,
    }

    fn verses(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("verse {}", i)).collect()
    }

    fn fixture(n: usize) -> Fixture {
        let clock = ManualClock::new();
        let engine = Arc::new(
            SimulatedEngine::new(Arc::new(clock.clone()))
                .with_voices(vec![Voice::new("Maged", "ar-SA")])
                .with_ms_per_char(200),
        );
        let manager = SpeechSessionManager::new(
            Some(engine.clone()),
            Arc::new(clock.clone()),
            SpeechConfig::default(),
            AvailabilityConfig::default(),
        );
        let controller = VersePlaybackController::new(
            verses(n),
            manager.clone(),
            Arc::new(clock.clone()),
            PlaybackConfig::default(),
        )
        .unwrap();

        Fixture {
            controller,
            engine,
            manager,
            clock,
        }
    }

    /// Advance in host-sized steps, ticking after each
    fn run_for(f: &mut Fixture, ms: u64) {
        let step = 10;
        let mut elapsed = 0;
        while elapsed < ms {
            f.clock.advance_ms(step);
            f.controller.tick();
            elapsed += step;
        }
    }

    fn recited(engine: &SimulatedEngine) -> Vec<String> {
        engine
            .spoken()
            .into_iter()
            .filter(|u| u.volume > 0.0)
            .map(|u| u.text)
            .collect()
    }

    #[test]
    fn test_rejects_empty_poem() {
        let clock = ManualClock::new();
        let manager = SpeechSessionManager::new(
            None,
            Arc::new(clock.clone()),
            SpeechConfig::default(),
            AvailabilityConfig::default(),
        );
        let result =
            VersePlaybackController::new(vec![], manager, Arc::new(clock), PlaybackConfig::default());
        assert!(matches!(result, Err(QasidaError::EmptyPoem)));
    }

    #[test]
    fn test_full_pass_then_stops() {
        let mut f = fixture(3);
        f.controller.play();
        assert!(f.controller.is_playing());

        let mut seen = vec![f.controller.current_verse_index()];
        for _ in 0..3 {
            run_for(&mut f, 3_000);
            seen.push(f.controller.current_verse_index());
        }

        assert_eq!(seen, vec![0, 1, 2, 0]);
        assert!(!f.controller.is_playing());
        assert_eq!(f.controller.progress_fraction(), 0.0);

        // does not loop a second time
        run_for(&mut f, 10_000);
        assert_eq!(f.controller.current_verse_index(), 0);
        assert!(!f.controller.is_playing());

        let events = f.controller.drain_events();
        assert!(events.contains(&PlaybackEvent::Finished));
        assert_eq!(recited(&f.engine), vec!["verse 0", "verse 1", "verse 2"]);
    }

    #[test]
    fn test_progress_ticks_and_wraps() {
        let mut f = fixture(2);
        f.controller.play();

        f.clock.advance_ms(1_500);
        f.controller.tick();
        assert!((f.controller.progress_fraction() - 0.5).abs() < 1e-6);

        f.clock.advance_ms(1_500);
        f.controller.tick();
        assert_eq!(f.controller.current_verse_index(), 1);
        assert_eq!(f.controller.progress_fraction(), 0.0);

        f.clock.advance_ms(30);
        f.controller.tick();
        assert!((f.controller.progress_fraction() - 0.01).abs() < 1e-6);
    }

    #[test]
    fn test_single_verse_poem_stops_after_one_duration() {
        let mut f = fixture(1);
        f.controller.play();
        run_for(&mut f, 2_990);
        assert!(f.controller.is_playing());
        run_for(&mut f, 10);
        assert!(!f.controller.is_playing());
        assert_eq!(f.controller.current_verse_index(), 0);
    }

    #[test]
    fn test_mute_keeps_visual_playback() {
        let mut f = fixture(4);
        f.controller.play();
        run_for(&mut f, 200);
        assert!(f.controller.has_active_speech());

        f.controller.set_muted(true);
        assert!(f.controller.is_playing());
        assert!(f.controller.is_visual_only());
        assert!(!f.controller.has_active_speech());
        assert!(!f.controller.is_reading_aloud());
        assert!(f.engine.current_text().is_none());

        run_for(&mut f, 3_000);
        assert_eq!(f.controller.current_verse_index(), 1);
        assert!(f.controller.progress_fraction() > 0.0);
        assert!(f.engine.current_text().is_none());

        f.controller.set_muted(false);
        assert!(f.controller.has_active_speech());
        run_for(&mut f, 100);
        assert_eq!(f.engine.current_text().as_deref(), Some("verse 1"));
    }

    #[test]
    fn test_select_verse_stops_playback() {
        let mut f = fixture(5);
        f.controller.play();
        run_for(&mut f, 500);

        f.controller.select_verse(3).unwrap();
        assert!(!f.controller.is_playing());
        assert_eq!(f.controller.current_verse_index(), 3);
        assert!(!f.controller.has_active_speech());

        run_for(&mut f, 10_000);
        assert_eq!(f.controller.current_verse_index(), 3);

        // from stopped as well
        f.controller.select_verse(1).unwrap();
        assert_eq!(f.controller.current_verse_index(), 1);
        assert!(!f.controller.is_playing());
    }

    #[test]
    fn test_select_verse_out_of_range() {
        let mut f = fixture(2);
        f.controller.play();
        let err = f.controller.select_verse(2).unwrap_err();
        assert_eq!(err, QasidaError::VerseOutOfRange { index: 2, len: 2 });
        assert!(f.controller.is_playing());
    }

    #[test]
    fn test_play_resumes_from_selected_verse() {
        let mut f = fixture(3);
        f.controller.select_verse(2).unwrap();
        f.controller.play();
        run_for(&mut f, 200);
        assert_eq!(f.engine.current_text().as_deref(), Some("verse 2"));

        run_for(&mut f, 3_000);
        assert!(!f.controller.is_playing());
        assert_eq!(f.controller.current_verse_index(), 0);
    }

    #[test]
    fn test_teardown_from_any_state() {
        let mut f = fixture(3);
        f.controller.teardown();
        f.controller.teardown();
        assert_eq!(f.controller.pending_timers(), 0);

        let mut f = fixture(3);
        f.controller.play();
        run_for(&mut f, 200);
        f.controller.teardown();
        assert_eq!(f.controller.pending_timers(), 0);
        assert!(!f.controller.has_active_speech());
        assert!(f.engine.current_text().is_none());
        f.controller.teardown();

        let mut f = fixture(3);
        f.controller.set_muted(true);
        f.controller.play();
        f.controller.teardown();
        f.controller.teardown();
        assert!(!f.controller.is_playing());
        assert_eq!(f.controller.pending_timers(), 0);
    }

    #[test]
    fn test_drop_silences_speech() {
        let f = fixture(3);
        let Fixture {
            mut controller,
            engine,
            clock,
            ..
        } = f;
        controller.play();
        clock.advance_ms(150);
        controller.tick();
        assert!(engine.current_text().is_some());

        drop(controller);
        assert!(engine.current_text().is_none());
    }

    #[test]
    fn test_read_aloud_toggle() {
        let mut f = fixture(3);
        assert_eq!(f.controller.toggle_read_aloud(), ReadAloudOutcome::Started);
        assert!(f.controller.is_reading_aloud());
        assert!(!f.controller.is_playing());
        assert_eq!(f.controller.progress_fraction(), 0.0);

        run_for(&mut f, 200);
        assert_eq!(f.engine.current_text().as_deref(), Some("verse 0"));

        assert_eq!(f.controller.toggle_read_aloud(), ReadAloudOutcome::Stopped);
        assert!(!f.controller.is_reading_aloud());
        assert!(f.controller.is_muted());
        assert!(f.engine.current_text().is_none());

        // reading again unmutes
        assert_eq!(f.controller.toggle_read_aloud(), ReadAloudOutcome::Started);
        assert!(!f.controller.is_muted());
    }

    #[test]
    fn test_read_aloud_unavailable_reports_status() {
        let clock = ManualClock::new();
        let manager = SpeechSessionManager::new(
            None,
            Arc::new(clock.clone()),
            SpeechConfig::default(),
            AvailabilityConfig::default(),
        );
        let mut controller = VersePlaybackController::new(
            verses(2),
            manager,
            Arc::new(clock),
            PlaybackConfig::default(),
        )
        .unwrap();

        assert!(!controller.is_speech_supported());
        assert_eq!(controller.toggle_read_aloud(), ReadAloudOutcome::Unavailable);
        assert!(!controller.is_reading_aloud());
        assert_eq!(
            controller.last_error_message(),
            Some(QasidaError::CapabilityAbsent.user_message().as_str())
        );

        // visual playback still works, and says so
        controller.play();
        assert!(controller.is_visual_only());
        assert_eq!(controller.last_error_message(), Some(VISUAL_ONLY_NOTICE));
    }

    #[test]
    fn test_speech_failure_silences_only_that_verse() {
        let mut f = fixture(4);
        f.controller.play();
        // past the post-mount recheck, verse 1 is being spoken
        run_for(&mut f, 3_200);
        assert_eq!(f.engine.current_text().as_deref(), Some("verse 1"));

        f.engine.inject_error("audio-busy");
        run_for(&mut f, 10);

        assert!(f.controller.is_playing());
        assert!(f.controller.is_visual_only());
        assert!(f.controller.is_speech_supported());
        assert!(f.manager.is_available());
        assert_eq!(f.controller.last_error_message(), Some(VISUAL_ONLY_NOTICE));

        // the next verse speaks again
        run_for(&mut f, 3_000);
        assert_eq!(f.controller.current_verse_index(), 2);
        assert!(!f.controller.is_visual_only());
        assert_eq!(recited(&f.engine), vec!["verse 0", "verse 1", "verse 2"]);
    }

    #[test]
    fn test_read_aloud_retries_after_engine_error() {
        let mut f = fixture(3);
        run_for(&mut f, 2_100);

        assert_eq!(f.controller.toggle_read_aloud(), ReadAloudOutcome::Started);
        run_for(&mut f, 200);
        f.engine.inject_error("synthesis-failed");
        run_for(&mut f, 10);
        assert!(!f.controller.is_reading_aloud());
        assert!(f.manager.is_available());

        assert_eq!(f.controller.toggle_read_aloud(), ReadAloudOutcome::Started);
        assert!(f.controller.is_speech_supported());
        assert_eq!(f.controller.last_error_message(), None);
        run_for(&mut f, 200);
        assert_eq!(f.engine.current_text().as_deref(), Some("verse 0"));
    }

    #[test]
    fn test_play_while_rate_limited_reports_visual_only() {
        let mut f = fixture(2);
        f.engine.fail_next_speaks(4);
        for _ in 0..4 {
            let _ = f.manager.speak("probe");
            f.clock.advance_ms(100);
            f.manager.poll();
        }
        assert!(!f.manager.is_available());

        f.controller.play();
        assert!(f.controller.is_visual_only());
        assert_eq!(f.controller.last_error_message(), Some(VISUAL_ONLY_NOTICE));
        assert_eq!(f.controller.toggle_read_aloud(), ReadAloudOutcome::Unavailable);
        assert_eq!(
            f.controller.last_error_message(),
            Some(QasidaError::RateLimited { recent_errors: 4 }.user_message().as_str())
        );
    }

    #[test]
    fn test_read_aloud_that_never_starts_reports() {
        let mut f = fixture(2);
        f.engine.fail_next_speaks(1);

        assert_eq!(f.controller.toggle_read_aloud(), ReadAloudOutcome::Started);
        run_for(&mut f, 200);

        // the deferred speak failed, the session errored
        assert!(!f.controller.is_reading_aloud());
        assert!(f.controller.last_error_message().is_some());
    }

    #[test]
    fn test_rate_limit_blocks_speech_but_not_verses() {
        let mut f = fixture(6);
        f.engine.fail_next_speaks(10);

        // each failure downgrades; a fresh play re-checks availability
        for _ in 0..4 {
            f.controller.play();
            run_for(&mut f, 200);
            f.controller.pause();
        }
        assert!(!f.manager.is_available());

        f.controller.play();
        assert!(!f.controller.is_speech_supported());
        assert!(f.controller.is_visual_only());
        run_for(&mut f, 3_000);
        assert_eq!(f.controller.current_verse_index(), 1);
    }

    #[test]
    fn test_availability_recheck_after_mount() {
        let mut f = fixture(2);
        assert!(f.controller.is_speech_supported());
        f.engine.fail_next_speaks(4);
        for _ in 0..4 {
            let control = f.manager.speak("probe");
            f.clock.advance_ms(100);
            f.manager.poll();
            assert!(!control.is_speaking());
        }

        run_for(&mut f, 2_000);
        assert!(!f.controller.is_speech_supported());
        assert!(f
            .controller
            .drain_events()
            .contains(&PlaybackEvent::SpeechAvailabilityChanged(false)));
    }

    #[test]
    fn test_start_muted_plays_silently() {
        let clock = ManualClock::new();
        let engine = Arc::new(SimulatedEngine::new(Arc::new(clock.clone())));
        let manager = SpeechSessionManager::new(
            Some(engine.clone()),
            Arc::new(clock.clone()),
            SpeechConfig::default(),
            AvailabilityConfig::default(),
        );
        let mut controller = VersePlaybackController::new(
            verses(2),
            manager,
            Arc::new(clock.clone()),
            PlaybackConfig::default().muted(),
        )
        .unwrap();

        controller.play();
        clock.advance_ms(500);
        controller.tick();
        assert!(controller.is_visual_only());
        assert!(recited(&engine).is_empty());
    }

    #[test]
    fn test_snapshot_reflects_state() {
        let mut f = fixture(4);
        f.controller.play();
        f.clock.advance_ms(3_030);
        f.controller.tick();

        let snapshot = f.controller.snapshot();
        assert!(snapshot.is_playing());
        assert_eq!(snapshot.current_verse, 1);
        assert_eq!(snapshot.verse_count, 4);
        assert!((snapshot.progress_percent() - 1.0).abs() < 1e-4);
        assert!(!snapshot.is_visual_only);
    }
}
