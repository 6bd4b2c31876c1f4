//! Speech session manager
//!
//! Wraps a [`SpeechEngine`] so that exactly one utterance is alive at a time,
//! every engine failure is caught at this boundary, and repeated failures
//! disable speech through the [`SpeechAvailabilityTracker`].
//!
//! Callers never see an error from here: a session that cannot start yields a
//! no-op [`SpeechControl`].

use crate::speech::availability::{AvailabilityConfig, SpeechAvailabilityTracker};
use crate::speech::engine::{primary_subtag, EngineEvent, SpeechEngine, Utterance, Voice};
use crate::utils::clock::Clock;
use crate::QasidaError;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Default language for recitation
pub const DEFAULT_LANGUAGE: &str = "ar-SA";

/// Configuration for speech sessions
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    /// Language tag used when the caller does not pass one
    pub language: String,

    /// Speaking rate (1.0 = normal)
    pub rate: f32,

    pub pitch: f32,

    pub volume: f32,

    /// Delay before the engine is asked to speak, lets the voice list settle
    pub start_delay_ms: u64,

    /// Voices whose language tag contains this are preferred over all others
    pub preferred_voice_lang: String,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            language: DEFAULT_LANGUAGE.to_string(),
            rate: 0.9,
            pitch: 1.0,
            volume: 1.0,
            start_delay_ms: 100,
            preferred_voice_lang: "ar".to_string(),
        }
    }
}

impl SpeechConfig {
    /// Set the default language
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    /// Set the speaking rate
    pub fn with_rate(mut self, rate: f32) -> Self {
        self.rate = rate;
        self
    }

    /// Set the deferred start delay
    pub fn with_start_delay(mut self, delay: Duration) -> Self {
        self.start_delay_ms = delay.as_millis() as u64;
        self
    }

    pub fn start_delay(&self) -> Duration {
        Duration::from_millis(self.start_delay_ms)
    }
}

/// Lifecycle of a single utterance
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    /// Waiting for the deferred start
    Pending,
    /// Handed to the engine
    Speaking,
    /// Stopped, superseded or finished
    Stopped,
    /// The engine failed on this utterance
    Errored,
}

impl SessionState {
    /// Pending or speaking
    pub fn is_live(&self) -> bool {
        matches!(self, SessionState::Pending | SessionState::Speaking)
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Pending => write!(f, "Pending"),
            SessionState::Speaking => write!(f, "Speaking"),
            SessionState::Stopped => write!(f, "Stopped"),
            SessionState::Errored => write!(f, "Errored"),
        }
    }
}

/// Pick a voice for `lang`
///
/// Priority: a voice whose tag contains `preferred`, then one whose tag
/// contains the primary subtag of `lang`, then none (host default).
pub fn select_voice<'a>(voices: &'a [Voice], preferred: &str, lang: &str) -> Option<&'a Voice> {
    if !preferred.is_empty() {
        if let Some(voice) = voices.iter().find(|v| v.lang.contains(preferred)) {
            return Some(voice);
        }
    }

    let primary = primary_subtag(lang);
    if primary.is_empty() {
        return None;
    }
    voices.iter().find(|v| v.lang.contains(primary))
}

struct ActiveSession {
    utterance: Utterance,
    state: SessionState,
    /// When the deferred `speak` is due; `None` once handed to the engine
    speak_at: Option<Duration>,
}

impl ActiveSession {
    fn id(&self) -> Uuid {
        self.utterance.id
    }
}

struct ManagerInner {
    engine: Option<Arc<dyn SpeechEngine>>,
    clock: Arc<dyn Clock>,
    config: SpeechConfig,
    tracker: SpeechAvailabilityTracker,
    active: Option<ActiveSession>,
}

impl ManagerInner {
    fn now(&self) -> Duration {
        self.clock.now()
    }

    fn record_error(&mut self, err: &QasidaError) {
        let now = self.now();
        debug!("Recording speech error: {}", err);
        self.tracker.record_error(now);
    }

    /// Re-check host presence and decay old errors
    fn refresh(&mut self) -> bool {
        let present = self.engine.as_ref().is_some_and(|e| e.is_supported());
        self.tracker.set_capability_present(present);
        let now = self.now();
        self.tracker.decay(now);
        self.tracker.is_available()
    }

    /// The active session, if `id` still owns it
    fn session(&self, id: Uuid) -> Option<&ActiveSession> {
        self.active.as_ref().filter(|s| s.id() == id)
    }

    fn session_mut(&mut self, id: Uuid) -> Option<&mut ActiveSession> {
        self.active.as_mut().filter(|s| s.id() == id)
    }

    fn cancel_engine(&self) {
        if let Some(engine) = &self.engine {
            if let Err(e) = engine.cancel() {
                error!("Error cancelling speech: {}", e);
            }
        }
    }
}

/// Owner of the single active utterance
///
/// Clones share state, so the playback controller and the UI can hold the
/// same manager.
#[derive(Clone)]
pub struct SpeechSessionManager {
    inner: Arc<Mutex<ManagerInner>>,
}

impl SpeechSessionManager {
    /// Create a manager; `engine` is `None` when the host has no speech
    pub fn new(
        engine: Option<Arc<dyn SpeechEngine>>,
        clock: Arc<dyn Clock>,
        config: SpeechConfig,
        availability: AvailabilityConfig,
    ) -> Self {
        let mut tracker = SpeechAvailabilityTracker::new(availability);
        tracker.set_capability_present(engine.as_ref().is_some_and(|e| e.is_supported()));

        Self {
            inner: Arc::new(Mutex::new(ManagerInner {
                engine,
                clock,
                config,
                tracker,
                active: None,
            })),
        }
    }

    /// Start speaking `text` in the configured language
    pub fn speak(&self, text: &str) -> SpeechControl {
        let language = self.inner.lock().config.language.clone();
        self.start_session(text, &language)
    }

    /// Start a new session, superseding any previous one
    ///
    /// The engine call is deferred by the configured start delay; call
    /// [`poll`](Self::poll) from the event loop to let it fire.
    pub fn start_session(&self, text: &str, language: &str) -> SpeechControl {
        let mut inner = self.inner.lock();

        if !inner.refresh() {
            if inner.tracker.is_rate_limited() {
                warn!("Speech synthesis disabled due to multiple errors");
            } else {
                warn!("Speech synthesis not available");
            }
            return SpeechControl::noop();
        }
        let Some(engine) = inner.engine.clone() else {
            return SpeechControl::noop();
        };

        // Supersede the previous session before touching the engine
        if let Some(previous) = inner.active.as_mut() {
            if previous.state.is_live() {
                debug!("Superseding speech session {}", previous.id());
            }
            previous.state = SessionState::Stopped;
            previous.speak_at = None;
        }
        inner.active = None;

        if let Err(e) = engine.cancel() {
            error!("Error canceling previous speech: {}", e);
            return SpeechControl::noop();
        }

        let config = inner.config.clone();
        let mut utterance =
            match Utterance::new(text, language, config.rate, config.pitch, config.volume) {
                Ok(utterance) => utterance,
                Err(e) => {
                    error!("Error creating speech utterance: {}", e);
                    inner.record_error(&e);
                    return SpeechControl::noop();
                }
            };

        // Voice selection failures fall through to the host default
        match engine.voices() {
            Ok(voices) => match select_voice(&voices, &config.preferred_voice_lang, language) {
                Some(voice) => {
                    debug!("Selected voice {} ({})", voice.name, voice.lang);
                    utterance = utterance.with_voice(voice.clone());
                }
                None => debug!("No voice for {}, using host default", language),
            },
            Err(e) => {
                let err = QasidaError::VoiceSelectionFailure(e.to_string());
                warn!("Error setting voice: {}", err);
                inner.record_error(&err);
            }
        }

        let id = utterance.id;
        let speak_at = inner.now() + config.start_delay();
        inner.active = Some(ActiveSession {
            utterance,
            state: SessionState::Pending,
            speak_at: Some(speak_at),
        });
        drop(inner);

        info!("Speech session {} started ({} chars, {})", id, text.chars().count(), language);

        let control = SpeechControl {
            session: Some(SessionRef {
                id,
                manager: self.clone(),
            }),
        };

        // A zero delay speaks right away
        self.poll();
        control
    }

    /// Drive deferred starts, engine events and error decay
    pub fn poll(&self) {
        let mut inner = self.inner.lock();
        let now = inner.now();
        inner.tracker.decay(now);

        let Some(engine) = inner.engine.clone() else {
            return;
        };

        while let Some(event) = engine.poll_event() {
            match event {
                EngineEvent::Started(id) => {
                    if inner.session(id).is_some() {
                        debug!("Speech started");
                    }
                }
                EngineEvent::Ended(id) => {
                    if let Some(session) = inner.session_mut(id) {
                        if session.state == SessionState::Speaking {
                            debug!("Speech ended normally");
                            session.state = SessionState::Stopped;
                        }
                    }
                }
                EngineEvent::Error { utterance, message } => {
                    let live = inner.session(utterance).is_some_and(|s| s.state.is_live());
                    if !live {
                        continue;
                    }
                    error!("Speech error: {}", message);
                    inner.record_error(&QasidaError::TransientSpeechFailure(message));
                    if let Some(session) = inner.session_mut(utterance) {
                        session.state = SessionState::Errored;
                        session.speak_at = None;
                    }
                    // Recover by dropping whatever the engine still holds
                    inner.cancel_engine();
                }
                EngineEvent::VoicesChanged => match engine.voices() {
                    Ok(voices) => debug!("Voices loaded: {}", voices.len()),
                    Err(e) => warn!("Error reading voices after change: {}", e),
                },
            }
        }

        let due = inner
            .active
            .as_ref()
            .and_then(|s| s.speak_at)
            .is_some_and(|at| now >= at);
        if !due {
            return;
        }

        let result = match inner.active.as_ref() {
            Some(session) => engine.speak(&session.utterance),
            None => return,
        };
        match result {
            Ok(()) => {
                if let Some(session) = inner.active.as_mut() {
                    session.state = SessionState::Speaking;
                    session.speak_at = None;
                }
            }
            Err(e) => {
                error!("Error starting speech: {}", e);
                inner.record_error(&e);
                if let Some(session) = inner.active.as_mut() {
                    session.state = SessionState::Errored;
                    session.speak_at = None;
                }
            }
        }
    }

    /// Whether new sessions may start, re-checking host presence
    pub fn is_available(&self) -> bool {
        self.inner.lock().refresh()
    }

    /// Warm up the engine and detect early failures
    ///
    /// Returns whether the host exposes a speech engine; whether speech will
    /// actually work is refined by later sessions.
    pub fn preload(&self) -> bool {
        let mut inner = self.inner.lock();
        if !inner.refresh() && !inner.tracker.is_capability_present() {
            warn!("Speech synthesis not available on this host");
            return false;
        }
        let Some(engine) = inner.engine.clone() else {
            return false;
        };

        match engine.voices() {
            Ok(voices) if voices.is_empty() => debug!("No voices yet, waiting for voices to load"),
            Ok(voices) => debug!("Voices loaded: {}", voices.len()),
            Err(e) => {
                error!("Error during voice preloading: {}", e);
                inner.record_error(&e);
                return false;
            }
        }

        // Do not interrupt a live session with the probe
        if inner.active.as_ref().is_some_and(|s| s.state.is_live()) {
            return true;
        }

        let language = inner.config.language.clone();
        let probe = Utterance::silent_probe(language).and_then(|probe| {
            engine.speak(&probe)?;
            engine.cancel()
        });
        if let Err(e) = probe {
            warn!("Speech synthesis test failed: {}", e);
            inner.record_error(&e);
            return false;
        }

        true
    }

    /// Stop whatever session is active
    pub fn stop_all(&self) {
        let mut inner = self.inner.lock();
        if let Some(session) = inner.active.as_mut() {
            session.state = SessionState::Stopped;
            session.speak_at = None;
        }
        inner.cancel_engine();
    }

    /// Id of the active session
    pub fn active_session(&self) -> Option<Uuid> {
        self.inner.lock().active.as_ref().map(|s| s.id())
    }

    /// Errors that have not decayed yet
    pub fn error_count(&self) -> usize {
        self.inner.lock().tracker.error_count()
    }

    /// The error a caller would see if it asked why speech is off
    pub fn unavailable_reason(&self) -> Option<QasidaError> {
        let mut inner = self.inner.lock();
        if inner.refresh() {
            None
        } else if !inner.tracker.is_capability_present() {
            Some(QasidaError::CapabilityAbsent)
        } else {
            Some(QasidaError::RateLimited {
                recent_errors: inner.tracker.error_count(),
            })
        }
    }

    pub fn config(&self) -> SpeechConfig {
        self.inner.lock().config.clone()
    }

    fn with_session<T>(&self, id: Uuid, f: impl FnOnce(&mut ManagerInner) -> T) -> Option<T> {
        let mut inner = self.inner.lock();
        inner.session(id)?;
        Some(f(&mut inner))
    }
}

#[derive(Clone)]
struct SessionRef {
    id: Uuid,
    manager: SpeechSessionManager,
}

/// Transport handle for one speech session
///
/// Handles of superseded sessions are inert: they never affect the newer
/// utterance and always report not speaking.
#[derive(Clone)]
pub struct SpeechControl {
    session: Option<SessionRef>,
}

impl SpeechControl {
    /// Handle that does nothing and never speaks
    pub fn noop() -> Self {
        Self { session: None }
    }

    /// Whether this handle was issued without a session
    pub fn is_noop(&self) -> bool {
        self.session.is_none()
    }

    /// Session id, `None` for the no-op handle
    pub fn id(&self) -> Option<Uuid> {
        self.session.as_ref().map(|s| s.id)
    }

    /// Cancel a pending start and silence the engine
    pub fn stop(&self) {
        let Some(session) = &self.session else {
            return;
        };
        session.manager.with_session(session.id, |inner| {
            if let Some(active) = inner.active.as_mut() {
                active.state = SessionState::Stopped;
                active.speak_at = None;
            }
            inner.cancel_engine();
        });
    }

    pub fn pause(&self) {
        self.engine_call("pausing", |engine| engine.pause());
    }

    pub fn resume(&self) {
        self.engine_call("resuming", |engine| engine.resume());
    }

    pub fn is_paused(&self) -> bool {
        self.engine_query("checking pause state", |engine| engine.is_paused())
    }

    /// Started by this handle and the engine reports speech
    pub fn is_speaking(&self) -> bool {
        let Some(session) = &self.session else {
            return false;
        };
        session
            .manager
            .with_session(session.id, |inner| {
                let started = inner
                    .active
                    .as_ref()
                    .is_some_and(|s| s.state == SessionState::Speaking);
                started
                    && inner.engine.as_ref().is_some_and(|engine| match engine.is_speaking() {
                        Ok(speaking) => speaking,
                        Err(e) => {
                            error!("Error checking speaking state: {}", e);
                            false
                        }
                    })
            })
            .unwrap_or(false)
    }

    /// Current lifecycle state; superseded sessions report `Stopped`
    pub fn state(&self) -> SessionState {
        let Some(session) = &self.session else {
            return SessionState::Stopped;
        };
        session
            .manager
            .with_session(session.id, |inner| {
                inner.active.as_ref().map(|s| s.state)
            })
            .flatten()
            .unwrap_or(SessionState::Stopped)
    }

    fn engine_call(&self, what: &str, f: impl FnOnce(&dyn SpeechEngine) -> crate::Result<()>) {
        let Some(session) = &self.session else {
            return;
        };
        session.manager.with_session(session.id, |inner| {
            if let Some(engine) = &inner.engine {
                if let Err(e) = f(engine.as_ref()) {
                    error!("Error {} speech: {}", what, e);
                }
            }
        });
    }

    fn engine_query(&self, what: &str, f: impl FnOnce(&dyn SpeechEngine) -> crate::Result<bool>) -> bool {
        let Some(session) = &self.session else {
            return false;
        };
        session
            .manager
            .with_session(session.id, |inner| match &inner.engine {
                Some(engine) => f(engine.as_ref()).unwrap_or_else(|e| {
                    error!("Error {}: {}", what, e);
                    false
                }),
                None => false,
            })
            .unwrap_or(false)
    }
}

impl std::fmt::Debug for SpeechControl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpeechControl")
            .field("session", &self.id())
            .finish()
    }
}
