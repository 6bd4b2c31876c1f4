//! Featured poem view
//!
//! Wires a speech session manager and a playback controller for one poem,
//! the way the home page mounts its featured poem.

use crate::catalog::Poem;
use crate::integration::config::QasidaConfig;
use crate::playback::VersePlaybackController;
use crate::speech::{SpeechEngine, SpeechSessionManager};
use crate::utils::clock::Clock;
use crate::Result;
use std::sync::Arc;
use tracing::info;

pub struct FeaturedPoemView {
    poem: Poem,
    speech: SpeechSessionManager,
    controller: VersePlaybackController,
}

impl FeaturedPoemView {
    /// Mount the view; `engine` is `None` on hosts without speech
    pub fn mount(
        poem: Poem,
        engine: Option<Arc<dyn SpeechEngine>>,
        clock: Arc<dyn Clock>,
        config: &QasidaConfig,
    ) -> Result<Self> {
        let speech = SpeechSessionManager::new(
            engine,
            clock.clone(),
            config.speech.clone(),
            config.availability.clone(),
        );
        let controller = VersePlaybackController::new(
            poem.verses.clone(),
            speech.clone(),
            clock,
            config.playback.clone(),
        )?;

        info!("Mounted \"{}\" by {}", poem.title, poem.poet);
        Ok(Self {
            poem,
            speech,
            controller,
        })
    }

    pub fn poem(&self) -> &Poem {
        &self.poem
    }

    pub fn speech(&self) -> &SpeechSessionManager {
        &self.speech
    }

    pub fn controller(&self) -> &VersePlaybackController {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut VersePlaybackController {
        &mut self.controller
    }

    /// Tear down timers and silence any speech
    pub fn unmount(mut self) {
        self.controller.teardown();
        self.speech.stop_all();
        info!("Unmounted \"{}\"", self.poem.title);
    }
}
