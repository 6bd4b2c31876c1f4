use anyhow::{Context, Result};
use qasida::catalog::PoemCatalog;
use qasida::integration::{FeaturedPoemView, QasidaConfig};
use qasida::playback::PlaybackEvent;
use qasida::speech::{SimulatedEngine, Voice};
use qasida::utils::SystemClock;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_CATALOG: &str = "demos/poems.json";
const TICK_INTERVAL: Duration = Duration::from_millis(10);

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "qasida=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Qasida verse player");

    let mut args = std::env::args().skip(1);
    let catalog_path = args.next().unwrap_or_else(|| DEFAULT_CATALOG.to_string());
    let poem_id = args.next();

    let config = match std::env::var("QASIDA_CONFIG") {
        Ok(path) => QasidaConfig::load(&path)
            .with_context(|| format!("Failed to load config from {}", path))?,
        Err(_) => QasidaConfig::default(),
    };

    let catalog = PoemCatalog::load(&catalog_path)
        .with_context(|| format!("Failed to load poems from {}", catalog_path))?;
    let poem = match &poem_id {
        Some(id) => catalog.get(id)?.clone(),
        None => catalog
            .featured()
            .cloned()
            .context("Catalog contains no poems")?,
    };

    let clock = Arc::new(SystemClock::new());
    let engine = Arc::new(
        SimulatedEngine::new(clock.clone())
            .with_voices(vec![
                Voice::new("Maged", "ar-SA").as_default(),
                Voice::new("Alex", "en-US"),
            ]),
    );

    let mut view = FeaturedPoemView::mount(poem, Some(engine), clock, &config)?;
    let events = view.controller().event_receiver();
    view.controller_mut().play();

    let mut interval = tokio::time::interval(TICK_INTERVAL);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    loop {
        tokio::select! {
            _ = interval.tick() => {
                view.controller_mut().tick();

                let mut finished = false;
                for event in events.try_iter() {
                    match &event {
                        PlaybackEvent::Started { verse } | PlaybackEvent::VerseChanged { verse } => {
                            info!("Verse {}: {}", verse + 1, view.poem().verses[*verse]);
                        }
                        PlaybackEvent::Status(message) => warn!("{}", message),
                        PlaybackEvent::Finished => finished = true,
                        other => info!("{:?}", other),
                    }
                }
                if finished {
                    info!("Recitation complete");
                    break;
                }
            }
            _ = &mut ctrl_c => {
                info!("Interrupted");
                break;
            }
        }
    }

    view.unmount();
    Ok(())
}
