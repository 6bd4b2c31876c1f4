//! Integration layer
//!
//! Configuration loading and the featured poem view that ties the speech
//! manager and the playback controller together.

pub mod config;
pub mod session;

pub use config::QasidaConfig;
pub use session::FeaturedPoemView;
