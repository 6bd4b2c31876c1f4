//! Poem collection
//!
//! Loads poems from JSON and answers the browsing queries: lookup by id, the
//! featured poem, explorer filters and hero search.

pub mod filter;
pub mod poem;

pub use filter::{FilterCategory, PoemFilter, DEFAULT_VERSE_RANGE};
pub use poem::Poem;

use crate::{QasidaError, Result};
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info};

/// Queries shorter than this (after trimming) return nothing
pub const MIN_SEARCH_LEN: usize = 2;

/// Number of results the hero search shows
pub const SEARCH_PREVIEW_LIMIT: usize = 5;

#[derive(Debug, Clone, Default)]
pub struct PoemCatalog {
    poems: Vec<Poem>,
}

impl PoemCatalog {
    pub fn new(poems: Vec<Poem>) -> Self {
        Self { poems }
    }

    /// Parse a JSON array of poems
    pub fn from_json_str(json: &str) -> Result<Self> {
        let poems: Vec<Poem> = serde_json::from_str(json)?;
        Ok(Self::new(poems))
    }

    /// Load a catalog from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            QasidaError::CatalogError(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let catalog = Self::from_json_str(&content)?;
        info!("Loaded {} poems from {}", catalog.len(), path.display());
        Ok(catalog)
    }

    pub fn poems(&self) -> &[Poem] {
        &self.poems
    }

    pub fn len(&self) -> usize {
        self.poems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.poems.is_empty()
    }

    pub fn get(&self, id: &str) -> Result<&Poem> {
        self.poems
            .iter()
            .find(|p| p.id == id)
            .ok_or_else(|| QasidaError::PoemNotFound(id.to_string()))
    }

    /// The poem shown on the home page (the first one)
    pub fn featured(&self) -> Option<&Poem> {
        self.poems.first()
    }

    /// Distinct eras in first-seen order
    pub fn eras(&self) -> Vec<&str> {
        unique(self.poems.iter().map(|p| p.era.as_str()))
    }

    /// Distinct poets in first-seen order
    pub fn poets(&self) -> Vec<&str> {
        unique(self.poems.iter().map(|p| p.poet.as_str()))
    }

    pub fn eye_description_count(&self) -> usize {
        self.poems.iter().filter(|p| p.has_eye_description).count()
    }

    pub fn filter(&self, filter: &PoemFilter) -> Vec<&Poem> {
        let result: Vec<&Poem> = self.poems.iter().filter(|p| filter.accepts(p)).collect();
        debug!("Filter {:?} matched {} poems", filter.category, result.len());
        result
    }

    /// Case-insensitive search over title, poet, era and description
    pub fn search(&self, query: &str) -> Vec<&Poem> {
        let query = query.trim();
        if query.chars().count() < MIN_SEARCH_LEN {
            return Vec::new();
        }
        let needle = query.to_lowercase();
        self.poems.iter().filter(|p| p.matches(&needle)).collect()
    }

    /// First `limit` search results
    pub fn search_preview(&self, query: &str, limit: usize) -> Vec<&Poem> {
        let mut results = self.search(query);
        results.truncate(limit);
        results
    }
}

fn unique<'a>(values: impl Iterator<Item = &'a str>) -> Vec<&'a str> {
    let mut seen = HashSet::new();
    values.filter(|v| seen.insert(*v)).collect()
}
