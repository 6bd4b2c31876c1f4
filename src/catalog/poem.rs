use serde::{Deserialize, Serialize};

/// A poem in the collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Poem {
    pub id: String,
    pub title: String,
    pub poet: String,
    pub era: String,
    /// One entry per verse, in reading order
    pub verses: Vec<String>,
    pub excerpt: String,
    pub description: String,
    pub poet_bio: String,
    /// Whether the poem describes eyes
    #[serde(default)]
    pub has_eye_description: bool,
}

impl Poem {
    pub fn verse_count(&self) -> usize {
        self.verses.len()
    }

    /// Case-insensitive substring match over the searchable fields
    pub fn matches(&self, needle_lower: &str) -> bool {
        [&self.title, &self.poet, &self.era, &self.description]
            .iter()
            .any(|field| field.to_lowercase().contains(needle_lower))
    }
}
