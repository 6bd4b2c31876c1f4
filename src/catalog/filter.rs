use crate::catalog::poem::Poem;
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;

/// Default verse-count range of the explorer slider
pub const DEFAULT_VERSE_RANGE: RangeInclusive<usize> = 0..=20;

/// Which poems the explorer shows
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterCategory {
    #[default]
    All,
    /// Poems that describe eyes
    EyeDescriptions,
    Era(String),
    Poet(String),
}

/// Explorer filter: a category plus an inclusive verse-count range
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoemFilter {
    pub category: FilterCategory,
    pub verse_range: RangeInclusive<usize>,
}

impl Default for PoemFilter {
    fn default() -> Self {
        Self {
            category: FilterCategory::All,
            verse_range: DEFAULT_VERSE_RANGE,
        }
    }
}

impl PoemFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_category(mut self, category: FilterCategory) -> Self {
        self.category = category;
        self
    }

    pub fn with_verse_range(mut self, range: RangeInclusive<usize>) -> Self {
        self.verse_range = range;
        self
    }

    /// Back to all poems and the default range
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn accepts(&self, poem: &Poem) -> bool {
        let in_category = match &self.category {
            FilterCategory::All => true,
            FilterCategory::EyeDescriptions => poem.has_eye_description,
            FilterCategory::Era(era) => &poem.era == era,
            FilterCategory::Poet(poet) => &poem.poet == poet,
        };
        in_category && self.verse_range.contains(&poem.verse_count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn poem(era: &str, verses: usize, eyes: bool) -> Poem {
        Poem {
            id: format!("{}-{}", era, verses),
            title: "t".into(),
            poet: "p".into(),
            era: era.into(),
            verses: vec!["v".to_string(); verses],
            excerpt: String::new(),
            description: String::new(),
            poet_bio: String::new(),
            has_eye_description: eyes,
        }
    }

    #[test]
    fn test_range_is_inclusive() {
        let filter = PoemFilter::new().with_verse_range(2..=4);
        assert!(!filter.accepts(&poem("Abbasid", 1, false)));
        assert!(filter.accepts(&poem("Abbasid", 2, false)));
        assert!(filter.accepts(&poem("Abbasid", 4, false)));
        assert!(!filter.accepts(&poem("Abbasid", 5, false)));
    }

    #[test]
    fn test_category_and_range_combine() {
        let filter = PoemFilter::new()
            .with_category(FilterCategory::EyeDescriptions)
            .with_verse_range(0..=3);
        assert!(filter.accepts(&poem("Umayyad", 3, true)));
        assert!(!filter.accepts(&poem("Umayyad", 3, false)));
        assert!(!filter.accepts(&poem("Umayyad", 21, true)));
    }

    #[test]
    fn test_reset() {
        let mut filter = PoemFilter::new()
            .with_category(FilterCategory::Era("Andalusian".into()))
            .with_verse_range(5..=6);
        filter.reset();
        assert_eq!(filter, PoemFilter::default());
        assert_eq!(filter.verse_range, 0..=20);
    }
}
