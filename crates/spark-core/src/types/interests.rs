//! Interest sets - the three categories a user declares and shares on a tag.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One of the three fixed interest categories.
///
/// The declaration order is the order used for display and for
/// concatenating shared interests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InterestCategory {
    Academic,
    Sports,
    Media,
}

impl InterestCategory {
    /// All categories in their fixed order
    pub const ALL: [InterestCategory; 3] = [Self::Academic, Self::Sports, Self::Media];

    /// Human-readable label
    pub fn label(&self) -> &'static str {
        match self {
            Self::Academic => "Academic",
            Self::Sports => "Sports",
            Self::Media => "Media",
        }
    }
}

impl std::fmt::Display for InterestCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for InterestCategory {
    type Err = InterestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "academic" => Ok(Self::Academic),
            "sports" => Ok(Self::Sports),
            "media" => Ok(Self::Media),
            other => Err(InterestError::UnknownCategory(other.to_string())),
        }
    }
}

/// Rejected interest edits
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InterestError {
    /// The interest is empty after trimming
    #[error("Interest must not be empty")]
    EmptyInterest,

    /// The category already holds this interest
    #[error("{category} interests already contain '{interest}'")]
    DuplicateInterest {
        category: InterestCategory,
        interest: String,
    },

    /// Category name not recognised
    #[error("Unknown interest category '{0}'. Must be one of: academic, sports, media")]
    UnknownCategory(String),
}

/// A user's declared interests, grouped by category.
///
/// Each category is an ordered list without duplicates (case-sensitive).
/// Order is kept for display only; matching treats each list as a set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "InterestRecord")]
pub struct InterestSet {
    #[serde(rename = "academicInterests")]
    academic: Vec<String>,
    #[serde(rename = "sportsInterests")]
    sports: Vec<String>,
    #[serde(rename = "mediaInterests")]
    media: Vec<String>,
}

impl Default for InterestSet {
    /// Interests every new profile starts with
    fn default() -> Self {
        Self::from_lists(
            ["Math", "Science"],
            ["Football", "Basketball"],
            ["Movies", "Music"],
        )
    }
}

impl InterestSet {
    /// An interest set with all three categories empty
    pub fn empty() -> Self {
        Self {
            academic: Vec::new(),
            sports: Vec::new(),
            media: Vec::new(),
        }
    }

    /// Build from three lists, dropping repeated entries (first one wins)
    pub fn from_lists<A, S, M>(academic: A, sports: S, media: M) -> Self
    where
        A: IntoIterator,
        A::Item: Into<String>,
        S: IntoIterator,
        S::Item: Into<String>,
        M: IntoIterator,
        M::Item: Into<String>,
    {
        Self {
            academic: dedup(academic),
            sports: dedup(sports),
            media: dedup(media),
        }
    }

    pub fn academic(&self) -> &[String] {
        &self.academic
    }

    pub fn sports(&self) -> &[String] {
        &self.sports
    }

    pub fn media(&self) -> &[String] {
        &self.media
    }

    /// Interests of one category, in insertion order
    pub fn category(&self, category: InterestCategory) -> &[String] {
        match category {
            InterestCategory::Academic => &self.academic,
            InterestCategory::Sports => &self.sports,
            InterestCategory::Media => &self.media,
        }
    }

    fn category_mut(&mut self, category: InterestCategory) -> &mut Vec<String> {
        match category {
            InterestCategory::Academic => &mut self.academic,
            InterestCategory::Sports => &mut self.sports,
            InterestCategory::Media => &mut self.media,
        }
    }

    /// Append an interest to a category.
    ///
    /// The value is trimmed first. Empty values and values already present
    /// in the category are rejected.
    pub fn add(&mut self, category: InterestCategory, interest: &str) -> Result<(), InterestError> {
        let interest = interest.trim();
        if interest.is_empty() {
            return Err(InterestError::EmptyInterest);
        }
        let list = self.category_mut(category);
        if list.iter().any(|existing| existing == interest) {
            return Err(InterestError::DuplicateInterest {
                category,
                interest: interest.to_string(),
            });
        }
        list.push(interest.to_string());
        Ok(())
    }

    /// Remove an interest from a category. Returns whether it was present.
    pub fn remove(&mut self, category: InterestCategory, interest: &str) -> bool {
        let list = self.category_mut(category);
        let before = list.len();
        list.retain(|existing| existing != interest);
        list.len() != before
    }

    /// Total number of interests across all categories
    pub fn len(&self) -> usize {
        self.academic.len() + self.sports.len() + self.media.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Stored shape of an interest set, deduplicated on load
#[derive(Deserialize)]
struct InterestRecord {
    #[serde(rename = "academicInterests")]
    academic: Vec<String>,
    #[serde(rename = "sportsInterests")]
    sports: Vec<String>,
    #[serde(rename = "mediaInterests")]
    media: Vec<String>,
}

impl From<InterestRecord> for InterestSet {
    fn from(record: InterestRecord) -> Self {
        Self::from_lists(record.academic, record.sports, record.media)
    }
}

fn dedup<I>(items: I) -> Vec<String>
where
    I: IntoIterator,
    I::Item: Into<String>,
{
    let mut out: Vec<String> = Vec::new();
    for item in items {
        let item = item.into();
        if !out.contains(&item) {
            out.push(item);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_interests() {
        let set = InterestSet::default();
        assert_eq!(set.academic(), ["Math", "Science"]);
        assert_eq!(set.sports(), ["Football", "Basketball"]);
        assert_eq!(set.media(), ["Movies", "Music"]);
    }

    #[test]
    fn test_from_lists_drops_duplicates() {
        let set = InterestSet::from_lists(["A", "B", "A"], Vec::<String>::new(), ["m", "M"]);
        assert_eq!(set.academic(), ["A", "B"]);
        assert!(set.sports().is_empty());
        // Case-sensitive: both kept
        assert_eq!(set.media(), ["m", "M"]);
    }

    #[test]
    fn test_add_trims_and_appends() {
        let mut set = InterestSet::empty();
        set.add(InterestCategory::Sports, "  Tennis ").unwrap();
        assert_eq!(set.sports(), ["Tennis"]);
    }

    #[test]
    fn test_add_rejects_empty_and_duplicate() {
        let mut set = InterestSet::default();
        assert_eq!(
            set.add(InterestCategory::Academic, "   "),
            Err(InterestError::EmptyInterest)
        );
        assert!(matches!(
            set.add(InterestCategory::Academic, "Math"),
            Err(InterestError::DuplicateInterest { .. })
        ));
        assert_eq!(set.academic().len(), 2);
    }

    #[test]
    fn test_remove() {
        let mut set = InterestSet::default();
        assert!(set.remove(InterestCategory::Media, "Movies"));
        assert!(!set.remove(InterestCategory::Media, "Movies"));
        assert_eq!(set.media(), ["Music"]);
    }

    #[test]
    fn test_category_from_str() {
        assert_eq!("Academic".parse::<InterestCategory>(), Ok(InterestCategory::Academic));
        assert_eq!(" sports ".parse::<InterestCategory>(), Ok(InterestCategory::Sports));
        assert!("cooking".parse::<InterestCategory>().is_err());
    }

    #[test]
    fn test_json_field_names() {
        let json = serde_json::to_value(InterestSet::empty()).unwrap();
        assert!(json.get("academicInterests").is_some());
        assert!(json.get("sportsInterests").is_some());
        assert!(json.get("mediaInterests").is_some());
    }

    #[test]
    fn test_deserialize_drops_duplicates() {
        let json = r#"{
            "academicInterests": ["Math", "Math", "Science"],
            "sportsInterests": [],
            "mediaInterests": ["Music", "music", "Music"]
        }"#;
        let set: InterestSet = serde_json::from_str(json).unwrap();
        assert_eq!(set.academic(), ["Math", "Science"]);
        assert_eq!(set.media(), ["Music", "music"]);
        assert_eq!(set.len(), 4);
    }
}
