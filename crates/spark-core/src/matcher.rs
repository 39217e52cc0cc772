//! Shared-interest matching
//!
//! Intersects two [`InterestSet`]s category by category. The result keeps
//! the local user's ordering inside each category and always lists
//! academic, then sports, then media matches.

use crate::types::{InterestCategory, InterestSet};

/// Interests two users have in common
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SharedInterests {
    groups: Vec<(InterestCategory, Vec<String>)>,
}

impl SharedInterests {
    /// No shared interests: the confirmation flow must not start
    pub fn is_empty(&self) -> bool {
        self.groups.iter().all(|(_, items)| items.is_empty())
    }

    pub fn len(&self) -> usize {
        self.groups.iter().map(|(_, items)| items.len()).sum()
    }

    /// Matches grouped by category, in fixed category order
    pub fn by_category(&self) -> impl Iterator<Item = (InterestCategory, &[String])> {
        self.groups
            .iter()
            .map(|(category, items)| (*category, items.as_slice()))
    }

    /// All matches as one flat sequence
    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.groups.iter().flat_map(|(_, items)| items.iter())
    }

    pub fn into_vec(self) -> Vec<String> {
        self.groups.into_iter().flat_map(|(_, items)| items).collect()
    }
}

impl std::fmt::Display for SharedInterests {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let items: Vec<&str> = self.iter().map(String::as_str).collect();
        f.write_str(&items.join(", "))
    }
}

/// Intersect `mine` with `theirs`, preserving `mine`'s order
pub fn intersect(mine: &InterestSet, theirs: &InterestSet) -> SharedInterests {
    let groups = InterestCategory::ALL
        .iter()
        .map(|&category| {
            let other = theirs.category(category);
            let shared = mine
                .category(category)
                .iter()
                .filter(|interest| other.contains(interest))
                .cloned()
                .collect();
            (category, shared)
        })
        .collect();
    SharedInterests { groups }
}
