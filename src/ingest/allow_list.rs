//! Allow-list of repository owners whose pushes are admitted.

use std::collections::BTreeSet;
use std::fmt;

/// Set of authorized owners. Matching is exact and case-sensitive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OwnerAllowList {
    owners: BTreeSet<String>,
}

impl OwnerAllowList {
    /// Parses a comma-separated list. Blank entries are dropped and
    /// surrounding whitespace is trimmed.
    pub fn parse(list: &str) -> Self {
        list.split(',')
            .map(str::trim)
            .filter(|owner| !owner.is_empty())
            .collect()
    }

    pub fn contains(&self, owner: &str) -> bool {
        self.owners.contains(owner)
    }

    pub fn len(&self) -> usize {
        self.owners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for OwnerAllowList {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        OwnerAllowList {
            owners: iter.into_iter().map(Into::into).collect(),
        }
    }
}

impl fmt::Display for OwnerAllowList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let owners: Vec<&str> = self.owners.iter().map(String::as_str).collect();
        write!(f, "{}", owners.join(","))
    }
}
