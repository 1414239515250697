use std::collections::BTreeSet;
use std::collections::btree_set;

/// Archive paths determined reachable. Only ever grows until the prune.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeepSet(BTreeSet<String>);

impl KeepSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true when the path was not already kept.
    pub fn insert(&mut self, path: impl Into<String>) -> bool {
        self.0.insert(path.into())
    }

    pub fn contains(&self, path: &str) -> bool {
        self.0.contains(path)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> btree_set::Iter<'_, String> {
        self.0.iter()
    }

    pub fn union(&self, other: &KeepSet) -> KeepSet {
        KeepSet(self.0.union(&other.0).cloned().collect())
    }
}

impl FromIterator<String> for KeepSet {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        KeepSet(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a KeepSet {
    type Item = &'a String;
    type IntoIter = btree_set::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
