use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::pattern::NamePattern;

/// Identities of the selected entries. Independent of ordering; the listing
/// keeps it a subset of what is visible.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionSet {
    selected: HashSet<PathBuf>,
}

impl SelectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.selected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    pub fn contains(&self, identity: &Path) -> bool {
        self.selected.contains(identity)
    }

    /// Returns false if it was already selected.
    pub fn select(&mut self, identity: &Path) -> bool {
        self.selected.insert(identity.to_path_buf())
    }

    pub fn deselect(&mut self, identity: &Path) -> bool {
        self.selected.remove(identity)
    }

    /// Flips one identity, returning its new state.
    pub fn toggle(&mut self, identity: &Path) -> bool {
        if self.selected.remove(identity) {
            false
        } else {
            self.selected.insert(identity.to_path_buf());
            true
        }
    }

    pub fn clear(&mut self) {
        self.selected.clear();
    }

    pub fn select_all<'a, I>(&mut self, visible: I)
    where
        I: IntoIterator<Item = &'a Path>,
    {
        self.selected
            .extend(visible.into_iter().map(Path::to_path_buf));
    }

    pub fn invert<'a, I>(&mut self, visible: I)
    where
        I: IntoIterator<Item = &'a Path>,
    {
        let inverted = visible
            .into_iter()
            .filter(|identity| !self.selected.contains(*identity))
            .map(Path::to_path_buf)
            .collect();
        self.selected = inverted;
    }

    /// Selects every visible entry whose name matches and deselects the rest.
    pub fn select_matching<'a, I>(&mut self, visible: I, pattern: &NamePattern)
    where
        I: IntoIterator<Item = (&'a Path, &'a str)>,
    {
        self.selected = visible
            .into_iter()
            .filter(|(_, name)| pattern.is_match(name))
            .map(|(identity, _)| identity.to_path_buf())
            .collect();
    }

    pub fn retain<F>(&mut self, mut keep: F)
    where
        F: FnMut(&Path) -> bool,
    {
        self.selected.retain(|identity| keep(identity));
    }

    pub fn iter(&self) -> impl Iterator<Item = &Path> {
        self.selected.iter().map(PathBuf::as_path)
    }
}
