use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Back/forward navigation stacks with per-directory selection memory.
///
/// `current` is `None` until the first navigation; that first directory is
/// never pushed onto `back`, so a freshly opened browser has nothing to go
/// back to.
#[derive(Debug, Clone, Default)]
pub struct PathHistory {
    back: Vec<PathBuf>,
    forward: Vec<PathBuf>,
    current: Option<PathBuf>,
    selection_memory: HashMap<PathBuf, Vec<String>>,
}

impl PathHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<&Path> {
        self.current.as_deref()
    }

    pub fn has_back(&self) -> bool {
        !self.back.is_empty()
    }

    pub fn has_forward(&self) -> bool {
        !self.forward.is_empty()
    }

    /// Where `go_back` would lead.
    pub fn back_path(&self) -> Option<&Path> {
        self.back.last().map(PathBuf::as_path)
    }

    pub fn forward_path(&self) -> Option<&Path> {
        self.forward.last().map(PathBuf::as_path)
    }

    pub fn back_len(&self) -> usize {
        self.back.len()
    }

    pub fn forward_len(&self) -> usize {
        self.forward.len()
    }

    /// Records a new (non-history) navigation. Returns false, changing
    /// nothing, when `path` is already current.
    pub fn navigate(&mut self, path: &Path) -> bool {
        if self.current.as_deref() == Some(path) {
            return false;
        }
        if let Some(previous) = self.current.replace(path.to_path_buf()) {
            self.back.push(previous);
        }
        self.forward.clear();
        true
    }

    pub fn go_back(&mut self) -> Option<&Path> {
        let target = self.back.pop()?;
        if let Some(previous) = self.current.replace(target) {
            self.forward.push(previous);
        }
        self.current()
    }

    pub fn go_forward(&mut self) -> Option<&Path> {
        let target = self.forward.pop()?;
        if let Some(previous) = self.current.replace(target) {
            self.back.push(previous);
        }
        self.current()
    }

    /// Overwrites any earlier record for `path`. An empty selection is not recorded.
    pub fn remember_selection(&mut self, path: &Path, names: Vec<String>) -> bool {
        if names.is_empty() {
            return false;
        }
        self.selection_memory.insert(path.to_path_buf(), names);
        true
    }

    pub fn recall_selection(&self, path: &Path) -> Option<&[String]> {
        self.selection_memory.get(path).map(Vec::as_slice)
    }

    pub fn forget_selection(&mut self, path: &Path) {
        self.selection_memory.remove(path);
    }
}
