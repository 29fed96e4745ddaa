//! Navigation controller tying history, listing and the lister together.

use std::path::{Component, Path, PathBuf};
use std::sync::mpsc::{Receiver, RecvTimeoutError, TryRecvError};
use std::time::Duration;

use crate::directory::{DirectoryEvent, DirectoryLister, Listing};
use crate::error::NavigationError;
use crate::history::PathHistory;
use crate::listing::ListingViewModel;
use crate::pattern::NamePattern;
use crate::probe::FsProbe;
use crate::sorting::SortSpec;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NavMode {
    #[default]
    Normal,
    Back,
    Forward,
}

/// Lexically normalizes `path`: drops `.` components and folds `..` into the
/// preceding component. `..` never climbs above the root.
pub fn normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match normalized.components().next_back() {
                Some(Component::Normal(_)) => {
                    normalized.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                // Relative path climbing above its start
                _ => normalized.push(".."),
            },
            other => normalized.push(other),
        }
    }
    normalized
}

/// Owns the history and listing of one browser view and applies lister
/// events to them. Everything happens on the owning thread; the lister's
/// background work only reaches the model through the event receiver.
pub struct BrowseController<L: DirectoryLister, P: FsProbe> {
    lister: L,
    probe: P,
    events: Receiver<DirectoryEvent>,
    history: PathHistory,
    model: ListingViewModel,
    loading: bool,
    // Change events that arrived while the listing was still loading
    deferred: Vec<DirectoryEvent>,
}

impl<L: DirectoryLister, P: FsProbe> BrowseController<L, P> {
    pub fn new(lister: L, events: Receiver<DirectoryEvent>, probe: P) -> Self {
        Self::with_model(lister, events, probe, ListingViewModel::default())
    }

    pub fn with_model(
        lister: L,
        events: Receiver<DirectoryEvent>,
        probe: P,
        model: ListingViewModel,
    ) -> Self {
        Self {
            lister,
            probe,
            events,
            history: PathHistory::new(),
            model,
            loading: false,
            deferred: Vec::new(),
        }
    }

    pub fn history(&self) -> &PathHistory {
        &self.history
    }

    pub fn model(&self) -> &ListingViewModel {
        &self.model
    }

    pub fn model_mut(&mut self) -> &mut ListingViewModel {
        &mut self.model
    }

    pub fn lister(&self) -> &L {
        &self.lister
    }

    pub fn current_dir(&self) -> Option<&Path> {
        self.history.current()
    }

    /// True between a `Pending` listing and its `ListingReady`.
    pub fn is_loading(&self) -> bool {
        self.loading
    }

    fn absolutize(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            return normalize(path);
        }
        match self.history.current() {
            Some(current) => normalize(&current.join(path)),
            None => std::path::absolute(path)
                .map(|p| normalize(&p))
                .unwrap_or_else(|_| normalize(path)),
        }
    }

    fn validate(&self, dir: &Path) -> Result<(), NavigationError> {
        if !self.probe.exists(dir) {
            return Err(NavigationError::NotFound(dir.to_path_buf()));
        }
        if !self.probe.is_directory(dir) {
            return Err(NavigationError::NotADirectory(dir.to_path_buf()));
        }
        if !self.probe.can_enter(dir) {
            return Err(NavigationError::AccessDenied(dir.to_path_buf()));
        }
        Ok(())
    }

    /// Changes the current directory.
    ///
    /// Nothing is mutated when validation fails. In `Back`/`Forward` mode the
    /// path is expected to be the top of the corresponding stack; any other
    /// path is treated as a normal navigation.
    pub fn chdir(&mut self, path: &Path, mode: NavMode) -> Result<(), NavigationError> {
        let target = self.absolutize(path);

        if mode == NavMode::Normal && self.history.current() == Some(target.as_path()) {
            return Ok(());
        }

        self.validate(&target)?;
        self.capture_selection();

        let previous = self.history.current().map(Path::to_path_buf);
        match mode {
            NavMode::Back if self.history.back_path() == Some(target.as_path()) => {
                self.history.go_back();
            }
            NavMode::Forward if self.history.forward_path() == Some(target.as_path()) => {
                self.history.go_forward();
            }
            _ => {
                self.history.navigate(&target);
            }
        }

        log::debug!(
            "chdir: {} -> {} ({:?})",
            previous
                .as_deref()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
            target.display(),
            mode
        );

        if let Some(previous) = previous.as_deref()
            && previous != target
        {
            self.lister.detach(previous);
        }
        self.lister.attach(&target);
        self.deferred.clear();

        match self.lister.load(&target, false) {
            Listing::Ready(entries) => {
                self.loading = false;
                self.model.replace_snapshot(entries);
                self.restore_selection();
            }
            Listing::Pending => {
                self.loading = true;
                self.model.clear();
            }
        }
        Ok(())
    }

    /// Goes back one step. `Ok(false)` when there is nothing to go back to.
    pub fn go_back(&mut self) -> Result<bool, NavigationError> {
        let Some(target) = self.history.back_path().map(Path::to_path_buf) else {
            return Ok(false);
        };
        self.chdir(&target, NavMode::Back)?;
        Ok(true)
    }

    pub fn go_forward(&mut self) -> Result<bool, NavigationError> {
        let Some(target) = self.history.forward_path().map(Path::to_path_buf) else {
            return Ok(false);
        };
        self.chdir(&target, NavMode::Forward)?;
        Ok(true)
    }

    /// Re-reads the current directory. Returns false, doing nothing, while a
    /// load is in progress or before the first navigation.
    pub fn refresh(&mut self, preserve_selection: bool) -> bool {
        if self.loading {
            log::debug!("refresh skipped: load in progress");
            return false;
        }
        let Some(dir) = self.history.current().map(Path::to_path_buf) else {
            return false;
        };

        if preserve_selection {
            self.capture_selection();
        } else {
            self.history.forget_selection(&dir);
            self.model.clear_selection();
        }

        match self.lister.load(&dir, true) {
            Listing::Ready(entries) => {
                self.model.replace_snapshot(entries);
                self.restore_selection();
            }
            Listing::Pending => {
                self.loading = true;
                self.model.clear();
            }
        }
        true
    }

    pub fn set_filter(&mut self, pattern: NamePattern, show_hidden: bool) {
        self.model.set_filter(pattern, show_hidden);
    }

    pub fn set_sort(&mut self, sort: SortSpec) {
        self.model.set_sort(sort);
    }

    /// Applies every queued event without blocking. Returns how many events
    /// changed the model or the current directory.
    pub fn pump_events(&mut self) -> usize {
        let mut applied = 0;
        loop {
            match self.events.try_recv() {
                Ok(event) => {
                    if self.handle_event(event) {
                        applied += 1;
                    }
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        applied
    }

    /// Blocks up to `timeout` for one event, then drains the rest of the
    /// queue. Returns whether anything was applied.
    pub fn wait_event(&mut self, timeout: Duration) -> bool {
        match self.events.recv_timeout(timeout) {
            Ok(event) => {
                let applied = self.handle_event(event);
                self.pump_events() > 0 || applied
            }
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => false,
        }
    }

    fn handle_event(&mut self, event: DirectoryEvent) -> bool {
        if self.history.current() != Some(event.dir()) {
            log::trace!("Ignoring event for {}", event.dir().display());
            return false;
        }

        match event {
            DirectoryEvent::ListingReady { entries, .. } => {
                self.loading = false;
                self.model.replace_snapshot(entries);
                self.restore_selection();
                // Replaying is safe: every incremental update is idempotent
                for deferred in std::mem::take(&mut self.deferred) {
                    self.handle_event(deferred);
                }
                true
            }
            DirectoryEvent::Created { .. }
            | DirectoryEvent::Changed { .. }
            | DirectoryEvent::Deleted { .. }
                if self.loading =>
            {
                self.deferred.push(event);
                false
            }
            DirectoryEvent::Created { entries, .. } => {
                self.model.on_created(entries);
                true
            }
            DirectoryEvent::Changed { entries, .. } => {
                self.model.on_changed(entries);
                true
            }
            DirectoryEvent::Deleted { entries, .. } => {
                self.model.on_deleted(entries.iter());
                true
            }
            DirectoryEvent::DirectoryRemoved { dir } => {
                log::info!("Current directory removed: {}", dir.display());
                self.loading = false;
                self.deferred.clear();
                self.model.clear();
                self.lister.detach(&dir);
                if let Some(ancestor) = self.nearest_existing_ancestor(&dir)
                    && let Err(e) = self.chdir(&ancestor, NavMode::Normal)
                {
                    log::warn!("Failed to leave removed directory: {}", e);
                }
                true
            }
            DirectoryEvent::LoadFailed { dir, error } => {
                log::warn!("Failed to list {}: {}", dir.display(), error);
                self.loading = false;
                self.deferred.clear();
                true
            }
        }
    }

    fn nearest_existing_ancestor(&self, dir: &Path) -> Option<PathBuf> {
        dir.ancestors()
            .skip(1)
            .find(|candidate| {
                self.probe.is_directory(candidate) && self.probe.can_enter(candidate)
            })
            .map(Path::to_path_buf)
    }

    fn capture_selection(&mut self) {
        if let Some(current) = self.history.current().map(Path::to_path_buf) {
            let names = self.model.selected_names();
            self.history.remember_selection(&current, names);
        }
    }

    fn restore_selection(&mut self) {
        if let Some(dir) = self.history.current()
            && let Some(names) = self.history.recall_selection(dir)
        {
            let restored = self.model.select_names(names);
            log::debug!("Restored {} of {} selected entries", restored, names.len());
        }
    }
}
