//! Directory listing collaborator: snapshot loading plus change notifications.
//!
//! The browse controller only talks to the [`DirectoryLister`] trait. The
//! local implementation reads directories on a background thread, keeps a
//! cache of the last snapshot per directory, and while a directory is
//! attached it re-reads it on every `notify` event and emits the diff.

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Instant, SystemTime};

use crate::entry::{Entry, EntryKind};
use crate::error::ListingError;

/// Notification from a lister, tagged with the directory it concerns.
#[derive(Debug, Clone)]
pub enum DirectoryEvent {
    ListingReady { dir: PathBuf, entries: Vec<Entry> },
    Created { dir: PathBuf, entries: Vec<Entry> },
    Changed { dir: PathBuf, entries: Vec<Entry> },
    Deleted { dir: PathBuf, entries: Vec<Entry> },
    DirectoryRemoved { dir: PathBuf },
    LoadFailed { dir: PathBuf, error: Arc<ListingError> },
}

impl DirectoryEvent {
    pub fn dir(&self) -> &Path {
        match self {
            Self::ListingReady { dir, .. }
            | Self::Created { dir, .. }
            | Self::Changed { dir, .. }
            | Self::Deleted { dir, .. }
            | Self::DirectoryRemoved { dir }
            | Self::LoadFailed { dir, .. } => dir,
        }
    }
}

/// Result of asking for a directory snapshot.
#[derive(Debug, Clone, PartialEq)]
pub enum Listing {
    /// Served from cache, usable right away.
    Ready(Vec<Entry>),
    /// A `ListingReady` (or `LoadFailed`) event will follow.
    Pending,
}

#[cfg_attr(test, mockall::automock)]
pub trait DirectoryLister {
    /// Requests the entries of `dir`. `force` bypasses any cache.
    fn load(&mut self, dir: &Path, force: bool) -> Listing;

    /// Starts emitting change events for `dir`.
    fn attach(&mut self, dir: &Path);

    fn detach(&mut self, dir: &Path);
}

#[derive(Debug, Default, PartialEq)]
pub struct DirectoryDiff {
    pub created: Vec<Entry>,
    pub changed: Vec<Entry>,
    pub deleted: Vec<Entry>,
}

impl DirectoryDiff {
    pub fn is_empty(&self) -> bool {
        self.created.is_empty() && self.changed.is_empty() && self.deleted.is_empty()
    }
}

/// Computes the diff between two snapshots of the same directory.
pub fn compute_diff(old: &[Entry], new: &[Entry]) -> DirectoryDiff {
    let old_map: HashMap<&Path, &Entry> = old.iter().map(|e| (e.path.as_path(), e)).collect();
    let new_map: HashMap<&Path, &Entry> = new.iter().map(|e| (e.path.as_path(), e)).collect();
    let mut diff = DirectoryDiff::default();

    for new_entry in new {
        match old_map.get(new_entry.path.as_path()) {
            None => diff.created.push(new_entry.clone()),
            Some(old_entry) if new_entry.is_modified_from(old_entry) => {
                diff.changed.push(new_entry.clone())
            }
            Some(_) => {}
        }
    }

    for old_entry in old {
        if !new_map.contains_key(old_entry.path.as_path()) {
            diff.deleted.push(old_entry.clone());
        }
    }

    diff
}

/// Reads every entry of `dir`.
///
/// Entries that vanish between `readdir` and `stat` are skipped; entries whose
/// metadata cannot be read are kept with minimal information.
pub fn read_directory(dir: &Path) -> Result<Vec<Entry>, ListingError> {
    let start = Instant::now();
    let mut entries = Vec::new();

    for dir_entry in fs::read_dir(dir)? {
        let dir_entry = dir_entry?;
        let path = dir_entry.path();
        match Entry::from_path(&path) {
            Ok(entry) => entries.push(entry),
            Err(e) if e.kind() == ErrorKind::NotFound => continue,
            Err(_) => {
                let is_symlink = dir_entry
                    .file_type()
                    .map(|ft| ft.is_symlink())
                    .unwrap_or(false);
                let kind = if is_symlink {
                    EntryKind::Symlink
                } else {
                    EntryKind::Other
                };
                entries.push(Entry::new(path, kind));
            }
        }
    }

    log::debug!(
        "read_directory: path={}, entries={}, took={}ms",
        dir.display(),
        entries.len(),
        start.elapsed().as_millis()
    );
    Ok(entries)
}

fn directory_mtime(dir: &Path) -> Option<SystemTime> {
    fs::metadata(dir).and_then(|m| m.modified()).ok()
}

struct CachedListing {
    entries: Vec<Entry>,
    /// Directory mtime when `entries` were read.
    dir_modified: Option<SystemTime>,
    /// Kept current by a watcher since it was stored. Cleared on detach.
    watched: bool,
}

type ListingCache = Arc<Mutex<HashMap<PathBuf, CachedListing>>>;

fn lock(cache: &ListingCache) -> MutexGuard<'_, HashMap<PathBuf, CachedListing>> {
    cache.lock().unwrap_or_else(PoisonError::into_inner)
}

/// [`DirectoryLister`] for the local filesystem.
pub struct LocalDirectoryLister {
    cache: ListingCache,
    watchers: HashMap<PathBuf, RecommendedWatcher>,
    events: Sender<DirectoryEvent>,
}

impl LocalDirectoryLister {
    pub fn new(events: Sender<DirectoryEvent>) -> Self {
        Self {
            cache: Arc::new(Mutex::new(HashMap::new())),
            watchers: HashMap::new(),
            events,
        }
    }

    /// Lister plus the receiving end of its event stream.
    pub fn channel() -> (Self, Receiver<DirectoryEvent>) {
        let (tx, rx) = mpsc::channel();
        (Self::new(tx), rx)
    }

    pub fn is_attached(&self, dir: &Path) -> bool {
        self.watchers.contains_key(dir)
    }

    pub fn cached(&self, dir: &Path) -> Option<Vec<Entry>> {
        lock(&self.cache).get(dir).map(|c| c.entries.clone())
    }

    /// Forgets the cached snapshot of `dir`.
    pub fn evict(&mut self, dir: &Path) {
        lock(&self.cache).remove(dir);
    }

    fn cache_hit(&self, dir: &Path) -> Option<Vec<Entry>> {
        let cache = lock(&self.cache);
        let cached = cache.get(dir)?;
        let watched = cached.watched && self.is_attached(dir);
        if watched || cached.dir_modified == directory_mtime(dir) {
            Some(cached.entries.clone())
        } else {
            None
        }
    }

    fn spawn_read(&self, dir: &Path) {
        let dir = dir.to_path_buf();
        let cache = Arc::clone(&self.cache);
        let tx = self.events.clone();

        thread::spawn(move || {
            let dir_modified = directory_mtime(&dir);
            let event = match read_directory(&dir) {
                Ok(entries) => {
                    lock(&cache).insert(
                        dir.clone(),
                        CachedListing {
                            entries: entries.clone(),
                            dir_modified,
                            watched: false,
                        },
                    );
                    DirectoryEvent::ListingReady { dir, entries }
                }
                Err(e) => DirectoryEvent::LoadFailed {
                    dir,
                    error: Arc::new(e),
                },
            };
            if tx.send(event).is_err() {
                // Receiver dropped, nobody is browsing anymore
            }
        });
    }
}

impl DirectoryLister for LocalDirectoryLister {
    fn load(&mut self, dir: &Path, force: bool) -> Listing {
        if !force && let Some(entries) = self.cache_hit(dir) {
            log::debug!("Listing cache hit: {}", dir.display());
            return Listing::Ready(entries);
        }
        self.spawn_read(dir);
        Listing::Pending
    }

    fn attach(&mut self, dir: &Path) {
        if self.is_attached(dir) {
            return;
        }

        let watched = dir.to_path_buf();
        let cache = Arc::clone(&self.cache);
        let tx = self.events.clone();

        let watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
            match res {
                // Reads do not change what a listing shows
                Ok(event) if matches!(event.kind, EventKind::Access(_)) => {}
                Ok(_) => rescan(&watched, &cache, &tx),
                Err(e) => {
                    // Errors often mean the watched directory itself went away
                    log::debug!("Watch error on {}: {}", watched.display(), e);
                    rescan(&watched, &cache, &tx);
                }
            }
        });

        let mut watcher = match watcher {
            Ok(watcher) => watcher,
            Err(e) => {
                log::warn!("Failed to create watcher for {}: {}", dir.display(), e);
                return;
            }
        };

        if let Err(e) = watcher.watch(dir, RecursiveMode::NonRecursive) {
            log::warn!("Failed to watch {}: {}", dir.display(), ListingError::from(e));
            return;
        }

        self.watchers.insert(dir.to_path_buf(), watcher);
    }

    fn detach(&mut self, dir: &Path) {
        // Dropping the watcher stops it
        if self.watchers.remove(dir).is_some() {
            log::debug!("Stopped watching {}", dir.display());
        }
        // Changes from here on go unseen until the mtime says otherwise
        if let Some(cached) = lock(&self.cache).get_mut(dir) {
            cached.watched = false;
        }
    }
}

/// Re-reads a watched directory and emits what changed since the cached snapshot.
fn rescan(dir: &Path, cache: &ListingCache, tx: &Sender<DirectoryEvent>) {
    let dir_modified = directory_mtime(dir);
    let new_entries = match read_directory(dir) {
        Ok(entries) => entries,
        Err(ListingError::Io(e)) if e.kind() == ErrorKind::NotFound => {
            log::info!("Watched directory removed: {}", dir.display());
            lock(cache).remove(dir);
            let _ = tx.send(DirectoryEvent::DirectoryRemoved {
                dir: dir.to_path_buf(),
            });
            return;
        }
        Err(e) => {
            // Silently ignore permission denied, the user may have revoked access
            if !matches!(&e, ListingError::Io(io) if io.kind() == ErrorKind::PermissionDenied) {
                log::warn!("Failed to re-read {}: {}", dir.display(), e);
            }
            return;
        }
    };

    let diff = {
        let mut cache = lock(cache);
        let old_entries = cache
            .get(dir)
            .map(|c| c.entries.as_slice())
            .unwrap_or_default();
        let diff = compute_diff(old_entries, &new_entries);
        cache.insert(
            dir.to_path_buf(),
            CachedListing {
                entries: new_entries,
                dir_modified,
                watched: true,
            },
        );
        diff
    };

    if diff.is_empty() {
        return;
    }

    let dir = dir.to_path_buf();
    let events = [
        (!diff.created.is_empty()).then(|| DirectoryEvent::Created {
            dir: dir.clone(),
            entries: diff.created,
        }),
        (!diff.changed.is_empty()).then(|| DirectoryEvent::Changed {
            dir: dir.clone(),
            entries: diff.changed,
        }),
        (!diff.deleted.is_empty()).then(|| DirectoryEvent::Deleted {
            dir: dir.clone(),
            entries: diff.deleted,
        }),
    ];
    for event in events.into_iter().flatten() {
        if tx.send(event).is_err() {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::helpers::*;
    use std::time::Duration;

    const WAIT: Duration = Duration::from_secs(5);

    #[test]
    fn test_compute_diff_addition() {
        let old = vec![create_test_entry("a.txt", EntryKind::Regular)];
        let new = vec![
            create_test_entry("a.txt", EntryKind::Regular),
            create_test_entry("b.txt", EntryKind::Regular),
        ];

        let diff = compute_diff(&old, &new);
        assert_eq!(diff.created.len(), 1);
        assert_eq!(diff.created[0].name, "b.txt");
        assert!(diff.changed.is_empty());
        assert!(diff.deleted.is_empty());
    }

    #[test]
    fn test_compute_diff_removal() {
        let old = vec![
            create_test_entry("a.txt", EntryKind::Regular),
            create_test_entry("b.txt", EntryKind::Regular),
        ];
        let new = vec![create_test_entry("a.txt", EntryKind::Regular)];

        let diff = compute_diff(&old, &new);
        assert_eq!(diff.deleted.len(), 1);
        assert_eq!(diff.deleted[0].name, "b.txt");
    }

    #[test]
    fn test_compute_diff_modification() {
        let old = vec![create_test_entry("a.txt", EntryKind::Regular).with_size(100)];
        let new = vec![create_test_entry("a.txt", EntryKind::Regular).with_size(200)];

        let diff = compute_diff(&old, &new);
        assert_eq!(diff.changed.len(), 1);
        assert_eq!(diff.changed[0].size, 200);
    }

    #[test]
    fn test_compute_diff_no_change() {
        let old = vec![create_test_entry("a.txt", EntryKind::Regular)];
        let diff = compute_diff(&old, &old.clone());
        assert!(diff.is_empty());
    }

    #[test]
    fn test_read_directory() {
        let temp_fs = TestFileSystem::new().unwrap();
        temp_fs.create_file("one.txt", "1").unwrap();
        temp_fs.create_file(".hidden", "h").unwrap();
        temp_fs.create_directory("sub").unwrap();

        let mut entries = read_directory(temp_fs.get_path()).unwrap();
        entries.sort_by(|a, b| a.name.cmp(&b.name));

        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, [".hidden", "one.txt", "sub"]);
        assert!(entries[0].is_hidden);
        assert_eq!(entries[2].kind, EntryKind::Directory);
    }

    #[test]
    fn test_read_directory_missing() {
        let temp_fs = TestFileSystem::new().unwrap();
        let result = read_directory(&temp_fs.get_path().join("nope"));
        assert!(matches!(result, Err(ListingError::Io(e)) if e.kind() == ErrorKind::NotFound));
    }

    #[test]
    fn test_load_is_async_then_cached() {
        let temp_fs = TestFileSystem::new().unwrap();
        temp_fs.create_file("a.txt", "a").unwrap();
        let (mut lister, rx) = LocalDirectoryLister::channel();

        assert_eq!(lister.load(temp_fs.get_path(), false), Listing::Pending);
        match rx.recv_timeout(WAIT).unwrap() {
            DirectoryEvent::ListingReady { dir, entries } => {
                assert_eq!(dir, temp_fs.get_path());
                assert_eq!(entries.len(), 1);
            }
            other => panic!("unexpected event {:?}", other),
        }

        match lister.load(temp_fs.get_path(), false) {
            Listing::Ready(entries) => assert_eq!(entries[0].name, "a.txt"),
            Listing::Pending => panic!("expected a cache hit"),
        }
        assert!(lister.cached(temp_fs.get_path()).is_some());

        assert_eq!(lister.load(temp_fs.get_path(), true), Listing::Pending);
        assert!(matches!(
            rx.recv_timeout(WAIT).unwrap(),
            DirectoryEvent::ListingReady { .. }
        ));
    }

    #[test]
    fn test_load_missing_directory_fails() {
        let temp_fs = TestFileSystem::new().unwrap();
        let missing = temp_fs.get_path().join("missing");
        let (mut lister, rx) = LocalDirectoryLister::channel();

        assert_eq!(lister.load(&missing, false), Listing::Pending);
        let event = rx.recv_timeout(WAIT).unwrap();
        assert!(matches!(event, DirectoryEvent::LoadFailed { .. }));
        assert_eq!(event.dir(), missing.as_path());
    }

    #[test]
    fn test_evict_forces_reload() {
        let temp_fs = TestFileSystem::new().unwrap();
        let (mut lister, rx) = LocalDirectoryLister::channel();
        lister.load(temp_fs.get_path(), false);
        rx.recv_timeout(WAIT).unwrap();

        lister.evict(temp_fs.get_path());
        assert_eq!(lister.load(temp_fs.get_path(), false), Listing::Pending);
    }

    #[test]
    fn test_rescan_emits_diff_and_removal() {
        let temp_fs = TestFileSystem::new().unwrap();
        let dir = temp_fs.create_directory("watched").unwrap();
        let dir = PathBuf::from(dir);
        let cache: ListingCache = Arc::new(Mutex::new(HashMap::new()));
        let (tx, rx) = mpsc::channel();

        temp_fs.create_file("watched/new.txt", "n").unwrap();
        rescan(&dir, &cache, &tx);
        match rx.try_recv().unwrap() {
            DirectoryEvent::Created { entries, .. } => assert_eq!(entries[0].name, "new.txt"),
            other => panic!("unexpected event {:?}", other),
        }

        // Nothing changed since the last scan
        rescan(&dir, &cache, &tx);
        assert!(rx.try_recv().is_err());

        fs::remove_file(dir.join("new.txt")).unwrap();
        rescan(&dir, &cache, &tx);
        assert!(matches!(rx.try_recv().unwrap(), DirectoryEvent::Deleted { .. }));

        fs::remove_dir(&dir).unwrap();
        rescan(&dir, &cache, &tx);
        assert!(matches!(
            rx.try_recv().unwrap(),
            DirectoryEvent::DirectoryRemoved { .. }
        ));
    }

    #[test]
    fn test_reattached_directory_rechecks_mtime() {
        let temp_fs = TestFileSystem::new().unwrap();
        temp_fs.create_file("a.txt", "a").unwrap();
        let dir = temp_fs.get_path();
        let (mut lister, rx) = LocalDirectoryLister::channel();

        lister.load(dir, false);
        rx.recv_timeout(WAIT).unwrap();
        lister.attach(dir);
        lister.detach(dir);

        temp_fs.create_file("b.txt", "b").unwrap();
        let mtime = directory_mtime(dir);
        lock(&lister.cache)
            .get_mut(dir)
            .unwrap()
            .dir_modified = mtime.map(|t| t - Duration::from_secs(1));

        lister.attach(dir);
        assert_eq!(lister.load(dir, false), Listing::Pending);
        loop {
            match rx.recv_timeout(WAIT).unwrap() {
                DirectoryEvent::ListingReady { entries, .. } => {
                    assert_eq!(entries.len(), 2);
                    break;
                }
                _ => continue,
            }
        }
    }

    #[test]
    fn test_watched_snapshot_is_served_while_attached() {
        let temp_fs = TestFileSystem::new().unwrap();
        let dir = PathBuf::from(temp_fs.create_directory("watched").unwrap());
        let (mut lister, _rx) = LocalDirectoryLister::channel();

        lister.attach(&dir);
        rescan(&dir, &lister.cache, &lister.events);
        lock(&lister.cache).get_mut(&dir).unwrap().dir_modified = None;

        assert_eq!(lister.load(&dir, false), Listing::Ready(Vec::new()));
    }

    #[test]
    fn test_attach_and_detach() {
        let temp_fs = TestFileSystem::new().unwrap();
        let (mut lister, _rx) = LocalDirectoryLister::channel();

        lister.attach(temp_fs.get_path());
        assert!(lister.is_attached(temp_fs.get_path()));
        lister.attach(temp_fs.get_path());

        lister.detach(temp_fs.get_path());
        assert!(!lister.is_attached(temp_fs.get_path()));
    }
}
