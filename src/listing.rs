//! Live, filtered and sorted view over one directory.
//!
//! Entries live in an arena keyed by their path; the visible order is a
//! vector of lightweight ids into that arena. Presentations subscribe as
//! [`ListingObserver`]s and receive index-based deltas, so the model never
//! needs to know whether it is drawn as a grid, a list or anything else.

use std::collections::HashMap;
use std::ops::{Index, IndexMut};
use std::path::{Path, PathBuf};

use crate::entry::Entry;
use crate::pattern::NamePattern;
use crate::selection::SelectionSet;
use crate::sorting::{SortSpec, compare};

/// Change notification for presentations, expressed against the visible order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingDelta {
    /// The whole order was replaced.
    Reset { len: usize },
    Inserted { index: usize },
    Removed { index: usize },
    /// Same position, new attributes (icon, label, size).
    Refreshed { index: usize },
}

#[cfg_attr(test, mockall::automock)]
pub trait ListingObserver {
    fn notify(&mut self, delta: &ListingDelta);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntryId(usize);

#[derive(Debug)]
struct Slot {
    entry: Entry,
    visible: bool,
}

#[derive(Debug, Default)]
struct Arena {
    slots: Vec<Option<Slot>>,
    free: Vec<usize>,
}

impl Arena {
    fn insert(&mut self, slot: Slot) -> EntryId {
        match self.free.pop() {
            Some(index) => {
                self.slots[index] = Some(slot);
                EntryId(index)
            }
            None => {
                self.slots.push(Some(slot));
                EntryId(self.slots.len() - 1)
            }
        }
    }

    fn remove(&mut self, id: EntryId) -> Option<Slot> {
        let slot = self.slots.get_mut(id.0)?.take();
        if slot.is_some() {
            self.free.push(id.0);
        }
        slot
    }

    fn drain(&mut self) -> impl Iterator<Item = Slot> + '_ {
        self.free.clear();
        self.slots.drain(..).flatten()
    }
}

impl Index<EntryId> for Arena {
    type Output = Slot;

    fn index(&self, id: EntryId) -> &Slot {
        match &self.slots[id.0] {
            Some(slot) => slot,
            None => unreachable!("entry id {} refers to a freed slot", id.0),
        }
    }
}

impl IndexMut<EntryId> for Arena {
    fn index_mut(&mut self, id: EntryId) -> &mut Slot {
        match &mut self.slots[id.0] {
            Some(slot) => slot,
            None => unreachable!("entry id {} refers to a freed slot", id.0),
        }
    }
}

pub struct ListingViewModel {
    arena: Arena,
    ids: HashMap<PathBuf, EntryId>,
    order: Vec<EntryId>,
    pattern: NamePattern,
    show_hidden: bool,
    sort: SortSpec,
    selection: SelectionSet,
    observers: Vec<Box<dyn ListingObserver>>,
}

impl Default for ListingViewModel {
    fn default() -> Self {
        Self::new(NamePattern::any(), false, SortSpec::default())
    }
}

impl ListingViewModel {
    pub fn new(pattern: NamePattern, show_hidden: bool, sort: SortSpec) -> Self {
        Self {
            arena: Arena::default(),
            ids: HashMap::new(),
            order: Vec::new(),
            pattern,
            show_hidden,
            sort,
            selection: SelectionSet::new(),
            observers: Vec::new(),
        }
    }

    pub fn add_observer(&mut self, observer: Box<dyn ListingObserver>) {
        self.observers.push(observer);
    }

    pub fn pattern(&self) -> &NamePattern {
        &self.pattern
    }

    pub fn show_hidden(&self) -> bool {
        self.show_hidden
    }

    pub fn sort_spec(&self) -> &SortSpec {
        &self.sort
    }

    /// Whether `entry` belongs in the visible order under the current filter.
    pub fn accepts(&self, entry: &Entry) -> bool {
        (self.show_hidden || !entry.is_hidden) && self.pattern.is_match(&entry.name)
    }

    // ------------------------------------------------------------------
    // Wholesale updates
    // ------------------------------------------------------------------

    /// Replaces the snapshot and filter settings, then rebuilds the order.
    pub fn rebuild(
        &mut self,
        snapshot: Vec<Entry>,
        pattern: NamePattern,
        show_hidden: bool,
        sort: SortSpec,
    ) {
        self.pattern = pattern;
        self.show_hidden = show_hidden;
        self.sort = sort;
        self.rebuild_from(snapshot);
    }

    /// Replaces the snapshot, keeping the current filter and sort.
    pub fn replace_snapshot(&mut self, snapshot: Vec<Entry>) {
        self.rebuild_from(snapshot);
    }

    pub fn set_filter(&mut self, pattern: NamePattern, show_hidden: bool) {
        self.pattern = pattern;
        self.show_hidden = show_hidden;
        let snapshot = self.take_snapshot();
        self.rebuild_from(snapshot);
    }

    pub fn set_sort(&mut self, sort: SortSpec) {
        self.sort = sort;
        let snapshot = self.take_snapshot();
        self.rebuild_from(snapshot);
    }

    /// Drops every entry, e.g. when the directory is abandoned.
    pub fn clear(&mut self) {
        self.rebuild_from(Vec::new());
    }

    fn take_snapshot(&mut self) -> Vec<Entry> {
        self.ids.clear();
        self.order.clear();
        self.arena.drain().map(|slot| slot.entry).collect()
    }

    fn rebuild_from(&mut self, snapshot: Vec<Entry>) {
        // Build everything aside and swap it in at the end so the old order
        // stays intact until the new one is complete.
        let mut arena = Arena::default();
        let mut ids: HashMap<PathBuf, EntryId> = HashMap::with_capacity(snapshot.len());

        for entry in snapshot {
            let visible = self.accepts(&entry);
            match ids.get(&entry.path) {
                // Later duplicates replace earlier ones
                Some(&id) => arena[id] = Slot { entry, visible },
                None => {
                    let identity = entry.path.clone();
                    let id = arena.insert(Slot { entry, visible });
                    ids.insert(identity, id);
                }
            }
        }

        let mut order: Vec<EntryId> = ids
            .values()
            .copied()
            .filter(|id| arena[*id].visible)
            .collect();
        let sort = self.sort;
        order.sort_by(|a, b| compare(&arena[*a].entry, &arena[*b].entry, &sort));

        self.arena = arena;
        self.ids = ids;
        self.order = order;

        let (arena, ids) = (&self.arena, &self.ids);
        self.selection.retain(|identity| {
            ids.get(identity).is_some_and(|id| arena[*id].visible)
        });

        log::debug!(
            "Listing rebuilt: {} visible of {} entries",
            self.order.len(),
            self.ids.len()
        );
        self.emit(ListingDelta::Reset {
            len: self.order.len(),
        });
    }

    // ------------------------------------------------------------------
    // Incremental updates
    // ------------------------------------------------------------------

    /// Inserts new entries at their sorted position. Entries already known
    /// are treated as changes, so repeated notifications never duplicate.
    pub fn on_created<I>(&mut self, entries: I)
    where
        I: IntoIterator<Item = Entry>,
    {
        for entry in entries {
            if self.ids.contains_key(&entry.path) {
                self.apply_change(entry);
            } else if self.accepts(&entry) {
                self.insert_new(entry);
            }
        }
    }

    /// Removes entries by identity. Unknown identities are ignored.
    pub fn on_deleted<I, P>(&mut self, identities: I)
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        for identity in identities {
            let identity = identity.as_ref();
            let Some(id) = self.ids.get(identity).copied() else {
                log::trace!("Ignoring stale delete for {}", identity.display());
                continue;
            };
            if self.arena[id].visible {
                self.hide(id);
            }
            self.ids.remove(identity);
            self.arena.remove(id);
        }
    }

    pub fn on_changed<I>(&mut self, entries: I)
    where
        I: IntoIterator<Item = Entry>,
    {
        for entry in entries {
            if self.ids.contains_key(&entry.path) {
                self.apply_change(entry);
            } else if self.accepts(&entry) {
                self.insert_new(entry);
            }
        }
    }

    fn insert_new(&mut self, entry: Entry) {
        let index = self.insertion_point(&entry);
        let identity = entry.path.clone();
        let id = self.arena.insert(Slot {
            entry,
            visible: true,
        });
        self.ids.insert(identity, id);
        self.order.insert(index, id);
        self.emit(ListingDelta::Inserted { index });
    }

    fn apply_change(&mut self, entry: Entry) {
        let Some(id) = self.ids.get(&entry.path).copied() else {
            return;
        };
        let passes = self.accepts(&entry);

        match (self.arena[id].visible, passes) {
            (true, true) => {
                let old_index = self.index_of(id);
                if let Some(old_index) = old_index {
                    self.order.remove(old_index);
                }
                let new_index = self.insertion_point(&entry);
                self.arena[id].entry = entry;
                self.order.insert(new_index, id);

                match old_index {
                    Some(old_index) if old_index == new_index => {
                        self.emit(ListingDelta::Refreshed { index: new_index })
                    }
                    Some(old_index) => {
                        self.emit(ListingDelta::Removed { index: old_index });
                        self.emit(ListingDelta::Inserted { index: new_index });
                    }
                    None => self.emit(ListingDelta::Inserted { index: new_index }),
                }
            }
            (true, false) => {
                self.hide(id);
                self.arena[id].entry = entry;
            }
            (false, true) => {
                let index = self.insertion_point(&entry);
                self.arena[id] = Slot {
                    entry,
                    visible: true,
                };
                self.order.insert(index, id);
                self.emit(ListingDelta::Inserted { index });
            }
            (false, false) => self.arena[id].entry = entry,
        }
    }

    /// Takes a visible entry out of the order and the selection.
    fn hide(&mut self, id: EntryId) {
        if let Some(index) = self.index_of(id) {
            self.order.remove(index);
            self.emit(ListingDelta::Removed { index });
        }
        let slot = &mut self.arena[id];
        slot.visible = false;
        self.selection.deselect(&slot.entry.path);
    }

    fn insertion_point(&self, entry: &Entry) -> usize {
        match self
            .order
            .binary_search_by(|probe| compare(&self.arena[*probe].entry, entry, &self.sort))
        {
            Ok(index) | Err(index) => index,
        }
    }

    fn index_of(&self, id: EntryId) -> Option<usize> {
        let entry = &self.arena[id].entry;
        match self
            .order
            .binary_search_by(|probe| compare(&self.arena[*probe].entry, entry, &self.sort))
        {
            Ok(index) if self.order[index] == id => Some(index),
            _ => self.order.iter().position(|probe| *probe == id),
        }
    }

    fn emit(&mut self, delta: ListingDelta) {
        for observer in &mut self.observers {
            observer.notify(&delta);
        }
    }

    // ------------------------------------------------------------------
    // Reading
    // ------------------------------------------------------------------

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Number of known entries, including the ones filtered out.
    pub fn snapshot_len(&self) -> usize {
        self.ids.len()
    }

    pub fn get(&self, index: usize) -> Option<&Entry> {
        self.order.get(index).map(|id| &self.arena[*id].entry)
    }

    pub fn entries(&self) -> impl Iterator<Item = &Entry> {
        self.order.iter().map(move |id| &self.arena[*id].entry)
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries().map(|e| e.name.as_str()).collect()
    }

    pub fn position(&self, identity: &Path) -> Option<usize> {
        let id = *self.ids.get(identity)?;
        if !self.arena[id].visible {
            return None;
        }
        self.index_of(id)
    }

    /// Visible entries only.
    pub fn contains(&self, identity: &Path) -> bool {
        self.ids
            .get(identity)
            .is_some_and(|id| self.arena[*id].visible)
    }

    /// Any known entry, visible or filtered out.
    pub fn entry(&self, identity: &Path) -> Option<&Entry> {
        self.ids.get(identity).map(|id| &self.arena[*id].entry)
    }

    // ------------------------------------------------------------------
    // Selection
    // ------------------------------------------------------------------

    pub fn selection(&self) -> &SelectionSet {
        &self.selection
    }

    pub fn select(&mut self, identity: &Path) -> bool {
        self.contains(identity) && self.selection.select(identity)
    }

    pub fn deselect(&mut self, identity: &Path) -> bool {
        self.selection.deselect(identity)
    }

    pub fn toggle(&mut self, identity: &Path) -> bool {
        if !self.contains(identity) {
            return false;
        }
        self.selection.toggle(identity)
    }

    pub fn select_all(&mut self) {
        let arena = &self.arena;
        self.selection
            .select_all(self.order.iter().map(|id| arena[*id].entry.path.as_path()));
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    pub fn invert_selection(&mut self) {
        let arena = &self.arena;
        self.selection
            .invert(self.order.iter().map(|id| arena[*id].entry.path.as_path()));
    }

    /// Selects visible entries matching `pattern` and deselects the rest.
    pub fn select_pattern(&mut self, pattern: &str) {
        let pattern = NamePattern::new(pattern);
        let arena = &self.arena;
        self.selection.select_matching(
            self.order.iter().map(|id| {
                let entry = &arena[*id].entry;
                (entry.path.as_path(), entry.name.as_str())
            }),
            &pattern,
        );
    }

    /// Adds visible entries by name; unknown names are skipped. Returns how
    /// many were selected.
    pub fn select_names<S: AsRef<str>>(&mut self, names: &[S]) -> usize {
        let mut selected = 0;
        for name in names {
            let found = self
                .order
                .iter()
                .map(|id| &self.arena[*id].entry)
                .find(|entry| entry.name == name.as_ref())
                .map(|entry| entry.path.clone());
            if let Some(identity) = found {
                self.selection.select(&identity);
                selected += 1;
            }
        }
        selected
    }

    pub fn selected_entries(&self) -> impl Iterator<Item = &Entry> {
        self.entries()
            .filter(move |entry| self.selection.contains(&entry.path))
    }

    /// Selected names in view order.
    pub fn selected_names(&self) -> Vec<String> {
        self.selected_entries().map(|e| e.name.clone()).collect()
    }
}
