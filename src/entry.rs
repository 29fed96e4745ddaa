use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Regular,
    Directory,
    Symlink,
    Other,
}

impl EntryKind {
    pub fn label(&self) -> &'static str {
        match self {
            EntryKind::Regular => "Regular file",
            EntryKind::Directory => "Directory",
            EntryKind::Symlink => "Symbolic link",
            EntryKind::Other => "Special file",
        }
    }

    pub fn type_char(&self) -> char {
        match self {
            EntryKind::Regular => '-',
            EntryKind::Directory => 'd',
            EntryKind::Symlink => 'l',
            EntryKind::Other => '?',
        }
    }
}

/// Handle to a MIME classification. Lookup itself belongs to `mime_guess`;
/// the listing only stores and compares the result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MimeType {
    pub essence: String,
    pub description: String,
}

impl MimeType {
    pub fn guess(path: &Path, kind: EntryKind) -> Self {
        match kind {
            EntryKind::Directory => Self {
                essence: "inode/directory".to_string(),
                description: "Folder".to_string(),
            },
            EntryKind::Symlink => Self {
                essence: "inode/symlink".to_string(),
                description: "Link".to_string(),
            },
            EntryKind::Other => Self {
                essence: "inode/x-special".to_string(),
                description: "Special file".to_string(),
            },
            EntryKind::Regular => match mime_guess::from_path(path).first() {
                Some(mime) => {
                    let ext = path
                        .extension()
                        .map(|e| e.to_string_lossy().to_uppercase())
                        .unwrap_or_default();
                    let family = match mime.type_().as_str() {
                        "text" => "document",
                        "image" => "image",
                        "audio" => "audio",
                        "video" => "video",
                        _ => "file",
                    };
                    Self {
                        essence: mime.essence_str().to_string(),
                        description: format!("{} {}", ext, family),
                    }
                }
                None => Self {
                    essence: "application/octet-stream".to_string(),
                    description: "File".to_string(),
                },
            },
        }
    }
}

/// One filesystem object as seen by a listing. The absolute path is its identity.
///
/// Entries are values: a change notification produces a new `Entry` that
/// replaces the old one instead of patching it.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub path: PathBuf,
    pub name: String,
    pub kind: EntryKind,
    /// Symlink whose target is a directory.
    pub points_to_directory: bool,
    pub is_hidden: bool,
    pub size: u64,
    pub accessed: Option<SystemTime>,
    pub created: Option<SystemTime>,
    pub changed: Option<SystemTime>,
    pub modified: Option<SystemTime>,
    pub owner: String,
    pub group: String,
    pub permissions: String,
    pub mime: Option<MimeType>,
}

impl Entry {
    pub fn new<P: Into<PathBuf>>(path: P, kind: EntryKind) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());
        let is_hidden = is_hidden_name(&name);
        Self {
            path,
            name,
            kind,
            points_to_directory: false,
            is_hidden,
            size: 0,
            accessed: None,
            created: None,
            changed: None,
            modified: None,
            owner: String::new(),
            group: String::new(),
            permissions: String::new(),
            mime: None,
        }
    }

    /// Builds an entry from on-disk metadata without following the final symlink.
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let metadata = fs::symlink_metadata(path)?;
        let file_type = metadata.file_type();

        let kind = if file_type.is_symlink() {
            EntryKind::Symlink
        } else if file_type.is_dir() {
            EntryKind::Directory
        } else if file_type.is_file() {
            EntryKind::Regular
        } else {
            EntryKind::Other
        };

        let mut entry = Self::new(path, kind);

        // Handle symlinks that point to directories
        if kind == EntryKind::Symlink
            && let Ok(target_metadata) = fs::metadata(path)
        {
            entry.points_to_directory = target_metadata.is_dir();
        }

        entry.size = metadata.len();
        entry.accessed = metadata.accessed().ok();
        entry.created = metadata.created().ok();
        entry.modified = metadata.modified().ok();
        entry.mime = Some(MimeType::guess(path, kind));
        fill_unix_fields(&mut entry, &metadata);

        Ok(entry)
    }

    pub fn identity(&self) -> &Path {
        &self.path
    }

    /// Directories and symlinks to directories group together when sorting.
    pub fn is_dir_like(&self) -> bool {
        self.kind == EntryKind::Directory || self.points_to_directory
    }

    pub fn kind_label(&self) -> &'static str {
        if self.kind == EntryKind::Symlink && self.points_to_directory {
            return "Link to directory";
        }
        self.kind.label()
    }

    pub fn mime_description(&self) -> &str {
        self.mime.as_ref().map(|m| m.description.as_str()).unwrap_or("")
    }

    pub fn with_size(mut self, size: u64) -> Self {
        self.size = size;
        self
    }

    pub fn with_modified(mut self, modified: SystemTime) -> Self {
        self.modified = Some(modified);
        self
    }

    /// True when the attributes a listing shows differ from `old`.
    pub fn is_modified_from(&self, old: &Entry) -> bool {
        self.size != old.size
            || self.modified != old.modified
            || self.changed != old.changed
            || self.permissions != old.permissions
            || self.kind != old.kind
            || self.points_to_directory != old.points_to_directory
            || self.owner != old.owner
            || self.group != old.group
    }
}

impl AsRef<Path> for Entry {
    fn as_ref(&self) -> &Path {
        &self.path
    }
}

pub fn is_hidden_name(name: &str) -> bool {
    name.starts_with('.')
}

#[cfg(unix)]
fn fill_unix_fields(entry: &mut Entry, metadata: &fs::Metadata) {
    use std::os::unix::fs::MetadataExt;
    use std::time::Duration;

    if metadata.ctime() >= 0 {
        entry.changed = Some(
            SystemTime::UNIX_EPOCH
                + Duration::new(metadata.ctime() as u64, metadata.ctime_nsec() as u32),
        );
    }
    entry.owner = owners::owner_name(metadata.uid());
    entry.group = owners::group_name(metadata.gid());
    entry.permissions = permission_string(entry.kind, metadata.mode());
}

#[cfg(not(unix))]
fn fill_unix_fields(entry: &mut Entry, metadata: &fs::Metadata) {
    let write = if metadata.permissions().readonly() { '-' } else { 'w' };
    entry.permissions = format!("{}r{}-", entry.kind.type_char(), write);
}

/// `ls -l` style mode string, e.g. `drwxr-xr-x`.
pub fn permission_string(kind: EntryKind, mode: u32) -> String {
    let mut out = String::with_capacity(10);
    out.push(kind.type_char());

    let special = [(0o4000, 's', 'S'), (0o2000, 's', 'S'), (0o1000, 't', 'T')];
    for (shift, (special_bit, set_exec, set_no_exec)) in [6u32, 3, 0].into_iter().zip(special) {
        let bits = (mode >> shift) & 0o7;
        out.push(if bits & 0o4 != 0 { 'r' } else { '-' });
        out.push(if bits & 0o2 != 0 { 'w' } else { '-' });
        let exec = bits & 0o1 != 0;
        out.push(match (mode & special_bit != 0, exec) {
            (true, true) => set_exec,
            (true, false) => set_no_exec,
            (false, true) => 'x',
            (false, false) => '-',
        });
    }
    out
}

#[cfg(unix)]
mod owners {
    use std::collections::HashMap;
    use std::sync::{LazyLock, RwLock};
    use uzers::{get_group_by_gid, get_user_by_uid};

    static OWNER_CACHE: LazyLock<RwLock<HashMap<u32, String>>> =
        LazyLock::new(|| RwLock::new(HashMap::new()));
    static GROUP_CACHE: LazyLock<RwLock<HashMap<u32, String>>> =
        LazyLock::new(|| RwLock::new(HashMap::new()));

    pub(super) fn owner_name(uid: u32) -> String {
        if let Ok(cache) = OWNER_CACHE.read()
            && let Some(name) = cache.get(&uid)
        {
            return name.clone();
        }
        let name = get_user_by_uid(uid)
            .map(|u| u.name().to_string_lossy().into_owned())
            .unwrap_or_else(|| uid.to_string());
        if let Ok(mut cache) = OWNER_CACHE.write() {
            cache.insert(uid, name.clone());
        }
        name
    }

    pub(super) fn group_name(gid: u32) -> String {
        if let Ok(cache) = GROUP_CACHE.read()
            && let Some(name) = cache.get(&gid)
        {
            return name.clone();
        }
        let name = get_group_by_gid(gid)
            .map(|g| g.name().to_string_lossy().into_owned())
            .unwrap_or_else(|| gid.to_string());
        if let Ok(mut cache) = GROUP_CACHE.write() {
            cache.insert(gid, name.clone());
        }
        name
    }
}
