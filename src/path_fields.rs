//! Keeps the name, extension, parent and full-path fields of a destination
//! in step with each other and classifies the destination on disk.
//!
//! The full path is the canonical value. Every edit goes through
//! [`PathFieldSynchronizer::edit`], which rewrites the sibling fields and
//! reclassifies. An edit that repeats the value a field already holds is an
//! echo of a write the synchronizer made itself and is ignored.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::browser::normalize;
use crate::error::InvalidPath;
use crate::probe::FsProbe;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PathField {
    Name,
    Extension,
    Parent,
    FullPath,
}

/// What the destination will be used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OperationMode {
    #[default]
    NewFile,
    NewDirectory,
    NewLink,
    Move,
    Copy,
    Link,
}

impl OperationMode {
    pub const ALL: [OperationMode; 6] = [
        OperationMode::NewFile,
        OperationMode::NewDirectory,
        OperationMode::NewLink,
        OperationMode::Move,
        OperationMode::Copy,
        OperationMode::Link,
    ];

    pub fn is_link(&self) -> bool {
        matches!(self, OperationMode::NewLink | OperationMode::Link)
    }

    /// Modes that create a new object rather than transfer an existing one.
    pub fn is_create(&self) -> bool {
        matches!(
            self,
            OperationMode::NewFile | OperationMode::NewDirectory | OperationMode::NewLink
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OperationMode::NewFile => "new-file",
            OperationMode::NewDirectory => "new-directory",
            OperationMode::NewLink => "new-link",
            OperationMode::Move => "move",
            OperationMode::Copy => "copy",
            OperationMode::Link => "link",
        }
    }

    pub fn parse(value: &str) -> Option<OperationMode> {
        Self::ALL.into_iter().find(|mode| mode.as_str() == value)
    }
}

/// Where the destination stands relative to the filesystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Clear,
    SameAsOriginal,
    TargetIsFile,
    TargetIsDirectory,
    ParentMissing,
    ParentIsFile,
}

impl Classification {
    pub fn same_as_original(&self) -> bool {
        *self == Classification::SameAsOriginal
    }

    pub fn target_exists_as_file(&self) -> bool {
        *self == Classification::TargetIsFile
    }

    pub fn target_exists_as_directory(&self) -> bool {
        *self == Classification::TargetIsDirectory
    }

    pub fn parent_missing(&self) -> bool {
        *self == Classification::ParentMissing
    }

    pub fn parent_is_a_file(&self) -> bool {
        *self == Classification::ParentIsFile
    }

    pub fn is_clear(&self) -> bool {
        *self == Classification::Clear
    }
}

/// Message shown next to the fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hint {
    Clear,
    SameAsOriginal,
    TargetIsFile,
    TargetIsDirectory,
    ParentMissing,
    ParentIsFile,
    Empty,
    Invalid,
}

impl Hint {
    pub fn message_id(&self) -> &'static str {
        match self {
            Hint::Clear => "hint-clear",
            Hint::SameAsOriginal => "hint-same-as-original",
            Hint::TargetIsFile => "hint-target-file",
            Hint::TargetIsDirectory => "hint-target-directory",
            Hint::ParentMissing => "hint-parent-missing",
            Hint::ParentIsFile => "hint-parent-file",
            Hint::Empty => "hint-empty",
            Hint::Invalid => "hint-invalid",
        }
    }
}

impl From<Classification> for Hint {
    fn from(classification: Classification) -> Self {
        match classification {
            Classification::Clear => Hint::Clear,
            Classification::SameAsOriginal => Hint::SameAsOriginal,
            Classification::TargetIsFile => Hint::TargetIsFile,
            Classification::TargetIsDirectory => Hint::TargetIsDirectory,
            Classification::ParentMissing => Hint::ParentMissing,
            Classification::ParentIsFile => Hint::ParentIsFile,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub classification: Classification,
    pub hint: Hint,
    pub confirm_enabled: bool,
    pub invalid: Option<InvalidPath>,
}

/// Splits a file name at its last dot. A leading dot (hidden file) or a
/// trailing dot does not start an extension.
pub fn split_name(full_name: &str) -> (&str, &str) {
    match full_name.rfind('.') {
        Some(0) | None => (full_name, ""),
        Some(index) if index + 1 == full_name.len() => (full_name, ""),
        Some(index) => (&full_name[..index], &full_name[index + 1..]),
    }
}

fn combine_name(name: &str, extension: &str) -> String {
    let extension = extension.strip_prefix('.').unwrap_or(extension);
    if extension.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", name, extension)
    }
}

fn display(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn check_field(value: &str) -> Option<InvalidPath> {
    if value.contains('\n') {
        Some(InvalidPath::new("contains a line break"))
    } else if value.contains('\0') {
        Some(InvalidPath::new("contains a NUL character"))
    } else {
        None
    }
}

/// Name and extension hold a single path component.
fn check_component(value: &str) -> Option<InvalidPath> {
    check_field(value).or_else(|| {
        value
            .chars()
            .any(std::path::is_separator)
            .then(|| InvalidPath::new("contains a path separator"))
    })
}

pub struct PathFieldSynchronizer<P: FsProbe> {
    probe: P,
    reference: PathBuf,
    mode: OperationMode,
    overwrite: bool,
    name: String,
    extension: String,
    parent: String,
    full_path: String,
    verdict: Verdict,
}

impl<P: FsProbe> PathFieldSynchronizer<P> {
    /// Starts with every field describing `reference`, the unedited location.
    pub fn new(probe: P, reference: &Path, mode: OperationMode) -> Self {
        let reference = normalize(reference);
        let mut synchronizer = Self {
            probe,
            reference,
            mode,
            overwrite: false,
            name: String::new(),
            extension: String::new(),
            parent: String::new(),
            full_path: String::new(),
            verdict: Verdict {
                classification: Classification::Clear,
                hint: Hint::Clear,
                confirm_enabled: false,
                invalid: None,
            },
        };
        let full_path = display(&synchronizer.reference);
        synchronizer.full_path = full_path;
        synchronizer.split_full_path();
        synchronizer.reclassify();
        synchronizer
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn parent(&self) -> &str {
        &self.parent
    }

    pub fn full_path(&self) -> &str {
        &self.full_path
    }

    pub fn field(&self, field: PathField) -> &str {
        match field {
            PathField::Name => &self.name,
            PathField::Extension => &self.extension,
            PathField::Parent => &self.parent,
            PathField::FullPath => &self.full_path,
        }
    }

    /// Name and extension as they would appear on disk.
    pub fn full_name(&self) -> String {
        combine_name(&self.name, &self.extension)
    }

    pub fn reference(&self) -> &Path {
        &self.reference
    }

    pub fn mode(&self) -> OperationMode {
        self.mode
    }

    pub fn overwrite(&self) -> bool {
        self.overwrite
    }

    pub fn verdict(&self) -> &Verdict {
        &self.verdict
    }

    fn reference_parent(&self) -> &Path {
        self.reference.parent().unwrap_or(&self.reference)
    }

    /// Resolves a parent field value to an absolute directory. Relative
    /// values are taken against the reference path's parent, never the
    /// working directory.
    pub fn resolve(&self, parent: &str) -> PathBuf {
        let base = self.reference_parent();
        match parent {
            "" | "." => base.to_path_buf(),
            ".." => base.parent().unwrap_or(base).to_path_buf(),
            _ => {
                let path = Path::new(parent);
                if path.is_absolute() {
                    normalize(path)
                } else {
                    normalize(&base.join(path))
                }
            }
        }
    }

    /// Absolute, normalized destination. `None` while the full path is empty.
    pub fn target(&self) -> Option<PathBuf> {
        if self.full_path.is_empty() {
            return None;
        }
        let path = Path::new(&self.full_path);
        Some(if path.is_absolute() {
            normalize(path)
        } else {
            normalize(&self.reference_parent().join(path))
        })
    }

    /// Applies a user edit to one field and returns the new verdict.
    pub fn edit(&mut self, field: PathField, text: &str) -> &Verdict {
        if self.field(field) == text {
            return &self.verdict;
        }

        match field {
            PathField::Name => {
                self.name = text.to_string();
                self.join_full_path();
            }
            PathField::Extension => {
                self.extension = text.to_string();
                self.join_full_path();
            }
            PathField::Parent => {
                self.parent = text.to_string();
                self.join_full_path();
            }
            PathField::FullPath => {
                self.full_path = text.to_string();
                self.split_full_path();
            }
        }

        self.reclassify();
        &self.verdict
    }

    pub fn set_mode(&mut self, mode: OperationMode) -> &Verdict {
        self.mode = mode;
        self.reclassify();
        &self.verdict
    }

    pub fn set_overwrite(&mut self, overwrite: bool) -> &Verdict {
        self.overwrite = overwrite;
        self.reclassify();
        &self.verdict
    }

    fn join_full_path(&mut self) {
        let full_name = self.full_name();
        self.full_path = if full_name.is_empty() {
            String::new()
        } else {
            display(&self.resolve(&self.parent).join(full_name))
        };
    }

    fn split_full_path(&mut self) {
        let path = Path::new(&self.full_path);
        let (dir, base) = match path.file_name() {
            Some(base) => (
                path.parent().unwrap_or(Path::new("")),
                base.to_string_lossy(),
            ),
            None => (path, "".into()),
        };

        let (name, extension) = split_name(&base);
        let (name, extension) = (name.to_string(), extension.to_string());
        let parent = display(&self.resolve(&dir.to_string_lossy()));

        self.name = name;
        self.extension = extension;
        self.parent = parent;
    }

    fn classify(&self, target: &Path) -> Classification {
        if target == self.reference && !self.mode.is_link() {
            return Classification::SameAsOriginal;
        }

        if self.probe.exists(target) {
            return if self.probe.is_directory(target) {
                Classification::TargetIsDirectory
            } else {
                Classification::TargetIsFile
            };
        }

        match target.parent() {
            Some(parent) if self.probe.exists(parent) => {
                if self.probe.is_directory(parent) {
                    Classification::Clear
                } else {
                    Classification::ParentIsFile
                }
            }
            _ => Classification::ParentMissing,
        }
    }

    fn confirmable(&self, classification: Classification) -> bool {
        match classification {
            Classification::Clear
            | Classification::ParentMissing
            | Classification::TargetIsFile => true,
            Classification::SameAsOriginal => self.overwrite,
            Classification::TargetIsDirectory => !self.mode.is_create() && self.overwrite,
            Classification::ParentIsFile => false,
        }
    }

    fn reclassify(&mut self) {
        let invalid = check_component(&self.name)
            .or_else(|| check_component(&self.extension))
            .or_else(|| check_field(&self.parent))
            .or_else(|| check_field(&self.full_path));

        let verdict = match self.target() {
            None => {
                let blank = self.name.trim().is_empty() && self.extension.trim().is_empty();
                Verdict {
                    classification: Classification::ParentMissing,
                    hint: if invalid.is_some() {
                        Hint::Invalid
                    } else if blank {
                        Hint::Empty
                    } else {
                        Hint::ParentMissing
                    },
                    confirm_enabled: false,
                    invalid,
                }
            }
            Some(target) => {
                let classification = self.classify(&target);
                Verdict {
                    classification,
                    hint: if invalid.is_some() {
                        Hint::Invalid
                    } else {
                        classification.into()
                    },
                    confirm_enabled: invalid.is_none() && self.confirmable(classification),
                    invalid,
                }
            }
        };

        log::trace!(
            "Path fields {:?} -> {:?} (confirm: {})",
            self.full_path,
            verdict.classification,
            verdict.confirm_enabled
        );
        self.verdict = verdict;
    }
}
