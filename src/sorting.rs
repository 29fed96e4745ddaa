//! Sorting configuration and the comparator used by every listing.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::time::SystemTime;

use crate::entry::Entry;

// ============================================================================
// Sorting configuration
// ============================================================================

/// Attribute to sort entries by.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    #[default]
    Name,
    Size,
    #[serde(rename = "bytes")]
    SizeInBytes,
    Kind,
    #[serde(rename = "mime")]
    MimeDescription,
    Permissions,
    Owner,
    Group,
    #[serde(rename = "atime")]
    Accessed,
    #[serde(rename = "btime")]
    Created,
    #[serde(rename = "ctime")]
    Changed,
    #[serde(rename = "mtime")]
    Modified,
}

impl SortKey {
    pub const ALL: [SortKey; 12] = [
        SortKey::Name,
        SortKey::Size,
        SortKey::SizeInBytes,
        SortKey::Kind,
        SortKey::MimeDescription,
        SortKey::Permissions,
        SortKey::Owner,
        SortKey::Group,
        SortKey::Accessed,
        SortKey::Created,
        SortKey::Changed,
        SortKey::Modified,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SortKey::Name => "name",
            SortKey::Size => "size",
            SortKey::SizeInBytes => "bytes",
            SortKey::Kind => "kind",
            SortKey::MimeDescription => "mime",
            SortKey::Permissions => "permissions",
            SortKey::Owner => "owner",
            SortKey::Group => "group",
            SortKey::Accessed => "atime",
            SortKey::Created => "btime",
            SortKey::Changed => "ctime",
            SortKey::Modified => "mtime",
        }
    }

    pub fn parse(value: &str) -> Option<SortKey> {
        Self::ALL.into_iter().find(|key| key.as_str() == value)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

/// Placement of hidden entries relative to visible ones.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum HiddenPolicy {
    #[default]
    First,
    Last,
    Mixed,
}

/// Placement of directories relative to other entries.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum KindGrouping {
    #[default]
    DirectoriesFirst,
    DirectoriesLast,
    Mixed,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SortSpec {
    pub key: SortKey,
    pub direction: SortDirection,
    /// Digit-aware comparison ("img2" before "img10").
    pub natural: bool,
    pub case_sensitive: bool,
    pub hidden: HiddenPolicy,
    pub grouping: KindGrouping,
}

impl Default for SortSpec {
    fn default() -> Self {
        Self {
            key: SortKey::Name,
            direction: SortDirection::Ascending,
            natural: true,
            case_sensitive: false,
            hidden: HiddenPolicy::First,
            grouping: KindGrouping::DirectoriesFirst,
        }
    }
}

// ============================================================================
// Sorting logic
// ============================================================================

/// Total order over entries for `spec`.
///
/// Grouping and hidden placement are applied first and are not affected by
/// the direction. The primary key is followed by name and then by path, so
/// two distinct entries never compare equal.
pub fn compare(a: &Entry, b: &Entry, spec: &SortSpec) -> Ordering {
    let grouped = match spec.grouping {
        KindGrouping::DirectoriesFirst => b.is_dir_like().cmp(&a.is_dir_like()),
        KindGrouping::DirectoriesLast => a.is_dir_like().cmp(&b.is_dir_like()),
        KindGrouping::Mixed => Ordering::Equal,
    };
    if grouped != Ordering::Equal {
        return grouped;
    }

    let hidden = match spec.hidden {
        HiddenPolicy::First => b.is_hidden.cmp(&a.is_hidden),
        HiddenPolicy::Last => a.is_hidden.cmp(&b.is_hidden),
        HiddenPolicy::Mixed => Ordering::Equal,
    };
    if hidden != Ordering::Equal {
        return hidden;
    }

    let ordered = compare_key(a, b, spec)
        .then_with(|| {
            if spec.key == SortKey::Name {
                Ordering::Equal
            } else {
                compare_text(&a.name, &b.name, spec)
            }
        })
        .then_with(|| a.path.cmp(&b.path));

    match spec.direction {
        SortDirection::Ascending => ordered,
        SortDirection::Descending => ordered.reverse(),
    }
}

/// Stable sort of `entries` by `spec`.
pub fn sort_entries(entries: &mut [Entry], spec: &SortSpec) {
    entries.sort_by(|a, b| compare(a, b, spec));
}

fn compare_key(a: &Entry, b: &Entry, spec: &SortSpec) -> Ordering {
    match spec.key {
        SortKey::Name => compare_text(&a.name, &b.name, spec),
        // Both size columns order by the raw byte count, never the display text
        SortKey::Size | SortKey::SizeInBytes => a.size.cmp(&b.size),
        SortKey::Kind => compare_text(a.kind_label(), b.kind_label(), spec),
        SortKey::MimeDescription => compare_text(a.mime_description(), b.mime_description(), spec),
        SortKey::Permissions => compare_text(&a.permissions, &b.permissions, spec),
        SortKey::Owner => compare_text(&a.owner, &b.owner, spec),
        SortKey::Group => compare_text(&a.group, &b.group, spec),
        SortKey::Accessed => compare_time(a.accessed, b.accessed),
        SortKey::Created => compare_time(a.created, b.created),
        SortKey::Changed => compare_time(a.changed, b.changed),
        SortKey::Modified => compare_time(a.modified, b.modified),
    }
}

/// Missing timestamps sort before present ones.
fn compare_time(a: Option<SystemTime>, b: Option<SystemTime>) -> Ordering {
    a.cmp(&b)
}

fn compare_text(a: &str, b: &str, spec: &SortSpec) -> Ordering {
    if spec.case_sensitive {
        compare_folded(a, b, spec.natural)
    } else {
        compare_folded(&a.to_lowercase(), &b.to_lowercase(), spec.natural)
    }
}

fn compare_folded(a: &str, b: &str, natural: bool) -> Ordering {
    if natural {
        alphanumeric_sort::compare_str(a, b)
    } else {
        a.cmp(b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::EntryKind;
    use crate::test_utils::helpers::*;
    use std::time::{Duration, UNIX_EPOCH};

    fn names(entries: &[Entry]) -> Vec<&str> {
        entries.iter().map(|e| e.name.as_str()).collect()
    }

    #[test]
    fn test_sort_spec_default() {
        let spec = SortSpec::default();
        assert_eq!(spec.key, SortKey::Name);
        assert_eq!(spec.direction, SortDirection::Ascending);
        assert!(spec.natural);
        assert!(!spec.case_sensitive);
        assert_eq!(spec.grouping, KindGrouping::DirectoriesFirst);
    }

    #[test]
    fn test_directories_first_and_last() {
        let mut entries = vec![
            create_test_entry("b.txt", EntryKind::Regular),
            create_test_directory_entry("z_dir"),
            create_test_entry("a.txt", EntryKind::Regular),
        ];

        sort_entries(&mut entries, &SortSpec::default());
        assert_eq!(names(&entries), ["z_dir", "a.txt", "b.txt"]);

        let spec = SortSpec {
            grouping: KindGrouping::DirectoriesLast,
            ..Default::default()
        };
        sort_entries(&mut entries, &spec);
        assert_eq!(names(&entries), ["a.txt", "b.txt", "z_dir"]);

        let spec = SortSpec {
            grouping: KindGrouping::Mixed,
            ..Default::default()
        };
        sort_entries(&mut entries, &spec);
        assert_eq!(names(&entries), ["a.txt", "b.txt", "z_dir"]);
    }

    #[test]
    fn test_symlink_to_directory_groups_with_directories() {
        let mut link = create_test_entry("link", EntryKind::Symlink);
        link.points_to_directory = true;
        let mut entries = vec![create_test_entry("a.txt", EntryKind::Regular), link];

        sort_entries(&mut entries, &SortSpec::default());
        assert_eq!(names(&entries), ["link", "a.txt"]);
    }

    #[test]
    fn test_hidden_policy() {
        let mut entries = vec![
            create_test_entry("b", EntryKind::Regular),
            create_test_entry(".a", EntryKind::Regular),
            create_test_entry(".c", EntryKind::Regular),
        ];

        let spec = SortSpec {
            hidden: HiddenPolicy::Last,
            ..Default::default()
        };
        sort_entries(&mut entries, &spec);
        assert_eq!(names(&entries), ["b", ".a", ".c"]);

        let spec = SortSpec {
            hidden: HiddenPolicy::First,
            ..Default::default()
        };
        sort_entries(&mut entries, &spec);
        assert_eq!(names(&entries), [".a", ".c", "b"]);
    }

    #[test]
    fn test_natural_versus_lexicographic() {
        let mut entries = vec![
            create_test_entry("img10.png", EntryKind::Regular),
            create_test_entry("img2.png", EntryKind::Regular),
            create_test_entry("img1.png", EntryKind::Regular),
        ];

        sort_entries(&mut entries, &SortSpec::default());
        assert_eq!(names(&entries), ["img1.png", "img2.png", "img10.png"]);

        let spec = SortSpec {
            natural: false,
            ..Default::default()
        };
        sort_entries(&mut entries, &spec);
        assert_eq!(names(&entries), ["img1.png", "img10.png", "img2.png"]);
    }

    #[test]
    fn test_case_sensitivity() {
        let mut entries = vec![
            create_test_entry("beta", EntryKind::Regular),
            create_test_entry("Alpha", EntryKind::Regular),
            create_test_entry("alpha2", EntryKind::Regular),
        ];

        sort_entries(&mut entries, &SortSpec::default());
        assert_eq!(names(&entries), ["Alpha", "alpha2", "beta"]);

        let spec = SortSpec {
            case_sensitive: true,
            natural: false,
            ..Default::default()
        };
        sort_entries(&mut entries, &spec);
        assert_eq!(names(&entries), ["Alpha", "alpha2", "beta"]);

        let mut entries = vec![
            create_test_entry("b", EntryKind::Regular),
            create_test_entry("B", EntryKind::Regular),
            create_test_entry("a", EntryKind::Regular),
        ];
        sort_entries(&mut entries, &spec);
        assert_eq!(names(&entries), ["B", "a", "b"]);
    }

    #[test]
    fn test_size_sorts_by_raw_value() {
        let mut entries = vec![
            create_test_entry("big", EntryKind::Regular).with_size(10_000),
            create_test_entry("small", EntryKind::Regular).with_size(9),
            create_test_entry("mid", EntryKind::Regular).with_size(100),
        ];

        for key in [SortKey::Size, SortKey::SizeInBytes] {
            let spec = SortSpec {
                key,
                ..Default::default()
            };
            sort_entries(&mut entries, &spec);
            assert_eq!(names(&entries), ["small", "mid", "big"]);
        }
    }

    #[test]
    fn test_descending_keeps_directories_first() {
        let mut entries = vec![
            create_test_entry("a", EntryKind::Regular),
            create_test_directory_entry("dir"),
            create_test_entry("b", EntryKind::Regular),
        ];
        let spec = SortSpec {
            direction: SortDirection::Descending,
            ..Default::default()
        };

        sort_entries(&mut entries, &spec);
        assert_eq!(names(&entries), ["dir", "b", "a"]);
    }

    #[test]
    fn test_time_sort_with_missing_values() {
        let mut entries = vec![
            create_test_entry("new", EntryKind::Regular)
                .with_modified(UNIX_EPOCH + Duration::from_secs(200)),
            create_test_entry("none", EntryKind::Regular),
            create_test_entry("old", EntryKind::Regular)
                .with_modified(UNIX_EPOCH + Duration::from_secs(100)),
        ];
        let spec = SortSpec {
            key: SortKey::Modified,
            ..Default::default()
        };

        sort_entries(&mut entries, &spec);
        assert_eq!(names(&entries), ["none", "old", "new"]);
    }

    #[test]
    fn test_equal_keys_fall_back_to_name_then_path() {
        let a = create_test_entry("a", EntryKind::Regular).with_size(1);
        let b = create_test_entry("b", EntryKind::Regular).with_size(1);
        let spec = SortSpec {
            key: SortKey::Size,
            ..Default::default()
        };
        assert_eq!(compare(&a, &b, &spec), Ordering::Less);

        let mut other = a.clone();
        other.path = "/other/a".into();
        assert_ne!(compare(&a, &other, &spec), Ordering::Equal);
        assert_eq!(compare(&a, &a, &spec), Ordering::Equal);
    }

    #[rstest::rstest]
    #[case("name", Some(SortKey::Name))]
    #[case("bytes", Some(SortKey::SizeInBytes))]
    #[case("mtime", Some(SortKey::Modified))]
    #[case("btime", Some(SortKey::Created))]
    #[case("colour", None)]
    fn test_sort_key_parse(#[case] input: &str, #[case] expected: Option<SortKey>) {
        assert_eq!(SortKey::parse(input), expected);
    }

    #[test]
    fn test_sort_spec_serialization() {
        let spec = SortSpec {
            key: SortKey::Owner,
            direction: SortDirection::Descending,
            ..Default::default()
        };
        let json = serde_json::to_string(&spec).unwrap();
        assert!(json.contains("\"owner\""));
        let back: SortSpec = serde_json::from_str(&json).unwrap();
        assert_eq!(back, spec);

        let partial: SortSpec = serde_json::from_str(r#"{"key":"size"}"#).unwrap();
        assert_eq!(partial.key, SortKey::Size);
        assert!(partial.natural);
    }
}
