use std::fs;
use std::path::Path;

/// Synchronous existence queries, issued on every navigation and keystroke.
#[cfg_attr(test, mockall::automock)]
pub trait FsProbe {
    /// Whether something exists at `path`. A broken symlink exists.
    fn exists(&self, path: &Path) -> bool;

    /// Whether `path` is a directory, following symlinks.
    fn is_directory(&self, path: &Path) -> bool;

    /// Whether the directory at `path` may be entered (search permission).
    fn can_enter(&self, path: &Path) -> bool;
}

/// `FsProbe` backed by the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFs;

impl FsProbe for LocalFs {
    fn exists(&self, path: &Path) -> bool {
        fs::symlink_metadata(path).is_ok()
    }

    fn is_directory(&self, path: &Path) -> bool {
        fs::metadata(path).map(|m| m.is_dir()).unwrap_or(false)
    }

    #[cfg(unix)]
    fn can_enter(&self, path: &Path) -> bool {
        use std::ffi::CString;
        use std::os::unix::ffi::OsStrExt;

        let Ok(c_path) = CString::new(path.as_os_str().as_bytes()) else {
            return false;
        };
        // SAFETY: c_path is a valid null-terminated C string
        unsafe { libc::access(c_path.as_ptr(), libc::X_OK) == 0 }
    }

    #[cfg(not(unix))]
    fn can_enter(&self, path: &Path) -> bool {
        fs::read_dir(path).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::helpers::*;

    #[test]
    fn test_local_fs_queries() {
        let temp_fs = TestFileSystem::new().unwrap();
        let file = temp_fs.create_file("a.txt", "x").unwrap();
        let dir = temp_fs.create_directory("sub").unwrap();
        let missing = temp_fs.get_path().join("missing");

        assert!(LocalFs.exists(Path::new(&file)));
        assert!(!LocalFs.is_directory(Path::new(&file)));
        assert!(LocalFs.exists(Path::new(&dir)));
        assert!(LocalFs.is_directory(Path::new(&dir)));
        assert!(LocalFs.can_enter(Path::new(&dir)));
        assert!(!LocalFs.exists(&missing));
        assert!(!LocalFs.is_directory(&missing));
    }

    #[cfg(unix)]
    #[test]
    fn test_broken_symlink_exists() {
        let temp_fs = TestFileSystem::new().unwrap();
        let link = temp_fs.get_path().join("dangling");
        std::os::unix::fs::symlink(temp_fs.get_path().join("nowhere"), &link).unwrap();

        assert!(LocalFs.exists(&link));
        assert!(!LocalFs.is_directory(&link));
    }

    #[cfg(unix)]
    #[rstest::rstest]
    #[case(0o311, true)]
    #[case(0o711, true)]
    #[case(0o644, false)]
    #[case(0o000, false)]
    fn test_can_enter_follows_search_permission(#[case] mode: u32, #[case] expected: bool) {
        use std::os::unix::fs::PermissionsExt;

        // Root bypasses permission bits
        if uzers::get_effective_uid() == 0 {
            return;
        }

        let temp_fs = TestFileSystem::new().unwrap();
        let dir = temp_fs.create_directory("guarded").unwrap();
        fs::set_permissions(&dir, fs::Permissions::from_mode(mode)).unwrap();

        let result = LocalFs.can_enter(Path::new(&dir));
        fs::set_permissions(&dir, fs::Permissions::from_mode(0o755)).unwrap();
        assert_eq!(result, expected);
    }
}
