#[cfg(test)]
pub mod helpers {
    use crate::directory::{DirectoryLister, Listing};
    use crate::entry::{Entry, EntryKind};
    use std::collections::{HashMap, HashSet};
    use std::fs;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    pub fn create_test_entry(name: &str, kind: EntryKind) -> Entry {
        Entry::new(format!("/test/path/{}", name), kind)
    }

    pub fn create_test_directory_entry(name: &str) -> Entry {
        create_test_entry(name, EntryKind::Directory)
    }

    /// In-memory lister with a cache: the first load of a directory is a
    /// read, later non-forced loads are served from the cache.
    #[derive(Default)]
    pub struct FakeLister {
        listings: HashMap<PathBuf, Vec<Entry>>,
        cached: HashSet<PathBuf>,
        attached: HashSet<PathBuf>,
        asynchronous: bool,
        loads: Vec<(PathBuf, bool)>,
        reads: usize,
    }

    impl FakeLister {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn add(&mut self, dir: &str, entries: Vec<Entry>) {
            self.listings.insert(PathBuf::from(dir), entries);
        }

        /// Uncached loads answer `Pending`; the test delivers the listing.
        pub fn set_asynchronous(&mut self, asynchronous: bool) {
            self.asynchronous = asynchronous;
        }

        pub fn loads(&self) -> &[(PathBuf, bool)] {
            &self.loads
        }

        /// Loads that missed the cache.
        pub fn reads(&self) -> usize {
            self.reads
        }

        pub fn is_attached(&self, dir: &Path) -> bool {
            self.attached.contains(dir)
        }
    }

    impl DirectoryLister for FakeLister {
        fn load(&mut self, dir: &Path, force: bool) -> Listing {
            self.loads.push((dir.to_path_buf(), force));
            let listing = self.listings.get(dir).cloned().unwrap_or_default();
            if !force && self.cached.contains(dir) {
                return Listing::Ready(listing);
            }

            self.reads += 1;
            self.cached.insert(dir.to_path_buf());
            if self.asynchronous {
                Listing::Pending
            } else {
                Listing::Ready(listing)
            }
        }

        fn attach(&mut self, dir: &Path) {
            self.attached.insert(dir.to_path_buf());
        }

        fn detach(&mut self, dir: &Path) {
            self.attached.remove(dir);
        }
    }

    pub struct TestFileSystem {
        pub temp_dir: TempDir,
    }

    impl TestFileSystem {
        pub fn new() -> Result<Self, Box<dyn std::error::Error>> {
            let temp_dir = TempDir::new()?;
            Ok(Self { temp_dir })
        }

        pub fn create_file(
            &self,
            name: &str,
            content: &str,
        ) -> Result<String, Box<dyn std::error::Error>> {
            self.create_binary_file(name, content.as_bytes())
        }

        pub fn create_directory(&self, name: &str) -> Result<String, Box<dyn std::error::Error>> {
            let dir_path = self.temp_dir.path().join(name);
            fs::create_dir_all(&dir_path)?;
            Ok(dir_path.to_string_lossy().to_string())
        }

        pub fn create_binary_file(
            &self,
            name: &str,
            content: &[u8],
        ) -> Result<String, Box<dyn std::error::Error>> {
            let file_path = self.temp_dir.path().join(name);
            fs::write(&file_path, content)?;
            Ok(file_path.to_string_lossy().to_string())
        }

        pub fn get_path(&self) -> &Path {
            self.temp_dir.path()
        }
    }

    pub fn assert_file_exists(path: &str) {
        assert!(Path::new(path).exists(), "File should exist: {}", path);
    }
}
