//! Read-only filesystem queries used by the planning step.

use std::collections::BTreeSet;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// What planning needs to know about the filesystem.
pub trait FsProbe {
    /// Whether anything (file, dir or dangling symlink) exists at `path`.
    fn exists(&self, path: &Path) -> bool;

    fn is_file(&self, path: &Path) -> bool;

    /// Regular files named `name` anywhere under `root`, sorted.
    fn files_named(&self, root: &Path, name: &OsStr) -> Vec<PathBuf>;
}

/// The real filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct RealFs;

impl FsProbe for RealFs {
    fn exists(&self, path: &Path) -> bool {
        path.symlink_metadata().is_ok()
    }

    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn files_named(&self, root: &Path, name: &OsStr) -> Vec<PathBuf> {
        if !root.is_dir() {
            return Vec::new();
        }
        let found: BTreeSet<PathBuf> = WalkDir::new(root)
            .follow_links(false)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file() && entry.file_name() == name)
            .map(|entry| entry.into_path())
            .collect();
        found.into_iter().collect()
    }
}

#[cfg(test)]
pub(crate) mod fake {
    //! In-memory probe for planning tests.

    use super::FsProbe;
    use std::collections::BTreeSet;
    use std::ffi::OsStr;
    use std::path::{Path, PathBuf};

    #[derive(Debug, Default)]
    pub struct FakeFs {
        files: BTreeSet<PathBuf>,
    }

    impl FakeFs {
        pub fn with_files<I, P>(files: I) -> Self
        where
            I: IntoIterator<Item = P>,
            P: Into<PathBuf>,
        {
            Self {
                files: files.into_iter().map(Into::into).collect(),
            }
        }
    }

    impl FsProbe for FakeFs {
        fn exists(&self, path: &Path) -> bool {
            self.files.contains(path) || self.files.iter().any(|f| f.starts_with(path))
        }

        fn is_file(&self, path: &Path) -> bool {
            self.files.contains(path)
        }

        fn files_named(&self, root: &Path, name: &OsStr) -> Vec<PathBuf> {
            self.files
                .iter()
                .filter(|f| f.starts_with(root) && f.file_name() == Some(name))
                .cloned()
                .collect()
        }
    }
}
