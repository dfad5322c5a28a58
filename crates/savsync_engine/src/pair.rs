//! Record pair resolution.
//!
//! A record is identified by a filename stem within a records folder and has
//! at most two concrete files: the binary form (`.sav`) and the plaintext
//! form (`.yaml`). This module maps a folder to its set of record stems and
//! a stem to its pair of candidate paths, and lists the per-account roots
//! under a save root.

use std::collections::HashSet;
use std::ffi::{OsStr, OsString};
use std::io;
use std::path::{Path, PathBuf};

/// Extension of the binary (encrypted) form.
pub const SAV_EXTENSION: &str = "sav";
/// Extension of the plaintext form.
pub const YAML_EXTENSION: &str = "yaml";
/// Suffix appended to a target path while its replacement is being written.
pub const TEMP_SUFFIX: &str = ".tmp";
/// Subfolder of the records folder receiving content-hash-named backups.
pub const ERRORS_DIR: &str = "errors";
/// Marker appended to archived copies so a cloud-save watcher keyed on the
/// `sav` extension does not pick them up.
pub const ARCHIVE_SUFFIX: &str = ".bak";

/// The two candidate file paths of one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordPaths {
    /// Path of the binary form.
    pub sav: PathBuf,
    /// Path of the plaintext form.
    pub yaml: PathBuf,
}

impl RecordPaths {
    /// Builds both candidate paths for a stem within a folder.
    #[must_use]
    pub fn for_stem(folder: &Path, stem: &OsStr) -> Self {
        // Appended rather than `with_extension`, which would eat any dot
        // inside the stem itself.
        let with_ext = |ext: &str| {
            let mut name = stem.to_os_string();
            name.push(".");
            name.push(ext);
            folder.join(name)
        };
        Self {
            sav: with_ext(SAV_EXTENSION),
            yaml: with_ext(YAML_EXTENSION),
        }
    }
}

/// Returns the sibling temporary path used while writing a target.
#[must_use]
pub fn temp_path(target: &Path) -> PathBuf {
    let mut name = target.as_os_str().to_os_string();
    name.push(TEMP_SUFFIX);
    PathBuf::from(name)
}

/// Lists the record stems present in a folder.
///
/// Regular files and symlinks with either record extension count; a record
/// with both forms present yields one stem. Other directory entries are
/// ignored.
pub fn list_record_stems(folder: &Path) -> io::Result<HashSet<OsString>> {
    let mut stems = HashSet::new();
    for entry in std::fs::read_dir(folder)? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        if !file_type.is_file() && !file_type.is_symlink() {
            continue;
        }
        let path = entry.path();
        let Some(extension) = path.extension() else {
            continue;
        };
        if extension != SAV_EXTENSION && extension != YAML_EXTENSION {
            continue;
        }
        if let Some(stem) = path.file_stem() {
            stems.insert(stem.to_os_string());
        }
    }
    Ok(stems)
}

/// Lists the candidate account roots under a save root.
///
/// Each subdirectory name is an opaque account identifier; whether it can be
/// resolved to a key is decided later, once, by the engine.
pub fn list_account_roots(save_root: &Path) -> io::Result<Vec<(OsString, PathBuf)>> {
    let mut roots = Vec::new();
    for entry in std::fs::read_dir(save_root)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            roots.push((entry.file_name(), entry.path()));
        }
    }
    Ok(roots)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn paths_share_the_stem() {
        let paths = RecordPaths::for_stem(Path::new("/saves"), OsStr::new("slot 1"));
        assert_eq!(paths.sav, Path::new("/saves/slot 1.sav"));
        assert_eq!(paths.yaml, Path::new("/saves/slot 1.yaml"));
    }

    #[test]
    fn dotted_stems_survive() {
        let paths = RecordPaths::for_stem(Path::new("/saves"), OsStr::new("save 1.2"));
        assert_eq!(paths.sav, Path::new("/saves/save 1.2.sav"));
        assert_eq!(paths.yaml, Path::new("/saves/save 1.2.yaml"));
    }

    #[test]
    fn temp_path_appends_suffix() {
        assert_eq!(
            temp_path(Path::new("/saves/a.yaml")),
            Path::new("/saves/a.yaml.tmp")
        );
    }

    #[test]
    fn stems_deduplicate_pairs() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a.sav"), b"x").unwrap();
        std::fs::write(dir.path().join("a.yaml"), b"y").unwrap();
        std::fs::write(dir.path().join("b.yaml"), b"z").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"-").unwrap();
        std::fs::create_dir(dir.path().join("c.sav")).unwrap();

        let stems = list_record_stems(dir.path()).unwrap();
        assert_eq!(stems.len(), 2);
        assert!(stems.contains(OsStr::new("a")));
        assert!(stems.contains(OsStr::new("b")));
    }

    #[test]
    fn account_roots_are_subdirectories_only() {
        let dir = tempdir().unwrap();
        std::fs::create_dir(dir.path().join("72057594037927937")).unwrap();
        std::fs::write(dir.path().join("stray.sav"), b"x").unwrap();

        let roots = list_account_roots(dir.path()).unwrap();
        assert_eq!(roots.len(), 1);
        assert_eq!(roots[0].0, OsStr::new("72057594037927937"));
    }
}
