//! Locating driver plugins on disk.
//!
//! Plugins live in `<prefix>/lib/sensorhub-plugins`, where `<prefix>/bin`
//! holds the running binary. A plugin named `com_example_Tracker` is the file
//! `com_example_Tracker.<ext>` or, for plugins that must be requested by
//! name, `com_example_Tracker.manualload.<ext>`, with `<ext>` the platform's
//! shared library extension.

use std::path::{Path, PathBuf};

use tracing::{debug, trace};

/// Plugin directory, relative to the install prefix.
pub const PLUGIN_DIR: &str = "lib/sensorhub-plugins";

/// Stem suffix marking a plugin that is only loaded when asked for by name.
pub const MANUAL_LOAD_SUFFIX: &str = ".manualload";

pub const PLUGIN_EXTENSION: &str = std::env::consts::DLL_EXTENSION;

/// Ordered list of directories to look for plugins in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchPath(Vec<PathBuf>);

impl SearchPath {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, dir: impl Into<PathBuf>) {
        self.0.push(dir.into());
    }

    pub fn iter(&self) -> impl Iterator<Item = &Path> {
        self.0.iter().map(PathBuf::as_path)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<P: Into<PathBuf>> FromIterator<P> for SearchPath {
    fn from_iter<I: IntoIterator<Item = P>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// Search path for a binary installed at `exe`.
pub fn default_search_path(exe: &Path) -> SearchPath {
    let bin_dir = exe.parent().unwrap_or(Path::new("."));
    let prefix = bin_dir.parent().unwrap_or(bin_dir);
    std::iter::once(prefix.join(PLUGIN_DIR)).collect()
}

/// Search path for the running binary.
pub fn current_search_path() -> std::io::Result<SearchPath> {
    Ok(default_search_path(&std::env::current_exe()?))
}

/// Every regular file with extension `ext` (no leading dot) in the search
/// path, directory by directory, sorted within each directory. Missing or
/// unreadable directories are skipped.
pub fn all_files_with_ext(search: &SearchPath, ext: &str) -> Vec<PathBuf> {
    let mut found = Vec::new();
    for dir in search.iter() {
        let mut files: Vec<PathBuf> = regular_files(dir)
            .filter(|path| path.extension().is_some_and(|e| e == ext))
            .collect();
        files.sort();
        found.extend(files);
    }
    found
}

/// First plugin file named `name` in the search path.
pub fn find_plugin(name: &str, search: &SearchPath) -> Option<PathBuf> {
    let manual = format!("{name}{MANUAL_LOAD_SUFFIX}");
    for dir in search.iter() {
        let mut candidates: Vec<PathBuf> = regular_files(dir)
            .filter(|path| path.extension().is_some_and(|e| e == PLUGIN_EXTENSION))
            .collect();
        candidates.sort();

        let hit = candidates.into_iter().find(|path| {
            path.file_stem()
                .and_then(|stem| stem.to_str())
                .is_some_and(|stem| stem == name || stem == manual)
        });
        if let Some(path) = hit {
            debug!(plugin = name, path = %path.display(), "plugin found");
            return Some(path);
        }
    }
    debug!(plugin = name, dirs = search.len(), "plugin not found");
    None
}

fn regular_files(dir: &Path) -> impl Iterator<Item = PathBuf> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => Some(entries),
        Err(err) => {
            trace!(dir = %dir.display(), %err, "skipping search directory");
            None
        }
    };
    entries
        .into_iter()
        .flatten()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_ok_and(|kind| kind.is_file()))
        .map(|entry| entry.path())
}
