use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

use tracing::info;

use crate::config::TreeConfig;
use crate::element::PathElement;
use crate::error::{PathError, Result};
use crate::tree::PathTree;

/// Tree files are JSON objects mapping paths to elements:
///
/// ```json
/// {
///   "/dev/tracker": {"type": "device", "device_name": "Tracker0", "server": "localhost"},
///   "/me/head": {"type": "alias", "source": "/dev/tracker/0"}
/// }
/// ```
type TreeDocument = BTreeMap<String, PathElement>;

impl PathTree {
    /// Build a tree from a JSON tree document.
    pub fn from_json(text: &str) -> Result<Self> {
        Self::from_json_with_config(text, &TreeConfig::default())
    }

    pub fn from_json_with_config(text: &str, config: &TreeConfig) -> Result<Self> {
        let document: TreeDocument = serde_json::from_str(text)?;
        if document.len() > config.max_nodes {
            return Err(PathError::LoadFailed(format!(
                "tree defines {} entries, max {}",
                document.len(),
                config.max_nodes
            )));
        }

        let mut tree = Self::new();
        for (path, element) in document {
            tree.insert(&path, element)?;
        }
        Ok(tree)
    }

    /// Serialize every non-null node as a tree document.
    pub fn to_json(&self) -> Result<String> {
        let document: TreeDocument = self
            .listing()
            .into_iter()
            .filter(|(_, element)| **element != PathElement::Null)
            .map(|(path, element)| (path, element.clone()))
            .collect();
        Ok(serde_json::to_string_pretty(&document)?)
    }

    /// Load a tree document from a file.
    pub fn from_file(path: &Path) -> Result<Self> {
        Self::from_file_with_config(path, &TreeConfig::default())
    }

    /// Load a tree document from a file, refusing symlinks and files larger
    /// than `config.max_file_size`.
    pub fn from_file_with_config(path: &Path, config: &TreeConfig) -> Result<Self> {
        let load_err = |what: &str, err: std::io::Error| {
            PathError::LoadFailed(format!("{what} {}: {err}", path.display()))
        };

        let path_metadata = std::fs::symlink_metadata(path).map_err(|e| load_err("stat", e))?;
        if path_metadata.file_type().is_symlink() {
            return Err(PathError::LoadFailed(format!(
                "refusing to load tree symlink: {}",
                path.display()
            )));
        }
        if !path_metadata.is_file() {
            return Err(PathError::LoadFailed(format!(
                "not a regular file: {}",
                path.display()
            )));
        }

        let file = std::fs::File::open(path).map_err(|e| load_err("open", e))?;
        let opened = file.metadata().map_err(|e| load_err("stat", e))?;
        if opened.len() > config.max_file_size as u64 {
            return Err(PathError::LoadFailed(format!(
                "tree file too large ({} bytes): {}",
                opened.len(),
                path.display()
            )));
        }

        let read_limit = u64::try_from(config.max_file_size.saturating_add(1)).unwrap_or(u64::MAX);
        let mut content = String::new();
        file.take(read_limit)
            .read_to_string(&mut content)
            .map_err(|e| load_err("read", e))?;
        if content.len() > config.max_file_size {
            return Err(PathError::LoadFailed(format!(
                "tree file grew while reading: {}",
                path.display()
            )));
        }

        let tree = Self::from_json_with_config(&content, config)?;
        info!(path = %path.display(), nodes = tree.len(), "loaded path tree");
        Ok(tree)
    }
}
