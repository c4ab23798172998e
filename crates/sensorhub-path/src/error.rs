/// Errors from path parsing, tree lookup and route handling.
#[derive(Debug, thiserror::Error)]
pub enum PathError {
    /// Following aliases from `path` revisited a path.
    #[error("alias cycle while resolving {path}")]
    AliasCycle { path: String },

    /// No node exists at the path.
    #[error("no such path: {0}")]
    UnknownPath(String),

    /// The path string is malformed.
    #[error("invalid path {path:?}: {reason}")]
    InvalidPath { path: String, reason: &'static str },

    /// A route document failed validation.
    #[error("invalid route document: {0}")]
    InvalidRoute(String),

    /// The document is not valid JSON or does not match the expected shape.
    #[error("invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// A tree file could not be loaded.
    #[error("failed to load tree: {0}")]
    LoadFailed(String),
}

pub type Result<T> = std::result::Result<T, PathError>;
