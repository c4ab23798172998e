/// Limits applied when loading a path tree from a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeConfig {
    /// Maximum number of entries a tree document may define.
    pub max_nodes: usize,
    /// Maximum bytes read from a tree file.
    pub max_file_size: usize,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            max_nodes: 4096,
            max_file_size: 256 * 1024,
        }
    }
}
