use std::collections::{BTreeMap, HashSet};

use tracing::{debug, trace};

use crate::element::{DeviceElement, PathElement};
use crate::error::{PathError, Result};
use crate::path::{self, normalize, segments, ROOT, SEPARATOR};

/// Upper bound on alias hops in one resolution.
///
/// Repeats are caught by the visited set; this also stops aliases that keep
/// producing longer paths (an alias whose source lies beneath itself).
pub const MAX_ALIAS_HOPS: usize = 64;

/// One node of a [`PathTree`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PathNode {
    name: String,
    element: PathElement,
    children: BTreeMap<String, PathNode>,
}

impl PathNode {
    fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn element(&self) -> &PathElement {
        &self.element
    }

    /// Replace this node's element.
    pub fn set_element(&mut self, element: PathElement) {
        self.element = element;
    }

    pub fn child(&self, name: &str) -> Option<&PathNode> {
        self.children.get(name)
    }

    /// Children in name order.
    pub fn children(&self) -> impl Iterator<Item = &PathNode> {
        self.children.values()
    }
}

/// Hierarchical namespace of devices, sensors and aliases.
#[derive(Debug, Clone, PartialEq)]
pub struct PathTree {
    root: PathNode,
    len: usize,
}

impl PathTree {
    pub fn new() -> Self {
        Self {
            root: PathNode::default(),
            len: 1,
        }
    }

    /// Number of nodes, root included.
    pub fn len(&self) -> usize {
        self.len
    }

    /// True when only the root exists.
    pub fn is_empty(&self) -> bool {
        self.len == 1
    }

    pub fn root(&self) -> &PathNode {
        &self.root
    }

    /// Set the element at `path`, creating missing intermediate nodes as
    /// [`PathElement::Null`].
    pub fn insert(&mut self, path: &str, element: PathElement) -> Result<()> {
        let path = normalize(path)?;
        let mut node = &mut self.root;
        for segment in segments(&path) {
            if !node.children.contains_key(segment) {
                self.len += 1;
            }
            node = node
                .children
                .entry(segment.to_string())
                .or_insert_with(|| PathNode::named(segment));
        }
        debug!(%path, kind = element.kind(), "path tree insert");
        node.element = element;
        Ok(())
    }

    pub fn get_node(&self, path: &str) -> Result<&PathNode> {
        let path = normalize(path)?;
        self.lookup(&path)
            .ok_or_else(|| PathError::UnknownPath(path.clone()))
    }

    pub fn get_node_mut(&mut self, path: &str) -> Result<&mut PathNode> {
        let path = normalize(path)?;
        let mut node = &mut self.root;
        for segment in segments(&path) {
            node = match node.children.get_mut(segment) {
                Some(child) => child,
                None => return Err(PathError::UnknownPath(path.clone())),
            };
        }
        Ok(node)
    }

    /// Element at `path`, without alias resolution.
    pub fn element(&self, path: &str) -> Result<&PathElement> {
        self.get_node(path).map(PathNode::element)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.get_node(path).is_ok()
    }

    /// Follow aliases from `path` until reaching a node that is not one.
    ///
    /// An alias on an ancestor redirects the remainder of the path, so with
    /// `/me/hands` aliased to `/dev/hydra`, `/me/hands/left` resolves through
    /// `/dev/hydra/left`. Returns the final normalized path.
    pub fn resolve_alias(&self, path: &str) -> Result<String> {
        let start = normalize(path)?;
        let mut current = start.clone();
        let mut visited = HashSet::new();

        loop {
            if !visited.insert(current.clone()) || visited.len() > MAX_ALIAS_HOPS {
                return Err(PathError::AliasCycle { path: start });
            }
            match self.redirect(&current)? {
                Some(next) => {
                    trace!(from = %current, to = %next, "alias hop");
                    current = next;
                }
                None => return Ok(current),
            }
        }
    }

    /// Resolve `path` and return the element it ends on.
    pub fn resolve_element(&self, path: &str) -> Result<(String, &PathElement)> {
        let resolved = self.resolve_alias(path)?;
        let element = self.element(&resolved)?;
        Ok((resolved, element))
    }

    /// Nearest [`DeviceElement`] at or above `path`, without alias resolution.
    pub fn owning_device(&self, path: &str) -> Result<Option<&DeviceElement>> {
        let mut candidate = normalize(path)?;
        loop {
            let element = self.lookup(&candidate).map(PathNode::element);
            if let Some(PathElement::Device(device)) = element {
                return Ok(Some(device));
            }
            if candidate == ROOT {
                return Ok(None);
            }
            candidate = path::parent(&candidate).to_string();
        }
    }

    /// All nodes depth-first, parents before children, siblings by name.
    pub fn listing(&self) -> Vec<(String, &PathElement)> {
        let mut out = Vec::with_capacity(self.len);
        Self::walk(&self.root, ROOT.to_string(), &mut out);
        out
    }

    fn walk<'a>(node: &'a PathNode, path: String, out: &mut Vec<(String, &'a PathElement)>) {
        for child in node.children.values() {
            let child_path = if path == ROOT {
                format!("{SEPARATOR}{}", child.name)
            } else {
                format!("{path}{SEPARATOR}{}", child.name)
            };
            out.push((child_path.clone(), &child.element));
            Self::walk(child, child_path, out);
        }
    }

    fn lookup(&self, path: &str) -> Option<&PathNode> {
        let mut node = &self.root;
        for segment in segments(path) {
            node = node.children.get(segment)?;
        }
        Some(node)
    }

    /// Walk `path` from the root and rewrite it at the first alias found.
    fn redirect(&self, path: &str) -> Result<Option<String>> {
        let parts: Vec<&str> = segments(path).collect();
        let mut node = &self.root;
        let mut walked = String::new();

        for (idx, segment) in parts.iter().enumerate() {
            node = node
                .children
                .get(*segment)
                .ok_or_else(|| PathError::UnknownPath(path.to_string()))?;
            let parent_path = if walked.is_empty() { ROOT } else { walked.as_str() };

            if let PathElement::Alias(alias) = &node.element {
                let source = if alias.source.starts_with(SEPARATOR) {
                    normalize(&alias.source)?
                } else {
                    path::join(parent_path, &alias.source)?
                };
                let rest = &parts[idx + 1..];
                let next = if rest.is_empty() {
                    source
                } else {
                    path::join(&source, &rest.join("/"))?
                };
                return Ok(Some(next));
            }

            walked.push(SEPARATOR);
            walked.push_str(segment);
        }
        Ok(None)
    }
}

impl Default for PathTree {
    fn default() -> Self {
        Self::new()
    }
}
