use std::collections::HashMap;

use crate::error::{Result, TransportError};

/// Maximum length of a registered type or sender name, in bytes.
pub const MAX_NAME_LEN: usize = 255;

/// Two-way table between registered names and dense ids.
#[derive(Debug, Clone)]
pub struct NameTable {
    kind: &'static str,
    by_name: HashMap<String, u32>,
    names: Vec<String>,
}

impl NameTable {
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            by_name: HashMap::new(),
            names: Vec::new(),
        }
    }

    /// Look up `name`, registering it if it is new.
    pub fn register(&mut self, name: &str) -> Result<u32> {
        if let Some(id) = self.by_name.get(name) {
            return Ok(*id);
        }
        self.validate(name)?;

        let id = u32::try_from(self.names.len()).map_err(|_| TransportError::Rejected {
            kind: self.kind,
            name: name.to_string(),
            reason: "id space exhausted",
        })?;
        self.names.push(name.to_string());
        self.by_name.insert(name.to_string(), id);
        tracing::trace!(kind = self.kind, name, id, "registered name");
        Ok(id)
    }

    pub fn id(&self, name: &str) -> Option<u32> {
        self.by_name.get(name).copied()
    }

    pub fn name(&self, id: u32) -> Option<&str> {
        self.names.get(id as usize).map(String::as_str)
    }

    /// Like [`name`](Self::name), but an unknown id is an error.
    pub fn require(&self, id: u32) -> Result<&str> {
        self.name(id).ok_or(TransportError::UnknownId { kind: self.kind, id })
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    fn validate(&self, name: &str) -> Result<()> {
        let reason = if name.is_empty() {
            "name is empty"
        } else if name.len() > MAX_NAME_LEN {
            "name longer than 255 bytes"
        } else if name.contains('\0') {
            "name contains NUL"
        } else {
            return Ok(());
        };
        Err(TransportError::Rejected {
            kind: self.kind,
            name: name.to_string(),
            reason,
        })
    }
}
