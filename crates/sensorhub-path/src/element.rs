use serde::{Deserialize, Serialize};

/// Points at another path; resolving the node means resolving `source`.
///
/// A source without a leading `/` is relative to the alias node's parent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AliasElement {
    pub source: String,
}

impl AliasElement {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
        }
    }

    pub fn set_source(&mut self, source: impl Into<String>) {
        self.source = source.into();
    }
}

/// A device exposed by some server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceElement {
    pub device_name: String,
    pub server: String,
}

impl DeviceElement {
    pub fn new(device_name: impl Into<String>, server: impl Into<String>) -> Self {
        Self {
            device_name: device_name.into(),
            server: server.into(),
        }
    }

    /// `device_name@server`.
    pub fn full_name(&self) -> String {
        format!("{}@{}", self.device_name, self.server)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorElement {
    pub index: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StringElement {
    pub value: String,
}

/// What a tree node holds. Exactly one variant per node.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PathElement {
    #[default]
    Null,
    Alias(AliasElement),
    Device(DeviceElement),
    Sensor(SensorElement),
    String(StringElement),
}

impl PathElement {
    pub fn alias(source: impl Into<String>) -> Self {
        Self::Alias(AliasElement::new(source))
    }

    pub fn device(device_name: impl Into<String>, server: impl Into<String>) -> Self {
        Self::Device(DeviceElement::new(device_name, server))
    }

    pub fn sensor(index: u32) -> Self {
        Self::Sensor(SensorElement { index })
    }

    pub fn string(value: impl Into<String>) -> Self {
        Self::String(StringElement {
            value: value.into(),
        })
    }

    /// Short variant name, as used in listings.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Alias(_) => "alias",
            Self::Device(_) => "device",
            Self::Sensor(_) => "sensor",
            Self::String(_) => "string",
        }
    }

    pub fn is_alias(&self) -> bool {
        matches!(self, Self::Alias(_))
    }
}
