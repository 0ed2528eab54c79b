//! Metadata providers.

use std::path::Path;

use super::entity::EntityDef;
use crate::error::Result;

/// Supplies entity definitions to [`Metadata::load`](super::Metadata::load).
pub trait MetadataProvider: Send + Sync {
    fn entities(&self) -> Result<Vec<EntityDef>>;
}

/// Definitions held in memory.
#[derive(Debug, Clone, Default)]
pub struct StaticProvider {
    entities: Vec<EntityDef>,
}

impl StaticProvider {
    pub fn new(entities: Vec<EntityDef>) -> Self {
        Self { entities }
    }

    pub fn entity(mut self, def: EntityDef) -> Self {
        self.entities.push(def);
        self
    }
}

impl MetadataProvider for StaticProvider {
    fn entities(&self) -> Result<Vec<EntityDef>> {
        Ok(self.entities.clone())
    }
}

/// Definitions read from a JSON array of entities.
///
/// ```json
/// [{ "name": "Order", "namespace": "Sales", "keys": ["Id"],
///    "properties": [{ "kind": "simplex", "name": "Id", "type": "Int64" }] }]
/// ```
#[derive(Debug, Clone)]
pub struct JsonProvider {
    source: String,
}

impl JsonProvider {
    pub fn from_str(json: impl Into<String>) -> Self {
        Self {
            source: json.into(),
        }
    }

    /// Read the document eagerly; parsing happens on each `entities()` call.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let source = std::fs::read_to_string(path)?;
        Ok(Self { source })
    }
}

impl MetadataProvider for JsonProvider {
    fn entities(&self) -> Result<Vec<EntityDef>> {
        Ok(serde_json::from_str(&self.source)?)
    }
}
