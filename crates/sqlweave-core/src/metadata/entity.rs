//! Entities and their keys.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::property::{Property, PropertyDef};

/// Identifies an entity within a metadata set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityKey {
    pub namespace: String,
    pub name: String,
}

impl EntityKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Key in the empty namespace.
    pub fn global(name: impl Into<String>) -> Self {
        Self::new("", name)
    }

    /// Parse `Name` or `Namespace.Name`. The last dot separates the name.
    pub fn parse(text: &str) -> Self {
        match text.rsplit_once('.') {
            Some((ns, name)) => Self::new(ns, name),
            None => Self::global(text),
        }
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace.is_empty() {
            f.write_str(&self.name)
        } else {
            write!(f, "{}.{}", self.namespace, self.name)
        }
    }
}

/// Provider-facing entity definition.
///
/// Several definitions with the same key are merged on load.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityDef {
    pub name: String,
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub alias: Option<String>,
    /// Base entity, `Name` or `Namespace.Name`
    #[serde(default)]
    pub base: Option<String>,
    #[serde(default)]
    pub properties: Vec<PropertyDef>,
    #[serde(default)]
    pub keys: Vec<String>,
    #[serde(default)]
    pub immutable: bool,
}

impl EntityDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn base(mut self, base: impl Into<String>) -> Self {
        self.base = Some(base.into());
        self
    }

    pub fn property(mut self, property: impl Into<PropertyDef>) -> Self {
        self.properties.push(property.into());
        self
    }

    pub fn key(mut self, property: impl Into<String>) -> Self {
        self.keys.push(property.into());
        self
    }

    pub fn immutable(mut self) -> Self {
        self.immutable = true;
        self
    }

    pub fn key_ref(&self) -> EntityKey {
        EntityKey::new(self.namespace.clone(), self.name.clone())
    }
}

/// A resolved entity.
///
/// `properties` and `keys` hold only what this entity declares itself; use
/// the metadata set's `effective_properties` to include inherited ones.
#[derive(Debug, Clone)]
pub struct Entity {
    pub key: EntityKey,
    pub alias: Option<String>,
    pub base: Option<String>,
    pub properties: Vec<Property>,
    pub keys: Vec<String>,
    pub immutable: bool,
}

impl Entity {
    pub fn name(&self) -> &str {
        &self.key.name
    }

    pub fn namespace(&self) -> &str {
        &self.key.namespace
    }

    /// Physical table name: the alias when set, else `{namespace}_{name}`,
    /// else the bare name.
    pub fn table_name(&self) -> String {
        match &self.alias {
            Some(alias) => alias.clone(),
            None if self.key.namespace.is_empty() => self.key.name.clone(),
            None => format!("{}_{}", self.key.namespace, self.key.name),
        }
    }

    /// Declared property by case-insensitive name.
    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.is_named(name))
    }
}
