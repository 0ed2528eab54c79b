//! Property definitions.
//!
//! A property is either *simplex* (a column) or *complex* (a navigation to
//! another entity). Definitions (`SimplexDef`, `ComplexDef`) are what
//! providers supply; `Property` is the resolved form held by an entity.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::entity::EntityKey;
use super::sequence::Sequence;
use crate::types::DataType;

/// How many far-side rows a complex property reaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Multiplicity {
    #[default]
    One,
    Many,
}

/// Provider-facing definition of a column property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimplexDef {
    pub name: String,
    #[serde(default)]
    pub column: Option<String>,
    #[serde(rename = "type")]
    pub data_type: DataType,
    #[serde(default)]
    pub length: Option<u32>,
    #[serde(default)]
    pub precision: Option<u8>,
    #[serde(default)]
    pub scale: Option<u8>,
    #[serde(default)]
    pub required: bool,
    /// Partition/identity column for engines with tag semantics
    #[serde(default)]
    pub tag: bool,
    /// Sequence expression, see [`Sequence::parse`]
    #[serde(default)]
    pub sequence: Option<String>,
}

impl SimplexDef {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            column: None,
            data_type,
            length: None,
            precision: None,
            scale: None,
            required: false,
            tag: false,
            sequence: None,
        }
    }

    pub fn column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }

    pub fn length(mut self, length: u32) -> Self {
        self.length = Some(length);
        self
    }

    pub fn precision(mut self, precision: u8, scale: u8) -> Self {
        self.precision = Some(precision);
        self.scale = Some(scale);
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn tag(mut self) -> Self {
        self.tag = true;
        self
    }

    pub fn sequence(mut self, text: impl Into<String>) -> Self {
        self.sequence = Some(text.into());
        self
    }
}

/// Provider-facing definition of a navigation property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplexDef {
    pub name: String,
    /// Target entity, `Name` or `Namespace.Name`
    pub target: String,
    #[serde(default)]
    pub multiplicity: Multiplicity,
    /// Property on the far side the join lands on
    #[serde(default)]
    pub foreign: Option<String>,
    /// Near-side properties joining to the far side
    #[serde(default)]
    pub local: Vec<String>,
}

impl ComplexDef {
    pub fn new(name: impl Into<String>, target: impl Into<String>, multiplicity: Multiplicity) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
            multiplicity,
            foreign: None,
            local: Vec::new(),
        }
    }

    pub fn foreign(mut self, property: impl Into<String>) -> Self {
        self.foreign = Some(property.into());
        self
    }

    pub fn local(mut self, property: impl Into<String>) -> Self {
        self.local.push(property.into());
        self
    }
}

/// Either kind of property definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum PropertyDef {
    Simplex(SimplexDef),
    Complex(ComplexDef),
}

impl PropertyDef {
    pub fn name(&self) -> &str {
        match self {
            PropertyDef::Simplex(s) => &s.name,
            PropertyDef::Complex(c) => &c.name,
        }
    }
}

impl From<SimplexDef> for PropertyDef {
    fn from(def: SimplexDef) -> Self {
        PropertyDef::Simplex(def)
    }
}

impl From<ComplexDef> for PropertyDef {
    fn from(def: ComplexDef) -> Self {
        PropertyDef::Complex(def)
    }
}

/// A resolved column property.
#[derive(Debug, Clone)]
pub struct SimplexProperty {
    pub name: String,
    pub column: String,
    pub data_type: DataType,
    pub length: Option<u32>,
    pub precision: Option<u8>,
    pub scale: Option<u8>,
    pub required: bool,
    pub tag: bool,
    pub sequence: Option<Arc<Sequence>>,
}

/// A resolved navigation property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComplexProperty {
    pub name: String,
    pub target: EntityKey,
    pub multiplicity: Multiplicity,
    pub foreign: Option<String>,
    pub local: Vec<String>,
}

#[derive(Debug, Clone)]
pub enum Property {
    Simplex(SimplexProperty),
    Complex(ComplexProperty),
}

impl Property {
    pub fn name(&self) -> &str {
        match self {
            Property::Simplex(s) => &s.name,
            Property::Complex(c) => &c.name,
        }
    }

    pub fn as_simplex(&self) -> Option<&SimplexProperty> {
        match self {
            Property::Simplex(s) => Some(s),
            Property::Complex(_) => None,
        }
    }

    pub fn as_complex(&self) -> Option<&ComplexProperty> {
        match self {
            Property::Complex(c) => Some(c),
            Property::Simplex(_) => None,
        }
    }

    /// Case-insensitive name comparison, used for member and path matching.
    pub fn is_named(&self, name: &str) -> bool {
        self.name().eq_ignore_ascii_case(name)
    }
}
