//! Property tokens: bindings between properties and host members.
//!
//! A host is any type whose values are read from or written to a statement.
//! Concrete hosts list their members once, usually via `#[derive(Host)]`;
//! dictionary-like hosts such as [`Record`] answer for any property name.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use super::entity::EntityKey;
use super::property::Property;
use crate::error::Result;
use crate::value::Value;

type Getter<T> = Arc<dyn Fn(&T) -> Value + Send + Sync>;
type Setter<T> = Arc<dyn Fn(&mut T, Value) -> Result<()> + Send + Sync>;

/// An accessor pair for one member of a host type.
pub struct Member<T> {
    name: String,
    get: Getter<T>,
    set: Setter<T>,
}

impl<T> Clone for Member<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            get: Arc::clone(&self.get),
            set: Arc::clone(&self.set),
        }
    }
}

impl<T> fmt::Debug for Member<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Member").field("name", &self.name).finish()
    }
}

impl<T: 'static> Member<T> {
    pub fn new(
        name: impl Into<String>,
        get: impl Fn(&T) -> Value + Send + Sync + 'static,
        set: impl Fn(&mut T, Value) -> Result<()> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            get: Arc::new(get),
            set: Arc::new(set),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Lift a member of an embedded component onto the containing type.
    pub fn project<O: 'static>(
        self,
        outer: fn(&O) -> &T,
        outer_mut: fn(&mut O) -> &mut T,
    ) -> Member<O> {
        let get = self.get;
        let set = self.set;
        Member {
            name: self.name,
            get: Arc::new(move |o: &O| get(outer(o))),
            set: Arc::new(move |o: &mut O, v: Value| set(outer_mut(o), v)),
        }
    }
}

/// A type that property tokens can read from and write to.
pub trait Host: Sized + 'static {
    /// Statically known members, including those flattened in from
    /// embedded components.
    fn members() -> Vec<Member<Self>>;

    /// Member for an arbitrary property name. Dictionary hosts override
    /// this; concrete hosts expose only `members()`.
    fn dynamic_member(property: &str) -> Option<Member<Self>> {
        let _ = property;
        None
    }
}

/// A dictionary host: one slot per property name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    values: BTreeMap<String, Value>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, property: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(property.into(), value.into());
        self
    }

    pub fn get(&self, property: &str) -> Option<&Value> {
        self.values.get(property)
    }

    pub fn insert(&mut self, property: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(property.into(), value.into());
    }

    pub fn contains(&self, property: &str) -> bool {
        self.values.contains_key(property)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl Host for Record {
    fn members() -> Vec<Member<Self>> {
        Vec::new()
    }

    fn dynamic_member(property: &str) -> Option<Member<Self>> {
        let read = property.to_string();
        let write = property.to_string();
        Some(Member::new(
            property,
            move |r: &Record| r.values.get(&read).cloned().unwrap_or(Value::Null),
            move |r: &mut Record, v| {
                r.values.insert(write.clone(), v);
                Ok(())
            },
        ))
    }
}

/// A property bound to a host member.
pub struct PropertyToken<H> {
    property: Property,
    member: Member<H>,
}

impl<H> fmt::Debug for PropertyToken<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyToken")
            .field("property", &self.property.name())
            .field("member", &self.member.name)
            .finish()
    }
}

impl<H: Host> PropertyToken<H> {
    pub(crate) fn new(property: Property, member: Member<H>) -> Self {
        Self { property, member }
    }

    pub fn property(&self) -> &Property {
        &self.property
    }

    pub fn name(&self) -> &str {
        self.property.name()
    }

    /// Read the member's value.
    pub fn get(&self, host: &H) -> Value {
        (self.member.get)(host)
    }

    /// Convert `value` to the property's type and write it to the member.
    pub fn set(&self, host: &mut H, value: Value) -> Result<()> {
        let value = self.convert(value)?;
        (self.member.set)(host, value)
    }

    /// Coerce a value to the property's canonical type.
    ///
    /// Navigation properties have no canonical type; their values pass
    /// through unchanged.
    pub fn convert(&self, value: Value) -> Result<Value> {
        match &self.property {
            Property::Simplex(s) => value.coerce(s.data_type),
            Property::Complex(_) => Ok(value),
        }
    }
}

/// Tokens for every property of an entity a host can reach.
#[derive(Debug)]
pub struct TokenSet<H> {
    entity: EntityKey,
    tokens: Vec<PropertyToken<H>>,
}

impl<H: Host> TokenSet<H> {
    pub(crate) fn new(entity: EntityKey, tokens: Vec<PropertyToken<H>>) -> Self {
        Self { entity, tokens }
    }

    pub fn entity(&self) -> &EntityKey {
        &self.entity
    }

    /// Token for a property, by case-insensitive name.
    pub fn get(&self, property: &str) -> Option<&PropertyToken<H>> {
        self.tokens
            .iter()
            .find(|t| t.property.name().eq_ignore_ascii_case(property))
    }

    pub fn iter(&self) -> impl Iterator<Item = &PropertyToken<H>> {
        self.tokens.iter()
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Read every tokenized property of `host` into a record.
    pub fn to_record(&self, host: &H) -> Record {
        let mut record = Record::new();
        for token in &self.tokens {
            record.insert(token.name(), token.get(host));
        }
        record
    }
}

/// Find the member for a property: declared members first (case-insensitive),
/// then the host's dynamic slot.
pub(crate) fn bind_member<H: Host>(members: &[Member<H>], property: &str) -> Option<Member<H>> {
    members
        .iter()
        .find(|m| m.name.eq_ignore_ascii_case(property))
        .cloned()
        .or_else(|| H::dynamic_member(property))
}
