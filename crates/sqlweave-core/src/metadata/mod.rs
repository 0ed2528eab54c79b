//! The metadata model.
//!
//! Entities, their properties and sequences are loaded from one or more
//! [`MetadataProvider`]s into an immutable [`EntitySet`]. [`Metadata`] holds
//! the current set behind a lock and swaps in a complete new one on reload,
//! so readers always observe either the old or the new set, never a mix.
//!
//! Each set owns its property-token cache. Replacing the set therefore
//! drops every cached token in the same step.

pub mod entity;
pub mod property;
pub mod provider;
pub mod sequence;
pub mod token;

use std::any::{Any, TypeId};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock};

pub use entity::{Entity, EntityDef, EntityKey};
pub use property::{
    ComplexDef, ComplexProperty, Multiplicity, Property, PropertyDef, SimplexDef, SimplexProperty,
};
pub use provider::{JsonProvider, MetadataProvider, StaticProvider};
pub use sequence::{Sequence, SequenceKind, SequenceSpec};
pub use token::{Host, Member, PropertyToken, Record, TokenSet};

use crate::error::{Error, MetadataErrorKind, Result};

/// How one complex property joins its near entity to its far entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Join {
    pub near: EntityKey,
    pub far: EntityKey,
    pub multiplicity: Multiplicity,
    /// `(near column, far column)` pairs
    pub columns: Vec<(String, String)>,
}

/// One navigation step of a resolved path.
#[derive(Debug, Clone)]
pub struct Hop {
    /// Entity the step starts from
    pub entity: EntityKey,
    pub property: ComplexProperty,
    pub join: Join,
}

/// A dotted property path resolved against the metadata set.
#[derive(Debug, Clone)]
pub struct PropertyPath {
    pub root: EntityKey,
    pub hops: Vec<Hop>,
    /// Entity declaring (or inheriting) the final property
    pub owner: EntityKey,
    pub property: Property,
}

impl PropertyPath {
    /// True when any hop crosses a `Many` navigation.
    pub fn crosses_many(&self) -> bool {
        self.hops
            .iter()
            .any(|h| h.property.multiplicity == Multiplicity::Many)
    }
}

type TokenCache = HashMap<(EntityKey, TypeId), Arc<dyn Any + Send + Sync>>;

/// An immutable, fully merged set of entities.
pub struct EntitySet {
    entities: BTreeMap<EntityKey, Arc<Entity>>,
    tokens: RwLock<TokenCache>,
}

impl std::fmt::Debug for EntitySet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntitySet")
            .field("entities", &self.entities.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

fn unknown_entity(key: &EntityKey) -> Error {
    Error::metadata(
        MetadataErrorKind::UnknownMember,
        Some(key.to_string()),
        None,
        format!("unknown entity '{}'", key),
    )
}

impl EntitySet {
    fn empty() -> Self {
        Self {
            entities: BTreeMap::new(),
            tokens: RwLock::new(HashMap::new()),
        }
    }

    /// Merge provider definitions and resolve them into entities.
    fn build(providers: &[&dyn MetadataProvider]) -> Result<Self> {
        let mut merged: BTreeMap<EntityKey, EntityDef> = BTreeMap::new();
        for provider in providers {
            for def in provider.entities()? {
                let key = def.key_ref();
                let slot = merged.entry(key).or_insert_with(|| {
                    EntityDef::new(def.name.clone()).namespace(def.namespace.clone())
                });
                merge_definition(slot, def)?;
            }
        }

        let keys: HashSet<EntityKey> = merged.keys().cloned().collect();
        let mut entities = BTreeMap::new();
        for (key, def) in merged {
            let entity = resolve_definition(def, &keys)?;
            entities.insert(key, Arc::new(entity));
        }

        Ok(Self {
            entities,
            tokens: RwLock::new(HashMap::new()),
        })
    }

    /// Look up an entity by key.
    pub fn entity(&self, key: &EntityKey) -> Option<Arc<Entity>> {
        self.entities.get(key).cloned()
    }

    fn require(&self, key: &EntityKey) -> Result<Arc<Entity>> {
        self.entity(key).ok_or_else(|| unknown_entity(key))
    }

    /// All entities in key order.
    pub fn entities(&self) -> impl Iterator<Item = &Arc<Entity>> {
        self.entities.values()
    }

    /// Resolve `Name` or `Namespace.Name` as written inside namespace `from`.
    ///
    /// An unqualified name prefers the same namespace, then the global one.
    pub fn resolve_key(&self, from: &str, text: &str) -> Option<EntityKey> {
        resolve_reference(from, text, |k| self.entities.contains_key(k))
    }

    /// The entity named as `entity`'s base, if any.
    pub fn base_entity(&self, entity: &Entity) -> Result<Option<Arc<Entity>>> {
        let Some(base) = &entity.base else {
            return Ok(None);
        };
        match self.resolve_key(entity.namespace(), base) {
            Some(key) => Ok(self.entity(&key)),
            None => Err(Error::metadata(
                MetadataErrorKind::MissingBase,
                Some(entity.key.to_string()),
                None,
                format!("base entity '{}' of '{}' not found", base, entity.key),
            )),
        }
    }

    /// Root ancestor first, `key` last.
    pub fn inheritance_chain(&self, key: &EntityKey) -> Result<Vec<Arc<Entity>>> {
        let mut chain = vec![self.require(key)?];
        let mut seen = HashSet::from([key.clone()]);
        while let Some(base) = self.base_entity(&chain[chain.len() - 1])? {
            if !seen.insert(base.key.clone()) {
                return Err(Error::metadata(
                    MetadataErrorKind::CyclicNavigation,
                    Some(key.to_string()),
                    None,
                    format!("inheritance of '{}' is cyclic at '{}'", key, base.key),
                ));
            }
            chain.push(base);
        }
        chain.reverse();
        Ok(chain)
    }

    /// Properties of the whole inheritance chain, root first.
    pub fn effective_properties(&self, key: &EntityKey) -> Result<Vec<Property>> {
        let mut out: Vec<Property> = Vec::new();
        for entity in self.inheritance_chain(key)? {
            for property in &entity.properties {
                if out.iter().any(|p| p.is_named(property.name())) {
                    return Err(Error::metadata(
                        MetadataErrorKind::DuplicateMember,
                        Some(entity.key.to_string()),
                        Some(property.name().to_string()),
                        format!(
                            "'{}' redefines inherited member '{}'",
                            entity.key,
                            property.name()
                        ),
                    ));
                }
                out.push(property.clone());
            }
        }
        Ok(out)
    }

    /// One effective property by case-insensitive name.
    pub fn effective_property(&self, key: &EntityKey, name: &str) -> Result<Property> {
        for entity in self.inheritance_chain(key)?.iter().rev() {
            if let Some(property) = entity.property(name) {
                return Ok(property.clone());
            }
        }
        Err(Error::unknown_member(key.to_string(), name))
    }

    /// Key properties of the whole inheritance chain, root first.
    pub fn effective_keys(&self, key: &EntityKey) -> Result<Vec<SimplexProperty>> {
        let mut out: Vec<SimplexProperty> = Vec::new();
        for entity in self.inheritance_chain(key)? {
            for name in &entity.keys {
                match self.effective_property(key, name)? {
                    Property::Simplex(s) => {
                        if !out.iter().any(|k| k.name == s.name) {
                            out.push(s);
                        }
                    }
                    Property::Complex(c) => {
                        return Err(Error::metadata(
                            MetadataErrorKind::Conflict,
                            Some(key.to_string()),
                            Some(c.name.clone()),
                            format!("key member '{}' of '{}' is a navigation", c.name, key),
                        ));
                    }
                }
            }
        }
        Ok(out)
    }

    /// Resolve a dotted path through complex properties.
    ///
    /// Fails with `UnknownMember` if any segment does not resolve or if a
    /// non-final segment is not a navigation.
    pub fn find(&self, key: &EntityKey, path: &str) -> Result<PropertyPath> {
        let unknown = || Error::unknown_member(key.to_string(), path);
        let segments: Vec<&str> = path.split('.').collect();
        let mut current = key.clone();
        let mut hops = Vec::new();

        for (i, segment) in segments.iter().enumerate() {
            if segment.is_empty() {
                return Err(unknown());
            }
            let property = match self.effective_property(&current, segment) {
                Ok(p) => p,
                Err(Error::Metadata(m)) if m.kind == MetadataErrorKind::UnknownMember => {
                    return Err(unknown());
                }
                Err(e) => return Err(e),
            };
            if i + 1 == segments.len() {
                return Ok(PropertyPath {
                    root: key.clone(),
                    hops,
                    owner: current,
                    property,
                });
            }
            let Property::Complex(complex) = property else {
                return Err(unknown());
            };
            let join = self.resolve_complex(&current, &complex.name)?;
            let next = complex.target.clone();
            hops.push(Hop {
                entity: current,
                property: complex,
                join,
            });
            current = next;
        }
        Err(unknown())
    }

    /// Work out the join columns of a complex property.
    ///
    /// Foreign properties that are themselves navigations are followed
    /// until they reach columns. Revisiting an (entity, property) pair on
    /// the way fails with `CyclicNavigation`.
    pub fn resolve_complex(&self, key: &EntityKey, name: &str) -> Result<Join> {
        let mut visiting = HashSet::new();
        self.resolve_complex_inner(key, name, &mut visiting)
    }

    fn resolve_complex_inner(
        &self,
        key: &EntityKey,
        name: &str,
        visiting: &mut HashSet<(EntityKey, String)>,
    ) -> Result<Join> {
        let property = self.effective_property(key, name)?;
        let Property::Complex(complex) = property else {
            return Err(Error::metadata(
                MetadataErrorKind::UnknownMember,
                Some(key.to_string()),
                Some(name.to_string()),
                format!("'{}' is not a navigation of '{}'", name, key),
            ));
        };
        let marker = (key.clone(), complex.name.to_ascii_lowercase());
        if !visiting.insert(marker.clone()) {
            return Err(Error::metadata(
                MetadataErrorKind::CyclicNavigation,
                Some(key.to_string()),
                Some(complex.name.clone()),
                format!("navigation '{}.{}' is cyclic", key, complex.name),
            ));
        }
        self.require(&complex.target)?;

        let near = if complex.local.is_empty() {
            match complex.multiplicity {
                Multiplicity::One => {
                    let default = format!("{}Id", complex.name);
                    self.columns_of(key, std::slice::from_ref(&default), visiting)?
                }
                Multiplicity::Many => self.key_columns(key)?,
            }
        } else {
            self.columns_of(key, &complex.local, visiting)?
        };
        let far = match (&complex.foreign, complex.multiplicity) {
            (Some(foreign), _) => {
                self.columns_of(&complex.target, std::slice::from_ref(foreign), visiting)?
            }
            (None, Multiplicity::One) => self.key_columns(&complex.target)?,
            (None, Multiplicity::Many) => {
                let default = format!("{}Id", key.name);
                self.columns_of(&complex.target, std::slice::from_ref(&default), visiting)?
            }
        };
        visiting.remove(&marker);

        if near.len() != far.len() || near.is_empty() {
            return Err(Error::metadata(
                MetadataErrorKind::Conflict,
                Some(key.to_string()),
                Some(complex.name.clone()),
                format!(
                    "navigation '{}.{}' joins {} column(s) to {}",
                    key,
                    complex.name,
                    near.len(),
                    far.len()
                ),
            ));
        }
        Ok(Join {
            near: key.clone(),
            far: complex.target,
            multiplicity: complex.multiplicity,
            columns: near.into_iter().zip(far).collect(),
        })
    }

    fn columns_of(
        &self,
        key: &EntityKey,
        names: &[String],
        visiting: &mut HashSet<(EntityKey, String)>,
    ) -> Result<Vec<String>> {
        let mut columns = Vec::new();
        for name in names {
            match self.effective_property(key, name)? {
                Property::Simplex(s) => columns.push(s.column),
                Property::Complex(c) => {
                    let join = self.resolve_complex_inner(key, &c.name, visiting)?;
                    columns.extend(join.columns.into_iter().map(|(near, _)| near));
                }
            }
        }
        Ok(columns)
    }

    fn key_columns(&self, key: &EntityKey) -> Result<Vec<String>> {
        let keys = self.effective_keys(key)?;
        if keys.is_empty() {
            return Err(Error::metadata(
                MetadataErrorKind::UnknownMember,
                Some(key.to_string()),
                None,
                format!("'{}' declares no key", key),
            ));
        }
        Ok(keys.into_iter().map(|k| k.column).collect())
    }

    /// Property tokens for host type `H`, built once per entity and cached.
    ///
    /// Every complex property of the entity is resolved while building, so
    /// cyclic navigations are rejected here.
    pub fn get_tokens<H: Host>(&self, key: &EntityKey) -> Result<Arc<TokenSet<H>>> {
        let cache_key = (key.clone(), TypeId::of::<H>());
        {
            let cache = self.tokens.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(cached) = cache.get(&cache_key) {
                return downcast_tokens(Arc::clone(cached));
            }
        }

        let members = H::members();
        let mut tokens = Vec::new();
        for property in self.effective_properties(key)? {
            if let Property::Complex(c) = &property {
                self.resolve_complex(key, &c.name)?;
            }
            if let Some(member) = token::bind_member(&members, property.name()) {
                tokens.push(PropertyToken::new(property, member));
            }
        }
        tracing::debug!(
            entity = %key,
            host = std::any::type_name::<H>(),
            tokens = tokens.len(),
            "Built property tokens"
        );
        let built: Arc<dyn Any + Send + Sync> = Arc::new(TokenSet::new(key.clone(), tokens));

        let mut cache = self.tokens.write().unwrap_or_else(PoisonError::into_inner);
        let entry = cache.entry(cache_key).or_insert(built);
        downcast_tokens(Arc::clone(entry))
    }
}

fn downcast_tokens<H: Host>(cached: Arc<dyn Any + Send + Sync>) -> Result<Arc<TokenSet<H>>> {
    cached.downcast::<TokenSet<H>>().map_err(|_| {
        Error::Custom(format!(
            "token cache entry has the wrong host type (expected {})",
            std::any::type_name::<H>()
        ))
    })
}

fn resolve_reference(
    from: &str,
    text: &str,
    exists: impl Fn(&EntityKey) -> bool,
) -> Option<EntityKey> {
    if text.contains('.') {
        let key = EntityKey::parse(text);
        return exists(&key).then_some(key);
    }
    [EntityKey::new(from, text), EntityKey::global(text)]
        .into_iter()
        .find(|k| exists(k))
}

fn merge_definition(into: &mut EntityDef, def: EntityDef) -> Result<()> {
    let key = into.key_ref();
    let conflict = |what: &str, a: &str, b: &str| {
        Error::metadata(
            MetadataErrorKind::Conflict,
            Some(key.to_string()),
            None,
            format!("'{}' declares {} '{}' and '{}'", key, what, a, b),
        )
    };
    if let Some(alias) = def.alias {
        match &into.alias {
            Some(current) if *current != alias => {
                return Err(conflict("alias", current, &alias));
            }
            Some(_) => {}
            None => into.alias = Some(alias),
        }
    }
    if let Some(base) = def.base {
        match &into.base {
            Some(current) if *current != base => return Err(conflict("base", current, &base)),
            Some(_) => {}
            None => into.base = Some(base),
        }
    }
    for property in def.properties {
        if into
            .properties
            .iter()
            .any(|p| p.name().eq_ignore_ascii_case(property.name()))
        {
            return Err(Error::metadata(
                MetadataErrorKind::DuplicateMember,
                Some(key.to_string()),
                Some(property.name().to_string()),
                format!("'{}' defines member '{}' twice", key, property.name()),
            ));
        }
        into.properties.push(property);
    }
    for name in def.keys {
        if !into.keys.iter().any(|k| k.eq_ignore_ascii_case(&name)) {
            into.keys.push(name);
        }
    }
    into.immutable |= def.immutable;
    Ok(())
}

fn resolve_definition(def: EntityDef, keys: &HashSet<EntityKey>) -> Result<Entity> {
    let key = def.key_ref();
    let mut properties = Vec::with_capacity(def.properties.len());
    for property in def.properties {
        let resolved = match property {
            PropertyDef::Simplex(s) => {
                let sequence = match &s.sequence {
                    Some(text) => {
                        let sequence = Sequence::parse(text, s.data_type).map_err(|e| match e {
                            Error::Metadata(mut m) => {
                                m.entity = Some(key.to_string());
                                m.member = Some(s.name.clone());
                                Error::Metadata(m)
                            }
                            other => other,
                        })?;
                        Some(Arc::new(sequence.anchored(&key.namespace, |k| keys.contains(k))))
                    }
                    None => None,
                };
                Property::Simplex(SimplexProperty {
                    column: s.column.unwrap_or_else(|| s.name.clone()),
                    name: s.name,
                    data_type: s.data_type,
                    length: s.length,
                    precision: s.precision,
                    scale: s.scale,
                    required: s.required,
                    tag: s.tag,
                    sequence,
                })
            }
            PropertyDef::Complex(c) => {
                let target = resolve_reference(&key.namespace, &c.target, |k| keys.contains(k))
                    .unwrap_or_else(|| {
                        if c.target.contains('.') {
                            EntityKey::parse(&c.target)
                        } else {
                            EntityKey::new(key.namespace.clone(), c.target.clone())
                        }
                    });
                Property::Complex(ComplexProperty {
                    name: c.name,
                    target,
                    multiplicity: c.multiplicity,
                    foreign: c.foreign,
                    local: c.local,
                })
            }
        };
        properties.push(resolved);
    }
    Ok(Entity {
        key,
        alias: def.alias,
        base: def.base,
        properties,
        keys: def.keys,
        immutable: def.immutable,
    })
}

/// The process-wide metadata container.
#[derive(Debug)]
pub struct Metadata {
    current: RwLock<Arc<EntitySet>>,
}

impl Default for Metadata {
    fn default() -> Self {
        Self::empty()
    }
}

impl Metadata {
    /// A container with no entities.
    pub fn empty() -> Self {
        Self {
            current: RwLock::new(Arc::new(EntitySet::empty())),
        }
    }

    /// Build a container from providers, merged in order.
    pub fn load(providers: &[&dyn MetadataProvider]) -> Result<Self> {
        let set = EntitySet::build(providers)?;
        tracing::debug!(entities = set.entities.len(), "Metadata loaded");
        Ok(Self {
            current: RwLock::new(Arc::new(set)),
        })
    }

    /// Rebuild from providers and swap the new set in.
    ///
    /// On error the current set stays in place.
    pub fn reload(&self, providers: &[&dyn MetadataProvider]) -> Result<()> {
        let set = Arc::new(EntitySet::build(providers)?);
        let count = set.entities.len();
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = set;
        tracing::debug!(entities = count, "Metadata reloaded");
        Ok(())
    }

    /// The current entity set. Hold on to it for a consistent view across
    /// several lookups.
    pub fn snapshot(&self) -> Arc<EntitySet> {
        Arc::clone(&self.current.read().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn entity(&self, name: &str, namespace: &str) -> Option<Arc<Entity>> {
        self.snapshot().entity(&EntityKey::new(namespace, name))
    }

    pub fn entities(&self) -> Vec<Arc<Entity>> {
        self.snapshot().entities().cloned().collect()
    }

    pub fn find(&self, key: &EntityKey, path: &str) -> Result<PropertyPath> {
        self.snapshot().find(key, path)
    }

    pub fn base_entity(&self, entity: &Entity) -> Result<Option<Arc<Entity>>> {
        self.snapshot().base_entity(entity)
    }

    pub fn inheritance_chain(&self, key: &EntityKey) -> Result<Vec<Arc<Entity>>> {
        self.snapshot().inheritance_chain(key)
    }

    pub fn resolve_complex(&self, key: &EntityKey, name: &str) -> Result<Join> {
        self.snapshot().resolve_complex(key, name)
    }

    pub fn get_tokens<H: Host>(&self, key: &EntityKey) -> Result<Arc<TokenSet<H>>> {
        self.snapshot().get_tokens::<H>(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DataType;
    use crate::value::Value;
    use sqlweave_macros::Host;

    fn shop() -> StaticProvider {
        StaticProvider::default()
            .entity(
                EntityDef::new("Customer")
                    .namespace("Sales")
                    .key("Id")
                    .property(SimplexDef::new("Id", DataType::Int64).sequence("customer_id"))
                    .property(SimplexDef::new("Name", DataType::String).length(100).required())
                    .property(SimplexDef::new("Email", DataType::AnsiString).length(200))
                    .property(
                        ComplexDef::new("Orders", "Order", Multiplicity::Many).foreign("Customer"),
                    ),
            )
            .entity(
                EntityDef::new("Order")
                    .namespace("Sales")
                    .alias("orders")
                    .key("Id")
                    .property(SimplexDef::new("Id", DataType::Int64).sequence("#order_no"))
                    .property(SimplexDef::new("CustomerId", DataType::Int64).required())
                    .property(ComplexDef::new("Customer", "Customer", Multiplicity::One))
                    .property(SimplexDef::new("Total", DataType::Decimal).precision(18, 2)),
            )
            .entity(
                EntityDef::new("Line")
                    .namespace("Sales")
                    .key("Id")
                    .property(SimplexDef::new("Id", DataType::Int64))
                    .property(SimplexDef::new("OrderId", DataType::Int64))
                    .property(ComplexDef::new("Order", "Order", Multiplicity::One))
                    .property(SimplexDef::new("Sku", DataType::AnsiString).length(32)),
            )
            .entity(
                EntityDef::new("Archive")
                    .key("Id")
                    .property(SimplexDef::new("Id", DataType::Int64).sequence("&Sales.Order.Id")),
            )
    }

    fn load(providers: &[&dyn MetadataProvider]) -> Metadata {
        Metadata::load(providers).unwrap()
    }

    fn key(ns: &str, name: &str) -> EntityKey {
        EntityKey::new(ns, name)
    }

    #[test]
    fn find_matches_manual_walk() {
        let shop = shop();
        let metadata = load(&[&shop]);
        let line = key("Sales", "Line");

        let path = metadata.find(&line, "Order.Customer.Name").unwrap();

        let set = metadata.snapshot();
        let mut current = line.clone();
        let mut manual_hops = Vec::new();
        for segment in ["Order", "Customer"] {
            let p = set.effective_property(&current, segment).unwrap();
            let target = p.as_complex().unwrap().target.clone();
            manual_hops.push((current.clone(), p.name().to_string()));
            current = target;
        }
        let last = set.effective_property(&current, "Name").unwrap();

        let hops: Vec<_> = path
            .hops
            .iter()
            .map(|h| (h.entity.clone(), h.property.name.clone()))
            .collect();
        assert_eq!(hops, manual_hops);
        assert_eq!(path.owner, current);
        assert_eq!(path.property.name(), last.name());
        assert_eq!(
            path.hops[0].join.columns,
            vec![("OrderId".to_string(), "Id".to_string())]
        );
    }

    #[test]
    fn find_reports_unknown_member() {
        let shop = shop();
        let metadata = load(&[&shop]);
        let order = key("Sales", "Order");
        for path in ["Nope", "Customer.Nope", "Total.Anything", "", "Customer..Name"] {
            let err = metadata.find(&order, path).unwrap_err();
            assert_eq!(
                err.metadata_kind(),
                Some(MetadataErrorKind::UnknownMember),
                "{path}"
            );
        }
    }

    #[test]
    fn many_navigation_follows_foreign_navigation() {
        let shop = shop();
        let metadata = load(&[&shop]);
        let join = metadata
            .resolve_complex(&key("Sales", "Customer"), "Orders")
            .unwrap();
        assert_eq!(join.multiplicity, Multiplicity::Many);
        assert_eq!(join.far, key("Sales", "Order"));
        assert_eq!(join.columns, vec![("Id".to_string(), "CustomerId".to_string())]);
    }

    fn tree() -> StaticProvider {
        StaticProvider::default().entity(
            EntityDef::new("Node")
                .key("Id")
                .property(SimplexDef::new("Id", DataType::Int32))
                .property(SimplexDef::new("ParentId", DataType::Int32))
                .property(ComplexDef::new("Parent", "Node", Multiplicity::One).foreign("Children"))
                .property(ComplexDef::new("Children", "Node", Multiplicity::Many).foreign("Parent")),
        )
    }

    #[test]
    fn cyclic_navigation_is_rejected() {
        let tree = tree();
        let metadata = load(&[&tree]);
        let err = metadata
            .resolve_complex(&EntityKey::global("Node"), "Parent")
            .unwrap_err();
        assert_eq!(err.metadata_kind(), Some(MetadataErrorKind::CyclicNavigation));

        let err = metadata
            .get_tokens::<Record>(&EntityKey::global("Node"))
            .unwrap_err();
        assert_eq!(err.metadata_kind(), Some(MetadataErrorKind::CyclicNavigation));
    }

    #[test]
    fn merge_adds_members_and_ors_immutability() {
        let shop = shop();
        let extra = StaticProvider::default().entity(
            EntityDef::new("Order")
                .namespace("Sales")
                .alias("orders")
                .immutable()
                .property(SimplexDef::new("Note", DataType::String)),
        );
        let metadata = load(&[&shop, &extra]);
        let order = metadata.entity("Order", "Sales").unwrap();
        assert!(order.immutable);
        assert!(order.property("note").is_some());
        assert_eq!(order.table_name(), "orders");
    }

    #[test]
    fn merge_rejects_redefinition_and_alias_conflict() {
        let shop = shop();
        let dup = StaticProvider::default().entity(
            EntityDef::new("Order")
                .namespace("Sales")
                .property(SimplexDef::new("total", DataType::Double)),
        );
        let err = Metadata::load(&[&shop, &dup]).unwrap_err();
        assert_eq!(err.metadata_kind(), Some(MetadataErrorKind::DuplicateMember));

        let alias = StaticProvider::default()
            .entity(EntityDef::new("Order").namespace("Sales").alias("order_tbl"));
        let err = Metadata::load(&[&shop, &alias]).unwrap_err();
        assert_eq!(err.metadata_kind(), Some(MetadataErrorKind::Conflict));
    }

    fn documents() -> StaticProvider {
        StaticProvider::default()
            .entity(
                EntityDef::new("Document")
                    .key("Id")
                    .property(SimplexDef::new("Id", DataType::Int64))
                    .property(SimplexDef::new("Title", DataType::String)),
            )
            .entity(
                EntityDef::new("Signed")
                    .base("Document")
                    .property(SimplexDef::new("Signature", DataType::Binary)),
            )
            .entity(EntityDef::new("Orphan").base("Missing"))
            .entity(EntityDef::new("A").base("B"))
            .entity(EntityDef::new("B").base("A"))
    }

    #[test]
    fn inheritance_chain_and_effective_members() {
        let docs = documents();
        let metadata = load(&[&docs]);
        let signed = EntityKey::global("Signed");

        let chain: Vec<String> = metadata
            .inheritance_chain(&signed)
            .unwrap()
            .iter()
            .map(|e| e.name().to_string())
            .collect();
        assert_eq!(chain, vec!["Document", "Signed"]);

        let set = metadata.snapshot();
        let names: Vec<String> = set
            .effective_properties(&signed)
            .unwrap()
            .iter()
            .map(|p| p.name().to_string())
            .collect();
        assert_eq!(names, vec!["Id", "Title", "Signature"]);
        assert_eq!(set.effective_keys(&signed).unwrap()[0].name, "Id");
    }

    #[test]
    fn missing_and_cyclic_bases() {
        let docs = documents();
        let metadata = load(&[&docs]);
        let orphan = metadata.entity("Orphan", "").unwrap();
        let err = metadata.base_entity(&orphan).unwrap_err();
        assert_eq!(err.metadata_kind(), Some(MetadataErrorKind::MissingBase));

        let document = metadata.entity("Document", "").unwrap();
        assert!(metadata.base_entity(&document).unwrap().is_none());

        let err = metadata
            .inheritance_chain(&EntityKey::global("A"))
            .unwrap_err();
        assert_eq!(err.metadata_kind(), Some(MetadataErrorKind::CyclicNavigation));
    }

    #[test]
    fn invalid_sequence_names_the_member() {
        let bad = StaticProvider::default().entity(
            EntityDef::new("Bad").property(SimplexDef::new("Code", DataType::String).sequence("s")),
        );
        match Metadata::load(&[&bad]).unwrap_err() {
            Error::Metadata(m) => {
                assert_eq!(m.kind, MetadataErrorKind::InvalidSequence);
                assert_eq!(m.member.as_deref(), Some("Code"));
                assert_eq!(m.entity.as_deref(), Some("Bad"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn proxy_resolution_is_cached() {
        let shop = shop();
        let metadata = load(&[&shop]);
        let set = metadata.snapshot();
        let archive = set
            .effective_property(&EntityKey::global("Archive"), "Id")
            .unwrap();
        let sequence = archive.as_simplex().unwrap().sequence.clone().unwrap();
        assert_eq!(sequence.resolution_count(), 0);

        let first = sequence.resolve(&set).unwrap().clone();
        let second = sequence.resolve(&set).unwrap().clone();
        assert_eq!(first, second);
        assert_eq!(first.name, "order_no");
        assert_eq!(first.kind, SequenceKind::External);
        assert_eq!(sequence.resolution_count(), 1);
    }

    #[test]
    fn concurrent_proxy_resolution_stores_once() {
        let shop = shop();
        let metadata = load(&[&shop]);
        let set = metadata.snapshot();
        let archive = set
            .effective_property(&EntityKey::global("Archive"), "Id")
            .unwrap();
        let sequence = archive.as_simplex().unwrap().sequence.clone().unwrap();

        let resolved: Vec<&SequenceSpec> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| scope.spawn(|| sequence.resolve(&set).unwrap()))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert!(resolved.windows(2).all(|w| std::ptr::eq(w[0], w[1])));
        assert_eq!(sequence.resolution_count(), 1);
    }

    #[test]
    fn proxy_prefers_the_owner_namespace() {
        let order = |namespace: &str, sequence: &str| {
            EntityDef::new("Order")
                .namespace(namespace)
                .property(SimplexDef::new("Id", DataType::Int64).sequence(sequence))
        };
        let provider = StaticProvider::default()
            .entity(order("", "#global_order"))
            .entity(order("Sales", "#sales_order"))
            .entity(
                EntityDef::new("Quote")
                    .namespace("Sales")
                    .property(SimplexDef::new("Id", DataType::Int64).sequence("&Order.Id")),
            )
            .entity(
                EntityDef::new("Quote")
                    .property(SimplexDef::new("Id", DataType::Int64).sequence("&Order.Id")),
            )
            .entity(
                EntityDef::new("Lead")
                    .namespace("Crm")
                    .property(SimplexDef::new("Id", DataType::Int64).sequence("&Order.Id")),
            );
        let metadata = load(&[&provider]);
        let set = metadata.snapshot();
        let resolved = |namespace: &str, entity: &str| {
            let p = set
                .effective_property(&EntityKey::new(namespace, entity), "Id")
                .unwrap();
            let sequence = p.as_simplex().unwrap().sequence.clone().unwrap();
            let target = sequence.proxy_target().unwrap().0.clone();
            (target, sequence.resolve(&set).unwrap().name.clone())
        };

        assert_eq!(
            resolved("Sales", "Quote"),
            (EntityKey::new("Sales", "Order"), "sales_order".to_string())
        );
        assert_eq!(
            resolved("", "Quote"),
            (EntityKey::global("Order"), "global_order".to_string())
        );
        assert_eq!(
            resolved("Crm", "Lead"),
            (EntityKey::global("Order"), "global_order".to_string())
        );
    }

    #[test]
    fn proxy_to_missing_or_proxy_target_fails() {
        let provider = StaticProvider::default()
            .entity(
                EntityDef::new("Plain")
                    .property(SimplexDef::new("Id", DataType::Int32))
                    .property(SimplexDef::new("Other", DataType::Int32).sequence("&Chain.Id")),
            )
            .entity(
                EntityDef::new("NoSeq")
                    .property(SimplexDef::new("Id", DataType::Int32).sequence("&Plain.Id")),
            )
            .entity(
                EntityDef::new("Chain")
                    .property(SimplexDef::new("Id", DataType::Int32).sequence("&Plain.Other")),
            )
            .entity(
                EntityDef::new("Gone")
                    .property(SimplexDef::new("Id", DataType::Int32).sequence("&Nowhere.Id")),
            );
        let metadata = load(&[&provider]);
        let set = metadata.snapshot();
        for entity in ["NoSeq", "Chain", "Gone"] {
            let p = set
                .effective_property(&EntityKey::global(entity), "Id")
                .unwrap();
            let sequence = p.as_simplex().unwrap().sequence.clone().unwrap();
            let err = sequence.resolve(&set).unwrap_err();
            assert_eq!(
                err.metadata_kind(),
                Some(MetadataErrorKind::InvalidSequence),
                "{entity}"
            );
            assert_eq!(sequence.resolution_count(), 0);
        }
    }

    #[derive(Debug, Default, Host)]
    struct Audit {
        created_by: Option<String>,
    }

    #[derive(Debug, Default, Host)]
    struct OrderRow {
        id: i64,
        #[host(rename = "CustomerId")]
        customer: i64,
        #[host(skip)]
        scratch: i32,
        #[host(flatten)]
        audit: Audit,
    }

    fn audited() -> StaticProvider {
        StaticProvider::default().entity(
            EntityDef::new("Order")
                .namespace("Sales")
                .property(SimplexDef::new("created_by", DataType::String)),
        )
    }

    #[test]
    fn tokens_for_concrete_and_dictionary_hosts() {
        let shop = shop();
        let audited = audited();
        let metadata = load(&[&shop, &audited]);
        let order = key("Sales", "Order");

        let tokens = metadata.get_tokens::<OrderRow>(&order).unwrap();
        let names: Vec<&str> = tokens.iter().map(|t| t.name()).collect();
        assert_eq!(names, vec!["Id", "CustomerId", "created_by"]);

        let mut row = OrderRow::default();
        tokens
            .get("customerid")
            .unwrap()
            .set(&mut row, Value::Int(42))
            .unwrap();
        assert_eq!(row.customer, 42);
        tokens
            .get("created_by")
            .unwrap()
            .set(&mut row, Value::Text("ops".into()))
            .unwrap();
        assert_eq!(row.audit.created_by.as_deref(), Some("ops"));
        assert_eq!(tokens.get("Id").unwrap().get(&row), Value::BigInt(0));
        assert_eq!(row.scratch, 0);

        let dynamic = metadata.get_tokens::<Record>(&order).unwrap();
        assert_eq!(dynamic.len(), 5);
        let mut record = Record::new();
        dynamic
            .get("Total")
            .unwrap()
            .set(&mut record, Value::Text("12.50".into()))
            .unwrap();
        assert_eq!(record.get("Total"), Some(&Value::Decimal("12.50".into())));
    }

    #[test]
    fn token_cache_is_shared_and_cleared_on_reload() {
        let shop = shop();
        let metadata = load(&[&shop]);
        let order = key("Sales", "Order");

        let first = metadata.get_tokens::<Record>(&order).unwrap();
        let again = metadata.get_tokens::<Record>(&order).unwrap();
        assert!(Arc::ptr_eq(&first, &again));

        metadata.reload(&[&shop]).unwrap();
        let after = metadata.get_tokens::<Record>(&order).unwrap();
        assert!(!Arc::ptr_eq(&first, &after));
    }

    #[test]
    fn concurrent_first_access_converges() {
        let shop = shop();
        let metadata = Arc::new(load(&[&shop]));
        let order = key("Sales", "Order");
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let metadata = Arc::clone(&metadata);
                let order = order.clone();
                std::thread::spawn(move || metadata.get_tokens::<Record>(&order).unwrap())
            })
            .collect();
        let sets: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let cached = metadata.get_tokens::<Record>(&order).unwrap();
        assert!(sets.iter().all(|s| Arc::ptr_eq(s, &cached)));
    }

    #[test]
    fn failed_reload_keeps_current_set() {
        let shop = shop();
        let metadata = load(&[&shop]);
        let bad = JsonProvider::from_str("not json");
        assert!(metadata.reload(&[&bad]).is_err());
        assert!(metadata.entity("Order", "Sales").is_some());
    }
}
