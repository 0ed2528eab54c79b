//! Core types and traits for sqlweave.
//!
//! This crate provides the foundations the statement compiler builds on:
//!
//! - `Value` and the canonical `DataType` set
//! - the `Error` taxonomy shared by every driver
//! - the metadata model: entities, properties, sequences and property tokens
//! - collaborator interfaces for connections, commands and parameter binding
//! - `Outcome` and `Cx` re-exports from asupersync for cancel-correct bulk work

// Lets `#[derive(Host)]` output name `sqlweave_core` inside this crate's tests.
extern crate self as sqlweave_core;

// Re-export asupersync primitives for structured concurrency
pub use asupersync::{Cx, Outcome};

pub mod connection;
pub mod error;
pub mod metadata;
pub mod row;
pub mod types;
pub mod value;

pub use connection::{
    Command, CommandKind, Connection, ConnectionFactory, DefaultParameterSetter, Parameter,
    ParameterSetter,
};
pub use error::{
    ConfigError, ConstraintKind, DataArgumentError, DataConflictError, DataConstraintError,
    DialectError, DialectErrorKind, Error, MetadataError, MetadataErrorKind, QueryError,
    QueryErrorKind, Result, TypeError, UnsupportedError,
};
pub use metadata::{
    ComplexDef, ComplexProperty, Entity, EntityDef, EntityKey, EntitySet, Hop, Host, Join,
    JsonProvider, Member, Metadata, MetadataProvider, Multiplicity, Property, PropertyDef,
    PropertyPath, PropertyToken, Record, Sequence, SequenceKind, SequenceSpec, SimplexDef,
    SimplexProperty, StaticProvider, TokenSet,
};
pub use row::Row;
pub use types::DataType;
pub use value::Value;
