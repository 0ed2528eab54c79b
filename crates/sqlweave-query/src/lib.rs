//! Statement compilation for sqlweave.
//!
//! `sqlweave-query` turns driver-independent requests into dialect-correct
//! SQL. The pipeline runs leaf first:
//!
//! - **Builder** resolves a [`Request`] against the metadata set into
//!   statement IR ([`Statement`]).
//! - **Visitor** renders IR through a per-kind visitor matrix bound to a
//!   [`Dialect`], producing a [`Script`] of text fragments and bound
//!   parameters.
//! - **Driver** packages one engine's builder, visitor, parameter setter,
//!   error translation and bulk [`Importer`].
//!
//! Engine crates (`sqlweave-mysql`, `sqlweave-postgres`,
//! `sqlweave-tdengine`) implement [`Driver`] on top of these pieces.

pub mod builder;
pub mod dialect;
pub mod driver;
pub mod import;
pub mod ir;
pub mod script;
pub mod translate;
pub mod visitor;

pub use builder::{
    AggregateItem, AggregateRequest, CommonBuilder, CompareOp, DeleteRequest, ExecutionRequest,
    ExistRequest, Filter, InsertRequest, Order, Request, SelectRequest, StatementBuilder,
    TableDefinitionRequest, UpdateRequest, UpsertRequest,
};
pub use dialect::{AnsiDialect, Dialect, Symbol};
pub use driver::{BulkFormat, Driver, ErrorContext, Features};
pub use import::{
    BulkLoader, FieldPartition, FlatFileImporter, GroupedImporter, ImportOptions, Importer,
    rows_from_hosts,
};
pub use ir::{AggregateFunction, Statement, StatementKind};
pub use script::{
    BoundParameter, Fragment, GeneratedValue, MemorySequences, Script, SequenceSource,
};
pub use translate::MessagePattern;
pub use visitor::{
    DefaultExpressions, ExpressionVisitor, RenderContext, StatementVisitor, Visitor,
};
