//! PostgreSQL driver for sqlweave.
//!
//! PostgreSQL accepts the generic statement shapes as they are, so this
//! crate supplies only spelling (double-quoted identifiers, `$n`
//! placeholders, identity columns, `nextval`/`currval`), SQLSTATE error
//! translation and a `COPY`-based importer.
//!
//! # Example
//!
//! ```rust,ignore
//! use sqlweave_postgres::PostgresDriver;
//! use sqlweave_query::{Driver, InsertRequest, Request};
//!
//! let driver = PostgresDriver::default();
//! let script = driver.compile(&set, &Request::from(InsertRequest::new(person, row)))?;
//! assert!(script.text().ends_with("RETURNING \"Id\""));
//! ```

pub mod config;
pub mod dialect;
pub mod driver;
pub mod error;
pub mod loader;
pub mod types;

pub use config::{CopyFormat, PostgresOptions};
pub use dialect::PostgresDialect;
pub use driver::{DRIVER_NAME, PostgresDriver};
pub use loader::PostgresLoader;
