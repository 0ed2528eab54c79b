//! MySQL driver for sqlweave.
//!
//! The driver renders statements with backtick identifiers and `?`
//! placeholders, and adjusts the generic statement shapes where MySQL
//! needs its own syntax:
//!
//! - multi-table `UPDATE` lists every table and conjoins join conditions
//!   into `WHERE`;
//! - `DELETE alias FROM ...` for joined deletes;
//! - `INSERT ... ON DUPLICATE KEY UPDATE` for upserts;
//! - `EXISTS` sub-selects in data-modifying statements are wrapped in a
//!   derived table.
//!
//! Native errors are translated by errno (see [`error`]). Bulk imports
//! write tab-separated files and load them with `LOAD DATA INFILE`.
//!
//! # Example
//!
//! ```rust,ignore
//! use sqlweave_mysql::{MysqlDriver, MysqlOptions};
//! use sqlweave_query::{Driver, Request, SelectRequest};
//!
//! let driver = MysqlDriver::new(MysqlOptions::default());
//! let script = driver.compile(&set, &Request::Select(SelectRequest::new(person)))?;
//! println!("{}", script.text());
//! ```

pub mod config;
pub mod dialect;
pub mod driver;
pub mod error;
pub mod loader;
pub mod types;
pub mod visitor;

pub use config::MysqlOptions;
pub use dialect::MysqlDialect;
pub use driver::{DRIVER_NAME, MysqlDriver};
pub use loader::MysqlLoader;
pub use types::FieldType;
