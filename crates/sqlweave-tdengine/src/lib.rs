//! TDengine driver for sqlweave.
//!
//! TDengine stores time series in supertables: every row has a timestamp
//! and data columns, and belongs to a sub-table identified by its tag
//! values. Entity properties marked as tags become tag columns. This crate
//! renders inserts through `INSERT INTO <sub-table> USING <supertable>
//! TAGS (...)`, creates supertables with `CREATE STABLE`, refuses UPDATE,
//! and imports rows with one prepared statement that switches sub-table
//! per tag group.
//!
//! # Example
//!
//! ```rust,ignore
//! use sqlweave_tdengine::TdengineDriver;
//! use sqlweave_query::Driver;
//!
//! let driver = TdengineDriver::default();
//! let imported = driver.create_importer().import(&mut conn, &set, &meters, &rows)?;
//! ```

pub mod config;
pub mod dialect;
pub mod driver;
pub mod error;
pub mod types;
pub mod visitor;

pub use config::TdengineOptions;
pub use dialect::TdengineDialect;
pub use driver::{DRIVER_NAME, TdengineDriver};
pub use types::TsdbType;
