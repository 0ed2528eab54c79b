//! MySQL driver options.
//!
//! Options deserialize from the driver section of a configuration file;
//! every field has a default so partial sections are accepted.

use serde::{Deserialize, Serialize};
use sqlweave_query::ImportOptions;

/// Collation applied to non-ASCII ANSI parameters in predicates.
pub const DEFAULT_CONDITION_COLLATION: &str = "utf8mb4_general_ci";

/// MySQL driver options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MysqlOptions {
    /// Collation for ANSI parameters in conditions; `None` disables it
    pub condition_collation: Option<String>,
    /// Use `LOAD DATA LOCAL INFILE` (client-side file) for imports
    pub local_infile: bool,
    /// Character set of import files
    pub charset: String,
    pub import: ImportOptions,
}

impl Default for MysqlOptions {
    fn default() -> Self {
        Self {
            condition_collation: Some(DEFAULT_CONDITION_COLLATION.to_string()),
            local_infile: true,
            charset: "utf8mb4".to_string(),
            import: ImportOptions::default(),
        }
    }
}

impl MysqlOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn condition_collation<S: Into<String>>(mut self, collation: Option<S>) -> Self {
        self.condition_collation = collation.map(Into::into);
        self
    }

    pub fn local_infile(mut self, local: bool) -> Self {
        self.local_infile = local;
        self
    }

    pub fn charset(mut self, charset: impl Into<String>) -> Self {
        self.charset = charset.into();
        self
    }

    pub fn import(mut self, import: ImportOptions) -> Self {
        self.import = import;
        self
    }
}
