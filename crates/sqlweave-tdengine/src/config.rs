//! TDengine driver options.

use serde::{Deserialize, Serialize};
use sqlweave_query::ImportOptions;
pub use sqlweave_query::import::DEFAULT_NAME_LIMIT as MAX_TABLE_NAME;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TdengineOptions {
    /// Generated sub-table names longer than this are hashed
    pub name_limit: usize,
    pub import: ImportOptions,
}

impl Default for TdengineOptions {
    fn default() -> Self {
        Self {
            name_limit: MAX_TABLE_NAME,
            import: ImportOptions::default(),
        }
    }
}

impl TdengineOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clamped to `1..=MAX_TABLE_NAME`.
    pub fn name_limit(mut self, limit: usize) -> Self {
        self.name_limit = limit.clamp(1, MAX_TABLE_NAME);
        self
    }

    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.import = self.import.batch_size(batch_size);
        self
    }

    pub fn import(mut self, import: ImportOptions) -> Self {
        self.import = import;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = TdengineOptions::default();
        assert_eq!(options.name_limit, 192);
        assert_eq!(options.import.batch_size, 1000);
    }

    #[test]
    fn test_builder_clamps_name_limit() {
        let options = TdengineOptions::new().name_limit(1000).batch_size(0);
        assert_eq!(options.name_limit, MAX_TABLE_NAME);
        assert_eq!(options.import.batch_size, 1);
    }

    #[test]
    fn test_partial_section() {
        let options: TdengineOptions = serde_json::from_str(r#"{"name_limit": 48}"#).unwrap();
        assert_eq!(options.name_limit, 48);
        assert_eq!(options.import, ImportOptions::default());
    }
}
