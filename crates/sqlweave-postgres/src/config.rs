//! PostgreSQL driver options.

use serde::{Deserialize, Serialize};
use sqlweave_query::{BulkFormat, ImportOptions};

/// Layout of the files `COPY` reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CopyFormat {
    /// Tab-separated, backslash escapes, `\N` for NULL
    #[default]
    Text,
    /// Comma-separated, every value quoted, empty unquoted field for NULL
    Csv,
}

impl CopyFormat {
    pub fn bulk_format(self) -> BulkFormat {
        match self {
            CopyFormat::Text => BulkFormat::default(),
            CopyFormat::Csv => BulkFormat {
                quote: Some('"'),
                escape: None,
                ..BulkFormat::default().delimiter(',').null("")
            },
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PostgresOptions {
    pub copy_format: CopyFormat,
    pub import: ImportOptions,
}

impl PostgresOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn copy_format(mut self, format: CopyFormat) -> Self {
        self.copy_format = format;
        self
    }

    pub fn import(mut self, import: ImportOptions) -> Self {
        self.import = import;
        self
    }
}
