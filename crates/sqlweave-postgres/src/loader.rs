//! `COPY ... FROM` statements for flat-file imports.

use std::path::Path;

use sqlweave_query::dialect::quote_with;
use sqlweave_query::{BulkFormat, BulkLoader, Dialect};

use crate::config::CopyFormat;
use crate::dialect::PostgresDialect;

#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresLoader {
    format: CopyFormat,
}

impl PostgresLoader {
    pub fn new(format: CopyFormat) -> Self {
        Self { format }
    }
}

/// `E'...'` literal with backslash escapes.
fn escaped(text: &str) -> String {
    let mut out = String::from("E'");
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out.push('\'');
    out
}

impl BulkLoader for PostgresLoader {
    fn load_statement(
        &self,
        path: &Path,
        table: &str,
        columns: &[String],
        format: &BulkFormat,
    ) -> String {
        let columns: Vec<String> = columns.iter().map(|c| PostgresDialect.identifier(c)).collect();
        let mut options = vec![
            match self.format {
                CopyFormat::Text => "FORMAT text".to_string(),
                CopyFormat::Csv => "FORMAT csv".to_string(),
            },
            format!("DELIMITER {}", escaped(&format.delimiter.to_string())),
            format!("NULL {}", escaped(&format.null)),
        ];
        if let (CopyFormat::Csv, Some(quote)) = (self.format, format.quote) {
            options.push(format!("QUOTE {}", escaped(&quote.to_string())));
        }
        format!(
            "COPY {} ({}) FROM {} WITH ({})",
            PostgresDialect.identifier(table),
            columns.join(", "),
            quote_with('\'', &path.to_string_lossy()),
            options.join(", ")
        )
    }
}
