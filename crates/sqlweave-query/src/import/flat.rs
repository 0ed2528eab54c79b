//! Flat-file bulk import.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use sqlweave_core::{
    CommandKind, Connection, EntityKey, EntitySet, Error, Property, Record, Result,
    SimplexProperty,
};
use tempfile::NamedTempFile;

use super::{check_required, row_value, CommandGuard, ImportOptions, Importer};
use crate::driver::BulkFormat;

/// Produces the engine statement that loads a flat file into a table.
pub trait BulkLoader: Send + Sync {
    fn load_statement(
        &self,
        path: &Path,
        table: &str,
        columns: &[String],
        format: &BulkFormat,
    ) -> String;
}

/// Writes each batch to a temporary file and bulk-loads it.
///
/// The file lives only as long as its batch: it is removed when the batch
/// completes or fails.
pub struct FlatFileImporter {
    loader: Arc<dyn BulkLoader>,
    format: BulkFormat,
    options: ImportOptions,
}

impl FlatFileImporter {
    pub fn new(loader: Arc<dyn BulkLoader>, format: BulkFormat, options: ImportOptions) -> Self {
        Self {
            loader,
            format,
            options,
        }
    }

    pub fn format(&self) -> &BulkFormat {
        &self.format
    }

    /// Columns present in at least one row, in declaration order.
    fn columns(set: &EntitySet, entity: &EntityKey, rows: &[Record]) -> Result<Vec<SimplexProperty>> {
        Ok(set
            .effective_properties(entity)?
            .into_iter()
            .filter_map(|p| match p {
                Property::Simplex(s) => Some(s),
                Property::Complex(_) => None,
            })
            .filter(|p| rows.iter().any(|r| !row_value(r, p).is_null()))
            .collect())
    }

    fn write_batch(&self, properties: &[SimplexProperty], rows: &[Record]) -> Result<NamedTempFile> {
        let prefix = format!("sqlweave-{:08x}-", rand::random::<u32>());
        let mut builder = tempfile::Builder::new();
        builder.prefix(&prefix).suffix(".txt");
        let mut file = match &self.options.temp_dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };

        let mut text = String::new();
        for row in rows {
            for (i, property) in properties.iter().enumerate() {
                if i > 0 {
                    text.push(self.format.delimiter);
                }
                match row_value(row, property).to_plain_text() {
                    Some(value) => text.push_str(&encode_field(&value, &self.format)),
                    None => text.push_str(&self.format.null),
                }
            }
            text.push_str(&self.format.line_terminator);
        }
        file.write_all(text.as_bytes())?;
        file.flush()?;
        Ok(file)
    }
}

/// Escape one field for `format`.
///
/// With a quote character the field is quoted and embedded quotes doubled.
/// Otherwise control characters, the delimiter and the escape character
/// itself are written as escape sequences.
pub(crate) fn encode_field(value: &str, format: &BulkFormat) -> String {
    if let Some(quote) = format.quote {
        let mut out = String::with_capacity(value.len() + 2);
        out.push(quote);
        for c in value.chars() {
            if c == quote {
                out.push(quote);
            }
            out.push(c);
        }
        out.push(quote);
        return out;
    }
    let Some(escape) = format.escape else {
        return value.to_string();
    };
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\n' => {
                out.push(escape);
                out.push('n');
            }
            '\r' => {
                out.push(escape);
                out.push('r');
            }
            '\t' => {
                out.push(escape);
                out.push('t');
            }
            c if c == escape || c == format.delimiter => {
                out.push(escape);
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out
}

impl Importer for FlatFileImporter {
    fn name(&self) -> &'static str {
        "flat-file"
    }

    fn options(&self) -> &ImportOptions {
        &self.options
    }

    #[tracing::instrument(level = "debug", skip(self, conn, set, rows, cancelled), fields(entity = %entity, rows = rows.len()))]
    fn import_with(
        &self,
        conn: &mut dyn Connection,
        set: &EntitySet,
        entity: &EntityKey,
        rows: &[Record],
        cancelled: &dyn Fn() -> bool,
    ) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }
        let table = set
            .entity(entity)
            .map(|e| e.table_name())
            .ok_or_else(|| Error::unknown_member(entity.to_string(), entity.name.clone()))?;
        let all = set
            .effective_properties(entity)?
            .into_iter()
            .filter_map(|p| p.as_simplex().cloned())
            .collect::<Vec<_>>();
        for (i, row) in rows.iter().enumerate() {
            check_required(entity, &all, row, i)?;
        }
        let properties = Self::columns(set, entity, rows)?;
        let columns: Vec<String> = properties.iter().map(|p| p.column.clone()).collect();

        let mut total = 0;
        for (batch, chunk) in rows.chunks(self.options.batch_size.max(1)).enumerate() {
            if cancelled() {
                tracing::debug!(batch, imported = total, "Import cancelled");
                return Err(Error::Cancelled);
            }
            let file = self.write_batch(&properties, chunk)?;
            let sql = self
                .loader
                .load_statement(file.path(), &table, &columns, &self.format);
            tracing::trace!(sql = %sql, "Bulk load");

            let mut command = CommandGuard::new(conn.create_command(&sql, CommandKind::BulkLoad)?);
            let affected = command.execute()?;
            command.close()?;
            total += affected;
            tracing::debug!(batch, rows = chunk.len(), affected, "Loaded batch");
        }
        Ok(total)
    }
}
