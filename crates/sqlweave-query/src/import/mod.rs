//! Bulk import.
//!
//! Two strategies cover the supported engines:
//!
//! - [`FlatFileImporter`] serializes rows to a temporary file and runs the
//!   engine's bulk-load statement over it (MySQL `LOAD DATA`, Postgres `COPY`).
//! - [`GroupedImporter`] groups rows by tag values and drives one prepared
//!   insert per sub-table (TDengine).
//!
//! Both are synchronous. [`Importer::import_async`] drives them one batch
//! at a time for callers holding an asupersync [`Cx`], yielding to the
//! runtime and checking cancellation between batches.

mod flat;
mod grouped;

pub use flat::{BulkLoader, FlatFileImporter};
pub use grouped::{subtable_name, GroupedImporter, DEFAULT_NAME_LIMIT, SUBTABLE_SLOT};

use std::future::Future;
use std::ops::{Deref, DerefMut};
use std::path::PathBuf;
use std::pin::Pin;

use asupersync::runtime::yield_now;
use serde::{Deserialize, Serialize};
use sqlweave_core::{
    Command, Connection, Cx, DataArgumentError, EntityKey, EntitySet, Error, Host, Outcome,
    Property, Record, Result, SimplexProperty, Value,
};

/// A bulk import strategy.
pub trait Importer: Send + Sync {
    fn name(&self) -> &'static str;

    fn options(&self) -> &ImportOptions;

    /// Import `rows`, asking `cancelled` before every batch.
    ///
    /// Returns the summed affected-row count. Any batch failure is returned
    /// after cleanup; a partial count is never reported as success.
    fn import_with(
        &self,
        conn: &mut dyn Connection,
        set: &EntitySet,
        entity: &EntityKey,
        rows: &[Record],
        cancelled: &dyn Fn() -> bool,
    ) -> Result<u64>;

    fn import(
        &self,
        conn: &mut dyn Connection,
        set: &EntitySet,
        entity: &EntityKey,
        rows: &[Record],
    ) -> Result<u64> {
        self.import_with(conn, set, entity, rows, &|| false)
    }

    /// Cancel-aware import.
    ///
    /// Rows go through [`Importer::import_with`] one batch at a time. The
    /// future yields after every batch, so a task sharing a current-thread
    /// runtime can request cancellation before the next one starts.
    fn import_async<'a>(
        &'a self,
        cx: &'a Cx,
        conn: &'a mut dyn Connection,
        set: &'a EntitySet,
        entity: &'a EntityKey,
        rows: &'a [Record],
    ) -> Pin<Box<dyn Future<Output = Outcome<u64, Error>> + 'a>> {
        Box::pin(async move {
            let cancelled = || cx.cancel_reason().is_some();
            let stopped = |error: Error| match (error, cx.cancel_reason()) {
                (Error::Cancelled, Some(reason)) => Outcome::Cancelled(reason),
                (error, _) => Outcome::Err(error),
            };
            if let Some(reason) = cx.cancel_reason() {
                return Outcome::Cancelled(reason);
            }
            if rows.is_empty() {
                return match self.import_with(conn, set, entity, rows, &cancelled) {
                    Ok(count) => Outcome::Ok(count),
                    Err(e) => stopped(e),
                };
            }

            let mut total = 0;
            for (batch, chunk) in rows.chunks(self.options().batch_size.max(1)).enumerate() {
                if batch > 0 {
                    yield_now().await;
                    if let Some(reason) = cx.cancel_reason() {
                        tracing::debug!(importer = self.name(), imported = total, "Import cancelled");
                        return Outcome::Cancelled(reason);
                    }
                }
                match self.import_with(&mut *conn, set, entity, chunk, &cancelled) {
                    Ok(count) => total += count,
                    Err(e) => return stopped(e),
                }
            }
            Outcome::Ok(total)
        })
    }
}

/// Import tuning shared by the strategies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportOptions {
    /// Rows per batch (file or prepared execution)
    pub batch_size: usize,
    /// Directory for flat files; the system temp dir when unset
    pub temp_dir: Option<PathBuf>,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            batch_size: 1000,
            temp_dir: None,
        }
    }
}

impl ImportOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = Some(dir.into());
        self
    }
}

/// Tag columns versus data columns of an entity.
#[derive(Debug, Clone)]
pub struct FieldPartition {
    pub tags: Vec<SimplexProperty>,
    pub data: Vec<SimplexProperty>,
}

impl FieldPartition {
    /// Split the effective columns of `entity`.
    ///
    /// With `keys_as_tags`, key properties count as tags too; engines
    /// without tag columns use that to group by key.
    pub fn of(set: &EntitySet, entity: &EntityKey, keys_as_tags: bool) -> Result<Self> {
        let keys: Vec<String> = if keys_as_tags {
            set.effective_keys(entity)?.into_iter().map(|k| k.name).collect()
        } else {
            Vec::new()
        };
        let (tags, data) = set
            .effective_properties(entity)?
            .into_iter()
            .filter_map(|p| match p {
                Property::Simplex(s) => Some(s),
                Property::Complex(_) => None,
            })
            .partition(|p| p.tag || keys.iter().any(|k| k.eq_ignore_ascii_case(&p.name)));
        Ok(Self { tags, data })
    }
}

/// Read host objects into records through their property tokens.
pub fn rows_from_hosts<H: Host>(set: &EntitySet, entity: &EntityKey, hosts: &[H]) -> Result<Vec<Record>> {
    let tokens = set.get_tokens::<H>(entity)?;
    Ok(hosts.iter().map(|h| tokens.to_record(h)).collect())
}

/// Case-insensitive value lookup; absent and NULL are both `Null`.
pub(crate) fn row_value(row: &Record, property: &SimplexProperty) -> Value {
    row.get(&property.name)
        .or_else(|| {
            row.iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(&property.name))
                .map(|(_, v)| v)
        })
        .cloned()
        .unwrap_or(Value::Null)
}

/// Fail when a required column without a generated value is missing.
pub(crate) fn check_required(
    entity: &EntityKey,
    properties: &[SimplexProperty],
    row: &Record,
    index: usize,
) -> Result<()> {
    for property in properties {
        if property.required && property.sequence.is_none() && row_value(row, property).is_null() {
            return Err(Error::DataArgument(DataArgumentError {
                field: Some(property.name.clone()),
                message: format!(
                    "row {} of '{}' has no value for required '{}'",
                    index, entity, property.name
                ),
                code: None,
            }));
        }
    }
    Ok(())
}

/// Closes its command on every exit path.
pub(crate) struct CommandGuard<'c> {
    command: Box<dyn Command + 'c>,
    closed: bool,
}

impl<'c> CommandGuard<'c> {
    pub(crate) fn new(command: Box<dyn Command + 'c>) -> Self {
        Self {
            command,
            closed: false,
        }
    }

    /// Close now and report the result.
    pub(crate) fn close(mut self) -> Result<()> {
        self.closed = true;
        self.command.close()
    }
}

impl<'c> Deref for CommandGuard<'c> {
    type Target = dyn Command + 'c;

    fn deref(&self) -> &Self::Target {
        &*self.command
    }
}

impl DerefMut for CommandGuard<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut *self.command
    }
}

impl Drop for CommandGuard<'_> {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        if let Err(e) = self.command.close() {
            tracing::warn!(error = %e, "Failed to close import command");
        }
    }
}
