//! Grouped prepared-statement import for supertable engines.

use std::collections::HashMap;
use std::sync::Arc;

use sha2::{Digest, Sha256};
use sqlweave_core::{
    CommandKind, Connection, EntityKey, EntitySet, Error, Parameter, ParameterSetter, Record,
    Result, SimplexProperty, Value,
};

use super::{check_required, row_value, CommandGuard, FieldPartition, ImportOptions, Importer};
use crate::ir::{Assignment, Expr, Insert, Param, Statement, TableId, TableRef, TypeSpec};
use crate::visitor::Visitor;

/// Slot the insert visitor leaves for the sub-table name.
pub const SUBTABLE_SLOT: &str = "subtable";

/// Longest sub-table name TDengine 3.x accepts.
pub const DEFAULT_NAME_LIMIT: usize = 192;

/// Hex digits of the SHA-256 kept in hashed names.
const HASH_DIGITS: usize = 16;

/// Sub-table name for one set of tag values.
///
/// A single non-null tag made only of ASCII letters and digits stays
/// readable as `{table}_{value}`. Anything else becomes
/// `{table}__{hash}`, where the hash is the first 16 hex digits of a
/// SHA-256 over the values with NULL kept apart from every text. The
/// double underscore cannot follow a readable prefix, so the two forms
/// never meet. The table prefix is shortened to keep hashed names within
/// `limit`.
pub fn subtable_name(table: &str, tags: &[Value], limit: usize) -> String {
    let texts: Vec<Option<String>> = tags.iter().map(Value::to_plain_text).collect();
    if let [Some(single)] = texts.as_slice() {
        if !single.is_empty() && single.chars().all(|c| c.is_ascii_alphanumeric()) {
            let name = format!("{}_{}", table, single);
            if name.len() <= limit {
                return name;
            }
        }
    }

    let mut hasher = Sha256::new();
    for text in &texts {
        match text {
            Some(text) => {
                hasher.update([1]);
                hasher.update((text.len() as u64).to_be_bytes());
                hasher.update(text.as_bytes());
            }
            None => hasher.update([0]),
        }
    }
    let digest = hasher.finalize();
    let hex: String = digest
        .iter()
        .take(HASH_DIGITS / 2)
        .map(|b| format!("{:02x}", b))
        .collect();

    let suffix = format!("__{}", hex);
    if limit <= suffix.len() {
        return hex.chars().take(limit).collect();
    }
    let mut room = limit - suffix.len();
    if room >= table.len() {
        return format!("{}{}", table, suffix);
    }
    while !table.is_char_boundary(room) {
        room -= 1;
    }
    format!("{}{}", &table[..room], suffix)
}

/// Rows sharing one set of tag values.
struct Group<'r> {
    tags: Vec<Value>,
    rows: Vec<&'r Record>,
}

/// Imports through one prepared insert, switching sub-table per tag group.
pub struct GroupedImporter {
    visitor: Arc<Visitor>,
    setter: Arc<dyn ParameterSetter>,
    options: ImportOptions,
    name_limit: usize,
}

impl GroupedImporter {
    pub fn new(visitor: Arc<Visitor>, setter: Arc<dyn ParameterSetter>, options: ImportOptions) -> Self {
        Self {
            visitor,
            setter,
            options,
            name_limit: DEFAULT_NAME_LIMIT,
        }
    }

    pub fn name_limit(mut self, limit: usize) -> Self {
        self.name_limit = limit;
        self
    }

    fn statement(table: &str, partition: &FieldPartition) -> Statement {
        let assignment = |p: &SimplexProperty| Assignment {
            column: p.column.clone(),
            value: Expr::Parameter(Param::input(p.name.clone(), TypeSpec::of(p), Value::Null)),
            tag: p.tag,
        };
        let mut assignments: Vec<Assignment> = partition.tags.iter().map(assignment).collect();
        assignments.extend(partition.data.iter().map(assignment));
        Statement::Insert(Insert {
            table: TableRef::named(table, TableId(0)),
            assignments,
            generated: None,
        })
    }

    fn parameters(&self, properties: &[SimplexProperty], values: Vec<Value>) -> Result<Vec<Parameter>> {
        properties
            .iter()
            .zip(values)
            .map(|(property, value)| {
                let spec = TypeSpec::of(property);
                let mut parameter = Parameter::new(property.name.clone());
                if let Some(native) = self.visitor.dialect().native_type(&spec) {
                    parameter = parameter.with_native_type(native);
                }
                self.setter.set_value(&mut parameter, value, property.data_type)?;
                Ok(parameter)
            })
            .collect()
    }
}

fn group_rows<'r>(tags: &[SimplexProperty], rows: &'r [Record]) -> Vec<Group<'r>> {
    let mut groups: Vec<Group<'r>> = Vec::new();
    let mut index: HashMap<Vec<String>, usize> = HashMap::new();
    for row in rows {
        let values: Vec<Value> = tags.iter().map(|t| row_value(row, t)).collect();
        let key: Vec<String> = values
            .iter()
            .map(|v| match v.to_plain_text() {
                Some(text) => format!("v{}", text),
                None => "n".to_string(),
            })
            .collect();
        match index.get(&key).copied() {
            Some(i) => groups[i].rows.push(row),
            None => {
                index.insert(key, groups.len());
                groups.push(Group {
                    tags: values,
                    rows: vec![row],
                });
            }
        }
    }
    groups
}

impl Importer for GroupedImporter {
    fn name(&self) -> &'static str {
        "grouped"
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
        let table = set
            .entity(entity)
            .map(|e| e.table_name())
            .ok_or_else(|| Error::unknown_member(entity.to_string(), entity.name.clone()))?;
        let partition = FieldPartition::of(set, entity, false)?;
        if partition.tags.is_empty() {
            return Err(Error::unsupported(
                self.visitor.dialect().name(),
                format!("grouped import of '{}', which has no tag properties", entity),
            ));
        }
        if rows.is_empty() {
            return Ok(0);
        }
        for (i, row) in rows.iter().enumerate() {
            check_required(entity, &partition.tags, row, i)?;
            check_required(entity, &partition.data, row, i)?;
        }

        let script = self.visitor.render(&Self::statement(&table, &partition))?;
        let sql = script.fill(&[(SUBTABLE_SLOT, "?")])?;
        let groups = group_rows(&partition.tags, rows);
        tracing::debug!(groups = groups.len(), sql = %sql, "Grouped rows by tags");

        let mut command = CommandGuard::new(conn.create_command(&sql, CommandKind::Prepared)?);
        let mut total = 0;
        for group in groups {
            let name = subtable_name(&table, &group.tags, self.name_limit);
            command.set_table_name(&name)?;
            command.set_tags(self.parameters(&partition.tags, group.tags)?)?;

            for chunk in group.rows.chunks(self.options.batch_size.max(1)) {
                if cancelled() {
                    tracing::debug!(subtable = %name, imported = total, "Import cancelled");
                    return Err(Error::Cancelled);
                }
                for row in chunk {
                    let values = partition.data.iter().map(|p| row_value(row, p)).collect();
                    *command.parameters_mut() = self.parameters(&partition.data, values)?;
                    command.add_batch()?;
                }
                let affected = command.execute()?;
                total += affected;
                tracing::debug!(subtable = %name, rows = chunk.len(), affected, "Executed batch");
            }
        }
        command.close()?;
        Ok(total)
    }
}
