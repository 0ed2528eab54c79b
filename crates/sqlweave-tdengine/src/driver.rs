//! The TDengine driver.

use std::sync::Arc;

use sqlweave_core::{DefaultParameterSetter, EntitySet, Error, ParameterSetter, Result, Value};
use sqlweave_query::import::{SUBTABLE_SLOT, subtable_name};
use sqlweave_query::ir::{Assignment, Expr, TableName, TableRef};
use sqlweave_query::{
    CommonBuilder, Driver, ErrorContext, Features, GroupedImporter, Importer, Request, Script,
    Statement, StatementBuilder, StatementKind, Visitor,
};

use crate::config::TdengineOptions;
use crate::error::translate;
use crate::visitor::tdengine_visitor;

pub const DRIVER_NAME: &str = "tdengine";

/// TDengine 3.x.
///
/// Rows are append-only: UPDATE is refused when the request is built and
/// an upsert is an insert that overwrites the row with the same
/// timestamp. Inserts into a supertable target the sub-table derived from
/// their tag values.
#[derive(Debug)]
pub struct TdengineDriver {
    options: TdengineOptions,
    features: Features,
    builder: CommonBuilder,
    visitor: Arc<Visitor>,
    setter: Arc<DefaultParameterSetter>,
}

impl TdengineDriver {
    pub fn new(options: TdengineOptions) -> Self {
        let features = Features {
            multi_table_update: false,
            multi_table_delete: false,
            upsert: true,
            returning: false,
            sequences: false,
            row_mutation: false,
        };
        tracing::debug!(name_limit = options.name_limit, "Created TDengine driver");
        Self {
            features,
            builder: CommonBuilder::new(DRIVER_NAME, features).reject(StatementKind::Update),
            visitor: Arc::new(tdengine_visitor()),
            setter: Arc::new(DefaultParameterSetter::new()),
            options,
        }
    }

    pub fn options(&self) -> &TdengineOptions {
        &self.options
    }

    /// Sub-table for the tag values of a single-row insert.
    fn subtable_of(&self, table: &TableRef, assignments: &[Assignment]) -> Option<String> {
        let TableName::Named(name) = &table.name else {
            return None;
        };
        let tags: Vec<Value> = assignments
            .iter()
            .filter(|a| a.tag)
            .map(|a| match &a.value {
                Expr::Parameter(param) => param.value.clone(),
                Expr::Constant(value) => value.clone(),
                _ => Value::Null,
            })
            .collect();
        Some(subtable_name(name, &tags, self.options.name_limit))
    }
}

impl Default for TdengineDriver {
    fn default() -> Self {
        Self::new(TdengineOptions::default())
    }
}

impl Driver for TdengineDriver {
    fn name(&self) -> &'static str {
        DRIVER_NAME
    }

    fn features(&self) -> &Features {
        &self.features
    }

    fn builder(&self) -> &dyn StatementBuilder {
        &self.builder
    }

    fn visitor(&self) -> &Visitor {
        &self.visitor
    }

    fn parameter_setter(&self) -> &dyn ParameterSetter {
        self.setter.as_ref()
    }

    fn on_error(&self, cx: &mut ErrorContext<'_>, error: Error) -> Error {
        translate(cx, error)
    }

    fn create_importer(&self) -> Box<dyn Importer> {
        Box::new(
            GroupedImporter::new(
                Arc::clone(&self.visitor),
                self.setter.clone(),
                self.options.import.clone(),
            )
            .name_limit(self.options.name_limit),
        )
    }

    /// Build and render; a single-row insert with tags gets its sub-table
    /// name fixed in the text.
    fn compile(&self, set: &EntitySet, request: &Request) -> Result<Script> {
        let statement = request.build(self.builder(), set)?;
        let script = self.visitor.render(&statement)?;
        if !script.slots().contains(&SUBTABLE_SLOT) {
            return Ok(script);
        }
        let subtable = match &statement {
            Statement::Insert(insert) => self.subtable_of(&insert.table, &insert.assignments),
            Statement::Upsert(upsert) => self.subtable_of(&upsert.table, &upsert.assignments),
            _ => None,
        };
        match subtable {
            Some(subtable) => {
                tracing::debug!(subtable = %subtable, "Bound sub-table of insert");
                Ok(script.bind_slot(SUBTABLE_SLOT, &self.dialect().identifier(&subtable)))
            }
            None => Ok(script),
        }
    }
}
