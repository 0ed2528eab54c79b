//! The PostgreSQL driver.

use std::sync::Arc;

use sqlweave_core::{DefaultParameterSetter, Error, ParameterSetter};
use sqlweave_query::{
    BulkFormat, CommonBuilder, Driver, ErrorContext, Features, FlatFileImporter, Importer,
    StatementBuilder, Visitor,
};

use crate::config::PostgresOptions;
use crate::dialect::PostgresDialect;
use crate::error::translate;
use crate::loader::PostgresLoader;

pub const DRIVER_NAME: &str = "postgres";

/// PostgreSQL 12 and later.
///
/// Uses the generic statement shapes unchanged: `UPDATE ... FROM`,
/// `DELETE ... USING`, `ON CONFLICT ... DO UPDATE` and `RETURNING`.
#[derive(Debug)]
pub struct PostgresDriver {
    options: PostgresOptions,
    features: Features,
    builder: CommonBuilder,
    visitor: Visitor,
    setter: DefaultParameterSetter,
}

impl PostgresDriver {
    pub fn new(options: PostgresOptions) -> Self {
        let features = Features {
            multi_table_update: true,
            multi_table_delete: true,
            upsert: true,
            returning: true,
            sequences: true,
            row_mutation: true,
        };
        tracing::debug!(copy_format = ?options.copy_format, "Created PostgreSQL driver");
        Self {
            features,
            builder: CommonBuilder::new(DRIVER_NAME, features),
            visitor: Visitor::new(Arc::new(PostgresDialect)),
            setter: DefaultParameterSetter::new(),
            options,
        }
    }

    pub fn options(&self) -> &PostgresOptions {
        &self.options
    }
}

impl Default for PostgresDriver {
    fn default() -> Self {
        Self::new(PostgresOptions::default())
    }
}

impl Driver for PostgresDriver {
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
        &self.setter
    }

    fn on_error(&self, cx: &mut ErrorContext<'_>, error: Error) -> Error {
        translate(cx, error)
    }

    fn create_importer(&self) -> Box<dyn Importer> {
        Box::new(FlatFileImporter::new(
            Arc::new(PostgresLoader::new(self.options.copy_format)),
            self.bulk_format(),
            self.options.import.clone(),
        ))
    }

    fn bulk_format(&self) -> BulkFormat {
        self.options.copy_format.bulk_format()
    }
}
