//! The MySQL driver.

use std::sync::Arc;

use sqlweave_core::{DefaultParameterSetter, Error, ParameterSetter};
use sqlweave_query::{
    BulkFormat, CommonBuilder, Driver, ErrorContext, Features, FlatFileImporter, Importer,
    StatementBuilder, Visitor,
};

use crate::config::MysqlOptions;
use crate::error::translate;
use crate::loader::MysqlLoader;
use crate::visitor::mysql_visitor;

pub const DRIVER_NAME: &str = "mysql";

/// MySQL 5.7 / 8.x.
///
/// Generated keys are read back with `LAST_INSERT_ID()`; imports go
/// through `LOAD DATA INFILE`.
#[derive(Debug)]
pub struct MysqlDriver {
    options: MysqlOptions,
    features: Features,
    builder: CommonBuilder,
    visitor: Arc<Visitor>,
    setter: DefaultParameterSetter,
}

impl MysqlDriver {
    pub fn new(options: MysqlOptions) -> Self {
        let features = Features {
            multi_table_update: true,
            multi_table_delete: true,
            upsert: true,
            returning: false,
            sequences: false,
            row_mutation: true,
        };
        tracing::debug!(
            collation = ?options.condition_collation,
            local_infile = options.local_infile,
            "Created MySQL driver"
        );
        Self {
            features,
            builder: CommonBuilder::new(DRIVER_NAME, features),
            visitor: Arc::new(mysql_visitor(&options)),
            setter: DefaultParameterSetter::new().booleans_as_integers(true),
            options,
        }
    }

    pub fn options(&self) -> &MysqlOptions {
        &self.options
    }
}

impl Default for MysqlDriver {
    fn default() -> Self {
        Self::new(MysqlOptions::default())
    }
}

impl Driver for MysqlDriver {
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
            Arc::new(MysqlLoader::new(
                self.options.local_infile,
                self.options.charset.clone(),
            )),
            self.bulk_format(),
            self.options.import.clone(),
        ))
    }

    fn bulk_format(&self) -> BulkFormat {
        BulkFormat::default()
    }
}
