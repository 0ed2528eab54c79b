//! `LOAD DATA INFILE` statements for flat-file imports.

use std::path::Path;

use sqlweave_query::{BulkFormat, BulkLoader, Dialect};

use crate::dialect::{MysqlDialect, escape_literal};

#[derive(Debug, Clone)]
pub struct MysqlLoader {
    local: bool,
    charset: String,
}

impl MysqlLoader {
    pub fn new(local: bool, charset: impl Into<String>) -> Self {
        Self {
            local,
            charset: charset.into(),
        }
    }
}

fn char_literal(c: char) -> String {
    escape_literal(c.encode_utf8(&mut [0; 4]))
}

impl BulkLoader for MysqlLoader {
    fn load_statement(
        &self,
        path: &Path,
        table: &str,
        columns: &[String],
        format: &BulkFormat,
    ) -> String {
        let mut sql = String::from("LOAD DATA ");
        if self.local {
            sql.push_str("LOCAL ");
        }
        sql.push_str("INFILE ");
        sql.push_str(&escape_literal(&path.to_string_lossy()));
        sql.push_str(" INTO TABLE ");
        sql.push_str(&MysqlDialect.identifier(table));
        sql.push_str(" CHARACTER SET ");
        sql.push_str(&self.charset);
        sql.push_str(" FIELDS TERMINATED BY ");
        sql.push_str(&char_literal(format.delimiter));
        if let Some(quote) = format.quote {
            sql.push_str(" OPTIONALLY ENCLOSED BY ");
            sql.push_str(&char_literal(quote));
        }
        sql.push_str(" ESCAPED BY ");
        sql.push_str(&format.escape.map_or_else(|| "''".to_string(), char_literal));
        sql.push_str(" LINES TERMINATED BY ");
        sql.push_str(&escape_literal(&format.line_terminator));
        let columns: Vec<String> = columns.iter().map(|c| MysqlDialect.identifier(c)).collect();
        sql.push_str(" (");
        sql.push_str(&columns.join(", "));
        sql.push(')');
        sql
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_format() {
        let sql = MysqlLoader::new(true, "utf8mb4").load_statement(
            Path::new("/tmp/sqlweave-0001.txt"),
            "people",
            &["id".to_string(), "name".to_string()],
            &BulkFormat::default(),
        );
        assert_eq!(
            sql,
            "LOAD DATA LOCAL INFILE '/tmp/sqlweave-0001.txt' INTO TABLE `people` \
             CHARACTER SET utf8mb4 FIELDS TERMINATED BY '\\t' ESCAPED BY '\\\\' \
             LINES TERMINATED BY '\\n' (`id`, `name`)"
        );
    }

    #[test]
    fn test_server_side_quoted_format() {
        let format = BulkFormat {
            quote: Some('"'),
            escape: None,
            ..BulkFormat::default().delimiter(',')
        };
        let sql = MysqlLoader::new(false, "latin1").load_statement(
            Path::new("/data/it's.csv"),
            "t",
            &["a".to_string()],
            &format,
        );
        assert!(sql.starts_with("LOAD DATA INFILE '/data/it\\'s.csv'"));
        assert!(sql.contains("FIELDS TERMINATED BY ',' OPTIONALLY ENCLOSED BY '\"' ESCAPED BY ''"));
    }
}
