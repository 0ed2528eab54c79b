//! Scripted connection: answers every query with fixed rows and records
//! what it was asked.

#![allow(dead_code)]

use std::sync::{Arc, Mutex, PoisonError};

use sqlweave_core::{Command, CommandKind, Connection, Parameter, Result, Row, Value};

#[derive(Debug, Clone, Default)]
pub struct Seen {
    pub text: String,
    pub kind: CommandKind,
    pub parameters: Vec<Parameter>,
    /// File contents a bulk load pointed at
    pub file: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct Script {
    seen: Arc<Mutex<Vec<Seen>>>,
    rows: Vec<Row>,
}

impl Script {
    pub fn new() -> Self {
        Self::default()
    }

    /// Single-column rows returned by every query.
    pub fn column(mut self, name: &str, values: &[&str]) -> Self {
        self.rows = values
            .iter()
            .map(|v| Row::new(vec![name.to_string()], vec![Value::Text((*v).to_string())]))
            .collect();
        self
    }

    pub fn connection(&self) -> ScriptedConnection {
        ScriptedConnection {
            script: self.clone(),
        }
    }

    pub fn seen(&self) -> Vec<Seen> {
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

pub struct ScriptedConnection {
    script: Script,
}

impl Connection for ScriptedConnection {
    fn create_command(&mut self, text: &str, kind: CommandKind) -> Result<Box<dyn Command + '_>> {
        Ok(Box::new(ScriptedCommand {
            script: self.script.clone(),
            seen: Seen {
                text: text.to_string(),
                kind,
                ..Seen::default()
            },
        }))
    }
}

struct ScriptedCommand {
    script: Script,
    seen: Seen,
}

impl ScriptedCommand {
    fn record(&self) {
        self.script
            .seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(self.seen.clone());
    }
}

/// Text between the first pair of single quotes.
fn quoted(text: &str) -> Option<&str> {
    let start = text.find('\'')? + 1;
    let end = start + text[start..].find('\'')?;
    Some(&text[start..end])
}

impl Command for ScriptedCommand {
    fn text(&self) -> &str {
        &self.seen.text
    }

    fn parameters_mut(&mut self) -> &mut Vec<Parameter> {
        &mut self.seen.parameters
    }

    fn execute(&mut self) -> Result<u64> {
        let mut affected = 1;
        if self.seen.kind == CommandKind::BulkLoad {
            let contents = std::fs::read_to_string(quoted(&self.seen.text).unwrap_or_default())?;
            affected = contents.lines().count() as u64;
            self.seen.file = Some(contents);
        }
        self.record();
        Ok(affected)
    }

    fn query(&mut self) -> Result<Vec<Row>> {
        self.record();
        Ok(self.script.rows.clone())
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}
