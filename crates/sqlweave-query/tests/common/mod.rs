//! In-memory connection that records every command it is asked to run.

#![allow(dead_code)]

use std::sync::{Arc, Mutex, PoisonError};

use asupersync::CancelKind;
use sqlweave_core::{
    Command, CommandKind, Connection, Cx, Error, Parameter, QueryError, Result, Row,
};

/// What one command saw during its lifetime.
#[derive(Debug, Clone, Default)]
pub struct Recorded {
    pub text: String,
    pub kind: CommandKind,
    pub table_names: Vec<String>,
    pub tags: Vec<Vec<Parameter>>,
    pub batches: Vec<Vec<Parameter>>,
    /// Contents of the file a bulk load pointed at, read at execution
    pub files: Vec<(String, String)>,
    pub executions: usize,
    pub closed: bool,
}

#[derive(Debug, Default)]
pub struct Log {
    pub commands: Vec<Recorded>,
    pub executions: usize,
}

/// Shared handle a test keeps to inspect what ran.
#[derive(Debug, Clone, Default)]
pub struct Recorder {
    log: Arc<Mutex<Log>>,
    fail_at: Option<usize>,
    cancel_at: Option<(usize, Cx)>,
    rows: Vec<Row>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the `n`th execution (1-based) with a native error.
    pub fn fail_at(mut self, n: usize) -> Self {
        self.fail_at = Some(n);
        self
    }

    /// Cancel `cx` once the `n`th execution (1-based) has succeeded.
    pub fn cancel_at(mut self, n: usize, cx: &Cx) -> Self {
        self.cancel_at = Some((n, cx.clone()));
        self
    }

    /// Rows returned by every query.
    pub fn rows(mut self, rows: Vec<Row>) -> Self {
        self.rows = rows;
        self
    }

    pub fn connection(&self) -> FakeConnection {
        FakeConnection {
            recorder: self.clone(),
        }
    }

    pub fn commands(&self) -> Vec<Recorded> {
        self.lock().commands.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Log> {
        self.log.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

pub struct FakeConnection {
    recorder: Recorder,
}

impl Connection for FakeConnection {
    fn create_command(&mut self, text: &str, kind: CommandKind) -> Result<Box<dyn Command + '_>> {
        let mut log = self.recorder.lock();
        log.commands.push(Recorded {
            text: text.to_string(),
            kind,
            ..Recorded::default()
        });
        let index = log.commands.len() - 1;
        drop(log);
        Ok(Box::new(FakeCommand {
            recorder: self.recorder.clone(),
            index,
            text: text.to_string(),
            parameters: Vec::new(),
            pending: Vec::new(),
        }))
    }
}

struct FakeCommand {
    recorder: Recorder,
    index: usize,
    text: String,
    parameters: Vec<Parameter>,
    pending: Vec<Vec<Parameter>>,
}

impl FakeCommand {
    fn with<T>(&self, f: impl FnOnce(&mut Recorded) -> T) -> T {
        let mut log = self.recorder.lock();
        f(&mut log.commands[self.index])
    }
}

/// Text between the first pair of single quotes.
fn quoted_path(text: &str) -> Option<&str> {
    let start = text.find('\'')? + 1;
    let end = start + text[start..].find('\'')?;
    Some(&text[start..end])
}

impl Command for FakeCommand {
    fn text(&self) -> &str {
        &self.text
    }

    fn parameters_mut(&mut self) -> &mut Vec<Parameter> {
        &mut self.parameters
    }

    fn set_table_name(&mut self, name: &str) -> Result<()> {
        self.with(|r| r.table_names.push(name.to_string()));
        Ok(())
    }

    fn set_tags(&mut self, tags: Vec<Parameter>) -> Result<()> {
        self.with(|r| r.tags.push(tags));
        Ok(())
    }

    fn add_batch(&mut self) -> Result<()> {
        self.pending.push(std::mem::take(&mut self.parameters));
        Ok(())
    }

    fn execute(&mut self) -> Result<u64> {
        let execution = {
            let mut log = self.recorder.lock();
            log.executions += 1;
            log.executions
        };
        if self.recorder.fail_at == Some(execution) {
            return Err(Error::Query(QueryError::native(
                Some(1205),
                Some("HY000"),
                "lock wait timeout exceeded",
            )));
        }

        let kind = self.with(|r| r.kind);
        let affected = if kind == CommandKind::BulkLoad {
            let path = quoted_path(&self.text).unwrap_or_default().to_string();
            let contents = std::fs::read_to_string(&path)?;
            let lines = contents.lines().count() as u64;
            self.with(|r| r.files.push((path, contents)));
            lines
        } else if self.pending.is_empty() {
            1
        } else {
            let batches = std::mem::take(&mut self.pending);
            let count = batches.len() as u64;
            self.with(|r| r.batches.extend(batches));
            count
        };
        self.with(|r| r.executions += 1);
        if let Some((n, cx)) = &self.recorder.cancel_at {
            if *n == execution {
                cx.cancel_with(CancelKind::User, None);
            }
        }
        Ok(affected)
    }

    fn query(&mut self) -> Result<Vec<Row>> {
        Ok(self.recorder.rows.clone())
    }

    fn close(&mut self) -> Result<()> {
        self.with(|r| r.closed = true);
        Ok(())
    }
}
