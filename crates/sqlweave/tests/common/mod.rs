//! Connection factory and connection that record every command, answer
//! queries from a script of row sets and fail on request.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use sqlweave_core::{
    Command, CommandKind, Connection, ConnectionFactory, Error, Parameter, Result, Row,
};

/// What one command saw during its lifetime.
#[derive(Debug, Clone, Default)]
pub struct Recorded {
    pub text: String,
    pub kind: CommandKind,
    pub parameters: Vec<Parameter>,
    pub table_names: Vec<String>,
    pub batches: Vec<Vec<Parameter>>,
    pub closed: bool,
}

#[derive(Debug, Default)]
struct Log {
    commands: Vec<Recorded>,
    connection_strings: Vec<String>,
    /// Row sets handed to successive queries
    responses: VecDeque<Vec<Row>>,
    executions: usize,
}

/// Shared handle a test keeps to inspect what ran.
#[derive(Debug, Clone, Default)]
pub struct Recorder {
    log: Arc<Mutex<Log>>,
    failure: Option<(usize, fn() -> Error)>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the `n`th execution or query (1-based).
    pub fn fail_at(mut self, n: usize, error: fn() -> Error) -> Self {
        self.failure = Some((n, error));
        self
    }

    /// Queue the rows the next query returns.
    pub fn respond(self, rows: Vec<Row>) -> Self {
        self.lock().responses.push_back(rows);
        self
    }

    pub fn factory(&self) -> Arc<FakeFactory> {
        Arc::new(FakeFactory {
            recorder: self.clone(),
        })
    }

    pub fn connection(&self) -> FakeConnection {
        FakeConnection {
            recorder: self.clone(),
        }
    }

    pub fn commands(&self) -> Vec<Recorded> {
        self.lock().commands.clone()
    }

    pub fn connection_strings(&self) -> Vec<String> {
        self.lock().connection_strings.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Log> {
        self.log.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Count one round trip and report the configured failure.
    fn round_trip(&self) -> Result<()> {
        let count = {
            let mut log = self.lock();
            log.executions += 1;
            log.executions
        };
        match self.failure {
            Some((n, error)) if n == count => Err(error()),
            _ => Ok(()),
        }
    }
}

pub struct FakeFactory {
    recorder: Recorder,
}

impl ConnectionFactory for FakeFactory {
    fn create_connection(&self, connection_string: &str) -> Result<Box<dyn Connection>> {
        self.recorder
            .lock()
            .connection_strings
            .push(connection_string.to_string());
        Ok(Box::new(self.recorder.connection()))
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

    fn record_parameters(&self) {
        let parameters = self.parameters.clone();
        self.with(|r| r.parameters = parameters);
    }
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

    fn set_tags(&mut self, _tags: Vec<Parameter>) -> Result<()> {
        Ok(())
    }

    fn add_batch(&mut self) -> Result<()> {
        self.pending.push(std::mem::take(&mut self.parameters));
        Ok(())
    }

    fn execute(&mut self) -> Result<u64> {
        self.record_parameters();
        self.recorder.round_trip()?;
        if self.pending.is_empty() {
            return Ok(1);
        }
        let batches = std::mem::take(&mut self.pending);
        let count = batches.len() as u64;
        self.with(|r| r.batches.extend(batches));
        Ok(count)
    }

    fn query(&mut self) -> Result<Vec<Row>> {
        self.record_parameters();
        self.recorder.round_trip()?;
        Ok(self.recorder.lock().responses.pop_front().unwrap_or_default())
    }

    fn close(&mut self) -> Result<()> {
        self.with(|r| r.closed = true);
        Ok(())
    }
}
