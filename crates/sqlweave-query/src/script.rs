//! Rendered statements.
//!
//! A [`Script`] is SQL text split into fragments, where a fragment is either
//! literal text or a named slot, plus the parameters bound to its
//! placeholders in order. Slots let a caller substitute generated names
//! (such as a sub-table) without walking the IR again.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use sqlweave_core::{DataType, Error, Parameter, ParameterSetter, Result, Value};

use crate::ir::ParameterSource;

/// One piece of rendered text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fragment {
    Text(String),
    Slot(String),
}

/// A parameter registered for one placeholder.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundParameter {
    pub name: String,
    pub data_type: DataType,
    /// Engine type name
    pub native_type: Option<String>,
    pub value: Value,
    pub source: ParameterSource,
}

impl BoundParameter {
    /// True while the value still has to be drawn from a sequence.
    pub fn is_pending(&self) -> bool {
        matches!(self.source, ParameterSource::Sequence { .. }) && self.value.is_null()
    }
}

/// How the caller obtains an engine-generated key after an insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GeneratedValue {
    /// The statement itself returns the column (`RETURNING`)
    Returning { column: String },
    /// A second statement on the same connection reads it
    FollowUp { column: String, sql: String },
}

impl GeneratedValue {
    pub fn column(&self) -> &str {
        match self {
            GeneratedValue::Returning { column } | GeneratedValue::FollowUp { column, .. } => {
                column
            }
        }
    }
}

/// Rendered SQL plus bound parameters.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Script {
    fragments: Vec<Fragment>,
    parameters: Vec<BoundParameter>,
    generated: Option<GeneratedValue>,
}

impl Script {
    pub(crate) fn push_text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        if let Some(Fragment::Text(last)) = self.fragments.last_mut() {
            last.push_str(text);
        } else {
            self.fragments.push(Fragment::Text(text.to_string()));
        }
    }

    pub(crate) fn push_slot(&mut self, name: &str) {
        self.fragments.push(Fragment::Slot(name.to_string()));
    }

    /// Register a parameter and return its 1-based placeholder index.
    pub(crate) fn push_parameter(&mut self, parameter: BoundParameter) -> usize {
        self.parameters.push(parameter);
        self.parameters.len()
    }

    pub(crate) fn set_generated(&mut self, generated: GeneratedValue) {
        self.generated = Some(generated);
    }

    pub fn fragments(&self) -> &[Fragment] {
        &self.fragments
    }

    pub fn parameters(&self) -> &[BoundParameter] {
        &self.parameters
    }

    pub fn generated(&self) -> Option<&GeneratedValue> {
        self.generated.as_ref()
    }

    /// Slot names in first-appearance order, without duplicates.
    pub fn slots(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        for fragment in &self.fragments {
            if let Fragment::Slot(name) = fragment {
                if !out.contains(&name.as_str()) {
                    out.push(name);
                }
            }
        }
        out
    }

    /// The text with slots shown as `{name}`.
    pub fn text(&self) -> String {
        let mut out = String::new();
        for fragment in &self.fragments {
            match fragment {
                Fragment::Text(text) => out.push_str(text),
                Fragment::Slot(name) => {
                    out.push('{');
                    out.push_str(name);
                    out.push('}');
                }
            }
        }
        out
    }

    /// Substitute every slot. A slot without a value is an error.
    pub fn fill(&self, values: &[(&str, &str)]) -> Result<String> {
        let mut out = String::new();
        for fragment in &self.fragments {
            match fragment {
                Fragment::Text(text) => out.push_str(text),
                Fragment::Slot(name) => {
                    let value = values
                        .iter()
                        .find(|(slot, _)| slot == name)
                        .map(|(_, value)| *value)
                        .ok_or_else(|| Error::Custom(format!("slot '{}' was not filled", name)))?;
                    out.push_str(value);
                }
            }
        }
        Ok(out)
    }

    /// Replace every occurrence of slot `name` with fixed text.
    pub fn bind_slot(mut self, name: &str, value: &str) -> Self {
        let fragments = std::mem::take(&mut self.fragments);
        for fragment in fragments {
            match fragment {
                Fragment::Slot(slot) if slot == name => self.push_text(value),
                Fragment::Text(text) => self.push_text(&text),
                slot @ Fragment::Slot(_) => self.fragments.push(slot),
            }
        }
        self
    }

    /// Draw every pending sequence value.
    pub fn resolve_pending(&mut self, sequences: &dyn SequenceSource) -> Result<()> {
        for parameter in &mut self.parameters {
            if !parameter.is_pending() {
                continue;
            }
            if let ParameterSource::Sequence {
                name,
                seed,
                interval,
            } = &parameter.source
            {
                let next = sequences.next_value(name, *seed, *interval)?;
                tracing::debug!(sequence = %name, value = next, "Drew external sequence value");
                parameter.value = Value::BigInt(next);
            }
        }
        Ok(())
    }

    /// Provider parameters in placeholder order.
    ///
    /// Fails if a sequence value is still pending.
    pub fn to_parameters(&self, setter: &dyn ParameterSetter) -> Result<Vec<Parameter>> {
        self.parameters
            .iter()
            .map(|bound| {
                if bound.is_pending() {
                    return Err(Error::Custom(format!(
                        "parameter '{}' waits for a sequence value",
                        bound.name
                    )));
                }
                let mut parameter = Parameter::new(bound.name.clone());
                if let Some(native) = &bound.native_type {
                    parameter = parameter.with_native_type(native.clone());
                }
                setter.set_value(&mut parameter, bound.value.clone(), bound.data_type)?;
                Ok(parameter)
            })
            .collect()
    }
}

/// A named counter service for external sequences.
pub trait SequenceSource: Send + Sync {
    /// The next value of `name`; the first value is `seed`.
    fn next_value(&self, name: &str, seed: i64, interval: i64) -> Result<i64>;
}

/// Process-local counters.
#[derive(Debug, Default)]
pub struct MemorySequences {
    counters: Mutex<HashMap<String, i64>>,
}

impl MemorySequences {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SequenceSource for MemorySequences {
    fn next_value(&self, name: &str, seed: i64, interval: i64) -> Result<i64> {
        let mut counters = self
            .counters
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let value = match counters.get(name) {
            Some(current) => current.checked_add(interval).ok_or_else(|| {
                Error::Custom(format!("sequence '{}' overflowed", name))
            })?,
            None => seed,
        };
        counters.insert(name.to_string(), value);
        Ok(value)
    }
}
