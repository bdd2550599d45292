// File: src/context.rs
//
// The execution-time interface a Task consumes (spec §6). The core never
// knows about the host framework's point/metadata model, time-series
// querying, or batch scheduling — it reaches all of that exclusively
// through `ExecutionContext` and the small `Logger` collaborator `Context`
// already names in spec §3.

use crate::value::{State, Value};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use colored::Colorize;
use std::collections::HashMap;

/// One input's value plus the projections `$N`'s action-character variants
/// read (spec §3 `Context.input-values[]`, §6 `input(i) -> InputValue`).
#[derive(Debug, Clone, PartialEq)]
pub struct InputValue {
    pub value: Value,
    pub stamp: Option<DateTime<Utc>>,
    pub state: Option<State>,
    pub point_id: Option<String>,
}

impl InputValue {
    pub fn new(value: Value) -> Self {
        Self { value, stamp: None, state: None, point_id: None }
    }
}

/// The "context's logger" collaborator named throughout spec §3/§6 — given
/// a concrete shape here, not a global logging subsystem. Library code
/// never prints on its own; only the injected `Logger` does.
pub trait Logger: Send + Sync {
    fn warn(&self, msg: &str);
    fn error(&self, msg: &str);
}

/// Default logger used by the CLI/REPL; library callers embedding this
/// crate supply their own.
#[derive(Debug, Default)]
pub struct StderrLogger;

impl Logger for StderrLogger {
    fn warn(&self, msg: &str) {
        eprintln!("{} {}", "warn:".yellow().bold(), msg);
    }

    fn error(&self, msg: &str) {
        eprintln!("{} {}", "error:".red().bold(), msg);
    }
}

/// A logger that discards everything; useful for tests that don't care
/// about diagnostic output.
#[derive(Debug, Default)]
pub struct NullLogger;

impl Logger for NullLogger {
    fn warn(&self, _msg: &str) {}
    fn error(&self, _msg: &str) {}
}

/// The host-supplied capabilities a running Task consumes, concretized as a
/// trait per spec §6. `input_normalized` is deliberately `&mut self` since
/// the spec allows the host to compute it lazily and cache the result.
pub trait ExecutionContext {
    fn input(&self, index: usize) -> Option<InputValue>;
    fn input_count(&self) -> usize;
    fn input_normalized(&mut self, index: usize) -> Option<InputValue>;
    fn set_input(&mut self, index: usize, value: Value);
    fn memory(&self, index: usize) -> Option<Value>;
    fn set_memory(&mut self, index: usize, value: Value);
    fn param(&self, index: usize) -> Option<&str>;
    fn stored_value(&self) -> Option<Value>;
    fn add_update(&mut self, value: Value);
    fn time_zone(&self) -> Tz;
    fn logger(&self) -> &dyn Logger;
    fn fail_returns_null(&self) -> bool;
    /// Called by `Engine::execute` before running a Task so the engine-level
    /// `Config.fail_returns_null` (spec §6) actually reaches the context the
    /// Task reads it from, rather than requiring every host to thread the
    /// flag through by hand.
    fn set_fail_returns_null(&mut self, value: bool);
}

/// A host-agnostic `ExecutionContext` suitable for the CLI, REPL, and
/// tests: inputs and params are fixed vectors, memory is a sparse map
/// (spec §3: "unbounded sparsely indexed cell array").
pub struct SimpleContext {
    inputs: Vec<Option<InputValue>>,
    memory: HashMap<usize, Value>,
    params: Vec<String>,
    time_zone: Tz,
    fail_returns_null: bool,
    stored_value: Option<Value>,
    updates: Vec<Value>,
    logger: Box<dyn Logger>,
}

impl SimpleContext {
    pub fn new() -> Self {
        Self {
            inputs: Vec::new(),
            memory: HashMap::new(),
            params: Vec::new(),
            time_zone: Tz::UTC,
            fail_returns_null: false,
            stored_value: None,
            updates: Vec::new(),
            logger: Box::new(NullLogger),
        }
    }

    pub fn with_logger(mut self, logger: Box<dyn Logger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn push_input(&mut self, value: Option<Value>) {
        self.inputs.push(value.map(InputValue::new));
    }

    pub fn push_input_full(&mut self, input: InputValue) {
        self.inputs.push(Some(input));
    }

    pub fn push_param(&mut self, value: impl Into<String>) {
        self.params.push(value.into());
    }

    pub fn set_fail_returns_null(&mut self, value: bool) {
        self.fail_returns_null = value;
    }

    pub fn set_time_zone(&mut self, tz: Tz) {
        self.time_zone = tz;
    }

    pub fn set_stored_value(&mut self, value: Value) {
        self.stored_value = Some(value);
    }

    pub fn updates(&self) -> &[Value] {
        &self.updates
    }
}

impl Default for SimpleContext {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutionContext for SimpleContext {
    fn input(&self, index: usize) -> Option<InputValue> {
        self.inputs.get(index).cloned().flatten()
    }

    fn input_count(&self) -> usize {
        self.inputs.len()
    }

    /// No host-specific unit/state normalization to apply here; the
    /// host-agnostic context simply returns the raw input, matching the
    /// "may be called lazily and cached" contract trivially (there is
    /// nothing to compute).
    fn input_normalized(&mut self, index: usize) -> Option<InputValue> {
        self.input(index)
    }

    fn set_input(&mut self, index: usize, value: Value) {
        if index >= self.inputs.len() {
            self.inputs.resize(index + 1, None);
        }
        self.inputs[index] = Some(InputValue::new(value));
    }

    fn memory(&self, index: usize) -> Option<Value> {
        self.memory.get(&index).cloned()
    }

    fn set_memory(&mut self, index: usize, value: Value) {
        self.memory.insert(index, value);
    }

    fn param(&self, index: usize) -> Option<&str> {
        self.params.get(index).map(|s| s.as_str())
    }

    fn stored_value(&self) -> Option<Value> {
        self.stored_value.clone()
    }

    fn add_update(&mut self, value: Value) {
        self.updates.push(value);
    }

    fn time_zone(&self) -> Tz {
        self.time_zone
    }

    fn logger(&self) -> &dyn Logger {
        self.logger.as_ref()
    }

    fn fail_returns_null(&self) -> bool {
        self.fail_returns_null
    }

    fn set_fail_returns_null(&mut self, value: bool) {
        self.set_fail_returns_null(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_is_sparse() {
        let mut ctx = SimpleContext::new();
        assert_eq!(ctx.memory(100), None);
        ctx.set_memory(100, Value::Long(5));
        assert_eq!(ctx.memory(100), Some(Value::Long(5)));
        assert_eq!(ctx.memory(0), None);
    }

    #[test]
    fn set_input_grows_sparsely_indexed_vector() {
        let mut ctx = SimpleContext::new();
        ctx.set_input(3, Value::Long(9));
        assert_eq!(ctx.input(3), Some(InputValue::new(Value::Long(9))));
        assert_eq!(ctx.input(0), None);
    }
}
