// File: src/task.rs
//
// A single program execution. A Task owns its stack and its container-apply
// scope exclusively for the duration of `run`; it borrows the compiled
// Program and the host-supplied ExecutionContext. Created per execution and
// discarded when it returns — matching spec §4.6/§5 exactly: no suspension
// points, no cross-task sharing of mutable state.

use crate::context::ExecutionContext;
use crate::errors::{RuntimeError, RuntimeErrorKind};
use crate::filter::{ContainerKind, FilterSource};
use crate::program::{OperationReference, Program};
use crate::stack::Stack;
use crate::token::{VariableAction, VariableAccess, VariableKind};
use crate::value::Value;
use std::sync::Arc;

/// Why a task stopped. `Completed` is the only state with a live result.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutcome {
    Completed(Value),
    /// Stack-access or `ValuesOnStack` faults: always fatal, independent of
    /// `fail_returns_null`.
    Cancelled,
    /// An arithmetic/conversion fault occurred and `fail_returns_null` is
    /// set: the task cancels cleanly and yields a null-valued result.
    FailedToNull,
}

pub struct Task<'ctx> {
    pub(crate) context: &'ctx mut dyn ExecutionContext,
    pub(crate) stack: Stack<Value>,
    /// The container currently bound by the innermost open `apply`, if any.
    pub(crate) container_scope: Option<Value>,
}

/// RAII guard restoring the task's prior container scope on every exit path
/// — including the early return a `?` makes when `inner.execute` fails —
/// satisfying the "guaranteed release on both normal and fault exits"
/// requirement from spec §4.6/§9 for the APPLY scope.
struct ScopeGuard<'a, 'ctx> {
    task: &'a mut Task<'ctx>,
    prior: Option<Value>,
}

impl Drop for ScopeGuard<'_, '_> {
    fn drop(&mut self) {
        self.task.container_scope = self.prior.take();
    }
}

impl<'ctx> FilterSource for Task<'ctx> {
    fn peek_value(&self, offset: usize) -> Option<&Value> {
        self.stack.try_peek(offset)
    }

    fn applying_container(&self) -> Option<ContainerKind> {
        match &self.container_scope {
            Some(Value::Tuple(_)) => Some(ContainerKind::Tuple),
            Some(Value::Dict(_)) => Some(ContainerKind::Dict),
            _ => None,
        }
    }
}

impl<'ctx> Task<'ctx> {
    pub fn new(context: &'ctx mut dyn ExecutionContext) -> Self {
        Self { context, stack: Stack::new(), container_scope: None }
    }

    pub fn context(&self) -> &dyn ExecutionContext {
        self.context
    }

    pub fn context_mut(&mut self) -> &mut dyn ExecutionContext {
        self.context
    }

    pub fn stack(&self) -> &Stack<Value> {
        &self.stack
    }

    pub fn stack_mut(&mut self) -> &mut Stack<Value> {
        &mut self.stack
    }

    pub fn container_scope(&self) -> Option<&Value> {
        self.container_scope.as_ref()
    }

    pub fn container_scope_mut(&mut self) -> Option<&mut Value> {
        self.container_scope.as_mut()
    }

    /// Runs `program` to completion (spec's `Engine::execute`). Returns
    /// `None` when the task was cancelled and `fail_returns_null` did not
    /// apply; a `Some(Value::Null)` result represents the distinct
    /// "fail-returns-null" outcome (spec §4.6/§7).
    pub fn run(mut self, program: &Arc<Program>) -> Option<Value> {
        match self.run_program(program) {
            Ok(()) => match self.finish() {
                Ok(value) => Some(value),
                Err(e) if e.kind == RuntimeErrorKind::ValuesOnStack => {
                    self.context.logger().warn(&e.to_string());
                    None
                }
                Err(_) => None,
            },
            Err(e) => {
                if e.kind.is_arithmetic_fault() && self.context.fail_returns_null() {
                    Some(Value::Null)
                } else {
                    None
                }
            }
        }
    }

    /// Post-completion check (spec §4.6): unmark any still-open top frame,
    /// then require exactly one value on the stack.
    fn finish(&mut self) -> Result<Value, RuntimeError> {
        while self.stack.is_marked() && self.stack.size() == 0 {
            self.stack.unmark()?;
        }
        if self.stack.total_size() != 1 {
            return Err(RuntimeError::new(
                RuntimeErrorKind::ValuesOnStack,
                format!("program left {} value(s) on the stack, expected 1", self.stack.total_size()),
            ));
        }
        self.stack.pop()
    }

    /// Executes `program`'s references in order starting at pc 0. Used both
    /// for the outermost program and, recursively, for a `CALL`'s callee —
    /// the Rust call stack naturally provides the "saved/restored program
    /// counter" spec §4.6 describes, since each invocation's `pc` lives in
    /// its own stack frame.
    pub fn run_program(&mut self, program: &Arc<Program>) -> Result<(), RuntimeError> {
        let mut pc = 0;
        while let Some(reference) = program.get(pc) {
            self.execute_reference(reference)?;
            pc += 1;
        }
        Ok(())
    }

    pub fn execute_reference(&mut self, reference: &OperationReference) -> Result<(), RuntimeError> {
        match reference {
            OperationReference::Constant { value, .. } => {
                self.stack.push(value.clone());
                Ok(())
            }
            OperationReference::Call { program, .. } => self.run_program(program),
            OperationReference::Variable { access, .. } => self.execute_variable(access),
            OperationReference::Builtin { name, overloads, .. } => self.execute_builtin(name, overloads),
            OperationReference::Apply { inner, .. } => self.execute_apply(inner),
            OperationReference::If { then_branch, else_branch, .. } => self.execute_if(then_branch, else_branch),
        }
    }

    fn execute_builtin(
        &mut self,
        name: &str,
        overloads: &[crate::registry::Overload],
    ) -> Result<(), RuntimeError> {
        for overload in overloads {
            let matches = match &overload.filter {
                None => true,
                Some(filter) => filter.evaluate(self),
            };
            if matches {
                return overload.op.execute(self);
            }
        }
        Err(RuntimeError::cast(format!("no overload of '{}' matches the current stack", name)))
    }

    fn execute_apply(&mut self, inner: &OperationReference) -> Result<(), RuntimeError> {
        let container = self.stack.pop()?;
        if !container.is_container() {
            return Err(RuntimeError::cast("apply requires a container (tuple or dict) on top of the stack"));
        }
        let prior = self.container_scope.take();
        self.container_scope = Some(container);
        let mut guard = ScopeGuard { task: self, prior };
        let result = guard.task.execute_reference(inner);
        // The guard's Drop restores `container_scope` to `prior` on every
        // path, including this early return.
        result?;
        let scope_result = guard.task.container_scope.clone();
        drop(guard);
        if let Some(value) = scope_result {
            self.stack.push(value);
        }
        Ok(())
    }

    fn execute_if(
        &mut self,
        then_branch: &[OperationReference],
        else_branch: &[OperationReference],
    ) -> Result<(), RuntimeError> {
        let cond = self.stack.pop()?;
        let branch = if cond.truthy() { then_branch } else { else_branch };
        for reference in branch {
            self.execute_reference(reference)?;
        }
        Ok(())
    }

    fn execute_variable(&mut self, access: &VariableAccess) -> Result<(), RuntimeError> {
        let index = access.index - 1;
        use VariableAction::*;
        use VariableKind::*;
        match (access.kind, access.action) {
            (Input, Value) => {
                let v = self.context.input(index).map(|iv| iv.value).unwrap_or(Value::Null);
                self.stack.push(v);
            }
            (Input, Required) => {
                let v = self.context.input(index).map(|iv| iv.value);
                match v {
                    Some(v) if !v.is_null() => self.stack.push(v),
                    _ => return Err(RuntimeError::new(RuntimeErrorKind::RequiredAbsent, format!("input ${} is required but absent", access.index))),
                }
            }
            (Input, Stamp) => {
                let v = self.context.input(index).and_then(|iv| iv.stamp).map(Value::Stamp).unwrap_or(Value::Null);
                self.stack.push(v);
            }
            (Input, State) => {
                let v = self.context.input(index).and_then(|iv| iv.state).map(Value::State).unwrap_or(Value::Null);
                self.stack.push(v);
            }
            (Input, Present) => {
                let present = self.context.input(index).map(|iv| !iv.value.is_null()).unwrap_or(false);
                self.stack.push(Value::Bool(present));
            }
            (Input, Store) => {
                let value = if access.dup { self.stack.peek(0)?.clone() } else { self.stack.pop()? };
                self.context.set_input(index, value);
            }
            (Input, Point) => {
                let v = self.context.input(index).and_then(|iv| iv.point_id).map(Value::Text).unwrap_or(Value::Null);
                self.stack.push(v);
            }
            (Memory, Value) => {
                self.stack.push(self.context.memory(index).unwrap_or(Value::Null));
            }
            (Memory, Required) => match self.context.memory(index) {
                Some(v) if !v.is_null() => self.stack.push(v),
                _ => return Err(RuntimeError::new(RuntimeErrorKind::RequiredAbsent, format!("memory #{} is required but absent", access.index))),
            },
            (Memory, Store) => {
                let value = if access.dup { self.stack.peek(0)?.clone() } else { self.stack.pop()? };
                self.context.set_memory(index, value);
            }
            (Param, Value) => {
                let v = self.context.param(index).map(|s| Value::Text(s.to_string())).unwrap_or(Value::Null);
                self.stack.push(v);
            }
            (Param, Required) => match self.context.param(index) {
                Some(s) => self.stack.push(Value::Text(s.to_string())),
                None => return Err(RuntimeError::new(RuntimeErrorKind::RequiredAbsent, format!("param @{} is required but absent", access.index))),
            },
            _ => {
                return Err(RuntimeError::cast(format!(
                    "invalid variable access form (kind={:?}, action={:?}, dup={})",
                    access.kind, access.action, access.dup
                )))
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::context::SimpleContext;
    use crate::engine::Engine;

    fn run(source: &str, ctx: &mut SimpleContext) -> Option<Value> {
        let engine = Engine::new(Config::default()).unwrap();
        let program = engine.compile(source, &[], &[]).unwrap();
        engine.execute(&program, ctx)
    }

    #[test]
    fn simple_addition() {
        let mut ctx = SimpleContext::new();
        assert_eq!(run("2 3 +", &mut ctx), Some(Value::Long(5)));
    }

    #[test]
    fn user_word_definition() {
        let mut ctx = SimpleContext::new();
        assert_eq!(run(": sq dup * ; 4 sq", &mut ctx), Some(Value::Long(16)));
    }

    #[test]
    fn input_access_and_required_absent() {
        let mut ctx = SimpleContext::new();
        ctx.push_input(Some(Value::Long(10)));
        ctx.push_input(Some(Value::Long(32)));
        assert_eq!(run("$1 $2 +", &mut ctx), Some(Value::Long(42)));

        let mut ctx2 = SimpleContext::new();
        ctx2.push_input(None);
        ctx2.push_input(Some(Value::Long(32)));
        ctx2.set_fail_returns_null(false);
        assert_eq!(run("$1! $2 +", &mut ctx2), None);
    }

    #[test]
    fn memory_store_and_read() {
        // Operand precedes the store operator, as RPN requires: push 7,
        // store into memory 1, push memory 1, push 5, add.
        let mut ctx = SimpleContext::new();
        assert_eq!(run("7 #1= #1 5 +", &mut ctx), Some(Value::Long(12)));
    }
}
