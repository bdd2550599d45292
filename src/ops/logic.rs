// File: src/ops/logic.rs
//
// Boolean connectives and general equality/inequality. Equality compares
// `Value`'s own `PartialEq`, which already does the right per-variant thing
// (no cross-variant numeric coercion) -- unlike `+`, `=`/`<>` are not
// overloaded per numeric family, matching the teacher's practice of
// registering one operation per logical concept unless a family genuinely
// needs distinct code paths.

use crate::errors::CompileError;
use crate::errors::RuntimeError;
use crate::filter::*;
use crate::registry::{Operation, Registry};
use crate::task::Task;
use crate::value::Value;
use std::sync::Arc;

#[derive(Debug)]
struct And;
impl Operation for And {
    fn execute(&self, task: &mut Task) -> Result<(), RuntimeError> {
        let b = task.stack_mut().pop()?;
        let a = task.stack_mut().pop()?;
        task.stack_mut().push(Value::Bool(a.truthy() && b.truthy()));
        Ok(())
    }
}

#[derive(Debug)]
struct Or;
impl Operation for Or {
    fn execute(&self, task: &mut Task) -> Result<(), RuntimeError> {
        let b = task.stack_mut().pop()?;
        let a = task.stack_mut().pop()?;
        task.stack_mut().push(Value::Bool(a.truthy() || b.truthy()));
        Ok(())
    }
}

#[derive(Debug)]
struct Not;
impl Operation for Not {
    fn execute(&self, task: &mut Task) -> Result<(), RuntimeError> {
        let a = task.stack_mut().pop()?;
        task.stack_mut().push(Value::Bool(!a.truthy()));
        Ok(())
    }
}

#[derive(Debug)]
struct Eq;
impl Operation for Eq {
    fn execute(&self, task: &mut Task) -> Result<(), RuntimeError> {
        let b = task.stack_mut().pop()?;
        let a = task.stack_mut().pop()?;
        task.stack_mut().push(Value::Bool(a == b));
        Ok(())
    }
}

#[derive(Debug)]
struct Ne;
impl Operation for Ne {
    fn execute(&self, task: &mut Task) -> Result<(), RuntimeError> {
        let b = task.stack_mut().pop()?;
        let a = task.stack_mut().pop()?;
        task.stack_mut().push(Value::Bool(a != b));
        Ok(())
    }
}

pub fn register(registry: &mut Registry) -> Result<(), CompileError> {
    registry.register("and", Some(BOTH_PRESENT.clone()), Arc::new(And))?;
    registry.register("or", Some(BOTH_PRESENT.clone()), Arc::new(Or))?;
    registry.register("not", Some(TOP_PRESENT.clone()), Arc::new(Not))?;
    registry.register("=", None, Arc::new(Eq))?;
    registry.register("<>", None, Arc::new(Ne))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::SimpleContext;

    fn eval(name: &str, a: Value, b: Value) -> Value {
        let mut registry = Registry::new();
        register(&mut registry).unwrap();
        let overloads = registry.lookup(&name.to_uppercase()).unwrap();
        let mut ctx = SimpleContext::new();
        let mut task = Task::new(&mut ctx);
        task.stack_mut().push(a);
        task.stack_mut().push(b);
        overloads[0].op.execute(&mut task).unwrap();
        task.stack_mut().pop().unwrap()
    }

    #[test]
    fn equality_does_not_coerce_across_variants() {
        assert_eq!(eval("=", Value::Long(1), Value::Double(1.0)), Value::Bool(false));
        assert_eq!(eval("=", Value::Long(1), Value::Long(1)), Value::Bool(true));
    }

    #[test]
    fn boolean_and_or() {
        assert_eq!(eval("and", Value::Bool(true), Value::Bool(false)), Value::Bool(false));
        assert_eq!(eval("or", Value::Bool(true), Value::Bool(false)), Value::Bool(true));
    }
}
