// File: src/ops/stack_ops.rs
//
// Stack shuffle words and the mark/unmark pair that lets a variadic run of
// pushes be collected into a single container value (spec §4.6, §GLOSSARY
// "Mark"). None of these declare a filter: they operate on raw stack
// positions regardless of value type, the same way the teacher's own
// `Dup`/`Swap` bytecode ops are untyped.

use crate::errors::{CompileError, RuntimeError, RuntimeErrorKind};
use crate::registry::{Operation, Registry};
use crate::task::Task;
use crate::value::Value;
use std::sync::Arc;

#[derive(Debug)]
struct Dup;
impl Operation for Dup {
    fn execute(&self, task: &mut Task) -> Result<(), RuntimeError> {
        let top = task.stack_mut().peek(0)?.clone();
        task.stack_mut().push(top);
        Ok(())
    }
}

#[derive(Debug)]
struct Drop;
impl Operation for Drop {
    fn execute(&self, task: &mut Task) -> Result<(), RuntimeError> {
        task.stack_mut().pop()?;
        Ok(())
    }
}

#[derive(Debug)]
struct Swap;
impl Operation for Swap {
    fn execute(&self, task: &mut Task) -> Result<(), RuntimeError> {
        let b = task.stack_mut().pop()?;
        let a = task.stack_mut().pop()?;
        task.stack_mut().push(b);
        task.stack_mut().push(a);
        Ok(())
    }
}

#[derive(Debug)]
struct Over;
impl Operation for Over {
    fn execute(&self, task: &mut Task) -> Result<(), RuntimeError> {
        let under = task.stack_mut().peek(1)?.clone();
        task.stack_mut().push(under);
        Ok(())
    }
}

/// `( a b c -- b c a )`
#[derive(Debug)]
struct Rot;
impl Operation for Rot {
    fn execute(&self, task: &mut Task) -> Result<(), RuntimeError> {
        let c = task.stack_mut().pop()?;
        let b = task.stack_mut().pop()?;
        let a = task.stack_mut().pop()?;
        task.stack_mut().push(b);
        task.stack_mut().push(c);
        task.stack_mut().push(a);
        Ok(())
    }
}

/// `( ... n -- ... vn )`: copies the value `n` deep (0 = the value below
/// `n` itself, matching `dup` at `n=0`).
#[derive(Debug)]
struct Pick;
impl Operation for Pick {
    fn execute(&self, task: &mut Task) -> Result<(), RuntimeError> {
        let n = task.stack_mut().pop()?;
        let offset = n
            .as_i64()
            .filter(|v| *v >= 0)
            .ok_or_else(|| RuntimeError::new(RuntimeErrorKind::Cast, "pick requires a non-negative long offset"))?
            as usize;
        let value = task.stack_mut().peek(offset)?.clone();
        task.stack_mut().push(value);
        Ok(())
    }
}

#[derive(Debug)]
struct Reverse;
impl Operation for Reverse {
    fn execute(&self, task: &mut Task) -> Result<(), RuntimeError> {
        task.stack_mut().reverse();
        Ok(())
    }
}

#[derive(Debug)]
struct Mark;
impl Operation for Mark {
    fn execute(&self, task: &mut Task) -> Result<(), RuntimeError> {
        task.stack_mut().mark();
        Ok(())
    }
}

#[derive(Debug)]
struct Unmark;
impl Operation for Unmark {
    fn execute(&self, task: &mut Task) -> Result<(), RuntimeError> {
        task.stack_mut().unmark()
    }
}

/// Collects the currently marked frame (bottom-to-top insertion order) into
/// a single `Tuple`, closing the frame.
#[derive(Debug)]
struct MarkToTuple;
impl Operation for MarkToTuple {
    fn execute(&self, task: &mut Task) -> Result<(), RuntimeError> {
        let values = task.stack_mut().drain_frame()?;
        task.stack_mut().push(Value::Tuple(values));
        Ok(())
    }
}

/// Unpacks a `Tuple` back onto the stack, bottom element pushed first.
#[derive(Debug)]
struct TupleToStack;
impl Operation for TupleToStack {
    fn execute(&self, task: &mut Task) -> Result<(), RuntimeError> {
        let top = task.stack_mut().pop()?;
        match top {
            Value::Tuple(values) => {
                for v in values {
                    task.stack_mut().push(v);
                }
                Ok(())
            }
            _ => Err(RuntimeError::cast("tuple>stack requires a tuple on top of the stack")),
        }
    }
}

pub fn register(registry: &mut Registry) -> Result<(), CompileError> {
    registry.register("dup", None, Arc::new(Dup))?;
    registry.register("drop", None, Arc::new(Drop))?;
    registry.register("swap", None, Arc::new(Swap))?;
    registry.register("over", None, Arc::new(Over))?;
    registry.register("rot", None, Arc::new(Rot))?;
    registry.register("pick", None, Arc::new(Pick))?;
    registry.register("reverse", None, Arc::new(Reverse))?;
    registry.register("mark", None, Arc::new(Mark))?;
    registry.register("unmark", None, Arc::new(Unmark))?;
    registry.register("mark>tuple", None, Arc::new(MarkToTuple))?;
    registry.register("tuple>stack", None, Arc::new(TupleToStack))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::SimpleContext;

    fn registry() -> Registry {
        let mut reg = Registry::new();
        register(&mut reg).unwrap();
        reg
    }

    fn run_one(name: &str, task: &mut Task) {
        let reg = registry();
        let overloads = reg.lookup(&name.to_uppercase()).unwrap();
        overloads[0].op.execute(task).unwrap();
    }

    #[test]
    fn dup_and_swap() {
        let mut ctx = SimpleContext::new();
        let mut task = Task::new(&mut ctx);
        task.stack_mut().push(Value::Long(1));
        task.stack_mut().push(Value::Long(2));
        run_one("dup", &mut task);
        assert_eq!(task.stack_mut().pop().unwrap(), Value::Long(2));
        assert_eq!(task.stack_mut().pop().unwrap(), Value::Long(2));
        task.stack_mut().push(Value::Long(1));
        task.stack_mut().push(Value::Long(2));
        run_one("swap", &mut task);
        assert_eq!(task.stack_mut().pop().unwrap(), Value::Long(1));
        assert_eq!(task.stack_mut().pop().unwrap(), Value::Long(2));
    }

    #[test]
    fn mark_to_tuple_collects_in_order() {
        let mut ctx = SimpleContext::new();
        let mut task = Task::new(&mut ctx);
        run_one("mark", &mut task);
        task.stack_mut().push(Value::Long(1));
        task.stack_mut().push(Value::Long(2));
        task.stack_mut().push(Value::Long(3));
        run_one("mark>tuple", &mut task);
        assert_eq!(
            task.stack_mut().pop().unwrap(),
            Value::Tuple(vec![Value::Long(1), Value::Long(2), Value::Long(3)])
        );
    }
}
