// File: src/ops/container.rs
//
// Tuple/dict constructors, type tests, and the `insert` operation that
// targets an `apply`-bound container scope (spec §4.6 "Container ops",
// §GLOSSARY "Apply"). `insert` is the only operation in this module that
// consults `Task::container_scope_mut` -- every other op here works
// directly off the value stack.
//
// Open Question resolution (spec.md §9, recorded in DESIGN.md): `tuple?`,
// `dict?`, and `container?` pop their operand; a missing top raises the
// ordinary `Limits` underflow error. Only a present-but-wrong-type operand
// yields `false`, matching how every other `TOP_*` filter in §4.4
// distinguishes "absent" from "wrong type."

use crate::errors::{CompileError, RuntimeError, RuntimeErrorKind};
use crate::registry::{Operation, Registry};
use crate::task::Task;
use crate::value::{Dict, Value};
use std::sync::Arc;

#[derive(Debug)]
struct TupleCtor;
impl Operation for TupleCtor {
    fn execute(&self, task: &mut Task) -> Result<(), RuntimeError> {
        task.stack_mut().push(Value::Tuple(Vec::new()));
        Ok(())
    }
}

#[derive(Debug)]
struct DictCtor;
impl Operation for DictCtor {
    fn execute(&self, task: &mut Task) -> Result<(), RuntimeError> {
        task.stack_mut().push(Value::Dict(Dict::new()));
        Ok(())
    }
}

#[derive(Debug)]
struct IsTuple;
impl Operation for IsTuple {
    fn execute(&self, task: &mut Task) -> Result<(), RuntimeError> {
        let v = task.stack_mut().pop()?;
        task.stack_mut().push(Value::Bool(v.is_tuple()));
        Ok(())
    }
}

#[derive(Debug)]
struct IsDict;
impl Operation for IsDict {
    fn execute(&self, task: &mut Task) -> Result<(), RuntimeError> {
        let v = task.stack_mut().pop()?;
        task.stack_mut().push(Value::Bool(v.is_dict()));
        Ok(())
    }
}

#[derive(Debug)]
struct IsContainer;
impl Operation for IsContainer {
    fn execute(&self, task: &mut Task) -> Result<(), RuntimeError> {
        let v = task.stack_mut().pop()?;
        task.stack_mut().push(Value::Bool(v.is_container()));
        Ok(())
    }
}

/// Mutates the task's current `apply` scope: appends a popped value to a
/// bound tuple, or inserts a popped `(key, value)` pair into a bound dict.
#[derive(Debug)]
struct Insert;
impl Operation for Insert {
    fn execute(&self, task: &mut Task) -> Result<(), RuntimeError> {
        let is_dict = matches!(task.container_scope(), Some(Value::Dict(_)));
        if is_dict {
            let value = task.stack_mut().pop()?;
            let key = match task.stack_mut().pop()? {
                Value::Text(k) => k,
                _ => return Err(RuntimeError::cast("dict insert requires a text key below the value")),
            };
            match task.container_scope_mut() {
                Some(Value::Dict(d)) => {
                    d.insert(key, value);
                    Ok(())
                }
                _ => unreachable!("checked is_dict above"),
            }
        } else {
            let value = task.stack_mut().pop()?;
            match task.container_scope_mut() {
                Some(Value::Tuple(items)) => {
                    items.push(value);
                    Ok(())
                }
                _ => Err(RuntimeError::new(RuntimeErrorKind::Cast, "insert requires an apply scope bound to a tuple or dict")),
            }
        }
    }
}

/// `( container key -- value )`: `Long` index into a `Tuple`, `Text` key
/// into a `Dict`; out-of-range/absent yields `Null` rather than a fault.
#[derive(Debug)]
struct Get;
impl Operation for Get {
    fn execute(&self, task: &mut Task) -> Result<(), RuntimeError> {
        let key = task.stack_mut().pop()?;
        let container = task.stack_mut().pop()?;
        let result = match (container, key) {
            (Value::Tuple(items), Value::Long(i)) if i >= 0 => {
                items.get(i as usize).cloned().unwrap_or(Value::Null)
            }
            (Value::Dict(d), Value::Text(k)) => d.get(&k).cloned().unwrap_or(Value::Null),
            (Value::Tuple(_), _) | (Value::Dict(_), _) => {
                return Err(RuntimeError::cast("get key type does not match the container"))
            }
            _ => return Err(RuntimeError::cast("get requires a tuple or dict container")),
        };
        task.stack_mut().push(result);
        Ok(())
    }
}

#[derive(Debug)]
struct Size;
impl Operation for Size {
    fn execute(&self, task: &mut Task) -> Result<(), RuntimeError> {
        let container = task.stack_mut().pop()?;
        let len = match container {
            Value::Tuple(items) => items.len(),
            Value::Dict(d) => d.len(),
            _ => return Err(RuntimeError::cast("size requires a tuple or dict container")),
        };
        task.stack_mut().push(Value::Long(len as i64));
        Ok(())
    }
}

pub fn register(registry: &mut Registry) -> Result<(), CompileError> {
    registry.register("tuple", None, Arc::new(TupleCtor))?;
    registry.register("dict", None, Arc::new(DictCtor))?;
    registry.register("tuple?", None, Arc::new(IsTuple))?;
    registry.register("dict?", None, Arc::new(IsDict))?;
    registry.register("container?", None, Arc::new(IsContainer))?;
    registry.register("insert", None, Arc::new(Insert))?;
    registry.register("get", None, Arc::new(Get))?;
    registry.register("size", None, Arc::new(Size))?;
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

    fn run(name: &str, task: &mut Task) {
        let reg = registry();
        reg.lookup(&name.to_uppercase()).unwrap()[0].op.execute(task).unwrap();
    }

    #[test]
    fn tuple_type_test_distinguishes_wrong_type_from_absent() {
        let mut ctx = SimpleContext::new();
        let mut task = Task::new(&mut ctx);
        task.stack_mut().push(Value::Long(1));
        run("tuple?", &mut task);
        assert_eq!(task.stack_mut().pop().unwrap(), Value::Bool(false));
        assert!(task.stack_mut().pop().is_err());
    }

    #[test]
    fn get_on_tuple_by_index() {
        let mut ctx = SimpleContext::new();
        let mut task = Task::new(&mut ctx);
        task.stack_mut().push(Value::Tuple(vec![Value::Long(10), Value::Long(20)]));
        task.stack_mut().push(Value::Long(1));
        run("get", &mut task);
        assert_eq!(task.stack_mut().pop().unwrap(), Value::Long(20));
    }

    #[test]
    fn size_of_dict() {
        let mut ctx = SimpleContext::new();
        let mut task = Task::new(&mut ctx);
        let mut d = Dict::new();
        d.insert("a".into(), Value::Long(1));
        task.stack_mut().push(Value::Dict(d));
        run("size", &mut task);
        assert_eq!(task.stack_mut().pop().unwrap(), Value::Long(1));
    }
}
