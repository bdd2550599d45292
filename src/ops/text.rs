// File: src/ops/text.rs
//
// String utility words. `+` already carries the concatenation overload
// (see ops/arithmetic.rs); these are the remaining text primitives the
// expanded spec's ambient string-ops family calls for.

use crate::errors::CompileError;
use crate::errors::RuntimeError;
use crate::filter::TOP_STRING;
use crate::registry::{Operation, Registry};
use crate::task::Task;
use crate::value::Value;
use std::sync::Arc;

#[derive(Debug)]
struct Length;
impl Operation for Length {
    fn execute(&self, task: &mut Task) -> Result<(), RuntimeError> {
        match task.stack_mut().pop()? {
            Value::Text(s) => {
                task.stack_mut().push(Value::Long(s.chars().count() as i64));
                Ok(())
            }
            _ => Err(RuntimeError::cast("length requires a text value")),
        }
    }
}

#[derive(Debug)]
struct Upper;
impl Operation for Upper {
    fn execute(&self, task: &mut Task) -> Result<(), RuntimeError> {
        match task.stack_mut().pop()? {
            Value::Text(s) => {
                task.stack_mut().push(Value::Text(s.to_uppercase()));
                Ok(())
            }
            _ => Err(RuntimeError::cast("upper requires a text value")),
        }
    }
}

#[derive(Debug)]
struct Lower;
impl Operation for Lower {
    fn execute(&self, task: &mut Task) -> Result<(), RuntimeError> {
        match task.stack_mut().pop()? {
            Value::Text(s) => {
                task.stack_mut().push(Value::Text(s.to_lowercase()));
                Ok(())
            }
            _ => Err(RuntimeError::cast("lower requires a text value")),
        }
    }
}

#[derive(Debug)]
struct Trim;
impl Operation for Trim {
    fn execute(&self, task: &mut Task) -> Result<(), RuntimeError> {
        match task.stack_mut().pop()? {
            Value::Text(s) => {
                task.stack_mut().push(Value::Text(s.trim().to_string()));
                Ok(())
            }
            _ => Err(RuntimeError::cast("trim requires a text value")),
        }
    }
}

#[derive(Debug)]
struct Contains;
impl Operation for Contains {
    fn execute(&self, task: &mut Task) -> Result<(), RuntimeError> {
        let needle = task.stack_mut().pop()?;
        let haystack = task.stack_mut().pop()?;
        match (haystack, needle) {
            (Value::Text(h), Value::Text(n)) => {
                task.stack_mut().push(Value::Bool(h.contains(&n)));
                Ok(())
            }
            _ => Err(RuntimeError::cast("contains requires two text values")),
        }
    }
}

pub fn register(registry: &mut Registry) -> Result<(), CompileError> {
    registry.register("length", Some(TOP_STRING.clone()), Arc::new(Length))?;
    registry.register("upper", Some(TOP_STRING.clone()), Arc::new(Upper))?;
    registry.register("lower", Some(TOP_STRING.clone()), Arc::new(Lower))?;
    registry.register("trim", Some(TOP_STRING.clone()), Arc::new(Trim))?;
    registry.register("contains", None, Arc::new(Contains))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::SimpleContext;

    #[test]
    fn upper_and_length() {
        let mut ctx = SimpleContext::new();
        let mut task = Task::new(&mut ctx);
        task.stack_mut().push(Value::Text("hi".into()));
        Upper.execute(&mut task).unwrap();
        assert_eq!(task.stack_mut().pop().unwrap(), Value::Text("HI".into()));

        task.stack_mut().push(Value::Text("hello".into()));
        Length.execute(&mut task).unwrap();
        assert_eq!(task.stack_mut().pop().unwrap(), Value::Long(5));
    }

    #[test]
    fn contains_substring() {
        let mut ctx = SimpleContext::new();
        let mut task = Task::new(&mut ctx);
        task.stack_mut().push(Value::Text("haystack".into()));
        task.stack_mut().push(Value::Text("stack".into()));
        Contains.execute(&mut task).unwrap();
        assert_eq!(task.stack_mut().pop().unwrap(), Value::Bool(true));
    }
}
