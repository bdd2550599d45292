// File: src/ops/datetime.rs
//
// Timestamp arithmetic and formatting (spec §4.6 "Date/time"). Formatting
// honors the task's configured time zone via `Context::time_zone()` rather
// than always rendering in UTC, matching the host framework's own
// per-point time-zone handling this crate stays agnostic of otherwise.

use crate::errors::{CompileError, RuntimeError};
use crate::filter::{Filter, TypeCheck};
use crate::registry::{Operation, Registry};
use crate::task::Task;
use crate::value::Value;
use chrono::{Duration, Utc};
use std::sync::Arc;

#[derive(Debug)]
struct Now;
impl Operation for Now {
    fn execute(&self, task: &mut Task) -> Result<(), RuntimeError> {
        task.stack_mut().push(Value::Stamp(Utc::now()));
        Ok(())
    }
}

/// `( millis -- elapsed )`
#[derive(Debug)]
struct ElapsedFromMillis;
impl Operation for ElapsedFromMillis {
    fn execute(&self, task: &mut Task) -> Result<(), RuntimeError> {
        let v = task.stack_mut().pop()?;
        let millis = v.as_i64().ok_or_else(|| RuntimeError::cast("elapsed requires a long millisecond count"))?;
        task.stack_mut().push(Value::Elapsed(Duration::milliseconds(millis)));
        Ok(())
    }
}

/// `( stamp elapsed -- stamp )`
#[derive(Debug)]
struct StampPlusElapsed;
impl Operation for StampPlusElapsed {
    fn execute(&self, task: &mut Task) -> Result<(), RuntimeError> {
        let elapsed = task.stack_mut().pop()?;
        let stamp = task.stack_mut().pop()?;
        match (stamp, elapsed) {
            (Value::Stamp(t), Value::Elapsed(d)) => {
                task.stack_mut().push(Value::Stamp(t + d));
                Ok(())
            }
            _ => Err(RuntimeError::cast("stamp+ requires a stamp and an elapsed duration")),
        }
    }
}

/// `( stamp elapsed -- stamp )`
#[derive(Debug)]
struct StampMinusElapsed;
impl Operation for StampMinusElapsed {
    fn execute(&self, task: &mut Task) -> Result<(), RuntimeError> {
        let elapsed = task.stack_mut().pop()?;
        let stamp = task.stack_mut().pop()?;
        match (stamp, elapsed) {
            (Value::Stamp(t), Value::Elapsed(d)) => {
                task.stack_mut().push(Value::Stamp(t - d));
                Ok(())
            }
            _ => Err(RuntimeError::cast("stamp- requires a stamp and an elapsed duration")),
        }
    }
}

/// `( stamp stamp -- elapsed )`
#[derive(Debug)]
struct StampDiff;
impl Operation for StampDiff {
    fn execute(&self, task: &mut Task) -> Result<(), RuntimeError> {
        let b = task.stack_mut().pop()?;
        let a = task.stack_mut().pop()?;
        match (a, b) {
            (Value::Stamp(t1), Value::Stamp(t2)) => {
                task.stack_mut().push(Value::Elapsed(t1 - t2));
                Ok(())
            }
            _ => Err(RuntimeError::cast("stamp-diff requires two stamps")),
        }
    }
}

/// `( stamp format -- text )`, rendered in the task's configured time zone.
#[derive(Debug)]
struct Format;
impl Operation for Format {
    fn execute(&self, task: &mut Task) -> Result<(), RuntimeError> {
        let fmt = task.stack_mut().pop()?;
        let stamp = task.stack_mut().pop()?;
        match (stamp, fmt) {
            (Value::Stamp(t), Value::Text(fmt)) => {
                let zoned = t.with_timezone(&task.context().time_zone());
                task.stack_mut().push(Value::Text(zoned.format(&fmt).to_string()));
                Ok(())
            }
            _ => Err(RuntimeError::cast("format requires a stamp and a text format string")),
        }
    }
}

pub fn register(registry: &mut Registry) -> Result<(), CompileError> {
    registry.register("now", None, Arc::new(Now))?;
    registry.register("elapsed", None, Arc::new(ElapsedFromMillis))?;

    let stamp_then_elapsed = Arc::new(Filter::builder().is(0, TypeCheck::Elapsed).is(1, TypeCheck::Stamp).and().build());
    registry.register("stamp+", Some(stamp_then_elapsed.clone()), Arc::new(StampPlusElapsed))?;
    registry.register("stamp-", Some(stamp_then_elapsed), Arc::new(StampMinusElapsed))?;

    let both_stamp = Arc::new(Filter::builder().is(0, TypeCheck::Stamp).is(1, TypeCheck::Stamp).and().build());
    registry.register("stamp-diff", Some(both_stamp), Arc::new(StampDiff))?;

    registry.register("format", None, Arc::new(Format))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::SimpleContext;

    #[test]
    fn stamp_plus_elapsed() {
        let mut ctx = SimpleContext::new();
        let mut task = Task::new(&mut ctx);
        let t = Utc::now();
        task.stack_mut().push(Value::Stamp(t));
        task.stack_mut().push(Value::Elapsed(Duration::seconds(60)));
        StampPlusElapsed.execute(&mut task).unwrap();
        assert_eq!(task.stack_mut().pop().unwrap(), Value::Stamp(t + Duration::seconds(60)));
    }

    #[test]
    fn stamp_diff_yields_elapsed() {
        let mut ctx = SimpleContext::new();
        let mut task = Task::new(&mut ctx);
        let t = Utc::now();
        task.stack_mut().push(Value::Stamp(t + Duration::seconds(5)));
        task.stack_mut().push(Value::Stamp(t));
        StampDiff.execute(&mut task).unwrap();
        assert_eq!(task.stack_mut().pop().unwrap(), Value::Elapsed(Duration::seconds(5)));
    }
}
