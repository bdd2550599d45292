// File: src/ops/bigdec.rs
//
// BigDecimal-specific precision and scale manipulation words (spec §4.6:
// "configurable scale via `scale=`, `.left`, `.right`, `pow`, `prec`,
// `strip`, `unscaled`, `sgn`"). `.left`/`.right` move the decimal point by
// direct digit/scale manipulation (mirroring Java's `movePointLeft`/
// `movePointRight`) rather than through division, so the shift is always
// exact.

use crate::errors::{CompileError, RuntimeError, RuntimeErrorKind};
use crate::filter::TOP_BIG_DECIMAL;
use crate::registry::{Operation, Registry};
use crate::task::Task;
use crate::value::Value;
use bigdecimal::{BigDecimal, ToPrimitive};
use std::sync::Arc;

fn require_big_decimal(task: &mut Task) -> Result<BigDecimal, RuntimeError> {
    match task.stack_mut().pop()? {
        Value::BigDecimal(d) => Ok(d),
        other => other
            .as_big_decimal()
            .ok_or_else(|| RuntimeError::new(RuntimeErrorKind::ConvertFailed, "value is not convertible to BigDecimal")),
    }
}

fn require_long(task: &mut Task) -> Result<i64, RuntimeError> {
    task.stack_mut().pop()?.as_i64().ok_or_else(|| RuntimeError::cast("expected a long operand"))
}

/// `( bigdecimal scale -- bigdecimal )`, HALF_EVEN (banker's) rounding.
#[derive(Debug)]
struct SetScale;
impl Operation for SetScale {
    fn execute(&self, task: &mut Task) -> Result<(), RuntimeError> {
        let scale = require_long(task)?;
        let d = require_big_decimal(task)?;
        task.stack_mut().push(Value::BigDecimal(d.with_scale_round(scale, bigdecimal::RoundingMode::HalfEven)));
        Ok(())
    }
}

/// `( bigdecimal n -- bigdecimal )`: moves the decimal point `n` places left.
#[derive(Debug)]
struct MoveLeft;
impl Operation for MoveLeft {
    fn execute(&self, task: &mut Task) -> Result<(), RuntimeError> {
        let n = require_long(task)?;
        let d = require_big_decimal(task)?;
        let (digits, scale) = d.as_bigint_and_exponent();
        task.stack_mut().push(Value::BigDecimal(BigDecimal::new(digits, scale + n)));
        Ok(())
    }
}

/// `( bigdecimal n -- bigdecimal )`: moves the decimal point `n` places right.
#[derive(Debug)]
struct MoveRight;
impl Operation for MoveRight {
    fn execute(&self, task: &mut Task) -> Result<(), RuntimeError> {
        let n = require_long(task)?;
        let d = require_big_decimal(task)?;
        let (digits, scale) = d.as_bigint_and_exponent();
        task.stack_mut().push(Value::BigDecimal(BigDecimal::new(digits, scale - n)));
        Ok(())
    }
}

/// `( bigdecimal exponent -- bigdecimal )`: non-negative integer exponent only.
#[derive(Debug)]
struct Pow;
impl Operation for Pow {
    fn execute(&self, task: &mut Task) -> Result<(), RuntimeError> {
        let exponent = require_long(task)?;
        let base = require_big_decimal(task)?;
        if exponent < 0 {
            return Err(RuntimeError::new(RuntimeErrorKind::ConvertFailed, "pow requires a non-negative exponent"));
        }
        let mut result = BigDecimal::from(1);
        for _ in 0..exponent {
            result = result * &base;
        }
        task.stack_mut().push(Value::BigDecimal(result));
        Ok(())
    }
}

/// Number of significant digits.
#[derive(Debug)]
struct Prec;
impl Operation for Prec {
    fn execute(&self, task: &mut Task) -> Result<(), RuntimeError> {
        let d = require_big_decimal(task)?;
        task.stack_mut().push(Value::Long(d.digits() as i64));
        Ok(())
    }
}

/// Strips trailing fractional zeros to the minimal equivalent representation.
#[derive(Debug)]
struct Strip;
impl Operation for Strip {
    fn execute(&self, task: &mut Task) -> Result<(), RuntimeError> {
        let d = require_big_decimal(task)?;
        task.stack_mut().push(Value::BigDecimal(d.normalized()));
        Ok(())
    }
}

/// The unscaled integer value, if it fits in a `Long`.
#[derive(Debug)]
struct Unscaled;
impl Operation for Unscaled {
    fn execute(&self, task: &mut Task) -> Result<(), RuntimeError> {
        let d = require_big_decimal(task)?;
        let (digits, _scale) = d.as_bigint_and_exponent();
        let n = digits
            .to_i64()
            .ok_or_else(|| RuntimeError::new(RuntimeErrorKind::ConvertFailed, "unscaled value does not fit in a long"))?;
        task.stack_mut().push(Value::Long(n));
        Ok(())
    }
}

#[derive(Debug)]
struct Sgn;
impl Operation for Sgn {
    fn execute(&self, task: &mut Task) -> Result<(), RuntimeError> {
        let d = require_big_decimal(task)?;
        let zero = BigDecimal::from(0);
        let sign = if d == zero {
            0
        } else if d < zero {
            -1
        } else {
            1
        };
        task.stack_mut().push(Value::Long(sign));
        Ok(())
    }
}

pub fn register(registry: &mut Registry) -> Result<(), CompileError> {
    registry.register("scale=", None, Arc::new(SetScale))?;
    registry.register(".left", None, Arc::new(MoveLeft))?;
    registry.register(".right", None, Arc::new(MoveRight))?;
    registry.register("pow", None, Arc::new(Pow))?;
    registry.register("prec", Some(TOP_BIG_DECIMAL.clone()), Arc::new(Prec))?;
    registry.register("strip", Some(TOP_BIG_DECIMAL.clone()), Arc::new(Strip))?;
    registry.register("unscaled", Some(TOP_BIG_DECIMAL.clone()), Arc::new(Unscaled))?;
    registry.register("sgn", Some(TOP_BIG_DECIMAL.clone()), Arc::new(Sgn))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::SimpleContext;
    use std::str::FromStr;

    #[test]
    fn move_left_is_exact() {
        let mut ctx = SimpleContext::new();
        let mut task = Task::new(&mut ctx);
        task.stack_mut().push(Value::BigDecimal(BigDecimal::from_str("123.45").unwrap()));
        task.stack_mut().push(Value::Long(2));
        MoveLeft.execute(&mut task).unwrap();
        assert_eq!(task.stack_mut().pop().unwrap(), Value::BigDecimal(BigDecimal::from_str("1.2345").unwrap()));
    }

    #[test]
    fn sgn_of_negative_and_zero() {
        let mut ctx = SimpleContext::new();
        let mut task = Task::new(&mut ctx);
        task.stack_mut().push(Value::BigDecimal(BigDecimal::from_str("-4.0").unwrap()));
        Sgn.execute(&mut task).unwrap();
        assert_eq!(task.stack_mut().pop().unwrap(), Value::Long(-1));

        task.stack_mut().push(Value::BigDecimal(BigDecimal::from_str("0").unwrap()));
        Sgn.execute(&mut task).unwrap();
        assert_eq!(task.stack_mut().pop().unwrap(), Value::Long(0));
    }

    #[test]
    fn pow_by_repeated_multiplication() {
        let mut ctx = SimpleContext::new();
        let mut task = Task::new(&mut ctx);
        task.stack_mut().push(Value::BigDecimal(BigDecimal::from_str("2").unwrap()));
        task.stack_mut().push(Value::Long(10));
        Pow.execute(&mut task).unwrap();
        assert_eq!(task.stack_mut().pop().unwrap(), Value::BigDecimal(BigDecimal::from_str("1024").unwrap()));
    }
}
