// File: src/ops/arithmetic.rs
//
// Integer, float, and big-decimal families for the four basic operators
// plus `mod`/`%`(rem), `neg`, `abs`, and numeric comparisons — one Rust
// `fn` per overload, registered under increasingly permissive filters so
// the most specific numeric representation always wins (spec §4.5: first
// matching filter in registration order).

use crate::errors::{CompileError, RuntimeError, RuntimeErrorKind};
use crate::filter::*;
use crate::registry::{Operation, Registry};
use crate::task::Task;
use crate::value::Value;
use bigdecimal::BigDecimal;
use std::sync::Arc;

fn pop_pair(task: &mut Task) -> Result<(Value, Value), RuntimeError> {
    let b = task.stack_mut().pop()?;
    let a = task.stack_mut().pop()?;
    Ok((a, b))
}

macro_rules! binary_op {
    ($struct_name:ident, $body:expr) => {
        #[derive(Debug)]
        struct $struct_name;
        impl Operation for $struct_name {
            fn execute(&self, task: &mut Task) -> Result<(), RuntimeError> {
                let (a, b) = pop_pair(task)?;
                let result = ($body)(a, b)?;
                task.stack_mut().push(result);
                Ok(())
            }
        }
    };
}

binary_op!(AddLong, |a: Value, b: Value| -> Result<Value, RuntimeError> {
    let (a, b) = (a.as_i64().unwrap(), b.as_i64().unwrap());
    a.checked_add(b)
        .map(Value::Long)
        .ok_or_else(|| RuntimeError::new(RuntimeErrorKind::ConvertFailed, "long addition overflowed"))
});
binary_op!(SubLong, |a: Value, b: Value| -> Result<Value, RuntimeError> {
    let (a, b) = (a.as_i64().unwrap(), b.as_i64().unwrap());
    a.checked_sub(b)
        .map(Value::Long)
        .ok_or_else(|| RuntimeError::new(RuntimeErrorKind::ConvertFailed, "long subtraction overflowed"))
});
binary_op!(MulLong, |a: Value, b: Value| -> Result<Value, RuntimeError> {
    let (a, b) = (a.as_i64().unwrap(), b.as_i64().unwrap());
    a.checked_mul(b)
        .map(Value::Long)
        .ok_or_else(|| RuntimeError::new(RuntimeErrorKind::ConvertFailed, "long multiplication overflowed"))
});
binary_op!(DivLong, |a: Value, b: Value| -> Result<Value, RuntimeError> {
    let (a, b) = (a.as_i64().unwrap(), b.as_i64().unwrap());
    if b == 0 {
        return Err(RuntimeError::new(RuntimeErrorKind::DivisionError, "division by zero"));
    }
    Ok(Value::Long(a / b))
});
binary_op!(ModLong, |a: Value, b: Value| -> Result<Value, RuntimeError> {
    let (a, b) = (a.as_i64().unwrap(), b.as_i64().unwrap());
    if b == 0 {
        return Err(RuntimeError::new(RuntimeErrorKind::DivisionError, "modulo by zero"));
    }
    Ok(Value::Long(a.rem_euclid(b)))
});
binary_op!(RemLong, |a: Value, b: Value| -> Result<Value, RuntimeError> {
    let (a, b) = (a.as_i64().unwrap(), b.as_i64().unwrap());
    if b == 0 {
        return Err(RuntimeError::new(RuntimeErrorKind::DivisionError, "remainder by zero"));
    }
    Ok(Value::Long(a % b))
});

binary_op!(AddDouble, |a: Value, b: Value| -> Result<Value, RuntimeError> {
    Ok(Value::Double(a.as_f64().unwrap() + b.as_f64().unwrap()))
});
binary_op!(SubDouble, |a: Value, b: Value| -> Result<Value, RuntimeError> {
    Ok(Value::Double(a.as_f64().unwrap() - b.as_f64().unwrap()))
});
binary_op!(MulDouble, |a: Value, b: Value| -> Result<Value, RuntimeError> {
    Ok(Value::Double(a.as_f64().unwrap() * b.as_f64().unwrap()))
});
binary_op!(DivDouble, |a: Value, b: Value| -> Result<Value, RuntimeError> {
    // IEEE-754 division by zero yields +/-Infinity or NaN rather than a
    // fault -- unlike the integer and big-decimal families, this is not
    // gated by `fail_returns_null`.
    Ok(Value::Double(a.as_f64().unwrap() / b.as_f64().unwrap()))
});

binary_op!(AddBigDecimal, |a: Value, b: Value| -> Result<Value, RuntimeError> {
    let (a, b) = as_big_pair(a, b)?;
    Ok(Value::BigDecimal(a + b))
});
binary_op!(SubBigDecimal, |a: Value, b: Value| -> Result<Value, RuntimeError> {
    let (a, b) = as_big_pair(a, b)?;
    Ok(Value::BigDecimal(a - b))
});
binary_op!(MulBigDecimal, |a: Value, b: Value| -> Result<Value, RuntimeError> {
    let (a, b) = as_big_pair(a, b)?;
    Ok(Value::BigDecimal(a * b))
});
binary_op!(DivBigDecimal, |a: Value, b: Value| -> Result<Value, RuntimeError> {
    let (a, b) = as_big_pair(a, b)?;
    if b == BigDecimal::from(0) {
        return Err(RuntimeError::new(RuntimeErrorKind::DivisionError, "division by zero"));
    }
    // HALF_EVEN (banker's) rounding at a generous working scale; `scale=`
    // lets callers narrow the result afterward.
    let scale = a.fractional_digit_count().max(b.fractional_digit_count()).max(10);
    Ok(Value::BigDecimal(
        (a / b).with_scale_round(scale, bigdecimal::RoundingMode::HalfEven),
    ))
});
binary_op!(ModBigDecimal, |a: Value, b: Value| -> Result<Value, RuntimeError> {
    let (a, b) = as_big_pair(a, b)?;
    if b == BigDecimal::from(0) {
        return Err(RuntimeError::new(RuntimeErrorKind::DivisionError, "modulo by zero"));
    }
    Ok(Value::BigDecimal(bigdecimal_mod(&a, &b)))
});
binary_op!(RemBigDecimal, |a: Value, b: Value| -> Result<Value, RuntimeError> {
    let (a, b) = as_big_pair(a, b)?;
    if b == BigDecimal::from(0) {
        return Err(RuntimeError::new(RuntimeErrorKind::DivisionError, "remainder by zero"));
    }
    Ok(Value::BigDecimal(bigdecimal_rem(&a, &b)))
});

binary_op!(ModDouble, |a: Value, b: Value| -> Result<Value, RuntimeError> {
    let (a, b) = (a.as_f64().unwrap(), b.as_f64().unwrap());
    // Floored remainder over |b|, matching `ModLong`'s rem_euclid sign law:
    // the result is always non-negative.
    Ok(Value::Double(a.rem_euclid(b.abs())))
});
binary_op!(RemDouble, |a: Value, b: Value| -> Result<Value, RuntimeError> {
    let (a, b) = (a.as_f64().unwrap(), b.as_f64().unwrap());
    Ok(Value::Double(a % b))
});

binary_op!(ConcatText, |a: Value, b: Value| -> Result<Value, RuntimeError> {
    let a = match a {
        Value::Text(s) => s,
        other => other.to_string(),
    };
    let b = match b {
        Value::Text(s) => s,
        other => other.to_string(),
    };
    Ok(Value::Text(format!("{}{}", a, b)))
});

fn as_big_pair(a: Value, b: Value) -> Result<(BigDecimal, BigDecimal), RuntimeError> {
    let a = a
        .as_big_decimal()
        .ok_or_else(|| RuntimeError::new(RuntimeErrorKind::ConvertFailed, "value is not convertible to BigDecimal"))?;
    let b = b
        .as_big_decimal()
        .ok_or_else(|| RuntimeError::new(RuntimeErrorKind::ConvertFailed, "value is not convertible to BigDecimal"))?;
    Ok((a, b))
}

/// `(x div y)*y + (x rem y) == x` with truncated division: the `rem` family
/// keeps the dividend's sign.
pub(crate) fn bigdecimal_rem(a: &BigDecimal, b: &BigDecimal) -> BigDecimal {
    let truncated_quotient = (a / b).with_scale_round(0, bigdecimal::RoundingMode::Down);
    a - &truncated_quotient * b
}

/// Floored modulo over `|b|`: always non-negative, matching spec §8's "mod
/// result sign = sign(|divisor|)" law.
pub(crate) fn bigdecimal_mod(a: &BigDecimal, b: &BigDecimal) -> BigDecimal {
    let b_abs = b.abs();
    let floored_quotient = (a / &b_abs).with_scale_round(0, bigdecimal::RoundingMode::Floor);
    a - &floored_quotient * &b_abs
}

macro_rules! unary_op {
    ($struct_name:ident, $body:expr) => {
        #[derive(Debug)]
        struct $struct_name;
        impl Operation for $struct_name {
            fn execute(&self, task: &mut Task) -> Result<(), RuntimeError> {
                let a = task.stack_mut().pop()?;
                let result = ($body)(a)?;
                task.stack_mut().push(result);
                Ok(())
            }
        }
    };
}

unary_op!(NegLong, |a: Value| -> Result<Value, RuntimeError> { Ok(Value::Long(-a.as_i64().unwrap())) });
unary_op!(NegDouble, |a: Value| -> Result<Value, RuntimeError> { Ok(Value::Double(-a.as_f64().unwrap())) });
unary_op!(NegBigDecimal, |a: Value| -> Result<Value, RuntimeError> {
    let a = a
        .as_big_decimal()
        .ok_or_else(|| RuntimeError::new(RuntimeErrorKind::ConvertFailed, "value is not convertible to BigDecimal"))?;
    Ok(Value::BigDecimal(-a))
});
unary_op!(AbsLong, |a: Value| -> Result<Value, RuntimeError> { Ok(Value::Long(a.as_i64().unwrap().abs())) });
unary_op!(AbsDouble, |a: Value| -> Result<Value, RuntimeError> { Ok(Value::Double(a.as_f64().unwrap().abs())) });
unary_op!(AbsBigDecimal, |a: Value| -> Result<Value, RuntimeError> {
    let a = a
        .as_big_decimal()
        .ok_or_else(|| RuntimeError::new(RuntimeErrorKind::ConvertFailed, "value is not convertible to BigDecimal"))?;
    Ok(Value::BigDecimal(a.abs()))
});

macro_rules! compare_op {
    ($struct_name:ident, $op:tt) => {
        #[derive(Debug)]
        struct $struct_name;
        impl Operation for $struct_name {
            fn execute(&self, task: &mut Task) -> Result<(), RuntimeError> {
                let (a, b) = pop_pair(task)?;
                let (a, b) = (a.as_f64().unwrap(), b.as_f64().unwrap());
                task.stack_mut().push(Value::Bool(a $op b));
                Ok(())
            }
        }
    };
}

compare_op!(Lt, <);
compare_op!(Gt, >);
compare_op!(Le, <=);
compare_op!(Ge, >=);

pub fn register(registry: &mut Registry) -> Result<(), CompileError> {
    // Most specific family first: two longs before either-big-decimal
    // before general numeric (float) before string concatenation.
    registry.register("+", Some(BOTH_LONG.clone()), Arc::new(AddLong))?;
    registry.register("+", Some(EITHER_BIG_DECIMAL.clone()), Arc::new(AddBigDecimal))?;
    registry.register("+", Some(BOTH_NUMBER.clone()), Arc::new(AddDouble))?;
    registry.register("+", Some(BOTH_STRING.clone()), Arc::new(ConcatText))?;

    registry.register("-", Some(BOTH_LONG.clone()), Arc::new(SubLong))?;
    registry.register("-", Some(EITHER_BIG_DECIMAL.clone()), Arc::new(SubBigDecimal))?;
    registry.register("-", Some(BOTH_NUMBER.clone()), Arc::new(SubDouble))?;

    registry.register("*", Some(BOTH_LONG.clone()), Arc::new(MulLong))?;
    registry.register("*", Some(EITHER_BIG_DECIMAL.clone()), Arc::new(MulBigDecimal))?;
    registry.register("*", Some(BOTH_NUMBER.clone()), Arc::new(MulDouble))?;

    registry.register("/", Some(BOTH_LONG.clone()), Arc::new(DivLong))?;
    registry.register("/", Some(EITHER_BIG_DECIMAL.clone()), Arc::new(DivBigDecimal))?;
    registry.register("/", Some(BOTH_NUMBER.clone()), Arc::new(DivDouble))?;

    registry.register("mod", Some(BOTH_LONG.clone()), Arc::new(ModLong))?;
    registry.register("mod", Some(EITHER_BIG_DECIMAL.clone()), Arc::new(ModBigDecimal))?;
    registry.register("mod", Some(BOTH_NUMBER.clone()), Arc::new(ModDouble))?;

    registry.register("%", Some(BOTH_LONG.clone()), Arc::new(RemLong))?;
    registry.register("%", Some(EITHER_BIG_DECIMAL.clone()), Arc::new(RemBigDecimal))?;
    registry.register("%", Some(BOTH_NUMBER.clone()), Arc::new(RemDouble))?;
    registry.register("rem", Some(BOTH_LONG.clone()), Arc::new(RemLong))?;
    registry.register("rem", Some(EITHER_BIG_DECIMAL.clone()), Arc::new(RemBigDecimal))?;
    registry.register("rem", Some(BOTH_NUMBER.clone()), Arc::new(RemDouble))?;

    registry.register("neg", Some(TOP_LONG.clone()), Arc::new(NegLong))?;
    registry.register("neg", Some(TOP_BIG_DECIMAL.clone()), Arc::new(NegBigDecimal))?;
    registry.register("neg", Some(TOP_NUMBER.clone()), Arc::new(NegDouble))?;

    registry.register("abs", Some(TOP_LONG.clone()), Arc::new(AbsLong))?;
    registry.register("abs", Some(TOP_BIG_DECIMAL.clone()), Arc::new(AbsBigDecimal))?;
    registry.register("abs", Some(TOP_NUMBER.clone()), Arc::new(AbsDouble))?;

    registry.register("<", Some(BOTH_NUMBER.clone()), Arc::new(Lt))?;
    registry.register(">", Some(BOTH_NUMBER.clone()), Arc::new(Gt))?;
    registry.register("<=", Some(BOTH_NUMBER.clone()), Arc::new(Le))?;
    registry.register(">=", Some(BOTH_NUMBER.clone()), Arc::new(Ge))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::Task;

    fn run_binary(name: &str, a: Value, b: Value) -> Value {
        let mut registry = Registry::new();
        register(&mut registry).unwrap();
        let overloads = registry.lookup(&name.to_uppercase()).unwrap();
        let mut ctx = crate::context::SimpleContext::new();
        let mut task = Task::new(&mut ctx);
        task.stack_mut().push(a);
        task.stack_mut().push(b);
        for overload in &overloads {
            let matches = overload.filter.as_ref().map(|f| f.evaluate(&task)).unwrap_or(true);
            if matches {
                overload.op.execute(&mut task).unwrap();
                break;
            }
        }
        task.stack_mut().pop().unwrap()
    }

    #[test]
    fn long_addition_dispatches_to_integer_overload() {
        assert_eq!(run_binary("+", Value::Long(2), Value::Long(3)), Value::Long(5));
    }

    #[test]
    fn mixed_numeric_addition_widens_to_double() {
        assert_eq!(run_binary("+", Value::Long(2), Value::Double(0.5)), Value::Double(2.5));
    }

    #[test]
    fn string_concatenation_overload() {
        assert_eq!(
            run_binary("+", Value::Text("a".into()), Value::Text("b".into())),
            Value::Text("ab".into())
        );
    }

    #[test]
    fn long_mod_is_always_non_negative() {
        assert_eq!(run_binary("mod", Value::Long(-7), Value::Long(3)), Value::Long(2));
    }

    #[test]
    fn long_rem_keeps_dividend_sign() {
        assert_eq!(run_binary("%", Value::Long(-7), Value::Long(3)), Value::Long(-1));
    }

    #[test]
    fn double_mod_is_always_non_negative() {
        assert_eq!(run_binary("mod", Value::Double(-7.5), Value::Double(3.0)), Value::Double(1.5));
    }

    #[test]
    fn double_rem_keeps_dividend_sign() {
        assert_eq!(run_binary("%", Value::Double(-7.5), Value::Double(3.0)), Value::Double(-1.5));
    }

    #[test]
    fn bigdecimal_divmod_identity_holds() {
        use std::str::FromStr;
        let x = BigDecimal::from_str("10.5").unwrap();
        let y = BigDecimal::from_str("3").unwrap();
        let q = (&x / &y).with_scale_round(0, bigdecimal::RoundingMode::Down);
        let r = bigdecimal_rem(&x, &y);
        assert_eq!(&q * &y + &r, x);
    }
}
