// File: src/filter.rs
//
// Overload filters: small stack-inspection predicate programs that decide
// which of several same-named operation registrations applies to the
// current stack contents. Built fluently, stored as flat bytecode, and
// evaluated against a tiny local boolean stack with no short-circuiting —
// every predicate always runs; only the AND/OR combinators pop.

use crate::value::Value;
use once_cell::sync::Lazy;
use std::sync::Arc;

/// What kind of container `IS_APPLYING` expects the task's current
/// container-apply scope to hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerKind {
    Tuple,
    Dict,
    Any,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCheck {
    Bool,
    Number,
    Long,
    Double,
    BigDecimal,
    Text,
    State,
    Stamp,
    Elapsed,
    Tuple,
    Dict,
    Container,
    /// Any value is present at that offset, independent of its variant —
    /// distinct from `IS_PRESENT`, which additionally excludes `Value::Null`.
    Any,
}

fn matches_type(value: &Value, check: TypeCheck) -> bool {
    match check {
        TypeCheck::Bool => matches!(value, Value::Bool(_)),
        TypeCheck::Number => value.is_number(),
        TypeCheck::Long => value.is_long(),
        TypeCheck::Double => matches!(value, Value::Double(_)),
        TypeCheck::BigDecimal => value.is_big_decimal(),
        TypeCheck::Text => matches!(value, Value::Text(_)),
        TypeCheck::State => matches!(value, Value::State(_)),
        TypeCheck::Stamp => matches!(value, Value::Stamp(_)),
        TypeCheck::Elapsed => matches!(value, Value::Elapsed(_)),
        TypeCheck::Tuple => value.is_tuple(),
        TypeCheck::Dict => value.is_dict(),
        TypeCheck::Container => value.is_container(),
        TypeCheck::Any => true,
    }
}

/// One instruction of a Filter's flat bytecode.
#[derive(Debug, Clone, Copy, PartialEq)]
enum FilterOp {
    Is(usize, TypeCheck),
    IsLong(usize),
    IsPresent(usize),
    IsApplying(ContainerKind),
    And,
    Or,
}

/// Anything a Filter can be evaluated against: the task's value stack plus
/// its current container-apply scope.
pub trait FilterSource {
    fn peek_value(&self, offset: usize) -> Option<&Value>;
    fn applying_container(&self) -> Option<ContainerKind>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    ops: Vec<FilterOp>,
}

impl Filter {
    pub fn builder() -> FilterBuilder {
        FilterBuilder { ops: Vec::new() }
    }

    /// Runs the filter's bytecode against `source`. Every predicate always
    /// evaluates (out-of-range peeks simply yield `false`); `AND`/`OR` pop
    /// two results off the local boolean stack and push the combination.
    pub fn evaluate(&self, source: &dyn FilterSource) -> bool {
        let mut bools: Vec<bool> = Vec::new();
        for op in &self.ops {
            match op {
                FilterOp::Is(offset, check) => {
                    let result = source.peek_value(*offset).map(|v| matches_type(v, *check)).unwrap_or(false);
                    bools.push(result);
                }
                FilterOp::IsLong(offset) => {
                    let result = source.peek_value(*offset).map(|v| v.is_long()).unwrap_or(false);
                    bools.push(result);
                }
                FilterOp::IsPresent(offset) => {
                    let result = source.peek_value(*offset).map(|v| !v.is_null()).unwrap_or(false);
                    bools.push(result);
                }
                FilterOp::IsApplying(kind) => {
                    let result = match (source.applying_container(), kind) {
                        (Some(_), ContainerKind::Any) => true,
                        (Some(actual), want) => actual == *want,
                        (None, _) => false,
                    };
                    bools.push(result);
                }
                FilterOp::And => {
                    let b = bools.pop().unwrap_or(false);
                    let a = bools.pop().unwrap_or(false);
                    bools.push(a && b);
                }
                FilterOp::Or => {
                    let b = bools.pop().unwrap_or(false);
                    let a = bools.pop().unwrap_or(false);
                    bools.push(a || b);
                }
            }
        }
        bools.pop().unwrap_or(false)
    }
}

/// Same (name, filter-bytecode) registration twice is an `Overload` error
/// (spec §4.5); this compares the op sequence structurally so two
/// independently built filters with identical predicates still collide.
impl Filter {
    pub fn collides_with(&self, other: &Filter) -> bool {
        self.ops == other.ops
    }

    pub fn none() -> Filter {
        Filter { ops: Vec::new() }
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

pub struct FilterBuilder {
    ops: Vec<FilterOp>,
}

impl FilterBuilder {
    pub fn is(mut self, offset: usize, check: TypeCheck) -> Self {
        self.ops.push(FilterOp::Is(offset, check));
        self
    }

    pub fn is_long(mut self, offset: usize) -> Self {
        self.ops.push(FilterOp::IsLong(offset));
        self
    }

    pub fn is_present(mut self, offset: usize) -> Self {
        self.ops.push(FilterOp::IsPresent(offset));
        self
    }

    pub fn is_applying(mut self, kind: ContainerKind) -> Self {
        self.ops.push(FilterOp::IsApplying(kind));
        self
    }

    pub fn and(mut self) -> Self {
        self.ops.push(FilterOp::And);
        self
    }

    pub fn or(mut self) -> Self {
        self.ops.push(FilterOp::Or);
        self
    }

    pub fn build(self) -> Filter {
        Filter { ops: self.ops }
    }
}

macro_rules! standard_filter {
    ($name:ident, $builder:expr) => {
        pub static $name: Lazy<Arc<Filter>> = Lazy::new(|| Arc::new($builder));
    };
}

standard_filter!(TOP_PRESENT, Filter::builder().is_present(0).build());
standard_filter!(TOP_NUMBER, Filter::builder().is(0, TypeCheck::Number).build());
standard_filter!(TOP_LONG, Filter::builder().is_long(0).build());
standard_filter!(TOP_BOOLEAN, Filter::builder().is(0, TypeCheck::Bool).build());
standard_filter!(TOP_STRING, Filter::builder().is(0, TypeCheck::Text).build());
standard_filter!(TOP_STATE, Filter::builder().is(0, TypeCheck::State).build());
standard_filter!(TOP_OBJECT, Filter::builder().is(0, TypeCheck::Any).build());
standard_filter!(TOP_CONTAINER, Filter::builder().is(0, TypeCheck::Container).build());
standard_filter!(TOP_BIG_DECIMAL, Filter::builder().is(0, TypeCheck::BigDecimal).build());
standard_filter!(
    BOTH_NUMBER,
    Filter::builder().is(0, TypeCheck::Number).is(1, TypeCheck::Number).and().build()
);
standard_filter!(BOTH_LONG, Filter::builder().is_long(0).is_long(1).and().build());
standard_filter!(
    BOTH_STRING,
    Filter::builder().is(0, TypeCheck::Text).is(1, TypeCheck::Text).and().build()
);
standard_filter!(
    BOTH_OBJECT,
    Filter::builder().is(0, TypeCheck::Any).is(1, TypeCheck::Any).and().build()
);
standard_filter!(BOTH_PRESENT, Filter::builder().is_present(0).is_present(1).and().build());
standard_filter!(
    EITHER_BIG_DECIMAL,
    Filter::builder().is(0, TypeCheck::BigDecimal).is(1, TypeCheck::BigDecimal).or().build()
);
standard_filter!(
    TOP_LONG_BIG_DECIMAL,
    Filter::builder().is_long(0).is(0, TypeCheck::BigDecimal).or().build()
);

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeSource {
        values: Vec<Value>,
        applying: Option<ContainerKind>,
    }

    impl FilterSource for FakeSource {
        fn peek_value(&self, offset: usize) -> Option<&Value> {
            let len = self.values.len();
            if offset >= len {
                None
            } else {
                Some(&self.values[len - 1 - offset])
            }
        }

        fn applying_container(&self) -> Option<ContainerKind> {
            self.applying
        }
    }

    #[test]
    fn top_number_matches_long_and_double() {
        let src = FakeSource { values: vec![Value::Long(5)], applying: None };
        assert!(TOP_NUMBER.evaluate(&src));
        let src2 = FakeSource { values: vec![Value::Double(5.0)], applying: None };
        assert!(TOP_NUMBER.evaluate(&src2));
        let src3 = FakeSource { values: vec![Value::Text("x".into())], applying: None };
        assert!(!TOP_NUMBER.evaluate(&src3));
    }

    #[test]
    fn out_of_range_peek_yields_false() {
        let src = FakeSource { values: vec![], applying: None };
        assert!(!TOP_NUMBER.evaluate(&src));
    }

    #[test]
    fn both_number_requires_two_numeric_values() {
        let src = FakeSource { values: vec![Value::Long(1), Value::Double(2.0)], applying: None };
        assert!(BOTH_NUMBER.evaluate(&src));
        let src2 = FakeSource { values: vec![Value::Text("a".into()), Value::Long(2)], applying: None };
        assert!(!BOTH_NUMBER.evaluate(&src2));
    }

    #[test]
    fn is_present_excludes_null() {
        let src = FakeSource { values: vec![Value::Null], applying: None };
        assert!(!TOP_PRESENT.evaluate(&src));
    }

    #[test]
    fn duplicate_filters_collide() {
        let a = Filter::builder().is(0, TypeCheck::Number).build();
        let b = Filter::builder().is(0, TypeCheck::Number).build();
        assert!(a.collides_with(&b));
    }
}
