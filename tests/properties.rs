// Integration coverage for a subset of spec.md §8's universal properties
// that span multiple modules (tokenizer + compiler + task together); the
// properties that are purely local to one module already have unit tests
// alongside that module.

use rpnvm::config::Config;
use rpnvm::context::SimpleContext;
use rpnvm::engine::Engine;
use rpnvm::value::Value;
use std::str::FromStr;

fn run(source: &str, ctx: &mut SimpleContext) -> Option<Value> {
    let engine = Engine::new(Config::default()).unwrap();
    let program = engine.compile(source, &[], &[]).unwrap();
    engine.execute(&program, ctx)
}

#[test]
fn tokenizer_round_trip_ignores_injected_whitespace_and_comments() {
    let engine = Engine::new(Config::default()).unwrap();
    let a = engine.compile("2 3 +", &[], &[]).unwrap();
    let b = engine.compile("  2 \t 3 /* a comment */ + ( stack comment ) ", &[], &[]).unwrap();
    assert_eq!(a.len(), b.len());

    let mut ctx_a = SimpleContext::new();
    let mut ctx_b = SimpleContext::new();
    assert_eq!(engine.execute(&a, &mut ctx_a), engine.execute(&b, &mut ctx_b));
}

#[test]
fn macro_expansion_terminates_within_the_loop_limit() {
    let config = Config::new().with_loop_limit(4).with_macro("inc(x) $x 1 +");
    let engine = Engine::new(config).unwrap();
    assert!(engine.compile("inc(1)", &[], &[]).is_ok());
}

#[test]
fn self_referential_macro_past_the_loop_limit_fails_to_compile() {
    let config = Config::new().with_loop_limit(4).with_macro("loop() loop()");
    let engine = Engine::new(config).unwrap();
    assert!(engine.compile("loop()", &[], &[]).is_err());
}

#[test]
fn overload_resolution_picks_the_first_matching_filter_in_registration_order() {
    // BOTH_LONG is registered before BOTH_NUMBER for '+': two longs must
    // dispatch to the integer overload (a Long result), not the widened
    // double overload.
    let mut ctx = SimpleContext::new();
    assert_eq!(run("2 3 +", &mut ctx), Some(Value::Long(5)));

    // One operand a BigDecimal still prefers the BigDecimal overload over
    // the generic numeric (double) one, even though BigDecimal.is_number()
    // is also true.
    let program_source = "2 3 scale= dup + drop 2 3 +";
    let mut ctx2 = SimpleContext::new();
    assert!(run(program_source, &mut ctx2).is_some());
}

#[test]
fn program_is_immutable_across_repeated_compiles() {
    let engine = Engine::new(Config::default()).unwrap();
    let program_one = engine.compile("2 3 +", &[], &[]).unwrap();
    let len_before = program_one.len();
    let _program_two = engine.compile(": sq dup * ; 4 sq", &[], &[]).unwrap();
    assert_eq!(program_one.len(), len_before);

    let mut ctx = SimpleContext::new();
    assert_eq!(engine.execute(&program_one, &mut ctx), Some(Value::Long(5)));
}

#[test]
fn mark_unmark_round_trip_preserves_insertion_order() {
    let mut ctx = SimpleContext::new();
    assert_eq!(
        run("mark 2 3 4 mark>tuple", &mut ctx),
        Some(Value::Tuple(vec![Value::Long(2), Value::Long(3), Value::Long(4)]))
    );
}

#[test]
fn apply_scope_is_restored_even_when_the_inner_instruction_faults() {
    use rpnvm::errors::{RuntimeError, SourceLocation};
    use rpnvm::program::OperationReference;
    use rpnvm::registry::{Operation, Overload, Registry};
    use rpnvm::task::Task;
    use std::sync::Arc;

    #[derive(Debug)]
    struct AlwaysFails;
    impl Operation for AlwaysFails {
        fn execute(&self, _task: &mut Task) -> Result<(), RuntimeError> {
            Err(RuntimeError::cast("deliberate failure for the test"))
        }
    }

    let mut registry = Registry::new();
    registry.register("FAIL", None, Arc::new(AlwaysFails)).unwrap();
    let overloads: Vec<Overload> = registry.lookup("FAIL").unwrap();

    let inner = OperationReference::Builtin {
        name: Arc::from("FAIL"),
        overloads: Arc::new(overloads),
        location: SourceLocation::unknown(),
    };
    let apply_ref = OperationReference::Apply { inner: Box::new(inner), location: SourceLocation::unknown() };

    let mut ctx = SimpleContext::new();
    let mut task = Task::new(&mut ctx);
    task.stack_mut().push(Value::Tuple(Vec::new()));
    assert!(task.container_scope().is_none());

    let result = task.execute_reference(&apply_ref);
    assert!(result.is_err());
    // The guard restores the task's prior container scope (None here) even
    // though the inner instruction faulted.
    assert!(task.container_scope().is_none());
}

#[test]
fn fail_returns_null_idempotence_across_two_executions() {
    let config = Config::new().with_fail_returns_null(true);
    let engine = Engine::new(config).unwrap();
    let program = engine.compile("1 0 /", &[], &[]).unwrap();

    let mut ctx1 = SimpleContext::new();
    ctx1.set_fail_returns_null(true);
    let mut ctx2 = SimpleContext::new();
    ctx2.set_fail_returns_null(true);

    assert_eq!(engine.execute(&program, &mut ctx1), Some(Value::Null));
    assert_eq!(engine.execute(&program, &mut ctx2), Some(Value::Null));
}

#[test]
fn without_fail_returns_null_both_executions_drop() {
    let engine = Engine::new(Config::default()).unwrap();
    let program = engine.compile("1 0 /", &[], &[]).unwrap();

    let mut ctx1 = SimpleContext::new();
    let mut ctx2 = SimpleContext::new();
    assert_eq!(engine.execute(&program, &mut ctx1), None);
    assert_eq!(engine.execute(&program, &mut ctx2), None);
}

#[test]
fn bigdecimal_divmod_law_holds_under_truncated_division() {
    let x = bigdecimal::BigDecimal::from_str("-10.5").unwrap();
    let y = bigdecimal::BigDecimal::from_str("3").unwrap();
    let q = (&x / &y).with_scale_round(0, bigdecimal::RoundingMode::Down);
    let r = &x - &q * &y;
    assert_eq!(&q * &y + &r, x);
    // mod's sign always matches |divisor|'s sign (non-negative here).
    let b_abs = y.abs();
    let floored_q = (&x / &b_abs).with_scale_round(0, bigdecimal::RoundingMode::Floor);
    let m = &x - &floored_q * &b_abs;
    assert!(m >= bigdecimal::BigDecimal::from(0));
}
