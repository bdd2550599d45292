// File: src/ops/mod.rs
//
// Every built-in operation module registers itself here, in one place, the
// way the engine's setup phase wants: a single `register_all` an `Engine`
// calls once before any `compile`. Each submodule owns one family from
// spec §4.6 and is the only place that knows how its filters order against
// each other.

mod arithmetic;
mod bigdec;
mod container;
mod datetime;
mod logic;
mod stack_ops;
mod text;

use crate::errors::CompileError;
use crate::registry::Registry;

pub fn register_all(registry: &mut Registry) -> Result<(), CompileError> {
    arithmetic::register(registry)?;
    bigdec::register(registry)?;
    logic::register(registry)?;
    stack_ops::register(registry)?;
    container::register(registry)?;
    datetime::register(registry)?;
    text::register(registry)?;
    Ok(())
}
