// File: src/program.rs
//
// The compiled, immutable program a Task executes. A `Program` is a flat
// array of `OperationReference`s; some references carry their own nested
// sub-references (the spec calls these out explicitly for `apply`'s inner
// instruction, and the same mechanism serves `if`/`else`/`then` branches)
// rather than flattening everything into jump-target bytecode — simpler to
// build in the compiler's recursive-descent style and just as cheap to walk.

use crate::errors::SourceLocation;
use crate::registry::Overload;
use crate::token::VariableAccess;
use crate::value::Value;
use std::sync::Arc;

#[derive(Clone)]
pub enum OperationReference {
    /// A numeric or text literal: push `value`.
    Constant { value: Value, location: SourceLocation },
    /// A user word invocation: run `program` to completion within the
    /// current task (shared stack/memory/context, saved/restored pc).
    Call { program: Arc<Program>, location: SourceLocation },
    /// `$N` / `#N` / `@N` and their action-character variants.
    Variable { access: VariableAccess, location: SourceLocation },
    /// A registered built-in, resolved to its overload chain at compile
    /// time; dispatch among the chain happens at execute time against the
    /// live stack.
    Builtin { name: Arc<str>, overloads: Arc<Vec<Overload>>, location: SourceLocation },
    /// `apply`: pops a container, binds it as the task's current
    /// container-apply scope, executes `inner`, restores the prior scope
    /// on every exit path (including a fault raised by `inner`).
    Apply { inner: Box<OperationReference>, location: SourceLocation },
    /// `if ... [else ...] then`: pops a `Bool`, runs `then_branch` or
    /// `else_branch`. The compiler already resolved which branch is which
    /// at compile time; no jump targets are needed at execute time.
    If { then_branch: Vec<OperationReference>, else_branch: Vec<OperationReference>, location: SourceLocation },
}

impl OperationReference {
    pub fn location(&self) -> SourceLocation {
        match self {
            OperationReference::Constant { location, .. }
            | OperationReference::Call { location, .. }
            | OperationReference::Variable { location, .. }
            | OperationReference::Builtin { location, .. }
            | OperationReference::Apply { location, .. }
            | OperationReference::If { location, .. } => *location,
        }
    }
}

/// An immutable, frozen sequence of references produced by `compile`. Once
/// built, a `Program` is never mutated — it is shared read-only across
/// however many `Task`s execute it, possibly on independent threads, via
/// `Arc`.
pub struct Program {
    references: Vec<OperationReference>,
}

impl Program {
    pub fn new(references: Vec<OperationReference>) -> Arc<Program> {
        Arc::new(Program { references })
    }

    pub fn len(&self) -> usize {
        self.references.len()
    }

    pub fn is_empty(&self) -> bool {
        self.references.is_empty()
    }

    pub fn get(&self, pc: usize) -> Option<&OperationReference> {
        self.references.get(pc)
    }
}
