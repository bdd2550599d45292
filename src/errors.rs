// File: src/errors.rs
//
// Error handling and reporting for the RPN compiler and virtual machine.
// Compile-time and runtime failures are kept as distinct types: a compile
// can only ever raise a CompileError, a running Task can only ever raise
// a RuntimeError. Both carry enough context to print a source-annotated
// diagnostic in the same arrow-and-caret style the host CLI uses.

use colored::Colorize;
use std::fmt;

/// A position in the original source text, 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SourceLocation {
    pub line: usize,
    pub column: usize,
}

impl SourceLocation {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }

    pub fn unknown() -> Self {
        Self { line: 0, column: 0 }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Every compile-time diagnostic named in the specification's error taxonomy.
#[derive(Debug, Clone, PartialEq)]
pub enum CompileErrorKind {
    // Lexical
    MissingQuote,
    MissingCommentEnd,
    EscapeUse,
    // Syntactic
    RightParenthesis,
    MissingWordName,
    MisplacedEndWord,
    EmptyMacro,
    EmptyMacroParamName,
    EllipsisLast,
    MacroArg,
    MacroArgs,
    ExpansionLimitExceeded,
    ProgramTooLarge,
    // Semantic
    UnknownRpnWord,
    RegisteredWordName,
    VariableForm,
    MissingInstruction,
    // Operation registration
    Overload,
}

impl fmt::Display for CompileErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            CompileErrorKind::MissingQuote => "missing quote",
            CompileErrorKind::MissingCommentEnd => "missing comment end",
            CompileErrorKind::EscapeUse => "invalid escape sequence",
            CompileErrorKind::RightParenthesis => "unbalanced macro parentheses",
            CompileErrorKind::MissingWordName => "missing word name",
            CompileErrorKind::MisplacedEndWord => "misplaced end of word",
            CompileErrorKind::EmptyMacro => "empty macro name",
            CompileErrorKind::EmptyMacroParamName => "empty macro parameter name",
            CompileErrorKind::EllipsisLast => "ellipsis parameter must be last",
            CompileErrorKind::MacroArg => "missing required macro argument",
            CompileErrorKind::MacroArgs => "macro argument count mismatch",
            CompileErrorKind::ExpansionLimitExceeded => "macro expansion limit exceeded",
            CompileErrorKind::ProgramTooLarge => "compiled program exceeds the configured length cap",
            CompileErrorKind::UnknownRpnWord => "unknown word",
            CompileErrorKind::RegisteredWordName => "word name collides with a registered operation",
            CompileErrorKind::VariableForm => "invalid variable access form",
            CompileErrorKind::MissingInstruction => "missing instruction",
            CompileErrorKind::Overload => "duplicate operation overload",
        };
        write!(f, "{}", s)
    }
}

/// A structured compile-time error with location information.
#[derive(Debug, Clone)]
pub struct CompileError {
    pub kind: CompileErrorKind,
    pub message: String,
    pub location: SourceLocation,
}

impl CompileError {
    pub fn new(kind: CompileErrorKind, message: impl Into<String>, location: SourceLocation) -> Self {
        Self { kind, message: message.into(), location }
    }

    pub fn at(kind: CompileErrorKind, location: SourceLocation) -> Self {
        let message = kind.to_string();
        Self { kind, message, location }
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "{}: {}", "compile error".red().bold(), self.message.bold())?;
        writeln!(f, "{}", format!("  --> {}", self.location).bright_blue())
    }
}

impl std::error::Error for CompileError {}

/// Runtime failures a Task can raise once execution has begun.
#[derive(Debug, Clone, PartialEq)]
pub enum RuntimeErrorKind {
    /// Stack empty, underflow, or out-of-range access. Always fatal to the task.
    Limits,
    /// Value present at a required position but of the wrong type. Always fatal.
    Cast,
    /// Arithmetic/conversion faults gated by `fail_returns_null`.
    ConvertFailed,
    DivisionError,
    ScaleOverflow,
    /// Execution finished with a stack that does not hold exactly one value.
    ValuesOnStack,
    /// A required input/memory/param slot held no value.
    RequiredAbsent,
}

impl RuntimeErrorKind {
    /// Arithmetic/conversion faults are gated by `fail_returns_null`; stack-access
    /// faults and the two end-of-program checks below are always fatal regardless
    /// of that flag.
    pub fn is_arithmetic_fault(&self) -> bool {
        matches!(
            self,
            RuntimeErrorKind::ConvertFailed
                | RuntimeErrorKind::DivisionError
                | RuntimeErrorKind::ScaleOverflow
        )
    }
}

impl fmt::Display for RuntimeErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            RuntimeErrorKind::Limits => "stack limits exceeded",
            RuntimeErrorKind::Cast => "unexpected value type",
            RuntimeErrorKind::ConvertFailed => "conversion failed",
            RuntimeErrorKind::DivisionError => "division by zero",
            RuntimeErrorKind::ScaleOverflow => "decimal scale overflow",
            RuntimeErrorKind::ValuesOnStack => "program did not leave exactly one value on the stack",
            RuntimeErrorKind::RequiredAbsent => "required value was absent",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone)]
pub struct RuntimeError {
    pub kind: RuntimeErrorKind,
    pub message: String,
}

impl RuntimeError {
    pub fn new(kind: RuntimeErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }

    pub fn limits(message: impl Into<String>) -> Self {
        Self::new(RuntimeErrorKind::Limits, message)
    }

    pub fn cast(message: impl Into<String>) -> Self {
        Self::new(RuntimeErrorKind::Cast, message)
    }
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}: {}", "runtime error".red().bold(), self.message)
    }
}

impl std::error::Error for RuntimeError {}
