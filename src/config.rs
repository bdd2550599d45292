// File: src/config.rs
//
// Configuration properties the embedding host supplies (spec §6): every
// named property (`LoopLimit`, `Macro`, `Word`, `Program`, `FailReturnsNull`)
// plus one additive, never-required extension for friendlier diagnostics on
// pathological input.

/// Default `LoopLimit`: bounds both the highest valid variable index and
/// the macro-expansion recursion count.
pub const DEFAULT_LOOP_LIMIT: usize = 256;

#[derive(Debug, Clone)]
pub struct Config {
    pub loop_limit: usize,
    /// Engine-level macro definition texts, compiled once at engine setup
    /// and inherited by every subsequent `compile` call.
    pub macros: Vec<String>,
    /// Engine-level inline word-definition programs (`: name ... ;`),
    /// compiled once and inherited the same way.
    pub words: Vec<String>,
    pub fail_returns_null: bool,
    /// Soft cap on compiled reference count, checked after `compile`
    /// finishes; `None` disables the check. Purely a friendlier diagnostic
    /// before memory exhaustion on pathological input — never required by
    /// the spec and never changes documented semantics.
    pub max_program_length: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            loop_limit: DEFAULT_LOOP_LIMIT,
            macros: Vec::new(),
            words: Vec::new(),
            fail_returns_null: false,
            max_program_length: Some(1_000_000),
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_loop_limit(mut self, limit: usize) -> Self {
        self.loop_limit = limit;
        self
    }

    pub fn with_fail_returns_null(mut self, value: bool) -> Self {
        self.fail_returns_null = value;
        self
    }

    pub fn with_macro(mut self, text: impl Into<String>) -> Self {
        self.macros.push(text.into());
        self
    }

    pub fn with_word(mut self, text: impl Into<String>) -> Self {
        self.words.push(text.into());
        self
    }

    pub fn with_max_program_length(mut self, cap: Option<usize>) -> Self {
        self.max_program_length = cap;
        self
    }
}
