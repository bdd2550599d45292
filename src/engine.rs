// File: src/engine.rs
//
// The embedding-facing façade (spec §4.7): owns the process-wide operation
// registry plus whatever engine-level macros/words `Config` supplies,
// compiled once at setup, and exposes the two entry points spec §6 names:
// `compile` and `execute`.

use crate::compiler::Compiler;
use crate::config::Config;
use crate::context::ExecutionContext;
use crate::errors::CompileError;
use crate::macros::MacroDef;
use crate::program::Program;
use crate::registry::Registry;
use crate::task::Task;
use crate::value::Value;
use std::collections::HashMap;
use std::sync::Arc;

pub struct Engine {
    registry: Registry,
    ambient_macros: HashMap<String, MacroDef>,
    ambient_words: HashMap<String, Arc<Program>>,
    loop_limit: usize,
    max_program_length: Option<usize>,
    fail_returns_null: bool,
}

impl Engine {
    /// Registers every built-in operation module, then compiles the
    /// engine-level macro and word texts from `config` once up front: the
    /// resulting `(macros, words)` pair is inherited by every subsequent
    /// `compile` call, exactly as spec §4.7 describes.
    pub fn new(config: Config) -> Result<Self, CompileError> {
        let mut registry = Registry::new();
        crate::ops::register_all(&mut registry)?;

        let mut ambient_macros = HashMap::new();
        for text in &config.macros {
            let def = MacroDef::parse(text)?;
            ambient_macros.insert(def.key.clone(), def);
        }

        let mut ambient_words = HashMap::new();
        for text in &config.words {
            let mut compiler = Compiler::new(&registry, ambient_macros.clone(), ambient_words.clone(), config.loop_limit);
            compiler.compile_word_text(text)?;
            ambient_words = compiler.into_words();
        }

        Ok(Self {
            registry,
            ambient_macros,
            ambient_words,
            loop_limit: config.loop_limit,
            max_program_length: config.max_program_length,
            fail_returns_null: config.fail_returns_null,
        })
    }

    /// `compile(source, macro_texts, word_texts) -> Result<Program, CompileError>`
    /// (spec §6): `macro_texts`/`word_texts` extend -- but never replace --
    /// the engine-level ambient set for this one compilation only.
    pub fn compile(
        &self,
        source: &str,
        macro_texts: &[&str],
        word_texts: &[&str],
    ) -> Result<Arc<Program>, CompileError> {
        let mut macros = self.ambient_macros.clone();
        for text in macro_texts {
            let def = MacroDef::parse(text)?;
            macros.insert(def.key.clone(), def);
        }

        let mut words = self.ambient_words.clone();
        for text in word_texts {
            let mut compiler = Compiler::new(&self.registry, macros.clone(), words.clone(), self.loop_limit);
            compiler.compile_word_text(text)?;
            words = compiler.into_words();
        }

        let compiler = Compiler::new(&self.registry, macros, words, self.loop_limit);
        let program = compiler.compile(source)?;
        if let Some(cap) = self.max_program_length {
            if program.len() > cap {
                return Err(CompileError::new(
                    crate::errors::CompileErrorKind::ProgramTooLarge,
                    format!("compiled program has {} references, exceeding the configured cap of {}", program.len(), cap),
                    crate::errors::SourceLocation::unknown(),
                ));
            }
        }
        Ok(program)
    }

    /// `execute(program, context) -> Option<Value>` (spec §6): runs one
    /// `Task` to completion, applying the fail-returns-null policy. The
    /// engine-level `Config.fail_returns_null` is pushed onto the context
    /// first, so it takes effect even if the host never set it directly.
    pub fn execute(&self, program: &Arc<Program>, context: &mut dyn ExecutionContext) -> Option<Value> {
        context.set_fail_returns_null(self.fail_returns_null);
        let task = Task::new(context);
        task.run(program)
    }
}
