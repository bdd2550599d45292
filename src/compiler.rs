// File: src/compiler.rs
//
// Drives the Tokenizer, assembles user word definitions layered over the
// engine's registered operations, and emits a frozen Program. Implements
// the grammar from spec §4.3:
//
//   program         = { inline-word-def }, [ ";" ], words ;
//   inline-word-def = ":" , word-name , words , ";" ;
//   words           = { operation-reference } ;
//
// `next_reference` is the single lookahead-consuming construct: only one
// built-in family in this operation set needs to pre-resolve a structural
// pairing at compile time (`apply`, plus the `if/else/then` block this
// crate adds) — both are special-cased directly here rather than behind a
// generic per-operation `setUp` hook trait, since no other registered
// operation in this spec needs lookahead. The busy-flag reentrancy guard
// the spec calls for is implicit: `next_reference` is not reentrant because
// Rust's borrow checker would refuse a second `&mut self` call while the
// first's stack frame is still live; there is no runtime flag to maintain.

use crate::errors::{CompileError, CompileErrorKind, SourceLocation};
use crate::macros::MacroDef;
use crate::program::{OperationReference, Program};
use crate::registry::Registry;
use crate::token::{Token, TokenKind, VariableAccess, VariableAction, VariableKind};
use crate::value::Value;
use std::collections::HashMap;
use std::sync::Arc;

use crate::tokenizer::Tokenizer;

enum CompilerState {
    ScanningWordDefs,
    ScanningWords,
    Done,
}

pub struct Compiler<'r> {
    registry: &'r Registry,
    tokenizer: Option<Tokenizer>,
    macros: HashMap<String, MacroDef>,
    /// User words visible to this compile unit: ambient (engine-level)
    /// words plus any `: name ... ;` defined within this source.
    words: HashMap<String, Arc<Program>>,
    lookahead: Option<Token>,
    loop_limit: usize,
}

impl<'r> Compiler<'r> {
    pub fn new(
        registry: &'r Registry,
        ambient_macros: HashMap<String, MacroDef>,
        ambient_words: HashMap<String, Arc<Program>>,
        loop_limit: usize,
    ) -> Self {
        Self {
            registry,
            tokenizer: None,
            macros: ambient_macros,
            words: ambient_words,
            lookahead: None,
            loop_limit,
        }
    }

    /// Compiles one inline word-definition program supplied out-of-band
    /// (spec §6: `word_texts`, each compiled in turn into the shared word
    /// map) — its body is `": name words ;"` on its own.
    pub fn compile_word_text(&mut self, text: &str) -> Result<(), CompileError> {
        self.tokenizer = Some(Tokenizer::new(text, self.macros.clone(), self.loop_limit));
        self.lookahead = None;
        let tok = self.peek_token()?;
        if tok.kind != TokenKind::BeginDef {
            return Err(CompileError::new(
                CompileErrorKind::MissingWordName,
                "a word text must begin with ':'",
                tok.location,
            ));
        }
        self.consume_token()?;
        self.compile_inline_word_def()
    }

    pub fn define_macro(&mut self, text: &str) -> Result<(), CompileError> {
        let def = MacroDef::parse(text)?;
        self.macros.insert(def.key.clone(), def);
        Ok(())
    }

    /// Hands back this compile unit's word map, e.g. after one or more
    /// `compile_word_text` calls building up the engine's ambient words.
    pub fn into_words(self) -> HashMap<String, Arc<Program>> {
        self.words
    }

    /// Compiles `source` into a frozen `Program` per the grammar above.
    pub fn compile(mut self, source: &str) -> Result<Arc<Program>, CompileError> {
        self.tokenizer = Some(Tokenizer::new(source, self.macros.clone(), self.loop_limit));
        self.lookahead = None;

        let mut state = CompilerState::ScanningWordDefs;
        let mut refs = Vec::new();
        loop {
            match state {
                CompilerState::ScanningWordDefs => match self.peek_token()?.kind {
                    TokenKind::BeginDef => {
                        self.consume_token()?;
                        self.compile_inline_word_def()?;
                    }
                    // An isolated leading ';' is accepted and ignored.
                    TokenKind::EndDef => {
                        self.consume_token()?;
                        state = CompilerState::ScanningWords;
                    }
                    TokenKind::Eof => state = CompilerState::Done,
                    _ => state = CompilerState::ScanningWords,
                },
                CompilerState::ScanningWords => match self.peek_token()?.kind {
                    TokenKind::Eof => state = CompilerState::Done,
                    TokenKind::EndDef => {
                        let loc = self.peek_token()?.location;
                        return Err(CompileError::new(
                            CompileErrorKind::MisplacedEndWord,
                            "';' with no matching word definition",
                            loc,
                        ));
                    }
                    _ => refs.push(self.next_reference()?),
                },
                CompilerState::Done => break,
            }
        }
        Ok(Program::new(refs))
    }

    fn compile_inline_word_def(&mut self) -> Result<(), CompileError> {
        let name_tok = self.consume_token()?;
        let name = match &name_tok.kind {
            TokenKind::OtherName(n) => n.clone(),
            _ => {
                return Err(CompileError::new(
                    CompileErrorKind::MissingWordName,
                    "expected a word name after ':'",
                    name_tok.location,
                ))
            }
        };
        let upper = name.to_uppercase();
        if self.registry.contains(&upper) {
            return Err(CompileError::new(
                CompileErrorKind::RegisteredWordName,
                format!("'{}' collides with a registered operation", name),
                name_tok.location,
            ));
        }

        let mut refs = Vec::new();
        loop {
            match self.peek_token()?.kind {
                TokenKind::EndDef => {
                    self.consume_token()?;
                    break;
                }
                TokenKind::Eof => {
                    return Err(CompileError::new(
                        CompileErrorKind::MisplacedEndWord,
                        format!("word definition '{}' is missing its closing ';'", name),
                        name_tok.location,
                    ))
                }
                _ => refs.push(self.next_reference()?),
            }
        }
        self.words.insert(upper, Program::new(refs));
        Ok(())
    }

    fn tokenizer_mut(&mut self) -> &mut Tokenizer {
        self.tokenizer
            .as_mut()
            .expect("tokenizer not yet initialized; call compile() or compile_word_text() first")
    }

    fn peek_token(&mut self) -> Result<Token, CompileError> {
        if self.lookahead.is_none() {
            self.lookahead = Some(self.tokenizer_mut().next_token()?);
        }
        Ok(self.lookahead.clone().unwrap())
    }

    fn consume_token(&mut self) -> Result<Token, CompileError> {
        match self.lookahead.take() {
            Some(t) => Ok(t),
            None => self.tokenizer_mut().next_token(),
        }
    }

    /// Consumes and constructs exactly one `OperationReference`.
    fn next_reference(&mut self) -> Result<OperationReference, CompileError> {
        let token = self.consume_token()?;
        match token.kind {
            TokenKind::NumericConstant(value) => Ok(OperationReference::Constant { value, location: token.location }),
            TokenKind::TextConstant(text) => {
                Ok(OperationReference::Constant { value: Value::Text(text), location: token.location })
            }
            TokenKind::VariableActionName(access) => {
                validate_variable_form(&access, self.loop_limit).map_err(|kind| {
                    CompileError::new(kind, format!("invalid variable access form '{}'", token.lexeme), token.location)
                })?;
                Ok(OperationReference::Variable { access, location: token.location })
            }
            TokenKind::OtherName(name) => self.reference_for_name(&name, token.location),
            TokenKind::Comma => Err(CompileError::new(
                CompileErrorKind::RightParenthesis,
                "unexpected ',' outside a macro argument list",
                token.location,
            )),
            TokenKind::RightParen => Err(CompileError::new(
                CompileErrorKind::RightParenthesis,
                "unexpected ')'",
                token.location,
            )),
            TokenKind::BeginDef => Err(CompileError::new(
                CompileErrorKind::MissingWordName,
                "':' is only valid at the start of a word definition",
                token.location,
            )),
            TokenKind::EndDef => Err(CompileError::new(
                CompileErrorKind::MisplacedEndWord,
                "';' with no matching word definition",
                token.location,
            )),
            TokenKind::Eof => Err(CompileError::new(
                CompileErrorKind::MissingInstruction,
                "unexpected end of source",
                token.location,
            )),
        }
    }

    fn reference_for_name(&mut self, name: &str, location: SourceLocation) -> Result<OperationReference, CompileError> {
        let upper = name.to_uppercase();

        if upper == "APPLY" {
            let inner = self.next_reference()?;
            return Ok(OperationReference::Apply { inner: Box::new(inner), location });
        }
        if upper == "IF" {
            return self.compile_if(location);
        }

        if let Some(overloads) = self.registry.lookup(&upper) {
            return Ok(OperationReference::Builtin { name: Arc::from(upper), overloads: Arc::new(overloads), location });
        }
        if let Some(program) = self.words.get(&upper) {
            return Ok(OperationReference::Call { program: program.clone(), location });
        }
        Err(CompileError::new(CompileErrorKind::UnknownRpnWord, format!("unknown word '{}'", name), location))
    }

    /// `if ... [else ...] then`, consumed eagerly at compile time the same
    /// way `apply` consumes its one inner reference — here the inner
    /// reference list runs until a bare `else`/`then` word, which are not
    /// registered operations and never reach `reference_for_name`.
    fn compile_if(&mut self, location: SourceLocation) -> Result<OperationReference, CompileError> {
        let then_branch = self.compile_block_until(&["else", "then"], location)?;
        let closer = self.consume_token()?;
        let closer_name = match &closer.kind {
            TokenKind::OtherName(n) => n.to_lowercase(),
            _ => {
                return Err(CompileError::new(
                    CompileErrorKind::MissingInstruction,
                    "'if' block is missing its closing 'then'",
                    location,
                ))
            }
        };
        let else_branch = if closer_name == "else" {
            let branch = self.compile_block_until(&["then"], location)?;
            self.consume_token()?; // the 'then'
            branch
        } else {
            Vec::new()
        };
        Ok(OperationReference::If { then_branch, else_branch, location })
    }

    fn compile_block_until(
        &mut self,
        stop_words: &[&str],
        open_location: SourceLocation,
    ) -> Result<Vec<OperationReference>, CompileError> {
        let mut refs = Vec::new();
        loop {
            let tok = self.peek_token()?;
            match &tok.kind {
                TokenKind::OtherName(n) if stop_words.contains(&n.to_lowercase().as_str()) => break,
                TokenKind::Eof => {
                    return Err(CompileError::new(
                        CompileErrorKind::MissingInstruction,
                        "'if' block runs past end of source without a matching 'then'",
                        open_location,
                    ))
                }
                _ => refs.push(self.next_reference()?),
            }
        }
        Ok(refs)
    }
}

/// Spec §4.3's `(kind, action, dup)` validity table: `dup` is only ever
/// meaningful for `Store`; `Store` is not a valid action for `Param`.
fn validate_variable_form(access: &VariableAccess, loop_limit: usize) -> Result<(), CompileErrorKind> {
    if access.index == 0 || access.index > loop_limit {
        return Err(CompileErrorKind::VariableForm);
    }
    use VariableAction::*;
    use VariableKind::*;
    let ok = matches!(
        (access.kind, access.action, access.dup),
        (Input, Value, false)
            | (Input, Required, false)
            | (Input, Stamp, false)
            | (Input, State, false)
            | (Input, Present, false)
            | (Input, Store, _)
            | (Input, Point, false)
            | (Memory, Value, false)
            | (Memory, Required, false)
            | (Memory, Store, _)
            | (Param, Value, false)
            | (Param, Required, false)
    );
    if ok {
        Ok(())
    } else {
        Err(CompileErrorKind::VariableForm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops;

    fn registry() -> Registry {
        let mut reg = Registry::new();
        ops::register_all(&mut reg).unwrap();
        reg
    }

    fn compile(source: &str) -> Result<Arc<Program>, CompileError> {
        let reg = registry();
        Compiler::new(&reg, HashMap::new(), HashMap::new(), 256).compile(source)
    }

    #[test]
    fn compiles_simple_addition() {
        let program = compile("2 3 +").unwrap();
        assert_eq!(program.len(), 3);
    }

    #[test]
    fn unknown_word_is_a_compile_error() {
        assert!(compile("frobnicate").is_err());
    }

    #[test]
    fn word_name_colliding_with_builtin_is_rejected() {
        assert!(compile(": + dup ; 1").is_err());
    }

    #[test]
    fn leading_semicolon_is_accepted_and_ignored() {
        assert!(compile("; 1 2 +").is_ok());
    }

    #[test]
    fn trailing_semicolon_with_no_open_def_is_an_error() {
        assert!(compile("1 2 + ;").is_err());
    }

    #[test]
    fn variable_form_out_of_range_index_is_rejected() {
        let reg = registry();
        assert!(Compiler::new(&reg, HashMap::new(), HashMap::new(), 4).compile("$5").is_err());
    }

    #[test]
    fn dup_prefix_is_only_valid_together_with_store() {
        // ':$1' dup-reads input 1 without storing, which spec §4.3's
        // (kind, action, dup) table does not allow: the dup prefix is only
        // meaningful on a store.
        assert!(compile(":$1").is_err());
        // '$1=' (store, no dup) and ':$1=' (store, with dup) are both valid.
        assert!(compile("5 $1=").is_ok());
        assert!(compile("5 :$1=").is_ok());
    }
}
