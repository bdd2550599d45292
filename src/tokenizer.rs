// File: src/tokenizer.rs
//
// Drives a stack of Lexers (the bottom one over the original source, the
// rest pushed by the Preprocessor as it expands macro invocations) and
// turns raw characters into Tokens. Word classification — numeric literals,
// variable-access forms, comma/paren sentinels, macro lookups — lives here;
// character-level concerns (whitespace, comments, quoting) stay in Lexer.

use crate::errors::{CompileError, CompileErrorKind, SourceLocation};
use crate::lexer::Lexer;
use crate::macros::MacroDef;
use crate::token::{Token, TokenKind, VariableAccess, VariableAction, VariableKind};
use crate::value::Value;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

static VARIABLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(:)?([$#@])([1-9][0-9]*)([=!?@$.])?$").unwrap());

/// Bounds both the highest valid variable index and the macro-expansion
/// recursion count (spec §6 `LoopLimit`).
pub struct Tokenizer {
    lexers: Vec<Lexer>,
    macros: HashMap<String, MacroDef>,
    loop_limit: usize,
    expansion_count: usize,
}

impl Tokenizer {
    pub fn new(source: &str, macros: HashMap<String, MacroDef>, loop_limit: usize) -> Self {
        Self { lexers: vec![Lexer::new(source)], macros, loop_limit, expansion_count: 0 }
    }

    pub fn define_macro(&mut self, text: &str) -> Result<(), CompileError> {
        let def = MacroDef::parse(text)?;
        self.macros.insert(def.key.clone(), def);
        Ok(())
    }

    fn top(&mut self) -> &mut Lexer {
        self.lexers.last_mut().expect("lexer stack is never empty while tokenizing")
    }

    fn position(&mut self) -> SourceLocation {
        self.top().position()
    }

    /// Pops exhausted lexers (below the original source lexer), decrementing
    /// the expansion counter for each one popped, until the top lexer has
    /// more input or only the original source lexer remains.
    fn pop_exhausted(&mut self) {
        while self.lexers.len() > 1 && self.lexers.last().unwrap().at_eof() {
            self.lexers.pop();
            self.expansion_count = self.expansion_count.saturating_sub(1);
        }
    }

    fn push_expansion(&mut self, text: String, at: SourceLocation) -> Result<(), CompileError> {
        self.expansion_count += 1;
        if self.expansion_count > self.loop_limit {
            return Err(CompileError::new(
                CompileErrorKind::ExpansionLimitExceeded,
                format!("macro expansion limit ({}) exceeded", self.loop_limit),
                at,
            ));
        }
        self.lexers.push(Lexer::new(&text));
        Ok(())
    }

    /// Produces the next token, expanding macros transparently: an
    /// `OtherName` that resolves to a macro definition never reaches the
    /// caller as a token — its expansion is pushed as a new lexer and
    /// tokenization resumes from there.
    pub fn next_token(&mut self) -> Result<Token, CompileError> {
        loop {
            self.pop_exhausted();
            self.top().skip_whitespace()?;
            self.pop_exhausted();

            if self.lexers.len() == 1 && self.top().at_eof() {
                return Ok(Token::new(TokenKind::Eof, self.position(), ""));
            }
            if self.top().at_eof() {
                continue;
            }

            let start = self.position();
            let c = self.top().current_char().unwrap();

            if c == '"' || c == '\'' {
                let (text, loc) = self.top().read_quoted()?;
                return Ok(Token::new(TokenKind::TextConstant(text.clone()), loc, text));
            }
            if c == ',' {
                self.top().advance();
                return Ok(Token::new(TokenKind::Comma, start, ","));
            }
            if c == ')' {
                self.top().advance();
                return Ok(Token::new(TokenKind::RightParen, start, ")"));
            }
            if c == '(' {
                self.skip_forth_comment(start)?;
                continue;
            }

            let (word, loc) = self.top().read_word();
            if word.is_empty() {
                // `:` or `;` alone, or some other single punctuation char
                // that read_word's whitespace/comma/rparen boundary doesn't
                // already special-case.
                self.top().advance();
                match c {
                    ':' => return Ok(Token::new(TokenKind::BeginDef, loc, ":")),
                    ';' => return Ok(Token::new(TokenKind::EndDef, loc, ";")),
                    _ => continue,
                }
            }

            if word == ":" {
                return Ok(Token::new(TokenKind::BeginDef, loc, word));
            }
            if word == ";" {
                return Ok(Token::new(TokenKind::EndDef, loc, word));
            }

            if let Some(access) = parse_variable_access(&word) {
                return Ok(Token::new(TokenKind::VariableActionName(access), loc, word));
            }

            if let Some(expanded) = self.try_macro_expand(&word, loc)? {
                self.push_expansion(expanded, loc)?;
                continue;
            }

            if let Some(value) = parse_numeric(&word) {
                return Ok(Token::new(TokenKind::NumericConstant(value), loc, word));
            }

            return Ok(Token::new(TokenKind::OtherName(word.clone()), loc, word));
        }
    }

    /// If `word` (optionally followed by a parenthesized argument list at
    /// the current lexer position) matches a known macro, consumes the
    /// argument list and returns the substituted body text.
    fn try_macro_expand(&mut self, word: &str, loc: SourceLocation) -> Result<Option<String>, CompileError> {
        if let Some(def) = self.macros.get(word).cloned() {
            if !def.is_parameterized() {
                return Ok(Some(def.body.clone()));
            }
        }

        let paren_key = format!("{}(", word);
        if let Some(def) = self.macros.get(&paren_key).cloned() {
            self.top().skip_whitespace()?;
            if self.top().current_char() != Some('(') {
                return Err(CompileError::new(
                    CompileErrorKind::RightParenthesis,
                    format!("macro '{}' expects an argument list", word),
                    loc,
                ));
            }
            self.top().advance();
            let args = self.read_macro_args(loc)?;
            let mapping = def.map(&args)?;
            return Ok(Some(def.substitute(&mapping)));
        }

        Ok(None)
    }

    /// Reads `arg, arg, ..., )` at the current lexer, splitting on top-level
    /// commas. Open Question (documented in DESIGN.md): nested parentheses
    /// inside an argument are not honored — a simple top-level comma split
    /// matches the source behavior this spec distills from.
    fn read_macro_args(&mut self, open_loc: SourceLocation) -> Result<Vec<String>, CompileError> {
        let mut args = Vec::new();
        let mut current = String::new();
        let mut depth = 0i32;
        loop {
            self.top().skip_whitespace()?;
            match self.top().current_char() {
                None => return Err(CompileError::at(CompileErrorKind::RightParenthesis, open_loc)),
                Some(')') if depth == 0 => {
                    self.top().advance();
                    args.push(current.trim().to_string());
                    break;
                }
                Some(',') if depth == 0 => {
                    self.top().advance();
                    args.push(current.trim().to_string());
                    current.clear();
                }
                Some(c) => {
                    if c == '(' {
                        depth += 1;
                    } else if c == ')' {
                        depth -= 1;
                    }
                    current.push(c);
                    self.top().advance();
                }
            }
        }
        if args.len() == 1 && args[0].is_empty() {
            args.clear();
        }
        Ok(args)
    }

    /// Forth `( ... )` stack comments are not nested: the first `)` closes
    /// them regardless of any `(` seen in between.
    fn skip_forth_comment(&mut self, start: SourceLocation) -> Result<(), CompileError> {
        self.top().advance(); // consume '('
        loop {
            match self.top().advance() {
                Some(')') => return Ok(()),
                Some(_) => continue,
                None => return Err(CompileError::at(CompileErrorKind::RightParenthesis, start)),
            }
        }
    }
}

fn parse_variable_access(word: &str) -> Option<VariableAccess> {
    let caps = VARIABLE_RE.captures(word)?;
    let dup = caps.get(1).is_some();
    let sigil = caps.get(2).unwrap().as_str();
    let index: usize = caps.get(3).unwrap().as_str().parse().ok()?;
    let action_char = caps.get(4).map(|m| m.as_str());

    let kind = match sigil {
        "$" => VariableKind::Input,
        "#" => VariableKind::Memory,
        "@" => VariableKind::Param,
        _ => return None,
    };
    let action = match action_char {
        None => VariableAction::Value,
        Some("!") => VariableAction::Required,
        Some("@") => VariableAction::Stamp,
        Some("$") => VariableAction::State,
        Some("?") => VariableAction::Present,
        Some("=") => VariableAction::Store,
        Some(".") => VariableAction::Point,
        Some(_) => return None,
    };
    Some(VariableAccess { dup, kind, index, action })
}

/// Decodes a word as a `Long` using C-style integer literal rules (`0x..`
/// hex, a leading `0` as octal, a leading `+` stripped, else decimal), then
/// falls back to `Double`. Neither succeeding means the word is an
/// `OtherName`.
fn parse_numeric(word: &str) -> Option<Value> {
    if let Some(v) = parse_long(word) {
        return Some(Value::Long(v));
    }
    word.parse::<f64>().ok().map(Value::Double)
}

fn parse_long(word: &str) -> Option<i64> {
    let negative = word.starts_with('-');
    let unsigned = word.strip_prefix('+').or_else(|| word.strip_prefix('-')).unwrap_or(word);
    if unsigned.is_empty() {
        return None;
    }
    let magnitude = if let Some(hex) = unsigned.strip_prefix("0x").or_else(|| unsigned.strip_prefix("0X")) {
        i64::from_str_radix(hex, 16).ok()?
    } else if unsigned.len() > 1 && unsigned.starts_with('0') && unsigned.bytes().all(|b| b.is_ascii_digit()) {
        i64::from_str_radix(unsigned, 8).ok()?
    } else if unsigned.bytes().all(|b| b.is_ascii_digit()) {
        unsigned.parse::<i64>().ok()?
    } else {
        return None;
    };
    Some(if negative { -magnitude } else { magnitude })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(source: &str) -> Vec<TokenKind> {
        let mut tz = Tokenizer::new(source, HashMap::new(), 1000);
        let mut out = Vec::new();
        loop {
            let tok = tz.next_token().unwrap();
            if tok.kind == TokenKind::Eof {
                break;
            }
            out.push(tok.kind);
        }
        out
    }

    #[test]
    fn numeric_constant_long() {
        let toks = tokens("42");
        assert_eq!(toks, vec![TokenKind::NumericConstant(Value::Long(42))]);
    }

    #[test]
    fn numeric_constant_hex_and_octal() {
        assert_eq!(tokens("0x1F"), vec![TokenKind::NumericConstant(Value::Long(31))]);
        assert_eq!(tokens("010"), vec![TokenKind::NumericConstant(Value::Long(8))]);
    }

    #[test]
    fn numeric_constant_double() {
        assert_eq!(tokens("3.14"), vec![TokenKind::NumericConstant(Value::Double(3.14))]);
    }

    #[test]
    fn other_name_for_non_numeric_word() {
        assert_eq!(tokens("dup"), vec![TokenKind::OtherName("dup".to_string())]);
    }

    #[test]
    fn variable_access_forms() {
        let toks = tokens("$1 #2= :@3? $4!");
        assert_eq!(
            toks,
            vec![
                TokenKind::VariableActionName(VariableAccess {
                    dup: false,
                    kind: VariableKind::Input,
                    index: 1,
                    action: VariableAction::Value,
                }),
                TokenKind::VariableActionName(VariableAccess {
                    dup: false,
                    kind: VariableKind::Memory,
                    index: 2,
                    action: VariableAction::Store,
                }),
                TokenKind::VariableActionName(VariableAccess {
                    dup: true,
                    kind: VariableKind::Param,
                    index: 3,
                    action: VariableAction::Present,
                }),
                TokenKind::VariableActionName(VariableAccess {
                    dup: false,
                    kind: VariableKind::Input,
                    index: 4,
                    action: VariableAction::Required,
                }),
            ]
        );
    }

    #[test]
    fn forth_stack_comment_is_skipped() {
        assert_eq!(tokens("1 ( this is a comment ) 2 +"), tokens("1 2 +"));
    }

    #[test]
    fn block_comment_nests() {
        assert_eq!(tokens("1 /* a /* b */ c */ 2"), tokens("1 2"));
    }

    #[test]
    fn whitespace_injection_round_trip() {
        assert_eq!(tokens("1 2 +"), tokens("1\n  2\t+"));
    }

    #[test]
    fn macro_expansion_with_default() {
        let mut macros = HashMap::new();
        let def = MacroDef::parse("dbl(x=0) $x $x +").unwrap();
        macros.insert(def.key.clone(), def);
        let mut tz = Tokenizer::new("dbl(5)", macros, 1000);
        let mut out = Vec::new();
        loop {
            let tok = tz.next_token().unwrap();
            if tok.kind == TokenKind::Eof {
                break;
            }
            out.push(tok.kind);
        }
        assert_eq!(
            out,
            vec![
                TokenKind::VariableActionName(VariableAccess {
                    dup: false,
                    kind: VariableKind::Input,
                    index: 5,
                    action: VariableAction::Value,
                }),
                TokenKind::VariableActionName(VariableAccess {
                    dup: false,
                    kind: VariableKind::Input,
                    index: 5,
                    action: VariableAction::Value,
                }),
                TokenKind::OtherName("+".to_string()),
            ]
        );
    }

    #[test]
    fn macro_expansion_limit_is_enforced() {
        let mut macros = HashMap::new();
        // A macro that expands to itself loops forever without the limit.
        let def = MacroDef::parse("loop loop").unwrap();
        macros.insert(def.key.clone(), def);
        let mut tz = Tokenizer::new("loop", macros, 5);
        let mut result = Ok(Token::new(TokenKind::Eof, SourceLocation::unknown(), ""));
        for _ in 0..10 {
            result = tz.next_token();
            if result.is_err() {
                break;
            }
        }
        assert!(result.is_err());
    }
}
