// File: src/macros.rs
//
// Macro definitions and the (token-stream-agnostic) expansion logic the
// Tokenizer drives. A MacroDef only knows its own shape (name, formal
// parameters, body text); argument collection from the live token stream —
// reading `(`, splitting on top-level commas, matching the closing `)` — is
// the Tokenizer's job, since only it holds the lexer stack the arguments are
// read from. This module supplies the pure, testable parts: parsing a macro
// definition's text, mapping collected argument strings onto formals, and
// substituting the result into the macro body.

use crate::errors::{CompileError, CompileErrorKind, SourceLocation};
use crate::lexer::Lexer;

/// What an unsupplied formal parameter expands to.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamDefault {
    /// `name` with no `=`/`!` suffix: expands to the empty string when
    /// no argument is supplied.
    Optional,
    /// `name=literal`: expands to `literal` when no argument is supplied.
    Literal(String),
    /// `name!`: a compile error if no argument is supplied.
    Required,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FormalParam {
    pub name: String,
    pub default: ParamDefault,
    /// True only for the literal `...` formal, which must be last.
    pub variadic: bool,
}

/// A parsed macro definition: `name (p1, p2=lit, p3!, ...) body...` or, for
/// a parameterless macro, `name body...` (the body is the remainder of the
/// definition's line/text).
#[derive(Debug, Clone, PartialEq)]
pub struct MacroDef {
    /// The name the Tokenizer looks up. Parameterized macros are keyed with
    /// a trailing `(` so a bare reference to the same name without
    /// parentheses does not match (spec §4.2: "the key stored for
    /// parenthesized macros ends in '('").
    pub key: String,
    pub params: Vec<FormalParam>,
    pub body: String,
}

impl MacroDef {
    pub fn name(&self) -> &str {
        self.key.trim_end_matches('(')
    }

    pub fn is_parameterized(&self) -> bool {
        self.key.ends_with('(')
    }

    /// Parses one macro definition's source text, e.g. `"dbl(x=0) $x $x +"`
    /// or a parameterless `"now $5"`.
    pub fn parse(text: &str) -> Result<MacroDef, CompileError> {
        let mut lx = Lexer::new(text);
        lx.skip_whitespace()?;
        let (name, name_loc) = lx.read_word();
        if name.is_empty() {
            return Err(CompileError::at(CompileErrorKind::EmptyMacro, name_loc));
        }

        lx.skip_whitespace()?;
        if lx.current_char() != Some('(') {
            // Parameterless macro: everything remaining is the body.
            let body = remaining_text(&mut lx);
            return Ok(MacroDef { key: name, params: Vec::new(), body });
        }

        lx.advance(); // consume '('
        let mut params = Vec::new();
        loop {
            lx.skip_whitespace()?;
            match lx.current_char() {
                Some(')') => {
                    lx.advance();
                    break;
                }
                None => {
                    return Err(CompileError::at(CompileErrorKind::RightParenthesis, name_loc));
                }
                _ => {}
            }
            let (param, param_loc) = read_param_token(&mut lx);
            let formal = parse_formal_param(&param, param_loc)?;
            let is_variadic = formal.variadic;
            params.push(formal);
            lx.skip_whitespace()?;
            match lx.current_char() {
                Some(',') => {
                    if is_variadic {
                        return Err(CompileError::at(CompileErrorKind::EllipsisLast, param_loc));
                    }
                    lx.advance();
                }
                Some(')') => {
                    lx.advance();
                    break;
                }
                _ => return Err(CompileError::at(CompileErrorKind::RightParenthesis, name_loc)),
            }
        }

        let body = remaining_text(&mut lx);
        let key = format!("{}(", name);
        Ok(MacroDef { key, params, body })
    }

    /// Maps collected argument strings onto formal parameters, producing a
    /// `(formal name, substitution text)` list. See spec §4.2 for the
    /// arity rules.
    pub fn map(&self, args: &[String]) -> Result<Vec<(String, String)>, CompileError> {
        let mut mapping = Vec::new();
        let has_variadic = self.params.last().map(|p| p.variadic).unwrap_or(false);
        let fixed_count = if has_variadic { self.params.len() - 1 } else { self.params.len() };

        if args.len() > self.params.len() && !has_variadic {
            return Err(CompileError::at(CompileErrorKind::MacroArgs, SourceLocation::unknown()));
        }

        for (i, param) in self.params.iter().enumerate().take(fixed_count) {
            let value = if i < args.len() {
                args[i].clone()
            } else {
                match &param.default {
                    ParamDefault::Optional => String::new(),
                    ParamDefault::Literal(lit) => lit.clone(),
                    ParamDefault::Required => {
                        return Err(CompileError::at(CompileErrorKind::MacroArg, SourceLocation::unknown()));
                    }
                }
            };
            mapping.push((param.name.clone(), value));
        }

        if has_variadic {
            let variadic = self.params.last().unwrap();
            let tail = if args.len() > fixed_count { args[fixed_count..].join(",") } else { String::new() };
            mapping.push((variadic.name.clone(), tail));
        }

        Ok(mapping)
    }

    /// Textually substitutes each mapped formal with its value, skipping
    /// quoted-string contents so substitution never rewrites string
    /// literals. Word matching is whole-word and case-sensitive.
    pub fn substitute(&self, mapping: &[(String, String)]) -> String {
        substitute_text(&self.body, mapping)
    }
}

fn remaining_text(lx: &mut Lexer) -> String {
    let mut out = String::new();
    while let Some(c) = lx.advance() {
        out.push(c);
    }
    out
}

/// Reads one formal-parameter token: a name optionally followed immediately
/// by `!`, `=literal`, or is the literal `...`.
fn read_param_token(lx: &mut Lexer) -> (String, SourceLocation) {
    let start = lx.position();
    let mut out = String::new();
    if lx.current_char() == Some('.')
        && lx.peek_char(1) == Some('.')
        && lx.peek_char(2) == Some('.')
    {
        lx.advance();
        lx.advance();
        lx.advance();
        return ("...".to_string(), start);
    }
    while let Some(c) = lx.current_char() {
        if c.is_whitespace() || c == ',' || c == ')' {
            break;
        }
        out.push(c);
        lx.advance();
    }
    (out, start)
}

fn parse_formal_param(token: &str, loc: SourceLocation) -> Result<FormalParam, CompileError> {
    if token == "..." {
        return Ok(FormalParam { name: "...".to_string(), default: ParamDefault::Optional, variadic: true });
    }
    if let Some(name) = token.strip_suffix('!') {
        if name.is_empty() {
            return Err(CompileError::at(CompileErrorKind::EmptyMacroParamName, loc));
        }
        return Ok(FormalParam { name: name.to_string(), default: ParamDefault::Required, variadic: false });
    }
    if let Some(eq) = token.find('=') {
        let (name, lit) = token.split_at(eq);
        if name.is_empty() {
            return Err(CompileError::at(CompileErrorKind::EmptyMacroParamName, loc));
        }
        return Ok(FormalParam {
            name: name.to_string(),
            default: ParamDefault::Literal(lit[1..].to_string()),
            variadic: false,
        });
    }
    if token.is_empty() {
        return Err(CompileError::at(CompileErrorKind::EmptyMacroParamName, loc));
    }
    Ok(FormalParam { name: token.to_string(), default: ParamDefault::Optional, variadic: false })
}

/// Substitutes each occurrence of a formal's name, where "occurrence" means
/// a maximal run of identifier characters (alphanumeric/`_`) that exactly
/// equals the formal name, or — for the variadic formal — the literal `...`
/// sequence. This lets a formal named `x` match the `x` inside `$x` (the
/// `$` is not an identifier character, so it is not absorbed into the run)
/// while never touching the inside of a quoted string.
fn substitute_text(body: &str, mapping: &[(String, String)]) -> String {
    let has_variadic = mapping.iter().any(|(name, _)| name == "...");
    let mut lx = Lexer::new(body);
    let mut out = String::new();
    loop {
        match lx.current_char() {
            None => break,
            Some('"') | Some('\'') => {
                let quote = lx.current_char().unwrap();
                out.push(quote);
                lx.advance();
                while let Some(c) = lx.current_char() {
                    out.push(c);
                    lx.advance();
                    if c == quote {
                        break;
                    }
                    if c == '\\' {
                        if let Some(escaped) = lx.current_char() {
                            out.push(escaped);
                            lx.advance();
                        }
                    }
                }
            }
            Some('.') if has_variadic && lx.peek_char(1) == Some('.') && lx.peek_char(2) == Some('.') => {
                lx.advance();
                lx.advance();
                lx.advance();
                if let Some((_, value)) = mapping.iter().find(|(name, _)| name == "...") {
                    out.push_str(value);
                } else {
                    out.push_str("...");
                }
            }
            Some(c) if is_ident_char(c) => {
                let mut word = String::new();
                while let Some(c) = lx.current_char() {
                    if !is_ident_char(c) {
                        break;
                    }
                    word.push(c);
                    lx.advance();
                }
                match mapping.iter().find(|(name, _)| *name == word) {
                    Some((_, value)) => out.push_str(value),
                    None => out.push_str(&word),
                }
            }
            Some(c) => {
                out.push(c);
                lx.advance();
            }
        }
    }
    out
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_parameterless_macro() {
        let def = MacroDef::parse("now $5").unwrap();
        assert_eq!(def.key, "now");
        assert!(def.params.is_empty());
        assert_eq!(def.body.trim(), "$5");
    }

    #[test]
    fn parses_parameterized_macro_with_default() {
        let def = MacroDef::parse("dbl(x=0) $x $x +").unwrap();
        assert_eq!(def.key, "dbl(");
        assert_eq!(def.params.len(), 1);
        assert_eq!(def.params[0].name, "x");
        assert_eq!(def.params[0].default, ParamDefault::Literal("0".to_string()));
        assert_eq!(def.body.trim(), "$x $x +");
    }

    #[test]
    fn map_uses_default_when_arg_missing() {
        let def = MacroDef::parse("dbl(x=0) $x $x +").unwrap();
        let mapping = def.map(&[]).unwrap();
        assert_eq!(mapping, vec![("x".to_string(), "0".to_string())]);
    }

    #[test]
    fn map_required_without_arg_fails() {
        let def = MacroDef::parse("need(x!) $x").unwrap();
        assert!(def.map(&[]).is_err());
    }

    #[test]
    fn variadic_tail_concatenates_remaining_args() {
        let def = MacroDef::parse("pack(first, ...) $first").unwrap();
        let mapping = def.map(&["1".to_string(), "2".to_string(), "3".to_string()]).unwrap();
        assert_eq!(mapping[0], ("first".to_string(), "1".to_string()));
        assert_eq!(mapping[1], ("...".to_string(), "2,3".to_string()));
    }

    #[test]
    fn too_many_args_without_variadic_fails() {
        let def = MacroDef::parse("one(x) $x").unwrap();
        assert!(def.map(&["1".to_string(), "2".to_string()]).is_err());
    }

    #[test]
    fn substitution_skips_quoted_text() {
        let def = MacroDef::parse("greet(x) \"hello x\" $x").unwrap();
        let mapping = def.map(&["5".to_string()]).unwrap();
        let expanded = def.substitute(&mapping);
        assert_eq!(expanded.trim(), "\"hello x\" $5");
    }

    #[test]
    fn substitution_replaces_whole_words_only() {
        let def = MacroDef::parse("dbl(x=0) $x $x +").unwrap();
        let mapping = def.map(&["5".to_string()]).unwrap();
        let expanded = def.substitute(&mapping);
        assert_eq!(expanded.trim(), "$5 $5 +");
    }
}
