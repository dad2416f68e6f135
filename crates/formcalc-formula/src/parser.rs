//! Parse formula text into a [`Call`].
//!
//! Grammar (whitespace allowed between tokens, one optional trailing `;`):
//!
//! ```text
//! formula := ["new"] NAME "(" arg ["," arg] ")"
//! arg     := "$" NAME | "[" entry ("," entry)* "]"
//! entry   := "$" NAME | KEY "=>" "$" NAME
//! NAME    := [a-zA-Z_][a-zA-Z0-9_]*
//! KEY     := '...' | "..."          (no escapes, no interpolation)
//! ```
//!
//! Anything else is rejected as a whole with [`EvalError::MalformedFormula`];
//! there is no partial or best-effort parse. Parsing never consults the
//! registry.

use crate::types::{Arg, ArrayEntry, Call, CallKind, EvalError};

const NEW_KEYWORD: &str = "new";

/// Parse a formula.
pub fn parse(formula: &str) -> Result<Call, EvalError> {
    Parser::new(formula).formula()
}

struct Parser<'a> {
    src: &'a str,
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src,
            bytes: src.as_bytes(),
            pos: 0,
        }
    }

    fn formula(mut self) -> Result<Call, EvalError> {
        self.skip_ws();
        if self.at_end() {
            return Err(self.fail("formula is empty"));
        }

        let first = self.name("a function or constructor name")?;
        let (kind, name) = if first == NEW_KEYWORD {
            if !self.peek().is_some_and(|b| b.is_ascii_whitespace()) {
                return Err(self.fail("`new` must be followed by a constructor name"));
            }
            self.skip_ws();
            (CallKind::Constructor, self.name("a constructor name")?)
        } else {
            (CallKind::Function, first)
        };
        if name == NEW_KEYWORD {
            return Err(self.fail("`new` is reserved and cannot be called"));
        }

        self.skip_ws();
        self.expect(b'(')?;
        self.skip_ws();
        if self.peek() == Some(b')') {
            return Err(self.fail("expected at least one argument"));
        }

        let mut args = vec![self.arg()?];
        self.skip_ws();
        if self.eat(b',') {
            self.skip_ws();
            if self.peek() == Some(b')') {
                return Err(self.fail("trailing comma in argument list"));
            }
            args.push(self.arg()?);
            self.skip_ws();
            if self.peek() == Some(b',') {
                return Err(self.fail("at most two arguments are allowed"));
            }
        }
        self.expect(b')')?;

        self.skip_ws();
        if self.eat(b';') {
            self.skip_ws();
        }
        if !self.at_end() {
            let rest = &self.src[self.pos..];
            return Err(self.fail(&format!("unexpected trailing input '{}'", rest)));
        }

        Ok(Call { kind, name, args })
    }

    fn arg(&mut self) -> Result<Arg, EvalError> {
        match self.peek() {
            Some(b'$') => Ok(Arg::Ref(self.var()?)),
            Some(b'[') => self.array(),
            _ => Err(self.unexpected("a variable reference ($name) or an array literal")),
        }
    }

    fn array(&mut self) -> Result<Arg, EvalError> {
        self.pos += 1; // '['
        self.skip_ws();
        if self.peek() == Some(b']') {
            return Err(self.fail("empty array literal"));
        }

        let mut entries = Vec::new();
        loop {
            entries.push(self.entry()?);
            self.skip_ws();
            match self.peek() {
                Some(b',') => {
                    self.pos += 1;
                    self.skip_ws();
                    if self.peek() == Some(b']') {
                        return Err(self.fail("trailing comma in array literal"));
                    }
                }
                Some(b']') => {
                    self.pos += 1;
                    return Ok(Arg::Array(entries));
                }
                _ => return Err(self.unexpected("',' or ']'")),
            }
        }
    }

    fn entry(&mut self) -> Result<ArrayEntry, EvalError> {
        match self.peek() {
            Some(b'$') => Ok(ArrayEntry {
                key: None,
                var: self.var()?,
            }),
            Some(quote @ (b'\'' | b'"')) => {
                let key = self.key(quote)?;
                self.skip_ws();
                if !self.src[self.pos..].starts_with("=>") {
                    return Err(self.unexpected("'=>'"));
                }
                self.pos += 2;
                self.skip_ws();
                let var = self.var()?;
                Ok(ArrayEntry {
                    key: Some(key),
                    var,
                })
            }
            Some(b'[') => Err(self.fail("nested arrays are not supported")),
            _ => Err(self.unexpected("a variable reference or a quoted key")),
        }
    }

    /// `$name`, with no whitespace after the sigil.
    fn var(&mut self) -> Result<String, EvalError> {
        self.expect(b'$')?;
        self.name("a variable name")
    }

    fn key(&mut self, quote: u8) -> Result<String, EvalError> {
        self.pos += 1;
        let start = self.pos;
        while let Some(b) = self.peek() {
            if b == quote {
                let key = self.src[start..self.pos].to_string();
                self.pos += 1;
                return Ok(key);
            }
            if b == b'\\' {
                return Err(self.fail("escape sequences are not supported in keys"));
            }
            if quote == b'"' && b == b'$' {
                return Err(self.fail("interpolation is not supported in keys"));
            }
            self.pos += 1;
        }
        Err(self.fail("unterminated string key"))
    }

    fn name(&mut self, what: &str) -> Result<String, EvalError> {
        match self.peek() {
            Some(b) if is_name_start(b) => {
                let start = self.pos;
                self.pos += 1;
                while self.peek().is_some_and(is_name_cont) {
                    self.pos += 1;
                }
                Ok(self.src[start..self.pos].to_string())
            }
            _ => Err(self.unexpected(what)),
        }
    }

    // -- Cursor helpers ------------------------------------------------------

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn at_end(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    fn eat(&mut self, b: u8) -> bool {
        if self.peek() == Some(b) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, b: u8) -> Result<(), EvalError> {
        if self.eat(b) {
            Ok(())
        } else {
            Err(self.unexpected(&format!("'{}'", b as char)))
        }
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(|b| b.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    fn unexpected(&self, expected: &str) -> EvalError {
        let found = match self.src[self.pos..].chars().next() {
            Some(c) => format!("'{}'", c),
            None => "end of input".to_string(),
        };
        self.fail(&format!("expected {}, found {}", expected, found))
    }

    fn fail(&self, reason: &str) -> EvalError {
        EvalError::MalformedFormula {
            formula: self.src.to_string(),
            reason: format!("{} at offset {}", reason, self.pos),
        }
    }
}

fn is_name_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_'
}

fn is_name_cont(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}
