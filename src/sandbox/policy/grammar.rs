//! Parser for whitelist member declarations.
//!
//! Policies list allowed members as C#-like declarations, `"Void WriteLine(String)"` for a method
//! and `"Int32 Length"` for a field. Types accept C# keywords (`int`), CLR names (`Int32`) and
//! namespaced CLR names (`System.Int32`) for primitives, dotted names with `/` for nested types,
//! `!n` / `!!n` generic parameters, generic arguments in angle brackets and the `[]`, `[,]`, `*`
//! and `&` suffixes. A leading `ref`, `out` or `in` makes the type a managed reference.
//!
//! A method name may carry a generic arity written as `<>`/`<,>`, `<2>` or `<T, U>`.

use std::str::FromStr;

use crate::{
    file::parser::Parser,
    sandbox::{
        model::Primitive,
        policy::rules::{FieldRule, MethodRule, RuleType},
    },
    Error, Result,
};

/// Parse a method declaration
///
/// # Errors
/// Returns [`Error::Whitelist`] with the failing position if `input` is not a method declaration.
pub fn parse_method(input: &str) -> Result<MethodRule> {
    let mut parser = RuleParser::new(input);

    parser.skip_whitespace()?;
    let return_type = parser.parse_type()?;
    parser.require_whitespace()?;
    let name = parser.parse_member_name()?;
    let generic_arity = parser.parse_generic_arity()?;

    parser.skip_whitespace()?;
    parser.expect(b'(')?;
    parser.skip_whitespace()?;

    let mut params = Vec::new();
    if parser.peek() != Some(b')') {
        loop {
            params.push(parser.parse_type()?);
            parser.skip_whitespace()?;
            if parser.peek() == Some(b',') {
                parser.bump()?;
                parser.skip_whitespace()?;
                continue;
            }
            break;
        }
    }

    parser.expect(b')')?;
    parser.skip_whitespace()?;
    parser.finish()?;

    Ok(MethodRule {
        name,
        return_type,
        params,
        generic_arity,
    })
}

/// Parse a field declaration
///
/// # Errors
/// Returns [`Error::Whitelist`] with the failing position if `input` is not a field declaration.
pub fn parse_field(input: &str) -> Result<FieldRule> {
    let mut parser = RuleParser::new(input);

    parser.skip_whitespace()?;
    let field_type = parser.parse_type()?;
    parser.require_whitespace()?;
    let name = parser.parse_member_name()?;
    parser.skip_whitespace()?;
    parser.finish()?;

    Ok(FieldRule { name, field_type })
}

fn is_ident_byte(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || matches!(byte, b'_' | b'`' | b'$')
}

struct RuleParser<'a> {
    input: &'a str,
    parser: Parser<'a>,
}

impl<'a> RuleParser<'a> {
    fn new(input: &'a str) -> Self {
        RuleParser {
            input,
            parser: Parser::new(input.as_bytes()),
        }
    }

    fn error(&self, reason: impl Into<String>) -> Error {
        Error::Whitelist {
            input: self.input.to_string(),
            position: self.parser.pos(),
            reason: reason.into(),
        }
    }

    fn peek(&self) -> Option<u8> {
        self.parser.peek_byte().ok()
    }

    fn peek_at(&self, distance: usize) -> Option<u8> {
        self.input.as_bytes().get(self.parser.pos() + distance).copied()
    }

    fn bump(&mut self) -> Result<()> {
        self.parser.advance()
    }

    fn expect(&mut self, byte: u8) -> Result<()> {
        if self.peek() == Some(byte) {
            self.bump()?;
            Ok(())
        } else {
            Err(self.error(format!("expected '{}'", byte as char)))
        }
    }

    fn skip_whitespace(&mut self) -> Result<()> {
        while self.peek().is_some_and(|byte| byte.is_ascii_whitespace()) {
            self.bump()?;
        }
        Ok(())
    }

    fn require_whitespace(&mut self) -> Result<()> {
        if !self.peek().is_some_and(|byte| byte.is_ascii_whitespace()) {
            return Err(self.error("expected whitespace"));
        }
        self.skip_whitespace()?;
        Ok(())
    }

    fn finish(&self) -> Result<()> {
        if self.parser.has_more_data() {
            return Err(self.error("unexpected trailing input"));
        }
        Ok(())
    }

    fn take_while(&mut self, predicate: impl Fn(u8) -> bool) -> Result<&'a str> {
        let start = self.parser.pos();
        while self.peek().is_some_and(&predicate) {
            self.bump()?;
        }
        Ok(&self.input[start..self.parser.pos()])
    }

    fn parse_ident(&mut self) -> Result<&'a str> {
        let ident = self.take_while(is_ident_byte)?;
        if ident.is_empty() {
            return Err(self.error("expected identifier"));
        }
        Ok(ident)
    }

    fn parse_number(&mut self) -> Result<u32> {
        let digits = self.take_while(|byte| byte.is_ascii_digit())?;
        digits
            .parse::<u32>()
            .map_err(|_| self.error("expected number"))
    }

    fn parse_member_name(&mut self) -> Result<String> {
        let name = self.take_while(|byte| is_ident_byte(byte) || byte == b'.')?;
        if name.is_empty() {
            return Err(self.error("expected member name"));
        }
        Ok(name.to_string())
    }

    fn parse_generic_arity(&mut self) -> Result<u32> {
        if self.peek() != Some(b'<') {
            return Ok(0);
        }
        self.bump()?;
        self.skip_whitespace()?;

        let arity = match self.peek() {
            Some(byte) if byte.is_ascii_digit() => self.parse_number()?,
            Some(b',' | b'>') => {
                let mut commas = 0;
                while self.peek() == Some(b',') {
                    commas += 1;
                    self.bump()?;
                    self.skip_whitespace()?;
                }
                commas + 1
            }
            _ => {
                let mut count = 1;
                self.parse_ident()?;
                self.skip_whitespace()?;
                while self.peek() == Some(b',') {
                    self.bump()?;
                    self.skip_whitespace()?;
                    self.parse_ident()?;
                    self.skip_whitespace()?;
                    count += 1;
                }
                count
            }
        };

        self.skip_whitespace()?;
        self.expect(b'>')?;
        Ok(arity)
    }

    fn parse_type(&mut self) -> Result<RuleType> {
        for keyword in ["ref", "out", "in"] {
            let follows_space = self
                .peek_at(keyword.len())
                .is_some_and(|byte| byte.is_ascii_whitespace());
            if follows_space && self.input[self.parser.pos()..].starts_with(keyword) {
                self.parser.advance_by(keyword.len())?;
                self.skip_whitespace()?;
                return Ok(RuleType::ByRef(Box::new(self.parse_array()?)));
            }
        }

        self.parse_array()
    }

    fn parse_array(&mut self) -> Result<RuleType> {
        let mut current = self.parse_base()?;

        loop {
            match self.peek() {
                Some(b'*') => {
                    self.bump()?;
                    current = RuleType::Pointer(Box::new(current));
                }
                Some(b'&') => {
                    self.bump()?;
                    current = RuleType::ByRef(Box::new(current));
                }
                Some(b'[') => {
                    self.bump()?;
                    let mut commas = 0;
                    while self.peek() == Some(b',') {
                        commas += 1;
                        self.bump()?;
                    }
                    self.expect(b']')?;
                    current = if commas == 0 {
                        RuleType::SzArray(Box::new(current))
                    } else {
                        RuleType::Array {
                            element: Box::new(current),
                            rank: commas + 1,
                        }
                    };
                }
                _ => return Ok(current),
            }
        }
    }

    fn parse_base(&mut self) -> Result<RuleType> {
        if self.peek() == Some(b'!') {
            self.bump()?;
            if self.peek() == Some(b'!') {
                self.bump()?;
                return Ok(RuleType::MethodParam(self.parse_number()?));
            }
            return Ok(RuleType::TypeParam(self.parse_number()?));
        }

        let mut segments = vec![self.parse_ident()?];
        while self.peek() == Some(b'.') && self.peek_at(1).is_some_and(is_ident_byte) {
            self.bump()?;
            segments.push(self.parse_ident()?);
        }

        let mut nested = Vec::new();
        while self.peek() == Some(b'/') {
            self.bump()?;
            nested.push(self.parse_ident()?);
        }

        if nested.is_empty() {
            if let Ok(primitive) = Primitive::from_str(&segments.join(".")) {
                return Ok(RuleType::Primitive(primitive));
            }
        }

        let name = segments.pop().unwrap_or_default();
        let mut path = vec![name.to_string()];
        path.extend(nested.iter().map(ToString::to_string));
        let named = RuleType::Named {
            namespace: segments.join("."),
            path,
        };

        if self.peek() != Some(b'<') {
            return Ok(named);
        }

        self.bump()?;
        let mut args = Vec::new();
        loop {
            self.skip_whitespace()?;
            args.push(self.parse_type()?);
            self.skip_whitespace()?;
            if self.peek() == Some(b',') {
                self.bump()?;
                continue;
            }
            break;
        }
        self.expect(b'>')?;

        Ok(RuleType::Generic {
            base: Box::new(named),
            args,
        })
    }
}
