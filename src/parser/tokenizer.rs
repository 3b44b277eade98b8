// Copyright 2024 OctoFHIR Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Zero-copy tokenizer for the inside of EL evaluation blocks

use crate::error::{ElError, Result};
use unicode_xid::UnicodeXID;

/// Token borrowed from the input text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token<'input> {
    // Literals - numbers are kept as slices and parsed by the parser
    /// Integer literal (e.g. 42)
    Integer(&'input str),
    /// Floating point literal (e.g. 3.14, 1e10)
    Floating(&'input str),
    /// String literal contents without quotes, escapes unresolved
    String(&'input str),
    /// `true`
    True,
    /// `false`
    False,
    /// `null`
    Null,

    /// Identifier
    Identifier(&'input str),

    /// Addition operator (+)
    Plus,
    /// Subtraction or negation operator (-)
    Minus,
    /// Multiplication operator (*)
    Multiply,
    /// Division operator (/ or div)
    Divide,
    /// Remainder operator (% or mod)
    Modulo,
    /// Equality operator (== or eq)
    Equal,
    /// Inequality operator (!= or ne)
    NotEqual,
    /// Less than operator (< or lt)
    LessThan,
    /// Less than or equal operator (<= or le)
    LessThanOrEqual,
    /// Greater than operator (> or gt)
    GreaterThan,
    /// Greater than or equal operator (>= or ge)
    GreaterThanOrEqual,
    /// Logical AND (&& or and)
    And,
    /// Logical OR (|| or or)
    Or,
    /// Logical NOT (! or not)
    Not,
    /// Emptiness operator (empty)
    Empty,
    /// Conditional operator (?)
    Question,
    /// Colon (:) for conditionals and function prefixes
    Colon,
    /// Dot (.) for property access
    Dot,
    /// Comma separator (,)
    Comma,
    /// Left parenthesis (
    LeftParen,
    /// Right parenthesis )
    RightParen,
    /// Left square bracket [
    LeftBracket,
    /// Right square bracket ]
    RightBracket,
    /// Right curly brace } closing an evaluation block
    RightBrace,
}

/// Keyword lookup; keywords are never identifiers
#[inline(always)]
fn keyword_lookup(word: &str) -> Option<Token<'static>> {
    let token = match word {
        "true" => Token::True,
        "false" => Token::False,
        "null" => Token::Null,
        "and" => Token::And,
        "or" => Token::Or,
        "not" => Token::Not,
        "empty" => Token::Empty,
        "div" => Token::Divide,
        "mod" => Token::Modulo,
        "eq" => Token::Equal,
        "ne" => Token::NotEqual,
        "lt" => Token::LessThan,
        "gt" => Token::GreaterThan,
        "le" => Token::LessThanOrEqual,
        "ge" => Token::GreaterThanOrEqual,
        _ => return None,
    };
    Some(token)
}

/// Tokenizer over the text of an evaluation block
///
/// The tokenizer starts at an arbitrary byte offset so that the parser can
/// hand it the inside of a `${...}` block and continue scanning literal text
/// after the closing brace.
#[derive(Clone)]
pub struct Tokenizer<'input> {
    input: &'input str,
    bytes: &'input [u8],
    pos: usize,
    token_start: usize,
}

impl<'input> Tokenizer<'input> {
    /// Create a tokenizer positioned at the start of `input`
    #[inline]
    pub fn new(input: &'input str) -> Self {
        Self::at(input, 0)
    }

    /// Create a tokenizer positioned at byte offset `pos`
    #[inline]
    pub fn at(input: &'input str, pos: usize) -> Self {
        Self {
            input,
            bytes: input.as_bytes(),
            pos,
            token_start: pos,
        }
    }

    /// Byte offset just past the last token returned
    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Byte offset where the last token returned starts
    #[inline]
    pub fn token_start(&self) -> usize {
        self.token_start
    }

    #[inline(always)]
    fn peek_byte(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    #[inline(always)]
    fn peek_char(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    #[inline(always)]
    fn is_id_start(ch: char) -> bool {
        ch == '_' || ch == '$' || UnicodeXID::is_xid_start(ch)
    }

    #[inline(always)]
    fn is_id_continue(ch: char) -> bool {
        ch == '$' || UnicodeXID::is_xid_continue(ch)
    }

    #[inline]
    fn skip_whitespace(&mut self) {
        while let Some(b' ' | b'\t' | b'\r' | b'\n') = self.peek_byte(0) {
            self.pos += 1;
        }
    }

    fn skip_digits(&mut self) {
        while self.peek_byte(0).is_some_and(|b| b.is_ascii_digit()) {
            self.pos += 1;
        }
    }

    /// Numbers: `digits`, `digits.digits?`, with an optional exponent
    fn parse_number(&mut self) -> Token<'input> {
        let start = self.pos;
        self.skip_digits();

        let mut floating = false;
        if self.peek_byte(0) == Some(b'.') && self.peek_byte(1).is_some_and(|b| b.is_ascii_digit())
        {
            floating = true;
            self.pos += 1;
            self.skip_digits();
        }

        if let Some(b'e' | b'E') = self.peek_byte(0) {
            let digits_at = match self.peek_byte(1) {
                Some(b'+' | b'-') => 2,
                _ => 1,
            };
            if self.peek_byte(digits_at).is_some_and(|b| b.is_ascii_digit()) {
                floating = true;
                self.pos += digits_at;
                self.skip_digits();
            }
        }

        let text = &self.input[start..self.pos];
        if floating {
            Token::Floating(text)
        } else {
            Token::Integer(text)
        }
    }

    fn parse_identifier(&mut self) -> &'input str {
        let start = self.pos;
        while let Some(ch) = self.peek_char() {
            if !Self::is_id_continue(ch) {
                break;
            }
            self.pos += ch.len_utf8();
        }
        &self.input[start..self.pos]
    }

    fn parse_string_literal(&mut self, quote: u8) -> Result<&'input str> {
        self.pos += 1;
        let start = self.pos;

        while let Some(byte) = self.peek_byte(0) {
            match byte {
                b'\\' => self.pos += if self.peek_byte(1).is_some() { 2 } else { 1 },
                b if b == quote => {
                    let content = &self.input[start..self.pos];
                    self.pos += 1;
                    return Ok(content);
                }
                _ => self.pos += 1,
            }
        }

        Err(ElError::parse(start - 1, "Unterminated string literal"))
    }

    /// Operator made of one or two bytes, the second being optional
    #[inline]
    fn operator(&mut self, single: Token<'input>, second: u8, double: Token<'input>) -> Token<'input> {
        if self.peek_byte(1) == Some(second) {
            self.pos += 2;
            double
        } else {
            self.pos += 1;
            single
        }
    }

    /// Return the next token, or `None` at the end of input
    pub fn next_token(&mut self) -> Result<Option<Token<'input>>> {
        self.skip_whitespace();
        self.token_start = self.pos;

        let Some(byte) = self.peek_byte(0) else {
            return Ok(None);
        };

        let token = match byte {
            b'.' => {
                self.pos += 1;
                Token::Dot
            }
            b'(' => {
                self.pos += 1;
                Token::LeftParen
            }
            b')' => {
                self.pos += 1;
                Token::RightParen
            }
            b'[' => {
                self.pos += 1;
                Token::LeftBracket
            }
            b']' => {
                self.pos += 1;
                Token::RightBracket
            }
            b'}' => {
                self.pos += 1;
                Token::RightBrace
            }
            b',' => {
                self.pos += 1;
                Token::Comma
            }
            b'?' => {
                self.pos += 1;
                Token::Question
            }
            b':' => {
                self.pos += 1;
                Token::Colon
            }
            b'+' => {
                self.pos += 1;
                Token::Plus
            }
            b'-' => {
                self.pos += 1;
                Token::Minus
            }
            b'*' => {
                self.pos += 1;
                Token::Multiply
            }
            b'/' => {
                self.pos += 1;
                Token::Divide
            }
            b'%' => {
                self.pos += 1;
                Token::Modulo
            }
            b'<' => self.operator(Token::LessThan, b'=', Token::LessThanOrEqual),
            b'>' => self.operator(Token::GreaterThan, b'=', Token::GreaterThanOrEqual),
            b'!' => self.operator(Token::Not, b'=', Token::NotEqual),
            b'=' if self.peek_byte(1) == Some(b'=') => {
                self.pos += 2;
                Token::Equal
            }
            b'&' if self.peek_byte(1) == Some(b'&') => {
                self.pos += 2;
                Token::And
            }
            b'|' if self.peek_byte(1) == Some(b'|') => {
                self.pos += 2;
                Token::Or
            }
            b'\'' | b'"' => Token::String(self.parse_string_literal(byte)?),
            b'0'..=b'9' => self.parse_number(),
            _ => match self.peek_char() {
                Some(ch) if Self::is_id_start(ch) => {
                    let word = self.parse_identifier();
                    keyword_lookup(word).unwrap_or(Token::Identifier(word))
                }
                Some(ch) => {
                    return Err(ElError::parse(
                        self.pos,
                        format!("Unexpected character '{ch}'"),
                    ));
                }
                None => return Ok(None),
            },
        };

        Ok(Some(token))
    }
}

/// Resolve the escapes of a string literal body
///
/// `\\`, `\'` and `\"` stand for the escaped character; any other backslash
/// is kept as is.
pub fn unescape_string(raw: &str) -> String {
    let mut result = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            if let Some(&next @ ('\\' | '\'' | '"')) = chars.peek() {
                result.push(next);
                chars.next();
                continue;
            }
        }
        result.push(ch);
    }
    result
}
