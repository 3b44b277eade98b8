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

//! Pratt parser for EL expressions and the literal text around them

use super::identifier::IdentifierPolicy;
use super::tokenizer::{Token, Tokenizer, unescape_string};
use crate::ast::{Arguments, BinaryOperator, ExpressionNode, LiteralValue, UnaryOperator};
use crate::error::{ElError, Result};

/// Operator precedence levels (higher = tighter binding)
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
    /// Lowest precedence - conditional `?:` (right associative)
    Ternary = 1,
    /// Logical OR (`||`, `or`)
    Or = 2,
    /// Logical AND (`&&`, `and`)
    And = 3,
    /// Equality operators (`==`, `!=`, `eq`, `ne`)
    Equality = 4,
    /// Relational operators (`<`, `>`, `<=`, `>=` and their keywords)
    Relational = 5,
    /// Additive operators (`+`, `-`)
    Additive = 6,
    /// Multiplicative operators (`*`, `/`, `div`, `%`, `mod`)
    Multiplicative = 7,
    /// Unary operators (`-`, `!`, `not`, `empty`)
    Unary = 8,
    /// Invocation/Indexing (`.`, `[]`)
    Invocation = 9,
}

impl Precedence {
    /// Get the next higher precedence level for left-associative operators
    #[inline(always)]
    pub const fn next_level(self) -> Self {
        match self {
            Precedence::Ternary => Precedence::Or,
            Precedence::Or => Precedence::And,
            Precedence::And => Precedence::Equality,
            Precedence::Equality => Precedence::Relational,
            Precedence::Relational => Precedence::Additive,
            Precedence::Additive => Precedence::Multiplicative,
            Precedence::Multiplicative => Precedence::Unary,
            Precedence::Unary => Precedence::Invocation,
            Precedence::Invocation => Precedence::Invocation,
        }
    }
}

/// Precedence of a token in infix position
#[inline(always)]
fn get_precedence(token: &Token<'_>) -> Option<Precedence> {
    match token {
        Token::Equal | Token::NotEqual => Some(Precedence::Equality),
        Token::Plus | Token::Minus => Some(Precedence::Additive),
        Token::And => Some(Precedence::And),
        Token::Or => Some(Precedence::Or),
        Token::Multiply | Token::Divide | Token::Modulo => Some(Precedence::Multiplicative),
        Token::LessThan
        | Token::LessThanOrEqual
        | Token::GreaterThan
        | Token::GreaterThanOrEqual => Some(Precedence::Relational),
        Token::Question => Some(Precedence::Ternary),
        _ => None,
    }
}

#[inline(always)]
fn token_to_binary_op(token: &Token<'_>) -> Option<BinaryOperator> {
    match token {
        Token::Equal => Some(BinaryOperator::Equal),
        Token::NotEqual => Some(BinaryOperator::NotEqual),
        Token::Plus => Some(BinaryOperator::Add),
        Token::Minus => Some(BinaryOperator::Subtract),
        Token::And => Some(BinaryOperator::And),
        Token::Or => Some(BinaryOperator::Or),
        Token::LessThan => Some(BinaryOperator::LessThan),
        Token::LessThanOrEqual => Some(BinaryOperator::LessThanOrEqual),
        Token::GreaterThan => Some(BinaryOperator::GreaterThan),
        Token::GreaterThanOrEqual => Some(BinaryOperator::GreaterThanOrEqual),
        Token::Multiply => Some(BinaryOperator::Multiply),
        Token::Divide => Some(BinaryOperator::Divide),
        Token::Modulo => Some(BinaryOperator::Modulo),
        _ => None,
    }
}

/// Pratt parser for the expression inside one evaluation block
///
/// ### Precedence Levels (highest to lowest):
/// - **Invocation** (9): `.`, `[]`
/// - **Unary** (8): `-`, `!`, `not`, `empty`
/// - **Multiplicative** (7): `*`, `/`, `div`, `%`, `mod`
/// - **Additive** (6): `+`, `-`
/// - **Relational** (5): `<`, `>`, `<=`, `>=`, `lt`, `gt`, `le`, `ge`
/// - **Equality** (4): `==`, `!=`, `eq`, `ne`
/// - **And** (3): `&&`, `and`
/// - **Or** (2): `||`, `or`
/// - **Ternary** (1): `?:` (right-associative)
pub struct PrattParser<'input> {
    tokenizer: Tokenizer<'input>,
    current_token: Option<Token<'input>>,
    policy: IdentifierPolicy,
}

impl<'input> PrattParser<'input> {
    /// Create a parser over the whole of `input`
    pub fn new(input: &'input str, policy: IdentifierPolicy) -> Self {
        Self::at(input, 0, policy)
    }

    /// Create a parser starting at byte offset `pos`
    pub fn at(input: &'input str, pos: usize, policy: IdentifierPolicy) -> Self {
        Self {
            tokenizer: Tokenizer::at(input, pos),
            current_token: None,
            policy,
        }
    }

    #[inline(always)]
    fn advance(&mut self) -> Result<()> {
        self.current_token = self.tokenizer.next_token()?;
        Ok(())
    }

    #[inline(always)]
    fn current(&self) -> Option<&Token<'input>> {
        self.current_token.as_ref()
    }

    /// Offset of the current token, used for error positions
    #[inline(always)]
    fn position(&self) -> usize {
        self.tokenizer.token_start()
    }

    fn error(&self, message: impl Into<String>) -> ElError {
        ElError::parse(self.position(), message)
    }

    fn expect(&mut self, expected: Token<'input>) -> Result<()> {
        match &self.current_token {
            Some(token) if std::mem::discriminant(token) == std::mem::discriminant(&expected) => {
                self.advance()
            }
            Some(token) => Err(self.error(format!("Expected {expected:?}, found {token:?}"))),
            None => Err(self.error(format!(
                "Unexpected end of input, expected {expected:?}"
            ))),
        }
    }

    fn check_identifier(&self, name: &str) -> Result<()> {
        if self.policy.is_identifier(Some(name)) {
            Ok(())
        } else {
            Err(self.error(format!("'{name}' is not a valid identifier")))
        }
    }

    /// Whether the tokens after the current identifier read `: name (`
    fn at_prefixed_function(&self) -> Result<bool> {
        let mut lookahead = self.tokenizer.clone();
        if lookahead.next_token()? != Some(Token::Colon) {
            return Ok(false);
        }
        if !matches!(lookahead.next_token()?, Some(Token::Identifier(_))) {
            return Ok(false);
        }
        Ok(lookahead.next_token()? == Some(Token::LeftParen))
    }

    fn parse_primary(&mut self) -> Result<ExpressionNode> {
        match self.current().copied() {
            Some(Token::Identifier(name)) => {
                self.check_identifier(name)?;
                if self.at_prefixed_function()? {
                    self.advance()?; // identifier
                    self.advance()?; // colon
                    let local_name = match self.current().copied() {
                        Some(Token::Identifier(local)) => local,
                        _ => return Err(self.error("Expected function name after ':'")),
                    };
                    self.check_identifier(local_name)?;
                    self.advance()?;
                    let args = self.parse_arguments()?;
                    return Ok(ExpressionNode::function_call(name, local_name, args));
                }
                self.advance()?;
                if let Some(Token::LeftParen) = self.current() {
                    let args = self.parse_arguments()?;
                    Ok(ExpressionNode::function_call("", name, args))
                } else {
                    Ok(ExpressionNode::identifier(name))
                }
            }

            Some(Token::Integer(text)) => {
                let value = text
                    .parse::<i64>()
                    .map_err(|_| self.error(format!("Integer literal out of range: {text}")))?;
                self.advance()?;
                Ok(ExpressionNode::literal(LiteralValue::Long(value)))
            }

            Some(Token::Floating(text)) => {
                self.advance()?;
                Ok(ExpressionNode::literal(LiteralValue::Floating(
                    text.to_string(),
                )))
            }

            Some(Token::String(raw)) => {
                self.advance()?;
                Ok(ExpressionNode::literal(LiteralValue::String(
                    unescape_string(raw),
                )))
            }

            Some(Token::True) => {
                self.advance()?;
                Ok(ExpressionNode::literal(LiteralValue::Boolean(true)))
            }
            Some(Token::False) => {
                self.advance()?;
                Ok(ExpressionNode::literal(LiteralValue::Boolean(false)))
            }
            Some(Token::Null) => {
                self.advance()?;
                Ok(ExpressionNode::literal(LiteralValue::Null))
            }

            Some(Token::LeftParen) => {
                self.advance()?;
                let expr = self.parse_expression_with_precedence(Precedence::Ternary)?;
                self.expect(Token::RightParen)?;
                Ok(expr)
            }

            // Unary operators
            Some(Token::Minus) => self.parse_unary(UnaryOperator::Negate),
            Some(Token::Not) => self.parse_unary(UnaryOperator::Not),
            Some(Token::Empty) => self.parse_unary(UnaryOperator::Empty),

            None => Err(self.error("Unexpected end of input")),
            Some(token) => Err(self.error(format!("Unexpected token: {token:?}"))),
        }
    }

    fn parse_unary(&mut self, op: UnaryOperator) -> Result<ExpressionNode> {
        self.advance()?;
        let operand = self.parse_expression_with_precedence(Precedence::Unary)?;
        Ok(ExpressionNode::unary_op(op, operand))
    }

    /// Parse `( args )`; the current token must be the opening parenthesis
    fn parse_arguments(&mut self) -> Result<Arguments> {
        self.expect(Token::LeftParen)?;
        let mut args = Arguments::new();

        if let Some(Token::RightParen) = self.current() {
            self.advance()?;
            return Ok(args);
        }

        loop {
            args.push(self.parse_expression_with_precedence(Precedence::Ternary)?);
            match self.current() {
                Some(Token::Comma) => self.advance()?,
                Some(Token::RightParen) => {
                    self.advance()?;
                    break;
                }
                _ => return Err(self.error("Expected ',' or ')' in argument list")),
            }
        }

        Ok(args)
    }

    /// Parse postfix expressions (property access, method calls, indexing)
    fn parse_postfix(&mut self, mut left: ExpressionNode) -> Result<ExpressionNode> {
        loop {
            match self.current() {
                Some(Token::Dot) => {
                    self.advance()?;
                    let name = match self.current().copied() {
                        Some(Token::Identifier(name)) => name,
                        _ => return Err(self.error("Expected property name after '.'")),
                    };
                    self.check_identifier(name)?;
                    self.advance()?;
                    left = if let Some(Token::LeftParen) = self.current() {
                        let args = self.parse_arguments()?;
                        ExpressionNode::method_call(left, name, args)
                    } else {
                        ExpressionNode::property(left, name)
                    };
                }
                Some(Token::LeftBracket) => {
                    self.advance()?;
                    let index = self.parse_expression_with_precedence(Precedence::Ternary)?;
                    self.expect(Token::RightBracket)?;
                    left = ExpressionNode::index(left, index);
                }
                _ => break,
            }
        }
        Ok(left)
    }

    fn parse_expression_with_precedence(
        &mut self,
        min_precedence: Precedence,
    ) -> Result<ExpressionNode> {
        let mut left = self.parse_primary()?;
        left = self.parse_postfix(left)?;

        while let Some(current_token) = self.current().copied() {
            let precedence = match get_precedence(&current_token) {
                Some(prec) if prec >= min_precedence => prec,
                _ => break,
            };

            if let Token::Question = current_token {
                self.advance()?;
                let then_expr = self.parse_expression_with_precedence(Precedence::Ternary)?;
                self.expect(Token::Colon)?;
                let else_expr = self.parse_expression_with_precedence(Precedence::Ternary)?;
                left = ExpressionNode::conditional(left, then_expr, else_expr);
                continue;
            }

            let Some(op) = token_to_binary_op(&current_token) else {
                break;
            };
            self.advance()?;
            let right = self.parse_expression_with_precedence(precedence.next_level())?;
            left = ExpressionNode::binary_op(op, left, right);
        }

        Ok(left)
    }

    /// Parse a complete expression; the whole input must be consumed
    pub fn parse(&mut self) -> Result<ExpressionNode> {
        self.advance()?;
        let expr = self.parse_expression_with_precedence(Precedence::Ternary)?;
        if let Some(token) = self.current() {
            return Err(self.error(format!("Unexpected token: {token:?}")));
        }
        Ok(expr)
    }

    /// Parse the body of an evaluation block up to its closing `}`
    ///
    /// Returns the expression and the offset just past the brace.
    pub fn parse_block(&mut self) -> Result<(ExpressionNode, usize)> {
        self.advance()?;
        let expr = self.parse_expression_with_precedence(Precedence::Ternary)?;
        match self.current() {
            Some(Token::RightBrace) => Ok((expr, self.tokenizer.position())),
            Some(token) => Err(self.error(format!("Expected '}}', found {token:?}"))),
            None => Err(self.error("Unterminated evaluation block")),
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum BlockKind {
    Immediate,
    Deferred,
}

/// Parse EL source text: literal text with embedded `${...}` and `#{...}`
/// blocks
///
/// A source without blocks is a single `LiteralText` node, a source that is
/// exactly one block is the block node itself, and anything else is a
/// `Composite`. `\${` and `\#{` stand for the literal characters.
pub fn parse_template(input: &str, policy: IdentifierPolicy) -> Result<ExpressionNode> {
    let bytes = input.as_bytes();
    let mut parts = Vec::new();
    let mut text = String::new();
    let mut kind: Option<BlockKind> = None;
    let mut text_start = 0;
    let mut pos = 0;

    while pos < bytes.len() {
        match bytes[pos] {
            b'\\' if matches!(bytes.get(pos + 1), Some(b'$' | b'#'))
                && bytes.get(pos + 2) == Some(&b'{') =>
            {
                text.push_str(&input[text_start..pos]);
                text_start = pos + 1;
                pos += 2;
            }
            marker @ (b'$' | b'#') if bytes.get(pos + 1) == Some(&b'{') => {
                let block_kind = if marker == b'$' {
                    BlockKind::Immediate
                } else {
                    BlockKind::Deferred
                };
                match kind {
                    Some(seen) if seen != block_kind => {
                        return Err(ElError::parse(
                            pos,
                            "Mixing ${} and #{} blocks in one expression is not allowed",
                        ));
                    }
                    _ => kind = Some(block_kind),
                }

                text.push_str(&input[text_start..pos]);
                if !text.is_empty() {
                    parts.push(ExpressionNode::LiteralText(std::mem::take(&mut text)));
                }

                let (expr, end) = PrattParser::at(input, pos + 2, policy).parse_block()?;
                parts.push(match block_kind {
                    BlockKind::Immediate => ExpressionNode::Dynamic(Box::new(expr)),
                    BlockKind::Deferred => ExpressionNode::Deferred(Box::new(expr)),
                });
                pos = end;
                text_start = end;
            }
            _ => pos += 1,
        }
    }

    text.push_str(&input[text_start..]);
    if !text.is_empty() || parts.is_empty() {
        parts.push(ExpressionNode::LiteralText(text));
    }

    if parts.len() == 1 {
        Ok(parts.remove(0))
    } else {
        Ok(ExpressionNode::Composite(parts))
    }
}
