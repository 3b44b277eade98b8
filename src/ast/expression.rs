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

//! Expression AST node definitions

use super::operator::{BinaryOperator, UnaryOperator};
use smallvec::SmallVec;

/// Argument list storage (SmallVec for the common case of few arguments)
pub type Arguments = SmallVec<[ExpressionNode; 4]>;

/// AST representation of EL expressions
///
/// Equality and hashing are structural, so two sources that differ only in
/// whitespace produce equal trees.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ExpressionNode {
    /// Literal text mixed with evaluation blocks
    Composite(Vec<ExpressionNode>),

    /// Text outside any evaluation block
    LiteralText(String),

    /// Immediate evaluation block `${...}`
    Dynamic(Box<ExpressionNode>),

    /// Deferred evaluation block `#{...}`
    Deferred(Box<ExpressionNode>),

    /// Literal value (string, number, boolean, null)
    Literal(LiteralValue),

    /// Top-level name resolved through variables and the resolver chain
    Identifier(String),

    /// Property access (`base.name`)
    Property {
        /// Base expression
        base: Box<ExpressionNode>,
        /// Property name
        name: String,
    },

    /// Index access (`base[index]`)
    Index {
        /// Base expression
        base: Box<ExpressionNode>,
        /// Index expression
        index: Box<ExpressionNode>,
    },

    /// Method call on an expression (`base.name(args)`) (boxed for size optimization)
    MethodCall(Box<MethodCallData>),

    /// Function call (`prefix:name(args)` or `name(args)`) (boxed for size optimization)
    FunctionCall(Box<FunctionCallData>),

    /// Unary operation
    UnaryOp {
        /// The operator
        op: UnaryOperator,
        /// The operand
        operand: Box<ExpressionNode>,
    },

    /// Binary operation (boxed for size optimization)
    BinaryOp(Box<BinaryOpData>),

    /// Ternary conditional (`cond ? a : b`) (boxed for size optimization)
    Conditional(Box<ConditionalData>),
}

/// Binary operation data (separate struct to optimize enum size)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BinaryOpData {
    /// The operator
    pub op: BinaryOperator,
    /// Left operand
    pub left: ExpressionNode,
    /// Right operand
    pub right: ExpressionNode,
}

/// Function call data (separate struct to optimize enum size)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FunctionCallData {
    /// Namespace prefix; empty for unprefixed calls
    pub prefix: String,
    /// Local function name
    pub local_name: String,
    /// Function arguments
    pub args: Arguments,
}

impl FunctionCallData {
    /// Qualified name as written in the source (`prefix:local` or `local`)
    pub fn qualified_name(&self) -> String {
        if self.prefix.is_empty() {
            self.local_name.clone()
        } else {
            format!("{}:{}", self.prefix, self.local_name)
        }
    }
}

/// Method call data (separate struct to optimize enum size)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodCallData {
    /// Base expression to call the method on
    pub base: ExpressionNode,
    /// Method name
    pub name: String,
    /// Method arguments
    pub args: Arguments,
}

/// Conditional expression data (separate struct to optimize enum size)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConditionalData {
    /// Condition
    pub condition: ExpressionNode,
    /// Value when the condition holds
    pub then_expr: ExpressionNode,
    /// Value otherwise
    pub else_expr: ExpressionNode,
}

/// Literal values in EL
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LiteralValue {
    /// `null`
    Null,
    /// Boolean literal
    Boolean(bool),
    /// Integer literal
    Long(i64),
    /// Floating point literal (stored as string to keep `Eq` and `Hash`)
    Floating(String),
    /// String literal, escapes already resolved
    String(String),
}

impl ExpressionNode {
    /// Create a literal expression
    pub fn literal(value: LiteralValue) -> Self {
        Self::Literal(value)
    }

    /// Create an identifier expression
    pub fn identifier(name: impl Into<String>) -> Self {
        Self::Identifier(name.into())
    }

    /// Create a property access expression
    pub fn property(base: ExpressionNode, name: impl Into<String>) -> Self {
        Self::Property {
            base: Box::new(base),
            name: name.into(),
        }
    }

    /// Create an index access expression
    pub fn index(base: ExpressionNode, index: ExpressionNode) -> Self {
        Self::Index {
            base: Box::new(base),
            index: Box::new(index),
        }
    }

    /// Create a method call expression
    pub fn method_call(
        base: ExpressionNode,
        name: impl Into<String>,
        args: impl Into<Arguments>,
    ) -> Self {
        Self::MethodCall(Box::new(MethodCallData {
            base,
            name: name.into(),
            args: args.into(),
        }))
    }

    /// Create a function call expression
    pub fn function_call(
        prefix: impl Into<String>,
        local_name: impl Into<String>,
        args: impl Into<Arguments>,
    ) -> Self {
        Self::FunctionCall(Box::new(FunctionCallData {
            prefix: prefix.into(),
            local_name: local_name.into(),
            args: args.into(),
        }))
    }

    /// Create a unary operation expression
    pub fn unary_op(op: UnaryOperator, operand: ExpressionNode) -> Self {
        Self::UnaryOp {
            op,
            operand: Box::new(operand),
        }
    }

    /// Create a binary operation expression
    pub fn binary_op(op: BinaryOperator, left: ExpressionNode, right: ExpressionNode) -> Self {
        Self::BinaryOp(Box::new(BinaryOpData { op, left, right }))
    }

    /// Create a conditional expression
    pub fn conditional(
        condition: ExpressionNode,
        then_expr: ExpressionNode,
        else_expr: ExpressionNode,
    ) -> Self {
        Self::Conditional(Box::new(ConditionalData {
            condition,
            then_expr,
            else_expr,
        }))
    }

    /// Whether the whole expression is plain text without evaluation blocks
    pub fn is_literal_text(&self) -> bool {
        matches!(self, Self::LiteralText(_))
    }

    /// Whether the expression contains deferred `#{...}` blocks
    pub fn is_deferred(&self) -> bool {
        match self {
            Self::Deferred(_) => true,
            Self::Composite(parts) => parts.iter().any(|p| matches!(p, Self::Deferred(_))),
            _ => false,
        }
    }

    /// The single expression inside a lone evaluation block, or the node itself
    pub fn unwrap_eval(&self) -> &ExpressionNode {
        match self {
            Self::Dynamic(inner) | Self::Deferred(inner) => inner,
            other => other,
        }
    }

    /// Whether the node can be the target of an assignment
    pub fn is_lvalue(&self) -> bool {
        matches!(
            self.unwrap_eval(),
            Self::Identifier(_) | Self::Property { .. } | Self::Index { .. }
        )
    }

    /// Get the literal value if this is a literal expression
    pub fn as_literal(&self) -> Option<&LiteralValue> {
        match self {
            Self::Literal(value) => Some(value),
            _ => None,
        }
    }

    /// Get the identifier name if this is an identifier expression
    pub fn as_identifier(&self) -> Option<&str> {
        match self {
            Self::Identifier(name) => Some(name),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structural_equality() {
        let a = ExpressionNode::Dynamic(Box::new(ExpressionNode::binary_op(
            BinaryOperator::Add,
            ExpressionNode::identifier("a"),
            ExpressionNode::literal(LiteralValue::Long(1)),
        )));
        let b = a.clone();
        assert_eq!(a, b);
        assert_ne!(
            a,
            ExpressionNode::Deferred(Box::new(ExpressionNode::identifier("a")))
        );
    }

    #[test]
    fn test_lvalue_detection() {
        let prop = ExpressionNode::Dynamic(Box::new(ExpressionNode::property(
            ExpressionNode::identifier("user"),
            "name",
        )));
        assert!(prop.is_lvalue());
        assert!(!ExpressionNode::LiteralText("x".into()).is_lvalue());
        assert!(ExpressionNode::LiteralText("x".into()).is_literal_text());
    }

    #[test]
    fn test_qualified_function_name() {
        let ExpressionNode::FunctionCall(call) =
            ExpressionNode::function_call("fn", "trim", Arguments::new())
        else {
            unreachable!()
        };
        assert_eq!(call.qualified_name(), "fn:trim");
    }
}
