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

//! Value expressions

use super::Expression;
use crate::ast::ExpressionNode;
use crate::error::{ElError, Result};
use crate::evaluator::{ElContext, EvaluationContext, FunctionBindings, VariableBindings};
use crate::model::{ElType, ElValue, TypeCoercion};
use crate::parser::{IdentifierPolicy, parse_template};
use once_cell::sync::OnceCell;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// An expression producing a value
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ValueExpression {
    /// A fixed value
    Literal(LiteralValueExpression),
    /// Parsed source text
    Parsed(ParsedValueExpression),
}

impl ValueExpression {
    /// Wrap a fixed value
    pub fn literal(value: ElValue, expected_type: ElType) -> Self {
        ValueExpression::Literal(LiteralValueExpression::new(value, expected_type))
    }

    /// Evaluate and coerce to the expected type
    pub fn get_value(&self, ctx: &ElContext) -> Result<ElValue> {
        match self {
            ValueExpression::Literal(expr) => expr.get_value(ctx),
            ValueExpression::Parsed(expr) => expr.get_value(ctx),
        }
    }

    /// Most general type accepted by [`set_value`](Self::set_value)
    pub fn get_type(&self, ctx: &ElContext) -> Result<ElType> {
        match self {
            ValueExpression::Literal(expr) => expr.get_type(ctx),
            ValueExpression::Parsed(expr) => expr.get_type(ctx),
        }
    }

    /// Assign through the expression
    pub fn set_value(&self, ctx: &ElContext, value: ElValue) -> Result<()> {
        match self {
            ValueExpression::Literal(expr) => expr.set_value(ctx, value),
            ValueExpression::Parsed(expr) => expr.set_value(ctx, value),
        }
    }

    /// Whether [`set_value`](Self::set_value) would fail
    pub fn is_read_only(&self, ctx: &ElContext) -> Result<bool> {
        match self {
            ValueExpression::Literal(expr) => expr.is_read_only(ctx),
            ValueExpression::Parsed(expr) => expr.is_read_only(ctx),
        }
    }

    /// Type results are coerced to; `None` when results are left as they are
    pub fn expected_type(&self) -> Option<&ElType> {
        match self {
            ValueExpression::Literal(expr) => Some(expr.expected_type()),
            ValueExpression::Parsed(expr) => expr.expected_type(),
        }
    }
}

impl Expression for ValueExpression {
    fn expression_string(&self) -> &str {
        match self {
            ValueExpression::Literal(expr) => expr.expression_string(),
            ValueExpression::Parsed(expr) => expr.expression_string(),
        }
    }

    fn is_literal_text(&self) -> bool {
        match self {
            ValueExpression::Literal(expr) => expr.is_literal_text(),
            ValueExpression::Parsed(expr) => expr.is_literal_text(),
        }
    }
}

impl From<LiteralValueExpression> for ValueExpression {
    fn from(expr: LiteralValueExpression) -> Self {
        ValueExpression::Literal(expr)
    }
}

impl From<ParsedValueExpression> for ValueExpression {
    fn from(expr: ParsedValueExpression) -> Self {
        ValueExpression::Parsed(expr)
    }
}

/// Value expression wrapping a fixed value; read-only
#[derive(Debug, Clone)]
pub struct LiteralValueExpression {
    value: ElValue,
    expected_type: ElType,
    text: String,
}

impl LiteralValueExpression {
    /// Wrap `value`, coercing it to `expected_type` when read
    pub fn new(value: ElValue, expected_type: ElType) -> Self {
        let text = TypeCoercion::coerce_to_string(&value);
        Self {
            value,
            expected_type,
            text,
        }
    }

    /// The wrapped value, uncoerced
    pub fn value(&self) -> &ElValue {
        &self.value
    }

    /// Type the value is coerced to
    pub fn expected_type(&self) -> &ElType {
        &self.expected_type
    }

    /// The value coerced to the expected type
    pub fn get_value(&self, ctx: &ElContext) -> Result<ElValue> {
        let _scope = ctx.evaluation_scope(&self.text);
        Ok(TypeCoercion::coerce_to_type(&self.value, &self.expected_type)?)
    }

    /// Runtime type of the wrapped value
    pub fn get_type(&self, _ctx: &ElContext) -> Result<ElType> {
        Ok(self.value.el_type())
    }

    /// Always fails; literals cannot be written
    pub fn set_value(&self, _ctx: &ElContext, _value: ElValue) -> Result<()> {
        Err(ElError::property_not_writable(format!(
            "ValueExpression is a literal and not writable: {}",
            self.text
        )))
    }

    /// Always `true`
    pub fn is_read_only(&self, _ctx: &ElContext) -> Result<bool> {
        Ok(true)
    }
}

impl Expression for LiteralValueExpression {
    fn expression_string(&self) -> &str {
        &self.text
    }

    fn is_literal_text(&self) -> bool {
        true
    }
}

impl PartialEq for LiteralValueExpression {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl Eq for LiteralValueExpression {}

impl Hash for LiteralValueExpression {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.value.hash(state);
    }
}

struct ParsedInner {
    source: String,
    expected_type: Option<ElType>,
    functions: FunctionBindings,
    variables: VariableBindings,
    policy: IdentifierPolicy,
    node: OnceCell<Arc<ExpressionNode>>,
}

/// Value expression backed by parsed source text
///
/// Equality and hashing follow the AST, so sources differing only in
/// whitespace inside blocks compare equal. When the source cannot be parsed
/// the source text is compared instead.
#[derive(Clone)]
pub struct ParsedValueExpression {
    inner: Arc<ParsedInner>,
}

impl ParsedValueExpression {
    pub(crate) fn new(
        source: impl Into<String>,
        expected_type: Option<ElType>,
        functions: FunctionBindings,
        variables: VariableBindings,
        policy: IdentifierPolicy,
        node: Option<Arc<ExpressionNode>>,
    ) -> Self {
        let cell = OnceCell::new();
        if let Some(node) = node {
            let _ = cell.set(node);
        }
        Self {
            inner: Arc::new(ParsedInner {
                source: source.into(),
                expected_type,
                functions,
                variables,
                policy,
                node: cell,
            }),
        }
    }

    /// The AST, parsing the source on first access
    pub fn node(&self) -> Result<Arc<ExpressionNode>> {
        self.inner
            .node
            .get_or_try_init(|| parse_template(&self.inner.source, self.inner.policy).map(Arc::new))
            .cloned()
    }

    /// Whether the AST has been built
    pub fn is_realized(&self) -> bool {
        self.inner.node.get().is_some()
    }

    /// Type results are coerced to
    pub fn expected_type(&self) -> Option<&ElType> {
        self.inner.expected_type.as_ref()
    }

    /// Functions captured at construction
    pub fn function_bindings(&self) -> &FunctionBindings {
        &self.inner.functions
    }

    /// Variables captured at construction
    pub fn variable_bindings(&self) -> &VariableBindings {
        &self.inner.variables
    }

    /// Whether the expression contains `#{...}` blocks
    pub fn is_deferred(&self) -> Result<bool> {
        Ok(self.node()?.is_deferred())
    }

    fn with_node<T>(
        &self,
        ctx: &ElContext,
        body: impl FnOnce(&EvaluationContext<'_>, &ExpressionNode) -> Result<T>,
    ) -> Result<T> {
        let _scope = ctx.evaluation_scope(&self.inner.source);
        let node = self.node()?;
        let eval_ctx = EvaluationContext::new(ctx, &self.inner.functions, &self.inner.variables);
        body(&eval_ctx, &node)
    }

    /// Evaluate and coerce to the expected type
    pub fn get_value(&self, ctx: &ElContext) -> Result<ElValue> {
        let value = self.with_node(ctx, |eval_ctx, node| eval_ctx.evaluate(node))?;
        match &self.inner.expected_type {
            Some(ty) => Ok(TypeCoercion::coerce_to_type(&value, ty)?),
            None => Ok(value),
        }
    }

    /// Most general type accepted by [`set_value`](Self::set_value)
    pub fn get_type(&self, ctx: &ElContext) -> Result<ElType> {
        self.with_node(ctx, |eval_ctx, node| eval_ctx.get_type(node))
    }

    /// Assign through the expression
    pub fn set_value(&self, ctx: &ElContext, value: ElValue) -> Result<()> {
        self.with_node(ctx, |eval_ctx, node| eval_ctx.set_value(node, value))
    }

    /// Whether [`set_value`](Self::set_value) would fail
    pub fn is_read_only(&self, ctx: &ElContext) -> Result<bool> {
        self.with_node(ctx, |eval_ctx, node| eval_ctx.is_read_only(node))
    }
}

impl Expression for ParsedValueExpression {
    fn expression_string(&self) -> &str {
        &self.inner.source
    }

    fn is_literal_text(&self) -> bool {
        match self.node() {
            Ok(node) => node.is_literal_text(),
            Err(err) => {
                log::debug!(
                    "Treating {:?} as non-literal, it does not parse: {err}",
                    self.inner.source
                );
                false
            }
        }
    }
}

impl fmt::Debug for ParsedValueExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParsedValueExpression")
            .field("source", &self.inner.source)
            .field("expected_type", &self.inner.expected_type)
            .field("functions", &self.inner.functions.len())
            .field("variables", &self.inner.variables.len())
            .field("realized", &self.is_realized())
            .finish()
    }
}

impl PartialEq for ParsedValueExpression {
    fn eq(&self, other: &Self) -> bool {
        if Arc::ptr_eq(&self.inner, &other.inner) {
            return true;
        }
        match (self.node(), other.node()) {
            (Ok(a), Ok(b)) => a == b,
            _ => self.inner.source == other.inner.source,
        }
    }
}

impl Eq for ParsedValueExpression {}

impl Hash for ParsedValueExpression {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self.node() {
            Ok(node) => node.hash(state),
            Err(_) => self.inner.source.hash(state),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::{CompositeResolver, VariableResolver};
    use pretty_assertions::assert_eq;

    fn context() -> ElContext {
        let variables = VariableResolver::new().with("x", ElValue::Long(2));
        ElContext::new(Arc::new(CompositeResolver::standard(Arc::new(variables))))
    }

    fn parsed(source: &str, expected_type: Option<ElType>) -> ParsedValueExpression {
        ParsedValueExpression::new(
            source,
            expected_type,
            FunctionBindings::new(),
            VariableBindings::new(),
            IdentifierPolicy::default(),
            None,
        )
    }

    #[test]
    fn test_literal_expression() {
        let ctx = context();
        let expr = ValueExpression::literal(ElValue::string("42"), ElType::LONG_OBJ);
        assert_eq!(expr.get_value(&ctx).unwrap(), ElValue::Long(42));
        assert_eq!(expr.get_type(&ctx).unwrap(), ElType::String);
        assert!(expr.is_read_only(&ctx).unwrap());
        assert!(matches!(
            expr.set_value(&ctx, ElValue::Null),
            Err(ElError::PropertyNotWritable { .. })
        ));
        assert_eq!(expr.expression_string(), "42");
    }

    #[test]
    fn test_parsed_expression_realizes_lazily() {
        let ctx = context();
        let expr = parsed("${x + 1}", Some(ElType::String));
        assert!(!expr.is_realized());
        assert_eq!(expr.get_value(&ctx).unwrap(), ElValue::string("3"));
        assert!(expr.is_realized());
    }

    #[test]
    fn test_parsed_expression_equality_follows_ast() {
        assert_eq!(parsed("${x+1}", None), parsed("${ x + 1 }", None));
        assert_ne!(parsed("${x+1}", None), parsed("${x+2}", None));
        assert_eq!(parsed("${x +}", None), parsed("${x +}", None));
    }

    #[test]
    fn test_literal_text_check_absorbs_parse_errors() {
        assert!(parsed("just text", None).is_literal_text());
        assert!(!parsed("${x}", None).is_literal_text());
        assert!(!parsed("${x +", None).is_literal_text());
    }
}
