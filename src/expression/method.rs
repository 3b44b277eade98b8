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

//! Method expressions

use super::{Expression, MethodInfo};
use crate::ast::ExpressionNode;
use crate::error::Result;
use crate::evaluator::{ElContext, EvaluationContext, FunctionBindings, VariableBindings};
use crate::model::{ElType, ElValue, TypeCoercion};
use rustc_hash::FxHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// An expression referring to a method
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MethodExpression {
    /// Literal text standing in for the method result
    Literal(LiteralMethodExpression),
    /// A parsed method reference
    Parsed(ParsedMethodExpression),
}

impl MethodExpression {
    /// Invoke the referenced method with `params`
    pub fn invoke(&self, ctx: &ElContext, params: &[ElValue]) -> Result<ElValue> {
        match self {
            MethodExpression::Literal(expr) => expr.invoke(ctx, params),
            MethodExpression::Parsed(expr) => expr.invoke(ctx, params),
        }
    }

    /// Describe the referenced method
    pub fn method_info(&self, ctx: &ElContext) -> Result<MethodInfo> {
        match self {
            MethodExpression::Literal(expr) => Ok(expr.method_info()),
            MethodExpression::Parsed(expr) => expr.method_info(ctx),
        }
    }

    /// Whether the expression supplies its own arguments
    pub fn is_parameters_provided(&self) -> bool {
        match self {
            MethodExpression::Literal(_) => false,
            MethodExpression::Parsed(expr) => expr.is_parameters_provided(),
        }
    }
}

impl Expression for MethodExpression {
    fn expression_string(&self) -> &str {
        match self {
            MethodExpression::Literal(expr) => expr.expression_string(),
            MethodExpression::Parsed(expr) => expr.expression_string(),
        }
    }

    fn is_literal_text(&self) -> bool {
        matches!(self, MethodExpression::Literal(_))
    }
}

/// Method expression whose "result" is its own source text
#[derive(Debug, Clone)]
pub struct LiteralMethodExpression {
    source: String,
    source_hash: u64,
    expected_return_type: Option<ElType>,
    param_types: Vec<ElType>,
}

impl LiteralMethodExpression {
    /// Wrap literal source text
    pub fn new(
        source: impl Into<String>,
        expected_return_type: Option<ElType>,
        param_types: Vec<ElType>,
    ) -> Self {
        let source = source.into();
        let mut hasher = FxHasher::default();
        source.hash(&mut hasher);
        Self {
            source,
            source_hash: hasher.finish(),
            expected_return_type,
            param_types,
        }
    }

    /// The source text, coerced to the expected return type when one is set
    pub fn invoke(&self, ctx: &ElContext, _params: &[ElValue]) -> Result<ElValue> {
        let _scope = ctx.evaluation_scope(&self.source);
        let text = ElValue::String(self.source.clone());
        match &self.expected_return_type {
            Some(ty) => Ok(TypeCoercion::coerce_to_type(&text, ty)?),
            None => Ok(text),
        }
    }

    /// Source text as name, expected return type and declared parameters
    pub fn method_info(&self) -> MethodInfo {
        MethodInfo::new(
            self.source.clone(),
            self.expected_return_type
                .clone()
                .unwrap_or(ElType::String),
            self.param_types.clone(),
        )
    }
}

impl Expression for LiteralMethodExpression {
    fn expression_string(&self) -> &str {
        &self.source
    }

    fn is_literal_text(&self) -> bool {
        true
    }
}

impl PartialEq for LiteralMethodExpression {
    fn eq(&self, other: &Self) -> bool {
        self.source_hash == other.source_hash
    }
}

impl Eq for LiteralMethodExpression {}

struct ParsedMethodInner {
    source: String,
    node: Arc<ExpressionNode>,
    expected_return_type: Option<ElType>,
    param_types: Vec<ElType>,
    functions: FunctionBindings,
    variables: VariableBindings,
}

/// Method expression referring to `name`, `base.name` or `base.name(args)`
#[derive(Clone)]
pub struct ParsedMethodExpression {
    inner: Arc<ParsedMethodInner>,
}

impl ParsedMethodExpression {
    pub(crate) fn new(
        source: impl Into<String>,
        node: Arc<ExpressionNode>,
        expected_return_type: Option<ElType>,
        param_types: Vec<ElType>,
        functions: FunctionBindings,
        variables: VariableBindings,
    ) -> Self {
        Self {
            inner: Arc::new(ParsedMethodInner {
                source: source.into(),
                node,
                expected_return_type,
                param_types,
                functions,
                variables,
            }),
        }
    }

    fn evaluation_context<'a>(&'a self, ctx: &'a ElContext) -> EvaluationContext<'a> {
        EvaluationContext::new(ctx, &self.inner.functions, &self.inner.variables)
    }

    /// The AST of the method reference
    pub fn node(&self) -> &ExpressionNode {
        &self.inner.node
    }

    /// Declared parameter types
    pub fn param_types(&self) -> &[ElType] {
        &self.inner.param_types
    }

    /// Invoke the referenced method
    ///
    /// The result is coerced to the expected return type unless none was
    /// given or it is `void`.
    pub fn invoke(&self, ctx: &ElContext, params: &[ElValue]) -> Result<ElValue> {
        let _scope = ctx.evaluation_scope(&self.inner.source);
        let result = self.evaluation_context(ctx).invoke_method(
            &self.inner.node,
            &self.inner.param_types,
            params,
        )?;
        match &self.inner.expected_return_type {
            Some(ty) if *ty != ElType::VOID => Ok(TypeCoercion::coerce_to_type(&result, ty)?),
            _ => Ok(result),
        }
    }

    /// Describe the referenced method
    pub fn method_info(&self, ctx: &ElContext) -> Result<MethodInfo> {
        let _scope = ctx.evaluation_scope(&self.inner.source);
        self.evaluation_context(ctx)
            .method_info(&self.inner.node, &self.inner.param_types)
    }

    /// Whether the source is a method call written with its own arguments
    pub fn is_parameters_provided(&self) -> bool {
        matches!(self.inner.node.unwrap_eval(), ExpressionNode::MethodCall(_))
    }
}

impl Expression for ParsedMethodExpression {
    fn expression_string(&self) -> &str {
        &self.inner.source
    }

    fn is_literal_text(&self) -> bool {
        false
    }
}

impl fmt::Debug for ParsedMethodExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParsedMethodExpression")
            .field("source", &self.inner.source)
            .field("expected_return_type", &self.inner.expected_return_type)
            .field("param_types", &self.inner.param_types)
            .finish()
    }
}

impl PartialEq for ParsedMethodExpression {
    fn eq(&self, other: &Self) -> bool {
        self.inner.node == other.inner.node
    }
}

impl Eq for ParsedMethodExpression {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::{CompositeResolver, VariableResolver};
    use pretty_assertions::assert_eq;

    fn context() -> ElContext {
        ElContext::new(Arc::new(CompositeResolver::standard(Arc::new(
            VariableResolver::new(),
        ))))
    }

    #[test]
    fn test_literal_method_expression() {
        let ctx = context();
        let expr = LiteralMethodExpression::new("42", Some(ElType::LONG_OBJ), vec![]);
        assert_eq!(expr.invoke(&ctx, &[]).unwrap(), ElValue::Long(42));

        let untyped = LiteralMethodExpression::new("done", None, vec![ElType::INT]);
        assert_eq!(untyped.invoke(&ctx, &[]).unwrap(), ElValue::string("done"));
        let info = untyped.method_info();
        assert_eq!(info.name(), "done");
        assert_eq!(info.return_type(), &ElType::String);
        assert_eq!(info.param_types(), &[ElType::INT]);
    }

    #[test]
    fn test_literal_method_equality_uses_source() {
        let a = LiteralMethodExpression::new("ok", Some(ElType::String), vec![]);
        let b = LiteralMethodExpression::new("ok", None, vec![ElType::INT]);
        let c = LiteralMethodExpression::new("nok", None, vec![]);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
