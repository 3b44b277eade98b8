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

//! Expression factory - the main entry point for building expressions

use super::method::{LiteralMethodExpression, MethodExpression, ParsedMethodExpression};
use super::serialized::SerializedValueExpression;
use super::value::{ParsedValueExpression, ValueExpression};
use crate::ast::{ExpressionNode, ReferenceCollector};
use crate::config::EngineConfig;
use crate::error::{ElError, Result};
use crate::evaluator::functions::qualified_name;
use crate::evaluator::{
    CompositeResolver, ElContext, FunctionBindings, FunctionLibrary, FunctionMapper,
    VariableBindings, VariableResolver,
};
use crate::model::{ElType, ElValue, TypeCoercion, TypeRegistry};
use crate::parser::ExpressionBuilder;
use crate::registry::MemberResolver;
use std::sync::Arc;

/// Builds value and method expressions
///
/// The factory owns the parse cache, the member candidate cache and the type
/// namespace used when restoring serialized expressions. It is `Send + Sync`
/// and meant to be shared.
#[derive(Debug)]
pub struct ExpressionFactory {
    config: EngineConfig,
    builder: ExpressionBuilder,
    member_resolver: Arc<MemberResolver>,
    types: TypeRegistry,
}

impl Default for ExpressionFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl ExpressionFactory {
    /// Create a factory with the default configuration
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    /// Create a factory with custom configuration
    pub fn with_config(config: EngineConfig) -> Self {
        Self {
            builder: ExpressionBuilder::from_config(&config),
            member_resolver: Arc::new(MemberResolver::with_capacity(config.member_cache_capacity)),
            types: TypeRegistry::new(),
            config,
        }
    }

    /// Create a factory configured from the environment
    pub fn from_env() -> Self {
        Self::with_config(EngineConfig::from_env())
    }

    /// Active configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The cached parser front end
    pub fn builder(&self) -> &ExpressionBuilder {
        &self.builder
    }

    /// The shared member resolver
    pub fn member_resolver(&self) -> &Arc<MemberResolver> {
        &self.member_resolver
    }

    /// Type namespace used to restore serialized expressions
    pub fn type_registry(&self) -> &TypeRegistry {
        &self.types
    }

    /// A context with the standard resolver chain over `variables`, the
    /// standard function library and this factory's member resolver
    pub fn standard_context(&self, variables: Arc<VariableResolver>) -> ElContext {
        ElContext::new(Arc::new(CompositeResolver::standard(variables)))
            .with_member_resolver(Arc::clone(&self.member_resolver))
            .with_function_mapper(Arc::new(FunctionLibrary::standard()))
    }

    /// [`standard_context`](Self::standard_context) with top-level values
    /// taken from a JSON object
    pub fn context_with_variables(&self, variables: serde_json::Value) -> Result<ElContext> {
        let resolver = VariableResolver::new();
        resolver.extend_from_json(variables)?;
        Ok(self.standard_context(Arc::new(resolver)))
    }

    fn capture(
        ctx: &ElContext,
        node: &ExpressionNode,
    ) -> Result<(FunctionBindings, VariableBindings)> {
        let references = ReferenceCollector::collect(node);

        let mut functions = FunctionBindings::new();
        for (prefix, local_name) in &references.functions {
            let function = ctx
                .function_mapper()
                .and_then(|mapper| mapper.resolve_function(prefix, local_name))
                .ok_or_else(|| ElError::FunctionNotFound {
                    function: qualified_name(prefix, local_name),
                })?;
            functions.insert(function);
        }

        let mut variables = VariableBindings::new();
        if let Some(mapper) = ctx.variable_mapper() {
            for name in &references.identifiers {
                if let Some(expr) = mapper.resolve_variable(name) {
                    variables.insert(name.clone(), expr);
                }
            }
        }
        Ok((functions, variables))
    }

    /// Parse `source` and capture the functions and variables it refers to
    pub fn create_value_expression(
        &self,
        ctx: &ElContext,
        source: &str,
        expected_type: ElType,
    ) -> Result<ValueExpression> {
        let node = self.builder.parse(source)?;
        let (functions, variables) = Self::capture(ctx, &node)?;
        Ok(ParsedValueExpression::new(
            source,
            Some(expected_type),
            functions,
            variables,
            self.builder.policy(),
            Some(node),
        )
        .into())
    }

    /// Wrap a fixed value
    pub fn create_literal_value_expression(
        &self,
        value: ElValue,
        expected_type: ElType,
    ) -> ValueExpression {
        ValueExpression::literal(value, expected_type)
    }

    /// Parse `source` as a reference to a method
    ///
    /// Literal text yields an expression returning the text itself. Otherwise
    /// the source must be a single `name`, `base.name` or `base.name(args)`
    /// block. A bare `name` refers to the unprefixed function `name`.
    pub fn create_method_expression(
        &self,
        ctx: &ElContext,
        source: &str,
        expected_return_type: Option<ElType>,
        expected_param_types: &[ElType],
    ) -> Result<MethodExpression> {
        let node = self.builder.parse(source)?;
        if node.is_literal_text() {
            return Ok(MethodExpression::Literal(LiteralMethodExpression::new(
                source,
                expected_return_type,
                expected_param_types.to_vec(),
            )));
        }

        let (mut functions, variables) = match node.as_ref() {
            ExpressionNode::Dynamic(inner) | ExpressionNode::Deferred(inner) => match inner.as_ref()
            {
                ExpressionNode::Identifier(_)
                | ExpressionNode::Property { .. }
                | ExpressionNode::MethodCall(_) => Self::capture(ctx, &node)?,
                _ => return Err(Self::not_a_method(source)),
            },
            _ => return Err(Self::not_a_method(source)),
        };
        if let ExpressionNode::Identifier(name) = node.unwrap_eval() {
            if let Some(function) = ctx
                .function_mapper()
                .and_then(|mapper| mapper.resolve_function("", name))
            {
                functions.insert(function);
            }
        }

        Ok(MethodExpression::Parsed(ParsedMethodExpression::new(
            source,
            node,
            expected_return_type,
            expected_param_types.to_vec(),
            functions,
            variables,
        )))
    }

    fn not_a_method(source: &str) -> ElError {
        ElError::invalid_expression(format!("Not a valid method expression: {source}"))
    }

    /// Coerce `value` to `ty` following the EL conversion rules
    pub fn coerce_to_type(&self, value: &ElValue, ty: &ElType) -> Result<ElValue> {
        Ok(TypeCoercion::coerce_to_type(value, ty)?)
    }

    /// Rebuild a serialized expression, looking functions up in `mapper`
    pub fn restore_value_expression(
        &self,
        serialized: &SerializedValueExpression,
        mapper: Option<&dyn FunctionMapper>,
    ) -> Result<ValueExpression> {
        let expr = serialized.restore(&self.types, mapper, self.builder.policy())?;
        Ok(expr.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::{MapVariableMapper, VariableMapper};
    use crate::expression::Expression;
    use pretty_assertions::assert_eq;

    fn context() -> ElContext {
        let factory = ExpressionFactory::new();
        let variables = VariableResolver::new()
            .with("name", ElValue::string("  Ada  "))
            .with("count", ElValue::Long(3));
        factory.standard_context(Arc::new(variables))
    }

    #[test]
    fn test_create_value_expression() {
        let factory = ExpressionFactory::new();
        let ctx = context();
        let expr = factory
            .create_value_expression(&ctx, "${fn:trim(name)}!", ElType::String)
            .unwrap();
        assert_eq!(expr.get_value(&ctx).unwrap(), ElValue::string("Ada!"));
        assert!(!expr.is_literal_text());

        let ValueExpression::Parsed(parsed) = &expr else {
            panic!("expected a parsed expression");
        };
        assert!(parsed.is_realized());
        assert_eq!(
            parsed.function_bindings().names().collect::<Vec<_>>(),
            vec!["fn:trim"]
        );
    }

    #[test]
    fn test_unmapped_function_fails_at_build_time() {
        let factory = ExpressionFactory::new();
        let ctx = context();
        assert_eq!(
            factory
                .create_value_expression(&ctx, "${fn:nope(1)}", ElType::Object)
                .unwrap_err(),
            ElError::FunctionNotFound {
                function: "fn:nope".to_string()
            }
        );
    }

    #[test]
    fn test_variables_are_captured() {
        let factory = ExpressionFactory::new();
        let mapper = Arc::new(MapVariableMapper::new().with(
            "limit",
            ValueExpression::literal(ElValue::Int(10), ElType::LONG_OBJ),
        ));
        let ctx = context().with_variable_mapper(Arc::clone(&mapper) as Arc<dyn VariableMapper>);
        let expr = factory
            .create_value_expression(&ctx, "${count < limit}", ElType::BOOLEAN)
            .unwrap();

        mapper.set_variable("limit", None);
        assert_eq!(expr.get_value(&ctx).unwrap(), ElValue::Boolean(true));
    }

    #[test]
    fn test_create_method_expression_shapes() {
        let factory = ExpressionFactory::new();
        let ctx = context();

        let literal = factory
            .create_method_expression(&ctx, "42", Some(ElType::LONG_OBJ), &[])
            .unwrap();
        assert!(literal.is_literal_text());
        assert_eq!(literal.invoke(&ctx, &[]).unwrap(), ElValue::Long(42));

        let property = factory
            .create_method_expression(&ctx, "${name.length}", None, &[])
            .unwrap();
        assert!(!property.is_parameters_provided());

        assert!(matches!(
            factory.create_method_expression(&ctx, "${1 + 2}", None, &[]),
            Err(ElError::InvalidExpression { .. })
        ));
        assert!(matches!(
            factory.create_method_expression(&ctx, "a ${b.c}", None, &[]),
            Err(ElError::InvalidExpression { .. })
        ));
    }

    #[test]
    fn test_restore_round_trip() {
        let factory = ExpressionFactory::new();
        let ctx = context();
        let expr = factory
            .create_value_expression(&ctx, "${fn:toUpperCase(name)}", ElType::String)
            .unwrap();
        let ValueExpression::Parsed(parsed) = &expr else {
            panic!("expected a parsed expression");
        };

        let json = parsed.to_serialized().unwrap().to_json_string().unwrap();
        let serialized = SerializedValueExpression::from_json_str(&json).unwrap();
        let library = FunctionLibrary::standard();
        let restored = factory
            .restore_value_expression(&serialized, Some(&library as &dyn FunctionMapper))
            .unwrap();

        assert_eq!(restored, expr);
        assert_eq!(restored.get_value(&ctx).unwrap(), ElValue::string("  ADA  "));
    }
}
