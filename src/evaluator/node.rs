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

//! AST evaluation
//!
//! Expression nodes are interpreted directly against an
//! [`EvaluationContext`]. Top-level identifiers prefer the variables captured
//! when the expression was built and fall back to the resolver chain.

use super::arithmetic::ArithmeticEvaluator;
use super::context::EvaluationContext;
use crate::ast::{BinaryOpData, BinaryOperator, ExpressionNode, LiteralValue, UnaryOperator};
use crate::error::{ElError, Result};
use crate::expression::MethodInfo;
use crate::model::{ElType, ElValue, TypeCoercion};
use crate::registry::member::describe_types;
use std::cmp::Ordering;

/// Target of an lvalue operation
enum Target<'n> {
    /// Top-level name
    Identifier(&'n str),
    /// Property or element of an evaluated base
    Member { base: ElValue, property: ElValue },
}

fn unreachable_target() -> ElError {
    ElError::property_not_found("Target unreachable, base expression returned null")
}

fn unresolved_identifier(name: &str) -> ElError {
    ElError::property_not_found(format!("Identifier '{name}' cannot be resolved"))
}

fn unresolved_property(base: &ElValue, property: &ElValue) -> ElError {
    ElError::property_not_found(format!(
        "Property '{}' cannot be resolved on type '{}'",
        TypeCoercion::coerce_to_string(property),
        base.type_name()
    ))
}

/// Value of a literal node
pub fn literal_value(literal: &LiteralValue) -> Result<ElValue> {
    let value = match literal {
        LiteralValue::Null => ElValue::Null,
        LiteralValue::Boolean(b) => ElValue::Boolean(*b),
        LiteralValue::Long(v) => ElValue::Long(*v),
        LiteralValue::Floating(text) => match text.parse::<f64>() {
            Ok(v) if v.is_finite() => ElValue::Double(v),
            _ => TypeCoercion::coerce_to_number(
                &ElValue::String(text.clone()),
                &ElType::BigDecimal,
            )?,
        },
        LiteralValue::String(s) => ElValue::String(s.clone()),
    };
    Ok(value)
}

impl<'a> EvaluationContext<'a> {
    /// Evaluate a node to a value
    pub fn evaluate(&self, node: &ExpressionNode) -> Result<ElValue> {
        match node {
            ExpressionNode::Composite(parts) => {
                let mut text = String::new();
                for part in parts {
                    let value = self.evaluate(part)?;
                    text.push_str(&TypeCoercion::coerce_to_string(&value));
                }
                Ok(ElValue::String(text))
            }
            ExpressionNode::LiteralText(text) => Ok(ElValue::String(text.clone())),
            ExpressionNode::Dynamic(inner) | ExpressionNode::Deferred(inner) => {
                self.evaluate(inner)
            }
            ExpressionNode::Literal(literal) => literal_value(literal),
            ExpressionNode::Identifier(name) => self.identifier_value(name),
            ExpressionNode::Property { base, name } => {
                let base = self.evaluate(base)?;
                if base.is_null() {
                    return Ok(ElValue::Null);
                }
                self.member_value(&base, &ElValue::String(name.clone()))
            }
            ExpressionNode::Index { base, index } => {
                let base = self.evaluate(base)?;
                if base.is_null() {
                    return Ok(ElValue::Null);
                }
                let index = self.evaluate(index)?;
                if index.is_null() {
                    return Ok(ElValue::Null);
                }
                self.member_value(&base, &index)
            }
            ExpressionNode::MethodCall(call) => {
                let base = self.evaluate(&call.base)?;
                if base.is_null() {
                    return Ok(ElValue::Null);
                }
                let args = self.evaluate_all(&call.args)?;
                self.invoke_on(&base, &call.name, None, &args)
            }
            ExpressionNode::FunctionCall(call) => {
                let function = self
                    .function(&call.prefix, &call.local_name)
                    .ok_or_else(|| ElError::FunctionNotFound {
                        function: call.qualified_name(),
                    })?;
                let args = self.evaluate_all(&call.args)?;
                function.call(&args)
            }
            ExpressionNode::UnaryOp { op, operand } => {
                let value = self.evaluate(operand)?;
                match op {
                    UnaryOperator::Negate => ArithmeticEvaluator::negate(&value),
                    UnaryOperator::Not => {
                        Ok(ElValue::Boolean(!TypeCoercion::coerce_to_boolean(&value)?))
                    }
                    UnaryOperator::Empty => Ok(ElValue::Boolean(value.is_empty_value())),
                }
            }
            ExpressionNode::BinaryOp(data) => self.evaluate_binary(data),
            ExpressionNode::Conditional(data) => {
                let condition = self.evaluate(&data.condition)?;
                if TypeCoercion::coerce_to_boolean(&condition)? {
                    self.evaluate(&data.then_expr)
                } else {
                    self.evaluate(&data.else_expr)
                }
            }
        }
    }

    fn evaluate_all(&self, nodes: &[ExpressionNode]) -> Result<Vec<ElValue>> {
        nodes.iter().map(|node| self.evaluate(node)).collect()
    }

    fn evaluate_boolean(&self, node: &ExpressionNode) -> Result<bool> {
        Ok(TypeCoercion::coerce_to_boolean(&self.evaluate(node)?)?)
    }

    fn evaluate_binary(&self, data: &BinaryOpData) -> Result<ElValue> {
        match data.op {
            BinaryOperator::And => {
                let result =
                    self.evaluate_boolean(&data.left)? && self.evaluate_boolean(&data.right)?;
                return Ok(ElValue::Boolean(result));
            }
            BinaryOperator::Or => {
                let result =
                    self.evaluate_boolean(&data.left)? || self.evaluate_boolean(&data.right)?;
                return Ok(ElValue::Boolean(result));
            }
            _ => {}
        }

        let left = self.evaluate(&data.left)?;
        let right = self.evaluate(&data.right)?;
        let result = match data.op {
            BinaryOperator::Equal => TypeCoercion::equals(&left, &right)?,
            BinaryOperator::NotEqual => !TypeCoercion::equals(&left, &right)?,
            BinaryOperator::LessThan => Self::ordered(&left, &right, Ordering::is_lt)?,
            BinaryOperator::LessThanOrEqual => Self::ordered(&left, &right, Ordering::is_le)?,
            BinaryOperator::GreaterThan => Self::ordered(&left, &right, Ordering::is_gt)?,
            BinaryOperator::GreaterThanOrEqual => Self::ordered(&left, &right, Ordering::is_ge)?,
            op => return ArithmeticEvaluator::evaluate(op, &left, &right),
        };
        Ok(ElValue::Boolean(result))
    }

    /// Relational comparison; any `null` operand makes it false
    fn ordered(left: &ElValue, right: &ElValue, test: fn(Ordering) -> bool) -> Result<bool> {
        if left.is_null() || right.is_null() {
            return Ok(false);
        }
        Ok(test(TypeCoercion::compare(left, right)?))
    }

    fn identifier_value(&self, name: &str) -> Result<ElValue> {
        if let Some(variable) = self.variable(name) {
            return variable.get_value(self.el_context());
        }
        let property = ElValue::string(name);
        self.resolver()
            .get_value(self.el_context(), None, &property)
            .unwrap_or_else(|| Err(unresolved_identifier(name)))
    }

    fn member_value(&self, base: &ElValue, property: &ElValue) -> Result<ElValue> {
        self.resolver()
            .get_value(self.el_context(), Some(base), property)
            .unwrap_or_else(|| Err(unresolved_property(base, property)))
    }

    fn invoke_on(
        &self,
        base: &ElValue,
        method: &str,
        param_types: Option<&[ElType]>,
        args: &[ElValue],
    ) -> Result<ElValue> {
        self.resolver()
            .invoke(self.el_context(), base, method, param_types, args)
            .unwrap_or_else(|| {
                let described = match param_types {
                    Some(types) => describe_types(types),
                    None => {
                        let types: Vec<ElType> = args.iter().map(ElValue::el_type).collect();
                        describe_types(&types)
                    }
                };
                Err(ElError::MemberNotFound {
                    base: base.type_name(),
                    name: method.to_string(),
                    params: described,
                })
            })
    }

    fn target<'n>(&self, node: &'n ExpressionNode) -> Result<Target<'n>> {
        match node.unwrap_eval() {
            ExpressionNode::Identifier(name) => Ok(Target::Identifier(name)),
            ExpressionNode::Property { base, name } => {
                let base = self.evaluate(base)?;
                if base.is_null() {
                    return Err(unreachable_target());
                }
                Ok(Target::Member {
                    base,
                    property: ElValue::String(name.clone()),
                })
            }
            ExpressionNode::Index { base, index } => {
                let base = self.evaluate(base)?;
                if base.is_null() {
                    return Err(unreachable_target());
                }
                let property = self.evaluate(index)?;
                Ok(Target::Member { base, property })
            }
            _ => Err(ElError::property_not_writable(
                "Illegal syntax for set operation",
            )),
        }
    }

    /// Most general type a `set_value` on `node` accepts, or the result type
    /// of a non-lvalue
    pub fn get_type(&self, node: &ExpressionNode) -> Result<ElType> {
        let node = node.unwrap_eval();
        match node {
            ExpressionNode::Identifier(_)
            | ExpressionNode::Property { .. }
            | ExpressionNode::Index { .. } => {}
            ExpressionNode::Composite(_) | ExpressionNode::LiteralText(_) => {
                return Ok(ElType::String);
            }
            ExpressionNode::Literal(literal) => return Ok(literal_value(literal)?.el_type()),
            ExpressionNode::BinaryOp(data) if data.op.is_arithmetic() => {
                return Ok(ElType::Number);
            }
            ExpressionNode::BinaryOp(_) => return Ok(ElType::BOOLEAN_OBJ),
            ExpressionNode::UnaryOp {
                op: UnaryOperator::Negate,
                ..
            } => return Ok(ElType::Number),
            ExpressionNode::UnaryOp { .. } => return Ok(ElType::BOOLEAN_OBJ),
            other => return Ok(self.evaluate(other)?.el_type()),
        }

        match self.target(node)? {
            Target::Identifier(name) => {
                if let Some(variable) = self.variable(name) {
                    return variable.get_type(self.el_context());
                }
                self.resolver()
                    .get_type(self.el_context(), None, &ElValue::string(name))
                    .unwrap_or_else(|| Err(unresolved_identifier(name)))
            }
            Target::Member { base, property } => self
                .resolver()
                .get_type(self.el_context(), Some(&base), &property)
                .unwrap_or_else(|| Err(unresolved_property(&base, &property))),
        }
    }

    /// Assign through an lvalue node
    pub fn set_value(&self, node: &ExpressionNode, value: ElValue) -> Result<()> {
        match self.target(node)? {
            Target::Identifier(name) => {
                if let Some(variable) = self.variable(name) {
                    return variable.set_value(self.el_context(), value);
                }
                self.resolver()
                    .set_value(self.el_context(), None, &ElValue::string(name), value)
                    .unwrap_or_else(|| Err(unresolved_identifier(name)))
            }
            Target::Member { base, property } => self
                .resolver()
                .set_value(self.el_context(), Some(&base), &property, value)
                .unwrap_or_else(|| Err(unresolved_property(&base, &property))),
        }
    }

    /// Whether `set_value` on `node` would fail; non-lvalues are read-only
    pub fn is_read_only(&self, node: &ExpressionNode) -> Result<bool> {
        if !node.is_lvalue() {
            return Ok(true);
        }
        match self.target(node)? {
            Target::Identifier(name) => {
                if let Some(variable) = self.variable(name) {
                    return variable.is_read_only(self.el_context());
                }
                self.resolver()
                    .is_read_only(self.el_context(), None, &ElValue::string(name))
                    .unwrap_or_else(|| Err(unresolved_identifier(name)))
            }
            Target::Member { base, property } => self
                .resolver()
                .is_read_only(self.el_context(), Some(&base), &property)
                .unwrap_or_else(|| Err(unresolved_property(&base, &property))),
        }
    }

    /// Invoke the method a method expression refers to
    ///
    /// For `base.name` the supplied parameters are used; a method call
    /// written with arguments (`base.name(args)`) uses its own arguments.
    pub fn invoke_method(
        &self,
        node: &ExpressionNode,
        param_types: &[ElType],
        params: &[ElValue],
    ) -> Result<ElValue> {
        match node.unwrap_eval() {
            ExpressionNode::Identifier(name) => {
                let function = self
                    .function("", name)
                    .ok_or_else(|| ElError::FunctionNotFound {
                        function: name.clone(),
                    })?;
                function.call(params)
            }
            ExpressionNode::Property { base, name } => {
                let base = self.evaluate(base)?;
                if base.is_null() {
                    return Err(unreachable_target());
                }
                self.invoke_on(&base, name, Some(param_types), params)
            }
            ExpressionNode::MethodCall(call) => {
                let base = self.evaluate(&call.base)?;
                if base.is_null() {
                    return Err(unreachable_target());
                }
                let args = self.evaluate_all(&call.args)?;
                self.invoke_on(&base, &call.name, None, &args)
            }
            _ => Err(ElError::invalid_expression(
                "Not a method reference; expected an identifier, property or method call",
            )),
        }
    }

    /// Describe the method a method expression refers to
    pub fn method_info(&self, node: &ExpressionNode, param_types: &[ElType]) -> Result<MethodInfo> {
        match node.unwrap_eval() {
            ExpressionNode::Identifier(name) => {
                let function = self
                    .function("", name)
                    .ok_or_else(|| ElError::FunctionNotFound {
                        function: name.clone(),
                    })?;
                Ok(MethodInfo::from_member(function.signature()))
            }
            ExpressionNode::Property { base, name } => {
                let base = self.evaluate(base)?;
                if base.is_null() {
                    return Err(unreachable_target());
                }
                let member =
                    self.member_resolver()
                        .resolve_member(&base, name, Some(param_types), None)?;
                Ok(MethodInfo::from_member(&member))
            }
            ExpressionNode::MethodCall(call) => {
                let base = self.evaluate(&call.base)?;
                if base.is_null() {
                    return Err(unreachable_target());
                }
                let args = self.evaluate_all(&call.args)?;
                let types: Vec<ElType> = args.iter().map(ElValue::el_type).collect();
                let member = self.member_resolver().resolve_member(
                    &base,
                    &call.name,
                    Some(&types),
                    Some(&args),
                )?;
                Ok(MethodInfo::from_member(&member))
            }
            _ => Err(ElError::invalid_expression(
                "Not a method reference; expected an identifier, property or method call",
            )),
        }
    }
}
