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

//! Visitor pattern for AST traversal

use super::expression::{ExpressionNode, FunctionCallData};

/// Trait for visiting AST nodes
///
/// Every hook defaults to walking into the children, so implementors only
/// override the nodes they care about.
pub trait Visitor: Sized {
    /// Visit an expression node
    fn visit_expression(&mut self, expr: &ExpressionNode) {
        walk_expression(self, expr)
    }

    /// Visit a top-level identifier
    fn visit_identifier(&mut self, _name: &str) {}

    /// Visit a function call
    fn visit_function_call(&mut self, call: &FunctionCallData) {
        for arg in &call.args {
            self.visit_expression(arg);
        }
    }
}

/// Default implementation of walking an expression tree
pub fn walk_expression<V: Visitor>(visitor: &mut V, expr: &ExpressionNode) {
    match expr {
        ExpressionNode::Composite(parts) => {
            for part in parts {
                visitor.visit_expression(part);
            }
        }
        ExpressionNode::LiteralText(_) | ExpressionNode::Literal(_) => {}
        ExpressionNode::Dynamic(inner) | ExpressionNode::Deferred(inner) => {
            visitor.visit_expression(inner)
        }
        ExpressionNode::Identifier(name) => visitor.visit_identifier(name),
        ExpressionNode::Property { base, .. } => visitor.visit_expression(base),
        ExpressionNode::Index { base, index } => {
            visitor.visit_expression(base);
            visitor.visit_expression(index);
        }
        ExpressionNode::MethodCall(call) => {
            visitor.visit_expression(&call.base);
            for arg in &call.args {
                visitor.visit_expression(arg);
            }
        }
        ExpressionNode::FunctionCall(call) => visitor.visit_function_call(call),
        ExpressionNode::UnaryOp { operand, .. } => visitor.visit_expression(operand),
        ExpressionNode::BinaryOp(data) => {
            visitor.visit_expression(&data.left);
            visitor.visit_expression(&data.right);
        }
        ExpressionNode::Conditional(data) => {
            visitor.visit_expression(&data.condition);
            visitor.visit_expression(&data.then_expr);
            visitor.visit_expression(&data.else_expr);
        }
    }
}

/// Collects the functions and top-level identifiers an expression refers to,
/// in first-seen order without duplicates
#[derive(Debug, Default)]
pub struct ReferenceCollector {
    /// `(prefix, local_name)` of every function call
    pub functions: Vec<(String, String)>,
    /// Names of top-level identifiers
    pub identifiers: Vec<String>,
}

impl ReferenceCollector {
    /// Collect the references of `expr`
    pub fn collect(expr: &ExpressionNode) -> Self {
        let mut collector = Self::default();
        collector.visit_expression(expr);
        collector
    }
}

impl Visitor for ReferenceCollector {
    fn visit_identifier(&mut self, name: &str) {
        if !self.identifiers.iter().any(|n| n == name) {
            self.identifiers.push(name.to_string());
        }
    }

    fn visit_function_call(&mut self, call: &FunctionCallData) {
        let key = (call.prefix.clone(), call.local_name.clone());
        if !self.functions.contains(&key) {
            self.functions.push(key);
        }
        for arg in &call.args {
            self.visit_expression(arg);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{BinaryOperator, LiteralValue};

    #[test]
    fn test_reference_collector() {
        let expr = ExpressionNode::Dynamic(Box::new(ExpressionNode::binary_op(
            BinaryOperator::Add,
            ExpressionNode::function_call(
                "fn",
                "len",
                vec![ExpressionNode::property(ExpressionNode::identifier("user"), "name")],
            ),
            ExpressionNode::binary_op(
                BinaryOperator::Multiply,
                ExpressionNode::identifier("user"),
                ExpressionNode::literal(LiteralValue::Long(2)),
            ),
        )));

        let refs = ReferenceCollector::collect(&expr);
        assert_eq!(refs.functions, vec![("fn".to_string(), "len".to_string())]);
        assert_eq!(refs.identifiers, vec!["user".to_string()]);
    }
}
