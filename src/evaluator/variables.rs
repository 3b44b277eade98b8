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

//! Variable mapping: names bound to value expressions

use crate::expression::ValueExpression;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::collections::BTreeMap;

/// Maps variable names to value expressions
pub trait VariableMapper: Send + Sync {
    /// Expression bound to `name`
    fn resolve_variable(&self, name: &str) -> Option<ValueExpression>;

    /// Bind `name`, or unbind it when `expression` is `None`; returns the
    /// previous binding
    fn set_variable(&self, name: &str, expression: Option<ValueExpression>)
    -> Option<ValueExpression>;
}

/// Variable mapper backed by a hash map
#[derive(Debug, Default)]
pub struct MapVariableMapper {
    variables: RwLock<FxHashMap<String, ValueExpression>>,
}

impl MapVariableMapper {
    /// Create an empty mapper
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style binding
    pub fn with(self, name: impl Into<String>, expression: ValueExpression) -> Self {
        self.variables.write().insert(name.into(), expression);
        self
    }

    /// Number of bound variables
    pub fn len(&self) -> usize {
        self.variables.read().len()
    }

    /// Whether no variable is bound
    pub fn is_empty(&self) -> bool {
        self.variables.read().is_empty()
    }
}

impl VariableMapper for MapVariableMapper {
    fn resolve_variable(&self, name: &str) -> Option<ValueExpression> {
        self.variables.read().get(name).cloned()
    }

    fn set_variable(
        &self,
        name: &str,
        expression: Option<ValueExpression>,
    ) -> Option<ValueExpression> {
        let mut variables = self.variables.write();
        match expression {
            Some(expression) => variables.insert(name.to_string(), expression),
            None => variables.remove(name),
        }
    }
}

/// Variables captured by an expression when it was built; never change
/// afterwards
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VariableBindings {
    variables: BTreeMap<String, ValueExpression>,
}

impl VariableBindings {
    /// Create empty bindings
    pub fn new() -> Self {
        Self::default()
    }

    /// Capture a variable
    pub fn insert(&mut self, name: impl Into<String>, expression: ValueExpression) {
        self.variables.insert(name.into(), expression);
    }

    /// Captured expression for `name`
    pub fn get(&self, name: &str) -> Option<&ValueExpression> {
        self.variables.get(name)
    }

    /// Captured variables sorted by name
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ValueExpression)> {
        self.variables.iter().map(|(name, expr)| (name.as_str(), expr))
    }

    /// Number of captured variables
    pub fn len(&self) -> usize {
        self.variables.len()
    }

    /// Whether nothing was captured
    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }
}

impl VariableMapper for VariableBindings {
    fn resolve_variable(&self, name: &str) -> Option<ValueExpression> {
        self.get(name).cloned()
    }

    fn set_variable(
        &self,
        name: &str,
        _expression: Option<ValueExpression>,
    ) -> Option<ValueExpression> {
        log::debug!("Ignoring rebinding of captured variable '{name}'");
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ElType, ElValue};

    fn literal(value: i64) -> ValueExpression {
        ValueExpression::literal(ElValue::Long(value), ElType::LONG_OBJ)
    }

    #[test]
    fn test_map_variable_mapper() {
        let mapper = MapVariableMapper::new().with("x", literal(1));
        assert_eq!(mapper.len(), 1);
        assert_eq!(mapper.resolve_variable("x"), Some(literal(1)));

        let previous = mapper.set_variable("x", Some(literal(2)));
        assert_eq!(previous, Some(literal(1)));
        assert_eq!(mapper.set_variable("x", None), Some(literal(2)));
        assert!(mapper.is_empty());
    }

    #[test]
    fn test_bindings_are_immutable_through_mapper() {
        let mut bindings = VariableBindings::new();
        bindings.insert("x", literal(1));
        assert_eq!(bindings.set_variable("x", Some(literal(5))), None);
        assert_eq!(bindings.resolve_variable("x"), Some(literal(1)));
        assert_eq!(bindings.iter().map(|(n, _)| n).collect::<Vec<_>>(), vec!["x"]);
    }
}
