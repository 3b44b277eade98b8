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

//! Serialized form of value expressions
//!
//! Only the source text, the expected type name and the captured bindings
//! are persisted. Functions are stored by qualified name and looked up again
//! on restore; restored expressions parse their source on first use.

use super::value::{LiteralValueExpression, ParsedValueExpression, ValueExpression};
use crate::error::{ElError, Result};
use crate::evaluator::{FunctionBindings, FunctionMapper, VariableBindings};
use crate::model::{ElType, ElValue, TypeCoercion, TypeRegistry};
use crate::parser::IdentifierPolicy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Persistent form of a parsed value expression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedValueExpression {
    /// Source text
    pub source_text: String,
    /// Expected type name; empty when results are not coerced
    #[serde(default)]
    pub expected_type_name: String,
    /// Qualified names of captured functions
    #[serde(default)]
    pub function_bindings: Vec<String>,
    /// Captured variables
    #[serde(default)]
    pub variable_bindings: BTreeMap<String, SerializedVariable>,
}

/// Persistent form of a captured variable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SerializedVariable {
    /// A literal value expression
    Literal {
        /// The wrapped value as JSON
        value: serde_json::Value,
        /// Name of the type the value is coerced to
        expected_type_name: String,
    },
    /// A parsed value expression
    Parsed(SerializedValueExpression),
}

impl SerializedValueExpression {
    /// Encode as a JSON string
    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode from a JSON string
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Rebuild the expression; the AST is not built until first use
    pub fn restore(
        &self,
        types: &TypeRegistry,
        mapper: Option<&dyn FunctionMapper>,
        policy: IdentifierPolicy,
    ) -> Result<ParsedValueExpression> {
        let expected_type = types.for_name(&self.expected_type_name)?;
        let functions =
            FunctionBindings::restore(self.function_bindings.iter().map(String::as_str), mapper)?;
        let mut variables = VariableBindings::new();
        for (name, variable) in &self.variable_bindings {
            variables.insert(name.clone(), variable.restore(types, mapper, policy)?);
        }
        Ok(ParsedValueExpression::new(
            self.source_text.clone(),
            expected_type,
            functions,
            variables,
            policy,
            None,
        ))
    }
}

impl SerializedVariable {
    fn restore(
        &self,
        types: &TypeRegistry,
        mapper: Option<&dyn FunctionMapper>,
        policy: IdentifierPolicy,
    ) -> Result<ValueExpression> {
        match self {
            SerializedVariable::Literal {
                value,
                expected_type_name,
            } => {
                let expected_type =
                    types
                        .for_name(expected_type_name)?
                        .ok_or_else(|| ElError::Serialization {
                            message: "literal variable without expected type".to_string(),
                        })?;
                let value = ElValue::from(value.clone());
                let value = TypeCoercion::coerce_to_type(&value, &expected_type)?;
                Ok(ValueExpression::literal(value, expected_type))
            }
            SerializedVariable::Parsed(serialized) => {
                Ok(serialized.restore(types, mapper, policy)?.into())
            }
        }
    }
}

fn type_name(ty: Option<&ElType>) -> String {
    ty.map(ElType::name).unwrap_or_default()
}

impl ParsedValueExpression {
    /// Persistent form of this expression
    pub fn to_serialized(&self) -> Result<SerializedValueExpression> {
        let mut variable_bindings = BTreeMap::new();
        for (name, expr) in self.variable_bindings().iter() {
            variable_bindings.insert(name.to_string(), expr.to_serialized()?);
        }
        Ok(SerializedValueExpression {
            source_text: super::Expression::expression_string(self).to_string(),
            expected_type_name: type_name(self.expected_type()),
            function_bindings: self
                .function_bindings()
                .names()
                .map(str::to_string)
                .collect(),
            variable_bindings,
        })
    }
}

impl LiteralValueExpression {
    /// Persistent form of this expression; fails for host objects
    pub fn to_serialized(&self) -> Result<SerializedVariable> {
        Ok(SerializedVariable::Literal {
            value: self.value().to_json()?,
            expected_type_name: self.expected_type().name(),
        })
    }
}

impl ValueExpression {
    /// Persistent form of this expression
    pub fn to_serialized(&self) -> Result<SerializedVariable> {
        match self {
            ValueExpression::Literal(expr) => expr.to_serialized(),
            ValueExpression::Parsed(expr) => Ok(SerializedVariable::Parsed(expr.to_serialized()?)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::FunctionLibrary;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_json_shape() {
        let mut variable_bindings = BTreeMap::new();
        variable_bindings.insert(
            "limit".to_string(),
            SerializedVariable::Literal {
                value: json!(10),
                expected_type_name: "Long".to_string(),
            },
        );
        let serialized = SerializedValueExpression {
            source_text: "${fn:trim(name)}".to_string(),
            expected_type_name: "String".to_string(),
            function_bindings: vec!["fn:trim".to_string()],
            variable_bindings,
        };

        let json: serde_json::Value =
            serde_json::from_str(&serialized.to_json_string().unwrap()).unwrap();
        assert_eq!(
            json,
            json!({
                "source_text": "${fn:trim(name)}",
                "expected_type_name": "String",
                "function_bindings": ["fn:trim"],
                "variable_bindings": {
                    "limit": {"kind": "literal", "value": 10, "expected_type_name": "Long"}
                }
            })
        );
        assert_eq!(
            SerializedValueExpression::from_json_str(&serialized.to_json_string().unwrap())
                .unwrap(),
            serialized
        );
    }

    #[test]
    fn test_restore_starts_unrealized() {
        let serialized = SerializedValueExpression {
            source_text: "${fn:trim(' a ')}".to_string(),
            expected_type_name: String::new(),
            function_bindings: vec!["fn:trim".to_string()],
            variable_bindings: BTreeMap::new(),
        };
        let library = FunctionLibrary::standard();
        let mapper: &dyn FunctionMapper = &library;
        let restored = serialized
            .restore(&TypeRegistry::new(), Some(mapper), IdentifierPolicy::default())
            .unwrap();
        assert!(!restored.is_realized());
        assert_eq!(restored.expected_type(), None);
        assert_eq!(restored.to_serialized().unwrap(), serialized);
    }

    #[test]
    fn test_restore_requires_mapped_functions() {
        let serialized = SerializedValueExpression {
            source_text: "${fn:trim(x)}".to_string(),
            expected_type_name: String::new(),
            function_bindings: vec!["fn:trim".to_string()],
            variable_bindings: BTreeMap::new(),
        };
        let err = serialized
            .restore(&TypeRegistry::new(), None, IdentifierPolicy::default())
            .unwrap_err();
        assert!(matches!(err, ElError::FunctionNotFound { .. }));
    }

    #[test]
    fn test_restore_unknown_type() {
        let serialized = SerializedValueExpression {
            source_text: "${x}".to_string(),
            expected_type_name: "com.example.Missing".to_string(),
            function_bindings: Vec::new(),
            variable_bindings: BTreeMap::new(),
        };
        let err = serialized
            .restore(&TypeRegistry::new(), None, IdentifierPolicy::default())
            .unwrap_err();
        assert_eq!(
            err,
            ElError::UnknownType {
                name: "com.example.Missing".to_string()
            }
        );
    }
}
