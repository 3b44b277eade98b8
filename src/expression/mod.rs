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

//! Value and method expressions
//!
//! Expressions are immutable, cheap to clone and safe to share between
//! threads. Parsed expressions keep the source text and the bindings captured
//! at construction; the AST is realized on first use.

pub mod factory;
pub mod method;
pub mod serialized;
pub mod value;

pub use factory::ExpressionFactory;
pub use method::{LiteralMethodExpression, MethodExpression, ParsedMethodExpression};
pub use serialized::{SerializedValueExpression, SerializedVariable};
pub use value::{LiteralValueExpression, ParsedValueExpression, ValueExpression};

use crate::model::ElType;
use crate::registry::CandidateMember;

/// Common surface of value and method expressions
pub trait Expression {
    /// Source text the expression was built from
    fn expression_string(&self) -> &str;

    /// Whether the expression is plain text without evaluation blocks
    fn is_literal_text(&self) -> bool;
}

/// Description of the method a method expression refers to
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodInfo {
    name: String,
    return_type: ElType,
    param_types: Vec<ElType>,
}

impl MethodInfo {
    /// Describe a method
    pub fn new(name: impl Into<String>, return_type: ElType, param_types: Vec<ElType>) -> Self {
        Self {
            name: name.into(),
            return_type,
            param_types,
        }
    }

    /// Describe a resolved member
    pub fn from_member(member: &CandidateMember) -> Self {
        Self::new(
            member.name(),
            member.return_type().clone(),
            member.parameter_types().to_vec(),
        )
    }

    /// Method name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared return type
    pub fn return_type(&self) -> &ElType {
        &self.return_type
    }

    /// Declared parameter types
    pub fn param_types(&self) -> &[ElType] {
        &self.param_types
    }
}
