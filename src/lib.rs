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

//! Expression Language runtime in Rust
//!
//! Parses `${...}` / `#{...}` expressions, resolves names through a chain of
//! resolvers, selects overloaded host methods at run time and applies the EL
//! type coercion rules. [`ExpressionFactory`] is the entry point.

pub mod ast;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod expression;
pub mod model;
pub mod parser;
pub mod registry;

// Primary entry points
pub use config::EngineConfig;
pub use expression::{
    Expression, ExpressionFactory, MethodExpression, MethodInfo, SerializedValueExpression,
    ValueExpression,
};

// Re-export the types most callers need
pub use ast::{BinaryOperator, ExpressionNode, LiteralValue, UnaryOperator};
pub use error::{CoercionError, ElError, Result};
pub use evaluator::{
    ElContext, ElFunction, ElResolver, EvaluationListener, FunctionLibrary, FunctionMapper,
    MapVariableMapper, VariableMapper, VariableResolver,
};
pub use model::{ClassDef, ElObject, ElType, ElValue, PrimitiveType, TypeCoercion, TypeRegistry};
pub use parser::{ExpressionBuilder, IdentifierPolicy, is_reserved_word, parse};
pub use registry::{CandidateMember, GenerationalCache, MemberResolver, build_parameters};
