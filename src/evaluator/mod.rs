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

//! EL expression evaluator
//!
//! The evaluator walks the AST produced by the parser. Names are resolved
//! through the [`ElResolver`] chain of an [`ElContext`], functions and
//! variables through the bindings an expression captured when it was built.

pub mod arithmetic;
pub mod context;
pub mod functions;
pub mod node;
pub mod resolver;
pub mod variables;

pub use arithmetic::ArithmeticEvaluator;
pub use context::{ElContext, EvaluationContext, EvaluationListener, EvaluationScope};
pub use functions::{ElFunction, FunctionBindings, FunctionLibrary, FunctionMapper, NativeFunction};
pub use node::literal_value;
pub use resolver::{
    ArrayResolver, BeanResolver, CompositeResolver, ElResolver, MapResolver, VariableResolver,
};
pub use variables::{MapVariableMapper, VariableBindings, VariableMapper};
