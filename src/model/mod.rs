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

//! Type system and value model for EL expressions
//!
//! This module provides the runtime type descriptors, the value model with
//! the host object hook, and the EL coercion rules.

pub mod type_coercion;
pub mod types;
pub mod value;

pub use type_coercion::{CoercionError, CoercionResult, TypeCoercion};
pub use types::{
    ClassDef, ClassDefBuilder, ElType, PrimitiveType, PropertyDef, TypeRegistry,
    to_type_name_array,
};
pub use value::{ElObject, ElValue};
