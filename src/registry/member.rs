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

//! Callable member signatures

use crate::model::types::ElType;
use smallvec::SmallVec;
use std::fmt;

/// Parameter list storage; most members take few parameters
pub type ParameterTypes = SmallVec<[ElType; 4]>;

/// A named, typed, possibly variadic callable shape considered during
/// overload resolution
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CandidateMember {
    name: String,
    parameter_types: ParameterTypes,
    variadic: bool,
    return_type: ElType,
}

impl CandidateMember {
    /// Create a member with a fixed parameter list
    pub fn new(name: impl Into<String>, parameter_types: Vec<ElType>, return_type: ElType) -> Self {
        Self {
            name: name.into(),
            parameter_types: parameter_types.into(),
            variadic: false,
            return_type,
        }
    }

    /// Create a variadic member
    ///
    /// The trailing parameter is stored as an array of `element_type`, so
    /// `parameter_types()` of `f(String, Object...)` is `[String, Object[]]`.
    pub fn variadic(
        name: impl Into<String>,
        fixed_parameter_types: Vec<ElType>,
        element_type: ElType,
        return_type: ElType,
    ) -> Self {
        let mut parameter_types: ParameterTypes = fixed_parameter_types.into();
        parameter_types.push(ElType::array_of(element_type));
        Self {
            name: name.into(),
            parameter_types,
            variadic: true,
            return_type,
        }
    }

    /// Member name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared parameter types, the variadic slot included
    pub fn parameter_types(&self) -> &[ElType] {
        &self.parameter_types
    }

    /// Number of declared parameters, the variadic slot included
    pub fn arity(&self) -> usize {
        self.parameter_types.len()
    }

    /// Whether the trailing parameter accepts any number of arguments
    pub fn is_variadic(&self) -> bool {
        self.variadic
    }

    /// Element type of the variadic slot
    pub fn variadic_element_type(&self) -> Option<&ElType> {
        if !self.variadic {
            return None;
        }
        self.parameter_types.last().and_then(ElType::element_type)
    }

    /// Declared return type
    pub fn return_type(&self) -> &ElType {
        &self.return_type
    }

    /// Human-readable signature, e.g. `format(String, Object...)`
    pub fn signature(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for CandidateMember {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        let last = self.parameter_types.len().saturating_sub(1);
        for (i, param) in self.parameter_types.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            match param.element_type() {
                Some(elem) if self.variadic && i == last => write!(f, "{elem}...")?,
                _ => write!(f, "{param}")?,
            }
        }
        write!(f, ")")
    }
}

/// Comma separated names of argument types, for diagnostics
pub fn describe_types(types: &[ElType]) -> String {
    types
        .iter()
        .map(ElType::name)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variadic_signature() {
        let member = CandidateMember::variadic(
            "format",
            vec![ElType::String],
            ElType::Object,
            ElType::String,
        );
        assert!(member.is_variadic());
        assert_eq!(member.arity(), 2);
        assert_eq!(member.variadic_element_type(), Some(&ElType::Object));
        assert_eq!(member.signature(), "format(String, Object...)");
    }

    #[test]
    fn test_fixed_signature() {
        let member = CandidateMember::new("add", vec![ElType::INT, ElType::INT], ElType::INT);
        assert!(!member.is_variadic());
        assert_eq!(member.variadic_element_type(), None);
        assert_eq!(member.to_string(), "add(int, int)");
        assert_eq!(describe_types(member.parameter_types()), "int, int");
    }
}
