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

//! Error types for EL construction and evaluation
//!
//! Every failure surfaced by the runtime is an [`ElError`]. Coercion failures
//! have their own [`CoercionError`] so that speculative coercion can tell them
//! apart from everything else.

use thiserror::Error;

pub use crate::model::type_coercion::CoercionError;

/// Result type alias for EL operations
pub type Result<T> = std::result::Result<T, ElError>;

/// Comprehensive error type for EL operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ElError {
    /// No callable member matched the requested name and arguments
    #[error("Method not found: {base}.{name}({params})")]
    MemberNotFound {
        /// Description of the base object
        base: String,
        /// Requested member name
        name: String,
        /// Comma separated argument type names
        params: String,
    },

    /// Several members matched equally well and could not be told apart
    #[error("Unable to find unambiguous method: {base}.{name}({params})")]
    AmbiguousMember {
        /// Description of the base object
        base: String,
        /// Requested member name
        name: String,
        /// Comma separated argument type names
        params: String,
    },

    /// A value could not be converted to a required type
    #[error(transparent)]
    Coercion(#[from] CoercionError),

    /// A property or identifier could not be resolved
    #[error("Property not found: {message}")]
    PropertyNotFound {
        /// Human-readable error message
        message: String,
    },

    /// A property exists but cannot be written
    #[error("Property not writable: {message}")]
    PropertyNotWritable {
        /// Human-readable error message
        message: String,
    },

    /// A function referenced by an expression is not mapped
    #[error("Function '{function}' not found")]
    FunctionNotFound {
        /// Qualified function name (`prefix:local`)
        function: String,
    },

    /// Parsing errors
    #[error("Parse error at position {position}: {message}")]
    Parse {
        /// Position in the input where the parse error occurred
        position: usize,
        /// Human-readable error message
        message: String,
    },

    /// Expression has a shape that is not valid for the requested use
    #[error("Invalid expression: {message}")]
    InvalidExpression {
        /// Human-readable error message
        message: String,
    },

    /// A host method or function failed while being invoked
    #[error("Error invoking '{member}': {message}")]
    Invocation {
        /// Signature of the member that failed
        member: String,
        /// Human-readable error message
        message: String,
    },

    /// Division by zero or other arithmetic errors
    #[error("Arithmetic error: {message}")]
    Arithmetic {
        /// Human-readable error message
        message: String,
    },

    /// A type name could not be found in the type namespace
    #[error("Unknown type: {name}")]
    UnknownType {
        /// The type name that was looked up
        name: String,
    },

    /// Serialized expressions could not be written or restored
    #[error("Serialization error: {message}")]
    Serialization {
        /// Human-readable error message
        message: String,
    },
}

impl ElError {
    /// Create a property-not-found error
    pub fn property_not_found(message: impl Into<String>) -> Self {
        Self::PropertyNotFound {
            message: message.into(),
        }
    }

    /// Create a property-not-writable error
    pub fn property_not_writable(message: impl Into<String>) -> Self {
        Self::PropertyNotWritable {
            message: message.into(),
        }
    }

    /// Create an invalid-expression error
    pub fn invalid_expression(message: impl Into<String>) -> Self {
        Self::InvalidExpression {
            message: message.into(),
        }
    }

    /// Create a parse error
    pub fn parse(position: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            position,
            message: message.into(),
        }
    }

    /// Whether this error came out of member resolution
    pub fn is_member_error(&self) -> bool {
        matches!(
            self,
            ElError::MemberNotFound { .. } | ElError::AmbiguousMember { .. }
        )
    }
}

impl From<serde_json::Error> for ElError {
    fn from(err: serde_json::Error) -> Self {
        ElError::Serialization {
            message: err.to_string(),
        }
    }
}
