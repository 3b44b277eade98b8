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

//! Identifier validation

use serde::{Deserialize, Serialize};

/// Environment variable that disables identifier checking when set to `true`
pub const SKIP_IDENTIFIER_CHECK_ENV: &str = "EL_SKIP_IDENTIFIER_CHECK";

/// Words that can never be used as identifiers; must stay sorted
const RESERVED_WORDS: [&str; 54] = [
    "_",
    "abstract",
    "assert",
    "boolean",
    "break",
    "byte",
    "case",
    "catch",
    "char",
    "class",
    "const",
    "continue",
    "default",
    "do",
    "double",
    "else",
    "enum",
    "extends",
    "false",
    "final",
    "finally",
    "float",
    "for",
    "goto",
    "if",
    "implements",
    "import",
    "instanceof",
    "int",
    "interface",
    "long",
    "native",
    "new",
    "null",
    "package",
    "private",
    "protected",
    "public",
    "return",
    "short",
    "static",
    "strictfp",
    "super",
    "switch",
    "synchronized",
    "this",
    "throw",
    "throws",
    "transient",
    "true",
    "try",
    "void",
    "volatile",
    "while",
];

/// Policy deciding which names are valid identifiers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentifierPolicy {
    /// Accept every name without checking
    pub skip_check: bool,
}

impl IdentifierPolicy {
    /// Policy that checks every name
    pub fn strict() -> Self {
        Self { skip_check: false }
    }

    /// Policy that accepts every name
    pub fn permissive() -> Self {
        Self { skip_check: true }
    }

    /// Read the policy from `EL_SKIP_IDENTIFIER_CHECK`
    pub fn from_env() -> Self {
        let skip_check = std::env::var(SKIP_IDENTIFIER_CHECK_ENV)
            .map(|v| v.trim().eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        Self { skip_check }
    }

    /// Whether `name` may be used as an identifier
    pub fn is_identifier(&self, name: Option<&str>) -> bool {
        if self.skip_check {
            return true;
        }
        let Some(name) = name else {
            return false;
        };
        if name.is_empty() || name.starts_with('#') {
            return false;
        }
        RESERVED_WORDS.binary_search(&name).is_err()
    }
}

/// Whether `word` is reserved
pub fn is_reserved_word(word: &str) -> bool {
    RESERVED_WORDS.binary_search(&word).is_ok()
}
