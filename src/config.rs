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

//! Engine configuration options

use crate::parser::identifier::IdentifierPolicy;
use serde::Deserialize;

/// Environment variable overriding [`EngineConfig::parse_cache_capacity`]
pub const PARSE_CACHE_SIZE_ENV: &str = "EL_PARSE_CACHE_SIZE";

/// Environment variable overriding [`EngineConfig::member_cache_capacity`]
pub const MEMBER_CACHE_SIZE_ENV: &str = "EL_MEMBER_CACHE_SIZE";

/// Configuration for an [`ExpressionFactory`](crate::ExpressionFactory)
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Which names the parser accepts as identifiers
    pub identifier_policy: IdentifierPolicy,

    /// Hot-tier capacity of the parse cache
    pub parse_cache_capacity: usize,

    /// Hot-tier capacity of the member candidate cache
    pub member_cache_capacity: usize,
}

impl EngineConfig {
    /// Create a new configuration with custom settings
    pub fn new(
        identifier_policy: IdentifierPolicy,
        parse_cache_capacity: usize,
        member_cache_capacity: usize,
    ) -> Self {
        Self {
            identifier_policy,
            parse_cache_capacity,
            member_cache_capacity,
        }
    }

    /// Create a configuration optimized for high performance
    pub fn high_performance() -> Self {
        Self {
            parse_cache_capacity: 50_000,
            member_cache_capacity: 10_000,
            ..Self::default()
        }
    }

    /// Create a configuration optimized for low memory usage
    pub fn low_memory() -> Self {
        Self {
            parse_cache_capacity: 100,
            member_cache_capacity: 50,
            ..Self::default()
        }
    }

    /// Defaults overridden by `EL_SKIP_IDENTIFIER_CHECK`,
    /// `EL_PARSE_CACHE_SIZE` and `EL_MEMBER_CACHE_SIZE`
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            identifier_policy: IdentifierPolicy::from_env(),
            parse_cache_capacity: env_usize(PARSE_CACHE_SIZE_ENV)
                .unwrap_or(defaults.parse_cache_capacity),
            member_cache_capacity: env_usize(MEMBER_CACHE_SIZE_ENV)
                .unwrap_or(defaults.member_cache_capacity),
        }
    }

    /// Replace the identifier policy
    pub fn with_identifier_policy(mut self, policy: IdentifierPolicy) -> Self {
        self.identifier_policy = policy;
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            identifier_policy: IdentifierPolicy::default(),
            parse_cache_capacity: 5_000,
            member_cache_capacity: 1_000,
        }
    }
}

fn env_usize(name: &str) -> Option<usize> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            log::warn!("Ignoring {name}={raw:?}: not a non-negative integer");
            None
        }
    }
}
