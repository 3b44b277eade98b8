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

//! EL expression parser
//!
//! Source text is split into literal text and `${...}` / `#{...}` blocks; the
//! inside of each block goes through a hand-written tokenizer and a Pratt
//! parser. [`ExpressionBuilder`] puts a generational cache in front of it.

pub mod identifier;
pub mod pratt;
pub mod tokenizer;

pub use identifier::{IdentifierPolicy, is_reserved_word};
pub use pratt::{PrattParser, parse_template};

use crate::ast::ExpressionNode;
use crate::config::EngineConfig;
use crate::error::Result;
use crate::registry::{CacheStats, GenerationalCache};
use std::sync::Arc;

/// Parse EL source text into an AST without caching
pub fn parse(input: &str) -> Result<ExpressionNode> {
    parse_template(input, IdentifierPolicy::default())
}

/// Cached parser front end
///
/// Parse results are shared: parsing the same source twice returns the same
/// `Arc`. Failures are not cached.
#[derive(Debug)]
pub struct ExpressionBuilder {
    cache: GenerationalCache<String, Arc<ExpressionNode>>,
    policy: IdentifierPolicy,
}

impl ExpressionBuilder {
    /// Create a builder with the given cache capacity and identifier policy
    pub fn new(cache_capacity: usize, policy: IdentifierPolicy) -> Self {
        Self {
            cache: GenerationalCache::new(cache_capacity),
            policy,
        }
    }

    /// Create a builder from an engine configuration
    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.parse_cache_capacity, config.identifier_policy)
    }

    /// Identifier policy applied while parsing
    pub fn policy(&self) -> IdentifierPolicy {
        self.policy
    }

    /// Parse `source`, consulting the cache first
    pub fn parse(&self, source: &str) -> Result<Arc<ExpressionNode>> {
        let key = source.to_string();
        if let Some(node) = self.cache.get(&key) {
            return Ok(node);
        }

        log::debug!("Parse cache miss for {source:?}");
        let node = Arc::new(parse_template(source, self.policy)?);
        self.cache.put(key, Arc::clone(&node));
        Ok(node)
    }

    /// Statistics of the parse cache
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Drop the cold tier of the parse cache
    pub fn sweep(&self) -> usize {
        self.cache.sweep()
    }
}

impl Default for ExpressionBuilder {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}
