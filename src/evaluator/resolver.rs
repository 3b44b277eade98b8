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

//! Resolver chain
//!
//! Every hook returns `None` when the resolver does not handle the
//! `(base, property)` pair, letting the next resolver of a
//! [`CompositeResolver`] try. A `base` of `None` stands for a top-level
//! identifier.

use super::context::ElContext;
use crate::error::{ElError, Result};
use crate::model::{ElObject, ElType, ElValue, TypeCoercion};
use crate::registry::build_parameters;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// Resolves properties and methods of base objects
pub trait ElResolver: Send + Sync {
    /// Read `property` of `base`
    fn get_value(
        &self,
        ctx: &ElContext,
        base: Option<&ElValue>,
        property: &ElValue,
    ) -> Option<Result<ElValue>>;

    /// Most general type accepted by [`set_value`](ElResolver::set_value)
    fn get_type(
        &self,
        ctx: &ElContext,
        base: Option<&ElValue>,
        property: &ElValue,
    ) -> Option<Result<ElType>>;

    /// Write `property` of `base`
    fn set_value(
        &self,
        ctx: &ElContext,
        base: Option<&ElValue>,
        property: &ElValue,
        value: ElValue,
    ) -> Option<Result<()>>;

    /// Whether `property` of `base` cannot be written
    fn is_read_only(
        &self,
        ctx: &ElContext,
        base: Option<&ElValue>,
        property: &ElValue,
    ) -> Option<Result<bool>>;

    /// Call method `method` of `base`
    ///
    /// `param_types` are the declared argument types when known; otherwise
    /// the runtime types of `args` are used.
    fn invoke(
        &self,
        _ctx: &ElContext,
        _base: &ElValue,
        _method: &str,
        _param_types: Option<&[ElType]>,
        _args: &[ElValue],
    ) -> Option<Result<ElValue>> {
        None
    }
}

fn property_name(property: &ElValue) -> String {
    TypeCoercion::coerce_to_string(property)
}

/// Resolves top-level identifiers against a table of values
#[derive(Debug, Default)]
pub struct VariableResolver {
    values: RwLock<FxHashMap<String, ElValue>>,
}

impl VariableResolver {
    /// Create an empty resolver
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style definition of a top-level value
    pub fn with(self, name: impl Into<String>, value: ElValue) -> Self {
        self.values.write().insert(name.into(), value);
        self
    }

    /// Define or replace a top-level value
    pub fn set(&self, name: impl Into<String>, value: ElValue) {
        self.values.write().insert(name.into(), value);
    }

    /// Current value of a top-level name
    pub fn get(&self, name: &str) -> Option<ElValue> {
        self.values.read().get(name).cloned()
    }

    /// Define every entry of a JSON object
    pub fn extend_from_json(&self, json: serde_json::Value) -> Result<()> {
        let serde_json::Value::Object(entries) = json else {
            return Err(ElError::Serialization {
                message: "variables must be a JSON object".to_string(),
            });
        };
        let mut values = self.values.write();
        for (name, value) in entries {
            values.insert(name, ElValue::from(value));
        }
        Ok(())
    }
}

impl ElResolver for VariableResolver {
    fn get_value(
        &self,
        _ctx: &ElContext,
        base: Option<&ElValue>,
        property: &ElValue,
    ) -> Option<Result<ElValue>> {
        if base.is_some() {
            return None;
        }
        self.get(&property_name(property)).map(Ok)
    }

    fn get_type(
        &self,
        _ctx: &ElContext,
        base: Option<&ElValue>,
        property: &ElValue,
    ) -> Option<Result<ElType>> {
        if base.is_some() {
            return None;
        }
        self.get(&property_name(property)).map(|_| Ok(ElType::Object))
    }

    fn set_value(
        &self,
        _ctx: &ElContext,
        base: Option<&ElValue>,
        property: &ElValue,
        value: ElValue,
    ) -> Option<Result<()>> {
        if base.is_some() {
            return None;
        }
        self.set(property_name(property), value);
        Some(Ok(()))
    }

    fn is_read_only(
        &self,
        _ctx: &ElContext,
        base: Option<&ElValue>,
        _property: &ElValue,
    ) -> Option<Result<bool>> {
        base.is_none().then_some(Ok(false))
    }
}

/// Resolves entries of map values; maps are read-only
#[derive(Debug, Default, Clone, Copy)]
pub struct MapResolver;

impl ElResolver for MapResolver {
    fn get_value(
        &self,
        _ctx: &ElContext,
        base: Option<&ElValue>,
        property: &ElValue,
    ) -> Option<Result<ElValue>> {
        let Some(ElValue::Map(entries)) = base else {
            return None;
        };
        Some(Ok(entries
            .get(&property_name(property))
            .cloned()
            .unwrap_or(ElValue::Null)))
    }

    fn get_type(
        &self,
        _ctx: &ElContext,
        base: Option<&ElValue>,
        _property: &ElValue,
    ) -> Option<Result<ElType>> {
        matches!(base, Some(ElValue::Map(_))).then_some(Ok(ElType::Object))
    }

    fn set_value(
        &self,
        _ctx: &ElContext,
        base: Option<&ElValue>,
        property: &ElValue,
        _value: ElValue,
    ) -> Option<Result<()>> {
        matches!(base, Some(ElValue::Map(_))).then(|| {
            Err(ElError::property_not_writable(format!(
                "Map entry '{}' is read-only",
                property_name(property)
            )))
        })
    }

    fn is_read_only(
        &self,
        _ctx: &ElContext,
        base: Option<&ElValue>,
        _property: &ElValue,
    ) -> Option<Result<bool>> {
        matches!(base, Some(ElValue::Map(_))).then_some(Ok(true))
    }
}

/// Resolves elements of array values by index; arrays are read-only
#[derive(Debug, Default, Clone, Copy)]
pub struct ArrayResolver;

impl ArrayResolver {
    fn index(property: &ElValue) -> Result<i64> {
        match TypeCoercion::coerce_to_number(property, &ElType::LONG_OBJ)? {
            ElValue::Long(index) => Ok(index),
            _ => Ok(-1),
        }
    }
}

impl ElResolver for ArrayResolver {
    fn get_value(
        &self,
        _ctx: &ElContext,
        base: Option<&ElValue>,
        property: &ElValue,
    ) -> Option<Result<ElValue>> {
        let Some(ElValue::Array { items, .. }) = base else {
            return None;
        };
        Some(Self::index(property).map(|index| {
            usize::try_from(index)
                .ok()
                .and_then(|i| items.get(i))
                .cloned()
                .unwrap_or(ElValue::Null)
        }))
    }

    fn get_type(
        &self,
        _ctx: &ElContext,
        base: Option<&ElValue>,
        _property: &ElValue,
    ) -> Option<Result<ElType>> {
        let Some(ElValue::Array { element_type, .. }) = base else {
            return None;
        };
        Some(Ok(element_type.clone()))
    }

    fn set_value(
        &self,
        _ctx: &ElContext,
        base: Option<&ElValue>,
        property: &ElValue,
        _value: ElValue,
    ) -> Option<Result<()>> {
        matches!(base, Some(ElValue::Array { .. })).then(|| {
            Err(ElError::property_not_writable(format!(
                "Array element [{}] is read-only",
                property_name(property)
            )))
        })
    }

    fn is_read_only(
        &self,
        _ctx: &ElContext,
        base: Option<&ElValue>,
        _property: &ElValue,
    ) -> Option<Result<bool>> {
        matches!(base, Some(ElValue::Array { .. })).then_some(Ok(true))
    }
}

fn object_base(base: Option<&ElValue>) -> Option<(&ElValue, &Arc<dyn ElObject>)> {
    let value = base?;
    match value {
        ElValue::Object(object) => Some((value, object)),
        _ => None,
    }
}

/// Resolves properties and methods of host objects through their class
/// definitions
#[derive(Debug, Default, Clone, Copy)]
pub struct BeanResolver;

impl BeanResolver {
    fn not_found(base: &ElValue, name: &str) -> ElError {
        ElError::property_not_found(format!(
            "Property '{name}' not found on type '{}'",
            base.type_name()
        ))
    }
}

impl ElResolver for BeanResolver {
    fn get_value(
        &self,
        _ctx: &ElContext,
        base: Option<&ElValue>,
        property: &ElValue,
    ) -> Option<Result<ElValue>> {
        let (base, object) = object_base(base)?;
        let name = property_name(property);
        let result = match object.class().find_property(&name) {
            Some(_) => object.get_property(&name),
            None => Err(Self::not_found(base, &name)),
        };
        Some(result)
    }

    fn get_type(
        &self,
        _ctx: &ElContext,
        base: Option<&ElValue>,
        property: &ElValue,
    ) -> Option<Result<ElType>> {
        let (base, object) = object_base(base)?;
        let name = property_name(property);
        Some(
            object
                .class()
                .find_property(&name)
                .map(|p| p.property_type.clone())
                .ok_or_else(|| Self::not_found(base, &name)),
        )
    }

    fn set_value(
        &self,
        _ctx: &ElContext,
        base: Option<&ElValue>,
        property: &ElValue,
        value: ElValue,
    ) -> Option<Result<()>> {
        let (base, object) = object_base(base)?;
        let name = property_name(property);
        let class = object.class();
        let result = match class.find_property(&name) {
            None => Err(Self::not_found(base, &name)),
            Some(prop) if !prop.writable => Err(ElError::property_not_writable(format!(
                "Property '{name}' is not writable on type '{}'",
                class.name()
            ))),
            Some(prop) => TypeCoercion::coerce_to_type(&value, &prop.property_type)
                .map_err(ElError::from)
                .and_then(|coerced| object.set_property(&name, coerced)),
        };
        Some(result)
    }

    fn is_read_only(
        &self,
        _ctx: &ElContext,
        base: Option<&ElValue>,
        property: &ElValue,
    ) -> Option<Result<bool>> {
        let (base, object) = object_base(base)?;
        let name = property_name(property);
        Some(
            object
                .class()
                .find_property(&name)
                .map(|p| !p.writable)
                .ok_or_else(|| Self::not_found(base, &name)),
        )
    }

    fn invoke(
        &self,
        ctx: &ElContext,
        base: &ElValue,
        method: &str,
        param_types: Option<&[ElType]>,
        args: &[ElValue],
    ) -> Option<Result<ElValue>> {
        let ElValue::Object(object) = base else {
            return None;
        };
        let runtime_types: Vec<ElType>;
        let types = match param_types {
            Some(types) => types,
            None => {
                runtime_types = args.iter().map(ElValue::el_type).collect();
                &runtime_types
            }
        };
        let result = ctx
            .member_resolver()
            .resolve_member(base, method, Some(types), Some(args))
            .and_then(|member| {
                let parameters = build_parameters(&member, args)?;
                object.invoke(&member, parameters)
            });
        Some(result)
    }
}

/// Chain of resolvers; the first one handling a pair wins
#[derive(Default, Clone)]
pub struct CompositeResolver {
    resolvers: Vec<Arc<dyn ElResolver>>,
}

impl CompositeResolver {
    /// Create an empty chain
    pub fn new() -> Self {
        Self::default()
    }

    /// The default chain: variables, maps, arrays, host objects
    pub fn standard(variables: Arc<VariableResolver>) -> Self {
        Self::new()
            .with(variables)
            .with(Arc::new(MapResolver))
            .with(Arc::new(ArrayResolver))
            .with(Arc::new(BeanResolver))
    }

    /// Append a resolver
    pub fn with(mut self, resolver: Arc<dyn ElResolver>) -> Self {
        self.resolvers.push(resolver);
        self
    }

    /// Append a resolver in place
    pub fn add(&mut self, resolver: Arc<dyn ElResolver>) {
        self.resolvers.push(resolver);
    }

    /// Number of resolvers in the chain
    pub fn len(&self) -> usize {
        self.resolvers.len()
    }

    /// Whether the chain is empty
    pub fn is_empty(&self) -> bool {
        self.resolvers.is_empty()
    }
}

impl ElResolver for CompositeResolver {
    fn get_value(
        &self,
        ctx: &ElContext,
        base: Option<&ElValue>,
        property: &ElValue,
    ) -> Option<Result<ElValue>> {
        self.resolvers
            .iter()
            .find_map(|r| r.get_value(ctx, base, property))
    }

    fn get_type(
        &self,
        ctx: &ElContext,
        base: Option<&ElValue>,
        property: &ElValue,
    ) -> Option<Result<ElType>> {
        self.resolvers
            .iter()
            .find_map(|r| r.get_type(ctx, base, property))
    }

    fn set_value(
        &self,
        ctx: &ElContext,
        base: Option<&ElValue>,
        property: &ElValue,
        value: ElValue,
    ) -> Option<Result<()>> {
        for resolver in &self.resolvers {
            if let Some(result) = resolver.set_value(ctx, base, property, value.clone()) {
                return Some(result);
            }
        }
        None
    }

    fn is_read_only(
        &self,
        ctx: &ElContext,
        base: Option<&ElValue>,
        property: &ElValue,
    ) -> Option<Result<bool>> {
        self.resolvers
            .iter()
            .find_map(|r| r.is_read_only(ctx, base, property))
    }

    fn invoke(
        &self,
        ctx: &ElContext,
        base: &ElValue,
        method: &str,
        param_types: Option<&[ElType]>,
        args: &[ElValue],
    ) -> Option<Result<ElValue>> {
        self.resolvers
            .iter()
            .find_map(|r| r.invoke(ctx, base, method, param_types, args))
    }
}
