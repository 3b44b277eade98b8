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

//! Function mapping for `prefix:name(...)` calls

use crate::error::{ElError, Result};
use crate::model::{ElType, ElValue, TypeCoercion};
use crate::registry::{CandidateMember, build_parameters};
use rustc_hash::FxHashMap;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Native implementation of an EL function; receives arguments already
/// coerced to the declared parameter types
pub type NativeFunction = Arc<dyn Fn(&[ElValue]) -> Result<ElValue> + Send + Sync>;

/// A function callable from expressions
#[derive(Clone)]
pub struct ElFunction {
    prefix: String,
    signature: CandidateMember,
    body: NativeFunction,
}

impl ElFunction {
    /// Create a function; the local name is the signature's name
    pub fn new<F>(prefix: impl Into<String>, signature: CandidateMember, body: F) -> Self
    where
        F: Fn(&[ElValue]) -> Result<ElValue> + Send + Sync + 'static,
    {
        Self {
            prefix: prefix.into(),
            signature,
            body: Arc::new(body),
        }
    }

    /// Namespace prefix; empty for unprefixed functions
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Local name of the function
    pub fn local_name(&self) -> &str {
        self.signature.name()
    }

    /// Name as written in expressions
    pub fn qualified_name(&self) -> String {
        qualified_name(&self.prefix, self.signature.name())
    }

    /// Declared signature
    pub fn signature(&self) -> &CandidateMember {
        &self.signature
    }

    /// Coerce `args` to the signature and call the function
    pub fn call(&self, args: &[ElValue]) -> Result<ElValue> {
        let parameters = build_parameters(&self.signature, args)?;
        (self.body)(&parameters)
    }
}

impl fmt::Debug for ElFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElFunction")
            .field("prefix", &self.prefix)
            .field("signature", &self.signature.signature())
            .finish()
    }
}

/// `prefix:local` or `local` when the prefix is empty
pub fn qualified_name(prefix: &str, local_name: &str) -> String {
    if prefix.is_empty() {
        local_name.to_string()
    } else {
        format!("{prefix}:{local_name}")
    }
}

/// Maps `(prefix, local_name)` pairs to functions
pub trait FunctionMapper: Send + Sync {
    /// Look up a function
    fn resolve_function(&self, prefix: &str, local_name: &str) -> Option<ElFunction>;
}

/// A registry of native functions
#[derive(Debug, Clone, Default)]
pub struct FunctionLibrary {
    functions: FxHashMap<(String, String), ElFunction>,
}

impl FunctionLibrary {
    /// Create an empty library
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a function, replacing any previous one with the same name
    pub fn register(&mut self, function: ElFunction) -> &mut Self {
        let key = (
            function.prefix().to_string(),
            function.local_name().to_string(),
        );
        self.functions.insert(key, function);
        self
    }

    /// Register a native closure under `prefix`
    pub fn define<F>(&mut self, prefix: &str, signature: CandidateMember, body: F) -> &mut Self
    where
        F: Fn(&[ElValue]) -> Result<ElValue> + Send + Sync + 'static,
    {
        self.register(ElFunction::new(prefix, signature, body))
    }

    /// Number of registered functions
    pub fn len(&self) -> usize {
        self.functions.len()
    }

    /// Whether the library is empty
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    /// String functions under the `fn` prefix
    pub fn standard() -> Self {
        let mut library = Self::new();
        let string = || ElType::String;
        library
            .define(
                "fn",
                CandidateMember::new("length", vec![ElType::Object], ElType::INT),
                |args| {
                    let length = match &args[0] {
                        ElValue::Null => 0,
                        ElValue::Array { items, .. } => items.len(),
                        ElValue::Map(entries) => entries.len(),
                        other => TypeCoercion::coerce_to_string(other).chars().count(),
                    };
                    Ok(ElValue::Int(length as i32))
                },
            )
            .define(
                "fn",
                CandidateMember::new("toUpperCase", vec![string()], string()),
                |args| Ok(ElValue::String(text(&args[0]).to_uppercase())),
            )
            .define(
                "fn",
                CandidateMember::new("toLowerCase", vec![string()], string()),
                |args| Ok(ElValue::String(text(&args[0]).to_lowercase())),
            )
            .define(
                "fn",
                CandidateMember::new("trim", vec![string()], string()),
                |args| Ok(ElValue::String(text(&args[0]).trim().to_string())),
            )
            .define(
                "fn",
                CandidateMember::new("contains", vec![string(), string()], ElType::BOOLEAN),
                |args| Ok(ElValue::Boolean(text(&args[0]).contains(text(&args[1])))),
            )
            .define(
                "fn",
                CandidateMember::new("startsWith", vec![string(), string()], ElType::BOOLEAN),
                |args| Ok(ElValue::Boolean(text(&args[0]).starts_with(text(&args[1])))),
            )
            .define(
                "fn",
                CandidateMember::new("endsWith", vec![string(), string()], ElType::BOOLEAN),
                |args| Ok(ElValue::Boolean(text(&args[0]).ends_with(text(&args[1])))),
            )
            .define(
                "fn",
                CandidateMember::new(
                    "substring",
                    vec![string(), ElType::INT, ElType::INT],
                    string(),
                ),
                |args| {
                    let chars: Vec<char> = text(&args[0]).chars().collect();
                    let begin = index(&args[1]).min(chars.len());
                    let end = match args[2] {
                        ElValue::Int(end) if end >= 0 => (end as usize).min(chars.len()),
                        _ => chars.len(),
                    };
                    let result = if begin < end {
                        chars[begin..end].iter().collect()
                    } else {
                        String::new()
                    };
                    Ok(ElValue::String(result))
                },
            )
            .define(
                "fn",
                CandidateMember::new(
                    "join",
                    vec![ElType::array_of(string()), string()],
                    string(),
                ),
                |args| {
                    let ElValue::Array { items, .. } = &args[0] else {
                        return Ok(ElValue::String(String::new()));
                    };
                    let parts: Vec<String> =
                        items.iter().map(TypeCoercion::coerce_to_string).collect();
                    Ok(ElValue::String(parts.join(text(&args[1]))))
                },
            )
            .define(
                "fn",
                CandidateMember::variadic("concat", vec![], ElType::Object, string()),
                |args| {
                    let ElValue::Array { items, .. } = &args[0] else {
                        return Ok(ElValue::String(String::new()));
                    };
                    Ok(ElValue::String(
                        items.iter().map(TypeCoercion::coerce_to_string).collect(),
                    ))
                },
            );
        library
    }
}

fn text(value: &ElValue) -> &str {
    value.as_str().unwrap_or_default()
}

fn index(value: &ElValue) -> usize {
    match value {
        ElValue::Int(v) if *v > 0 => *v as usize,
        _ => 0,
    }
}

impl FunctionMapper for FunctionLibrary {
    fn resolve_function(&self, prefix: &str, local_name: &str) -> Option<ElFunction> {
        self.functions
            .get(&(prefix.to_string(), local_name.to_string()))
            .cloned()
    }
}

/// Functions captured by an expression when it was built
///
/// Keyed by qualified name so that the captured set serializes in a stable
/// order.
#[derive(Debug, Clone, Default)]
pub struct FunctionBindings {
    functions: BTreeMap<String, ElFunction>,
}

impl FunctionBindings {
    /// Create empty bindings
    pub fn new() -> Self {
        Self::default()
    }

    /// Capture a function
    pub fn insert(&mut self, function: ElFunction) {
        self.functions.insert(function.qualified_name(), function);
    }

    /// Captured function for a call site
    pub fn get(&self, prefix: &str, local_name: &str) -> Option<&ElFunction> {
        self.functions.get(&qualified_name(prefix, local_name))
    }

    /// Qualified names of the captured functions, sorted
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.functions.keys().map(String::as_str)
    }

    /// Number of captured functions
    pub fn len(&self) -> usize {
        self.functions.len()
    }

    /// Whether nothing was captured
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    /// Re-resolve captured names through `mapper`
    pub fn restore<'a>(
        names: impl IntoIterator<Item = &'a str>,
        mapper: Option<&dyn FunctionMapper>,
    ) -> Result<Self> {
        let mut bindings = Self::new();
        for name in names {
            let (prefix, local_name) = name.split_once(':').unwrap_or(("", name));
            let function = mapper
                .and_then(|m| m.resolve_function(prefix, local_name))
                .ok_or_else(|| ElError::FunctionNotFound {
                    function: name.to_string(),
                })?;
            bindings.insert(function);
        }
        Ok(bindings)
    }
}

impl FunctionMapper for FunctionBindings {
    fn resolve_function(&self, prefix: &str, local_name: &str) -> Option<ElFunction> {
        self.get(prefix, local_name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_standard_library_lookup() {
        let library = FunctionLibrary::standard();
        let upper = library.resolve_function("fn", "toUpperCase").unwrap();
        assert_eq!(upper.qualified_name(), "fn:toUpperCase");
        assert_eq!(
            upper.call(&[ElValue::string("abc")]).unwrap(),
            ElValue::string("ABC")
        );
        assert!(library.resolve_function("", "toUpperCase").is_none());
    }

    #[test]
    fn test_call_coerces_arguments() {
        let library = FunctionLibrary::standard();
        let substring = library.resolve_function("fn", "substring").unwrap();
        let result = substring
            .call(&[
                ElValue::string("expression"),
                ElValue::Long(2),
                ElValue::string("5"),
            ])
            .unwrap();
        assert_eq!(result, ElValue::string("pre"));
    }

    #[test]
    fn test_variadic_function() {
        let library = FunctionLibrary::standard();
        let concat = library.resolve_function("fn", "concat").unwrap();
        let result = concat
            .call(&[ElValue::string("a"), ElValue::Long(1), ElValue::Null])
            .unwrap();
        assert_eq!(result, ElValue::string("a1"));
        assert_eq!(concat.call(&[]).unwrap(), ElValue::string(""));
    }

    #[test]
    fn test_arity_mismatch_is_an_error() {
        let library = FunctionLibrary::standard();
        let trim = library.resolve_function("fn", "trim").unwrap();
        assert!(matches!(
            trim.call(&[]),
            Err(ElError::Invocation { .. })
        ));
    }

    #[test]
    fn test_bindings_restore() {
        let library = FunctionLibrary::standard();
        let mapper: &dyn FunctionMapper = &library;
        let bindings = FunctionBindings::restore(["fn:trim", "fn:length"], Some(mapper)).unwrap();
        assert_eq!(bindings.names().collect::<Vec<_>>(), vec!["fn:length", "fn:trim"]);

        let err = FunctionBindings::restore(["fn:missing"], Some(mapper)).unwrap_err();
        assert_eq!(
            err,
            ElError::FunctionNotFound {
                function: "fn:missing".to_string()
            }
        );
        assert!(FunctionBindings::restore(["fn:trim"], None).is_err());
    }
}
