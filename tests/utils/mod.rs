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

//! Shared fixtures for the integration tests

#![allow(dead_code)]

use el_runtime::{
    CandidateMember, ClassDef, ElContext, ElError, ElObject, ElType, ElValue, ExpressionFactory,
    Result, TypeCoercion, VariableResolver,
};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, OnceLock};

/// Host object with overloaded methods and one writable property
#[derive(Debug)]
pub struct Calculator {
    precision: AtomicI32,
}

impl Calculator {
    pub fn new(precision: i32) -> Self {
        Self {
            precision: AtomicI32::new(precision),
        }
    }

    pub fn precision(&self) -> i32 {
        self.precision.load(Ordering::SeqCst)
    }

    /// Class definition shared by every calculator
    pub fn class_def() -> Arc<ClassDef> {
        static CLASS: OnceLock<Arc<ClassDef>> = OnceLock::new();
        Arc::clone(CLASS.get_or_init(|| {
            let long = ElType::LONG_OBJ;
            let double = ElType::DOUBLE_OBJ;
            ClassDef::builder("test.Calculator")
                .property("precision", ElType::INT, true)
                .property("name", ElType::String, false)
                .method(CandidateMember::new("add", vec![long.clone(), long.clone()], long.clone()))
                .method(CandidateMember::new(
                    "add",
                    vec![double.clone(), double.clone()],
                    double,
                ))
                .method(CandidateMember::new("describe", vec![ElType::Number], ElType::String))
                .method(CandidateMember::new("describe", vec![ElType::Object], ElType::String))
                .method(CandidateMember::new("pick", vec![ElType::INTEGER], ElType::String))
                .method(CandidateMember::new("pick", vec![long], ElType::String))
                .method(CandidateMember::variadic(
                    "join",
                    vec![ElType::String],
                    ElType::Object,
                    ElType::String,
                ))
                .build()
        }))
    }
}

impl ElObject for Calculator {
    fn class(&self) -> Arc<ClassDef> {
        Self::class_def()
    }

    fn get_property(&self, name: &str) -> Result<ElValue> {
        match name {
            "precision" => Ok(ElValue::Int(self.precision())),
            "name" => Ok(ElValue::string("calc")),
            other => Err(ElError::property_not_found(other.to_string())),
        }
    }

    fn set_property(&self, name: &str, value: ElValue) -> Result<()> {
        match (name, value) {
            ("precision", ElValue::Int(v)) => {
                self.precision.store(v, Ordering::SeqCst);
                Ok(())
            }
            (other, _) => Err(ElError::property_not_writable(other.to_string())),
        }
    }

    fn invoke(&self, member: &CandidateMember, args: Vec<ElValue>) -> Result<ElValue> {
        let first = member.parameter_types().first().cloned();
        match (member.name(), args.as_slice()) {
            ("add", [ElValue::Long(a), ElValue::Long(b)]) => Ok(ElValue::Long(a + b)),
            ("add", [ElValue::Double(a), ElValue::Double(b)]) => Ok(ElValue::Double(a + b)),
            ("describe", [_]) if first == Some(ElType::Number) => Ok(ElValue::string("number")),
            ("describe", [_]) => Ok(ElValue::string("object")),
            ("pick", [value]) => Ok(ElValue::string(format!("{}:{value}", value.type_name()))),
            ("join", [ElValue::String(sep), ElValue::Array { items, .. }]) => {
                let parts: Vec<String> = items.iter().map(TypeCoercion::coerce_to_string).collect();
                Ok(ElValue::string(parts.join(sep.as_str())))
            }
            _ => Err(ElError::Invocation {
                member: member.signature(),
                message: "unexpected arguments".to_string(),
            }),
        }
    }
}

/// Top-level values used across the integration tests
pub fn variables() -> VariableResolver {
    let mut user = BTreeMap::new();
    user.insert("name".to_string(), ElValue::string("Ada"));
    user.insert("age".to_string(), ElValue::Long(36));
    VariableResolver::new()
        .with("user", ElValue::map(user))
        .with("calc", ElValue::object(Calculator::new(2)))
        .with("n", ElValue::Int(5))
        .with("nothing", ElValue::Null)
}

/// A factory and a standard context over [`variables`]
pub fn setup() -> (ExpressionFactory, ElContext) {
    let factory = ExpressionFactory::new();
    let ctx = factory.standard_context(Arc::new(variables()));
    (factory, ctx)
}

/// Host object whose overloads differ only in exactness
///
/// The less specific overload of each pair is declared first.
#[derive(Debug)]
pub struct Overloads;

impl Overloads {
    pub fn class_def() -> Arc<ClassDef> {
        static CLASS: OnceLock<Arc<ClassDef>> = OnceLock::new();
        Arc::clone(CLASS.get_or_init(|| {
            ClassDef::builder("test.Overloads")
                .method(CandidateMember::new("f", vec![ElType::Object], ElType::String))
                .method(CandidateMember::new("f", vec![ElType::INT], ElType::String))
                .method(CandidateMember::variadic(
                    "g",
                    vec![ElType::INT],
                    ElType::Object,
                    ElType::String,
                ))
                .method(CandidateMember::new(
                    "g",
                    vec![ElType::INT, ElType::String],
                    ElType::String,
                ))
                .build()
        }))
    }
}

impl ElObject for Overloads {
    fn class(&self) -> Arc<ClassDef> {
        Self::class_def()
    }

    fn get_property(&self, name: &str) -> Result<ElValue> {
        Err(ElError::property_not_found(name.to_string()))
    }

    fn invoke(&self, member: &CandidateMember, _args: Vec<ElValue>) -> Result<ElValue> {
        Ok(ElValue::string(member.signature()))
    }
}
