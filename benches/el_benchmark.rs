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

use criterion::{Criterion, criterion_group, criterion_main};
use el_runtime::{
    CandidateMember, ClassDef, ElObject, ElType, ElValue, ExpressionBuilder, ExpressionFactory,
    IdentifierPolicy, MemberResolver, Result, VariableResolver,
};
use std::collections::BTreeMap;
use std::hint::black_box;
use std::sync::Arc;

const EXPRESSIONS: &[&str] = &[
    "plain text without expressions",
    "${user.name}",
    "Hello ${user.name}, you have ${count + 1} messages",
    "${count > 10 and not empty user.name ? 'busy' : 'idle'}",
    "${fn:toUpperCase(fn:trim(user.name))}",
];

#[derive(Debug)]
struct Meter;

impl Meter {
    fn class() -> Arc<ClassDef> {
        ClassDef::builder("bench.Meter")
            .method(CandidateMember::new("scale", vec![ElType::Number], ElType::DOUBLE))
            .method(CandidateMember::new("scale", vec![ElType::Object], ElType::DOUBLE))
            .method(CandidateMember::new("scale", vec![ElType::LONG], ElType::DOUBLE))
            .build()
    }
}

impl ElObject for Meter {
    fn class(&self) -> Arc<ClassDef> {
        Meter::class()
    }

    fn get_property(&self, _name: &str) -> Result<ElValue> {
        Ok(ElValue::Null)
    }

    fn invoke(&self, _member: &CandidateMember, _args: Vec<ElValue>) -> Result<ElValue> {
        Ok(ElValue::Double(1.0))
    }
}

fn benchmark_parse_uncached(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_uncached");
    for (i, source) in EXPRESSIONS.iter().enumerate() {
        group.bench_function(format!("expr_{i}"), |b| {
            b.iter(|| black_box(el_runtime::parse(black_box(source))))
        });
    }
    group.finish();
}

fn benchmark_parse_cached(c: &mut Criterion) {
    let builder = ExpressionBuilder::new(1000, IdentifierPolicy::default());
    let mut group = c.benchmark_group("parse_cached");
    for (i, source) in EXPRESSIONS.iter().enumerate() {
        group.bench_function(format!("expr_{i}"), |b| {
            b.iter(|| black_box(builder.parse(black_box(source))))
        });
    }
    group.finish();
}

fn benchmark_evaluate(c: &mut Criterion) {
    let factory = ExpressionFactory::new();
    let mut user = BTreeMap::new();
    user.insert("name".to_string(), ElValue::string("  Ada Lovelace  "));
    let variables = VariableResolver::new()
        .with("user", ElValue::map(user))
        .with("count", ElValue::Long(12));
    let ctx = factory.standard_context(Arc::new(variables));

    let mut group = c.benchmark_group("evaluate");
    for (i, source) in EXPRESSIONS.iter().enumerate() {
        let Ok(expr) = factory.create_value_expression(&ctx, source, ElType::String) else {
            continue;
        };
        group.bench_function(format!("expr_{i}"), |b| {
            b.iter(|| black_box(expr.get_value(&ctx)))
        });
    }
    group.finish();
}

fn benchmark_member_resolution(c: &mut Criterion) {
    let resolver = MemberResolver::new();
    let meter = ElValue::object(Meter);
    let exact = [ElType::LONG];
    let ancestor = [ElType::INTEGER];

    c.bench_function("resolve_member_exact", |b| {
        b.iter(|| black_box(resolver.resolve_member(&meter, "scale", Some(&exact), None)))
    });
    c.bench_function("resolve_member_nearest_superclass", |b| {
        b.iter(|| black_box(resolver.resolve_member(&meter, "scale", Some(&ancestor), None)))
    });
}

criterion_group!(
    benches,
    benchmark_parse_uncached,
    benchmark_parse_cached,
    benchmark_evaluate,
    benchmark_member_resolution
);
criterion_main!(benches);
