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

//! Overload selection against host classes

mod utils;

use el_runtime::{ElError, ElType, ElValue, Expression, MemberResolver};
use pretty_assertions::assert_eq;
use rstest::rstest;
use utils::{Calculator, Overloads, setup};

fn calculator() -> ElValue {
    ElValue::object(Calculator::new(2))
}

#[test]
fn variadic_member_requires_the_fixed_arguments() {
    let resolver = MemberResolver::new();
    let base = calculator();

    let err = resolver
        .resolve_member(&base, "join", Some(&[ElType::String]), None)
        .unwrap_err();
    assert!(matches!(err, ElError::MemberNotFound { .. }), "{err:?}");

    let member = resolver
        .resolve_member(
            &base,
            "join",
            Some(&[ElType::String, ElType::LONG_OBJ, ElType::String]),
            None,
        )
        .unwrap();
    assert_eq!(member.signature(), "join(String, Object...)");
}

#[test]
fn sibling_numeric_overloads_are_ambiguous() {
    let resolver = MemberResolver::new();
    let err = resolver
        .resolve_member(
            &calculator(),
            "pick",
            Some(&[ElType::SHORT_OBJ]),
            Some(&[ElValue::Short(1)]),
        )
        .unwrap_err();
    assert_eq!(
        err,
        ElError::AmbiguousMember {
            base: "test.Calculator".to_string(),
            name: "pick".to_string(),
            params: "Short".to_string(),
        }
    );
}

#[rstest]
#[case(None)]
#[case(Some(vec![ElValue::Int(1)]))]
fn exact_primitive_overload_wins_over_object(#[case] values: Option<Vec<ElValue>>) {
    let resolver = MemberResolver::new();
    let member = resolver
        .resolve_member(
            &ElValue::object(Overloads),
            "f",
            Some(&[ElType::INT]),
            values.as_deref(),
        )
        .unwrap();
    assert_eq!(member.signature(), "f(int)");
}

#[rstest]
#[case(None)]
#[case(Some(vec![ElValue::Int(1), ElValue::string("x")]))]
fn fixed_overload_wins_over_variadic(#[case] values: Option<Vec<ElValue>>) {
    let resolver = MemberResolver::new();
    let member = resolver
        .resolve_member(
            &ElValue::object(Overloads),
            "g",
            Some(&[ElType::INT, ElType::String]),
            values.as_deref(),
        )
        .unwrap();
    assert_eq!(member.signature(), "g(int, String)");
    assert!(!member.is_variadic());
}

#[test]
fn nearest_superclass_wins_a_tie() {
    let resolver = MemberResolver::new();
    let member = resolver
        .resolve_member(&calculator(), "describe", Some(&[ElType::INTEGER]), None)
        .unwrap();
    assert_eq!(member.parameter_types(), &[ElType::Number]);
}

#[rstest]
#[case("${calc.add(1, 2)}", ElValue::Long(3))]
#[case("${calc.describe(n)}", ElValue::string("number"))]
#[case("${calc.describe('x')}", ElValue::string("object"))]
#[case("${calc.pick(7)}", ElValue::string("Long:7"))]
#[case("${calc.join('-', 1, 'b', true)}", ElValue::string("1-b-true"))]
#[case("${nothing.add(1, 2)}", ElValue::Null)]
fn method_calls_in_expressions(#[case] source: &str, #[case] expected: ElValue) {
    let (factory, ctx) = setup();
    let expr = factory
        .create_value_expression(&ctx, source, ElType::Object)
        .unwrap();
    assert_eq!(expr.get_value(&ctx).unwrap(), expected);
}

#[test]
fn unknown_method_is_reported_with_argument_types() {
    let (factory, ctx) = setup();
    let expr = factory
        .create_value_expression(&ctx, "${calc.subtract(1, 2)}", ElType::Object)
        .unwrap();
    assert_eq!(
        expr.get_value(&ctx).unwrap_err(),
        ElError::MemberNotFound {
            base: "test.Calculator".to_string(),
            name: "subtract".to_string(),
            params: "Long, Long".to_string(),
        }
    );
}

#[test]
fn method_expression_with_declared_parameter_types() {
    let (factory, ctx) = setup();

    let describe = factory
        .create_method_expression(&ctx, "${calc.describe}", None, &[ElType::INTEGER])
        .unwrap();
    assert!(!describe.is_literal_text());
    assert!(!describe.is_parameters_provided());
    assert_eq!(describe.expression_string(), "${calc.describe}");
    assert_eq!(
        describe.invoke(&ctx, &[ElValue::Int(4)]).unwrap(),
        ElValue::string("number")
    );
    let info = describe.method_info(&ctx).unwrap();
    assert_eq!(info.name(), "describe");
    assert_eq!(info.return_type(), &ElType::String);
    assert_eq!(info.param_types(), &[ElType::Number]);

    let pick = factory
        .create_method_expression(&ctx, "${calc.pick}", None, &[ElType::SHORT_OBJ])
        .unwrap();
    assert!(matches!(
        pick.invoke(&ctx, &[ElValue::Short(1)]),
        Err(ElError::AmbiguousMember { .. })
    ));
}

#[test]
fn method_expression_with_its_own_arguments() {
    let (factory, ctx) = setup();
    let add = factory
        .create_method_expression(&ctx, "${calc.add(20, 22)}", Some(ElType::String), &[])
        .unwrap();
    assert!(add.is_parameters_provided());
    assert_eq!(add.invoke(&ctx, &[]).unwrap(), ElValue::string("42"));
}

#[test]
fn candidate_lists_are_cached_per_class_and_name() {
    let resolver = MemberResolver::new();
    let base = calculator();
    for _ in 0..3 {
        resolver
            .resolve_member(&base, "add", Some(&[ElType::LONG_OBJ, ElType::LONG_OBJ]), None)
            .unwrap();
    }
    let stats = resolver.cache_stats();
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.hits(), 2);
}
