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

//! End-to-end behaviour of value expressions

mod utils;

use el_runtime::{
    ElContext, ElError, ElType, ElValue, EvaluationListener, Expression, FunctionLibrary,
    FunctionMapper, MapVariableMapper, SerializedValueExpression, TypeCoercion, ValueExpression,
    VariableMapper,
};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use rstest::rstest;
use rustc_hash::{FxHashSet, FxHasher};
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use utils::{Calculator, setup};

#[derive(Default)]
struct RecordingListener {
    events: Mutex<Vec<String>>,
}

impl EvaluationListener for RecordingListener {
    fn before_evaluation(&self, expression: &str) {
        self.events.lock().push(format!("before {expression}"));
    }

    fn after_evaluation(&self, expression: &str) {
        self.events.lock().push(format!("after {expression}"));
    }
}

#[rstest]
#[case("Hello ${user.name}!", ElValue::string("Hello Ada!"))]
#[case("${user.age + 4}", ElValue::Long(40))]
#[case("${user.age / 8}", ElValue::Double(4.5))]
#[case("${user.age mod 5}", ElValue::Long(1))]
#[case("${'3' + 4}", ElValue::Long(7))]
#[case("${'1.5' + 1}", ElValue::Double(2.5))]
#[case("${nothing + nothing}", ElValue::Long(0))]
#[case("${-n}", ElValue::Int(-5))]
#[case("${n gt 4 and user.name eq 'Ada'}", ElValue::Boolean(true))]
#[case("${nothing < 1}", ElValue::Boolean(false))]
#[case("${empty nothing}", ElValue::Boolean(true))]
#[case("${not empty user}", ElValue::Boolean(true))]
#[case("${n > 3 ? 'big' : 'small'}", ElValue::string("big"))]
#[case("${user['name']}", ElValue::string("Ada"))]
#[case("${user.missing}", ElValue::Null)]
#[case("${nothing.name}", ElValue::Null)]
#[case("${fn:length(user.name)}", ElValue::Int(3))]
#[case("${calc.precision}", ElValue::Int(2))]
fn evaluates_to(#[case] source: &str, #[case] expected: ElValue) {
    let (factory, ctx) = setup();
    let expr = factory
        .create_value_expression(&ctx, source, ElType::Object)
        .unwrap();
    assert_eq!(expr.get_value(&ctx).unwrap(), expected);
}

#[rstest]
#[case("${n}", ElType::String, ElValue::string("5"))]
#[case("${user.age}", ElType::INT, ElValue::Int(36))]
#[case("${nothing}", ElType::LONG, ElValue::Long(0))]
#[case("${nothing}", ElType::String, ElValue::string(""))]
#[case("${'true'}", ElType::BOOLEAN, ElValue::Boolean(true))]
#[case("plain", ElType::String, ElValue::string("plain"))]
fn results_are_coerced_to_the_expected_type(
    #[case] source: &str,
    #[case] expected_type: ElType,
    #[case] expected: ElValue,
) {
    let (factory, ctx) = setup();
    let expr = factory
        .create_value_expression(&ctx, source, expected_type)
        .unwrap();
    assert_eq!(expr.get_value(&ctx).unwrap(), expected);
}

#[rstest]
#[case(ElValue::string("42"), ElType::LONG_OBJ, ElValue::Long(42))]
#[case(ElValue::Null, ElType::INT, ElValue::Int(0))]
#[case(ElValue::string(""), ElType::INTEGER, ElValue::Int(0))]
#[case(ElValue::Long(3), ElType::String, ElValue::string("3"))]
#[case(ElValue::Null, ElType::String, ElValue::string(""))]
#[case(ElValue::string("TRUE"), ElType::BOOLEAN, ElValue::Boolean(true))]
#[case(ElValue::string("yes"), ElType::BOOLEAN, ElValue::Boolean(false))]
#[case(ElValue::Null, ElType::BOOLEAN, ElValue::Boolean(false))]
#[case(ElValue::Double(3.9), ElType::LONG, ElValue::Long(3))]
#[case(ElValue::string("1.5"), ElType::DOUBLE_OBJ, ElValue::Double(1.5))]
#[case(ElValue::Char('A'), ElType::INT, ElValue::Int(65))]
#[case(ElValue::Int(7), ElType::Number, ElValue::Int(7))]
#[case(ElValue::Null, ElType::Map, ElValue::Null)]
#[case(ElValue::string(""), ElType::Map, ElValue::Null)]
fn coercion_table(#[case] value: ElValue, #[case] target: ElType, #[case] expected: ElValue) {
    assert_eq!(TypeCoercion::coerce_to_type(&value, &target).unwrap(), expected);
}

#[rstest]
#[case(ElValue::string("abc"), ElType::LONG)]
#[case(ElValue::Boolean(true), ElType::INT)]
#[case(ElValue::Long(1), ElType::BOOLEAN)]
#[case(ElValue::string("x"), ElType::Map)]
fn coercion_failures(#[case] value: ElValue, #[case] target: ElType) {
    assert!(!TypeCoercion::is_coercible_from(&value, &target));
}

#[rstest]
#[case("${undefinedVar}")]
#[case("${empty undefinedVar}")]
fn unresolved_identifiers_are_errors(#[case] source: &str) {
    let (factory, ctx) = setup();
    let expr = factory
        .create_value_expression(&ctx, source, ElType::Object)
        .unwrap();
    assert!(matches!(
        expr.get_value(&ctx),
        Err(ElError::PropertyNotFound { .. })
    ));
}

#[test]
fn division_by_zero_is_an_arithmetic_error() {
    let (factory, ctx) = setup();
    let expr = factory
        .create_value_expression(&ctx, "${n mod 0}", ElType::Object)
        .unwrap();
    assert!(matches!(
        expr.get_value(&ctx),
        Err(ElError::Arithmetic { .. })
    ));
}

#[test]
fn listeners_see_both_ends_of_a_failed_evaluation() {
    let (factory, ctx) = setup();
    let listener = Arc::new(RecordingListener::default());
    let ctx = ctx.with_listener(Arc::clone(&listener) as Arc<dyn EvaluationListener>);

    let expr = factory
        .create_value_expression(&ctx, "${undefinedVar}", ElType::Object)
        .unwrap();
    assert!(expr.get_value(&ctx).is_err());
    assert_eq!(
        *listener.events.lock(),
        vec![
            "before ${undefinedVar}".to_string(),
            "after ${undefinedVar}".to_string()
        ]
    );
}

#[test]
fn writes_go_through_the_resolver_chain() {
    let (factory, ctx) = setup();
    let precision = factory
        .create_value_expression(&ctx, "${calc.precision}", ElType::Object)
        .unwrap();
    assert!(!precision.is_read_only(&ctx).unwrap());
    precision.set_value(&ctx, ElValue::Long(5)).unwrap();
    assert_eq!(precision.get_value(&ctx).unwrap(), ElValue::Int(5));
    assert_eq!(precision.get_type(&ctx).unwrap(), ElType::INT);

    let name = factory
        .create_value_expression(&ctx, "${calc.name}", ElType::Object)
        .unwrap();
    assert!(name.is_read_only(&ctx).unwrap());
    assert!(matches!(
        name.set_value(&ctx, ElValue::string("other")),
        Err(ElError::PropertyNotWritable { .. })
    ));

    let unreachable = factory
        .create_value_expression(&ctx, "${nothing.name}", ElType::Object)
        .unwrap();
    assert!(matches!(
        unreachable.set_value(&ctx, ElValue::string("x")),
        Err(ElError::PropertyNotFound { .. })
    ));

    let sum = factory
        .create_value_expression(&ctx, "${n + 1}", ElType::Object)
        .unwrap();
    assert!(matches!(
        sum.set_value(&ctx, ElValue::Long(1)),
        Err(ElError::PropertyNotWritable { .. })
    ));
}

#[test]
fn top_level_variables_are_writable() {
    let (factory, ctx) = setup();
    let expr = factory
        .create_value_expression(&ctx, "${counter}", ElType::Object)
        .unwrap();
    expr.set_value(&ctx, ElValue::Long(9)).unwrap();
    assert_eq!(expr.get_value(&ctx).unwrap(), ElValue::Long(9));
}

#[test]
fn equality_follows_the_syntax_tree() {
    let (factory, ctx) = setup();
    let build = |source: &str| {
        factory
            .create_value_expression(&ctx, source, ElType::Object)
            .unwrap()
    };

    assert_eq!(build("${n+1}"), build("${ n + 1 }"));
    assert_ne!(build("${n + 1}"), build("#{n + 1}"));
    assert_ne!(build("${n + 1}"), build("${n + 2}"));
    assert_eq!(build("${n + 1}").expression_string(), "${n + 1}");
}

#[test]
fn expected_type_does_not_affect_equality_or_hash() {
    let (factory, ctx) = setup();
    let as_string = factory
        .create_value_expression(&ctx, "${n + 1}", ElType::String)
        .unwrap();
    let as_long = factory
        .create_value_expression(&ctx, "${n + 1}", ElType::LONG_OBJ)
        .unwrap();

    assert_eq!(as_string, as_long);
    assert_eq!(as_string.get_value(&ctx).unwrap(), ElValue::string("6"));
    assert_eq!(as_long.get_value(&ctx).unwrap(), ElValue::Long(6));

    let hash = |expr: &ValueExpression| {
        let mut hasher = FxHasher::default();
        expr.hash(&mut hasher);
        hasher.finish()
    };
    assert_eq!(hash(&as_string), hash(&as_long));

    let set: FxHashSet<ValueExpression> = [as_string, as_long].into_iter().collect();
    assert_eq!(set.len(), 1);
}

#[test]
fn literal_expressions_wrap_fixed_values() {
    let (factory, ctx) = setup();
    let expr = factory.create_literal_value_expression(ElValue::string("12"), ElType::LONG_OBJ);
    assert!(expr.is_literal_text());
    assert_eq!(expr.get_value(&ctx).unwrap(), ElValue::Long(12));
    assert!(expr.is_read_only(&ctx).unwrap());
    assert!(matches!(
        expr.set_value(&ctx, ElValue::Long(1)),
        Err(ElError::PropertyNotWritable { .. })
    ));
}

#[rstest]
#[case(ElType::INT)]
#[case(ElType::INTEGER)]
fn literal_method_expression_returns_its_text(#[case] return_type: ElType) {
    let (factory, ctx) = setup();
    let expr = factory
        .create_method_expression(&ctx, "42", Some(return_type.clone()), &[])
        .unwrap();
    assert!(expr.is_literal_text());
    assert_eq!(expr.invoke(&ctx, &[]).unwrap(), ElValue::Int(42));
    assert_eq!(expr.method_info(&ctx).unwrap().return_type(), &return_type);
}

#[test]
fn serialized_expressions_keep_their_bindings() {
    let (factory, ctx) = setup();
    let mapper = Arc::new(MapVariableMapper::new().with(
        "limit",
        ValueExpression::literal(ElValue::Long(10), ElType::LONG_OBJ),
    ));
    let capturing: ElContext = ctx.with_variable_mapper(mapper as Arc<dyn VariableMapper>);
    let expr = factory
        .create_value_expression(
            &capturing,
            "${n < limit and fn:startsWith(user.name, 'A')}",
            ElType::BOOLEAN,
        )
        .unwrap();
    let ValueExpression::Parsed(parsed) = &expr else {
        panic!("expected a parsed expression");
    };

    let json = parsed.to_serialized().unwrap().to_json_string().unwrap();
    let serialized = SerializedValueExpression::from_json_str(&json).unwrap();
    assert_eq!(serialized.expected_type_name, "boolean");
    assert_eq!(serialized.function_bindings, vec!["fn:startsWith".to_string()]);

    let library = FunctionLibrary::standard();
    let restored = factory
        .restore_value_expression(&serialized, Some(&library as &dyn FunctionMapper))
        .unwrap();
    let (_, plain) = setup();
    assert_eq!(restored.get_value(&plain).unwrap(), ElValue::Boolean(true));
    assert_eq!(restored, expr);
}

#[test]
fn restoring_without_the_function_fails() {
    let (factory, ctx) = setup();
    let expr = factory
        .create_value_expression(&ctx, "${fn:trim(user.name)}", ElType::String)
        .unwrap();
    let ValueExpression::Parsed(parsed) = &expr else {
        panic!("expected a parsed expression");
    };
    let serialized = parsed.to_serialized().unwrap();
    assert!(matches!(
        factory.restore_value_expression(&serialized, None),
        Err(ElError::FunctionNotFound { .. })
    ));
}

#[test]
fn host_objects_in_json_variables_are_rejected() {
    let calc = ElValue::object(Calculator::new(1));
    assert!(calc.to_json().is_err());
}
