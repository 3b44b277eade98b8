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

//! Dynamic overload resolution
//!
//! [`MemberResolver::resolve_member`] picks the member of a base object's
//! class that best fits a list of argument types (and optionally argument
//! values). Members are scored by the number of parameters whose declared
//! type is identical to the argument type; the remaining parameters must be
//! assignable or, when values are supplied, coercible. A candidate matching
//! every argument exactly wins outright. Ties that differ at a single
//! position are broken by the nearest superclass of the argument type.

use super::cache::{CacheStats, GenerationalCache};
use super::member::{CandidateMember, describe_types};
use crate::error::{ElError, Result};
use crate::model::type_coercion::TypeCoercion;
use crate::model::types::{ClassDef, ElType};
use crate::model::value::ElValue;
use std::sync::Arc;

/// Default number of `(class, name)` candidate lists kept hot
pub const DEFAULT_MEMBER_CACHE_CAPACITY: usize = 1000;

type MemberKey = (String, String);

/// Resolves callable members against the explicit member registry of
/// [`ClassDef`]s
///
/// Candidate lists are cached by class name, so every class resolved through
/// one resolver must have a distinct name.
#[derive(Debug)]
pub struct MemberResolver {
    members: GenerationalCache<MemberKey, Arc<[CandidateMember]>>,
}

impl Default for MemberResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl MemberResolver {
    /// Create a resolver with the default cache capacity
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MEMBER_CACHE_CAPACITY)
    }

    /// Create a resolver whose candidate cache keeps `capacity` entries hot
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            members: GenerationalCache::new(capacity),
        }
    }

    /// Candidate members named `name` of `class`, in enumeration order
    pub fn members_of(&self, class: &ClassDef, name: &str) -> Arc<[CandidateMember]> {
        let key = (class.name().to_string(), name.to_string());
        if let Some(members) = self.members.get(&key) {
            return members;
        }
        let members: Arc<[CandidateMember]> = class.members_named(name).into();
        self.members.put(key, Arc::clone(&members));
        members
    }

    /// Statistics of the candidate cache
    pub fn cache_stats(&self) -> CacheStats {
        self.members.stats()
    }

    /// Find the member of `base`'s class best matching the given argument
    /// types
    ///
    /// When `param_values` is given, parameters that are neither identical
    /// nor assignable may still match if the value is coercible to the
    /// declared type.
    pub fn resolve_member(
        &self,
        base: &ElValue,
        name: &str,
        param_types: Option<&[ElType]>,
        param_values: Option<&[ElValue]>,
    ) -> Result<CandidateMember> {
        let param_types = param_types.unwrap_or(&[]);
        let not_found = || ElError::MemberNotFound {
            base: describe_base(base),
            name: name.to_string(),
            params: describe_types(param_types),
        };
        if base.is_null() || name.is_empty() {
            return Err(not_found());
        }
        let class = match base.el_type() {
            ElType::Class(class) => class,
            _ => return Err(not_found()),
        };
        let param_count = param_types.len();

        let mut candidates: Vec<(&CandidateMember, usize)> = Vec::new();
        let members = self.members_of(&class, name);
        for member in members.iter() {
            let member_count = member.arity();
            if !(param_count == member_count
                || (member.is_variadic() && param_count >= member_count))
            {
                continue;
            }
            let Some(exact) = score(member, param_types, param_values) else {
                continue;
            };
            if exact == param_count {
                log::trace!("{}.{name}: exact match {member}", class.name());
                return Ok(member.clone());
            }
            candidates.push((member, exact));
        }

        let Some(best) = candidates.iter().map(|(_, exact)| *exact).max() else {
            return Err(not_found());
        };
        let tied: Vec<&CandidateMember> = candidates
            .iter()
            .filter(|(_, exact)| *exact == best)
            .map(|(member, _)| *member)
            .collect();
        if let [single] = tied.as_slice() {
            log::trace!("{}.{name}: best match {single} ({best} exact)", class.name());
            return Ok((*single).clone());
        }

        if param_count.checked_sub(1) == Some(best) {
            if let Some(member) = resolve_ambiguous(&tied, param_types) {
                log::trace!("{}.{name}: tie broken in favour of {member}", class.name());
                return Ok(member.clone());
            }
        }
        log::trace!("{}.{name}: {} candidates tied at {best}", class.name(), tied.len());
        Err(ElError::AmbiguousMember {
            base: describe_base(base),
            name: name.to_string(),
            params: describe_types(param_types),
        })
    }
}

/// Count exact parameter matches, or `None` when some parameter cannot match
fn score(
    member: &CandidateMember,
    param_types: &[ElType],
    param_values: Option<&[ElValue]>,
) -> Option<usize> {
    let declared = member.parameter_types();
    let member_count = declared.len();
    let mut exact = 0;
    for (i, declared_type) in declared.iter().enumerate() {
        if param_types[i] == *declared_type {
            exact += 1;
        } else if i + 1 == member_count && member.is_variadic() {
            let var_type = declared_type.element_type()?;
            for (j, actual) in param_types.iter().enumerate().skip(i) {
                if !accepts(actual, var_type, param_values, j) {
                    return None;
                }
            }
        } else if !accepts(&param_types[i], declared_type, param_values, i) {
            return None;
        }
    }
    Some(exact)
}

fn accepts(
    src: &ElType,
    target: &ElType,
    param_values: Option<&[ElValue]>,
    index: usize,
) -> bool {
    if is_assignable_from(src, target) {
        return true;
    }
    param_values
        .and_then(|values| values.get(index))
        .is_some_and(|value| TypeCoercion::is_coercible_from(value, target))
}

/// Break a tie between candidates that differ from the arguments at exactly
/// one position
///
/// The position is taken from the first tied candidate. A candidate whose
/// declared type at that position is the nearest superclass of the argument
/// type wins; numbers fall back to the only numeric candidate, if there is
/// just one.
fn resolve_ambiguous<'a>(
    tied: &[&'a CandidateMember],
    param_types: &[ElType],
) -> Option<&'a CandidateMember> {
    let first = tied.first()?;
    let (index, non_match) = param_types
        .iter()
        .enumerate()
        .find(|(i, ty)| declared_at(first, *i) != Some(*ty))?;

    if tied.iter().any(|c| declared_at(c, index) == Some(non_match)) {
        return None;
    }

    for ancestor in non_match.ancestors() {
        if let Some(found) = tied
            .iter()
            .find(|c| declared_at(c, index) == Some(&ancestor))
        {
            return Some(*found);
        }
    }

    if !ElType::Number.is_supertype_of(non_match) {
        return None;
    }
    let mut numeric = tied.iter().filter(|c| {
        declared_at(c, index)
            .is_some_and(|ty| ElType::Number.is_supertype_of(ty) || ty.is_primitive())
    });
    match (numeric.next(), numeric.next()) {
        (Some(only), None) => Some(*only),
        _ => None,
    }
}

fn declared_at(member: &CandidateMember, index: usize) -> Option<&ElType> {
    member.parameter_types().get(index)
}

/// Whether a parameter declared as `target` accepts an argument of type
/// `src` without coercion
///
/// Primitive targets are boxed first; the null type is assignable to
/// everything.
pub fn is_assignable_from(src: &ElType, target: &ElType) -> bool {
    if *src == ElType::Null {
        return true;
    }
    target.boxed().is_supertype_of(src)
}

/// Coerce arguments to the parameter types of `member`
///
/// For variadic members the trailing arguments are coerced to the element
/// type and packed into a single array, unless exactly one trailing argument
/// is supplied and it already is a suitable array.
pub fn build_parameters(member: &CandidateMember, args: &[ElValue]) -> Result<Vec<ElValue>> {
    let declared = member.parameter_types();
    let arity_error = || ElError::Invocation {
        member: member.signature(),
        message: format!("expected {} arguments, got {}", declared.len(), args.len()),
    };

    let Some(element_type) = member.variadic_element_type() else {
        if args.len() != declared.len() {
            return Err(arity_error());
        }
        return declared
            .iter()
            .zip(args)
            .map(|(ty, arg)| Ok(TypeCoercion::coerce_to_type(arg, ty)?))
            .collect();
    };

    let fixed = declared.len() - 1;
    if args.len() < fixed {
        return Err(arity_error());
    }
    let mut parameters = Vec::with_capacity(declared.len());
    for (ty, arg) in declared[..fixed].iter().zip(&args[..fixed]) {
        parameters.push(TypeCoercion::coerce_to_type(arg, ty)?);
    }
    let trailing = &args[fixed..];
    if let [array @ ElValue::Array { .. }] = trailing {
        if declared[fixed].is_supertype_of(&array.el_type()) {
            parameters.push(array.clone());
            return Ok(parameters);
        }
    }
    let items = trailing
        .iter()
        .map(|arg| TypeCoercion::coerce_to_type(arg, element_type))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    parameters.push(ElValue::array(element_type.clone(), items));
    Ok(parameters)
}

fn describe_base(base: &ElValue) -> String {
    match base {
        ElValue::Null => "null".to_string(),
        other => other.type_name(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assignability_boxes_primitive_targets() {
        assert!(is_assignable_from(&ElType::INTEGER, &ElType::INT));
        assert!(is_assignable_from(&ElType::INTEGER, &ElType::Number));
        assert!(is_assignable_from(&ElType::Null, &ElType::INT));
        assert!(!is_assignable_from(&ElType::LONG_OBJ, &ElType::INT));
        assert!(!is_assignable_from(&ElType::String, &ElType::Number));
    }

    #[test]
    fn test_candidate_cache_is_keyed_by_class_name() {
        let first = ClassDef::builder("demo.Shape")
            .method(CandidateMember::new("area", vec![], ElType::DOUBLE))
            .build();
        let second = ClassDef::builder("demo.Shape")
            .method(CandidateMember::new("area", vec![], ElType::DOUBLE))
            .method(CandidateMember::new("area", vec![ElType::INT], ElType::DOUBLE))
            .build();

        let shared = MemberResolver::new();
        assert_eq!(shared.members_of(&first, "area").len(), 1);
        assert_eq!(shared.members_of(&second, "area").len(), 1);

        let fresh = MemberResolver::new();
        assert_eq!(fresh.members_of(&second, "area").len(), 2);
    }

    #[test]
    fn test_build_parameters_packs_variadic_tail() {
        let member = CandidateMember::variadic(
            "format",
            vec![ElType::String],
            ElType::INT,
            ElType::String,
        );
        let args = vec![
            ElValue::string("%d-%d"),
            ElValue::Long(1),
            ElValue::string("2"),
        ];
        let params = build_parameters(&member, &args).unwrap();
        assert_eq!(
            params,
            vec![
                ElValue::string("%d-%d"),
                ElValue::array(ElType::INT, vec![ElValue::Int(1), ElValue::Int(2)]),
            ]
        );
    }

    #[test]
    fn test_build_parameters_coerces_fixed_arguments() {
        let member = CandidateMember::new("add", vec![ElType::INT, ElType::DOUBLE], ElType::DOUBLE);
        let params = build_parameters(&member, &[ElValue::string("3"), ElValue::Int(4)]).unwrap();
        assert_eq!(params, vec![ElValue::Int(3), ElValue::Double(4.0)]);

        let err = build_parameters(&member, &[ElValue::Int(1)]).unwrap_err();
        assert!(matches!(err, ElError::Invocation { .. }));
    }

    #[test]
    fn test_build_parameters_passes_array_through() {
        let member = CandidateMember::variadic("join", vec![], ElType::String, ElType::String);
        let array = ElValue::array(ElType::String, vec![ElValue::string("a")]);
        let params = build_parameters(&member, std::slice::from_ref(&array)).unwrap();
        assert_eq!(params, vec![array]);
    }
}
