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

//! Type coercion and conversion utilities for EL values

use super::types::{ElType, PrimitiveType};
use super::value::ElValue;
use rust_decimal::Decimal;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use std::cmp::Ordering;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

/// Result type for type coercion operations
pub type CoercionResult<T> = Result<T, CoercionError>;

/// Errors that can occur during type coercion
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoercionError {
    /// Cannot coerce between the specified types
    #[error("Cannot convert {value} of type {from} to {to}")]
    IncompatibleTypes {
        /// String form of the offending value
        value: String,
        /// Runtime type of the value
        from: String,
        /// Requested type
        to: String,
    },
    /// The value format is invalid for the target type
    #[error("Invalid format '{value}' for type {target_type}")]
    InvalidFormat {
        /// The text that failed to parse
        value: String,
        /// Requested type
        target_type: String,
    },
}

impl CoercionError {
    fn incompatible(value: &ElValue, to: &ElType) -> Self {
        CoercionError::IncompatibleTypes {
            value: value.to_string(),
            from: value.type_name(),
            to: to.name(),
        }
    }

    fn invalid_format(value: &str, to: &ElType) -> Self {
        CoercionError::InvalidFormat {
            value: value.to_string(),
            target_type: to.name(),
        }
    }
}

/// Numeric target kinds understood by number coercion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NumberKind {
    Byte,
    Short,
    Int,
    Long,
    Float,
    Double,
    BigInteger,
    BigDecimal,
    Number,
}

impl NumberKind {
    fn of(ty: &ElType) -> Option<Self> {
        let kind = match ty {
            ElType::Primitive(p) | ElType::Boxed(p) => match p {
                PrimitiveType::Byte => NumberKind::Byte,
                PrimitiveType::Short => NumberKind::Short,
                PrimitiveType::Int => NumberKind::Int,
                PrimitiveType::Long => NumberKind::Long,
                PrimitiveType::Float => NumberKind::Float,
                PrimitiveType::Double => NumberKind::Double,
                _ => return None,
            },
            ElType::Number => NumberKind::Number,
            ElType::BigInteger => NumberKind::BigInteger,
            ElType::BigDecimal => NumberKind::BigDecimal,
            _ => return None,
        };
        Some(kind)
    }
}

/// Intermediate numeric form used for narrowing conversions
#[derive(Debug, Clone, Copy)]
enum Num {
    Integral(i128),
    Floating(f64),
    Decimal(Decimal),
}

impl Num {
    fn of(value: &ElValue) -> Option<Self> {
        match value {
            ElValue::Byte(v) => Some(Num::Integral(*v as i128)),
            ElValue::Short(v) => Some(Num::Integral(*v as i128)),
            ElValue::Int(v) => Some(Num::Integral(*v as i128)),
            ElValue::Long(v) => Some(Num::Integral(*v as i128)),
            ElValue::BigInteger(v) => Some(Num::Integral(*v)),
            ElValue::Float(v) => Some(Num::Floating(*v as f64)),
            ElValue::Double(v) => Some(Num::Floating(*v)),
            ElValue::BigDecimal(d) => Some(Num::Decimal(*d)),
            _ => None,
        }
    }

    fn long_value(self) -> i64 {
        match self {
            Num::Integral(v) => v as i64,
            Num::Floating(v) => v as i64,
            Num::Decimal(d) => d.trunc().to_i128().map(|v| v as i64).unwrap_or_default(),
        }
    }

    fn int_value(self) -> i32 {
        match self {
            Num::Floating(v) => v as i32,
            other => other.long_value() as i32,
        }
    }

    fn double_value(self) -> f64 {
        match self {
            Num::Integral(v) => v as f64,
            Num::Floating(v) => v,
            Num::Decimal(d) => d.to_f64().unwrap_or(f64::NAN),
        }
    }
}

/// Type coercion utility for EL values
pub struct TypeCoercion;

impl TypeCoercion {
    /// Coerce a value to the given type following the EL conversion rules
    pub fn coerce_to_type(value: &ElValue, target_type: &ElType) -> CoercionResult<ElValue> {
        if *target_type == ElType::Object
            || (!value.is_null() && target_type.is_supertype_of(&value.el_type()))
        {
            return Ok(value.clone());
        }
        if *target_type == ElType::String {
            return Ok(ElValue::String(Self::coerce_to_string(value)));
        }
        if target_type.is_number_type() {
            return Self::coerce_to_number(value, target_type);
        }
        match target_type {
            ElType::Primitive(PrimitiveType::Char) | ElType::Boxed(PrimitiveType::Char) => {
                Self::coerce_to_char(value).map(ElValue::Char)
            }
            ElType::Primitive(PrimitiveType::Boolean) | ElType::Boxed(PrimitiveType::Boolean) => {
                Self::coerce_to_boolean(value).map(ElValue::Boolean)
            }
            ElType::Class(def) if def.is_enum() => Self::coerce_to_enum(value, target_type),
            _ => match value {
                ElValue::Null => Ok(ElValue::Null),
                ElValue::String(s) if s.is_empty() => Ok(ElValue::Null),
                other => Err(CoercionError::incompatible(other, target_type)),
            },
        }
    }

    /// Whether `value` can be coerced to `target_type`
    pub fn is_coercible_from(value: &ElValue, target_type: &ElType) -> bool {
        Self::coerce_to_type(value, target_type).is_ok()
    }

    /// String form of a value; `null` becomes the empty string
    pub fn coerce_to_string(value: &ElValue) -> String {
        match value {
            ElValue::Null => String::new(),
            ElValue::String(s) => s.clone(),
            other => other.to_string(),
        }
    }

    /// Coerce value to boolean
    pub fn coerce_to_boolean(value: &ElValue) -> CoercionResult<bool> {
        match value {
            ElValue::Null => Ok(false),
            ElValue::Boolean(b) => Ok(*b),
            ElValue::String(s) => Ok(s.eq_ignore_ascii_case("true")),
            other => Err(CoercionError::incompatible(other, &ElType::BOOLEAN_OBJ)),
        }
    }

    /// Coerce value to a character
    pub fn coerce_to_char(value: &ElValue) -> CoercionResult<char> {
        match value {
            ElValue::Null => Ok('\0'),
            ElValue::Char(c) => Ok(*c),
            ElValue::String(s) => Ok(s.chars().next().unwrap_or('\0')),
            other => match Num::of(other) {
                Some(num) => {
                    let unit = num.long_value() as i16 as u16;
                    char::from_u32(unit as u32)
                        .ok_or_else(|| CoercionError::incompatible(other, &ElType::CHARACTER))
                }
                None => Err(CoercionError::incompatible(other, &ElType::CHARACTER)),
            },
        }
    }

    /// Coerce value to a constant of the given enum type
    pub fn coerce_to_enum(value: &ElValue, target_type: &ElType) -> CoercionResult<ElValue> {
        let ElType::Class(class) = target_type else {
            return Err(CoercionError::incompatible(value, target_type));
        };
        match value {
            ElValue::Null => Ok(ElValue::Null),
            ElValue::String(s) if s.is_empty() => Ok(ElValue::Null),
            ElValue::Enum { class: own, .. } if own == class => Ok(value.clone()),
            ElValue::String(s) if class.constants().iter().any(|c| c == s) => Ok(ElValue::Enum {
                class: Arc::clone(class),
                constant: s.clone(),
            }),
            other => Err(CoercionError::incompatible(other, target_type)),
        }
    }

    /// Coerce value to the given numeric type
    ///
    /// `null` and the empty string become zero, strings are parsed with the
    /// grammar of the target type and characters convert through their code
    /// unit. Conversions between numbers narrow like primitive casts.
    pub fn coerce_to_number(value: &ElValue, target_type: &ElType) -> CoercionResult<ElValue> {
        let Some(kind) = NumberKind::of(target_type) else {
            return Err(CoercionError::incompatible(value, target_type));
        };
        match value {
            ElValue::Null => Self::narrow(Num::Integral(0), ElValue::Long(0), kind, target_type),
            ElValue::String(s) if s.is_empty() => {
                Self::narrow(Num::Integral(0), ElValue::Long(0), kind, target_type)
            }
            ElValue::String(s) => Self::parse_number(s, kind, target_type),
            ElValue::Char(c) => {
                let short = *c as u32 as u16 as i16;
                Self::narrow(Num::Integral(short as i128), ElValue::Short(short), kind, target_type)
            }
            other => match Num::of(other) {
                Some(num) => Self::narrow(num, other.clone(), kind, target_type),
                None => Err(CoercionError::incompatible(other, target_type)),
            },
        }
    }

    fn narrow(
        num: Num,
        original: ElValue,
        kind: NumberKind,
        target_type: &ElType,
    ) -> CoercionResult<ElValue> {
        let value = match kind {
            NumberKind::Long => ElValue::Long(num.long_value()),
            NumberKind::Int => ElValue::Int(num.int_value()),
            NumberKind::Short => ElValue::Short(num.int_value() as i16),
            NumberKind::Byte => ElValue::Byte(num.int_value() as i8),
            NumberKind::Double => ElValue::Double(num.double_value()),
            NumberKind::Float => ElValue::Float(num.double_value() as f32),
            NumberKind::BigInteger => match num {
                Num::Integral(v) => ElValue::BigInteger(v),
                Num::Decimal(d) => ElValue::BigInteger(d.trunc().to_i128().unwrap_or_default()),
                Num::Floating(v) => ElValue::BigInteger(v as i64 as i128),
            },
            NumberKind::BigDecimal => {
                let decimal = match num {
                    Num::Decimal(d) => Some(d),
                    Num::Integral(v) => Decimal::from_i128(v),
                    Num::Floating(v) => Decimal::from_f64(v),
                };
                ElValue::BigDecimal(
                    decimal.ok_or_else(|| CoercionError::incompatible(&original, target_type))?,
                )
            }
            NumberKind::Number => original,
        };
        Ok(value)
    }

    fn parse_number(text: &str, kind: NumberKind, target_type: &ElType) -> CoercionResult<ElValue> {
        let invalid = || CoercionError::invalid_format(text, target_type);
        let value = match kind {
            NumberKind::Long => ElValue::Long(text.parse().map_err(|_| invalid())?),
            NumberKind::Int => ElValue::Int(text.parse().map_err(|_| invalid())?),
            NumberKind::Short => ElValue::Short(text.parse().map_err(|_| invalid())?),
            NumberKind::Byte => ElValue::Byte(text.parse().map_err(|_| invalid())?),
            NumberKind::Double => ElValue::Double(text.parse().map_err(|_| invalid())?),
            NumberKind::Float => ElValue::Float(text.parse().map_err(|_| invalid())?),
            NumberKind::BigInteger => ElValue::BigInteger(text.parse().map_err(|_| invalid())?),
            NumberKind::BigDecimal => ElValue::BigDecimal(
                Decimal::from_str(text)
                    .or_else(|_| Decimal::from_scientific(text))
                    .map_err(|_| invalid())?,
            ),
            NumberKind::Number => {
                return Err(CoercionError::IncompatibleTypes {
                    value: text.to_string(),
                    from: ElType::String.name(),
                    to: target_type.name(),
                });
            }
        };
        Ok(value)
    }

    /// Whether a string looks like a floating point literal
    pub fn is_string_float(text: &str) -> bool {
        text.len() > 1 && text.contains(['.', 'e', 'E'])
    }

    /// Numeric value of an operand without a target type
    ///
    /// Strings become `Double` (or `BigDecimal` when out of range) if they
    /// look like floats, otherwise the narrowest of `Int`, `Long` and
    /// `BigInteger` that holds them.
    pub fn to_number(value: &ElValue) -> CoercionResult<ElValue> {
        if value.is_null() {
            return Ok(ElValue::Long(0));
        }
        if value.is_number() {
            return Ok(value.clone());
        }
        let text = Self::coerce_to_string(value);
        if Self::is_string_float(&text) {
            match text.parse::<f64>() {
                Ok(v) if v.is_finite() => Ok(ElValue::Double(v)),
                _ => Self::coerce_to_number(&ElValue::String(text), &ElType::BigDecimal),
            }
        } else if let Ok(v) = text.parse::<i32>() {
            Ok(ElValue::Int(v))
        } else if let Ok(v) = text.parse::<i64>() {
            Ok(ElValue::Long(v))
        } else {
            Self::coerce_to_number(&ElValue::String(text), &ElType::BigInteger)
        }
    }

    /// EL equality after coercing both operands to a common type
    pub fn equals(left: &ElValue, right: &ElValue) -> CoercionResult<bool> {
        if left == right {
            return Ok(true);
        }
        if left.is_null() || right.is_null() {
            return Ok(false);
        }
        if matches!(left, ElValue::Boolean(_)) || matches!(right, ElValue::Boolean(_)) {
            return Ok(Self::coerce_to_boolean(left)? == Self::coerce_to_boolean(right)?);
        }
        if let ElValue::Enum { class, .. } = left {
            let other = Self::coerce_to_enum(right, &ElType::Class(Arc::clone(class)))?;
            return Ok(*left == other);
        }
        if let ElValue::Enum { class, .. } = right {
            let other = Self::coerce_to_enum(left, &ElType::Class(Arc::clone(class)))?;
            return Ok(*right == other);
        }
        if matches!(left, ElValue::String(_)) || matches!(right, ElValue::String(_)) {
            return Ok(Self::coerce_to_string(left) == Self::coerce_to_string(right));
        }
        match Self::numeric_ordering(left, right)? {
            Some(ordering) => Ok(ordering == Ordering::Equal),
            None => Ok(false),
        }
    }

    /// EL ordering after coercing both operands to a common type
    pub fn compare(left: &ElValue, right: &ElValue) -> CoercionResult<Ordering> {
        if Self::equals(left, right)? {
            return Ok(Ordering::Equal);
        }
        if let Some(ordering) = Self::numeric_ordering(left, right)? {
            return Ok(ordering);
        }
        if matches!(left, ElValue::String(_)) || matches!(right, ElValue::String(_)) {
            return Ok(Self::coerce_to_string(left).cmp(&Self::coerce_to_string(right)));
        }
        match (left, right) {
            (ElValue::Boolean(a), ElValue::Boolean(b)) => Ok(a.cmp(b)),
            (ElValue::Null, _) => Ok(Ordering::Less),
            (_, ElValue::Null) => Ok(Ordering::Greater),
            _ => Err(CoercionError::IncompatibleTypes {
                value: left.to_string(),
                from: left.type_name(),
                to: right.type_name(),
            }),
        }
    }

    /// Compare two operands numerically when either is a number or character
    fn numeric_ordering(left: &ElValue, right: &ElValue) -> CoercionResult<Option<Ordering>> {
        let either = |pred: fn(&ElValue) -> bool| pred(left) || pred(right);
        let ordering = if either(|v| matches!(v, ElValue::BigDecimal(_))) {
            let (a, b) = Self::both(left, right, &ElType::BigDecimal)?;
            match (a, b) {
                (ElValue::BigDecimal(a), ElValue::BigDecimal(b)) => a.cmp(&b),
                _ => return Ok(None),
            }
        } else if either(|v| matches!(v, ElValue::Double(_) | ElValue::Float(_))) {
            let (a, b) = Self::both(left, right, &ElType::DOUBLE_OBJ)?;
            match (a, b) {
                (ElValue::Double(a), ElValue::Double(b)) => a.total_cmp(&b),
                _ => return Ok(None),
            }
        } else if either(|v| matches!(v, ElValue::BigInteger(_))) {
            let (a, b) = Self::both(left, right, &ElType::BigInteger)?;
            match (a, b) {
                (ElValue::BigInteger(a), ElValue::BigInteger(b)) => a.cmp(&b),
                _ => return Ok(None),
            }
        } else if either(|v| {
            matches!(
                v,
                ElValue::Long(_)
                    | ElValue::Int(_)
                    | ElValue::Char(_)
                    | ElValue::Short(_)
                    | ElValue::Byte(_)
            )
        }) {
            let (a, b) = Self::both(left, right, &ElType::LONG_OBJ)?;
            match (a, b) {
                (ElValue::Long(a), ElValue::Long(b)) => a.cmp(&b),
                _ => return Ok(None),
            }
        } else {
            return Ok(None);
        };
        Ok(Some(ordering))
    }

    fn both(left: &ElValue, right: &ElValue, ty: &ElType) -> CoercionResult<(ElValue, ElValue)> {
        Ok((
            Self::coerce_to_number(left, ty)?,
            Self::coerce_to_number(right, ty)?,
        ))
    }
}
