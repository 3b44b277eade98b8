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

//! Core value types for EL expressions

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use super::types::{ClassDef, ElType};
use crate::error::{ElError, Result};
use crate::registry::member::CandidateMember;

/// Host object exposed to expressions
///
/// Properties and methods are declared on the object's [`ClassDef`]; the
/// runtime only calls [`get_property`](ElObject::get_property) and
/// [`set_property`](ElObject::set_property) for declared properties, and
/// [`invoke`](ElObject::invoke) with a member taken from the class definition
/// and arguments already coerced to its parameter types.
pub trait ElObject: Send + Sync + fmt::Debug {
    /// Runtime class of this object
    fn class(&self) -> Arc<ClassDef>;

    /// Read a declared property
    fn get_property(&self, name: &str) -> Result<ElValue>;

    /// Write a declared, writable property
    fn set_property(&self, name: &str, _value: ElValue) -> Result<()> {
        Err(ElError::property_not_writable(format!(
            "Property '{}' is not writable on type '{}'",
            name,
            self.class().name()
        )))
    }

    /// Invoke a method of this object's class
    fn invoke(&self, member: &CandidateMember, args: Vec<ElValue>) -> Result<ElValue>;
}

/// Core value type for EL expressions
#[derive(Clone)]
pub enum ElValue {
    /// The null value
    Null,
    /// Boolean value
    Boolean(bool),
    /// Character value
    Char(char),
    /// 8-bit signed integer
    Byte(i8),
    /// 16-bit signed integer
    Short(i16),
    /// 32-bit signed integer
    Int(i32),
    /// 64-bit signed integer
    Long(i64),
    /// Single precision float
    Float(f32),
    /// Double precision float
    Double(f64),
    /// Wide integer
    BigInteger(i128),
    /// Decimal value with arbitrary precision
    BigDecimal(Decimal),
    /// String value
    String(String),
    /// Array with a declared element type
    Array {
        /// Declared element type
        element_type: ElType,
        /// Array items
        items: Vec<ElValue>,
    },
    /// Read-only string keyed map
    Map(Arc<BTreeMap<String, ElValue>>),
    /// Enum constant of a registered enum class
    Enum {
        /// Enum class
        class: Arc<ClassDef>,
        /// Constant name
        constant: String,
    },
    /// Host object
    Object(Arc<dyn ElObject>),
}

impl ElValue {
    /// Create a string value
    pub fn string(value: impl Into<String>) -> Self {
        ElValue::String(value.into())
    }

    /// Create an array value
    pub fn array(element_type: ElType, items: Vec<ElValue>) -> Self {
        ElValue::Array {
            element_type,
            items,
        }
    }

    /// Create a map value
    pub fn map(entries: BTreeMap<String, ElValue>) -> Self {
        ElValue::Map(Arc::new(entries))
    }

    /// Wrap a host object
    pub fn object<T: ElObject + 'static>(object: T) -> Self {
        ElValue::Object(Arc::new(object))
    }

    /// Check whether this is the null value
    pub fn is_null(&self) -> bool {
        matches!(self, ElValue::Null)
    }

    /// Whether this value is a number
    pub fn is_number(&self) -> bool {
        matches!(
            self,
            ElValue::Byte(_)
                | ElValue::Short(_)
                | ElValue::Int(_)
                | ElValue::Long(_)
                | ElValue::Float(_)
                | ElValue::Double(_)
                | ElValue::BigInteger(_)
                | ElValue::BigDecimal(_)
        )
    }

    /// Result of the `empty` operator
    pub fn is_empty_value(&self) -> bool {
        match self {
            ElValue::Null => true,
            ElValue::String(s) => s.is_empty(),
            ElValue::Array { items, .. } => items.is_empty(),
            ElValue::Map(entries) => entries.is_empty(),
            _ => false,
        }
    }

    /// Runtime type of this value
    pub fn el_type(&self) -> ElType {
        match self {
            ElValue::Null => ElType::Null,
            ElValue::Boolean(_) => ElType::BOOLEAN_OBJ,
            ElValue::Char(_) => ElType::CHARACTER,
            ElValue::Byte(_) => ElType::BYTE_OBJ,
            ElValue::Short(_) => ElType::SHORT_OBJ,
            ElValue::Int(_) => ElType::INTEGER,
            ElValue::Long(_) => ElType::LONG_OBJ,
            ElValue::Float(_) => ElType::FLOAT_OBJ,
            ElValue::Double(_) => ElType::DOUBLE_OBJ,
            ElValue::BigInteger(_) => ElType::BigInteger,
            ElValue::BigDecimal(_) => ElType::BigDecimal,
            ElValue::String(_) => ElType::String,
            ElValue::Array { element_type, .. } => ElType::array_of(element_type.clone()),
            ElValue::Map(_) => ElType::Map,
            ElValue::Enum { class, .. } => ElType::Class(Arc::clone(class)),
            ElValue::Object(object) => ElType::Class(object.class()),
        }
    }

    /// Type name used in diagnostics
    pub fn type_name(&self) -> String {
        self.el_type().name()
    }

    /// Borrow the string content of a string value
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ElValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Integral view of the value, for integer-like numbers and characters
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ElValue::Byte(v) => Some(*v as i64),
            ElValue::Short(v) => Some(*v as i64),
            ElValue::Int(v) => Some(*v as i64),
            ElValue::Long(v) => Some(*v),
            ElValue::Char(c) => Some(*c as i64),
            ElValue::BigInteger(v) => i64::try_from(*v).ok(),
            _ => None,
        }
    }

    /// Floating point view of a numeric value
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ElValue::Float(v) => Some(*v as f64),
            ElValue::Double(v) => Some(*v),
            ElValue::BigInteger(v) => Some(*v as f64),
            ElValue::BigDecimal(d) => d.to_f64(),
            other => other.as_i64().map(|v| v as f64),
        }
    }

    /// Convert to JSON; host objects have no JSON form
    pub fn to_json(&self) -> Result<Value> {
        let json = match self {
            ElValue::Null => Value::Null,
            ElValue::Boolean(b) => Value::Bool(*b),
            ElValue::Char(c) => Value::String(c.to_string()),
            ElValue::Byte(v) => Value::Number((*v).into()),
            ElValue::Short(v) => Value::Number((*v).into()),
            ElValue::Int(v) => Value::Number((*v).into()),
            ElValue::Long(v) => Value::Number((*v).into()),
            ElValue::Float(v) => float_to_json(*v as f64),
            ElValue::Double(v) => float_to_json(*v),
            ElValue::BigInteger(v) => match i64::try_from(*v) {
                Ok(small) => Value::Number(small.into()),
                Err(_) => Value::String(v.to_string()),
            },
            ElValue::BigDecimal(d) => {
                // May lose precision
                match d.to_f64().and_then(serde_json::Number::from_f64) {
                    Some(num) => Value::Number(num),
                    None => Value::String(d.to_string()),
                }
            }
            ElValue::String(s) => Value::String(s.clone()),
            ElValue::Array { items, .. } => {
                Value::Array(items.iter().map(ElValue::to_json).collect::<Result<_>>()?)
            }
            ElValue::Map(entries) => {
                let mut obj = serde_json::Map::new();
                for (key, value) in entries.iter() {
                    obj.insert(key.clone(), value.to_json()?);
                }
                Value::Object(obj)
            }
            ElValue::Enum { constant, .. } => Value::String(constant.clone()),
            ElValue::Object(object) => {
                return Err(ElError::Serialization {
                    message: format!("Host object of type '{}' has no JSON form", object.class().name()),
                });
            }
        };
        Ok(json)
    }
}

fn float_to_json(value: f64) -> Value {
    serde_json::Number::from_f64(value)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

/// Format a double the way EL renders it: whole numbers keep a trailing `.0`
fn format_double(value: f64, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e7 {
        write!(f, "{value:.1}")
    } else if value.is_nan() {
        write!(f, "NaN")
    } else if value.is_infinite() {
        write!(f, "{}", if value > 0.0 { "Infinity" } else { "-Infinity" })
    } else {
        write!(f, "{value}")
    }
}

/// Convert from serde_json::Value to ElValue
impl From<Value> for ElValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => ElValue::Null,
            Value::Bool(b) => ElValue::Boolean(b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    match i32::try_from(i) {
                        Ok(small) => ElValue::Int(small),
                        Err(_) => ElValue::Long(i),
                    }
                } else if let Some(u) = n.as_u64() {
                    ElValue::BigInteger(u as i128)
                } else {
                    ElValue::Double(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            Value::String(s) => ElValue::String(s),
            Value::Array(items) => ElValue::Array {
                element_type: ElType::Object,
                items: items.into_iter().map(ElValue::from).collect(),
            },
            Value::Object(obj) => ElValue::Map(Arc::new(
                obj.into_iter()
                    .map(|(key, value)| (key, ElValue::from(value)))
                    .collect(),
            )),
        }
    }
}

impl From<bool> for ElValue {
    fn from(value: bool) -> Self {
        ElValue::Boolean(value)
    }
}

impl From<i32> for ElValue {
    fn from(value: i32) -> Self {
        ElValue::Int(value)
    }
}

impl From<i64> for ElValue {
    fn from(value: i64) -> Self {
        ElValue::Long(value)
    }
}

impl From<f64> for ElValue {
    fn from(value: f64) -> Self {
        ElValue::Double(value)
    }
}

impl From<Decimal> for ElValue {
    fn from(value: Decimal) -> Self {
        ElValue::BigDecimal(value)
    }
}

impl From<&str> for ElValue {
    fn from(value: &str) -> Self {
        ElValue::String(value.to_string())
    }
}

impl From<String> for ElValue {
    fn from(value: String) -> Self {
        ElValue::String(value)
    }
}

impl PartialEq for ElValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ElValue::Null, ElValue::Null) => true,
            (ElValue::Boolean(a), ElValue::Boolean(b)) => a == b,
            (ElValue::Char(a), ElValue::Char(b)) => a == b,
            (ElValue::Byte(a), ElValue::Byte(b)) => a == b,
            (ElValue::Short(a), ElValue::Short(b)) => a == b,
            (ElValue::Int(a), ElValue::Int(b)) => a == b,
            (ElValue::Long(a), ElValue::Long(b)) => a == b,
            (ElValue::Float(a), ElValue::Float(b)) => a == b,
            (ElValue::Double(a), ElValue::Double(b)) => a == b,
            (ElValue::BigInteger(a), ElValue::BigInteger(b)) => a == b,
            (ElValue::BigDecimal(a), ElValue::BigDecimal(b)) => a == b,
            (ElValue::String(a), ElValue::String(b)) => a == b,
            (
                ElValue::Array {
                    element_type: ta,
                    items: a,
                },
                ElValue::Array {
                    element_type: tb,
                    items: b,
                },
            ) => ta == tb && a == b,
            (ElValue::Map(a), ElValue::Map(b)) => a == b,
            (
                ElValue::Enum {
                    class: ca,
                    constant: a,
                },
                ElValue::Enum {
                    class: cb,
                    constant: b,
                },
            ) => ca == cb && a == b,
            (ElValue::Object(a), ElValue::Object(b)) => {
                std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
            }
            _ => false,
        }
    }
}

impl Hash for ElValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            ElValue::Null => {}
            ElValue::Boolean(b) => b.hash(state),
            ElValue::Char(c) => c.hash(state),
            ElValue::Byte(v) => v.hash(state),
            ElValue::Short(v) => v.hash(state),
            ElValue::Int(v) => v.hash(state),
            ElValue::Long(v) => v.hash(state),
            ElValue::Float(v) => v.to_bits().hash(state),
            ElValue::Double(v) => v.to_bits().hash(state),
            ElValue::BigInteger(v) => v.hash(state),
            ElValue::BigDecimal(d) => d.normalize().hash(state),
            ElValue::String(s) => s.hash(state),
            ElValue::Array {
                element_type,
                items,
            } => {
                element_type.hash(state);
                items.hash(state);
            }
            ElValue::Map(entries) => entries.hash(state),
            ElValue::Enum { class, constant } => {
                class.hash(state);
                constant.hash(state);
            }
            ElValue::Object(object) => (Arc::as_ptr(object) as *const () as usize).hash(state),
        }
    }
}

/// Display renders the EL string form of a value
impl fmt::Display for ElValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElValue::Null => Ok(()),
            ElValue::Boolean(b) => write!(f, "{b}"),
            ElValue::Char(c) => write!(f, "{c}"),
            ElValue::Byte(v) => write!(f, "{v}"),
            ElValue::Short(v) => write!(f, "{v}"),
            ElValue::Int(v) => write!(f, "{v}"),
            ElValue::Long(v) => write!(f, "{v}"),
            ElValue::Float(v) => format_double(*v as f64, f),
            ElValue::Double(v) => format_double(*v, f),
            ElValue::BigInteger(v) => write!(f, "{v}"),
            ElValue::BigDecimal(d) => write!(f, "{d}"),
            ElValue::String(s) => write!(f, "{s}"),
            ElValue::Array { items, .. } => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            ElValue::Map(entries) => {
                write!(f, "{{")?;
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{key}={value}")?;
                }
                write!(f, "}}")
            }
            ElValue::Enum { constant, .. } => write!(f, "{constant}"),
            ElValue::Object(object) => write!(f, "{}@{:p}", object.class().name(), Arc::as_ptr(object)),
        }
    }
}

/// Debug implementation for ElValue - uses cleaner format than derived Debug
impl fmt::Debug for ElValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElValue::Null => write!(f, "null"),
            ElValue::String(s) => write!(f, "{s:?}"),
            ElValue::Char(c) => write!(f, "{c:?}"),
            ElValue::Object(object) => write!(f, "{object:?}"),
            other => write!(f, "{}({})", other.type_name(), other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_runtime_types() {
        assert_eq!(ElValue::Int(1).el_type(), ElType::INTEGER);
        assert_eq!(ElValue::Null.el_type(), ElType::Null);
        assert_eq!(
            ElValue::array(ElType::String, vec![]).el_type(),
            ElType::array_of(ElType::String)
        );
    }

    #[test]
    fn test_display_matches_el_string_form() {
        assert_eq!(ElValue::Double(3.0).to_string(), "3.0");
        assert_eq!(ElValue::Double(2.5).to_string(), "2.5");
        assert_eq!(ElValue::Null.to_string(), "");
        assert_eq!(ElValue::Long(-7).to_string(), "-7");
    }

    #[test]
    fn test_json_conversion() {
        let value = ElValue::from(json!({"name": "Ada", "age": 36, "tags": ["a", "b"]}));
        let ElValue::Map(entries) = &value else {
            panic!("expected a map, got {value:?}");
        };
        assert_eq!(entries.get("name"), Some(&ElValue::string("Ada")));
        assert_eq!(entries.get("age"), Some(&ElValue::Int(36)));
        assert_eq!(
            value.to_json().unwrap(),
            json!({"name": "Ada", "age": 36, "tags": ["a", "b"]})
        );
    }

    #[test]
    fn test_empty_operator_semantics() {
        assert!(ElValue::Null.is_empty_value());
        assert!(ElValue::string("").is_empty_value());
        assert!(ElValue::array(ElType::Object, vec![]).is_empty_value());
        assert!(!ElValue::Int(0).is_empty_value());
    }
}
