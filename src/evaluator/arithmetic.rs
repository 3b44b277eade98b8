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

//! Arithmetic operations evaluator
//!
//! Operands are promoted to a common representation before the operation:
//! `BigDecimal` when either side is a decimal (or a floating value meets a
//! wide integer), `Double` when either side is floating, `BigInteger` when
//! either side is a wide integer and `Long` otherwise. Strings that look like
//! floats count as floating. `Long` arithmetic wraps; wide integer and
//! decimal overflow is an error.

use crate::ast::BinaryOperator;
use crate::error::{ElError, Result};
use crate::model::{ElType, ElValue, TypeCoercion};
use rust_decimal::Decimal;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Promotion {
    Long,
    BigInteger,
    Double,
    BigDecimal,
}

fn is_floating(value: &ElValue) -> bool {
    match value {
        ElValue::Float(_) | ElValue::Double(_) => true,
        ElValue::String(s) => TypeCoercion::is_string_float(s),
        _ => false,
    }
}

fn is_big_integer(value: &ElValue) -> bool {
    matches!(value, ElValue::BigInteger(_))
}

fn is_big_decimal(value: &ElValue) -> bool {
    matches!(value, ElValue::BigDecimal(_))
}

fn promotion(left: &ElValue, right: &ElValue) -> Promotion {
    let floating = is_floating(left) || is_floating(right);
    let big_integer = is_big_integer(left) || is_big_integer(right);
    if is_big_decimal(left) || is_big_decimal(right) || (floating && big_integer) {
        Promotion::BigDecimal
    } else if floating {
        Promotion::Double
    } else if big_integer {
        Promotion::BigInteger
    } else {
        Promotion::Long
    }
}

fn long(value: &ElValue) -> Result<i64> {
    let coerced = TypeCoercion::coerce_to_number(value, &ElType::LONG_OBJ)?;
    Ok(coerced.as_i64().unwrap_or_default())
}

fn double(value: &ElValue) -> Result<f64> {
    let coerced = TypeCoercion::coerce_to_number(value, &ElType::DOUBLE_OBJ)?;
    Ok(coerced.as_f64().unwrap_or(f64::NAN))
}

fn big_integer(value: &ElValue) -> Result<i128> {
    match TypeCoercion::coerce_to_number(value, &ElType::BigInteger)? {
        ElValue::BigInteger(v) => Ok(v),
        _ => Ok(0),
    }
}

fn decimal(value: &ElValue) -> Result<Decimal> {
    match TypeCoercion::coerce_to_number(value, &ElType::BigDecimal)? {
        ElValue::BigDecimal(d) => Ok(d),
        _ => Ok(Decimal::ZERO),
    }
}

fn overflow(op: BinaryOperator) -> ElError {
    ElError::Arithmetic {
        message: format!("numeric overflow in '{op}'"),
    }
}

fn division_by_zero() -> ElError {
    ElError::Arithmetic {
        message: "Division by zero".to_string(),
    }
}

/// Specialized evaluator for arithmetic operations
pub struct ArithmeticEvaluator;

impl ArithmeticEvaluator {
    /// Apply an arithmetic binary operator
    pub fn evaluate(op: BinaryOperator, left: &ElValue, right: &ElValue) -> Result<ElValue> {
        match op {
            BinaryOperator::Add => Self::add(left, right),
            BinaryOperator::Subtract => Self::subtract(left, right),
            BinaryOperator::Multiply => Self::multiply(left, right),
            BinaryOperator::Divide => Self::divide(left, right),
            BinaryOperator::Modulo => Self::modulo(left, right),
            other => Err(ElError::invalid_expression(format!(
                "'{other}' is not an arithmetic operator"
            ))),
        }
    }

    /// Evaluate addition
    pub fn add(left: &ElValue, right: &ElValue) -> Result<ElValue> {
        Self::apply(
            BinaryOperator::Add,
            left,
            right,
            |a, b| a.wrapping_add(b),
            i128::checked_add,
            |a, b| a + b,
            Decimal::checked_add,
        )
    }

    /// Evaluate subtraction
    pub fn subtract(left: &ElValue, right: &ElValue) -> Result<ElValue> {
        Self::apply(
            BinaryOperator::Subtract,
            left,
            right,
            |a, b| a.wrapping_sub(b),
            i128::checked_sub,
            |a, b| a - b,
            Decimal::checked_sub,
        )
    }

    /// Evaluate multiplication
    pub fn multiply(left: &ElValue, right: &ElValue) -> Result<ElValue> {
        Self::apply(
            BinaryOperator::Multiply,
            left,
            right,
            |a, b| a.wrapping_mul(b),
            i128::checked_mul,
            |a, b| a * b,
            Decimal::checked_mul,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn apply(
        op: BinaryOperator,
        left: &ElValue,
        right: &ElValue,
        on_long: fn(i64, i64) -> i64,
        on_big_integer: fn(i128, i128) -> Option<i128>,
        on_double: fn(f64, f64) -> f64,
        on_decimal: fn(Decimal, Decimal) -> Option<Decimal>,
    ) -> Result<ElValue> {
        if left.is_null() && right.is_null() {
            return Ok(ElValue::Long(0));
        }
        let value = match promotion(left, right) {
            Promotion::BigDecimal => ElValue::BigDecimal(
                on_decimal(decimal(left)?, decimal(right)?).ok_or_else(|| overflow(op))?,
            ),
            Promotion::Double => ElValue::Double(on_double(double(left)?, double(right)?)),
            Promotion::BigInteger => ElValue::BigInteger(
                on_big_integer(big_integer(left)?, big_integer(right)?)
                    .ok_or_else(|| overflow(op))?,
            ),
            Promotion::Long => ElValue::Long(on_long(long(left)?, long(right)?)),
        };
        Ok(value)
    }

    /// Evaluate division
    ///
    /// Decimal when a decimal or wide integer is involved, `Double`
    /// otherwise. Floating division by zero yields infinity or NaN.
    pub fn divide(left: &ElValue, right: &ElValue) -> Result<ElValue> {
        if left.is_null() && right.is_null() {
            return Ok(ElValue::Long(0));
        }
        let exact = is_big_decimal(left)
            || is_big_decimal(right)
            || is_big_integer(left)
            || is_big_integer(right);
        if exact {
            let divisor = decimal(right)?;
            if divisor.is_zero() {
                return Err(division_by_zero());
            }
            let quotient = decimal(left)?
                .checked_div(divisor)
                .ok_or_else(|| overflow(BinaryOperator::Divide))?;
            Ok(ElValue::BigDecimal(quotient.normalize()))
        } else {
            Ok(ElValue::Double(double(left)? / double(right)?))
        }
    }

    /// Evaluate remainder
    ///
    /// `Double` when a decimal or floating value is involved; integer
    /// remainder by zero is an error.
    pub fn modulo(left: &ElValue, right: &ElValue) -> Result<ElValue> {
        if left.is_null() && right.is_null() {
            return Ok(ElValue::Long(0));
        }
        let floating = is_floating(left)
            || is_floating(right)
            || is_big_decimal(left)
            || is_big_decimal(right);
        if floating {
            return Ok(ElValue::Double(double(left)? % double(right)?));
        }
        if is_big_integer(left) || is_big_integer(right) {
            let divisor = big_integer(right)?;
            if divisor == 0 {
                return Err(division_by_zero());
            }
            let remainder = big_integer(left)?
                .checked_rem(divisor)
                .ok_or_else(|| overflow(BinaryOperator::Modulo))?;
            return Ok(ElValue::BigInteger(remainder));
        }
        let divisor = long(right)?;
        if divisor == 0 {
            return Err(division_by_zero());
        }
        Ok(ElValue::Long(long(left)?.wrapping_rem(divisor)))
    }

    /// Evaluate unary minus
    ///
    /// Numbers keep their representation; strings become `Double` or `Long`
    /// depending on their form; `null` is zero.
    pub fn negate(operand: &ElValue) -> Result<ElValue> {
        let value = match operand {
            ElValue::Null => ElValue::Long(0),
            ElValue::String(s) if TypeCoercion::is_string_float(s) => {
                ElValue::Double(-double(operand)?)
            }
            ElValue::String(_) => ElValue::Long(long(operand)?.wrapping_neg()),
            ElValue::Byte(v) => ElValue::Byte(v.wrapping_neg()),
            ElValue::Short(v) => ElValue::Short(v.wrapping_neg()),
            ElValue::Int(v) => ElValue::Int(v.wrapping_neg()),
            ElValue::Long(v) => ElValue::Long(v.wrapping_neg()),
            ElValue::Float(v) => ElValue::Float(-v),
            ElValue::Double(v) => ElValue::Double(-v),
            ElValue::BigInteger(v) => ElValue::BigInteger(v.checked_neg().ok_or_else(|| {
                ElError::Arithmetic {
                    message: "numeric overflow in unary '-'".to_string(),
                }
            })?),
            ElValue::BigDecimal(d) => ElValue::BigDecimal(-*d),
            other => ElValue::Long(long(other)?.wrapping_neg()),
        };
        Ok(value)
    }
}
