use std::cmp::Ordering;

use crate::ast::{InfixOperator, UnaryOperator};

use super::{RuntimeError, Value};

/// Applies an infix operator to two already-evaluated operands. `and` and
/// `or` see both sides evaluated and pick one of them by truthiness.
pub fn binary(op: InfixOperator, a: Value, b: Value) -> Result<Value, RuntimeError> {
    let invalid = |a: &Value, b: &Value| RuntimeError::InvalidOperands {
        operator: op,
        left: a.type_name(),
        right: b.type_name(),
    };

    match op {
        InfixOperator::Or => Ok(if a.is_truthy() { a } else { b }),
        InfixOperator::And => Ok(if a.is_truthy() { b } else { a }),
        InfixOperator::Equal => Ok(Value::Boolean(a == b)),
        InfixOperator::NotEqual => Ok(Value::Boolean(a != b)),
        InfixOperator::LessThan => {
            compare(a, b, Ordering::is_lt).map_err(|(a, b)| invalid(&a, &b))
        }
        InfixOperator::LessThanOrEqual => {
            compare(a, b, Ordering::is_le).map_err(|(a, b)| invalid(&a, &b))
        }
        InfixOperator::GreaterThan => {
            compare(a, b, Ordering::is_gt).map_err(|(a, b)| invalid(&a, &b))
        }
        InfixOperator::GreaterThanOrEqual => {
            compare(a, b, Ordering::is_ge).map_err(|(a, b)| invalid(&a, &b))
        }
        InfixOperator::Concat => Ok(Value::String(format!("{}{}", a, b))),
        InfixOperator::Plus => match (a, b) {
            (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
            (Value::String(a), Value::String(b)) => Ok(Value::String(a + &b)),
            (a, b) => Err(invalid(&a, &b)),
        },
        InfixOperator::Minus => arithmetic(a, b, |a, b| a - b).map_err(|(a, b)| invalid(&a, &b)),
        InfixOperator::Multiply => {
            arithmetic(a, b, |a, b| a * b).map_err(|(a, b)| invalid(&a, &b))
        }
        InfixOperator::Divide => arithmetic(a, b, |a, b| a / b).map_err(|(a, b)| invalid(&a, &b)),
        InfixOperator::Modulo => arithmetic(a, b, |a, b| a % b).map_err(|(a, b)| invalid(&a, &b)),
        InfixOperator::Power => {
            arithmetic(a, b, f64::powf).map_err(|(a, b)| invalid(&a, &b))
        }
    }
}

pub fn unary(op: UnaryOperator, x: Value) -> Result<Value, RuntimeError> {
    match op {
        UnaryOperator::Negate => match x {
            Value::Number(n) => Ok(Value::Number(-n)),
            x => Err(RuntimeError::InvalidOperand {
                operator: op,
                operand: x.type_name(),
            }),
        },
        UnaryOperator::Not => Ok(Value::Boolean(!x.is_truthy())),
    }
}

fn arithmetic(a: Value, b: Value, f: impl Fn(f64, f64) -> f64) -> Result<Value, (Value, Value)> {
    match (a, b) {
        (Value::Number(a), Value::Number(b)) => Ok(Value::Number(f(a, b))),
        (a, b) => Err((a, b)),
    }
}

/// Orders numbers with numbers and strings with strings. Any other pairing
/// yields `Err` carrying both operand types.
fn compare(
    a: Value,
    b: Value,
    accept: fn(Ordering) -> bool,
) -> Result<Value, (Value, Value)> {
    let ordering = match (&a, &b) {
        (Value::Number(x), Value::Number(y)) => x.partial_cmp(y),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => return Err((a, b)),
    };
    Ok(Value::Boolean(ordering.is_some_and(accept)))
}
