// ABOUTME: Binary/unary operator kernel — type-dependent semantics over values.

use crate::ast::{AdditiveOp, ComparisonOp, EqualityOp, MultiplicativeOp, ShiftOp, SourceSpan, UnaryOp};
use crate::comparer::{compare, ComparerRegistry};
use crate::error::EvalError;
use crate::value::{to_boolean, to_decimal, to_integer, to_text, Value};
use chrono::Duration as ChronoDuration;
use rust_decimal::Decimal;

fn type_err(op: &str, left: &Value, right: &Value, span: Option<SourceSpan>) -> EvalError {
    EvalError::type_error(
        format!(
            "`{op}` is not defined for {:?} and {:?}",
            left.type_tag(),
            right.type_tag()
        ),
        span,
    )
}

/// `+` (§4.2): `Integer+Integer` wraps; a numeric mix widens to `Decimal`;
/// `DateTime+Duration` shifts the instant; `Duration+Duration` sums spans;
/// text concatenation applies whenever at least one operand is `Text`
/// (§3 invariant), rendering both via their canonical textual form.
pub fn add(left: &Value, right: &Value, span: Option<SourceSpan>) -> Result<Value, EvalError> {
    match (left, right) {
        (Value::Text(_), _) | (_, Value::Text(_)) => {
            Ok(Value::Text(format!("{}{}", to_text(left), to_text(right))))
        }
        (Value::Integer(a), Value::Integer(b)) => Ok(Value::Integer(a.wrapping_add(*b))),
        (Value::DateTime(dt), Value::Duration(d)) | (Value::Duration(d), Value::DateTime(dt)) => {
            Ok(Value::DateTime(*dt + *d))
        }
        (Value::Duration(a), Value::Duration(b)) => Ok(Value::Duration(*a + *b)),
        (l, r) if l.is_numeric() && r.is_numeric() => {
            Ok(Value::Decimal(to_decimal(l)? + to_decimal(r)?))
        }
        _ => Err(type_err("+", left, right, span)),
    }
}

/// `-` (§4.2): mirrors `+`'s numeric/temporal cases; no text case (unlike
/// `+`, subtraction never concatenates).
pub fn sub(left: &Value, right: &Value, span: Option<SourceSpan>) -> Result<Value, EvalError> {
    match (left, right) {
        (Value::Integer(a), Value::Integer(b)) => Ok(Value::Integer(a.wrapping_sub(*b))),
        (Value::DateTime(dt), Value::Duration(d)) => Ok(Value::DateTime(*dt - *d)),
        (Value::DateTime(a), Value::DateTime(b)) => Ok(Value::Duration(*a - *b)),
        (Value::Duration(a), Value::Duration(b)) => Ok(Value::Duration(*a - *b)),
        (l, r) if l.is_numeric() && r.is_numeric() => {
            Ok(Value::Decimal(to_decimal(l)? - to_decimal(r)?))
        }
        _ => Err(type_err("-", left, right, span)),
    }
}

/// `*` (§4.2): always coerces both operands to `Decimal`, even when both are
/// `Integer` — the table in §4.2 gives multiplicative operators no
/// pure-integer path, unlike `+`/`-`. See DESIGN.md for the scenario-2
/// (`a * a`) consequence of this choice.
pub fn mul(left: &Value, right: &Value, span: Option<SourceSpan>) -> Result<Value, EvalError> {
    if left.is_numeric() && right.is_numeric() {
        Ok(Value::Decimal(to_decimal(left)? * to_decimal(right)?))
    } else {
        Err(type_err("*", left, right, span))
    }
}

/// `/` (§4.2): coerces both to `Decimal`; division by zero raises
/// `ArithmeticError`.
pub fn div(left: &Value, right: &Value, span: Option<SourceSpan>) -> Result<Value, EvalError> {
    if left.is_numeric() && right.is_numeric() {
        let r = to_decimal(right)?;
        if r.is_zero() {
            return Err(EvalError::arithmetic_error("division by zero", span));
        }
        Ok(Value::Decimal(to_decimal(left)? / r))
    } else {
        Err(type_err("/", left, right, span))
    }
}

/// `%` (§4.2): coerces both to `Decimal`; modulo by zero raises
/// `ArithmeticError`.
pub fn rem(left: &Value, right: &Value, span: Option<SourceSpan>) -> Result<Value, EvalError> {
    if left.is_numeric() && right.is_numeric() {
        let r = to_decimal(right)?;
        if r.is_zero() {
            return Err(EvalError::arithmetic_error("modulo by zero", span));
        }
        Ok(Value::Decimal(to_decimal(left)? % r))
    } else {
        Err(type_err("%", left, right, span))
    }
}

/// `<<`/`>>` (§4.2): both operands coerced to `Integer` regardless of
/// whether they started out numeric mixed or pure integer.
pub fn shift(op: ShiftOp, left: &Value, right: &Value, span: Option<SourceSpan>) -> Result<Value, EvalError> {
    let l = to_integer(left).map_err(|_| type_err("<</>>", left, right, span))?;
    let r = to_integer(right).map_err(|_| type_err("<</>>", left, right, span))?;
    let shift_amount = (r & 31) as u32;
    Ok(Value::Integer(match op {
        ShiftOp::Shl => l.wrapping_shl(shift_amount),
        ShiftOp::Shr => l.wrapping_shr(shift_amount),
    }))
}

pub fn additive(op: AdditiveOp, left: &Value, right: &Value, span: Option<SourceSpan>) -> Result<Value, EvalError> {
    match op {
        AdditiveOp::Add => add(left, right, span),
        AdditiveOp::Sub => sub(left, right, span),
    }
}

pub fn multiplicative(
    op: MultiplicativeOp,
    left: &Value,
    right: &Value,
    span: Option<SourceSpan>,
) -> Result<Value, EvalError> {
    match op {
        MultiplicativeOp::Mul => mul(left, right, span),
        MultiplicativeOp::Div => div(left, right, span),
        MultiplicativeOp::Mod => rem(left, right, span),
    }
}

/// Comparison operators (`<`,`<=`,`>`,`>=`), §4.2: resolve a comparer via
/// the registry dispatch algorithm and threshold the result.
pub fn comparison(
    registry: &ComparerRegistry,
    op: ComparisonOp,
    left: &Value,
    right: &Value,
    span: Option<SourceSpan>,
) -> Result<Value, EvalError> {
    let ordering = compare(registry, left, right).map_err(|e| match e {
        EvalError::TypeError { message, .. } => EvalError::type_error(message, span),
        other => other,
    })?;
    Ok(Value::Boolean(match op {
        ComparisonOp::Lt => ordering < 0,
        ComparisonOp::Le => ordering <= 0,
        ComparisonOp::Gt => ordering > 0,
        ComparisonOp::Ge => ordering >= 0,
    }))
}

/// Equality operators (`==`,`!=`), §4.2: "Equality of differing incomparable
/// variant tags returns not equal rather than failing."
pub fn equality(
    registry: &ComparerRegistry,
    op: EqualityOp,
    left: &Value,
    right: &Value,
) -> Result<Value, EvalError> {
    let equal = match compare(registry, left, right) {
        Ok(ordering) => ordering == 0,
        Err(_) if left.type_tag() != right.type_tag() => false,
        Err(e) => return Err(e),
    };
    Ok(Value::Boolean(match op {
        EqualityOp::Eq => equal,
        EqualityOp::Ne => !equal,
    }))
}

/// Logical operators evaluate both sides unconditionally — no
/// short-circuit, matching observed source behaviour (§4.2, §9 open
/// question, preserved as-is).
pub fn logical_or(left: &Value, right: &Value) -> Result<Value, EvalError> {
    let (l, r) = (to_boolean(left)?, to_boolean(right)?);
    Ok(Value::Boolean(l || r))
}

pub fn logical_and(left: &Value, right: &Value) -> Result<Value, EvalError> {
    let (l, r) = (to_boolean(left)?, to_boolean(right)?);
    Ok(Value::Boolean(l && r))
}

pub fn logical_xor(left: &Value, right: &Value) -> Result<Value, EvalError> {
    Ok(Value::Boolean(to_boolean(left)? ^ to_boolean(right)?))
}

/// Unary operators (§4.2): `-v` decimal-negates, `!v` boolean-negates, `+v`
/// (or no operator at all) coerces to `Decimal`.
pub fn unary(op: UnaryOp, operand: &Value) -> Result<Value, EvalError> {
    match op {
        UnaryOp::Negate => Ok(Value::Decimal(-to_decimal(operand)?)),
        UnaryOp::Not => Ok(Value::Boolean(!to_boolean(operand)?)),
        UnaryOp::Plus => Ok(Value::Decimal(to_decimal(operand)?)),
    }
}
