//! Type conversion and operator semantics
//!
//! Anything that can reach `valueOf`/`toString` takes the realm and returns
//! a `JsResult`. The number crunching underneath is kept in plain functions.

use std::cmp::Ordering;

use super::completion::JsResult;
use super::object::JsObjectRef;
use super::realm::Realm;
use crate::ast::{BinaryOp, UnaryOp};
use crate::value::{CheapClone, JsString, JsValue, PropertyKey, number_to_string, string_to_number};

/// Hint passed to ToPrimitive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreferredType {
    Number,
    String,
}

/// ToPrimitive; objects go through `valueOf`/`toString` in hint order
pub fn to_primitive(realm: &Realm, value: &JsValue, hint: Option<PreferredType>) -> JsResult<JsValue> {
    let JsValue::Object(obj) = value else {
        return Ok(value.clone());
    };
    let order = match hint.unwrap_or(PreferredType::Number) {
        PreferredType::String => ["toString", "valueOf"],
        PreferredType::Number => ["valueOf", "toString"],
    };
    for name in order {
        let method = obj.get(realm, &PropertyKey::from(name), value)?;
        if let JsValue::Object(func) = &method
            && func.is_callable()
        {
            let result = realm.call(func, value, &[])?;
            if !result.is_object() {
                return Ok(result);
            }
        }
    }
    Err(realm.throw_type_error("Cannot convert object to primitive value"))
}

/// ToNumber for values that are already primitive
pub fn primitive_to_number(value: &JsValue) -> f64 {
    match value {
        JsValue::Undefined => f64::NAN,
        JsValue::Null => 0.0,
        JsValue::Boolean(b) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        JsValue::Number(n) => *n,
        JsValue::String(s) => string_to_number(s.as_str()),
        JsValue::Object(_) => f64::NAN,
    }
}

pub fn to_number(realm: &Realm, value: &JsValue) -> JsResult<f64> {
    match value {
        JsValue::Object(_) => {
            let prim = to_primitive(realm, value, Some(PreferredType::Number))?;
            Ok(primitive_to_number(&prim))
        }
        other => Ok(primitive_to_number(other)),
    }
}

/// ToString for values that are already primitive
pub fn primitive_to_string(value: &JsValue) -> JsString {
    match value {
        JsValue::Undefined => JsString::from("undefined"),
        JsValue::Null => JsString::from("null"),
        JsValue::Boolean(true) => JsString::from("true"),
        JsValue::Boolean(false) => JsString::from("false"),
        JsValue::Number(n) => JsString::from(number_to_string(*n)),
        JsValue::String(s) => s.cheap_clone(),
        JsValue::Object(_) => JsString::from("[object Object]"),
    }
}

pub fn to_string(realm: &Realm, value: &JsValue) -> JsResult<JsString> {
    match value {
        JsValue::Object(_) => {
            let prim = to_primitive(realm, value, Some(PreferredType::String))?;
            Ok(primitive_to_string(&prim))
        }
        other => Ok(primitive_to_string(other)),
    }
}

/// ToObject; null and undefined throw
pub fn to_object(realm: &Realm, value: &JsValue) -> JsResult<JsObjectRef> {
    if let JsValue::Object(obj) = value {
        return Ok(obj.cheap_clone());
    }
    realm
        .new_wrapper(value)
        .ok_or_else(|| realm.throw_type_error("Cannot convert undefined or null to object"))
}

pub fn to_property_key(realm: &Realm, value: &JsValue) -> JsResult<PropertyKey> {
    match value {
        JsValue::Number(n) if *n >= 0.0 && n.fract() == 0.0 && *n < f64::from(u32::MAX) => {
            Ok(PropertyKey::from(*n as u32))
        }
        JsValue::String(s) => Ok(PropertyKey::from(s)),
        other => Ok(PropertyKey::from(to_string(realm, other)?)),
    }
}

/// ToInteger on a number
pub fn number_to_integer(n: f64) -> f64 {
    if n.is_nan() {
        0.0
    } else if n.is_infinite() || n == 0.0 {
        n
    } else {
        n.trunc()
    }
}

pub fn to_integer(realm: &Realm, value: &JsValue) -> JsResult<f64> {
    Ok(number_to_integer(to_number(realm, value)?))
}

/// ToUint32 on a number: modulo 2^32
pub fn number_to_uint32(n: f64) -> u32 {
    if !n.is_finite() || n == 0.0 {
        return 0;
    }
    const TWO_32: f64 = 4_294_967_296.0;
    let wrapped = n.trunc() % TWO_32;
    let positive = if wrapped < 0.0 { wrapped + TWO_32 } else { wrapped };
    positive as u32
}

/// ToInt32 on a number
pub fn number_to_int32(n: f64) -> i32 {
    number_to_uint32(n) as i32
}

pub fn to_uint32(realm: &Realm, value: &JsValue) -> JsResult<u32> {
    Ok(number_to_uint32(to_number(realm, value)?))
}

pub fn to_int32(realm: &Realm, value: &JsValue) -> JsResult<i32> {
    Ok(number_to_int32(to_number(realm, value)?))
}

/// Abstract equality (`==`)
pub fn abstract_equals(realm: &Realm, x: &JsValue, y: &JsValue) -> JsResult<bool> {
    match (x, y) {
        (JsValue::Undefined | JsValue::Null, JsValue::Undefined | JsValue::Null) => Ok(true),
        (JsValue::Number(a), JsValue::String(b)) => Ok(*a == string_to_number(b.as_str())),
        (JsValue::String(a), JsValue::Number(b)) => Ok(string_to_number(a.as_str()) == *b),
        (JsValue::Boolean(_), _) => abstract_equals(realm, &JsValue::Number(primitive_to_number(x)), y),
        (_, JsValue::Boolean(_)) => abstract_equals(realm, x, &JsValue::Number(primitive_to_number(y))),
        (JsValue::Number(_) | JsValue::String(_), JsValue::Object(_)) => {
            let prim = to_primitive(realm, y, None)?;
            abstract_equals(realm, x, &prim)
        }
        (JsValue::Object(_), JsValue::Number(_) | JsValue::String(_)) => {
            let prim = to_primitive(realm, x, None)?;
            abstract_equals(realm, &prim, y)
        }
        _ => Ok(x.strict_equals(y)),
    }
}

/// Compare strings by UTF-16 code units
fn compare_code_units(a: &str, b: &str) -> Ordering {
    a.encode_utf16().cmp(b.encode_utf16())
}

/// Abstract relational comparison `x < y`
///
/// `left_first` controls which operand is converted first. `None` is the
/// undefined result of comparisons involving NaN.
pub fn abstract_relational(
    realm: &Realm,
    x: &JsValue,
    y: &JsValue,
    left_first: bool,
) -> JsResult<Option<bool>> {
    let (px, py) = if left_first {
        let px = to_primitive(realm, x, Some(PreferredType::Number))?;
        let py = to_primitive(realm, y, Some(PreferredType::Number))?;
        (px, py)
    } else {
        let py = to_primitive(realm, y, Some(PreferredType::Number))?;
        let px = to_primitive(realm, x, Some(PreferredType::Number))?;
        (px, py)
    };

    if let (JsValue::String(a), JsValue::String(b)) = (&px, &py) {
        return Ok(Some(compare_code_units(a.as_str(), b.as_str()) == Ordering::Less));
    }

    let nx = primitive_to_number(&px);
    let ny = primitive_to_number(&py);
    if nx.is_nan() || ny.is_nan() {
        return Ok(None);
    }
    Ok(Some(nx < ny))
}

/// The `+` operator
fn add(realm: &Realm, left: &JsValue, right: &JsValue) -> JsResult<JsValue> {
    let lprim = to_primitive(realm, left, None)?;
    let rprim = to_primitive(realm, right, None)?;
    if matches!(lprim, JsValue::String(_)) || matches!(rprim, JsValue::String(_)) {
        let l = primitive_to_string(&lprim);
        let r = primitive_to_string(&rprim);
        return Ok(JsValue::String(l.concat(r.as_str())));
    }
    Ok(JsValue::Number(
        primitive_to_number(&lprim) + primitive_to_number(&rprim),
    ))
}

/// Evaluate a binary operator on two values
pub fn binary_op(realm: &Realm, op: BinaryOp, left: &JsValue, right: &JsValue) -> JsResult<JsValue> {
    let result = match op {
        BinaryOp::Add => return add(realm, left, right),
        BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => {
            let l = to_number(realm, left)?;
            let r = to_number(realm, right)?;
            JsValue::Number(match op {
                BinaryOp::Sub => l - r,
                BinaryOp::Mul => l * r,
                BinaryOp::Div => l / r,
                _ => l % r,
            })
        }

        BinaryOp::Eq => JsValue::Boolean(abstract_equals(realm, left, right)?),
        BinaryOp::NotEq => JsValue::Boolean(!abstract_equals(realm, left, right)?),
        BinaryOp::StrictEq => JsValue::Boolean(left.strict_equals(right)),
        BinaryOp::StrictNotEq => JsValue::Boolean(!left.strict_equals(right)),

        BinaryOp::Lt => {
            JsValue::Boolean(abstract_relational(realm, left, right, true)? == Some(true))
        }
        BinaryOp::Gt => {
            JsValue::Boolean(abstract_relational(realm, right, left, false)? == Some(true))
        }
        BinaryOp::LtEq => {
            JsValue::Boolean(abstract_relational(realm, right, left, false)? == Some(false))
        }
        BinaryOp::GtEq => {
            JsValue::Boolean(abstract_relational(realm, left, right, true)? == Some(false))
        }

        BinaryOp::BitAnd | BinaryOp::BitOr | BinaryOp::BitXor => {
            let l = to_int32(realm, left)?;
            let r = to_int32(realm, right)?;
            JsValue::from(match op {
                BinaryOp::BitAnd => l & r,
                BinaryOp::BitOr => l | r,
                _ => l ^ r,
            })
        }
        BinaryOp::LShift => {
            let l = to_int32(realm, left)?;
            let r = to_uint32(realm, right)?;
            JsValue::from(l.wrapping_shl(r & 0x1F))
        }
        BinaryOp::RShift => {
            let l = to_int32(realm, left)?;
            let r = to_uint32(realm, right)?;
            JsValue::from(l.wrapping_shr(r & 0x1F))
        }
        BinaryOp::URShift => {
            let l = to_uint32(realm, left)?;
            let r = to_uint32(realm, right)?;
            JsValue::from(l.wrapping_shr(r & 0x1F))
        }

        BinaryOp::In => {
            let JsValue::Object(obj) = right else {
                let key = to_string(realm, left)?;
                return Err(realm.throw_type_error(format!(
                    "Cannot use 'in' operator to search for '{}' in {}",
                    key,
                    primitive_to_string(right)
                )));
            };
            let key = to_property_key(realm, left)?;
            JsValue::Boolean(obj.has_property(&key))
        }
        BinaryOp::Instanceof => JsValue::Boolean(instance_of(realm, left, right)?),
    };
    Ok(result)
}

/// `value instanceof target`
pub fn instance_of(realm: &Realm, value: &JsValue, target: &JsValue) -> JsResult<bool> {
    let JsValue::Object(target) = target else {
        return Err(realm.throw_type_error("Right-hand side of 'instanceof' is not callable"));
    };
    if !target.is_callable() {
        return Err(realm.throw_type_error("Right-hand side of 'instanceof' is not callable"));
    }
    let JsValue::Object(object) = value else {
        return Ok(false);
    };
    let proto = target.get(
        realm,
        &PropertyKey::from("prototype"),
        &JsValue::Object(target.cheap_clone()),
    )?;
    let JsValue::Object(proto) = proto else {
        return Err(realm.throw_type_error(
            "Function has non-object prototype in instanceof check",
        ));
    };
    let mut current = object.prototype();
    while let Some(obj) = current {
        if obj.ptr_eq(&proto) {
            return Ok(true);
        }
        current = obj.prototype();
    }
    Ok(false)
}

/// Unary operators that only need the operand's value
pub fn unary_op(realm: &Realm, op: UnaryOp, value: &JsValue) -> JsResult<JsValue> {
    Ok(match op {
        UnaryOp::Minus => JsValue::Number(-to_number(realm, value)?),
        UnaryOp::Plus => JsValue::Number(to_number(realm, value)?),
        UnaryOp::Not => JsValue::Boolean(!value.to_boolean()),
        UnaryOp::BitNot => JsValue::from(!to_int32(realm, value)?),
        UnaryOp::Void => JsValue::Undefined,
        UnaryOp::Typeof => JsValue::from(value.type_of()),
        UnaryOp::Delete => JsValue::Boolean(true),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int32_wrapping() {
        assert_eq!(number_to_int32(4294967296.0), 0);
        assert_eq!(number_to_int32(2147483648.0), -2147483648);
        assert_eq!(number_to_int32(-1.0), -1);
        assert_eq!(number_to_int32(f64::NAN), 0);
        assert_eq!(number_to_uint32(-1.0), 4294967295);
        assert_eq!(number_to_uint32(3.9), 3);
    }

    #[test]
    fn test_to_integer() {
        assert_eq!(number_to_integer(f64::NAN), 0.0);
        assert_eq!(number_to_integer(-3.7), -3.0);
        assert_eq!(number_to_integer(f64::INFINITY), f64::INFINITY);
    }

    #[test]
    fn test_loose_equality() {
        let realm = Realm::new();
        let eq = |a: JsValue, b: JsValue| abstract_equals(&realm, &a, &b).unwrap();
        assert!(eq(JsValue::Null, JsValue::Undefined));
        assert!(eq(JsValue::from("1"), JsValue::Number(1.0)));
        assert!(eq(JsValue::Boolean(true), JsValue::from("1")));
        assert!(!eq(JsValue::Null, JsValue::Number(0.0)));
        assert!(!eq(JsValue::Number(f64::NAN), JsValue::Number(f64::NAN)));
    }

    #[test]
    fn test_relational_with_nan_is_undefined() {
        let realm = Realm::new();
        let nan = JsValue::Number(f64::NAN);
        let one = JsValue::Number(1.0);
        assert_eq!(abstract_relational(&realm, &nan, &one, true).unwrap(), None);
        let le = binary_op(&realm, BinaryOp::LtEq, &nan, &one).unwrap();
        assert_eq!(le, JsValue::Boolean(false));
    }

    #[test]
    fn test_string_comparison_uses_code_units() {
        let realm = Realm::new();
        // U+1F600 is the larger code point but starts with a lower code unit
        let a = JsValue::from("\u{1F600}");
        let b = JsValue::from("\u{FF5E}");
        assert_eq!(abstract_relational(&realm, &a, &b, true).unwrap(), Some(true));
    }

    #[test]
    fn test_addition_concatenates() {
        let realm = Realm::new();
        let r = binary_op(&realm, BinaryOp::Add, &JsValue::from("a"), &JsValue::Number(1.0)).unwrap();
        assert_eq!(r, JsValue::from("a1"));
        let r = binary_op(&realm, BinaryOp::Add, &JsValue::Boolean(true), &JsValue::Null).unwrap();
        assert_eq!(r, JsValue::Number(1.0));
    }

    #[test]
    fn test_shifts() {
        let realm = Realm::new();
        let shl = binary_op(&realm, BinaryOp::LShift, &JsValue::Number(1.0), &JsValue::Number(33.0)).unwrap();
        assert_eq!(shl, JsValue::Number(2.0));
        let ushr = binary_op(&realm, BinaryOp::URShift, &JsValue::Number(-1.0), &JsValue::Number(0.0)).unwrap();
        assert_eq!(ushr, JsValue::Number(4294967295.0));
    }

    #[test]
    fn test_property_key_of_numbers() {
        let realm = Realm::new();
        assert_eq!(to_property_key(&realm, &JsValue::Number(3.0)).unwrap(), PropertyKey::Index(3));
        assert_eq!(
            to_property_key(&realm, &JsValue::Number(1.5)).unwrap(),
            PropertyKey::from("1.5")
        );
    }
}
