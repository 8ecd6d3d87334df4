//! Value representation
//!
//! `JsValue` is what the operand stack, property tables and environment
//! bindings hold. Conversions that may run guest code (ToPrimitive and
//! everything built on it) live in `interpreter::abstract_ops`; this module
//! only has the ones that never call back into the VM.

use std::fmt;
use std::rc::Rc;

use serde::{Serialize, Serializer};

use crate::interpreter::object::JsObjectRef;

/// Trait for types that have cheap (O(1), reference-counted) clones.
///
/// This trait makes it explicit when a clone is cheap (just incrementing a reference count)
/// vs when it might be expensive (copying data). Types implementing this trait should have
/// O(1) clone operations, typically because they use `Rc` or similar reference counting.
///
/// # Examples
/// - `JsObjectRef` (Rc<RefCell<JsObject>>) - cheap clone
/// - `JsString` (Rc<str>) - cheap clone
/// - `Env` (Rc<RefCell<EnvNode>>) - cheap clone
/// - `Rc<Code>` - cheap clone
pub trait CheapClone: Clone {
    /// Same as `clone()`, spelled out so call sites show the cost.
    fn cheap_clone(&self) -> Self {
        self.clone()
    }
}

impl<T: ?Sized> CheapClone for Rc<T> {}

/// A language value
#[derive(Clone, Default)]
pub enum JsValue {
    #[default]
    Undefined,
    Null,
    Boolean(bool),
    Number(f64),
    String(JsString),
    Object(JsObjectRef),
}

impl CheapClone for JsValue {}

impl JsValue {
    pub fn is_null_or_undefined(&self) -> bool {
        matches!(self, JsValue::Null | JsValue::Undefined)
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, JsValue::Undefined)
    }

    pub fn is_object(&self) -> bool {
        matches!(self, JsValue::Object(_))
    }

    pub fn as_object(&self) -> Option<&JsObjectRef> {
        match self {
            JsValue::Object(obj) => Some(obj),
            _ => None,
        }
    }

    /// IsCallable
    pub fn is_callable(&self) -> bool {
        match self {
            JsValue::Object(obj) => obj.is_callable(),
            _ => false,
        }
    }

    /// Result of the `typeof` operator for a resolved value
    pub fn type_of(&self) -> &'static str {
        match self {
            JsValue::Undefined => "undefined",
            JsValue::Null => "object",
            JsValue::Boolean(_) => "boolean",
            JsValue::Number(_) => "number",
            JsValue::String(_) => "string",
            JsValue::Object(obj) => {
                if obj.is_callable() {
                    "function"
                } else {
                    "object"
                }
            }
        }
    }

    /// ToBoolean
    pub fn to_boolean(&self) -> bool {
        match self {
            JsValue::Undefined | JsValue::Null => false,
            JsValue::Boolean(b) => *b,
            JsValue::Number(n) => *n != 0.0 && !n.is_nan(),
            JsValue::String(s) => !s.is_empty(),
            JsValue::Object(_) => true,
        }
    }

    /// Strict equality (===)
    pub fn strict_equals(&self, other: &JsValue) -> bool {
        match (self, other) {
            (JsValue::Undefined, JsValue::Undefined) => true,
            (JsValue::Null, JsValue::Null) => true,
            (JsValue::Boolean(a), JsValue::Boolean(b)) => a == b,
            // NaN compares unequal, +0 equals -0
            (JsValue::Number(a), JsValue::Number(b)) => a == b,
            (JsValue::String(a), JsValue::String(b)) => a == b,
            (JsValue::Object(a), JsValue::Object(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    /// SameValue: like `===` except that NaN equals itself and the zeros differ
    pub fn same_value(&self, other: &JsValue) -> bool {
        match (self, other) {
            (JsValue::Number(a), JsValue::Number(b)) => {
                if a.is_nan() && b.is_nan() {
                    true
                } else {
                    a == b && a.is_sign_negative() == b.is_sign_negative()
                }
            }
            _ => self.strict_equals(other),
        }
    }
}

impl fmt::Debug for JsValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JsValue::Undefined => write!(f, "undefined"),
            JsValue::Null => write!(f, "null"),
            JsValue::Boolean(b) => write!(f, "{}", b),
            JsValue::Number(n) => write!(f, "{}", number_to_string(*n)),
            JsValue::String(s) => write!(f, "\"{}\"", s.as_str()),
            JsValue::Object(obj) => write!(f, "{:?}", obj),
        }
    }
}

impl PartialEq for JsValue {
    fn eq(&self, other: &Self) -> bool {
        self.strict_equals(other)
    }
}

/// Literal values are the only ones that end up inside `Code`; objects are
/// written as an opaque marker.
impl Serialize for JsValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            JsValue::Undefined => serializer.serialize_unit_variant("JsValue", 0, "undefined"),
            JsValue::Null => serializer.serialize_none(),
            JsValue::Boolean(b) => serializer.serialize_bool(*b),
            JsValue::Number(n) => {
                if n.is_finite() {
                    serializer.serialize_f64(*n)
                } else {
                    serializer.serialize_str(&number_to_string(*n))
                }
            }
            JsValue::String(s) => serializer.serialize_str(s.as_str()),
            JsValue::Object(_) => serializer.serialize_unit_variant("JsValue", 5, "object"),
        }
    }
}

impl From<bool> for JsValue {
    fn from(b: bool) -> Self {
        JsValue::Boolean(b)
    }
}

impl From<f64> for JsValue {
    fn from(n: f64) -> Self {
        JsValue::Number(n)
    }
}

impl From<i32> for JsValue {
    fn from(n: i32) -> Self {
        JsValue::Number(f64::from(n))
    }
}

impl From<u32> for JsValue {
    fn from(n: u32) -> Self {
        JsValue::Number(f64::from(n))
    }
}

impl From<&str> for JsValue {
    fn from(s: &str) -> Self {
        JsValue::String(JsString::from(s))
    }
}

impl From<String> for JsValue {
    fn from(s: String) -> Self {
        JsValue::String(JsString::from(s))
    }
}

impl From<JsString> for JsValue {
    fn from(s: JsString) -> Self {
        JsValue::String(s)
    }
}

impl From<JsObjectRef> for JsValue {
    fn from(obj: JsObjectRef) -> Self {
        JsValue::Object(obj)
    }
}

/// Reference-counted immutable string
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JsString(Rc<str>);

impl CheapClone for JsString {}

impl JsString {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Length in UTF-16 code units, which is what `length` reports
    pub fn utf16_len(&self) -> usize {
        self.0.encode_utf16().count()
    }

    /// The code unit at `index` as a one-unit string
    pub fn unit_at(&self, index: usize) -> Option<JsString> {
        let unit = self.0.encode_utf16().nth(index)?;
        Some(JsString::from(String::from_utf16_lossy(&[unit])))
    }

    pub fn concat(&self, other: &str) -> JsString {
        let mut s = String::with_capacity(self.0.len() + other.len());
        s.push_str(&self.0);
        s.push_str(other);
        JsString::from(s)
    }
}

impl AsRef<str> for JsString {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::borrow::Borrow<str> for JsString {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for JsString {
    fn eq(&self, other: &str) -> bool {
        self.0.as_ref() == other
    }
}

impl PartialEq<&str> for JsString {
    fn eq(&self, other: &&str) -> bool {
        self.0.as_ref() == *other
    }
}

impl From<&str> for JsString {
    fn from(s: &str) -> Self {
        JsString(s.into())
    }
}

impl From<String> for JsString {
    fn from(s: String) -> Self {
        JsString(s.into())
    }
}

impl fmt::Debug for JsString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\"", self.0)
    }
}

impl fmt::Display for JsString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for JsString {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

/// Property key
///
/// Array indices (canonical numeric strings below 2^32 - 1) are stored as
/// `Index` so array and arguments objects can work on them directly. Every
/// constructor normalises, so `"1"` and `1` produce the same key.
#[derive(Clone, PartialEq, Eq, Hash)]
pub enum PropertyKey {
    String(JsString),
    Index(u32),
}

impl CheapClone for PropertyKey {}

impl PropertyKey {
    pub fn as_index(&self) -> Option<u32> {
        match self {
            PropertyKey::Index(i) => Some(*i),
            PropertyKey::String(_) => None,
        }
    }

    pub fn to_js_string(&self) -> JsString {
        match self {
            PropertyKey::String(s) => s.cheap_clone(),
            PropertyKey::Index(i) => JsString::from(i.to_string()),
        }
    }

    pub fn eq_str(&self, s: &str) -> bool {
        match self {
            PropertyKey::String(k) => k.as_str() == s,
            PropertyKey::Index(_) => false,
        }
    }
}

/// Parse a canonical array index: no sign, no leading zeros, below 2^32 - 1
fn canonical_index(s: &str) -> Option<u32> {
    if s.is_empty() || (s.len() > 1 && s.starts_with('0')) {
        return None;
    }
    if !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let n: u64 = s.parse().ok()?;
    if n < u64::from(u32::MAX) {
        u32::try_from(n).ok()
    } else {
        None
    }
}

impl From<&str> for PropertyKey {
    fn from(s: &str) -> Self {
        match canonical_index(s) {
            Some(i) => PropertyKey::Index(i),
            None => PropertyKey::String(JsString::from(s)),
        }
    }
}

impl From<JsString> for PropertyKey {
    fn from(s: JsString) -> Self {
        match canonical_index(s.as_str()) {
            Some(i) => PropertyKey::Index(i),
            None => PropertyKey::String(s),
        }
    }
}

impl From<&JsString> for PropertyKey {
    fn from(s: &JsString) -> Self {
        PropertyKey::from(s.cheap_clone())
    }
}

impl From<u32> for PropertyKey {
    fn from(idx: u32) -> Self {
        if idx == u32::MAX {
            PropertyKey::String(JsString::from(idx.to_string()))
        } else {
            PropertyKey::Index(idx)
        }
    }
}

impl fmt::Display for PropertyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyKey::String(s) => write!(f, "{}", s),
            PropertyKey::Index(i) => write!(f, "{}", i),
        }
    }
}

impl fmt::Debug for PropertyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyKey::String(s) => write!(f, "{:?}", s),
            PropertyKey::Index(i) => write!(f, "{}", i),
        }
    }
}

/// Number::toString for radix 10
pub fn number_to_string(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_string();
    }
    if n == 0.0 {
        return "0".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if n < 0.0 {
        return format!("-{}", number_to_string(-n));
    }

    // `{:e}` gives the shortest round-tripping digits
    let sci = format!("{:e}", n);
    let Some((mantissa, exponent)) = sci.split_once('e') else {
        return n.to_string();
    };
    let digits: String = mantissa.chars().filter(|c| c.is_ascii_digit()).collect();
    let k = i64::try_from(digits.len()).unwrap_or(1);
    let point = exponent.parse::<i64>().unwrap_or(0) + 1;

    if k <= point && point <= 21 {
        let zeros = usize::try_from(point - k).unwrap_or(0);
        format!("{}{}", digits, "0".repeat(zeros))
    } else if 0 < point && point <= 21 {
        let split = usize::try_from(point).unwrap_or(0);
        let int: String = digits.chars().take(split).collect();
        let frac: String = digits.chars().skip(split).collect();
        format!("{}.{}", int, frac)
    } else if -6 < point && point <= 0 {
        let zeros = usize::try_from(-point).unwrap_or(0);
        format!("0.{}{}", "0".repeat(zeros), digits)
    } else {
        let e = point - 1;
        let sign = if e >= 0 { '+' } else { '-' };
        let first: String = digits.chars().take(1).collect();
        let rest: String = digits.chars().skip(1).collect();
        if rest.is_empty() {
            format!("{}e{}{}", first, sign, e.abs())
        } else {
            format!("{}.{}e{}{}", first, rest, sign, e.abs())
        }
    }
}

/// Whitespace and line terminators that StringToNumber trims
pub fn is_js_whitespace(c: char) -> bool {
    c.is_whitespace() || c == '\u{FEFF}'
}

/// StringToNumber
pub fn string_to_number(s: &str) -> f64 {
    let trimmed = s.trim_matches(is_js_whitespace);
    if trimmed.is_empty() {
        return 0.0;
    }

    if let Some(hex) = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        if hex.is_empty() {
            return f64::NAN;
        }
        let mut value = 0.0;
        for c in hex.chars() {
            match c.to_digit(16) {
                Some(d) => value = value * 16.0 + f64::from(d),
                None => return f64::NAN,
            }
        }
        return value;
    }

    let (sign, body) = match trimmed.strip_prefix('-') {
        Some(rest) => (-1.0, rest),
        None => (1.0, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };
    if body == "Infinity" {
        return sign * f64::INFINITY;
    }
    if !is_decimal_literal(body) {
        return f64::NAN;
    }
    body.parse::<f64>().map(|n| sign * n).unwrap_or(f64::NAN)
}

/// Unsigned StrDecimalLiteral without `Infinity`
fn is_decimal_literal(s: &str) -> bool {
    let mut chars = s.chars().peekable();
    let mut int_digits = 0;
    while chars.next_if(|c| c.is_ascii_digit()).is_some() {
        int_digits += 1;
    }
    let mut frac_digits = 0;
    if chars.next_if_eq(&'.').is_some() {
        while chars.next_if(|c| c.is_ascii_digit()).is_some() {
            frac_digits += 1;
        }
    }
    if int_digits + frac_digits == 0 {
        return false;
    }
    if chars.next_if(|c| *c == 'e' || *c == 'E').is_some() {
        chars.next_if(|c| *c == '+' || *c == '-');
        let mut exp_digits = 0;
        while chars.next_if(|c| c.is_ascii_digit()).is_some() {
            exp_digits += 1;
        }
        if exp_digits == 0 {
            return false;
        }
    }
    chars.next().is_none()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_boolean() {
        assert!(!JsValue::Undefined.to_boolean());
        assert!(!JsValue::Null.to_boolean());
        assert!(!JsValue::Number(f64::NAN).to_boolean());
        assert!(!JsValue::Number(-0.0).to_boolean());
        assert!(!JsValue::from("").to_boolean());
        assert!(JsValue::from("0").to_boolean());
        assert!(JsValue::Number(0.5).to_boolean());
    }

    #[test]
    fn test_same_value_vs_strict_equals() {
        let nan = JsValue::Number(f64::NAN);
        assert!(nan.same_value(&nan));
        assert!(!nan.strict_equals(&nan));

        let zero = JsValue::Number(0.0);
        let neg_zero = JsValue::Number(-0.0);
        assert!(zero.strict_equals(&neg_zero));
        assert!(!zero.same_value(&neg_zero));
    }

    #[test]
    fn test_property_key_normalises_indices() {
        assert_eq!(PropertyKey::from("7"), PropertyKey::Index(7));
        assert_eq!(PropertyKey::from(7u32), PropertyKey::Index(7));
        assert!(matches!(PropertyKey::from("07"), PropertyKey::String(_)));
        assert!(matches!(PropertyKey::from("-1"), PropertyKey::String(_)));
        assert!(matches!(
            PropertyKey::from("4294967295"),
            PropertyKey::String(_)
        ));
        assert_eq!(PropertyKey::from("4294967294"), PropertyKey::Index(4294967294));
    }

    #[test]
    fn test_number_to_string() {
        assert_eq!(number_to_string(42.0), "42");
        assert_eq!(number_to_string(-0.0), "0");
        assert_eq!(number_to_string(0.1), "0.1");
        assert_eq!(number_to_string(1.5e-7), "1.5e-7");
        assert_eq!(number_to_string(0.000001), "0.000001");
        assert_eq!(number_to_string(1e21), "1e+21");
        assert_eq!(number_to_string(123456789012345680000.0), "123456789012345680000");
        assert_eq!(number_to_string(-2.5), "-2.5");
        assert_eq!(number_to_string(f64::NEG_INFINITY), "-Infinity");
    }

    #[test]
    fn test_string_to_number() {
        assert_eq!(string_to_number("  12  "), 12.0);
        assert_eq!(string_to_number(""), 0.0);
        assert_eq!(string_to_number("0x1F"), 31.0);
        assert_eq!(string_to_number("-Infinity"), f64::NEG_INFINITY);
        assert_eq!(string_to_number(".5"), 0.5);
        assert_eq!(string_to_number("5."), 5.0);
        assert_eq!(string_to_number("1e3"), 1000.0);
        assert!(string_to_number("inf").is_nan());
        assert!(string_to_number("1e").is_nan());
        assert!(string_to_number("12px").is_nan());
        assert!(string_to_number(".").is_nan());
    }

    #[test]
    fn test_string_units() {
        let s = JsString::from("héllo");
        assert_eq!(s.utf16_len(), 5);
        assert_eq!(s.unit_at(1), Some(JsString::from("é")));
        assert_eq!(s.unit_at(9), None);
    }
}
