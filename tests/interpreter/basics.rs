//! Basic language feature tests: arithmetic, precedence, comparison, variables, conversions

use super::{eval, eval_throws};
use stackjs::JsValue;

#[test]
fn test_arithmetic() {
    assert_eq!(eval("1 + 2"), JsValue::Number(3.0));
    assert_eq!(eval("10 - 4"), JsValue::Number(6.0));
    assert_eq!(eval("3 * 4"), JsValue::Number(12.0));
    assert_eq!(eval("15 / 3"), JsValue::Number(5.0));
    assert_eq!(eval("17 % 5"), JsValue::Number(2.0));
    assert_eq!(eval("-7 % 3"), JsValue::Number(-1.0));
}

#[test]
fn test_precedence() {
    assert_eq!(eval("1 + 2 * 3"), JsValue::Number(7.0));
    assert_eq!(eval("(1 + 2) * 3"), JsValue::Number(9.0));
    assert_eq!(eval("1 + 2 << 1"), JsValue::Number(6.0));
    assert_eq!(eval("1 < 2 === true"), JsValue::Boolean(true));
}

#[test]
fn test_number_literals() {
    assert_eq!(eval("0xff"), JsValue::Number(255.0));
    assert_eq!(eval("1e3"), JsValue::Number(1000.0));
    assert_eq!(eval(".5 + .5"), JsValue::Number(1.0));
}

#[test]
fn test_comparison() {
    assert_eq!(eval("1 < 2"), JsValue::Boolean(true));
    assert_eq!(eval("2 > 1"), JsValue::Boolean(true));
    assert_eq!(eval("2 <= 2"), JsValue::Boolean(true));
    assert_eq!(eval("'a' < 'b'"), JsValue::Boolean(true));
    assert_eq!(eval("'10' < '9'"), JsValue::Boolean(true));
    assert_eq!(eval("'10' < 9"), JsValue::Boolean(false));
    assert_eq!(eval("1 < NaN"), JsValue::Boolean(false));
    assert_eq!(eval("undefined < 1"), JsValue::Boolean(false));
}

#[test]
fn test_equality() {
    assert_eq!(eval("1 === 1"), JsValue::Boolean(true));
    assert_eq!(eval("1 !== 2"), JsValue::Boolean(true));
    assert_eq!(eval("1 == '1'"), JsValue::Boolean(true));
    assert_eq!(eval("null == undefined"), JsValue::Boolean(true));
    assert_eq!(eval("null === undefined"), JsValue::Boolean(false));
    assert_eq!(eval("0 == false"), JsValue::Boolean(true));
    assert_eq!(eval("NaN == NaN"), JsValue::Boolean(false));
    assert_eq!(eval("NaN === NaN"), JsValue::Boolean(false));
    assert_eq!(eval("0 === -0"), JsValue::Boolean(true));
    assert_eq!(eval("var o = {}; o == o"), JsValue::Boolean(true));
    assert_eq!(eval("({}) == ({})"), JsValue::Boolean(false));
}

#[test]
fn test_string_concatenation() {
    assert_eq!(eval("'a' + 'b'"), JsValue::from("ab"));
    assert_eq!(eval("'n' + 1"), JsValue::from("n1"));
    assert_eq!(eval("1 + 2 + '3'"), JsValue::from("33"));
    assert_eq!(eval("'x' + null + undefined"), JsValue::from("xnullundefined"));
    assert_eq!(eval("'' + 1.5"), JsValue::from("1.5"));
}

#[test]
fn test_bitwise() {
    assert_eq!(eval("5 & 3"), JsValue::Number(1.0));
    assert_eq!(eval("5 | 3"), JsValue::Number(7.0));
    assert_eq!(eval("5 ^ 3"), JsValue::Number(6.0));
    assert_eq!(eval("~5"), JsValue::Number(-6.0));
    assert_eq!(eval("1 << 4"), JsValue::Number(16.0));
    assert_eq!(eval("-16 >> 2"), JsValue::Number(-4.0));
    assert_eq!(eval("-1 >>> 28"), JsValue::Number(15.0));
}

#[test]
fn test_unary() {
    assert_eq!(eval("-'3'"), JsValue::Number(-3.0));
    assert_eq!(eval("+'  42  '"), JsValue::Number(42.0));
    assert_eq!(eval("!0"), JsValue::Boolean(true));
    assert_eq!(eval("!!''"), JsValue::Boolean(false));
    assert_eq!(eval("void 1"), JsValue::Undefined);
    assert!(matches!(eval("+'abc'"), JsValue::Number(n) if n.is_nan()));
}

#[test]
fn test_typeof() {
    assert_eq!(eval("typeof 1"), JsValue::from("number"));
    assert_eq!(eval("typeof 'a'"), JsValue::from("string"));
    assert_eq!(eval("typeof true"), JsValue::from("boolean"));
    assert_eq!(eval("typeof undefined"), JsValue::from("undefined"));
    assert_eq!(eval("typeof null"), JsValue::from("object"));
    assert_eq!(eval("typeof {}"), JsValue::from("object"));
    assert_eq!(eval("typeof function() {}"), JsValue::from("function"));
    // Unresolvable names do not throw under typeof
    assert_eq!(eval("typeof notDeclared"), JsValue::from("undefined"));
}

#[test]
fn test_variables() {
    assert_eq!(eval("let x = 5; x"), JsValue::Number(5.0));
    assert_eq!(eval("let x = 5; x = 10; x"), JsValue::Number(10.0));
    assert_eq!(eval("var a = 1, b = a + 1; b"), JsValue::Number(2.0));
    assert_eq!(eval("var v; v"), JsValue::Undefined);
}

#[test]
fn test_var_hoisting() {
    assert_eq!(eval("var before = h; var h = 1; before"), JsValue::Undefined);
    assert_eq!(eval("h = 3; var h; h"), JsValue::Number(3.0));
}

#[test]
fn test_compound_assignment() {
    assert_eq!(eval("var x = 5; x += 3; x"), JsValue::Number(8.0));
    assert_eq!(eval("var x = 5; x -= 3; x"), JsValue::Number(2.0));
    assert_eq!(eval("var x = 5; x *= 3"), JsValue::Number(15.0));
    assert_eq!(eval("var x = 6; x /= 3"), JsValue::Number(2.0));
    assert_eq!(eval("var x = 7; x %= 4"), JsValue::Number(3.0));
    assert_eq!(eval("var x = 1; x <<= 3"), JsValue::Number(8.0));
    assert_eq!(eval("var x = 6; x &= 3"), JsValue::Number(2.0));
    assert_eq!(eval("var s = 'a'; s += 'b'; s"), JsValue::from("ab"));
    assert_eq!(eval("var o = { n: 1 }; o.n += 41; o.n"), JsValue::Number(42.0));
}

#[test]
fn test_update_expressions() {
    assert_eq!(eval("var i = 1; i++"), JsValue::Number(1.0));
    assert_eq!(eval("var i = 1; ++i"), JsValue::Number(2.0));
    assert_eq!(eval("var i = 1; i--; i"), JsValue::Number(0.0));
    assert_eq!(eval("var o = { n: '5' }; o.n++; o.n"), JsValue::Number(6.0));
}

#[test]
fn test_conditional() {
    assert_eq!(eval("true ? 1 : 2"), JsValue::Number(1.0));
    assert_eq!(eval("false ? 1 : 2"), JsValue::Number(2.0));
    assert_eq!(eval("0 ? 'a' : '' ? 'b' : 'c'"), JsValue::from("c"));
}

#[test]
fn test_logical_operators() {
    assert_eq!(eval("0 || 'fallback'"), JsValue::from("fallback"));
    assert_eq!(eval("'first' || 'second'"), JsValue::from("first"));
    assert_eq!(eval("1 && 2"), JsValue::Number(2.0));
    assert_eq!(eval("null && 2"), JsValue::Null);
    // The right operand is not evaluated when the left decides
    assert_eq!(eval("var hit = false; true || (hit = true); hit"), JsValue::Boolean(false));
}

#[test]
fn test_comma_sequence() {
    assert_eq!(eval("1, 2, 3"), JsValue::Number(3.0));
    assert_eq!(eval("var a = (1, 2); a"), JsValue::Number(2.0));
}

#[test]
fn test_block_scoping() {
    assert_eq!(eval("let x = 1; { let x = 2; } x"), JsValue::Number(1.0));
    assert_eq!(
        eval("let x = 1; { let x = 2; { let x = 3; x; } }"),
        JsValue::Number(3.0)
    );
    assert_eq!(eval("var x = 1; { var x = 2; } x"), JsValue::Number(2.0));
}

#[test]
fn test_const_assignment_throws() {
    assert_eq!(
        eval_throws("const c = 1; c = 2;"),
        "TypeError: Assignment to constant variable."
    );
}

#[test]
fn test_in_and_instanceof() {
    assert_eq!(eval("'a' in { a: 1 }"), JsValue::Boolean(true));
    assert_eq!(eval("'toString' in {}"), JsValue::Boolean(true));
    assert_eq!(eval("0 in [5]"), JsValue::Boolean(true));
    assert_eq!(eval("[] instanceof Array"), JsValue::Boolean(true));
    assert_eq!(eval("[] instanceof Object"), JsValue::Boolean(true));
    assert_eq!(eval("({}) instanceof Array"), JsValue::Boolean(false));
}

#[test]
fn test_primitive_wrappers() {
    assert_eq!(eval("'abc'.length"), JsValue::Number(3.0));
    assert_eq!(eval("'abc'[1]"), JsValue::from("b"));
    assert_eq!(eval("(5).toString()"), JsValue::from("5"));
    assert_eq!(eval("true.toString()"), JsValue::from("true"));
    assert_eq!(eval("typeof new Number(1)"), JsValue::from("object"));
    assert_eq!(eval("new Number(1) + 1"), JsValue::Number(2.0));
    assert_eq!(eval("String(12) + Number('3')"), JsValue::from("123"));
    assert_eq!(eval("Boolean('')"), JsValue::Boolean(false));
}

#[test]
fn test_global_values() {
    assert!(matches!(eval("NaN"), JsValue::Number(n) if n.is_nan()));
    assert_eq!(eval("Infinity > 1e308"), JsValue::Boolean(true));
    assert_eq!(eval("globalThis.Infinity === Infinity"), JsValue::Boolean(true));
    assert_eq!(eval("undefined = 1; undefined"), JsValue::Undefined);
    assert_eq!(eval("var g = 1; globalThis.g"), JsValue::Number(1.0));
}

#[test]
fn test_regexp_literal() {
    assert_eq!(eval("typeof /ab+c/g"), JsValue::from("object"));
    assert_eq!(eval("/ab+c/gi.source"), JsValue::from("ab+c"));
    assert_eq!(eval("/x/g.global"), JsValue::Boolean(true));
}

#[test]
fn test_indirect_eval() {
    assert_eq!(eval("eval('1 + 1')"), JsValue::Number(2.0));
    assert_eq!(eval("eval('var fromEval = 7'); fromEval"), JsValue::Number(7.0));
    assert_eq!(eval("eval(5)"), JsValue::Number(5.0));
    assert!(eval_throws("eval('var = 1')").starts_with("SyntaxError"));
}
