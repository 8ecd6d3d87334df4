//! Error tests: thrown error kinds, messages, Error constructors and prototypes

use super::{eval, eval_throws};
use stackjs::JsValue;

#[test]
fn test_undeclared_name_is_reference_error() {
    assert_eq!(eval_throws("missingName"), "ReferenceError: missingName is not defined");
    assert_eq!(eval_throws("missingFn()"), "ReferenceError: missingFn is not defined");
}

#[test]
fn test_sloppy_assignment_creates_global() {
    assert_eq!(eval("implicitGlobal = 5; globalThis.implicitGlobal"), JsValue::Number(5.0));
}

#[test]
fn test_strict_assignment_to_undeclared() {
    assert_eq!(
        eval_throws("'use strict'; notDeclared = 1;"),
        "ReferenceError: notDeclared is not defined"
    );
    assert!(
        eval_throws("function f() { 'use strict'; leaked = 1; } f();")
            .starts_with("ReferenceError")
    );
}

#[test]
fn test_strict_temporal_dead_zone() {
    assert_eq!(
        eval_throws("function f() { 'use strict'; var r = v; let v = 1; return r; } f()"),
        "ReferenceError: Cannot access 'v' before initialization"
    );
}

#[test]
fn test_property_access_on_null() {
    assert_eq!(
        eval_throws("var n = null; n.prop"),
        "TypeError: Cannot read properties of null (reading 'prop')"
    );
    assert!(eval_throws("var u; u.prop = 1;").starts_with("TypeError"));
}

#[test]
fn test_call_errors_name_the_callee() {
    assert_eq!(eval_throws("var o = {}; o.nope()"), "TypeError: nope is not a function");
    assert_eq!(eval_throws("var v = 3; v()"), "TypeError: v is not a function");
}

#[test]
fn test_error_kinds() {
    for (kind, proto) in [
        ("Error", "Error"),
        ("TypeError", "Error"),
        ("ReferenceError", "Error"),
        ("SyntaxError", "Error"),
        ("RangeError", "Error"),
    ] {
        let source = format!(
            "var e = new {kind}('m'); e.name + ':' + e.message + ':' + (e instanceof {proto})"
        );
        assert_eq!(eval(&source), JsValue::from(format!("{kind}:m:true").as_str()));
    }
}

#[test]
fn test_error_subtype_prototype_chain() {
    assert_eq!(
        eval("Object.getPrototypeOf(TypeError.prototype) === Error.prototype"),
        JsValue::Boolean(true)
    );
    assert_eq!(eval("new TypeError('x') instanceof RangeError"), JsValue::Boolean(false));
    assert_eq!(eval("TypeError.prototype.name"), JsValue::from("TypeError"));
    assert_eq!(eval("Error.prototype.message"), JsValue::from(""));
}

#[test]
fn test_error_called_without_new() {
    assert_eq!(eval("Error('plain').message"), JsValue::from("plain"));
    assert_eq!(eval("RangeError('r') instanceof RangeError"), JsValue::Boolean(true));
}

#[test]
fn test_error_message_is_optional() {
    assert_eq!(eval("new Error().hasOwnProperty('message')"), JsValue::Boolean(false));
    assert_eq!(eval("new Error(undefined).message"), JsValue::from(""));
    assert_eq!(eval("new Error(42).message"), JsValue::from("42"));
}

#[test]
fn test_error_to_string() {
    assert_eq!(eval("new Error('msg').toString()"), JsValue::from("Error: msg"));
    assert_eq!(eval("new TypeError().toString()"), JsValue::from("TypeError"));
    assert_eq!(
        eval("var e = new Error('m'); e.name = ''; e.toString()"),
        JsValue::from("m")
    );
    assert_eq!(eval("String(new RangeError('r'))"), JsValue::from("RangeError: r"));
    assert!(eval_throws("Error.prototype.toString.call(1)").starts_with("TypeError"));
}

#[test]
fn test_runtime_errors_are_catchable_objects() {
    assert_eq!(
        eval(
            "var kind;
             try { null.x; } catch (e) { kind = (e instanceof TypeError) + ':' + e.name; }
             kind"
        ),
        JsValue::from("true:TypeError")
    );
    assert_eq!(
        eval("var k; try { nothing; } catch (e) { k = e.constructor === ReferenceError; } k"),
        JsValue::Boolean(true)
    );
    assert_eq!(
        eval("var k; try { new Array(-1); } catch (e) { k = e.name; } k"),
        JsValue::from("RangeError")
    );
}

#[test]
fn test_eval_syntax_error_is_catchable() {
    assert_eq!(
        eval("var k; try { eval('if ('); } catch (e) { k = e instanceof SyntaxError; } k"),
        JsValue::Boolean(true)
    );
}

#[test]
fn test_throwing_non_error_values() {
    assert_eq!(eval_throws("throw 'text';"), "text");
    assert_eq!(eval_throws("throw null;"), "null");
    assert_eq!(
        eval("var got; try { throw { code: 7 }; } catch (e) { got = e.code; } got"),
        JsValue::Number(7.0)
    );
}
