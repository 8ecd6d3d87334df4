//! Array tests: literals, holes, length semantics, Array constructor, destructuring

use super::{eval, eval_throws};
use stackjs::JsValue;

#[test]
fn test_array_literal() {
    assert_eq!(eval("[1, 2, 3].length"), JsValue::Number(3.0));
    assert_eq!(eval("[1, 2, 3][1]"), JsValue::Number(2.0));
    assert_eq!(eval("[].length"), JsValue::Number(0.0));
    assert_eq!(eval("var a = ['x']; a[5]"), JsValue::Undefined);
}

#[test]
fn test_holes() {
    assert_eq!(eval("[1, , 3].length"), JsValue::Number(3.0));
    assert_eq!(eval("1 in [1, , 3]"), JsValue::Boolean(false));
    assert_eq!(eval("2 in [1, , 3]"), JsValue::Boolean(true));
    assert_eq!(eval("[, ,].length"), JsValue::Number(2.0));
    assert_eq!(eval("Object.keys([1, , 3]).length"), JsValue::Number(2.0));
}

#[test]
fn test_index_assignment_grows_length() {
    assert_eq!(eval("var a = []; a[4] = 'e'; a.length"), JsValue::Number(5.0));
    assert_eq!(eval("var a = [1]; a['2'] = 3; a.length"), JsValue::Number(3.0));
    // Non-index keys leave the length alone
    assert_eq!(eval("var a = [1]; a.name = 'n'; a['-1'] = 0; a.length"), JsValue::Number(1.0));
}

#[test]
fn test_length_truncation() {
    assert_eq!(
        eval("var a = [1, 2, 3, 4]; a.length = 2; a[2] === undefined && a.length"),
        JsValue::Number(2.0)
    );
    assert_eq!(eval("var a = [1, 2]; a.length = 0; 0 in a"), JsValue::Boolean(false));
    assert_eq!(eval("var a = [1]; a.length = 3; a.length + ':' + (1 in a)"), JsValue::from("3:false"));
}

#[test]
fn test_truncation_stops_at_non_configurable_element() {
    assert_eq!(
        eval(
            "var a = [1, 2, 3];
             Object.defineProperty(a, 1, { value: 'fixed', configurable: false });
             a.length = 0;
             a.length"
        ),
        JsValue::Number(2.0)
    );
}

#[test]
fn test_invalid_length() {
    assert_eq!(
        eval_throws("var a = []; a.length = -1;"),
        "RangeError: Invalid array length"
    );
    assert!(eval_throws("var a = []; a.length = 1.5;").starts_with("RangeError"));
    assert_eq!(eval("var a = [1, 2]; a.length = '1'; a.length"), JsValue::Number(1.0));
}

#[test]
fn test_length_is_not_enumerable() {
    assert_eq!(
        eval("var a = [7]; var d = Object.getOwnPropertyDescriptor(a, 'length'); d.enumerable + ',' + d.writable"),
        JsValue::from("false,true")
    );
    assert_eq!(eval("var s = ''; for (var k in [7, 8]) s += k; s"), JsValue::from("01"));
}

#[test]
fn test_read_only_length() {
    assert_eq!(
        eval(
            "var a = [1];
             Object.defineProperty(a, 'length', { writable: false });
             a[3] = 'x';
             a.length + ':' + a[3]"
        ),
        JsValue::from("1:undefined")
    );
}

#[test]
fn test_array_constructor() {
    assert_eq!(eval("Array(3).length"), JsValue::Number(3.0));
    assert_eq!(eval("0 in new Array(3)"), JsValue::Boolean(false));
    assert_eq!(eval("new Array(1, 2).length"), JsValue::Number(2.0));
    assert_eq!(eval("new Array('3').length"), JsValue::Number(1.0));
    assert_eq!(eval("new Array('3')[0]"), JsValue::from("3"));
    assert_eq!(eval("Array().length"), JsValue::Number(0.0));
    assert_eq!(eval_throws("new Array(-1)"), "RangeError: Invalid array length");
    assert!(eval_throws("Array(2.5)").starts_with("RangeError"));
}

#[test]
fn test_is_array() {
    assert_eq!(eval("Array.isArray([])"), JsValue::Boolean(true));
    assert_eq!(eval("Array.isArray(new Array(2))"), JsValue::Boolean(true));
    assert_eq!(eval("Array.isArray({ length: 0 })"), JsValue::Boolean(false));
    assert_eq!(eval("Array.isArray()"), JsValue::Boolean(false));
    assert_eq!(eval("Array.isArray(Object.create(Array.prototype))"), JsValue::Boolean(false));
}

#[test]
fn test_push() {
    assert_eq!(eval("var a = [1]; a.push(2, 3)"), JsValue::Number(3.0));
    assert_eq!(eval("var a = [1]; a.push(2, 3); a[2]"), JsValue::Number(3.0));
    assert_eq!(eval("var a = []; a.push(); a.length"), JsValue::Number(0.0));
    // push works on array-likes too
    assert_eq!(
        eval("var o = { length: 1 }; Array.prototype.push.call(o, 'v'); o.length + o[1]"),
        JsValue::from("2v")
    );
}

#[test]
fn test_array_prototype_chain() {
    assert_eq!(
        eval("Object.getPrototypeOf([]) === Array.prototype"),
        JsValue::Boolean(true)
    );
    assert_eq!(eval("[].constructor === Array"), JsValue::Boolean(true));
    assert_eq!(
        eval("Array.prototype.extra = function() { return 'shared'; }; [].extra()"),
        JsValue::from("shared")
    );
}

#[test]
fn test_array_destructuring() {
    assert_eq!(eval("var [a, b] = [1, 2]; a + b"), JsValue::Number(3.0));
    assert_eq!(eval("var [, second] = [1, 2]; second"), JsValue::Number(2.0));
    assert_eq!(eval("var [x = 10] = []; x"), JsValue::Number(10.0));
    assert_eq!(
        eval("var [head, ...tail] = [1, 2, 3]; head + ':' + tail.length + ':' + tail[0]"),
        JsValue::from("1:2:2")
    );
    assert_eq!(
        eval("let [[inner]] = [['nested']]; inner"),
        JsValue::from("nested")
    );
    assert_eq!(
        eval("var a = 1, b = 2; [a, b] = [b, a]; a + ',' + b"),
        JsValue::from("2,1")
    );
    assert!(eval_throws("var [z] = null;").starts_with("TypeError"));
}

#[test]
fn test_object_destructuring() {
    assert_eq!(eval("var { p, q } = { p: 1, q: 2 }; p + q"), JsValue::Number(3.0));
    assert_eq!(eval("var { p: renamed } = { p: 'r' }; renamed"), JsValue::from("r"));
    assert_eq!(eval("var { missing = 'dflt' } = {}; missing"), JsValue::from("dflt"));
    assert_eq!(
        eval("var { a: { b } } = { a: { b: 'deep' } }; b"),
        JsValue::from("deep")
    );
    assert_eq!(eval("var o = {}; ({ k: o.slot } = { k: 9 }); o.slot"), JsValue::Number(9.0));
    assert!(eval_throws("var { z } = undefined;").starts_with("TypeError"));
}
