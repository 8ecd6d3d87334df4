//! Object tests: literals, property access, descriptors, prototypes, Object builtins

use super::{eval, eval_throws};
use stackjs::JsValue;

#[test]
fn test_object_literal() {
    assert_eq!(eval("var o = { a: 1, b: 'two' }; o.a"), JsValue::Number(1.0));
    assert_eq!(eval("var o = { a: 1, b: 'two' }; o['b']"), JsValue::from("two"));
    assert_eq!(eval("var o = { 'quoted key': 3, 42: 'n' }; o['quoted key'] + o[42]"), JsValue::from("3n"));
    assert_eq!(eval("var a = 5; var o = { a }; o.a"), JsValue::Number(5.0));
    assert_eq!(eval("var k = 'dyn'; var o = { [k + 1]: true }; o.dyn1"), JsValue::Boolean(true));
}

#[test]
fn test_property_assignment_and_missing() {
    assert_eq!(eval("var o = {}; o.x = 10; o.x"), JsValue::Number(10.0));
    assert_eq!(eval("var o = {}; o.missing"), JsValue::Undefined);
    assert_eq!(eval("var o = { n: { deep: 'yes' } }; o.n.deep"), JsValue::from("yes"));
}

#[test]
fn test_property_access_on_nullish_throws() {
    assert!(eval_throws("var o = null; o.x").starts_with("TypeError"));
    assert!(eval_throws("var u; u['k']").starts_with("TypeError"));
}

#[test]
fn test_nullish_base_checked_before_key_conversion() {
    assert_eq!(
        eval(
            "var log = '';
             var key = { toString() { log += 'k'; return 'x'; } };
             try { null[key]; } catch (e) { log += e.name; }
             log"
        ),
        JsValue::from("TypeError")
    );
    assert_eq!(
        eval_throws("var n = null; n[1]"),
        "TypeError: Cannot read properties of null (reading '1')"
    );
}

#[test]
fn test_methods_and_accessors() {
    assert_eq!(
        eval("var o = { v: 2, double() { return this.v * 2; } }; o.double()"),
        JsValue::Number(4.0)
    );
    assert_eq!(
        eval(
            "var o = { _v: 1, get v() { return this._v * 10; }, set v(x) { this._v = x; } };
             o.v = 5; o.v"
        ),
        JsValue::Number(50.0)
    );
    // A getter without a setter ignores writes in sloppy code
    assert_eq!(eval("var o = { get g() { return 1; } }; o.g = 2; o.g"), JsValue::Number(1.0));
    // Object literal methods are enumerable
    assert_eq!(eval("Object.keys({ m() {}, get g() { return 1; } }).length"), JsValue::Number(2.0));
}

#[test]
fn test_object_literal_super() {
    // `super` in a literal method looks up the literal's prototype
    assert_eq!(
        eval(
            "var o = { m() { return super.hasOwnProperty === Object.prototype.hasOwnProperty; } };
             o.m()"
        ),
        JsValue::Boolean(true)
    );
    assert_eq!(
        eval("var o = { toString() { return 'own:' + super.toString(); } }; o.toString()"),
        JsValue::from("own:[object Object]")
    );
}

#[test]
fn test_delete() {
    assert_eq!(eval("var o = { a: 1 }; delete o.a; o.a"), JsValue::Undefined);
    assert_eq!(eval("var o = { a: 1 }; delete o.a"), JsValue::Boolean(true));
    assert_eq!(eval("var o = {}; delete o.nothing"), JsValue::Boolean(true));
    assert_eq!(eval("(function() { var v = 1; return delete v; })()"), JsValue::Boolean(false));
    // Script-level vars are configurable unless compiled as scoped
    assert_eq!(eval("var v = 1; delete v"), JsValue::Boolean(true));
    assert_eq!(eval("globalThis.implicit = 1; delete implicit"), JsValue::Boolean(true));
    assert_eq!(
        eval("var o = {}; Object.defineProperty(o, 'fixed', { value: 1 }); delete o.fixed"),
        JsValue::Boolean(false)
    );
    assert!(
        eval_throws("'use strict'; var o = Object.freeze({ a: 1 }); delete o.a;")
            .starts_with("TypeError")
    );
}

#[test]
fn test_prototype_chain() {
    assert_eq!(
        eval("var proto = { inherited: 'yes' }; var o = Object.create(proto); o.inherited"),
        JsValue::from("yes")
    );
    assert_eq!(
        eval("var proto = {}; Object.getPrototypeOf(Object.create(proto)) === proto"),
        JsValue::Boolean(true)
    );
    assert_eq!(eval("Object.getPrototypeOf(Object.create(null))"), JsValue::Null);
    assert_eq!(
        eval("Object.getPrototypeOf({}) === Object.prototype"),
        JsValue::Boolean(true)
    );
    assert_eq!(
        eval("var p = {}; var o = Object.create(p); p.isPrototypeOf(o)"),
        JsValue::Boolean(true)
    );
}

#[test]
fn test_shadowing_read_only_inherited() {
    assert_eq!(
        eval(
            "var proto = {}; Object.defineProperty(proto, 'ro', { value: 1 });
             var o = Object.create(proto); o.ro = 2; o.ro"
        ),
        JsValue::Number(1.0)
    );
    assert!(
        eval_throws(
            "'use strict'; var proto = {}; Object.defineProperty(proto, 'ro', { value: 1 });
             var o = Object.create(proto); o.ro = 2;"
        )
        .starts_with("TypeError")
    );
}

#[test]
fn test_inherited_setter_is_called() {
    assert_eq!(
        eval(
            "var log = [];
             var proto = { set v(x) { log.push(x); } };
             var o = Object.create(proto); o.v = 3;
             log.length + ':' + o.hasOwnProperty('v')"
        ),
        JsValue::from("1:false")
    );
}

#[test]
fn test_define_property_defaults() {
    assert_eq!(
        eval(
            "var o = {}; Object.defineProperty(o, 'x', { value: 1 });
             var d = Object.getOwnPropertyDescriptor(o, 'x');
             '' + d.value + d.writable + d.enumerable + d.configurable"
        ),
        JsValue::from("1falsefalsefalse")
    );
    assert_eq!(
        eval(
            "var o = { x: 1 };
             var d = Object.getOwnPropertyDescriptor(o, 'x');
             d.writable && d.enumerable && d.configurable"
        ),
        JsValue::Boolean(true)
    );
    assert_eq!(
        eval("Object.getOwnPropertyDescriptor({}, 'none')"),
        JsValue::Undefined
    );
}

#[test]
fn test_define_property_is_idempotent() {
    assert_eq!(
        eval(
            "var o = {};
             var desc = { value: 1, writable: false, enumerable: true, configurable: false };
             Object.defineProperty(o, 'x', desc);
             Object.defineProperty(o, 'x', desc);
             o.x"
        ),
        JsValue::Number(1.0)
    );
}

#[test]
fn test_redefine_non_configurable_rejected() {
    assert_eq!(
        eval_throws(
            "var o = {}; Object.defineProperty(o, 'x', { value: 1 });
             Object.defineProperty(o, 'x', { value: 2 });"
        ),
        "TypeError: Cannot redefine property: x"
    );
    assert!(
        eval_throws(
            "var o = {}; Object.defineProperty(o, 'x', { value: 1 });
             Object.defineProperty(o, 'x', { enumerable: true });"
        )
        .starts_with("TypeError")
    );
    assert!(
        eval_throws(
            "var o = {}; Object.defineProperty(o, 'x', { value: 1 });
             Object.defineProperty(o, 'x', { get: function() {} });"
        )
        .starts_with("TypeError")
    );
}

#[test]
fn test_accessor_descriptors() {
    assert_eq!(
        eval(
            "var o = {}; var store = 0;
             Object.defineProperty(o, 'v', {
                 get: function() { return store; },
                 set: function(x) { store = x * 2; },
                 enumerable: true, configurable: true
             });
             o.v = 4; o.v"
        ),
        JsValue::Number(8.0)
    );
    assert!(
        eval_throws("Object.defineProperty({}, 'v', { get: function() {}, value: 1 });")
            .starts_with("TypeError")
    );
    assert!(eval_throws("Object.defineProperty({}, 'v', { get: 1 });").starts_with("TypeError"));
}

#[test]
fn test_non_writable_assignment() {
    assert_eq!(
        eval("var o = {}; Object.defineProperty(o, 'x', { value: 1 }); o.x = 2; o.x"),
        JsValue::Number(1.0)
    );
    assert!(
        eval_throws(
            "'use strict'; var o = {}; Object.defineProperty(o, 'x', { value: 1 }); o.x = 2;"
        )
        .starts_with("TypeError")
    );
}

#[test]
fn test_object_keys_order() {
    assert_eq!(
        eval("var k = Object.keys({ b: 1, a: 2, 2: 0, 1: 0 }); k[0] + k[1] + k[2] + k[3]"),
        JsValue::from("12ba")
    );
}

#[test]
fn test_prevent_extensions_and_freeze() {
    assert_eq!(
        eval("var o = {}; Object.preventExtensions(o); o.x = 1; o.x"),
        JsValue::Undefined
    );
    assert_eq!(
        eval("var o = {}; Object.preventExtensions(o); Object.isExtensible(o)"),
        JsValue::Boolean(false)
    );
    assert_eq!(eval("Object.isExtensible({})"), JsValue::Boolean(true));
    assert_eq!(
        eval("var o = Object.freeze({ a: 1 }); o.a = 2; o.a"),
        JsValue::Number(1.0)
    );
    assert!(eval_throws("'use strict'; var o = Object.freeze({}); o.b = 1;").starts_with("TypeError"));
}

#[test]
fn test_object_create_with_properties() {
    assert_eq!(
        eval(
            "var o = Object.create(Object.prototype, { a: { value: 1, enumerable: true }, b: { value: 2 } });
             Object.keys(o).length + ':' + o.b"
        ),
        JsValue::from("1:2")
    );
    assert!(eval_throws("Object.create(1)").starts_with("TypeError"));
}

#[test]
fn test_object_prototype_methods() {
    assert_eq!(eval("({}).toString()"), JsValue::from("[object Object]"));
    assert_eq!(eval("Object.prototype.toString.call([])"), JsValue::from("[object Array]"));
    assert_eq!(eval("Object.prototype.toString.call(null)"), JsValue::from("[object Null]"));
    assert_eq!(eval("Object.prototype.toString.call(undefined)"), JsValue::from("[object Undefined]"));
    assert_eq!(eval("Object.prototype.toString.call(1)"), JsValue::from("[object Number]"));
    assert_eq!(eval("({ a: 1 }).hasOwnProperty('a')"), JsValue::Boolean(true));
    assert_eq!(eval("({ a: 1 }).hasOwnProperty('toString')"), JsValue::Boolean(false));
    assert_eq!(eval("({ a: 1 }).propertyIsEnumerable('a')"), JsValue::Boolean(true));
    assert_eq!(eval("[].propertyIsEnumerable('length')"), JsValue::Boolean(false));
    assert_eq!(eval("var o = {}; o.valueOf() === o"), JsValue::Boolean(true));
}

#[test]
fn test_object_constructor() {
    assert_eq!(eval("typeof Object(1)"), JsValue::from("object"));
    assert_eq!(eval("var o = {}; Object(o) === o"), JsValue::Boolean(true));
    assert_eq!(eval("typeof new Object()"), JsValue::from("object"));
    assert_eq!(eval("Object(null) instanceof Object"), JsValue::Boolean(true));
}

#[test]
fn test_to_primitive_uses_value_of_and_to_string() {
    assert_eq!(
        eval("var o = { valueOf: function() { return 41; } }; o + 1"),
        JsValue::Number(42.0)
    );
    assert_eq!(
        eval("var o = { toString: function() { return 'str'; } }; 'x' + o"),
        JsValue::from("xstr")
    );
    assert_eq!(
        eval("var o = { toString: function() { return 'k'; } }; var t = {}; t[o] = 1; t.k"),
        JsValue::Number(1.0)
    );
    assert!(
        eval_throws("var o = { valueOf: null, toString: null }; o + 1").starts_with("TypeError")
    );
}

#[test]
fn test_string_wrapper_properties() {
    assert_eq!(eval("var s = new String('ab'); s.length"), JsValue::Number(2.0));
    assert_eq!(eval("var s = new String('ab'); s[0] + s[1]"), JsValue::from("ab"));
    assert_eq!(eval("var s = new String('ab'); s[0] = 'z'; s[0]"), JsValue::from("a"));
    assert_eq!(eval("Object.keys(new String('ab')).length"), JsValue::Number(2.0));
}
