//! Class tests: constructors, inheritance, super, static members, accessors

use super::{eval, eval_throws};
use stackjs::JsValue;

#[test]
fn test_basic_class() {
    assert_eq!(
        eval(
            "class Point {
                 constructor(x, y) { this.x = x; this.y = y; }
                 sum() { return this.x + this.y; }
             }
             new Point(3, 4).sum()"
        ),
        JsValue::Number(7.0)
    );
    assert_eq!(eval("class A {} typeof A"), JsValue::from("function"));
}

#[test]
fn test_default_constructor() {
    assert_eq!(
        eval("class Empty {} var e = new Empty(); e instanceof Empty"),
        JsValue::Boolean(true)
    );
    assert_eq!(
        eval("class Empty {} Object.getPrototypeOf(new Empty()) === Empty.prototype"),
        JsValue::Boolean(true)
    );
    assert_eq!(
        eval("class Empty {} Empty.prototype.constructor === Empty"),
        JsValue::Boolean(true)
    );
    assert_eq!(eval("class Named {} Named.name"), JsValue::from("Named"));
}

#[test]
fn test_methods_are_not_enumerable() {
    assert_eq!(
        eval("class A { m() {} n() {} } Object.keys(A.prototype).length"),
        JsValue::Number(0.0)
    );
    assert_eq!(
        eval("class A { m() {} } A.prototype.hasOwnProperty('m')"),
        JsValue::Boolean(true)
    );
    assert_eq!(
        eval("class A { m() {} } var s = ''; for (var k in new A()) s += k; s"),
        JsValue::from("")
    );
}

#[test]
fn test_class_body_is_strict() {
    assert!(
        eval_throws("class A { m() { undeclaredInClass = 1; } } new A().m();")
            .starts_with("ReferenceError")
    );
    assert_eq!(
        eval("class A { m() { return this; } } var m = new A().m; m()"),
        JsValue::Undefined
    );
}

#[test]
fn test_inheritance_and_super_call() {
    assert_eq!(
        eval(
            "class Animal {
                 constructor(name) { this.name = name; }
                 speak() { return this.name + ' makes a sound'; }
             }
             class Dog extends Animal {
                 constructor(name) { super(name); this.kind = 'dog'; }
                 speak() { return super.speak() + ' (woof)'; }
             }
             var d = new Dog('Rex');
             d.speak() + '|' + d.kind"
        ),
        JsValue::from("Rex makes a sound (woof)|dog")
    );
    assert_eq!(
        eval(
            "class A {} class B extends A {}
             var b = new B();
             (b instanceof B) + ',' + (b instanceof A)"
        ),
        JsValue::from("true,true")
    );
}

#[test]
fn test_derived_default_constructor_forwards_arguments() {
    assert_eq!(
        eval(
            "class Base { constructor(a, b) { this.total = a + b; } }
             class Derived extends Base {}
             new Derived(2, 5).total"
        ),
        JsValue::Number(7.0)
    );
}

#[test]
fn test_prototype_chain_of_derived_class() {
    assert_eq!(
        eval(
            "class A {} class B extends A {}
             Object.getPrototypeOf(B.prototype) === A.prototype"
        ),
        JsValue::Boolean(true)
    );
    // The constructor itself inherits from the parent constructor
    assert_eq!(
        eval("class A {} class B extends A {} Object.getPrototypeOf(B) === A"),
        JsValue::Boolean(true)
    );
}

#[test]
fn test_static_methods() {
    assert_eq!(
        eval(
            "class Counter {
                 static create() { return new Counter(); }
                 static label() { return 'counter'; }
             }
             (Counter.create() instanceof Counter) + ':' + Counter.label()"
        ),
        JsValue::from("true:counter")
    );
    // Static methods are inherited and can use super
    assert_eq!(
        eval(
            "class A { static who() { return 'A'; } }
             class B extends A { static who() { return 'B<' + super.who(); } }
             B.who()"
        ),
        JsValue::from("B<A")
    );
    assert_eq!(
        eval("class A { static s() {} } typeof new A().s"),
        JsValue::from("undefined")
    );
}

#[test]
fn test_accessors() {
    assert_eq!(
        eval(
            "class Temp {
                 constructor() { this._c = 0; }
                 get fahrenheit() { return this._c * 9 / 5 + 32; }
                 set fahrenheit(f) { this._c = (f - 32) * 5 / 9; }
             }
             var t = new Temp(); t.fahrenheit = 212; t._c"
        ),
        JsValue::Number(100.0)
    );
    assert_eq!(
        eval(
            "class A { get v() { return 1; } }
             var d = Object.getOwnPropertyDescriptor(A.prototype, 'v');
             typeof d.get + ',' + typeof d.set + ',' + d.enumerable"
        ),
        JsValue::from("function,undefined,false")
    );
}

#[test]
fn test_computed_method_names() {
    assert_eq!(
        eval(
            "var name = 'dyn';
             class A { [name + 'amic']() { return 'computed'; } }
             new A().dynamic()"
        ),
        JsValue::from("computed")
    );
}

#[test]
fn test_class_name_binding() {
    // The inner binding survives reassignment of the outer one
    assert_eq!(
        eval(
            "class A { static self() { return A; } }
             var original = A;
             A = null;
             original.self() === original"
        ),
        JsValue::Boolean(true)
    );
    assert!(
        eval_throws("class A { static f() { A = 1; } } A.f();").starts_with("TypeError")
    );
    assert_eq!(
        eval("var C = class Inner { who() { return Inner.name; } }; new C().who()"),
        JsValue::from("Inner")
    );
    assert_eq!(eval("var C = class {}; C.name"), JsValue::from("C"));
}

#[test]
fn test_class_declarations_are_block_scoped() {
    assert_eq!(eval("{ class Hidden {} } typeof Hidden"), JsValue::from("undefined"));
}

#[test]
fn test_extends_null() {
    assert_eq!(
        eval("class N extends null {} Object.getPrototypeOf(N.prototype)"),
        JsValue::Null
    );
    assert!(eval_throws("class N extends null {} new N()").starts_with("TypeError"));
}

#[test]
fn test_extends_invalid_values() {
    assert!(eval_throws("class A extends 5 {}").starts_with("TypeError"));
    assert!(eval_throws("var undef; class A extends undef {}").starts_with("TypeError"));
    assert!(
        eval_throws("function F() {} F.prototype = 3; class A extends F {}")
            .starts_with("TypeError")
    );
}

#[test]
fn test_extends_constructor_function() {
    assert_eq!(
        eval(
            "function Legacy(v) { this.v = v; }
             Legacy.prototype.get = function() { return this.v; };
             class Modern extends Legacy { constructor() { super('old'); } }
             new Modern().get()"
        ),
        JsValue::from("old")
    );
}

#[test]
fn test_extending_error() {
    assert_eq!(
        eval(
            "class ValidationError extends Error {
                 constructor(message) { super(message); this.name = 'ValidationError'; }
             }
             var e = new ValidationError('bad input');
             (e instanceof ValidationError) + ',' + (e instanceof Error) + ',' + e.message"
        ),
        JsValue::from("true,true,bad input")
    );
    assert_eq!(
        eval_throws(
            "class ValidationError extends Error {
                 constructor(message) { super(message); this.name = 'ValidationError'; }
             }
             throw new ValidationError('nope');"
        ),
        "ValidationError: nope"
    );
    assert_eq!(
        eval("class Custom extends TypeError {} new Custom('t') instanceof TypeError"),
        JsValue::Boolean(true)
    );
}

#[test]
fn test_super_property_outside_method_is_rejected() {
    assert!(eval_throws("function f() { return super.x; }").starts_with("SyntaxError"));
}
