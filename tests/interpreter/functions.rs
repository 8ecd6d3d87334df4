//! Function tests: declarations, closures, parameters, arguments, this binding, calls

use super::{eval, eval_throws, shallow_realm};
use stackjs::{CompletionType, JsValue};

#[test]
fn test_function_declaration() {
    assert_eq!(eval("function add(a, b) { return a + b; } add(2, 3)"), JsValue::Number(5.0));
    // Declarations are usable before they appear
    assert_eq!(eval("var r = sq(4); function sq(x) { return x * x; } r"), JsValue::Number(16.0));
}

#[test]
fn test_function_expression() {
    assert_eq!(eval("var f = function(x) { return x + 1; }; f(1)"), JsValue::Number(2.0));
    assert_eq!(eval("(function() { return 'iife'; })()"), JsValue::from("iife"));
}

#[test]
fn test_missing_return_is_undefined() {
    assert_eq!(eval("function f() {} f()"), JsValue::Undefined);
    assert_eq!(eval("function f() { return; } f()"), JsValue::Undefined);
}

#[test]
fn test_named_function_expression_binding() {
    assert_eq!(
        eval("var fact = function f(n) { return n <= 1 ? 1 : n * f(n - 1); }; fact(5)"),
        JsValue::Number(120.0)
    );
    // The self binding is not visible outside
    assert_eq!(eval("var g = function inner() {}; typeof inner"), JsValue::from("undefined"));
    // and cannot be reassigned from inside
    assert_eq!(
        eval("var g = function inner() { inner = 1; return typeof inner; }; g()"),
        JsValue::from("function")
    );
}

#[test]
fn test_closures() {
    assert_eq!(
        eval(
            "function counter() { var n = 0; return function() { n++; return n; }; }
             var c = counter(); c(); c(); c()"
        ),
        JsValue::Number(3.0)
    );
    assert_eq!(
        eval(
            "function make(x) { return function(y) { return x + y; }; }
             var add5 = make(5), add10 = make(10);
             add5(1) + add10(1)"
        ),
        JsValue::Number(17.0)
    );
}

#[test]
fn test_recursion() {
    assert_eq!(
        eval("function fib(n) { return n < 2 ? n : fib(n - 1) + fib(n - 2); } fib(15)"),
        JsValue::Number(610.0)
    );
}

#[test]
fn test_runaway_recursion_throws_range_error() {
    let realm = shallow_realm();
    let completion = realm.eval("function f() { return f(); } f()");
    assert!(completion.is_ok_and(|c| c.kind == CompletionType::Throw));
}

#[test]
fn test_missing_and_extra_arguments() {
    assert_eq!(eval("function f(a, b) { return b; } f(1)"), JsValue::Undefined);
    assert_eq!(
        eval("function f(a) { return arguments.length; } f(1, 2, 3)"),
        JsValue::Number(3.0)
    );
}

#[test]
fn test_default_parameters() {
    assert_eq!(eval("function f(a, b = 10) { return a + b; } f(1)"), JsValue::Number(11.0));
    assert_eq!(eval("function f(a, b = a * 2) { return b; } f(4)"), JsValue::Number(8.0));
    assert_eq!(
        eval("function f(a = 1) { return a; } f(undefined)"),
        JsValue::Number(1.0)
    );
    assert_eq!(eval("function f(a = 1) { return a; } f(null)"), JsValue::Null);
}

#[test]
fn test_rest_parameters() {
    assert_eq!(
        eval("function f(first, ...rest) { return rest.length + ':' + rest[1]; } f(1, 2, 3)"),
        JsValue::from("2:3")
    );
    assert_eq!(
        eval("function f(...all) { return all.length; } f()"),
        JsValue::Number(0.0)
    );
}

#[test]
fn test_destructuring_parameters() {
    assert_eq!(
        eval("function f({ x, y: [first] }) { return x + first; } f({ x: 1, y: [2] })"),
        JsValue::Number(3.0)
    );
    assert_eq!(
        eval("function f([a, , b = 5]) { return a + b; } f([1, 2])"),
        JsValue::Number(6.0)
    );
    assert!(eval_throws("function f({ x }) {} f()").starts_with("TypeError"));
}

#[test]
fn test_function_length_and_name() {
    assert_eq!(eval("function f(a, b, c) {} f.length"), JsValue::Number(3.0));
    assert_eq!(eval("function f(a, b = 1, c) {} f.length"), JsValue::Number(1.0));
    assert_eq!(eval("function named() {} named.name"), JsValue::from("named"));
    assert_eq!(eval("var anon = function() {}; anon.name"), JsValue::from("anon"));
    assert_eq!(eval("var arrow = () => 1; arrow.name"), JsValue::from("arrow"));
}

#[test]
fn test_mapped_arguments_object() {
    assert_eq!(
        eval("function f(a) { a = 2; return arguments[0]; } f(1)"),
        JsValue::Number(2.0)
    );
    assert_eq!(
        eval("function f(a) { arguments[0] = 3; return a; } f(1)"),
        JsValue::Number(3.0)
    );
    // Arguments beyond the passed ones are not mapped
    assert_eq!(
        eval("function f(a, b) { b = 2; return arguments[1]; } f(1)"),
        JsValue::Undefined
    );
    assert_eq!(
        eval("function f(a) { delete arguments[0]; arguments[0] = 9; return a; } f(1)"),
        JsValue::Number(1.0)
    );
}

#[test]
fn test_strict_arguments_are_unmapped() {
    assert_eq!(
        eval("function f(a) { 'use strict'; a = 2; return arguments[0]; } f(1)"),
        JsValue::Number(1.0)
    );
    assert!(
        eval_throws("function f() { 'use strict'; return arguments.callee; } f()")
            .starts_with("TypeError")
    );
}

#[test]
fn test_arguments_callee() {
    assert_eq!(
        eval("function f() { return arguments.callee === f; } f()"),
        JsValue::Boolean(true)
    );
}

#[test]
fn test_this_binding() {
    // Sloppy functions see the global object for an undefined receiver
    assert_eq!(eval("function f() { return this; } f() === globalThis"), JsValue::Boolean(true));
    assert_eq!(
        eval("function f() { 'use strict'; return this; } f()"),
        JsValue::Undefined
    );
    assert_eq!(
        eval("var o = { v: 7, get: function() { return this.v; } }; o.get()"),
        JsValue::Number(7.0)
    );
    // Primitive receivers are boxed in sloppy code only
    assert_eq!(
        eval("function f() { return typeof this; } f.call(1)"),
        JsValue::from("object")
    );
    assert_eq!(
        eval("function f() { 'use strict'; return typeof this; } f.call(1)"),
        JsValue::from("number")
    );
}

#[test]
fn test_arrow_functions() {
    assert_eq!(eval("var sq = x => x * x; sq(6)"), JsValue::Number(36.0));
    assert_eq!(eval("var add = (a, b) => { return a + b; }; add(1, 2)"), JsValue::Number(3.0));
    assert_eq!(eval("(() => 'expr')()"), JsValue::from("expr"));
    // Arrows take `this` from the enclosing function
    assert_eq!(
        eval(
            "var o = { v: 'outer', m: function() { var inner = () => this.v; return inner(); } };
             o.m()"
        ),
        JsValue::from("outer")
    );
    assert!(eval_throws("var a = () => {}; new a()").starts_with("TypeError"));
}

#[test]
fn test_call_and_apply() {
    assert_eq!(
        eval("function f(a, b) { return this.base + a + b; } f.call({ base: 1 }, 2, 3)"),
        JsValue::Number(6.0)
    );
    assert_eq!(
        eval("function f(a, b) { return this.base + a + b; } f.apply({ base: 1 }, [2, 3])"),
        JsValue::Number(6.0)
    );
    assert_eq!(
        eval("function f() { return arguments.length; } f.apply(null)"),
        JsValue::Number(0.0)
    );
}

#[test]
fn test_function_constructor() {
    assert_eq!(eval("var add = Function('a', 'b', 'return a + b'); add(2, 3)"), JsValue::Number(5.0));
    assert_eq!(eval("new Function('return 7')()"), JsValue::Number(7.0));
    assert_eq!(eval("Function('a,b', 'return b')(1, 2)"), JsValue::Number(2.0));
    assert!(eval_throws("Function('return +')").starts_with("SyntaxError"));
}

#[test]
fn test_function_constructor_uses_global_scope() {
    assert_eq!(
        eval(
            "var which = 'global';
             function f() { var which = 'local'; return Function('return which')(); }
             f()"
        ),
        JsValue::from("global")
    );
}

#[test]
fn test_constructor_functions() {
    assert_eq!(
        eval(
            "function Point(x, y) { this.x = x; this.y = y; }
             Point.prototype.sum = function() { return this.x + this.y; };
             var p = new Point(2, 3);
             p.sum()"
        ),
        JsValue::Number(5.0)
    );
    assert_eq!(
        eval("function P() {} var p = new P; p instanceof P"),
        JsValue::Boolean(true)
    );
    // An object returned from a constructor replaces `this`
    assert_eq!(
        eval("function F() { this.a = 1; return { b: 2 }; } var o = new F(); o.a === undefined && o.b"),
        JsValue::Number(2.0)
    );
    assert_eq!(
        eval("function F() {} F.prototype.constructor === F"),
        JsValue::Boolean(true)
    );
}

#[test]
fn test_calling_non_functions() {
    assert!(eval_throws("var x = 1; x()").starts_with("TypeError"));
    assert!(eval_throws("var o = {}; o.missing()").starts_with("TypeError"));
    assert!(eval_throws("new 5").starts_with("TypeError"));
    assert!(eval_throws("var o = {}; new o.m()").starts_with("TypeError"));
}

#[test]
fn test_callee_is_fetched_before_arguments() {
    assert_eq!(
        eval("var f = function() { return 1; }; f(f = function() { return 2; })"),
        JsValue::Number(1.0)
    );
    assert_eq!(
        eval("var log = ''; try { nope((log += 'arg', 1)); } catch (e) {} log"),
        JsValue::from("")
    );
    assert_eq!(
        eval(
            "var log = '';
             var o = { get m() { log += 'get'; return function() {}; } };
             o.m((log += 'arg', 1));
             log"
        ),
        JsValue::from("getarg")
    );
    // The callability check still comes after the arguments
    assert_eq!(
        eval("var log = ''; var o = {}; try { o.m((log += 'arg', 1)); } catch (e) { log += ':' + e.name; } log"),
        JsValue::from("arg:TypeError")
    );
    assert_eq!(
        eval("var o = { v: 'me', m() { return this.v; } }; o.m(o.m = null)"),
        JsValue::from("me")
    );
}

#[test]
fn test_strict_function_poison_pills() {
    assert!(eval_throws("function f() { 'use strict'; } f.caller").starts_with("TypeError"));
    assert_eq!(
        eval("function f() {} typeof f.caller"),
        JsValue::from("undefined")
    );
}

#[test]
fn test_block_level_functions() {
    assert_eq!(
        eval("var r; { function inner() { return 'block'; } r = inner(); } r"),
        JsValue::from("block")
    );
}

#[test]
fn test_lexical_declarations_in_functions() {
    assert_eq!(
        eval("function f() { let a = 1; const b = 2; { let a = 10; } return a + b; } f()"),
        JsValue::Number(3.0)
    );
}
