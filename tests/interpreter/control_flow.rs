//! Control flow tests: loops, labels, switch, try/catch/finally, with

use super::{eval, eval_throws};
use stackjs::JsValue;

#[test]
fn test_if_else() {
    assert_eq!(eval("var r; if (1 < 2) r = 'yes'; else r = 'no'; r"), JsValue::from("yes"));
    assert_eq!(eval("var r = 0; if (0) { r = 1; } r"), JsValue::Number(0.0));
    assert_eq!(
        eval("var r; if (false) r = 1; else if (true) r = 2; else r = 3; r"),
        JsValue::Number(2.0)
    );
}

#[test]
fn test_while_loop() {
    assert_eq!(
        eval("var i = 0, sum = 0; while (i < 5) { sum += i; i++; } sum"),
        JsValue::Number(10.0)
    );
}

#[test]
fn test_do_while_runs_once() {
    assert_eq!(eval("var n = 0; do { n++; } while (false); n"), JsValue::Number(1.0));
    assert_eq!(
        eval("var n = 0; do { n += 2; } while (n < 7); n"),
        JsValue::Number(8.0)
    );
}

#[test]
fn test_for_loop() {
    assert_eq!(
        eval("var sum = 0; for (var i = 1; i <= 4; i++) { sum += i; } sum"),
        JsValue::Number(10.0)
    );
    assert_eq!(
        eval("var sum = 0; for (let i = 0; i < 3; i++) sum += i; sum"),
        JsValue::Number(3.0)
    );
    // `let` in the head is not visible after the loop
    assert_eq!(
        eval("for (let i = 0; i < 1; i++) {} typeof i"),
        JsValue::from("undefined")
    );
}

#[test]
fn test_for_without_clauses() {
    assert_eq!(
        eval("var n = 0; for (;;) { n++; if (n === 3) break; } n"),
        JsValue::Number(3.0)
    );
}

#[test]
fn test_break_and_continue() {
    assert_eq!(
        eval(
            "var odd = 0;
             for (var i = 0; i < 10; i++) {
                 if (i % 2 === 0) continue;
                 if (i > 7) break;
                 odd += i;
             }
             odd"
        ),
        JsValue::Number(16.0)
    );
}

#[test]
fn test_labeled_break_and_continue() {
    assert_eq!(
        eval(
            "var pairs = 0;
             outer: for (var i = 0; i < 3; i++) {
                 for (var j = 0; j < 3; j++) {
                     if (j === 1) continue outer;
                     if (i === 2) break outer;
                     pairs++;
                 }
             }
             pairs"
        ),
        JsValue::Number(2.0)
    );
    assert_eq!(
        eval("var r = 'start'; block: { r = 'in'; break block; r = 'after'; } r"),
        JsValue::from("in")
    );
}

#[test]
fn test_break_out_of_block_scope() {
    assert_eq!(
        eval(
            "let x = 'outer';
             while (true) { let x = 'inner'; break; }
             x"
        ),
        JsValue::from("outer")
    );
}

#[test]
fn test_switch() {
    let source = "
        function pick(v) {
            var out = '';
            switch (v) {
                case 1: out += 'one';
                case 2: out += 'two'; break;
                case '3': out += 'string three'; break;
                default: out += 'other';
            }
            return out;
        }
        pick(1) + '|' + pick(2) + '|' + pick('3') + '|' + pick(3)";
    assert_eq!(eval(source), JsValue::from("onetwo|two|string three|other"));
}

#[test]
fn test_switch_default_in_middle() {
    assert_eq!(
        eval(
            "var log = '';
             switch (5) { case 1: log += 'a'; default: log += 'd'; case 2: log += 'b'; }
             log"
        ),
        JsValue::from("db")
    );
    assert_eq!(
        eval("var hit = 'none'; switch (9) { case 1: hit = 'one'; } hit"),
        JsValue::from("none")
    );
}

#[test]
fn test_for_in() {
    assert_eq!(
        eval("var keys = ''; for (var k in { a: 1, b: 2, c: 3 }) keys += k; keys"),
        JsValue::from("abc")
    );
    // Inherited enumerable properties are visited too
    assert_eq!(
        eval(
            "var proto = { inherited: 1 };
             var o = Object.create(proto); o.own = 2;
             var keys = []; for (var k in o) keys.push(k);
             keys.length + ':' + keys[0] + ',' + keys[1]"
        ),
        JsValue::from("2:own,inherited")
    );
    // Array indices come first in ascending order
    assert_eq!(
        eval("var s = ''; var a = ['x', 'y']; a.extra = 1; for (var k in a) s += k; s"),
        JsValue::from("01extra")
    );
}

#[test]
fn test_for_in_skips_deleted_keys_and_nullish() {
    assert_eq!(
        eval(
            "var o = { a: 1, b: 2, c: 3 }; var seen = '';
             for (var k in o) { seen += k; delete o.b; }
             seen"
        ),
        JsValue::from("ac")
    );
    assert_eq!(
        eval("var n = 0; for (var k in null) n++; for (var k in undefined) n++; n"),
        JsValue::Number(0.0)
    );
}

#[test]
fn test_for_in_with_break() {
    assert_eq!(
        eval("var first; for (var k in { p: 1, q: 2 }) { first = k; break; } first"),
        JsValue::from("p")
    );
}

#[test]
fn test_try_catch() {
    assert_eq!(
        eval("var r; try { throw 'boom'; } catch (e) { r = e; } r"),
        JsValue::from("boom")
    );
    assert_eq!(
        eval("var r = 'untouched'; try { r = 'ran'; } catch (e) { r = 'caught'; } r"),
        JsValue::from("ran")
    );
}

#[test]
fn test_catch_restores_environment() {
    assert_eq!(
        eval(
            "let v = 'outer';
             try { let v = 'inner'; { let v = 'deeper'; throw 1; } } catch (e) {}
             v"
        ),
        JsValue::from("outer")
    );
    // The catch parameter is scoped to the clause
    assert_eq!(
        eval("var e = 'outer'; try { throw 'x'; } catch (e) { e = 'changed'; } e"),
        JsValue::from("outer")
    );
}

#[test]
fn test_catch_destructuring_parameter() {
    assert_eq!(
        eval("var m; try { throw { message: 'hi' }; } catch ({ message }) { m = message; } m"),
        JsValue::from("hi")
    );
}

#[test]
fn test_finally_runs_on_every_path() {
    assert_eq!(
        eval("var log = ''; try { log += 't'; } finally { log += 'f'; } log"),
        JsValue::from("tf")
    );
    assert_eq!(
        eval(
            "var log = '';
             try { try { throw 1; } finally { log += 'f'; } } catch (e) { log += 'c' + e; }
             log"
        ),
        JsValue::from("fc1")
    );
    assert_eq!(
        eval(
            "var log = '';
             for (var i = 0; i < 3; i++) { try { if (i === 1) break; } finally { log += i; } }
             log"
        ),
        JsValue::from("01")
    );
    assert_eq!(
        eval(
            "var log = '';
             for (var i = 0; i < 2; i++) { try { continue; } finally { log += i; } }
             log"
        ),
        JsValue::from("01")
    );
}

#[test]
fn test_return_through_finally() {
    assert_eq!(
        eval(
            "var log = '';
             function f() { try { return 'value'; } finally { log += 'cleanup'; } }
             f() + ':' + log"
        ),
        JsValue::from("value:cleanup")
    );
    // A return inside finally wins
    assert_eq!(
        eval("function f() { try { return 1; } finally { return 2; } } f()"),
        JsValue::Number(2.0)
    );
    assert_eq!(
        eval("function f() { try { throw 1; } finally { return 'swallowed'; } } f()"),
        JsValue::from("swallowed")
    );
}

#[test]
fn test_nested_finally() {
    assert_eq!(
        eval(
            "var log = '';
             function f() {
                 try {
                     try { return 'r'; } finally { log += 'inner,'; }
                 } finally { log += 'outer'; }
             }
             f() + ':' + log"
        ),
        JsValue::from("r:inner,outer")
    );
}

#[test]
fn test_catch_and_finally() {
    assert_eq!(
        eval(
            "var log = '';
             try { throw 'e'; } catch (x) { log += 'c'; } finally { log += 'f'; }
             log"
        ),
        JsValue::from("cf")
    );
    assert_eq!(
        eval_throws("try { throw 'first'; } catch (x) { throw 'second'; } finally { }"),
        "second"
    );
}

#[test]
fn test_throw_from_nested_call_is_caught() {
    assert_eq!(
        eval(
            "function inner() { throw new Error('deep'); }
             function outer() { return inner(); }
             var msg; try { outer(); } catch (e) { msg = e.message; } msg"
        ),
        JsValue::from("deep")
    );
}

#[test]
fn test_uncaught_throw() {
    assert_eq!(eval_throws("throw 42;"), "42");
    assert_eq!(eval_throws("throw new Error('bad');"), "Error: bad");
}

#[test]
fn test_with_statement() {
    assert_eq!(
        eval("var o = { a: 1 }; var r; with (o) { r = a + 1; a = 5; } r + o.a"),
        JsValue::Number(7.0)
    );
    assert_eq!(
        eval("var o = { }; var b = 2; with (o) { b = 3; } b"),
        JsValue::Number(3.0)
    );
}

#[test]
fn test_debugger_is_a_no_op() {
    assert_eq!(eval("debugger; 1"), JsValue::Number(1.0));
}
