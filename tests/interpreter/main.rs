//! Integration tests for the interpreter, organized by feature
//!
//! These tests exercise the compiler and the VM through the public API:
//! source goes through `Realm::eval` and the completion is inspected.

mod arrays;
mod basics;
mod classes;
mod control_flow;
mod errors;
mod functions;
mod objects;

use stackjs::interpreter::abstract_ops::to_string;
use stackjs::{Completion, CompletionType, JsValue, Realm, RealmConfig};

/// Run source in a fresh realm and return the completion
#[allow(clippy::expect_used)]
pub fn run(source: &str) -> Completion {
    Realm::new().eval(source).expect("fatal error")
}

/// Evaluate source and return the completion value; a throw fails the test
#[allow(clippy::panic)]
pub fn eval(source: &str) -> JsValue {
    let realm = Realm::new();
    match realm.eval(source) {
        Ok(completion) if completion.kind == CompletionType::Normal => completion.value(),
        Ok(completion) => panic!(
            "{:?} completion for {:?}: {}",
            completion.kind,
            source,
            describe(&realm, &completion.value())
        ),
        Err(fatal) => panic!("fatal error for {:?}: {}", source, fatal),
    }
}

/// Evaluate source that must throw; returns the thrown value as a string
/// (`"TypeError: message"` for error objects)
#[allow(clippy::panic)]
pub fn eval_throws(source: &str) -> String {
    let realm = Realm::new();
    match realm.eval(source) {
        Ok(completion) if completion.kind == CompletionType::Throw => {
            describe(&realm, &completion.value())
        }
        Ok(completion) => panic!("expected a throw from {:?}, got {:?}", source, completion),
        Err(fatal) => panic!("fatal error for {:?}: {}", source, fatal),
    }
}

/// Realm with a small call depth so recursion tests stay cheap
pub fn shallow_realm() -> Realm {
    Realm::with_config(RealmConfig {
        max_call_depth: 50,
        ..RealmConfig::default()
    })
}

fn describe(realm: &Realm, value: &JsValue) -> String {
    to_string(realm, value)
        .map(|s| s.to_string())
        .unwrap_or_else(|_| format!("{:?}", value))
}

#[test]
fn test_global_binding_after_run() {
    let realm = Realm::new();
    let completion = realm.eval("var x = 1; x = x + 1;");
    assert!(completion.is_ok_and(|c| c.kind == CompletionType::Normal));
    assert_eq!(realm.global_binding("x"), Some(JsValue::Number(2.0)));
    assert_eq!(realm.global_binding("missing"), None);
}

#[test]
fn test_compile_error_is_thrown_syntax_error() {
    let completion = run("var = ;");
    assert_eq!(completion.kind, CompletionType::Throw);
    assert!(eval_throws("var = ;").starts_with("SyntaxError"));
}

#[test]
fn test_invoke_returns_return_completion() {
    let realm = Realm::new();
    let completion = realm.eval("function f(a) { return a + 1; }");
    assert!(completion.is_ok());
    let f = realm.global_binding("f").unwrap_or_default();
    let result = realm.invoke(&f, &JsValue::Undefined, &[JsValue::Number(41.0)]);
    assert_eq!(
        result.ok(),
        Some(Completion::returned(JsValue::Number(42.0)))
    );
}

#[test]
fn test_define_native() {
    let realm = Realm::new();
    realm.define_native("double", 1, |_realm, _this, args| {
        let n = match args.first() {
            Some(JsValue::Number(n)) => *n,
            _ => 0.0,
        };
        Ok(JsValue::Number(n * 2.0))
    });
    let completion = realm.eval("double(21)");
    assert_eq!(completion.ok().map(|c| c.value()), Some(JsValue::Number(42.0)));
}

#[test]
fn test_scripts_share_the_global_environment() {
    let realm = Realm::new();
    assert!(realm.eval("let counter = 1; var total = 10;").is_ok());
    let completion = realm.eval("counter + total");
    assert_eq!(completion.ok().map(|c| c.value()), Some(JsValue::Number(11.0)));

    // Redeclaring a global lexical binding in a later script throws
    let completion = realm.eval("let counter = 2;");
    assert!(completion.is_ok_and(|c| c.kind == CompletionType::Throw));
}

#[test]
fn test_call_depth_limit() {
    let realm = shallow_realm();
    let completion = realm.eval(
        "function down(n) { return down(n + 1); }
         var caught;
         try { down(0); } catch (e) { caught = e instanceof RangeError; }
         caught",
    );
    assert_eq!(completion.ok().map(|c| c.value()), Some(JsValue::Boolean(true)));
}

#[test]
fn test_default_realm_survives_deep_recursion() {
    let realm = Realm::new();
    let completion = realm.eval(
        "function down(n) { return n ? down(n - 1) : 0; }
         var caught;
         try { down(100000); } catch (e) { caught = e instanceof RangeError; }
         caught",
    );
    assert_eq!(completion.ok().map(|c| c.value()), Some(JsValue::Boolean(true)));
    // The realm is usable afterwards
    let completion = realm.eval("down(10)");
    assert_eq!(completion.ok().map(|c| c.value()), Some(JsValue::Number(0.0)));
}

#[test]
fn test_run_precompiled_code() {
    let code = stackjs::compile("40 + 2", &stackjs::CompileOptions::default());
    let realm = Realm::new();
    let completion = code.ok().and_then(|code| realm.run(&code).ok());
    assert_eq!(completion, Some(Completion::normal(JsValue::Number(42.0))));
}
