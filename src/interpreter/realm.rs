//! The realm
//!
//! Owns the global object, the global environment and the intrinsic
//! prototypes, and is the entry point for running compiled code. Every
//! execution context borrows it; nothing in the VM reaches for ambient state.

use std::cell::Cell;
use std::rc::Rc;

use serde::Deserialize;
use tracing::{debug, warn};

use super::completion::{Abrupt, Completion, CompletionType, JsResult};
use super::context::ExecutionContext;
use super::environment::EnvRef;
use super::function::{call_function, construct_function, make_function, make_native};
use super::intrinsics::{Intrinsics, install_globals};
use super::object::{ExoticObject, JsObject, JsObjectRef, Property, PropertyDescriptor};
use crate::compiler::{Code, CodeKind, CompileOptions, DeclarationKind, compile};
use crate::error::{FatalError, JsError};
use crate::value::{CheapClone, JsString, JsValue, PropertyKey};

/// Realm limits
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RealmConfig {
    /// Nested calls allowed before a RangeError
    pub max_call_depth: usize,
    /// Native stack the nested calls may use before a RangeError. Each
    /// guest call recurses through the dispatch loop, so this must stay
    /// below the stack of the thread running the realm.
    pub max_stack_bytes: usize,
}

impl Default for RealmConfig {
    fn default() -> Self {
        Self {
            max_call_depth: 512,
            // Fits a 2 MiB spawned thread
            max_stack_bytes: 1024 * 1024,
        }
    }
}

/// Native error constructors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Error,
    TypeError,
    ReferenceError,
    SyntaxError,
    RangeError,
}

impl ErrorKind {
    pub fn name(self) -> &'static str {
        match self {
            ErrorKind::Error => "Error",
            ErrorKind::TypeError => "TypeError",
            ErrorKind::ReferenceError => "ReferenceError",
            ErrorKind::SyntaxError => "SyntaxError",
            ErrorKind::RangeError => "RangeError",
        }
    }
}

pub struct Realm {
    intrinsics: Intrinsics,
    global_object: JsObjectRef,
    /// Declarative record for top-level lexical bindings; its outer record
    /// is the object record of the global object
    global_env: EnvRef,
    config: RealmConfig,
    call_depth: Cell<usize>,
    /// Stack address at the outermost call
    stack_base: Cell<usize>,
}

impl Default for Realm {
    fn default() -> Self {
        Self::new()
    }
}

impl Realm {
    pub fn new() -> Self {
        Self::with_config(RealmConfig::default())
    }

    pub fn with_config(config: RealmConfig) -> Self {
        let intrinsics = Intrinsics::new();
        let global_object = JsObjectRef::new(JsObject::new(
            Some(intrinsics.object_prototype.cheap_clone()),
            ExoticObject::Ordinary,
        ));
        let object_env = EnvRef::new_object(global_object.cheap_clone(), false, None);
        let global_env = EnvRef::new_declarative(Some(object_env));

        let realm = Self {
            intrinsics,
            global_object,
            global_env,
            config,
            call_depth: Cell::new(0),
            stack_base: Cell::new(0),
        };
        install_globals(&realm);
        realm
    }

    pub fn intrinsics(&self) -> &Intrinsics {
        &self.intrinsics
    }

    pub fn global_object(&self) -> &JsObjectRef {
        &self.global_object
    }

    pub fn global_env(&self) -> &EnvRef {
        &self.global_env
    }

    pub fn config(&self) -> &RealmConfig {
        &self.config
    }

    /// The object record below the global declarative record
    fn object_env(&self) -> EnvRef {
        self.global_env
            .outer()
            .cloned()
            .unwrap_or_else(|| EnvRef::new_object(self.global_object.cheap_clone(), false, None))
    }

    // ═══════════════════════════════════════════════════════════════════════════════
    // Entry points
    // ═══════════════════════════════════════════════════════════════════════════════

    /// Run a compiled Code object in a fresh top-level context
    ///
    /// Script and eval code complete normally with their completion value; a
    /// function Code (compiled with `function: true`) yields the function.
    pub fn run(&self, code: &Rc<Code>) -> Result<Completion, FatalError> {
        debug!(kind = ?code.kind, name = code.display_name(), "realm run");
        self.settle(self.evaluate(code.cheap_clone()))
    }

    /// Compile and run in one step; a compile error becomes a thrown SyntaxError
    pub fn eval(&self, source: &str) -> Result<Completion, FatalError> {
        match compile(source, &CompileOptions::default()) {
            Ok(code) => self.run(&code),
            Err(error) => {
                debug!(%error, "compile failed");
                let error = self.new_error(ErrorKind::SyntaxError, error.message());
                Ok(Completion::throw(JsValue::Object(error)))
            }
        }
    }

    /// Call a function from the host; a normal result is a return completion
    pub fn invoke(
        &self,
        function: &JsValue,
        this: &JsValue,
        args: &[JsValue],
    ) -> Result<Completion, FatalError> {
        let result = match function {
            JsValue::Object(f) if f.is_callable() => self.call(f, this, args),
            _ => Err(self.throw_type_error(format!("{:?} is not a function", function))),
        };
        match self.settle(result)? {
            Completion {
                kind: CompletionType::Normal,
                value,
                ..
            } => Ok(Completion::returned(value.unwrap_or_default())),
            other => Ok(other),
        }
    }

    fn settle(&self, result: JsResult<JsValue>) -> Result<Completion, FatalError> {
        match result {
            Ok(value) => Ok(Completion::normal(value)),
            Err(Abrupt::Throw(value)) => Ok(Completion::throw(value)),
            Err(Abrupt::Fatal(error)) => {
                warn!(%error, "fatal error aborted the run");
                Err(error)
            }
        }
    }

    /// Install a host function on the global object
    pub fn define_native(
        &self,
        name: &str,
        arity: u32,
        func: impl Fn(&Realm, &JsValue, &[JsValue]) -> JsResult<JsValue> + 'static,
    ) {
        let function = make_native(self, name, arity, Rc::new(func), None);
        self.global_object
            .insert_property(name, Property::hidden(JsValue::Object(function)));
    }

    /// Current value of a global binding: lexical first, then the global object
    pub fn global_binding(&self, name: &str) -> Option<JsValue> {
        let name = JsString::from(name);
        if self.global_env.has_binding(&name) {
            return self.global_env.get_binding_value(self, &name, false).ok();
        }
        let key = PropertyKey::from(&name);
        self.global_object.get_property(&key)?;
        self.global_object
            .get(self, &key, &JsValue::Object(self.global_object.cheap_clone()))
            .ok()
    }

    /// `[[Call]]` with call depth accounting
    pub fn call(&self, function: &JsObjectRef, this: &JsValue, args: &[JsValue]) -> JsResult<JsValue> {
        let depth = self.call_depth.get();
        let here = stack_address();
        if depth == 0 {
            self.stack_base.set(here);
        }
        if depth >= self.config.max_call_depth
            || self.stack_base.get().abs_diff(here) > self.config.max_stack_bytes
        {
            return Err(self.throw_range_error("Maximum call stack size exceeded"));
        }
        self.call_depth.set(depth + 1);
        let result = call_function(self, function, this, args);
        self.call_depth.set(depth);
        result
    }

    /// `[[Construct]]`
    pub fn construct(&self, function: &JsObjectRef, args: &[JsValue]) -> JsResult<JsValue> {
        construct_function(self, function, args)
    }

    // ═══════════════════════════════════════════════════════════════════════════════
    // Top-level code
    // ═══════════════════════════════════════════════════════════════════════════════

    /// Declaration instantiation plus execution of global, eval or function code
    pub(crate) fn evaluate(&self, code: Rc<Code>) -> JsResult<JsValue> {
        let (lexical_env, variable_env) = match code.kind {
            CodeKind::Global => (self.global_env.cheap_clone(), self.object_env()),
            CodeKind::Eval => {
                let lexical = EnvRef::new_declarative(Some(self.global_env.cheap_clone()));
                let variable = if code.strict {
                    lexical.cheap_clone()
                } else {
                    self.object_env()
                };
                (lexical, variable)
            }
            CodeKind::Normal | CodeKind::Method | CodeKind::Arrow => {
                let function = make_function(self, code, self.global_env.cheap_clone());
                return Ok(JsValue::Object(function));
            }
        };

        self.instantiate_declarations(&code, &lexical_env, &variable_env)?;
        let mut context = ExecutionContext::new(self, code, lexical_env, variable_env, Vec::new());
        context.run()
    }

    fn instantiate_declarations(
        &self,
        code: &Code,
        lexical_env: &EnvRef,
        variable_env: &EnvRef,
    ) -> JsResult<()> {
        let configurable = code.configurable_bindings;
        let hoists_to_global = !variable_env.ptr_eq(lexical_env);

        // Clashes with top-level let/const/class of earlier scripts
        if code.kind == CodeKind::Global {
            for decl in &code.lexical_declarations {
                for name in &decl.names {
                    if self.global_env.has_binding(name) {
                        return Err(self.redeclared(name));
                    }
                }
            }
        }
        if hoists_to_global {
            for name in code.var_names.iter().chain(code.functions.iter().filter_map(|slot| {
                slot.get().and_then(|c| c.name.as_ref())
            })) {
                if self.global_env.has_binding(name) {
                    return Err(self.redeclared(name));
                }
            }
        }

        for slot in &code.functions {
            let function_code = slot
                .get()
                .ok_or_else(|| FatalError::Invariant("function body was never compiled".into()))?;
            let name = function_code.name.clone().ok_or_else(|| {
                FatalError::Invariant("function declaration without a name".into())
            })?;
            let function = make_function(self, function_code.cheap_clone(), lexical_env.cheap_clone());

            if !variable_env.has_binding(&name) {
                variable_env.create_mutable_binding(self, &name, configurable)?;
            } else if hoists_to_global {
                self.replace_global_function(&name, configurable)?;
            }
            variable_env.set_mutable_binding(self, &name, JsValue::Object(function), code.strict)?;
        }

        for name in &code.var_names {
            if !variable_env.has_binding(name) {
                variable_env.create_mutable_binding(self, name, configurable)?;
                variable_env.initialize_binding(self, name, JsValue::Undefined)?;
            }
        }

        for decl in &code.lexical_declarations {
            for name in &decl.names {
                match decl.kind {
                    DeclarationKind::Const => lexical_env.create_immutable_binding(name, true)?,
                    _ => lexical_env.create_mutable_binding(self, name, false)?,
                }
            }
        }
        Ok(())
    }

    /// A function declaration over an existing global property
    fn replace_global_function(&self, name: &JsString, configurable: bool) -> JsResult<()> {
        let key = PropertyKey::from(name);
        match self.global_object.get_property(&key) {
            Some(existing) if existing.configurable() => {
                self.global_object.define_property_or_throw(
                    self,
                    key,
                    PropertyDescriptor::data(JsValue::Undefined, true, true, configurable),
                )
            }
            Some(Property::Data {
                writable: true,
                enumerable: true,
                ..
            })
            | None => Ok(()),
            Some(_) => Err(self.throw_type_error(format!("Cannot redefine property: {}", name))),
        }
    }

    fn redeclared(&self, name: &JsString) -> Abrupt {
        self.throw_syntax_error(format!("Identifier '{}' has already been declared", name))
    }

    // ═══════════════════════════════════════════════════════════════════════════════
    // Object factories
    // ═══════════════════════════════════════════════════════════════════════════════

    pub fn new_object(&self) -> JsObjectRef {
        JsObjectRef::new(JsObject::new(
            Some(self.intrinsics.object_prototype.cheap_clone()),
            ExoticObject::Ordinary,
        ))
    }

    pub fn new_array(&self, elements: Vec<JsValue>) -> JsObjectRef {
        let array = JsObjectRef::new(JsObject::new(
            Some(self.intrinsics.array_prototype.cheap_clone()),
            ExoticObject::Array,
        ));
        let len = u32::try_from(elements.len()).unwrap_or(u32::MAX);
        for (index, value) in (0..len).zip(elements) {
            array.insert_property(index, Property::data(value));
        }
        array.insert_property(
            "length",
            Property::with_attributes(JsValue::from(len), true, false, false),
        );
        array
    }

    /// Wrapper object for a primitive; `None` for null, undefined and objects
    pub fn new_wrapper(&self, value: &JsValue) -> Option<JsObjectRef> {
        let (proto, exotic) = match value {
            JsValue::Boolean(b) => (&self.intrinsics.boolean_prototype, ExoticObject::Boolean(*b)),
            JsValue::Number(n) => (&self.intrinsics.number_prototype, ExoticObject::Number(*n)),
            JsValue::String(s) => (
                &self.intrinsics.string_prototype,
                ExoticObject::String(s.cheap_clone()),
            ),
            JsValue::Undefined | JsValue::Null | JsValue::Object(_) => return None,
        };
        let object = JsObjectRef::new(JsObject::new(Some(proto.cheap_clone()), exotic));
        if let JsValue::String(s) = value {
            let len = u32::try_from(s.utf16_len()).unwrap_or(u32::MAX);
            object.insert_property(
                "length",
                Property::with_attributes(JsValue::from(len), false, false, false),
            );
        }
        Some(object)
    }

    pub fn new_regexp(&self, pattern: JsString, flags: JsString) -> JsObjectRef {
        let regexp = JsObjectRef::new(JsObject::new(
            Some(self.intrinsics.regexp_prototype.cheap_clone()),
            ExoticObject::RegExp {
                pattern: pattern.cheap_clone(),
                flags: flags.cheap_clone(),
            },
        ));
        let fixed = |value: JsValue| Property::with_attributes(value, false, false, false);
        regexp.insert_property("source", fixed(JsValue::String(pattern)));
        regexp.insert_property("global", fixed(JsValue::Boolean(flags.as_str().contains('g'))));
        regexp.insert_property(
            "ignoreCase",
            fixed(JsValue::Boolean(flags.as_str().contains('i'))),
        );
        regexp.insert_property(
            "multiline",
            fixed(JsValue::Boolean(flags.as_str().contains('m'))),
        );
        regexp.insert_property(
            "lastIndex",
            Property::with_attributes(JsValue::Number(0.0), true, false, false),
        );
        regexp
    }

    pub fn new_error(&self, kind: ErrorKind, message: &str) -> JsObjectRef {
        let error = JsObjectRef::new(JsObject::new(
            Some(self.intrinsics.error_prototype_for(kind).cheap_clone()),
            ExoticObject::Error,
        ));
        error.insert_property("message", Property::hidden(JsValue::from(message)));
        error
    }

    pub fn throw_error(&self, kind: ErrorKind, message: impl AsRef<str>) -> Abrupt {
        Abrupt::Throw(JsValue::Object(self.new_error(kind, message.as_ref())))
    }

    pub fn throw_type_error(&self, message: impl AsRef<str>) -> Abrupt {
        self.throw_error(ErrorKind::TypeError, message)
    }

    pub fn throw_range_error(&self, message: impl AsRef<str>) -> Abrupt {
        self.throw_error(ErrorKind::RangeError, message)
    }

    pub fn throw_reference_error(&self, message: impl AsRef<str>) -> Abrupt {
        self.throw_error(ErrorKind::ReferenceError, message)
    }

    pub fn throw_syntax_error(&self, message: impl AsRef<str>) -> Abrupt {
        self.throw_error(ErrorKind::SyntaxError, message)
    }

    /// A compile error surfaced to guest code
    pub(crate) fn syntax_error_from(&self, error: &JsError) -> Abrupt {
        self.throw_syntax_error(error.message())
    }
}

/// Address of a local in the caller's frame
#[inline(always)]
fn stack_address() -> usize {
    let marker = 0u8;
    std::ptr::addr_of!(marker) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[allow(clippy::expect_used)]
    fn test_config_defaults_missing_fields() {
        let config: RealmConfig = serde_json::from_str("{}").expect("valid config");
        assert_eq!(config.max_call_depth, 512);
        assert_eq!(config.max_stack_bytes, 1024 * 1024);
        let config: RealmConfig =
            serde_json::from_str(r#"{"max_call_depth": 8}"#).expect("valid config");
        assert_eq!(config.max_call_depth, 8);
    }

    #[test]
    fn test_global_object_is_linked() {
        let realm = Realm::new();
        let this = realm.global_binding("globalThis");
        assert_eq!(this, Some(JsValue::Object(realm.global_object().cheap_clone())));
        assert_eq!(
            realm.global_binding("undefined"),
            Some(JsValue::Undefined)
        );
    }

    #[test]
    fn test_call_depth_resets_after_throw() {
        let realm = Realm::with_config(RealmConfig {
            max_call_depth: 4,
            ..RealmConfig::default()
        });
        let first = realm.eval("function f() { return f(); } try { f(); } catch (e) {} 1");
        assert!(first.is_ok_and(|c| c.kind == crate::CompletionType::Normal));
        assert_eq!(realm.call_depth.get(), 0);
    }

    #[test]
    fn test_stack_budget_stops_deep_recursion() {
        let realm = Realm::with_config(RealmConfig {
            max_call_depth: usize::MAX,
            max_stack_bytes: 256 * 1024,
        });
        let result = realm.eval(
            "var e; function down(n) { return n ? down(n - 1) : 0; } \
             try { down(100000); } catch (x) { e = x; } e instanceof RangeError",
        );
        assert!(result.is_ok_and(|c| c.value() == JsValue::Boolean(true)));
        assert_eq!(realm.call_depth.get(), 0);
    }
}
