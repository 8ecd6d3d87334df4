//! Function objects
//!
//! Creation of closures and host functions, `[[Call]]`, `[[Construct]]` and
//! function declaration instantiation.

use std::rc::Rc;

use tracing::trace;

use super::completion::JsResult;
use super::context::ExecutionContext;
use super::environment::EnvRef;
use super::object::{
    ArgumentsMap, ExoticObject, InterpretedFunction, JsFunction, JsObject, JsObjectRef,
    NativeConstructFn, NativeFn, NativeFunction, Property, ThisMode,
};
use super::realm::Realm;
use crate::compiler::{Code, CodeKind, DeclarationKind};
use crate::error::FatalError;
use crate::value::{CheapClone, JsString, JsValue, PropertyKey};

/// Closure for a function declaration, expression or arrow
pub fn make_function(realm: &Realm, code: Rc<Code>, scope: EnvRef) -> JsObjectRef {
    let constructible = code.kind == CodeKind::Normal;
    let this_mode = this_mode_of(&code);
    build(
        realm,
        InterpretedFunction {
            code,
            scope,
            this_mode,
            home_object: None,
            method_name: None,
            constructible,
            forwards_super: false,
        },
    )
}

/// Closure for an object literal or class method; `home` anchors `super`
pub fn make_method(
    realm: &Realm,
    code: Rc<Code>,
    scope: EnvRef,
    home: JsObjectRef,
    method_name: PropertyKey,
) -> JsObjectRef {
    let this_mode = this_mode_of(&code);
    build(
        realm,
        InterpretedFunction {
            code,
            scope,
            this_mode,
            home_object: Some(home),
            method_name: Some(method_name),
            constructible: false,
            forwards_super: false,
        },
    )
}

/// Class constructor; `parent` becomes its `[[Prototype]]`
pub fn make_class_constructor(
    realm: &Realm,
    code: Rc<Code>,
    scope: EnvRef,
    home: JsObjectRef,
    parent: JsObjectRef,
    forwards_super: bool,
) -> JsObjectRef {
    let ctor = build(
        realm,
        InterpretedFunction {
            code,
            scope,
            this_mode: ThisMode::Strict,
            home_object: Some(home),
            method_name: Some(PropertyKey::from("constructor")),
            constructible: true,
            forwards_super,
        },
    );
    ctor.borrow_mut().prototype = Some(parent);
    ctor
}

fn this_mode_of(code: &Code) -> ThisMode {
    if code.kind == CodeKind::Arrow {
        ThisMode::Lexical
    } else if code.strict {
        ThisMode::Strict
    } else {
        ThisMode::Global
    }
}

fn build(realm: &Realm, function: InterpretedFunction) -> JsObjectRef {
    let code = function.code.cheap_clone();
    let intrinsics = realm.intrinsics();
    let obj = JsObjectRef::new(JsObject::new(
        Some(intrinsics.function_prototype.cheap_clone()),
        ExoticObject::Function(JsFunction::Interpreted(function)),
    ));

    obj.insert_property(
        "length",
        Property::with_attributes(JsValue::from(code.params.expected_args), false, false, true),
    );
    let name = code.name.clone().unwrap_or_else(|| JsString::from(""));
    obj.insert_property(
        "name",
        Property::with_attributes(JsValue::String(name), false, false, true),
    );

    if code.kind == CodeKind::Normal {
        let proto = realm.new_object();
        proto.insert_property("constructor", Property::hidden(JsValue::Object(obj.cheap_clone())));
        obj.insert_property(
            "prototype",
            Property::with_attributes(JsValue::Object(proto), true, false, false),
        );
        if code.strict {
            poison(realm, &obj, &["caller", "arguments"]);
        }
    }
    obj
}

/// Install `%ThrowTypeError%` accessors for the given names
fn poison(realm: &Realm, obj: &JsObjectRef, names: &[&str]) {
    let thrower = realm.intrinsics().throw_type_error.cheap_clone();
    for name in names {
        obj.insert_property(
            *name,
            Property::Accessor {
                get: Some(thrower.cheap_clone()),
                set: Some(thrower.cheap_clone()),
                enumerable: false,
                configurable: false,
            },
        );
    }
}

/// Host function object
pub fn make_native(
    realm: &Realm,
    name: &str,
    arity: u32,
    func: NativeFn,
    construct: Option<NativeConstructFn>,
) -> JsObjectRef {
    let obj = JsObjectRef::new(JsObject::new(
        Some(realm.intrinsics().function_prototype.cheap_clone()),
        ExoticObject::Function(JsFunction::Native(NativeFunction {
            name: JsString::from(name),
            arity,
            func,
            construct,
        })),
    ));
    obj.insert_property(
        "length",
        Property::with_attributes(JsValue::from(arity), false, false, true),
    );
    obj.insert_property(
        "name",
        Property::with_attributes(JsValue::from(name), false, false, true),
    );
    obj
}

/// `[[Call]]`; depth accounting is done by `Realm::call`
pub(crate) fn call_function(
    realm: &Realm,
    callee: &JsObjectRef,
    this: &JsValue,
    args: &[JsValue],
) -> JsResult<JsValue> {
    match callee.function() {
        Some(JsFunction::Native(native)) => (native.func)(realm, this, args),
        Some(JsFunction::Interpreted(function)) => {
            call_interpreted(realm, callee, &function, this, args)
        }
        None => Err(realm.throw_type_error("object is not a function")),
    }
}

fn call_interpreted(
    realm: &Realm,
    callee: &JsObjectRef,
    function: &InterpretedFunction,
    this: &JsValue,
    args: &[JsValue],
) -> JsResult<JsValue> {
    trace!(name = function.code.display_name(), argc = args.len(), "call");

    let this_binding = match function.this_mode {
        ThisMode::Lexical => None,
        ThisMode::Strict => Some(this.clone()),
        ThisMode::Global => Some(match this {
            JsValue::Undefined | JsValue::Null => JsValue::Object(realm.global_object().cheap_clone()),
            JsValue::Object(_) => this.clone(),
            primitive => JsValue::Object(super::abstract_ops::to_object(realm, primitive)?),
        }),
    };

    let env = match this_binding {
        None => EnvRef::new_declarative(Some(function.scope.cheap_clone())),
        Some(this_value) => EnvRef::new_method(
            this_value,
            function.home_object.clone(),
            function.method_name.clone(),
            Some(function.scope.cheap_clone()),
        ),
    };

    instantiate_function(realm, callee, &function.code, &env, args)?;

    if function.forwards_super {
        return forward_to_parent(realm, function, &env, args);
    }

    let mut context = ExecutionContext::new(
        realm,
        function.code.cheap_clone(),
        env.cheap_clone(),
        env,
        args.to_vec(),
    );
    context.run()
}

/// Body of a generated derived-class constructor
fn forward_to_parent(
    realm: &Realm,
    function: &InterpretedFunction,
    env: &EnvRef,
    args: &[JsValue],
) -> JsResult<JsValue> {
    let this = env.this_binding().unwrap_or_default();
    let parent = function.home_object.as_ref().and_then(JsObjectRef::prototype);
    let Some(parent) = parent else {
        return Err(realm.throw_type_error("Super constructor null is not a constructor"));
    };
    let ctor = parent.get(realm, &PropertyKey::from("constructor"), &this)?;
    match ctor {
        JsValue::Object(ctor) if ctor.is_callable() => realm.call(&ctor, &this, args),
        _ => Err(realm.throw_type_error("Super constructor is not a constructor")),
    }
}

/// `[[Construct]]`
pub(crate) fn construct_function(
    realm: &Realm,
    ctor: &JsObjectRef,
    args: &[JsValue],
) -> JsResult<JsValue> {
    match ctor.function() {
        Some(JsFunction::Native(NativeFunction {
            construct: Some(construct),
            ..
        })) => construct(realm, args),
        Some(JsFunction::Interpreted(function)) if function.constructible => {
            let proto = ctor.get(
                realm,
                &PropertyKey::from("prototype"),
                &JsValue::Object(ctor.cheap_clone()),
            )?;
            let proto = match proto {
                JsValue::Object(proto) => proto,
                _ => realm.intrinsics().object_prototype.cheap_clone(),
            };
            let object = JsObjectRef::new(JsObject::new(Some(proto), ExoticObject::Ordinary));
            let this = JsValue::Object(object.cheap_clone());
            let result = realm.call(ctor, &this, args)?;
            if result.is_object() {
                Ok(result)
            } else {
                Ok(this)
            }
        }
        _ => Err(realm.throw_type_error("object is not a constructor")),
    }
}

/// Function declaration instantiation
///
/// Order: parameters, hoisted function declarations, `arguments`, `var`
/// names, then lexical declarations (left uninitialized).
fn instantiate_function(
    realm: &Realm,
    callee: &JsObjectRef,
    code: &Code,
    env: &EnvRef,
    args: &[JsValue],
) -> JsResult<()> {
    let params = &code.params;
    for name in &params.names {
        if !env.has_binding(name) {
            env.create_mutable_binding(realm, name, false)?;
        }
    }
    if params.simple {
        for (i, name) in params.names.iter().enumerate() {
            let value = args.get(i).cloned().unwrap_or_default();
            env.initialize_binding(realm, name, value)?;
        }
    }

    for slot in &code.functions {
        let function_code = slot
            .get()
            .ok_or_else(|| FatalError::Invariant("function body was never compiled".into()))?;
        let name = function_code.name.clone().ok_or_else(|| {
            FatalError::Invariant("function declaration without a name".into())
        })?;
        let function = make_function(realm, function_code.cheap_clone(), env.cheap_clone());
        if !env.has_binding(&name) {
            env.create_mutable_binding(realm, &name, false)?;
        }
        env.initialize_binding(realm, &name, JsValue::Object(function))?;
    }

    let arguments = JsString::from("arguments");
    let lexically_declared = code
        .lexical_declarations
        .iter()
        .any(|decl| decl.names.contains(&arguments));
    if code.uses_arguments
        && code.kind != CodeKind::Arrow
        && !env.has_binding(&arguments)
        && !lexically_declared
    {
        let object = create_arguments_object(realm, callee, code, env, args);
        if code.strict {
            env.create_immutable_binding(&arguments, true)?;
        } else {
            env.create_mutable_binding(realm, &arguments, false)?;
        }
        env.initialize_binding(realm, &arguments, JsValue::Object(object))?;
    }

    for name in &code.var_names {
        if !env.has_binding(name) {
            env.create_mutable_binding(realm, name, false)?;
            env.initialize_binding(realm, name, JsValue::Undefined)?;
        }
    }

    for decl in &code.lexical_declarations {
        for name in &decl.names {
            match decl.kind {
                DeclarationKind::Const => env.create_immutable_binding(name, true)?,
                DeclarationKind::Mutable | DeclarationKind::Class | DeclarationKind::Function => {
                    env.create_mutable_binding(realm, name, false)?
                }
            }
        }
    }
    Ok(())
}

/// Arguments object; sloppy functions with simple parameters get a mapped one
fn create_arguments_object(
    realm: &Realm,
    callee: &JsObjectRef,
    code: &Code,
    env: &EnvRef,
    args: &[JsValue],
) -> JsObjectRef {
    let mapped = !code.strict && code.params.simple;
    let mut names: Vec<Option<JsString>> = vec![None; args.len()];
    if mapped {
        // A repeated parameter name maps to its last position
        for (index, name) in code.params.names.iter().enumerate().rev() {
            let taken = names.iter().flatten().any(|n| n == name);
            if !taken && let Some(slot) = names.get_mut(index) {
                *slot = Some(name.cheap_clone());
            }
        }
    }

    let object = JsObjectRef::new(JsObject::new(
        Some(realm.intrinsics().object_prototype.cheap_clone()),
        ExoticObject::Arguments(ArgumentsMap {
            env: env.cheap_clone(),
            names,
        }),
    ));
    for (index, arg) in args.iter().enumerate() {
        if let Ok(index) = u32::try_from(index) {
            object.insert_property(index, Property::data(arg.clone()));
        }
    }
    let len = u32::try_from(args.len()).unwrap_or(u32::MAX);
    object.insert_property("length", Property::hidden(JsValue::from(len)));

    if code.strict {
        poison(realm, &object, &["caller", "callee"]);
    } else {
        object.insert_property("callee", Property::hidden(JsValue::Object(callee.cheap_clone())));
    }
    object
}
