//! Intrinsic objects and global bindings

use std::rc::Rc;

use tracing::info;

use super::abstract_ops::{to_number, to_object, to_property_key, to_string, to_uint32};
use super::completion::JsResult;
use super::function::{make_function, make_native};
use super::object::{
    ExoticObject, JsFunction, JsObject, JsObjectRef, NativeFunction, Property, PropertyDescriptor,
};
use super::realm::{ErrorKind, Realm};
use crate::compiler::{Code, CodeKind, CompileOptions, Params, compile};
use crate::lexer::Span;
use crate::value::{CheapClone, JsString, JsValue, PropertyKey};

type Builtin = fn(&Realm, &JsValue, &[JsValue]) -> JsResult<JsValue>;

/// Objects every realm starts with
pub struct Intrinsics {
    pub object_prototype: JsObjectRef,
    pub function_prototype: JsObjectRef,
    pub array_prototype: JsObjectRef,
    pub string_prototype: JsObjectRef,
    pub number_prototype: JsObjectRef,
    pub boolean_prototype: JsObjectRef,
    pub error_prototype: JsObjectRef,
    pub type_error_prototype: JsObjectRef,
    pub reference_error_prototype: JsObjectRef,
    pub syntax_error_prototype: JsObjectRef,
    pub range_error_prototype: JsObjectRef,
    pub regexp_prototype: JsObjectRef,
    /// `%ThrowTypeError%`, guarding `caller`/`arguments` of strict functions
    pub throw_type_error: JsObjectRef,
    /// Body of a class without an explicit constructor
    pub default_constructor: Rc<Code>,
}

fn native_object(prototype: &JsObjectRef, func: Builtin) -> JsObjectRef {
    JsObjectRef::new(JsObject::new(
        Some(prototype.cheap_clone()),
        ExoticObject::Function(JsFunction::Native(NativeFunction {
            name: JsString::from(""),
            arity: 0,
            func: Rc::new(func),
            construct: None,
        })),
    ))
}

impl Intrinsics {
    pub(crate) fn new() -> Self {
        let object_prototype = JsObjectRef::new(JsObject::new(None, ExoticObject::Ordinary));
        let derived = |exotic: ExoticObject| {
            JsObjectRef::new(JsObject::new(Some(object_prototype.cheap_clone()), exotic))
        };

        let function_prototype = native_object(&object_prototype, |_, _, _| Ok(JsValue::Undefined));

        let array_prototype = derived(ExoticObject::Array);
        array_prototype.insert_property(
            "length",
            Property::with_attributes(JsValue::Number(0.0), true, false, false),
        );
        let string_prototype = derived(ExoticObject::String(JsString::from("")));
        string_prototype.insert_property(
            "length",
            Property::with_attributes(JsValue::Number(0.0), false, false, false),
        );
        let number_prototype = derived(ExoticObject::Number(0.0));
        let boolean_prototype = derived(ExoticObject::Boolean(false));
        let regexp_prototype = derived(ExoticObject::Ordinary);

        let error_prototype = derived(ExoticObject::Ordinary);
        let error_subtype =
            || JsObjectRef::new(JsObject::new(Some(error_prototype.cheap_clone()), ExoticObject::Ordinary));
        let type_error_prototype = error_subtype();
        let reference_error_prototype = error_subtype();
        let syntax_error_prototype = error_subtype();
        let range_error_prototype = error_subtype();

        let throw_type_error = native_object(&function_prototype, |realm, _, _| {
            Err(realm.throw_type_error(
                "'caller', 'callee', and 'arguments' properties may not be accessed on strict mode functions or the arguments objects for calls to them",
            ))
        });
        throw_type_error.prevent_extensions();

        let default_constructor = Rc::new(Code {
            name: None,
            span: Span::new(0, 0, 1, 1),
            kind: CodeKind::Method,
            strict: true,
            instructions: vec![crate::compiler::Op::Undefined, crate::compiler::Op::Return],
            functions: Vec::new(),
            lexical_declarations: Vec::new(),
            var_names: Vec::new(),
            params: Params {
                names: Vec::new(),
                expected_args: 0,
                simple: true,
            },
            uses_super: false,
            uses_arguments: false,
            configurable_bindings: false,
            handlers: Vec::new(),
            source_map: Vec::new(),
        });

        Self {
            object_prototype,
            function_prototype,
            array_prototype,
            string_prototype,
            number_prototype,
            boolean_prototype,
            error_prototype,
            type_error_prototype,
            reference_error_prototype,
            syntax_error_prototype,
            range_error_prototype,
            regexp_prototype,
            throw_type_error,
            default_constructor,
        }
    }

    pub fn error_prototype_for(&self, kind: ErrorKind) -> &JsObjectRef {
        match kind {
            ErrorKind::Error => &self.error_prototype,
            ErrorKind::TypeError => &self.type_error_prototype,
            ErrorKind::ReferenceError => &self.reference_error_prototype,
            ErrorKind::SyntaxError => &self.syntax_error_prototype,
            ErrorKind::RangeError => &self.range_error_prototype,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Registration helpers
// ═══════════════════════════════════════════════════════════════════════════════

fn register_method(realm: &Realm, target: &JsObjectRef, name: &str, func: Builtin, arity: u32) {
    let function = make_native(realm, name, arity, Rc::new(func), None);
    target.insert_property(name, Property::hidden(JsValue::Object(function)));
}

fn register_global(realm: &Realm, name: &str, value: JsValue) {
    realm.global_object().insert_property(name, Property::hidden(value));
}

/// Constructor wired to its prototype and published as a global
fn register_constructor(
    realm: &Realm,
    name: &str,
    arity: u32,
    call: Rc<dyn Fn(&Realm, &JsValue, &[JsValue]) -> JsResult<JsValue>>,
    construct: Rc<dyn Fn(&Realm, &[JsValue]) -> JsResult<JsValue>>,
    prototype: &JsObjectRef,
) -> JsObjectRef {
    let ctor = make_native(realm, name, arity, call, Some(construct));
    ctor.insert_property(
        "prototype",
        Property::with_attributes(JsValue::Object(prototype.cheap_clone()), false, false, false),
    );
    prototype.insert_property("constructor", Property::hidden(JsValue::Object(ctor.cheap_clone())));
    register_global(realm, name, JsValue::Object(ctor.cheap_clone()));
    ctor
}

fn arg(args: &[JsValue], index: usize) -> JsValue {
    args.get(index).cloned().unwrap_or_default()
}

fn require_object(realm: &Realm, value: &JsValue, what: &str) -> JsResult<JsObjectRef> {
    match value {
        JsValue::Object(obj) => Ok(obj.cheap_clone()),
        _ => Err(realm.throw_type_error(format!("{} called on non-object", what))),
    }
}

/// Populate the global object; runs once per realm
pub(crate) fn install_globals(realm: &Realm) {
    let intrinsics = realm.intrinsics();
    let function_prototype = &intrinsics.function_prototype;
    function_prototype.insert_property(
        "length",
        Property::with_attributes(JsValue::Number(0.0), false, false, true),
    );
    function_prototype.insert_property(
        "name",
        Property::with_attributes(JsValue::from(""), false, false, true),
    );

    init_object(realm);
    init_function(realm);
    init_array(realm);
    init_primitive_wrappers(realm);
    init_errors(realm);

    let fixed = |value: JsValue| Property::with_attributes(value, false, false, false);
    let global = realm.global_object();
    global.insert_property("undefined", fixed(JsValue::Undefined));
    global.insert_property("NaN", fixed(JsValue::Number(f64::NAN)));
    global.insert_property("Infinity", fixed(JsValue::Number(f64::INFINITY)));
    register_global(realm, "globalThis", JsValue::Object(global.cheap_clone()));
    register_method(realm, global, "eval", global_eval, 1);
    register_method(realm, global, "print", global_print, 0);
}

// ═══════════════════════════════════════════════════════════════════════════════
// Object
// ═══════════════════════════════════════════════════════════════════════════════

fn init_object(realm: &Realm) {
    let proto = realm.intrinsics().object_prototype.cheap_clone();
    register_method(realm, &proto, "toString", object_to_string, 0);
    register_method(realm, &proto, "valueOf", object_value_of, 0);
    register_method(realm, &proto, "hasOwnProperty", object_has_own_property, 1);
    register_method(realm, &proto, "isPrototypeOf", object_is_prototype_of, 1);
    register_method(realm, &proto, "propertyIsEnumerable", object_property_is_enumerable, 1);

    let ctor = register_constructor(
        realm,
        "Object",
        1,
        Rc::new(object_constructor),
        Rc::new(|realm: &Realm, args: &[JsValue]| object_constructor(realm, &JsValue::Undefined, args)),
        &proto,
    );
    register_method(realm, &ctor, "getPrototypeOf", object_get_prototype_of, 1);
    register_method(realm, &ctor, "defineProperty", object_define_property, 3);
    register_method(realm, &ctor, "getOwnPropertyDescriptor", object_get_own_property_descriptor, 2);
    register_method(realm, &ctor, "keys", object_keys, 1);
    register_method(realm, &ctor, "preventExtensions", object_prevent_extensions, 1);
    register_method(realm, &ctor, "isExtensible", object_is_extensible, 1);
    register_method(realm, &ctor, "create", object_create, 2);
    register_method(realm, &ctor, "freeze", object_freeze, 1);
}

fn object_constructor(realm: &Realm, _this: &JsValue, args: &[JsValue]) -> JsResult<JsValue> {
    let value = arg(args, 0);
    if value.is_null_or_undefined() {
        return Ok(JsValue::Object(realm.new_object()));
    }
    Ok(JsValue::Object(to_object(realm, &value)?))
}

fn object_to_string(realm: &Realm, this: &JsValue, _args: &[JsValue]) -> JsResult<JsValue> {
    let tag = match this {
        JsValue::Undefined => "Undefined",
        JsValue::Null => "Null",
        other => to_object(realm, other)?.class_name(),
    };
    Ok(JsValue::from(format!("[object {}]", tag)))
}

fn object_value_of(realm: &Realm, this: &JsValue, _args: &[JsValue]) -> JsResult<JsValue> {
    Ok(JsValue::Object(to_object(realm, this)?))
}

fn object_has_own_property(realm: &Realm, this: &JsValue, args: &[JsValue]) -> JsResult<JsValue> {
    let key = to_property_key(realm, &arg(args, 0))?;
    let object = to_object(realm, this)?;
    Ok(JsValue::Boolean(object.has_own_property(&key)))
}

fn object_is_prototype_of(realm: &Realm, this: &JsValue, args: &[JsValue]) -> JsResult<JsValue> {
    let JsValue::Object(value) = arg(args, 0) else {
        return Ok(JsValue::Boolean(false));
    };
    let object = to_object(realm, this)?;
    let mut current = value.prototype();
    while let Some(proto) = current {
        if proto.ptr_eq(&object) {
            return Ok(JsValue::Boolean(true));
        }
        current = proto.prototype();
    }
    Ok(JsValue::Boolean(false))
}

fn object_property_is_enumerable(realm: &Realm, this: &JsValue, args: &[JsValue]) -> JsResult<JsValue> {
    let key = to_property_key(realm, &arg(args, 0))?;
    let object = to_object(realm, this)?;
    let enumerable = object
        .get_own_property(&key)
        .is_some_and(|prop| prop.enumerable());
    Ok(JsValue::Boolean(enumerable))
}

fn object_get_prototype_of(realm: &Realm, _this: &JsValue, args: &[JsValue]) -> JsResult<JsValue> {
    let object = require_object(realm, &arg(args, 0), "Object.getPrototypeOf")?;
    Ok(object.prototype().map_or(JsValue::Null, JsValue::Object))
}

fn object_define_property(realm: &Realm, _this: &JsValue, args: &[JsValue]) -> JsResult<JsValue> {
    let target = arg(args, 0);
    let object = require_object(realm, &target, "Object.defineProperty")?;
    let key = to_property_key(realm, &arg(args, 1))?;
    let desc = to_property_descriptor(realm, &arg(args, 2))?;
    object.define_property_or_throw(realm, key, desc)?;
    Ok(target)
}

fn object_get_own_property_descriptor(
    realm: &Realm,
    _this: &JsValue,
    args: &[JsValue],
) -> JsResult<JsValue> {
    let object = require_object(realm, &arg(args, 0), "Object.getOwnPropertyDescriptor")?;
    let key = to_property_key(realm, &arg(args, 1))?;
    Ok(match object.get_own_property(&key) {
        Some(prop) => from_property(realm, prop),
        None => JsValue::Undefined,
    })
}

fn object_keys(realm: &Realm, _this: &JsValue, args: &[JsValue]) -> JsResult<JsValue> {
    let object = require_object(realm, &arg(args, 0), "Object.keys")?;
    let keys = object
        .enumerate(false, true)
        .iter()
        .map(|key| JsValue::String(key.to_js_string()))
        .collect();
    Ok(JsValue::Object(realm.new_array(keys)))
}

fn object_prevent_extensions(realm: &Realm, _this: &JsValue, args: &[JsValue]) -> JsResult<JsValue> {
    let target = arg(args, 0);
    require_object(realm, &target, "Object.preventExtensions")?.prevent_extensions();
    Ok(target)
}

fn object_is_extensible(realm: &Realm, _this: &JsValue, args: &[JsValue]) -> JsResult<JsValue> {
    let object = require_object(realm, &arg(args, 0), "Object.isExtensible")?;
    Ok(JsValue::Boolean(object.is_extensible()))
}

fn object_create(realm: &Realm, _this: &JsValue, args: &[JsValue]) -> JsResult<JsValue> {
    let proto = match arg(args, 0) {
        JsValue::Object(proto) => Some(proto),
        JsValue::Null => None,
        _ => return Err(realm.throw_type_error("Object prototype may only be an Object or null")),
    };
    let object = JsObjectRef::new(JsObject::new(proto, ExoticObject::Ordinary));
    let properties = arg(args, 1);
    if !properties.is_undefined() {
        define_properties(realm, &object, &properties)?;
    }
    Ok(JsValue::Object(object))
}

fn object_freeze(realm: &Realm, _this: &JsValue, args: &[JsValue]) -> JsResult<JsValue> {
    let target = arg(args, 0);
    let object = require_object(realm, &target, "Object.freeze")?;
    for key in object.own_keys() {
        let Some(prop) = object.get_own_property(&key) else {
            continue;
        };
        let desc = PropertyDescriptor {
            writable: (!prop.is_accessor()).then_some(false),
            configurable: Some(false),
            ..PropertyDescriptor::default()
        };
        object.define_property_or_throw(realm, key, desc)?;
    }
    object.prevent_extensions();
    Ok(target)
}

fn define_properties(realm: &Realm, object: &JsObjectRef, properties: &JsValue) -> JsResult<()> {
    let source = to_object(realm, properties)?;
    let mut descriptors = Vec::new();
    for key in source.enumerate(false, true) {
        let desc = source.get(realm, &key, properties)?;
        descriptors.push((key, to_property_descriptor(realm, &desc)?));
    }
    for (key, desc) in descriptors {
        object.define_property_or_throw(realm, key, desc)?;
    }
    Ok(())
}

/// ToPropertyDescriptor
fn to_property_descriptor(realm: &Realm, value: &JsValue) -> JsResult<PropertyDescriptor> {
    let JsValue::Object(object) = value else {
        return Err(realm.throw_type_error("Property description must be an object"));
    };
    let field = |name: &str| -> JsResult<Option<JsValue>> {
        let key = PropertyKey::from(name);
        if object.has_property(&key) {
            Ok(Some(object.get(realm, &key, value)?))
        } else {
            Ok(None)
        }
    };
    let accessor = |name: &str| -> JsResult<Option<Option<JsObjectRef>>> {
        match field(name)? {
            None => Ok(None),
            Some(JsValue::Undefined) => Ok(Some(None)),
            Some(JsValue::Object(f)) if f.is_callable() => Ok(Some(Some(f))),
            Some(other) => Err(realm.throw_type_error(format!(
                "{} must be a function: {:?}",
                if name == "get" { "Getter" } else { "Setter" },
                other
            ))),
        }
    };

    let desc = PropertyDescriptor {
        enumerable: field("enumerable")?.map(|v| v.to_boolean()),
        configurable: field("configurable")?.map(|v| v.to_boolean()),
        value: field("value")?,
        writable: field("writable")?.map(|v| v.to_boolean()),
        get: accessor("get")?,
        set: accessor("set")?,
    };
    if desc.is_accessor() && desc.is_data() {
        return Err(realm.throw_type_error(
            "Invalid property descriptor. Cannot both specify accessors and a value or writable attribute",
        ));
    }
    Ok(desc)
}

/// FromPropertyDescriptor
fn from_property(realm: &Realm, prop: Property) -> JsValue {
    let object = realm.new_object();
    let function = |f: Option<JsObjectRef>| f.map_or(JsValue::Undefined, JsValue::Object);
    match prop {
        Property::Data {
            value,
            writable,
            enumerable,
            configurable,
        } => {
            object.insert_property("value", Property::data(value));
            object.insert_property("writable", Property::data(JsValue::Boolean(writable)));
            object.insert_property("enumerable", Property::data(JsValue::Boolean(enumerable)));
            object.insert_property("configurable", Property::data(JsValue::Boolean(configurable)));
        }
        Property::Accessor {
            get,
            set,
            enumerable,
            configurable,
        } => {
            object.insert_property("get", Property::data(function(get)));
            object.insert_property("set", Property::data(function(set)));
            object.insert_property("enumerable", Property::data(JsValue::Boolean(enumerable)));
            object.insert_property("configurable", Property::data(JsValue::Boolean(configurable)));
        }
    }
    JsValue::Object(object)
}

// ═══════════════════════════════════════════════════════════════════════════════
// Function
// ═══════════════════════════════════════════════════════════════════════════════

fn init_function(realm: &Realm) {
    let proto = realm.intrinsics().function_prototype.cheap_clone();
    register_method(realm, &proto, "call", function_call, 1);
    register_method(realm, &proto, "apply", function_apply, 2);
    register_constructor(
        realm,
        "Function",
        1,
        Rc::new(function_constructor),
        Rc::new(|realm: &Realm, args: &[JsValue]| function_constructor(realm, &JsValue::Undefined, args)),
        &proto,
    );
}

fn this_function(realm: &Realm, this: &JsValue) -> JsResult<JsObjectRef> {
    match this {
        JsValue::Object(f) if f.is_callable() => Ok(f.cheap_clone()),
        _ => Err(realm.throw_type_error("Function.prototype method called on incompatible receiver")),
    }
}

fn function_call(realm: &Realm, this: &JsValue, args: &[JsValue]) -> JsResult<JsValue> {
    let function = this_function(realm, this)?;
    let this_arg = arg(args, 0);
    let rest = args.get(1..).unwrap_or_default();
    realm.call(&function, &this_arg, rest)
}

fn function_apply(realm: &Realm, this: &JsValue, args: &[JsValue]) -> JsResult<JsValue> {
    let function = this_function(realm, this)?;
    let this_arg = arg(args, 0);
    let list = arg(args, 1);
    let call_args = match &list {
        JsValue::Undefined | JsValue::Null => Vec::new(),
        JsValue::Object(array) => {
            let length = to_uint32(realm, &array.get(realm, &PropertyKey::from("length"), &list)?)?;
            let mut values = Vec::new();
            for index in 0..length {
                values.push(array.get(realm, &PropertyKey::from(index), &list)?);
            }
            values
        }
        _ => {
            return Err(realm.throw_type_error("CreateListFromArrayLike called on non-object"));
        }
    };
    realm.call(&function, &this_arg, &call_args)
}

/// `Function(p1, ..., body)`
fn function_constructor(realm: &Realm, _this: &JsValue, args: &[JsValue]) -> JsResult<JsValue> {
    let (body, params) = match args.split_last() {
        Some((body, params)) => (to_string(realm, body)?, params),
        None => (JsString::from(""), args),
    };
    let mut names = Vec::with_capacity(params.len());
    for param in params {
        names.push(to_string(realm, param)?.to_string());
    }
    let source = format!("(function anonymous({}\n) {{\n{}\n}})", names.join(","), body);
    let options = CompileOptions {
        function: true,
        ..CompileOptions::default()
    };
    let code = compile(&source, &options).map_err(|error| realm.syntax_error_from(&error))?;
    let function = make_function(realm, code, realm.global_env().cheap_clone());
    Ok(JsValue::Object(function))
}

// ═══════════════════════════════════════════════════════════════════════════════
// Array
// ═══════════════════════════════════════════════════════════════════════════════

fn init_array(realm: &Realm) {
    let proto = realm.intrinsics().array_prototype.cheap_clone();
    register_method(realm, &proto, "push", array_push, 1);
    let ctor = register_constructor(
        realm,
        "Array",
        1,
        Rc::new(array_constructor),
        Rc::new(|realm: &Realm, args: &[JsValue]| array_constructor(realm, &JsValue::Undefined, args)),
        &proto,
    );
    register_method(realm, &ctor, "isArray", array_is_array, 1);
}

fn array_constructor(realm: &Realm, _this: &JsValue, args: &[JsValue]) -> JsResult<JsValue> {
    if let [JsValue::Number(n)] = args {
        let length = super::abstract_ops::number_to_uint32(*n);
        if f64::from(length) != *n {
            return Err(realm.throw_range_error("Invalid array length"));
        }
        let array = realm.new_array(Vec::new());
        array.define_own_property(
            realm,
            PropertyKey::from("length"),
            PropertyDescriptor::value_only(JsValue::from(length)),
        )?;
        return Ok(JsValue::Object(array));
    }
    Ok(JsValue::Object(realm.new_array(args.to_vec())))
}

fn array_is_array(_realm: &Realm, _this: &JsValue, args: &[JsValue]) -> JsResult<JsValue> {
    Ok(JsValue::Boolean(
        arg(args, 0).as_object().is_some_and(JsObjectRef::is_array),
    ))
}

fn array_push(realm: &Realm, this: &JsValue, args: &[JsValue]) -> JsResult<JsValue> {
    let object = to_object(realm, this)?;
    let receiver = JsValue::Object(object.cheap_clone());
    let mut length = to_uint32(realm, &object.get(realm, &PropertyKey::from("length"), &receiver)?)?;
    for value in args {
        object.put(realm, PropertyKey::from(length), value.clone(), true)?;
        length = length.saturating_add(1);
    }
    object.put(realm, PropertyKey::from("length"), JsValue::from(length), true)?;
    Ok(JsValue::from(length))
}

// ═══════════════════════════════════════════════════════════════════════════════
// String, Number, Boolean
// ═══════════════════════════════════════════════════════════════════════════════

fn init_primitive_wrappers(realm: &Realm) {
    let intrinsics = realm.intrinsics();

    let string_proto = intrinsics.string_prototype.cheap_clone();
    register_method(realm, &string_proto, "toString", string_value_of, 0);
    register_method(realm, &string_proto, "valueOf", string_value_of, 0);
    register_wrapper(realm, "String", string_call, &string_proto);

    let number_proto = intrinsics.number_prototype.cheap_clone();
    register_method(realm, &number_proto, "toString", number_to_string_method, 1);
    register_method(realm, &number_proto, "valueOf", number_value_of, 0);
    register_wrapper(realm, "Number", number_call, &number_proto);

    let boolean_proto = intrinsics.boolean_prototype.cheap_clone();
    register_method(realm, &boolean_proto, "toString", boolean_to_string, 0);
    register_method(realm, &boolean_proto, "valueOf", boolean_value_of, 0);
    register_wrapper(realm, "Boolean", boolean_call, &boolean_proto);
}

/// Calling converts; constructing boxes the converted value
fn register_wrapper(realm: &Realm, name: &str, convert: Builtin, prototype: &JsObjectRef) {
    register_constructor(
        realm,
        name,
        1,
        Rc::new(convert),
        Rc::new(move |realm: &Realm, args: &[JsValue]| {
            let primitive = convert(realm, &JsValue::Undefined, args)?;
            let wrapper = realm
                .new_wrapper(&primitive)
                .ok_or_else(|| realm.throw_type_error("Cannot box value"))?;
            Ok(JsValue::Object(wrapper))
        }),
        prototype,
    );
}

fn string_call(realm: &Realm, _this: &JsValue, args: &[JsValue]) -> JsResult<JsValue> {
    match args.first() {
        None => Ok(JsValue::from("")),
        Some(value) => Ok(JsValue::String(to_string(realm, value)?)),
    }
}

fn number_call(realm: &Realm, _this: &JsValue, args: &[JsValue]) -> JsResult<JsValue> {
    match args.first() {
        None => Ok(JsValue::Number(0.0)),
        Some(value) => Ok(JsValue::Number(to_number(realm, value)?)),
    }
}

fn boolean_call(_realm: &Realm, _this: &JsValue, args: &[JsValue]) -> JsResult<JsValue> {
    Ok(JsValue::Boolean(arg(args, 0).to_boolean()))
}

/// The primitive behind `this` for a wrapper prototype method
fn this_primitive(realm: &Realm, this: &JsValue, method: &str, accept: fn(&JsValue) -> bool) -> JsResult<JsValue> {
    let value = match this {
        JsValue::Object(obj) => obj.primitive_value(),
        other => Some(other.clone()),
    };
    match value {
        Some(value) if accept(&value) => Ok(value),
        _ => Err(realm.throw_type_error(format!("{} requires a compatible receiver", method))),
    }
}

fn string_value_of(realm: &Realm, this: &JsValue, _args: &[JsValue]) -> JsResult<JsValue> {
    this_primitive(realm, this, "String.prototype.valueOf", |v| {
        matches!(v, JsValue::String(_))
    })
}

fn number_value_of(realm: &Realm, this: &JsValue, _args: &[JsValue]) -> JsResult<JsValue> {
    this_primitive(realm, this, "Number.prototype.valueOf", |v| {
        matches!(v, JsValue::Number(_))
    })
}

fn number_to_string_method(realm: &Realm, this: &JsValue, _args: &[JsValue]) -> JsResult<JsValue> {
    let value = number_value_of(realm, this, &[])?;
    Ok(JsValue::String(to_string(realm, &value)?))
}

fn boolean_value_of(realm: &Realm, this: &JsValue, _args: &[JsValue]) -> JsResult<JsValue> {
    this_primitive(realm, this, "Boolean.prototype.valueOf", |v| {
        matches!(v, JsValue::Boolean(_))
    })
}

fn boolean_to_string(realm: &Realm, this: &JsValue, _args: &[JsValue]) -> JsResult<JsValue> {
    let value = boolean_value_of(realm, this, &[])?;
    Ok(JsValue::String(to_string(realm, &value)?))
}

// ═══════════════════════════════════════════════════════════════════════════════
// Errors
// ═══════════════════════════════════════════════════════════════════════════════

fn init_errors(realm: &Realm) {
    register_method(
        realm,
        &realm.intrinsics().error_prototype,
        "toString",
        error_to_string,
        0,
    );
    for kind in [
        ErrorKind::Error,
        ErrorKind::TypeError,
        ErrorKind::ReferenceError,
        ErrorKind::SyntaxError,
        ErrorKind::RangeError,
    ] {
        let proto = realm.intrinsics().error_prototype_for(kind).cheap_clone();
        proto.insert_property("name", Property::hidden(JsValue::from(kind.name())));
        proto.insert_property("message", Property::hidden(JsValue::from("")));
        register_constructor(
            realm,
            kind.name(),
            1,
            Rc::new(move |realm: &Realm, this: &JsValue, args: &[JsValue]| {
                error_call(realm, kind, this, args)
            }),
            Rc::new(move |realm: &Realm, args: &[JsValue]| {
                Ok(JsValue::Object(create_error(realm, kind, &arg(args, 0))?))
            }),
            &proto,
        );
    }
}

fn create_error(realm: &Realm, kind: ErrorKind, message: &JsValue) -> JsResult<JsObjectRef> {
    let error = JsObjectRef::new(JsObject::new(
        Some(realm.intrinsics().error_prototype_for(kind).cheap_clone()),
        ExoticObject::Error,
    ));
    if !message.is_undefined() {
        let message = to_string(realm, message)?;
        error.insert_property("message", Property::hidden(JsValue::String(message)));
    }
    Ok(error)
}

/// `Error(message)` called as a function
///
/// Called through `super(...)` from a subclass constructor the receiver is
/// already an instance; it is initialized in place instead.
fn error_call(realm: &Realm, kind: ErrorKind, this: &JsValue, args: &[JsValue]) -> JsResult<JsValue> {
    let message = arg(args, 0);
    if let JsValue::Object(receiver) = this
        && receiver.class_name() == "Object"
        && inherits_from(receiver, realm.intrinsics().error_prototype_for(kind))
    {
        receiver.borrow_mut().exotic = ExoticObject::Error;
        if !message.is_undefined() {
            let message = to_string(realm, &message)?;
            receiver.insert_property("message", Property::hidden(JsValue::String(message)));
        }
        return Ok(this.clone());
    }
    Ok(JsValue::Object(create_error(realm, kind, &message)?))
}

fn inherits_from(object: &JsObjectRef, proto: &JsObjectRef) -> bool {
    let mut current = object.prototype();
    while let Some(obj) = current {
        if obj.ptr_eq(proto) {
            return true;
        }
        current = obj.prototype();
    }
    false
}

fn error_to_string(realm: &Realm, this: &JsValue, _args: &[JsValue]) -> JsResult<JsValue> {
    let object = require_object(realm, this, "Error.prototype.toString")?;
    let name = match object.get(realm, &PropertyKey::from("name"), this)? {
        JsValue::Undefined => JsString::from("Error"),
        other => to_string(realm, &other)?,
    };
    let message = match object.get(realm, &PropertyKey::from("message"), this)? {
        JsValue::Undefined => JsString::from(""),
        other => to_string(realm, &other)?,
    };
    let text = if name.is_empty() {
        message
    } else if message.is_empty() {
        name
    } else {
        JsString::from(format!("{}: {}", name, message))
    };
    Ok(JsValue::String(text))
}

// ═══════════════════════════════════════════════════════════════════════════════
// Global functions
// ═══════════════════════════════════════════════════════════════════════════════

/// Indirect eval: always runs in the global environment
fn global_eval(realm: &Realm, _this: &JsValue, args: &[JsValue]) -> JsResult<JsValue> {
    let JsValue::String(source) = arg(args, 0) else {
        return Ok(arg(args, 0));
    };
    let options = CompileOptions {
        eval: true,
        ..CompileOptions::default()
    };
    let code = compile(source.as_str(), &options).map_err(|error| realm.syntax_error_from(&error))?;
    realm.evaluate(code)
}

fn global_print(realm: &Realm, _this: &JsValue, args: &[JsValue]) -> JsResult<JsValue> {
    let mut parts = Vec::with_capacity(args.len());
    for value in args {
        parts.push(to_string(realm, value)?.to_string());
    }
    info!(target: "stackjs::print", "{}", parts.join(" "));
    Ok(JsValue::Undefined)
}
