//! Object model
//!
//! Objects are shared through `JsObjectRef` (an `Rc<RefCell<JsObject>>`).
//! Property tables keep insertion order; array-index keys are reported in
//! ascending order ahead of the rest when keys are listed.
//!
//! Borrow discipline: no `Ref`/`RefMut` of an object may be alive while guest
//! code runs (getters, setters, `valueOf`), so every operation below copies
//! what it needs out of the cell before calling back into the VM.

use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use rustc_hash::{FxBuildHasher, FxHashSet};

use super::abstract_ops::{to_number, to_uint32};
use super::completion::JsResult;
use super::environment::EnvRef;
use super::realm::Realm;
use crate::compiler::Code;
use crate::value::{CheapClone, JsString, JsValue, PropertyKey};

pub type PropertyMap = IndexMap<PropertyKey, Property, FxBuildHasher>;

// ═══════════════════════════════════════════════════════════════════════════════
// Properties
// ═══════════════════════════════════════════════════════════════════════════════

/// A stored property
#[derive(Debug, Clone)]
pub enum Property {
    Data {
        value: JsValue,
        writable: bool,
        enumerable: bool,
        configurable: bool,
    },
    Accessor {
        get: Option<JsObjectRef>,
        set: Option<JsObjectRef>,
        enumerable: bool,
        configurable: bool,
    },
}

impl Property {
    /// Writable, enumerable, configurable data property
    pub fn data(value: JsValue) -> Self {
        Property::Data {
            value,
            writable: true,
            enumerable: true,
            configurable: true,
        }
    }

    pub fn with_attributes(value: JsValue, writable: bool, enumerable: bool, configurable: bool) -> Self {
        Property::Data {
            value,
            writable,
            enumerable,
            configurable,
        }
    }

    /// Writable, configurable, non-enumerable: how builtin methods are stored
    pub fn hidden(value: JsValue) -> Self {
        Property::with_attributes(value, true, false, true)
    }

    pub fn enumerable(&self) -> bool {
        match self {
            Property::Data { enumerable, .. } | Property::Accessor { enumerable, .. } => *enumerable,
        }
    }

    pub fn configurable(&self) -> bool {
        match self {
            Property::Data { configurable, .. } | Property::Accessor { configurable, .. } => {
                *configurable
            }
        }
    }

    pub fn is_accessor(&self) -> bool {
        matches!(self, Property::Accessor { .. })
    }

    pub fn value(&self) -> Option<&JsValue> {
        match self {
            Property::Data { value, .. } => Some(value),
            Property::Accessor { .. } => None,
        }
    }
}

/// A possibly partial property description, as passed to `[[DefineOwnProperty]]`
///
/// For `get`/`set`, the outer `Option` is presence of the field and the inner
/// one is the function or `undefined`.
#[derive(Debug, Clone, Default)]
pub struct PropertyDescriptor {
    pub value: Option<JsValue>,
    pub writable: Option<bool>,
    pub get: Option<Option<JsObjectRef>>,
    pub set: Option<Option<JsObjectRef>>,
    pub enumerable: Option<bool>,
    pub configurable: Option<bool>,
}

impl PropertyDescriptor {
    pub fn data(value: JsValue, writable: bool, enumerable: bool, configurable: bool) -> Self {
        Self {
            value: Some(value),
            writable: Some(writable),
            enumerable: Some(enumerable),
            configurable: Some(configurable),
            ..Self::default()
        }
    }

    pub fn accessor(
        get: Option<JsObjectRef>,
        set: Option<JsObjectRef>,
        enumerable: bool,
        configurable: bool,
    ) -> Self {
        Self {
            get: Some(get),
            set: Some(set),
            enumerable: Some(enumerable),
            configurable: Some(configurable),
            ..Self::default()
        }
    }

    /// Only the value field; used by `[[Set]]` on an existing own property
    pub fn value_only(value: JsValue) -> Self {
        Self {
            value: Some(value),
            ..Self::default()
        }
    }

    pub fn is_accessor(&self) -> bool {
        self.get.is_some() || self.set.is_some()
    }

    pub fn is_data(&self) -> bool {
        self.value.is_some() || self.writable.is_some()
    }

    pub fn is_generic(&self) -> bool {
        !self.is_accessor() && !self.is_data()
    }

    /// Fill absent fields with their defaults
    fn into_property(self) -> Property {
        let enumerable = self.enumerable.unwrap_or(false);
        let configurable = self.configurable.unwrap_or(false);
        if self.is_accessor() {
            Property::Accessor {
                get: self.get.flatten(),
                set: self.set.flatten(),
                enumerable,
                configurable,
            }
        } else {
            Property::Data {
                value: self.value.unwrap_or(JsValue::Undefined),
                writable: self.writable.unwrap_or(false),
                enumerable,
                configurable,
            }
        }
    }

    /// Every present field already holds the same value in `current`
    fn is_contained_in(&self, current: &Property) -> bool {
        if self.enumerable.is_some_and(|e| e != current.enumerable()) {
            return false;
        }
        if self.configurable.is_some_and(|c| c != current.configurable()) {
            return false;
        }
        match current {
            Property::Data { value, writable, .. } => {
                !self.is_accessor()
                    && self.value.as_ref().is_none_or(|v| v.same_value(value))
                    && self.writable.is_none_or(|w| w == *writable)
            }
            Property::Accessor { get, set, .. } => {
                !self.is_data()
                    && self.get.as_ref().is_none_or(|g| same_function(g, get))
                    && self.set.as_ref().is_none_or(|s| same_function(s, set))
            }
        }
    }

    /// Overwrite the fields of `current` that this descriptor carries
    fn apply_to(self, current: Property) -> Property {
        match current {
            Property::Data {
                value,
                writable,
                enumerable,
                configurable,
            } => Property::Data {
                value: self.value.unwrap_or(value),
                writable: self.writable.unwrap_or(writable),
                enumerable: self.enumerable.unwrap_or(enumerable),
                configurable: self.configurable.unwrap_or(configurable),
            },
            Property::Accessor {
                get,
                set,
                enumerable,
                configurable,
            } => Property::Accessor {
                get: self.get.unwrap_or(get),
                set: self.set.unwrap_or(set),
                enumerable: self.enumerable.unwrap_or(enumerable),
                configurable: self.configurable.unwrap_or(configurable),
            },
        }
    }
}

impl From<Property> for PropertyDescriptor {
    fn from(prop: Property) -> Self {
        match prop {
            Property::Data {
                value,
                writable,
                enumerable,
                configurable,
            } => PropertyDescriptor::data(value, writable, enumerable, configurable),
            Property::Accessor {
                get,
                set,
                enumerable,
                configurable,
            } => PropertyDescriptor::accessor(get, set, enumerable, configurable),
        }
    }
}

fn same_function(a: &Option<JsObjectRef>, b: &Option<JsObjectRef>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a.ptr_eq(b),
        (None, None) => true,
        _ => false,
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Functions
// ═══════════════════════════════════════════════════════════════════════════════

/// How an interpreted function binds `this`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThisMode {
    /// Arrow functions: inherit from the enclosing scope
    Lexical,
    /// Strict functions: the caller's value, unmodified
    Strict,
    /// Sloppy functions: null/undefined become the global object, primitives get boxed
    Global,
}

/// A closure over compiled code
#[derive(Debug, Clone)]
pub struct InterpretedFunction {
    pub code: Rc<Code>,
    pub scope: EnvRef,
    pub this_mode: ThisMode,
    /// Object whose prototype `super` looks in
    pub home_object: Option<JsObjectRef>,
    /// Key the method was defined under; `super(...)` calls the parent's
    /// method of the same name
    pub method_name: Option<PropertyKey>,
    pub constructible: bool,
    /// Generated constructor of a derived class: hands its arguments to the
    /// parent constructor
    pub forwards_super: bool,
}

pub type NativeFn = Rc<dyn Fn(&Realm, &JsValue, &[JsValue]) -> JsResult<JsValue>>;
pub type NativeConstructFn = Rc<dyn Fn(&Realm, &[JsValue]) -> JsResult<JsValue>>;

/// A host function
#[derive(Clone)]
pub struct NativeFunction {
    pub name: JsString,
    pub arity: u32,
    pub func: NativeFn,
    /// `[[Construct]]` behavior; absent for non-constructors
    pub construct: Option<NativeConstructFn>,
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeFunction")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub enum JsFunction {
    Interpreted(InterpretedFunction),
    Native(NativeFunction),
}

// ═══════════════════════════════════════════════════════════════════════════════
// Objects
// ═══════════════════════════════════════════════════════════════════════════════

/// Parameter bindings an arguments object still aliases
#[derive(Debug, Clone)]
pub struct ArgumentsMap {
    pub env: EnvRef,
    /// Parameter name per index; `None` once unmapped
    pub names: Vec<Option<JsString>>,
}

impl ArgumentsMap {
    fn mapped(&self, key: &PropertyKey) -> Option<&JsString> {
        let index = usize::try_from(key.as_index()?).ok()?;
        self.names.get(index)?.as_ref()
    }

    fn unmap(&mut self, key: &PropertyKey) {
        if let Some(index) = key.as_index().and_then(|i| usize::try_from(i).ok())
            && let Some(slot) = self.names.get_mut(index)
        {
            *slot = None;
        }
    }
}

/// Behavior beyond the ordinary internal methods
#[derive(Debug)]
pub enum ExoticObject {
    Ordinary,
    /// `length` is a real data property kept in sync on index writes
    Array,
    /// String wrapper; indices are virtual read-only properties
    String(JsString),
    Number(f64),
    Boolean(bool),
    Error,
    RegExp { pattern: JsString, flags: JsString },
    Arguments(ArgumentsMap),
    Function(JsFunction),
}

pub struct JsObject {
    pub prototype: Option<JsObjectRef>,
    pub extensible: bool,
    pub properties: PropertyMap,
    pub exotic: ExoticObject,
}

impl JsObject {
    pub fn new(prototype: Option<JsObjectRef>, exotic: ExoticObject) -> Self {
        Self {
            prototype,
            extensible: true,
            properties: PropertyMap::default(),
            exotic,
        }
    }
}

/// Shared handle to an object
#[derive(Clone)]
pub struct JsObjectRef(Rc<RefCell<JsObject>>);

impl CheapClone for JsObjectRef {}

impl fmt::Debug for JsObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[object {}]", self.class_name())
    }
}

impl JsObjectRef {
    pub fn new(object: JsObject) -> Self {
        Self(Rc::new(RefCell::new(object)))
    }

    pub fn borrow(&self) -> Ref<'_, JsObject> {
        self.0.borrow()
    }

    pub fn borrow_mut(&self) -> RefMut<'_, JsObject> {
        self.0.borrow_mut()
    }

    pub fn ptr_eq(&self, other: &JsObjectRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn prototype(&self) -> Option<JsObjectRef> {
        self.borrow().prototype.clone()
    }

    pub fn is_extensible(&self) -> bool {
        self.borrow().extensible
    }

    pub fn prevent_extensions(&self) {
        self.borrow_mut().extensible = false;
    }

    pub fn is_callable(&self) -> bool {
        self.0
            .try_borrow()
            .is_ok_and(|obj| matches!(obj.exotic, ExoticObject::Function(_)))
    }

    pub fn is_constructor(&self) -> bool {
        match &self.borrow().exotic {
            ExoticObject::Function(JsFunction::Interpreted(f)) => f.constructible,
            ExoticObject::Function(JsFunction::Native(f)) => f.construct.is_some(),
            _ => false,
        }
    }

    pub fn is_array(&self) -> bool {
        matches!(self.borrow().exotic, ExoticObject::Array)
    }

    /// A copy of the callable part; taken out so no borrow outlives the call
    pub fn function(&self) -> Option<JsFunction> {
        match &self.borrow().exotic {
            ExoticObject::Function(f) => Some(f.clone()),
            _ => None,
        }
    }

    /// The wrapped primitive of a Boolean, Number or String object
    pub fn primitive_value(&self) -> Option<JsValue> {
        match &self.borrow().exotic {
            ExoticObject::String(s) => Some(JsValue::String(s.cheap_clone())),
            ExoticObject::Number(n) => Some(JsValue::Number(*n)),
            ExoticObject::Boolean(b) => Some(JsValue::Boolean(*b)),
            _ => None,
        }
    }

    /// Class tag reported by `Object.prototype.toString`
    pub fn class_name(&self) -> &'static str {
        let Ok(obj) = self.0.try_borrow() else {
            return "Object";
        };
        match &obj.exotic {
            ExoticObject::Ordinary => "Object",
            ExoticObject::Array => "Array",
            ExoticObject::String(_) => "String",
            ExoticObject::Number(_) => "Number",
            ExoticObject::Boolean(_) => "Boolean",
            ExoticObject::Error => "Error",
            ExoticObject::RegExp { .. } => "RegExp",
            ExoticObject::Arguments(_) => "Arguments",
            ExoticObject::Function(_) => "Function",
        }
    }

    /// Store a property without any validation; for setting up fresh objects
    pub fn insert_property(&self, key: impl Into<PropertyKey>, prop: Property) {
        self.borrow_mut().properties.insert(key.into(), prop);
    }

    // ───────────────────────────────────────────────────────────────────────────
    // [[GetOwnProperty]] and friends
    // ───────────────────────────────────────────────────────────────────────────

    pub fn get_own_property(&self, key: &PropertyKey) -> Option<Property> {
        let obj = self.borrow();
        if let Some(prop) = obj.properties.get(key) {
            let mut prop = prop.clone();
            if let ExoticObject::Arguments(map) = &obj.exotic
                && let Some(name) = map.mapped(key)
                && let Property::Data { value, .. } = &mut prop
                && let Some(current) = map.env.binding_value(name)
            {
                *value = current;
            }
            return Some(prop);
        }
        if let ExoticObject::String(s) = &obj.exotic {
            let index = usize::try_from(key.as_index()?).ok()?;
            let unit = s.unit_at(index)?;
            return Some(Property::with_attributes(
                JsValue::String(unit),
                false,
                true,
                false,
            ));
        }
        None
    }

    /// [[GetProperty]]: own or inherited
    pub fn get_property(&self, key: &PropertyKey) -> Option<Property> {
        let mut current = self.cheap_clone();
        loop {
            if let Some(prop) = current.get_own_property(key) {
                return Some(prop);
            }
            current = current.prototype()?;
        }
    }

    pub fn has_own_property(&self, key: &PropertyKey) -> bool {
        self.get_own_property(key).is_some()
    }

    pub fn has_property(&self, key: &PropertyKey) -> bool {
        self.get_property(key).is_some()
    }

    /// Current value of the `length` data property of an array
    pub fn array_length(&self) -> u32 {
        match self.borrow().properties.get(&PropertyKey::from("length")) {
            Some(Property::Data {
                value: JsValue::Number(n),
                ..
            }) => *n as u32,
            _ => 0,
        }
    }

    // ───────────────────────────────────────────────────────────────────────────
    // [[Get]] / [[Set]]
    // ───────────────────────────────────────────────────────────────────────────

    /// [[Get]]; accessors run with `receiver` as `this`
    pub fn get(&self, realm: &Realm, key: &PropertyKey, receiver: &JsValue) -> JsResult<JsValue> {
        match self.get_property(key) {
            None => Ok(JsValue::Undefined),
            Some(Property::Data { value, .. }) => Ok(value),
            Some(Property::Accessor { get: Some(getter), .. }) => realm.call(&getter, receiver, &[]),
            Some(Property::Accessor { get: None, .. }) => Ok(JsValue::Undefined),
        }
    }

    /// [[Set]]; `false` when the assignment was rejected
    pub fn set(
        &self,
        realm: &Realm,
        key: PropertyKey,
        value: JsValue,
        receiver: &JsValue,
    ) -> JsResult<bool> {
        let found = self
            .get_property(&key)
            .unwrap_or_else(|| Property::data(JsValue::Undefined));

        match found {
            Property::Data {
                writable: false, ..
            } => Ok(false),
            Property::Data { .. } => {
                let JsValue::Object(receiver) = receiver else {
                    return Ok(false);
                };
                match receiver.get_own_property(&key) {
                    Some(Property::Accessor { .. })
                    | Some(Property::Data {
                        writable: false, ..
                    }) => Ok(false),
                    Some(Property::Data { .. }) => {
                        receiver.define_own_property(realm, key, PropertyDescriptor::value_only(value))
                    }
                    None => receiver.define_own_property(
                        realm,
                        key,
                        PropertyDescriptor::data(value, true, true, true),
                    ),
                }
            }
            Property::Accessor {
                set: Some(setter), ..
            } => {
                realm.call(&setter, receiver, &[value])?;
                Ok(true)
            }
            Property::Accessor { set: None, .. } => Ok(false),
        }
    }

    /// [[Set]] on this object as receiver; a rejection throws in strict code
    pub fn put(&self, realm: &Realm, key: PropertyKey, value: JsValue, strict: bool) -> JsResult<()> {
        let receiver = JsValue::Object(self.cheap_clone());
        let display = key.clone();
        if !self.set(realm, key, value, &receiver)? && strict {
            return Err(realm.throw_type_error(format!(
                "Cannot assign to read only property '{}' of object",
                display
            )));
        }
        Ok(())
    }

    // ───────────────────────────────────────────────────────────────────────────
    // [[DefineOwnProperty]]
    // ───────────────────────────────────────────────────────────────────────────

    /// [[DefineOwnProperty]]; `false` when the definition was rejected
    pub fn define_own_property(
        &self,
        realm: &Realm,
        key: PropertyKey,
        desc: PropertyDescriptor,
    ) -> JsResult<bool> {
        let kind = match &self.borrow().exotic {
            ExoticObject::Array => DefineKind::Array,
            ExoticObject::Arguments(_) => DefineKind::Arguments,
            _ => DefineKind::Ordinary,
        };
        match kind {
            DefineKind::Array => self.array_define(realm, key, desc),
            DefineKind::Arguments => Ok(self.arguments_define(key, desc)),
            DefineKind::Ordinary => Ok(self.ordinary_define(key, desc)),
        }
    }

    pub fn define_property_or_throw(
        &self,
        realm: &Realm,
        key: PropertyKey,
        desc: PropertyDescriptor,
    ) -> JsResult<()> {
        let display = key.clone();
        if self.define_own_property(realm, key, desc)? {
            Ok(())
        } else {
            Err(realm.throw_type_error(format!("Cannot redefine property: {}", display)))
        }
    }

    /// ValidateAndApplyPropertyDescriptor
    fn ordinary_define(&self, key: PropertyKey, desc: PropertyDescriptor) -> bool {
        let Some(current) = self.get_own_property(&key) else {
            let mut obj = self.borrow_mut();
            if !obj.extensible {
                return false;
            }
            obj.properties.insert(key, desc.into_property());
            return true;
        };

        if desc.is_contained_in(&current) {
            return true;
        }

        if !current.configurable() {
            if desc.configurable == Some(true) {
                return false;
            }
            if desc.enumerable.is_some_and(|e| e != current.enumerable()) {
                return false;
            }
        }

        let base = if desc.is_generic() {
            current
        } else if current.is_accessor() != desc.is_accessor() {
            if !current.configurable() {
                return false;
            }
            let (enumerable, configurable) = (current.enumerable(), current.configurable());
            if current.is_accessor() {
                Property::with_attributes(JsValue::Undefined, false, enumerable, configurable)
            } else {
                Property::Accessor {
                    get: None,
                    set: None,
                    enumerable,
                    configurable,
                }
            }
        } else {
            match &current {
                Property::Data {
                    value,
                    writable: false,
                    configurable: false,
                    ..
                } => {
                    if desc.writable == Some(true) {
                        return false;
                    }
                    if desc.value.as_ref().is_some_and(|v| !v.same_value(value)) {
                        return false;
                    }
                }
                Property::Accessor {
                    get,
                    set,
                    configurable: false,
                    ..
                } => {
                    if desc.get.as_ref().is_some_and(|g| !same_function(g, get)) {
                        return false;
                    }
                    if desc.set.as_ref().is_some_and(|s| !same_function(s, set)) {
                        return false;
                    }
                }
                _ => {}
            }
            current
        };

        let updated = desc.apply_to(base);
        self.borrow_mut().properties.insert(key, updated);
        true
    }

    /// Array [[DefineOwnProperty]]: keeps `length` and the indices consistent
    fn array_define(&self, realm: &Realm, key: PropertyKey, desc: PropertyDescriptor) -> JsResult<bool> {
        if key.eq_str("length") {
            let Some(value) = desc.value.clone() else {
                return Ok(self.ordinary_define(key, desc));
            };
            let new_len = to_uint32(realm, &value)?;
            if f64::from(new_len) != to_number(realm, &value)? {
                return Err(realm.throw_range_error("Invalid array length"));
            }
            return Ok(self.set_array_length(key, desc, new_len));
        }

        let Some(index) = key.as_index() else {
            return Ok(self.ordinary_define(key, desc));
        };

        let old_len = self.array_length();
        let length_writable = matches!(
            self.get_own_property(&PropertyKey::from("length")),
            Some(Property::Data { writable: true, .. })
        );
        if index >= old_len && !length_writable {
            return Ok(false);
        }
        if !self.ordinary_define(key, desc) {
            return Ok(false);
        }
        if index >= old_len {
            self.write_length(index + 1);
        }
        Ok(true)
    }

    fn set_array_length(&self, key: PropertyKey, mut desc: PropertyDescriptor, new_len: u32) -> bool {
        desc.value = Some(JsValue::from(new_len));
        let old_len = self.array_length();
        if new_len >= old_len {
            return self.ordinary_define(key, desc);
        }

        let length_writable = matches!(
            self.get_own_property(&key),
            Some(Property::Data { writable: true, .. })
        );
        if !length_writable {
            return false;
        }

        // Making length read-only waits until the deletions are done
        let keep_writable = desc.writable != Some(false);
        if !keep_writable {
            desc.writable = Some(true);
        }
        if !self.ordinary_define(key.clone(), desc) {
            return false;
        }

        let mut doomed: Vec<u32> = self
            .borrow()
            .properties
            .keys()
            .filter_map(PropertyKey::as_index)
            .filter(|i| *i >= new_len)
            .collect();
        doomed.sort_unstable_by(|a, b| b.cmp(a));

        for index in doomed {
            if !self.delete(&PropertyKey::Index(index)) {
                self.write_length(index + 1);
                if !keep_writable {
                    self.freeze_length();
                }
                return false;
            }
        }

        if !keep_writable {
            self.freeze_length();
        }
        true
    }

    fn write_length(&self, len: u32) {
        if let Some(Property::Data { value, .. }) = self
            .borrow_mut()
            .properties
            .get_mut(&PropertyKey::from("length"))
        {
            *value = JsValue::from(len);
        }
    }

    fn freeze_length(&self) {
        if let Some(Property::Data { writable, .. }) = self
            .borrow_mut()
            .properties
            .get_mut(&PropertyKey::from("length"))
        {
            *writable = false;
        }
    }

    /// Arguments [[DefineOwnProperty]]: writes through to mapped parameters
    fn arguments_define(&self, key: PropertyKey, desc: PropertyDescriptor) -> bool {
        let mapped = match &self.borrow().exotic {
            ExoticObject::Arguments(map) => map
                .mapped(&key)
                .map(|name| (map.env.cheap_clone(), name.cheap_clone())),
            _ => None,
        };

        let is_accessor = desc.is_accessor();
        let value = desc.value.clone();
        let makes_readonly = desc.writable == Some(false);
        if !self.ordinary_define(key.clone(), desc) {
            return false;
        }

        if let Some((env, name)) = mapped {
            if is_accessor {
                self.unmap_argument(&key);
            } else {
                if let Some(value) = value {
                    env.write_binding(&name, value);
                }
                if makes_readonly {
                    self.unmap_argument(&key);
                }
            }
        }
        true
    }

    fn unmap_argument(&self, key: &PropertyKey) {
        if let ExoticObject::Arguments(map) = &mut self.borrow_mut().exotic {
            map.unmap(key);
        }
    }

    // ───────────────────────────────────────────────────────────────────────────
    // [[Delete]] and key listing
    // ───────────────────────────────────────────────────────────────────────────

    /// [[Delete]]; `false` for a non-configurable property
    pub fn delete(&self, key: &PropertyKey) -> bool {
        let mut obj = self.borrow_mut();
        match obj.properties.get(key) {
            Some(prop) if prop.configurable() => {
                obj.properties.shift_remove(key);
                if let ExoticObject::Arguments(map) = &mut obj.exotic {
                    map.unmap(key);
                }
                true
            }
            Some(_) => false,
            None => match &obj.exotic {
                ExoticObject::String(s) => key
                    .as_index()
                    .and_then(|i| usize::try_from(i).ok())
                    .is_none_or(|i| i >= s.utf16_len()),
                _ => true,
            },
        }
    }

    /// Own keys: array indices ascending, then the rest in insertion order
    pub fn own_keys(&self) -> Vec<PropertyKey> {
        let obj = self.borrow();
        let mut indices: Vec<u32> = obj
            .properties
            .keys()
            .filter_map(PropertyKey::as_index)
            .collect();
        if let ExoticObject::String(s) = &obj.exotic {
            let len = u32::try_from(s.utf16_len()).unwrap_or(u32::MAX);
            indices.extend(0..len);
        }
        indices.sort_unstable();
        indices.dedup();

        let mut keys: Vec<PropertyKey> = indices.into_iter().map(PropertyKey::Index).collect();
        keys.extend(
            obj.properties
                .keys()
                .filter(|k| k.as_index().is_none())
                .cloned(),
        );
        keys
    }

    /// Property names visible to `for-in` and `Object.keys`
    ///
    /// A name shadowed by a closer object (enumerable or not) is reported
    /// at most once and only if the closest definition is enumerable.
    pub fn enumerate(&self, include_inherited: bool, only_enumerable: bool) -> Vec<PropertyKey> {
        let mut seen = FxHashSet::default();
        let mut result = Vec::new();
        let mut current = Some(self.cheap_clone());
        while let Some(obj) = current {
            for key in obj.own_keys() {
                if !seen.insert(key.clone()) {
                    continue;
                }
                let Some(prop) = obj.get_own_property(&key) else {
                    continue;
                };
                if only_enumerable && !prop.enumerable() {
                    continue;
                }
                result.push(key);
            }
            if !include_inherited {
                break;
            }
            current = obj.prototype();
        }
        result
    }
}

enum DefineKind {
    Ordinary,
    Array,
    Arguments,
}
