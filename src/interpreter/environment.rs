//! Environment records
//!
//! Scopes form a chain of `EnvRef`s linked through `outer`. Children hold
//! their parent; nothing links downward.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use rustc_hash::FxHashMap;

use super::completion::JsResult;
use super::object::{JsObjectRef, PropertyDescriptor};
use super::realm::Realm;
use crate::error::FatalError;
use crate::value::{CheapClone, JsString, JsValue, PropertyKey};

/// Variable binding
#[derive(Debug, Clone)]
pub struct Binding {
    /// `None` until initialized
    pub value: Option<JsValue>,
    pub mutable: bool,
    pub deletable: bool,
    /// Assigning to this immutable binding throws even in sloppy code
    pub strict: bool,
}

/// Binding table of a declarative record
#[derive(Debug, Default)]
pub struct DeclarativeRecord {
    bindings: RefCell<FxHashMap<JsString, Binding>>,
}

impl DeclarativeRecord {
    fn has(&self, name: &str) -> bool {
        self.bindings.borrow().contains_key(name)
    }

    fn create(&self, name: &JsString, binding: Binding) -> JsResult<()> {
        let mut bindings = self.bindings.borrow_mut();
        if bindings.contains_key(name.as_str()) {
            return Err(FatalError::DuplicateBinding {
                name: name.to_string(),
            }
            .into());
        }
        bindings.insert(name.cheap_clone(), binding);
        Ok(())
    }
}

pub enum EnvironmentRecord {
    /// Block, function and global lexical bindings
    Declarative(DeclarativeRecord),
    /// Bindings backed by the properties of an object (global object, `with`)
    Object {
        object: JsObjectRef,
        /// Calls through this record pass the object as `this` (`with`)
        provide_this: bool,
    },
    /// A function scope with its own `this` and super binding
    Method {
        declarative: DeclarativeRecord,
        this_value: JsValue,
        home_object: Option<JsObjectRef>,
        method_name: Option<PropertyKey>,
    },
}

pub struct Environment {
    pub record: EnvironmentRecord,
    pub outer: Option<EnvRef>,
}

/// Shared handle to an environment
#[derive(Clone)]
pub struct EnvRef(Rc<Environment>);

impl CheapClone for EnvRef {}

impl fmt::Debug for EnvRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match &self.0.record {
            EnvironmentRecord::Declarative(_) => "declarative",
            EnvironmentRecord::Object { .. } => "object",
            EnvironmentRecord::Method { .. } => "method",
        };
        write!(f, "<{} environment>", kind)
    }
}

impl EnvRef {
    pub fn new_declarative(outer: Option<EnvRef>) -> Self {
        Self(Rc::new(Environment {
            record: EnvironmentRecord::Declarative(DeclarativeRecord::default()),
            outer,
        }))
    }

    pub fn new_object(object: JsObjectRef, provide_this: bool, outer: Option<EnvRef>) -> Self {
        Self(Rc::new(Environment {
            record: EnvironmentRecord::Object {
                object,
                provide_this,
            },
            outer,
        }))
    }

    pub fn new_method(
        this_value: JsValue,
        home_object: Option<JsObjectRef>,
        method_name: Option<PropertyKey>,
        outer: Option<EnvRef>,
    ) -> Self {
        Self(Rc::new(Environment {
            record: EnvironmentRecord::Method {
                declarative: DeclarativeRecord::default(),
                this_value,
                home_object,
                method_name,
            },
            outer,
        }))
    }

    pub fn outer(&self) -> Option<&EnvRef> {
        self.0.outer.as_ref()
    }

    pub fn record(&self) -> &EnvironmentRecord {
        &self.0.record
    }

    pub fn ptr_eq(&self, other: &EnvRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    fn declarative(&self) -> Option<&DeclarativeRecord> {
        match &self.0.record {
            EnvironmentRecord::Declarative(record)
            | EnvironmentRecord::Method {
                declarative: record,
                ..
            } => Some(record),
            EnvironmentRecord::Object { .. } => None,
        }
    }

    pub fn has_binding(&self, name: &JsString) -> bool {
        match &self.0.record {
            EnvironmentRecord::Object { object, .. } => object.has_property(&PropertyKey::from(name)),
            _ => self.declarative().is_some_and(|record| record.has(name.as_str())),
        }
    }

    /// CreateMutableBinding; the binding starts uninitialized
    pub fn create_mutable_binding(
        &self,
        realm: &Realm,
        name: &JsString,
        deletable: bool,
    ) -> JsResult<()> {
        match &self.0.record {
            EnvironmentRecord::Object { object, .. } => {
                let desc = PropertyDescriptor::data(JsValue::Undefined, true, true, deletable);
                object.define_property_or_throw(realm, PropertyKey::from(name), desc)
            }
            EnvironmentRecord::Declarative(record)
            | EnvironmentRecord::Method {
                declarative: record,
                ..
            } => record.create(
                name,
                Binding {
                    value: None,
                    mutable: true,
                    deletable,
                    strict: false,
                },
            ),
        }
    }

    /// CreateImmutableBinding; only declarative records hold these
    pub fn create_immutable_binding(&self, name: &JsString, strict: bool) -> JsResult<()> {
        let record = self.declarative().ok_or_else(|| {
            FatalError::Invariant(format!("immutable binding '{}' on an object record", name))
        })?;
        record.create(
            name,
            Binding {
                value: None,
                mutable: false,
                deletable: false,
                strict,
            },
        )
    }

    pub fn initialize_binding(&self, realm: &Realm, name: &JsString, value: JsValue) -> JsResult<()> {
        match &self.0.record {
            EnvironmentRecord::Object { object, .. } => {
                object.put(realm, PropertyKey::from(name), value, false)
            }
            _ => {
                let record = self.declarative().ok_or_else(|| {
                    FatalError::MissingBinding {
                        name: name.to_string(),
                    }
                })?;
                let mut bindings = record.bindings.borrow_mut();
                let binding = bindings.get_mut(name.as_str()).ok_or_else(|| {
                    FatalError::MissingBinding {
                        name: name.to_string(),
                    }
                })?;
                binding.value = Some(value);
                Ok(())
            }
        }
    }

    pub fn set_mutable_binding(
        &self,
        realm: &Realm,
        name: &JsString,
        value: JsValue,
        strict: bool,
    ) -> JsResult<()> {
        let record = match &self.0.record {
            EnvironmentRecord::Object { object, .. } => {
                return object.put(realm, PropertyKey::from(name), value, strict);
            }
            EnvironmentRecord::Declarative(record)
            | EnvironmentRecord::Method {
                declarative: record,
                ..
            } => record,
        };

        let mut bindings = record.bindings.borrow_mut();
        let binding = bindings
            .get_mut(name.as_str())
            .ok_or_else(|| FatalError::MissingBinding {
                name: name.to_string(),
            })?;

        if !binding.mutable {
            if binding.value.is_none() && strict {
                drop(bindings);
                return Err(realm.throw_reference_error(format!(
                    "Cannot access '{}' before initialization",
                    name
                )));
            }
            if binding.strict || strict {
                drop(bindings);
                return Err(realm.throw_type_error("Assignment to constant variable."));
            }
            return Ok(());
        }
        if binding.value.is_none() && strict {
            drop(bindings);
            return Err(realm.throw_reference_error(format!(
                "Cannot access '{}' before initialization",
                name
            )));
        }
        binding.value = Some(value);
        Ok(())
    }

    /// GetBindingValue; an uninitialized binding reads as undefined in sloppy code
    pub fn get_binding_value(&self, realm: &Realm, name: &JsString, strict: bool) -> JsResult<JsValue> {
        let record = match &self.0.record {
            EnvironmentRecord::Object { object, .. } => {
                let key = PropertyKey::from(name);
                if !object.has_property(&key) {
                    if strict {
                        return Err(realm.throw_reference_error(format!("{} is not defined", name)));
                    }
                    return Ok(JsValue::Undefined);
                }
                return object.get(realm, &key, &JsValue::Object(object.cheap_clone()));
            }
            EnvironmentRecord::Declarative(record)
            | EnvironmentRecord::Method {
                declarative: record,
                ..
            } => record,
        };

        let value = {
            let bindings = record.bindings.borrow();
            let binding = bindings
                .get(name.as_str())
                .ok_or_else(|| FatalError::MissingBinding {
                    name: name.to_string(),
                })?;
            binding.value.clone()
        };
        match value {
            Some(value) => Ok(value),
            None if strict => Err(realm.throw_reference_error(format!(
                "Cannot access '{}' before initialization",
                name
            ))),
            None => Ok(JsValue::Undefined),
        }
    }

    /// DeleteBinding; only deletable bindings go away
    pub fn delete_binding(&self, name: &JsString) -> bool {
        match &self.0.record {
            EnvironmentRecord::Object { object, .. } => object.delete(&PropertyKey::from(name)),
            _ => {
                let Some(record) = self.declarative() else {
                    return true;
                };
                let mut bindings = record.bindings.borrow_mut();
                match bindings.get(name.as_str()) {
                    None => true,
                    Some(binding) if binding.deletable => {
                        bindings.remove(name.as_str());
                        true
                    }
                    Some(_) => false,
                }
            }
        }
    }

    pub fn has_this_binding(&self) -> bool {
        matches!(self.0.record, EnvironmentRecord::Method { .. })
    }

    pub fn has_super_binding(&self) -> bool {
        matches!(
            &self.0.record,
            EnvironmentRecord::Method {
                home_object: Some(_),
                ..
            }
        )
    }

    pub fn this_binding(&self) -> Option<JsValue> {
        match &self.0.record {
            EnvironmentRecord::Method { this_value, .. } => Some(this_value.clone()),
            _ => None,
        }
    }

    pub fn home_object(&self) -> Option<JsObjectRef> {
        match &self.0.record {
            EnvironmentRecord::Method { home_object, .. } => home_object.clone(),
            _ => None,
        }
    }

    pub fn method_name(&self) -> Option<PropertyKey> {
        match &self.0.record {
            EnvironmentRecord::Method { method_name, .. } => method_name.clone(),
            _ => None,
        }
    }

    /// `this` for a call through an unqualified name found in this record
    pub fn implicit_this(&self) -> JsValue {
        match &self.0.record {
            EnvironmentRecord::Object {
                object,
                provide_this: true,
            } => JsValue::Object(object.cheap_clone()),
            _ => JsValue::Undefined,
        }
    }

    /// Nearest record, starting here, that binds `this`
    pub fn this_environment(&self) -> Option<EnvRef> {
        let mut env = Some(self);
        while let Some(current) = env {
            if current.has_this_binding() {
                return Some(current.cheap_clone());
            }
            env = current.outer();
        }
        None
    }

    /// Raw read used by mapped arguments objects
    pub(crate) fn binding_value(&self, name: &JsString) -> Option<JsValue> {
        let record = self.declarative()?;
        let bindings = record.bindings.borrow();
        bindings.get(name.as_str()).and_then(|b| b.value.clone())
    }

    /// Raw write used by mapped arguments objects
    pub(crate) fn write_binding(&self, name: &JsString, value: JsValue) {
        if let Some(record) = self.declarative()
            && let Some(binding) = record.bindings.borrow_mut().get_mut(name.as_str())
        {
            binding.value = Some(value);
        }
    }
}
