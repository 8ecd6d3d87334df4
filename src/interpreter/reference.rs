//! References
//!
//! The operand stack holds these between producing a name or member access
//! and consuming it with a read, write, call, `delete` or `typeof`.

use super::abstract_ops::{primitive_to_string, to_object};
use super::completion::JsResult;
use super::environment::EnvRef;
use super::realm::Realm;
use crate::value::{CheapClone, JsString, JsValue, PropertyKey};

#[derive(Debug, Clone)]
pub enum Reference {
    /// A name no enclosing environment binds
    Unresolvable { name: JsString, strict: bool },
    Environment {
        env: EnvRef,
        name: JsString,
        strict: bool,
    },
    Property {
        base: JsValue,
        key: PropertyKey,
        strict: bool,
        /// Receiver for `super` references; `base` otherwise
        this_value: Option<JsValue>,
    },
}

impl Reference {
    /// GetIdentifierReference: walk the environment chain outward
    pub fn resolve(env: &EnvRef, name: &JsString, strict: bool) -> Reference {
        let mut current = Some(env);
        while let Some(env) = current {
            if env.has_binding(name) {
                return Reference::Environment {
                    env: env.cheap_clone(),
                    name: name.cheap_clone(),
                    strict,
                };
            }
            current = env.outer();
        }
        Reference::Unresolvable {
            name: name.cheap_clone(),
            strict,
        }
    }

    /// Human readable name for error messages
    pub fn describe(&self) -> String {
        match self {
            Reference::Unresolvable { name, .. } | Reference::Environment { name, .. } => {
                name.to_string()
            }
            Reference::Property { base, key, .. } => match base {
                JsValue::Object(_) => key.to_string(),
                other => format!("{}.{}", primitive_to_string(other), key),
            },
        }
    }

    fn receiver(base: &JsValue, this_value: &Option<JsValue>) -> JsValue {
        this_value.clone().unwrap_or_else(|| base.clone())
    }

    /// GetValue
    pub fn get_value(&self, realm: &Realm) -> JsResult<JsValue> {
        match self {
            Reference::Unresolvable { name, .. } => {
                Err(realm.throw_reference_error(format!("{} is not defined", name)))
            }
            Reference::Environment { env, name, strict } => {
                env.get_binding_value(realm, name, *strict)
            }
            Reference::Property {
                base,
                key,
                this_value,
                ..
            } => {
                let receiver = Self::receiver(base, this_value);
                let object = to_object(realm, base)?;
                object.get(realm, key, &receiver)
            }
        }
    }

    /// PutValue
    pub fn put_value(&self, realm: &Realm, value: JsValue) -> JsResult<()> {
        match self {
            Reference::Unresolvable { name, strict } => {
                if *strict {
                    return Err(realm.throw_reference_error(format!("{} is not defined", name)));
                }
                realm
                    .global_object()
                    .put(realm, PropertyKey::from(name), value, false)
            }
            Reference::Environment { env, name, strict } => {
                env.set_mutable_binding(realm, name, value, *strict)
            }
            Reference::Property {
                base,
                key,
                strict,
                this_value,
            } => {
                let receiver = Self::receiver(base, this_value);
                let object = to_object(realm, base)?;
                if !object.set(realm, key.clone(), value, &receiver)? && *strict {
                    return Err(realm.throw_type_error(format!(
                        "Cannot assign to read only property '{}' of {}",
                        key,
                        if base.is_object() {
                            "object".to_string()
                        } else {
                            primitive_to_string(base).to_string()
                        }
                    )));
                }
                Ok(())
            }
        }
    }

    /// The `delete` operator
    pub fn delete(&self, realm: &Realm) -> JsResult<bool> {
        match self {
            Reference::Unresolvable { .. } => Ok(true),
            Reference::Environment { env, name, .. } => Ok(env.delete_binding(name)),
            Reference::Property {
                this_value: Some(_),
                ..
            } => Err(realm.throw_reference_error("Unsupported reference to 'super'")),
            Reference::Property {
                base, key, strict, ..
            } => {
                let object = to_object(realm, base)?;
                let deleted = object.delete(key);
                if !deleted && *strict {
                    return Err(realm.throw_type_error(format!(
                        "Cannot delete property '{}' of object",
                        key
                    )));
                }
                Ok(deleted)
            }
        }
    }

    /// `this` for a call made through this reference
    pub fn call_this(&self) -> JsValue {
        match self {
            Reference::Unresolvable { .. } => JsValue::Undefined,
            Reference::Environment { env, .. } => env.implicit_this(),
            Reference::Property {
                base, this_value, ..
            } => Self::receiver(base, this_value),
        }
    }

    /// `typeof` does not throw on unresolvable names
    pub fn is_unresolvable(&self) -> bool {
        matches!(self, Reference::Unresolvable { .. })
    }
}
