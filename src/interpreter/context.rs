//! Execution contexts and the dispatch loop
//!
//! One `ExecutionContext` runs one Code object to completion. Calls nest
//! contexts through ordinary Rust recursion (`Realm::call` -> `run`).

use std::rc::Rc;

use tracing::trace;

use super::abstract_ops::{binary_op, to_number, to_object, to_property_key, to_uint32, unary_op};
use super::completion::{Abrupt, JsResult};
use super::environment::EnvRef;
use super::function::{make_class_constructor, make_function, make_method};
use super::object::{ExoticObject, JsObject, JsObjectRef, Property, PropertyDescriptor};
use super::realm::Realm;
use super::reference::Reference;
use crate::ast::{MethodKind, UnaryOp};
use crate::compiler::{
    BindingKind, ClassMethod, Code, CodeRef, DeclarationKind, HandlerKind, LexicalDeclaration,
    MethodKey, Op,
};
use crate::error::FatalError;
use crate::value::{CheapClone, JsString, JsValue, PropertyKey};

/// Marker sitting on the stack while a finally block runs
#[derive(Debug, Clone)]
pub enum FinallyState {
    /// Entered by falling through the protected region
    Normal,
    /// Entered by the unwinder; rethrow at the end
    Throw(JsValue),
    /// Entered through `Jsr`; jump back at the end
    Subroutine(usize),
}

/// Snapshot of the keys a for-in loop still has to visit
#[derive(Debug, Clone)]
pub struct ForInIterator {
    object: Option<JsObjectRef>,
    keys: std::vec::IntoIter<PropertyKey>,
}

impl ForInIterator {
    /// Next key that is still present on the object
    fn next_key(&mut self) -> Option<PropertyKey> {
        let object = self.object.as_ref()?;
        self.keys.by_ref().find(|key| object.has_property(key))
    }
}

/// Operand stack entry
#[derive(Debug, Clone)]
pub enum StackItem {
    Value(JsValue),
    Reference(Reference),
    Iterator(ForInIterator),
    ArrayIndex(u32),
    Finally(FinallyState),
}

pub struct ExecutionContext<'r> {
    realm: &'r Realm,
    code: Rc<Code>,
    lexical_env: EnvRef,
    variable_env: EnvRef,
    stack: Vec<StackItem>,
    pc: usize,
    /// Completion value slot (`PopResult`/`ReturnResult`)
    result: JsValue,
    args: Vec<JsValue>,
}

impl<'r> ExecutionContext<'r> {
    pub fn new(
        realm: &'r Realm,
        code: Rc<Code>,
        lexical_env: EnvRef,
        variable_env: EnvRef,
        args: Vec<JsValue>,
    ) -> Self {
        Self {
            realm,
            code,
            lexical_env,
            variable_env,
            stack: Vec::new(),
            pc: 0,
            result: JsValue::Undefined,
            args,
        }
    }

    /// Run until the code returns or an exception escapes it
    pub fn run(&mut self) -> JsResult<JsValue> {
        let code = self.code.cheap_clone();
        loop {
            let pc = self.pc;
            let Some(op) = code.instructions.get(pc) else {
                return Err(FatalError::FellOffEnd {
                    name: code.display_name().to_string(),
                }
                .into());
            };
            trace!(pc, ?op, "dispatch");
            self.pc += 1;

            match self.step(op) {
                Ok(None) => {}
                Ok(Some(value)) => return Ok(value),
                Err(Abrupt::Throw(value)) => self.unwind(value)?,
                Err(fatal) => return Err(fatal),
            }
        }
    }

    /// Route a thrown value to the innermost handler around the faulting pc
    fn unwind(&mut self, value: JsValue) -> JsResult<()> {
        let fault = self.pc.saturating_sub(1);
        let code = self.code.cheap_clone();
        for handler in code.handlers.iter().filter(|h| h.contains(fault)) {
            trace!(fault, kind = ?handler.kind, "handler");
            match handler.kind {
                HandlerKind::Env => self.pop_env()?,
                HandlerKind::Catch | HandlerKind::Finally => {
                    self.stack.truncate(handler.stack_depth as usize);
                    self.stack.push(match handler.kind {
                        HandlerKind::Catch => StackItem::Value(value),
                        _ => StackItem::Finally(FinallyState::Throw(value)),
                    });
                    self.pc = handler.end as usize;
                    return Ok(());
                }
            }
        }
        Err(Abrupt::Throw(value))
    }

    // ═══════════════════════════════════════════════════════════════════════════════
    // Stack helpers
    // ═══════════════════════════════════════════════════════════════════════════════

    fn fault_pc(&self) -> usize {
        self.pc.saturating_sub(1)
    }

    fn push(&mut self, value: JsValue) {
        self.stack.push(StackItem::Value(value));
    }

    fn pop(&mut self) -> JsResult<StackItem> {
        let pc = self.fault_pc();
        self.stack
            .pop()
            .ok_or_else(|| FatalError::StackUnderflow { pc }.into())
    }

    /// Pop a value; a reference on top is read first
    fn pop_value(&mut self) -> JsResult<JsValue> {
        match self.pop()? {
            StackItem::Value(value) => Ok(value),
            StackItem::Reference(reference) => reference.get_value(self.realm),
            _ => Err(self.unexpected("value")),
        }
    }

    fn pop_reference(&mut self) -> JsResult<Reference> {
        match self.pop()? {
            StackItem::Reference(reference) => Ok(reference),
            StackItem::Value(_) => Err(self
                .realm
                .throw_reference_error("Invalid left-hand side in assignment")),
            _ => Err(self.unexpected("reference")),
        }
    }

    fn pop_index(&mut self) -> JsResult<u32> {
        match self.pop()? {
            StackItem::ArrayIndex(index) => Ok(index),
            _ => Err(self.unexpected("array index")),
        }
    }

    fn peek(&self) -> JsResult<&StackItem> {
        self.stack.last().ok_or_else(|| {
            FatalError::StackUnderflow {
                pc: self.fault_pc(),
            }
            .into()
        })
    }

    fn peek_value(&self) -> JsResult<JsValue> {
        match self.peek()? {
            StackItem::Value(value) => Ok(value.clone()),
            _ => Err(self.unexpected("value")),
        }
    }

    fn peek_object(&self) -> JsResult<JsObjectRef> {
        match self.peek()? {
            StackItem::Value(JsValue::Object(obj)) => Ok(obj.cheap_clone()),
            _ => Err(self.unexpected("object")),
        }
    }

    fn unexpected(&self, expected: &'static str) -> Abrupt {
        FatalError::UnexpectedStackItem {
            expected,
            pc: self.fault_pc(),
        }
        .into()
    }

    fn pop_args(&mut self, argc: u32) -> JsResult<Vec<JsValue>> {
        let argc = argc as usize;
        let split = self.stack.len().checked_sub(argc).ok_or_else(|| {
            FatalError::StackUnderflow {
                pc: self.fault_pc(),
            }
        })?;
        let mut args = Vec::with_capacity(argc);
        for item in self.stack.drain(split..) {
            match item {
                StackItem::Value(value) => args.push(value),
                _ => {
                    return Err(FatalError::UnexpectedStackItem {
                        expected: "argument value",
                        pc: self.pc.saturating_sub(1),
                    }
                    .into());
                }
            }
        }
        Ok(args)
    }

    fn pop_env(&mut self) -> JsResult<()> {
        let outer = self
            .lexical_env
            .outer()
            .cloned()
            .ok_or_else(|| FatalError::Invariant("popped the outermost environment".into()))?;
        self.lexical_env = outer;
        Ok(())
    }

    fn jump(&mut self, target: u32) -> Result<(), FatalError> {
        let target = target as usize;
        if target > self.code.instructions.len() {
            return Err(FatalError::InvalidJumpTarget {
                target,
                pc: self.fault_pc(),
            });
        }
        self.pc = target;
        Ok(())
    }

    fn code_of(&self, slot: &CodeRef) -> JsResult<Rc<Code>> {
        slot.get()
            .cloned()
            .ok_or_else(|| FatalError::Invariant("nested function was never compiled".into()).into())
    }

    // ═══════════════════════════════════════════════════════════════════════════════
    // Dispatch
    // ═══════════════════════════════════════════════════════════════════════════════

    /// Execute one instruction; `Some` carries the return value
    fn step(&mut self, op: &Op) -> JsResult<Option<JsValue>> {
        let realm = self.realm;
        let strict = self.code.strict;

        match op {
            // ───────────────────────────────────────────────────────────────────
            // Stack
            // ───────────────────────────────────────────────────────────────────
            Op::Undefined => self.push(JsValue::Undefined),

            Op::Literal { value } => self.push(value.clone()),

            Op::RegExp { pattern, flags } => {
                let regexp = realm.new_regexp(pattern.cheap_clone(), flags.cheap_clone());
                self.push(JsValue::Object(regexp));
            }

            Op::Pop => {
                self.pop()?;
            }

            Op::DupTop => {
                let top = self.peek()?.clone();
                self.stack.push(top);
            }

            Op::Rotate { n } => {
                let item = self.pop()?;
                let below = (*n as usize).saturating_sub(1);
                let at = self.stack.len().checked_sub(below).ok_or_else(|| {
                    FatalError::StackUnderflow {
                        pc: self.fault_pc(),
                    }
                })?;
                self.stack.insert(at, item);
            }

            // ───────────────────────────────────────────────────────────────────
            // References
            // ───────────────────────────────────────────────────────────────────
            Op::Resolve { name } => {
                let reference = Reference::resolve(&self.lexical_env, name, strict);
                self.stack.push(StackItem::Reference(reference));
            }

            Op::This => {
                let this = self.this_value();
                self.push(this);
            }

            Op::Property { name } => {
                let base = self.pop_value()?;
                self.push_property(base, PropertyKey::from(name))?;
            }

            Op::Element => {
                let key = self.pop_value()?;
                let base = self.pop_value()?;
                if base.is_null_or_undefined() {
                    return Err(self.null_access_element(&base, &key));
                }
                let key = to_property_key(realm, &key)?;
                self.push_property(base, key)?;
            }

            Op::PropertySuper { name } => {
                let reference = self.super_reference(PropertyKey::from(name))?;
                self.stack.push(StackItem::Reference(reference));
            }

            Op::ElementSuper => {
                let key = self.pop_value()?;
                let key = to_property_key(realm, &key)?;
                let reference = self.super_reference(key)?;
                self.stack.push(StackItem::Reference(reference));
            }

            Op::CallSuperSetup => {
                let name = self
                    .lexical_env
                    .this_environment()
                    .and_then(|env| env.method_name())
                    .ok_or_else(|| realm.throw_syntax_error("'super' keyword unexpected here"))?;
                let reference = self.super_reference(name)?;
                self.stack.push(StackItem::Reference(reference));
            }

            Op::GetValue => {
                if let Some(StackItem::Reference(_)) = self.stack.last() {
                    let value = self.pop_value()?;
                    self.push(value);
                }
            }

            Op::PutValue => {
                let value = self.pop_value()?;
                let reference = self.pop_reference()?;
                reference.put_value(realm, value.clone())?;
                self.push(value);
            }

            Op::CheckObjectCoercible => {
                let value = self.peek_value()?;
                if value.is_null_or_undefined() {
                    return Err(realm.throw_type_error(format!(
                        "Cannot destructure '{:?}' as it is {}",
                        value,
                        value.type_of()
                    )));
                }
            }

            // ───────────────────────────────────────────────────────────────────
            // Operators
            // ───────────────────────────────────────────────────────────────────
            Op::Unary { op } => {
                let operand = self.pop()?;
                let result = match (op, operand) {
                    (UnaryOp::Typeof, StackItem::Reference(reference))
                        if reference.is_unresolvable() =>
                    {
                        JsValue::from("undefined")
                    }
                    (UnaryOp::Delete, StackItem::Reference(reference)) => {
                        JsValue::Boolean(reference.delete(realm)?)
                    }
                    (op, StackItem::Reference(reference)) => {
                        let value = reference.get_value(realm)?;
                        unary_op(realm, *op, &value)?
                    }
                    (op, StackItem::Value(value)) => unary_op(realm, *op, &value)?,
                    _ => return Err(self.unexpected("operand")),
                };
                self.push(result);
            }

            Op::Binary { op } => {
                let right = self.pop_value()?;
                let left = self.pop_value()?;
                let result = binary_op(realm, *op, &left, &right)?;
                self.push(result);
            }

            Op::Update { prefix, increment } => {
                let reference = self.pop_reference()?;
                let old = to_number(realm, &reference.get_value(realm)?)?;
                let new = if *increment { old + 1.0 } else { old - 1.0 };
                reference.put_value(realm, JsValue::Number(new))?;
                self.push(JsValue::Number(if *prefix { new } else { old }));
            }

            // ───────────────────────────────────────────────────────────────────
            // Control flow
            // ───────────────────────────────────────────────────────────────────
            Op::Jump { target } => self.jump(*target)?,

            Op::PopJump { test, target } => {
                if self.pop_value()?.to_boolean() == *test {
                    self.jump(*target)?;
                }
            }

            Op::JumpPop { test, target } => {
                if self.peek_value()?.to_boolean() == *test {
                    self.jump(*target)?;
                } else {
                    self.pop()?;
                }
            }

            Op::SwitchCase { target } => {
                let case = self.pop_value()?;
                let discriminant = self.peek_value()?;
                if discriminant.strict_equals(&case) {
                    self.pop()?;
                    self.jump(*target)?;
                }
            }

            Op::SwitchDefault { target } => {
                self.pop()?;
                self.jump(*target)?;
            }

            Op::Throw => {
                let value = self.pop_value()?;
                return Err(Abrupt::Throw(value));
            }

            Op::Jsr { target } => {
                self.stack
                    .push(StackItem::Finally(FinallyState::Subroutine(self.pc)));
                self.jump(*target)?;
            }

            Op::EnterFinally => {
                self.stack.push(StackItem::Finally(FinallyState::Normal));
            }

            Op::EndFinally => match self.pop()? {
                StackItem::Finally(FinallyState::Normal) => {}
                StackItem::Finally(FinallyState::Throw(value)) => {
                    return Err(Abrupt::Throw(value));
                }
                StackItem::Finally(FinallyState::Subroutine(pc)) => self.pc = pc,
                _ => return Err(self.unexpected("finally marker")),
            },

            Op::Return => {
                let value = self.pop_value()?;
                return Ok(Some(value));
            }

            Op::PopResult => {
                self.result = self.pop_value()?;
            }

            Op::ReturnResult => return Ok(Some(self.result.clone())),

            Op::Debugger => {
                trace!(pc = self.fault_pc(), "debugger statement");
            }

            // ───────────────────────────────────────────────────────────────────
            // Scopes
            // ───────────────────────────────────────────────────────────────────
            Op::BlockSetup {
                declarations,
                functions,
            } => self.block_setup(declarations, functions)?,

            Op::WithSetup => {
                let value = self.pop_value()?;
                let object = to_object(realm, &value)?;
                self.lexical_env =
                    EnvRef::new_object(object, true, Some(self.lexical_env.cheap_clone()));
            }

            Op::PopEnv => self.pop_env()?,

            Op::InitBinding { name, kind } => {
                let value = self.pop_value()?;
                let env = match kind {
                    BindingKind::Var => &self.variable_env,
                    BindingKind::Lexical => &self.lexical_env,
                };
                env.initialize_binding(realm, name, value)?;
            }

            // ───────────────────────────────────────────────────────────────────
            // Functions & calls
            // ───────────────────────────────────────────────────────────────────
            Op::BuildFunction { code, name } => {
                let code = self.code_of(code)?;
                let function = match name {
                    Some(name) => {
                        let scope = EnvRef::new_declarative(Some(self.lexical_env.cheap_clone()));
                        scope.create_immutable_binding(name, false)?;
                        let function = make_function(realm, code, scope.cheap_clone());
                        scope.initialize_binding(realm, name, JsValue::Object(function.cheap_clone()))?;
                        function
                    }
                    None => make_function(realm, code, self.lexical_env.cheap_clone()),
                };
                self.push(JsValue::Object(function));
            }

            Op::ClassDefinition {
                name,
                display_name,
                constructor,
                methods,
                has_super,
            } => {
                let class = self.class_definition(
                    name.as_ref(),
                    display_name.as_ref(),
                    constructor.as_ref(),
                    methods,
                    *has_super,
                )?;
                self.push(JsValue::Object(class));
            }

            Op::Call { argc } => {
                let args = self.pop_args(*argc)?;
                let callee = self.pop_value()?;
                let (this, description) = match self.pop()? {
                    StackItem::Reference(reference) => (reference.call_this(), reference.describe()),
                    StackItem::Value(value) => (JsValue::Undefined, format!("{:?}", value)),
                    _ => return Err(self.unexpected("callee")),
                };
                let JsValue::Object(function) = callee else {
                    return Err(realm.throw_type_error(format!("{} is not a function", description)));
                };
                if !function.is_callable() {
                    return Err(realm.throw_type_error(format!("{} is not a function", description)));
                }
                let result = realm.call(&function, &this, &args)?;
                self.push(result);
            }

            Op::Construct { argc } => {
                let args = self.pop_args(*argc)?;
                let callee = self.pop_value()?;
                match &callee {
                    JsValue::Object(ctor) if ctor.is_constructor() => {
                        let result = realm.construct(ctor, &args)?;
                        self.push(result);
                    }
                    other => {
                        return Err(realm.throw_type_error(format!("{:?} is not a constructor", other)));
                    }
                }
            }

            Op::LoadArgument { index } => {
                let value = self.args.get(*index as usize).cloned().unwrap_or_default();
                self.push(value);
            }

            Op::RestArguments { from } => {
                let rest = self.args.iter().skip(*from as usize).cloned().collect();
                let array = realm.new_array(rest);
                self.push(JsValue::Object(array));
            }

            // ───────────────────────────────────────────────────────────────────
            // Object & array literals
            // ───────────────────────────────────────────────────────────────────
            Op::ObjectSetup => {
                let object = realm.new_object();
                self.push(JsValue::Object(object));
            }

            Op::ObjectDefine { name } => {
                let value = self.pop_value()?;
                let object = self.peek_object()?;
                object.define_own_property(
                    realm,
                    PropertyKey::from(name),
                    PropertyDescriptor::data(value, true, true, true),
                )?;
            }

            Op::ObjectDefineComputed => {
                let value = self.pop_value()?;
                let key = self.pop_value()?;
                let key = to_property_key(realm, &key)?;
                let object = self.peek_object()?;
                object.define_own_property(realm, key, PropertyDescriptor::data(value, true, true, true))?;
            }

            Op::ObjectDefineMethod { kind, key, code } => {
                let key = match key {
                    MethodKey::Static(name) => PropertyKey::from(name),
                    MethodKey::Computed => {
                        let key = self.pop_value()?;
                        to_property_key(realm, &key)?
                    }
                };
                let object = self.peek_object()?;
                let code = self.code_of(code)?;
                self.define_method(&object, key, *kind, code, true)?;
            }

            Op::ArraySetup => {
                let array = realm.new_array(Vec::new());
                self.push(JsValue::Object(array));
                self.stack.push(StackItem::ArrayIndex(0));
            }

            Op::ArrayDefine => {
                let value = self.pop_value()?;
                let index = self.pop_index()?;
                let array = self.peek_object()?;
                array.define_own_property(
                    realm,
                    PropertyKey::from(index),
                    PropertyDescriptor::data(value, true, true, true),
                )?;
                self.stack.push(StackItem::ArrayIndex(index.saturating_add(1)));
            }

            Op::ArrayHole => {
                let index = self.pop_index()?;
                self.stack.push(StackItem::ArrayIndex(index.saturating_add(1)));
            }

            Op::ArrayCleanup => {
                let length = self.pop_index()?;
                let array = self.peek_object()?;
                array.define_own_property(
                    realm,
                    PropertyKey::from("length"),
                    PropertyDescriptor::value_only(JsValue::from(length)),
                )?;
            }

            Op::ArraySlice { from } => {
                let value = self.pop_value()?;
                let source = to_object(realm, &value)?;
                let receiver = JsValue::Object(source.cheap_clone());
                let length = to_uint32(
                    realm,
                    &source.get(realm, &PropertyKey::from("length"), &receiver)?,
                )?;
                let mut elements = Vec::new();
                for index in *from..length {
                    elements.push(source.get(realm, &PropertyKey::from(index), &receiver)?);
                }
                let array = realm.new_array(elements);
                self.push(JsValue::Object(array));
            }

            // ───────────────────────────────────────────────────────────────────
            // Iteration
            // ───────────────────────────────────────────────────────────────────
            Op::ForInSetup => {
                let value = self.pop_value()?;
                let iterator = if value.is_null_or_undefined() {
                    ForInIterator {
                        object: None,
                        keys: Vec::new().into_iter(),
                    }
                } else {
                    let object = to_object(realm, &value)?;
                    let keys = object.enumerate(true, true);
                    ForInIterator {
                        object: Some(object),
                        keys: keys.into_iter(),
                    }
                };
                self.stack.push(StackItem::Iterator(iterator));
            }

            Op::ForInNext { exit } => {
                let next = match self.stack.last_mut() {
                    Some(StackItem::Iterator(iterator)) => iterator.next_key(),
                    _ => return Err(self.unexpected("for-in iterator")),
                };
                match next {
                    Some(key) => self.push(JsValue::String(key.to_js_string())),
                    None => self.jump(*exit)?,
                }
            }
        }
        Ok(None)
    }

    // ═══════════════════════════════════════════════════════════════════════════════
    // Instruction helpers
    // ═══════════════════════════════════════════════════════════════════════════════

    /// `this` of the running code: the nearest this-binding, else the global object
    fn this_value(&self) -> JsValue {
        self.lexical_env
            .this_environment()
            .and_then(|env| env.this_binding())
            .unwrap_or_else(|| JsValue::Object(self.realm.global_object().cheap_clone()))
    }

    fn null_access(&self, base: &JsValue, key: &PropertyKey) -> Abrupt {
        self.realm.throw_type_error(format!(
            "Cannot read properties of {:?} (reading '{}')",
            base, key
        ))
    }

    /// Null access through a computed key; object keys are not converted
    fn null_access_element(&self, base: &JsValue, key: &JsValue) -> Abrupt {
        if key.is_object() {
            return self
                .realm
                .throw_type_error(format!("Cannot read properties of {:?}", base));
        }
        match to_property_key(self.realm, key) {
            Ok(key) => self.null_access(base, &key),
            Err(abrupt) => abrupt,
        }
    }

    fn push_property(&mut self, base: JsValue, key: PropertyKey) -> JsResult<()> {
        if base.is_null_or_undefined() {
            return Err(self.null_access(&base, &key));
        }
        self.stack.push(StackItem::Reference(Reference::Property {
            base,
            key,
            strict: self.code.strict,
            this_value: None,
        }));
        Ok(())
    }

    /// Reference into the home object's prototype with the current `this`
    fn super_reference(&self, key: PropertyKey) -> JsResult<Reference> {
        let env = self.lexical_env.this_environment();
        let home = env.as_ref().and_then(EnvRef::home_object).ok_or_else(|| {
            self.realm
                .throw_syntax_error("'super' keyword unexpected here")
        })?;
        let this = env.and_then(|env| env.this_binding()).unwrap_or_default();
        let base = match home.prototype() {
            Some(parent) => JsValue::Object(parent),
            None => JsValue::Null,
        };
        Ok(Reference::Property {
            base,
            key,
            strict: true,
            this_value: Some(this),
        })
    }

    fn block_setup(
        &mut self,
        declarations: &[LexicalDeclaration],
        functions: &[CodeRef],
    ) -> JsResult<()> {
        let realm = self.realm;
        let env = EnvRef::new_declarative(Some(self.lexical_env.cheap_clone()));
        for decl in declarations {
            for name in &decl.names {
                match decl.kind {
                    DeclarationKind::Const => env.create_immutable_binding(name, true)?,
                    _ => env.create_mutable_binding(realm, name, false)?,
                }
            }
        }
        for slot in functions {
            let code = self.code_of(slot)?;
            let name = code
                .name
                .clone()
                .ok_or_else(|| FatalError::Invariant("block function without a name".into()))?;
            let function = make_function(realm, code, env.cheap_clone());
            env.initialize_binding(realm, &name, JsValue::Object(function))?;
        }
        self.lexical_env = env;
        Ok(())
    }

    /// Define a method or accessor; `home` is where `super` lookups start from
    fn define_method(
        &self,
        home: &JsObjectRef,
        key: PropertyKey,
        kind: MethodKind,
        code: Rc<Code>,
        enumerable: bool,
    ) -> JsResult<()> {
        let realm = self.realm;
        let function = make_method(
            realm,
            code,
            self.lexical_env.cheap_clone(),
            home.cheap_clone(),
            key.clone(),
        );
        let desc = match kind {
            MethodKind::Method => {
                PropertyDescriptor::data(JsValue::Object(function), true, enumerable, true)
            }
            MethodKind::Get => PropertyDescriptor {
                get: Some(Some(function)),
                enumerable: Some(enumerable),
                configurable: Some(true),
                ..PropertyDescriptor::default()
            },
            MethodKind::Set => PropertyDescriptor {
                set: Some(Some(function)),
                enumerable: Some(enumerable),
                configurable: Some(true),
                ..PropertyDescriptor::default()
            },
        };
        home.define_property_or_throw(realm, key, desc)
    }

    /// Build a class from the superclass and computed keys on the stack
    fn class_definition(
        &mut self,
        name: Option<&JsString>,
        display_name: Option<&JsString>,
        constructor: Option<&CodeRef>,
        methods: &[ClassMethod],
        has_super: bool,
    ) -> JsResult<JsObjectRef> {
        let realm = self.realm;
        let intrinsics = realm.intrinsics();

        let computed = methods
            .iter()
            .filter(|m| m.key == MethodKey::Computed)
            .count();
        let split = self.stack.len().checked_sub(computed).ok_or_else(|| {
            FatalError::StackUnderflow {
                pc: self.fault_pc(),
            }
        })?;
        let raw_keys: Vec<StackItem> = self.stack.drain(split..).collect();
        let mut computed_keys = Vec::with_capacity(raw_keys.len());
        for item in raw_keys {
            match item {
                StackItem::Value(value) => computed_keys.push(to_property_key(realm, &value)?),
                _ => return Err(self.unexpected("method key")),
            }
        }

        let (proto_parent, ctor_parent) = if has_super {
            match self.pop_value()? {
                JsValue::Null => (None, intrinsics.function_prototype.cheap_clone()),
                JsValue::Object(parent) if parent.is_constructor() => {
                    let proto = parent.get(
                        realm,
                        &PropertyKey::from("prototype"),
                        &JsValue::Object(parent.cheap_clone()),
                    )?;
                    let proto = match proto {
                        JsValue::Object(proto) => Some(proto),
                        JsValue::Null => None,
                        _ => {
                            return Err(realm.throw_type_error(
                                "Class extends value does not have valid prototype property",
                            ));
                        }
                    };
                    (proto, parent)
                }
                JsValue::Object(parent) => (Some(parent), intrinsics.function_prototype.cheap_clone()),
                other => {
                    return Err(realm.throw_type_error(format!(
                        "Class extends value {:?} is not a constructor or null",
                        other
                    )));
                }
            }
        } else {
            (
                Some(intrinsics.object_prototype.cheap_clone()),
                intrinsics.function_prototype.cheap_clone(),
            )
        };

        let proto = JsObjectRef::new(JsObject::new(proto_parent, ExoticObject::Ordinary));

        // Methods see the class name through their own scope
        let outer = self.lexical_env.cheap_clone();
        if let Some(name) = name {
            let scope = EnvRef::new_declarative(Some(outer.cheap_clone()));
            scope.create_immutable_binding(name, true)?;
            self.lexical_env = scope;
        }
        let result = self.install_class(
            display_name,
            constructor,
            methods,
            computed_keys,
            &proto,
            ctor_parent,
            has_super,
        );
        let scope = std::mem::replace(&mut self.lexical_env, outer);
        let ctor = result?;
        if let Some(name) = name {
            scope.initialize_binding(realm, name, JsValue::Object(ctor.cheap_clone()))?;
        }
        Ok(ctor)
    }

    #[allow(clippy::too_many_arguments)]
    fn install_class(
        &self,
        display_name: Option<&JsString>,
        constructor: Option<&CodeRef>,
        methods: &[ClassMethod],
        computed_keys: Vec<PropertyKey>,
        proto: &JsObjectRef,
        ctor_parent: JsObjectRef,
        has_super: bool,
    ) -> JsResult<JsObjectRef> {
        let realm = self.realm;
        let scope = self.lexical_env.cheap_clone();
        let ctor = match constructor {
            Some(slot) => {
                let code = self.code_of(slot)?;
                make_class_constructor(realm, code, scope, proto.cheap_clone(), ctor_parent, false)
            }
            None => {
                let code = realm.intrinsics().default_constructor.cheap_clone();
                let ctor = make_class_constructor(
                    realm,
                    code,
                    scope,
                    proto.cheap_clone(),
                    ctor_parent,
                    has_super,
                );
                let display = display_name.cloned().unwrap_or_else(|| JsString::from(""));
                ctor.insert_property(
                    "name",
                    Property::with_attributes(JsValue::String(display), false, false, true),
                );
                ctor
            }
        };

        ctor.insert_property(
            "prototype",
            Property::with_attributes(JsValue::Object(proto.cheap_clone()), false, false, false),
        );
        proto.insert_property(
            "constructor",
            Property::with_attributes(JsValue::Object(ctor.cheap_clone()), false, false, false),
        );

        let mut computed_keys = computed_keys.into_iter();
        for method in methods {
            let key = match &method.key {
                MethodKey::Static(name) => PropertyKey::from(name),
                MethodKey::Computed => computed_keys
                    .next()
                    .ok_or_else(|| FatalError::Invariant("missing computed method key".into()))?,
            };
            let home = if method.is_static { &ctor } else { proto };
            let code = self.code_of(&method.code)?;
            self.define_method(home, key, method.kind, code, false)?;
        }
        Ok(ctor)
    }
}
