//! Expression compilation
//!
//! `compile_expression` may leave a reference on the stack (identifiers and
//! member accesses); `compile_value` always leaves a value.

use super::Compiler;
use super::bytecode::{ClassMethod, MethodKey, Op};
use crate::ast::{
    ArrayExpression, AssignmentExpression, AssignmentTarget, Class,
    ConditionalExpression, Expression, Function, LiteralValue, LogicalExpression, LogicalOp,
    MemberProperty, MethodKind, ObjectExpression, PropertyName, PropertyValue, UpdateOp,
};
use crate::error::JsError;
use crate::value::{CheapClone, JsString, JsValue};

impl<'a> Compiler<'a> {
    /// Compile an expression to a value
    pub(super) fn compile_value(&mut self, expr: &'a Expression) -> Result<(), JsError> {
        self.compile_expression(expr)?;
        if produces_reference(expr) {
            self.builder.emit(Op::GetValue);
        }
        Ok(())
    }

    /// Compile a value that is about to be bound to `name`; anonymous
    /// functions and classes take it as their name
    pub(super) fn compile_named_value(
        &mut self,
        expr: &'a Expression,
        name: &JsString,
    ) -> Result<(), JsError> {
        match expr {
            Expression::Function(func) if func.id.is_none() => {
                self.compile_function_expression(func, Some(name))
            }
            Expression::ArrowFunction(func) => self.compile_arrow(func, Some(name)),
            Expression::Class(class) if class.id.is_none() => self.compile_class(class, Some(name)),
            _ => self.compile_value(expr),
        }
    }

    /// Compile an expression, leaving a reference or a value
    pub(super) fn compile_expression(&mut self, expr: &'a Expression) -> Result<(), JsError> {
        match expr {
            Expression::Literal(lit) => {
                let value = match &lit.value {
                    LiteralValue::Null => JsValue::Null,
                    LiteralValue::Boolean(b) => JsValue::Boolean(*b),
                    LiteralValue::Number(n) => JsValue::Number(*n),
                    LiteralValue::String(s) => JsValue::String(s.cheap_clone()),
                    LiteralValue::RegExp { pattern, flags } => {
                        self.builder.emit(Op::RegExp {
                            pattern: JsString::from(pattern.as_str()),
                            flags: JsString::from(flags.as_str()),
                        });
                        return Ok(());
                    }
                };
                self.builder.emit(Op::Literal { value });
                Ok(())
            }

            Expression::Array(arr) => self.compile_array(arr),

            Expression::Object(obj) => self.compile_object(obj),

            Expression::Function(func) => self.compile_function_expression(func, None),

            Expression::ArrowFunction(func) => self.compile_arrow(func, None),

            Expression::Class(class) => self.compile_class(class, None),

            Expression::Identifier(id) => {
                self.builder.emit(Op::Resolve {
                    name: id.name.cheap_clone(),
                });
                Ok(())
            }

            Expression::This(_) => {
                self.builder.emit(Op::This);
                Ok(())
            }

            Expression::Unary(unary) => {
                // typeof and delete look at the reference itself
                self.compile_expression(&unary.argument)?;
                self.builder.emit(Op::Unary { op: unary.operator });
                Ok(())
            }

            Expression::Binary(binary) => {
                self.compile_value(&binary.left)?;
                self.compile_value(&binary.right)?;
                self.builder.emit(Op::Binary {
                    op: binary.operator,
                });
                Ok(())
            }

            Expression::Logical(logical) => self.compile_logical(logical),

            Expression::Conditional(cond) => self.compile_conditional(cond),

            Expression::Assignment(assign) => self.compile_assignment(assign),

            Expression::Update(update) => {
                self.compile_expression(&update.argument)?;
                self.builder.emit(Op::Update {
                    prefix: update.prefix,
                    increment: update.operator == UpdateOp::Increment,
                });
                Ok(())
            }

            Expression::Sequence(seq) => {
                let last = seq.expressions.len().saturating_sub(1);
                for (i, expr) in seq.expressions.iter().enumerate() {
                    self.compile_value(expr)?;
                    if i != last {
                        self.builder.emit(Op::Pop);
                    }
                }
                Ok(())
            }

            Expression::Member(member) => {
                self.compile_value(&member.object)?;
                match &member.property {
                    MemberProperty::Identifier(id) => {
                        self.builder.emit(Op::Property {
                            name: id.name.cheap_clone(),
                        });
                    }
                    MemberProperty::Expression(key) => {
                        self.compile_value(key)?;
                        self.builder.emit(Op::Element);
                    }
                }
                Ok(())
            }

            Expression::SuperMember(member) => {
                match &member.property {
                    MemberProperty::Identifier(id) => {
                        self.builder.emit(Op::PropertySuper {
                            name: id.name.cheap_clone(),
                        });
                    }
                    MemberProperty::Expression(key) => {
                        self.compile_value(key)?;
                        self.builder.emit(Op::ElementSuper);
                    }
                }
                Ok(())
            }

            Expression::Call(call) => {
                // The reference stays below the fetched function so the call
                // can take its base as `this`
                self.compile_expression(&call.callee)?;
                self.builder.emit(Op::DupTop);
                self.builder.emit(Op::GetValue);
                let argc = self.compile_arguments(&call.arguments)?;
                self.builder.emit(Op::Call { argc });
                Ok(())
            }

            Expression::SuperCall(call) => {
                self.builder.emit(Op::CallSuperSetup);
                self.builder.emit(Op::DupTop);
                self.builder.emit(Op::GetValue);
                let argc = self.compile_arguments(&call.arguments)?;
                self.builder.emit(Op::Call { argc });
                Ok(())
            }

            Expression::New(new) => {
                self.compile_value(&new.callee)?;
                let argc = self.compile_arguments(&new.arguments)?;
                self.builder.emit(Op::Construct { argc });
                Ok(())
            }

            Expression::Parenthesized(inner, _) => self.compile_expression(inner),
        }
    }

    /// Compile call arguments left to right
    fn compile_arguments(&mut self, arguments: &'a [Expression]) -> Result<u32, JsError> {
        for arg in arguments {
            self.compile_value(arg)?;
        }
        u32::try_from(arguments.len()).map_err(|_| JsError::internal_error("too many arguments"))
    }

    /// Compile a logical expression (with short-circuit evaluation)
    fn compile_logical(&mut self, logical: &'a LogicalExpression) -> Result<(), JsError> {
        self.compile_value(&logical.left)?;
        let end = self.builder.emit_jump(Op::JumpPop {
            test: logical.operator == LogicalOp::Or,
            target: 0,
        });
        self.compile_value(&logical.right)?;
        self.builder.patch_jump(end)
    }

    /// Compile a conditional (ternary) expression
    fn compile_conditional(&mut self, cond: &'a ConditionalExpression) -> Result<(), JsError> {
        self.compile_value(&cond.test)?;
        let else_jump = self.builder.emit_jump(Op::PopJump {
            test: false,
            target: 0,
        });
        self.compile_value(&cond.consequent)?;
        let end_jump = self.builder.emit_jump(Op::Jump { target: 0 });
        self.builder.patch_jump(else_jump)?;
        self.compile_value(&cond.alternate)?;
        self.builder.patch_jump(end_jump)
    }

    /// Compile an assignment expression
    fn compile_assignment(&mut self, assign: &'a AssignmentExpression) -> Result<(), JsError> {
        match (&assign.left, assign.operator.binary_op()) {
            (AssignmentTarget::Simple(target), None) => {
                self.compile_expression(target)?;
                match target.unparenthesized() {
                    Expression::Identifier(id) => self.compile_named_value(&assign.right, &id.name)?,
                    _ => self.compile_value(&assign.right)?,
                }
                self.builder.emit(Op::PutValue);
            }
            (AssignmentTarget::Simple(target), Some(op)) => {
                self.compile_expression(target)?;
                self.builder.emit(Op::DupTop);
                self.builder.emit(Op::GetValue);
                self.compile_value(&assign.right)?;
                self.builder.emit(Op::Binary { op });
                self.builder.emit(Op::PutValue);
            }
            (AssignmentTarget::Pattern(pattern), None) => {
                // The assignment's own value is the right-hand side
                self.compile_value(&assign.right)?;
                self.builder.emit(Op::DupTop);
                self.compile_binding(pattern, super::compile_pattern::BindingMode::Assign)?;
            }
            (AssignmentTarget::Pattern(pattern), Some(_)) => {
                let span = pattern.span();
                return Err(JsError::syntax_error(
                    "Invalid left-hand side in assignment",
                    span.line,
                    span.column,
                ));
            }
        }
        Ok(())
    }

    /// Compile an array expression
    fn compile_array(&mut self, arr: &'a ArrayExpression) -> Result<(), JsError> {
        if let Some(spread) = &arr.spread {
            let span = spread.span();
            return Err(JsError::syntax_error(
                "Spread elements are not supported",
                span.line,
                span.column,
            ));
        }

        self.builder.emit(Op::ArraySetup);
        for element in &arr.elements {
            match element {
                Some(expr) => {
                    self.compile_value(expr)?;
                    self.builder.emit(Op::ArrayDefine);
                }
                None => {
                    self.builder.emit(Op::ArrayHole);
                }
            }
        }
        self.builder.emit(Op::ArrayCleanup);
        Ok(())
    }

    /// Compile an object expression
    fn compile_object(&mut self, obj: &'a ObjectExpression) -> Result<(), JsError> {
        self.builder.emit(Op::ObjectSetup);
        for prop in &obj.properties {
            self.builder.set_span(prop.span);
            let (kind, func) = match &prop.value {
                PropertyValue::Init(value) => {
                    match prop.key.static_name() {
                        Some(name) => {
                            self.compile_named_value(value, &name)?;
                            self.builder.emit(Op::ObjectDefine { name });
                        }
                        None => {
                            self.compile_property_key(&prop.key)?;
                            self.compile_value(value)?;
                            self.builder.emit(Op::ObjectDefineComputed);
                        }
                    }
                    continue;
                }
                PropertyValue::Method(func) => (MethodKind::Method, func),
                PropertyValue::Get(func) => (MethodKind::Get, func),
                PropertyValue::Set(func) => (MethodKind::Set, func),
            };

            let key = self.compile_method_key(&prop.key)?;
            let code = self.register_function(func, method_name(&prop.key, kind));
            self.builder.emit(Op::ObjectDefineMethod { kind, key, code });
        }
        Ok(())
    }

    fn compile_property_key(&mut self, key: &'a PropertyName) -> Result<(), JsError> {
        match key {
            PropertyName::Computed(expr) => self.compile_value(expr),
            other => {
                let name = other
                    .static_name()
                    .ok_or_else(|| JsError::internal_error("property key without a name"))?;
                self.builder.emit(Op::Literal {
                    value: JsValue::String(name),
                });
                Ok(())
            }
        }
    }

    /// Static keys are carried by the instruction; computed ones are pushed
    fn compile_method_key(&mut self, key: &'a PropertyName) -> Result<MethodKey, JsError> {
        match key.static_name() {
            Some(name) => Ok(MethodKey::Static(name)),
            None => {
                self.compile_property_key(key)?;
                Ok(MethodKey::Computed)
            }
        }
    }

    /// Compile a function expression
    fn compile_function_expression(
        &mut self,
        func: &'a Function,
        hint: Option<&JsString>,
    ) -> Result<(), JsError> {
        let own_name = func.id.as_ref().map(|id| id.name.cheap_clone());
        let name = own_name.clone().or_else(|| hint.cloned());
        let code = self.register_function(func, name);
        self.builder.emit(Op::BuildFunction {
            code,
            name: own_name,
        });
        Ok(())
    }

    /// Compile an arrow function
    fn compile_arrow(&mut self, func: &'a Function, hint: Option<&JsString>) -> Result<(), JsError> {
        let code = self.register_function(func, hint.cloned());
        self.builder.emit(Op::BuildFunction { code, name: None });
        Ok(())
    }

    /// Compile a class expression or declaration, leaving the constructor
    ///
    /// The superclass is evaluated first, then computed member keys in
    /// source order; `ClassDefinition` consumes them all.
    pub(super) fn compile_class(
        &mut self,
        class: &'a Class,
        hint: Option<&JsString>,
    ) -> Result<(), JsError> {
        self.builder.set_span(class.span);
        let own_name = class.id.as_ref().map(|id| id.name.cheap_clone());
        let display_name = own_name.clone().or_else(|| hint.cloned());

        if let Some(super_class) = &class.super_class {
            self.compile_value(super_class)?;
        }

        let mut methods = Vec::with_capacity(class.members.len());
        for member in &class.members {
            let key = self.compile_method_key(&member.key)?;
            let code = self.register_function(&member.function, method_name(&member.key, member.kind));
            methods.push(ClassMethod {
                key,
                kind: member.kind,
                is_static: member.is_static,
                code,
            });
        }

        let constructor = class
            .constructor
            .as_ref()
            .map(|ctor| self.register_function(ctor, display_name.clone()));

        self.builder.emit(Op::ClassDefinition {
            name: own_name,
            display_name,
            constructor,
            methods,
            has_super: class.super_class.is_some(),
        });
        Ok(())
    }
}

/// Does this expression leave a reference on the stack?
fn produces_reference(expr: &Expression) -> bool {
    matches!(
        expr.unparenthesized(),
        Expression::Identifier(_) | Expression::Member(_) | Expression::SuperMember(_)
    )
}

/// Function name of a method or accessor with a static key
fn method_name(key: &PropertyName, kind: MethodKind) -> Option<JsString> {
    let name = key.static_name()?;
    Some(match kind {
        MethodKind::Method => name,
        MethodKind::Get => JsString::from(format!("get {}", name)),
        MethodKind::Set => JsString::from(format!("set {}", name)),
    })
}
