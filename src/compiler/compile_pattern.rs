//! Pattern compilation
//!
//! Handles destructuring for declarations, parameters, catch clauses and
//! assignments. A binding always consumes the value on top of the stack.

use super::Compiler;
use super::bytecode::{BindingKind, Op};
use crate::ast::{BinaryOp, Pattern, PropertyName};
use crate::error::JsError;
use crate::value::{CheapClone, JsString, JsValue};

/// Where the names of a pattern get bound
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum BindingMode {
    /// Assignment through ordinary references
    Assign,
    /// `var` declarations, also through references
    Var,
    /// `let`/`const`/catch parameter initialization in the innermost scope
    Lexical,
    /// Formal parameter initialization in the variable environment
    Param,
}

impl<'a> Compiler<'a> {
    /// Bind the value on top of the stack to a pattern
    pub(super) fn compile_binding(
        &mut self,
        pattern: &'a Pattern,
        mode: BindingMode,
    ) -> Result<(), JsError> {
        match pattern {
            Pattern::Identifier(id) => {
                self.bind_name(&id.name, mode);
                Ok(())
            }

            Pattern::Expression(target) => {
                if mode != BindingMode::Assign {
                    let span = target.span();
                    return Err(JsError::syntax_error(
                        "Invalid destructuring target",
                        span.line,
                        span.column,
                    ));
                }
                self.compile_expression(target)?;
                self.builder.emit(Op::Rotate { n: 2 });
                self.builder.emit(Op::PutValue);
                self.builder.emit(Op::Pop);
                Ok(())
            }

            Pattern::Assignment(assign) => {
                // Replace undefined with the default value
                self.builder.emit(Op::DupTop);
                self.builder.emit(Op::Undefined);
                self.builder.emit(Op::Binary {
                    op: BinaryOp::StrictEq,
                });
                let skip = self.builder.emit_jump(Op::PopJump {
                    test: false,
                    target: 0,
                });
                self.builder.emit(Op::Pop);
                match assign.left.as_ref() {
                    Pattern::Identifier(id) => self.compile_named_value(&assign.right, &id.name)?,
                    _ => self.compile_value(&assign.right)?,
                }
                self.builder.patch_jump(skip)?;
                self.compile_binding(&assign.left, mode)
            }

            Pattern::Object(obj) => {
                self.builder.emit(Op::CheckObjectCoercible);
                for prop in &obj.properties {
                    self.builder.set_span(prop.span);
                    self.builder.emit(Op::DupTop);
                    match prop.key.static_name() {
                        Some(name) => {
                            self.builder.emit(Op::Property { name });
                        }
                        None => {
                            if let PropertyName::Computed(key) = &prop.key {
                                self.compile_value(key)?;
                            }
                            self.builder.emit(Op::Element);
                        }
                    }
                    self.builder.emit(Op::GetValue);
                    self.compile_binding(&prop.value, mode)?;
                }
                self.builder.emit(Op::Pop);
                Ok(())
            }

            Pattern::Array(arr) => {
                self.builder.emit(Op::CheckObjectCoercible);
                for (i, element) in arr.elements.iter().enumerate() {
                    let index = u32::try_from(i)
                        .map_err(|_| JsError::internal_error("array pattern too long"))?;
                    match element {
                        None => {}
                        Some(Pattern::Rest(rest)) => {
                            self.builder.emit(Op::DupTop);
                            self.builder.emit(Op::ArraySlice { from: index });
                            self.compile_binding(&rest.argument, mode)?;
                        }
                        Some(element) => {
                            self.builder.emit(Op::DupTop);
                            self.builder.emit(Op::Literal {
                                value: JsValue::from(index),
                            });
                            self.builder.emit(Op::Element);
                            self.builder.emit(Op::GetValue);
                            self.compile_binding(element, mode)?;
                        }
                    }
                }
                self.builder.emit(Op::Pop);
                Ok(())
            }

            Pattern::Rest(rest) => {
                let span = rest.span;
                Err(JsError::syntax_error(
                    "Rest element must be last element",
                    span.line,
                    span.column,
                ))
            }
        }
    }

    fn bind_name(&mut self, name: &JsString, mode: BindingMode) {
        match mode {
            BindingMode::Assign | BindingMode::Var => {
                self.builder.emit(Op::Resolve {
                    name: name.cheap_clone(),
                });
                self.builder.emit(Op::Rotate { n: 2 });
                self.builder.emit(Op::PutValue);
                self.builder.emit(Op::Pop);
            }
            BindingMode::Lexical => {
                self.builder.emit(Op::InitBinding {
                    name: name.cheap_clone(),
                    kind: BindingKind::Lexical,
                });
            }
            BindingMode::Param => {
                self.builder.emit(Op::InitBinding {
                    name: name.cheap_clone(),
                    kind: BindingKind::Var,
                });
            }
        }
    }

    /// Prologue for a non-simple parameter list: bind each argument in order
    pub(super) fn compile_parameters(&mut self, params: &'a [Pattern]) -> Result<(), JsError> {
        for (i, param) in params.iter().enumerate() {
            let index =
                u32::try_from(i).map_err(|_| JsError::internal_error("too many parameters"))?;
            self.builder.set_span(param.span());
            match param {
                Pattern::Rest(rest) => {
                    self.builder.emit(Op::RestArguments { from: index });
                    self.compile_binding(&rest.argument, BindingMode::Param)?;
                }
                other => {
                    self.builder.emit(Op::LoadArgument { index });
                    self.compile_binding(other, BindingMode::Param)?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::{CompileOptions, compile};

    fn ops(source: &str) -> Vec<Op> {
        compile(source, &CompileOptions::default())
            .unwrap()
            .instructions
            .clone()
    }

    #[test]
    fn test_var_pattern_reads_properties() {
        let code = ops("var {a, b: c} = o;");
        let properties: Vec<_> = code
            .iter()
            .filter_map(|op| match op {
                Op::Property { name } => Some(name.as_str().to_string()),
                _ => None,
            })
            .collect();
        assert_eq!(properties, vec!["a", "b"]);
        assert!(code.iter().any(|op| matches!(op, Op::CheckObjectCoercible)));
    }

    #[test]
    fn test_lexical_pattern_initializes() {
        let code = ops("let [x, , ...rest] = arr;");
        assert!(code.iter().any(|op| matches!(op, Op::ArraySlice { from: 2 })));
        let inits = code
            .iter()
            .filter(|op| {
                matches!(op, Op::InitBinding { kind: BindingKind::Lexical, .. })
            })
            .count();
        assert_eq!(inits, 2);
    }

    #[test]
    fn test_default_value_tests_undefined() {
        let code = ops("var {a = 1} = o;");
        assert!(code.iter().any(|op| matches!(
            op,
            Op::Binary {
                op: BinaryOp::StrictEq
            }
        )));
    }

    #[test]
    fn test_parameter_prologue() {
        let code = compile("function f(a = 1, ...r) {}", &CompileOptions::default()).unwrap();
        let f = code.functions.first().and_then(|c| c.get()).unwrap();
        assert!(matches!(f.instructions.first(), Some(Op::LoadArgument { index: 0 })));
        assert!(f.instructions.iter().any(|op| matches!(op, Op::RestArguments { from: 1 })));
    }
}
