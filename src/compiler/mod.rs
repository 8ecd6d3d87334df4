//! Bytecode compiler
//!
//! Lowers the AST to stack-machine bytecode. Every function body becomes its
//! own `Code`; nested bodies are queued and compiled breadth-first after the
//! enclosing body is finished.

mod builder;
mod bytecode;
mod compile_expr;
mod compile_pattern;
mod compile_stmt;
mod hoist;

pub use builder::{CodeBuilder, HandlerStart, JumpPlaceholder, jump_target};
pub use bytecode::{
    BindingKind, ClassMethod, Code, CodeKind, CodeRef, DeclarationKind, Handler, HandlerKind,
    JumpTarget, LexicalDeclaration, MethodKey, Op, Params, SourceMapEntry,
};

use std::collections::VecDeque;
use std::rc::Rc;

use serde::Deserialize;
use tracing::debug;

use crate::ast::{Expression, Function, FunctionBody, FunctionKind, Pattern, Program, Statement};
use crate::error::JsError;
use crate::lexer::Span;
use crate::parser::Parser;
use crate::string_dict::StringDict;
use crate::value::{CheapClone, JsString};
use hoist::{scope_declarations, var_declared_names};

/// Options recognised by [`compile`]
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CompileOptions {
    /// The source is a single function expression; its Code is returned
    pub function: bool,
    /// Compile as eval code (configurable top-level bindings)
    pub eval: bool,
    /// Top-level bindings of a script are non-configurable
    pub scoped: bool,
}

/// Compile source text to a top-level Code object
pub fn compile(source: &str, options: &CompileOptions) -> Result<Rc<Code>, JsError> {
    debug!(bytes = source.len(), ?options, "compile start");

    let mut dict = StringDict::with_common_strings();
    let program = Parser::new(source, &mut dict).parse_program()?;

    let mut worklist = VecDeque::new();
    let root = if options.function {
        let function = single_function(&program)?;
        let slot = CodeRef::new();
        worklist.push_back(PendingFunction {
            function,
            slot: slot.clone(),
            name: function.id.as_ref().map(|id| id.name.cheap_clone()),
        });
        drain(&mut worklist)?;
        slot.get()
            .cloned()
            .ok_or_else(|| JsError::internal_error("function body was never compiled"))?
    } else {
        let (code, pending) = Compiler::compile_program(&program, options)?;
        worklist.extend(pending);
        drain(&mut worklist)?;
        Rc::new(code)
    };

    debug!(
        name = root.display_name(),
        instructions = root.instructions.len(),
        "compile end"
    );
    Ok(root)
}

/// The function of a `(function ...)` program
fn single_function(program: &Program) -> Result<&Function, JsError> {
    if let [Statement::Expression(stmt)] = program.body.as_slice()
        && let Expression::Function(function) = stmt.expression.unparenthesized()
    {
        return Ok(function);
    }
    Err(JsError::syntax_error(
        "Expected a single function expression",
        program.span.line,
        program.span.column,
    ))
}

/// Compile queued function bodies until none are left
fn drain(worklist: &mut VecDeque<PendingFunction<'_>>) -> Result<(), JsError> {
    while let Some(item) = worklist.pop_front() {
        let (code, pending) = Compiler::compile_function(item.function, item.name)?;
        worklist.extend(pending);
        if !item.slot.set(Rc::new(code)) {
            return Err(JsError::internal_error("function body compiled twice"));
        }
    }
    Ok(())
}

/// A function body waiting to be compiled into its slot
pub(crate) struct PendingFunction<'a> {
    function: &'a Function,
    slot: CodeRef,
    name: Option<JsString>,
}

/// Something a break, continue or return has to unwind on its way out
#[derive(Debug)]
enum Level {
    /// A block, `with` or catch environment
    Env,
    /// Inside `try` with a `finally`; jumps out call the finally subroutine
    Finally { jsr_patches: Vec<JumpPlaceholder> },
    /// Inside a finally body; its marker is on the operand stack
    FinallyBody,
    /// Inside a for-in loop; its iterator is on the operand stack
    Iterator,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TargetKind {
    Loop,
    Switch,
    Label,
}

/// Break/continue target
#[derive(Debug)]
struct JumpTargetRecord {
    kind: TargetKind,
    labels: Vec<JsString>,
    level_height: usize,
    breaks: Vec<JumpPlaceholder>,
    continues: Vec<JumpPlaceholder>,
}

/// Compiler state for one Code object
pub struct Compiler<'a> {
    builder: CodeBuilder,

    /// Nested function bodies referenced from this one
    pending: Vec<PendingFunction<'a>>,

    levels: Vec<Level>,

    jump_targets: Vec<JumpTargetRecord>,

    /// Labels directly in front of the statement being compiled
    pending_labels: Vec<JsString>,

    /// Every label in scope, for the duplicate check
    active_labels: Vec<JsString>,

    kind: CodeKind,
}

impl<'a> Compiler<'a> {
    fn new(kind: CodeKind) -> Self {
        Self {
            builder: CodeBuilder::new(),
            pending: Vec::new(),
            levels: Vec::new(),
            jump_targets: Vec::new(),
            pending_labels: Vec::new(),
            active_labels: Vec::new(),
            kind,
        }
    }

    /// Compile a script or eval body
    fn compile_program(
        program: &'a Program,
        options: &CompileOptions,
    ) -> Result<(Code, Vec<PendingFunction<'a>>), JsError> {
        let kind = if options.eval {
            CodeKind::Eval
        } else {
            CodeKind::Global
        };
        let mut compiler = Compiler::new(kind);

        let var_names = var_declared_names(&program.body);
        let scope = scope_declarations(&program.body, false, &var_names)?;
        let functions = compiler.register_declarations(&scope.functions);

        compiler.builder.set_span(program.span);
        compiler.compile_statements(&program.body)?;
        compiler.builder.emit(Op::ReturnResult);

        let built = compiler.builder.finish()?;
        let code = Code {
            name: None,
            span: program.span,
            kind,
            strict: program.strict,
            instructions: built.instructions,
            functions,
            lexical_declarations: scope.declarations,
            var_names,
            params: Params::default(),
            uses_super: false,
            uses_arguments: false,
            configurable_bindings: options.eval || !options.scoped,
            handlers: built.handlers,
            source_map: built.source_map,
        };
        Ok((code, compiler.pending))
    }

    /// Compile a function, method or arrow body
    fn compile_function(
        function: &'a Function,
        name: Option<JsString>,
    ) -> Result<(Code, Vec<PendingFunction<'a>>), JsError> {
        let kind = match function.kind {
            FunctionKind::Arrow => CodeKind::Arrow,
            FunctionKind::Normal => CodeKind::Normal,
            FunctionKind::Method
            | FunctionKind::Getter
            | FunctionKind::Setter
            | FunctionKind::ClassConstructor => CodeKind::Method,
        };
        let mut compiler = Compiler::new(kind);
        let params = parameter_shape(&function.params)?;

        compiler.builder.set_span(function.span);
        if !params.simple {
            compiler.compile_parameters(&function.params)?;
        }

        let (var_names, lexical_declarations, functions) = match &function.body {
            FunctionBody::Block(block) => {
                let var_names = var_declared_names(&block.body);
                let mut conflicts = var_names.clone();
                conflicts.extend(params.names.iter().cloned());
                let scope = scope_declarations(&block.body, false, &conflicts)?;
                let functions = compiler.register_declarations(&scope.functions);

                compiler.compile_statements(&block.body)?;
                compiler.builder.emit(Op::Undefined);
                compiler.builder.emit(Op::Return);
                (var_names, scope.declarations, functions)
            }
            FunctionBody::Expression(expr) => {
                compiler.compile_value(expr)?;
                compiler.builder.emit(Op::Return);
                (Vec::new(), Vec::new(), Vec::new())
            }
        };

        let built = compiler.builder.finish()?;
        let code = Code {
            name,
            span: function.span,
            kind,
            strict: function.strict,
            instructions: built.instructions,
            functions,
            lexical_declarations,
            var_names,
            params,
            uses_super: function.uses_super,
            uses_arguments: function.uses_arguments,
            configurable_bindings: false,
            handlers: built.handlers,
            source_map: built.source_map,
        };
        Ok((code, compiler.pending))
    }

    /// Queue a nested function body and return the slot it will fill
    fn register_function(&mut self, function: &'a Function, name: Option<JsString>) -> CodeRef {
        let slot = CodeRef::new();
        self.pending.push(PendingFunction {
            function,
            slot: slot.clone(),
            name,
        });
        slot
    }

    /// Queue hoisted function declarations, named after their binding
    fn register_declarations(&mut self, functions: &[&'a Function]) -> Vec<CodeRef> {
        functions
            .iter()
            .map(|f| {
                let name = f.id.as_ref().map(|id| id.name.cheap_clone());
                self.register_function(f, name)
            })
            .collect()
    }

    /// Operand stack items owned by enclosing statements
    fn stack_depth(&self) -> u32 {
        let depth = self
            .levels
            .iter()
            .filter(|level| matches!(level, Level::Iterator | Level::FinallyBody))
            .count();
        u32::try_from(depth).unwrap_or(u32::MAX)
    }

    fn has_finally(&self) -> bool {
        self.levels
            .iter()
            .any(|level| matches!(level, Level::Finally { .. }))
    }

    /// Emit the cleanup for every level above `height`, innermost first
    fn emit_unwind(&mut self, height: usize) {
        for index in (height..self.levels.len()).rev() {
            match self.levels.get(index) {
                Some(Level::Env) => {
                    self.builder.emit(Op::PopEnv);
                }
                Some(Level::Finally { .. }) => {
                    let jsr = self.builder.emit_jump(Op::Jsr { target: 0 });
                    if let Some(Level::Finally { jsr_patches }) = self.levels.get_mut(index) {
                        jsr_patches.push(jsr);
                    }
                }
                Some(Level::FinallyBody | Level::Iterator) => {
                    self.builder.emit(Op::Pop);
                }
                None => {}
            }
        }
    }

    fn pop_level(&mut self) -> Result<Level, JsError> {
        self.levels
            .pop()
            .ok_or_else(|| JsError::internal_error("scope level stack underflow"))
    }

    /// Open a break/continue target, taking the labels in front of it
    fn push_jump_target(&mut self, kind: TargetKind) {
        let labels = std::mem::take(&mut self.pending_labels);
        self.jump_targets.push(JumpTargetRecord {
            kind,
            labels,
            level_height: self.levels.len(),
            breaks: Vec::new(),
            continues: Vec::new(),
        });
    }

    /// Close the innermost target: breaks land here, continues at `continue_target`
    fn pop_jump_target(&mut self, continue_target: Option<JumpTarget>) -> Result<(), JsError> {
        let record = self
            .jump_targets
            .pop()
            .ok_or_else(|| JsError::internal_error("jump target stack underflow"))?;
        for jump in record.breaks {
            self.builder.patch_jump(jump)?;
        }
        if !record.continues.is_empty() {
            let target = continue_target
                .ok_or_else(|| JsError::internal_error("continue into a non-loop"))?;
            for jump in record.continues {
                self.builder.patch_jump_to(jump, target);
            }
        }
        Ok(())
    }

    /// Find the record a break or continue refers to
    fn find_jump_target(
        &self,
        label: Option<&JsString>,
        is_continue: bool,
        span: Span,
    ) -> Result<usize, JsError> {
        let error = |message: String| JsError::syntax_error(message, span.line, span.column);

        let Some(label) = label else {
            return self
                .jump_targets
                .iter()
                .rposition(|record| match record.kind {
                    TargetKind::Loop => true,
                    TargetKind::Switch => !is_continue,
                    TargetKind::Label => false,
                })
                .ok_or_else(|| {
                    if is_continue {
                        error(
                            "Illegal continue statement: no surrounding iteration statement"
                                .to_string(),
                        )
                    } else {
                        error("Illegal break statement".to_string())
                    }
                });
        };

        let index = self
            .jump_targets
            .iter()
            .rposition(|record| record.labels.contains(label))
            .ok_or_else(|| error(format!("Undefined label '{}'", label)))?;
        if is_continue
            && self
                .jump_targets
                .get(index)
                .is_some_and(|record| record.kind != TargetKind::Loop)
        {
            return Err(error(format!(
                "Illegal continue statement: '{}' does not denote an iteration statement",
                label
            )));
        }
        Ok(index)
    }

    /// Unwind to a jump target and jump to its break or continue position
    fn emit_jump_out(&mut self, index: usize, is_continue: bool) -> Result<(), JsError> {
        let height = self
            .jump_targets
            .get(index)
            .map(|record| record.level_height)
            .ok_or_else(|| JsError::internal_error("jump target vanished"))?;
        self.emit_unwind(height);
        let jump = self.builder.emit_jump(Op::Jump { target: 0 });
        if let Some(record) = self.jump_targets.get_mut(index) {
            if is_continue {
                record.continues.push(jump);
            } else {
                record.breaks.push(jump);
            }
        }
        Ok(())
    }
}

/// Bound names, expected argument count and simplicity of a parameter list
fn parameter_shape(params: &[Pattern]) -> Result<Params, JsError> {
    let mut ids = Vec::new();
    for param in params {
        param.collect_identifiers(&mut ids);
    }
    let expected = params
        .iter()
        .take_while(|p| !matches!(p, Pattern::Assignment(_) | Pattern::Rest(_)))
        .count();
    Ok(Params {
        names: ids.iter().map(|id| id.name.cheap_clone()).collect(),
        expected_args: u32::try_from(expected)
            .map_err(|_| JsError::internal_error("too many parameters"))?,
        simple: params.iter().all(|p| matches!(p, Pattern::Identifier(_))),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile_script(source: &str) -> Rc<Code> {
        compile(source, &CompileOptions::default()).unwrap()
    }

    #[test]
    fn test_program_ends_with_return_result() {
        let code = compile_script("1;");
        assert!(matches!(code.instructions.last(), Some(Op::ReturnResult)));
        assert_eq!(code.kind, CodeKind::Global);
        assert!(code.configurable_bindings);
    }

    #[test]
    fn test_nested_functions_are_filled() {
        let code = compile_script("function f() { return function g() {}; }");
        let f = code.functions.first().and_then(|c| c.get()).unwrap();
        assert_eq!(f.display_name(), "f");
        let has_built_g = f.instructions.iter().any(|op| {
            matches!(op, Op::BuildFunction { code, .. } if code.get().is_some_and(|g| g.display_name() == "g"))
        });
        assert!(has_built_g);
    }

    #[test]
    fn test_function_option() {
        let options = CompileOptions {
            function: true,
            ..Default::default()
        };
        let code = compile("(function anonymous(a, b) { return a + b; })", &options).unwrap();
        assert_eq!(code.kind, CodeKind::Normal);
        assert_eq!(code.params.expected_args, 2);
        assert!(compile("1 + 2", &options).is_err());
    }

    #[test]
    fn test_scoped_and_eval_options() {
        let scoped = CompileOptions {
            scoped: true,
            ..Default::default()
        };
        assert!(!compile("var a;", &scoped).unwrap().configurable_bindings);

        let eval = CompileOptions {
            eval: true,
            scoped: true,
            ..Default::default()
        };
        let code = compile("var a;", &eval).unwrap();
        assert_eq!(code.kind, CodeKind::Eval);
        assert!(code.configurable_bindings);
    }

    #[test]
    fn test_parameter_shape() {
        let code = compile_script("function f(a, {b}, c = 1, ...d) {}");
        let f = code.functions.first().and_then(|c| c.get()).unwrap();
        assert_eq!(f.params.expected_args, 2);
        assert!(!f.params.simple);
        let names: Vec<_> = f.params.names.iter().map(|n| n.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_label_errors() {
        let options = CompileOptions::default();
        assert!(compile("a: a: ;", &options).is_err());
        assert!(compile("break;", &options).is_err());
        assert!(compile("while (1) { continue b; }", &options).is_err());
        assert!(compile("a: { continue a; }", &options).is_err());
        assert!(compile("a: while (1) { continue a; }", &options).is_ok());
        assert!(compile("a: { break a; }", &options).is_ok());
    }

    #[test]
    fn test_lexical_conflicts_with_params() {
        let options = CompileOptions::default();
        assert!(compile("function f(a) { let a; }", &options).is_err());
        assert!(compile("function f(a) { { let a; } }", &options).is_ok());
    }
}
