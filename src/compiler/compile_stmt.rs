//! Statement compilation
//!
//! Compiles AST statements to bytecode instructions.

use super::bytecode::{
    BindingKind, CodeKind, CodeRef, DeclarationKind, HandlerKind, LexicalDeclaration, Op,
};
use super::compile_pattern::BindingMode;
use super::hoist::{ScopeDeclarations, lexical_declaration, scope_declarations, var_declared_names};
use super::{Compiler, HandlerStart, Level, TargetKind};
use crate::ast::{
    BreakStatement, CatchClause, ContinueStatement, DoWhileStatement, ForInLeft, ForInStatement,
    ForInit, ForStatement, Function, IfStatement, LabeledStatement, Pattern, ReturnStatement,
    Statement, SwitchStatement, TryStatement, VariableDeclaration, VariableKind, WhileStatement,
    WithStatement,
};
use crate::error::JsError;
use crate::value::CheapClone;

impl<'a> Compiler<'a> {
    /// Compile a statement list; function declarations were hoisted already
    pub(super) fn compile_statements(&mut self, statements: &'a [Statement]) -> Result<(), JsError> {
        for stmt in statements {
            if matches!(stmt, Statement::FunctionDeclaration(_)) {
                continue;
            }
            self.compile_statement(stmt)?;
        }
        Ok(())
    }

    /// Compile a statement
    pub(super) fn compile_statement(&mut self, stmt: &'a Statement) -> Result<(), JsError> {
        self.builder.set_span(stmt.span());
        match stmt {
            Statement::VariableDeclaration(decl) => self.compile_variable_declaration(decl),

            Statement::FunctionDeclaration(func) => self.compile_positional_function(func),

            Statement::ClassDeclaration(class) => {
                self.compile_class(class, None)?;
                let name = class
                    .id
                    .as_ref()
                    .map(|id| id.name.cheap_clone())
                    .ok_or_else(|| JsError::internal_error("class declaration without a name"))?;
                self.builder.emit(Op::InitBinding {
                    name,
                    kind: BindingKind::Lexical,
                });
                Ok(())
            }

            Statement::Block(block) => self.compile_block(&block.body),

            Statement::If(if_stmt) => self.compile_if(if_stmt),

            Statement::Switch(switch_stmt) => self.compile_switch(switch_stmt),

            Statement::For(for_stmt) => self.compile_for(for_stmt),

            Statement::ForIn(for_in) => self.compile_for_in(for_in),

            Statement::While(while_stmt) => self.compile_while(while_stmt),

            Statement::DoWhile(do_while) => self.compile_do_while(do_while),

            Statement::Try(try_stmt) => self.compile_try(try_stmt),

            Statement::With(with_stmt) => self.compile_with(with_stmt),

            Statement::Return(return_stmt) => self.compile_return(return_stmt),

            Statement::Break(break_stmt) => self.compile_break(break_stmt),

            Statement::Continue(continue_stmt) => self.compile_continue(continue_stmt),

            Statement::Throw(throw_stmt) => {
                self.compile_value(&throw_stmt.argument)?;
                self.builder.emit(Op::Throw);
                Ok(())
            }

            Statement::Expression(expr_stmt) => {
                self.compile_value(&expr_stmt.expression)?;
                // Script and eval code report the last expression value
                if matches!(self.kind, CodeKind::Global | CodeKind::Eval) {
                    self.builder.emit(Op::PopResult);
                } else {
                    self.builder.emit(Op::Pop);
                }
                Ok(())
            }

            Statement::Empty(_) => Ok(()),

            Statement::Debugger(_) => {
                self.builder.emit(Op::Debugger);
                Ok(())
            }

            Statement::Labeled(labeled) => self.compile_labeled(labeled),
        }
    }

    /// Compile a variable declaration
    pub(super) fn compile_variable_declaration(
        &mut self,
        decl: &'a VariableDeclaration,
    ) -> Result<(), JsError> {
        for declarator in &decl.declarations {
            self.builder.set_span(declarator.span);
            match (decl.kind, &declarator.id, &declarator.init) {
                // `var x;` has no runtime effect
                (VariableKind::Var, Pattern::Identifier(_), None) => {}
                (VariableKind::Var, Pattern::Identifier(id), Some(init)) => {
                    self.builder.emit(Op::Resolve {
                        name: id.name.cheap_clone(),
                    });
                    self.compile_named_value(init, &id.name)?;
                    self.builder.emit(Op::PutValue);
                    self.builder.emit(Op::Pop);
                }
                (_, Pattern::Identifier(id), init) => {
                    match init {
                        Some(init) => self.compile_named_value(init, &id.name)?,
                        None => {
                            self.builder.emit(Op::Undefined);
                        }
                    }
                    self.builder.emit(Op::InitBinding {
                        name: id.name.cheap_clone(),
                        kind: BindingKind::Lexical,
                    });
                }
                (kind, pattern, Some(init)) => {
                    self.compile_value(init)?;
                    let mode = if kind == VariableKind::Var {
                        BindingMode::Var
                    } else {
                        BindingMode::Lexical
                    };
                    self.compile_binding(pattern, mode)?;
                }
                (_, pattern, None) => {
                    let span = pattern.span();
                    return Err(JsError::syntax_error(
                        "Missing initializer in destructuring declaration",
                        span.line,
                        span.column,
                    ));
                }
            }
        }
        Ok(())
    }

    /// A function declaration in single-statement position (`if (a) function f() {}`)
    /// assigns its var binding when reached
    fn compile_positional_function(&mut self, func: &'a Function) -> Result<(), JsError> {
        let name = func
            .id
            .as_ref()
            .map(|id| id.name.cheap_clone())
            .ok_or_else(|| JsError::internal_error("function declaration without a name"))?;
        let code = self.register_function(func, Some(name.cheap_clone()));
        self.builder.emit(Op::Resolve { name });
        self.builder.emit(Op::BuildFunction { code, name: None });
        self.builder.emit(Op::PutValue);
        self.builder.emit(Op::Pop);
        Ok(())
    }

    /// Compile a block; an environment is only created when it declares something
    pub(super) fn compile_block(&mut self, statements: &'a [Statement]) -> Result<(), JsError> {
        let vars = var_declared_names(statements);
        let scope = scope_declarations(statements, true, &vars)?;
        if scope.is_empty() {
            return self.compile_statements(statements);
        }
        let start = self.enter_block_scope(scope)?;
        self.compile_statements(statements)?;
        self.exit_block_scope(start)
    }

    /// Emit `BlockSetup` and open its environment region
    fn enter_block_scope(&mut self, scope: ScopeDeclarations<'a>) -> Result<HandlerStart, JsError> {
        let functions = self.register_declarations(&scope.functions);
        self.enter_declarations(scope.declarations, functions)
    }

    fn enter_declarations(
        &mut self,
        declarations: Vec<LexicalDeclaration>,
        functions: Vec<CodeRef>,
    ) -> Result<HandlerStart, JsError> {
        self.builder.emit(Op::BlockSetup {
            declarations,
            functions,
        });
        let start = self
            .builder
            .begin_handler(HandlerKind::Env, self.stack_depth())?;
        self.levels.push(Level::Env);
        Ok(start)
    }

    /// Close an environment region opened by `enter_declarations` or `with`
    fn exit_block_scope(&mut self, start: HandlerStart) -> Result<(), JsError> {
        self.builder.end_handler(start)?;
        self.builder.emit(Op::PopEnv);
        match self.pop_level()? {
            Level::Env => Ok(()),
            other => Err(JsError::internal_error(format!(
                "expected an environment level, found {:?}",
                other
            ))),
        }
    }

    /// Compile an if statement
    fn compile_if(&mut self, if_stmt: &'a IfStatement) -> Result<(), JsError> {
        self.compile_value(&if_stmt.test)?;
        let else_jump = self.builder.emit_jump(Op::PopJump {
            test: false,
            target: 0,
        });
        self.compile_statement(&if_stmt.consequent)?;

        match &if_stmt.alternate {
            Some(alternate) => {
                let end_jump = self.builder.emit_jump(Op::Jump { target: 0 });
                self.builder.patch_jump(else_jump)?;
                self.compile_statement(alternate)?;
                self.builder.patch_jump(end_jump)
            }
            None => self.builder.patch_jump(else_jump),
        }
    }

    /// Compile a while loop
    fn compile_while(&mut self, while_stmt: &'a WhileStatement) -> Result<(), JsError> {
        self.push_jump_target(TargetKind::Loop);
        let head = self.builder.current_offset()?;

        self.compile_value(&while_stmt.test)?;
        let exit = self.builder.emit_jump(Op::PopJump {
            test: false,
            target: 0,
        });
        self.compile_statement(&while_stmt.body)?;
        self.builder.emit_jump_to(head);
        self.builder.patch_jump(exit)?;

        self.pop_jump_target(Some(head))
    }

    /// Compile a do-while loop
    fn compile_do_while(&mut self, do_while: &'a DoWhileStatement) -> Result<(), JsError> {
        self.push_jump_target(TargetKind::Loop);
        let top = self.builder.current_offset()?;

        self.compile_statement(&do_while.body)?;
        let test = self.builder.current_offset()?;
        self.compile_value(&do_while.test)?;
        self.builder.emit(Op::PopJump {
            test: true,
            target: top,
        });

        self.pop_jump_target(Some(test))
    }

    /// Compile a for loop; `let`/`const` heads get one environment around the loop
    fn compile_for(&mut self, for_stmt: &'a ForStatement) -> Result<(), JsError> {
        let env = match &for_stmt.init {
            Some(ForInit::Variable(decl)) if decl.kind != VariableKind::Var => {
                let declaration = lexical_declaration(decl)?;
                Some(self.enter_declarations(vec![declaration], Vec::new())?)
            }
            _ => None,
        };

        match &for_stmt.init {
            Some(ForInit::Variable(decl)) => self.compile_variable_declaration(decl)?,
            Some(ForInit::Expression(expr)) => {
                self.compile_value(expr)?;
                self.builder.emit(Op::Pop);
            }
            None => {}
        }

        self.push_jump_target(TargetKind::Loop);
        let head = self.builder.current_offset()?;

        let exit = match &for_stmt.test {
            Some(test) => {
                self.compile_value(test)?;
                Some(self.builder.emit_jump(Op::PopJump {
                    test: false,
                    target: 0,
                }))
            }
            None => None,
        };

        self.compile_statement(&for_stmt.body)?;

        let update = self.builder.current_offset()?;
        if let Some(expr) = &for_stmt.update {
            self.compile_value(expr)?;
            self.builder.emit(Op::Pop);
        }
        self.builder.emit_jump_to(head);

        if let Some(exit) = exit {
            self.builder.patch_jump(exit)?;
        }
        self.pop_jump_target(Some(update))?;

        match env {
            Some(start) => self.exit_block_scope(start),
            None => Ok(()),
        }
    }

    /// Compile a for-in loop
    ///
    /// The iterator stays on the operand stack for the whole loop; every
    /// exit path pops it.
    fn compile_for_in(&mut self, for_in: &'a ForInStatement) -> Result<(), JsError> {
        self.compile_value(&for_in.right)?;
        self.builder.emit(Op::ForInSetup);
        self.levels.push(Level::Iterator);
        self.push_jump_target(TargetKind::Loop);

        let head = self.builder.current_offset()?;
        let exit = self.builder.emit_jump(Op::ForInNext { exit: 0 });

        match &for_in.left {
            ForInLeft::Variable(decl) => {
                let declarator = decl.declarations.first().ok_or_else(|| {
                    JsError::internal_error("for-in declaration without a declarator")
                })?;
                if decl.kind == VariableKind::Var {
                    self.compile_binding(&declarator.id, BindingMode::Var)?;
                    self.compile_statement(&for_in.body)?;
                } else {
                    let declaration = lexical_declaration(decl)?;
                    let start = self.enter_declarations(vec![declaration], Vec::new())?;
                    self.compile_binding(&declarator.id, BindingMode::Lexical)?;
                    self.compile_statement(&for_in.body)?;
                    self.exit_block_scope(start)?;
                }
            }
            ForInLeft::Pattern(pattern) => {
                self.compile_binding(pattern, BindingMode::Assign)?;
                self.compile_statement(&for_in.body)?;
            }
        }

        self.builder.emit_jump_to(head);
        self.builder.patch_jump(exit)?;
        self.pop_jump_target(Some(head))?;

        match self.pop_level()? {
            Level::Iterator => {}
            other => {
                return Err(JsError::internal_error(format!(
                    "expected an iterator level, found {:?}",
                    other
                )));
            }
        }
        self.builder.emit(Op::Pop);
        Ok(())
    }

    /// Compile a switch statement
    ///
    /// The discriminant stays on the stack while the case tests run; the
    /// matching `SwitchCase` (or the final `SwitchDefault`) consumes it.
    fn compile_switch(&mut self, switch_stmt: &'a SwitchStatement) -> Result<(), JsError> {
        self.compile_value(&switch_stmt.discriminant)?;

        let statements = move || switch_stmt.cases.iter().flat_map(|case| case.consequent.iter());
        let vars = var_declared_names(statements());
        let scope = scope_declarations(statements(), true, &vars)?;
        let env = if scope.is_empty() {
            None
        } else {
            Some(self.enter_block_scope(scope)?)
        };

        self.push_jump_target(TargetKind::Switch);

        let mut case_jumps = Vec::new();
        for case in &switch_stmt.cases {
            if let Some(test) = &case.test {
                self.builder.set_span(case.span);
                self.compile_value(test)?;
                case_jumps.push(Some(self.builder.emit_jump(Op::SwitchCase { target: 0 })));
            } else {
                case_jumps.push(None);
            }
        }
        let default_jump = self.builder.emit_jump(Op::SwitchDefault { target: 0 });

        let mut has_default = false;
        for (case, jump) in switch_stmt.cases.iter().zip(case_jumps) {
            match jump {
                Some(jump) => self.builder.patch_jump(jump)?,
                None => {
                    has_default = true;
                    self.builder.patch_jump(default_jump)?;
                }
            }
            self.compile_statements(&case.consequent)?;
        }
        if !has_default {
            self.builder.patch_jump(default_jump)?;
        }

        self.pop_jump_target(None)?;

        match env {
            Some(start) => self.exit_block_scope(start),
            None => Ok(()),
        }
    }

    /// Compile a try statement
    ///
    /// ```text
    ///     try body              ; Catch and Finally regions
    ///     Jump over
    /// catch_entry:
    ///     catch clause
    /// over:
    ///     EnterFinally          ; end of the Finally region
    /// finally_entry:
    ///     finalizer
    ///     EndFinally
    /// ```
    fn compile_try(&mut self, try_stmt: &'a TryStatement) -> Result<(), JsError> {
        let depth = self.stack_depth();

        let finally_start = match &try_stmt.finalizer {
            Some(_) => {
                let start = self.builder.begin_handler(HandlerKind::Finally, depth)?;
                self.levels.push(Level::Finally {
                    jsr_patches: Vec::new(),
                });
                Some(start)
            }
            None => None,
        };
        let catch_start = match &try_stmt.handler {
            Some(_) => Some(self.builder.begin_handler(HandlerKind::Catch, depth)?),
            None => None,
        };

        self.compile_block(&try_stmt.block.body)?;

        if let (Some(handler), Some(start)) = (&try_stmt.handler, catch_start) {
            let over = self.builder.emit_jump(Op::Jump { target: 0 });
            self.builder.end_handler(start)?;
            self.compile_catch_clause(handler)?;
            self.builder.patch_jump(over)?;
        }

        if let (Some(finalizer), Some(start)) = (&try_stmt.finalizer, finally_start) {
            self.builder.emit(Op::EnterFinally);
            self.builder.end_handler(start)?;

            let Level::Finally { jsr_patches } = self.pop_level()? else {
                return Err(JsError::internal_error("expected a finally level"));
            };
            let entry = self.builder.current_offset()?;
            for jsr in jsr_patches {
                self.builder.patch_jump_to(jsr, entry);
            }

            self.levels.push(Level::FinallyBody);
            self.compile_block(&finalizer.body)?;
            self.pop_level()?;
            self.builder.emit(Op::EndFinally);
        }

        Ok(())
    }

    /// Bind the thrown value on top of the stack and run the clause body
    fn compile_catch_clause(&mut self, handler: &'a CatchClause) -> Result<(), JsError> {
        self.builder.set_span(handler.span);
        let mut ids = Vec::new();
        handler.param.collect_identifiers(&mut ids);
        let declaration = LexicalDeclaration {
            kind: DeclarationKind::Mutable,
            names: ids.iter().map(|id| id.name.cheap_clone()).collect(),
        };

        let start = self.enter_declarations(vec![declaration], Vec::new())?;
        self.compile_binding(&handler.param, BindingMode::Lexical)?;
        self.compile_block(&handler.body.body)?;
        self.exit_block_scope(start)
    }

    /// Compile a with statement
    fn compile_with(&mut self, with_stmt: &'a WithStatement) -> Result<(), JsError> {
        self.compile_value(&with_stmt.object)?;
        self.builder.emit(Op::WithSetup);
        let start = self
            .builder
            .begin_handler(HandlerKind::Env, self.stack_depth())?;
        self.levels.push(Level::Env);
        self.compile_statement(&with_stmt.body)?;
        self.exit_block_scope(start)
    }

    /// Compile a return statement
    fn compile_return(&mut self, return_stmt: &'a ReturnStatement) -> Result<(), JsError> {
        match &return_stmt.argument {
            Some(argument) => self.compile_value(argument)?,
            None => {
                self.builder.emit(Op::Undefined);
            }
        }

        if self.has_finally() {
            self.builder.emit(Op::PopResult);
            self.emit_unwind(0);
            self.builder.emit(Op::ReturnResult);
        } else {
            self.builder.emit(Op::Return);
        }
        Ok(())
    }

    /// Compile a break statement
    fn compile_break(&mut self, break_stmt: &BreakStatement) -> Result<(), JsError> {
        let label = break_stmt.label.as_ref().map(|id| &id.name);
        let index = self.find_jump_target(label, false, break_stmt.span)?;
        self.emit_jump_out(index, false)
    }

    /// Compile a continue statement
    fn compile_continue(&mut self, continue_stmt: &ContinueStatement) -> Result<(), JsError> {
        let label = continue_stmt.label.as_ref().map(|id| &id.name);
        let index = self.find_jump_target(label, true, continue_stmt.span)?;
        self.emit_jump_out(index, true)
    }

    /// Compile a labeled statement
    ///
    /// Loops and switches adopt the pending labels as their own; any other
    /// statement gets a break-only target.
    fn compile_labeled(&mut self, labeled: &'a LabeledStatement) -> Result<(), JsError> {
        let name = &labeled.label.name;
        if self.active_labels.contains(name) {
            return Err(JsError::syntax_error(
                format!("Label '{}' has already been declared", name),
                labeled.label.span.line,
                labeled.label.span.column,
            ));
        }
        self.active_labels.push(name.cheap_clone());
        self.pending_labels.push(name.cheap_clone());

        let result = match labeled.body.as_ref() {
            Statement::While(_)
            | Statement::DoWhile(_)
            | Statement::For(_)
            | Statement::ForIn(_)
            | Statement::Switch(_)
            | Statement::Labeled(_) => self.compile_statement(&labeled.body),
            body => {
                self.push_jump_target(TargetKind::Label);
                self.compile_statement(body)
                    .and_then(|()| self.pop_jump_target(None))
            }
        };

        self.active_labels.pop();
        self.pending_labels.clear();
        result
    }
}
