//! Parser
//!
//! Recursive descent for statements, precedence climbing for binary
//! expressions. Early errors that only need local context (strict-mode
//! binding names, `super` placement, invalid assignment targets) are
//! reported here; label and jump-target checks happen in the compiler.

use crate::ast::*;
use crate::error::JsError;
use crate::lexer::{Lexer, Span, Token, TokenKind};
use crate::string_dict::StringDict;
use crate::value::JsString;

/// Words that cannot be binding names in strict code
const STRICT_RESERVED: &[&str] = &[
    "implements",
    "interface",
    "package",
    "private",
    "protected",
    "public",
    "static",
    "yield",
];

/// Per-function state collected while its body is parsed
struct FunctionContext {
    /// `None` for the top-level script
    kind: Option<FunctionKind>,
    strict: bool,
    has_use_strict: bool,
    uses_super: bool,
    uses_arguments: bool,
}

impl FunctionContext {
    fn new(kind: Option<FunctionKind>, strict: bool) -> Self {
        Self {
            kind,
            strict,
            has_use_strict: false,
            uses_super: false,
            uses_arguments: false,
        }
    }
}

pub struct Parser<'a> {
    lexer: Lexer<'a>,
    current: Token,
    previous: Token,
    functions: Vec<FunctionContext>,
    /// Inside a `for (...;` head, where `in` ends the expression
    no_in: bool,
    /// An object/array literal contains syntax that is only valid if the
    /// literal turns out to be a destructuring target
    cover_error: Option<(Span, &'static str)>,
}

impl<'a> Parser<'a> {
    pub fn new(source: &'a str, string_dict: &'a mut StringDict) -> Self {
        let mut lexer = Lexer::new(source, string_dict);
        let current = lexer.next_token();
        Self {
            lexer,
            current,
            previous: Token::eof(0, 1, 1),
            functions: Vec::new(),
            no_in: false,
            cover_error: None,
        }
    }

    #[inline]
    fn intern(&mut self, s: &str) -> JsString {
        self.lexer.string_dict().get_or_insert(s)
    }

    /// Parse a complete script
    pub fn parse_program(&mut self) -> Result<Program, JsError> {
        let start = self.current.span;
        self.functions.push(FunctionContext::new(None, false));
        let body = self.parse_directives_and_statements(&TokenKind::Eof)?;
        let strict = self.strict();
        self.functions.pop();

        Ok(Program {
            body,
            strict,
            span: self.span_from(start),
        })
    }

    fn strict(&self) -> bool {
        self.functions.last().is_some_and(|f| f.strict)
    }

    /// Force strictness of the innermost context; returns the previous value
    fn set_strict(&mut self, strict: bool) -> bool {
        match self.functions.last_mut() {
            Some(ctx) => std::mem::replace(&mut ctx.strict, strict),
            None => false,
        }
    }

    /// Statements up to `end`, treating a leading `"use strict"` as a directive
    fn parse_directives_and_statements(
        &mut self,
        end: &TokenKind,
    ) -> Result<Vec<Statement>, JsError> {
        let mut body = Vec::new();
        let mut in_prologue = true;

        while !self.check(end) && !self.is_at_end() {
            let statement = self.parse_statement()?;
            if in_prologue {
                match self.directive_text(&statement) {
                    Some(text) => {
                        if text == "'use strict'" || text == "\"use strict\"" {
                            self.set_strict(true);
                            if let Some(ctx) = self.functions.last_mut() {
                                ctx.has_use_strict = true;
                            }
                        }
                    }
                    None => in_prologue = false,
                }
            }
            body.push(statement);
        }

        Ok(body)
    }

    /// Raw source of a directive-shaped statement
    fn directive_text(&self, statement: &Statement) -> Option<&'a str> {
        match statement {
            Statement::Expression(ExpressionStatement {
                expression:
                    Expression::Literal(Literal {
                        value: LiteralValue::String(_),
                        span,
                    }),
                ..
            }) => Some(self.lexer.slice(*span)),
            _ => None,
        }
    }

    // ============ STATEMENTS ============

    fn parse_statement(&mut self) -> Result<Statement, JsError> {
        if self.check_identifier() && self.peek_is(&TokenKind::Colon) {
            return self.parse_labeled_statement();
        }

        if self.check_keyword("async") && self.peek_is(&TokenKind::Function) {
            return Err(self.error("Async functions are not supported"));
        }

        match &self.current.kind {
            TokenKind::Let | TokenKind::Const | TokenKind::Var => {
                let decl = self.parse_variable_declaration_list()?;
                self.check_declaration_initializers(&decl)?;
                self.expect_semicolon()?;
                Ok(Statement::VariableDeclaration(decl))
            }
            TokenKind::Function => Ok(Statement::FunctionDeclaration(Box::new(
                self.parse_function_declaration()?,
            ))),
            TokenKind::Class => Ok(Statement::ClassDeclaration(Box::new(
                self.parse_class(true)?,
            ))),
            TokenKind::If => self.parse_if_statement(),
            TokenKind::For => self.parse_for_statement(),
            TokenKind::While => self.parse_while_statement(),
            TokenKind::Do => self.parse_do_while_statement(),
            TokenKind::Switch => self.parse_switch_statement(),
            TokenKind::Try => self.parse_try_statement(),
            TokenKind::With => self.parse_with_statement(),
            TokenKind::Return => self.parse_return_statement(),
            TokenKind::Break => self.parse_break_statement(),
            TokenKind::Continue => self.parse_continue_statement(),
            TokenKind::Throw => self.parse_throw_statement(),
            TokenKind::LBrace => Ok(Statement::Block(self.parse_block_statement()?)),
            TokenKind::Semicolon => {
                let span = self.current.span;
                self.advance();
                Ok(Statement::Empty(span))
            }
            TokenKind::Debugger => {
                let span = self.current.span;
                self.advance();
                self.expect_semicolon()?;
                Ok(Statement::Debugger(span))
            }
            TokenKind::Import | TokenKind::Export => {
                Err(self.error("Module declarations are not supported"))
            }
            TokenKind::Enum => Err(self.error("Unexpected reserved word 'enum'")),
            _ => {
                let start = self.current.span;
                let expression = self.parse_expression()?;
                self.expect_semicolon()?;
                let span = self.span_from(start);
                Ok(Statement::Expression(ExpressionStatement { expression, span }))
            }
        }
    }

    /// `var`/`let`/`const` and its declarators, without the terminator
    fn parse_variable_declaration_list(&mut self) -> Result<VariableDeclaration, JsError> {
        let start = self.current.span;
        let kind = match &self.current.kind {
            TokenKind::Let => VariableKind::Let,
            TokenKind::Const => VariableKind::Const,
            TokenKind::Var => VariableKind::Var,
            _ => return Err(self.unexpected_token("variable declaration")),
        };
        self.advance();

        let mut declarations = vec![self.parse_variable_declarator(kind)?];
        while self.match_token(&TokenKind::Comma) {
            declarations.push(self.parse_variable_declarator(kind)?);
        }

        let span = self.span_from(start);
        Ok(VariableDeclaration {
            kind,
            declarations,
            span,
        })
    }

    fn parse_variable_declarator(
        &mut self,
        kind: VariableKind,
    ) -> Result<VariableDeclarator, JsError> {
        let start = self.current.span;
        let id = self.parse_binding_pattern()?;

        if kind != VariableKind::Var && !matches!(id, Pattern::Identifier(_)) {
            let mut names = Vec::new();
            id.collect_identifiers(&mut names);
            if let Some((_, dup)) = names
                .iter()
                .enumerate()
                .find(|(i, n)| names.iter().take(*i).any(|m| m.name == n.name))
            {
                return Err(Self::error_at(
                    &format!("Identifier '{}' has already been declared", dup.name),
                    dup.span,
                ));
            }
        }

        let init = if self.match_token(&TokenKind::Eq) {
            Some(self.parse_assignment_expression()?)
        } else {
            None
        };

        let span = self.span_from(start);
        Ok(VariableDeclarator { id, init, span })
    }

    fn check_declaration_initializers(&self, decl: &VariableDeclaration) -> Result<(), JsError> {
        for declarator in &decl.declarations {
            if declarator.init.is_some() {
                continue;
            }
            if decl.kind == VariableKind::Const {
                return Err(Self::error_at(
                    "Missing initializer in const declaration",
                    declarator.span,
                ));
            }
            if !matches!(declarator.id, Pattern::Identifier(_)) {
                return Err(Self::error_at(
                    "Missing initializer in destructuring declaration",
                    declarator.span,
                ));
            }
        }
        Ok(())
    }

    fn parse_binding_pattern(&mut self) -> Result<Pattern, JsError> {
        match &self.current.kind {
            TokenKind::Identifier(_) => {
                let id = self.parse_identifier()?;
                self.check_binding_name(&id, self.strict())?;
                Ok(Pattern::Identifier(id))
            }
            TokenKind::LBrace => self.parse_object_pattern(),
            TokenKind::LBracket => self.parse_array_pattern(),
            _ => Err(self.unexpected_token("binding pattern")),
        }
    }

    /// Reject names a binding may not use in the given strictness
    fn check_binding_name(&self, id: &Identifier, strict: bool) -> Result<(), JsError> {
        let name = id.name.as_str();
        if strict && (name == "eval" || name == "arguments") {
            return Err(Self::error_at(
                &format!("Unexpected '{}' in strict mode", name),
                id.span,
            ));
        }
        if strict && STRICT_RESERVED.contains(&name) {
            return Err(Self::error_at(
                &format!("Unexpected strict mode reserved word '{}'", name),
                id.span,
            ));
        }
        Ok(())
    }

    /// Binding pattern element with an optional `= default`
    fn parse_binding_element(&mut self) -> Result<Pattern, JsError> {
        let start = self.current.span;
        let pattern = self.parse_binding_pattern()?;
        self.parse_pattern_default(pattern, start)
    }

    fn parse_pattern_default(&mut self, pattern: Pattern, start: Span) -> Result<Pattern, JsError> {
        if self.match_token(&TokenKind::Eq) {
            let right = Box::new(self.allow_in(|p| p.parse_assignment_expression())?);
            let span = self.span_from(start);
            Ok(Pattern::Assignment(AssignmentPattern {
                left: Box::new(pattern),
                right,
                span,
            }))
        } else {
            Ok(pattern)
        }
    }

    fn parse_object_pattern(&mut self) -> Result<Pattern, JsError> {
        let start = self.current.span;
        self.require_token(&TokenKind::LBrace)?;

        let mut properties = vec![];

        while !self.check(&TokenKind::RBrace) && !self.is_at_end() {
            if self.check(&TokenKind::DotDotDot) {
                return Err(self.error("Object rest patterns are not supported"));
            }

            let prop_start = self.current.span;
            let key_is_identifier = self.check_identifier();
            let key = self.parse_property_name()?;

            let (value, shorthand) = if self.match_token(&TokenKind::Colon) {
                (self.parse_binding_element()?, false)
            } else {
                match &key {
                    PropertyName::Identifier(id) if key_is_identifier => {
                        self.check_binding_name(id, self.strict())?;
                        let pattern = Pattern::Identifier(id.clone());
                        (self.parse_pattern_default(pattern, prop_start)?, true)
                    }
                    _ => return Err(self.unexpected_token("':'")),
                }
            };

            let span = self.span_from(prop_start);
            properties.push(ObjectPatternProperty {
                key,
                value,
                shorthand,
                span,
            });

            if !self.match_token(&TokenKind::Comma) {
                break;
            }
        }

        self.require_token(&TokenKind::RBrace)?;
        let span = self.span_from(start);
        Ok(Pattern::Object(ObjectPattern { properties, span }))
    }

    fn parse_array_pattern(&mut self) -> Result<Pattern, JsError> {
        let start = self.current.span;
        self.require_token(&TokenKind::LBracket)?;

        let mut elements = vec![];

        while !self.check(&TokenKind::RBracket) && !self.is_at_end() {
            if self.match_token(&TokenKind::Comma) {
                elements.push(None);
                continue;
            }

            if self.check(&TokenKind::DotDotDot) {
                let rest_start = self.current.span;
                self.advance();
                let argument = Box::new(self.parse_binding_pattern()?);
                let span = self.span_from(rest_start);
                elements.push(Some(Pattern::Rest(RestElement { argument, span })));
                if !self.check(&TokenKind::RBracket) {
                    return Err(self.error("Rest element must be last element"));
                }
                break;
            }

            elements.push(Some(self.parse_binding_element()?));

            if !self.match_token(&TokenKind::Comma) {
                break;
            }
        }

        self.require_token(&TokenKind::RBracket)?;
        let span = self.span_from(start);
        Ok(Pattern::Array(ArrayPattern { elements, span }))
    }

    fn parse_function_declaration(&mut self) -> Result<Function, JsError> {
        let start = self.current.span;
        self.require_token(&TokenKind::Function)?;
        if self.check(&TokenKind::Star) {
            return Err(self.error("Generator functions are not supported"));
        }
        let id = self.parse_identifier()?;
        self.parse_function_rest(FunctionKind::Normal, start, Some(id))
    }

    /// Parameters and body of any non-arrow function, starting at `(`
    fn parse_function_rest(
        &mut self,
        kind: FunctionKind,
        start: Span,
        id: Option<Identifier>,
    ) -> Result<Function, JsError> {
        let parent_strict = self.strict();
        self.functions
            .push(FunctionContext::new(Some(kind), parent_strict));
        let saved_no_in = std::mem::replace(&mut self.no_in, false);
        let saved_cover = self.cover_error.take();

        let result = self.parse_params_and_body();

        self.no_in = saved_no_in;
        self.cover_error = saved_cover;
        let Some(ctx) = self.functions.pop() else {
            return Err(JsError::internal_error("function context stack underflow"));
        };
        let (params, body) = result?;

        let function = Function {
            id,
            params,
            body: FunctionBody::Block(body),
            kind,
            strict: ctx.strict,
            uses_super: ctx.uses_super,
            uses_arguments: ctx.uses_arguments,
            span: self.span_from(start),
        };
        self.validate_function(&function, ctx.has_use_strict)?;
        Ok(function)
    }

    fn parse_params_and_body(&mut self) -> Result<(Vec<Pattern>, BlockStatement), JsError> {
        self.require_token(&TokenKind::LParen)?;
        let params = self.parse_formal_parameters()?;
        let body = self.parse_function_body()?;
        Ok((params, body))
    }

    /// Formal parameter list after the opening `(`, consuming the `)`
    fn parse_formal_parameters(&mut self) -> Result<Vec<Pattern>, JsError> {
        let mut params = vec![];

        while !self.check(&TokenKind::RParen) && !self.is_at_end() {
            if self.check(&TokenKind::DotDotDot) {
                let rest_start = self.current.span;
                self.advance();
                let argument = Box::new(self.parse_binding_pattern()?);
                let span = self.span_from(rest_start);
                params.push(Pattern::Rest(RestElement { argument, span }));
                if !self.check(&TokenKind::RParen) {
                    return Err(self.error("Rest parameter must be last formal parameter"));
                }
                break;
            }

            params.push(self.parse_binding_element()?);

            if !self.match_token(&TokenKind::Comma) {
                break;
            }
        }

        self.require_token(&TokenKind::RParen)?;
        Ok(params)
    }

    fn parse_function_body(&mut self) -> Result<BlockStatement, JsError> {
        let start = self.current.span;
        self.require_token(&TokenKind::LBrace)?;
        let body = self.parse_directives_and_statements(&TokenKind::RBrace)?;
        self.require_token(&TokenKind::RBrace)?;
        let span = self.span_from(start);
        Ok(BlockStatement { body, span })
    }

    /// Early errors that depend on the final strictness of a function
    fn validate_function(&self, function: &Function, has_use_strict: bool) -> Result<(), JsError> {
        let simple = function.has_simple_params();

        if has_use_strict && !simple {
            return Err(Self::error_at(
                "Illegal 'use strict' directive in function with non-simple parameter list",
                function.span,
            ));
        }

        match function.kind {
            FunctionKind::Getter if !function.params.is_empty() => {
                return Err(Self::error_at(
                    "Getter must not have any formal parameters",
                    function.span,
                ));
            }
            FunctionKind::Setter
                if function.params.len() != 1
                    || matches!(function.params.first(), Some(Pattern::Rest(_))) =>
            {
                return Err(Self::error_at(
                    "Setter must have exactly one formal parameter",
                    function.span,
                ));
            }
            _ => {}
        }

        if let Some(id) = &function.id {
            self.check_binding_name(id, function.strict)?;
        }

        let mut names = Vec::new();
        for param in &function.params {
            param.collect_identifiers(&mut names);
        }
        let unique_required =
            function.strict || !simple || function.kind != FunctionKind::Normal;
        for (i, name) in names.iter().enumerate() {
            self.check_binding_name(name, function.strict)?;
            if unique_required && names.iter().take(i).any(|n| n.name == name.name) {
                return Err(Self::error_at(
                    "Duplicate parameter name not allowed in this context",
                    name.span,
                ));
            }
        }
        Ok(())
    }

    fn parse_class(&mut self, is_declaration: bool) -> Result<Class, JsError> {
        let start = self.current.span;
        self.require_token(&TokenKind::Class)?;
        let saved_strict = self.set_strict(true);
        let result = self.parse_class_inner(is_declaration, start);
        self.set_strict(saved_strict);
        result
    }

    fn parse_class_inner(&mut self, is_declaration: bool, start: Span) -> Result<Class, JsError> {
        let id = if self.check_identifier() {
            let id = self.parse_identifier()?;
            self.check_binding_name(&id, true)?;
            Some(id)
        } else if is_declaration {
            return Err(self.unexpected_token("class name"));
        } else {
            None
        };

        let super_class = if self.match_token(&TokenKind::Extends) {
            Some(Box::new(self.parse_left_hand_side_expression()?))
        } else {
            None
        };

        self.require_token(&TokenKind::LBrace)?;

        let mut constructor = None;
        let mut members = Vec::new();

        while !self.check(&TokenKind::RBrace) && !self.is_at_end() {
            if self.match_token(&TokenKind::Semicolon) {
                continue;
            }

            let member_start = self.current.span;
            let is_static = self.check_keyword("static") && !self.peek_is(&TokenKind::LParen);
            if is_static {
                self.advance();
            }

            let mut kind = MethodKind::Method;
            if (self.check_keyword("get") || self.check_keyword("set"))
                && !self.peek_is(&TokenKind::LParen)
            {
                kind = if self.check_keyword("get") {
                    MethodKind::Get
                } else {
                    MethodKind::Set
                };
                self.advance();
            }

            if self.check(&TokenKind::Star) {
                return Err(self.error("Generator methods are not supported"));
            }

            let key = self.parse_property_name()?;
            let static_name = key.static_name();
            let named = |s: &str| static_name.as_ref().is_some_and(|n| n == s);

            let is_constructor = !is_static && named("constructor");
            if is_constructor && kind != MethodKind::Method {
                return Err(Self::error_at(
                    "Class constructor may not be an accessor",
                    key.span(),
                ));
            }
            if is_static && named("prototype") {
                return Err(Self::error_at(
                    "Classes may not have a static property named 'prototype'",
                    key.span(),
                ));
            }

            let function_kind = if is_constructor {
                FunctionKind::ClassConstructor
            } else {
                match kind {
                    MethodKind::Method => FunctionKind::Method,
                    MethodKind::Get => FunctionKind::Getter,
                    MethodKind::Set => FunctionKind::Setter,
                }
            };
            let function = Box::new(self.parse_function_rest(function_kind, member_start, None)?);

            if is_constructor {
                if constructor.is_some() {
                    return Err(Self::error_at(
                        "A class may only have one constructor",
                        member_start,
                    ));
                }
                constructor = Some(function);
            } else {
                let span = self.span_from(member_start);
                members.push(ClassMember {
                    key,
                    kind,
                    is_static,
                    function,
                    span,
                });
            }
        }

        self.require_token(&TokenKind::RBrace)?;

        let span = self.span_from(start);
        Ok(Class {
            id,
            super_class,
            constructor,
            members,
            span,
        })
    }

    fn parse_block_statement(&mut self) -> Result<BlockStatement, JsError> {
        let start = self.current.span;
        self.require_token(&TokenKind::LBrace)?;

        let mut body = Vec::new();
        while !self.check(&TokenKind::RBrace) && !self.is_at_end() {
            body.push(self.parse_statement()?);
        }

        self.require_token(&TokenKind::RBrace)?;
        let span = self.span_from(start);
        Ok(BlockStatement { body, span })
    }

    fn parse_if_statement(&mut self) -> Result<Statement, JsError> {
        let start = self.current.span;
        self.require_token(&TokenKind::If)?;
        self.require_token(&TokenKind::LParen)?;
        let test = self.parse_expression()?;
        self.require_token(&TokenKind::RParen)?;

        let consequent = Box::new(self.parse_statement()?);
        let alternate = if self.match_token(&TokenKind::Else) {
            Some(Box::new(self.parse_statement()?))
        } else {
            None
        };

        let span = self.span_from(start);
        Ok(Statement::If(IfStatement {
            test,
            consequent,
            alternate,
            span,
        }))
    }

    fn parse_for_statement(&mut self) -> Result<Statement, JsError> {
        let start = self.current.span;
        self.require_token(&TokenKind::For)?;
        self.require_token(&TokenKind::LParen)?;

        let init = if self.check(&TokenKind::Semicolon) {
            None
        } else if matches!(
            self.current.kind,
            TokenKind::Var | TokenKind::Let | TokenKind::Const
        ) {
            let decl = self.without_in(|p| p.parse_variable_declaration_list())?;
            if self.match_token(&TokenKind::In) {
                if decl.declarations.len() != 1 {
                    return Err(Self::error_at(
                        "Invalid left-hand side in for-in loop: Must have a single binding.",
                        decl.span,
                    ));
                }
                if decl.declarations.iter().any(|d| d.init.is_some()) {
                    return Err(Self::error_at(
                        "for-in loop variable declaration may not have an initializer.",
                        decl.span,
                    ));
                }
                return self.finish_for_in(ForInLeft::Variable(decl), start);
            }
            self.check_declaration_initializers(&decl)?;
            Some(ForInit::Variable(decl))
        } else {
            let expr = self.without_in(|p| p.parse_expression())?;
            if self.match_token(&TokenKind::In) {
                let pattern = self.expression_to_pattern(&expr)?;
                return self.finish_for_in(ForInLeft::Pattern(pattern), start);
            }
            Some(ForInit::Expression(expr))
        };

        self.require_token(&TokenKind::Semicolon)?;
        let test = if self.check(&TokenKind::Semicolon) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.require_token(&TokenKind::Semicolon)?;
        let update = if self.check(&TokenKind::RParen) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.require_token(&TokenKind::RParen)?;

        let body = Box::new(self.parse_statement()?);
        let span = self.span_from(start);
        Ok(Statement::For(ForStatement {
            init,
            test,
            update,
            body,
            span,
        }))
    }

    fn finish_for_in(&mut self, left: ForInLeft, start: Span) -> Result<Statement, JsError> {
        let right = self.parse_expression()?;
        self.require_token(&TokenKind::RParen)?;
        let body = Box::new(self.parse_statement()?);
        let span = self.span_from(start);
        Ok(Statement::ForIn(ForInStatement {
            left,
            right,
            body,
            span,
        }))
    }

    fn parse_while_statement(&mut self) -> Result<Statement, JsError> {
        let start = self.current.span;
        self.require_token(&TokenKind::While)?;
        self.require_token(&TokenKind::LParen)?;
        let test = self.parse_expression()?;
        self.require_token(&TokenKind::RParen)?;
        let body = Box::new(self.parse_statement()?);

        let span = self.span_from(start);
        Ok(Statement::While(WhileStatement { test, body, span }))
    }

    fn parse_do_while_statement(&mut self) -> Result<Statement, JsError> {
        let start = self.current.span;
        self.require_token(&TokenKind::Do)?;
        let body = Box::new(self.parse_statement()?);
        self.require_token(&TokenKind::While)?;
        self.require_token(&TokenKind::LParen)?;
        let test = self.parse_expression()?;
        self.require_token(&TokenKind::RParen)?;
        // The semicolon after do-while is always optional
        self.match_token(&TokenKind::Semicolon);

        let span = self.span_from(start);
        Ok(Statement::DoWhile(DoWhileStatement { body, test, span }))
    }

    fn parse_switch_statement(&mut self) -> Result<Statement, JsError> {
        let start = self.current.span;
        self.require_token(&TokenKind::Switch)?;
        self.require_token(&TokenKind::LParen)?;
        let discriminant = self.parse_expression()?;
        self.require_token(&TokenKind::RParen)?;
        self.require_token(&TokenKind::LBrace)?;

        let mut cases = vec![];
        let mut seen_default = false;

        while !self.check(&TokenKind::RBrace) && !self.is_at_end() {
            let case_start = self.current.span;
            let test = if self.match_token(&TokenKind::Case) {
                Some(self.parse_expression()?)
            } else if self.match_token(&TokenKind::Default) {
                if seen_default {
                    return Err(Self::error_at(
                        "More than one default clause in switch statement",
                        case_start,
                    ));
                }
                seen_default = true;
                None
            } else {
                return Err(self.unexpected_token("'case' or 'default'"));
            };
            self.require_token(&TokenKind::Colon)?;

            let mut consequent = vec![];
            while !self.check(&TokenKind::Case)
                && !self.check(&TokenKind::Default)
                && !self.check(&TokenKind::RBrace)
                && !self.is_at_end()
            {
                consequent.push(self.parse_statement()?);
            }

            let span = self.span_from(case_start);
            cases.push(SwitchCase {
                test,
                consequent,
                span,
            });
        }

        self.require_token(&TokenKind::RBrace)?;

        let span = self.span_from(start);
        Ok(Statement::Switch(SwitchStatement {
            discriminant,
            cases,
            span,
        }))
    }

    fn parse_try_statement(&mut self) -> Result<Statement, JsError> {
        let start = self.current.span;
        self.require_token(&TokenKind::Try)?;
        let block = self.parse_block_statement()?;

        let handler = if self.check(&TokenKind::Catch) {
            let catch_start = self.current.span;
            self.advance();
            self.require_token(&TokenKind::LParen)?;
            let param = self.parse_binding_pattern()?;
            self.require_token(&TokenKind::RParen)?;
            let body = self.parse_block_statement()?;
            let span = self.span_from(catch_start);
            Some(CatchClause { param, body, span })
        } else {
            None
        };

        let finalizer = if self.match_token(&TokenKind::Finally) {
            Some(self.parse_block_statement()?)
        } else {
            None
        };

        if handler.is_none() && finalizer.is_none() {
            return Err(self.error("Missing catch or finally after try"));
        }

        let span = self.span_from(start);
        Ok(Statement::Try(TryStatement {
            block,
            handler,
            finalizer,
            span,
        }))
    }

    fn parse_with_statement(&mut self) -> Result<Statement, JsError> {
        let start = self.current.span;
        if self.strict() {
            return Err(self.error("Strict mode code may not include a with statement"));
        }
        self.require_token(&TokenKind::With)?;
        self.require_token(&TokenKind::LParen)?;
        let object = self.parse_expression()?;
        self.require_token(&TokenKind::RParen)?;
        let body = Box::new(self.parse_statement()?);

        let span = self.span_from(start);
        Ok(Statement::With(WithStatement { object, body, span }))
    }

    fn parse_return_statement(&mut self) -> Result<Statement, JsError> {
        let start = self.current.span;
        if self.functions.last().is_some_and(|f| f.kind.is_none()) {
            return Err(self.error("Illegal return statement"));
        }
        self.require_token(&TokenKind::Return)?;

        let argument = if self.check(&TokenKind::Semicolon)
            || self.check(&TokenKind::RBrace)
            || self.is_at_end()
            || self.lexer.had_newline_before()
        {
            None
        } else {
            Some(self.parse_expression()?)
        };

        self.expect_semicolon()?;
        let span = self.span_from(start);
        Ok(Statement::Return(ReturnStatement { argument, span }))
    }

    /// Optional label of `break`/`continue`, on the same line
    fn parse_jump_label(&mut self) -> Result<Option<Identifier>, JsError> {
        if self.check_identifier() && !self.lexer.had_newline_before() {
            Ok(Some(self.parse_identifier()?))
        } else {
            Ok(None)
        }
    }

    fn parse_break_statement(&mut self) -> Result<Statement, JsError> {
        let start = self.current.span;
        self.require_token(&TokenKind::Break)?;
        let label = self.parse_jump_label()?;
        self.expect_semicolon()?;
        let span = self.span_from(start);
        Ok(Statement::Break(BreakStatement { label, span }))
    }

    fn parse_continue_statement(&mut self) -> Result<Statement, JsError> {
        let start = self.current.span;
        self.require_token(&TokenKind::Continue)?;
        let label = self.parse_jump_label()?;
        self.expect_semicolon()?;
        let span = self.span_from(start);
        Ok(Statement::Continue(ContinueStatement { label, span }))
    }

    fn parse_throw_statement(&mut self) -> Result<Statement, JsError> {
        let start = self.current.span;
        self.require_token(&TokenKind::Throw)?;

        if self.lexer.had_newline_before() {
            return Err(self.error("Illegal newline after throw"));
        }

        let argument = self.parse_expression()?;
        self.expect_semicolon()?;
        let span = self.span_from(start);
        Ok(Statement::Throw(ThrowStatement { argument, span }))
    }

    fn parse_labeled_statement(&mut self) -> Result<Statement, JsError> {
        let start = self.current.span;
        let label = self.parse_identifier()?;
        self.require_token(&TokenKind::Colon)?;
        let body = Box::new(self.parse_statement()?);
        let span = self.span_from(start);
        Ok(Statement::Labeled(LabeledStatement { label, body, span }))
    }

    // ============ EXPRESSIONS ============

    /// A full expression; any pending destructuring-only syntax is an error here
    fn parse_expression(&mut self) -> Result<Expression, JsError> {
        let expr = self.parse_sequence_expression()?;
        if let Some((span, message)) = self.cover_error.take() {
            return Err(Self::error_at(message, span));
        }
        Ok(expr)
    }

    fn parse_sequence_expression(&mut self) -> Result<Expression, JsError> {
        let start = self.current.span;
        let mut expr = self.parse_assignment_expression()?;

        if self.check(&TokenKind::Comma) {
            let mut expressions = vec![expr];
            while self.match_token(&TokenKind::Comma) {
                expressions.push(self.parse_assignment_expression()?);
            }
            let span = self.span_from(start);
            expr = Expression::Sequence(SequenceExpression { expressions, span });
        }

        Ok(expr)
    }

    fn parse_assignment_expression(&mut self) -> Result<Expression, JsError> {
        let outer_cover = self.cover_error.take();
        let start = self.current.span;
        let expr = self.parse_conditional_expression()?;

        let result = if let Some(operator) = self.current_assignment_op() {
            let left = if operator == AssignmentOp::Assign
                && matches!(expr, Expression::Object(_) | Expression::Array(_))
            {
                let pattern = self.expression_to_pattern(&expr)?;
                self.cover_error = None;
                AssignmentTarget::Pattern(pattern)
            } else {
                self.check_simple_target(&expr, "Invalid left-hand side in assignment")?;
                AssignmentTarget::Simple(Box::new(expr))
            };
            self.advance();
            let right = Box::new(self.parse_assignment_expression()?);
            let span = self.span_from(start);
            Expression::Assignment(AssignmentExpression {
                operator,
                left,
                right,
                span,
            })
        } else {
            expr
        };

        if let Some((span, message)) = self.cover_error
            && !matches!(result, Expression::Object(_) | Expression::Array(_))
        {
            return Err(Self::error_at(message, span));
        }
        if self.cover_error.is_none() {
            self.cover_error = outer_cover;
        }

        Ok(result)
    }

    fn parse_conditional_expression(&mut self) -> Result<Expression, JsError> {
        let start = self.current.span;
        let test = self.parse_binary_expression(0)?;

        if self.match_token(&TokenKind::Question) {
            let consequent = Box::new(self.allow_in(|p| p.parse_assignment_expression())?);
            self.require_token(&TokenKind::Colon)?;
            let alternate = Box::new(self.parse_assignment_expression()?);
            let span = self.span_from(start);
            return Ok(Expression::Conditional(ConditionalExpression {
                test: Box::new(test),
                consequent,
                alternate,
                span,
            }));
        }

        Ok(test)
    }

    /// Precedence climbing over binary and logical operators
    fn parse_binary_expression(&mut self, min_prec: u8) -> Result<Expression, JsError> {
        let start = self.current.span;
        let mut left = self.parse_unary_expression()?;

        while let Some((op, prec)) = self.current_binary_op() {
            if prec < min_prec {
                break;
            }
            self.advance();

            let right = Box::new(self.parse_binary_expression(prec + 1)?);
            let span = self.span_from(start);
            let left_box = Box::new(left);
            left = match op {
                BinaryOrLogical::Logical(operator) => Expression::Logical(LogicalExpression {
                    operator,
                    left: left_box,
                    right,
                    span,
                }),
                BinaryOrLogical::Binary(operator) => Expression::Binary(BinaryExpression {
                    operator,
                    left: left_box,
                    right,
                    span,
                }),
            };
        }

        Ok(left)
    }

    fn parse_unary_expression(&mut self) -> Result<Expression, JsError> {
        let start = self.current.span;

        if let Some(operator) = self.current_unary_op() {
            self.advance();
            let argument = Box::new(self.parse_unary_expression()?);

            if operator == UnaryOp::Delete
                && self.strict()
                && let Expression::Identifier(id) = argument.unparenthesized()
            {
                return Err(Self::error_at(
                    &format!(
                        "Delete of an unqualified identifier '{}' in strict mode",
                        id.name
                    ),
                    id.span,
                ));
            }

            let span = self.span_from(start);
            return Ok(Expression::Unary(UnaryExpression {
                operator,
                argument,
                span,
            }));
        }

        if let Some(operator) = self.current_update_op() {
            self.advance();
            let argument = self.parse_unary_expression()?;
            self.check_simple_target(
                &argument,
                "Invalid left-hand side expression in prefix operation",
            )?;
            let span = self.span_from(start);
            return Ok(Expression::Update(UpdateExpression {
                operator,
                argument: Box::new(argument),
                prefix: true,
                span,
            }));
        }

        self.parse_postfix_expression()
    }

    fn parse_postfix_expression(&mut self) -> Result<Expression, JsError> {
        let start = self.current.span;
        let expr = self.parse_left_hand_side_expression()?;

        if !self.lexer.had_newline_before()
            && let Some(operator) = self.current_update_op()
        {
            self.check_simple_target(
                &expr,
                "Invalid left-hand side expression in postfix operation",
            )?;
            self.advance();
            let span = self.span_from(start);
            return Ok(Expression::Update(UpdateExpression {
                operator,
                argument: Box::new(expr),
                prefix: false,
                span,
            }));
        }

        Ok(expr)
    }

    /// Member accesses and calls
    fn parse_left_hand_side_expression(&mut self) -> Result<Expression, JsError> {
        let start = self.current.span;
        let mut expr = self.parse_new_or_member_expression()?;

        loop {
            if self.check(&TokenKind::LParen) {
                let arguments = self.parse_arguments()?;
                let span = self.span_from(start);
                expr = Expression::Call(CallExpression {
                    callee: Box::new(expr),
                    arguments,
                    span,
                });
            } else if let Some(property) = self.parse_member_suffix()? {
                let span = self.span_from(start);
                expr = Expression::Member(MemberExpression {
                    object: Box::new(expr),
                    property,
                    span,
                });
            } else {
                break;
            }
        }

        Ok(expr)
    }

    /// `new` expressions and member accesses, no calls
    fn parse_new_or_member_expression(&mut self) -> Result<Expression, JsError> {
        let start = self.current.span;

        let mut expr = if self.match_token(&TokenKind::New) {
            let callee = Box::new(self.parse_new_or_member_expression()?);
            let arguments = if self.check(&TokenKind::LParen) {
                self.parse_arguments()?
            } else {
                vec![]
            };
            let span = self.span_from(start);
            Expression::New(NewExpression {
                callee,
                arguments,
                span,
            })
        } else {
            self.parse_primary_expression()?
        };

        while let Some(property) = self.parse_member_suffix()? {
            let span = self.span_from(start);
            expr = Expression::Member(MemberExpression {
                object: Box::new(expr),
                property,
                span,
            });
        }

        Ok(expr)
    }

    /// `.name` or `[expr]`
    fn parse_member_suffix(&mut self) -> Result<Option<MemberProperty>, JsError> {
        if self.match_token(&TokenKind::Dot) {
            Ok(Some(MemberProperty::Identifier(self.parse_identifier_name()?)))
        } else if self.match_token(&TokenKind::LBracket) {
            let property = self.allow_in(|p| p.parse_expression())?;
            self.require_token(&TokenKind::RBracket)?;
            Ok(Some(MemberProperty::Expression(Box::new(property))))
        } else {
            Ok(None)
        }
    }

    fn parse_arguments(&mut self) -> Result<Vec<Expression>, JsError> {
        self.require_token(&TokenKind::LParen)?;
        let mut arguments = vec![];

        self.allow_in(|p| {
            while !p.check(&TokenKind::RParen) && !p.is_at_end() {
                if p.check(&TokenKind::DotDotDot) {
                    return Err(p.error("Spread arguments are not supported"));
                }
                arguments.push(p.parse_assignment_expression()?);
                if !p.match_token(&TokenKind::Comma) {
                    break;
                }
            }
            Ok(())
        })?;

        self.require_token(&TokenKind::RParen)?;
        Ok(arguments)
    }

    fn parse_primary_expression(&mut self) -> Result<Expression, JsError> {
        let span = self.current.span;

        match self.current.kind.clone() {
            TokenKind::Number(value) => {
                self.advance();
                Ok(Self::literal(LiteralValue::Number(value), span))
            }
            TokenKind::LegacyOctal(value) => {
                if self.strict() {
                    return Err(self.error("Octal literals are not allowed in strict mode"));
                }
                self.advance();
                Ok(Self::literal(LiteralValue::Number(value), span))
            }
            TokenKind::String(value) => {
                self.advance();
                Ok(Self::literal(LiteralValue::String(value), span))
            }
            TokenKind::True => {
                self.advance();
                Ok(Self::literal(LiteralValue::Boolean(true), span))
            }
            TokenKind::False => {
                self.advance();
                Ok(Self::literal(LiteralValue::Boolean(false), span))
            }
            TokenKind::Null => {
                self.advance();
                Ok(Self::literal(LiteralValue::Null, span))
            }
            TokenKind::This => {
                self.advance();
                Ok(Expression::This(span))
            }
            TokenKind::Identifier(_) => {
                if self.peek_is(&TokenKind::Arrow) {
                    let id = self.parse_identifier()?;
                    self.check_binding_name(&id, self.strict())?;
                    return self.parse_arrow_function(vec![Pattern::Identifier(id)], span);
                }
                let id = self.parse_identifier()?;
                if id.name == "arguments" {
                    self.note_arguments();
                }
                Ok(Expression::Identifier(id))
            }
            TokenKind::Super => self.parse_super(),
            TokenKind::LParen => self.parse_parenthesized_or_arrow(),
            TokenKind::LBracket => self.parse_array_literal(),
            TokenKind::LBrace => self.parse_object_literal(),
            TokenKind::Function => {
                self.advance();
                if self.check(&TokenKind::Star) {
                    return Err(self.error("Generator functions are not supported"));
                }
                let id = if self.check_identifier() {
                    Some(self.parse_identifier()?)
                } else {
                    None
                };
                let function = self.parse_function_rest(FunctionKind::Normal, span, id)?;
                Ok(Expression::Function(Box::new(function)))
            }
            TokenKind::Class => Ok(Expression::Class(Box::new(self.parse_class(false)?))),
            TokenKind::Slash | TokenKind::SlashEq => self.parse_regexp_literal(),
            TokenKind::Error(message) => Err(self.error(message)),
            _ => Err(self.unexpected_token("expression")),
        }
    }

    fn literal(value: LiteralValue, span: Span) -> Expression {
        Expression::Literal(Literal { value, span })
    }

    fn parse_regexp_literal(&mut self) -> Result<Expression, JsError> {
        let token = self.lexer.rescan_as_regexp(self.current.span);
        self.current = token;
        let span = self.current.span;

        let (pattern, flags) = match self.current.kind.clone() {
            TokenKind::RegExp(pattern, flags) => (pattern, flags),
            TokenKind::Error(message) => return Err(self.error(message)),
            _ => return Err(self.unexpected_token("regular expression")),
        };

        let mut seen = String::new();
        for flag in flags.chars() {
            if !matches!(flag, 'g' | 'i' | 'm') || seen.contains(flag) {
                return Err(Self::error_at(
                    &format!("Invalid regular expression flags '{}'", flags),
                    span,
                ));
            }
            seen.push(flag);
        }

        #[cfg(feature = "regex")]
        if let Err(e) = fancy_regex::Regex::new(&pattern.replace("\\/", "/")) {
            return Err(Self::error_at(
                &format!("Invalid regular expression: /{}/: {}", pattern, e),
                span,
            ));
        }

        self.advance();
        Ok(Self::literal(LiteralValue::RegExp { pattern, flags }, span))
    }

    fn parse_super(&mut self) -> Result<Expression, JsError> {
        let start = self.current.span;
        self.require_token(&TokenKind::Super)?;
        self.note_super(start)?;

        if self.check(&TokenKind::LParen) {
            let arguments = self.parse_arguments()?;
            let span = self.span_from(start);
            return Ok(Expression::SuperCall(SuperCallExpression { arguments, span }));
        }

        match self.parse_member_suffix()? {
            Some(property) => {
                let span = self.span_from(start);
                Ok(Expression::SuperMember(SuperMemberExpression { property, span }))
            }
            None => Err(Self::error_at("'super' keyword unexpected here", start)),
        }
    }

    fn parse_array_literal(&mut self) -> Result<Expression, JsError> {
        let start = self.current.span;
        self.require_token(&TokenKind::LBracket)?;

        let mut elements = vec![];
        let mut spread = None;

        self.allow_in(|p| {
            while !p.check(&TokenKind::RBracket) && !p.is_at_end() {
                if p.match_token(&TokenKind::Comma) {
                    elements.push(None);
                    continue;
                }

                if p.check(&TokenKind::DotDotDot) {
                    let spread_span = p.current.span;
                    p.advance();
                    let target = p.parse_assignment_expression()?;
                    if !p.check(&TokenKind::RBracket) {
                        return Err(Self::error_at(
                            "Spread elements are not supported",
                            spread_span,
                        ));
                    }
                    if p.cover_error.is_none() {
                        p.cover_error = Some((spread_span, "Spread elements are not supported"));
                    }
                    spread = Some(Box::new(target));
                    break;
                }

                elements.push(Some(p.parse_assignment_expression()?));

                if !p.check(&TokenKind::RBracket) {
                    p.require_token(&TokenKind::Comma)?;
                }
            }
            Ok(())
        })?;

        self.require_token(&TokenKind::RBracket)?;
        let span = self.span_from(start);
        Ok(Expression::Array(ArrayExpression {
            elements,
            spread,
            span,
        }))
    }

    fn parse_object_literal(&mut self) -> Result<Expression, JsError> {
        let start = self.current.span;
        self.require_token(&TokenKind::LBrace)?;

        let mut properties = vec![];
        self.allow_in(|p| {
            while !p.check(&TokenKind::RBrace) && !p.is_at_end() {
                properties.push(p.parse_property()?);
                if !p.match_token(&TokenKind::Comma) {
                    break;
                }
            }
            Ok(())
        })?;

        self.require_token(&TokenKind::RBrace)?;
        let span = self.span_from(start);
        Ok(Expression::Object(ObjectExpression { properties, span }))
    }

    fn parse_property(&mut self) -> Result<Property, JsError> {
        let start = self.current.span;

        if (self.check_keyword("get") || self.check_keyword("set"))
            && !matches!(
                self.peek_kind(),
                TokenKind::Colon
                    | TokenKind::LParen
                    | TokenKind::Comma
                    | TokenKind::RBrace
                    | TokenKind::Eq
            )
        {
            let is_getter = self.check_keyword("get");
            self.advance();
            let key = self.parse_property_name()?;
            let kind = if is_getter {
                FunctionKind::Getter
            } else {
                FunctionKind::Setter
            };
            let function = Box::new(self.parse_function_rest(kind, start, None)?);
            let value = if is_getter {
                PropertyValue::Get(function)
            } else {
                PropertyValue::Set(function)
            };
            let span = self.span_from(start);
            return Ok(Property {
                key,
                value,
                shorthand: false,
                span,
            });
        }

        if self.check(&TokenKind::Star) {
            return Err(self.error("Generator methods are not supported"));
        }

        let key_is_identifier = self.check_identifier();
        let key = self.parse_property_name()?;

        let (value, shorthand) = if self.check(&TokenKind::LParen) {
            let function = self.parse_function_rest(FunctionKind::Method, start, None)?;
            (PropertyValue::Method(Box::new(function)), false)
        } else if self.match_token(&TokenKind::Colon) {
            (PropertyValue::Init(self.parse_assignment_expression()?), false)
        } else {
            let id = match &key {
                PropertyName::Identifier(id) if key_is_identifier => id.clone(),
                _ => return Err(self.unexpected_token("':'")),
            };
            if id.name == "arguments" {
                self.note_arguments();
            }
            let reference = Expression::Identifier(id.clone());
            if self.check(&TokenKind::Eq) {
                // `{ a = 1 }` is only meaningful as a destructuring target
                let eq_span = self.current.span;
                self.advance();
                let default = self.parse_assignment_expression()?;
                if self.cover_error.is_none() {
                    self.cover_error = Some((eq_span, "Invalid shorthand property initializer"));
                }
                let span = self.span_from(start);
                let assign = Expression::Assignment(AssignmentExpression {
                    operator: AssignmentOp::Assign,
                    left: AssignmentTarget::Simple(Box::new(reference)),
                    right: Box::new(default),
                    span,
                });
                (PropertyValue::Init(assign), true)
            } else {
                (PropertyValue::Init(reference), true)
            }
        };

        let span = self.span_from(start);
        Ok(Property {
            key,
            value,
            shorthand,
            span,
        })
    }

    fn parse_parenthesized_or_arrow(&mut self) -> Result<Expression, JsError> {
        let start = self.current.span;

        let lexer_checkpoint = self.lexer.checkpoint();
        let saved_current = self.current.clone();
        let saved_previous = self.previous.clone();
        let saved_cover = self.cover_error;

        self.require_token(&TokenKind::LParen)?;

        if let Ok(params) = self.allow_in(|p| p.parse_formal_parameters())
            && self.check(&TokenKind::Arrow)
            && !self.lexer.had_newline_before()
        {
            return self.parse_arrow_function(params, start);
        }

        // Not an arrow, reparse as a parenthesized expression
        self.lexer.restore(lexer_checkpoint);
        self.current = saved_current;
        self.previous = saved_previous;
        self.cover_error = saved_cover;

        self.require_token(&TokenKind::LParen)?;
        let expr = self.allow_in(|p| p.parse_sequence_expression())?;
        self.require_token(&TokenKind::RParen)?;

        let span = self.span_from(start);
        Ok(Expression::Parenthesized(Box::new(expr), span))
    }

    /// Arrow body after its parameters; the current token is `=>`
    fn parse_arrow_function(
        &mut self,
        params: Vec<Pattern>,
        start: Span,
    ) -> Result<Expression, JsError> {
        self.require_token(&TokenKind::Arrow)?;

        let parent_strict = self.strict();
        self.functions
            .push(FunctionContext::new(Some(FunctionKind::Arrow), parent_strict));
        let saved_cover = self.cover_error.take();

        let result = if self.check(&TokenKind::LBrace) {
            let saved_no_in = std::mem::replace(&mut self.no_in, false);
            let body = self.parse_function_body();
            self.no_in = saved_no_in;
            body.map(FunctionBody::Block)
        } else {
            self.parse_assignment_expression()
                .map(|e| FunctionBody::Expression(Box::new(e)))
        };

        self.cover_error = saved_cover;
        let Some(ctx) = self.functions.pop() else {
            return Err(JsError::internal_error("function context stack underflow"));
        };
        let body = result?;

        let function = Function {
            id: None,
            params,
            body,
            kind: FunctionKind::Arrow,
            strict: ctx.strict,
            uses_super: ctx.uses_super,
            uses_arguments: ctx.uses_arguments,
            span: self.span_from(start),
        };
        self.validate_function(&function, ctx.has_use_strict)?;
        Ok(Expression::ArrowFunction(Box::new(function)))
    }

    /// Mark `arguments` use on the nearest non-arrow function and the arrows
    /// in between
    fn note_arguments(&mut self) {
        for ctx in self.functions.iter_mut().rev() {
            ctx.uses_arguments = true;
            if ctx.kind != Some(FunctionKind::Arrow) {
                break;
            }
        }
    }

    fn note_super(&mut self, span: Span) -> Result<(), JsError> {
        let allowed = self
            .functions
            .iter()
            .rev()
            .find(|ctx| ctx.kind != Some(FunctionKind::Arrow))
            .is_some_and(|ctx| {
                matches!(
                    ctx.kind,
                    Some(
                        FunctionKind::Method
                            | FunctionKind::Getter
                            | FunctionKind::Setter
                            | FunctionKind::ClassConstructor
                    )
                )
            });
        if !allowed {
            return Err(Self::error_at("'super' keyword unexpected here", span));
        }
        for ctx in self.functions.iter_mut().rev() {
            ctx.uses_super = true;
            if ctx.kind != Some(FunctionKind::Arrow) {
                break;
            }
        }
        Ok(())
    }

    // ============ HELPERS ============

    fn parse_identifier(&mut self) -> Result<Identifier, JsError> {
        match &self.current.kind {
            TokenKind::Identifier(name) => {
                let id = Identifier {
                    name: name.clone(),
                    span: self.current.span,
                };
                self.advance();
                Ok(id)
            }
            _ => Err(self.unexpected_token("identifier")),
        }
    }

    /// Identifier or keyword, as after `.`
    fn parse_identifier_name(&mut self) -> Result<Identifier, JsError> {
        if let Some(text) = self.current.kind.keyword_text() {
            let span = self.current.span;
            let name = self.intern(text);
            self.advance();
            return Ok(Identifier { name, span });
        }
        self.parse_identifier()
    }

    fn parse_property_name(&mut self) -> Result<PropertyName, JsError> {
        let span = self.current.span;
        match self.current.kind.clone() {
            TokenKind::String(value) => {
                self.advance();
                Ok(PropertyName::String(value, span))
            }
            TokenKind::Number(value) => {
                self.advance();
                Ok(PropertyName::Number(value, span))
            }
            TokenKind::LegacyOctal(value) => {
                if self.strict() {
                    return Err(self.error("Octal literals are not allowed in strict mode"));
                }
                self.advance();
                Ok(PropertyName::Number(value, span))
            }
            TokenKind::LBracket => {
                self.advance();
                let expr = self.allow_in(|p| p.parse_assignment_expression())?;
                self.require_token(&TokenKind::RBracket)?;
                Ok(PropertyName::Computed(Box::new(expr)))
            }
            _ => Ok(PropertyName::Identifier(self.parse_identifier_name()?)),
        }
    }

    /// Reinterpret an already-parsed expression as an assignment pattern
    fn expression_to_pattern(&self, expr: &Expression) -> Result<Pattern, JsError> {
        match expr {
            Expression::Identifier(_)
            | Expression::Member(_)
            | Expression::SuperMember(_)
            | Expression::Parenthesized(..) => {
                self.check_simple_target(expr, "Invalid destructuring assignment target")?;
                match expr.unparenthesized() {
                    Expression::Identifier(id) => Ok(Pattern::Identifier(id.clone())),
                    other => Ok(Pattern::Expression(Box::new(other.clone()))),
                }
            }
            Expression::Object(obj) => {
                let properties = obj
                    .properties
                    .iter()
                    .map(|prop| {
                        let value = match &prop.value {
                            PropertyValue::Init(value) => self.expression_to_pattern(value)?,
                            _ => {
                                return Err(Self::error_at(
                                    "Invalid destructuring assignment target",
                                    prop.span,
                                ));
                            }
                        };
                        Ok(ObjectPatternProperty {
                            key: prop.key.clone(),
                            value,
                            shorthand: prop.shorthand,
                            span: prop.span,
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()?;

                Ok(Pattern::Object(ObjectPattern {
                    properties,
                    span: obj.span,
                }))
            }
            Expression::Array(arr) => {
                let mut elements = arr
                    .elements
                    .iter()
                    .map(|elem| {
                        elem.as_ref()
                            .map(|e| self.expression_to_pattern(e))
                            .transpose()
                    })
                    .collect::<Result<Vec<_>, _>>()?;

                if let Some(target) = &arr.spread {
                    let argument = self.expression_to_pattern(target)?;
                    if matches!(argument, Pattern::Assignment(_)) {
                        return Err(Self::error_at(
                            "Rest element may not have a default initializer",
                            target.span(),
                        ));
                    }
                    elements.push(Some(Pattern::Rest(RestElement {
                        argument: Box::new(argument),
                        span: target.span(),
                    })));
                }

                Ok(Pattern::Array(ArrayPattern {
                    elements,
                    span: arr.span,
                }))
            }
            Expression::Assignment(assign) if assign.operator == AssignmentOp::Assign => {
                let left = match &assign.left {
                    AssignmentTarget::Simple(target) => self.expression_to_pattern(target)?,
                    AssignmentTarget::Pattern(pattern) => pattern.clone(),
                };
                Ok(Pattern::Assignment(AssignmentPattern {
                    left: Box::new(left),
                    right: assign.right.clone(),
                    span: assign.span,
                }))
            }
            _ => Err(Self::error_at(
                "Invalid destructuring assignment target",
                expr.span(),
            )),
        }
    }

    /// Identifier, member or super member, possibly parenthesized
    fn check_simple_target(&self, expr: &Expression, message: &str) -> Result<(), JsError> {
        match expr.unparenthesized() {
            Expression::Identifier(id) => {
                if self.strict() && (id.name == "eval" || id.name == "arguments") {
                    return Err(Self::error_at(
                        &format!("Unexpected '{}' in strict mode", id.name),
                        id.span,
                    ));
                }
                Ok(())
            }
            Expression::Member(_) | Expression::SuperMember(_) => Ok(()),
            _ => Err(Self::error_at(message, expr.span())),
        }
    }

    fn allow_in<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, JsError>,
    ) -> Result<T, JsError> {
        let saved = std::mem::replace(&mut self.no_in, false);
        let result = f(self);
        self.no_in = saved;
        result
    }

    fn without_in<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, JsError>,
    ) -> Result<T, JsError> {
        let saved = std::mem::replace(&mut self.no_in, true);
        let result = f(self);
        self.no_in = saved;
        result
    }

    fn advance(&mut self) {
        self.previous = std::mem::replace(&mut self.current, self.lexer.next_token());
    }

    fn require_token(&mut self, kind: &TokenKind) -> Result<(), JsError> {
        if self.check(kind) {
            self.advance();
            Ok(())
        } else {
            Err(self.unexpected_token(&format!("{:?}", kind)))
        }
    }

    fn expect_semicolon(&mut self) -> Result<(), JsError> {
        if self.match_token(&TokenKind::Semicolon) {
            return Ok(());
        }

        // ASI: accept if at end, before }, or after newline
        if self.is_at_end() || self.check(&TokenKind::RBrace) || self.lexer.had_newline_before() {
            return Ok(());
        }

        Err(self.unexpected_token("';'"))
    }

    fn check(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(&self.current.kind) == std::mem::discriminant(kind)
    }

    /// Kind of the token after the current one
    fn peek_kind(&mut self) -> TokenKind {
        let checkpoint = self.lexer.checkpoint();
        let next = self.lexer.next_token();
        self.lexer.restore(checkpoint);
        next.kind
    }

    fn peek_is(&mut self, kind: &TokenKind) -> bool {
        std::mem::discriminant(&self.peek_kind()) == std::mem::discriminant(kind)
    }

    fn check_identifier(&self) -> bool {
        matches!(self.current.kind, TokenKind::Identifier(_))
    }

    fn check_keyword(&self, keyword: &str) -> bool {
        matches!(&self.current.kind, TokenKind::Identifier(s) if s == keyword)
    }

    fn match_token(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn is_at_end(&self) -> bool {
        self.current.kind == TokenKind::Eof
    }

    fn span_from(&self, start: Span) -> Span {
        Span::new(
            start.start,
            self.previous.span.end,
            start.line,
            start.column,
        )
    }

    fn error(&self, message: &str) -> JsError {
        JsError::syntax_error(message, self.current.span.line, self.current.span.column)
    }

    fn error_at(message: &str, span: Span) -> JsError {
        JsError::syntax_error(message, span.line, span.column)
    }

    fn unexpected_token(&self, expected: &str) -> JsError {
        if let TokenKind::Error(message) = self.current.kind {
            return self.error(message);
        }
        JsError::syntax_error(
            format!("Unexpected {:?}, expected {}", self.current.kind, expected),
            self.current.span.line,
            self.current.span.column,
        )
    }

    /// Operator and precedence of the current token in binary position
    fn current_binary_op(&self) -> Option<(BinaryOrLogical, u8)> {
        use BinaryOrLogical::{Binary, Logical};
        match &self.current.kind {
            TokenKind::PipePipe => Some((Logical(LogicalOp::Or), 4)),
            TokenKind::AmpAmp => Some((Logical(LogicalOp::And), 5)),
            TokenKind::Pipe => Some((Binary(BinaryOp::BitOr), 6)),
            TokenKind::Caret => Some((Binary(BinaryOp::BitXor), 7)),
            TokenKind::Amp => Some((Binary(BinaryOp::BitAnd), 8)),
            TokenKind::EqEq => Some((Binary(BinaryOp::Eq), 9)),
            TokenKind::BangEq => Some((Binary(BinaryOp::NotEq), 9)),
            TokenKind::EqEqEq => Some((Binary(BinaryOp::StrictEq), 9)),
            TokenKind::BangEqEq => Some((Binary(BinaryOp::StrictNotEq), 9)),
            TokenKind::Lt => Some((Binary(BinaryOp::Lt), 10)),
            TokenKind::LtEq => Some((Binary(BinaryOp::LtEq), 10)),
            TokenKind::Gt => Some((Binary(BinaryOp::Gt), 10)),
            TokenKind::GtEq => Some((Binary(BinaryOp::GtEq), 10)),
            TokenKind::In if !self.no_in => Some((Binary(BinaryOp::In), 10)),
            TokenKind::Instanceof => Some((Binary(BinaryOp::Instanceof), 10)),
            TokenKind::LtLt => Some((Binary(BinaryOp::LShift), 11)),
            TokenKind::GtGt => Some((Binary(BinaryOp::RShift), 11)),
            TokenKind::GtGtGt => Some((Binary(BinaryOp::URShift), 11)),
            TokenKind::Plus => Some((Binary(BinaryOp::Add), 12)),
            TokenKind::Minus => Some((Binary(BinaryOp::Sub), 12)),
            TokenKind::Star => Some((Binary(BinaryOp::Mul), 13)),
            TokenKind::Slash => Some((Binary(BinaryOp::Div), 13)),
            TokenKind::Percent => Some((Binary(BinaryOp::Mod), 13)),
            _ => None,
        }
    }

    fn current_unary_op(&self) -> Option<UnaryOp> {
        match &self.current.kind {
            TokenKind::Minus => Some(UnaryOp::Minus),
            TokenKind::Plus => Some(UnaryOp::Plus),
            TokenKind::Bang => Some(UnaryOp::Not),
            TokenKind::Tilde => Some(UnaryOp::BitNot),
            TokenKind::Typeof => Some(UnaryOp::Typeof),
            TokenKind::Void => Some(UnaryOp::Void),
            TokenKind::Delete => Some(UnaryOp::Delete),
            _ => None,
        }
    }

    fn current_update_op(&self) -> Option<UpdateOp> {
        match &self.current.kind {
            TokenKind::PlusPlus => Some(UpdateOp::Increment),
            TokenKind::MinusMinus => Some(UpdateOp::Decrement),
            _ => None,
        }
    }

    fn current_assignment_op(&self) -> Option<AssignmentOp> {
        match &self.current.kind {
            TokenKind::Eq => Some(AssignmentOp::Assign),
            TokenKind::PlusEq => Some(AssignmentOp::AddAssign),
            TokenKind::MinusEq => Some(AssignmentOp::SubAssign),
            TokenKind::StarEq => Some(AssignmentOp::MulAssign),
            TokenKind::SlashEq => Some(AssignmentOp::DivAssign),
            TokenKind::PercentEq => Some(AssignmentOp::ModAssign),
            TokenKind::AmpEq => Some(AssignmentOp::BitAndAssign),
            TokenKind::PipeEq => Some(AssignmentOp::BitOrAssign),
            TokenKind::CaretEq => Some(AssignmentOp::BitXorAssign),
            TokenKind::LtLtEq => Some(AssignmentOp::LShiftAssign),
            TokenKind::GtGtEq => Some(AssignmentOp::RShiftAssign),
            TokenKind::GtGtGtEq => Some(AssignmentOp::URShiftAssign),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum BinaryOrLogical {
    Binary(BinaryOp),
    Logical(LogicalOp),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> Program {
        let mut dict = StringDict::new();
        Parser::new(source, &mut dict).parse_program().unwrap()
    }

    fn parse_err(source: &str) -> String {
        let mut dict = StringDict::new();
        match Parser::new(source, &mut dict).parse_program() {
            Ok(_) => panic!("expected a syntax error for {:?}", source),
            Err(e) => e.message().to_string(),
        }
    }

    fn first_expression(program: &Program) -> &Expression {
        match program.body.first() {
            Some(Statement::Expression(stmt)) => &stmt.expression,
            other => panic!("expected expression statement, got {:?}", other),
        }
    }

    #[test]
    fn test_variable_declaration() {
        let prog = parse("var x = 1, y; let [a, , b = 2] = arr; const {c, d: e} = obj;");
        assert_eq!(prog.body.len(), 3);
        match prog.body.first() {
            Some(Statement::VariableDeclaration(decl)) => {
                assert_eq!(decl.kind, VariableKind::Var);
                assert_eq!(decl.declarations.len(), 2);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_precedence() {
        let prog = parse("1 + 2 * 3 || a && b;");
        let Expression::Logical(or) = first_expression(&prog) else {
            panic!("expected logical or");
        };
        assert_eq!(or.operator, LogicalOp::Or);
        let Expression::Binary(add) = or.left.as_ref() else {
            panic!("expected addition");
        };
        assert_eq!(add.operator, BinaryOp::Add);
        assert!(matches!(add.right.as_ref(), Expression::Binary(m) if m.operator == BinaryOp::Mul));
    }

    #[test]
    fn test_arrow_functions() {
        let prog = parse("var f = (a, b = 1, ...rest) => a; var g = x => { return x; };");
        assert_eq!(prog.body.len(), 2);
        let prog = parse("(a, b);");
        assert!(matches!(
            first_expression(&prog),
            Expression::Parenthesized(inner, _) if matches!(inner.as_ref(), Expression::Sequence(_))
        ));
    }

    #[test]
    fn test_destructuring_assignment() {
        let prog = parse("[a, {b, c: d = 1}, ...rest] = value;");
        let Expression::Assignment(assign) = first_expression(&prog) else {
            panic!("expected assignment");
        };
        let AssignmentTarget::Pattern(Pattern::Array(arr)) = &assign.left else {
            panic!("expected array pattern");
        };
        assert_eq!(arr.elements.len(), 3);
        assert!(matches!(arr.elements.last(), Some(Some(Pattern::Rest(_)))));
    }

    #[test]
    fn test_shorthand_default_only_in_patterns() {
        parse("({a = 1} = {});");
        assert_eq!(parse_err("({a = 1});"), "Invalid shorthand property initializer");
        assert_eq!(parse_err("[...a];"), "Spread elements are not supported");
    }

    #[test]
    fn test_strict_mode_errors() {
        assert!(parse_err("'use strict'; with (a) {}").contains("with statement"));
        assert!(parse_err("'use strict'; var eval;").contains("eval"));
        assert!(parse_err("'use strict'; delete x;").contains("Delete"));
        assert!(parse_err("'use strict'; 010;").contains("Octal"));
        assert!(parse_err("function f(a, a) { 'use strict'; }").contains("Duplicate"));
        parse("function f(a, a) {} with (a) {} 010;");
    }

    #[test]
    fn test_directive_sets_strict() {
        assert!(parse("'use strict'; x;").strict);
        assert!(!parse("x; 'use strict';").strict);
        let prog = parse("function f() { 'use strict'; }");
        let Some(Statement::FunctionDeclaration(f)) = prog.body.first() else {
            panic!("expected function");
        };
        assert!(f.strict);
    }

    #[test]
    fn test_class_declaration() {
        let prog = parse(
            "class A extends B { constructor(x) { super(x); } static make() {} get v() { return super.v; } }",
        );
        let Some(Statement::ClassDeclaration(class)) = prog.body.first() else {
            panic!("expected class");
        };
        assert!(class.super_class.is_some());
        assert!(class.constructor.is_some());
        assert_eq!(class.members.len(), 2);
        assert!(class.members.iter().any(|m| m.is_static));
        assert!(class.members.iter().all(|m| m.function.strict));
    }

    #[test]
    fn test_super_placement() {
        assert!(parse_err("function f() { super.x; }").contains("super"));
        assert!(parse_err("super.x;").contains("super"));
        parse("var o = { m() { return () => super.m(); } };");
    }

    #[test]
    fn test_uses_arguments_propagates_through_arrows() {
        let prog = parse("function f() { return () => arguments[0]; }");
        let Some(Statement::FunctionDeclaration(f)) = prog.body.first() else {
            panic!("expected function");
        };
        assert!(f.uses_arguments);
    }

    #[test]
    fn test_asi_restricted_productions() {
        let prog = parse("function f() { return\n1 }");
        let Some(Statement::FunctionDeclaration(f)) = prog.body.first() else {
            panic!("expected function");
        };
        let FunctionBody::Block(body) = &f.body else {
            panic!("expected block body");
        };
        assert!(matches!(
            body.body.first(),
            Some(Statement::Return(ReturnStatement { argument: None, .. }))
        ));
        assert!(parse_err("throw\nx").contains("newline"));
        let prog = parse("a\n++b");
        assert_eq!(prog.body.len(), 2);
    }

    #[test]
    fn test_for_in_heads() {
        let prog = parse("for (var k in o) {} for (k in o); for (a.b in o); for (var i = 0; i < n; i++) {}");
        assert!(matches!(prog.body.first(), Some(Statement::ForIn(_))));
        assert!(matches!(prog.body.get(3), Some(Statement::For(_))));
        assert!(parse_err("for (var a, b in o) {}").contains("single binding"));
    }

    #[test]
    fn test_regexp_literal() {
        let prog = parse("var r = /a[/]b/gi;");
        let Some(Statement::VariableDeclaration(decl)) = prog.body.first() else {
            panic!("expected declaration");
        };
        let init = decl.declarations.first().and_then(|d| d.init.as_ref());
        assert!(matches!(
            init,
            Some(Expression::Literal(Literal { value: LiteralValue::RegExp { .. }, .. }))
        ));
        assert!(parse_err("/a/gg;").contains("flags"));
    }

    #[test]
    fn test_rejected_surface() {
        assert!(parse_err("import x from 'y';").contains("not supported"));
        assert!(parse_err("f(...a);").contains("not supported"));
        assert!(parse_err("function* g() {}").contains("not supported"));
        assert!(parse_err("`t`;").contains("not supported"));
        assert!(parse_err("1 = 2;").contains("Invalid left-hand side"));
        assert!(parse_err("return 1;").contains("Illegal return"));
    }

    #[test]
    fn test_error_location() {
        let mut dict = StringDict::new();
        let err = Parser::new("var x = 1;\nvar = 2;", &mut dict)
            .parse_program()
            .unwrap_err();
        match err {
            JsError::SyntaxError { location, .. } => {
                assert_eq!(location.line, 2);
                assert_eq!(location.column, 5);
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
