//! Static semantics for declarations
//!
//! `var` names hoist to the enclosing function or script through every
//! statement form except nested functions and classes. Lexical declarations
//! (`let`, `const`, `class`, and function declarations inside blocks) belong
//! to the statement list that directly contains them.

use super::bytecode::{DeclarationKind, LexicalDeclaration};
use crate::ast::{
    ForInLeft, ForInit, Function, Identifier, Statement, VariableDeclaration, VariableKind,
};
use crate::error::JsError;
use crate::value::{CheapClone, JsString};

/// Declarations instantiated when a scope is entered
pub struct ScopeDeclarations<'a> {
    pub declarations: Vec<LexicalDeclaration>,
    /// Function declarations directly in the statement list, in source order
    pub functions: Vec<&'a Function>,
}

impl ScopeDeclarations<'_> {
    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty() && self.functions.is_empty()
    }
}

/// VarDeclaredNames of a statement list, deduplicated, in source order
pub fn var_declared_names<'a>(statements: impl IntoIterator<Item = &'a Statement>) -> Vec<JsString> {
    let mut names = Vec::new();
    for stmt in statements {
        collect_var_names(stmt, true, &mut names);
    }
    names
}

/// Collect hoisted vars from a single statement. `in_list` is false for a
/// statement in single-statement position (`if (x) function f() {}`), where
/// a function declaration behaves like a `var` assignment.
fn collect_var_names(stmt: &Statement, in_list: bool, names: &mut Vec<JsString>) {
    match stmt {
        Statement::VariableDeclaration(decl) => {
            if decl.kind == VariableKind::Var {
                push_declaration_names(decl, names);
            }
        }
        Statement::FunctionDeclaration(func) => {
            if !in_list && let Some(id) = &func.id {
                push_names(&[id], names);
            }
        }
        Statement::Block(block) => {
            for s in &block.body {
                collect_var_names(s, true, names);
            }
        }
        Statement::If(if_stmt) => {
            collect_var_names(&if_stmt.consequent, false, names);
            if let Some(alt) = &if_stmt.alternate {
                collect_var_names(alt, false, names);
            }
        }
        Statement::For(for_stmt) => {
            if let Some(ForInit::Variable(decl)) = &for_stmt.init
                && decl.kind == VariableKind::Var
            {
                push_declaration_names(decl, names);
            }
            collect_var_names(&for_stmt.body, false, names);
        }
        Statement::ForIn(for_in) => {
            if let ForInLeft::Variable(decl) = &for_in.left
                && decl.kind == VariableKind::Var
            {
                push_declaration_names(decl, names);
            }
            collect_var_names(&for_in.body, false, names);
        }
        Statement::While(w) => collect_var_names(&w.body, false, names),
        Statement::DoWhile(d) => collect_var_names(&d.body, false, names),
        Statement::With(w) => collect_var_names(&w.body, false, names),
        Statement::Labeled(l) => collect_var_names(&l.body, false, names),
        Statement::Switch(switch) => {
            for case in &switch.cases {
                for s in &case.consequent {
                    collect_var_names(s, true, names);
                }
            }
        }
        Statement::Try(try_stmt) => {
            for s in &try_stmt.block.body {
                collect_var_names(s, true, names);
            }
            if let Some(handler) = &try_stmt.handler {
                for s in &handler.body.body {
                    collect_var_names(s, true, names);
                }
            }
            if let Some(finalizer) = &try_stmt.finalizer {
                for s in &finalizer.body {
                    collect_var_names(s, true, names);
                }
            }
        }
        Statement::ClassDeclaration(_)
        | Statement::Return(_)
        | Statement::Break(_)
        | Statement::Continue(_)
        | Statement::Throw(_)
        | Statement::Expression(_)
        | Statement::Empty(_)
        | Statement::Debugger(_) => {}
    }
}

fn push_declaration_names(decl: &VariableDeclaration, names: &mut Vec<JsString>) {
    let mut ids = Vec::new();
    for declarator in &decl.declarations {
        declarator.id.collect_identifiers(&mut ids);
    }
    push_names(&ids, names);
}

fn push_names(ids: &[&Identifier], names: &mut Vec<JsString>) {
    for id in ids {
        if !names.contains(&id.name) {
            names.push(id.name.cheap_clone());
        }
    }
}

/// The single declaration of a `let`/`const` list
pub fn lexical_declaration(decl: &VariableDeclaration) -> Result<LexicalDeclaration, JsError> {
    let mut ids = Vec::new();
    for declarator in &decl.declarations {
        declarator.id.collect_identifiers(&mut ids);
    }
    check_duplicates(&ids, &[], &[])?;
    Ok(LexicalDeclaration {
        kind: declaration_kind(decl.kind),
        names: ids.iter().map(|id| id.name.cheap_clone()).collect(),
    })
}

fn declaration_kind(kind: VariableKind) -> DeclarationKind {
    if kind == VariableKind::Const {
        DeclarationKind::Const
    } else {
        DeclarationKind::Mutable
    }
}

/// Lexical declarations of one statement list
///
/// With `functions_lexical` set (blocks, switch bodies) function
/// declarations are block-scoped bindings; otherwise (function and script
/// bodies) they are only collected for hoisting and behave like `var`s.
/// Any lexical name that is declared twice, or that is also a `var`,
/// hoisted function or one of `conflicts`, is an early error.
pub fn scope_declarations<'a>(
    statements: impl IntoIterator<Item = &'a Statement>,
    functions_lexical: bool,
    conflicts: &[JsString],
) -> Result<ScopeDeclarations<'a>, JsError> {
    let mut declarations = Vec::new();
    let mut functions = Vec::new();
    let mut lexical: Vec<&'a Identifier> = Vec::new();
    let mut hoisted: Vec<&'a Identifier> = Vec::new();

    for stmt in statements {
        match stmt {
            Statement::VariableDeclaration(decl) if decl.kind != VariableKind::Var => {
                let mut ids = Vec::new();
                for declarator in &decl.declarations {
                    declarator.id.collect_identifiers(&mut ids);
                }
                declarations.push(LexicalDeclaration {
                    kind: declaration_kind(decl.kind),
                    names: ids.iter().map(|id| id.name.cheap_clone()).collect(),
                });
                lexical.extend(ids);
            }
            Statement::ClassDeclaration(class) => {
                if let Some(id) = &class.id {
                    declarations.push(LexicalDeclaration {
                        kind: DeclarationKind::Class,
                        names: vec![id.name.cheap_clone()],
                    });
                    lexical.push(id);
                }
            }
            Statement::FunctionDeclaration(func) => {
                functions.push(func.as_ref());
                if let Some(id) = &func.id {
                    if functions_lexical {
                        declarations.push(LexicalDeclaration {
                            kind: DeclarationKind::Function,
                            names: vec![id.name.cheap_clone()],
                        });
                        lexical.push(id);
                    } else {
                        hoisted.push(id);
                    }
                }
            }
            _ => {}
        }
    }

    check_duplicates(&lexical, &hoisted, conflicts)?;

    Ok(ScopeDeclarations {
        declarations,
        functions,
    })
}

fn check_duplicates(
    lexical: &[&Identifier],
    hoisted: &[&Identifier],
    conflicts: &[JsString],
) -> Result<(), JsError> {
    for (i, id) in lexical.iter().enumerate() {
        let duplicate = lexical.iter().take(i).any(|other| other.name == id.name)
            || hoisted.iter().any(|other| other.name == id.name)
            || conflicts.contains(&id.name);
        if duplicate {
            return Err(JsError::syntax_error(
                format!("Identifier '{}' has already been declared", id.name),
                id.span.line,
                id.span.column,
            ));
        }
    }
    Ok(())
}
