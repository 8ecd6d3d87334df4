//! Syntax tree types
//!
//! Nodes own their children. Function and class bodies are boxed so the
//! compiler's worklist can borrow them by reference while the enclosing
//! body is still being lowered.

use crate::lexer::Span;
use crate::value::{JsString, number_to_string};

/// A complete script
#[derive(Debug, Clone)]
pub struct Program {
    pub body: Vec<Statement>,
    /// The script starts with a `"use strict"` directive
    pub strict: bool,
    pub span: Span,
}

// ============ STATEMENTS ============

#[derive(Debug, Clone)]
pub enum Statement {
    // Declarations
    VariableDeclaration(VariableDeclaration),
    FunctionDeclaration(Box<Function>),
    ClassDeclaration(Box<Class>),

    // Control Flow
    Block(BlockStatement),
    If(IfStatement),
    Switch(SwitchStatement),
    For(ForStatement),
    ForIn(ForInStatement),
    While(WhileStatement),
    DoWhile(DoWhileStatement),
    Try(TryStatement),
    With(WithStatement),

    // Jump
    Return(ReturnStatement),
    Break(BreakStatement),
    Continue(ContinueStatement),
    Throw(ThrowStatement),

    // Other
    Expression(ExpressionStatement),
    Empty(Span),
    Debugger(Span),
    Labeled(LabeledStatement),
}

impl Statement {
    pub fn span(&self) -> Span {
        match self {
            Statement::VariableDeclaration(v) => v.span,
            Statement::FunctionDeclaration(f) => f.span,
            Statement::ClassDeclaration(c) => c.span,
            Statement::Block(b) => b.span,
            Statement::If(i) => i.span,
            Statement::Switch(s) => s.span,
            Statement::For(f) => f.span,
            Statement::ForIn(f) => f.span,
            Statement::While(w) => w.span,
            Statement::DoWhile(d) => d.span,
            Statement::Try(t) => t.span,
            Statement::With(w) => w.span,
            Statement::Return(r) => r.span,
            Statement::Break(b) => b.span,
            Statement::Continue(c) => c.span,
            Statement::Throw(t) => t.span,
            Statement::Expression(e) => e.span,
            Statement::Empty(s) | Statement::Debugger(s) => *s,
            Statement::Labeled(l) => l.span,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExpressionStatement {
    pub expression: Expression,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct BlockStatement {
    pub body: Vec<Statement>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct VariableDeclaration {
    pub kind: VariableKind,
    pub declarations: Vec<VariableDeclarator>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableKind {
    Let,
    Const,
    Var,
}

#[derive(Debug, Clone)]
pub struct VariableDeclarator {
    pub id: Pattern,
    pub init: Option<Expression>,
    pub span: Span,
}

/// Every function-valued node: declarations, expressions, arrows, methods,
/// accessors and class constructors.
#[derive(Debug, Clone)]
pub struct Function {
    pub id: Option<Identifier>,
    pub params: Vec<Pattern>,
    pub body: FunctionBody,
    pub kind: FunctionKind,
    /// Strict by directive, by nesting, or because it is part of a class
    pub strict: bool,
    /// The body (or a nested arrow) mentions `super`
    pub uses_super: bool,
    /// The body (or a nested arrow) mentions `arguments`
    pub uses_arguments: bool,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionKind {
    Normal,
    Arrow,
    Method,
    Getter,
    Setter,
    ClassConstructor,
}

#[derive(Debug, Clone)]
pub enum FunctionBody {
    Block(BlockStatement),
    /// Concise arrow body
    Expression(Box<Expression>),
}

impl Function {
    /// Parameters are plain identifiers with no defaults or rest element
    pub fn has_simple_params(&self) -> bool {
        self.params
            .iter()
            .all(|p| matches!(p, Pattern::Identifier(_)))
    }
}

#[derive(Debug, Clone)]
pub struct Class {
    pub id: Option<Identifier>,
    pub super_class: Option<Box<Expression>>,
    pub constructor: Option<Box<Function>>,
    pub members: Vec<ClassMember>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct ClassMember {
    pub key: PropertyName,
    pub kind: MethodKind,
    pub is_static: bool,
    pub function: Box<Function>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum MethodKind {
    Method,
    Get,
    Set,
}

#[derive(Debug, Clone)]
pub struct IfStatement {
    pub test: Expression,
    pub consequent: Box<Statement>,
    pub alternate: Option<Box<Statement>>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct SwitchStatement {
    pub discriminant: Expression,
    pub cases: Vec<SwitchCase>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct SwitchCase {
    pub test: Option<Expression>, // None for default
    pub consequent: Vec<Statement>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct ForStatement {
    pub init: Option<ForInit>,
    pub test: Option<Expression>,
    pub update: Option<Expression>,
    pub body: Box<Statement>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum ForInit {
    Variable(VariableDeclaration),
    Expression(Expression),
}

#[derive(Debug, Clone)]
pub struct ForInStatement {
    pub left: ForInLeft,
    pub right: Expression,
    pub body: Box<Statement>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum ForInLeft {
    /// Exactly one declarator without an initialiser
    Variable(VariableDeclaration),
    Pattern(Pattern),
}

#[derive(Debug, Clone)]
pub struct WhileStatement {
    pub test: Expression,
    pub body: Box<Statement>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct DoWhileStatement {
    pub body: Box<Statement>,
    pub test: Expression,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct TryStatement {
    pub block: BlockStatement,
    pub handler: Option<CatchClause>,
    pub finalizer: Option<BlockStatement>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct CatchClause {
    pub param: Pattern,
    pub body: BlockStatement,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct WithStatement {
    pub object: Expression,
    pub body: Box<Statement>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct ReturnStatement {
    pub argument: Option<Expression>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct BreakStatement {
    pub label: Option<Identifier>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct ContinueStatement {
    pub label: Option<Identifier>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct ThrowStatement {
    pub argument: Expression,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct LabeledStatement {
    pub label: Identifier,
    pub body: Box<Statement>,
    pub span: Span,
}

// ============ EXPRESSIONS ============

#[derive(Debug, Clone)]
pub enum Expression {
    // Literals
    Literal(Literal),
    Array(ArrayExpression),
    Object(ObjectExpression),
    Function(Box<Function>),
    ArrowFunction(Box<Function>),
    Class(Box<Class>),

    // Identifiers
    Identifier(Identifier),
    This(Span),

    // Operations
    Unary(UnaryExpression),
    Binary(BinaryExpression),
    Logical(LogicalExpression),
    Conditional(ConditionalExpression),
    Assignment(AssignmentExpression),
    Update(UpdateExpression),
    Sequence(SequenceExpression),

    // Access
    Member(MemberExpression),
    SuperMember(SuperMemberExpression),
    Call(CallExpression),
    SuperCall(SuperCallExpression),
    New(NewExpression),

    // Parenthesized (kept so `(a) = 1` and `(a, b) => 1` can be told apart)
    Parenthesized(Box<Expression>, Span),
}

impl Expression {
    pub fn span(&self) -> Span {
        match self {
            Expression::Literal(l) => l.span,
            Expression::Array(a) => a.span,
            Expression::Object(o) => o.span,
            Expression::Function(f) | Expression::ArrowFunction(f) => f.span,
            Expression::Class(c) => c.span,
            Expression::Identifier(i) => i.span,
            Expression::This(s) => *s,
            Expression::Unary(u) => u.span,
            Expression::Binary(b) => b.span,
            Expression::Logical(l) => l.span,
            Expression::Conditional(c) => c.span,
            Expression::Assignment(a) => a.span,
            Expression::Update(u) => u.span,
            Expression::Sequence(s) => s.span,
            Expression::Member(m) => m.span,
            Expression::SuperMember(m) => m.span,
            Expression::Call(c) => c.span,
            Expression::SuperCall(c) => c.span,
            Expression::New(n) => n.span,
            Expression::Parenthesized(_, s) => *s,
        }
    }

    /// Strip any number of grouping parentheses
    pub fn unparenthesized(&self) -> &Expression {
        let mut expr = self;
        while let Expression::Parenthesized(inner, _) = expr {
            expr = inner;
        }
        expr
    }
}

#[derive(Debug, Clone)]
pub struct Literal {
    pub value: LiteralValue,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LiteralValue {
    Null,
    Boolean(bool),
    Number(f64),
    String(JsString),
    RegExp { pattern: String, flags: String },
}

#[derive(Debug, Clone)]
pub struct Identifier {
    pub name: JsString,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct ArrayExpression {
    /// `None` is a hole
    pub elements: Vec<Option<Expression>>,
    /// Trailing `...target`; only valid once the literal is reinterpreted
    /// as a destructuring assignment pattern
    pub spread: Option<Box<Expression>>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct ObjectExpression {
    pub properties: Vec<Property>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct Property {
    pub key: PropertyName,
    pub value: PropertyValue,
    pub shorthand: bool,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum PropertyValue {
    Init(Expression),
    Method(Box<Function>),
    Get(Box<Function>),
    Set(Box<Function>),
}

/// Key of an object literal entry, class member or object pattern entry
#[derive(Debug, Clone)]
pub enum PropertyName {
    Identifier(Identifier),
    String(JsString, Span),
    Number(f64, Span),
    Computed(Box<Expression>),
}

#[derive(Debug, Clone)]
pub struct UnaryExpression {
    pub operator: UnaryOp,
    pub argument: Box<Expression>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum UnaryOp {
    Minus,  // -
    Plus,   // +
    Not,    // !
    BitNot, // ~
    Typeof, // typeof
    Void,   // void
    Delete, // delete
}

#[derive(Debug, Clone)]
pub struct BinaryExpression {
    pub operator: BinaryOp,
    pub left: Box<Expression>,
    pub right: Box<Expression>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum BinaryOp {
    // Arithmetic
    Add, // +
    Sub, // -
    Mul, // *
    Div, // /
    Mod, // %

    // Comparison
    Eq,          // ==
    NotEq,       // !=
    StrictEq,    // ===
    StrictNotEq, // !==
    Lt,          // <
    LtEq,        // <=
    Gt,          // >
    GtEq,        // >=

    // Bitwise
    BitAnd,  // &
    BitOr,   // |
    BitXor,  // ^
    LShift,  // <<
    RShift,  // >>
    URShift, // >>>

    // Other
    In,         // in
    Instanceof, // instanceof
}

#[derive(Debug, Clone)]
pub struct LogicalExpression {
    pub operator: LogicalOp,
    pub left: Box<Expression>,
    pub right: Box<Expression>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And, // &&
    Or,  // ||
}

#[derive(Debug, Clone)]
pub struct ConditionalExpression {
    pub test: Box<Expression>,
    pub consequent: Box<Expression>,
    pub alternate: Box<Expression>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct AssignmentExpression {
    pub operator: AssignmentOp,
    pub left: AssignmentTarget,
    pub right: Box<Expression>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum AssignmentTarget {
    /// Identifier, member or super member expression
    Simple(Box<Expression>),
    /// Destructuring target, only with `=`
    Pattern(Pattern),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignmentOp {
    Assign,        // =
    AddAssign,     // +=
    SubAssign,     // -=
    MulAssign,     // *=
    DivAssign,     // /=
    ModAssign,     // %=
    BitAndAssign,  // &=
    BitOrAssign,   // |=
    BitXorAssign,  // ^=
    LShiftAssign,  // <<=
    RShiftAssign,  // >>=
    URShiftAssign, // >>>=
}

impl AssignmentOp {
    /// The binary operator a compound assignment applies
    pub fn binary_op(self) -> Option<BinaryOp> {
        Some(match self {
            AssignmentOp::Assign => return None,
            AssignmentOp::AddAssign => BinaryOp::Add,
            AssignmentOp::SubAssign => BinaryOp::Sub,
            AssignmentOp::MulAssign => BinaryOp::Mul,
            AssignmentOp::DivAssign => BinaryOp::Div,
            AssignmentOp::ModAssign => BinaryOp::Mod,
            AssignmentOp::BitAndAssign => BinaryOp::BitAnd,
            AssignmentOp::BitOrAssign => BinaryOp::BitOr,
            AssignmentOp::BitXorAssign => BinaryOp::BitXor,
            AssignmentOp::LShiftAssign => BinaryOp::LShift,
            AssignmentOp::RShiftAssign => BinaryOp::RShift,
            AssignmentOp::URShiftAssign => BinaryOp::URShift,
        })
    }
}

#[derive(Debug, Clone)]
pub struct UpdateExpression {
    pub operator: UpdateOp,
    pub argument: Box<Expression>,
    pub prefix: bool,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOp {
    Increment, // ++
    Decrement, // --
}

#[derive(Debug, Clone)]
pub struct SequenceExpression {
    pub expressions: Vec<Expression>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct MemberExpression {
    pub object: Box<Expression>,
    pub property: MemberProperty,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum MemberProperty {
    Identifier(Identifier),
    Expression(Box<Expression>),
}

/// `super.name` or `super[expr]`
#[derive(Debug, Clone)]
pub struct SuperMemberExpression {
    pub property: MemberProperty,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct CallExpression {
    pub callee: Box<Expression>,
    pub arguments: Vec<Expression>,
    pub span: Span,
}

/// `super(args)`
#[derive(Debug, Clone)]
pub struct SuperCallExpression {
    pub arguments: Vec<Expression>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct NewExpression {
    pub callee: Box<Expression>,
    pub arguments: Vec<Expression>,
    pub span: Span,
}

// ============ PATTERNS ============

#[derive(Debug, Clone)]
pub enum Pattern {
    Identifier(Identifier),
    Object(ObjectPattern),
    Array(ArrayPattern),
    Rest(RestElement),
    Assignment(AssignmentPattern),
    /// Member expression target, only in destructuring assignment
    Expression(Box<Expression>),
}

impl Pattern {
    pub fn span(&self) -> Span {
        match self {
            Pattern::Identifier(i) => i.span,
            Pattern::Object(o) => o.span,
            Pattern::Array(a) => a.span,
            Pattern::Rest(r) => r.span,
            Pattern::Assignment(a) => a.span,
            Pattern::Expression(e) => e.span(),
        }
    }

    /// BoundNames, in source order
    pub fn collect_identifiers<'p>(&'p self, out: &mut Vec<&'p Identifier>) {
        match self {
            Pattern::Identifier(id) => out.push(id),
            Pattern::Object(obj) => {
                for prop in &obj.properties {
                    prop.value.collect_identifiers(out);
                }
            }
            Pattern::Array(arr) => {
                for elem in arr.elements.iter().flatten() {
                    elem.collect_identifiers(out);
                }
            }
            Pattern::Rest(rest) => rest.argument.collect_identifiers(out),
            Pattern::Assignment(assign) => assign.left.collect_identifiers(out),
            Pattern::Expression(_) => {}
        }
    }
}

impl PropertyName {
    /// The key as a string when it is known without evaluation
    pub fn static_name(&self) -> Option<JsString> {
        match self {
            PropertyName::Identifier(id) => Some(id.name.clone()),
            PropertyName::String(s, _) => Some(s.clone()),
            PropertyName::Number(n, _) => Some(JsString::from(number_to_string(*n))),
            PropertyName::Computed(_) => None,
        }
    }

    pub fn span(&self) -> Span {
        match self {
            PropertyName::Identifier(id) => id.span,
            PropertyName::String(_, span) | PropertyName::Number(_, span) => *span,
            PropertyName::Computed(expr) => expr.span(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ObjectPattern {
    pub properties: Vec<ObjectPatternProperty>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct ObjectPatternProperty {
    pub key: PropertyName,
    pub value: Pattern,
    pub shorthand: bool,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct ArrayPattern {
    /// `None` is an elision
    pub elements: Vec<Option<Pattern>>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct RestElement {
    pub argument: Box<Pattern>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct AssignmentPattern {
    pub left: Box<Pattern>,
    pub right: Box<Expression>,
    pub span: Span,
}
