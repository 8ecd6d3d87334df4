//! Bytecode instruction set and Code objects
//!
//! The VM is a stack machine. Expressions leave either a reference or a
//! value on the operand stack and `GetValue` turns the former into the
//! latter, so the same producer serves reads, writes, `delete` and `typeof`.

use std::cell::OnceCell;
use std::fmt;
use std::rc::Rc;

use serde::{Serialize, Serializer};

use crate::ast::{BinaryOp, MethodKind, UnaryOp};
use crate::lexer::Span;
use crate::value::{JsString, JsValue};

/// Jump target (instruction offset)
pub type JumpTarget = u32;

/// Bytecode instruction
#[derive(Debug, Clone, Serialize)]
pub enum Op {
    // ═══════════════════════════════════════════════════════════════════════════════
    // Stack
    // ═══════════════════════════════════════════════════════════════════════════════
    /// Push undefined
    Undefined,

    /// Push a primitive constant
    Literal { value: JsValue },

    /// Push a fresh RegExp object
    RegExp { pattern: JsString, flags: JsString },

    /// Discard the top item
    Pop,

    /// Duplicate the top item (value or reference)
    DupTop,

    /// Move the top item below the next `n - 1` items
    Rotate { n: u32 },

    // ═══════════════════════════════════════════════════════════════════════════════
    // References
    // ═══════════════════════════════════════════════════════════════════════════════
    /// Push the identifier reference for `name` in the running lexical environment
    Resolve { name: JsString },

    /// Push the `this` value
    This,

    /// Pop a base value, push `base.name`
    Property { name: JsString },

    /// Pop a key and a base value, push `base[key]`
    Element,

    /// Push `super.name` with the current `this` as receiver
    PropertySuper { name: JsString },

    /// Pop a key, push `super[key]`
    ElementSuper,

    /// Push the reference `super(...)` calls: the home object's parent
    /// method of the same name, bound to the current `this`
    CallSuperSetup,

    /// Replace a reference on top with its value; values pass through
    GetValue,

    /// Pop a value and a reference, store, push the value back
    PutValue,

    /// Throw a TypeError if the top value is null or undefined (not popped)
    CheckObjectCoercible,

    // ═══════════════════════════════════════════════════════════════════════════════
    // Operators
    // ═══════════════════════════════════════════════════════════════════════════════
    /// Unary operator; `typeof` and `delete` inspect a reference operand
    Unary { op: UnaryOp },

    /// Pop right and left values, push the result
    Binary { op: BinaryOp },

    /// `++`/`--` on the reference on top; pushes the old or new number
    Update { prefix: bool, increment: bool },

    // ═══════════════════════════════════════════════════════════════════════════════
    // Control Flow
    // ═══════════════════════════════════════════════════════════════════════════════
    /// Unconditional jump
    Jump { target: JumpTarget },

    /// Pop a value; jump if its truthiness equals `test`
    PopJump { test: bool, target: JumpTarget },

    /// Jump keeping the value if its truthiness equals `test`, else pop it
    JumpPop { test: bool, target: JumpTarget },

    /// Pop a case value; if it strictly equals the discriminant below it,
    /// pop the discriminant too and jump
    SwitchCase { target: JumpTarget },

    /// Pop the discriminant and jump
    SwitchDefault { target: JumpTarget },

    /// Pop a value and throw it
    Throw,

    /// Push a subroutine marker holding the next pc and jump to a finally block
    Jsr { target: JumpTarget },

    /// Push the fall-through marker in front of a finally block
    EnterFinally,

    /// Pop the finally marker: continue, rethrow, or return from the subroutine
    EndFinally,

    /// Pop a value and return it
    Return,

    /// Pop a value into the completion slot
    PopResult,

    /// Return the completion slot
    ReturnResult,

    /// Breakpoint trap
    Debugger,

    // ═══════════════════════════════════════════════════════════════════════════════
    // Scopes
    // ═══════════════════════════════════════════════════════════════════════════════
    /// Push a declarative environment holding the block's lexical declarations;
    /// block-level functions are instantiated into it immediately
    BlockSetup {
        declarations: Vec<LexicalDeclaration>,
        functions: Vec<CodeRef>,
    },

    /// Pop an object and push an object environment over it
    WithSetup,

    /// Leave the innermost environment
    PopEnv,

    /// Pop a value and initialize `name`
    InitBinding { name: JsString, kind: BindingKind },

    // ═══════════════════════════════════════════════════════════════════════════════
    // Functions & Calls
    // ═══════════════════════════════════════════════════════════════════════════════
    /// Push a closure over the running lexical environment. A `name` gives a
    /// named function expression its own immutable self binding.
    BuildFunction {
        code: CodeRef,
        name: Option<JsString>,
    },

    /// Pop computed method keys (in order) and the superclass when
    /// `has_super`, push the class constructor. `name` is bound inside the
    /// class body; `display_name` also covers an inferred name.
    ClassDefinition {
        name: Option<JsString>,
        display_name: Option<JsString>,
        constructor: Option<CodeRef>,
        methods: Vec<ClassMethod>,
        has_super: bool,
    },

    /// Pop `argc` arguments, the fetched function and the callee reference
    /// or value it came from, push the result
    Call { argc: u32 },

    /// Pop `argc` arguments and a constructor, push the new object
    Construct { argc: u32 },

    /// Push the argument at `index` or undefined
    LoadArgument { index: u32 },

    /// Push an array of the arguments from `from` on
    RestArguments { from: u32 },

    // ═══════════════════════════════════════════════════════════════════════════════
    // Object & Array Literals
    // ═══════════════════════════════════════════════════════════════════════════════
    /// Push a new ordinary object
    ObjectSetup,

    /// Pop a value and define it as `name` on the object below
    ObjectDefine { name: JsString },

    /// Pop a value and a key and define the property on the object below
    ObjectDefineComputed,

    /// Define a method or accessor on the object on top
    ObjectDefineMethod {
        kind: MethodKind,
        key: MethodKey,
        code: CodeRef,
    },

    /// Push a new array and an element index
    ArraySetup,

    /// Pop a value and store it at the element index, advancing the index
    ArrayDefine,

    /// Advance the element index without storing
    ArrayHole,

    /// Pop the element index and set it as the array length
    ArrayCleanup,

    /// Pop an array-like value, push an array of its elements from `from`
    ArraySlice { from: u32 },

    // ═══════════════════════════════════════════════════════════════════════════════
    // Iteration
    // ═══════════════════════════════════════════════════════════════════════════════
    /// Pop a value, push an iterator over its enumerable property names
    ForInSetup,

    /// Push the next live key, or jump to `exit` when exhausted
    ForInNext { exit: JumpTarget },
}

/// Which environment `InitBinding` writes to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BindingKind {
    /// The variable environment of the running code
    Var,
    /// The innermost lexical environment
    Lexical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DeclarationKind {
    Const,
    Mutable,
    Class,
    Function,
}

/// Names bound by one `let`/`const`/`class`/block function declaration
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LexicalDeclaration {
    pub kind: DeclarationKind,
    pub names: Vec<JsString>,
}

/// Key of a method defined by an object literal or class body
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum MethodKey {
    Static(JsString),
    /// Evaluated beforehand and taken from the operand stack
    Computed,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClassMethod {
    pub key: MethodKey,
    pub kind: MethodKind,
    pub is_static: bool,
    pub code: CodeRef,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CodeKind {
    Global,
    Eval,
    Normal,
    Method,
    Arrow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum HandlerKind {
    /// Pop one environment and keep unwinding
    Env,
    Finally,
    Catch,
}

/// Protected region `[begin, end)`; catch and finally handlers resume at `end`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Handler {
    pub kind: HandlerKind,
    pub begin: JumpTarget,
    pub end: JumpTarget,
    /// Operand stack height to restore before resuming
    pub stack_depth: u32,
}

impl Handler {
    pub fn contains(&self, pc: usize) -> bool {
        (self.begin as usize) <= pc && pc < (self.end as usize)
    }
}

/// Formal parameter shape
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Params {
    /// Bound names in source order
    pub names: Vec<JsString>,
    /// Parameters before the first default or rest element
    pub expected_args: u32,
    /// Plain identifiers only; bound by the VM without prologue code
    pub simple: bool,
}

/// Source map entry for debugging
#[derive(Debug, Clone, Serialize)]
pub struct SourceMapEntry {
    pub bytecode_offset: usize,
    pub span: Span,
}

/// Compiled body of a script, eval, function, method or arrow
#[derive(Debug, Serialize)]
pub struct Code {
    pub name: Option<JsString>,
    pub span: Span,
    pub kind: CodeKind,
    pub strict: bool,
    pub instructions: Vec<Op>,
    /// Hoisted function declarations of the body, in source order
    pub functions: Vec<CodeRef>,
    pub lexical_declarations: Vec<LexicalDeclaration>,
    /// `var` names, deduplicated, in order
    pub var_names: Vec<JsString>,
    pub params: Params,
    pub uses_super: bool,
    pub uses_arguments: bool,
    /// Top-level bindings may be deleted
    pub configurable_bindings: bool,
    pub handlers: Vec<Handler>,
    pub source_map: Vec<SourceMapEntry>,
}

impl Code {
    /// Get the source location for a bytecode offset
    pub fn get_source_location(&self, offset: usize) -> Option<Span> {
        let idx = self
            .source_map
            .binary_search_by_key(&offset, |e| e.bytecode_offset);

        match idx {
            Ok(i) => self.source_map.get(i).map(|e| e.span),
            Err(i) if i > 0 => self.source_map.get(i - 1).map(|e| e.span),
            _ => None,
        }
    }

    pub fn display_name(&self) -> &str {
        self.name.as_ref().map_or("", |n| n.as_str())
    }
}

/// Slot for a nested function's Code
///
/// Nested bodies are compiled after the enclosing one finishes, so the
/// instruction that refers to them is emitted before they exist.
#[derive(Clone, Default)]
pub struct CodeRef(Rc<OnceCell<Rc<Code>>>);

impl CodeRef {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<&Rc<Code>> {
        self.0.get()
    }

    /// Fill the slot; a slot can only be filled once
    pub fn set(&self, code: Rc<Code>) -> bool {
        self.0.set(code).is_ok()
    }
}

impl fmt::Debug for CodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.get() {
            Some(code) => write!(f, "<code {}>", code.display_name()),
            None => write!(f, "<pending>"),
        }
    }
}

impl Serialize for CodeRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.get() {
            Some(code) => code.serialize(serializer),
            None => serializer.serialize_none(),
        }
    }
}
