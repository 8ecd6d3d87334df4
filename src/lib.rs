//! Bytecode compiler and stack machine for a prototype-based scripting language
//!
//! Source text is compiled to a [`Code`] object: a flat instruction vector
//! with protected handler regions, nested function bodies and the static
//! declarations the body hoists. A [`Realm`] runs Code against its global
//! environment and reports the outcome as a [`Completion`].
//!
//! # Example
//!
//! ```
//! use stackjs::{compile, CompileOptions, CompletionType, JsValue, Realm};
//!
//! let code = compile("var x = 1; x = x + 1;", &CompileOptions::default()).unwrap();
//! let realm = Realm::new();
//! let completion = realm.run(&code).unwrap();
//! assert_eq!(completion.kind, CompletionType::Normal);
//! assert_eq!(realm.global_binding("x"), Some(JsValue::Number(2.0)));
//! ```

pub mod ast;
pub mod compiler;
pub mod error;
pub mod interpreter;
pub mod lexer;
pub mod parser;
pub mod string_dict;
pub mod value;

pub use compiler::{Code, CompileOptions, compile};
pub use error::{FatalError, JsError};
pub use interpreter::{Completion, CompletionType, Realm, RealmConfig};
pub use value::CheapClone;
pub use value::JsString;
pub use value::JsValue;
