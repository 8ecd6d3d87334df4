//! Stack machine executing compiled [`Code`](crate::compiler::Code)
//!
//! A [`Realm`] owns the global object, the global environment and the
//! intrinsic prototypes. Each function or script activation runs in an
//! [`context::ExecutionContext`] holding an operand stack, a program counter
//! and the current lexical/variable environments.

pub mod abstract_ops;
pub mod completion;
pub mod context;
pub mod environment;
pub mod function;
pub mod intrinsics;
pub mod object;
pub mod realm;
pub mod reference;

pub use completion::{Abrupt, Completion, CompletionType, JsResult};
pub use environment::EnvRef;
pub use object::{JsObjectRef, Property, PropertyDescriptor};
pub use realm::{ErrorKind, Realm, RealmConfig};
pub use reference::Reference;
