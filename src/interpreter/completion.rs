//! Completion records
//!
//! Inside the VM an abrupt completion travels as `Err(Abrupt)` so `?`
//! re-propagates it. `Completion` is the record handed back to embedders.

use serde::Serialize;

use crate::error::FatalError;
use crate::value::{JsString, JsValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CompletionType {
    Normal,
    Return,
    Throw,
    Break,
    Continue,
}

/// Result of running a Code object
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Completion {
    pub kind: CompletionType,
    pub value: Option<JsValue>,
    /// Label of a break or continue
    pub target: Option<JsString>,
}

impl Completion {
    pub fn normal(value: JsValue) -> Self {
        Self {
            kind: CompletionType::Normal,
            value: Some(value),
            target: None,
        }
    }

    pub fn returned(value: JsValue) -> Self {
        Self {
            kind: CompletionType::Return,
            value: Some(value),
            target: None,
        }
    }

    pub fn throw(value: JsValue) -> Self {
        Self {
            kind: CompletionType::Throw,
            value: Some(value),
            target: None,
        }
    }

    pub fn is_abrupt(&self) -> bool {
        self.kind != CompletionType::Normal
    }

    /// The carried value, undefined when there is none
    pub fn value(&self) -> JsValue {
        self.value.clone().unwrap_or(JsValue::Undefined)
    }
}

/// Why evaluation stopped early
#[derive(Debug, Clone)]
pub enum Abrupt {
    /// A language-level throw; catchable by guest code
    Throw(JsValue),
    /// A VM invariant broke; never catchable
    Fatal(FatalError),
}

impl From<FatalError> for Abrupt {
    fn from(error: FatalError) -> Self {
        Abrupt::Fatal(error)
    }
}

pub type JsResult<T> = Result<T, Abrupt>;
