//! CodeBuilder - helper for emitting instructions
//!
//! Tracks jump patching, protected regions and the source map for one
//! Code object.

use super::bytecode::{Handler, HandlerKind, JumpTarget, Op, SourceMapEntry};
use crate::error::JsError;
use crate::lexer::Span;

/// Placeholder for a jump that needs to be patched later
#[derive(Debug, Clone, Copy)]
pub struct JumpPlaceholder {
    /// Index of the jump instruction in the code
    pub instruction_index: usize,
}

/// An open protected region
#[derive(Debug, Clone, Copy)]
pub struct HandlerStart {
    kind: HandlerKind,
    begin: JumpTarget,
    stack_depth: u32,
}

/// Output of a finished builder
pub struct BuiltCode {
    pub instructions: Vec<Op>,
    pub handlers: Vec<Handler>,
    pub source_map: Vec<SourceMapEntry>,
}

#[derive(Default)]
pub struct CodeBuilder {
    code: Vec<Op>,
    /// Closed regions; inner regions close first so they come first
    handlers: Vec<Handler>,
    source_map: Vec<SourceMapEntry>,
    current_span: Option<Span>,
}

impl CodeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the current source span for source map
    pub fn set_span(&mut self, span: Span) {
        self.current_span = Some(span);
    }

    /// Emit an instruction and return its index
    pub fn emit(&mut self, op: Op) -> usize {
        let index = self.code.len();

        if let Some(span) = self.current_span {
            let should_add = self
                .source_map
                .last()
                .is_none_or(|e| e.span.start != span.start);

            if should_add {
                self.source_map.push(SourceMapEntry {
                    bytecode_offset: index,
                    span,
                });
            }
        }

        self.code.push(op);
        index
    }

    /// Emit a jump-carrying instruction whose target is patched later
    pub fn emit_jump(&mut self, op: Op) -> JumpPlaceholder {
        JumpPlaceholder {
            instruction_index: self.emit(op),
        }
    }

    /// Emit an unconditional jump to a known target
    pub fn emit_jump_to(&mut self, target: JumpTarget) {
        self.emit(Op::Jump { target });
    }

    /// Patch a jump placeholder to jump to the current position
    pub fn patch_jump(&mut self, placeholder: JumpPlaceholder) -> Result<(), JsError> {
        let target = self.current_offset()?;
        self.patch_jump_to(placeholder, target);
        Ok(())
    }

    /// Patch a jump placeholder to jump to a specific target
    pub fn patch_jump_to(&mut self, placeholder: JumpPlaceholder, target: JumpTarget) {
        if let Some(op) = self.code.get_mut(placeholder.instruction_index) {
            match op {
                Op::Jump { target: t }
                | Op::PopJump { target: t, .. }
                | Op::JumpPop { target: t, .. }
                | Op::SwitchCase { target: t }
                | Op::SwitchDefault { target: t }
                | Op::Jsr { target: t }
                | Op::ForInNext { exit: t } => *t = target,
                _ => {}
            }
        }
    }

    /// Get the current instruction offset (for jump targets)
    pub fn current_offset(&self) -> Result<JumpTarget, JsError> {
        JumpTarget::try_from(self.code.len())
            .map_err(|_| JsError::internal_error("Too many instructions in one function"))
    }

    /// Open a protected region at the current offset
    pub fn begin_handler(
        &mut self,
        kind: HandlerKind,
        stack_depth: u32,
    ) -> Result<HandlerStart, JsError> {
        Ok(HandlerStart {
            kind,
            begin: self.current_offset()?,
            stack_depth,
        })
    }

    /// Close a region at the current offset, which is also where catch and
    /// finally handlers resume
    pub fn end_handler(&mut self, start: HandlerStart) -> Result<(), JsError> {
        let end = self.current_offset()?;
        // An empty environment region can never be unwound through
        if end == start.begin && start.kind == HandlerKind::Env {
            return Ok(());
        }
        self.handlers.push(Handler {
            kind: start.kind,
            begin: start.begin,
            end,
            stack_depth: start.stack_depth,
        });
        Ok(())
    }

    /// Finish building; every jump must land inside the instruction list
    pub fn finish(self) -> Result<BuiltCode, JsError> {
        let len = self.code.len();
        for (pc, op) in self.code.iter().enumerate() {
            if let Some(target) = jump_target(op)
                && target as usize > len
            {
                return Err(JsError::internal_error(format!(
                    "jump at {} targets {} past the end ({})",
                    pc, target, len
                )));
            }
        }

        Ok(BuiltCode {
            instructions: self.code,
            handlers: self.handlers,
            source_map: self.source_map,
        })
    }
}

/// Jump target carried by an instruction, if any
pub fn jump_target(op: &Op) -> Option<JumpTarget> {
    match op {
        Op::Jump { target }
        | Op::PopJump { target, .. }
        | Op::JumpPop { target, .. }
        | Op::SwitchCase { target }
        | Op::SwitchDefault { target }
        | Op::Jsr { target }
        | Op::ForInNext { exit: target } => Some(*target),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_patch_forward_jump() {
        let mut builder = CodeBuilder::new();
        let jump = builder.emit_jump(Op::PopJump {
            test: false,
            target: 0,
        });
        builder.emit(Op::Undefined);
        builder.emit(Op::Pop);
        builder.patch_jump(jump).unwrap();
        builder.emit(Op::ReturnResult);

        let built = builder.finish().unwrap();
        assert!(matches!(
            built.instructions.first(),
            Some(Op::PopJump { test: false, target: 3 })
        ));
    }

    #[test]
    fn test_handlers_close_inner_first() {
        let mut builder = CodeBuilder::new();
        let outer = builder.begin_handler(HandlerKind::Finally, 0).unwrap();
        let inner = builder.begin_handler(HandlerKind::Catch, 0).unwrap();
        builder.emit(Op::Undefined);
        builder.emit(Op::Throw);
        builder.end_handler(inner).unwrap();
        builder.emit(Op::EnterFinally);
        builder.end_handler(outer).unwrap();

        let built = builder.finish().unwrap();
        let kinds: Vec<_> = built.handlers.iter().map(|h| h.kind).collect();
        assert_eq!(kinds, vec![HandlerKind::Catch, HandlerKind::Finally]);
        let catch = built.handlers.first().unwrap();
        assert!(catch.contains(1));
        assert!(!catch.contains(2));
    }

    #[test]
    fn test_empty_env_region_is_dropped() {
        let mut builder = CodeBuilder::new();
        let start = builder.begin_handler(HandlerKind::Env, 0).unwrap();
        builder.end_handler(start).unwrap();
        assert!(builder.finish().unwrap().handlers.is_empty());
    }

    #[test]
    fn test_out_of_range_jump_rejected() {
        let mut builder = CodeBuilder::new();
        builder.emit(Op::Jump { target: 7 });
        assert!(matches!(builder.finish(), Err(JsError::Internal(_))));
    }

    #[test]
    fn test_source_map_dedups_spans() {
        let mut builder = CodeBuilder::new();
        let span = Span::new(4, 9, 1, 5);
        builder.set_span(span);
        builder.emit(Op::Undefined);
        builder.emit(Op::Pop);
        let built = builder.finish().unwrap();
        assert_eq!(built.source_map.len(), 1);
    }
}
