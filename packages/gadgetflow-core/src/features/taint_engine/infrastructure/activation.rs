//! Method activations on the engine's explicit stack

use crate::errors::{AnalysisError, Result};
use crate::features::execution_env::ExecutionContext;
use crate::features::interpreter::{CallEffect, Interpreter};
use crate::features::summary_cache::RecursionLoop;
use crate::features::symbolic_graph::ApplyMode;
use crate::shared::models::{CallStack, MethodRef, SummaryKey};
use crate::shared::ports::MethodDefinition;

/// What an analyzed call resolves to
#[derive(Debug, Clone)]
pub(crate) enum CallTarget<'a> {
    Method(&'a MethodDefinition),
    /// Virtual dispatch over these implementations
    Virtual(Vec<MethodRef>),
}

/// A call waiting for a callee summary
#[derive(Debug, Clone)]
pub(crate) struct CallRequest<'a> {
    pub key: SummaryKey,
    pub effect: CallEffect,
    pub mode: ApplyMode,
    pub target: CallTarget<'a>,
}

pub(crate) enum ActivationKind<'a> {
    Method(Interpreter<'a>),
    Virtual {
        implementations: Vec<MethodRef>,
        next: usize,
    },
}

pub(crate) struct Activation<'a> {
    pub key: SummaryKey,
    pub method: MethodRef,
    /// Includes `key` on top
    pub stack: CallStack,
    pub ctx: ExecutionContext,
    pub kind: ActivationKind<'a>,
    pub target: CallTarget<'a>,
    /// Call suspended until the activation above this one completes
    pub waiting: Option<CallRequest<'a>>,
    /// Lowest open loop head whose provisional summary flowed into this
    /// activation
    pub dependency: Option<usize>,
    /// Set when this activation heads a recursion loop
    pub recursion: Option<RecursionLoop>,
}

impl<'a> Activation<'a> {
    pub fn start(
        key: SummaryKey,
        method: MethodRef,
        stack: CallStack,
        target: CallTarget<'a>,
        enable_static_fields: bool,
    ) -> Result<Self> {
        let (ctx, kind) = match &target {
            CallTarget::Method(definition) => {
                let definition: &'a MethodDefinition = definition;
                let body = definition
                    .body
                    .as_ref()
                    .ok_or_else(|| AnalysisError::MissingMethodBody(definition.signature()))?;
                let mut ctx = ExecutionContext::new(
                    &definition.reference,
                    &body.locals,
                    enable_static_fields,
                );
                let interpreter = Interpreter::new(&definition.reference, body, &mut ctx)?;
                (ctx, ActivationKind::Method(interpreter))
            }
            CallTarget::Virtual(implementations) => (
                ExecutionContext::for_dispatch(&method, enable_static_fields),
                ActivationKind::Virtual {
                    implementations: implementations.clone(),
                    next: 0,
                },
            ),
        };

        Ok(Self {
            key,
            method,
            stack,
            ctx,
            kind,
            target,
            waiting: None,
            dependency: None,
            recursion: None,
        })
    }

    pub fn is_method(&self) -> bool {
        matches!(self.kind, ActivationKind::Method(_))
    }

    /// Record that a provisional summary of the loop head at `head` flowed
    /// into this activation
    pub fn depend_on(&mut self, head: usize) {
        self.dependency = Some(self.dependency.map_or(head, |d| d.min(head)));
    }
}
