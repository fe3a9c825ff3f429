//! Call effects
//!
//! The interpreter never inlines callees. Each call site becomes a
//! `CallEffect` that the driver resolves (sink, conservative fallback, or
//! summary application).

use crate::features::symbolic_graph::EntityId;
use crate::shared::models::{MethodRef, MethodSignature};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallEffectKind {
    Call,
    CallVirt,
    /// `newobj`: parameter 0 is the freshly allocated object, which is also
    /// the call's output
    NewObj,
}

#[derive(Debug, Clone)]
pub struct CallEffect {
    pub kind: CallEffectKind,
    pub method: MethodRef,
    /// One per formal (`this` first); `None` for non-symbolic values
    pub parameters: Vec<Option<EntityId>>,
    /// Fresh entity standing for the return value (or the new object)
    pub output: Option<EntityId>,
    /// IL offset of the call instruction
    pub offset: u32,
}

impl CallEffect {
    pub fn signature(&self) -> MethodSignature {
        self.method.signature()
    }

    /// Constructor call, either `newobj` or a chained `call .ctor`
    pub fn is_constructor(&self) -> bool {
        self.method.is_constructor()
    }

    /// Entities receiving the call's result: the return value, plus `this`
    /// for constructors
    pub fn outputs(&self) -> Vec<EntityId> {
        let mut outputs: Vec<EntityId> = self.output.into_iter().collect();
        if self.is_constructor() {
            if let Some(Some(this)) = self.parameters.first() {
                if !outputs.contains(this) {
                    outputs.push(*this);
                }
            }
        }
        outputs
    }

    /// Symbolic inputs; the object under construction is not an input
    pub fn inputs(&self) -> Vec<EntityId> {
        let skip = usize::from(self.kind == CallEffectKind::NewObj);
        self.parameters
            .iter()
            .skip(skip)
            .flatten()
            .copied()
            .collect()
    }

    /// Parameters passed by reference (`ref`/`out`)
    pub fn by_ref_parameters(&self) -> Vec<EntityId> {
        let formals = self.method.formal_types();
        let value_type_this = self.method.has_this && self.method.declaring_type.is_value_type;
        self.parameters
            .iter()
            .zip(formals.iter())
            .enumerate()
            .filter(|(i, (_, ty))| ty.is_by_ref() && !(*i == 0 && value_type_this))
            .filter_map(|(_, (p, _))| *p)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::models::TypeRef;

    fn effect(kind: CallEffectKind, method: MethodRef, params: Vec<Option<EntityId>>) -> CallEffect {
        CallEffect {
            kind,
            method,
            parameters: params,
            output: None,
            offset: 0,
        }
    }

    #[test]
    fn test_newobj_output_is_not_input() {
        let ctor = MethodRef::new(
            TypeRef::new("Test.Payload"),
            ".ctor",
            vec![TypeRef::object()],
            TypeRef::void(),
            true,
        );
        let mut e = effect(
            CallEffectKind::NewObj,
            ctor,
            vec![Some(EntityId(0)), Some(EntityId(1))],
        );
        e.output = Some(EntityId(0));

        assert_eq!(e.outputs(), vec![EntityId(0)]);
        assert_eq!(e.inputs(), vec![EntityId(1)]);
    }

    #[test]
    fn test_by_ref_parameters() {
        let m = MethodRef::new(
            TypeRef::new("Test.Source"),
            "Create",
            vec![TypeRef::object(), TypeRef::new("Test.Payload&")],
            TypeRef::void(),
            false,
        );
        let e = effect(
            CallEffectKind::Call,
            m,
            vec![Some(EntityId(3)), Some(EntityId(4))],
        );
        assert_eq!(e.by_ref_parameters(), vec![EntityId(4)]);
        assert!(e.outputs().is_empty());
    }
}
