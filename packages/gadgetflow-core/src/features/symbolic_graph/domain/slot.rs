//! Deferred values
//!
//! A slot is what the interpreter keeps on the operand stack and in
//! argument/local tables. Field loads stay pending until something needs
//! the concrete entity; see `SlotArena` for normalization.

use super::entity::EntityId;
use crate::shared::models::FieldKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotId(pub u32);

impl SlotId {
    #[inline]
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

/// `base.path[0].path[1]...`, resolved on materialization
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PendingLoad {
    pub base: SlotId,
    pub path: Vec<FieldKey>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Slot {
    /// Non-symbolic value (arithmetic result, simple type)
    Fake,
    /// Literal (`ldnull`, `ldc.*`, `ldstr`)
    Constant,
    /// Union of concrete entities
    Values(Vec<EntityId>),
    /// Union of pending field loads
    Pending(Vec<PendingLoad>),
}

impl Slot {
    /// Carries no symbolic value
    #[inline]
    pub fn is_opaque(&self) -> bool {
        matches!(self, Slot::Fake | Slot::Constant)
    }

    #[inline]
    pub fn is_materialized(&self) -> bool {
        matches!(self, Slot::Values(_))
    }
}
