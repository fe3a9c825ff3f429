//! Stack-machine bytecode model
//!
//! A loader produces `MethodBody` values; the interpreter consumes them.
//! Short-form opcodes exist so that raw loader output can be represented,
//! but they must be expanded with [`MethodBody::simplify_macros`] before
//! interpretation.

use super::method::{FieldRef, MethodRef, TypeRef};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Operand width/kind for indirect, element and conversion instructions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueKind {
    I1,
    U1,
    I2,
    U2,
    I4,
    U4,
    I8,
    U8,
    I,
    U,
    R4,
    R8,
    /// Object reference
    Ref,
    /// Type given by the instruction operand
    Any,
}

impl ValueKind {
    /// Kinds that can carry a heap reference
    #[inline]
    pub fn is_reference(&self) -> bool {
        matches!(self, ValueKind::Ref | ValueKind::Any)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OpCode {
    Nop,
    Break,

    // Arguments and locals
    Ldarg,
    Ldarga,
    Starg,
    Ldloc,
    Ldloca,
    Stloc,

    // Constants
    Ldnull,
    LdcI4,
    LdcI8,
    LdcR4,
    LdcR8,
    Ldstr,

    // Stack
    Dup,
    Pop,

    // Calls
    Jmp,
    Call,
    Calli,
    Callvirt,
    Newobj,
    Ret,

    // Branches
    Br,
    Brfalse,
    Brtrue,
    Beq,
    Bge,
    Bgt,
    Ble,
    Blt,
    BneUn,
    BgeUn,
    BgtUn,
    BleUn,
    BltUn,
    Switch,
    Leave,
    Endfinally,
    Endfilter,
    Throw,
    Rethrow,

    // Arithmetic and logic
    Add,
    AddOvf,
    AddOvfUn,
    Sub,
    SubOvf,
    SubOvfUn,
    Mul,
    MulOvf,
    MulOvfUn,
    Div,
    DivUn,
    Rem,
    RemUn,
    And,
    Or,
    Xor,
    Shl,
    Shr,
    ShrUn,
    Neg,
    Not,
    Conv(ValueKind),
    ConvOvf(ValueKind),
    ConvOvfUn(ValueKind),
    ConvRUn,
    Ckfinite,

    // Comparison
    Ceq,
    Cgt,
    CgtUn,
    Clt,
    CltUn,

    // Indirect access
    Ldind(ValueKind),
    Stind(ValueKind),
    Ldobj,
    Stobj,
    Cpobj,
    Initobj,
    Cpblk,
    Initblk,

    // Objects and fields
    Ldfld,
    Ldflda,
    Stfld,
    Ldsfld,
    Ldsflda,
    Stsfld,
    Castclass,
    Isinst,
    Box,
    Unbox,
    UnboxAny,
    Sizeof,
    Ldtoken,
    Ldftn,
    Ldvirtftn,
    Localloc,
    Arglist,
    Mkrefany,
    Refanyval,
    Refanytype,

    // Arrays
    Newarr,
    Ldlen,
    Ldelema,
    Ldelem(ValueKind),
    Stelem(ValueKind),

    // Standard prefixes
    Constrained,
    Readonly,
    Tail,
    Unaligned,
    Volatile,
    No,

    // Short forms
    LdargS,
    Ldarg0,
    Ldarg1,
    Ldarg2,
    Ldarg3,
    LdargaS,
    StargS,
    LdlocS,
    Ldloc0,
    Ldloc1,
    Ldloc2,
    Ldloc3,
    LdlocaS,
    StlocS,
    Stloc0,
    Stloc1,
    Stloc2,
    Stloc3,
    LdcI4M1,
    LdcI4N(u8),
    LdcI4S,
    BrS,
    BrfalseS,
    BrtrueS,
    BeqS,
    BgeS,
    BgtS,
    BleS,
    BltS,
    BneUnS,
    BgeUnS,
    BgtUnS,
    BleUnS,
    BltUnS,
    LeaveS,

    /// Reserved prefix byte (`prefix1`..`prefix7`, `prefixref`)
    Prefix(u8),
    /// Reserved/undefined opcode value
    Reserved(u16),
}

impl OpCode {
    /// Short-form opcode that [`MethodBody::simplify_macros`] expands
    pub fn is_short_form(&self) -> bool {
        matches!(
            self,
            OpCode::LdargS
                | OpCode::Ldarg0
                | OpCode::Ldarg1
                | OpCode::Ldarg2
                | OpCode::Ldarg3
                | OpCode::LdargaS
                | OpCode::StargS
                | OpCode::LdlocS
                | OpCode::Ldloc0
                | OpCode::Ldloc1
                | OpCode::Ldloc2
                | OpCode::Ldloc3
                | OpCode::LdlocaS
                | OpCode::StlocS
                | OpCode::Stloc0
                | OpCode::Stloc1
                | OpCode::Stloc2
                | OpCode::Stloc3
                | OpCode::LdcI4M1
                | OpCode::LdcI4N(_)
                | OpCode::LdcI4S
                | OpCode::BrS
                | OpCode::BrfalseS
                | OpCode::BrtrueS
                | OpCode::BeqS
                | OpCode::BgeS
                | OpCode::BgtS
                | OpCode::BleS
                | OpCode::BltS
                | OpCode::BneUnS
                | OpCode::BgeUnS
                | OpCode::BgtUnS
                | OpCode::BleUnS
                | OpCode::BltUnS
                | OpCode::LeaveS
        )
    }

    /// Long form of a short-form opcode plus the implied operand, if any
    fn expand(&self) -> Option<(OpCode, Option<Operand>)> {
        let expanded = match self {
            OpCode::LdargS => (OpCode::Ldarg, None),
            OpCode::Ldarg0 => (OpCode::Ldarg, Some(Operand::Arg(0))),
            OpCode::Ldarg1 => (OpCode::Ldarg, Some(Operand::Arg(1))),
            OpCode::Ldarg2 => (OpCode::Ldarg, Some(Operand::Arg(2))),
            OpCode::Ldarg3 => (OpCode::Ldarg, Some(Operand::Arg(3))),
            OpCode::LdargaS => (OpCode::Ldarga, None),
            OpCode::StargS => (OpCode::Starg, None),
            OpCode::LdlocS => (OpCode::Ldloc, None),
            OpCode::Ldloc0 => (OpCode::Ldloc, Some(Operand::Local(0))),
            OpCode::Ldloc1 => (OpCode::Ldloc, Some(Operand::Local(1))),
            OpCode::Ldloc2 => (OpCode::Ldloc, Some(Operand::Local(2))),
            OpCode::Ldloc3 => (OpCode::Ldloc, Some(Operand::Local(3))),
            OpCode::LdlocaS => (OpCode::Ldloca, None),
            OpCode::StlocS => (OpCode::Stloc, None),
            OpCode::Stloc0 => (OpCode::Stloc, Some(Operand::Local(0))),
            OpCode::Stloc1 => (OpCode::Stloc, Some(Operand::Local(1))),
            OpCode::Stloc2 => (OpCode::Stloc, Some(Operand::Local(2))),
            OpCode::Stloc3 => (OpCode::Stloc, Some(Operand::Local(3))),
            OpCode::LdcI4M1 => (OpCode::LdcI4, Some(Operand::Int32(-1))),
            OpCode::LdcI4N(n) => (OpCode::LdcI4, Some(Operand::Int32(i32::from(*n)))),
            OpCode::LdcI4S => (OpCode::LdcI4, None),
            OpCode::BrS => (OpCode::Br, None),
            OpCode::BrfalseS => (OpCode::Brfalse, None),
            OpCode::BrtrueS => (OpCode::Brtrue, None),
            OpCode::BeqS => (OpCode::Beq, None),
            OpCode::BgeS => (OpCode::Bge, None),
            OpCode::BgtS => (OpCode::Bgt, None),
            OpCode::BleS => (OpCode::Ble, None),
            OpCode::BltS => (OpCode::Blt, None),
            OpCode::BneUnS => (OpCode::BneUn, None),
            OpCode::BgeUnS => (OpCode::BgeUn, None),
            OpCode::BgtUnS => (OpCode::BgtUn, None),
            OpCode::BleUnS => (OpCode::BleUn, None),
            OpCode::BltUnS => (OpCode::BltUn, None),
            OpCode::LeaveS => (OpCode::Leave, None),
            _ => return None,
        };
        Some(expanded)
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Operand {
    None,
    Int32(i32),
    Int64(i64),
    Float(f64),
    String(String),
    /// Branch target offset
    Target(u32),
    /// Switch table offsets
    Targets(Vec<u32>),
    Method(MethodRef),
    Field(FieldRef),
    Type(TypeRef),
    Local(u16),
    Arg(u16),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instruction {
    pub offset: u32,
    pub opcode: OpCode,
    pub operand: Operand,
}

impl Instruction {
    pub fn new(offset: u32, opcode: OpCode, operand: Operand) -> Self {
        Self {
            offset,
            opcode,
            operand,
        }
    }

    pub fn simple(offset: u32, opcode: OpCode) -> Self {
        Self::new(offset, opcode, Operand::None)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HandlerKind {
    Catch,
    Filter,
    Finally,
    Fault,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExceptionHandler {
    pub kind: HandlerKind,
    pub try_start: u32,
    pub try_end: u32,
    pub handler_start: u32,
    #[serde(default)]
    pub filter_start: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MethodBody {
    pub instructions: Vec<Instruction>,
    #[serde(default)]
    pub locals: Vec<TypeRef>,
    #[serde(default)]
    pub exception_handlers: Vec<ExceptionHandler>,
}

impl MethodBody {
    pub fn new(instructions: Vec<Instruction>, locals: Vec<TypeRef>) -> Self {
        Self {
            instructions,
            locals,
            exception_handlers: Vec::new(),
        }
    }

    /// Expand short-form opcodes into their long forms in place.
    ///
    /// Operands of the short form are kept; forms with an implied operand
    /// (`ldarg.0`, `ldc.i4.5`, ...) get it materialized.
    pub fn simplify_macros(&mut self) {
        for instruction in &mut self.instructions {
            if let Some((opcode, implied)) = instruction.opcode.expand() {
                instruction.opcode = opcode;
                if let Some(operand) = implied {
                    instruction.operand = operand;
                }
            }
        }
    }

    pub fn has_short_forms(&self) -> bool {
        self.instructions.iter().any(|i| i.opcode.is_short_form())
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }
}
