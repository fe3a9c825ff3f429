//! Test program builders
//!
//! Small fluent builders over `InMemoryCallIndex`. Offsets are assigned
//! sequentially (one per instruction) so branch targets are easy to write.

use gadgetflow_core::shared::models::{
    ExceptionHandler, FieldRef, Instruction, MethodBody, MethodRef, OpCode, Operand, TypeRef,
    ValueKind,
};
use gadgetflow_core::shared::ports::{InMemoryCallIndex, MethodDefinition};
use gadgetflow_core::SymbolicEngine;

/// Value-type constructor used as the sensitive sink
pub const SINK: &str = "System.Void Test.MyValue::.ctor()";

pub const ASSEMBLY: &str = "Test";

pub fn object() -> TypeRef {
    TypeRef::object()
}

pub fn sink_ctor() -> MethodRef {
    MethodRef::new(
        TypeRef::value_type("Test.MyValue"),
        ".ctor",
        vec![],
        TypeRef::void(),
        true,
    )
}

/// `static void Logger.Log(object, object)`, never given a body
pub fn log_method() -> MethodRef {
    MethodRef::new(
        TypeRef::new("Test.Logger"),
        "Log",
        vec![object(), object()],
        TypeRef::void(),
        false,
    )
}

pub fn static_method(ty: &str, name: &str, params: Vec<TypeRef>, ret: TypeRef) -> MethodRef {
    MethodRef::new(TypeRef::new(ty), name, params, ret, false)
}

pub fn instance_method(ty: &str, name: &str, params: Vec<TypeRef>, ret: TypeRef) -> MethodRef {
    MethodRef::new(TypeRef::new(ty), name, params, ret, true)
}

/// Parameterless constructor of a reference type
pub fn ctor(ty: &str) -> MethodRef {
    instance_method(ty, ".ctor", vec![], TypeRef::void())
}

/// Object-typed field
pub fn field(ty: &str, name: &str) -> FieldRef {
    FieldRef::new(TypeRef::new(ty), name, object())
}

// ═══════════════════════════════════════════════════════════════════════════
// Method bodies
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Default)]
pub struct BodyBuilder {
    instructions: Vec<Instruction>,
    locals: Vec<TypeRef>,
    handlers: Vec<ExceptionHandler>,
}

impl BodyBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Offset the next instruction will get
    pub fn next_offset(&self) -> u32 {
        self.instructions.len() as u32
    }

    pub fn local(mut self, ty: TypeRef) -> Self {
        self.locals.push(ty);
        self
    }

    pub fn handler(mut self, handler: ExceptionHandler) -> Self {
        self.handlers.push(handler);
        self
    }

    pub fn op(self, opcode: OpCode) -> Self {
        self.with(opcode, Operand::None)
    }

    pub fn with(mut self, opcode: OpCode, operand: Operand) -> Self {
        let offset = self.next_offset();
        self.instructions
            .push(Instruction::new(offset, opcode, operand));
        self
    }

    pub fn ldarg(self, index: u16) -> Self {
        self.with(OpCode::Ldarg, Operand::Arg(index))
    }

    pub fn starg(self, index: u16) -> Self {
        self.with(OpCode::Starg, Operand::Arg(index))
    }

    pub fn ldloc(self, index: u16) -> Self {
        self.with(OpCode::Ldloc, Operand::Local(index))
    }

    pub fn ldloca(self, index: u16) -> Self {
        self.with(OpCode::Ldloca, Operand::Local(index))
    }

    pub fn stloc(self, index: u16) -> Self {
        self.with(OpCode::Stloc, Operand::Local(index))
    }

    pub fn ldnull(self) -> Self {
        self.op(OpCode::Ldnull)
    }

    pub fn call(self, method: MethodRef) -> Self {
        self.with(OpCode::Call, Operand::Method(method))
    }

    pub fn callvirt(self, method: MethodRef) -> Self {
        self.with(OpCode::Callvirt, Operand::Method(method))
    }

    pub fn newobj(self, method: MethodRef) -> Self {
        self.with(OpCode::Newobj, Operand::Method(method))
    }

    pub fn ldfld(self, field: FieldRef) -> Self {
        self.with(OpCode::Ldfld, Operand::Field(field))
    }

    pub fn stfld(self, field: FieldRef) -> Self {
        self.with(OpCode::Stfld, Operand::Field(field))
    }

    pub fn ldsfld(self, field: FieldRef) -> Self {
        self.with(OpCode::Ldsfld, Operand::Field(field))
    }

    pub fn stsfld(self, field: FieldRef) -> Self {
        self.with(OpCode::Stsfld, Operand::Field(field))
    }

    pub fn boxed(self) -> Self {
        self.with(OpCode::Box, Operand::Type(TypeRef::value_type("Test.MyValue")))
    }

    pub fn stind_ref(self) -> Self {
        self.op(OpCode::Stind(ValueKind::Ref))
    }

    pub fn brtrue(self, target: u32) -> Self {
        self.with(OpCode::Brtrue, Operand::Target(target))
    }

    pub fn br(self, target: u32) -> Self {
        self.with(OpCode::Br, Operand::Target(target))
    }

    /// `Logger.Log(<top of stack>, null)`
    pub fn log_top(self) -> Self {
        self.ldnull().call(log_method())
    }

    pub fn ret(self) -> Self {
        self.op(OpCode::Ret)
    }

    pub fn build(self) -> MethodBody {
        let mut body = MethodBody::new(self.instructions, self.locals);
        body.exception_handlers = self.handlers;
        body
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Programs
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Default)]
pub struct ProgramBuilder {
    index: InMemoryCallIndex,
}

impl ProgramBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep short-form opcodes in bodies
    pub fn keep_short_forms(mut self) -> Self {
        self.index = self.index.keep_short_forms();
        self
    }

    pub fn method(mut self, reference: MethodRef, body: BodyBuilder) -> Self {
        self.index.add_method(definition(reference, Some(body.build()), false, false));
        self
    }

    pub fn raw_method(mut self, reference: MethodRef, body: MethodBody) -> Self {
        self.index.add_method(definition(reference, Some(body), false, false));
        self
    }

    /// Interface or abstract method without a body
    pub fn abstract_method(mut self, reference: MethodRef) -> Self {
        self.index.add_method(definition(reference, None, true, true));
        self
    }

    /// Extern method: known to the index, but without a body
    pub fn native_method(mut self, reference: MethodRef) -> Self {
        self.index.add_method(definition(reference, None, false, false));
        self
    }

    /// Override of `base` with a body
    pub fn implementation(mut self, base: &MethodRef, reference: MethodRef, body: BodyBuilder) -> Self {
        self.index
            .add_method(definition(reference.clone(), Some(body.build()), true, false));
        self.index
            .add_implementation(base.signature(), reference, ASSEMBLY);
        self
    }

    pub fn skip_module(mut self, module: &str) -> Self {
        self.index.skip_module(module);
        self
    }

    pub fn build(self) -> InMemoryCallIndex {
        self.index
    }
}

fn definition(
    reference: MethodRef,
    body: Option<MethodBody>,
    is_virtual: bool,
    is_abstract: bool,
) -> MethodDefinition {
    MethodDefinition {
        reference,
        assembly: ASSEMBLY.to_string(),
        module: format!("{ASSEMBLY}.dll"),
        is_public: true,
        is_virtual,
        is_abstract,
        body,
    }
}

/// Engine with the test sink and default settings
pub fn engine(index: &InMemoryCallIndex) -> SymbolicEngine<'_, InMemoryCallIndex> {
    SymbolicEngine::new(index, SINK, 16, true, false)
}
