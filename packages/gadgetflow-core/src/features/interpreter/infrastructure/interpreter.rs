//! Resumable abstract interpreter
//!
//! Walks a method body once, in instruction order, with one operand stack
//! per reachable path. Paths join at branch targets (position-wise slot
//! union). Each backward edge is followed at most once, which is enough to
//! reach a fixpoint on the flow-insensitive heap graph.
//!
//! The interpreter stops at every call instruction and hands a
//! [`CallEffect`] back to its driver; the next `step` resumes right after
//! the call.

use super::control_flow::ControlFlow;
use crate::errors::{AnalysisError, Result};
use crate::features::execution_env::{is_simple_type, ExecutionContext, StackFrame};
use crate::features::interpreter::domain::{CallEffect, CallEffectKind};
use crate::features::symbolic_graph::{EntityId, EntitySource, SlotId};
use crate::shared::models::{
    FieldKey, FieldRef, HandlerKind, Instruction, MethodBody, MethodRef, MethodSignature, OpCode,
    Operand, TypeRef, ValueKind,
};
use tracing::debug;
#[cfg(feature = "trace")]
use tracing::trace;

/// Outcome of one instruction for the current path
enum Flow {
    Next,
    /// Path ends here (unconditional jump, return, throw)
    Stop,
    /// Continue at an earlier instruction (first traversal of a back edge)
    Jump(usize),
    Effect(CallEffect),
}

pub struct Interpreter<'b> {
    method: &'b MethodRef,
    signature: MethodSignature,
    body: &'b MethodBody,
    flow: ControlFlow,
    cursor: usize,
    current: Option<StackFrame>,
    finished: bool,
}

impl<'b> Interpreter<'b> {
    /// Prepare a body for interpretation. Exception handler entries are
    /// seeded here: catch and filter blocks start with one opaque value
    /// (the exception object), finally and fault blocks with an empty stack.
    pub fn new(method: &'b MethodRef, body: &'b MethodBody, ctx: &mut ExecutionContext) -> Result<Self> {
        let mut flow = ControlFlow::new(body);

        for handler in &body.exception_handlers {
            let mut entries = vec![handler.handler_start];
            if handler.kind == HandlerKind::Filter {
                entries.extend(handler.filter_start);
            }
            for start in entries {
                let index = flow.index(start).ok_or(AnalysisError::InvalidBranchTarget {
                    offset: handler.try_start,
                    target: start,
                })?;
                let frame = match handler.kind {
                    HandlerKind::Catch | HandlerKind::Filter => {
                        StackFrame::with_slots(vec![ctx.slots.fake()])
                    }
                    HandlerKind::Finally | HandlerKind::Fault => StackFrame::new(),
                };
                flow.enqueue(index, frame, &mut ctx.slots, &mut ctx.graph)?;
            }
        }

        Ok(Self {
            method,
            signature: method.signature(),
            body,
            flow,
            cursor: 0,
            current: Some(StackFrame::new()),
            finished: false,
        })
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn method(&self) -> &MethodRef {
        self.method
    }

    /// Run until the next call instruction or the end of the body.
    /// `Ok(None)` means the body is fully interpreted.
    pub fn step(&mut self, ctx: &mut ExecutionContext) -> Result<Option<CallEffect>> {
        let body = self.body;
        loop {
            if self.cursor >= body.instructions.len() {
                if !self.finished {
                    debug!(
                        method = %self.signature,
                        instructions = ctx.instruction_count(),
                        "Interpretation finished"
                    );
                }
                self.finished = true;
                self.current = None;
                return Ok(None);
            }

            let index = self.cursor;
            let incoming = self.flow.take(index);
            let joined = match (self.current.take(), incoming) {
                (Some(current), Some(incoming)) => {
                    Some(current.merge(&incoming, &mut ctx.slots, &mut ctx.graph)?)
                }
                (current, incoming) => current.or(incoming),
            };

            // Unreachable on every path seen so far
            let Some(mut frame) = joined else {
                self.cursor += 1;
                continue;
            };

            let instruction = &body.instructions[index];
            #[cfg(feature = "trace")]
            trace!(
                offset = instruction.offset,
                opcode = %instruction.opcode,
                depth = frame.depth(),
                "exec"
            );
            ctx.count_instruction();

            match self.execute(index, instruction, &mut frame, ctx)? {
                Flow::Next => {
                    self.current = Some(frame);
                    self.cursor += 1;
                }
                Flow::Stop => {
                    self.current = None;
                    self.cursor += 1;
                }
                Flow::Jump(target) => {
                    self.current = Some(frame);
                    self.cursor = target;
                }
                Flow::Effect(effect) => {
                    self.current = Some(frame);
                    self.cursor += 1;
                    return Ok(Some(effect));
                }
            }
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Instruction semantics
    // ═══════════════════════════════════════════════════════════════════════

    fn execute(
        &mut self,
        index: usize,
        instr: &Instruction,
        frame: &mut StackFrame,
        ctx: &mut ExecutionContext,
    ) -> Result<Flow> {
        use OpCode::*;

        match instr.opcode {
            Nop | Break | Constrained | Readonly | Tail | Unaligned | Volatile | No => {}

            // Arguments and locals
            Ldarg => {
                let slot = self.argument_slot(instr, ctx)?;
                frame.push(slot);
            }
            Ldarga => {
                let arg = self.arg_index(instr)?;
                let slot = self.argument_slot(instr, ctx)?;
                let entity = ctx.slots.materialize_or_create(
                    &mut ctx.graph,
                    slot,
                    EntitySource::Argument(arg),
                );
                frame.push(ctx.slots.entity(entity));
            }
            Starg => {
                let arg = self.arg_index(instr)?;
                let value = self.pop(instr, frame)?;
                if self.flow.is_straight_line(index) {
                    ctx.arguments.rebind(arg, value);
                } else {
                    ctx.arguments.store(arg, value, &mut ctx.slots, &mut ctx.graph);
                }
            }
            Ldloc => {
                let local = self.local_index(instr)?;
                let slot = ctx.variables.load(local, &mut ctx.slots);
                frame.push(slot);
            }
            Ldloca => {
                let local = self.local_index(instr)?;
                let entity = ctx.variables.address(local, &mut ctx.slots, &mut ctx.graph);
                frame.push(ctx.slots.entity(entity));
            }
            Stloc => {
                let local = self.local_index(instr)?;
                let value = self.pop(instr, frame)?;
                ctx.variables.store(local, value, &mut ctx.slots, &mut ctx.graph);
            }

            // Constants
            Ldnull | LdcI4 | LdcI8 | LdcR4 | LdcR8 | Ldstr => frame.push(ctx.slots.constant()),

            // Stack
            Dup => {
                let top = frame.peek().ok_or_else(|| self.underflow(instr))?;
                frame.push(top);
            }
            Pop => {
                self.pop(instr, frame)?;
            }

            // Calls
            Call => return self.call(instr, CallEffectKind::Call, frame, ctx),
            Callvirt => return self.call(instr, CallEffectKind::CallVirt, frame, ctx),
            Newobj => return self.call(instr, CallEffectKind::NewObj, frame, ctx),
            Ret => {
                if self.method.returns_value() {
                    let value = self.pop(instr, frame)?;
                    if !is_simple_type(&self.method.return_type) {
                        ctx.record_return(value);
                    }
                }
                return Ok(Flow::Stop);
            }

            // Branches
            Br => {
                let target = self.target(instr)?;
                return self.branch(index, instr, &[target], false, frame, ctx);
            }
            Brfalse | Brtrue => {
                self.pop(instr, frame)?;
                let target = self.target(instr)?;
                return self.branch(index, instr, &[target], true, frame, ctx);
            }
            Beq | Bge | Bgt | Ble | Blt | BneUn | BgeUn | BgtUn | BleUn | BltUn => {
                self.pop(instr, frame)?;
                self.pop(instr, frame)?;
                let target = self.target(instr)?;
                return self.branch(index, instr, &[target], true, frame, ctx);
            }
            Switch => {
                self.pop(instr, frame)?;
                let Operand::Targets(targets) = &instr.operand else {
                    return Err(self.invalid_operand(instr, "switch table"));
                };
                return self.branch(index, instr, targets, true, frame, ctx);
            }
            Leave => {
                frame.clear();
                let target = self.target(instr)?;
                return self.branch(index, instr, &[target], false, frame, ctx);
            }
            Endfinally | Rethrow => return Ok(Flow::Stop),
            Endfilter | Throw => {
                self.pop(instr, frame)?;
                return Ok(Flow::Stop);
            }

            // Arithmetic, logic and comparison produce non-symbolic values
            Add | AddOvf | AddOvfUn | Sub | SubOvf | SubOvfUn | Mul | MulOvf | MulOvfUn | Div
            | DivUn | Rem | RemUn | And | Or | Xor | Shl | Shr | ShrUn | Ceq | Cgt | CgtUn
            | Clt | CltUn => {
                self.pop(instr, frame)?;
                self.pop(instr, frame)?;
                frame.push(ctx.slots.fake());
            }
            Neg | Not | Conv(_) | ConvOvf(_) | ConvOvfUn(_) | ConvRUn | Ckfinite => {
                self.pop(instr, frame)?;
                frame.push(ctx.slots.fake());
            }

            // Indirect access
            Ldind(kind) => {
                let address = self.pop(instr, frame)?;
                if kind.is_reference() {
                    frame.push(address);
                } else {
                    frame.push(ctx.slots.fake());
                }
            }
            Stind(kind) => {
                let value = self.pop(instr, frame)?;
                let address = self.pop(instr, frame)?;
                if kind.is_reference() {
                    store_through(ctx, address, value);
                }
            }
            Ldobj => {
                let ty = self.type_operand(instr)?;
                let address = self.pop(instr, frame)?;
                if is_simple_type(ty) {
                    frame.push(ctx.slots.fake());
                } else {
                    frame.push(address);
                }
            }
            Stobj => {
                let ty = self.type_operand(instr)?;
                let value = self.pop(instr, frame)?;
                let address = self.pop(instr, frame)?;
                if !is_simple_type(ty) {
                    store_through(ctx, address, value);
                }
            }
            Cpobj => {
                let ty = self.type_operand(instr)?;
                let source = self.pop(instr, frame)?;
                let destination = self.pop(instr, frame)?;
                if !is_simple_type(ty) {
                    store_through(ctx, destination, source);
                }
            }
            Initobj => {
                self.pop(instr, frame)?;
            }
            Cpblk | Initblk => {
                for _ in 0..3 {
                    self.pop(instr, frame)?;
                }
            }

            // Instance fields
            Ldfld => {
                let field = self.field_operand(instr)?;
                let object = self.pop(instr, frame)?;
                if is_simple_type(&field.field_type) {
                    frame.push(ctx.slots.fake());
                } else {
                    frame.push(ctx.slots.load(object, field.key()));
                }
            }
            Ldflda => {
                let field = self.field_operand(instr)?;
                let object = self.pop(instr, frame)?;
                let owner = ctx.slots.materialize_or_create(
                    &mut ctx.graph,
                    object,
                    EntitySource::Uninitialized,
                );
                let cell = ctx.graph.load_field(owner, field.key());
                frame.push(ctx.slots.entity(cell));
            }
            Stfld => {
                let field = self.field_operand(instr)?;
                let value = self.pop(instr, frame)?;
                let object = self.pop(instr, frame)?;
                if !is_simple_type(&field.field_type) {
                    store_into(ctx, object, field.key(), value);
                }
            }

            // Static fields
            Ldsfld => {
                let field = self.field_operand(instr)?;
                if is_simple_type(&field.field_type) {
                    frame.push(ctx.slots.fake());
                } else {
                    let entity = ctx.statics.load(field.key(), &mut ctx.graph);
                    frame.push(ctx.slots.entity(entity));
                }
            }
            Ldsflda => {
                let field = self.field_operand(instr)?;
                let entity = ctx.statics.load(field.key(), &mut ctx.graph);
                frame.push(ctx.slots.entity(entity));
            }
            Stsfld => {
                let field = self.field_operand(instr)?;
                let value = self.pop(instr, frame)?;
                if !is_simple_type(&field.field_type) {
                    if let Some(value) = ctx.slots.materialize_single(&mut ctx.graph, value) {
                        ctx.statics.store(field.key(), value, &mut ctx.graph);
                    }
                }
            }

            // Type operations keep the reference
            Castclass | Isinst | Box | Unbox | Mkrefany | Refanyval => {
                let value = self.pop(instr, frame)?;
                frame.push(value);
            }
            UnboxAny => {
                let ty = self.type_operand(instr)?;
                let value = self.pop(instr, frame)?;
                if is_simple_type(ty) {
                    frame.push(ctx.slots.fake());
                } else {
                    frame.push(value);
                }
            }
            Sizeof | Ldtoken | Ldftn | Arglist => frame.push(ctx.slots.fake()),
            Ldvirtftn | Localloc | Refanytype | Ldlen => {
                self.pop(instr, frame)?;
                frame.push(ctx.slots.fake());
            }

            // Arrays share one element cell
            Newarr => {
                self.pop(instr, frame)?;
                let array = ctx.graph.create(Some(EntitySource::Array));
                frame.push(ctx.slots.entity(array));
            }
            Ldelema => {
                self.pop(instr, frame)?;
                let array = self.pop(instr, frame)?;
                let owner =
                    ctx.slots
                        .materialize_or_create(&mut ctx.graph, array, EntitySource::Array);
                let cell = ctx.graph.load_field(owner, FieldKey::array_element());
                frame.push(ctx.slots.entity(cell));
            }
            Ldelem(kind) => {
                let reference = self.element_is_reference(instr, kind)?;
                self.pop(instr, frame)?;
                let array = self.pop(instr, frame)?;
                if reference {
                    frame.push(ctx.slots.load(array, FieldKey::array_element()));
                } else {
                    frame.push(ctx.slots.fake());
                }
            }
            Stelem(kind) => {
                let reference = self.element_is_reference(instr, kind)?;
                let value = self.pop(instr, frame)?;
                self.pop(instr, frame)?;
                let array = self.pop(instr, frame)?;
                if reference {
                    store_into(ctx, array, FieldKey::array_element(), value);
                }
            }

            // Indirect/tail jumps, raw prefixes, reserved and short forms
            _ => {
                return Err(AnalysisError::UnsupportedOpcode {
                    opcode: instr.opcode,
                    offset: instr.offset,
                    method: self.signature.clone(),
                });
            }
        }

        Ok(Flow::Next)
    }

    fn call(
        &mut self,
        instr: &Instruction,
        kind: CallEffectKind,
        frame: &mut StackFrame,
        ctx: &mut ExecutionContext,
    ) -> Result<Flow> {
        let Operand::Method(method) = &instr.operand else {
            return Err(self.invalid_operand(instr, "method reference"));
        };
        ctx.count_method_call();

        let formal_types = method.formal_types();
        let on_stack = if kind == CallEffectKind::NewObj {
            method.parameters.len()
        } else {
            method.formal_count()
        };

        let mut popped = Vec::with_capacity(on_stack);
        for _ in 0..on_stack {
            popped.push(self.pop(instr, frame)?);
        }
        popped.reverse();

        let stack_types = &formal_types[formal_types.len() - on_stack..];
        let mut parameters: Vec<Option<EntityId>> = Vec::with_capacity(formal_types.len());
        for (slot, ty) in popped.into_iter().zip(stack_types) {
            let entity = if is_simple_type(ty) {
                None
            } else {
                ctx.slots.materialize_single(&mut ctx.graph, slot)
            };
            parameters.push(entity);
        }

        let output = if kind == CallEffectKind::NewObj {
            let object = (!is_simple_type(&method.declaring_type)).then(|| {
                ctx.graph.create(Some(EntitySource::Constructed(
                    method.declaring_type.full_name.clone(),
                )))
            });
            parameters.insert(0, object);
            push_result(ctx, frame, object);
            object
        } else if method.returns_value() {
            let value = (!is_simple_type(&method.return_type))
                .then(|| ctx.graph.create(Some(EntitySource::MethodReturn(method.signature()))));
            push_result(ctx, frame, value);
            value
        } else {
            None
        };

        Ok(Flow::Effect(CallEffect {
            kind,
            method: method.clone(),
            parameters,
            output,
            offset: instr.offset,
        }))
    }

    /// Route the current path to branch targets.
    ///
    /// Forward targets receive a copy of the frame at their join point. The
    /// earliest untaken backward target is jumped to directly; other
    /// backward targets are queued (the rescan passes them). A conditional
    /// branch that jumps back parks its fallthrough frame after itself.
    fn branch(
        &mut self,
        index: usize,
        instr: &Instruction,
        targets: &[u32],
        conditional: bool,
        frame: &mut StackFrame,
        ctx: &mut ExecutionContext,
    ) -> Result<Flow> {
        let mut back_jump: Option<usize> = None;

        for &target in targets {
            let to = self.flow.index(target).ok_or(AnalysisError::InvalidBranchTarget {
                offset: instr.offset,
                target,
            })?;

            if to > index {
                self.flow
                    .enqueue(to, frame.fork(), &mut ctx.slots, &mut ctx.graph)?;
            } else if self.flow.take_back_edge(index, to) {
                match back_jump {
                    Some(existing) if existing <= to => {
                        self.flow
                            .enqueue(to, frame.fork(), &mut ctx.slots, &mut ctx.graph)?;
                    }
                    Some(existing) => {
                        self.flow
                            .enqueue(existing, frame.fork(), &mut ctx.slots, &mut ctx.graph)?;
                        back_jump = Some(to);
                    }
                    None => back_jump = Some(to),
                }
            }
        }

        match back_jump {
            Some(to) => {
                if conditional {
                    self.flow
                        .enqueue(index + 1, frame.fork(), &mut ctx.slots, &mut ctx.graph)?;
                }
                Ok(Flow::Jump(to))
            }
            None if conditional => Ok(Flow::Next),
            None => Ok(Flow::Stop),
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Operand helpers
    // ═══════════════════════════════════════════════════════════════════════

    fn pop(&self, instr: &Instruction, frame: &mut StackFrame) -> Result<SlotId> {
        frame.pop().ok_or_else(|| self.underflow(instr))
    }

    fn underflow(&self, instr: &Instruction) -> AnalysisError {
        AnalysisError::StackUnderflow {
            offset: instr.offset,
            method: self.signature.clone(),
        }
    }

    fn invalid_operand(&self, instr: &Instruction, expected: &'static str) -> AnalysisError {
        AnalysisError::InvalidOperand {
            opcode: instr.opcode,
            offset: instr.offset,
            expected,
        }
    }

    fn arg_index(&self, instr: &Instruction) -> Result<u16> {
        match instr.operand {
            Operand::Arg(index) => Ok(index),
            _ => Err(self.invalid_operand(instr, "argument index")),
        }
    }

    fn argument_slot(&self, instr: &Instruction, ctx: &ExecutionContext) -> Result<SlotId> {
        let index = self.arg_index(instr)?;
        ctx.arguments
            .load(index)
            .ok_or_else(|| self.invalid_operand(instr, "argument index in range"))
    }

    fn local_index(&self, instr: &Instruction) -> Result<u16> {
        match instr.operand {
            Operand::Local(index) => Ok(index),
            _ => Err(self.invalid_operand(instr, "local index")),
        }
    }

    fn target(&self, instr: &Instruction) -> Result<u32> {
        match instr.operand {
            Operand::Target(target) => Ok(target),
            _ => Err(self.invalid_operand(instr, "branch target")),
        }
    }

    fn field_operand<'i>(&self, instr: &'i Instruction) -> Result<&'i FieldRef> {
        match &instr.operand {
            Operand::Field(field) => Ok(field),
            _ => Err(self.invalid_operand(instr, "field reference")),
        }
    }

    fn type_operand<'i>(&self, instr: &'i Instruction) -> Result<&'i TypeRef> {
        match &instr.operand {
            Operand::Type(ty) => Ok(ty),
            _ => Err(self.invalid_operand(instr, "type token")),
        }
    }

    /// `ldelem.ref`, or `ldelem <T>` with a non-simple element type
    fn element_is_reference(&self, instr: &Instruction, kind: ValueKind) -> Result<bool> {
        match kind {
            ValueKind::Ref => Ok(true),
            ValueKind::Any => Ok(!is_simple_type(self.type_operand(instr)?)),
            _ => Ok(false),
        }
    }
}

fn push_result(ctx: &mut ExecutionContext, frame: &mut StackFrame, value: Option<EntityId>) {
    let slot = match value {
        Some(entity) => ctx.slots.entity(entity),
        None => ctx.slots.fake(),
    };
    frame.push(slot);
}

/// `*address = value`: the pointer target and the value become one entity
fn store_through(ctx: &mut ExecutionContext, address: SlotId, value: SlotId) {
    let Some(target) = ctx.slots.materialize_single(&mut ctx.graph, address) else {
        return;
    };
    if let Some(value) = ctx.slots.materialize_single(&mut ctx.graph, value) {
        ctx.graph.merge(target, value);
    }
}

/// `owner.key = value` for every entity the owner slot may hold
fn store_into(ctx: &mut ExecutionContext, owner: SlotId, key: FieldKey, value: SlotId) {
    let Some(value) = ctx.slots.materialize_single(&mut ctx.graph, value) else {
        return;
    };
    for owner in ctx.slots.materialize(&mut ctx.graph, owner) {
        ctx.graph.store_field(owner, key.clone(), value);
    }
}
