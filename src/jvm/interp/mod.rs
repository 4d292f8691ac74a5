//! Interpreter dispatch. One `step` executes the opcode at the current
//! frame's pc, advances the pc by that opcode's length (branches and frame
//! changes excepted) and returns. Exceptions travel as `Err(Throw)` out of
//! the opcode handlers and are resolved by the unwinding loop here, so the
//! hot path never unwinds the host stack.

mod arith;
mod arrays;
mod branches;
mod fields;
mod invoke;
mod moves;
mod objects;

#[cfg(test)]
mod tests;

use std::sync::Arc;

use crate::class::Class;
use crate::instruction::{dis, Opcode};
use crate::jvm::error::{Throw, VmError};
use crate::jvm::mem::Value;
use crate::jvm::thread::JThread;
use crate::jvm::Vm;

/// How the pc moves after an opcode executes.
pub enum FlowControl {
    /// Advance past the instruction just executed.
    Next,
    /// The handler already adjusted the frame stack or wants the same
    /// instruction to re-execute (the `<clinit>` rewind).
    Hold,
    /// Branch to an absolute byte offset in the current method.
    Jump(u32),
}

pub type OpResult = Result<FlowControl, Throw>;

/// Execute a single instruction on the thread's current frame.
pub fn step(vm: &Arc<Vm>, thread: &mut JThread) -> Result<(), VmError> {
    let (method, pc) = {
        let frame = thread.current_frame()?;
        (frame.method().clone(), frame.pc as usize)
    };

    let code = method.bytecode().ok_or_else(|| {
        VmError::Malformed(format!(
            "method {}.{} has no bytecode",
            method.class_name(),
            method.name()
        ))
    })?;

    if pc >= code.len() {
        return Err(VmError::InvalidBytecode(format!(
            "pc {:#x} past the end of {}.{}",
            pc,
            method.class_name(),
            method.name()
        )));
    }

    let byte = code[pc];
    let op = Opcode::decode(byte).ok_or(VmError::UnknownOpcode {
        opcode: byte,
        pc: pc as u32,
    })?;
    let length = op.length() as usize;
    if pc + length > code.len() {
        return Err(VmError::InvalidBytecode(format!(
            "truncated {} at pc {:#x}",
            op.mnemonic(),
            pc
        )));
    }

    if log::log_enabled!(log::Level::Trace) {
        if let Some((text, _)) = dis::disassemble(code, pc) {
            trace!(
                "{:04x}: {:<40} {}.{}",
                pc / 2,
                text,
                method.class_name(),
                method.name()
            );
        }
    }

    match exec(vm, thread, op, code, pc) {
        Ok(FlowControl::Next) => {
            thread.current_frame()?.pc = (pc + length) as u32;
            Ok(())
        }
        Ok(FlowControl::Hold) => Ok(()),
        Ok(FlowControl::Jump(target)) => {
            thread.current_frame()?.pc = target;
            Ok(())
        }
        Err(throw) => handle_throw(vm, thread, throw),
    }
}

fn exec(vm: &Arc<Vm>, thread: &mut JThread, op: Opcode, code: &[u8], pc: usize) -> OpResult {
    use Opcode::*;

    match op {
        Nop => Ok(FlowControl::Next),

        Move | MoveWide | MoveObject | MoveFrom16 | MoveWideFrom16 | MoveObjectFrom16
        | Move16 | MoveWide16 | MoveObject16 => moves::move_op(thread, op, code, pc),

        MoveResult | MoveResultWide | MoveResultObject => {
            moves::move_result(thread, op, code, pc)
        }
        MoveException => moves::move_exception(thread, code, pc),

        ReturnVoid | Return | ReturnWide | ReturnObject => {
            invoke::return_op(vm, thread, op, code, pc)
        }

        Const4 | Const16 | Const | ConstHigh16 | ConstWide16 | ConstWide32 | ConstWide
        | ConstWideHigh16 => moves::const_op(thread, op, code, pc),
        ConstString | ConstStringJumbo => moves::const_string(vm, thread, op, code, pc),
        ConstClass => objects::const_class(vm, thread, code, pc),

        MonitorEnter | MonitorExit => objects::monitor_op(thread, op, code, pc),

        CheckCast => objects::check_cast(vm, thread, code, pc),
        InstanceOf => objects::instance_of(vm, thread, code, pc),
        ArrayLength => arrays::array_length(thread, code, pc),

        NewInstance => objects::new_instance(vm, thread, code, pc),
        NewArray => arrays::new_array(vm, thread, code, pc),
        FilledNewArray | FilledNewArrayRange => {
            arrays::filled_new_array(vm, thread, op, code, pc)
        }
        FillArrayData => arrays::fill_array_data(vm, thread, code, pc),

        Throw => objects::throw_op(thread, code, pc),

        Goto | Goto16 | Goto32 => branches::goto_op(op, code, pc),
        PackedSwitch | SparseSwitch => branches::switch_op(thread, op, code, pc),

        CmplFloat | CmpgFloat | CmplDouble | CmpgDouble | CmpLong => {
            branches::cmp_op(thread, op, code, pc)
        }

        IfEq | IfNe | IfLt | IfGe | IfGt | IfLe => branches::if_op(thread, op, code, pc),
        IfEqz | IfNez | IfLtz | IfGez | IfGtz | IfLez => {
            branches::ifz_op(thread, op, code, pc)
        }

        Aget | AgetWide | AgetObject | AgetBoolean | AgetByte | AgetChar | AgetShort | Aput
        | AputWide | AputObject | AputBoolean | AputByte | AputChar | AputShort => {
            arrays::access(vm, thread, op, code, pc)
        }

        Iget | IgetWide | IgetObject | IgetBoolean | IgetByte | IgetChar | IgetShort | Iput
        | IputWide | IputObject | IputBoolean | IputByte | IputChar | IputShort => {
            fields::instance_field(vm, thread, op, code, pc)
        }

        Sget | SgetWide | SgetObject | SgetBoolean | SgetByte | SgetChar | SgetShort | Sput
        | SputWide | SputObject | SputBoolean | SputByte | SputChar | SputShort => {
            fields::static_field(vm, thread, op, code, pc)
        }

        InvokeVirtual | InvokeSuper | InvokeDirect | InvokeStatic | InvokeInterface
        | InvokeVirtualRange | InvokeSuperRange | InvokeDirectRange | InvokeStaticRange
        | InvokeInterfaceRange => invoke::invoke_op(vm, thread, op, code, pc),

        NegInt | NotInt | NegLong | NotLong | NegFloat | NegDouble | IntToLong | IntToFloat
        | IntToDouble | LongToInt | LongToFloat | LongToDouble | FloatToInt | FloatToLong
        | FloatToDouble | DoubleToInt | DoubleToLong | DoubleToFloat | IntToByte | IntToChar
        | IntToShort => arith::unary(thread, op, code, pc),

        _ => arith::binary(thread, op, code, pc),
    }
}

/// Ensure `class` is statically initialized before an instruction that needs
/// it proceeds. When a `<clinit>` frame is pushed the caller must return
/// `Hold` so its own instruction re-executes once the initializer finishes;
/// the flag is set before the frame runs, so the retry sees an initialized
/// class and `<clinit>` runs exactly once.
pub(super) fn require_initialized(
    vm: &Arc<Vm>,
    thread: &mut JThread,
    class: &Arc<Class>,
) -> Result<bool, Throw> {
    if class.is_static_initialized() {
        return Ok(true);
    }

    match class.static_initializer() {
        Some(clinit) if clinit.bytecode().is_some() => {
            debug!("running <clinit> of {}", class.fullname());
            thread.push_frame(clinit).map_err(Throw::Fatal)?;
            Ok(false)
        }
        Some(clinit) => {
            class.mark_static_initialized();
            if let Some(callback) = clinit.host_fn() {
                let frame = thread.current_frame().map_err(Throw::Fatal)?;
                callback(vm, frame, &[])?;
            }
            Ok(true)
        }
        None => {
            class.mark_static_initialized();
            Ok(true)
        }
    }
}

fn handle_throw(vm: &Arc<Vm>, thread: &mut JThread, throw: Throw) -> Result<(), VmError> {
    let thrown = match throw {
        Throw::Fatal(err) => return Err(err),
        Throw::Raise { class, message } => {
            debug!("raising {}: {}", class, message);
            vm.exception_object(class, &message)
        }
        Throw::Object(obj) => obj,
    };
    unwind(vm, thread, thrown)
}

/// Walk the frame stack looking for a try/catch range covering the faulting
/// pc whose handler type matches the thrown object; pop frames until one is
/// found or the stack empties (uncaught).
fn unwind(vm: &Arc<Vm>, thread: &mut JThread, thrown: crate::jvm::mem::ObjectRef) -> Result<(), VmError> {
    let thrown_class = thrown
        .class_name()
        .unwrap_or_else(|| "java.lang.Throwable".to_string());

    let mut top_frame = true;
    loop {
        let (method, dex_idx, fault_pc) = match thread.current_frame() {
            Ok(frame) => {
                // In caller frames the pc has already advanced past the
                // invoke; any byte inside the instruction identifies it
                let pc = if top_frame { frame.pc } else { frame.pc.saturating_sub(1) };
                (frame.method().clone(), frame.dex_idx(), pc)
            }
            Err(_) => return Err(uncaught(vm, &thrown_class, &thrown)),
        };

        // Addresses belong to at most one try range, so only the first
        // covering range is consulted
        if let Some(range) = method.tries().iter().find(|range| range.covers(fault_pc)) {
            for (type_idx, handler_pc) in &range.handlers {
                let catch_type = match vm.registry.resolve_class_name(dex_idx, *type_idx) {
                    Ok(name) => name,
                    Err(err) => {
                        warn!("unresolvable catch type in {}: {}", method.name(), err);
                        continue;
                    }
                };
                if vm.registry.is_assignable(&thrown_class, &catch_type) {
                    debug!("caught {} at pc {:#x}", thrown_class, handler_pc);
                    let frame = thread.current_frame()?;
                    frame.pc = *handler_pc;
                    frame.set_exception(Some(thrown));
                    return Ok(());
                }
            }

            if let Some(handler_pc) = range.catch_all {
                debug!("catch-all handler at pc {:#x}", handler_pc);
                let frame = thread.current_frame()?;
                frame.pc = handler_pc;
                frame.set_exception(Some(thrown));
                return Ok(());
            }
        }

        thread.pop_frame();
        top_frame = false;
        match thread.current_frame() {
            Ok(frame) => frame.set_exception(Some(thrown.clone())),
            Err(_) => return Err(uncaught(vm, &thrown_class, &thrown)),
        }
    }
}

fn uncaught(vm: &Arc<Vm>, class: &str, thrown: &crate::jvm::mem::ObjectRef) -> VmError {
    let message = thrown
        .get_field("message")
        .ok()
        .and_then(|value| match value {
            Value::Ref(obj) => obj.as_str().map(|s| s.to_string()),
            _ => None,
        })
        .unwrap_or_default();

    vm.write_err(&format!("uncaught exception {}: {}\n", class, message));
    VmError::UncaughtException {
        class: class.to_string(),
        message,
    }
}
