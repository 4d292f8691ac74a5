//! Register copies, result/exception moves and literal loads.

use std::sync::Arc;

use crate::instruction::*;
use crate::jvm::error::Throw;
use crate::jvm::interp::{FlowControl, OpResult};
use crate::jvm::mem::{value_as_long, Value};
use crate::jvm::thread::JThread;
use crate::jvm::Vm;

pub fn move_op(thread: &mut JThread, op: Opcode, code: &[u8], pc: usize) -> OpResult {
    use Opcode::*;

    let (dst, src) = match op {
        Move | MoveWide | MoveObject => decode_12x(code, pc),
        MoveFrom16 | MoveWideFrom16 | MoveObjectFrom16 => decode_22x(code, pc),
        _ => decode_32x(code, pc),
    };

    let wide = matches!(op, MoveWide | MoveWideFrom16 | MoveWide16);
    let frame = thread.current_frame().map_err(crate::jvm::error::Throw::Fatal)?;

    let value = frame.get(src)?;
    frame.set(dst, value)?;
    if wide {
        let high = frame.get(src + 1)?;
        frame.set(dst + 1, high)?;
    }
    Ok(FlowControl::Next)
}

pub fn move_result(thread: &mut JThread, op: Opcode, code: &[u8], pc: usize) -> OpResult {
    let dst = decode_11x(code, pc);
    let frame = thread.current_frame().map_err(crate::jvm::error::Throw::Fatal)?;
    let result = frame.return_value();

    match op {
        Opcode::MoveResultWide => {
            let wide = value_as_long(&result)?;
            frame.set_long(dst, wide)?;
        }
        _ => frame.set(dst, result)?,
    }
    Ok(FlowControl::Next)
}

pub fn move_exception(thread: &mut JThread, code: &[u8], pc: usize) -> OpResult {
    let dst = decode_11x(code, pc);
    let frame = thread.current_frame().map_err(crate::jvm::error::Throw::Fatal)?;
    let thrown = frame.take_exception();
    let null = frame.null();
    frame.set_obj(dst, thrown.unwrap_or(null))?;
    Ok(FlowControl::Next)
}

pub fn const_op(thread: &mut JThread, op: Opcode, code: &[u8], pc: usize) -> OpResult {
    use Opcode::*;

    let frame = thread.current_frame().map_err(crate::jvm::error::Throw::Fatal)?;
    match op {
        Const4 => {
            let (dst, lit) = decode_11n(code, pc);
            frame.set_int(dst, lit)?;
        }
        Const16 => {
            let (dst, lit) = decode_21s(code, pc);
            frame.set_int(dst, lit)?;
        }
        Const => {
            let (dst, lit) = decode_31i(code, pc);
            frame.set_int(dst, lit)?;
        }
        ConstHigh16 => {
            let (dst, lit) = decode_21s(code, pc);
            frame.set_int(dst, lit << 16)?;
        }
        ConstWide16 => {
            let (dst, lit) = decode_21s(code, pc);
            frame.set_long(dst, lit as i64)?;
        }
        ConstWide32 => {
            let (dst, lit) = decode_31i(code, pc);
            frame.set_long(dst, lit as i64)?;
        }
        ConstWide => {
            let (dst, lit) = decode_51l(code, pc);
            frame.set_long(dst, lit)?;
        }
        _ => {
            // const-wide/high16
            let (dst, lit) = decode_21s(code, pc);
            frame.set_long(dst, (lit as i64) << 48)?;
        }
    }
    Ok(FlowControl::Next)
}

pub fn const_string(
    vm: &Arc<Vm>,
    thread: &mut JThread,
    op: Opcode,
    code: &[u8],
    pc: usize,
) -> OpResult {
    let (dst, idx) = match op {
        Opcode::ConstString => {
            let (dst, idx) = decode_21c(code, pc);
            (dst, idx as u32)
        }
        _ => decode_31c(code, pc),
    };

    let dex_idx = thread.current_frame().map_err(crate::jvm::error::Throw::Fatal)?.dex_idx();
    let text = vm.registry.resolve_string(dex_idx, idx)?;
    let obj = vm.intern_string(&text);

    let frame = thread.current_frame().map_err(crate::jvm::error::Throw::Fatal)?;
    frame.set(dst, Value::Ref(obj))?;
    Ok(FlowControl::Next)
}
