//! Branches: goto, conditional jumps, three-way compares and the two switch
//! payload forms. Branch offsets are signed counts of 16-bit code units
//! relative to the branching instruction.

use crate::instruction::*;
use crate::jvm::error::{Throw, VmError};
use crate::jvm::interp::{FlowControl, OpResult};
use crate::jvm::mem::value_eq;
use crate::jvm::thread::JThread;

const PACKED_SWITCH_IDENT: u16 = 0x0100;
const SPARSE_SWITCH_IDENT: u16 = 0x0200;

fn jump(pc: usize, offset_units: i32) -> FlowControl {
    FlowControl::Jump((pc as i64 + offset_units as i64 * 2) as u32)
}

pub fn goto_op(op: Opcode, code: &[u8], pc: usize) -> OpResult {
    let offset = match op {
        Opcode::Goto => decode_10t(code, pc),
        Opcode::Goto16 => decode_20t(code, pc),
        _ => decode_30t(code, pc),
    };
    Ok(jump(pc, offset))
}

pub fn if_op(thread: &mut JThread, op: Opcode, code: &[u8], pc: usize) -> OpResult {
    let (a, b, offset) = decode_22t(code, pc);
    let frame = thread.current_frame().map_err(Throw::Fatal)?;

    let taken = match op {
        // eq/ne compare register contents, references included
        Opcode::IfEq => value_eq(&frame.get(a)?, &frame.get(b)?),
        Opcode::IfNe => !value_eq(&frame.get(a)?, &frame.get(b)?),
        Opcode::IfLt => frame.get_int(a)? < frame.get_int(b)?,
        Opcode::IfGe => frame.get_int(a)? >= frame.get_int(b)?,
        Opcode::IfGt => frame.get_int(a)? > frame.get_int(b)?,
        _ => frame.get_int(a)? <= frame.get_int(b)?,
    };

    if taken {
        Ok(jump(pc, offset))
    } else {
        Ok(FlowControl::Next)
    }
}

pub fn ifz_op(thread: &mut JThread, op: Opcode, code: &[u8], pc: usize) -> OpResult {
    let (a, offset) = decode_21t(code, pc);
    let frame = thread.current_frame().map_err(Throw::Fatal)?;

    let taken = match op {
        Opcode::IfEqz => value_eq(&frame.get(a)?, &crate::jvm::mem::Value::Word(0)),
        Opcode::IfNez => !value_eq(&frame.get(a)?, &crate::jvm::mem::Value::Word(0)),
        Opcode::IfLtz => frame.get_int(a)? < 0,
        Opcode::IfGez => frame.get_int(a)? >= 0,
        Opcode::IfGtz => frame.get_int(a)? > 0,
        _ => frame.get_int(a)? <= 0,
    };

    if taken {
        Ok(jump(pc, offset))
    } else {
        Ok(FlowControl::Next)
    }
}

pub fn cmp_op(thread: &mut JThread, op: Opcode, code: &[u8], pc: usize) -> OpResult {
    let (dst, a, b) = decode_23x(code, pc);
    let frame = thread.current_frame().map_err(Throw::Fatal)?;

    // cmpl and cmpg differ only in how an unordered (NaN) compare lands
    let result = match op {
        Opcode::CmplFloat | Opcode::CmpgFloat => {
            let (x, y) = (frame.get_float(a)?, frame.get_float(b)?);
            match x.partial_cmp(&y) {
                Some(order) => order as i32,
                None if op == Opcode::CmplFloat => -1,
                None => 1,
            }
        }
        Opcode::CmplDouble | Opcode::CmpgDouble => {
            let (x, y) = (frame.get_double(a)?, frame.get_double(b)?);
            match x.partial_cmp(&y) {
                Some(order) => order as i32,
                None if op == Opcode::CmplDouble => -1,
                None => 1,
            }
        }
        _ => {
            let (x, y) = (frame.get_long(a)?, frame.get_long(b)?);
            x.cmp(&y) as i32
        }
    };

    frame.set_int(dst, result)?;
    Ok(FlowControl::Next)
}

fn payload_u16(code: &[u8], at: usize) -> Result<u16, Throw> {
    if at + 2 > code.len() {
        return Err(Throw::Fatal(VmError::InvalidBytecode(
            "switch payload past the end of the method".to_string(),
        )));
    }
    Ok(u16::from_le_bytes([code[at], code[at + 1]]))
}

fn payload_i32(code: &[u8], at: usize) -> Result<i32, Throw> {
    if at + 4 > code.len() {
        return Err(Throw::Fatal(VmError::InvalidBytecode(
            "switch payload past the end of the method".to_string(),
        )));
    }
    Ok(i32::from_le_bytes([
        code[at],
        code[at + 1],
        code[at + 2],
        code[at + 3],
    ]))
}

pub fn switch_op(thread: &mut JThread, op: Opcode, code: &[u8], pc: usize) -> OpResult {
    let (reg, offset) = decode_31t(code, pc);
    let frame = thread.current_frame().map_err(Throw::Fatal)?;
    let value = frame.get_int(reg)?;

    let table = (pc as i64 + offset as i64 * 2) as usize;
    let ident = payload_u16(code, table)?;

    match op {
        Opcode::PackedSwitch => {
            if ident != PACKED_SWITCH_IDENT {
                return Err(Throw::Fatal(VmError::InvalidBytecode(format!(
                    "bad packed-switch identifier {:#06x}",
                    ident
                ))));
            }
            let size = payload_u16(code, table + 2)? as i32;
            let first_key = payload_i32(code, table + 4)?;

            if value >= first_key && value < first_key + size {
                let slot = (value - first_key) as usize;
                let target = payload_i32(code, table + 8 + slot * 4)?;
                return Ok(jump(pc, target));
            }
            Ok(FlowControl::Next)
        }
        _ => {
            if ident != SPARSE_SWITCH_IDENT {
                return Err(Throw::Fatal(VmError::InvalidBytecode(format!(
                    "bad sparse-switch identifier {:#06x}",
                    ident
                ))));
            }
            let size = payload_u16(code, table + 2)? as usize;
            for slot in 0..size {
                let key = payload_i32(code, table + 4 + slot * 4)?;
                if key == value {
                    let target = payload_i32(code, table + 4 + (size + slot) * 4)?;
                    return Ok(jump(pc, target));
                }
            }
            Ok(FlowControl::Next)
        }
    }
}
