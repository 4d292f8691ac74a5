//! Array allocation and element access, plus the `fill-array-data` payload
//! form and `filled-new-array`.

use std::sync::Arc;

use crate::instruction::*;
use crate::jvm::error::{negative_array_size, npe, Throw, VmError};
use crate::jvm::interp::{FlowControl, OpResult};
use crate::jvm::mem::{value_as_int, ArrayObject, ObjectRef, Value};
use crate::jvm::thread::JThread;
use crate::jvm::Vm;

const FILL_ARRAY_IDENT: u16 = 0x0300;

fn expect_array<'a>(obj: &'a ObjectRef, what: &str) -> Result<&'a ArrayObject, Throw> {
    if obj.is_null() {
        return Err(npe(format!("{} on a null array", what)));
    }
    obj.as_array().ok_or_else(|| {
        crate::jvm::error::Throw::Fatal(VmError::TypeMismatch(format!(
            "{} on a non-array object",
            what
        )))
    })
}

pub fn array_length(thread: &mut JThread, code: &[u8], pc: usize) -> OpResult {
    let (dst, src) = decode_12x(code, pc);
    let frame = thread.current_frame().map_err(crate::jvm::error::Throw::Fatal)?;
    let obj = frame.get_obj(src)?;
    let length = expect_array(&obj, "array-length")?.length();
    frame.set_int(dst, length as i32)?;
    Ok(FlowControl::Next)
}

pub fn new_array(vm: &Arc<Vm>, thread: &mut JThread, code: &[u8], pc: usize) -> OpResult {
    let (dst, size_reg, type_idx) = decode_22c(code, pc);
    let frame = thread.current_frame().map_err(crate::jvm::error::Throw::Fatal)?;
    let size = frame.get_int(size_reg)?;
    if size < 0 {
        return Err(negative_array_size(size));
    }

    let (element, dims) = vm.registry.resolve_array(frame.dex_idx(), type_idx as u32)?;
    // A multi-dimensional descriptor allocates one dimension of arrays
    let element = if dims > 1 {
        format!("{}{}", "[".repeat(dims as usize - 1), element)
    } else {
        element
    };

    let array = vm.heap().make_array(&element, vec![size as u32]);
    frame.set_obj(dst, array)?;
    Ok(FlowControl::Next)
}

pub fn filled_new_array(
    vm: &Arc<Vm>,
    thread: &mut JThread,
    op: Opcode,
    code: &[u8],
    pc: usize,
) -> OpResult {
    let (regs, type_idx) = match op {
        Opcode::FilledNewArray => decode_35c(code, pc),
        _ => decode_3rc(code, pc),
    };

    let frame = thread.current_frame().map_err(crate::jvm::error::Throw::Fatal)?;
    let (element, _) = vm.registry.resolve_array(frame.dex_idx(), type_idx as u32)?;

    let array = vm.heap().make_array(&element, vec![regs.len() as u32]);
    {
        let backing = array.as_array().expect("freshly allocated array");
        for (slot, reg) in regs.iter().enumerate() {
            backing.set(slot as i32, frame.get(*reg)?)?;
        }
    }

    // The result is picked up by a following move-result-object
    frame.set_return(Value::Ref(array));
    Ok(FlowControl::Next)
}

pub fn fill_array_data(vm: &Arc<Vm>, thread: &mut JThread, code: &[u8], pc: usize) -> OpResult {
    let (reg, offset) = decode_31t(code, pc);
    let frame = thread.current_frame().map_err(crate::jvm::error::Throw::Fatal)?;
    let obj = frame.get_obj(reg)?;
    let array = expect_array(&obj, "fill-array-data")?;

    let table = (pc as i64 + offset as i64 * 2) as usize;
    let read_u16 = |at: usize| -> Result<u16, Throw> {
        if at + 2 > code.len() {
            return Err(crate::jvm::error::Throw::Fatal(VmError::InvalidBytecode(
                "array-data payload past the end of the method".to_string(),
            )));
        }
        Ok(u16::from_le_bytes([code[at], code[at + 1]]))
    };

    let ident = read_u16(table)?;
    if ident != FILL_ARRAY_IDENT {
        return Err(crate::jvm::error::Throw::Fatal(VmError::InvalidBytecode(format!(
            "bad array-data identifier {:#06x}",
            ident
        ))));
    }

    let element_size = read_u16(table + 2)? as usize;
    let count = read_u16(table + 4)? as u32 | (read_u16(table + 6)? as u32) << 16;
    if array.length() != count {
        return Err(crate::jvm::error::Throw::Fatal(VmError::InvalidBytecode(format!(
            "array-data holds {} elements but the array length is {}",
            count,
            array.length()
        ))));
    }

    let data_start = table + 8;
    let data_len = element_size * count as usize;
    if data_start + data_len > code.len() {
        return Err(crate::jvm::error::Throw::Fatal(VmError::InvalidBytecode(
            "array-data elements past the end of the method".to_string(),
        )));
    }

    for index in 0..count as usize {
        let at = data_start + index * element_size;
        let value = match element_size {
            1 => Value::Word(code[at] as i8 as i32 as u32),
            2 => Value::Word(i16::from_le_bytes([code[at], code[at + 1]]) as i32 as u32),
            4 => Value::Word(u32::from_le_bytes([
                code[at],
                code[at + 1],
                code[at + 2],
                code[at + 3],
            ])),
            8 => {
                let mut bytes = [0u8; 8];
                bytes.copy_from_slice(&code[at..at + 8]);
                Value::Ref(vm.heap().make_number(i64::from_le_bytes(bytes)))
            }
            other => {
                return Err(crate::jvm::error::Throw::Fatal(VmError::InvalidBytecode(format!(
                    "unsupported array-data element size {}",
                    other
                ))))
            }
        };
        array.set(index as i32, value)?;
    }
    Ok(FlowControl::Next)
}

/// The whole aget/aput family. Byte, boolean, char and short variants
/// sign- or zero-extend to a full int word.
pub fn access(vm: &Arc<Vm>, thread: &mut JThread, op: Opcode, code: &[u8], pc: usize) -> OpResult {
    use Opcode::*;

    let (value_reg, array_reg, index_reg) = decode_23x(code, pc);
    let frame = thread.current_frame().map_err(crate::jvm::error::Throw::Fatal)?;

    let obj = frame.get_obj(array_reg)?;
    let array = expect_array(&obj, op.mnemonic())?;
    let index = frame.get_int(index_reg)?;

    match op {
        Aget => {
            let value = array.get(index)?;
            frame.set(value_reg, Value::Word(crate::jvm::mem::value_as_word(&value)?))?;
        }
        AgetWide => {
            let value = crate::jvm::mem::value_as_long(&array.get(index)?)?;
            frame.set_long(value_reg, value)?;
        }
        AgetObject => {
            let value = array.get(index)?;
            frame.set(value_reg, value)?;
        }
        AgetBoolean => {
            let value = value_as_int(&array.get(index)?)?;
            frame.set_int(value_reg, value & 1)?;
        }
        AgetByte => {
            let value = value_as_int(&array.get(index)?)?;
            frame.set_int(value_reg, value as i8 as i32)?;
        }
        AgetChar => {
            let value = value_as_int(&array.get(index)?)?;
            frame.set_int(value_reg, value as u16 as i32)?;
        }
        AgetShort => {
            let value = value_as_int(&array.get(index)?)?;
            frame.set_int(value_reg, value as i16 as i32)?;
        }
        Aput => {
            let value = frame.get_int(value_reg)?;
            array.set(index, Value::Word(value as u32))?;
        }
        AputWide => {
            let value = frame.get_long(value_reg)?;
            array.set(index, Value::Ref(vm.heap().make_number(value)))?;
        }
        AputObject => {
            let value = frame.get(value_reg)?;
            // Element types are enforced on write
            if let Value::Ref(stored) = &value {
                if !stored.is_null() {
                    if let Some(class) = stored.class_name() {
                        if !vm.registry.is_assignable(&class, array.element_type()) {
                            return Err(crate::jvm::error::Throw::Fatal(VmError::TypeMismatch(format!(
                                "cannot store {} into an array of {}",
                                class,
                                array.element_type()
                            ))));
                        }
                    }
                }
            }
            array.set(index, value)?;
        }
        AputBoolean => {
            let value = frame.get_int(value_reg)?;
            array.set(index, Value::Word((value & 1) as u32))?;
        }
        AputByte => {
            let value = frame.get_int(value_reg)?;
            array.set(index, Value::Word(value as i8 as i32 as u32))?;
        }
        AputChar => {
            let value = frame.get_int(value_reg)?;
            array.set(index, Value::Word(value as u16 as u32))?;
        }
        _ => {
            // aput-short
            let value = frame.get_int(value_reg)?;
            array.set(index, Value::Word(value as i16 as i32 as u32))?;
        }
    }
    Ok(FlowControl::Next)
}
