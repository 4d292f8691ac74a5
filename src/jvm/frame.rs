//! Per-invocation stack record: the typed register file, byte-addressed
//! program counter, return slot and pending-exception slot. Register access
//! is opcode-typed; the vector is sized once from the method's declared
//! register count and never grows.

use std::sync::Arc;

use crate::class::Method;
use crate::jvm::error::{Throw, VmError};
use crate::jvm::mem::{value_as_int, ObjectRef, Value};

pub struct Frame {
    method: Arc<Method>,
    registers: Vec<Value>,
    pub pc: u32,
    ret: Value,
    exception: Option<ObjectRef>,
    null: ObjectRef,
}

impl Frame {
    pub fn new(method: Arc<Method>, null: ObjectRef) -> Frame {
        let count = method.registers() as usize;
        trace!(
            "new frame for {}.{}{} ({} registers)",
            method.class_name(),
            method.name(),
            method.signature(),
            count
        );
        Frame {
            method,
            registers: vec![Value::Uninit; count],
            pc: 0,
            ret: Value::Uninit,
            exception: None,
            null,
        }
    }

    pub fn method(&self) -> &Arc<Method> {
        &self.method
    }

    pub fn dex_idx(&self) -> u32 {
        self.method.dex_idx()
    }

    pub fn register_count(&self) -> u16 {
        self.registers.len() as u16
    }

    fn bounds(&self, register: u16) -> Result<usize, Throw> {
        if (register as usize) < self.registers.len() {
            Ok(register as usize)
        } else {
            Err(Throw::Fatal(VmError::RegisterOutOfBounds {
                register,
                count: self.registers.len() as u16,
            }))
        }
    }

    /// Raw slot read, used by moves and argument copying where the width and
    /// type tag are preserved as-is.
    pub fn get(&self, register: u16) -> Result<Value, Throw> {
        let at = self.bounds(register)?;
        Ok(self.registers[at].clone())
    }

    pub fn set(&mut self, register: u16, value: Value) -> Result<(), Throw> {
        let at = self.bounds(register)?;
        self.registers[at] = value;
        Ok(())
    }

    pub fn get_int(&self, register: u16) -> Result<i32, Throw> {
        let at = self.bounds(register)?;
        value_as_int(&self.registers[at])
    }

    pub fn set_int(&mut self, register: u16, value: i32) -> Result<(), Throw> {
        self.set(register, Value::Word(value as u32))
    }

    pub fn get_long(&self, register: u16) -> Result<i64, Throw> {
        let low = self.get_int(register)? as u32 as u64;
        let high = self.get_int(register + 1)? as u32 as u64;
        Ok((high << 32 | low) as i64)
    }

    pub fn set_long(&mut self, register: u16, value: i64) -> Result<(), Throw> {
        let bits = value as u64;
        self.set(register, Value::Word(bits as u32))?;
        self.set(register + 1, Value::Word((bits >> 32) as u32))
    }

    pub fn get_float(&self, register: u16) -> Result<f32, Throw> {
        Ok(f32::from_bits(self.get_int(register)? as u32))
    }

    pub fn set_float(&mut self, register: u16, value: f32) -> Result<(), Throw> {
        self.set(register, Value::Word(value.to_bits()))
    }

    pub fn get_double(&self, register: u16) -> Result<f64, Throw> {
        Ok(f64::from_bits(self.get_long(register)? as u64))
    }

    pub fn set_double(&mut self, register: u16, value: f64) -> Result<(), Throw> {
        self.set_long(register, value.to_bits() as i64)
    }

    /// Read a slot as an object reference. An untouched slot reads as the
    /// null sentinel; a raw int word here means the bytecode mixed widths.
    pub fn get_obj(&self, register: u16) -> Result<ObjectRef, Throw> {
        let at = self.bounds(register)?;
        match &self.registers[at] {
            Value::Uninit => Ok(self.null.clone()),
            Value::Ref(obj) => Ok(obj.clone()),
            Value::Word(w) => Err(Throw::Fatal(VmError::TypeMismatch(format!(
                "register v{} holds the int word {:#x}, not a reference",
                register, w
            )))),
        }
    }

    pub fn set_obj(&mut self, register: u16, value: ObjectRef) -> Result<(), Throw> {
        self.set(register, Value::Ref(value))
    }

    pub fn null(&self) -> ObjectRef {
        self.null.clone()
    }

    // Return slot

    pub fn set_return(&mut self, value: Value) {
        self.ret = value;
    }

    pub fn set_return_int(&mut self, value: i32) {
        self.ret = Value::Word(value as u32);
    }

    pub fn set_return_obj(&mut self, value: ObjectRef) {
        self.ret = Value::Ref(value);
    }

    pub fn return_value(&self) -> Value {
        self.ret.clone()
    }

    pub fn return_int(&self) -> Result<i32, Throw> {
        value_as_int(&self.ret)
    }

    // Pending-exception slot

    pub fn set_exception(&mut self, exception: Option<ObjectRef>) {
        self.exception = exception;
    }

    /// Read and clear the slot; `move-exception` is the only opcode allowed
    /// to observe it.
    pub fn take_exception(&mut self) -> Option<ObjectRef> {
        self.exception.take()
    }

    pub fn has_exception(&self) -> bool {
        self.exception.is_some()
    }

    /// Every reference this frame keeps alive, for the GC root set.
    pub fn roots(&self, out: &mut Vec<ObjectRef>) {
        for value in &self.registers {
            if let Value::Ref(obj) = value {
                out.push(obj.clone());
            }
        }
        if let Value::Ref(obj) = &self.ret {
            out.push(obj.clone());
        }
        if let Some(obj) = &self.exception {
            out.push(obj.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::{AccessFlags, MethodBody};
    use crate::jvm::mem::{Object, ObjectBody};

    fn frame_with_registers(count: u16) -> Frame {
        let method = Arc::new(Method::new(
            "Test",
            "f",
            "()V",
            0,
            0,
            count,
            AccessFlags::STATIC,
            false,
            MethodBody::None,
            vec![],
        ));
        Frame::new(method, Arc::new(Object::with_body(ObjectBody::Null)))
    }

    #[test]
    fn rejects_out_of_bounds_registers() {
        let mut frame = frame_with_registers(4);
        assert!(frame.set_int(3, 1).is_ok());
        assert!(frame.set_int(4, 1).is_err());
        assert!(frame.get_int(4).is_err());
        // wide access needs both halves in bounds
        assert!(frame.set_long(3, 1).is_err());
    }

    #[test]
    fn wide_values_span_two_slots_low_word_first() {
        let mut frame = frame_with_registers(4);
        frame.set_long(1, 0x1122_3344_5566_7788).unwrap();
        assert_eq!(frame.get_int(1).unwrap() as u32, 0x5566_7788);
        assert_eq!(frame.get_int(2).unwrap() as u32, 0x1122_3344);
        assert_eq!(frame.get_long(1).unwrap(), 0x1122_3344_5566_7788);
    }

    #[test]
    fn float_bits_round_trip() {
        let mut frame = frame_with_registers(4);
        frame.set_float(0, 1.5).unwrap();
        assert_eq!(frame.get_float(0).unwrap(), 1.5);
        frame.set_double(1, -0.25).unwrap();
        assert_eq!(frame.get_double(1).unwrap(), -0.25);
    }

    #[test]
    fn untouched_slot_reads_as_zero_and_null() {
        let frame = frame_with_registers(2);
        assert_eq!(frame.get_int(0).unwrap(), 0);
        assert!(frame.get_obj(1).unwrap().is_null());
    }
}
