//! Instance and static field access. The opcode family is matched against
//! the field's declared type descriptor; a disagreement means broken
//! bytecode and is fatal. Static access on an uninitialized class follows
//! the rewind-and-retry `<clinit>` protocol.

use std::sync::Arc;

use crate::class::is_reference_descriptor;
use crate::instruction::*;
use crate::jvm::error::{no_such_field, npe, Throw, VmError};
use crate::jvm::interp::{require_initialized, FlowControl, OpResult};
use crate::jvm::mem::{value_as_long, value_as_word, Value};
use crate::jvm::thread::JThread;
use crate::jvm::Vm;

#[derive(Copy, Clone, Eq, PartialEq)]
enum Family {
    Word,
    Wide,
    Object,
    Boolean,
    Byte,
    Char,
    Short,
}

impl Family {
    fn of(op: Opcode) -> Family {
        use Opcode::*;
        match op {
            Iget | Iput | Sget | Sput => Family::Word,
            IgetWide | IputWide | SgetWide | SputWide => Family::Wide,
            IgetObject | IputObject | SgetObject | SputObject => Family::Object,
            IgetBoolean | IputBoolean | SgetBoolean | SputBoolean => Family::Boolean,
            IgetByte | IputByte | SgetByte | SputByte => Family::Byte,
            IgetChar | IputChar | SgetChar | SputChar => Family::Char,
            _ => Family::Short,
        }
    }

    fn matches(self, descriptor: &str) -> bool {
        match self {
            Family::Word => matches!(descriptor.as_bytes().first(), Some(b'I') | Some(b'F')),
            Family::Wide => matches!(descriptor.as_bytes().first(), Some(b'J') | Some(b'D')),
            Family::Object => is_reference_descriptor(descriptor),
            Family::Boolean => descriptor.starts_with('Z'),
            Family::Byte => descriptor.starts_with('B'),
            Family::Char => descriptor.starts_with('C'),
            Family::Short => descriptor.starts_with('S'),
        }
    }
}

fn check_family(op: Opcode, descriptor: &str, field: &str) -> Result<Family, Throw> {
    let family = Family::of(op);
    if !family.matches(descriptor) {
        return Err(Throw::Fatal(VmError::TypeMismatch(format!(
            "{} used on field {} of type {}",
            op.mnemonic(),
            field,
            descriptor
        ))));
    }
    Ok(family)
}

pub fn instance_field(
    vm: &Arc<Vm>,
    thread: &mut JThread,
    op: Opcode,
    code: &[u8],
    pc: usize,
) -> OpResult {
    let (value_reg, object_reg, field_idx) = decode_22c(code, pc);
    let frame = thread.current_frame().map_err(Throw::Fatal)?;

    let (_, name, descriptor) = vm.registry.resolve_field(frame.dex_idx(), field_idx as u32)?;
    let family = check_family(op, &descriptor, &name)?;

    let obj = frame.get_obj(object_reg)?;
    if obj.is_null() {
        return Err(npe(format!("{} on a null reference", op.mnemonic())));
    }

    let is_get = matches!(
        op,
        Opcode::Iget
            | Opcode::IgetWide
            | Opcode::IgetObject
            | Opcode::IgetBoolean
            | Opcode::IgetByte
            | Opcode::IgetChar
            | Opcode::IgetShort
    );

    if is_get {
        let value = obj.get_field(&name)?;
        match family {
            Family::Wide => frame.set_long(value_reg, value_as_long(&value)?)?,
            Family::Object => frame.set(value_reg, value)?,
            _ => frame.set(value_reg, Value::Word(value_as_word(&value)?))?,
        }
    } else {
        let value = match family {
            Family::Wide => {
                let wide = frame.get_long(value_reg)?;
                Value::Ref(vm.heap().make_number(wide))
            }
            Family::Object => {
                let value = frame.get(value_reg)?;
                enforce_reference(vm, &value, &descriptor)?;
                value
            }
            _ => Value::Word(frame.get_int(value_reg)? as u32),
        };
        obj.set_field(&name, value)?;
    }
    Ok(FlowControl::Next)
}

/// Reference fields hold exactly their declared type; enforced on write.
fn enforce_reference(vm: &Arc<Vm>, value: &Value, descriptor: &str) -> Result<(), Throw> {
    if let Value::Ref(obj) = value {
        if obj.is_null() {
            return Ok(());
        }
        if let Some(class) = obj.class_name() {
            let declared = crate::class::type_name(descriptor);
            if !vm.registry.is_assignable(&class, &declared) {
                return Err(Throw::Fatal(VmError::TypeMismatch(format!(
                    "cannot store {} into a field of type {}",
                    class, declared
                ))));
            }
        }
    }
    Ok(())
}

pub fn static_field(
    vm: &Arc<Vm>,
    thread: &mut JThread,
    op: Opcode,
    code: &[u8],
    pc: usize,
) -> OpResult {
    let (value_reg, field_idx) = decode_21c(code, pc);
    let dex_idx = thread.current_frame().map_err(Throw::Fatal)?.dex_idx();

    let (class_name, name, descriptor) =
        vm.registry.resolve_field(dex_idx, field_idx as u32)?;
    let family = check_family(op, &descriptor, &name)?;

    let class = vm.registry.get_or_load(&class_name)?;
    if !require_initialized(vm, thread, &class)? {
        return Ok(FlowControl::Hold);
    }

    let frame = thread.current_frame().map_err(Throw::Fatal)?;
    let is_get = matches!(
        op,
        Opcode::Sget
            | Opcode::SgetWide
            | Opcode::SgetObject
            | Opcode::SgetBoolean
            | Opcode::SgetByte
            | Opcode::SgetChar
            | Opcode::SgetShort
    );

    if is_get {
        let value = class
            .get_static(&name)
            .ok_or_else(|| no_such_field(format!("{}.{}", class_name, name)))?;
        match family {
            Family::Wide => frame.set_long(value_reg, value_as_long(&value)?)?,
            Family::Object => frame.set(value_reg, value)?,
            _ => frame.set(value_reg, Value::Word(value_as_word(&value)?))?,
        }
    } else {
        if class.field(&name).map(|f| f.is_static()) != Some(true) {
            return Err(no_such_field(format!("{}.{}", class_name, name)));
        }
        let value = match family {
            Family::Wide => {
                let wide = frame.get_long(value_reg)?;
                Value::Ref(vm.heap().make_number(wide))
            }
            Family::Object => {
                let value = frame.get(value_reg)?;
                enforce_reference(vm, &value, &descriptor)?;
                value
            }
            _ => Value::Word(frame.get_int(value_reg)? as u32),
        };
        class.set_static(&name, value);
    }
    Ok(FlowControl::Next)
}
