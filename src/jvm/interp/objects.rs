//! Object-shaped opcodes: allocation, type checks, monitors, class literals
//! and `throw`.

use std::sync::Arc;

use crate::instruction::*;
use crate::jvm::error::{class_cast, npe, Throw, VmError};
use crate::jvm::interp::{require_initialized, FlowControl, OpResult};
use crate::jvm::thread::JThread;
use crate::jvm::Vm;

pub fn const_class(vm: &Arc<Vm>, thread: &mut JThread, code: &[u8], pc: usize) -> OpResult {
    let (dst, type_idx) = decode_21c(code, pc);
    let dex_idx = thread.current_frame().map_err(Throw::Fatal)?.dex_idx();

    let class = vm.registry.resolve_class(dex_idx, type_idx as u32)?;
    if !require_initialized(vm, thread, &class)? {
        return Ok(FlowControl::Hold);
    }

    let mirror = vm.class_mirror(class.fullname());
    thread
        .current_frame()
        .map_err(Throw::Fatal)?
        .set_obj(dst, mirror)?;
    Ok(FlowControl::Next)
}

pub fn monitor_op(thread: &mut JThread, op: Opcode, code: &[u8], pc: usize) -> OpResult {
    let reg = decode_11x(code, pc);
    let frame = thread.current_frame().map_err(Throw::Fatal)?;
    let obj = frame.get_obj(reg)?;
    if obj.is_null() {
        return Err(npe(format!("{} on a null reference", op.mnemonic())));
    }

    match op {
        Opcode::MonitorEnter => obj.monitor().enter(),
        _ => obj.monitor().exit().map_err(Throw::Fatal)?,
    }
    Ok(FlowControl::Next)
}

pub fn check_cast(vm: &Arc<Vm>, thread: &mut JThread, code: &[u8], pc: usize) -> OpResult {
    let (reg, type_idx) = decode_21c(code, pc);
    let frame = thread.current_frame().map_err(Throw::Fatal)?;
    let obj = frame.get_obj(reg)?;
    // null casts to anything
    if obj.is_null() {
        return Ok(FlowControl::Next);
    }

    let target = vm.registry.resolve_class_name(frame.dex_idx(), type_idx as u32)?;
    let castable = match obj.class_name() {
        Some(class) => vm.registry.is_assignable(&class, &target),
        // boxed numbers have no class record of their own
        None => target == "java.lang.Object",
    };
    if !castable {
        return Err(class_cast(format!(
            "{} cannot be cast to {}",
            obj.class_name().unwrap_or_default(),
            target
        )));
    }
    Ok(FlowControl::Next)
}

pub fn instance_of(vm: &Arc<Vm>, thread: &mut JThread, code: &[u8], pc: usize) -> OpResult {
    let (dst, src, type_idx) = decode_22c(code, pc);
    let frame = thread.current_frame().map_err(Throw::Fatal)?;
    let obj = frame.get_obj(src)?;
    let target = vm.registry.resolve_class_name(frame.dex_idx(), type_idx as u32)?;

    let result = !obj.is_null()
        && obj
            .class_name()
            .map(|class| vm.registry.is_assignable(&class, &target))
            .unwrap_or(false);
    frame.set_int(dst, result as i32)?;
    Ok(FlowControl::Next)
}

pub fn new_instance(vm: &Arc<Vm>, thread: &mut JThread, code: &[u8], pc: usize) -> OpResult {
    let (dst, type_idx) = decode_21c(code, pc);
    let dex_idx = thread.current_frame().map_err(Throw::Fatal)?.dex_idx();
    let class = vm.registry.resolve_class(dex_idx, type_idx as u32)?;

    if class.is_abstract() || class.is_interface() {
        return Err(Throw::Fatal(VmError::Malformed(format!(
            "cannot instantiate abstract class or interface {}",
            class.fullname()
        ))));
    }

    // The initializer runs first; this instruction re-executes afterwards
    if !require_initialized(vm, thread, &class)? {
        return Ok(FlowControl::Hold);
    }

    debug!("new {}", class.fullname());
    let instance = vm.make_instance(&class).map_err(Throw::Fatal)?;
    thread
        .current_frame()
        .map_err(Throw::Fatal)?
        .set_obj(dst, instance)?;
    Ok(FlowControl::Next)
}

pub fn throw_op(thread: &mut JThread, code: &[u8], pc: usize) -> OpResult {
    let reg = decode_11x(code, pc);
    let frame = thread.current_frame().map_err(Throw::Fatal)?;
    let obj = frame.get_obj(reg)?;
    if obj.is_null() {
        return Err(npe("throw on a null reference"));
    }
    Err(Throw::Object(obj))
}
