//! Method invocation and returns. Virtual and interface calls start at the
//! receiver's concrete class and walk the superclass chain; direct and
//! static calls resolve against the reference's declaring class. A call into
//! an uninitialized class pushes its `<clinit>` frame and re-executes the
//! invoke afterwards.

use std::sync::Arc;

use crate::class::{Method, MethodBody};
use crate::instruction::*;
use crate::jvm::call::{jni_symbol, NativeCall};
use crate::jvm::error::{no_such_method, npe, Throw, VmError};
use crate::jvm::interp::{require_initialized, FlowControl, OpResult};
use crate::jvm::mem::{ObjectRef, Value};
use crate::jvm::thread::JThread;
use crate::jvm::Vm;

#[derive(Copy, Clone, Eq, PartialEq)]
enum Kind {
    Virtual,
    Super,
    Direct,
    Static,
    Interface,
}

pub fn invoke_op(vm: &Arc<Vm>, thread: &mut JThread, op: Opcode, code: &[u8], pc: usize) -> OpResult {
    use Opcode::*;

    let kind = match op {
        InvokeVirtual | InvokeVirtualRange => Kind::Virtual,
        InvokeSuper | InvokeSuperRange => Kind::Super,
        InvokeDirect | InvokeDirectRange => Kind::Direct,
        InvokeStatic | InvokeStaticRange => Kind::Static,
        _ => Kind::Interface,
    };
    let (regs, method_idx) = match op.format() {
        Format::F35c => decode_35c(code, pc),
        _ => decode_3rc(code, pc),
    };

    let (dex_idx, calling_class) = {
        let frame = thread.current_frame().map_err(crate::jvm::error::Throw::Fatal)?;
        (frame.dex_idx(), frame.method().class_name().to_string())
    };
    let (ref_class, name, signature) = vm.registry.resolve_method(dex_idx, method_idx as u32)?;

    let args = {
        let frame = thread.current_frame().map_err(crate::jvm::error::Throw::Fatal)?;
        let mut args = Vec::with_capacity(regs.len());
        for reg in &regs {
            args.push(frame.get(*reg)?);
        }
        args
    };

    let target = match kind {
        Kind::Static => {
            let class = vm.registry.get_or_load(&ref_class)?;
            if !require_initialized(vm, thread, &class)? {
                return Ok(FlowControl::Hold);
            }
            find_in_chain(vm, &ref_class, &name, &signature)?
        }
        Kind::Direct => {
            receiver_of(&args, &name)?;
            let class = vm.registry.get_or_load(&ref_class)?;
            if !require_initialized(vm, thread, &class)? {
                return Ok(FlowControl::Hold);
            }
            find_in_chain(vm, &ref_class, &name, &signature)?
        }
        Kind::Virtual | Kind::Interface => {
            let receiver = receiver_of(&args, &name)?;
            let start = receiver.class_name().ok_or_else(|| {
                crate::jvm::error::Throw::Fatal(VmError::TypeMismatch(format!(
                    "virtual call to {} on a value with no class",
                    name
                )))
            })?;

            // Walk from the receiver's concrete class, initializing each
            // class before its methods are considered
            let mut cursor = vm.registry.get_or_load(&start)?;
            loop {
                if !cursor.is_static_initialized()
                    && !require_initialized(vm, thread, &cursor)?
                {
                    return Ok(FlowControl::Hold);
                }
                if let Some(found) = cursor.method(&name, &signature) {
                    break found;
                }
                match cursor.superclass_name() {
                    Some(parent) => cursor = vm.registry.get_or_load(parent)?,
                    None => {
                        return Err(no_such_method(format!(
                            "{}.{}{}",
                            start, name, signature
                        )))
                    }
                }
            }
        }
        Kind::Super => {
            receiver_of(&args, &name)?;
            let class = vm.registry.get_or_load(&calling_class)?;
            let parent = class
                .superclass_name()
                .ok_or_else(|| no_such_method(format!("{} has no superclass", calling_class)))?
                .to_string();
            let parent = vm.registry.get_or_load(&parent)?;
            if !require_initialized(vm, thread, &parent)? {
                return Ok(FlowControl::Hold);
            }
            find_in_chain(vm, parent.fullname(), &name, &signature)?
        }
    };

    if target.is_abstract() {
        return Err(crate::jvm::error::Throw::Fatal(VmError::MethodNotFound(format!(
            "abstract method {}.{}{}",
            target.class_name(),
            name,
            signature
        ))));
    }

    dispatch(vm, thread, target, args, pc, op.length() as usize)
}

fn receiver_of<'a>(args: &'a [Value], name: &str) -> Result<&'a ObjectRef, Throw> {
    match args.first() {
        Some(Value::Ref(obj)) if !obj.is_null() => Ok(obj),
        Some(Value::Ref(_)) | Some(Value::Uninit) | None => {
            Err(npe(format!("invoke of {} on a null reference", name)))
        }
        Some(Value::Word(_)) => Err(crate::jvm::error::Throw::Fatal(VmError::TypeMismatch(format!(
            "invoke of {} with an int word receiver",
            name
        )))),
    }
}

/// Find `name(signature)` on `class` or the nearest superclass providing it.
fn find_in_chain(
    vm: &Arc<Vm>,
    class: &str,
    name: &str,
    signature: &str,
) -> Result<Arc<Method>, Throw> {
    let mut cursor = vm.registry.get_or_load(class)?;
    loop {
        if let Some(found) = cursor.method(name, signature) {
            return Ok(found);
        }
        match cursor.superclass_name() {
            Some(parent) => cursor = vm.registry.get_or_load(parent)?,
            None => {
                return Err(no_such_method(format!("{}.{}{}", class, name, signature)))
            }
        }
    }
}

/// Transfer control into the resolved method: push a frame for bytecode,
/// call straight through for host callbacks, or go out through the native
/// bridge.
fn dispatch(
    vm: &Arc<Vm>,
    thread: &mut JThread,
    method: Arc<Method>,
    args: Vec<Value>,
    pc: usize,
    length: usize,
) -> OpResult {
    match method.body() {
        MethodBody::Bytecode(_) => {
            let arg_base = (method.registers() as usize)
                .checked_sub(args.len())
                .ok_or_else(|| {
                    crate::jvm::error::Throw::Fatal(VmError::InvalidBytecode(format!(
                        "{} arguments do not fit the {} registers of {}.{}",
                        args.len(),
                        method.registers(),
                        method.class_name(),
                        method.name()
                    )))
                })? as u16;

            // The caller resumes past the invoke once the callee returns
            thread.current_frame().map_err(crate::jvm::error::Throw::Fatal)?.pc = (pc + length) as u32;

            let frame = thread.push_frame(method.clone()).map_err(crate::jvm::error::Throw::Fatal)?;
            // Arguments land in the last N registers of the callee
            for (slot, value) in args.into_iter().enumerate() {
                frame.set(arg_base + slot as u16, value)?;
            }
            Ok(FlowControl::Hold)
        }
        MethodBody::Host(callback) => {
            let callback = callback.clone();
            let frame = thread.current_frame().map_err(crate::jvm::error::Throw::Fatal)?;
            callback(vm, frame, &args)?;
            Ok(FlowControl::Next)
        }
        MethodBody::None => {
            let addr = vm
                .natives
                .resolve(method.class_name(), method.name(), method.signature())
                .ok_or_else(|| {
                    crate::jvm::error::Throw::Fatal(VmError::NativeSymbolMissing(jni_symbol(
                        method.class_name(),
                        method.name(),
                    )))
                })?;

            let call = NativeCall::new(addr, &method).map_err(crate::jvm::error::Throw::Fatal)?;
            let frame = thread.current_frame().map_err(crate::jvm::error::Throw::Fatal)?;
            call.exec(vm, frame, &method, &args)?;
            Ok(FlowControl::Next)
        }
    }
}

/// `return-void`, `return`, `return-wide` and `return-object`: pop the
/// current frame and deposit the returned value in the caller's return slot.
pub fn return_op(vm: &Arc<Vm>, thread: &mut JThread, op: Opcode, code: &[u8], pc: usize) -> OpResult {
    let value = {
        let frame = thread.current_frame().map_err(crate::jvm::error::Throw::Fatal)?;
        match op {
            Opcode::ReturnVoid => None,
            Opcode::ReturnWide => {
                let reg = decode_11x(code, pc);
                let wide = frame.get_long(reg)?;
                Some(Value::Ref(vm.heap().make_number(wide)))
            }
            _ => {
                let reg = decode_11x(code, pc);
                Some(frame.get(reg)?)
            }
        }
    };

    thread.pop_frame();
    if let Ok(caller) = thread.current_frame() {
        if let Some(value) = value {
            caller.set_return(value);
        }
    }
    Ok(FlowControl::Hold)
}
