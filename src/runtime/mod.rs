//! Built-in `java.*` runtime layer: synthetic classes whose methods are host
//! callbacks registered through the class builder. Only the slice of the
//! class library the interpreter and tests exercise is provided; everything
//! else is expected to arrive in a runtime DEX container.

mod atomic;
mod io;
mod lang;

use std::sync::Arc;

use crate::jvm::error::{npe, Throw, VmError};
use crate::jvm::mem::{value_as_word, ObjectBody, ObjectRef, Value};
use crate::jvm::Vm;

pub fn register(vm: &Arc<Vm>) {
    lang::register(vm);
    io::register(vm);
    atomic::register(vm);
    debug!("registered built-in runtime classes");
}

// Argument-vector helpers shared by the callback implementations. The vector
// is flat: receiver first for instance methods, wide values as two adjacent
// words in little-endian order.

pub(crate) fn arg_obj(args: &[Value], at: usize, what: &str) -> Result<ObjectRef, Throw> {
    match args.get(at) {
        Some(Value::Ref(obj)) => Ok(obj.clone()),
        Some(Value::Uninit) | None => Err(npe(format!("{}: missing object argument", what))),
        Some(Value::Word(_)) => Err(Throw::Fatal(VmError::TypeMismatch(format!(
            "{}: expected an object argument",
            what
        )))),
    }
}

pub(crate) fn arg_int(args: &[Value], at: usize) -> Result<i32, Throw> {
    match args.get(at) {
        Some(value) => crate::jvm::mem::value_as_int(value),
        None => Ok(0),
    }
}

pub(crate) fn arg_long(args: &[Value], at: usize) -> Result<i64, Throw> {
    let low = match args.get(at) {
        Some(value) => value_as_word(value)? as u64,
        None => 0,
    };
    let high = match args.get(at + 1) {
        Some(value) => value_as_word(value)? as u64,
        None => 0,
    };
    Ok((high << 32 | low) as i64)
}

pub(crate) fn arg_float(args: &[Value], at: usize) -> Result<f32, Throw> {
    Ok(f32::from_bits(arg_int(args, at)? as u32))
}

pub(crate) fn arg_double(args: &[Value], at: usize) -> Result<f64, Throw> {
    Ok(f64::from_bits(arg_long(args, at)? as u64))
}

pub(crate) fn arg_str(args: &[Value], at: usize, what: &str) -> Result<String, Throw> {
    let obj = arg_obj(args, at, what)?;
    if obj.is_null() {
        return Err(npe(format!("{}: string argument is null", what)));
    }
    obj.as_str().map(|s| s.to_string()).ok_or_else(|| {
        Throw::Fatal(VmError::TypeMismatch(format!(
            "{}: expected a string argument",
            what
        )))
    })
}

/// Textual rendering used by print and string concatenation.
pub(crate) fn render(obj: &ObjectRef) -> String {
    match obj.body() {
        ObjectBody::Null => "null".to_string(),
        ObjectBody::Str(s) => s.text.clone(),
        ObjectBody::Number(bits) => {
            format!("{}", bits.load(std::sync::atomic::Ordering::SeqCst))
        }
        ObjectBody::Mirror(mirror) => format!("class {}", mirror.target),
        ObjectBody::Array(array) => {
            format!("{}@{:x}", array.type_name(), obj.identity_hash())
        }
        ObjectBody::Instance(instance) => {
            // Throwables render like Throwable.toString()
            if let Ok(Value::Ref(message)) = obj.get_field("message") {
                if let Some(text) = message.as_str() {
                    return format!("{}: {}", instance.class, text);
                }
            }
            format!("{}@{:x}", instance.class, obj.identity_hash())
        }
    }
}
