//! The two error tiers: `VmError` is fatal to the executing thread and never
//! visible to program code; `Throw` is the interpreter-internal carrier for
//! in-flight exceptions, which either unwind to a catch handler or surface as
//! a `VmError::UncaughtException`.

use std::error::Error;
use std::fmt;
use std::io;

use crate::jvm::mem::ObjectRef;

#[derive(Debug)]
pub enum VmError {
    ClassNotFound(String),
    MethodNotFound(String),
    FieldNotFound(String),
    BadPoolIndex {
        dex: u32,
        pool: &'static str,
        index: u32,
    },
    UnknownOpcode {
        opcode: u8,
        pc: u32,
    },
    InvalidBytecode(String),
    RegisterOutOfBounds {
        register: u16,
        count: u16,
    },
    TypeMismatch(String),
    UncaughtException {
        class: String,
        message: String,
    },
    NativeLoad(String),
    NativeSymbolMissing(String),
    Malformed(String),
    Io(io::Error),
}

impl fmt::Display for VmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VmError::ClassNotFound(name) => write!(f, "class {} could not be resolved", name),
            VmError::MethodNotFound(name) => write!(f, "method {} could not be resolved", name),
            VmError::FieldNotFound(name) => write!(f, "field {} could not be resolved", name),
            VmError::BadPoolIndex { dex, pool, index } => {
                write!(f, "{} pool index {} out of range in container {}", pool, index, dex)
            }
            VmError::UnknownOpcode { opcode, pc } => {
                write!(f, "unassigned opcode 0x{:02x} at pc {:#x}", opcode, pc)
            }
            VmError::InvalidBytecode(msg) => write!(f, "malformed bytecode: {}", msg),
            VmError::RegisterOutOfBounds { register, count } => {
                write!(f, "register v{} out of bounds (frame has {})", register, count)
            }
            VmError::TypeMismatch(msg) => write!(f, "type mismatch: {}", msg),
            VmError::UncaughtException { class, message } => {
                write!(f, "uncaught exception {}: {}", class, message)
            }
            VmError::NativeLoad(msg) => write!(f, "failed to load native library: {}", msg),
            VmError::NativeSymbolMissing(symbol) => {
                write!(f, "native symbol {} is not available", symbol)
            }
            VmError::Malformed(msg) => write!(f, "{}", msg),
            VmError::Io(err) => write!(f, "{}", err),
        }
    }
}

impl Error for VmError {}

impl From<io::Error> for VmError {
    fn from(err: io::Error) -> Self {
        VmError::Io(err)
    }
}

/// In-flight exception state. `Raise` carries the class/message of a runtime
/// condition that has not been materialised as a heap object yet; `Object` is
/// an already-built throwable (from the `throw` opcode or a native callback).
#[derive(Debug)]
pub enum Throw {
    Fatal(VmError),
    Raise { class: &'static str, message: String },
    Object(ObjectRef),
}

impl From<VmError> for Throw {
    fn from(err: VmError) -> Self {
        Throw::Fatal(err)
    }
}

pub fn npe<S: Into<String>>(message: S) -> Throw {
    Throw::Raise {
        class: "java.lang.NullPointerException",
        message: message.into(),
    }
}

pub fn arithmetic<S: Into<String>>(message: S) -> Throw {
    Throw::Raise {
        class: "java.lang.ArithmeticException",
        message: message.into(),
    }
}

pub fn array_bounds(index: i32, length: u32) -> Throw {
    Throw::Raise {
        class: "java.lang.ArrayIndexOutOfBoundsException",
        message: format!("index {} out of bounds for length {}", index, length),
    }
}

pub fn negative_array_size(size: i32) -> Throw {
    Throw::Raise {
        class: "java.lang.NegativeArraySizeException",
        message: format!("{}", size),
    }
}

pub fn class_cast<S: Into<String>>(message: S) -> Throw {
    Throw::Raise {
        class: "java.lang.ClassCastException",
        message: message.into(),
    }
}

pub fn illegal_argument<S: Into<String>>(message: S) -> Throw {
    Throw::Raise {
        class: "java.lang.IllegalArgumentException",
        message: message.into(),
    }
}

pub fn number_format<S: Into<String>>(message: S) -> Throw {
    Throw::Raise {
        class: "java.lang.NumberFormatException",
        message: message.into(),
    }
}

pub fn no_class_def<S: Into<String>>(message: S) -> Throw {
    Throw::Raise {
        class: "java.lang.NoClassDefFoundError",
        message: message.into(),
    }
}

pub fn no_such_method<S: Into<String>>(message: S) -> Throw {
    Throw::Raise {
        class: "java.lang.NoSuchMethodError",
        message: message.into(),
    }
}

pub fn no_such_field<S: Into<String>>(message: S) -> Throw {
    Throw::Raise {
        class: "java.lang.NoSuchFieldException",
        message: message.into(),
    }
}
