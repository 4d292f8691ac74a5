//! Native method bridge: JNI symbol naming, shared-library management and
//! libffi call preparation from Dalvik type descriptors.

pub mod handles;
pub mod interface;

use std::env;
use std::ffi::c_void;
use std::fmt::{self, Display, Formatter, Write as _};
use std::path::PathBuf;
use std::sync::Arc;

use hashbrown::HashMap;
use jni::sys::{jint, JNINativeInterface_, JavaVM};
use libffi::middle::{Arg, Cif, CodePtr, Type};
use libloading::Library;
use parking_lot::RwLock;

use crate::class::Method;
use crate::jvm::error::{Throw, VmError};
use crate::jvm::frame::Frame;
use crate::jvm::mem::{value_as_word, Value};
use crate::jvm::Vm;

pub use handles::HandleTable;
pub use interface::build_interface;

/// Signature-section mangling: `/` becomes `_`, `_` becomes `_1`, `;`
/// becomes `_2`, `[` becomes `_3`, everything else passes through.
pub struct MangledSig<'a>(pub &'a str);

impl Display for MangledSig<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for c in self.0.chars() {
            match c {
                '/' => f.write_char('_')?,
                '_' => f.write_str("_1")?,
                ';' => f.write_str("_2")?,
                '[' => f.write_str("_3")?,
                c => f.write_char(c)?,
            }
        }
        Ok(())
    }
}

/// Base symbol for a native method: `Java_` + class fqname with dots
/// replaced + `_` + method name.
pub fn jni_symbol(class: &str, name: &str) -> String {
    format!("Java_{}_{}", class.replace('.', "_"), name)
}

/// Overload-disambiguated symbol: base + `__` + mangled parameter section
/// (the return type and parentheses are dropped).
pub fn jni_symbol_overloaded(class: &str, name: &str, signature: &str) -> String {
    let params = signature
        .strip_prefix('(')
        .and_then(|rest| rest.split(')').next())
        .unwrap_or("");
    format!("{}__{}", jni_symbol(class, name), MangledSig(params))
}

type JniOnLoadFn = unsafe extern "system" fn(*mut JavaVM, *mut c_void) -> jint;

struct LoadedLibrary {
    library: Library,
    path: PathBuf,
}

/// Loaded shared objects plus a cache of resolved method symbols. Function
/// pointers are stored as plain addresses so the manager stays shareable
/// across threads.
#[derive(Default)]
pub struct NativeManager {
    libraries: RwLock<Vec<LoadedLibrary>>,
    symbols: RwLock<HashMap<String, usize>>,
}

impl NativeManager {
    pub fn new() -> NativeManager {
        NativeManager::default()
    }

    /// Load a shared library and invoke its `JNI_OnLoad`, if exported.
    pub fn load_library(&self, path: PathBuf) -> Result<(), VmError> {
        {
            let libraries = self.libraries.read();
            if libraries.iter().any(|lib| lib.path == path) {
                debug!("library {} is already loaded", path.display());
                return Ok(());
            }
        }

        info!("loading shared library {}", path.display());
        let library = unsafe { Library::new(&path) }
            .map_err(|e| VmError::NativeLoad(format!("{}: {}", path.display(), e)))?;

        let on_load = unsafe { library.get::<JniOnLoadFn>(b"JNI_OnLoad") };
        match on_load {
            Ok(symbol) => {
                debug!("running JNI_OnLoad of {}", path.display());
                unsafe { symbol(std::ptr::null_mut(), std::ptr::null_mut()) };
            }
            Err(_) => debug!("no JNI_OnLoad in {}", path.display()),
        }

        self.libraries.write().push(LoadedLibrary { library, path });
        Ok(())
    }

    /// `System.loadLibrary` entry: map `name` to the platform file name and
    /// search `LD_LIBRARY_PATH` then the working directory.
    pub fn load_library_by_name(&self, name: &str) -> Result<(), VmError> {
        let file_name = format!("lib{}.so", name);

        let mut candidates = Vec::new();
        if let Ok(ld_path) = env::var("LD_LIBRARY_PATH") {
            for dir in env::split_paths(&ld_path) {
                candidates.push(dir.join(&file_name));
            }
        }
        candidates.push(PathBuf::from(&file_name));

        for candidate in candidates {
            if candidate.is_file() {
                return self.load_library(candidate);
            }
        }
        Err(VmError::NativeLoad(format!(
            "{} not found on LD_LIBRARY_PATH",
            file_name
        )))
    }

    fn find_symbol(&self, symbol: &str) -> Option<usize> {
        let libraries = self.libraries.read();
        for LoadedLibrary { library, path } in libraries.iter() {
            let found = unsafe { library.get::<unsafe extern "system" fn()>(symbol.as_bytes()) };
            if let Ok(sym) = found {
                debug!("found native symbol {} in {}", symbol, path.display());
                return Some(sym.into_raw().into_raw() as usize);
            }
        }
        None
    }

    /// Resolve the implementation of a native method, consulting the short
    /// symbol first and the overload-suffixed one second.
    pub fn resolve(&self, class: &str, name: &str, signature: &str) -> Option<usize> {
        let key = format!("{}.{}{}", class, name, signature);
        if let Some(addr) = self.symbols.read().get(&key) {
            return Some(*addr);
        }

        let addr = self
            .find_symbol(&jni_symbol(class, name))
            .or_else(|| self.find_symbol(&jni_symbol_overloaded(class, name, signature)))?;

        self.symbols.write().insert(key, addr);
        Some(addr)
    }
}

fn ffi_type_for(descriptor: &str) -> Result<Type, VmError> {
    match descriptor.as_bytes().first() {
        Some(b'I') | Some(b'Z') | Some(b'B') | Some(b'S') | Some(b'C') => Ok(Type::i32()),
        Some(b'J') => Ok(Type::i64()),
        Some(b'F') => Ok(Type::f32()),
        Some(b'D') => Ok(Type::f64()),
        Some(b'L') | Some(b'[') => Ok(Type::pointer()),
        _ => Err(VmError::TypeMismatch(format!(
            "unsupported native parameter type {}",
            descriptor
        ))),
    }
}

enum Marshal {
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    Ptr(usize),
}

/// A prepared libffi call for one native method: environment pointer,
/// receiver (or class token), then one slot per declared parameter with wide
/// arguments recombined from their register pairs.
pub struct NativeCall {
    cif: Cif,
    fn_ptr: CodePtr,
}

impl NativeCall {
    pub fn new(addr: usize, method: &Method) -> Result<NativeCall, VmError> {
        let mut types = Vec::with_capacity(method.params().len() + 2);
        types.push(Type::pointer()); // JNIEnv*
        types.push(Type::pointer()); // receiver or class token
        for param in method.params() {
            types.push(ffi_type_for(param)?);
        }

        let return_type = match method.return_type().as_bytes().first() {
            Some(b'V') => Type::void(),
            _ => ffi_type_for(method.return_type())?,
        };

        Ok(NativeCall {
            cif: Cif::new(types, return_type),
            fn_ptr: CodePtr::from_ptr(addr as *const c_void),
        })
    }

    /// Invoke the native implementation. `args` are the caller's raw
    /// argument register words, receiver first for instance methods. The
    /// return value is written through `frame`'s return slot.
    pub fn exec(
        &self,
        vm: &Arc<Vm>,
        frame: &mut Frame,
        method: &Method,
        args: &[Value],
    ) -> Result<(), Throw> {
        let mut local_tokens = Vec::new();
        let mut words = args.iter();

        // Receiver slot: the object for instance methods, a mirror of the
        // declaring class for statics
        let receiver = if method.is_static() {
            vm.class_mirror(method.class_name())
        } else {
            match words.next() {
                Some(Value::Ref(obj)) if !obj.is_null() => obj.clone(),
                _ => {
                    return Err(crate::jvm::error::npe(format!(
                        "native call to {} on null receiver",
                        method.name()
                    )))
                }
            }
        };

        let receiver_token = vm.handles.to_token(&receiver);
        local_tokens.push(receiver_token);

        let mut marshalled = Vec::with_capacity(method.params().len());
        for param in method.params() {
            let value = match param.as_bytes().first() {
                Some(b'J') => {
                    let low = take_word(&mut words, method)?;
                    let high = take_word(&mut words, method)?;
                    Marshal::I64(((high as u64) << 32 | low as u64) as i64)
                }
                Some(b'D') => {
                    let low = take_word(&mut words, method)?;
                    let high = take_word(&mut words, method)?;
                    Marshal::F64(f64::from_bits((high as u64) << 32 | low as u64))
                }
                Some(b'F') => Marshal::F32(f32::from_bits(take_word(&mut words, method)?)),
                Some(b'L') | Some(b'[') => match words.next() {
                    Some(Value::Ref(obj)) if !obj.is_null() => {
                        let token = vm.handles.to_token(obj);
                        local_tokens.push(token);
                        Marshal::Ptr(token)
                    }
                    Some(_) | None => Marshal::Ptr(0),
                },
                _ => Marshal::I32(take_word(&mut words, method)? as i32),
            };
            marshalled.push(value);
        }

        let interface = build_interface(vm);
        let interface_ptr = &interface as *const JNINativeInterface_;
        let env_ptr = &interface_ptr as *const *const JNINativeInterface_ as usize;

        let env_arg = Marshal::Ptr(env_ptr);
        let receiver_arg = Marshal::Ptr(receiver_token);

        let mut ffi_args = Vec::with_capacity(marshalled.len() + 2);
        for slot in std::iter::once(&env_arg)
            .chain(std::iter::once(&receiver_arg))
            .chain(marshalled.iter())
        {
            ffi_args.push(match slot {
                Marshal::I32(v) => Arg::new(v),
                Marshal::I64(v) => Arg::new(v),
                Marshal::F32(v) => Arg::new(v),
                Marshal::F64(v) => Arg::new(v),
                Marshal::Ptr(v) => Arg::new(v),
            });
        }

        debug!(
            "calling native {}.{}{}",
            method.class_name(),
            method.name(),
            method.signature()
        );

        unsafe {
            match method.return_type().as_bytes().first() {
                Some(b'V') => {
                    self.cif.call::<c_void>(self.fn_ptr, &ffi_args);
                }
                Some(b'J') => {
                    let ret: i64 = self.cif.call(self.fn_ptr, &ffi_args);
                    let boxed = vm.heap().make_number(ret);
                    frame.set_return_obj(boxed);
                }
                Some(b'D') => {
                    let ret: f64 = self.cif.call(self.fn_ptr, &ffi_args);
                    let boxed = vm.heap().make_number(ret.to_bits() as i64);
                    frame.set_return_obj(boxed);
                }
                Some(b'F') => {
                    let ret: f32 = self.cif.call(self.fn_ptr, &ffi_args);
                    frame.set_return(Value::Word(ret.to_bits()));
                }
                Some(b'L') | Some(b'[') => {
                    let token: usize = self.cif.call(self.fn_ptr, &ffi_args);
                    match vm.handles.resolve(token) {
                        Some(obj) => frame.set_return_obj(obj),
                        None => frame.set_return_obj(vm.heap().null()),
                    }
                }
                _ => {
                    let ret: i32 = self.cif.call(self.fn_ptr, &ffi_args);
                    frame.set_return_int(ret);
                }
            }
        }

        vm.handles.release_locals(&local_tokens);

        // Exceptions raised through the environment surface after the call
        if let Some(thrown) = vm.take_sticky_exception() {
            return Err(Throw::Object(thrown));
        }
        Ok(())
    }
}

fn take_word<'a, I: Iterator<Item = &'a Value>>(words: &mut I, method: &Method) -> Result<u32, Throw> {
    let value = words.next().ok_or_else(|| {
        Throw::Fatal(VmError::TypeMismatch(format!(
            "argument words exhausted calling {}",
            method.name()
        )))
    })?;
    value_as_word(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbol_names() {
        assert_eq!(jni_symbol("Native", "test"), "Java_Native_test");
        assert_eq!(
            jni_symbol("com.example.Main", "run"),
            "Java_com_example_Main_run"
        );
    }

    #[test]
    fn overloaded_symbol_mangles_parameter_section_only() {
        // (Ljava/lang/String;II)I: slashes fold, the semicolon becomes _2,
        // return type and parens disappear
        assert_eq!(
            jni_symbol_overloaded("Native", "test", "(Ljava/lang/String;II)I"),
            "Java_Native_test__Ljava_lang_String_2II"
        );
        assert_eq!(
            jni_symbol_overloaded("A", "f", "([IJ)V"),
            "Java_A_f___3IJ"
        );
        // literal underscores in names escape to _1
        assert_eq!(format!("{}", MangledSig("La_b;")), "La_1b_2");
    }

    #[test]
    fn missing_library_is_an_error() {
        let natives = NativeManager::new();
        assert!(natives
            .load_library_by_name("definitely-not-present")
            .is_err());
        assert!(natives.resolve("X", "y", "()V").is_none());
    }
}
