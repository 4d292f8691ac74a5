//! Class, method and field records plus type-descriptor utilities. Records
//! are immutable metadata once registered; the only mutable parts of a class
//! are its static field storage and the `static_initialized` flag, both of
//! which are owned by the interpreter's initialization protocol.

pub mod builder;
pub mod loader;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use hashbrown::HashMap;
use parking_lot::Mutex;

use crate::jvm::error::Throw;
use crate::jvm::frame::Frame;
use crate::jvm::mem::{FieldTable, Monitor, Value};
use crate::jvm::Vm;

/// Owning container index used by classes registered through the synthetic
/// builder rather than loaded from a DEX container.
pub const SYNTHETIC_DEX: u32 = u32::MAX;

bitflags! {
    pub struct AccessFlags: u32 {
        const PUBLIC = 0x1;
        const PRIVATE = 0x2;
        const PROTECTED = 0x4;
        const STATIC = 0x8;
        const FINAL = 0x10;
        const SYNCHRONIZED = 0x20;
        const VOLATILE = 0x40;
        const TRANSIENT = 0x80;
        const NATIVE = 0x100;
        const INTERFACE = 0x200;
        const ABSTRACT = 0x400;
        const STRICT = 0x800;
        const SYNTHETIC = 0x1000;
        const ANNOTATION = 0x2000;
        const ENUM = 0x4000;
        const CONSTRUCTOR = 0x10000;
        const DECLARED_SYNCHRONIZED = 0x20000;
    }
}

/// Convert a type descriptor to the canonical name used by the registry:
/// `Ljava/lang/String;` becomes `java.lang.String`, primitives get their
/// keyword name and array descriptors keep a `[` prefix per dimension.
pub fn type_name(desc: &str) -> String {
    if let Some(stripped) = desc.strip_prefix('[') {
        return format!("[{}", type_name(stripped));
    }

    match desc.as_bytes().first() {
        Some(b'L') if desc.len() >= 2 => {
            desc[1..desc.len() - usize::from(desc.ends_with(';'))].replace('/', ".")
        }
        Some(b'I') => "int".to_string(),
        Some(b'J') => "long".to_string(),
        Some(b'F') => "float".to_string(),
        Some(b'D') => "double".to_string(),
        Some(b'Z') => "boolean".to_string(),
        Some(b'B') => "byte".to_string(),
        Some(b'C') => "char".to_string(),
        Some(b'S') => "short".to_string(),
        Some(b'V') => "void".to_string(),
        _ => desc.to_string(),
    }
}

/// Split a method signature like `(I[Ljava/lang/String;J)V` into its
/// parameter descriptors and return descriptor.
pub fn parse_signature(sig: &str) -> (Vec<String>, String) {
    let mut params = Vec::new();
    let inner = sig.strip_prefix('(').unwrap_or(sig);
    let close = inner.find(')').unwrap_or(inner.len());
    let (param_str, ret) = inner.split_at(close);

    let bytes = param_str.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        let start = i;
        while i < bytes.len() && bytes[i] == b'[' {
            i += 1;
        }
        if i < bytes.len() && bytes[i] == b'L' {
            while i < bytes.len() && bytes[i] != b';' {
                i += 1;
            }
        }
        i += 1;
        params.push(param_str[start..i.min(param_str.len())].to_string());
    }

    (params, ret.trim_start_matches(')').to_string())
}

/// Register words a value of the given descriptor occupies (long and double
/// take a pair).
pub fn descriptor_words(desc: &str) -> u16 {
    match desc.as_bytes().first() {
        Some(b'J') | Some(b'D') => 2,
        _ => 1,
    }
}

pub fn is_reference_descriptor(desc: &str) -> bool {
    matches!(desc.as_bytes().first(), Some(b'L') | Some(b'['))
}

/// Host callback backing a synthetic method. Receives the current frame and
/// the flattened argument words; the return value travels through the frame's
/// return slot.
pub type HostFn = Arc<dyn Fn(&Arc<Vm>, &mut Frame, &[Value]) -> Result<(), Throw> + Send + Sync>;

/// One entry of a method's try/catch table. All addresses are byte offsets
/// into the instruction stream.
#[derive(Clone, Debug, Default)]
pub struct TryCatch {
    pub start: u32,
    pub length: u32,
    /// `(type pool index, handler pc)` scanned in order.
    pub handlers: Vec<(u32, u32)>,
    pub catch_all: Option<u32>,
}

impl TryCatch {
    pub fn covers(&self, pc: u32) -> bool {
        pc >= self.start && pc < self.start + self.length
    }
}

pub enum MethodBody {
    /// Raw instruction stream, byte addressed.
    Bytecode(Vec<u8>),
    /// Host callback supplied by the synthetic class builder.
    Host(HostFn),
    /// No implementation in the container; dispatched through the native
    /// bridge.
    None,
}

pub struct Method {
    class: String,
    name: String,
    signature: String,
    params: Vec<String>,
    return_type: String,
    registers: u16,
    index: u32,
    dex_idx: u32,
    access: AccessFlags,
    is_virtual: bool,
    body: MethodBody,
    tries: Vec<TryCatch>,
}

impl Method {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        class: &str,
        name: &str,
        signature: &str,
        index: u32,
        dex_idx: u32,
        registers: u16,
        access: AccessFlags,
        is_virtual: bool,
        body: MethodBody,
        tries: Vec<TryCatch>,
    ) -> Self {
        let (params, return_type) = parse_signature(signature);
        Method {
            class: class.to_string(),
            name: name.to_string(),
            signature: signature.to_string(),
            params,
            return_type,
            registers,
            index,
            dex_idx,
            access,
            is_virtual,
            body,
            tries,
        }
    }

    pub fn class_name(&self) -> &str {
        &self.class
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn signature(&self) -> &str {
        &self.signature
    }

    /// Lookup key inside a class: name plus full signature.
    pub fn key(&self) -> String {
        format!("{}{}", self.name, self.signature)
    }

    pub fn params(&self) -> &[String] {
        &self.params
    }

    pub fn return_type(&self) -> &str {
        &self.return_type
    }

    pub fn registers(&self) -> u16 {
        self.registers
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn dex_idx(&self) -> u32 {
        self.dex_idx
    }

    pub fn access(&self) -> AccessFlags {
        self.access
    }

    pub fn is_static(&self) -> bool {
        self.access.contains(AccessFlags::STATIC)
    }

    pub fn is_native(&self) -> bool {
        self.access.contains(AccessFlags::NATIVE)
    }

    pub fn is_abstract(&self) -> bool {
        self.access.contains(AccessFlags::ABSTRACT)
    }

    pub fn is_virtual(&self) -> bool {
        self.is_virtual
    }

    pub fn is_static_initializer(&self) -> bool {
        self.name == "<clinit>"
    }

    pub fn is_constructor(&self) -> bool {
        self.name == "<init>"
    }

    pub fn body(&self) -> &MethodBody {
        &self.body
    }

    pub fn bytecode(&self) -> Option<&[u8]> {
        match &self.body {
            MethodBody::Bytecode(code) => Some(code),
            _ => None,
        }
    }

    pub fn host_fn(&self) -> Option<HostFn> {
        match &self.body {
            MethodBody::Host(f) => Some(f.clone()),
            _ => None,
        }
    }

    pub fn tries(&self) -> &[TryCatch] {
        &self.tries
    }

    /// Number of argument register words, receiver included for instance
    /// methods; wide parameters count twice.
    pub fn arg_words(&self) -> u16 {
        let mut words = if self.is_static() { 0 } else { 1 };
        for param in &self.params {
            words += descriptor_words(param);
        }
        words
    }
}

#[derive(Clone)]
pub struct Field {
    pub class: String,
    pub name: String,
    pub descriptor: String,
    pub access: AccessFlags,
}

impl Field {
    pub fn is_static(&self) -> bool {
        self.access.contains(AccessFlags::STATIC)
    }

    pub fn is_reference(&self) -> bool {
        is_reference_descriptor(&self.descriptor)
    }
}

pub struct Class {
    package: String,
    name: String,
    fullname: String,
    dex_idx: u32,
    access: AccessFlags,
    external: bool,
    superclass: Option<String>,
    interfaces: Vec<String>,
    methods: Vec<Arc<Method>>,
    method_index: HashMap<String, usize>,
    fields: Vec<Field>,
    field_index: HashMap<String, usize>,
    statics: Mutex<FieldTable>,
    initialized: AtomicBool,
    monitor: Monitor,
}

impl Class {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        fullname: &str,
        dex_idx: u32,
        access: AccessFlags,
        external: bool,
        superclass: Option<String>,
        interfaces: Vec<String>,
        methods: Vec<Method>,
        fields: Vec<Field>,
    ) -> Self {
        let (package, name) = match fullname.rfind('.') {
            Some(split) => (fullname[..split].to_string(), fullname[split + 1..].to_string()),
            None => (String::new(), fullname.to_string()),
        };

        let mut method_index = HashMap::new();
        let methods: Vec<Arc<Method>> = methods.into_iter().map(Arc::new).collect();
        for (idx, method) in methods.iter().enumerate() {
            method_index.insert(method.key(), idx);
        }

        let mut field_index = HashMap::new();
        let mut statics = FieldTable::new();
        for (idx, field) in fields.iter().enumerate() {
            field_index.insert(field.name.clone(), idx);
            if field.is_static() {
                statics.insert(&field.name, Value::default_for(&field.descriptor));
            }
        }

        Class {
            package,
            name,
            fullname: fullname.to_string(),
            dex_idx,
            access,
            external,
            superclass,
            interfaces,
            methods,
            method_index,
            fields,
            field_index,
            statics: Mutex::new(statics),
            initialized: AtomicBool::new(false),
            monitor: Monitor::new(),
        }
    }

    pub fn package(&self) -> &str {
        &self.package
    }

    pub fn simple_name(&self) -> &str {
        &self.name
    }

    pub fn fullname(&self) -> &str {
        &self.fullname
    }

    pub fn dex_idx(&self) -> u32 {
        self.dex_idx
    }

    pub fn is_interface(&self) -> bool {
        self.access.contains(AccessFlags::INTERFACE)
    }

    pub fn is_abstract(&self) -> bool {
        self.access.contains(AccessFlags::ABSTRACT)
    }

    /// A container class whose methods all lack bytecode while the class is
    /// neither abstract nor an interface; skipped during lookup so a later
    /// container may provide the real implementation.
    pub fn is_external(&self) -> bool {
        self.external
    }

    pub fn superclass_name(&self) -> Option<&str> {
        self.superclass.as_deref()
    }

    pub fn interfaces(&self) -> &[String] {
        &self.interfaces
    }

    pub fn method(&self, name: &str, signature: &str) -> Option<Arc<Method>> {
        let key = format!("{}{}", name, signature);
        self.method_index.get(&key).map(|idx| self.methods[*idx].clone())
    }

    pub fn methods(&self) -> &[Arc<Method>] {
        &self.methods
    }

    pub fn static_initializer(&self) -> Option<Arc<Method>> {
        self.method("<clinit>", "()V")
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.field_index.get(name).map(|idx| &self.fields[*idx])
    }

    /// Declared fields in declaration order.
    pub fn declared_fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn get_static(&self, name: &str) -> Option<Value> {
        self.statics.lock().get(name)
    }

    pub fn set_static(&self, name: &str, value: Value) {
        self.statics.lock().insert(name, value);
    }

    /// Snapshot of static field values, used as part of the GC root set.
    pub fn static_values(&self) -> Vec<Value> {
        self.statics.lock().values()
    }

    pub fn is_static_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    /// Flip `static_initialized` to true. Returns whether this call was the
    /// one that set it; the flag never goes back to false.
    pub fn mark_static_initialized(&self) -> bool {
        !self.initialized.swap(true, Ordering::AcqRel)
    }

    pub fn monitor(&self) -> &Monitor {
        &self.monitor
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_names() {
        assert_eq!(type_name("Ljava/lang/String;"), "java.lang.String");
        assert_eq!(type_name("I"), "int");
        assert_eq!(type_name("[I"), "[int");
        assert_eq!(type_name("[[Ljava/util/List;"), "[[java.util.List");
        assert_eq!(type_name("V"), "void");
    }

    #[test]
    fn signature_parsing() {
        let (params, ret) = parse_signature("(I[Ljava/lang/String;JD)V");
        assert_eq!(params, vec!["I", "[Ljava/lang/String;", "J", "D"]);
        assert_eq!(ret, "V");

        let (params, ret) = parse_signature("()Ljava/lang/Object;");
        assert!(params.is_empty());
        assert_eq!(ret, "Ljava/lang/Object;");
    }

    #[test]
    fn argument_word_counts() {
        let m = Method::new(
            "Test",
            "f",
            "(IJLjava/lang/String;)V",
            0,
            0,
            8,
            AccessFlags::PUBLIC | AccessFlags::STATIC,
            false,
            MethodBody::None,
            vec![],
        );
        // int + long (2 words) + reference, no receiver
        assert_eq!(m.arg_words(), 4);

        let m = Method::new(
            "Test",
            "g",
            "(D)V",
            0,
            0,
            8,
            AccessFlags::PUBLIC,
            true,
            MethodBody::None,
            vec![],
        );
        // receiver + double
        assert_eq!(m.arg_words(), 3);
    }

    #[test]
    fn initialization_flag_is_monotonic() {
        let class = Class::new(
            "a.B",
            0,
            AccessFlags::PUBLIC,
            false,
            Some("java.lang.Object".into()),
            vec![],
            vec![],
            vec![],
        );
        assert!(!class.is_static_initialized());
        assert!(class.mark_static_initialized());
        assert!(class.is_static_initialized());
        // Second attempt reports it was already set
        assert!(!class.mark_static_initialized());
        assert!(class.is_static_initialized());
    }
}
