//! Class registry: owns the parsed DEX containers, maps canonical class
//! names to class records, materializes classes lazily and resolves opaque
//! `(container, pool index)` pairs to classes, methods, fields, strings and
//! array descriptors.
//!
//! Reads are lock-free for callers holding an `Arc<Class>`; loading is
//! serialized by an internal lock so each class is materialized exactly once.

use std::path::PathBuf;
use std::sync::Arc;

use hashbrown::HashMap;
use parking_lot::{Mutex, RwLock};

use crate::class::{type_name, AccessFlags, Class, Field, Method, MethodBody, TryCatch};
use crate::dex::{ClassDef, DexFile, EncodedMethod};
use crate::jvm::error::VmError;

pub struct ClassRegistry {
    containers: RwLock<Vec<Arc<DexFile>>>,
    classes: RwLock<HashMap<String, Arc<Class>>>,
    classpath: RwLock<Vec<PathBuf>>,
    load_lock: Mutex<()>,
}

impl Default for ClassRegistry {
    fn default() -> Self {
        ClassRegistry::new()
    }
}

impl ClassRegistry {
    pub fn new() -> ClassRegistry {
        ClassRegistry {
            containers: RwLock::new(Vec::new()),
            classes: RwLock::new(HashMap::new()),
            classpath: RwLock::new(Vec::new()),
            load_lock: Mutex::new(()),
        }
    }

    /// Register a parsed container; returns its index for pool resolution.
    pub fn add_container(&self, dex: DexFile) -> u32 {
        let mut containers = self.containers.write();
        containers.push(Arc::new(dex));
        (containers.len() - 1) as u32
    }

    pub fn container(&self, dex_idx: u32) -> Result<Arc<DexFile>, VmError> {
        self.containers
            .read()
            .get(dex_idx as usize)
            .cloned()
            .ok_or(VmError::BadPoolIndex {
                dex: dex_idx,
                pool: "container",
                index: dex_idx,
            })
    }

    pub fn container_count(&self) -> usize {
        self.containers.read().len()
    }

    /// Add a directory to the search path consulted when a class is not in
    /// any registered container.
    pub fn add_classpath<P: Into<PathBuf>>(&self, dir: P) {
        self.classpath.write().push(dir.into());
    }

    /// Register a finished class record (synthetic builder, primitives).
    pub fn add_class(&self, class: Class) -> Arc<Class> {
        let class = Arc::new(class);
        self.classes
            .write()
            .insert(class.fullname().to_string(), class.clone());
        class
    }

    pub fn get(&self, name: &str) -> Option<Arc<Class>> {
        self.classes.read().get(name).cloned()
    }

    /// Every registered class; the GC scans their static fields as roots.
    pub fn all_classes(&self) -> Vec<Arc<Class>> {
        self.classes.read().values().cloned().collect()
    }

    /// Look a class up, loading it on first touch. Containers are scanned in
    /// insertion order; an *external* candidate (no bytecode anywhere, not
    /// abstract, not an interface) is remembered but skipped so a later
    /// container can provide the real implementation. Falls back to scanning
    /// the classpath for `<name-slash-form>.dex`.
    pub fn get_or_load(&self, name: &str) -> Result<Arc<Class>, VmError> {
        if let Some(class) = self.get(name) {
            return Ok(class);
        }

        let _guard = self.load_lock.lock();
        if let Some(class) = self.get(name) {
            return Ok(class);
        }

        if name.starts_with('[') || is_primitive_name(name) {
            return Ok(self.add_class(synthetic_type_class(name)));
        }

        let mut external_fallback = None;

        let containers = self.containers.read().clone();
        for (idx, dex) in containers.iter().enumerate() {
            if let Some(def) = dex.class_def(name) {
                let class = materialize(dex, idx as u32, def)?;
                if class.is_external() {
                    debug!("class {} in container {} is external, skipped", name, idx);
                    external_fallback = Some(class);
                    continue;
                }
                info!("loaded class {} from container {}", name, dex.name);
                return Ok(self.add_class(class));
            }
        }

        let classpath = self.classpath.read().clone();
        for dir in classpath {
            let path = dir.join(format!("{}.dex", name.replace('.', "/")));
            if !path.is_file() {
                continue;
            }

            let data = crate::read_file(&path.to_string_lossy())?;
            let dex = DexFile::parse(&path.to_string_lossy(), &data)?;
            let idx = self.add_container(dex);
            let dex = self.container(idx)?;

            if let Some(def) = dex.class_def(name) {
                let class = materialize(&dex, idx, def)?;
                if class.is_external() {
                    external_fallback = Some(class);
                    continue;
                }
                info!("loaded class {} from {}", name, path.display());
                return Ok(self.add_class(class));
            }
        }

        match external_fallback {
            Some(class) => Ok(self.add_class(class)),
            None => Err(VmError::ClassNotFound(name.to_string())),
        }
    }

    pub fn resolve_class_name(&self, dex_idx: u32, idx: u32) -> Result<String, VmError> {
        self.container(dex_idx)?
            .type_name_at(idx)
            .map_err(|e| in_container(e, dex_idx))
    }

    pub fn resolve_class(&self, dex_idx: u32, idx: u32) -> Result<Arc<Class>, VmError> {
        let name = self.resolve_class_name(dex_idx, idx)?;
        self.get_or_load(&name)
    }

    /// Resolve a method pool entry to `(class, name, signature)` names. The
    /// declaring class is loaded as a side effect.
    pub fn resolve_method(&self, dex_idx: u32, idx: u32) -> Result<(String, String, String), VmError> {
        let resolved = self
            .container(dex_idx)?
            .method_ref(idx)
            .map_err(|e| in_container(e, dex_idx))?;
        self.get_or_load(&resolved.0)?;
        Ok(resolved)
    }

    /// Resolve a field pool entry to `(class, name, descriptor)` names,
    /// loading the declaring class.
    pub fn resolve_field(&self, dex_idx: u32, idx: u32) -> Result<(String, String, String), VmError> {
        let resolved = self
            .container(dex_idx)?
            .field_ref(idx)
            .map_err(|e| in_container(e, dex_idx))?;
        self.get_or_load(&resolved.0)?;
        Ok(resolved)
    }

    pub fn resolve_string(&self, dex_idx: u32, idx: u32) -> Result<String, VmError> {
        Ok(self
            .container(dex_idx)?
            .string(idx)
            .map_err(|e| in_container(e, dex_idx))?
            .to_string())
    }

    /// Resolve an array type pool entry to `(element class name, dimension
    /// count)`.
    pub fn resolve_array(&self, dex_idx: u32, idx: u32) -> Result<(String, u32), VmError> {
        let desc = self
            .container(dex_idx)?
            .type_desc(idx)
            .map_err(|e| in_container(e, dex_idx))?
            .to_string();
        let dims = desc.bytes().take_while(|b| *b == b'[').count() as u32;
        if dims == 0 {
            return Err(VmError::TypeMismatch(format!(
                "type {} is not an array descriptor",
                desc
            )));
        }
        Ok((type_name(&desc[dims as usize..]), dims))
    }

    /// Class-hierarchy walk behind `instance-of`, `check-cast` and catch
    /// handler matching. Classes are loaded on demand; an unresolvable name
    /// is simply not assignable.
    pub fn is_assignable(&self, sub: &str, target: &str) -> bool {
        if sub == target || target == "java.lang.Object" {
            return true;
        }

        // Arrays: same dimensionality with assignable elements
        if let (Some(sub_elem), Some(target_elem)) =
            (sub.strip_prefix('['), target.strip_prefix('['))
        {
            return self.is_assignable(sub_elem, target_elem);
        }
        if sub.starts_with('[') || target.starts_with('[') {
            return false;
        }

        let class = match self.get_or_load(sub) {
            Ok(class) => class,
            Err(_) => return false,
        };

        for interface in class.interfaces() {
            if self.is_assignable(interface, target) {
                return true;
            }
        }

        match class.superclass_name() {
            Some(parent) => self.is_assignable(parent, target),
            None => false,
        }
    }
}

fn in_container(err: VmError, dex_idx: u32) -> VmError {
    match err {
        VmError::BadPoolIndex { pool, index, .. } => VmError::BadPoolIndex {
            dex: dex_idx,
            pool,
            index,
        },
        other => other,
    }
}

fn is_primitive_name(name: &str) -> bool {
    matches!(
        name,
        "int" | "long" | "float" | "double" | "boolean" | "byte" | "char" | "short" | "void"
    )
}

/// Marker record for primitive and array types, so mirrors and `instance-of`
/// have something to point at.
fn synthetic_type_class(name: &str) -> Class {
    let superclass = if name.starts_with('[') {
        Some("java.lang.Object".to_string())
    } else {
        None
    };
    let class = Class::new(
        name,
        crate::class::SYNTHETIC_DEX,
        AccessFlags::PUBLIC | AccessFlags::FINAL,
        false,
        superclass,
        vec![],
        vec![],
        vec![],
    );
    // Primitive types never run an initializer
    class.mark_static_initialized();
    class
}

/// Build a class record from its container definition. Try/catch addresses
/// are converted from code units to byte offsets here, so the interpreter
/// deals in byte-addressed pcs only.
fn materialize(dex: &DexFile, dex_idx: u32, def: &ClassDef) -> Result<Class, VmError> {
    let fullname = dex.type_name_at(def.type_idx as u32)?;
    let access = AccessFlags::from_bits_truncate(def.access);

    let superclass = match def.superclass_idx {
        Some(idx) => Some(dex.type_name_at(idx as u32)?),
        None => None,
    };

    let mut interfaces = Vec::with_capacity(def.interfaces.len());
    for idx in &def.interfaces {
        interfaces.push(dex.type_name_at(*idx as u32)?);
    }

    let mut fields = Vec::new();
    for encoded in def.static_fields.iter().chain(&def.instance_fields) {
        let (class, name, descriptor) = dex.field_ref(encoded.field_idx)?;
        fields.push(Field {
            class,
            name,
            descriptor,
            access: AccessFlags::from_bits_truncate(encoded.access),
        });
    }

    let mut methods = Vec::new();
    let mut any_bytecode = false;

    let mut build = |encoded: &EncodedMethod, is_virtual: bool| -> Result<(), VmError> {
        let (_, name, signature) = dex.method_ref(encoded.method_idx)?;
        let access = AccessFlags::from_bits_truncate(encoded.access);

        let (registers, body, tries) = match &encoded.code {
            Some(code) => {
                any_bytecode = true;
                let tries = code
                    .tries
                    .iter()
                    .map(|raw| TryCatch {
                        start: raw.start_addr * 2,
                        length: raw.insn_count as u32 * 2,
                        handlers: raw
                            .handlers
                            .iter()
                            .map(|(type_idx, addr)| (*type_idx, addr * 2))
                            .collect(),
                        catch_all: raw.catch_all_addr.map(|addr| addr * 2),
                    })
                    .collect();
                (
                    code.registers,
                    MethodBody::Bytecode(code.insns.clone()),
                    tries,
                )
            }
            None => (0, MethodBody::None, vec![]),
        };

        if access.contains(AccessFlags::NATIVE) {
            any_bytecode = true;
        }

        methods.push(Method::new(
            &fullname,
            &name,
            &signature,
            encoded.method_idx,
            dex_idx,
            registers,
            access,
            is_virtual,
            body,
            tries,
        ));
        Ok(())
    };

    for encoded in &def.direct_methods {
        build(encoded, false)?;
    }
    for encoded in &def.virtual_methods {
        build(encoded, true)?;
    }

    let external = !any_bytecode
        && !access.contains(AccessFlags::ABSTRACT)
        && !access.contains(AccessFlags::INTERFACE);

    Ok(Class::new(
        &fullname,
        dex_idx,
        access,
        external,
        superclass,
        interfaces,
        methods,
        fields,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dex::{MethodId, Proto};

    fn tiny_container() -> DexFile {
        DexFile {
            name: "test".to_string(),
            strings: vec!["greet".to_string(), "hello world".to_string()],
            types: vec!["LFoo;".to_string(), "I".to_string(), "[I".to_string()],
            protos: vec![Proto {
                shorty: String::new(),
                return_type: "I".to_string(),
                params: vec!["I".to_string()],
            }],
            fields: vec![],
            methods: vec![MethodId {
                class_idx: 0,
                proto_idx: 0,
                name_idx: 0,
            }],
            classes: vec![ClassDef {
                type_idx: 0,
                access: AccessFlags::PUBLIC.bits(),
                superclass_idx: None,
                ..ClassDef::default()
            }],
        }
    }

    #[test]
    fn resolves_pool_entries() {
        let registry = ClassRegistry::new();
        let dex_idx = registry.add_container(tiny_container());

        assert_eq!(registry.resolve_string(dex_idx, 1).unwrap(), "hello world");
        assert_eq!(
            registry.resolve_class_name(dex_idx, 0).unwrap(),
            "Foo"
        );
        let (class, name, sig) = registry.resolve_method(dex_idx, 0).unwrap();
        assert_eq!((class.as_str(), name.as_str(), sig.as_str()), ("Foo", "greet", "(I)I"));

        let (elem, dims) = registry.resolve_array(dex_idx, 2).unwrap();
        assert_eq!((elem.as_str(), dims), ("int", 1));
    }

    #[test]
    fn bad_indices_are_descriptive_errors() {
        let registry = ClassRegistry::new();
        let dex_idx = registry.add_container(tiny_container());

        assert!(registry.resolve_string(dex_idx, 99).is_err());
        assert!(registry.resolve_method(dex_idx, 5).is_err());
        assert!(registry.resolve_class(dex_idx, 77).is_err());
        assert!(registry.resolve_string(9, 0).is_err());
    }

    #[test]
    fn loads_primitive_and_array_markers_on_demand() {
        let registry = ClassRegistry::new();
        let int_class = registry.get_or_load("int").unwrap();
        assert!(int_class.is_static_initialized());
        let array = registry.get_or_load("[int").unwrap();
        assert_eq!(array.superclass_name(), Some("java.lang.Object"));
    }

    #[test]
    fn missing_class_reports_not_found() {
        let registry = ClassRegistry::new();
        assert!(matches!(
            registry.get_or_load("does.not.Exist"),
            Err(VmError::ClassNotFound(_))
        ));
    }
}
