//! Synthetic class builder: accumulates a class whose methods are host
//! callbacks instead of bytecode, then hands the finished record to the
//! registry. This is how the built-in `java.*` runtime layer exists without
//! a DEX container.

use std::sync::Arc;

use crate::class::loader::ClassRegistry;
use crate::class::{
    AccessFlags, Class, Field, HostFn, Method, MethodBody, SYNTHETIC_DEX,
};

pub struct ClassBuilder<'a> {
    registry: &'a ClassRegistry,
    fullname: String,
    access: AccessFlags,
    superclass: Option<String>,
    interfaces: Vec<String>,
    methods: Vec<Method>,
    fields: Vec<Field>,
}

impl<'a> ClassBuilder<'a> {
    pub fn new(registry: &'a ClassRegistry, package: &str, name: &str) -> ClassBuilder<'a> {
        let fullname = if package.is_empty() {
            name.to_string()
        } else {
            format!("{}.{}", package, name)
        };

        ClassBuilder {
            registry,
            fullname,
            access: AccessFlags::PUBLIC,
            superclass: Some("java.lang.Object".to_string()),
            interfaces: Vec::new(),
            methods: Vec::new(),
            fields: Vec::new(),
        }
    }

    pub fn set_superclass(&mut self, name: &str) -> &mut Self {
        self.superclass = Some(name.to_string());
        self
    }

    pub fn clear_superclass(&mut self) -> &mut Self {
        self.superclass = None;
        self
    }

    pub fn set_interface(&mut self) -> &mut Self {
        self.access |= AccessFlags::INTERFACE;
        self
    }

    pub fn add_field(&mut self, name: &str, descriptor: &str, is_static: bool) -> &mut Self {
        let mut access = AccessFlags::PUBLIC;
        if is_static {
            access |= AccessFlags::STATIC;
        }
        self.fields.push(Field {
            class: self.fullname.clone(),
            name: name.to_string(),
            descriptor: descriptor.to_string(),
            access,
        });
        self
    }

    /// Add a statically dispatched method (constructors, statics, privates).
    pub fn add_method(
        &mut self,
        name: &str,
        signature: &str,
        flags: AccessFlags,
        callback: HostFn,
    ) -> &mut Self {
        self.push_method(false, name, signature, flags, callback);
        self
    }

    /// Add a virtually dispatched method (participates in the superclass
    /// walk of `invoke-virtual`/`invoke-interface`).
    pub fn add_virtual_method(
        &mut self,
        name: &str,
        signature: &str,
        flags: AccessFlags,
        callback: HostFn,
    ) -> &mut Self {
        self.push_method(true, name, signature, flags, callback);
        self
    }

    fn push_method(
        &mut self,
        is_virtual: bool,
        name: &str,
        signature: &str,
        flags: AccessFlags,
        callback: HostFn,
    ) {
        let index = self.methods.len() as u32;
        self.methods.push(Method::new(
            &self.fullname,
            name,
            signature,
            index,
            SYNTHETIC_DEX,
            0,
            flags,
            is_virtual,
            MethodBody::Host(callback),
            vec![],
        ));
    }

    /// Hand the completed record to the registry. Synthetic classes carry no
    /// `<clinit>` bytecode, so they are born initialized.
    pub fn finalize(self) -> Arc<Class> {
        let class = Class::new(
            &self.fullname,
            SYNTHETIC_DEX,
            self.access,
            false,
            self.superclass,
            self.interfaces,
            self.methods,
            self.fields,
        );
        class.mark_static_initialized();
        self.registry.add_class(class)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn builds_and_registers_a_class() {
        let registry = ClassRegistry::new();
        let mut builder = ClassBuilder::new(&registry, "java.lang", "Demo");
        builder.add_field("count", "I", true);
        builder.add_virtual_method(
            "get",
            "()I",
            AccessFlags::PUBLIC,
            Arc::new(|_, frame, _| {
                frame.set_return_int(7);
                Ok(())
            }),
        );
        builder.finalize();

        let class = registry.get("java.lang.Demo").expect("registered");
        assert_eq!(class.package(), "java.lang");
        assert_eq!(class.simple_name(), "Demo");
        assert!(class.is_static_initialized());
        assert!(class.method("get", "()I").is_some());
        assert!(class.field("count").is_some());
        assert_eq!(class.dex_idx(), SYNTHETIC_DEX);
    }
}
