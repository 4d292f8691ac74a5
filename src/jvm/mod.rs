//! The virtual machine context: class registry, tracked heap, native bridge,
//! handle table and thread manager, constructed at start and explicitly
//! passed everywhere instead of living in globals.

pub mod call;
pub mod error;
pub mod frame;
pub mod interp;
pub mod mem;
pub mod thread;

use std::io::{self, Write};
use std::sync::Arc;
use std::thread::{JoinHandle, ThreadId};

use hashbrown::HashMap;
use parking_lot::Mutex;

use crate::class::loader::ClassRegistry;
use crate::class::{Class, Method, MethodBody};
use crate::dex::apk::Apk;
use crate::dex::DexFile;
use crate::jvm::call::{HandleTable, NativeManager};
use crate::jvm::error::{Throw, VmError};
use crate::jvm::frame::Frame;
use crate::jvm::mem::{gc, FieldTable, Heap, ObjectRef, Value};
use crate::jvm::thread::{JThread, ThreadManager};

pub struct Vm {
    pub registry: ClassRegistry,
    pub threads: ThreadManager,
    pub natives: NativeManager,
    pub handles: HandleTable,
    heap: Arc<Heap>,
    interned: Mutex<HashMap<String, ObjectRef>>,
    mirrors: Mutex<HashMap<String, ObjectRef>>,
    out: Mutex<Box<dyn Write + Send>>,
    err: Mutex<Box<dyn Write + Send>>,
    /// Exceptions raised by native code through the environment, delivered
    /// to the interpreter when the native frame returns.
    sticky: Mutex<HashMap<ThreadId, ObjectRef>>,
    /// Join handles of spawned application threads, keyed by the address of
    /// their `java.lang.Thread` object.
    java_threads: Mutex<HashMap<usize, JoinHandle<()>>>,
    gc_task: Mutex<Option<JoinHandle<()>>>,
}

impl Vm {
    pub fn new() -> Arc<Vm> {
        let vm = Arc::new(Vm {
            registry: ClassRegistry::new(),
            threads: ThreadManager::default(),
            natives: NativeManager::new(),
            handles: HandleTable::new(),
            heap: Arc::new(Heap::new()),
            interned: Mutex::new(HashMap::new()),
            mirrors: Mutex::new(HashMap::new()),
            out: Mutex::new(Box::new(io::stdout())),
            err: Mutex::new(Box::new(io::stderr())),
            sticky: Mutex::new(HashMap::new()),
            java_threads: Mutex::new(HashMap::new()),
            gc_task: Mutex::new(None),
        });

        crate::runtime::register(&vm);
        *vm.gc_task.lock() = Some(gc::spawn_collector(Arc::downgrade(&vm)));
        info!("vm instance created");
        vm
    }

    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    pub fn heap_arc(&self) -> Arc<Heap> {
        self.heap.clone()
    }

    /// Stop the collector task and ask every application thread to exit.
    pub fn shutdown(&self) {
        self.threads.stop_all();
        self.heap.shutdown();
        if let Some(task) = self.gc_task.lock().take() {
            let _ = task.join();
        }
    }

    // Containers

    pub fn load_dex(&self, path: &str) -> Result<u32, VmError> {
        let data = crate::read_file(path)?;
        let dex = DexFile::parse(path, &data)?;
        info!(
            "registered container {} ({} classes)",
            path,
            dex.classes.len()
        );
        Ok(self.registry.add_container(dex))
    }

    /// Load an APK: registers its `classes.dex` and reports the manifest's
    /// main activity when one is declared.
    pub fn load_apk(&self, path: &str) -> Result<(u32, Option<String>), VmError> {
        let apk = Apk::open(path)?;
        let dex = DexFile::parse(path, &apk.classes_dex)?;
        info!(
            "registered apk {} ({} classes, main activity {:?})",
            path,
            dex.classes.len(),
            apk.main_activity
        );
        Ok((self.registry.add_container(dex), apk.main_activity))
    }

    // Allocation helpers

    /// Build a field-complete instance of `class`: the field map is seeded
    /// from the declared fields of the class and all its superclasses, in
    /// inheritance order.
    pub fn make_instance(&self, class: &Arc<Class>) -> Result<ObjectRef, VmError> {
        let mut chain = vec![class.clone()];
        let mut cursor = class.clone();
        while let Some(parent) = cursor.superclass_name() {
            match self.registry.get_or_load(parent) {
                Ok(parent) => {
                    cursor = parent.clone();
                    chain.push(parent);
                }
                Err(_) => break,
            }
        }

        let mut fields = FieldTable::new();
        for class in chain.iter().rev() {
            for field in class.declared_fields() {
                if !field.is_static() {
                    fields.insert(&field.name, Value::default_for(&field.descriptor));
                }
            }
        }

        Ok(self.heap.make_instance(class.fullname(), fields))
    }

    /// Interned string for `const-string`; repeated loads share one object.
    pub fn intern_string(&self, text: &str) -> ObjectRef {
        let mut interned = self.interned.lock();
        if let Some(existing) = interned.get(text) {
            return existing.clone();
        }
        let obj = self.heap.make_string(text);
        interned.insert(text.to_string(), obj.clone());
        obj
    }

    /// The `java.lang.Class` mirror for a class name, shared per name.
    pub fn class_mirror(&self, name: &str) -> ObjectRef {
        let mut mirrors = self.mirrors.lock();
        if let Some(existing) = mirrors.get(name) {
            return existing.clone();
        }
        let obj = self.heap.make_mirror(name);
        mirrors.insert(name.to_string(), obj.clone());
        obj
    }

    pub fn make_string_array(&self, items: &[String]) -> ObjectRef {
        let array = self
            .heap
            .make_array("java.lang.String", vec![items.len() as u32]);
        if let Some(backing) = array.as_array() {
            for (idx, item) in items.iter().enumerate() {
                let value = Value::Ref(self.heap.make_string(item));
                // Indices are in range by construction
                let _ = backing.set(idx as i32, value);
            }
        }
        array
    }

    /// Build a throwable instance for a runtime condition, carrying its
    /// message in the `message` field.
    pub fn exception_object(&self, class_name: &str, message: &str) -> ObjectRef {
        let obj = match self.registry.get_or_load(class_name) {
            Ok(class) => self
                .make_instance(&class)
                .unwrap_or_else(|_| self.heap.make_instance(class_name, FieldTable::new())),
            Err(_) => {
                warn!("throwable class {} is not registered", class_name);
                self.heap.make_instance(class_name, FieldTable::new())
            }
        };
        let _ = obj.set_field("message", Value::Ref(self.heap.make_string(message)));
        obj
    }

    // Output streams (swappable so embeddings and tests can capture them)

    pub fn set_out(&self, writer: Box<dyn Write + Send>) {
        *self.out.lock() = writer;
    }

    pub fn set_err(&self, writer: Box<dyn Write + Send>) {
        *self.err.lock() = writer;
    }

    pub fn write_out(&self, text: &str) {
        let mut out = self.out.lock();
        let _ = out.write_all(text.as_bytes());
        let _ = out.flush();
    }

    pub fn write_err(&self, text: &str) {
        let mut err = self.err.lock();
        let _ = err.write_all(text.as_bytes());
        let _ = err.flush();
    }

    // Native-raised exceptions

    pub fn set_sticky_exception(&self, thrown: ObjectRef) {
        self.sticky
            .lock()
            .insert(std::thread::current().id(), thrown);
    }

    pub fn take_sticky_exception(&self) -> Option<ObjectRef> {
        self.sticky.lock().remove(&std::thread::current().id())
    }

    /// Observe the pending exception without clearing it.
    pub fn sticky_exception(&self) -> Option<ObjectRef> {
        self.sticky
            .lock()
            .get(&std::thread::current().id())
            .cloned()
    }

    pub fn has_sticky_exception(&self) -> bool {
        self.sticky
            .lock()
            .contains_key(&std::thread::current().id())
    }

    // GC support

    /// Assemble the root set: suspended threads' published registers, static
    /// fields of every loaded class, native handles, interned strings and
    /// class mirrors.
    pub fn gc_roots(&self, out: &mut Vec<ObjectRef>) {
        self.threads.roots(out);

        for class in self.registry.all_classes() {
            gc::roots_of(&class.static_values(), out);
        }

        self.handles.roots(out);
        out.extend(self.interned.lock().values().cloned());
        out.extend(self.mirrors.lock().values().cloned());
        out.extend(self.sticky.lock().values().cloned());
    }

    // Method lookup

    /// Virtual dispatch: start at `class_name` and walk the superclass chain
    /// until a method with the wanted signature appears.
    pub fn find_virtual(
        &self,
        class_name: &str,
        name: &str,
        signature: &str,
    ) -> Result<(Arc<Class>, Arc<Method>), Throw> {
        let mut cursor = self
            .registry
            .get_or_load(class_name)
            .map_err(Throw::Fatal)?;
        loop {
            if let Some(method) = cursor.method(name, signature) {
                return Ok((cursor, method));
            }
            match cursor.superclass_name() {
                Some(parent) => {
                    cursor = self.registry.get_or_load(parent).map_err(Throw::Fatal)?;
                }
                None => {
                    return Err(error::no_such_method(format!(
                        "{}.{}{}",
                        class_name, name, signature
                    )))
                }
            }
        }
    }

    // Application threads

    /// Back `Thread.start()`: run the target's `run()` method on a fresh OS
    /// thread with its own interpreter loop.
    pub fn spawn_java_thread(self: &Arc<Self>, target: ObjectRef) -> Result<(), Throw> {
        let class_name = target.class_name().ok_or_else(|| {
            error::illegal_argument("start() on an object with no class".to_string())
        })?;
        let (_, method) = self.find_virtual(&class_name, "run", "()V")?;

        let vm = self.clone();
        let thread_obj = target.clone();
        let handle = std::thread::Builder::new()
            .name(format!("java-{}", class_name))
            .spawn(move || {
                let mut thread = JThread::new(vm.clone(), "java-thread");
                let outcome = run_entry(&vm, &mut thread, &method, thread_obj);
                if let Err(err) = outcome {
                    vm.write_err(&format!("thread terminated: {}\n", err));
                }
            })
            .map_err(|e| Throw::Fatal(VmError::Malformed(format!("spawn failed: {}", e))))?;

        self.java_threads
            .lock()
            .insert(Arc::as_ptr(&target) as usize, handle);
        Ok(())
    }

    /// Back `Thread.join()`.
    pub fn join_java_thread(&self, target: &ObjectRef) {
        let handle = self
            .java_threads
            .lock()
            .remove(&(Arc::as_ptr(target) as usize));
        if let Some(handle) = handle {
            let _ = handle.join();
        }
    }

    /// Run `class_name`'s entry point on the calling thread: `onCreate` for
    /// activities, otherwise `main(String[])`. The argument array lands in
    /// the entry frame's last register; the class's `<clinit>` frame is
    /// stacked on top so it executes first.
    pub fn run_main(self: &Arc<Self>, class_name: &str, args: &[String]) -> Result<(), VmError> {
        let class = self.registry.get_or_load(class_name)?;
        info!("running class {}", class.fullname());

        let (method, activity) = match class.method("onCreate", "(Landroid/os/Bundle;)V") {
            Some(method) => (method, true),
            None => match class.method("main", "([Ljava/lang/String;)V") {
                Some(method) => (method, false),
                None => {
                    return Err(VmError::MethodNotFound(format!(
                        "neither onCreate nor main found in {}",
                        class_name
                    )))
                }
            },
        };
        if method.bytecode().is_none() {
            return Err(VmError::Malformed(format!(
                "entry method of {} has no bytecode",
                class_name
            )));
        }

        let mut thread = JThread::new(self.clone(), "main");
        let param_register = method.registers() - 1;
        let argument = if activity {
            Value::Ref(self.heap.null())
        } else {
            Value::Ref(self.make_string_array(args))
        };

        thread.push_frame(method)?;
        thread
            .current_frame()?
            .set(param_register, argument)
            .map_err(fatal_of)?;

        if !class.is_static_initialized() {
            match class.static_initializer() {
                Some(clinit) if clinit.bytecode().is_some() => {
                    thread.push_frame(clinit)?;
                }
                _ => {
                    class.mark_static_initialized();
                }
            }
        }

        thread.run()
    }
}

/// Run a single method to completion on a dedicated thread (the entry of a
/// spawned `java.lang.Thread`).
fn run_entry(
    vm: &Arc<Vm>,
    thread: &mut JThread,
    method: &Arc<Method>,
    receiver: ObjectRef,
) -> Result<(), VmError> {
    match method.body() {
        MethodBody::Bytecode(_) => {
            let receiver_register = method.registers() - method.arg_words();
            thread.push_frame(method.clone())?;
            thread
                .current_frame()?
                .set_obj(receiver_register, receiver)
                .map_err(fatal_of)?;
            thread.run()
        }
        MethodBody::Host(callback) => {
            let mut scratch = Frame::new(method.clone(), vm.heap().null());
            callback(vm, &mut scratch, &[Value::Ref(receiver)]).map_err(fatal_of)?;
            Ok(())
        }
        MethodBody::None => Err(VmError::MethodNotFound(format!(
            "{}.run()V has no implementation",
            method.class_name()
        ))),
    }
}

fn fatal_of(throw: Throw) -> VmError {
    match throw {
        Throw::Fatal(err) => err,
        Throw::Raise { class, message } => VmError::UncaughtException {
            class: class.to_string(),
            message,
        },
        Throw::Object(obj) => VmError::UncaughtException {
            class: obj.class_name().unwrap_or_default(),
            message: String::new(),
        },
    }
}
