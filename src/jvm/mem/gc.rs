//! Tracked heap and the stop-the-world mark-and-sweep collector. The heap
//! owns the authoritative strong reference to every allocation; all other
//! holders (registers, fields, handle tables) are scanned as roots. A
//! dedicated collector task parks on a condition variable and is woken by an
//! explicit request or by the allocator crossing the tracked-object limit.

use std::sync::atomic::{AtomicI64, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use crate::jvm::mem::{
    ArrayObject, FieldTable, Instance, Mirror, Object, ObjectBody, ObjectRef, StrObject, Value,
};
use crate::jvm::Vm;

pub const DEFAULT_GC_LIMIT: usize = 100_000;

struct HeapState {
    tracked: Vec<ObjectRef>,
    collect_requested: bool,
    shutdown: bool,
}

enum Wake {
    Requested,
    Shutdown,
    /// Timed wakeup with nothing to do; the collector re-checks VM liveness.
    Tick,
}

pub struct Heap {
    state: Mutex<HeapState>,
    trigger: Condvar,
    cycles: AtomicU64,
    limit: AtomicUsize,
    null: ObjectRef,
}

impl Default for Heap {
    fn default() -> Self {
        Heap::new()
    }
}

impl Heap {
    pub fn new() -> Heap {
        Heap {
            state: Mutex::new(HeapState {
                tracked: Vec::new(),
                collect_requested: false,
                shutdown: false,
            }),
            trigger: Condvar::new(),
            cycles: AtomicU64::new(0),
            limit: AtomicUsize::new(DEFAULT_GC_LIMIT),
            null: Arc::new(Object::with_body(ObjectBody::Null)),
        }
    }

    /// The null sentinel. Not part of the tracked set, so it trivially
    /// survives every collection.
    pub fn null(&self) -> ObjectRef {
        self.null.clone()
    }

    /// Register a freshly built object with the tracked set. Crossing the
    /// configured limit wakes the collector without blocking the allocation.
    pub fn alloc(&self, body: ObjectBody) -> ObjectRef {
        let obj = Arc::new(Object::with_body(body));
        let mut state = self.state.lock();
        state.tracked.push(obj.clone());
        if state.tracked.len() > self.limit.load(Ordering::Relaxed) {
            state.collect_requested = true;
            self.trigger.notify_all();
        }
        obj
    }

    pub fn make_number(&self, bits: i64) -> ObjectRef {
        self.alloc(ObjectBody::Number(AtomicI64::new(bits)))
    }

    pub fn make_string(&self, text: &str) -> ObjectRef {
        self.alloc(ObjectBody::Str(StrObject {
            text: text.to_string(),
            fields: Mutex::new(FieldTable::new()),
        }))
    }

    pub fn make_instance(&self, class: &str, fields: FieldTable) -> ObjectRef {
        self.alloc(ObjectBody::Instance(Instance {
            class: class.to_string(),
            fields: Mutex::new(fields),
        }))
    }

    pub fn make_mirror(&self, target: &str) -> ObjectRef {
        self.alloc(ObjectBody::Mirror(Mirror {
            target: target.to_string(),
            fields: Mutex::new(FieldTable::new()),
        }))
    }

    pub fn make_array(&self, element: &str, dimensions: Vec<u32>) -> ObjectRef {
        self.alloc(ObjectBody::Array(ArrayObject::new(element, dimensions)))
    }

    /// Register an array view (shares another array's store) with the heap.
    pub fn adopt_array(&self, array: ArrayObject) -> ObjectRef {
        self.alloc(ObjectBody::Array(array))
    }

    pub fn tracked_count(&self) -> usize {
        self.state.lock().tracked.len()
    }

    pub fn cycles(&self) -> u64 {
        self.cycles.load(Ordering::SeqCst)
    }

    pub fn limit(&self) -> usize {
        self.limit.load(Ordering::Relaxed)
    }

    pub fn set_limit(&self, limit: usize) {
        self.limit.store(limit, Ordering::Relaxed);
    }

    /// Ask the collector task to run a cycle.
    pub fn request_collect(&self) {
        let mut state = self.state.lock();
        state.collect_requested = true;
        self.trigger.notify_all();
    }

    pub fn shutdown(&self) {
        let mut state = self.state.lock();
        state.shutdown = true;
        self.trigger.notify_all();
    }

    fn wait_for_request(&self) -> Wake {
        let mut state = self.state.lock();
        if state.shutdown {
            return Wake::Shutdown;
        }
        if state.collect_requested {
            state.collect_requested = false;
            return Wake::Requested;
        }

        self.trigger
            .wait_for(&mut state, Duration::from_millis(200));

        if state.shutdown {
            Wake::Shutdown
        } else if state.collect_requested {
            state.collect_requested = false;
            Wake::Requested
        } else {
            Wake::Tick
        }
    }

    /// Drop unmarked objects from the tracked set and clear the mark bit on
    /// survivors. Returns the number of reclaimed objects.
    fn sweep(&self) -> usize {
        let mut state = self.state.lock();
        let before = state.tracked.len();
        state.tracked.retain(|obj| obj.is_marked());
        for obj in &state.tracked {
            obj.clear_mark();
        }
        before - state.tracked.len()
    }
}

/// Mark `roots` and everything transitively reachable from them.
fn mark_from(roots: Vec<ObjectRef>) {
    let mut worklist = roots;
    while let Some(obj) = worklist.pop() {
        if obj.set_marked() {
            obj.children(&mut worklist);
        }
    }
}

/// One stop-the-world collection cycle over the VM's heap.
pub fn collect(vm: &Vm) {
    vm.threads.suspend_all();

    let heap = vm.heap();
    debug!(
        "gc: starting collection cycle ({} tracked objects)",
        heap.tracked_count()
    );

    // The null sentinel is always a root, so it always survives
    let mut roots: Vec<ObjectRef> = vec![heap.null()];
    vm.gc_roots(&mut roots);

    mark_from(roots);
    let freed = heap.sweep();
    heap.null.clear_mark();

    debug!("gc: freed {} objects, {} live", freed, heap.tracked_count());

    vm.threads.resume_all();
    heap.cycles.fetch_add(1, Ordering::SeqCst);
}

/// Spawn the background collector task. It holds only a weak VM reference so
/// that dropping the VM ends the task even without an explicit shutdown.
pub fn spawn_collector(vm: Weak<Vm>) -> JoinHandle<()> {
    thread::Builder::new()
        .name("gc".to_string())
        .spawn(move || loop {
            let heap = match vm.upgrade() {
                Some(vm) => vm.heap_arc(),
                None => return,
            };

            match heap.wait_for_request() {
                Wake::Shutdown => return,
                Wake::Tick => continue,
                Wake::Requested => match vm.upgrade() {
                    Some(vm) => collect(&vm),
                    None => return,
                },
            }
        })
        .expect("failed to spawn gc thread")
}

/// Extract the object references held in a slice of values, used when
/// assembling the root set.
pub fn roots_of(values: &[Value], out: &mut Vec<ObjectRef>) {
    for value in values {
        if let Value::Ref(obj) = value {
            out.push(obj.clone());
        }
    }
}
