//! Application threads: the per-thread frame stack, the cooperative
//! suspension protocol used by the garbage collector, and the manager that
//! tracks every live thread control block.
//!
//! A thread may only be suspended between instructions. At the top of its
//! loop it checks the shared state flag; on a suspend request it publishes a
//! snapshot of its live references (the GC's view of its registers) and parks
//! until resumed.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use crate::class::Method;
use crate::jvm::error::VmError;
use crate::jvm::frame::Frame;
use crate::jvm::interp;
use crate::jvm::mem::ObjectRef;
use crate::jvm::Vm;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ThreadState {
    NotStarted,
    Running,
    SuspendRequested,
    Suspended,
    Stopped,
}

pub struct ThreadControl {
    name: String,
    state: Mutex<ThreadState>,
    cv: Condvar,
    roots: Mutex<Vec<ObjectRef>>,
}

impl ThreadControl {
    pub fn new(name: &str) -> Arc<ThreadControl> {
        Arc::new(ThreadControl {
            name: name.to_string(),
            state: Mutex::new(ThreadState::NotStarted),
            cv: Condvar::new(),
            roots: Mutex::new(Vec::new()),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> ThreadState {
        *self.state.lock()
    }

    pub fn set_running(&self) {
        let mut state = self.state.lock();
        if *state == ThreadState::NotStarted {
            *state = ThreadState::Running;
        }
    }

    pub fn mark_stopped(&self) {
        let mut state = self.state.lock();
        *state = ThreadState::Stopped;
        self.roots.lock().clear();
        self.cv.notify_all();
    }

    /// Request suspension and block until the thread acknowledges. Threads
    /// that are not running (not started, already suspended, stopped) need no
    /// handshake. The wait is bounded so a thread stuck in a blocking
    /// operation stalls the collector instead of deadlocking it.
    pub fn suspend(&self) {
        let mut state = self.state.lock();
        if *state != ThreadState::Running {
            return;
        }
        *state = ThreadState::SuspendRequested;
        self.cv.notify_all();

        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        while *state == ThreadState::SuspendRequested {
            if self
                .cv
                .wait_until(&mut state, deadline)
                .timed_out()
            {
                warn!(
                    "thread {} did not reach a suspension point in time",
                    self.name
                );
                return;
            }
        }
    }

    /// Wake a suspended thread.
    pub fn resume(&self) {
        let mut state = self.state.lock();
        if *state == ThreadState::Suspended || *state == ThreadState::SuspendRequested {
            *state = ThreadState::Running;
            self.cv.notify_all();
        }
    }

    /// Ask the thread to exit its loop at the next suspension point.
    pub fn stop(&self) {
        let mut state = self.state.lock();
        if *state != ThreadState::Stopped {
            *state = ThreadState::Stopped;
            self.cv.notify_all();
        }
    }

    /// Suspension point, called between instructions. Returns false when the
    /// thread should exit its loop.
    fn poll<F: FnOnce() -> Vec<ObjectRef>>(&self, publish: F) -> bool {
        let mut state = self.state.lock();
        match *state {
            ThreadState::Stopped => false,
            ThreadState::SuspendRequested => {
                drop(state);
                *self.roots.lock() = publish();

                let mut state = self.state.lock();
                if *state == ThreadState::SuspendRequested {
                    *state = ThreadState::Suspended;
                    self.cv.notify_all();
                }
                while *state == ThreadState::Suspended {
                    self.cv.wait(&mut state);
                }
                *state != ThreadState::Stopped
            }
            _ => true,
        }
    }

    fn published_roots(&self, out: &mut Vec<ObjectRef>) {
        out.extend(self.roots.lock().iter().cloned());
    }
}

/// Registry of every application thread's control block. The collector uses
/// it to stop and restart the world; the GC thread itself is not registered.
#[derive(Default)]
pub struct ThreadManager {
    threads: Mutex<Vec<Arc<ThreadControl>>>,
}

impl ThreadManager {
    pub fn register(&self, control: Arc<ThreadControl>) {
        self.threads.lock().push(control);
    }

    pub fn suspend_all(&self) {
        let threads = self.threads.lock().clone();
        for control in &threads {
            control.suspend();
        }
    }

    pub fn resume_all(&self) {
        let threads = self.threads.lock().clone();
        for control in &threads {
            control.resume();
        }
    }

    pub fn stop_all(&self) {
        let threads = self.threads.lock().clone();
        for control in &threads {
            control.stop();
        }
    }

    /// Root snapshots published by suspended threads.
    pub fn roots(&self, out: &mut Vec<ObjectRef>) {
        let threads = self.threads.lock().clone();
        for control in &threads {
            control.published_roots(out);
        }
    }

    /// Drop control blocks of threads that already stopped.
    pub fn prune(&self) {
        self.threads
            .lock()
            .retain(|control| control.state() != ThreadState::Stopped);
    }
}

/// One interpreter thread: a stack of frames driven by the dispatch loop
/// until the stack empties or the thread is stopped.
pub struct JThread {
    vm: Arc<Vm>,
    control: Arc<ThreadControl>,
    stack: Vec<Frame>,
}

impl JThread {
    pub fn new(vm: Arc<Vm>, name: &str) -> JThread {
        let control = ThreadControl::new(name);
        vm.threads.register(control.clone());
        JThread {
            vm,
            control,
            stack: Vec::new(),
        }
    }

    pub fn vm(&self) -> &Arc<Vm> {
        &self.vm
    }

    pub fn control(&self) -> &Arc<ThreadControl> {
        &self.control
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    pub fn is_finished(&self) -> bool {
        self.stack.is_empty()
    }

    /// Push a frame for `method`. Pushing `<clinit>` marks the class
    /// statically initialized *before* the frame runs, so code inside the
    /// initializer that touches its own class does not re-enter it.
    pub fn push_frame(&mut self, method: Arc<Method>) -> Result<&mut Frame, VmError> {
        if method.is_static_initializer() {
            if let Some(class) = self.vm.registry.get(method.class_name()) {
                if !class.mark_static_initialized() {
                    warn!("class {} already initialized", class.fullname());
                }
            }
        }

        self.stack.push(Frame::new(method, self.vm.heap().null()));
        Ok(self.stack.last_mut().expect("frame just pushed"))
    }

    pub fn pop_frame(&mut self) -> Option<Frame> {
        self.stack.pop()
    }

    pub fn current_frame(&mut self) -> Result<&mut Frame, VmError> {
        self.stack
            .last_mut()
            .ok_or_else(|| VmError::Malformed("no current frame".to_string()))
    }

    pub fn frames(&self) -> &[Frame] {
        &self.stack
    }

    fn snapshot_roots(&self) -> Vec<ObjectRef> {
        let mut roots = Vec::new();
        for frame in &self.stack {
            frame.roots(&mut roots);
        }
        roots
    }

    /// Drive the interpreter until the stack empties, the thread is stopped,
    /// or a VM-fatal error ends it.
    pub fn run(&mut self) -> Result<(), VmError> {
        self.control.set_running();
        let vm = self.vm.clone();

        let result = loop {
            if self.stack.is_empty() {
                break Ok(());
            }

            let control = self.control.clone();
            if !control.poll(|| self.snapshot_roots()) {
                debug!("thread {} stopping", self.control.name());
                break Ok(());
            }

            if let Err(err) = interp::step(&vm, self) {
                break Err(err);
            }
        };

        self.control.mark_stopped();
        self.vm.threads.prune();
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn suspension_handshake() {
        let control = ThreadControl::new("worker");
        assert_eq!(control.state(), ThreadState::NotStarted);
        control.set_running();
        assert_eq!(control.state(), ThreadState::Running);

        let worker = {
            let control = control.clone();
            thread::spawn(move || {
                // Simulated interpreter loop
                loop {
                    if !control.poll(Vec::new) {
                        return;
                    }
                    thread::yield_now();
                }
            })
        };

        control.suspend();
        assert_eq!(control.state(), ThreadState::Suspended);
        control.resume();
        assert_eq!(control.state(), ThreadState::Running);
        control.stop();
        worker.join().unwrap();
        assert_eq!(control.state(), ThreadState::Stopped);
    }

    #[test]
    fn suspend_skips_threads_that_never_started(){
        let control = ThreadControl::new("idle");
        control.suspend();
        assert_eq!(control.state(), ThreadState::NotStarted);
        control.resume();
        assert_eq!(control.state(), ThreadState::NotStarted);
    }

    #[test]
    fn stop_is_terminal() {
        let control = ThreadControl::new("done");
        control.set_running();
        control.stop();
        assert_eq!(control.state(), ThreadState::Stopped);
        control.set_running();
        assert_eq!(control.state(), ThreadState::Stopped);
        assert!(!control.poll(Vec::new));
    }
}
