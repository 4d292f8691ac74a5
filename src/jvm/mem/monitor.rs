//! Per-object monitor: mutual exclusion with wait/notify. Re-entry by the
//! owning thread is treated as immediate acquisition with an entry count, so
//! a thread never deadlocks against itself.

use std::thread::{current, ThreadId};
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use crate::jvm::error::{illegal_argument, Throw, VmError};

#[derive(Default, Debug)]
struct OwnerState {
    owner: Option<(ThreadId, u32)>,
}

#[derive(Debug)]
pub struct Monitor {
    state: Mutex<OwnerState>,
    /// Signalled when the monitor becomes free.
    free: Condvar,
    /// Signalled by notify/notifyAll to wake parked waiters.
    waiters: Condvar,
}

impl Default for Monitor {
    fn default() -> Self {
        Monitor::new()
    }
}

impl Monitor {
    pub fn new() -> Monitor {
        Monitor {
            state: Mutex::new(OwnerState::default()),
            free: Condvar::new(),
            waiters: Condvar::new(),
        }
    }

    /// Block until this thread owns the monitor.
    pub fn enter(&self) {
        let me = current().id();
        let mut state = self.state.lock();
        loop {
            match &mut state.owner {
                None => {
                    state.owner = Some((me, 1));
                    return;
                }
                Some((owner, count)) if *owner == me => {
                    *count += 1;
                    return;
                }
                _ => self.free.wait(&mut state),
            }
        }
    }

    /// Release one entry. Releasing a monitor the current thread does not own
    /// is a VM-fatal condition.
    pub fn exit(&self) -> Result<(), VmError> {
        let me = current().id();
        let mut state = self.state.lock();
        match &mut state.owner {
            Some((owner, count)) if *owner == me => {
                *count -= 1;
                if *count == 0 {
                    state.owner = None;
                    self.free.notify_one();
                }
                Ok(())
            }
            _ => Err(VmError::Malformed(
                "monitor-exit on an object not owned by the current thread".to_string(),
            )),
        }
    }

    /// Block while a *different* thread owns the monitor. Never acquires
    /// ownership; used to serialize field access against an explicit lock
    /// holder.
    pub fn check(&self) {
        let me = current().id();
        let mut state = self.state.lock();
        while matches!(state.owner, Some((owner, _)) if owner != me) {
            self.free.wait(&mut state);
        }
    }

    pub fn owned_by_current_thread(&self) -> bool {
        let me = current().id();
        matches!(self.state.lock().owner, Some((owner, _)) if owner == me)
    }

    pub fn is_locked(&self) -> bool {
        self.state.lock().owner.is_some()
    }

    /// Atomically release the monitor, park until notified or until the
    /// timeout elapses, then reacquire with the saved entry count.
    ///
    /// `timeout_ms` of 0 waits forever; negative timeouts raise
    /// `IllegalArgumentException`; waiting without owning the monitor is
    /// VM-fatal.
    pub fn wait(&self, timeout_ms: i64) -> Result<(), Throw> {
        if timeout_ms < 0 {
            return Err(illegal_argument("timeout value is negative"));
        }

        let me = current().id();
        let mut state = self.state.lock();
        let count = match state.owner {
            Some((owner, count)) if owner == me => count,
            _ => {
                return Err(Throw::Fatal(VmError::Malformed(
                    "wait() on an object not owned by the current thread".to_string(),
                )))
            }
        };

        state.owner = None;
        self.free.notify_one();

        if timeout_ms == 0 {
            self.waiters.wait(&mut state);
        } else {
            self.waiters
                .wait_for(&mut state, Duration::from_millis(timeout_ms as u64));
        }

        while state.owner.is_some() {
            self.free.wait(&mut state);
        }
        state.owner = Some((me, count));
        Ok(())
    }

    /// Wake one parked waiter.
    pub fn notify_one(&self) {
        self.waiters.notify_one();
    }

    /// Wake all parked waiters.
    pub fn notify_all(&self) {
        self.waiters.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI32, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn reentry_by_owner_is_immediate() {
        let monitor = Monitor::new();
        monitor.enter();
        monitor.enter();
        assert!(monitor.owned_by_current_thread());
        monitor.exit().unwrap();
        assert!(monitor.is_locked());
        monitor.exit().unwrap();
        assert!(!monitor.is_locked());
    }

    #[test]
    fn exit_without_ownership_fails() {
        let monitor = Monitor::new();
        assert!(monitor.exit().is_err());
    }

    #[test]
    fn negative_wait_timeout_is_rejected() {
        let monitor = Monitor::new();
        monitor.enter();
        assert!(monitor.wait(-1).is_err());
        monitor.exit().unwrap();
    }

    #[test]
    fn contended_entry_excludes_other_threads() {
        let monitor = Arc::new(Monitor::new());
        let shared = Arc::new(AtomicI32::new(0));

        monitor.enter();
        shared.store(42, Ordering::SeqCst);

        let other = {
            let monitor = monitor.clone();
            let shared = shared.clone();
            thread::spawn(move || {
                monitor.enter();
                shared.store(43, Ordering::SeqCst);
                monitor.exit().unwrap();
            })
        };

        // While held here, the other thread must stay blocked
        thread::sleep(Duration::from_millis(100));
        assert_eq!(shared.load(Ordering::SeqCst), 42);
        shared.store(2, Ordering::SeqCst);
        monitor.exit().unwrap();

        other.join().unwrap();
        assert_eq!(shared.load(Ordering::SeqCst), 43);
    }

    #[test]
    fn wait_wakes_on_notify_all() {
        let monitor = Arc::new(Monitor::new());
        let counter = Arc::new(AtomicI32::new(0));

        let waiter = {
            let monitor = monitor.clone();
            let counter = counter.clone();
            thread::spawn(move || {
                monitor.enter();
                while counter.load(Ordering::SeqCst) != 42 {
                    monitor.wait(0).unwrap();
                }
                let seen = counter.load(Ordering::SeqCst);
                monitor.exit().unwrap();
                seen
            })
        };

        thread::sleep(Duration::from_millis(500));
        monitor.enter();
        counter.store(42, Ordering::SeqCst);
        monitor.notify_all();
        monitor.exit().unwrap();

        assert_eq!(waiter.join().unwrap(), 42);
    }

    #[test]
    fn timed_wait_returns_without_notify() {
        let monitor = Monitor::new();
        monitor.enter();
        let start = std::time::Instant::now();
        monitor.wait(50).unwrap();
        assert!(start.elapsed() >= Duration::from_millis(40));
        monitor.exit().unwrap();
    }
}
