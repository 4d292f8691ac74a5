//! Handle table translating object references into opaque integer tokens for
//! native code. The token is the raw object address; the table keeps a strong
//! reference for the token's lifetime so the GC treats handles as roots.

use std::sync::Arc;

use hashbrown::HashMap;
use parking_lot::Mutex;

use crate::jvm::mem::ObjectRef;

#[derive(Default)]
pub struct HandleTable {
    locals: Mutex<HashMap<usize, ObjectRef>>,
    globals: Mutex<HashMap<usize, ObjectRef>>,
}

impl HandleTable {
    pub fn new() -> HandleTable {
        HandleTable::default()
    }

    /// Insert a local handle for the duration of a native call and return
    /// its token.
    pub fn to_token(&self, obj: &ObjectRef) -> usize {
        let token = Arc::as_ptr(obj) as usize;
        self.locals.lock().insert(token, obj.clone());
        token
    }

    /// Translate a token produced by native code back to the object.
    pub fn resolve(&self, token: usize) -> Option<ObjectRef> {
        if token == 0 {
            return None;
        }
        if let Some(obj) = self.locals.lock().get(&token) {
            return Some(obj.clone());
        }
        self.globals.lock().get(&token).cloned()
    }

    /// Promote a local handle to a long-lived global one.
    pub fn promote(&self, token: usize) -> Option<usize> {
        let obj = self.resolve(token)?;
        self.globals.lock().insert(token, obj);
        Some(token)
    }

    /// Delete a handle from whichever table holds it.
    pub fn remove(&self, token: usize) {
        self.locals.lock().remove(&token);
        self.globals.lock().remove(&token);
    }

    /// Drop the given local handles; called when a native frame returns.
    /// Promoted handles survive in the global table.
    pub fn release_locals(&self, tokens: &[usize]) {
        let mut locals = self.locals.lock();
        for token in tokens {
            locals.remove(token);
        }
    }

    pub fn local_count(&self) -> usize {
        self.locals.lock().len()
    }

    pub fn global_count(&self) -> usize {
        self.globals.lock().len()
    }

    /// Every handle currently held, for the GC root set.
    pub fn roots(&self, out: &mut Vec<ObjectRef>) {
        out.extend(self.locals.lock().values().cloned());
        out.extend(self.globals.lock().values().cloned());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jvm::mem::{Object, ObjectBody};
    use std::sync::atomic::AtomicI64;

    fn number(bits: i64) -> ObjectRef {
        Arc::new(Object::with_body(ObjectBody::Number(AtomicI64::new(bits))))
    }

    #[test]
    fn tokens_round_trip() {
        let table = HandleTable::new();
        let obj = number(5);
        let token = table.to_token(&obj);
        assert_ne!(token, 0);
        assert!(Arc::ptr_eq(&table.resolve(token).unwrap(), &obj));
        assert_eq!(table.resolve(0xdead_beef), None);
        assert_eq!(table.resolve(0), None);
    }

    #[test]
    fn release_keeps_promoted_handles() {
        let table = HandleTable::new();
        let kept = number(1);
        let dropped = number(2);
        let kept_token = table.to_token(&kept);
        let dropped_token = table.to_token(&dropped);

        table.promote(kept_token).unwrap();
        table.release_locals(&[kept_token, dropped_token]);

        assert!(table.resolve(kept_token).is_some());
        assert!(table.resolve(dropped_token).is_none());
        assert_eq!(table.global_count(), 1);

        table.remove(kept_token);
        assert!(table.resolve(kept_token).is_none());
    }
}
