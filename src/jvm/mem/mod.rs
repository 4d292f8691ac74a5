//! Heap value and object model. A register slot holds a [`Value`]; heap
//! objects are reference counted ([`ObjectRef`]) with the garbage collector
//! owning the authoritative strong set, so sweeping an object that is still
//! referenced from a frame or field never frees live memory.

pub mod array;
pub mod gc;
pub mod monitor;

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicI64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::jvm::error::{Throw, VmError};
pub use array::ArrayObject;
pub use gc::Heap;
pub use monitor::Monitor;

/// Contents of one 32-bit register slot. Long and double values occupy two
/// consecutive slots, low word first.
#[derive(Clone, Debug)]
pub enum Value {
    /// Default slot state: reads as null when treated as an object and as 0
    /// when treated as a number.
    Uninit,
    /// A 32-bit bit pattern; the reading opcode decides whether it is an int,
    /// float, boolean, byte, char or short.
    Word(u32),
    /// Strong reference to a heap object (the null singleton included).
    Ref(ObjectRef),
}

impl Value {
    /// Default for a declared field of the given type descriptor: numeric
    /// fields start at zero, reference fields at null (the uninitialized
    /// state reads as both).
    pub fn default_for(_descriptor: &str) -> Value {
        Value::Uninit
    }

    pub fn as_ref(&self) -> Option<&ObjectRef> {
        match self {
            Value::Ref(obj) => Some(obj),
            _ => None,
        }
    }
}

/// Insertion-ordered field map. Instances carry few fields, so a vector with
/// linear lookup beats hashing and keeps declaration order for free.
#[derive(Default, Debug)]
pub struct FieldTable {
    entries: Vec<(String, Value)>,
}

impl FieldTable {
    pub fn new() -> Self {
        FieldTable::default()
    }

    pub fn insert(&mut self, name: &str, value: Value) {
        for (key, slot) in &mut self.entries {
            if key == name {
                *slot = value;
                return;
            }
        }
        self.entries.push((name.to_string(), value));
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.entries
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.clone())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(key, _)| key == name)
    }

    pub fn values(&self) -> Vec<Value> {
        self.entries.iter().map(|(_, value)| value.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub type ObjectRef = Arc<Object>;

#[derive(Debug)]
pub struct Instance {
    pub class: String,
    pub fields: Mutex<FieldTable>,
}

#[derive(Debug)]
pub struct StrObject {
    pub text: String,
    pub fields: Mutex<FieldTable>,
}

/// An instance of `java.lang.Class` naming another class record.
#[derive(Debug)]
pub struct Mirror {
    pub target: String,
    pub fields: Mutex<FieldTable>,
}

#[derive(Debug)]
pub enum ObjectBody {
    Null,
    /// One 64-bit atomic payload exposing get/set/CAS at both widths.
    Number(AtomicI64),
    Instance(Instance),
    Str(StrObject),
    Mirror(Mirror),
    Array(ArrayObject),
}

/// A heap object: a polymorphic body plus the header every object carries -
/// monitor, GC mark bit and the lazily computed identity hash.
#[derive(Debug)]
pub struct Object {
    mark: AtomicBool,
    hash: AtomicI32,
    monitor: Monitor,
    body: ObjectBody,
}

impl Object {
    pub fn with_body(body: ObjectBody) -> Object {
        Object {
            mark: AtomicBool::new(false),
            hash: AtomicI32::new(0),
            monitor: Monitor::new(),
            body,
        }
    }

    pub fn body(&self) -> &ObjectBody {
        &self.body
    }

    pub fn monitor(&self) -> &Monitor {
        &self.monitor
    }

    pub fn is_null(&self) -> bool {
        matches!(self.body, ObjectBody::Null)
    }

    pub fn is_number(&self) -> bool {
        matches!(self.body, ObjectBody::Number(_))
    }

    pub fn number(&self) -> Option<&AtomicI64> {
        match &self.body {
            ObjectBody::Number(bits) => Some(bits),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&ArrayObject> {
        match &self.body {
            ObjectBody::Array(array) => Some(array),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match &self.body {
            ObjectBody::Str(s) => Some(&s.text),
            _ => None,
        }
    }

    pub fn mirror_target(&self) -> Option<&str> {
        match &self.body {
            ObjectBody::Mirror(mirror) => Some(&mirror.target),
            _ => None,
        }
    }

    /// Name of the class record this object is an instance of, when it has
    /// one. Arrays render as `[` per dimension plus the element class.
    pub fn class_name(&self) -> Option<String> {
        match &self.body {
            ObjectBody::Instance(instance) => Some(instance.class.clone()),
            ObjectBody::Str(_) => Some("java.lang.String".to_string()),
            ObjectBody::Mirror(_) => Some("java.lang.Class".to_string()),
            ObjectBody::Array(array) => Some(array.type_name()),
            ObjectBody::Number(_) | ObjectBody::Null => None,
        }
    }

    fn field_table(&self) -> Option<&Mutex<FieldTable>> {
        match &self.body {
            ObjectBody::Instance(instance) => Some(&instance.fields),
            ObjectBody::Str(s) => Some(&s.fields),
            ObjectBody::Mirror(mirror) => Some(&mirror.fields),
            _ => None,
        }
    }

    /// Read a named field. Instances are created field-complete, so a missing
    /// field is a VM error, not a program exception. Blocks while another
    /// thread owns this object's monitor.
    pub fn get_field(&self, name: &str) -> Result<Value, Throw> {
        self.monitor.check();
        let table = self.field_table().ok_or_else(|| {
            Throw::Fatal(VmError::TypeMismatch(format!(
                "field {} read on a non-instance object",
                name
            )))
        })?;
        table.lock().get(name).ok_or_else(|| {
            Throw::Fatal(VmError::FieldNotFound(format!(
                "{} in {}",
                name,
                self.class_name().unwrap_or_default()
            )))
        })
    }

    /// Write a named field, implicitly adding it when not declared (used
    /// sparingly by the synthetic runtime library).
    pub fn set_field(&self, name: &str, value: Value) -> Result<(), Throw> {
        self.monitor.check();
        let table = self.field_table().ok_or_else(|| {
            Throw::Fatal(VmError::TypeMismatch(format!(
                "field {} written on a non-instance object",
                name
            )))
        })?;
        table.lock().insert(name, value);
        Ok(())
    }

    /// Identity hash derived from the object address on first request and
    /// cached; objects are pinned (never moved), so the value stays stable.
    pub fn identity_hash(self: &Arc<Self>) -> i32 {
        let cached = self.hash.load(Ordering::Relaxed);
        if cached != 0 {
            return cached;
        }

        let mut hasher = DefaultHasher::new();
        (Arc::as_ptr(self) as usize).hash(&mut hasher);
        let mut hash = hasher.finish() as i32;
        if hash == 0 {
            hash = 1;
        }

        match self
            .hash
            .compare_exchange(0, hash, Ordering::Relaxed, Ordering::Relaxed)
        {
            Ok(_) => hash,
            Err(raced) => raced,
        }
    }

    pub fn is_marked(&self) -> bool {
        self.mark.load(Ordering::Acquire)
    }

    /// Set the mark bit; returns false when it was already set.
    pub fn set_marked(&self) -> bool {
        !self.mark.swap(true, Ordering::AcqRel)
    }

    pub fn clear_mark(&self) {
        self.mark.store(false, Ordering::Release);
    }

    /// Push every object directly reachable from this one, used by the GC
    /// trace step.
    pub fn children(&self, out: &mut Vec<ObjectRef>) {
        let collect = |table: &Mutex<FieldTable>, out: &mut Vec<ObjectRef>| {
            for value in table.lock().values() {
                if let Value::Ref(obj) = value {
                    out.push(obj);
                }
            }
        };

        match &self.body {
            ObjectBody::Instance(instance) => collect(&instance.fields, out),
            ObjectBody::Str(s) => collect(&s.fields, out),
            ObjectBody::Mirror(mirror) => collect(&mirror.fields, out),
            ObjectBody::Array(array) => {
                for value in array.values() {
                    if let Value::Ref(obj) = value {
                        out.push(obj);
                    }
                }
            }
            ObjectBody::Number(_) | ObjectBody::Null => {}
        }
    }
}

/// Reference equality as used by `if-eq`/`if-ne` and `Object.equals` default:
/// same referent, both numbers with the same 64-bit payload, both strings
/// with the same text, or both null.
pub fn object_eq(a: &ObjectRef, b: &ObjectRef) -> bool {
    if Arc::ptr_eq(a, b) {
        return true;
    }

    match (a.body(), b.body()) {
        (ObjectBody::Null, ObjectBody::Null) => true,
        (ObjectBody::Number(x), ObjectBody::Number(y)) => {
            x.load(Ordering::SeqCst) == y.load(Ordering::SeqCst)
        }
        (ObjectBody::Str(x), ObjectBody::Str(y)) => x.text == y.text,
        _ => false,
    }
}

/// Equality across register slots of possibly mixed representation. A raw
/// word compares equal to a boxed number with the same low 32 bits and to
/// null/uninitialized when it is zero.
pub fn value_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Uninit, Value::Uninit) => true,
        (Value::Word(x), Value::Word(y)) => x == y,
        (Value::Ref(x), Value::Ref(y)) => object_eq(x, y),
        (Value::Uninit, Value::Word(w)) | (Value::Word(w), Value::Uninit) => *w == 0,
        (Value::Uninit, Value::Ref(obj)) | (Value::Ref(obj), Value::Uninit) => obj.is_null(),
        (Value::Word(w), Value::Ref(obj)) | (Value::Ref(obj), Value::Word(w)) => match obj.body() {
            ObjectBody::Null => *w == 0,
            ObjectBody::Number(bits) => bits.load(Ordering::SeqCst) as i32 == *w as i32,
            _ => false,
        },
    }
}

/// Read a value as a 32-bit int word.
pub fn value_as_int(value: &Value) -> Result<i32, Throw> {
    match value {
        Value::Uninit => Ok(0),
        Value::Word(w) => Ok(*w as i32),
        Value::Ref(obj) => match obj.body() {
            ObjectBody::Null => Ok(0),
            ObjectBody::Number(bits) => Ok(bits.load(Ordering::SeqCst) as i32),
            _ => Err(Throw::Fatal(VmError::TypeMismatch(
                "register does not hold an int word".to_string(),
            ))),
        },
    }
}

/// Read a value as the low or high word of a 64-bit quantity.
pub fn value_as_word(value: &Value) -> Result<u32, Throw> {
    value_as_int(value).map(|v| v as u32)
}

/// Read a value as a 64-bit quantity; boxed numbers carry their full
/// payload, bare words sign-extend.
pub fn value_as_long(value: &Value) -> Result<i64, Throw> {
    match value {
        Value::Uninit => Ok(0),
        Value::Word(w) => Ok(*w as i32 as i64),
        Value::Ref(obj) => match obj.body() {
            ObjectBody::Null => Ok(0),
            ObjectBody::Number(bits) => Ok(bits.load(Ordering::SeqCst)),
            _ => Err(Throw::Fatal(VmError::TypeMismatch(
                "value does not hold a 64-bit quantity".to_string(),
            ))),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_table_preserves_insertion_order() {
        let mut table = FieldTable::new();
        table.insert("b", Value::Word(1));
        table.insert("a", Value::Word(2));
        table.insert("c", Value::Word(3));
        table.insert("a", Value::Word(9));

        let order: Vec<&str> = table.entries.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(order, vec!["b", "a", "c"]);
        assert!(matches!(table.get("a"), Some(Value::Word(9))));
    }

    #[test]
    fn number_equality_is_by_payload() {
        let a = Arc::new(Object::with_body(ObjectBody::Number(AtomicI64::new(42))));
        let b = Arc::new(Object::with_body(ObjectBody::Number(AtomicI64::new(42))));
        let c = Arc::new(Object::with_body(ObjectBody::Number(AtomicI64::new(7))));
        assert!(object_eq(&a, &b));
        assert!(!object_eq(&a, &c));
    }

    #[test]
    fn null_equals_null() {
        let a = Arc::new(Object::with_body(ObjectBody::Null));
        let b = Arc::new(Object::with_body(ObjectBody::Null));
        assert!(object_eq(&a, &b));
        assert!(value_eq(&Value::Ref(a), &Value::Ref(b)));
    }

    #[test]
    fn null_never_equals_non_null() {
        let null = Arc::new(Object::with_body(ObjectBody::Null));
        let num = Arc::new(Object::with_body(ObjectBody::Number(AtomicI64::new(1))));
        assert!(!object_eq(&null, &num));
        assert!(value_eq(&Value::Ref(null), &Value::Word(0)));
    }

    #[test]
    fn identity_hash_is_stable() {
        let obj = Arc::new(Object::with_body(ObjectBody::Number(AtomicI64::new(5))));
        let first = obj.identity_hash();
        assert_ne!(first, 0);
        assert_eq!(first, obj.identity_hash());
    }

    #[test]
    fn atomic_number_compare_and_set() {
        let obj = Object::with_body(ObjectBody::Number(AtomicI64::new(10)));
        let bits = obj.number().unwrap();
        assert!(bits
            .compare_exchange(10, 20, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok());
        assert_eq!(bits.load(Ordering::SeqCst), 20);
        assert!(bits
            .compare_exchange(10, 30, Ordering::SeqCst, Ordering::SeqCst)
            .is_err());
        assert_eq!(bits.load(Ordering::SeqCst), 20);
    }
}
