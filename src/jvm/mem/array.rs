//! Array objects. A multi-dimensional array owns one contiguous backing
//! store; sub-arrays are views over the same store with an offset and a
//! shorter dimension vector, so writes through a view are visible through the
//! parent.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::jvm::error::{array_bounds, Throw};
use crate::jvm::mem::Value;

#[derive(Debug)]
pub struct ArrayObject {
    element: String,
    dimensions: Vec<u32>,
    store: Arc<Mutex<Vec<Value>>>,
    offset: usize,
    length: usize,
}

impl ArrayObject {
    pub fn new(element: &str, dimensions: Vec<u32>) -> ArrayObject {
        let total: usize = dimensions.iter().map(|d| *d as usize).product();
        ArrayObject {
            element: element.to_string(),
            dimensions,
            store: Arc::new(Mutex::new(vec![Value::Uninit; total])),
            offset: 0,
            length: total,
        }
    }

    pub fn element_type(&self) -> &str {
        &self.element
    }

    pub fn dimensions(&self) -> &[u32] {
        &self.dimensions
    }

    /// Length along the first dimension, as reported by `array-length`.
    pub fn length(&self) -> u32 {
        self.dimensions.first().copied().unwrap_or(0)
    }

    /// Canonical type name: one `[` per dimension plus the element class.
    pub fn type_name(&self) -> String {
        format!("{}{}", "[".repeat(self.dimensions.len()), self.element)
    }

    fn flat_index(&self, index: i32) -> Result<usize, Throw> {
        if index < 0 || index as u32 >= self.length() {
            return Err(array_bounds(index, self.length()));
        }

        // Elements of a nested array are themselves spans of the store
        let stride: usize = self.dimensions[1..].iter().map(|d| *d as usize).product();
        Ok(self.offset + index as usize * stride)
    }

    pub fn get(&self, index: i32) -> Result<Value, Throw> {
        let at = self.flat_index(index)?;
        Ok(self.store.lock()[at].clone())
    }

    pub fn set(&self, index: i32, value: Value) -> Result<(), Throw> {
        let at = self.flat_index(index)?;
        self.store.lock()[at] = value;
        Ok(())
    }

    /// A view of row `index`, sharing this array's backing store. Only valid
    /// on arrays of more than one dimension.
    pub fn view(&self, index: i32) -> Result<ArrayObject, Throw> {
        if self.dimensions.len() < 2 {
            return Err(Throw::Fatal(crate::jvm::error::VmError::TypeMismatch(
                "sub-array view of a one-dimensional array".to_string(),
            )));
        }
        let at = self.flat_index(index)?;
        let dimensions = self.dimensions[1..].to_vec();
        let length: usize = dimensions.iter().map(|d| *d as usize).product();
        Ok(ArrayObject {
            element: self.element.clone(),
            dimensions,
            store: self.store.clone(),
            offset: at,
            length,
        })
    }

    /// Snapshot of the elements this array (or view) spans.
    pub fn values(&self) -> Vec<Value> {
        let store = self.store.lock();
        store[self.offset..self.offset + self.length].to_vec()
    }

    /// Total element count of the span (product of all dimensions).
    pub fn capacity(&self) -> usize {
        self.length
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jvm::mem::value_as_int;

    #[test]
    fn rejects_out_of_bounds_and_negative_indices() {
        let array = ArrayObject::new("int", vec![3]);
        assert!(array.get(-1).is_err());
        assert!(array.get(3).is_err());
        assert!(array.set(3, Value::Word(1)).is_err());
        assert!(array.get(2).is_ok());
    }

    #[test]
    fn views_share_the_backing_store() {
        let array = ArrayObject::new("int", vec![3, 3]);
        assert_eq!(array.length(), 3);
        assert_eq!(array.capacity(), 9);

        for i in 0..3 {
            for j in 0..3 {
                let row = array.view(i).unwrap();
                // untouched cells read as zero/null
                assert_eq!(value_as_int(&row.get(j).unwrap()).unwrap(), 0);
                row.set(j, Value::Word((i * 3 + j + 1) as u32)).unwrap();
            }
        }

        // mutate through views, observe through fresh views of the parent
        for i in 0..3 {
            let row = array.view(i).unwrap();
            assert_eq!(row.length(), 3);
            for j in 0..3 {
                let seen = value_as_int(&row.get(j).unwrap()).unwrap();
                assert_eq!(seen, i * 3 + j + 1);
                row.set(j, Value::Word((seen + 0x10) as u32)).unwrap();
            }
        }

        for i in 0..3 {
            let row = array.view(i).unwrap();
            for j in 0..3 {
                assert_eq!(
                    value_as_int(&row.get(j).unwrap()).unwrap(),
                    i * 3 + j + 0x11
                );
            }
        }
    }
}
