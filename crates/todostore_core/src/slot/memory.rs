//! In-process slot provider.

use super::{ensure_valid_key, SlotProvider, SlotResult};
use std::cell::RefCell;
use std::collections::HashMap;

/// Slot provider backed by a `HashMap`; lives as long as the value does.
///
/// Share one instance between stores through `&MemorySlots` or
/// `Rc<MemorySlots>` to model several stores on the same backing storage.
#[derive(Debug, Default)]
pub struct MemorySlots {
    entries: RefCell<HashMap<String, String>>,
}

impl MemorySlots {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns whether a key currently exists (regardless of its value).
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.borrow().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

impl SlotProvider for MemorySlots {
    fn read(&self, key: &str) -> SlotResult<Option<String>> {
        ensure_valid_key(key)?;
        Ok(self.entries.borrow().get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> SlotResult<()> {
        ensure_valid_key(key)?;
        self.entries
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> SlotResult<()> {
        ensure_valid_key(key)?;
        self.entries.borrow_mut().remove(key);
        Ok(())
    }
}
