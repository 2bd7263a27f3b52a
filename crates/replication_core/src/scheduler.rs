//! Per-tick task registrations keyed by object.
//!
//! Objects with per-frame behaviour register when created and are cancelled
//! when destroyed. Each tick visits them in registration order.

use crate::types::ObjectId;
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Default)]
pub struct TaskScheduler {
    order: BTreeMap<u64, ObjectId>,
    by_object: HashMap<ObjectId, u64>,
    next_seq: u64,
}

impl TaskScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an object. Registering twice keeps the original position.
    pub fn register(&mut self, object: ObjectId) -> bool {
        if self.by_object.contains_key(&object) {
            return false;
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        self.order.insert(seq, object);
        self.by_object.insert(object, seq);
        true
    }

    pub fn cancel(&mut self, object: ObjectId) -> bool {
        match self.by_object.remove(&object) {
            Some(seq) => {
                self.order.remove(&seq);
                true
            }
            None => false,
        }
    }

    pub fn is_registered(&self, object: ObjectId) -> bool {
        self.by_object.contains_key(&object)
    }

    /// Registered objects in registration order.
    pub fn scheduled(&self) -> Vec<ObjectId> {
        self.order.values().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
