use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use super::queue::{BoundedQueue, QueueError};

/// Shared handle to a registered queue
/// Stays usable after the registry drops its entry
pub type QueueHandle = Rc<RefCell<BoundedQueue>>;

/// Directory of live queues keyed by unique name
/// Not synchronized: hosts sharing it across threads must wrap it themselves
#[derive(Debug, Default)]
pub struct QueueRegistry {
    /// name -> queue, every key equals the queue's own name
    queues: HashMap<String, QueueHandle>,
}

impl QueueRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        QueueRegistry {
            queues: HashMap::new(),
        }
    }

    /// Create an empty queue and register it under its name
    /// Nothing is registered if validation or the uniqueness check fails
    pub fn create(&mut self, name: &str, capacity: usize) -> Result<QueueHandle, QueueError> {
        if self.contains(name) {
            return Err(QueueError::DuplicateName(name.to_string()));
        }

        let queue = BoundedQueue::new(name, capacity)?;
        let handle = self.register(queue)?;
        log::debug!("Queue '{}' created with capacity {}", name, capacity);

        Ok(handle)
    }

    /// Track an already validated queue
    pub(crate) fn register(&mut self, queue: BoundedQueue) -> Result<QueueHandle, QueueError> {
        if self.queues.contains_key(queue.name()) {
            return Err(QueueError::DuplicateName(queue.name().to_string()));
        }

        let name = queue.name().to_string();
        let handle = Rc::new(RefCell::new(queue));
        self.queues.insert(name, Rc::clone(&handle));

        Ok(handle)
    }

    /// Look up a queue by name
    pub fn get(&self, name: &str) -> Option<QueueHandle> {
        self.queues.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.queues.contains_key(name)
    }

    /// All registered names, in no particular order
    pub fn names(&self) -> Vec<String> {
        self.queues.keys().cloned().collect()
    }

    /// All registered names, sorted
    pub fn sorted_names(&self) -> Vec<String> {
        let mut names = self.names();
        names.sort();
        names
    }

    /// Iterate over (name, queue) pairs
    pub fn iter(&self) -> impl Iterator<Item = (&str, &QueueHandle)> {
        self.queues.iter().map(|(name, handle)| (name.as_str(), handle))
    }

    /// Drop every entry
    /// Handles held elsewhere keep working but are no longer tracked
    pub fn clear(&mut self) {
        if !self.queues.is_empty() {
            log::debug!("Cleared {} tracked queues", self.queues.len());
        }
        self.queues.clear();
    }

    pub fn len(&self) -> usize {
        self.queues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queues.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_create_registers_queue() {
        let mut registry = QueueRegistry::new();
        let tasks = registry.create("Tasks", 3).unwrap();

        assert!(registry.contains("Tasks"));
        assert_eq!(registry.len(), 1);

        tasks.borrow_mut().insert(json!("A")).unwrap();
        let found = registry.get("Tasks").unwrap();
        assert_eq!(found.borrow().len(), 1);
        assert!(Rc::ptr_eq(&tasks, &found));
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let mut registry = QueueRegistry::new();
        let first = registry.create("Tasks", 3).unwrap();
        first.borrow_mut().insert(json!("A")).unwrap();

        let err = registry.create("Tasks", 5).unwrap_err();
        assert_eq!(err, QueueError::DuplicateName("Tasks".to_string()));

        let kept = registry.get("Tasks").unwrap();
        assert!(Rc::ptr_eq(&first, &kept));
        assert_eq!(kept.borrow().capacity(), 3);
        assert_eq!(kept.borrow().len(), 1);
    }

    #[test]
    fn test_register_detects_duplicate() {
        let mut registry = QueueRegistry::new();
        registry.register(BoundedQueue::new("q", 1).unwrap()).unwrap();

        let err = registry
            .register(BoundedQueue::new("q", 2).unwrap())
            .unwrap_err();
        assert!(matches!(err, QueueError::DuplicateName(_)));
        assert_eq!(registry.get("q").unwrap().borrow().capacity(), 1);
    }

    #[test]
    fn test_invalid_create_leaves_registry_unchanged() {
        let mut registry = QueueRegistry::new();

        assert!(registry.create("bad", 0).is_err());
        assert!(registry.create("", 2).is_err());
        assert!(registry.is_empty());
        assert!(registry.get("bad").is_none());
    }

    #[test]
    fn test_create_with_max_capacity() {
        let mut registry = QueueRegistry::new();
        let handle = registry.create("q", usize::MAX).unwrap();

        handle.borrow_mut().insert(json!(1)).unwrap();
        assert_eq!(registry.get("q").unwrap().borrow().capacity(), usize::MAX);
    }

    #[test]
    fn test_get_unknown_name() {
        let registry = QueueRegistry::new();
        assert!(registry.get("missing").is_none());
    }

    #[test]
    fn test_list_names() {
        let mut registry = QueueRegistry::new();
        registry.create("b", 1).unwrap();
        registry.create("a", 1).unwrap();

        let names = registry.names();
        assert_eq!(names.len(), 2);
        assert!(names.contains(&"a".to_string()));
        assert!(names.contains(&"b".to_string()));
        assert_eq!(registry.sorted_names(), vec!["a", "b"]);
    }

    #[test]
    fn test_clear_orphans_handles() {
        let mut registry = QueueRegistry::new();
        let handle = registry.create("Tasks", 2).unwrap();
        handle.borrow_mut().insert(json!(1)).unwrap();

        registry.clear();

        assert!(registry.is_empty());
        assert!(registry.get("Tasks").is_none());
        assert_eq!(handle.borrow_mut().pop(), Some(json!(1)));

        // The name is free again once cleared
        registry.create("Tasks", 4).unwrap();
        assert_eq!(registry.get("Tasks").unwrap().borrow().capacity(), 4);
    }
}
