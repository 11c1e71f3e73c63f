use serde_json::Value;
use std::collections::{VecDeque, vec_deque};
use std::fmt;

/// Queue construction and mutation errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Queue name must be unique: '{0}' already exists")]
    DuplicateName(String),

    #[error("Queue '{name}' is full (capacity {capacity})")]
    QueueFull { name: String, capacity: usize },
}

/// A named FIFO queue with a fixed maximum capacity
/// Items are opaque JSON values, front = oldest
#[derive(Debug, Clone, PartialEq)]
pub struct BoundedQueue {
    /// Unique name within a registry
    name: String,
    /// Maximum number of items accepted by insert
    capacity: usize,
    /// Items in FIFO order
    items: VecDeque<Value>,
}

impl BoundedQueue {
    /// Validate arguments and allocate an empty queue
    /// Does not register the queue anywhere; see `QueueRegistry::create`
    pub fn new(name: impl Into<String>, capacity: usize) -> Result<Self, QueueError> {
        let name = name.into();

        if capacity == 0 {
            return Err(QueueError::InvalidArgument(
                "capacity must be a positive integer".to_string(),
            ));
        }
        if name.is_empty() {
            return Err(QueueError::InvalidArgument(
                "name must be a non-empty string".to_string(),
            ));
        }

        Ok(BoundedQueue {
            name,
            capacity,
            items: VecDeque::new(),
        })
    }

    /// Append a value at the back
    /// Fails without modifying the queue when it is already full
    pub fn insert(&mut self, value: Value) -> Result<(), QueueError> {
        if self.is_full() {
            return Err(QueueError::QueueFull {
                name: self.name.clone(),
                capacity: self.capacity,
            });
        }

        log::debug!("Item {} inserted into queue '{}'", value, self.name);
        self.items.push_back(value);
        Ok(())
    }

    /// Remove and return the front value
    /// An empty queue yields None and a warning, never an error
    pub fn pop(&mut self) -> Option<Value> {
        let value = self.items.pop_front();
        if value.is_none() {
            log::warn!("Cannot pop from empty queue '{}'", self.name);
        }
        value
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Check if no further insert is accepted
    /// A loaded queue holding more items than its capacity also counts as full
    pub fn is_full(&self) -> bool {
        self.items.len() >= self.capacity
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Iterate over items front to back without removing them
    pub fn items(&self) -> vec_deque::Iter<'_, Value> {
        self.items.iter()
    }

    /// Replace the item sequence with persisted data
    /// The item count is trusted and not checked against capacity
    pub(crate) fn replace_items(&mut self, items: Vec<Value>) {
        self.items = VecDeque::from(items);
    }
}

impl fmt::Display for BoundedQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "BoundedQueue(name='{}', capacity={}, items=[",
            self.name, self.capacity
        )?;
        for (i, item) in self.items.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", item)?;
        }
        write!(f, "])")
    }
}
