//! Per-node message buffer
//!
//! A byte-bounded, insertion-ordered store. It never evicts on its own: the
//! router makes room before anything is inserted.

use ferry_core::{Message, MessageId};

use crate::types::PeerId;

/// Messages held by one simulated node
#[derive(Debug, Clone)]
pub struct MessageBuffer {
    messages: Vec<Message<PeerId>>,
    capacity: usize,
}

impl MessageBuffer {
    /// Create an empty buffer holding at most `capacity` bytes
    pub fn new(capacity: usize) -> Self {
        Self {
            messages: Vec::new(),
            capacity,
        }
    }

    /// Messages in insertion order
    pub fn messages(&self) -> &[Message<PeerId>] {
        &self.messages
    }

    pub fn get(&self, id: &MessageId) -> Option<&Message<PeerId>> {
        self.messages.iter().find(|m| &m.id == id)
    }

    pub fn contains(&self, id: &MessageId) -> bool {
        self.get(id).is_some()
    }

    /// Store a message, replacing any copy with the same ID
    pub fn insert(&mut self, message: Message<PeerId>) {
        self.messages.retain(|m| m.id != message.id);
        self.messages.push(message);
    }

    pub fn remove(&mut self, id: &MessageId) -> Option<Message<PeerId>> {
        let index = self.messages.iter().position(|m| &m.id == id)?;
        Some(self.messages.remove(index))
    }

    /// Bytes currently accounted to stored messages
    pub fn used(&self) -> usize {
        self.messages.iter().map(|m| m.size).sum()
    }

    pub fn free_space(&self) -> usize {
        self.capacity.saturating_sub(self.used())
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn message(id: &str, size: usize) -> Message<PeerId> {
        let a = PeerId::new('A').unwrap();
        let b = PeerId::new('B').unwrap();
        Message::new(id, a, b, Vec::new(), Utc::now()).with_size(size)
    }

    #[test]
    fn test_space_accounting() {
        let mut buffer = MessageBuffer::new(100);
        buffer.insert(message("m1", 30));
        buffer.insert(message("m2", 50));

        assert_eq!(buffer.used(), 80);
        assert_eq!(buffer.free_space(), 20);

        buffer.remove(&MessageId::new("m1"));
        assert_eq!(buffer.free_space(), 50);
    }

    #[test]
    fn test_insertion_order_kept() {
        let mut buffer = MessageBuffer::new(100);
        for id in ["c", "a", "b"] {
            buffer.insert(message(id, 1));
        }
        let ids: Vec<&str> = buffer.messages().iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
    }

    #[test]
    fn test_reinsert_replaces() {
        let mut buffer = MessageBuffer::new(100);
        buffer.insert(message("m1", 10));
        buffer.insert(message("m1", 20));
        assert_eq!(buffer.len(), 1);
        assert_eq!(buffer.used(), 20);
    }

    #[test]
    fn test_overfull_free_space_saturates() {
        let mut buffer = MessageBuffer::new(10);
        buffer.insert(message("big", 25));
        assert_eq!(buffer.free_space(), 0);
    }
}
