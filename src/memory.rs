//! Bounded conversation memory for the chat pipeline.
//!
//! A strict FIFO window over role/content turns: appending past capacity
//! evicts the oldest turn by insertion order. Each conversation owns its
//! own `ConversationMemory` — the caller (HTTP session map, CLI one-shot)
//! decides its lifetime and passes it into the chat pipeline explicitly.

use std::collections::VecDeque;

use crate::models::{ConversationTurn, Role};

/// Default window size in turns.
pub const DEFAULT_CAPACITY: usize = 50;

/// Append-only sliding window of conversation turns.
#[derive(Debug, Clone)]
pub struct ConversationMemory {
    capacity: usize,
    turns: VecDeque<ConversationTurn>,
}

impl ConversationMemory {
    /// Create a memory holding at most `capacity` turns. A zero capacity
    /// is clamped to one so an append is never a silent no-op.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            turns: VecDeque::new(),
        }
    }

    /// Append a turn, evicting the oldest when the window is full.
    pub fn append(&mut self, role: Role, content: impl Into<String>) {
        if self.turns.len() == self.capacity {
            self.turns.pop_front();
        }
        self.turns.push_back(ConversationTurn {
            role,
            content: content.into(),
        });
    }

    /// Turns in insertion order, oldest first.
    pub fn turns(&self) -> impl Iterator<Item = &ConversationTurn> {
        self.turns.iter()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for ConversationMemory {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_and_order() {
        let mut mem = ConversationMemory::new(10);
        mem.append(Role::User, "first");
        mem.append(Role::Assistant, "second");
        let contents: Vec<&str> = mem.turns().map(|t| t.content.as_str()).collect();
        assert_eq!(contents, vec!["first", "second"]);
        assert_eq!(mem.turns().next().unwrap().role, Role::User);
    }

    #[test]
    fn test_never_exceeds_capacity() {
        let mut mem = ConversationMemory::default();
        for i in 0..120 {
            mem.append(Role::User, format!("turn {}", i));
        }
        assert_eq!(mem.len(), DEFAULT_CAPACITY);
    }

    #[test]
    fn test_fifo_eviction_at_boundary() {
        let mut mem = ConversationMemory::new(DEFAULT_CAPACITY);
        for i in 0..DEFAULT_CAPACITY {
            mem.append(Role::User, format!("turn {}", i));
        }
        assert_eq!(mem.len(), DEFAULT_CAPACITY);

        // The 51st append evicts exactly the 1st turn; the 2nd becomes oldest.
        mem.append(Role::User, "turn 50");
        assert_eq!(mem.len(), DEFAULT_CAPACITY);
        let contents: Vec<&str> = mem.turns().map(|t| t.content.as_str()).collect();
        assert!(!contents.contains(&"turn 0"));
        assert_eq!(contents.first(), Some(&"turn 1"));
        assert_eq!(contents.last(), Some(&"turn 50"));
    }

    #[test]
    fn test_zero_capacity_clamped() {
        let mut mem = ConversationMemory::new(0);
        mem.append(Role::User, "only");
        assert_eq!(mem.len(), 1);
    }
}
