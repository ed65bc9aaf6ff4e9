//! Navigation history abstraction

use super::NavigableAddress;

/// The host's history stack (a browser history, or an in-memory stand-in)
pub trait NavigationHistory: Send + Sync {
    /// Address of the current entry
    fn current(&self) -> NavigableAddress;

    /// Push a new entry after the current one. Forward entries are discarded.
    fn push(&mut self, address: NavigableAddress);

    /// Number of entries in the stack
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-memory history with back/forward traversal
#[derive(Debug, Clone)]
pub struct MemoryHistory {
    entries: Vec<NavigableAddress>,
    cursor: usize,
}

impl MemoryHistory {
    /// Start with a single entry
    pub fn new(initial: NavigableAddress) -> Self {
        Self {
            entries: vec![initial],
            cursor: 0,
        }
    }

    /// Step back one entry, returning the new current address
    pub fn back(&mut self) -> Option<NavigableAddress> {
        if self.cursor == 0 {
            return None;
        }
        self.cursor -= 1;
        Some(self.entries[self.cursor].clone())
    }

    /// Step forward one entry, returning the new current address
    pub fn forward(&mut self) -> Option<NavigableAddress> {
        if self.cursor + 1 >= self.entries.len() {
            return None;
        }
        self.cursor += 1;
        Some(self.entries[self.cursor].clone())
    }

    pub fn entries(&self) -> &[NavigableAddress] {
        &self.entries
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }
}

impl Default for MemoryHistory {
    fn default() -> Self {
        Self::new(NavigableAddress::root())
    }
}

impl NavigationHistory for MemoryHistory {
    fn current(&self) -> NavigableAddress {
        self.entries[self.cursor].clone()
    }

    fn push(&mut self, address: NavigableAddress) {
        self.entries.truncate(self.cursor + 1);
        self.entries.push(address);
        self.cursor = self.entries.len() - 1;
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_discards_forward_entries() {
        let mut history = MemoryHistory::default();
        history.push(NavigableAddress::parse("/provider/1"));
        history.push(NavigableAddress::parse("/provider/2"));

        assert_eq!(history.back(), Some(NavigableAddress::parse("/provider/1")));
        history.push(NavigableAddress::parse("/procedure/A"));

        assert_eq!(history.len(), 3);
        assert_eq!(history.forward(), None);
        assert_eq!(history.current(), NavigableAddress::parse("/procedure/A"));
    }

    #[test]
    fn test_back_stops_at_first_entry() {
        let mut history = MemoryHistory::default();
        assert_eq!(history.back(), None);
        assert_eq!(history.current(), NavigableAddress::root());
    }
}
