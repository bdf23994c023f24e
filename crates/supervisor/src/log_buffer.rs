//! Bounded window of captured fork node output.
//!
//! The reader tasks of the supervisor append one entry per output line; HTTP
//! handlers take snapshots. When the buffer is full the oldest line is evicted.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

/// Number of lines kept when no capacity is configured.
pub const DEFAULT_LOG_CAPACITY: usize = 2000;

#[derive(Debug)]
pub struct LogBuffer {
    lines: Mutex<VecDeque<String>>,
    capacity: usize,
}

impl Default for LogBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_CAPACITY)
    }
}

impl LogBuffer {
    /// Creates an empty buffer. A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            lines: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    // A panic while holding the lock cannot leave a half-written line behind,
    // so a poisoned guard is still usable.
    fn lines(&self) -> MutexGuard<'_, VecDeque<String>> {
        match self.lines.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn append(&self, line: impl Into<String>) {
        let mut lines = self.lines();
        if lines.len() == self.capacity {
            lines.pop_front();
        }
        lines.push_back(line.into());
    }

    /// Returns the current window, oldest line first.
    pub fn snapshot(&self) -> Vec<String> {
        self.lines().iter().cloned().collect()
    }

    pub fn last(&self) -> Option<String> {
        self.lines().back().cloned()
    }

    pub fn clear(&self) {
        self.lines().clear();
    }

    pub fn len(&self) -> usize {
        self.lines().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn evicts_oldest_first() {
        let buffer = LogBuffer::new(3);
        for i in 0..5 {
            buffer.append(format!("line {i}"));
        }
        assert_eq!(buffer.snapshot(), vec!["line 2", "line 3", "line 4"]);
        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer.last().as_deref(), Some("line 4"));
    }

    #[test]
    fn zero_capacity_keeps_one_line() {
        let buffer = LogBuffer::new(0);
        buffer.append("a");
        buffer.append("b");
        assert_eq!(buffer.capacity(), 1);
        assert_eq!(buffer.snapshot(), vec!["b"]);
    }

    #[test]
    fn clear_empties_the_window() {
        let buffer = LogBuffer::default();
        buffer.append("Listening on 127.0.0.1:8545");
        buffer.clear();
        assert!(buffer.is_empty());
        assert_eq!(buffer.capacity(), DEFAULT_LOG_CAPACITY);
    }

    #[test]
    fn concurrent_writers_never_exceed_capacity() {
        let buffer = Arc::new(LogBuffer::new(64));
        let writers: Vec<_> = (0..4)
            .map(|writer| {
                let buffer = buffer.clone();
                thread::spawn(move || {
                    for i in 0..500 {
                        buffer.append(format!("{writer}:{i}"));
                        assert!(buffer.len() <= 64);
                    }
                })
            })
            .collect();
        for writer in writers {
            writer.join().unwrap();
        }

        let snapshot = buffer.snapshot();
        assert_eq!(snapshot.len(), 64);
        // Each writer's lines stay in the order that writer produced them.
        for writer in 0..4 {
            let prefix = format!("{writer}:");
            let indices: Vec<u32> = snapshot
                .iter()
                .filter_map(|line| line.strip_prefix(&prefix))
                .map(|i| i.parse().unwrap())
                .collect();
            assert!(indices.windows(2).all(|w| w[0] < w[1]));
        }
    }
}
