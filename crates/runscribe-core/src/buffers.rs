use std::collections::VecDeque;

/// Number of log lines kept for display.
pub const LOG_RING_CAPACITY: usize = 500;

/// Growing assistant answer for one run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Answer {
    text: String,
}

impl Answer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a fragment in call order.
    pub fn append(&mut self, fragment: &str) {
        self.text.push_str(fragment);
    }

    pub fn value(&self) -> &str {
        &self.text
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn into_string(self) -> String {
        self.text
    }
}

/// Last-N buffer of rendered log lines; the oldest line is evicted first.
#[derive(Clone, Debug)]
pub struct LogRing {
    lines: VecDeque<String>,
    capacity: usize,
}

impl Default for LogRing {
    fn default() -> Self {
        Self::new()
    }
}

impl LogRing {
    pub fn new() -> Self {
        Self::with_capacity(LOG_RING_CAPACITY)
    }

    /// A ring holding at most `capacity` lines (at least one).
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            lines: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, line: impl Into<String>) {
        self.lines.push_back(line.into());
        while self.lines.len() > self.capacity {
            self.lines.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Lines oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(String::as_str)
    }

    /// Lines oldest to newest, joined with newlines for display.
    pub fn snapshot(&self) -> String {
        self.iter().collect::<Vec<_>>().join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn answer_concatenates_in_order() {
        let mut answer = Answer::new();
        for fragment in ["Hel", "lo", "", " world"] {
            answer.append(fragment);
        }
        assert_eq!(answer.value(), "Hello world");
    }

    #[test]
    fn ring_evicts_oldest_after_capacity() {
        let mut ring = LogRing::new();
        for i in 1..=501 {
            ring.push(format!("line {i}"));
        }
        assert_eq!(ring.len(), LOG_RING_CAPACITY);
        assert!(!ring.iter().any(|l| l == "line 1"));
        assert_eq!(ring.iter().next(), Some("line 2"));
        assert_eq!(ring.iter().last(), Some("line 501"));
    }

    #[test]
    fn ring_never_exceeds_capacity_under_volume() {
        let mut ring = LogRing::with_capacity(3);
        for i in 0..10_000 {
            ring.push(i.to_string());
            assert!(ring.len() <= 3);
        }
        assert_eq!(ring.snapshot(), "9997\n9998\n9999");
    }

    #[test]
    fn empty_ring_snapshot_is_empty() {
        assert_eq!(LogRing::new().snapshot(), "");
    }
}
