//! Repetition detector: bounded history of recent message bodies.

use std::collections::{HashMap, VecDeque};

/// Last N received bodies of one sender, oldest first.
#[derive(Debug, Clone)]
pub struct RecentContent {
    bodies: VecDeque<String>,
    capacity: usize,
}

impl RecentContent {
    pub fn new(capacity: usize) -> Self {
        Self {
            bodies: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Push a body, dropping the oldest once full.
    pub fn push(&mut self, content: &str) {
        if self.bodies.len() == self.capacity {
            self.bodies.pop_front();
        }
        self.bodies.push_back(content.to_string());
    }

    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }

    /// True when the window holds at least `threshold` bodies and one of
    /// them occurs `threshold` times or more.
    pub fn is_repetitive(&self, threshold: usize) -> bool {
        if self.bodies.len() < threshold {
            return false;
        }
        most_frequent(self.bodies.iter().map(String::as_str))
            .is_some_and(|(_, count)| count >= threshold)
    }
}

/// The most frequent body and its count.
///
/// Bodies compare byte-for-byte. Ties go to the body seen first.
pub fn most_frequent<'a, I>(bodies: I) -> Option<(&'a str, usize)>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut counts: HashMap<&'a str, (usize, usize)> = HashMap::new();
    for (position, body) in bodies.into_iter().enumerate() {
        counts.entry(body).or_insert((0, position)).0 += 1;
    }
    counts
        .into_iter()
        .max_by(|(_, (count_a, first_a)), (_, (count_b, first_b))| {
            count_a.cmp(count_b).then(first_b.cmp(first_a))
        })
        .map(|(body, (count, _))| (body, count))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_drops_oldest_when_full() {
        let mut recent = RecentContent::new(3);
        for body in ["a", "b", "c", "d"] {
            recent.push(body);
        }
        assert_eq!(recent.len(), 3);
        assert!(recent.bodies.iter().map(String::as_str).eq(["b", "c", "d"]));
    }

    #[test]
    fn repetition_needs_threshold_copies() {
        let mut recent = RecentContent::new(10);
        recent.push("spam");
        recent.push("spam");
        assert!(!recent.is_repetitive(3));
        recent.push("other");
        assert!(!recent.is_repetitive(3));
        recent.push("spam");
        assert!(recent.is_repetitive(3));
    }

    #[test]
    fn repetition_is_byte_exact() {
        let mut recent = RecentContent::new(10);
        for body in ["Hola", "hola", "hola "] {
            recent.push(body);
        }
        assert!(!recent.is_repetitive(3));
    }

    #[test]
    fn most_frequent_breaks_ties_by_first_seen() {
        let bodies = ["b", "a", "a", "b", "c"];
        assert_eq!(most_frequent(bodies), Some(("b", 2)));
        assert_eq!(most_frequent(std::iter::empty()), None);
    }
}
