//! Insertion-ordered counting with first-seen tie breaking

use indexmap::IndexMap;

/// Counts keys while remembering the order they first appeared in
#[derive(Debug, Clone, Default)]
pub struct Tally {
    counts: IndexMap<String, u64>,
}

impl Tally {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, key: &str) {
        match self.counts.get_mut(key) {
            Some(count) => *count += 1,
            None => {
                self.counts.insert(key.to_string(), 1);
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn get(&self, key: &str) -> u64 {
        self.counts.get(key).copied().unwrap_or(0)
    }

    /// Key with the highest count; the earliest inserted key wins ties
    pub fn leader(&self) -> Option<&str> {
        let mut best: Option<(&String, u64)> = None;
        for (key, count) in &self.counts {
            if best.map_or(true, |(_, top)| *count > top) {
                best = Some((key, *count));
            }
        }
        best.map(|(key, _)| key.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leader_prefers_highest_count() {
        let mut tally = Tally::new();
        for key in ["a", "b", "b", "c", "b", "a"] {
            tally.add(key);
        }
        assert_eq!(tally.leader(), Some("b"));
        assert_eq!(tally.get("a"), 2);
        assert_eq!(tally.get("z"), 0);
    }

    #[test]
    fn test_leader_ties_go_to_first_seen() {
        let mut tally = Tally::new();
        for key in ["x", "y", "y", "x"] {
            tally.add(key);
        }
        assert_eq!(tally.leader(), Some("x"));
    }

    #[test]
    fn test_empty_tally_has_no_leader() {
        let tally = Tally::new();
        assert!(tally.is_empty());
        assert_eq!(tally.leader(), None);
    }

    #[test]
    fn test_first_seen_wins_among_many_keys() {
        let mut tally = Tally::new();
        for i in (0..100).rev() {
            tally.add(&format!("k{i}"));
        }
        tally.add("k42");
        tally.add("k7");
        // Both have two hits; k42 was inserted first
        assert_eq!(tally.leader(), Some("k42"));
    }
}
