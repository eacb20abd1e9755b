//! Bounded best-N store over a stream of scored items.
//!
//! Items are identified by a string key; a key is stored at most once and
//! keeps the best score it was seen with. Once full, a new key enters only
//! by strictly beating the weakest entry. Among equally weak entries the
//! most recently inserted one is evicted, so the first-seen entry holds a
//! contested slot.

use std::cmp::Ordering;
use std::rc::Rc;
use std::sync::Arc;

use rustc_hash::FxHashMap;

use super::hypothesis::Hypothesis;

/// Identity used for deduplication.
pub trait Keyed {
    fn key(&self) -> &str;
}

impl Keyed for Hypothesis {
    fn key(&self) -> &str {
        Hypothesis::key(self)
    }
}

impl Keyed for String {
    fn key(&self) -> &str {
        self
    }
}

impl<T: Keyed + ?Sized> Keyed for Rc<T> {
    fn key(&self) -> &str {
        (**self).key()
    }
}

impl<T: Keyed + ?Sized> Keyed for Arc<T> {
    fn key(&self) -> &str {
        (**self).key()
    }
}

#[derive(Debug)]
struct Slot<T> {
    item: T,
    score: f64,
    seq: u64,
}

/// Keeps the `capacity` best-scoring distinct items observed.
#[derive(Debug)]
pub struct TopN<T> {
    capacity: usize,
    slots: FxHashMap<String, Slot<T>>,
    next_seq: u64,
}

impl<T: Keyed> TopN<T> {
    /// # Panics
    ///
    /// Panics if `capacity` is zero; configuration is validated before any
    /// store is built.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "top-n capacity must be positive");
        Self {
            capacity,
            slots: FxHashMap::default(),
            next_seq: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.slots.contains_key(key)
    }

    /// Score of the entry that would be evicted next.
    pub fn min_score(&self) -> Option<f64> {
        self.weakest().map(|(_, slot)| slot.score)
    }

    /// Offer an item. Returns whether the store changed.
    pub fn observe(&mut self, item: T, score: f64) -> bool {
        if let Some(slot) = self.slots.get_mut(item.key()) {
            if score > slot.score {
                slot.item = item;
                slot.score = score;
                return true;
            }
            return false;
        }

        if self.slots.len() >= self.capacity {
            let evict = match self.weakest() {
                Some((key, slot)) if score > slot.score => key.to_owned(),
                _ => return false,
            };
            self.slots.remove(&evict);
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        self.slots
            .insert(item.key().to_owned(), Slot { item, score, seq });
        true
    }

    /// All retained items, best first. Ties keep insertion order.
    pub fn drain(self) -> Vec<(T, f64)> {
        let mut slots: Vec<Slot<T>> = self.slots.into_values().collect();
        slots.sort_by(|a, b| b.score.total_cmp(&a.score).then(a.seq.cmp(&b.seq)));
        slots.into_iter().map(|s| (s.item, s.score)).collect()
    }

    /// Lowest score; the latest-inserted among equals.
    fn weakest(&self) -> Option<(&String, &Slot<T>)> {
        self.slots.iter().min_by(|(_, a), (_, b)| match a.score.total_cmp(&b.score) {
            Ordering::Equal => b.seq.cmp(&a.seq),
            other => other,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn keys(store: TopN<String>) -> Vec<String> {
        store.drain().into_iter().map(|(k, _)| k).collect()
    }

    #[test]
    fn test_fills_then_evicts_minimum() {
        let mut store = TopN::new(2);
        assert!(store.observe("a".to_string(), -3.0));
        assert!(store.observe("b".to_string(), -1.0));
        assert_eq!(store.min_score(), Some(-3.0));
        assert!(store.observe("c".to_string(), -2.0));
        assert!(!store.contains("a"));
        assert_eq!(keys(store), vec!["b", "c"]);
    }

    #[test]
    fn test_duplicate_keeps_higher_score() {
        let mut store = TopN::new(3);
        store.observe("a".to_string(), -5.0);
        assert!(!store.observe("a".to_string(), -6.0));
        assert!(store.observe("a".to_string(), -4.0));
        assert_eq!(store.len(), 1);
        assert_eq!(store.drain(), vec![("a".to_string(), -4.0)]);
    }

    #[test]
    fn test_equal_score_does_not_evict() {
        let mut store = TopN::new(1);
        store.observe("first".to_string(), -2.0);
        assert!(!store.observe("second".to_string(), -2.0));
        assert_eq!(keys(store), vec!["first"]);
    }

    #[test]
    fn test_ties_evict_latest_inserted() {
        let mut store = TopN::new(3);
        store.observe("a".to_string(), -1.0);
        store.observe("b".to_string(), -1.0);
        store.observe("c".to_string(), 0.0);
        store.observe("d".to_string(), 0.5);
        // a and b tie for weakest; b arrived later and goes.
        assert_eq!(keys(store), vec!["d", "c", "a"]);
    }

    #[test]
    fn test_drain_orders_best_first() {
        let mut store = TopN::new(4);
        for (k, s) in [("w", -4.0), ("x", -1.0), ("y", -3.0), ("z", -2.0)] {
            store.observe(k.to_string(), s);
        }
        assert_eq!(keys(store), vec!["x", "z", "y", "w"]);
    }

    #[test]
    fn test_stream_keeps_best_distinct_keys() {
        let mut rng = StdRng::seed_from_u64(42);
        let n = 5;
        let mut store = TopN::new(n);
        let mut best: FxHashMap<String, f64> = FxHashMap::default();

        for _ in 0..5000 {
            let key = format!("rule{}", rng.gen_range(0..40));
            let score: f64 = -rng.r#gen::<f64>() * 100.0;
            store.observe(key.clone(), score);
            let entry = best.entry(key).or_insert(f64::NEG_INFINITY);
            *entry = entry.max(score);
            assert!(store.len() <= n);
        }

        let mut expected: Vec<(String, f64)> = best.into_iter().collect();
        expected.sort_by(|a, b| b.1.total_cmp(&a.1));
        expected.truncate(n);

        assert_eq!(store.drain(), expected);
    }

    #[test]
    #[should_panic(expected = "capacity must be positive")]
    fn test_zero_capacity_panics() {
        TopN::<String>::new(0);
    }
}
