//! Occurrence-count histograms.

use std::collections::BTreeMap;
use std::fmt;

/// Mapping from a category to the number of times it occurred.
///
/// Keys are kept ordered so that merged histograms render and compare the
/// same way regardless of the order in which they were combined.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Histogram<K: Ord> {
    counts: BTreeMap<K, u64>,
}

impl<K: Ord> Default for Histogram<K> {
    fn default() -> Self {
        Self {
            counts: BTreeMap::new(),
        }
    }
}

impl<K: Ord> Histogram<K> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts one occurrence of `key`.
    pub fn put(&mut self, key: K) {
        self.put_n(key, 1);
    }

    /// Counts `n` occurrences of `key`.
    pub fn put_n(&mut self, key: K, n: u64) {
        if n == 0 {
            return;
        }
        *self.counts.entry(key).or_insert(0) += n;
    }

    /// Occurrences of `key`; 0 when never seen.
    #[must_use]
    pub fn get(&self, key: &K) -> u64 {
        self.counts.get(key).copied().unwrap_or(0)
    }

    /// Sum over every key.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    /// Number of distinct keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, u64)> {
        self.counts.iter().map(|(k, v)| (k, *v))
    }
}

impl<K: Ord + Clone> Histogram<K> {
    /// Adds every count of `other` into `self`.
    pub fn merge(&mut self, other: &Histogram<K>) {
        for (key, count) in &other.counts {
            self.put_n(key.clone(), *count);
        }
    }
}

impl<K: Ord> FromIterator<K> for Histogram<K> {
    fn from_iter<I: IntoIterator<Item = K>>(iter: I) -> Self {
        let mut histogram = Self::new();
        for key in iter {
            histogram.put(key);
        }
        histogram
    }
}

impl<K: Ord + fmt::Display> fmt::Display for Histogram<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.counts.is_empty() {
            return writeln!(f, "<EMPTY>");
        }
        let labels: Vec<String> = self.counts.keys().map(ToString::to_string).collect();
        let width = labels.iter().map(String::len).max().unwrap_or(0);
        for (label, count) in labels.iter().zip(self.counts.values()) {
            writeln!(f, "{label:<width$} [{count:>8}]")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_and_total() {
        let mut histogram = Histogram::new();
        histogram.put("a");
        histogram.put("b");
        histogram.put_n("a", 3);
        histogram.put_n("c", 0);

        assert_eq!(histogram.get(&"a"), 4);
        assert_eq!(histogram.get(&"c"), 0);
        assert_eq!(histogram.len(), 2);
        assert_eq!(histogram.total(), 5);
    }

    #[test]
    fn test_display() {
        let histogram: Histogram<&str> = ["Payment", "NewOrder", "Payment"].into_iter().collect();
        let rendered = histogram.to_string();
        assert_eq!(rendered, "NewOrder [       1]\nPayment  [       2]\n");
        assert_eq!(Histogram::<u32>::new().to_string(), "<EMPTY>\n");
    }
}
