use std::collections::HashMap;
use std::hash::Hash;

use crate::models::{Category, LogRecord};

// ---------------------------------------------------------------------------
// FreqTable: a mergeable counting map
// ---------------------------------------------------------------------------

/// Running frequency table: key -> occurrence count.
///
/// Merging sums counts per key, so tables built from disjoint batches can be
/// combined in any order and any grouping with identical results. Ranked
/// reads sort by descending count and break ties by ascending key, so
/// repeated queries over unchanged state return identical output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FreqTable<K: Eq + Hash> {
    counts: HashMap<K, u64>,
}

impl<K: Eq + Hash> Default for FreqTable<K> {
    fn default() -> Self {
        Self {
            counts: HashMap::new(),
        }
    }
}

impl<K: Eq + Hash + Ord + Clone> FreqTable<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one occurrence of `key`.
    pub fn add(&mut self, key: K) {
        *self.counts.entry(key).or_insert(0) += 1;
    }

    /// Count `n` occurrences of `key`.
    pub fn add_count(&mut self, key: K, n: u64) {
        *self.counts.entry(key).or_insert(0) += n;
    }

    /// Fold another table into this one, summing per-key counts.
    pub fn merge(&mut self, other: FreqTable<K>) {
        for (key, count) in other.counts {
            *self.counts.entry(key).or_insert(0) += count;
        }
    }

    pub fn get(&self, key: &K) -> u64 {
        self.counts.get(key).copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Sum of all counts.
    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, u64)> {
        self.counts.iter().map(|(k, &c)| (k, c))
    }

    /// All entries, highest count first, ties by ascending key.
    pub fn ranked(&self) -> Vec<(K, u64)> {
        let mut entries: Vec<(K, u64)> = self
            .counts
            .iter()
            .map(|(k, &c)| (k.clone(), c))
            .collect();
        entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        entries
    }

    /// The `n` highest-count entries.
    pub fn top_n(&self, n: usize) -> Vec<(K, u64)> {
        let mut entries = self.ranked();
        entries.truncate(n);
        entries
    }
}

// ---------------------------------------------------------------------------
// TrafficCounts: the four parallel tables plus diagnostics
// ---------------------------------------------------------------------------

/// Accumulated state of one ingestion run: the four frequency tables plus
/// record and bad-row counters. Built per batch and folded into the running
/// totals; `merge` is commutative and associative, so batches may be counted
/// on independent workers and reduced in any order.
#[derive(Debug, Clone, Default)]
pub struct TrafficCounts {
    pub src_ips: FreqTable<String>,
    pub dst_ips: FreqTable<String>,
    pub src_ports: FreqTable<String>,
    pub dst_ports: FreqTable<String>,
    pub records: u64,
    pub bad_rows: u64,
}

impl TrafficCounts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count every field the record carries.
    pub fn observe(&mut self, record: &LogRecord) {
        if let Some(ref v) = record.src_ip {
            self.src_ips.add(v.clone());
        }
        if let Some(ref v) = record.dst_ip {
            self.dst_ips.add(v.clone());
        }
        if let Some(ref v) = record.src_port {
            self.src_ports.add(v.clone());
        }
        if let Some(ref v) = record.dst_port {
            self.dst_ports.add(v.clone());
        }
        self.records += 1;
    }

    pub fn note_bad_row(&mut self) {
        self.bad_rows += 1;
    }

    pub fn merge(&mut self, other: TrafficCounts) {
        self.src_ips.merge(other.src_ips);
        self.dst_ips.merge(other.dst_ips);
        self.src_ports.merge(other.src_ports);
        self.dst_ports.merge(other.dst_ports);
        self.records += other.records;
        self.bad_rows += other.bad_rows;
    }

    pub fn table(&self, category: Category) -> &FreqTable<String> {
        match category {
            Category::SrcIp => &self.src_ips,
            Category::DstIp => &self.dst_ips,
            Category::SrcPort => &self.src_ports,
            Category::DstPort => &self.dst_ports,
        }
    }
}
