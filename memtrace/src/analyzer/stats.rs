// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use serde::Serialize;
use std::collections::BTreeMap;

/// Counts per time bucket index.
pub type Buckets = BTreeMap<u64, u64>;

#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct EntityStats {
    pub insert_count: u64,
    pub lookup_count: u64,
    pub insert_speed: f64,
    pub lookup_speed: f64,
    pub insert_peak_qps: u64,
    pub lookup_peak_qps: u64,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct IoStats {
    pub total_ops: u64,
    pub read_ops: u64,
    pub write_ops: u64,
    pub read_bytes: u64,
    pub write_bytes: u64,
    pub read_speed: f64,
    pub write_speed: f64,
    /// Timestamp of the last I/O record, or the trace start.
    pub end_time: u64,
}

impl IoStats {
    pub fn is_empty(&self) -> bool {
        self.total_ops == 0
    }
}

/// Aggregates of one replayed trace.
///
/// Every map is ordered by key so reports come out in the same order on every run.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct AnalyzerStats {
    pub total_insert: u64,
    pub total_lookup: u64,
    pub begin_time: u64,
    pub end_time: u64,
    pub insert_speed: f64,
    pub lookup_speed: f64,
    pub per_entity: BTreeMap<u64, EntityStats>,
    pub per_entity_key_access: BTreeMap<u64, BTreeMap<Vec<u8>, u64>>,
    pub per_entity_insert_buckets: BTreeMap<u64, Buckets>,
    pub per_entity_lookup_buckets: BTreeMap<u64, Buckets>,
    pub io: IoStats,
}

impl AnalyzerStats {
    pub fn total_ops(&self) -> u64 {
        self.total_insert.saturating_add(self.total_lookup)
    }

    /// Keys of `entity_id` by access count, most accessed first, ties broken by key.
    pub fn key_access_ranking(&self, entity_id: u64) -> Vec<(&[u8], u64)> {
        let mut keys: Vec<(&[u8], u64)> = self
            .per_entity_key_access
            .get(&entity_id)
            .into_iter()
            .flatten()
            .map(|(key, count)| (key.as_slice(), *count))
            .collect();
        keys.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        keys
    }
}

/// `count` per `duration` units, or zero for an empty window.
pub(crate) fn speed(count: u64, duration: f64) -> f64 {
    if duration > 0.0 {
        count as f64 / duration
    } else {
        0.0
    }
}

pub(crate) fn peak(buckets: Option<&Buckets>) -> u64 {
    buckets
        .and_then(|b| b.values().max().copied())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_duration_has_zero_speed() {
        assert_eq!(speed(10, 0.0), 0.0);
        assert_eq!(speed(10, 2.0), 5.0);
    }

    #[test]
    fn peak_of_missing_buckets_is_zero() {
        assert_eq!(peak(None), 0);
        assert_eq!(peak(Some(&Buckets::new())), 0);
        assert_eq!(peak(Some(&Buckets::from([(0, 3), (4, 9), (5, 1)]))), 9);
    }

    #[test]
    fn ranking_orders_by_count_then_key() {
        let mut stats = AnalyzerStats::default();
        stats.per_entity_key_access.insert(
            1,
            BTreeMap::from([
                (b"b".to_vec(), 2),
                (b"a".to_vec(), 2),
                (b"c".to_vec(), 5),
            ]),
        );
        let ranking = stats.key_access_ranking(1);
        assert_eq!(
            ranking,
            vec![(&b"c"[..], 5), (&b"a"[..], 2), (&b"b"[..], 2)]
        );
        assert!(stats.key_access_ranking(2).is_empty());
    }
}
