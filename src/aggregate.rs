use std::collections::BTreeMap;

use serde::Serialize;

use crate::resolve::ResolvedRecord;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregatedRecord {
    pub sample: String,
    pub path: String,
    pub abundance: f64,
}

/// Sums abundance per `(sample, path)`; iteration is ordered by sample, then path.
#[derive(Debug, Default)]
pub struct Aggregator {
    groups: BTreeMap<String, BTreeMap<String, f64>>,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, record: ResolvedRecord) {
        *self
            .groups
            .entry(record.sample)
            .or_default()
            .entry(record.path)
            .or_insert(0.0) += record.abundance;
    }

    pub fn extend<I: IntoIterator<Item = ResolvedRecord>>(&mut self, records: I) {
        for record in records {
            self.add(record);
        }
    }

    pub fn sample_count(&self) -> usize {
        self.groups.len()
    }

    pub fn finish(self) -> Vec<AggregatedRecord> {
        self.groups
            .into_iter()
            .flat_map(|(sample, paths)| {
                paths.into_iter().map(move |(path, abundance)| AggregatedRecord {
                    sample: sample.clone(),
                    path,
                    abundance,
                })
            })
            .collect()
    }

    /// Per-sample `(path, abundance)` lists, the shape the Krona writer consumes.
    pub fn into_samples(self) -> BTreeMap<String, Vec<(String, f64)>> {
        self.groups
            .into_iter()
            .map(|(sample, paths)| (sample, paths.into_iter().collect()))
            .collect()
    }
}
