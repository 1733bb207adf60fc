// Copyright (c) 2018 10x Genomics, Inc. All rights reserved.
//! Run statistics.
//!
//! Every worker fills its own [`TrimStats`]; partial results are combined
//! with [`Metric::merge`], which is associative and commutative, so reads
//! can be split across workers in any way.

use crate::filter::Classification;
use crate::record::TrimmedRead;
use crate::selector::AdapterHit;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// A mergeable, serializable statistic.
pub trait Metric: Serialize + for<'de> Deserialize<'de> {
    /// Combine two metrics, modifying self in place and consuming `other`
    fn merge(&mut self, other: Self);

    /// Write the metric as pretty JSON
    fn to_writer<W: Write>(&self, writer: W) -> Result<()> {
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    /// Write the metric as pretty JSON to a file
    fn to_json_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let file = File::create(path)
            .with_context(|| format!("Could not open file '{}' for writing", path.display()))?;
        let mut writer = BufWriter::new(file);
        self.to_writer(&mut writer)?;
        writer.flush()?;
        Ok(())
    }
}

impl Metric for u64 {
    fn merge(&mut self, other: Self) {
        *self += other;
    }
}

/// `Metric` for `BTreeMap` where the value implements the `Metric` trait
impl<K, V> Metric for BTreeMap<K, V>
where
    K: Ord + Serialize + for<'de> Deserialize<'de>,
    V: Metric,
{
    fn merge(&mut self, other: Self) {
        use std::collections::btree_map::Entry::{Occupied, Vacant};
        for (key, value) in other {
            match self.entry(key) {
                Vacant(e) => {
                    e.insert(value);
                }
                Occupied(mut e) => {
                    e.get_mut().merge(value);
                }
            }
        }
    }
}

/// Statistics of a single adapter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdapterStats {
    /// Reads in which this adapter was trimmed at least once
    pub reads: u64,
    /// Trimmed occurrences, counting every pass
    pub matches: u64,
    /// Histogram of bases removed per occurrence
    pub removed_lengths: BTreeMap<usize, u64>,
}

impl Metric for AdapterStats {
    fn merge(&mut self, other: Self) {
        self.reads.merge(other.reads);
        self.matches.merge(other.matches);
        self.removed_lengths.merge(other.removed_lengths);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrimStats {
    pub total_reads: u64,
    pub total_bp: u64,
    pub reads_with_adapters: u64,
    pub quality_trimmed_bp: u64,
    pub written_reads: u64,
    pub written_bp: u64,
    pub classifications: BTreeMap<Classification, u64>,
    pub adapters: BTreeMap<String, AdapterStats>,
}

impl Metric for TrimStats {
    fn merge(&mut self, other: Self) {
        self.total_reads.merge(other.total_reads);
        self.total_bp.merge(other.total_bp);
        self.reads_with_adapters.merge(other.reads_with_adapters);
        self.quality_trimmed_bp.merge(other.quality_trimmed_bp);
        self.written_reads.merge(other.written_reads);
        self.written_bp.merge(other.written_bp);
        self.classifications.merge(other.classifications);
        self.adapters.merge(other.adapters);
    }
}

impl TrimStats {
    /// Account for one processed read.
    pub(crate) fn observe(
        &mut self,
        input_len: usize,
        quality_trimmed: usize,
        hits: &[AdapterHit<'_>],
        output: &TrimmedRead,
    ) {
        self.total_reads += 1;
        self.total_bp += input_len as u64;
        self.quality_trimmed_bp += quality_trimmed as u64;
        *self.classifications.entry(output.classification).or_default() += 1;

        if !hits.is_empty() {
            self.reads_with_adapters += 1;
        }
        let mut seen: Vec<&str> = Vec::with_capacity(hits.len());
        for hit in hits {
            let name = hit.adapter.name();
            let stats = self.adapters.entry(name.to_string()).or_default();
            stats.matches += 1;
            *stats.removed_lengths.entry(hit.removed_len()).or_default() += 1;
            if !seen.contains(&name) {
                stats.reads += 1;
                seen.push(name);
            }
        }

        if output.is_written() {
            self.written_reads += 1;
            self.written_bp += output.seq.len() as u64;
        }
    }

    /// Number of reads with the given classification.
    pub fn count(&self, classification: Classification) -> u64 {
        self.classifications
            .get(&classification)
            .copied()
            .unwrap_or(0)
    }
}
