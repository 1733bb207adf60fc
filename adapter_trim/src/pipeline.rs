// Copyright (c) 2018 10x Genomics, Inc. All rights reserved.
//! Per-read processing.
//!
//! A [`TrimPipeline`] is immutable and shared between threads. Each thread
//! gets a [`TrimWorker`], which owns the alignment buffers, and its own
//! [`TrimStats`]; the stats are merged at the end.

use crate::aligner::Aligner;
use crate::filter::ReadFilter;
use crate::record::{HeaderEditor, InfoRecord, Read, TrimmedRead};
use crate::selector::AdapterSelector;
use crate::stats::{Metric, TrimStats};
use crate::trimmer::{shorten_range, Action, QualityTrimmer, TrimState, UnconditionalCut};
use crate::Adapter;
use log::debug;
use rayon::prelude::*;

/// Reads handed to one rayon task in [`TrimPipeline::process_batch`].
const READS_PER_TASK: usize = 1024;

#[derive(Debug)]
pub struct TrimPipeline {
    pub(crate) selector: AdapterSelector,
    pub(crate) action: Action,
    pub(crate) cut: UnconditionalCut,
    pub(crate) quality: Option<QualityTrimmer>,
    pub(crate) shorten: Option<i64>,
    pub(crate) headers: HeaderEditor,
    pub(crate) filter: ReadFilter,
}

impl TrimPipeline {
    pub fn adapters(&self) -> &[Adapter] {
        self.selector.adapters()
    }

    pub fn filter(&self) -> &ReadFilter {
        &self.filter
    }

    pub fn worker(&self) -> TrimWorker<'_> {
        TrimWorker {
            pipeline: self,
            aligner: Aligner::new(),
        }
    }

    /// Process `reads` in parallel. Output order follows input order.
    pub fn process_batch(&self, reads: &[Read]) -> (Vec<TrimmedRead>, TrimStats) {
        reads
            .par_chunks(READS_PER_TASK)
            .map(|chunk| {
                let mut worker = self.worker();
                let mut stats = TrimStats::default();
                let trimmed: Vec<_> = chunk
                    .iter()
                    .map(|read| worker.process(read, &mut stats))
                    .collect();
                (trimmed, stats)
            })
            .reduce(
                || (Vec::new(), TrimStats::default()),
                |(mut trimmed, mut stats), (other_trimmed, other_stats)| {
                    trimmed.extend(other_trimmed);
                    stats.merge(other_stats);
                    (trimmed, stats)
                },
            )
    }
}

pub struct TrimWorker<'a> {
    pipeline: &'a TrimPipeline,
    aligner: Aligner,
}

impl<'a> TrimWorker<'a> {
    /// Run every step on one read and account for it in `stats`.
    ///
    /// Steps run in this order: unconditional cut, quality trimming, adapter
    /// passes, masking or trimming, shortening, header edits and filters.
    pub fn process(&mut self, read: &Read, stats: &mut TrimStats) -> TrimmedRead {
        let pipeline = self.pipeline;
        let mut state = TrimState::new(read.len(), pipeline.action);

        if !pipeline.cut.is_noop() {
            pipeline.cut.apply(&mut state);
        }
        let quality_trimmed = match &pipeline.quality {
            Some(trimmer) => trimmer.apply(&read.seq, read.qual.as_deref(), &mut state),
            None => 0,
        };

        let hits = pipeline
            .selector
            .trim_adapters(&mut self.aligner, &read.seq, &mut state);

        let mut seq = state.materialize(&read.seq);
        let mut qual = match read.qual.as_deref() {
            Some(q) if q.len() == read.len() => Some(state.materialize_qual(q)),
            Some(_) => {
                debug!(
                    "dropping qualities of {}, their length differs from the sequence",
                    read.id
                );
                None
            }
            None => None,
        };
        if let Some(length) = pipeline.shorten {
            let keep = shorten_range(seq.len(), length);
            seq = seq[keep.clone()].to_vec();
            qual = qual.map(|q| q[keep].to_vec());
        }

        let adapter_name = hits.first().map(|hit| hit.adapter.name().to_string());
        let id = if pipeline.headers.is_noop() {
            read.id.clone()
        } else {
            pipeline
                .headers
                .apply(&read.id, adapter_name.as_deref(), seq.len())
        };
        let (classification, discarded) =
            pipeline
                .filter
                .classify(&seq, !hits.is_empty(), read.flagged);

        let output = TrimmedRead {
            id,
            rest: state.rest(&read.seq).to_vec(),
            info: InfoRecord::for_hits(read, &hits),
            seq,
            qual,
            adapter_name,
            classification,
            discarded,
        };
        stats.observe(read.len(), quality_trimmed, &hits, &output);
        output
    }
}
