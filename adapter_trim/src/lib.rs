// Copyright (c) 2018 10x Genomics, Inc. All rights reserved.
//! Error-tolerant adapter trimming for sequencing reads.
//! Major functionality includes:
//! * Compiling adapter specification strings (`name=`, `^`/`$` anchors,
//!   `FRONT...BACK` linked adapters, `A{10}` repeats, `file:` lists) into
//!   immutable [`Adapter`]s
//! * Semi-global, error-bounded alignment of an adapter against a read,
//!   with or without indels, honouring IUPAC wildcards
//! * Picking the best adapter hit per pass and re-trimming up to `times`
//!   passes per read
//! * Unconditional and quality-based cuts, masking, shortening and header edits
//! * Length/N-content/flag filters, classification and demultiplexing keys
//! * Mergeable run statistics, so reads can be split across workers
//!
//! # Example
//! ```rust
//! use adapter_trim::{Classification, NoSequenceSource, Read, TrimConfig, TrimStats};
//! let config = TrimConfig {
//!     back: vec!["primer=AGATCGGAAGAGC".to_string()],
//!     ..TrimConfig::default()
//! };
//! let pipeline = config.build(&NoSequenceSource).unwrap();
//! let mut worker = pipeline.worker();
//! let mut stats = TrimStats::default();
//!
//! let read = Read::new("r1", b"ACGTACGTACGTAGATCGGAAGAGCTTTT".to_vec(), None);
//! let trimmed = worker.process(&read, &mut stats);
//! assert_eq!(trimmed.seq, b"ACGTACGTACGT".to_vec());
//! assert_eq!(trimmed.classification, Classification::Trimmed);
//! assert_eq!(trimmed.adapter_name.as_deref(), Some("primer"));
//! ```

pub mod adapter;
pub mod aligner;
pub mod compiler;
pub mod config;
pub mod errors;
pub mod filter;
mod iupac;
pub mod pipeline;
pub mod record;
pub mod selector;
pub mod stats;
pub mod trimmer;


pub use crate::adapter::{Adapter, AdapterKind, LinkedPolicy, MatchParams};
pub use crate::aligner::{Aligner, Match};
pub use crate::compiler::{
    AdapterType, FastaFile, NamedSequence, NoSequenceSource, PatternCompiler, SequenceSource,
};
pub use crate::config::{QualityCutoff, TrimConfig};
pub use crate::errors::ConfigurationError;
pub use crate::filter::{Classification, DiscardPolicy, MaxN, ReadFilter};
pub use crate::pipeline::{TrimPipeline, TrimWorker};
pub use crate::record::{DemuxKey, HeaderEditor, InfoRecord, Read, TrimmedRead};
pub use crate::selector::{AdapterHit, AdapterSelector, Hit};
pub use crate::stats::{AdapterStats, Metric, TrimStats};
pub use crate::trimmer::{Action, QualityTrimmer, TrimState, UnconditionalCut};
