// Copyright (c) 2018 10x Genomics, Inc. All rights reserved.
//! Errors raised while turning a configuration into a trimming pipeline.
//! All of them are fatal: no read is processed once one is returned.

use crate::iupac::ALLOWED_ADAPTER_CHARS;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigurationError {
    #[error(
        "Character '{character}' in adapter sequence '{adapter}' is not a valid IUPAC code. \
         Use only characters {ALLOWED_ADAPTER_CHARS}."
    )]
    InvalidCharacter { adapter: String, character: char },

    #[error("Conflicting anchors in adapter '{adapter}': {reason}")]
    ConflictingAnchors { adapter: String, reason: &'static str },

    #[error("Adapters searched anywhere in the read cannot be anchored ('{adapter}')")]
    AnchoredAnywhere { adapter: String },

    #[error("Linked adapters cannot be searched anywhere in the read ('{adapter}')")]
    LinkedAnywhere { adapter: String },

    #[error("Adapter '{adapter}' has an empty sequence")]
    EmptyAdapter { adapter: String },

    #[error("Malformed repeat notation in adapter '{adapter}': {reason}")]
    MalformedRepeat { adapter: String, reason: String },

    #[error("Adapter names need to be unique. '{name}' already exists")]
    DuplicateName { name: String },

    #[error("A name cannot be combined with a 'file:' adapter list ('{adapter}')")]
    NamedAdapterList { adapter: String },

    #[error("Could not load adapter sequences from '{location}': {message}")]
    SequenceSource { location: String, message: String },

    #[error("The maximum error rate must be in [0, 1), got {0}")]
    InvalidErrorRate(f64),

    #[error("The minimum overlap must be at least 1")]
    InvalidMinOverlap,

    #[error("The number of trimming passes (times) must be at least 1")]
    InvalidTimes,

    #[error(
        "At most one positive (5') and one negative (3') unconditional cut can be given, got {0:?}"
    )]
    InvalidCut(Vec<i64>),

    #[error("max_n must be a fraction below 1 or a whole number of bases, got {0}")]
    InvalidMaxN(f64),

    #[error("The quality base must be 33 or 64, got {0}")]
    InvalidQualityBase(u8),

    #[error("discard_trimmed and discard_untrimmed cannot be used together")]
    ConflictingDiscard,

    #[error("Invalid length tag '{tag}': {message}")]
    InvalidLengthTag { tag: String, message: String },
}
