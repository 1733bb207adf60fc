// Copyright (c) 2018 10x Genomics, Inc. All rights reserved.
//! Compiled adapter descriptors.
//!
//! An [`Adapter`] is produced once by the
//! [`PatternCompiler`](crate::compiler::PatternCompiler) and never changes
//! afterwards. All surface syntax (anchors, `...`, repeats) is gone by the
//! time an adapter exists; what is left is one or two [`Leg`]s with
//! precomputed base sets and the [`ClipFlags`] the aligner needs.
//!
//! # Where an adapter may be found
//! The table below summarizes which read layouts each adapter kind
//! recognizes (`adapter` = full adapter, `adap` = partial adapter).
//!
//! | Kind            | acgtADAPTERacgt | acgtacgtADAP | PTERacgtacgt | ADAPTERacgt | acgtADAPTER |
//! |-----------------|-----------------|--------------|--------------|-------------|-------------|
//! | Back            | Yes             | Yes          | No           | Yes         | Yes         |
//! | Back, anchored  | No              | No           | No           | No          | Yes         |
//! | Front           | Yes             | No           | Yes          | Yes         | Yes         |
//! | Front, anchored | No              | No           | No           | Yes         | No          |
//! | Anywhere        | Yes             | Yes          | Yes          | Yes         | Yes         |

use crate::iupac::{has_ambiguity, iupac_mask, read_mask};
use bio::pattern_matching::bndm::BNDM;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Longest adapter that the exact-match prefilter handles.
const MAX_EXACT_PATTERN_LEN: usize = 64;

/// Parameters shared by all legs of an adapter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MatchParams {
    /// Allowed errors per aligned adapter base
    pub max_error_rate: f64,
    /// Minimum number of adapter bases that must be aligned
    pub min_overlap: usize,
    /// Allow insertions and deletions in the alignment
    pub indels: bool,
    /// Ambiguity codes in the read match compatible adapter bases
    pub read_wildcards: bool,
    /// Ambiguity codes in the adapter match compatible read bases.
    /// Otherwise adapter symbols are compared literally.
    pub adapter_wildcards: bool,
}

impl Default for MatchParams {
    fn default() -> Self {
        MatchParams {
            max_error_rate: 0.1,
            min_overlap: 3,
            indels: true,
            read_wildcards: false,
            adapter_wildcards: true,
        }
    }
}

impl MatchParams {
    /// Maximum number of errors tolerated over `overlap` aligned adapter bases,
    /// `floor(max_error_rate * overlap)`.
    ///
    /// ```rust
    /// use adapter_trim::MatchParams;
    /// let params = MatchParams { max_error_rate: 0.1, ..MatchParams::default() };
    /// assert_eq!(params.max_error_count(9), 0);
    /// assert_eq!(params.max_error_count(10), 1);
    /// assert_eq!(params.max_error_count(25), 2);
    /// ```
    pub fn max_error_count(&self, overlap: usize) -> usize {
        // small epsilon so that e.g. 0.3 * 10 is not rounded down to 2
        (self.max_error_rate * overlap as f64 + 1e-9).floor() as usize
    }

    /// Acceptance test for a candidate alignment.
    pub fn accepts(&self, overlap: usize, errors: usize) -> bool {
        overlap > 0 && overlap >= self.min_overlap && errors <= self.max_error_count(overlap)
    }
}

/// What a linked adapter requires before a read counts as trimmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkedPolicy {
    /// Both legs need to be found
    #[serde(rename = "require_both")]
    RequireBoth,
    /// Either leg on its own is enough
    #[serde(rename = "allow_single")]
    AllowSingle,
}

/// Where a leg is searched for, before anchoring is taken into account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    Front,
    Back,
    Anywhere,
}

/// Which unaligned ends of the read and of the adapter are free of charge.
///
/// * `read_prefix`: read bases before the alignment are skipped
/// * `read_suffix`: read bases after the alignment are skipped
/// * `adapter_prefix`: the adapter may start partially, hanging off the read start
/// * `adapter_suffix`: the adapter may end partially, hanging off the read end
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClipFlags {
    pub read_prefix: bool,
    pub read_suffix: bool,
    pub adapter_prefix: bool,
    pub adapter_suffix: bool,
}

impl ClipFlags {
    pub fn new(placement: Placement, anchored: bool) -> Self {
        use self::Placement::{Anywhere, Back, Front};
        let mut flags = ClipFlags {
            read_prefix: false,
            read_suffix: false,
            adapter_prefix: false,
            adapter_suffix: false,
        };

        match (placement, anchored) {
            (Back, false) => {
                flags.read_prefix = true;
                flags.read_suffix = true;
                flags.adapter_suffix = true;
            }
            (Back, true) => {
                flags.read_prefix = true;
            }
            (Front, false) => {
                flags.read_prefix = true;
                flags.read_suffix = true;
                flags.adapter_prefix = true;
            }
            (Front, true) => {
                flags.read_suffix = true;
            }
            (Anywhere, _) => {
                flags.read_prefix = true;
                flags.read_suffix = true;
                flags.adapter_prefix = true;
                flags.adapter_suffix = true;
            }
        }

        flags
    }
}

/// Exact-match prefilter for adapters without effective wildcards.
pub(crate) struct ExactFinder(BNDM);

impl ExactFinder {
    /// Leftmost exact occurrence that satisfies `accept`.
    pub(crate) fn find(&self, read: &[u8], accept: impl Fn(usize) -> bool) -> Option<usize> {
        self.0.find_all(read).find(|&pos| accept(pos))
    }
}

impl fmt::Debug for ExactFinder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ExactFinder")
    }
}

/// One contiguous adapter sequence and the precomputed data to align it.
#[derive(Debug)]
pub struct Leg {
    seq: Vec<u8>,
    masks: Vec<u8>,
    literal: bool,
    anchored: bool,
    flags: ClipFlags,
    exact: Option<ExactFinder>,
}

impl Leg {
    /// `seq` must already be normalised (upper case IUPAC).
    pub(crate) fn new(
        seq: Vec<u8>,
        placement: Placement,
        anchored: bool,
        params: &MatchParams,
    ) -> Self {
        let literal = !params.adapter_wildcards;
        let masks = seq
            .iter()
            .map(|&b| {
                if literal {
                    read_mask(b, false)
                } else {
                    iupac_mask(b).unwrap_or(0)
                }
            })
            .collect();

        let exact_is_exhaustive =
            !params.read_wildcards && (literal || !has_ambiguity(&seq));
        let exact = (exact_is_exhaustive && seq.len() <= MAX_EXACT_PATTERN_LEN)
            .then(|| ExactFinder(BNDM::new(seq.as_slice())));

        Leg {
            seq,
            masks,
            literal,
            anchored,
            flags: ClipFlags::new(placement, anchored),
            exact,
        }
    }

    pub fn seq(&self) -> &[u8] {
        &self.seq
    }

    pub fn len(&self) -> usize {
        self.seq.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seq.is_empty()
    }

    pub fn is_anchored(&self) -> bool {
        self.anchored
    }

    pub fn flags(&self) -> ClipFlags {
        self.flags
    }

    /// Base sets of the adapter symbols, see [`MatchParams::adapter_wildcards`].
    pub(crate) fn masks(&self) -> &[u8] {
        &self.masks
    }

    /// Adapter symbols are also compared byte by byte.
    pub(crate) fn is_literal(&self) -> bool {
        self.literal
    }

    pub(crate) fn exact(&self) -> Option<&ExactFinder> {
        self.exact.as_ref()
    }
}

/// The kind of an adapter, which decides how it is aligned and what gets trimmed.
#[derive(Debug)]
pub enum AdapterKind {
    /// 5' adapter: the adapter and everything before it is removed
    Front(Leg),
    /// 3' adapter: the adapter and everything after it is removed
    Back(Leg),
    /// Treated as 5' if the match starts at the first read base, 3' otherwise
    Anywhere(Leg),
    /// A 5' leg followed by a 3' leg in the same read
    Linked {
        front: Leg,
        back: Leg,
        policy: LinkedPolicy,
    },
}

impl AdapterKind {
    /// The single leg, or the front and back legs of a linked adapter.
    pub fn legs(&self) -> (&Leg, Option<&Leg>) {
        match self {
            AdapterKind::Front(leg) | AdapterKind::Back(leg) | AdapterKind::Anywhere(leg) => {
                (leg, None)
            }
            AdapterKind::Linked { front, back, .. } => (front, Some(back)),
        }
    }
}

/// A compiled adapter.
#[derive(Debug)]
pub struct Adapter {
    name: String,
    kind: AdapterKind,
    params: MatchParams,
}

impl Adapter {
    pub(crate) fn new(name: String, kind: AdapterKind, params: MatchParams) -> Self {
        Adapter { name, kind, params }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &AdapterKind {
        &self.kind
    }

    pub fn params(&self) -> &MatchParams {
        &self.params
    }

    pub fn is_linked(&self) -> bool {
        matches!(self.kind, AdapterKind::Linked { .. })
    }

    /// Sequence in a compact notation, `FRONT...BACK` for linked adapters.
    pub fn display_seq(&self) -> String {
        let show = |leg: &Leg| String::from_utf8_lossy(leg.seq()).into_owned();
        match &self.kind {
            AdapterKind::Front(leg) | AdapterKind::Back(leg) | AdapterKind::Anywhere(leg) => {
                show(leg)
            }
            AdapterKind::Linked { front, back, .. } => {
                format!("{}...{}", show(front), show(back))
            }
        }
    }
}
