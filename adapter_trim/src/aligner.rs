// Copyright (c) 2018 10x Genomics, Inc. All rights reserved.
//! Error-bounded semi-global alignment of one adapter leg against one read.
//!
//! Three strategies are tried in order:
//! 1. An exact search with BNDM, used when the leg and the matching
//!    parameters make an exact occurrence the best possible outcome.
//! 2. Without indels, the leg is slid over every offset allowed by its
//!    [`ClipFlags`](crate::adapter::ClipFlags) and scored by Hamming
//!    distance over the overlap.
//! 3. With indels, a unit-cost dynamic program over a semi-global matrix,
//!    run once per adapter start the clip flags allow. A run starting past
//!    the first adapter base also starts at the first read base. End cells
//!    lie on the last row/column, as far as the clip flags allow.
//!
//! Among the accepted candidates the one with the largest overlap wins,
//! then the fewest errors, then the leftmost start in the read.

use crate::adapter::{Leg, MatchParams};
use crate::iupac::{iupac_mask, read_mask};
use std::cmp::Ordering;

/// A realized alignment. Ranges are half-open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Match {
    pub read_start: usize,
    pub read_end: usize,
    pub adapter_start: usize,
    pub adapter_end: usize,
    pub errors: usize,
}

impl Match {
    /// Number of adapter bases taking part in the alignment.
    pub fn overlap(&self) -> usize {
        self.adapter_end - self.adapter_start
    }

    /// Ordering used to pick the best alignment: `Greater` is better.
    pub fn rank(&self, other: &Match) -> Ordering {
        self.overlap()
            .cmp(&other.overlap())
            .then_with(|| other.errors.cmp(&self.errors))
            .then_with(|| other.read_start.cmp(&self.read_start))
    }

    /// Read bases facing ambiguous adapter symbols such as `N`, taking
    /// alignment columns as if there were no indels.
    ///
    /// ```rust
    /// use adapter_trim::Match;
    /// let m = Match { read_start: 2, read_end: 9, adapter_start: 0, adapter_end: 7, errors: 0 };
    /// assert_eq!(m.wildcards(b"ACNNNGT", b"GGACTTAGT"), b"TTA".to_vec());
    /// ```
    pub fn wildcards(&self, adapter: &[u8], read: &[u8]) -> Vec<u8> {
        (self.adapter_start..self.adapter_end)
            .filter(|&i| iupac_mask(adapter[i]).is_some_and(|mask| mask.count_ones() > 1))
            .map(|i| self.read_start + i - self.adapter_start)
            .filter(|&pos| pos < read.len())
            .map(|pos| read[pos])
            .collect()
    }

    /// Move the read coordinates from a sub-slice into the coordinates of the full read.
    pub(crate) fn offset_by(self, offset: usize) -> Match {
        Match {
            read_start: self.read_start + offset,
            read_end: self.read_end + offset,
            ..self
        }
    }
}

fn keep_best(best: &mut Option<Match>, candidate: Match) {
    match best {
        Some(current) if candidate.rank(current) != Ordering::Greater => {}
        _ => *best = Some(candidate),
    }
}

/// Ordered by cost, then by read start.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
struct Cell {
    cost: usize,
    read_start: usize,
}

impl Cell {
    #[inline]
    fn step(self, cost: usize) -> Cell {
        Cell {
            cost: self.cost + cost,
            ..self
        }
    }
}

/// Aligns adapter legs against reads, reusing its buffers between calls.
///
/// ```rust
/// use adapter_trim::{AdapterKind, AdapterType, Aligner, LinkedPolicy, MatchParams};
/// use adapter_trim::{NoSequenceSource, PatternCompiler};
///
/// let params = MatchParams::default();
/// let mut compiler = PatternCompiler::new(params, LinkedPolicy::AllowSingle, &NoSequenceSource);
/// let adapter = compiler.compile(AdapterType::Back, "AGATCGGAAGAGC").unwrap().remove(0);
/// let leg = match adapter.kind() {
///     AdapterKind::Back(leg) => leg,
///     _ => unreachable!(),
/// };
///
/// let mut aligner = Aligner::new();
/// let m = aligner.locate(leg, &params, b"ACGTACGTTTAGATCGG").unwrap();
/// assert_eq!((m.read_start, m.read_end), (10, 17));
/// assert_eq!((m.adapter_start, m.adapter_end), (0, 7));
/// assert_eq!(m.errors, 0);
/// ```
#[derive(Debug, Default)]
pub struct Aligner {
    upper: Vec<u8>,
    read_masks: Vec<u8>,
    prev: Vec<Cell>,
    cur: Vec<Cell>,
}

impl Aligner {
    pub fn new() -> Self {
        Aligner::default()
    }

    /// Best accepted alignment of `leg` against `read`, if any.
    /// Read bases are compared case-insensitively.
    pub fn locate(&mut self, leg: &Leg, params: &MatchParams, read: &[u8]) -> Option<Match> {
        if read.is_empty() || leg.is_empty() {
            return None;
        }

        self.upper.clear();
        self.upper.extend(read.iter().map(u8::to_ascii_uppercase));
        self.read_masks.clear();
        self.read_masks.extend(
            self.upper
                .iter()
                .map(|&b| read_mask(b, params.read_wildcards)),
        );

        if let Some(m) = self.exact(leg, params) {
            return Some(m);
        }
        if params.indels {
            self.with_indels(leg, params)
        } else {
            self.without_indels(leg, params)
        }
    }

    fn exact(&self, leg: &Leg, params: &MatchParams) -> Option<Match> {
        let finder = leg.exact()?;
        let (m, n) = (leg.len(), self.upper.len());
        if m > n || !params.accepts(m, 0) {
            return None;
        }
        let flags = leg.flags();
        let pos = finder.find(&self.upper, |pos| {
            (flags.read_prefix || pos == 0) && (flags.read_suffix || pos + m == n)
        })?;
        Some(Match {
            read_start: pos,
            read_end: pos + m,
            adapter_start: 0,
            adapter_end: m,
            errors: 0,
        })
    }

    #[inline]
    fn symbols_match(&self, leg: &Leg, i: usize, j: usize) -> bool {
        if leg.masks()[i] & self.read_masks[j] != 0 {
            return true;
        }
        let a = leg.seq()[i];
        leg.is_literal() && a != b'X' && a == self.upper[j]
    }

    fn without_indels(&self, leg: &Leg, params: &MatchParams) -> Option<Match> {
        let m = leg.len() as isize;
        let n = self.upper.len() as isize;
        let flags = leg.flags();

        // offset k places adapter position 0 at read position k
        let min_k = if flags.adapter_prefix { 1 - m } else { 0 };
        let max_k = if flags.adapter_suffix { n - 1 } else { n - m };

        let mut best = None;
        for k in min_k..=max_k {
            if k > 0 && !flags.read_prefix {
                continue;
            }
            if k + m < n && !flags.read_suffix {
                continue;
            }
            let a_start = (-k).max(0) as usize;
            let a_end = m.min(n - k) as usize;
            if a_end <= a_start {
                continue;
            }
            let overlap = a_end - a_start;
            if overlap < params.min_overlap {
                continue;
            }

            let max_errors = params.max_error_count(overlap);
            let mut errors = 0;
            for i in a_start..a_end {
                let j = (k + i as isize) as usize;
                if !self.symbols_match(leg, i, j) {
                    errors += 1;
                    if errors > max_errors {
                        break;
                    }
                }
            }
            if errors > max_errors {
                continue;
            }

            let read_start = (k + a_start as isize) as usize;
            keep_best(
                &mut best,
                Match {
                    read_start,
                    read_end: read_start + overlap,
                    adapter_start: a_start,
                    adapter_end: a_end,
                    errors,
                },
            );
        }
        best
    }

    fn with_indels(&mut self, leg: &Leg, params: &MatchParams) -> Option<Match> {
        let m = leg.len();
        let last_start = if leg.flags().adapter_prefix {
            m.saturating_sub(params.min_overlap.max(1))
        } else {
            0
        };

        let mut best: Option<Match> = None;
        for adapter_start in 0..=last_start {
            // later starts cannot reach a longer overlap
            if best.is_some_and(|b| b.overlap() > m - adapter_start) {
                break;
            }
            self.align_from(leg, params, adapter_start, &mut best);
        }
        best
    }

    /// Unit-cost semi-global alignment of `leg[adapter_start..]`. Cells keep
    /// the cheapest path, and the leftmost read start among equally cheap
    /// ones, so every end cell holds the best match for its coordinates.
    fn align_from(
        &mut self,
        leg: &Leg,
        params: &MatchParams,
        adapter_start: usize,
        best: &mut Option<Match>,
    ) {
        let rows = leg.len() - adapter_start + 1;
        let n = self.upper.len();
        let flags = leg.flags();
        let free_read_prefix = adapter_start == 0 && flags.read_prefix;

        let mut prev = std::mem::take(&mut self.prev);
        let mut cur = std::mem::take(&mut self.cur);
        prev.clear();
        prev.extend((0..rows).map(|r| Cell {
            cost: r,
            read_start: 0,
        }));
        cur.clear();
        cur.resize(rows, Cell::default());

        for j in 1..=n {
            cur[0] = if free_read_prefix {
                Cell {
                    cost: 0,
                    read_start: j,
                }
            } else {
                Cell {
                    cost: j,
                    read_start: 0,
                }
            };

            for r in 1..rows {
                let i = adapter_start + r;
                let mismatch = usize::from(!self.symbols_match(leg, i - 1, j - 1));
                let diag = prev[r - 1].step(mismatch);
                let insertion = prev[r].step(1);
                let deletion = cur[r - 1].step(1);

                let consumes_read = diag.min(insertion);
                // a partial adapter at the read end never finishes with a deletion
                if j == n && r + 1 < rows && flags.adapter_suffix {
                    consider(&consumes_read, adapter_start, i, j, params, best);
                }
                cur[r] = consumes_read.min(deletion);
            }

            if flags.read_suffix || j == n {
                consider(&cur[rows - 1], adapter_start, leg.len(), j, params, best);
            }
            std::mem::swap(&mut prev, &mut cur);
        }

        self.prev = prev;
        self.cur = cur;
    }
}

fn consider(
    cell: &Cell,
    adapter_start: usize,
    adapter_end: usize,
    read_end: usize,
    params: &MatchParams,
    best: &mut Option<Match>,
) {
    let candidate = Match {
        read_start: cell.read_start,
        read_end,
        adapter_start,
        adapter_end,
        errors: cell.cost,
    };
    if params.accepts(candidate.overlap(), candidate.errors) {
        keep_best(best, candidate);
    }
}
