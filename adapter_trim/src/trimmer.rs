// Copyright (c) 2018 10x Genomics, Inc. All rights reserved.
//! Read boundaries, cuts and their materialisation.
//!
//! A [`TrimState`] tracks two nested windows over the untouched read:
//! the *cut window* left over by unconditional and quality cuts, and inside
//! it the *adapter window* left over by adapter trimming. Nothing is copied
//! until [`TrimState::materialize`] is called.

use log::debug;
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Symbol written over masked bases.
pub const MASK_SYMBOL: u8 = b'N';

/// What to do with the part of a read matched by an adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Action {
    /// Remove the adapter and the sequence it trims
    #[default]
    #[serde(rename = "trim")]
    Trim,
    /// Replace the adapter and the sequence it trims with `N`
    #[serde(rename = "mask")]
    Mask,
    /// Leave the read alone, but still count the match
    #[serde(rename = "none")]
    None,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrimState {
    action: Action,
    cut: Range<usize>,
    window: Range<usize>,
    masks: Vec<Range<usize>>,
}

impl TrimState {
    pub fn new(len: usize, action: Action) -> Self {
        TrimState {
            action,
            cut: 0..len,
            window: 0..len,
            masks: Vec::new(),
        }
    }

    /// Region still considered part of the read by adapter matching.
    pub fn window(&self) -> Range<usize> {
        self.window.clone()
    }

    /// Region left over by unconditional and quality cuts.
    pub fn cut_window(&self) -> Range<usize> {
        self.cut.clone()
    }

    /// Restrict the read to `range`, given relative to the current cut window.
    /// Must be called before any adapter trimming.
    pub fn cut_to(&mut self, range: Range<usize>) {
        debug_assert_eq!(self.cut, self.window);
        let len = self.cut.len();
        let start = self.cut.start + range.start.min(len);
        let end = (self.cut.start + range.end.min(len)).max(start);
        self.cut = start..end;
        self.window = start..end;
    }

    /// Remove everything in the adapter window up to `end` (a read coordinate).
    pub fn trim_front(&mut self, end: usize) {
        let end = end.clamp(self.window.start, self.window.end);
        if self.action == Action::Mask && end > self.window.start {
            self.masks.push(self.window.start..end);
        }
        self.window.start = end;
    }

    /// Remove everything in the adapter window from `start` on (a read coordinate).
    pub fn trim_back(&mut self, start: usize) {
        let start = start.clamp(self.window.start, self.window.end);
        if self.action == Action::Mask && start < self.window.end {
            self.masks.push(start..self.window.end);
        }
        self.window.end = start;
    }

    /// Ranges that get overwritten with [`MASK_SYMBOL`].
    pub fn mask_ranges(&self) -> &[Range<usize>] {
        &self.masks
    }

    /// Range of the read that ends up in the output.
    pub fn output_range(&self) -> Range<usize> {
        match self.action {
            Action::Trim => self.window.clone(),
            Action::Mask | Action::None => self.cut.clone(),
        }
    }

    /// Build the output sequence.
    pub fn materialize(&self, seq: &[u8]) -> Vec<u8> {
        let range = self.output_range();
        let mut out = seq[range.clone()].to_vec();
        for mask in &self.masks {
            for b in &mut out[mask.start - range.start..mask.end - range.start] {
                *b = MASK_SYMBOL;
            }
        }
        out
    }

    /// Build the output qualities. Masked bases keep their qualities.
    pub fn materialize_qual(&self, qual: &[u8]) -> Vec<u8> {
        qual[self.output_range()].to_vec()
    }

    /// Sequence removed by adapter trimming: the 3' side if anything was
    /// removed there, otherwise the 5' side.
    pub fn rest<'a>(&self, seq: &'a [u8]) -> &'a [u8] {
        let back = self.window.end..self.cut.end;
        if !back.is_empty() {
            &seq[back]
        } else {
            &seq[self.cut.start..self.window.start]
        }
    }
}

/// Remove a fixed number of bases from either end, before anything else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UnconditionalCut {
    pub front: usize,
    pub back: usize,
}

impl UnconditionalCut {
    /// Positive values cut from the 5' end, negative values from the 3' end.
    pub fn from_lengths(lengths: &[i64]) -> Self {
        let mut cut = UnconditionalCut::default();
        for &length in lengths {
            if length > 0 {
                cut.front = length as usize;
            } else if length < 0 {
                cut.back = length.unsigned_abs() as usize;
            }
        }
        cut
    }

    pub fn is_noop(&self) -> bool {
        self.front == 0 && self.back == 0
    }

    pub fn apply(&self, state: &mut TrimState) {
        let len = state.cut_window().len();
        let end = len.saturating_sub(self.back);
        state.cut_to(self.front.min(end)..end);
    }
}

/// Quality trimming of both read ends.
///
/// With `two_colour` set, the 3' end is trimmed as for two-colour chemistry,
/// where a dark cycle reads as a high-quality `G`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QualityTrimmer {
    pub front_cutoff: u8,
    pub back_cutoff: u8,
    pub two_colour: bool,
    pub base: u8,
}

impl QualityTrimmer {
    /// Apply to the cut window of `state`. Returns the number of bases removed.
    pub fn apply(&self, seq: &[u8], qual: Option<&[u8]>, state: &mut TrimState) -> usize {
        let qual = match qual {
            Some(qual) if qual.len() == seq.len() => qual,
            Some(_) => {
                debug!("quality and sequence lengths differ, skipping quality trimming");
                return 0;
            }
            None => {
                debug!("read has no qualities, skipping quality trimming");
                return 0;
            }
        };

        let window = state.cut_window();
        let (seq, qual) = (&seq[window.clone()], &qual[window.clone()]);
        let range = if self.two_colour {
            let start = front_index(qual, self.front_cutoff, self.base);
            let stop = nextseq_trim_index(seq, qual, self.back_cutoff, self.base);
            if start >= stop {
                0..0
            } else {
                start..stop
            }
        } else {
            quality_trim_index(qual, self.front_cutoff, self.back_cutoff, self.base)
        };

        state.cut_to(range.clone());
        window.len() - range.len()
    }
}

fn front_index(qual: &[u8], cutoff: u8, base: u8) -> usize {
    let mut start = 0;
    let (mut sum, mut max) = (0i64, 0i64);
    for (i, &q) in qual.iter().enumerate() {
        sum += i64::from(cutoff) - (i64::from(q) - i64::from(base));
        if sum < 0 {
            break;
        }
        if sum > max {
            max = sum;
            start = i + 1;
        }
    }
    start
}

fn back_index(qual: &[u8], cutoff: u8, base: u8, dark_g: Option<&[u8]>) -> usize {
    let mut stop = qual.len();
    let (mut sum, mut max) = (0i64, 0i64);
    for i in (0..qual.len()).rev() {
        let q = match dark_g {
            Some(seq) if seq[i].eq_ignore_ascii_case(&b'G') => i64::from(cutoff) - 1,
            _ => i64::from(qual[i]) - i64::from(base),
        };
        sum += i64::from(cutoff) - q;
        if sum < 0 {
            break;
        }
        if sum > max {
            max = sum;
            stop = i;
        }
    }
    stop
}

/// Range to keep after quality trimming both ends.
///
/// From each end, the partial sums of `cutoff - quality` are accumulated
/// inward; the read is cut where the sum is largest, and the scan stops as
/// soon as the sum drops below zero. If nothing is left, `0..0` is returned.
///
/// ```rust
/// use adapter_trim::trimmer::quality_trim_index;
/// // qualities 40 40 40 10 2 2 at offset 33
/// let qual = [73, 73, 73, 43, 35, 35];
/// assert_eq!(quality_trim_index(&qual, 0, 20, 33), 0..3);
/// ```
pub fn quality_trim_index(
    qual: &[u8],
    front_cutoff: u8,
    back_cutoff: u8,
    base: u8,
) -> Range<usize> {
    let start = front_index(qual, front_cutoff, base);
    let stop = back_index(qual, back_cutoff, base, None);
    if start >= stop {
        0..0
    } else {
        start..stop
    }
}

/// End of the kept range after two-colour 3' quality trimming, where every
/// `G` counts as having quality `cutoff - 1`.
pub fn nextseq_trim_index(seq: &[u8], qual: &[u8], cutoff: u8, base: u8) -> usize {
    back_index(qual, cutoff, base, Some(seq))
}

/// Range of a read of length `len` kept when shortening to `length` bases.
/// Positive lengths keep the 5' end, negative ones the 3' end.
pub fn shorten_range(len: usize, length: i64) -> Range<usize> {
    let keep = (length.unsigned_abs() as usize).min(len);
    if length >= 0 {
        0..keep
    } else {
        len - keep..len
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn phred(values: &[u8]) -> Vec<u8> {
        values.iter().map(|q| q + 33).collect()
    }

    #[test]
    fn test_trim_front_and_back() {
        let seq = b"AAAACCCCGGGGTTTT";
        let mut state = TrimState::new(seq.len(), Action::Trim);
        state.trim_front(4);
        state.trim_back(12);
        assert_eq!(state.materialize(seq), b"CCCCGGGG".to_vec());
        assert_eq!(state.rest(seq), b"TTTT");
        assert!(state.mask_ranges().is_empty());
    }

    #[test]
    fn test_rest_front_only() {
        let seq = b"AAAACCCC";
        let mut state = TrimState::new(seq.len(), Action::Trim);
        assert_eq!(state.rest(seq), b"");
        state.trim_front(4);
        assert_eq!(state.rest(seq), b"AAAA");
    }

    #[test]
    fn test_mask() {
        let seq = b"AAAACCCCGGGGTTTT";
        let mut state = TrimState::new(seq.len(), Action::Mask);
        state.trim_back(12);
        assert_eq!(state.materialize(seq), b"AAAACCCCGGGGNNNN".to_vec());
        assert_eq!(state.materialize_qual(seq).len(), seq.len());

        // masking the masked output again changes nothing
        let masked = state.materialize(seq);
        let mut again = TrimState::new(masked.len(), Action::Mask);
        again.trim_back(12);
        assert_eq!(again.materialize(&masked), masked);
    }

    #[test]
    fn test_action_none() {
        let seq = b"AAAACCCCGGGGTTTT";
        let mut state = TrimState::new(seq.len(), Action::None);
        state.trim_back(12);
        assert_eq!(state.window(), 0..12);
        assert_eq!(state.materialize(seq), seq.to_vec());
        assert_eq!(state.rest(seq), b"TTTT");
    }

    #[test]
    fn test_unconditional_cut() {
        let seq = b"AAAACCCCGGGGTTTT";
        let cut = UnconditionalCut::from_lengths(&[3, -5]);
        assert_eq!(cut, UnconditionalCut { front: 3, back: 5 });

        let mut state = TrimState::new(seq.len(), Action::Trim);
        cut.apply(&mut state);
        assert_eq!(state.materialize(seq), b"ACCCCGGG".to_vec());
        // unconditional cuts are not part of the rest
        assert_eq!(state.rest(seq), b"");

        let mut short = TrimState::new(4, Action::Trim);
        cut.apply(&mut short);
        assert_eq!(short.cut_window().len(), 0);
    }

    #[test]
    fn test_mask_after_cut() {
        let seq = b"AAAACCCCGGGGTTTT";
        let mut state = TrimState::new(seq.len(), Action::Mask);
        UnconditionalCut { front: 2, back: 0 }.apply(&mut state);
        state.trim_front(6);
        assert_eq!(state.materialize(seq), b"NNNNCCGGGGTTTT".to_vec());
    }

    #[test]
    fn test_quality_trim_index() {
        let qual = phred(&[10, 10, 10, 40, 40, 40, 40, 40, 40, 40, 5, 5]);
        assert_eq!(quality_trim_index(&qual, 20, 20, 33), 3..10);
        assert_eq!(quality_trim_index(&qual, 0, 20, 33), 0..10);
        assert_eq!(quality_trim_index(&qual, 0, 0, 33), 0..12);

        // a single good base inside a bad tail does not stop the trimming
        let qual = phred(&[40, 40, 40, 40, 2, 2, 30, 2]);
        assert_eq!(quality_trim_index(&qual, 0, 20, 33), 0..4);

        let bad = phred(&[2, 2, 2, 2]);
        assert_eq!(quality_trim_index(&bad, 20, 20, 33), 0..0);
    }

    #[test]
    fn test_quality_base_64() {
        let qual: Vec<u8> = [40u8, 40, 40, 2, 2].iter().map(|q| q + 64).collect();
        assert_eq!(quality_trim_index(&qual, 0, 20, 64), 0..3);
    }

    #[test]
    fn test_nextseq_trim_index() {
        let seq = b"ACGTACGTGGGGGG";
        let qual = phred(&[40; 14]);
        assert_eq!(nextseq_trim_index(seq, &qual, 20, 33), 8);
        // standard trimming keeps the high-quality G run
        assert_eq!(quality_trim_index(&qual, 0, 20, 33), 0..14);
    }

    #[test]
    fn test_quality_trimmer() {
        let seq = b"ACGTACGTGGGG";
        let qual = phred(&[5, 40, 40, 40, 40, 40, 40, 40, 40, 40, 40, 40]);

        let trimmer = QualityTrimmer {
            front_cutoff: 10,
            back_cutoff: 20,
            two_colour: true,
            base: 33,
        };
        let mut state = TrimState::new(seq.len(), Action::Trim);
        assert_eq!(trimmer.apply(seq, Some(&qual), &mut state), 5);
        assert_eq!(state.materialize(seq), b"CGTACGT".to_vec());

        let mut state = TrimState::new(seq.len(), Action::Trim);
        assert_eq!(trimmer.apply(seq, None, &mut state), 0);
        assert_eq!(state.window(), 0..12);
    }

    #[test]
    fn test_shorten_range() {
        assert_eq!(shorten_range(10, 4), 0..4);
        assert_eq!(shorten_range(10, -4), 6..10);
        assert_eq!(shorten_range(3, 4), 0..3);
        assert_eq!(shorten_range(3, -4), 0..3);
    }

    proptest! {
        #[test]
        fn prop_test_windows_stay_nested(
            len in 0usize..100,
            cuts in proptest::collection::vec((any::<bool>(), 0usize..120), 0..6),
        ) {
            let mut state = TrimState::new(len, Action::Trim);
            UnconditionalCut { front: 3, back: 2 }.apply(&mut state);
            for (front, pos) in cuts {
                if front {
                    state.trim_front(pos);
                } else {
                    state.trim_back(pos);
                }
                let (cut, window) = (state.cut_window(), state.window());
                prop_assert!(cut.start <= window.start);
                prop_assert!(window.start <= window.end);
                prop_assert!(window.end <= cut.end);
                prop_assert!(cut.end <= len);
            }
        }

        #[test]
        fn prop_test_quality_trim_in_bounds(
            qual in proptest::collection::vec(33u8..75, 0..80),
            front in 0u8..40,
            back in 0u8..40,
        ) {
            let range = quality_trim_index(&qual, front, back, 33);
            prop_assert!(range.start <= range.end && range.end <= qual.len());
        }
    }
}
