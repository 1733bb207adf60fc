// Copyright (c) 2018 10x Genomics, Inc. All rights reserved.
//! Choose the best adapter for a read and trim it, pass after pass.

use crate::adapter::{Adapter, AdapterKind, LinkedPolicy};
use crate::aligner::{Aligner, Match};
use crate::trimmer::TrimState;
use std::cmp::Ordering;
use std::ops::Range;

/// Where an accepted match trims the read. Coordinates refer to the full read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Hit {
    /// The match and everything before it is removed
    Front(Match),
    /// The match and everything after it is removed
    Back(Match),
    /// At least one leg of a linked adapter
    Linked {
        front: Option<Match>,
        back: Option<Match>,
    },
}

impl Hit {
    fn legs(&self) -> impl Iterator<Item = &Match> {
        let (first, second) = match self {
            Hit::Front(m) | Hit::Back(m) => (Some(m), None),
            Hit::Linked { front, back } => (front.as_ref(), back.as_ref()),
        };
        first.into_iter().chain(second)
    }

    /// Aligned adapter bases, summed over the legs.
    pub fn overlap(&self) -> usize {
        self.legs().map(Match::overlap).sum()
    }

    /// Errors, summed over the legs.
    pub fn errors(&self) -> usize {
        self.legs().map(|m| m.errors).sum()
    }

    /// Leftmost read position of the alignment.
    pub fn read_start(&self) -> usize {
        self.legs().map(|m| m.read_start).min().unwrap_or(0)
    }

    /// Same order as [`Match::rank`], `Greater` is better.
    fn rank(&self, other: &Hit) -> Ordering {
        self.overlap()
            .cmp(&other.overlap())
            .then_with(|| other.errors().cmp(&self.errors()))
            .then_with(|| other.read_start().cmp(&self.read_start()))
    }

    fn apply(&self, state: &mut TrimState) {
        match self {
            Hit::Front(m) => state.trim_front(m.read_end),
            Hit::Back(m) => state.trim_back(m.read_start),
            Hit::Linked { front, back } => {
                if let Some(m) = front {
                    state.trim_front(m.read_end);
                }
                if let Some(m) = back {
                    state.trim_back(m.read_start);
                }
            }
        }
    }
}

/// An accepted hit of one adapter in one pass.
#[derive(Debug, Clone)]
pub struct AdapterHit<'a> {
    pub adapter: &'a Adapter,
    pub hit: Hit,
    /// Adapter window of the read when the hit was found
    pub window: Range<usize>,
}

impl<'a> AdapterHit<'a> {
    /// Number of bases this hit removes from the adapter window.
    pub fn removed_len(&self) -> usize {
        let from_front = |m: &Match| m.read_end - self.window.start;
        let from_back = |m: &Match| self.window.end - m.read_start;
        match &self.hit {
            Hit::Front(m) => from_front(m),
            Hit::Back(m) => from_back(m),
            Hit::Linked { front, back } => {
                front.as_ref().map_or(0, from_front) + back.as_ref().map_or(0, from_back)
            }
        }
    }
}

/// The configured adapters, in configuration order, and the pass limit.
#[derive(Debug)]
pub struct AdapterSelector {
    adapters: Vec<Adapter>,
    times: usize,
}

impl AdapterSelector {
    pub fn new(adapters: Vec<Adapter>, times: usize) -> Self {
        AdapterSelector {
            adapters,
            times: times.max(1),
        }
    }

    pub fn adapters(&self) -> &[Adapter] {
        &self.adapters
    }

    pub fn times(&self) -> usize {
        self.times
    }

    /// Best hit over all adapters within `window` of `read`. Ties go to the
    /// adapter configured first.
    pub fn best_hit(
        &self,
        aligner: &mut Aligner,
        read: &[u8],
        window: Range<usize>,
    ) -> Option<AdapterHit<'_>> {
        let mut best: Option<AdapterHit<'_>> = None;
        for adapter in &self.adapters {
            let Some(hit) = match_adapter(adapter, aligner, read, window.clone()) else {
                continue;
            };
            let better = match &best {
                Some(current) => hit.rank(&current.hit) == Ordering::Greater,
                None => true,
            };
            if better {
                best = Some(AdapterHit {
                    adapter,
                    hit,
                    window: window.clone(),
                });
            }
        }
        best
    }

    /// Run up to `times` passes over the read, trimming the best hit of each
    /// pass through `state`. Stops at the first pass without a hit.
    pub fn trim_adapters(
        &self,
        aligner: &mut Aligner,
        read: &[u8],
        state: &mut TrimState,
    ) -> Vec<AdapterHit<'_>> {
        let mut hits = Vec::new();
        for _ in 0..self.times {
            let window = state.window();
            if window.is_empty() {
                break;
            }
            match self.best_hit(aligner, read, window) {
                Some(hit) => {
                    hit.hit.apply(state);
                    hits.push(hit);
                }
                None => break,
            }
        }
        hits
    }
}

fn match_adapter(
    adapter: &Adapter,
    aligner: &mut Aligner,
    read: &[u8],
    window: Range<usize>,
) -> Option<Hit> {
    let params = adapter.params();
    let offset = window.start;
    let seq = &read[window];

    let hit = match adapter.kind() {
        AdapterKind::Front(leg) => Hit::Front(aligner.locate(leg, params, seq)?.offset_by(offset)),
        AdapterKind::Back(leg) => Hit::Back(aligner.locate(leg, params, seq)?.offset_by(offset)),
        AdapterKind::Anywhere(leg) => {
            let m = aligner.locate(leg, params, seq)?;
            if m.read_start == 0 {
                Hit::Front(m.offset_by(offset))
            } else {
                Hit::Back(m.offset_by(offset))
            }
        }
        AdapterKind::Linked {
            front: front_leg,
            back: back_leg,
            policy,
        } => {
            let front = aligner.locate(front_leg, params, seq);
            if front.is_none() && *policy == LinkedPolicy::RequireBoth {
                return None;
            }
            let back_offset = front.map_or(0, |m| m.read_end);
            let back = aligner
                .locate(back_leg, params, &seq[back_offset..])
                .map(|m| m.offset_by(back_offset));

            let accepted = match policy {
                LinkedPolicy::RequireBoth => back.is_some(),
                LinkedPolicy::AllowSingle => front.is_some() || back.is_some(),
            };
            if !accepted {
                return None;
            }
            Hit::Linked {
                front: front.map(|m| m.offset_by(offset)),
                back: back.map(|m| m.offset_by(offset)),
            }
        }
    };
    Some(hit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::MatchParams;
    use crate::compiler::{AdapterType, NoSequenceSource, PatternCompiler};
    use crate::trimmer::Action;
    use pretty_assertions::assert_eq;

    fn selector(
        specs: &[(AdapterType, &str)],
        policy: LinkedPolicy,
        times: usize,
    ) -> AdapterSelector {
        let mut compiler = PatternCompiler::new(MatchParams::default(), policy, &NoSequenceSource);
        let adapters = specs
            .iter()
            .flat_map(|(t, s)| compiler.compile(*t, s).unwrap())
            .collect();
        AdapterSelector::new(adapters, times)
    }

    fn run<'a>(selector: &'a AdapterSelector, read: &[u8]) -> (Vec<AdapterHit<'a>>, TrimState) {
        let mut state = TrimState::new(read.len(), Action::Trim);
        let hits = selector.trim_adapters(&mut Aligner::new(), read, &mut state);
        (hits, state)
    }

    #[test]
    fn test_front_adapter_removal() {
        let selector = selector(
            &[(AdapterType::Front, "ACGTTTGCAAGG")],
            LinkedPolicy::AllowSingle,
            1,
        );
        let read = b"ACGTTTGCAAGGTTCCAAGGTT";
        let (hits, state) = run(&selector, read);
        assert_eq!(hits.len(), 1);
        assert_eq!(state.materialize(read), b"TTCCAAGGTT".to_vec());
        assert_eq!(state.rest(read), b"ACGTTTGCAAGG");
        assert_eq!(hits[0].removed_len(), 12);
    }

    #[test]
    fn test_best_adapter_wins() {
        // the second adapter aligns fully, the first only partially
        let selector = selector(
            &[
                (AdapterType::Back, "first=GGGGCCCCAATT"),
                (AdapterType::Back, "second=AGATCGGAAGAGC"),
            ],
            LinkedPolicy::AllowSingle,
            1,
        );
        let read = b"TTTTTTTTTTAGATCGGAAGAGCTTGGGGCC";
        let (hits, state) = run(&selector, read);
        assert_eq!(hits[0].adapter.name(), "second");
        assert_eq!(state.window(), 0..10);
    }

    #[test]
    fn test_ties_go_to_first_adapter() {
        let selector = selector(
            &[
                (AdapterType::Back, "a=CCGGAATT"),
                (AdapterType::Back, "b=CCGGAATT"),
            ],
            LinkedPolicy::AllowSingle,
            1,
        );
        let (hits, _) = run(&selector, b"ACACACACCCGGAATTAC");
        assert_eq!(hits[0].adapter.name(), "a");
    }

    #[test]
    fn test_times() {
        let read = b"TTTTTTTTTTAGATCGGAAGCCAGATCGGAAGCCAGATCGGAAG";
        let once = selector(&[(AdapterType::Back, "AGATCGGAAG")], LinkedPolicy::AllowSingle, 1);
        let (hits, state) = run(&once, read);
        assert_eq!(hits.len(), 1);
        assert_eq!(state.window(), 0..10);

        let front = selector(&[(AdapterType::Front, "AGATCGGAAG")], LinkedPolicy::AllowSingle, 3);
        let read = b"AGATCGGAAGAGATCGGAAGTTTTTTTT";
        let (hits, state) = run(&front, read);
        assert_eq!(hits.len(), 2);
        assert_eq!(state.materialize(read), b"TTTTTTTT".to_vec());
        // the rest covers both removed copies
        assert_eq!(state.rest(read), b"AGATCGGAAGAGATCGGAAG");
    }

    #[test]
    fn test_anywhere() {
        let selector = selector(
            &[(AdapterType::Anywhere, "ACGGATCCTT")],
            LinkedPolicy::AllowSingle,
            1,
        );

        let read = b"ACGGATCCTTGGGGGGGG";
        let (hits, state) = run(&selector, read);
        assert!(matches!(hits[0].hit, Hit::Front(_)));
        assert_eq!(state.materialize(read), b"GGGGGGGG".to_vec());

        let read = b"GGGGGGGGACGGATCCTTGG";
        let (hits, state) = run(&selector, read);
        assert!(matches!(hits[0].hit, Hit::Back(_)));
        assert_eq!(state.materialize(read), b"GGGGGGGG".to_vec());
    }

    #[test]
    fn test_linked_both_legs() {
        let selector = selector(
            &[(AdapterType::Back, "AAAAAAAAAA...TTTTTTTTTT")],
            LinkedPolicy::RequireBoth,
            1,
        );
        let read = b"AAAAAAAAAACCCCGGGGCCCCGGGGTTTTTTTTTTACGT";
        let (hits, state) = run(&selector, read);
        assert_eq!(hits.len(), 1);
        match &hits[0].hit {
            Hit::Linked {
                front: Some(front),
                back: Some(back),
            } => {
                assert_eq!((front.read_start, front.read_end), (0, 10));
                assert_eq!((back.read_start, back.read_end), (26, 36));
            }
            hit => panic!("unexpected hit {hit:?}"),
        }
        assert_eq!(state.materialize(read), b"CCCCGGGGCCCCGGGG".to_vec());
        assert_eq!(hits[0].removed_len(), read.len() - 16);
    }

    #[test]
    fn test_linked_single_leg() {
        let read = b"AAAAAAAAAACCCCGGGGCCCCGGGGACGT";

        let strict = selector(
            &[(AdapterType::Back, "AAAAAAAAAA...TTTTTTTTTT")],
            LinkedPolicy::RequireBoth,
            1,
        );
        let (hits, state) = run(&strict, read);
        assert!(hits.is_empty());
        assert_eq!(state.window(), 0..read.len());

        let relaxed = selector(
            &[(AdapterType::Back, "AAAAAAAAAA...TTTTTTTTTT")],
            LinkedPolicy::AllowSingle,
            1,
        );
        let (hits, state) = run(&relaxed, read);
        assert_eq!(
            hits[0].hit,
            Hit::Linked {
                front: Some(Match {
                    read_start: 0,
                    read_end: 10,
                    adapter_start: 0,
                    adapter_end: 10,
                    errors: 0
                }),
                back: None
            }
        );
        assert_eq!(state.materialize(read), b"CCCCGGGGCCCCGGGGACGT".to_vec());
    }

    #[test]
    fn test_no_adapter() {
        let selector = selector(
            &[(AdapterType::Back, "AGATCGGAAGAGC")],
            LinkedPolicy::AllowSingle,
            2,
        );
        let (hits, state) = run(&selector, b"CCCCCCCCCCCCCCCCCCCC");
        assert!(hits.is_empty());
        assert_eq!(state.window(), 0..20);

        let (hits, _) = run(&selector, b"");
        assert!(hits.is_empty());
    }
}
