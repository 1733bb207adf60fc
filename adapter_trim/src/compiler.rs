// Copyright (c) 2018 10x Genomics, Inc. All rights reserved.
//! Compile adapter specification strings into [`Adapter`]s.
//!
//! Accepted syntax, for each of the three adapter types:
//! * `name=SEQ`: give the adapter a name, otherwise `1`, `2`, ... are assigned
//! * `file:LOCATION`: one adapter per record of a [`SequenceSource`] list
//! * `A{10}`: repeat the preceding symbol
//! * `^SEQ` / `SEQ$`: anchor the adapter to the read start / end
//! * `FRONT...BACK`: a linked adapter
//!
//! ```rust
//! use adapter_trim::{AdapterKind, AdapterType, LinkedPolicy, MatchParams};
//! use adapter_trim::{NoSequenceSource, PatternCompiler};
//!
//! let mut compiler =
//!     PatternCompiler::new(MatchParams::default(), LinkedPolicy::AllowSingle, &NoSequenceSource);
//! let adapters = compiler.compile(AdapterType::Back, "polya=A{5}$").unwrap();
//! assert_eq!(adapters[0].name(), "polya");
//! match adapters[0].kind() {
//!     AdapterKind::Back(leg) => {
//!         assert_eq!(leg.seq(), b"AAAAA");
//!         assert!(leg.is_anchored());
//!     }
//!     _ => unreachable!(),
//! }
//! ```

use crate::adapter::{Adapter, AdapterKind, Leg, LinkedPolicy, MatchParams, Placement};
use crate::errors::ConfigurationError;
use crate::iupac::normalize_adapter;
use anyhow::{anyhow, Context};
use bio::io::fasta;
use fxhash::FxHashSet;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

const FILE_PREFIX: &str = "file:";
const LINK_SEPARATOR: &str = "...";
/// Upper bound on the length of an adapter after repeat expansion.
const MAX_EXPANDED_LEN: usize = 10_000;

/// How an adapter was configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdapterType {
    /// 3' adapter
    #[serde(rename = "back")]
    Back,
    /// 5' adapter
    #[serde(rename = "front")]
    Front,
    /// 5' or 3' adapter, decided per read
    #[serde(rename = "anywhere")]
    Anywhere,
}

/// One record of an external adapter list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedSequence {
    pub name: String,
    pub seq: String,
}

impl NamedSequence {
    pub fn new(name: impl ToString, seq: impl ToString) -> Self {
        NamedSequence {
            name: name.to_string(),
            seq: seq.to_string(),
        }
    }
}

/// Supplies adapter bodies for `file:` specifications.
pub trait SequenceSource {
    fn records(&self, location: &str) -> anyhow::Result<Vec<NamedSequence>>;
}

/// Rejects every `file:` specification.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSequenceSource;

impl SequenceSource for NoSequenceSource {
    fn records(&self, location: &str) -> anyhow::Result<Vec<NamedSequence>> {
        Err(anyhow!("no adapter list source is configured for '{location}'"))
    }
}

/// Reads `file:` locations as FASTA paths.
#[derive(Debug, Clone, Copy, Default)]
pub struct FastaFile;

impl SequenceSource for FastaFile {
    fn records(&self, location: &str) -> anyhow::Result<Vec<NamedSequence>> {
        let path = Path::new(location);
        let reader = fasta::Reader::from_file(path)?;
        reader
            .records()
            .map(|rec| {
                let rec = rec.with_context(|| format!("reading FASTA record from {location}"))?;
                Ok(NamedSequence {
                    name: rec.id().to_string(),
                    seq: String::from_utf8_lossy(rec.seq()).into_owned(),
                })
            })
            .collect()
    }
}

/// In-memory adapter lists, keyed by location.
impl<S: std::hash::BuildHasher> SequenceSource for HashMap<String, Vec<NamedSequence>, S> {
    fn records(&self, location: &str) -> anyhow::Result<Vec<NamedSequence>> {
        self.get(location)
            .cloned()
            .ok_or_else(|| anyhow!("unknown adapter list '{location}'"))
    }
}

/// Compiles specification strings, keeping track of the names in use.
pub struct PatternCompiler<'s> {
    params: MatchParams,
    linked_policy: LinkedPolicy,
    source: &'s dyn SequenceSource,
    names: FxHashSet<String>,
    next_auto_name: usize,
}

impl<'s> PatternCompiler<'s> {
    pub fn new(
        params: MatchParams,
        linked_policy: LinkedPolicy,
        source: &'s dyn SequenceSource,
    ) -> Self {
        PatternCompiler {
            params,
            linked_policy,
            source,
            names: FxHashSet::default(),
            next_auto_name: 1,
        }
    }

    /// Compile one specification string. A `file:` specification yields one
    /// adapter per record; everything else yields exactly one adapter.
    pub fn compile(
        &mut self,
        adapter_type: AdapterType,
        spec: &str,
    ) -> Result<Vec<Adapter>, ConfigurationError> {
        let (name, body) = split_name(spec);

        if let Some(location) = body.strip_prefix(FILE_PREFIX) {
            if name.is_some() {
                return Err(ConfigurationError::NamedAdapterList {
                    adapter: spec.to_string(),
                });
            }
            let location = location.trim();
            let records =
                self.source
                    .records(location)
                    .map_err(|e| ConfigurationError::SequenceSource {
                        location: location.to_string(),
                        message: format!("{e:#}"),
                    })?;
            debug!("{} adapter(s) listed in {location}", records.len());

            return records
                .into_iter()
                .map(|rec| {
                    let name = Some(rec.name.trim().to_string()).filter(|n| !n.is_empty());
                    self.compile_one(adapter_type, name, rec.seq.trim())
                })
                .collect();
        }

        Ok(vec![self.compile_one(adapter_type, name, body)?])
    }

    fn compile_one(
        &mut self,
        adapter_type: AdapterType,
        name: Option<String>,
        body: &str,
    ) -> Result<Adapter, ConfigurationError> {
        let expanded = expand_repeats(body)?;
        let kind = match expanded.split_once(LINK_SEPARATOR) {
            Some((front, back)) => self.linked_kind(adapter_type, &expanded, front, back)?,
            None => self.plain_kind(adapter_type, &expanded)?,
        };

        let name = self.assign_name(name)?;
        let adapter = Adapter::new(name, kind, self.params);
        debug!("compiled adapter {}: {:?}", adapter.name(), adapter.kind());
        for len in leg_lengths(adapter.kind()) {
            if len < self.params.min_overlap {
                warn!(
                    "adapter '{}' has a leg of {len} bases, shorter than the minimum overlap {}",
                    adapter.name(),
                    self.params.min_overlap
                );
            }
        }
        Ok(adapter)
    }

    fn plain_kind(
        &self,
        adapter_type: AdapterType,
        spec: &str,
    ) -> Result<AdapterKind, ConfigurationError> {
        let (seq, front_anchor) = match spec.strip_prefix('^') {
            Some(rest) => (rest, true),
            None => (spec, false),
        };
        let (seq, back_anchor) = match seq.strip_suffix('$') {
            Some(rest) => (rest, true),
            None => (seq, false),
        };

        let conflict = |reason| ConfigurationError::ConflictingAnchors {
            adapter: spec.to_string(),
            reason,
        };

        let kind = match adapter_type {
            AdapterType::Anywhere => {
                if front_anchor || back_anchor {
                    return Err(ConfigurationError::AnchoredAnywhere {
                        adapter: spec.to_string(),
                    });
                }
                AdapterKind::Anywhere(self.leg(spec, seq, Placement::Anywhere, false)?)
            }
            _ if front_anchor && back_anchor => {
                return Err(conflict("'^' and '$' cannot both be given"));
            }
            AdapterType::Back => {
                if front_anchor {
                    return Err(conflict("a 3' adapter cannot be anchored with '^'"));
                }
                AdapterKind::Back(self.leg(spec, seq, Placement::Back, back_anchor)?)
            }
            AdapterType::Front => {
                if back_anchor {
                    return Err(conflict("a 5' adapter cannot be anchored with '$'"));
                }
                AdapterKind::Front(self.leg(spec, seq, Placement::Front, front_anchor)?)
            }
        };
        Ok(kind)
    }

    fn linked_kind(
        &self,
        adapter_type: AdapterType,
        spec: &str,
        front: &str,
        back: &str,
    ) -> Result<AdapterKind, ConfigurationError> {
        if adapter_type == AdapterType::Anywhere {
            return Err(ConfigurationError::LinkedAnywhere {
                adapter: spec.to_string(),
            });
        }
        let conflict = |reason| ConfigurationError::ConflictingAnchors {
            adapter: spec.to_string(),
            reason,
        };

        let (front, front_anchor) = match front.strip_prefix('^') {
            Some(rest) => (rest, true),
            None => (front, false),
        };
        let (back, back_anchor) = match back.strip_suffix('$') {
            Some(rest) => (rest, true),
            None => (back, false),
        };
        if front.ends_with('$') {
            return Err(conflict("the 5' part of a linked adapter cannot end with '$'"));
        }
        if back.starts_with('^') {
            return Err(conflict("the 3' part of a linked adapter cannot start with '^'"));
        }

        let kind = match (front.is_empty(), back.is_empty()) {
            (true, true) => {
                return Err(ConfigurationError::EmptyAdapter {
                    adapter: spec.to_string(),
                })
            }
            // `...SEQ`: only a 3' part
            (true, false) => {
                if front_anchor {
                    return Err(conflict("'^' is not followed by a sequence"));
                }
                AdapterKind::Back(self.leg(spec, back, Placement::Back, back_anchor)?)
            }
            // `SEQ...`: only a 5' part, anchored for 3' adapter types
            (false, true) => {
                if back_anchor {
                    return Err(conflict("'$' is not preceded by a sequence"));
                }
                let anchored = front_anchor || adapter_type == AdapterType::Back;
                AdapterKind::Front(self.leg(spec, front, Placement::Front, anchored)?)
            }
            (false, false) => {
                let anchored = front_anchor || adapter_type == AdapterType::Back;
                AdapterKind::Linked {
                    front: self.leg(spec, front, Placement::Front, anchored)?,
                    back: self.leg(spec, back, Placement::Back, back_anchor)?,
                    policy: self.linked_policy,
                }
            }
        };
        Ok(kind)
    }

    fn leg(
        &self,
        spec: &str,
        seq: &str,
        placement: Placement,
        anchored: bool,
    ) -> Result<Leg, ConfigurationError> {
        let normalized =
            normalize_adapter(seq).map_err(|character| ConfigurationError::InvalidCharacter {
                adapter: spec.to_string(),
                character,
            })?;
        if normalized.is_empty() {
            return Err(ConfigurationError::EmptyAdapter {
                adapter: spec.to_string(),
            });
        }
        Ok(Leg::new(normalized, placement, anchored, &self.params))
    }

    fn assign_name(&mut self, name: Option<String>) -> Result<String, ConfigurationError> {
        match name {
            Some(name) => {
                if !self.names.insert(name.clone()) {
                    return Err(ConfigurationError::DuplicateName { name });
                }
                Ok(name)
            }
            None => loop {
                let candidate = self.next_auto_name.to_string();
                self.next_auto_name += 1;
                if self.names.insert(candidate.clone()) {
                    return Ok(candidate);
                }
            },
        }
    }
}

fn leg_lengths(kind: &AdapterKind) -> impl Iterator<Item = usize> + '_ {
    let (first, second) = kind.legs();
    std::iter::once(first).chain(second).map(Leg::len)
}

/// Split off an optional `name=` prefix.
fn split_name(spec: &str) -> (Option<String>, &str) {
    match spec.split_once('=') {
        Some((name, body)) => {
            let name = name.trim();
            let name = (!name.is_empty()).then(|| name.to_string());
            (name, body.trim())
        }
        None => (None, spec.trim()),
    }
}

/// Expand `X{N}` into N copies of `X`.
fn expand_repeats(spec: &str) -> Result<String, ConfigurationError> {
    let malformed = |reason: &str| ConfigurationError::MalformedRepeat {
        adapter: spec.to_string(),
        reason: reason.to_string(),
    };

    let mut result = String::with_capacity(spec.len());
    let mut chars = spec.chars();
    while let Some(c) = chars.next() {
        match c {
            '{' => {
                let symbol = result
                    .pop()
                    .filter(|s| s.is_ascii_alphabetic())
                    .ok_or_else(|| malformed("'{' must follow a sequence character"))?;
                let mut digits = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some(d) if d.is_ascii_digit() => digits.push(d),
                        Some(_) => return Err(malformed("repeat count must be a number")),
                        None => return Err(malformed("missing '}'")),
                    }
                }
                let count: usize = digits
                    .parse()
                    .map_err(|_| malformed("repeat count must be a number"))?;
                if result.len().saturating_add(count) > MAX_EXPANDED_LEN {
                    return Err(malformed(&format!(
                        "expands to more than {MAX_EXPANDED_LEN} bases"
                    )));
                }
                result.extend(std::iter::repeat(symbol).take(count));
            }
            '}' => return Err(malformed("unmatched '}'")),
            _ => result.push(c),
        }
    }
    Ok(result)
}
