// Copyright (c) 2018 10x Genomics, Inc. All rights reserved.
//! Input reads, per-read output records and header edits.

use crate::adapter::Leg;
use crate::aligner::Match;
use crate::errors::ConfigurationError;
use crate::filter::Classification;
use crate::selector::{AdapterHit, Hit};
use regex::{NoExpand, Regex};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;

/// Placeholder in header prefixes and suffixes, replaced by the adapter name.
pub const NAME_PLACEHOLDER: &str = "{name}";
/// Substituted for [`NAME_PLACEHOLDER`] when no adapter matched.
pub const NO_ADAPTER: &str = "no_adapter";

/// A decoded read, as delivered by the reader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Read {
    pub id: String,
    pub seq: Vec<u8>,
    pub qual: Option<Vec<u8>>,
    /// Filter flag taken from the header by the reader
    pub flagged: bool,
}

impl Read {
    pub fn new(id: impl ToString, seq: Vec<u8>, qual: Option<Vec<u8>>) -> Self {
        Read {
            id: id.to_string(),
            seq,
            qual,
            flagged: false,
        }
    }

    /// Set the filter flag from a Casava 1.8 header.
    pub fn with_casava_flag(mut self) -> Self {
        self.flagged = casava_filtered(&self.id);
        self
    }

    pub fn len(&self) -> usize {
        self.seq.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seq.is_empty()
    }
}

/// True for Casava 1.8 headers such as `r1 1:Y:18:ATCACG` that mark the read
/// as filtered.
pub fn casava_filtered(header: &str) -> bool {
    header
        .split_once(' ')
        .is_some_and(|(_, right)| right.get(1..4) == Some(":Y:"))
}

/// Output bucket of a read.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DemuxKey {
    Adapter(String),
    /// No adapter matched
    Unknown,
}

impl DemuxKey {
    pub const UNKNOWN: &'static str = "unknown";

    pub fn new(adapter_name: Option<&str>) -> Self {
        match adapter_name {
            Some(name) => DemuxKey::Adapter(name.to_string()),
            None => DemuxKey::Unknown,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            DemuxKey::Adapter(name) => name,
            DemuxKey::Unknown => Self::UNKNOWN,
        }
    }
}

impl fmt::Display for DemuxKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Qualities split like the sequence of a [`InfoRecord::Matched`] line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QualParts {
    pub before: Vec<u8>,
    pub matched: Vec<u8>,
    pub after: Vec<u8>,
}

/// One trace line per adapter occurrence, or one for a read without any.
/// Positions are relative to the sequence that was searched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum InfoRecord {
    Matched {
        read_id: String,
        errors: usize,
        read_start: usize,
        read_end: usize,
        before: Vec<u8>,
        matched: Vec<u8>,
        after: Vec<u8>,
        adapter_name: String,
        qual: Option<QualParts>,
        /// Read bases aligned to ambiguous adapter positions
        wildcards: Vec<u8>,
    },
    Unmatched {
        read_id: String,
        seq: Vec<u8>,
        qual: Option<Vec<u8>>,
    },
}

impl InfoRecord {
    fn matched(
        read: &Read,
        qual: Option<&[u8]>,
        m: &Match,
        leg: &Leg,
        searched: Range<usize>,
        adapter_name: String,
    ) -> Self {
        let split = |bytes: &[u8]| {
            (
                bytes[searched.start..m.read_start].to_vec(),
                bytes[m.read_start..m.read_end].to_vec(),
                bytes[m.read_end..searched.end].to_vec(),
            )
        };
        let (before, matched, after) = split(&read.seq);
        let qual = qual.map(|q| {
            let (before, matched, after) = split(q);
            QualParts {
                before,
                matched,
                after,
            }
        });
        InfoRecord::Matched {
            read_id: read.id.clone(),
            errors: m.errors,
            read_start: m.read_start - searched.start,
            read_end: m.read_end - searched.start,
            before,
            matched,
            after,
            adapter_name,
            qual,
            wildcards: m.wildcards(leg.seq(), &read.seq),
        }
    }

    /// Trace records of a read, in the order the hits were found.
    pub(crate) fn for_hits(read: &Read, hits: &[AdapterHit<'_>]) -> Vec<InfoRecord> {
        // qualities that do not line up with the sequence are left out
        let qual = read.qual.as_deref().filter(|q| q.len() == read.len());
        if hits.is_empty() {
            return vec![InfoRecord::Unmatched {
                read_id: read.id.clone(),
                seq: read.seq.clone(),
                qual: qual.map(<[u8]>::to_vec),
            }];
        }

        let mut records = Vec::with_capacity(hits.len());
        for hit in hits {
            let name = hit.adapter.name();
            let (first_leg, second_leg) = hit.adapter.kind().legs();
            let window = hit.window.clone();
            match &hit.hit {
                Hit::Front(m) | Hit::Back(m) => {
                    records.push(InfoRecord::matched(
                        read,
                        qual,
                        m,
                        first_leg,
                        window,
                        name.to_string(),
                    ));
                }
                Hit::Linked { front, back } => {
                    let mut back_window = window.clone();
                    if let Some(m) = front {
                        back_window.start = m.read_end;
                        records.push(InfoRecord::matched(
                            read,
                            qual,
                            m,
                            first_leg,
                            window,
                            format!("{name};1"),
                        ));
                    }
                    if let (Some(m), Some(leg)) = (back, second_leg) {
                        records.push(InfoRecord::matched(
                            read,
                            qual,
                            m,
                            leg,
                            back_window,
                            format!("{name};2"),
                        ));
                    }
                }
            }
        }
        records
    }

    /// Read bases aligned to ambiguous adapter positions, followed by the
    /// read id, as in a wildcard report. `None` for unmatched reads.
    pub fn wildcard_line(&self) -> Option<String> {
        match self {
            InfoRecord::Matched {
                read_id, wildcards, ..
            } => Some(format!("{} {read_id}", String::from_utf8_lossy(wildcards))),
            InfoRecord::Unmatched { .. } => None,
        }
    }
}

impl fmt::Display for InfoRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = |bytes: &[u8]| String::from_utf8_lossy(bytes).into_owned();
        match self {
            InfoRecord::Matched {
                read_id,
                errors,
                read_start,
                read_end,
                before,
                matched,
                after,
                adapter_name,
                qual,
                ..
            } => {
                write!(
                    f,
                    "{read_id}\t{errors}\t{read_start}\t{read_end}\t{}\t{}\t{}\t{adapter_name}",
                    text(before),
                    text(matched),
                    text(after)
                )?;
                if let Some(q) = qual {
                    write!(
                        f,
                        "\t{}\t{}\t{}",
                        text(&q.before),
                        text(&q.matched),
                        text(&q.after)
                    )?;
                }
                Ok(())
            }
            InfoRecord::Unmatched { read_id, seq, qual } => {
                write!(f, "{read_id}\t-1\t{}", text(seq))?;
                if let Some(q) = qual {
                    write!(f, "\t{}", text(q))?;
                }
                Ok(())
            }
        }
    }
}

/// Everything the writer needs to know about one processed read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrimmedRead {
    pub id: String,
    pub seq: Vec<u8>,
    pub qual: Option<Vec<u8>>,
    /// Sequence removed by adapter trimming
    pub rest: Vec<u8>,
    /// First adapter found in the read
    pub adapter_name: Option<String>,
    pub classification: Classification,
    /// Dropped by a discard-trimmed or discard-untrimmed policy
    pub discarded: bool,
    pub info: Vec<InfoRecord>,
}

impl TrimmedRead {
    /// Passed every filter and is not discarded.
    pub fn is_written(&self) -> bool {
        self.classification.is_pass() && !self.discarded
    }

    pub fn demux_key(&self) -> DemuxKey {
        DemuxKey::new(self.adapter_name.as_deref())
    }

    /// Tab-separated trace lines.
    pub fn info_lines(&self) -> Vec<String> {
        self.info.iter().map(ToString::to_string).collect()
    }

    /// Wildcard report line of the last adapter occurrence.
    pub fn wildcard_line(&self) -> Option<String> {
        self.info.iter().rev().find_map(InfoRecord::wildcard_line)
    }
}

/// Edits applied to read ids after trimming.
#[derive(Debug, Clone, Default)]
pub struct HeaderEditor {
    length_tag: Option<(String, Regex)>,
    strip_suffix: Vec<String>,
    prefix: String,
    suffix: String,
}

impl HeaderEditor {
    pub fn new(
        length_tag: Option<&str>,
        strip_suffix: Vec<String>,
        prefix: impl ToString,
        suffix: impl ToString,
    ) -> Result<Self, ConfigurationError> {
        let length_tag = match length_tag {
            Some(tag) => {
                let re = Regex::new(&format!("{}[0-9]+", regex::escape(tag))).map_err(|e| {
                    ConfigurationError::InvalidLengthTag {
                        tag: tag.to_string(),
                        message: e.to_string(),
                    }
                })?;
                Some((tag.to_string(), re))
            }
            None => None,
        };
        Ok(HeaderEditor {
            length_tag,
            strip_suffix,
            prefix: prefix.to_string(),
            suffix: suffix.to_string(),
        })
    }

    pub fn is_noop(&self) -> bool {
        self.length_tag.is_none()
            && self.strip_suffix.is_empty()
            && self.prefix.is_empty()
            && self.suffix.is_empty()
    }

    /// Update the length tag to `len`, strip the first matching suffix, then
    /// add the prefix and suffix.
    pub fn apply(&self, id: &str, adapter_name: Option<&str>, len: usize) -> String {
        let mut id = match &self.length_tag {
            Some((tag, re)) => re.replace(id, NoExpand(&format!("{tag}{len}"))).into_owned(),
            None => id.to_string(),
        };

        if let Some(suffix) = self.strip_suffix.iter().find(|s| id.ends_with(s.as_str())) {
            id.truncate(id.len() - suffix.len());
        }

        if self.prefix.is_empty() && self.suffix.is_empty() {
            return id;
        }
        let name = adapter_name.unwrap_or(NO_ADAPTER);
        format!(
            "{}{id}{}",
            self.prefix.replace(NAME_PLACEHOLDER, name),
            self.suffix.replace(NAME_PLACEHOLDER, name)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::{LinkedPolicy, MatchParams};
    use crate::aligner::Aligner;
    use crate::compiler::{AdapterType, NoSequenceSource, PatternCompiler};
    use crate::selector::AdapterSelector;
    use crate::trimmer::{Action, TrimState};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_casava_filtered() {
        assert!(casava_filtered("r1 1:Y:18:ATCACG"));
        assert!(!casava_filtered("r1 1:N:18:ATCACG"));
        assert!(!casava_filtered("r1"));
        assert!(!casava_filtered("r1 1"));
        assert!(Read::new("r1 1:Y:0:AC", b"ACGT".to_vec(), None)
            .with_casava_flag()
            .flagged);
    }

    #[test]
    fn test_demux_key() {
        assert_eq!(DemuxKey::new(Some("first")).as_str(), "first");
        assert_eq!(DemuxKey::new(None).to_string(), "unknown");
    }

    #[test]
    fn test_unmatched_info_line() {
        let read = Read::new("r1", b"ACGT".to_vec(), Some(b"IIII".to_vec()));
        let records = InfoRecord::for_hits(&read, &[]);
        assert_eq!(records[0].to_string(), "r1\t-1\tACGT\tIIII");

        let read = Read::new("r2", b"ACGT".to_vec(), None);
        assert_eq!(InfoRecord::for_hits(&read, &[])[0].to_string(), "r2\t-1\tACGT");

        // qualities of the wrong length are dropped
        let read = Read::new("r3", b"ACGT".to_vec(), Some(b"II".to_vec()));
        let records = InfoRecord::for_hits(&read, &[]);
        assert_eq!(records[0].to_string(), "r3\t-1\tACGT");
        assert_eq!(records[0].wildcard_line(), None);
    }

    #[test]
    fn test_linked_info_lines() {
        let mut compiler = PatternCompiler::new(
            MatchParams::default(),
            LinkedPolicy::AllowSingle,
            &NoSequenceSource,
        );
        let adapters = compiler
            .compile(AdapterType::Back, "lnk=AAAAAAAAAA...TTTTTTTTTT")
            .unwrap();
        let selector = AdapterSelector::new(adapters, 1);

        let seq = b"AAAAAAAAAACCCCGGGGTTTTTTTTTTGG".to_vec();
        let read = Read::new("r1", seq.clone(), Some(vec![b'I'; seq.len()]));
        let mut state = TrimState::new(read.len(), Action::Trim);
        let hits = selector.trim_adapters(&mut Aligner::new(), &read.seq, &mut state);
        let lines: Vec<String> = InfoRecord::for_hits(&read, &hits)
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(
            lines,
            vec![
                format!(
                    "r1\t0\t0\t10\t\tAAAAAAAAAA\tCCCCGGGGTTTTTTTTTTGG\tlnk;1\t\t{}\t{}",
                    "I".repeat(10),
                    "I".repeat(20)
                ),
                format!(
                    "r1\t0\t8\t18\tCCCCGGGG\tTTTTTTTTTT\tGG\tlnk;2\t{}\t{}\tII",
                    "I".repeat(8),
                    "I".repeat(10)
                ),
            ]
        );
    }

    #[test]
    fn test_header_editor() {
        let editor = HeaderEditor::new(
            Some("length="),
            vec!["/1".to_string(), "_suffix".to_string()],
            "{name}_",
            "",
        )
        .unwrap();
        assert_eq!(
            editor.apply("read1 length=100/1", Some("primer"), 42),
            "primer_read1 length=42"
        );
        assert_eq!(editor.apply("read2", None, 42), "no_adapter_read2");

        let plain = HeaderEditor::default();
        assert!(plain.is_noop());
        assert_eq!(plain.apply("r1 length=10", None, 3), "r1 length=10");
    }
}
