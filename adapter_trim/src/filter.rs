// Copyright (c) 2018 10x Genomics, Inc. All rights reserved.
//! Post-trimming filters and the final classification of a read.

use crate::errors::ConfigurationError;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

/// Terminal outcome of a read, which decides its output bucket.
///
/// ```rust
/// use adapter_trim::Classification;
/// use std::str::FromStr;
/// assert_eq!(Classification::TooManyN.to_string(), "too_many_n");
/// assert_eq!(
///     Classification::from_str("filtered_by_flag").unwrap(),
///     Classification::FilteredByFlag
/// );
/// ```
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Classification {
    Trimmed,
    Untrimmed,
    TooShort,
    TooLong,
    TooManyN,
    FilteredByFlag,
}

impl Classification {
    /// Reads in these classes passed every filter.
    pub fn is_pass(self) -> bool {
        matches!(self, Classification::Trimmed | Classification::Untrimmed)
    }
}

/// Upper bound on the number of `N` bases in a read.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MaxN {
    Count(usize),
    /// Fraction of the final read length
    Fraction(f64),
}

impl MaxN {
    /// Values below 1 are fractions, whole numbers from 1 on are counts.
    pub fn new(value: f64) -> Result<MaxN, ConfigurationError> {
        if value.is_nan() || value < 0.0 {
            return Err(ConfigurationError::InvalidMaxN(value));
        }
        if value < 1.0 {
            Ok(MaxN::Fraction(value))
        } else if value.fract() == 0.0 {
            Ok(MaxN::Count(value as usize))
        } else {
            Err(ConfigurationError::InvalidMaxN(value))
        }
    }

    /// True if `seq` has more `N`s than allowed. The bound is inclusive.
    pub fn exceeded(&self, seq: &[u8]) -> bool {
        let n_count = seq.iter().filter(|b| b.eq_ignore_ascii_case(&b'N')).count();
        match *self {
            MaxN::Count(max) => n_count > max,
            MaxN::Fraction(fraction) => {
                !seq.is_empty() && n_count as f64 / seq.len() as f64 > fraction
            }
        }
    }
}

/// Discard reads depending on whether an adapter was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DiscardPolicy {
    #[default]
    #[serde(rename = "keep")]
    Keep,
    #[serde(rename = "discard_trimmed")]
    DiscardTrimmed,
    #[serde(rename = "discard_untrimmed")]
    DiscardUntrimmed,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReadFilter {
    pub minimum_length: Option<usize>,
    pub maximum_length: Option<usize>,
    pub max_n: Option<MaxN>,
    pub discard: DiscardPolicy,
    /// Drop reads whose header carries the filter flag
    pub discard_flagged: bool,
}

impl ReadFilter {
    /// Classify a fully trimmed read. The second value is true when the read
    /// is dropped by the discard policy, in which case it keeps its
    /// `Trimmed`/`Untrimmed` class.
    pub fn classify(&self, seq: &[u8], trimmed: bool, flagged: bool) -> (Classification, bool) {
        let len = seq.len();
        if self.minimum_length.is_some_and(|min| len < min) {
            return (Classification::TooShort, false);
        }
        if self.maximum_length.is_some_and(|max| len > max) {
            return (Classification::TooLong, false);
        }
        if self.max_n.is_some_and(|max_n| max_n.exceeded(seq)) {
            return (Classification::TooManyN, false);
        }

        let class = if trimmed {
            Classification::Trimmed
        } else {
            Classification::Untrimmed
        };
        let discarded = match self.discard {
            DiscardPolicy::Keep => false,
            DiscardPolicy::DiscardTrimmed => trimmed,
            DiscardPolicy::DiscardUntrimmed => !trimmed,
        };
        if discarded {
            return (class, true);
        }
        if self.discard_flagged && flagged {
            return (Classification::FilteredByFlag, false);
        }
        (class, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_max_n_new() {
        assert_eq!(MaxN::new(0.2).unwrap(), MaxN::Fraction(0.2));
        assert_eq!(MaxN::new(0.0).unwrap(), MaxN::Fraction(0.0));
        assert_eq!(MaxN::new(3.0).unwrap(), MaxN::Count(3));
        assert!(MaxN::new(2.5).is_err());
        assert!(MaxN::new(-1.0).is_err());
    }

    #[test]
    fn test_max_n_fraction_is_inclusive() {
        let max_n = MaxN::Fraction(0.2);
        assert!(!max_n.exceeded(b"NNACGTACGT"));
        assert!(max_n.exceeded(b"NNNCGTACGT"));
        assert!(!max_n.exceeded(b""));
    }

    #[test]
    fn test_max_n_count() {
        let max_n = MaxN::Count(1);
        assert!(!max_n.exceeded(b"ACGNT"));
        assert!(max_n.exceeded(b"AnGNT"));
        assert!(MaxN::Count(0).exceeded(b"N"));
    }

    #[test]
    fn test_filter_order() {
        let filter = ReadFilter {
            minimum_length: Some(5),
            maximum_length: Some(8),
            max_n: Some(MaxN::Count(0)),
            discard: DiscardPolicy::DiscardUntrimmed,
            discard_flagged: true,
        };
        // too short wins over too many N
        assert_eq!(filter.classify(b"NN", true, true), (Classification::TooShort, false));
        assert_eq!(
            filter.classify(b"ACGTACGTAC", true, true),
            (Classification::TooLong, false)
        );
        assert_eq!(
            filter.classify(b"ACGTNC", true, true),
            (Classification::TooManyN, false)
        );
        assert_eq!(
            filter.classify(b"ACGTAC", false, true),
            (Classification::Untrimmed, true)
        );
        assert_eq!(
            filter.classify(b"ACGTAC", true, true),
            (Classification::FilteredByFlag, false)
        );
        assert_eq!(
            filter.classify(b"ACGTAC", true, false),
            (Classification::Trimmed, false)
        );
    }

    #[test]
    fn test_discard_trimmed() {
        let filter = ReadFilter {
            discard: DiscardPolicy::DiscardTrimmed,
            ..ReadFilter::default()
        };
        assert_eq!(filter.classify(b"ACGT", true, false), (Classification::Trimmed, true));
        assert_eq!(filter.classify(b"ACGT", false, false), (Classification::Untrimmed, false));
        // flags are only honoured when asked for
        assert_eq!(filter.classify(b"ACGT", false, true), (Classification::Untrimmed, false));
    }

    #[test]
    fn test_classification_names() {
        for (class, name) in [
            (Classification::Trimmed, "trimmed"),
            (Classification::Untrimmed, "untrimmed"),
            (Classification::TooShort, "too_short"),
            (Classification::TooLong, "too_long"),
            (Classification::TooManyN, "too_many_n"),
            (Classification::FilteredByFlag, "filtered_by_flag"),
        ] {
            assert_eq!(class.to_string(), name);
            assert_eq!(Classification::from_str(name).unwrap(), class);
            assert_eq!(serde_json::to_string(&class).unwrap(), format!("\"{name}\""));
        }
    }
}
