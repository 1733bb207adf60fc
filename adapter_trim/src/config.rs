// Copyright (c) 2018 10x Genomics, Inc. All rights reserved.
//! Trimming settings, usually read from a TOML file.
//!
//! ```toml
//! back = ["illumina=AGATCGGAAGAGC", "file:adapters.fa"]
//! front = ["^TTAGACATAT"]
//! error_rate = 0.1
//! min_overlap = 3
//! times = 2
//! quality_cutoff = [15, 10]
//! minimum_length = 20
//! ```
//!
//! Every field is optional; missing fields take the defaults of
//! [`TrimConfig::default`].

use crate::adapter::{LinkedPolicy, MatchParams};
use crate::compiler::{AdapterType, PatternCompiler, SequenceSource};
use crate::errors::ConfigurationError;
use crate::filter::{DiscardPolicy, MaxN, ReadFilter};
use crate::pipeline::TrimPipeline;
use crate::record::HeaderEditor;
use crate::selector::AdapterSelector;
use crate::trimmer::{Action, QualityTrimmer, UnconditionalCut};
use anyhow::{Context, Result};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Error rates above this are legal but rarely intended.
const HIGH_ERROR_RATE: f64 = 0.3;

/// `q` trims the 3' end only; `[q5, q3]` trims both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QualityCutoff {
    Back(u8),
    Both(u8, u8),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TrimConfig {
    /// 3' adapter specifications
    pub back: Vec<String>,
    /// 5' adapter specifications
    pub front: Vec<String>,
    /// Adapter specifications that may be 5' or 3'
    pub anywhere: Vec<String>,

    pub error_rate: f64,
    pub min_overlap: usize,
    /// Allow insertions and deletions when aligning
    pub indels: bool,
    pub match_read_wildcards: bool,
    pub match_adapter_wildcards: bool,
    /// Number of adapter trimming passes per read
    pub times: usize,
    pub action: Action,

    /// Unconditional cuts, positive from the 5' end, negative from the 3' end
    pub cut: Vec<i64>,
    pub quality_cutoff: Option<QualityCutoff>,
    /// 3' quality cutoff for two-colour chemistry, replacing the 3' part of `quality_cutoff`
    pub nextseq_trim: Option<u8>,
    pub quality_base: u8,

    pub minimum_length: Option<usize>,
    pub maximum_length: Option<usize>,
    /// Below 1 a fraction of the read length, otherwise a number of bases
    pub max_n: Option<f64>,
    pub discard_trimmed: bool,
    pub discard_untrimmed: bool,
    /// Drop reads flagged as filtered in their Casava 1.8 header
    pub discard_casava: bool,

    /// Shorten reads to this length after adapter trimming, keeping the 3'
    /// end if negative
    pub length: Option<i64>,
    pub length_tag: Option<String>,
    pub strip_suffix: Vec<String>,
    pub prefix: String,
    pub suffix: String,
}

impl Default for TrimConfig {
    fn default() -> Self {
        TrimConfig {
            back: Vec::new(),
            front: Vec::new(),
            anywhere: Vec::new(),
            error_rate: 0.1,
            min_overlap: 3,
            indels: true,
            match_read_wildcards: false,
            match_adapter_wildcards: true,
            times: 1,
            action: Action::Trim,
            cut: Vec::new(),
            quality_cutoff: None,
            nextseq_trim: None,
            quality_base: 33,
            minimum_length: None,
            maximum_length: None,
            max_n: None,
            discard_trimmed: false,
            discard_untrimmed: false,
            discard_casava: false,
            length: None,
            length_tag: None,
            strip_suffix: Vec::new(),
            prefix: String::new(),
            suffix: String::new(),
        }
    }
}

impl TrimConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading trimming configuration {}", path.display()))?;
        TrimConfig::from_toml(&contents).with_context(|| path.display().to_string())
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: TrimConfig = toml::from_str(contents)?;
        config.log_non_defaults();
        Ok(config)
    }

    fn log_non_defaults(&self) {
        let (Ok(toml::Value::Table(ours)), Ok(toml::Value::Table(defaults))) = (
            toml::Value::try_from(self),
            toml::Value::try_from(TrimConfig::default()),
        ) else {
            return;
        };
        for (key, value) in ours {
            if defaults.get(&key) != Some(&value) {
                info!("trimming setting {key} = {value}");
            }
        }
    }

    pub fn match_params(&self) -> MatchParams {
        MatchParams {
            max_error_rate: self.error_rate,
            min_overlap: self.min_overlap,
            indels: self.indels,
            read_wildcards: self.match_read_wildcards,
            adapter_wildcards: self.match_adapter_wildcards,
        }
    }

    pub fn discard_policy(&self) -> DiscardPolicy {
        match (self.discard_trimmed, self.discard_untrimmed) {
            (true, _) => DiscardPolicy::DiscardTrimmed,
            (false, true) => DiscardPolicy::DiscardUntrimmed,
            (false, false) => DiscardPolicy::Keep,
        }
    }

    /// Check the settings that do not depend on adapter specifications.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if !(0.0..1.0).contains(&self.error_rate) {
            return Err(ConfigurationError::InvalidErrorRate(self.error_rate));
        }
        if self.error_rate > HIGH_ERROR_RATE {
            warn!(
                "error rate {} is unusually high, adapters may match random sequence",
                self.error_rate
            );
        }
        if self.min_overlap == 0 {
            return Err(ConfigurationError::InvalidMinOverlap);
        }
        if self.times == 0 {
            return Err(ConfigurationError::InvalidTimes);
        }
        let positive = self.cut.iter().filter(|&&c| c > 0).count();
        let negative = self.cut.iter().filter(|&&c| c < 0).count();
        if positive > 1 || negative > 1 {
            return Err(ConfigurationError::InvalidCut(self.cut.clone()));
        }
        if self.quality_base != 33 && self.quality_base != 64 {
            return Err(ConfigurationError::InvalidQualityBase(self.quality_base));
        }
        if self.discard_trimmed && self.discard_untrimmed {
            return Err(ConfigurationError::ConflictingDiscard);
        }
        if let Some(max_n) = self.max_n {
            MaxN::new(max_n)?;
        }
        Ok(())
    }

    fn quality_trimmer(&self) -> Option<QualityTrimmer> {
        let (front, back) = match self.quality_cutoff {
            Some(QualityCutoff::Back(back)) => (0, back),
            Some(QualityCutoff::Both(front, back)) => (front, back),
            None => (0, 0),
        };
        let trimmer = QualityTrimmer {
            front_cutoff: front,
            back_cutoff: self.nextseq_trim.unwrap_or(back),
            two_colour: self.nextseq_trim.is_some(),
            base: self.quality_base,
        };
        (trimmer.front_cutoff > 0 || trimmer.back_cutoff > 0).then_some(trimmer)
    }

    /// Validate the settings, compile the adapters and assemble the pipeline.
    /// `source` resolves `file:` adapter specifications.
    pub fn build(&self, source: &dyn SequenceSource) -> Result<TrimPipeline, ConfigurationError> {
        self.validate()?;

        let linked_policy = if self.discard_untrimmed {
            LinkedPolicy::RequireBoth
        } else {
            LinkedPolicy::AllowSingle
        };
        let mut compiler = PatternCompiler::new(self.match_params(), linked_policy, source);
        let mut adapters = Vec::new();
        for (adapter_type, specs) in [
            (AdapterType::Back, &self.back),
            (AdapterType::Front, &self.front),
            (AdapterType::Anywhere, &self.anywhere),
        ] {
            for spec in specs {
                adapters.extend(compiler.compile(adapter_type, spec)?);
            }
        }

        let filter = ReadFilter {
            minimum_length: self.minimum_length,
            maximum_length: self.maximum_length,
            max_n: self.max_n.map(MaxN::new).transpose()?,
            discard: self.discard_policy(),
            discard_flagged: self.discard_casava,
        };
        let headers = HeaderEditor::new(
            self.length_tag.as_deref(),
            self.strip_suffix.clone(),
            &self.prefix,
            &self.suffix,
        )?;

        info!(
            "trimming with {} adapter(s), error rate {}, minimum overlap {}, \
             {} pass(es), action {:?}",
            adapters.len(),
            self.error_rate,
            self.min_overlap,
            self.times,
            self.action
        );

        Ok(TrimPipeline {
            selector: AdapterSelector::new(adapters, self.times),
            action: self.action,
            cut: UnconditionalCut::from_lengths(&self.cut),
            quality: self.quality_trimmer(),
            shorten: self.length,
            headers,
            filter,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::NoSequenceSource;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn test_defaults_from_empty_toml() {
        assert_eq!(TrimConfig::from_toml("").unwrap(), TrimConfig::default());
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
back = ["illumina=AGATCGGAAGAGC"]
front = ["^TTAGACATAT"]
error_rate = 0.15
times = 2
action = "mask"
cut = [5, -3]
quality_cutoff = [15, 10]
max_n = 0.2
discard_untrimmed = true
"#
        )
        .unwrap();
        file.flush().unwrap();

        let config = TrimConfig::from_file(file.path()).unwrap();
        assert_eq!(config.back, vec!["illumina=AGATCGGAAGAGC".to_string()]);
        assert_eq!(config.error_rate, 0.15);
        assert_eq!(config.times, 2);
        assert_eq!(config.action, Action::Mask);
        assert_eq!(config.quality_cutoff, Some(QualityCutoff::Both(15, 10)));
        assert_eq!(config.discard_policy(), DiscardPolicy::DiscardUntrimmed);
        assert_eq!(config.min_overlap, 3);

        let pipeline = config.build(&NoSequenceSource).unwrap();
        assert_eq!(pipeline.selector.adapters().len(), 2);
        assert_eq!(pipeline.cut, UnconditionalCut { front: 5, back: 3 });
        assert_eq!(pipeline.filter.max_n, Some(MaxN::Fraction(0.2)));
    }

    #[test]
    fn test_single_quality_cutoff() {
        let config = TrimConfig::from_toml("quality_cutoff = 20").unwrap();
        assert_eq!(config.quality_cutoff, Some(QualityCutoff::Back(20)));
        let trimmer = config.quality_trimmer().unwrap();
        assert_eq!((trimmer.front_cutoff, trimmer.back_cutoff), (0, 20));
        assert!(!trimmer.two_colour);

        let config = TrimConfig::from_toml("nextseq_trim = 20").unwrap();
        let trimmer = config.quality_trimmer().unwrap();
        assert_eq!((trimmer.back_cutoff, trimmer.two_colour), (20, true));

        assert_eq!(TrimConfig::default().quality_trimmer(), None);
    }

    #[test]
    fn test_unknown_field() {
        assert!(TrimConfig::from_toml("adapter = \"ACGT\"").is_err());
        let missing = TrimConfig::from_file("/nonexistent/trim.toml").unwrap_err();
        assert!(format!("{missing:#}").contains("/nonexistent/trim.toml"));
    }

    #[test]
    fn test_validation() {
        let invalid = [
            (
                TrimConfig {
                    error_rate: 1.0,
                    ..TrimConfig::default()
                },
                ConfigurationError::InvalidErrorRate(1.0),
            ),
            (
                TrimConfig {
                    min_overlap: 0,
                    ..TrimConfig::default()
                },
                ConfigurationError::InvalidMinOverlap,
            ),
            (
                TrimConfig {
                    times: 0,
                    ..TrimConfig::default()
                },
                ConfigurationError::InvalidTimes,
            ),
            (
                TrimConfig {
                    cut: vec![3, 4],
                    ..TrimConfig::default()
                },
                ConfigurationError::InvalidCut(vec![3, 4]),
            ),
            (
                TrimConfig {
                    quality_base: 50,
                    ..TrimConfig::default()
                },
                ConfigurationError::InvalidQualityBase(50),
            ),
            (
                TrimConfig {
                    discard_trimmed: true,
                    discard_untrimmed: true,
                    ..TrimConfig::default()
                },
                ConfigurationError::ConflictingDiscard,
            ),
            (
                TrimConfig {
                    max_n: Some(1.5),
                    ..TrimConfig::default()
                },
                ConfigurationError::InvalidMaxN(1.5),
            ),
        ];
        for (config, err) in invalid {
            assert_eq!(config.validate().unwrap_err(), err);
            assert_eq!(config.build(&NoSequenceSource).unwrap_err(), err);
        }
        assert!(TrimConfig::default().validate().is_ok());
    }

    #[test]
    fn test_build_reports_adapter_errors() {
        let config = TrimConfig {
            back: vec!["ZACGT".to_string()],
            ..TrimConfig::default()
        };
        assert_eq!(
            config.build(&NoSequenceSource).unwrap_err(),
            ConfigurationError::InvalidCharacter {
                adapter: "ZACGT".to_string(),
                character: 'Z'
            }
        );

        let config = TrimConfig {
            back: vec!["a=ACGTACGT".to_string()],
            front: vec!["a=TTTTTTTT".to_string()],
            ..TrimConfig::default()
        };
        assert_eq!(
            config.build(&NoSequenceSource).unwrap_err(),
            ConfigurationError::DuplicateName {
                name: "a".to_string()
            }
        );
    }
}
