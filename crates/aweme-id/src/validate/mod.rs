//! # Validation against labeled samples
//!
//! [`validate`] decodes every sample, optionally shifts the decoded
//! timestamp by its source's calibration offset, and compares it with the
//! sample's published create time:
//!
//! ```text
//! error = calibrated_timestamp - ground_truth
//! ```
//!
//! The sign is kept. Per-sample errors are classified as exact (`0`), close
//! (`0 < |error| <= threshold`) or large, and aggregated both overall and per
//! source into [`ErrorStats`].
//!
//! Samples with an unparseable id or no ground truth are skipped. They are
//! listed in the report with the reason, and never counted in the
//! statistics.

#[cfg(feature = "tracing")]
use tracing::instrument;

mod stats;

pub use stats::*;

use crate::{
    AwemeId, CalibrationOffsets, SampleRecord, Source, ValidationError, ValueError,
    checked_calibrate,
};
use core::fmt;
use std::collections::BTreeMap;

/// Largest `|error|` in seconds counted as a close match by default.
pub const DEFAULT_CLOSE_THRESHOLD: u32 = 5;

/// Knobs for a validation run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidationOptions {
    pub close_threshold: u32,
    /// Empty by default, i.e. raw decoded timestamps are compared.
    pub offsets: CalibrationOffsets,
}

impl Default for ValidationOptions {
    fn default() -> Self {
        Self {
            close_threshold: DEFAULT_CLOSE_THRESHOLD,
            offsets: CalibrationOffsets::default(),
        }
    }
}

impl ValidationOptions {
    pub fn with_threshold(mut self, seconds: u32) -> Self {
        self.close_threshold = seconds;
        self
    }

    pub fn with_offsets(mut self, offsets: CalibrationOffsets) -> Self {
        self.offsets = offsets;
        self
    }
}

/// How far a decoded timestamp landed from the ground truth.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum MatchClass {
    Exact,
    Close,
    Large,
}

impl MatchClass {
    pub const fn classify(error: i64, threshold: u32) -> Self {
        let abs = error.unsigned_abs();
        if abs == 0 {
            Self::Exact
        } else if abs <= threshold as u64 {
            Self::Close
        } else {
            Self::Large
        }
    }

    pub const fn is_within_threshold(&self) -> bool {
        matches!(self, Self::Exact | Self::Close)
    }
}

/// The comparison for one usable sample.
///
/// Both the raw decoded timestamp and the calibrated one are kept, along
/// with the error of each.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SampleOutcome {
    pub id: AwemeId,
    pub source: Source,
    pub ground_truth: i64,
    pub decoded: u32,
    pub calibrated: i64,
    /// `decoded - ground_truth`.
    pub raw_error: i64,
    /// `calibrated - ground_truth`. This is what gets classified.
    pub error: i64,
    pub class: MatchClass,
}

/// Why a sample was left out of the statistics.
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SkipReason {
    InvalidId(
        #[cfg_attr(feature = "serde", serde(serialize_with = "serialize_display"))] ValueError,
    ),
    MissingGroundTruth,
    /// The error against this ground truth does not fit in `i64` seconds.
    GroundTruthOutOfRange { ground_truth: i64 },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidId(err) => err.fmt(f),
            Self::MissingGroundTruth => f.write_str("missing create_time"),
            Self::GroundTruthOutOfRange { ground_truth } => {
                write!(f, "create_time {ground_truth} is too far from the decoded timestamp")
            }
        }
    }
}

#[cfg(feature = "serde")]
fn serialize_display<T: fmt::Display, S: serde::Serializer>(
    value: &T,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_str(value)
}

/// A sample that could not be validated.
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SkippedSample {
    /// Position in the input slice.
    pub index: usize,
    pub aweme_id: String,
    pub source: Source,
    pub reason: SkipReason,
}

/// Overall judgement of how well decoded timestamps track the ground truth,
/// from the share of samples within the threshold.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Verdict {
    /// At least 95% within the threshold.
    High,
    /// At least 80%.
    Good,
    Poor,
}

impl Verdict {
    pub fn from_rate(within_threshold: f64) -> Self {
        if within_threshold >= 0.95 {
            Self::High
        } else if within_threshold >= 0.80 {
            Self::Good
        } else {
            Self::Poor
        }
    }

    pub const fn describe(&self) -> &'static str {
        match self {
            Self::High => "high accuracy: the high 32 bits are the publish time in seconds",
            Self::Good => "good accuracy with a small systematic offset",
            Self::Poor => "significant errors, the layout needs further analysis",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::High => "high",
            Self::Good => "good",
            Self::Poor => "poor",
        })
    }
}

/// Result of one [`validate`] call.
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct ValidationReport {
    pub close_threshold: u32,
    /// True when any calibration offset was configured.
    pub calibrated: bool,
    /// Usable samples, in input order.
    pub outcomes: Vec<SampleOutcome>,
    pub overall: ErrorStats,
    /// Only sources with at least one usable sample appear.
    pub per_source: BTreeMap<Source, ErrorStats>,
    pub skipped: Vec<SkippedSample>,
    pub verdict: Verdict,
}

impl ValidationReport {
    pub fn validated_count(&self) -> usize {
        self.outcomes.len()
    }

    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }

    pub fn source(&self, source: Source) -> Option<&ErrorStats> {
        self.per_source.get(&source)
    }

    /// Outcomes outside the threshold.
    pub fn large_errors(&self) -> impl Iterator<Item = &SampleOutcome> {
        self.outcomes
            .iter()
            .filter(|o| o.class == MatchClass::Large)
    }
}

/// Compares decoded timestamps with ground truth across `samples`.
///
/// # Errors
///
/// - [`ValidationError::EmptyCorpus`] if `samples` is empty.
/// - [`ValidationError::NoUsableSamples`] if every sample was skipped.
///
/// # Example
///
/// ```
/// use aweme_id::{SampleRecord, Source, ValidationOptions, validate};
///
/// let samples = [SampleRecord::new("7350810998023949599", Source::Douyin, 1_711_494_099)];
/// let report = validate(&samples, &ValidationOptions::default()).unwrap();
/// assert_eq!(report.outcomes[0].error, -43);
/// assert_eq!(report.overall.max_abs, 43);
/// ```
#[cfg_attr(feature = "tracing", instrument(level = "debug", skip_all, fields(samples = samples.len(), threshold = options.close_threshold)))]
pub fn validate(
    samples: &[SampleRecord],
    options: &ValidationOptions,
) -> Result<ValidationReport, ValidationError> {
    if samples.is_empty() {
        return Err(ValidationError::EmptyCorpus);
    }

    let mut outcomes = Vec::with_capacity(samples.len());
    let mut skipped = Vec::new();

    for (index, sample) in samples.iter().enumerate() {
        match compare(sample, options) {
            Ok(outcome) => outcomes.push(outcome),
            Err(reason) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(index, aweme_id = %sample.aweme_id, %reason, "skipping sample");
                skipped.push(SkippedSample {
                    index,
                    aweme_id: sample.aweme_id.clone(),
                    source: sample.source,
                    reason,
                });
            }
        }
    }

    let Some(overall) = ErrorStats::from_outcomes(&outcomes) else {
        return Err(ValidationError::NoUsableSamples {
            skipped: skipped.len(),
        });
    };

    let per_source = Source::ALL
        .into_iter()
        .filter_map(|source| {
            let stats =
                ErrorStats::from_outcomes(outcomes.iter().filter(|o| o.source == source))?;
            Some((source, stats))
        })
        .collect();

    let report = ValidationReport {
        close_threshold: options.close_threshold,
        calibrated: !options.offsets.is_empty(),
        verdict: Verdict::from_rate(overall.within_threshold_rate()),
        outcomes,
        overall,
        per_source,
        skipped,
    };

    #[cfg(feature = "tracing")]
    tracing::debug!(
        validated = report.validated_count(),
        skipped = report.skipped_count(),
        mean_abs = report.overall.mean_abs,
        verdict = %report.verdict,
        "validation finished"
    );

    Ok(report)
}

fn compare(sample: &SampleRecord, options: &ValidationOptions) -> Result<SampleOutcome, SkipReason> {
    let id = sample.id().map_err(SkipReason::InvalidId)?;
    let ground_truth = sample.create_time.ok_or(SkipReason::MissingGroundTruth)?;

    let out_of_range = || SkipReason::GroundTruthOutOfRange { ground_truth };

    let decoded = id.decode().timestamp_seconds();
    let calibrated =
        checked_calibrate(decoded, sample.source, &options.offsets).ok_or_else(out_of_range)?;
    let error = calibrated.checked_sub(ground_truth).ok_or_else(out_of_range)?;
    let raw_error = i64::from(decoded)
        .checked_sub(ground_truth)
        .ok_or_else(out_of_range)?;

    Ok(SampleOutcome {
        id,
        source: sample.source,
        ground_truth,
        decoded,
        calibrated,
        raw_error,
        error,
        class: MatchClass::classify(error, options.close_threshold),
    })
}
