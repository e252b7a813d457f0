//! Per-source timestamp correction.
//!
//! Decoded timestamps run a few seconds behind the published create time,
//! by a different amount on each platform. [`calibrate`] adds a configured
//! offset, and [`OffsetEstimator`] derives fresh offsets from recent
//! observations.

use crate::Source;
use std::collections::{BTreeMap, VecDeque};

/// Signed seconds added to decoded timestamps, keyed by source.
///
/// Sources without an entry are left uncorrected.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CalibrationOffsets {
    offsets: BTreeMap<Source, i64>,
}

impl CalibrationOffsets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, source: Source, seconds: i64) -> Self {
        self.set(source, seconds);
        self
    }

    pub fn set(&mut self, source: Source, seconds: i64) {
        self.offsets.insert(source, seconds);
    }

    /// The offset for `source`, or 0 when none is configured.
    pub fn get(&self, source: Source) -> i64 {
        self.offsets.get(&source).copied().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Source, i64)> + '_ {
        self.offsets.iter().map(|(&s, &o)| (s, o))
    }
}

impl FromIterator<(Source, i64)> for CalibrationOffsets {
    fn from_iter<I: IntoIterator<Item = (Source, i64)>>(iter: I) -> Self {
        Self {
            offsets: iter.into_iter().collect(),
        }
    }
}

/// Returns `timestamp_seconds` shifted by the offset configured for
/// `source`.
///
/// The result is widened to `i64` so that neither a negative offset near the
/// epoch nor a positive one near `u32::MAX` can wrap. Offsets within
/// `u32::MAX` of the `i64` bounds saturate; [`checked_calibrate`] reports
/// them instead.
///
/// ```
/// use aweme_id::{CalibrationOffsets, Source, calibrate};
///
/// let offsets = CalibrationOffsets::new().with(Source::Douyin, 13);
/// assert_eq!(calibrate(1_711_494_056, Source::Douyin, &offsets), 1_711_494_069);
/// assert_eq!(calibrate(1_711_494_056, Source::TikTok, &offsets), 1_711_494_056);
/// ```
pub fn calibrate(timestamp_seconds: u32, source: Source, offsets: &CalibrationOffsets) -> i64 {
    i64::from(timestamp_seconds).saturating_add(offsets.get(source))
}

/// Like [`calibrate`], but returns `None` if the result leaves the `i64`
/// range.
pub fn checked_calibrate(
    timestamp_seconds: u32,
    source: Source,
    offsets: &CalibrationOffsets,
) -> Option<i64> {
    i64::from(timestamp_seconds).checked_add(offsets.get(source))
}

/// Tracks the last `window` observed `ground_truth - decoded` differences
/// per source and proposes offsets from their mean.
#[derive(Clone, Debug)]
pub struct OffsetEstimator {
    window: usize,
    observations: BTreeMap<Source, VecDeque<i128>>,
}

impl OffsetEstimator {
    /// A `window` of 0 is treated as 1.
    pub fn new(window: usize) -> Self {
        Self {
            window: window.max(1),
            observations: BTreeMap::new(),
        }
    }

    pub const fn window(&self) -> usize {
        self.window
    }

    /// Records one sample, evicting the oldest for its source once the
    /// window is full.
    pub fn observe(&mut self, source: Source, decoded: u32, ground_truth: i64) {
        let diffs = self.observations.entry(source).or_default();
        if diffs.len() == self.window {
            diffs.pop_front();
        }
        diffs.push_back(i128::from(ground_truth) - i128::from(decoded));
    }

    /// Number of observations currently held for `source`.
    pub fn len(&self, source: Source) -> usize {
        self.observations.get(&source).map_or(0, VecDeque::len)
    }

    /// The unrounded mean difference for `source`.
    pub fn mean(&self, source: Source) -> Option<f64> {
        let diffs = self.observations.get(&source).filter(|d| !d.is_empty())?;
        Some(diffs.iter().sum::<i128>() as f64 / diffs.len() as f64)
    }

    /// The rounded mean per source, clamped to `i64`. Sources never observed
    /// get no entry.
    pub fn offsets(&self) -> CalibrationOffsets {
        Source::ALL
            .into_iter()
            .filter_map(|s| Some((s, self.mean(s)?.round() as i64)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn unknown_source_adds_nothing() {
        let offsets = CalibrationOffsets::new();
        assert!(offsets.is_empty());
        assert_eq!(calibrate(100, Source::TikTok, &offsets), 100);
    }

    #[test]
    fn negative_offset_below_epoch_does_not_wrap() {
        let offsets = CalibrationOffsets::new().with(Source::Douyin, -30);
        assert_eq!(calibrate(10, Source::Douyin, &offsets), -20);
    }

    #[test]
    fn positive_offset_above_u32_does_not_wrap() {
        let offsets = CalibrationOffsets::new().with(Source::TikTok, 18);
        assert_eq!(
            calibrate(u32::MAX, Source::TikTok, &offsets),
            i64::from(u32::MAX) + 18
        );
    }

    #[test]
    fn estimator_rolls_over_window() {
        let mut est = OffsetEstimator::new(3);
        for diff in [10, 20, 30, 40] {
            est.observe(Source::Douyin, 1_000, 1_000 + diff);
        }
        assert_eq!(est.len(Source::Douyin), 3);
        assert_eq!(est.mean(Source::Douyin), Some(30.0));
        assert_eq!(est.mean(Source::TikTok), None);

        let offsets = est.offsets();
        assert_eq!(offsets.get(Source::Douyin), 30);
        assert_eq!(offsets.iter().count(), 1);
    }

    #[test]
    fn estimator_rounds_mean() {
        let mut est = OffsetEstimator::new(20);
        for diff in [17, 18, 18, 19, 18, 17, 18] {
            est.observe(Source::TikTok, 5_000, 5_000 + diff);
        }
        // 125 / 7 = 17.857...
        assert_eq!(est.offsets().get(Source::TikTok), 18);
    }

    #[test]
    fn zero_window_keeps_latest() {
        let mut est = OffsetEstimator::new(0);
        assert_eq!(est.window(), 1);
        est.observe(Source::Douyin, 0, 5);
        est.observe(Source::Douyin, 0, 9);
        assert_eq!(est.mean(Source::Douyin), Some(9.0));
    }

    #[test]
    fn extreme_inputs_do_not_overflow() {
        let huge = CalibrationOffsets::new().with(Source::Douyin, i64::MAX);
        assert_eq!(checked_calibrate(1, Source::Douyin, &huge), None);
        assert_eq!(calibrate(1, Source::Douyin, &huge), i64::MAX);
        assert_eq!(checked_calibrate(1, Source::TikTok, &huge), Some(1));

        let mut est = OffsetEstimator::new(4);
        est.observe(Source::TikTok, u32::MAX, i64::MIN);
        est.observe(Source::TikTok, u32::MAX, i64::MIN);
        let mean = est.mean(Source::TikTok).unwrap();
        assert!(mean < i64::MIN as f64);
        assert_eq!(est.offsets().get(Source::TikTok), i64::MIN);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn offsets_serialize_as_map() {
        let offsets = CalibrationOffsets::new()
            .with(Source::Douyin, 13)
            .with(Source::TikTok, 18);
        assert_eq!(
            serde_json::to_string(&offsets).unwrap(),
            r#"{"Douyin":13,"TikTok":18}"#
        );
    }

    proptest! {
        #[test]
        fn calibration_is_linear(
            ts in any::<u32>(),
            douyin in -86_400i64..86_400,
            tiktok in -86_400i64..86_400,
            pick_douyin in any::<bool>(),
        ) {
            let offsets = CalibrationOffsets::new()
                .with(Source::Douyin, douyin)
                .with(Source::TikTok, tiktok);
            let source = if pick_douyin { Source::Douyin } else { Source::TikTok };
            prop_assert_eq!(calibrate(ts, source, &offsets) - i64::from(ts), offsets.get(source));
        }
    }
}
