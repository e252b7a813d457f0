//! # Pattern detection over decoded ids
//!
//! [`PatternDetector`] looks for structure in the residual bits of a
//! collection of ids:
//!
//! - **Duplicates**: residuals (or one scheme field of them) shared by two or
//!   more ids, which hints at ids minted by the same batch or server.
//! - **Byte frequency**: per byte position of the residual, how often each
//!   byte value occurs and which one is most common.
//! - **Time span**: the earliest and latest decoded timestamps.
//! - **Shard distribution**: how ids spread over the scheme's shard field.
//! - **Per-source summary**: sequence/shard ranges and cardinalities per
//!   platform.
//!
//! Detection only reads its input and returns a fresh [`PatternReport`].

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::{AwemeId, DecodedRecord, Scheme, SchemeError, Source};
use std::collections::{BTreeMap, BTreeSet};

/// An id together with the platform it came from.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct LabeledRecord {
    pub id: AwemeId,
    pub source: Source,
}

impl LabeledRecord {
    pub const fn new(id: AwemeId, source: Source) -> Self {
        Self { id, source }
    }

    pub const fn record(&self) -> DecodedRecord {
        self.id.decode()
    }
}

/// What duplicate detection groups records by.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum GroupKey {
    /// The full 32-bit residual.
    #[default]
    Residual,
    /// One named field of the detector's scheme.
    Field(String),
}

impl GroupKey {
    /// Groups by the scheme's sequence field when it has one, otherwise by
    /// the full residual.
    pub fn sequence_of(scheme: &Scheme) -> Self {
        scheme
            .sequence_field()
            .map_or(Self::Residual, |field| Self::Field(field.to_owned()))
    }
}

/// Finds duplicates and frequency patterns in a collection of ids.
///
/// # Example
///
/// ```
/// use aweme_id::{AwemeId, GroupKey, LabeledRecord, PatternDetector, SchemeCatalog, Source};
///
/// let catalog = SchemeCatalog::builtin();
/// let records = [
///     LabeledRecord::new(AwemeId::from_raw(7153549929326120227), Source::Douyin),
///     LabeledRecord::new(AwemeId::from_raw(7196618597496524067), Source::Douyin),
/// ];
///
/// let report = PatternDetector::new()
///     .with_scheme(catalog.default_scheme())
///     .group_by(GroupKey::Field("sequence".into()))
///     .detect(&records)
///     .unwrap();
///
/// assert_eq!(report.duplicates.len(), 1);
/// assert_eq!(report.duplicates[0].value, 0x0d23);
/// ```
#[derive(Clone, Debug, Default)]
pub struct PatternDetector<'a> {
    scheme: Option<&'a Scheme>,
    group_by: GroupKey,
}

impl<'a> PatternDetector<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses `scheme` for field grouping, the shard distribution and the
    /// per-source field ranges.
    pub fn with_scheme(mut self, scheme: &'a Scheme) -> Self {
        self.scheme = Some(scheme);
        self
    }

    pub fn group_by(mut self, key: GroupKey) -> Self {
        self.group_by = key;
        self
    }

    /// Runs every detector over `records`.
    ///
    /// # Errors
    ///
    /// Returns [`SchemeError::UnknownField`] if grouping by a field the
    /// scheme does not declare, or [`SchemeError::NoScheme`] if grouping by
    /// a field without a scheme.
    pub fn detect(&self, records: &[LabeledRecord]) -> Result<PatternReport, SchemeError> {
        let key = self.key_extractor()?;
        Ok(self.report(records, &key))
    }

    #[cfg_attr(feature = "tracing", instrument(level = "debug", skip_all, fields(records = records.len())))]
    fn report(&self, records: &[LabeledRecord], key: &KeyExtractor<'_>) -> PatternReport {
        let report = PatternReport {
            record_count: records.len(),
            scheme: self.scheme.map(|s| s.name().to_owned()),
            group_key: self.group_by.clone(),
            duplicates: find_duplicates(records, key),
            byte_frequency: byte_frequency(records),
            time_span: TimeSpan::of(records),
            shard_distribution: self.scheme.and_then(|s| shard_distribution(records, s)),
            per_source: per_source(records, self.scheme),
        };

        #[cfg(feature = "tracing")]
        tracing::debug!(
            duplicates = report.duplicates.len(),
            "pattern detection finished"
        );

        report
    }

    fn key_extractor(&self) -> Result<KeyExtractor<'a>, SchemeError> {
        match (&self.group_by, self.scheme) {
            (GroupKey::Residual, _) => Ok(KeyExtractor::Residual),
            (GroupKey::Field(field), Some(scheme)) => Ok(KeyExtractor::Field {
                scheme,
                index: scheme.position(field)?,
            }),
            (GroupKey::Field(field), None) => Err(SchemeError::NoScheme {
                field: field.clone(),
            }),
        }
    }
}

/// Runs a [`PatternDetector`] grouping by `scheme`'s sequence field (or the
/// full residual when it has none).
pub fn detect(records: &[LabeledRecord], scheme: &Scheme) -> PatternReport {
    let key = match scheme.sequence_index() {
        Some(index) => KeyExtractor::Field { scheme, index },
        None => KeyExtractor::Residual,
    };
    PatternDetector::new()
        .with_scheme(scheme)
        .group_by(GroupKey::sequence_of(scheme))
        .report(records, &key)
}

enum KeyExtractor<'a> {
    Residual,
    Field { scheme: &'a Scheme, index: usize },
}

impl KeyExtractor<'_> {
    fn key(&self, record: &DecodedRecord) -> u32 {
        match self {
            Self::Residual => record.residual(),
            Self::Field { scheme, index } => scheme.extract_at(record.residual(), *index),
        }
    }
}

/// Everything [`PatternDetector::detect`] found.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PatternReport {
    pub record_count: usize,
    pub scheme: Option<String>,
    pub group_key: GroupKey,
    /// Values seen in two or more records, ordered by value.
    pub duplicates: Vec<DuplicateGroup>,
    /// Residual bytes, most significant first.
    pub byte_frequency: [BytePosition; 4],
    /// `None` when there are no records.
    pub time_span: Option<TimeSpan>,
    /// `None` without a scheme that designates a shard field.
    pub shard_distribution: Option<ShardDistribution>,
    pub per_source: Vec<SourceSummary>,
}

impl PatternReport {
    /// Returns true if any grouping value occurred more than once.
    pub fn has_duplicates(&self) -> bool {
        !self.duplicates.is_empty()
    }
}

/// An id named in a report.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Member {
    pub id: AwemeId,
    pub source: Source,
}

impl From<&LabeledRecord> for Member {
    fn from(r: &LabeledRecord) -> Self {
        Self {
            id: r.id,
            source: r.source,
        }
    }
}

/// Records sharing one grouping value. Members keep input order.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DuplicateGroup {
    pub value: u32,
    pub members: Vec<Member>,
}

fn find_duplicates(records: &[LabeledRecord], key: &KeyExtractor<'_>) -> Vec<DuplicateGroup> {
    let mut groups: BTreeMap<u32, Vec<Member>> = BTreeMap::new();
    for record in records {
        groups
            .entry(key.key(&record.record()))
            .or_default()
            .push(record.into());
    }
    groups
        .into_iter()
        .filter(|(_, members)| members.len() >= 2)
        .map(|(value, members)| DuplicateGroup { value, members })
        .collect()
}

/// The most frequent value at one byte position.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ByteMode {
    pub value: u8,
    pub count: usize,
}

/// Byte value frequencies at one residual byte position.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BytePosition {
    /// 3 for the most significant byte down to 0 for the least.
    pub position: u8,
    /// Only observed values appear.
    pub counts: BTreeMap<u8, usize>,
    /// Ties go to the smallest byte value. `None` when there are no records.
    pub mode: Option<ByteMode>,
}

impl BytePosition {
    /// Byte values seen more than once at this position.
    pub fn repeated(&self) -> impl Iterator<Item = (u8, usize)> + '_ {
        self.counts
            .iter()
            .filter(|&(_, &count)| count > 1)
            .map(|(&value, &count)| (value, count))
    }
}

fn byte_frequency(records: &[LabeledRecord]) -> [BytePosition; 4] {
    let mut counts: [BTreeMap<u8, usize>; 4] = Default::default();
    for record in records {
        for (slot, byte) in counts.iter_mut().zip(record.record().residual().to_be_bytes()) {
            *slot.entry(byte).or_default() += 1;
        }
    }

    let mut slot = 0u8;
    counts.map(|counts| {
        let position = 3 - slot;
        slot += 1;
        // Ascending iteration plus a strict comparison keeps the smallest
        // byte on ties.
        let mode = counts.iter().fold(None::<ByteMode>, |best, (&value, &count)| {
            match best {
                Some(b) if b.count >= count => Some(b),
                _ => Some(ByteMode { value, count }),
            }
        });
        BytePosition {
            position,
            counts,
            mode,
        }
    })
}

/// Earliest and latest decoded timestamps.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TimeSpan {
    pub earliest: u32,
    pub earliest_id: AwemeId,
    pub latest: u32,
    pub latest_id: AwemeId,
}

impl TimeSpan {
    /// Returns `None` for an empty slice. Ties keep the first record seen.
    pub fn of(records: &[LabeledRecord]) -> Option<Self> {
        let first = records.first()?;
        let ts = first.record().timestamp_seconds();
        let init = Self {
            earliest: ts,
            earliest_id: first.id,
            latest: ts,
            latest_id: first.id,
        };
        Some(records[1..].iter().fold(init, |mut span, r| {
            let ts = r.record().timestamp_seconds();
            if ts < span.earliest {
                span.earliest = ts;
                span.earliest_id = r.id;
            }
            if ts > span.latest {
                span.latest = ts;
                span.latest_id = r.id;
            }
            span
        }))
    }

    /// Zero when `latest` precedes `earliest`, which only a hand-built span
    /// can do.
    pub const fn span_seconds(&self) -> u32 {
        self.latest.saturating_sub(self.earliest)
    }

    pub fn span_hours(&self) -> f64 {
        f64::from(self.span_seconds()) / 3600.0
    }

    pub fn span_days(&self) -> f64 {
        f64::from(self.span_seconds()) / 86_400.0
    }
}

/// How records spread over the scheme's shard field.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShardDistribution {
    pub field: String,
    /// Records per shard value, ordered by value.
    pub frequencies: BTreeMap<u32, Vec<Member>>,
}

impl ShardDistribution {
    /// Number of distinct shard values.
    pub fn cardinality(&self) -> usize {
        self.frequencies.len()
    }

    pub fn count(&self, shard: u32) -> usize {
        self.frequencies.get(&shard).map_or(0, Vec::len)
    }
}

fn shard_distribution(records: &[LabeledRecord], scheme: &Scheme) -> Option<ShardDistribution> {
    let index = scheme.shard_index()?;
    let mut frequencies: BTreeMap<u32, Vec<Member>> = BTreeMap::new();
    for record in records {
        let shard = scheme.extract_at(record.record().residual(), index);
        frequencies.entry(shard).or_default().push(record.into());
    }
    Some(ShardDistribution {
        field: scheme.fields()[index].name.clone(),
        frequencies,
    })
}

/// Range and cardinality of one scheme field within a source.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct FieldRange {
    pub min: u32,
    pub max: u32,
    pub unique: usize,
}

impl FieldRange {
    fn of(values: impl IntoIterator<Item = u32>) -> Option<Self> {
        let unique: BTreeSet<u32> = values.into_iter().collect();
        Some(Self {
            min: *unique.first()?,
            max: *unique.last()?,
            unique: unique.len(),
        })
    }
}

/// Per-platform summary of the scheme's sequence and shard fields.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SourceSummary {
    pub source: Source,
    pub count: usize,
    pub sequence: Option<FieldRange>,
    pub shard: Option<FieldRange>,
}

fn per_source(records: &[LabeledRecord], scheme: Option<&Scheme>) -> Vec<SourceSummary> {
    let mut by_source: BTreeMap<Source, Vec<u32>> = BTreeMap::new();
    for record in records {
        by_source
            .entry(record.source)
            .or_default()
            .push(record.record().residual());
    }

    let range = |residuals: &[u32], index: Option<usize>| {
        let (scheme, index) = (scheme?, index?);
        FieldRange::of(residuals.iter().map(|&r| scheme.extract_at(r, index)))
    };

    by_source
        .into_iter()
        .map(|(source, residuals)| SourceSummary {
            source,
            count: residuals.len(),
            sequence: range(&residuals, scheme.and_then(Scheme::sequence_index)),
            shard: range(&residuals, scheme.and_then(Scheme::shard_index)),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BYTES_8_8_8_8, SIMPLIFIED_16_16, SNOWFLAKE_10_10_12};

    fn labeled(raw: u64, source: Source) -> LabeledRecord {
        LabeledRecord::new(AwemeId::from_raw(raw), source)
    }

    fn samples() -> Vec<LabeledRecord> {
        vec![
            labeled(7153549929326120227, Source::Douyin), // 0x74810d23
            labeled(7266740902494833931, Source::Douyin), // 0x98018d0b
            labeled(7196618597496524067, Source::Douyin), // 0x2fc00d23
            labeled(7559684939684400414, Source::TikTok), // 0x53c24d1e
            labeled(7559661864628538654, Source::TikTok), // 0xbf404d1e
            labeled(7559607368695188766, Source::TikTok), // 0x6c808d1e
        ]
    }

    #[test]
    fn duplicate_low_half_forms_one_group() {
        let scheme = Scheme::try_from(&SIMPLIFIED_16_16).unwrap();
        let records = [samples()[0], samples()[2]];
        let report = PatternDetector::new()
            .with_scheme(&scheme)
            .group_by(GroupKey::Field("sequence".into()))
            .detect(&records)
            .unwrap();

        assert_eq!(report.duplicates.len(), 1);
        let group = &report.duplicates[0];
        assert_eq!(group.value, 0x0d23);
        let ids: Vec<_> = group.members.iter().map(|m| m.id.to_raw()).collect();
        assert_eq!(ids, [7153549929326120227, 7196618597496524067]);
    }

    #[test]
    fn duplicates_across_sources_keep_input_order() {
        let scheme = Scheme::try_from(&SIMPLIFIED_16_16).unwrap();
        let report = detect(&samples(), &scheme);

        assert_eq!(report.group_key, GroupKey::Field("sequence".into()));
        let values: Vec<_> = report.duplicates.iter().map(|g| g.value).collect();
        assert_eq!(values, [0x0d23, 0x4d1e]);
        assert_eq!(
            report.duplicates[1].members,
            [
                Member::from(&samples()[3]),
                Member::from(&samples()[4]),
            ]
        );
    }

    #[test]
    fn scheme_without_sequence_groups_by_residual() {
        let scheme = Scheme::try_from(&BYTES_8_8_8_8).unwrap();
        let report = detect(&samples(), &scheme);

        assert_eq!(report.group_key, GroupKey::Residual);
        assert_eq!(report.record_count, samples().len());
        assert_eq!(report.scheme.as_deref(), Some("bytes_8_8_8_8"));
        assert_eq!(
            report,
            PatternDetector::new()
                .with_scheme(&scheme)
                .detect(&samples())
                .unwrap()
        );
    }

    #[test]
    fn residual_grouping_uses_exact_equality() {
        let records = [
            labeled(AwemeId::from_parts(100, 0xdead_beef).to_raw(), Source::Douyin),
            labeled(AwemeId::from_parts(200, 0xdead_beef).to_raw(), Source::TikTok),
            labeled(AwemeId::from_parts(300, 0xdead_bef0).to_raw(), Source::TikTok),
        ];
        let report = PatternDetector::new().detect(&records).unwrap();
        assert_eq!(report.duplicates.len(), 1);
        assert_eq!(report.duplicates[0].value, 0xdead_beef);
        assert_eq!(report.duplicates[0].members.len(), 2);
        assert!(report.has_duplicates());
        assert_eq!(report.scheme, None);
        assert_eq!(report.shard_distribution, None);
    }

    #[test]
    fn no_duplicates_when_unique() {
        let scheme = Scheme::try_from(&SNOWFLAKE_10_10_12).unwrap();
        let report = PatternDetector::new()
            .with_scheme(&scheme)
            .detect(&samples())
            .unwrap();
        assert!(!report.has_duplicates());
    }

    #[test]
    fn field_grouping_needs_a_known_field() {
        let scheme = Scheme::try_from(&BYTES_8_8_8_8).unwrap();
        let err = PatternDetector::new()
            .with_scheme(&scheme)
            .group_by(GroupKey::Field("sequence".into()))
            .detect(&samples())
            .unwrap_err();
        assert_eq!(
            err,
            SchemeError::UnknownField {
                scheme: "bytes_8_8_8_8".into(),
                field: "sequence".into()
            }
        );

        let err = PatternDetector::new()
            .group_by(GroupKey::Field("sequence".into()))
            .detect(&samples())
            .unwrap_err();
        assert_eq!(
            err,
            SchemeError::NoScheme {
                field: "sequence".into()
            }
        );
        assert_eq!(
            err.to_string(),
            r#"cannot group by field "sequence" without a scheme"#
        );
    }

    #[test]
    fn byte_frequency_modes() {
        let report = PatternDetector::new().detect(&samples()).unwrap();
        let [b3, b2, b1, b0] = &report.byte_frequency;

        assert_eq!(b3.position, 3);
        assert_eq!(b0.position, 0);

        // All six high bytes differ, so the smallest one wins the tie.
        assert_eq!(b3.counts.len(), 6);
        assert_eq!(b3.mode, Some(ByteMode { value: 0x2f, count: 1 }));

        // 0x81, 0x01, 0xc0, 0xc2, 0x40, 0x80
        assert_eq!(b2.mode, Some(ByteMode { value: 0x01, count: 1 }));

        // 0x0d x2, 0x8d x2, 0x4d x2 -> smallest
        assert_eq!(b1.mode, Some(ByteMode { value: 0x0d, count: 2 }));
        assert_eq!(b1.repeated().count(), 3);

        // 0x23 x2, 0x0b, 0x1e x3
        assert_eq!(b0.mode, Some(ByteMode { value: 0x1e, count: 3 }));
        assert_eq!(b0.counts.get(&0x23), Some(&2));
        assert_eq!(b0.counts.values().sum::<usize>(), 6);
    }

    #[test]
    fn empty_input() {
        let report = PatternDetector::new().detect(&[]).unwrap();
        assert_eq!(report.record_count, 0);
        assert!(report.duplicates.is_empty());
        assert_eq!(report.time_span, None);
        assert!(report.byte_frequency.iter().all(|p| p.mode.is_none()));
        assert!(report.per_source.is_empty());
    }

    #[test]
    fn time_span() {
        let span = TimeSpan::of(&samples()).unwrap();
        assert_eq!(span.earliest, 1_665_565_634);
        assert_eq!(span.earliest_id.to_raw(), 7153549929326120227);
        assert_eq!(span.latest, 1_760_126_310);
        assert_eq!(span.latest_id.to_raw(), 7559684939684400414);
        assert_eq!(span.span_seconds(), 1_760_126_310 - 1_665_565_634);
        assert!((span.span_days() - span.span_hours() / 24.0).abs() < 1e-9);

        let single = TimeSpan::of(&samples()[..1]).unwrap();
        assert_eq!(single.span_seconds(), 0);

        let inverted = TimeSpan {
            earliest: span.latest,
            latest: span.earliest,
            ..span
        };
        assert_eq!(inverted.span_seconds(), 0);
        assert_eq!(inverted.span_days(), 0.0);
    }

    #[test]
    fn shard_distribution_counts_values() {
        let scheme = Scheme::try_from(&SIMPLIFIED_16_16).unwrap();
        let records = [
            labeled(AwemeId::from_parts(1, 0x0001_0000).to_raw(), Source::Douyin),
            labeled(AwemeId::from_parts(2, 0x0001_0001).to_raw(), Source::Douyin),
            labeled(AwemeId::from_parts(3, 0x0002_0000).to_raw(), Source::TikTok),
        ];
        let report = detect(&records, &scheme);
        let dist = report.shard_distribution.unwrap();
        assert_eq!(dist.field, "shard_id");
        assert_eq!(dist.cardinality(), 2);
        assert_eq!(dist.count(1), 2);
        assert_eq!(dist.count(2), 1);
        assert_eq!(dist.count(3), 0);
    }

    #[test]
    fn no_shard_distribution_without_shard_role() {
        let scheme = Scheme::try_from(&BYTES_8_8_8_8).unwrap();
        let report = detect(&samples(), &scheme);
        assert_eq!(report.shard_distribution, None);
        assert_eq!(report.group_key, GroupKey::Residual);
        assert!(report.per_source.iter().all(|s| s.sequence.is_none()));
    }

    #[test]
    fn per_source_ranges() {
        let scheme = Scheme::try_from(&SIMPLIFIED_16_16).unwrap();
        let report = detect(&samples(), &scheme);
        assert_eq!(report.per_source.len(), 2);

        let douyin = report.per_source[0];
        assert_eq!(douyin.source, Source::Douyin);
        assert_eq!(douyin.count, 3);
        assert_eq!(
            douyin.sequence,
            Some(FieldRange {
                min: 0x0d23,
                max: 0x8d0b,
                unique: 2
            })
        );
        assert_eq!(
            douyin.shard,
            Some(FieldRange {
                min: 0x2fc0,
                max: 0x9801,
                unique: 3
            })
        );

        let tiktok = report.per_source[1];
        assert_eq!(tiktok.source, Source::TikTok);
        assert_eq!(tiktok.sequence.map(|r| r.unique), Some(2));
    }

    #[test]
    fn detection_does_not_touch_input() {
        let records = samples();
        let before = records.clone();
        let scheme = Scheme::try_from(&SIMPLIFIED_16_16).unwrap();
        let first = detect(&records, &scheme);
        let second = detect(&records, &scheme);
        assert_eq!(records, before);
        assert_eq!(first, second);
    }
}
