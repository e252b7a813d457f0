//! Text and JSON presentation of command results.
//!
//! Results go to stdout; logs go to stderr.

use aweme_id::{
    AwemeId, ErrorStats, GroupKey, PatternReport, SECONDARY_TZ, Scheme, SchemeBreakdown, SchemeCatalog,
    Source, ValidationReport,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::{self, Write};

const RULE: &str = "--------------------------------------------------------------------------------";

/// A command result that can be printed as text or JSON.
pub trait Render: Serialize {
    fn render_text(&self, out: &mut dyn Write) -> io::Result<()>;
}

pub fn emit<R: Render + ?Sized>(out: &mut dyn Write, value: &R, json: bool) -> anyhow::Result<()> {
    if json {
        serde_json::to_writer_pretty(&mut *out, value)?;
        writeln!(out)?;
    } else {
        value.render_text(out)?;
    }
    out.flush()?;
    Ok(())
}

fn percent(rate: f64) -> f64 {
    rate * 100.0
}

// --- decode ---

#[derive(Debug, Serialize)]
pub struct DecodedView {
    pub aweme_id: AwemeId,
    pub timestamp_seconds: u32,
    pub datetime_utc: String,
    pub datetime_secondary: String,
    pub residual: u32,
    pub residual_hex: String,
    pub residual_binary: String,
    pub bits: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schemes: Option<Vec<SchemeBreakdown>>,
}

impl DecodedView {
    pub fn new(id: AwemeId, catalog: Option<&SchemeCatalog>) -> Self {
        let record = id.decode();
        Self {
            aweme_id: id,
            timestamp_seconds: record.timestamp_seconds(),
            datetime_utc: record.datetime_utc().to_rfc3339(),
            datetime_secondary: record.datetime_secondary().to_rfc3339(),
            residual: record.residual(),
            residual_hex: record.residual_hex(),
            residual_binary: record.residual_binary(),
            bits: id.to_bit_string(),
            schemes: catalog.map(|c| c.analyze_all(record.residual())),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum DecodeEntry {
    Decoded(DecodedView),
    Failed { aweme_id: String, error: String },
}

impl Render for [DecodeEntry] {
    fn render_text(&self, out: &mut dyn Write) -> io::Result<()> {
        for (i, entry) in self.iter().enumerate() {
            if i > 0 {
                writeln!(out, "{RULE}")?;
            }
            match entry {
                DecodeEntry::Decoded(view) => {
                    writeln!(out, "aweme_id    : {}", view.aweme_id)?;
                    writeln!(out, "bits        : {}", view.bits)?;
                    writeln!(out, "timestamp   : {}", view.timestamp_seconds)?;
                    writeln!(out, "UTC         : {}", view.datetime_utc)?;
                    writeln!(out, "{:<12}: {}", SECONDARY_TZ.name(), view.datetime_secondary)?;
                    writeln!(out, "residual    : {} ({})", view.residual, view.residual_hex)?;
                    writeln!(out, "binary      : {}", view.residual_binary)?;
                    for breakdown in view.schemes.iter().flatten() {
                        writeln!(out)?;
                        write!(out, "{breakdown}")?;
                    }
                }
                DecodeEntry::Failed { aweme_id, error } => {
                    writeln!(out, "aweme_id    : {aweme_id}")?;
                    writeln!(out, "error       : {error}")?;
                }
            }
        }
        Ok(())
    }
}

// --- schemes ---

#[derive(Debug, Serialize)]
pub struct SchemeView<'a> {
    pub label: String,
    pub default: bool,
    #[serde(flatten)]
    pub scheme: &'a Scheme,
}

impl Render for [SchemeView<'_>] {
    fn render_text(&self, out: &mut dyn Write) -> io::Result<()> {
        for view in self {
            let scheme = view.scheme;
            let marker = if view.default { " (default)" } else { "" };
            writeln!(out, "{} [{}]{marker}", scheme.name(), view.label)?;
            for field in scheme.fields() {
                let mut roles = Vec::new();
                if scheme.shard_field() == Some(field.name.as_str()) {
                    roles.push("shard");
                }
                if scheme.sequence_field() == Some(field.name.as_str()) {
                    roles.push("sequence");
                }
                if roles.is_empty() {
                    writeln!(out, "    {:<14} {:>2} bits", field.name, field.width)?;
                } else {
                    writeln!(
                        out,
                        "    {:<14} {:>2} bits  ({})",
                        field.name,
                        field.width,
                        roles.join(", ")
                    )?;
                }
            }
        }
        Ok(())
    }
}

// --- analyze ---

impl Render for PatternReport {
    fn render_text(&self, out: &mut dyn Write) -> io::Result<()> {
        writeln!(out, "records     : {}", self.record_count)?;
        if let Some(scheme) = &self.scheme {
            writeln!(out, "scheme      : {scheme}")?;
        }
        match &self.group_key {
            GroupKey::Residual => writeln!(out, "grouped by  : residual")?,
            GroupKey::Field(field) => writeln!(out, "grouped by  : {field}")?,
        }

        if let Some(span) = &self.time_span {
            writeln!(out, "\n{RULE}\ntime span\n{RULE}")?;
            writeln!(out, "earliest    : {} ({})", span.earliest, span.earliest_id)?;
            writeln!(out, "latest      : {} ({})", span.latest, span.latest_id)?;
            writeln!(
                out,
                "span        : {} s ({:.2} h, {:.2} d)",
                span.span_seconds(),
                span.span_hours(),
                span.span_days()
            )?;
        }

        writeln!(out, "\n{RULE}\nduplicates\n{RULE}")?;
        if self.duplicates.is_empty() {
            writeln!(out, "none")?;
        }
        for group in &self.duplicates {
            writeln!(
                out,
                "0x{:x} ({}) x{}",
                group.value,
                group.value,
                group.members.len()
            )?;
            for member in &group.members {
                writeln!(out, "    [{}] {}", member.source, member.id)?;
            }
        }

        writeln!(out, "\n{RULE}\nbyte frequency\n{RULE}")?;
        for position in &self.byte_frequency {
            match position.mode {
                Some(mode) => write!(
                    out,
                    "byte{} mode 0x{:02x} x{}",
                    position.position, mode.value, mode.count
                )?,
                None => write!(out, "byte{} -", position.position)?,
            }
            let repeated: Vec<_> = position
                .repeated()
                .map(|(value, count)| format!("0x{value:02x}x{count}"))
                .collect();
            if repeated.is_empty() {
                writeln!(out)?;
            } else {
                writeln!(out, "  repeated: {}", repeated.join(" "))?;
            }
        }

        if let Some(shards) = &self.shard_distribution {
            writeln!(out, "\n{RULE}\nshard distribution ({})\n{RULE}", shards.field)?;
            writeln!(out, "distinct    : {}", shards.cardinality())?;
            let mut busiest: Vec<_> = shards
                .frequencies
                .iter()
                .map(|(&shard, members)| (shard, members.len()))
                .collect();
            busiest.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
            for (shard, count) in busiest.into_iter().take(10) {
                writeln!(out, "    0x{shard:x} ({shard}) x{count}")?;
            }
        }

        writeln!(out, "\n{RULE}\nper source\n{RULE}")?;
        for summary in &self.per_source {
            writeln!(out, "{} ({} records)", summary.source, summary.count)?;
            for (name, range) in [("sequence", summary.sequence), ("shard", summary.shard)] {
                if let Some(range) = range {
                    writeln!(
                        out,
                        "    {name:<9}: {} ~ {} ({} unique)",
                        range.min, range.max, range.unique
                    )?;
                }
            }
        }
        Ok(())
    }
}

// --- validate ---

fn write_stats(out: &mut dyn Write, stats: &ErrorStats) -> io::Result<()> {
    writeln!(out, "    validated   : {}", stats.count)?;
    writeln!(
        out,
        "    exact       : {} ({:.1}%)",
        stats.exact,
        percent(stats.exact_rate())
    )?;
    writeln!(
        out,
        "    close       : {} ({:.1}%)",
        stats.close,
        percent(stats.close_rate())
    )?;
    writeln!(out, "    large       : {}", stats.large)?;
    writeln!(out, "    mean |error|: {:.2} s", stats.mean_abs)?;
    writeln!(
        out,
        "    |error|     : {} ~ {} s",
        stats.min_abs, stats.max_abs
    )?;
    writeln!(out, "    mean error  : {:+.2} s", stats.mean_signed)?;
    writeln!(
        out,
        "    error range : {:+} ~ {:+} s",
        stats.min_signed, stats.max_signed
    )
}

impl Render for ValidationReport {
    fn render_text(&self, out: &mut dyn Write) -> io::Result<()> {
        let large: Vec<_> = self.large_errors().collect();
        if !large.is_empty() {
            writeln!(out, "{RULE}\nlarge errors (> {} s)\n{RULE}", self.close_threshold)?;
            for outcome in large {
                writeln!(
                    out,
                    "[{}] {}  decoded {}  actual {}  error {:+} s",
                    outcome.source,
                    outcome.id,
                    outcome.calibrated,
                    outcome.ground_truth,
                    outcome.error
                )?;
            }
            writeln!(out)?;
        }

        writeln!(out, "{RULE}\noverall\n{RULE}")?;
        write_stats(out, &self.overall)?;
        if self.calibrated {
            writeln!(out, "    raw mean    : {:+.2} s", self.overall.raw_mean_signed)?;
        }

        for (source, stats) in &self.per_source {
            writeln!(out, "\n{source}")?;
            write_stats(out, stats)?;
            if self.calibrated {
                writeln!(out, "    raw mean    : {:+.2} s", stats.raw_mean_signed)?;
            }
        }

        if !self.skipped.is_empty() {
            writeln!(out, "\n{RULE}\nskipped ({})\n{RULE}", self.skipped_count())?;
            for skipped in &self.skipped {
                writeln!(
                    out,
                    "#{} [{}] {}: {}",
                    skipped.index, skipped.source, skipped.aweme_id, skipped.reason
                )?;
            }
        }

        writeln!(out, "\n{RULE}")?;
        writeln!(
            out,
            "verdict: {} ({:.1}% within {} s)",
            self.verdict,
            percent(self.overall.within_threshold_rate()),
            self.close_threshold
        )?;
        writeln!(out, "{}", self.verdict.describe())
    }
}

// --- estimate ---

#[derive(Debug, Serialize)]
pub struct SourceEstimate {
    pub observations: usize,
    pub mean: f64,
    pub offset: i64,
}

#[derive(Debug, Serialize)]
pub struct EstimateView {
    pub window: usize,
    pub sources: BTreeMap<Source, SourceEstimate>,
}

impl Render for EstimateView {
    fn render_text(&self, out: &mut dyn Write) -> io::Result<()> {
        writeln!(out, "window: last {} samples per source", self.window)?;
        if self.sources.is_empty() {
            writeln!(out, "no usable samples")?;
        }
        for (source, estimate) in &self.sources {
            writeln!(
                out,
                "{source:<7} offset {:+} s (mean {:+.2} over {} samples)",
                estimate.offset, estimate.mean, estimate.observations
            )?;
        }
        Ok(())
    }
}

// --- forge ---

#[derive(Debug, Serialize)]
pub struct ForgedView {
    pub aweme_id: AwemeId,
    pub timestamp_seconds: u32,
    pub residual: u32,
    pub synthetic: bool,
}

impl From<AwemeId> for ForgedView {
    fn from(id: AwemeId) -> Self {
        Self {
            aweme_id: id,
            timestamp_seconds: id.timestamp(),
            residual: id.residual(),
            synthetic: true,
        }
    }
}

impl Render for ForgedView {
    fn render_text(&self, out: &mut dyn Write) -> io::Result<()> {
        writeln!(out, "{}", self.aweme_id)?;
        writeln!(
            out,
            "timestamp {} residual 0x{:08x} (synthetic, not platform-issued)",
            self.timestamp_seconds, self.residual
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aweme_id::{SampleRecord, ValidationOptions, validate};

    fn text<R: Render + ?Sized>(value: &R) -> String {
        let mut buf = Vec::new();
        emit(&mut buf, value, false).unwrap();
        String::from_utf8(buf).unwrap()
    }

    fn json<R: Render + ?Sized>(value: &R) -> serde_json::Value {
        let mut buf = Vec::new();
        emit(&mut buf, value, true).unwrap();
        serde_json::from_slice(&buf).unwrap()
    }

    #[test]
    fn decode_text_and_json() {
        let catalog = SchemeCatalog::builtin();
        let entries = [
            DecodeEntry::Decoded(DecodedView::new(
                AwemeId::from_raw(7350810998023949599),
                Some(&catalog),
            )),
            DecodeEntry::Failed {
                aweme_id: "abc".into(),
                error: "bad".into(),
            },
        ];

        let out = text(&entries[..]);
        println!("{out}");
        assert!(out.contains("UTC         : 2024-03-26T23:00:56+00:00"));
        assert!(out.contains("America/Los_Angeles: 2024-03-26T16:00:56-07:00"));
        assert!(out.contains("residual    : 205557023 (0xc408d1f)"));
        assert!(out.contains("simplified_16_16 (residual 0x0c408d1f):"));
        assert!(out.contains("error       : bad"));

        let value = json(&entries[..]);
        assert_eq!(value[0]["timestamp_seconds"], 1_711_494_056);
        assert_eq!(value[0]["residual_hex"], "0xc408d1f");
        assert_eq!(value[0]["schemes"].as_array().unwrap().len(), 4);
        assert_eq!(value[1]["error"], "bad");
    }

    #[test]
    fn schemes_list_roles() {
        let catalog = SchemeCatalog::builtin();
        let views: Vec<_> = catalog
            .iter()
            .map(|scheme| SchemeView {
                label: scheme.label(),
                default: scheme.name() == catalog.default_scheme().name(),
                scheme,
            })
            .collect();
        let out = text(&views[..]);
        assert!(out.contains("simplified_16_16 [16+16] (default)"));
        assert!(out.contains("shard_id       16 bits  (shard)"));
        assert!(out.contains("byte0           8 bits\n"));

        let value = json(&views[..]);
        assert_eq!(value[2]["name"], "simplified_16_16");
        assert_eq!(value[2]["default"], true);
    }

    #[test]
    fn validation_text_mentions_verdict_and_skips() {
        let samples = [
            SampleRecord::new("7350810998023949599", Source::Douyin, 1_711_494_099),
            SampleRecord::new("x", Source::TikTok, 0),
        ];
        let report = validate(&samples, &ValidationOptions::default()).unwrap();
        let out = text(&report);
        assert!(out.contains("error -43 s"));
        assert!(out.contains("mean error  : -43.00 s"));
        assert!(out.contains("skipped (1)"));
        assert!(out.contains("verdict: poor (0.0% within 5 s)"));
    }

    #[test]
    fn forged_text() {
        let view = ForgedView::from(AwemeId::from_parts(1, 2));
        assert_eq!(
            text(&view),
            "4294967298\ntimestamp 1 residual 0x00000002 (synthetic, not platform-issued)\n"
        );
        assert_eq!(json(&view)["synthetic"], true);
    }
}
