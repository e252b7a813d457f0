//! Loading of the labeled corpus JSON.
//!
//! ```json
//! {
//!   "total_count": 73,
//!   "douyin_count": 53,
//!   "tiktok_count": 20,
//!   "videos": [
//!     { "aweme_id": "7350810998023949599", "create_time": 1711494099,
//!       "create_datetime": "2024-03-27 07:01:39", "source": "Douyin" }
//!   ]
//! }
//! ```
//!
//! The counts are informational. Only the records present in `videos` are
//! used; a mismatch is logged.

use anyhow::Context;
use aweme_id::{LabeledRecord, SampleRecord, Source};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct CorpusFile {
    #[serde(default)]
    total_count: Option<usize>,
    #[serde(default)]
    douyin_count: Option<usize>,
    #[serde(default)]
    tiktok_count: Option<usize>,
    videos: Vec<Video>,
}

#[derive(Debug, Deserialize)]
struct Video {
    aweme_id: RawId,
    #[serde(default)]
    create_time: Option<i64>,
    #[serde(default)]
    create_datetime: Option<String>,
    source: String,
}

/// Ids show up both quoted and as bare numbers.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawId {
    Number(u64),
    Text(String),
}

impl From<RawId> for String {
    fn from(id: RawId) -> Self {
        match id {
            RawId::Number(n) => n.to_string(),
            RawId::Text(s) => s,
        }
    }
}

/// A loaded corpus, in file order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Corpus {
    pub samples: Vec<SampleRecord>,
}

impl Corpus {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read corpus {}", path.display()))?;
        let corpus = Self::parse(&text)
            .with_context(|| format!("failed to parse corpus {}", path.display()))?;
        tracing::info!(
            path = %path.display(),
            samples = corpus.samples.len(),
            "loaded corpus"
        );
        Ok(corpus)
    }

    pub fn parse(text: &str) -> anyhow::Result<Self> {
        let file: CorpusFile = serde_json::from_str(text)?;
        check_counts(&file);

        let samples = file
            .videos
            .into_iter()
            .enumerate()
            .map(|(index, video)| {
                let source: Source = video
                    .source
                    .parse()
                    .with_context(|| format!("videos[{index}]"))?;
                Ok(SampleRecord {
                    aweme_id: video.aweme_id.into(),
                    source,
                    create_time: video.create_time,
                    create_datetime: video.create_datetime,
                })
            })
            .collect::<anyhow::Result<Vec<_>>>()?;

        Ok(Self { samples })
    }

    /// Parses every id for pattern analysis. Unparseable ids are logged and
    /// left out.
    pub fn labeled(&self) -> Vec<LabeledRecord> {
        self.samples
            .iter()
            .filter_map(|sample| match sample.id() {
                Ok(id) => Some(LabeledRecord::new(id, sample.source)),
                Err(err) => {
                    tracing::warn!(aweme_id = %sample.aweme_id, %err, "skipping unparseable id");
                    None
                }
            })
            .collect()
    }

    pub fn count(&self, source: Source) -> usize {
        self.samples.iter().filter(|s| s.source == source).count()
    }
}

fn check_counts(file: &CorpusFile) {
    let present = file.videos.len();
    let douyin = file
        .videos
        .iter()
        .filter(|v| v.source.parse::<Source>().ok() == Some(Source::Douyin))
        .count();
    let tiktok = file
        .videos
        .iter()
        .filter(|v| v.source.parse::<Source>().ok() == Some(Source::TikTok))
        .count();

    for (name, declared, actual) in [
        ("total_count", file.total_count, present),
        ("douyin_count", file.douyin_count, douyin),
        ("tiktok_count", file.tiktok_count, tiktok),
    ] {
        if let Some(declared) = declared.filter(|&d| d != actual) {
            tracing::warn!(
                field = name,
                declared,
                actual,
                "corpus metadata disagrees with the records present"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_string_and_numeric_ids() {
        let corpus = Corpus::parse(
            r#"{
                "total_count": 2,
                "douyin_count": 1,
                "tiktok_count": 1,
                "videos": [
                    {"aweme_id": "7350810998023949599", "create_time": 1711494099,
                     "create_datetime": "2024-03-27 07:01:39", "source": "Douyin"},
                    {"aweme_id": 7559684939684400414, "create_time": 1760126332,
                     "source": "TikTok"}
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(corpus.samples.len(), 2);
        assert_eq!(corpus.samples[0].aweme_id, "7350810998023949599");
        assert_eq!(
            corpus.samples[0].create_datetime.as_deref(),
            Some("2024-03-27 07:01:39")
        );
        assert_eq!(corpus.samples[1].aweme_id, "7559684939684400414");
        assert_eq!(corpus.samples[1].source, Source::TikTok);
        assert_eq!(corpus.samples[1].create_datetime, None);
        assert_eq!(corpus.count(Source::Douyin), 1);
    }

    #[test]
    fn keeps_malformed_samples_for_the_validator() {
        let corpus = Corpus::parse(
            r#"{"videos": [
                {"aweme_id": "12x", "create_time": 1, "source": "Douyin"},
                {"aweme_id": "7350810998023949599", "source": "Douyin"}
            ]}"#,
        )
        .unwrap();
        assert_eq!(corpus.samples.len(), 2);
        assert_eq!(corpus.samples[1].create_time, None);
        assert_eq!(corpus.labeled().len(), 1);
    }

    #[test]
    fn mismatched_counts_are_not_fatal() {
        let corpus = Corpus::parse(
            r#"{"total_count": 99, "douyin_count": 0, "videos": [
                {"aweme_id": "1", "create_time": 1, "source": "Douyin"}
            ]}"#,
        )
        .unwrap();
        assert_eq!(corpus.samples.len(), 1);
    }

    #[test]
    fn rejects_unknown_source_and_malformed_json() {
        let err = Corpus::parse(
            r#"{"videos": [{"aweme_id": "1", "create_time": 1, "source": "Kuaishou"}]}"#,
        )
        .unwrap_err();
        assert!(format!("{err:#}").contains("videos[0]"));
        assert!(format!("{err:#}").contains("Kuaishou"));

        assert!(Corpus::parse("not json").is_err());
        assert!(Corpus::parse(r#"{"total_count": 1}"#).is_err());
    }

    #[test]
    fn empty_video_list_loads() {
        let corpus = Corpus::parse(r#"{"total_count": 0, "videos": []}"#).unwrap();
        assert!(corpus.samples.is_empty());
    }
}
