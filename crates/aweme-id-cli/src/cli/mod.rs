pub mod config;
pub mod corpus;
pub mod render;
pub mod telemetry;

use anyhow::bail;
use aweme_id::{
    AwemeId, OffsetEstimator, PatternDetector, SchemeCatalog, Source, forge, forge_random,
    validate,
};
use config::{Action, Config};
use corpus::Corpus;
use rand::{SeedableRng, rngs::StdRng};
use render::{
    DecodeEntry, DecodedView, EstimateView, ForgedView, SchemeView, SourceEstimate, emit,
};
use std::io::Write;

/// Runs one command, writing its result to `out`.
pub fn run(config: Config, out: &mut dyn Write) -> anyhow::Result<()> {
    let json = config.json;
    match config.action {
        Action::Decode { ids, schemes } => {
            let catalog = schemes.then(SchemeCatalog::builtin);
            let entries: Vec<DecodeEntry> = ids
                .into_iter()
                .map(|raw| match raw.parse::<AwemeId>() {
                    Ok(id) => DecodeEntry::Decoded(DecodedView::new(id, catalog.as_ref())),
                    Err(err) => {
                        tracing::warn!(aweme_id = %raw, %err, "failed to decode");
                        DecodeEntry::Failed {
                            aweme_id: raw,
                            error: err.to_string(),
                        }
                    }
                })
                .collect();
            emit(out, &entries[..], json)?;

            let failed = entries
                .iter()
                .filter(|e| matches!(e, DecodeEntry::Failed { .. }))
                .count();
            if failed > 0 {
                bail!("{failed} of {} ids could not be decoded", entries.len());
            }
        }
        Action::Schemes => {
            let catalog = SchemeCatalog::builtin();
            let default = catalog.default_scheme().name();
            let views: Vec<SchemeView<'_>> = catalog
                .iter()
                .map(|scheme| SchemeView {
                    label: scheme.label(),
                    default: scheme.name() == default,
                    scheme,
                })
                .collect();
            emit(out, &views[..], json)?;
        }
        Action::Analyze {
            corpus,
            scheme,
            group_by,
        } => {
            let records = Corpus::load(&corpus)?.labeled();
            let report = PatternDetector::new()
                .with_scheme(&scheme)
                .group_by(group_by)
                .detect(&records)?;
            emit(out, &report, json)?;
        }
        Action::Validate { corpus, options } => {
            let corpus = Corpus::load(&corpus)?;
            let report = validate(&corpus.samples, &options)?;
            if report.skipped_count() > 0 {
                tracing::warn!(
                    skipped = report.skipped_count(),
                    validated = report.validated_count(),
                    "some samples could not be validated"
                );
            }
            emit(out, &report, json)?;
        }
        Action::Estimate { corpus, window } => {
            let corpus = Corpus::load(&corpus)?;
            let view = estimate(&corpus, window);
            emit(out, &view, json)?;
        }
        Action::Forge {
            timestamp,
            residual,
            seed,
        } => {
            let id = match residual {
                Some(residual) => forge(timestamp, residual)?,
                None => {
                    // Range check only; the residual is replaced below.
                    let timestamp = forge(timestamp, 0)?.timestamp();
                    let mut rng = match seed {
                        Some(seed) => StdRng::seed_from_u64(seed),
                        None => StdRng::from_rng(&mut rand::rng()),
                    };
                    forge_random(timestamp, &mut rng)
                }
            };
            emit(out, &ForgedView::from(id), json)?;
        }
    }
    Ok(())
}

/// Feeds the corpus, in file order, through an [`OffsetEstimator`].
fn estimate(corpus: &Corpus, window: usize) -> EstimateView {
    let mut estimator = OffsetEstimator::new(window);
    for sample in &corpus.samples {
        let (Ok(id), Some(ground_truth)) = (sample.id(), sample.create_time) else {
            tracing::debug!(aweme_id = %sample.aweme_id, "not usable for estimation");
            continue;
        };
        estimator.observe(sample.source, id.timestamp(), ground_truth);
    }

    let offsets = estimator.offsets();
    let sources = Source::ALL
        .into_iter()
        .filter_map(|source| {
            let estimate = SourceEstimate {
                observations: estimator.len(source),
                mean: estimator.mean(source)?,
                offset: offsets.get(source),
            };
            Some((source, estimate))
        })
        .collect();

    EstimateView {
        window: estimator.window(),
        sources,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aweme_id::{GroupKey, SampleRecord, ValidationOptions};

    fn run_to_string(action: Action, json: bool) -> anyhow::Result<String> {
        let mut buf = Vec::new();
        run(Config { json, action }, &mut buf)?;
        Ok(String::from_utf8(buf)?)
    }

    #[test]
    fn decode_reports_failures() {
        let err = run_to_string(
            Action::Decode {
                ids: vec!["7350810998023949599".into(), "-1".into()],
                schemes: false,
            },
            false,
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "1 of 2 ids could not be decoded");
    }

    #[test]
    fn forge_with_seed_is_reproducible() {
        let action = || Action::Forge {
            timestamp: 1_711_494_056,
            residual: None,
            seed: Some(42),
        };
        let a = run_to_string(action(), true).unwrap();
        let b = run_to_string(action(), true).unwrap();
        assert_eq!(a, b);

        let value: serde_json::Value = serde_json::from_str(&a).unwrap();
        assert_eq!(value["timestamp_seconds"], 1_711_494_056);
    }

    #[test]
    fn forge_rejects_wide_values() {
        let err = run_to_string(
            Action::Forge {
                timestamp: 1 << 32,
                residual: None,
                seed: None,
            },
            false,
        )
        .unwrap_err();
        assert!(err.to_string().contains("timestamp_seconds"));

        let err = run_to_string(
            Action::Forge {
                timestamp: 1,
                residual: Some(u64::MAX),
                seed: None,
            },
            false,
        )
        .unwrap_err();
        assert!(err.to_string().contains("residual"));
    }

    #[test]
    fn estimate_uses_latest_window() {
        let corpus = Corpus {
            samples: [10, 20, 30, 40]
                .into_iter()
                .enumerate()
                .map(|(i, lag)| {
                    let ts = 1_700_000_000 + i as u32 * 100;
                    let id = AwemeId::from_parts(ts, i as u32);
                    SampleRecord::new(id.to_string(), Source::TikTok, i64::from(ts) + lag)
                })
                .collect(),
        };
        let view = estimate(&corpus, 2);
        assert_eq!(view.window, 2);
        let tiktok = &view.sources[&Source::TikTok];
        assert_eq!(tiktok.observations, 2);
        assert_eq!(tiktok.offset, 35);
        assert!(!view.sources.contains_key(&Source::Douyin));
    }

    #[test]
    fn schemes_json_lists_catalog() {
        let out = run_to_string(Action::Schemes, true).unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value.as_array().unwrap().len(), 4);
        assert_eq!(value[2]["label"], "16+16");
    }

    #[test]
    fn corpus_backed_actions_need_a_readable_file() {
        let missing = std::path::PathBuf::from("/nonexistent/corpus.json");
        let err = run_to_string(
            Action::Validate {
                corpus: missing.clone(),
                options: ValidationOptions::default(),
            },
            false,
        )
        .unwrap_err();
        assert!(err.to_string().contains("failed to read corpus"));

        let scheme = SchemeCatalog::builtin().default_scheme().clone();
        assert!(
            run_to_string(
                Action::Analyze {
                    corpus: missing,
                    scheme,
                    group_by: GroupKey::Residual,
                },
                false,
            )
            .is_err()
        );
    }
}
