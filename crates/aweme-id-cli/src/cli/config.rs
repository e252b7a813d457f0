use anyhow::{Context, bail};
use aweme_id::{
    CalibrationOffsets, DEFAULT_CLOSE_THRESHOLD, DEFAULT_SCHEME, GroupKey, Scheme, SchemeCatalog,
    Source, ValidationOptions,
};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Command-line arguments for the `aweme-id` binary.
///
/// Every option that tunes an analysis can also be set from the environment
/// (or a `.env` file), so that calibration offsets re-tuned from fresh
/// samples do not have to be repeated on every invocation.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "aweme-id",
    version,
    about = "Decode Douyin/TikTok video IDs and validate the decoded publish time"
)]
pub struct CliArgs {
    /// Print machine-readable JSON on stdout instead of text.
    #[arg(long, global = true, default_value_t = false)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Decode one or more ids into timestamp and residual.
    Decode {
        /// Decimal ids.
        #[arg(required = true)]
        ids: Vec<String>,

        /// Also break the residual down under every built-in scheme.
        #[arg(long, default_value_t = false)]
        schemes: bool,
    },

    /// List the residual partition schemes.
    Schemes,

    /// Look for duplicates and byte patterns in the residuals of a corpus.
    Analyze {
        #[command(flatten)]
        corpus: CorpusArgs,

        /// Scheme name or width label (e.g. `16+16`).
        ///
        /// Environment variable: `SCHEME`
        #[arg(long, env = "SCHEME", default_value = DEFAULT_SCHEME)]
        scheme: String,

        /// Group duplicates by `residual` or by a field of the scheme.
        /// Defaults to the scheme's sequence field.
        #[arg(long)]
        group_by: Option<String>,
    },

    /// Compare decoded timestamps with the corpus' create times.
    Validate {
        #[command(flatten)]
        corpus: CorpusArgs,

        /// Largest error in seconds that still counts as a close match.
        ///
        /// Environment variable: `CLOSE_THRESHOLD`
        #[arg(long, env = "CLOSE_THRESHOLD", default_value_t = DEFAULT_CLOSE_THRESHOLD)]
        threshold: u32,

        /// Apply the per-source offsets before comparing.
        #[arg(long, default_value_t = false)]
        calibrate: bool,

        #[command(flatten)]
        offsets: OffsetArgs,
    },

    /// Estimate calibration offsets from the most recent samples.
    Estimate {
        #[command(flatten)]
        corpus: CorpusArgs,

        /// Number of most recent samples per source to average.
        ///
        /// Environment variable: `ESTIMATE_WINDOW`
        #[arg(long, env = "ESTIMATE_WINDOW", default_value_t = 20)]
        window: usize,
    },

    /// Build a synthetic id. The result was never issued by either platform.
    Forge {
        /// Unix timestamp in seconds.
        timestamp: u64,

        /// Residual value; random when omitted.
        #[arg(long)]
        residual: Option<u64>,

        /// Seed for the random residual.
        #[arg(long, conflicts_with = "residual")]
        seed: Option<u64>,
    },
}

#[derive(Args, Debug, Clone)]
pub struct CorpusArgs {
    /// Path to the labeled corpus JSON.
    ///
    /// Environment variable: `CORPUS_PATH`
    #[arg(long, env = "CORPUS_PATH", default_value = "aweme_ids_output.json")]
    pub corpus: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct OffsetArgs {
    /// Seconds added to decoded Douyin timestamps with `--calibrate`.
    ///
    /// Environment variable: `DOUYIN_OFFSET`
    #[arg(long, env = "DOUYIN_OFFSET", default_value_t = 13, allow_negative_numbers = true)]
    pub douyin_offset: i64,

    /// Seconds added to decoded TikTok timestamps with `--calibrate`.
    ///
    /// Environment variable: `TIKTOK_OFFSET`
    #[arg(long, env = "TIKTOK_OFFSET", default_value_t = 18, allow_negative_numbers = true)]
    pub tiktok_offset: i64,
}

impl From<OffsetArgs> for CalibrationOffsets {
    fn from(args: OffsetArgs) -> Self {
        Self::new()
            .with(Source::Douyin, args.douyin_offset)
            .with(Source::TikTok, args.tiktok_offset)
    }
}

/// Validated run configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub json: bool,
    pub action: Action,
}

#[derive(Debug, Clone)]
pub enum Action {
    Decode {
        ids: Vec<String>,
        schemes: bool,
    },
    Schemes,
    Analyze {
        corpus: PathBuf,
        scheme: Scheme,
        group_by: GroupKey,
    },
    Validate {
        corpus: PathBuf,
        options: ValidationOptions,
    },
    Estimate {
        corpus: PathBuf,
        window: usize,
    },
    Forge {
        timestamp: u64,
        residual: Option<u64>,
        seed: Option<u64>,
    },
}

impl TryFrom<CliArgs> for Config {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        let action = match args.command {
            Command::Decode { ids, schemes } => Action::Decode { ids, schemes },
            Command::Schemes => Action::Schemes,
            Command::Analyze {
                corpus,
                scheme,
                group_by,
            } => {
                let scheme = SchemeCatalog::builtin()
                    .get(&scheme)
                    .cloned()
                    .with_context(|| format!("SCHEME {scheme:?} is not a built-in scheme"))?;
                let group_by = match group_by.as_deref() {
                    None => GroupKey::sequence_of(&scheme),
                    Some("residual") => GroupKey::Residual,
                    Some(field) if scheme.has_field(field) => GroupKey::Field(field.to_owned()),
                    Some(field) => bail!(
                        "--group-by {field:?} is neither `residual` nor a field of {} ({})",
                        scheme.name(),
                        field_names(&scheme)
                    ),
                };
                Action::Analyze {
                    corpus: corpus.corpus,
                    scheme,
                    group_by,
                }
            }
            Command::Validate {
                corpus,
                threshold,
                calibrate,
                offsets,
            } => {
                let offsets = if calibrate {
                    CalibrationOffsets::from(offsets)
                } else {
                    CalibrationOffsets::default()
                };
                Action::Validate {
                    corpus: corpus.corpus,
                    options: ValidationOptions::default()
                        .with_threshold(threshold)
                        .with_offsets(offsets),
                }
            }
            Command::Estimate { corpus, window } => {
                if window == 0 {
                    bail!("ESTIMATE_WINDOW must be greater than 0");
                }
                Action::Estimate {
                    corpus: corpus.corpus,
                    window,
                }
            }
            Command::Forge {
                timestamp,
                residual,
                seed,
            } => Action::Forge {
                timestamp,
                residual,
                seed,
            },
        };

        Ok(Self {
            json: args.json,
            action,
        })
    }
}

fn field_names(scheme: &Scheme) -> String {
    scheme
        .fields()
        .iter()
        .map(|f| f.name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}
