//! Command-line interface for rust_methdiff

use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};

use crate::classify::ClassifyParams;
use crate::config::PipelineConfig;
use crate::data::Context;
use crate::error::Result;
use crate::normalization::{NormalizeMethod, ReferenceLevel};
use crate::testing::{AdjustMethod, DispersionTest, Overdispersion, StatTest};

#[derive(Parser)]
#[command(name = "rust_methdiff")]
#[command(version)]
#[command(about = "Windowed differential DNA methylation calling in Rust")]
#[command(disable_help_flag = true)]
#[command(disable_version_flag = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Call differentially methylated windows
    #[command(
        about = "Call differentially methylated windows",
        long_about = "Call differentially methylated windows\n\n\
            Reads one cytosine report per sample, filters and normalizes coverage,\n\
            tiles sites into windows, keeps windows covered in every sample and tests\n\
            each for a methylation difference between control and experimental groups.\n\n\
            Writes <prefix>.all.csv, <prefix>.hyper.csv, <prefix>.hypo.csv and\n\
            <prefix>.summary.json to the output directory.",
        after_long_help = "\
Examples:
  # 1 kb tiles, defaults everywhere else
  rust_methdiff run -s samples.csv -o results

  # Overlapping 500 bp windows with overdispersion correction
  rust_methdiff run -s samples.csv --window-size 500 --step-size 250 \\
    --overdispersion mn --dispersion-test f

  # Pool replicates and use Fisher's exact test
  rust_methdiff run -s samples.csv --pool --qvalue 0.05 --min-diff 20

  # Parameters from a JSON file, one overridden on the command line
  rust_methdiff run -s samples.csv --config params.json --min-coverage 5"
    )]
    Run {
        #[command(flatten)]
        input: InputArgs,

        #[command(flatten)]
        params: ParamArgs,

        /// Minimum absolute methylation difference in percent [default: 25]
        #[arg(long, value_name = "PERCENT")]
        min_diff: Option<f64>,

        /// Maximum q-value for a window to be called [default: 0.01]
        #[arg(short, long, value_name = "Q")]
        qvalue: Option<f64>,

        /// Statistical test [default: auto]
        #[arg(long, value_enum,
            long_help = "Statistical test applied to every window.\n\
                auto:   Fisher's exact test when each group has a single sample, otherwise lrt\n\
                lrt:    Logistic-regression likelihood-ratio test\n\
                fisher: Fisher's exact test on the pooled 2x2 table")]
        test: Option<StatTest>,

        /// Overdispersion correction for the lrt [default: none]
        #[arg(long, value_enum)]
        overdispersion: Option<Overdispersion>,

        /// Distribution for the overdispersion-scaled statistic [default: chisq]
        #[arg(long, value_enum)]
        dispersion_test: Option<DispersionTest>,

        /// Multiple-testing adjustment [default: bh]
        #[arg(long, value_enum)]
        adjust: Option<AdjustMethod>,

        /// Output directory [default: .]
        #[arg(short, long, default_value = ".")]
        output_dir: PathBuf,

        /// Prefix of output file names
        #[arg(long, default_value = "methdiff")]
        prefix: String,
    },

    /// Tile and unite samples without testing
    #[command(
        long_about = "Tile and unite samples without testing.\n\n\
            Runs filtering, normalization, tiling and uniting, and writes the\n\
            window x sample coverage, methylated counts and ratios as a TSV table.",
        after_long_help = "\
Examples:
  rust_methdiff tile -s samples.csv --window-size 1000 -o united.tsv"
    )]
    Tile {
        #[command(flatten)]
        input: InputArgs,

        #[command(flatten)]
        params: ParamArgs,

        /// Output file path [default: united_windows.tsv]
        #[arg(short, long, default_value = "united_windows.tsv")]
        output: PathBuf,
    },
}

/// Inputs shared by every subcommand
#[derive(Args)]
pub struct InputArgs {
    /// Sample sheet (sample_id, group, path)
    #[arg(short, long,
        long_help = "Sample sheet listing one cytosine report per sample.\n\
            Columns: sample_id, group (control/experimental), path.\n\
            Supports both CSV (comma) and TSV (tab) delimiters (auto-detected).\n\
            Relative paths are resolved against the sheet's directory.")]
    pub samples: PathBuf,

    /// JSON configuration file
    #[arg(long,
        long_help = "JSON configuration file with any subset of the run parameters.\n\
            Command-line options take precedence over values in the file.")]
    pub config: Option<PathBuf>,

    /// Number of threads (0 = all cores) [default: 0]
    #[arg(short, long)]
    pub threads: Option<usize>,
}

/// Filtering, normalization and tiling options shared by every subcommand
#[derive(Args)]
pub struct ParamArgs {
    /// Cytosine context [default: cpg]
    #[arg(long, value_enum)]
    pub context: Option<Context>,

    /// Minimum site coverage [default: 10]
    #[arg(long, value_name = "READS")]
    pub min_coverage: Option<u32>,

    /// Drop sites above this coverage percentile per sample [default: 100]
    #[arg(long, value_name = "PERCENTILE",
        long_help = "Discard sites whose coverage lies above this percentile of their\n\
            sample's coverage distribution (PCR duplicates). 100 disables the filter.")]
    pub hi_percentile: Option<f64>,

    /// Coverage statistic used for normalization [default: median]
    #[arg(long, value_enum)]
    pub norm_method: Option<NormalizeMethod>,

    /// Scale samples to the lowest or highest coverage level [default: min]
    #[arg(long, value_enum)]
    pub norm_reference: Option<ReferenceLevel>,

    /// Pool replicates of each group before tiling
    #[arg(long)]
    pub pool: bool,

    /// Window size in bases [default: 1000]
    #[arg(short, long, value_name = "BASES")]
    pub window_size: Option<u64>,

    /// Step between window starts in bases [default: 1000]
    #[arg(long, value_name = "BASES")]
    pub step_size: Option<u64>,

    /// Minimum covered cytosines per window [default: 1]
    #[arg(long, value_name = "N")]
    pub min_sites: Option<u32>,
}

/// Optional test and classification overrides of the `run` subcommand
#[derive(Default)]
pub struct RunOverrides {
    pub min_diff: Option<f64>,
    pub qvalue: Option<f64>,
    pub test: Option<StatTest>,
    pub overdispersion: Option<Overdispersion>,
    pub dispersion_test: Option<DispersionTest>,
    pub adjust: Option<AdjustMethod>,
}

/// Start from the JSON file (or defaults) and apply every option given on the command line
pub fn build_config(input: &InputArgs, params: &ParamArgs, run: &RunOverrides) -> Result<PipelineConfig> {
    let mut config = match &input.config {
        Some(path) => PipelineConfig::from_json_file(path)?,
        None => PipelineConfig::default(),
    };

    if let Some(threads) = input.threads {
        config.threads = threads;
    }

    if let Some(context) = params.context {
        config.context = context;
    }
    if let Some(min_coverage) = params.min_coverage {
        config.filter.min_coverage = min_coverage;
    }
    if let Some(hi_percentile) = params.hi_percentile {
        config.filter.hi_percentile = hi_percentile;
    }
    if let Some(method) = params.norm_method {
        config.normalize.method = method;
    }
    if let Some(reference) = params.norm_reference {
        config.normalize.reference = reference;
    }
    if params.pool {
        config.pool = true;
    }
    if let Some(window_size) = params.window_size {
        config.tiling.window_size = window_size;
    }
    if let Some(step_size) = params.step_size {
        config.tiling.step_size = step_size;
    }
    if let Some(min_sites) = params.min_sites {
        config.tiling.min_sites = min_sites;
    }

    if let Some(test) = run.test {
        config.test.test = test;
    }
    if let Some(overdispersion) = run.overdispersion {
        config.test.overdispersion = overdispersion;
    }
    if let Some(dispersion_test) = run.dispersion_test {
        config.test.dispersion_test = dispersion_test;
    }
    if let Some(adjust) = run.adjust {
        config.test.adjust = adjust;
    }
    config.classify = ClassifyParams {
        min_diff: run.min_diff.unwrap_or(config.classify.min_diff),
        q_threshold: run.qvalue.unwrap_or(config.classify.q_threshold),
    };

    config.validate()?;
    Ok(config)
}

/// `<dir>/<prefix>.<suffix>`
pub fn output_path(dir: &Path, prefix: &str, suffix: &str) -> PathBuf {
    dir.join(format!("{}.{}", prefix, suffix))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_parse_run() {
        let cli = parse(&[
            "rust_methdiff",
            "run",
            "-s",
            "samples.csv",
            "--window-size",
            "500",
            "--test",
            "lrt",
            "--overdispersion",
            "mn",
            "--adjust",
            "bonferroni",
            "--context",
            "cg",
            "-v",
        ]);
        assert!(cli.verbose);
        match cli.command {
            Some(Commands::Run {
                input,
                params,
                test,
                overdispersion,
                adjust,
                ..
            }) => {
                assert_eq!(input.samples, PathBuf::from("samples.csv"));
                assert_eq!(params.window_size, Some(500));
                assert_eq!(params.context, Some(Context::CpG));
                assert_eq!(test, Some(StatTest::LogisticLrt));
                assert_eq!(overdispersion, Some(Overdispersion::McCullaghNelder));
                assert_eq!(adjust, Some(AdjustMethod::Bonferroni));
            }
            _ => panic!("expected the run subcommand"),
        }
    }

    #[test]
    fn test_command_line_overrides_config_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"{{"filter": {{"min_coverage": 3}}, "tiling": {{"window_size": 200, "step_size": 200}}, "classify": {{"q_threshold": 0.05}}}}"#
        )
        .unwrap();
        let config_path = file.path().to_str().unwrap().to_string();

        let cli = parse(&[
            "rust_methdiff",
            "tile",
            "-s",
            "samples.csv",
            "--config",
            &config_path,
            "--min-coverage",
            "8",
        ]);
        let Some(Commands::Tile { input, params, .. }) = cli.command else {
            panic!("expected the tile subcommand");
        };

        let config = build_config(&input, &params, &RunOverrides::default()).unwrap();
        assert_eq!(config.filter.min_coverage, 8);
        assert_eq!(config.tiling.window_size, 200);
        assert_eq!(config.classify.q_threshold, 0.05);
        assert_eq!(config.classify.min_diff, 25.0);
    }

    #[test]
    fn test_invalid_override_rejected() {
        let cli = parse(&["rust_methdiff", "tile", "-s", "samples.csv", "--step-size", "0"]);
        let Some(Commands::Tile { input, params, .. }) = cli.command else {
            panic!("expected the tile subcommand");
        };
        assert!(build_config(&input, &params, &RunOverrides::default()).is_err());
    }

    #[test]
    fn test_output_path() {
        assert_eq!(
            output_path(Path::new("out"), "run1", "hyper.csv"),
            PathBuf::from("out/run1.hyper.csv")
        );
    }
}
