//! rust_methdiff command-line interface

use std::fs;
use std::path::Path;

use clap::Parser;
use log::{info, LevelFilter};

use rust_methdiff::classify::{top_hyper, top_hypo};
use rust_methdiff::cli::{build_config, output_path, Cli, Commands, InputArgs, ParamArgs, RunOverrides};
use rust_methdiff::io::{write_json, write_united_windows, OutputSet};
use rust_methdiff::prelude::*;
use rust_methdiff::{run_pipeline_with_layout, tile_and_unite};

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn main() {
    let args: Vec<String> = std::env::args().collect();

    // Find the first non-flag argument (potential subcommand)
    let first_positional = args.iter().skip(1).find(|a| !a.starts_with('-'));
    let subcommands = ["run", "tile", "help"];
    let has_subcommand = first_positional.map_or(false, |a| subcommands.contains(&a.as_str()));

    if !has_subcommand {
        // No subcommand: handle top-level help/version manually
        if args.len() == 1 {
            print_no_args();
            return;
        }
        if args.iter().any(|a| a == "--help") {
            print_long_help();
            return;
        }
        if args.iter().any(|a| a == "-h") {
            print_short_help();
            return;
        }
        if args.iter().any(|a| a == "-V" || a == "--version") {
            println!("rust_methdiff {}", VERSION);
            return;
        }
        print_no_args();
        return;
    }

    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    env_logger::Builder::new()
        .filter_level(log_level)
        .format_timestamp(None)
        .init();

    let result = match cli.command {
        Some(Commands::Run {
            input,
            params,
            min_diff,
            qvalue,
            test,
            overdispersion,
            dispersion_test,
            adjust,
            output_dir,
            prefix,
        }) => {
            let overrides = RunOverrides {
                min_diff,
                qvalue,
                test,
                overdispersion,
                dispersion_test,
                adjust,
            };
            run_analysis(&input, &params, &overrides, &output_dir, &prefix)
        }
        Some(Commands::Tile { input, params, output }) => run_tile(&input, &params, &output),
        None => {
            print_no_args();
            return;
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

// ---------------------------------------------------------------------------
// Custom help output
// ---------------------------------------------------------------------------

fn print_no_args() {
    println!("rust_methdiff v{}", VERSION);
    println!("Run `rust_methdiff -h` for usage or `rust_methdiff --help` for detailed information.");
}

fn print_short_help() {
    println!("rust_methdiff v{}", VERSION);
    println!();
    println!("Usage: rust_methdiff <COMMAND> [OPTIONS]");
    println!();
    println!("Commands:");
    println!("  run   Call differentially methylated windows");
    println!("  tile  Tile and unite samples without testing");
    println!();
    println!("Run `rust_methdiff <COMMAND> -h` for command-specific options.");
}

fn print_long_help() {
    println!("rust_methdiff v{}", VERSION);
    println!("Windowed differential DNA methylation calling in Rust");
    println!();
    println!("Usage: rust_methdiff <COMMAND> [OPTIONS]");
    println!();
    println!("Commands:");
    println!("  run   Call differentially methylated windows");
    println!("          - Coverage filtering and median/mean normalization");
    println!("          - Fixed-size, optionally overlapping windows");
    println!("          - Logistic-regression LRT or Fisher's exact test");
    println!("          - McCullagh-Nelder overdispersion correction");
    println!("          - Benjamini-Hochberg or Bonferroni adjustment");
    println!("  tile  Tile and unite samples without testing");
    println!();
    println!("Global Options:");
    println!("  -v, --verbose    Enable verbose output");
    println!("  -h               Print short help");
    println!("      --help       Print detailed help");
    println!("  -V, --version    Print version");
    println!();
    println!("Examples:");
    println!("  rust_methdiff run -s samples.csv -o results");
    println!();
    println!("  rust_methdiff run -s samples.csv --window-size 500 --step-size 250 \\");
    println!("    --overdispersion mn --qvalue 0.05 --min-diff 20");
    println!();
    println!("  rust_methdiff tile -s samples.csv -o united.tsv");
}

// ---------------------------------------------------------------------------
// Subcommand implementations
// ---------------------------------------------------------------------------

/// Read the sample sheet and every cytosine report it lists
fn load_samples(samples_path: &Path) -> Result<(Vec<SiteRecord>, SampleLayout)> {
    info!("Loading sample sheet from: {}", samples_path.display());
    let sheet = read_sample_sheet(samples_path)?;
    let layout = SampleLayout::new(sheet.iter().map(|entry| entry.info()).collect())?;

    let mut records = Vec::new();
    for entry in &sheet {
        info!("Loading {} ({}) from: {}", entry.sample_id, entry.group, entry.path.display());
        let sample_records = read_cytosine_report(&entry.path, &entry.sample_id, entry.group)?;
        info!("  {} covered cytosines", sample_records.len());
        records.extend(sample_records);
    }

    Ok((records, layout))
}

fn run_analysis(
    input: &InputArgs,
    params: &ParamArgs,
    overrides: &RunOverrides,
    output_dir: &Path,
    prefix: &str,
) -> Result<()> {
    let config = build_config(input, params, overrides)?;
    let (records, layout) = load_samples(&input.samples)?;

    info!(
        "Running on {} samples: {} control, {} experimental",
        layout.n_samples(),
        layout.n_in_group(Group::Control),
        layout.n_in_group(Group::Experimental)
    );
    let output = run_pipeline_with_layout(&records, &layout, &config)?;
    let summary = output.summary(&config.classify);

    // Nothing appears at the final paths unless every file was written
    fs::create_dir_all(output_dir)?;
    let all_path = output_path(output_dir, prefix, "all.csv");
    let mut outputs = OutputSet::new();
    write_diff_results(outputs.stage(&all_path), &output.classified.all)?;
    write_diff_results(
        outputs.stage(output_path(output_dir, prefix, "hyper.csv")),
        &output.classified.hyper,
    )?;
    write_diff_results(
        outputs.stage(output_path(output_dir, prefix, "hypo.csv")),
        &output.classified.hypo,
    )?;
    write_json(
        outputs.stage(output_path(output_dir, prefix, "summary.json")),
        &serde_json::json!({
            "version": VERSION,
            "test": output.test,
            "config": config,
            "summary": summary,
        }),
    )?;
    outputs.commit()?;
    info!("Results written to: {}", all_path.display());

    println!();
    print!("{}", summary);

    for (label, hits) in [
        ("hypermethylated", top_hyper(&output.classified, 5)),
        ("hypomethylated", top_hypo(&output.classified, 5)),
    ] {
        if hits.is_empty() {
            continue;
        }
        println!();
        println!("Top {} windows:", label);
        for hit in hits {
            println!("  {}  diff={:+.1}%  q={:.3e}", hit.key, hit.meth_diff, hit.qvalue);
        }
    }

    Ok(())
}

fn run_tile(input: &InputArgs, params: &ParamArgs, output: &Path) -> Result<()> {
    let config = build_config(input, params, &RunOverrides::default())?;
    let (records, layout) = load_samples(&input.samples)?;

    let (united, dropped) = tile_and_unite(&records, &layout, &config)?;
    info!("{} windows united, {} dropped as missing in some sample", united.n_windows(), dropped);

    let mut outputs = OutputSet::new();
    write_united_windows(outputs.stage(output), &united)?;
    outputs.commit()?;
    info!("United windows written to: {}", output.display());

    Ok(())
}
