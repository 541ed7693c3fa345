//! rust_methdiff: windowed differential DNA methylation calling in Rust
//!
//! Per-cytosine methylation counts from bisulfite sequencing are filtered,
//! normalized across samples, tiled into fixed-size windows, united across
//! samples and tested for a methylation difference between a control and an
//! experimental group.
//!
//! # Example
//!
//! ```ignore
//! use rust_methdiff::prelude::*;
//!
//! // Load data
//! let sheet = read_sample_sheet("samples.csv")?;
//! let mut records = Vec::new();
//! for entry in &sheet {
//!     records.extend(read_cytosine_report(&entry.path, &entry.sample_id, entry.group)?);
//! }
//! let layout = SampleLayout::new(sheet.iter().map(|e| e.info()).collect())?;
//!
//! // Run analysis
//! let output = run_pipeline_with_layout(&records, &layout, &PipelineConfig::default())?;
//!
//! // Get results
//! println!("{} hypermethylated windows", output.classified.hyper.len());
//! ```

pub mod classify;
pub mod cli;
pub mod config;
pub mod data;
pub mod error;
pub mod filter;
pub mod io;
pub mod normalization;
pub mod stats;
pub mod testing;
pub mod tiling;
pub mod unite;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::classify::{classify, ClassifyParams};
    pub use crate::config::PipelineConfig;
    pub use crate::data::{pool_replicates, Context, Group, SampleInfo, SampleLayout, SiteRecord, Strand, WindowKey};
    pub use crate::error::{MethDiffError, Result};
    pub use crate::filter::{filter_sites, select_context, FilterParams};
    pub use crate::io::{
        read_cytosine_report, read_sample_sheet, write_diff_results, ClassifiedResults, DiffResult, Direction,
        ResultsSummary,
    };
    pub use crate::normalization::{normalize_coverage, NormalizeMethod, NormalizeParams, ReferenceLevel};
    pub use crate::testing::{calculate_diff_meth, AdjustMethod, DiffTestParams, StatTest};
    pub use crate::tiling::{tile_samples, TilingParams};
    pub use crate::unite::{unite_samples, UnitedWindows};
}

use log::{debug, info};

use data::{validate_records, WindowExclusions};
use prelude::*;
use testing::ResolvedTest;

/// Everything a run produces
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    /// Samples that were tiled (the group pseudo-samples when pooling)
    pub layout: SampleLayout,
    pub united: UnitedWindows,
    /// Per-window results for every tested window
    pub results: Vec<DiffResult>,
    pub test: ResolvedTest,
    pub classified: ClassifiedResults,
    pub exclusions: WindowExclusions,
}

impl PipelineOutput {
    pub fn summary(&self, params: &ClassifyParams) -> ResultsSummary {
        ResultsSummary {
            samples: self.layout.n_samples(),
            windows_united: self.united.n_windows(),
            windows_tested: self.results.len(),
            significant: self.classified.all.len(),
            hyper: self.classified.hyper.len(),
            hypo: self.classified.hypo.len(),
            q_threshold: params.q_threshold,
            min_diff: params.min_diff,
            exclusions: self.exclusions,
        }
    }
}

/// Run `op` on a dedicated pool of `threads` workers, or on the global pool when 0
fn in_thread_pool<T, F>(threads: usize, op: F) -> Result<T>
where
    T: Send,
    F: FnOnce() -> Result<T> + Send,
{
    if threads == 0 {
        return op();
    }
    let pool = rayon::ThreadPoolBuilder::new().num_threads(threads).build()?;
    pool.install(op)
}

/// Every record must belong to a layout sample and agree on its group
fn check_records_against_layout(records: &[SiteRecord], layout: &SampleLayout) -> Result<()> {
    for record in records {
        match layout.index_of(&record.sample_id) {
            Some(j) if layout.group(j) == record.group => {}
            Some(j) => {
                return Err(MethDiffError::InvalidInput {
                    reason: format!(
                        "sample '{}' is labelled both {} and {}",
                        record.sample_id,
                        layout.group(j),
                        record.group
                    ),
                })
            }
            None => {
                return Err(MethDiffError::InvalidInput {
                    reason: format!("sample '{}' is not part of the run", record.sample_id),
                })
            }
        }
    }
    Ok(())
}

/// Context selection, coverage filtering, normalization and optional pooling
fn prepare_sites(
    records: &[SiteRecord],
    layout: &SampleLayout,
    config: &PipelineConfig,
) -> Result<(Vec<SiteRecord>, SampleLayout)> {
    let selected = select_context(records, config.context);
    debug!("{} {} sites of {} records", selected.len(), config.context, records.len());

    let filtered = filter_sites(&selected, &config.filter)?;
    info!("Coverage filter: {} sites kept", filtered.len());

    let normalized = normalize_coverage(&filtered, layout, &config.normalize)?;

    if config.pool {
        let (pooled, pooled_layout) = pool_replicates(&normalized, layout)?;
        info!("Pooled replicates into {} sites", pooled.len());
        Ok((pooled, pooled_layout))
    } else {
        Ok((normalized, layout.clone()))
    }
}

fn tile_and_unite_inner(
    records: &[SiteRecord],
    layout: &SampleLayout,
    config: &PipelineConfig,
) -> Result<(UnitedWindows, SampleLayout, usize)> {
    config.validate()?;
    validate_records(records)?;
    layout.require_both_groups()?;
    check_records_against_layout(records, layout)?;

    let (sites, layout) = prepare_sites(records, layout, config)?;

    let per_sample = tile_samples(&sites, &layout, &config.tiling)?;
    let (united, dropped) = unite_samples(&per_sample, &layout)?;
    info!(
        "United {} windows across {} samples ({} missing in some sample)",
        united.n_windows(),
        layout.n_samples(),
        dropped
    );

    Ok((united, layout, dropped))
}

/// Run every stage up to and including uniting
///
/// Returns the united windows and the number of windows dropped because a
/// sample lacked them.
pub fn tile_and_unite(
    records: &[SiteRecord],
    layout: &SampleLayout,
    config: &PipelineConfig,
) -> Result<(UnitedWindows, usize)> {
    in_thread_pool(config.threads, || {
        let (united, _, dropped) = tile_and_unite_inner(records, layout, config)?;
        Ok((united, dropped))
    })
}

/// Run the complete differential methylation pipeline with an explicit sample layout
///
/// Samples in `layout` with no records are reported as insufficient data.
pub fn run_pipeline_with_layout(
    records: &[SiteRecord],
    layout: &SampleLayout,
    config: &PipelineConfig,
) -> Result<PipelineOutput> {
    in_thread_pool(config.threads, || {
        let (united, layout, dropped) = tile_and_unite_inner(records, layout, config)?;

        let diff = testing::calculate_diff_meth(&united, &config.test)?;
        let mut exclusions = WindowExclusions {
            missing_in_samples: dropped,
            ..Default::default()
        };
        exclusions.merge(&diff.exclusions);
        info!("Tested {} windows with {:?}; {}", diff.results.len(), diff.test, exclusions);

        let classified = classify(&diff.results, &config.classify);

        Ok(PipelineOutput {
            layout,
            united,
            results: diff.results,
            test: diff.test,
            classified,
            exclusions,
        })
    })
}

/// Run the complete differential methylation pipeline
///
/// The sample layout is taken from the records themselves.
pub fn run_pipeline(records: &[SiteRecord], config: &PipelineConfig) -> Result<PipelineOutput> {
    validate_records(records)?;
    let layout = SampleLayout::from_records(records)?;
    run_pipeline_with_layout(records, &layout, config)
}

#[cfg(test)]
mod tests {
    use super::*;

    const POSITIONS: [u64; 10] = [50, 75, 100, 130, 160, 190, 220, 250, 270, 290];

    fn site(chrom: &str, pos: u64, cov: u32, meth: u32, sample: &str, group: Group) -> SiteRecord {
        SiteRecord::new(chrom, pos, Strand::Forward, Context::CpG, cov, meth, sample, group).unwrap()
    }

    /// Two samples per group; control 2/10 methylated, experimental 8/10 at every site
    fn scenario_records() -> Vec<SiteRecord> {
        let mut records = Vec::new();
        for (sample, group, meth) in [
            ("c1", Group::Control, 2),
            ("c2", Group::Control, 2),
            ("t1", Group::Experimental, 8),
            ("t2", Group::Experimental, 8),
        ] {
            for &pos in &POSITIONS {
                records.push(site("chr1", pos, 10, meth, sample, group));
            }
        }
        records
    }

    fn scenario_config() -> PipelineConfig {
        let mut config = PipelineConfig::default();
        config.filter.min_coverage = 5;
        config.tiling = TilingParams {
            window_size: 300,
            step_size: 100,
            min_sites: 1,
        };
        config
    }

    #[test]
    fn test_full_pipeline() {
        let output = run_pipeline(&scenario_records(), &scenario_config()).unwrap();

        assert_eq!(output.test, ResolvedTest::LogisticLrt);
        assert_eq!(output.united.n_windows(), 1);
        assert_eq!(output.results.len(), 1);

        let window = &output.results[0];
        assert_eq!(window.key, WindowKey::new("chr1", 0, 300));
        assert!((window.meth_diff - 60.0).abs() < 1e-9);
        assert!(window.qvalue < 0.05);
        assert_eq!(window.direction, Direction::Hyper);

        assert_eq!(output.classified.all.len(), 1);
        assert_eq!(output.classified.hyper.len(), 1);
        assert!(output.classified.hypo.is_empty());
        assert_eq!(output.exclusions.total(), 0);

        let summary = output.summary(&scenario_config().classify);
        println!("{}", summary);
        assert_eq!(summary.hyper, 1);
    }

    #[test]
    fn test_low_coverage_site_dropped_before_tiling() {
        let mut records = scenario_records();
        records.push(site("chr1", 120, 3, 3, "c1", Group::Control));

        let output = run_pipeline(&records, &scenario_config()).unwrap();
        let window = output.united.window(0);
        let c1 = &window.aggregates["c1"];
        assert_eq!(c1.n_sites, 10);
        assert_eq!(c1.total_coverage, 100);
        assert_eq!(c1.total_methylated, 20);
    }

    #[test]
    fn test_window_missing_in_one_sample_is_excluded() {
        let mut records = scenario_records();
        for (sample, group) in [("c1", Group::Control), ("c2", Group::Control), ("t1", Group::Experimental)] {
            records.push(site("chr2", 40, 10, 5, sample, group));
        }

        let output = run_pipeline(&records, &scenario_config()).unwrap();
        assert_eq!(output.united.n_windows(), 1);
        assert!(output.united.keys().iter().all(|k| k.chromosome == "chr1"));
        assert_eq!(output.exclusions.missing_in_samples, 1);
    }

    #[test]
    fn test_pooled_run_uses_fisher() {
        let mut config = scenario_config();
        config.pool = true;
        config.threads = 2;

        let output = run_pipeline(&scenario_records(), &config).unwrap();
        assert_eq!(output.test, ResolvedTest::Fisher);
        assert_eq!(output.layout.sample_ids(), vec!["control", "experimental"]);

        let window = &output.results[0];
        assert!((window.meth_diff - 60.0).abs() < 1e-9);
        assert!(window.qvalue < 0.05);
        assert_eq!(output.classified.hyper.len(), 1);
    }

    #[test]
    fn test_malformed_record_rejected() {
        let mut records = scenario_records();
        records[3].methylated = 11;
        assert!(matches!(
            run_pipeline(&records, &scenario_config()),
            Err(MethDiffError::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_missing_group_rejected() {
        let records: Vec<SiteRecord> = scenario_records()
            .into_iter()
            .filter(|r| r.group == Group::Control)
            .collect();
        assert!(matches!(
            run_pipeline(&records, &scenario_config()),
            Err(MethDiffError::InsufficientGroupData { .. })
        ));
    }

    #[test]
    fn test_sample_without_sites_rejected() {
        let records = scenario_records();
        let mut samples: Vec<SampleInfo> = SampleLayout::from_records(&records).unwrap().samples().to_vec();
        samples.push(SampleInfo {
            sample_id: "t3".to_string(),
            group: Group::Experimental,
        });
        let layout = SampleLayout::new(samples).unwrap();

        match run_pipeline_with_layout(&records, &layout, &scenario_config()) {
            Err(MethDiffError::InsufficientSampleData { sample_id, .. }) => assert_eq!(sample_id, "t3"),
            other => panic!("expected insufficient data for t3, got {:?}", other.map(|o| o.results)),
        }
    }

    #[test]
    fn test_uncovered_sites_without_coverage_filter() {
        let mut records = scenario_records();
        for i in 0..11u64 {
            records.push(site("chr1", 11 + i * 40, 0, 0, "c1", Group::Control));
        }
        let mut config = scenario_config();
        config.filter.min_coverage = 0;

        let output = run_pipeline(&records, &config).unwrap();
        assert_eq!(output.united.keys().to_vec(), vec![WindowKey::new("chr1", 0, 300)]);
        let window = output.united.window(0);
        let c1 = &window.aggregates["c1"];
        assert_eq!(c1.n_sites, 10);
        assert_eq!(c1.total_coverage, 100);
        assert_eq!(output.classified.hyper.len(), 1);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = scenario_config();
        config.tiling.window_size = 0;
        assert!(matches!(
            run_pipeline(&scenario_records(), &config),
            Err(MethDiffError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_tile_and_unite() {
        let records = scenario_records();
        let layout = SampleLayout::from_records(&records).unwrap();
        let (united, dropped) = tile_and_unite(&records, &layout, &scenario_config()).unwrap();
        assert_eq!(united.n_windows(), 1);
        assert_eq!(dropped, 0);
        assert_eq!(united.coverage_row(0).to_vec(), vec![100, 100, 100, 100]);
    }
}
