//! CSV and JSON writers for results and united windows

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::Serialize;

use super::results::{DiffResult, Direction};
use crate::error::Result;
use crate::unite::UnitedWindows;

/// Output row of a result table, in `RESULT_COLUMNS` order
#[derive(Debug, Serialize)]
struct DiffResultRow<'a> {
    chromosome: &'a str,
    window_start: u64,
    window_end: u64,
    pvalue: f64,
    qvalue: f64,
    meth_diff: f64,
    direction: Direction,
}

impl<'a> From<&'a DiffResult> for DiffResultRow<'a> {
    fn from(result: &'a DiffResult) -> Self {
        Self {
            chromosome: &result.key.chromosome,
            window_start: result.key.start,
            window_end: result.key.end,
            pvalue: result.pvalue,
            qvalue: result.qvalue,
            meth_diff: result.meth_diff,
            direction: result.direction,
        }
    }
}

const RESULT_COLUMNS: [&str; 7] = [
    "chromosome",
    "windowStart",
    "windowEnd",
    "pValue",
    "qValue",
    "methDiffPercent",
    "direction",
];

/// Write differential methylation results to a CSV file
///
/// The header is written even when there are no results.
pub fn write_diff_results<P: AsRef<Path>>(path: P, results: &[DiffResult]) -> Result<()> {
    let mut writer = csv::WriterBuilder::new().has_headers(false).from_path(path)?;
    writer.write_record(RESULT_COLUMNS)?;
    for result in results {
        writer.serialize(DiffResultRow::from(result))?;
    }
    writer.flush()?;
    Ok(())
}

/// Write the united window x sample counts
///
/// One row per window; each sample contributes `<id>_coverage`,
/// `<id>_methylated`, `<id>_ratio` and `<id>_sites` columns.
pub fn write_united_windows<P: AsRef<Path>>(path: P, united: &UnitedWindows) -> Result<()> {
    let mut writer = csv::WriterBuilder::new().delimiter(b'\t').from_path(path)?;

    let sample_ids = united.layout().sample_ids();
    let mut header = vec![
        "chromosome".to_string(),
        "windowStart".to_string(),
        "windowEnd".to_string(),
    ];
    for id in &sample_ids {
        header.push(format!("{}_coverage", id));
        header.push(format!("{}_methylated", id));
        header.push(format!("{}_ratio", id));
        header.push(format!("{}_sites", id));
    }
    writer.write_record(&header)?;

    for window in united.windows() {
        let mut row = vec![
            window.key.chromosome.clone(),
            window.key.start.to_string(),
            window.key.end.to_string(),
        ];
        for id in &sample_ids {
            match window.aggregates.get(*id) {
                Some(agg) => {
                    row.push(agg.total_coverage.to_string());
                    row.push(agg.total_methylated.to_string());
                    row.push(agg.methylation_ratio().map_or_else(String::new, |r| format!("{:.4}", r)));
                    row.push(agg.n_sites.to_string());
                }
                None => row.extend(std::iter::repeat(String::new()).take(4)),
            }
        }
        writer.write_record(&row)?;
    }

    writer.flush()?;
    Ok(())
}

/// Write any serializable value as pretty-printed JSON
pub fn write_json<P: AsRef<Path>, T: Serialize>(path: P, value: &T) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value)?;
    writeln!(writer)?;
    writer.flush()?;
    Ok(())
}
