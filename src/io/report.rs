//! Readers for the sample sheet and per-sample cytosine reports

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::data::{Context, Group, SampleInfo, SiteRecord, Strand};
use crate::error::{MethDiffError, Result};

/// One row of the sample sheet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleEntry {
    pub sample_id: String,
    pub group: Group,
    /// Cytosine report, resolved against the sample sheet's directory
    pub path: PathBuf,
}

impl SampleEntry {
    pub fn info(&self) -> SampleInfo {
        SampleInfo {
            sample_id: self.sample_id.clone(),
            group: self.group,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SampleSheetRow {
    sample_id: String,
    group: String,
    path: String,
}

/// Sniff the delimiter from the header line: tab if present, otherwise comma
fn detect_delimiter<P: AsRef<Path>>(path: P) -> Result<u8> {
    let file = File::open(path)?;
    let mut header = String::new();
    BufReader::new(file).read_line(&mut header)?;
    if header.trim().is_empty() {
        return Err(MethDiffError::EmptyData {
            reason: "Empty sample sheet".to_string(),
        });
    }
    Ok(if header.contains('\t') { b'\t' } else { b',' })
}

/// Read a sample sheet with `sample_id`, `group` and `path` columns
///
/// Comma- or tab-separated. Relative report paths are taken relative to the
/// directory holding the sheet.
pub fn read_sample_sheet<P: AsRef<Path>>(path: P) -> Result<Vec<SampleEntry>> {
    let path = path.as_ref();
    let delimiter = detect_delimiter(path)?;
    let base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .trim(csv::Trim::All)
        .from_path(path)?;

    let mut entries = Vec::new();
    for row in reader.deserialize::<SampleSheetRow>() {
        let row = row.map_err(|e| MethDiffError::InvalidSampleSheet { reason: e.to_string() })?;
        if row.sample_id.is_empty() {
            return Err(MethDiffError::InvalidSampleSheet {
                reason: "empty sample_id".to_string(),
            });
        }
        let group: Group = row.group.parse().map_err(|e: MethDiffError| MethDiffError::InvalidSampleSheet {
            reason: format!("sample '{}': {}", row.sample_id, e),
        })?;
        let report = PathBuf::from(&row.path);
        let report = if report.is_relative() { base_dir.join(report) } else { report };

        entries.push(SampleEntry {
            sample_id: row.sample_id,
            group,
            path: report,
        });
    }

    if entries.is_empty() {
        return Err(MethDiffError::EmptyData {
            reason: "No samples found in sample sheet".to_string(),
        });
    }

    Ok(entries)
}

/// Read a Bismark `CX_report`/`CpG_report` style cytosine report
///
/// Tab-separated, no header: chromosome, 1-based position, strand,
/// methylated count, unmethylated count, context and an optional
/// trinucleotide column. Rows without coverage are skipped.
pub fn read_cytosine_report<P: AsRef<Path>>(path: P, sample_id: &str, group: Group) -> Result<Vec<SiteRecord>> {
    let path = path.as_ref();
    let path_str = path.display().to_string();

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .comment(Some(b'#'))
        .from_path(path)?;

    let mut records = Vec::new();
    let mut n_uncovered = 0usize;

    for row in reader.records() {
        let row = row?;
        let line = row.position().map(|p| p.line()).unwrap_or(0);
        let malformed = |reason: String| MethDiffError::MalformedReport {
            path: path_str.clone(),
            line,
            reason,
        };

        if row.len() < 6 {
            return Err(malformed(format!("expected at least 6 columns, found {}", row.len())));
        }

        let position: u64 = row[1]
            .trim()
            .parse()
            .map_err(|_| malformed(format!("invalid position '{}'", &row[1])))?;
        let strand: Strand = row[2].parse().map_err(|e: MethDiffError| malformed(e.to_string()))?;
        let methylated: u32 = row[3]
            .trim()
            .parse()
            .map_err(|_| malformed(format!("invalid methylated count '{}'", &row[3])))?;
        let unmethylated: u32 = row[4]
            .trim()
            .parse()
            .map_err(|_| malformed(format!("invalid unmethylated count '{}'", &row[4])))?;
        let context: Context = row[5].parse().map_err(|e: MethDiffError| malformed(e.to_string()))?;

        let coverage = methylated
            .checked_add(unmethylated)
            .ok_or_else(|| malformed("coverage overflows u32".to_string()))?;
        if coverage == 0 {
            n_uncovered += 1;
            continue;
        }

        let record = SiteRecord::new(
            row[0].trim(),
            position,
            strand,
            context,
            coverage,
            methylated,
            sample_id,
            group,
        )
        .map_err(|e| malformed(e.to_string()))?;
        records.push(record);
    }

    log::debug!(
        "{}: read {} covered cytosines ({} without coverage skipped)",
        sample_id,
        records.len(),
        n_uncovered
    );

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_read_sample_sheet_csv() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "sample_id,group,path").unwrap();
        writeln!(file, "c1,control,c1.CX_report.txt").unwrap();
        writeln!(file, "t1, treatment ,/data/t1.CX_report.txt").unwrap();

        let entries = read_sample_sheet(file.path()).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].group, Group::Control);
        assert_eq!(entries[0].path, file.path().parent().unwrap().join("c1.CX_report.txt"));
        assert_eq!(entries[1].group, Group::Experimental);
        assert_eq!(entries[1].path, PathBuf::from("/data/t1.CX_report.txt"));
    }

    #[test]
    fn test_read_sample_sheet_tsv_bad_group() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "sample_id\tgroup\tpath").unwrap();
        writeln!(file, "c1\tmutant\tc1.txt").unwrap();

        let err = read_sample_sheet(file.path()).unwrap_err();
        assert!(matches!(err, MethDiffError::InvalidSampleSheet { .. }));
    }

    #[test]
    fn test_read_cytosine_report() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "chr1\t10\t+\t3\t7\tCG\tCGA").unwrap();
        writeln!(file, "chr1\t11\t-\t0\t0\tCG\tCGT").unwrap();
        writeln!(file, "chr1\t25\t+\t1\t1\tCHH\tCTA").unwrap();
        writeln!(file, "chr2\t5\t-\t4\t0\tCHG").unwrap();

        let records = read_cytosine_report(file.path(), "s1", Group::Control).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].coverage, 10);
        assert_eq!(records[0].methylated, 3);
        assert_eq!(records[0].context, Context::CpG);
        assert_eq!(records[1].context, Context::CHH);
        assert_eq!(records[2].chromosome, "chr2");
        assert_eq!(records[2].strand, Strand::Reverse);
        assert!(records.iter().all(|r| r.sample_id == "s1"));
    }

    #[test]
    fn test_read_cytosine_report_line_number() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "chr1\t10\t+\t3\t7\tCG\tCGA").unwrap();
        writeln!(file, "chr1\tabc\t+\t3\t7\tCG\tCGA").unwrap();

        match read_cytosine_report(file.path(), "s1", Group::Control) {
            Err(MethDiffError::MalformedReport { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected a malformed report error, got {:?}", other),
        }
    }

    #[test]
    fn test_read_cytosine_report_position_zero() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "chr1\t0\t+\t3\t7\tCG\tCGA").unwrap();
        assert!(read_cytosine_report(file.path(), "s1", Group::Control).is_err());
    }
}
