//! Per-cytosine methylation records

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{MethDiffError, Result};

/// Sequence context of a cytosine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, clap::ValueEnum)]
pub enum Context {
    /// CpG dinucleotide
    #[value(name = "cpg", alias = "cg")]
    CpG,
    /// CHG trinucleotide (H = A, C or T)
    #[value(name = "chg")]
    CHG,
    /// CHH trinucleotide
    #[value(name = "chh")]
    CHH,
}

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Context::CpG => write!(f, "CpG"),
            Context::CHG => write!(f, "CHG"),
            Context::CHH => write!(f, "CHH"),
        }
    }
}

impl FromStr for Context {
    type Err = MethDiffError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_uppercase().as_str() {
            "CG" | "CPG" => Ok(Context::CpG),
            "CHG" => Ok(Context::CHG),
            "CHH" => Ok(Context::CHH),
            other => Err(MethDiffError::InvalidInput {
                reason: format!("unknown cytosine context '{}'", other),
            }),
        }
    }
}

/// Strand of a cytosine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Strand {
    #[serde(rename = "+")]
    Forward,
    #[serde(rename = "-")]
    Reverse,
}

impl fmt::Display for Strand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strand::Forward => write!(f, "+"),
            Strand::Reverse => write!(f, "-"),
        }
    }
}

impl FromStr for Strand {
    type Err = MethDiffError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "+" => Ok(Strand::Forward),
            "-" => Ok(Strand::Reverse),
            other => Err(MethDiffError::InvalidInput {
                reason: format!("unknown strand '{}'", other),
            }),
        }
    }
}

/// Experimental group a sample belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Group {
    Control,
    Experimental,
}

impl Group {
    /// Both groups, control first
    pub const ALL: [Group; 2] = [Group::Control, Group::Experimental];
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Group::Control => write!(f, "control"),
            Group::Experimental => write!(f, "experimental"),
        }
    }
}

impl FromStr for Group {
    type Err = MethDiffError;

    /// Accepts the usual spellings found in sample sheets, plus 0/1 treatment codes
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "control" | "ctrl" | "0" => Ok(Group::Control),
            "experimental" | "treatment" | "treated" | "case" | "1" => Ok(Group::Experimental),
            other => Err(MethDiffError::InvalidInput {
                reason: format!("unknown group '{}', expected 'control' or 'experimental'", other),
            }),
        }
    }
}

/// Coverage of one cytosine in one sample
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteRecord {
    pub chromosome: String,
    /// 1-based position
    pub position: u64,
    pub strand: Strand,
    pub context: Context,
    /// Total reads covering the cytosine
    pub coverage: u32,
    /// Reads reporting the cytosine as methylated
    pub methylated: u32,
    pub sample_id: String,
    pub group: Group,
}

impl SiteRecord {
    /// Create a record, rejecting methylated counts above coverage and position 0
    pub fn new(
        chromosome: &str,
        position: u64,
        strand: Strand,
        context: Context,
        coverage: u32,
        methylated: u32,
        sample_id: &str,
        group: Group,
    ) -> Result<Self> {
        let record = Self {
            chromosome: chromosome.to_string(),
            position,
            strand,
            context,
            coverage,
            methylated,
            sample_id: sample_id.to_string(),
            group,
        };
        record.validate()?;
        Ok(record)
    }

    /// Check the record invariants
    pub fn validate(&self) -> Result<()> {
        if self.methylated > self.coverage {
            return Err(MethDiffError::InvalidInput {
                reason: format!(
                    "{}:{} in sample {} has {} methylated reads but coverage {}",
                    self.chromosome, self.position, self.sample_id, self.methylated, self.coverage
                ),
            });
        }
        if self.position == 0 {
            return Err(MethDiffError::InvalidInput {
                reason: format!(
                    "{}:0 in sample {}: positions are 1-based",
                    self.chromosome, self.sample_id
                ),
            });
        }
        if self.chromosome.is_empty() || self.sample_id.is_empty() {
            return Err(MethDiffError::InvalidInput {
                reason: format!(
                    "record at position {} has an empty chromosome or sample id",
                    self.position
                ),
            });
        }
        Ok(())
    }

    /// Copy of this record with replaced counts
    ///
    /// `methylated` is clamped to `coverage` so the record invariant survives rounding.
    pub fn with_counts(&self, coverage: u32, methylated: u32) -> Self {
        Self {
            coverage,
            methylated: methylated.min(coverage),
            ..self.clone()
        }
    }
}

/// Validate every record before any processing starts
///
/// The first malformed record aborts the whole input.
pub fn validate_records(records: &[SiteRecord]) -> Result<()> {
    if records.is_empty() {
        return Err(MethDiffError::EmptyData {
            reason: "no site records were provided".to_string(),
        });
    }
    for record in records {
        record.validate()?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_rejects_excess_methylation() {
        let result = SiteRecord::new("chr1", 10, Strand::Forward, Context::CpG, 5, 6, "s1", Group::Control);
        assert!(matches!(result, Err(MethDiffError::InvalidInput { .. })));
    }

    #[test]
    fn test_record_rejects_position_zero() {
        let result = SiteRecord::new("chr1", 0, Strand::Forward, Context::CpG, 5, 1, "s1", Group::Control);
        assert!(result.is_err());
    }

    #[test]
    fn test_with_counts_clamps() {
        let rec = SiteRecord::new("chr1", 10, Strand::Reverse, Context::CHG, 10, 4, "s1", Group::Control).unwrap();
        let scaled = rec.with_counts(3, 5);
        assert_eq!(scaled.coverage, 3);
        assert_eq!(scaled.methylated, 3);
        assert_eq!(scaled.chromosome, "chr1");
        assert_eq!(rec.coverage, 10);
    }

    #[test]
    fn test_context_parsing() {
        assert_eq!("CG".parse::<Context>().unwrap(), Context::CpG);
        assert_eq!("cpg".parse::<Context>().unwrap(), Context::CpG);
        assert_eq!("CHH".parse::<Context>().unwrap(), Context::CHH);
        assert!("CNN".parse::<Context>().is_err());
    }

    #[test]
    fn test_group_parsing() {
        assert_eq!("Control".parse::<Group>().unwrap(), Group::Control);
        assert_eq!("treated".parse::<Group>().unwrap(), Group::Experimental);
        assert_eq!("1".parse::<Group>().unwrap(), Group::Experimental);
        assert!("other".parse::<Group>().is_err());
    }

    #[test]
    fn test_validate_records_empty() {
        assert!(matches!(validate_records(&[]), Err(MethDiffError::EmptyData { .. })));
    }
}
