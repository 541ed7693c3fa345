//! Sample layout: which samples take part in a run and their groups

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use super::{Group, SiteRecord};
use crate::error::{MethDiffError, Result};

/// One sample of the run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleInfo {
    pub sample_id: String,
    pub group: Group,
}

/// Ordered list of samples, control samples first
///
/// Every per-sample collection produced downstream (tiled windows, united
/// matrix columns) is indexed by the position in this layout.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleLayout {
    samples: Vec<SampleInfo>,
}

impl SampleLayout {
    /// Create a layout from explicit samples
    ///
    /// Samples keep their relative order within a group; control samples are moved first.
    pub fn new(samples: Vec<SampleInfo>) -> Result<Self> {
        let mut seen = HashSet::new();
        for sample in &samples {
            if !seen.insert(sample.sample_id.as_str()) {
                return Err(MethDiffError::InvalidInput {
                    reason: format!("duplicate sample id '{}'", sample.sample_id),
                });
            }
        }
        let (mut ordered, experimental): (Vec<_>, Vec<_>) =
            samples.into_iter().partition(|s| s.group == Group::Control);
        ordered.extend(experimental);
        Ok(Self { samples: ordered })
    }

    /// Derive the layout from records, in order of first appearance
    ///
    /// A sample id that shows up under both groups is an input error.
    pub fn from_records(records: &[SiteRecord]) -> Result<Self> {
        let mut groups: HashMap<&str, Group> = HashMap::new();
        let mut samples = Vec::new();

        for record in records {
            match groups.get(record.sample_id.as_str()) {
                Some(&group) if group != record.group => {
                    return Err(MethDiffError::InvalidInput {
                        reason: format!(
                            "sample '{}' is labelled both {} and {}",
                            record.sample_id, group, record.group
                        ),
                    });
                }
                Some(_) => {}
                None => {
                    groups.insert(record.sample_id.as_str(), record.group);
                    samples.push(SampleInfo {
                        sample_id: record.sample_id.clone(),
                        group: record.group,
                    });
                }
            }
        }

        Self::new(samples)
    }

    /// Fail unless both groups have at least one sample
    pub fn require_both_groups(&self) -> Result<()> {
        for group in Group::ALL {
            if self.n_in_group(group) == 0 {
                return Err(MethDiffError::InsufficientGroupData {
                    group: group.to_string(),
                    reason: "group has no samples".to_string(),
                });
            }
        }
        Ok(())
    }

    pub fn n_samples(&self) -> usize {
        self.samples.len()
    }

    pub fn samples(&self) -> &[SampleInfo] {
        &self.samples
    }

    pub fn sample_ids(&self) -> Vec<&str> {
        self.samples.iter().map(|s| s.sample_id.as_str()).collect()
    }

    pub fn group(&self, idx: usize) -> Group {
        self.samples[idx].group
    }

    /// Position of a sample in the layout
    pub fn index_of(&self, sample_id: &str) -> Option<usize> {
        self.samples.iter().position(|s| s.sample_id == sample_id)
    }

    /// Sample id -> layout position, for bulk lookups
    pub fn index_map(&self) -> HashMap<&str, usize> {
        self.samples
            .iter()
            .enumerate()
            .map(|(i, s)| (s.sample_id.as_str(), i))
            .collect()
    }

    /// Layout positions of the samples in a group
    pub fn indices(&self, group: Group) -> Vec<usize> {
        self.samples
            .iter()
            .enumerate()
            .filter(|(_, s)| s.group == group)
            .map(|(i, _)| i)
            .collect()
    }

    pub fn n_in_group(&self, group: Group) -> usize {
        self.samples.iter().filter(|s| s.group == group).count()
    }
}
