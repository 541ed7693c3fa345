//! Collapse replicates of a group into one pseudo-sample by summing counts

use std::collections::BTreeMap;

use super::{Context, Group, SampleInfo, SampleLayout, SiteRecord, Strand};
use crate::error::{MethDiffError, Result};

/// Pool all replicates of each group
///
/// Records sharing group, chromosome, position, strand and context are summed.
/// The pseudo-sample of each group is named after the group ("control",
/// "experimental"). Output is sorted by group, chromosome, position and strand.
///
/// # Returns
/// The pooled records and the two-sample layout describing them
pub fn pool_replicates(records: &[SiteRecord], layout: &SampleLayout) -> Result<(Vec<SiteRecord>, SampleLayout)> {
    layout.require_both_groups()?;

    let mut pooled: BTreeMap<(Group, &str, u64, Strand, Context), (u64, u64)> = BTreeMap::new();
    for record in records {
        let entry = pooled
            .entry((
                record.group,
                record.chromosome.as_str(),
                record.position,
                record.strand,
                record.context,
            ))
            .or_insert((0, 0));
        entry.0 += record.coverage as u64;
        entry.1 += record.methylated as u64;
    }

    let mut out = Vec::with_capacity(pooled.len());
    for ((group, chromosome, position, strand, context), (coverage, methylated)) in pooled {
        let coverage = u32::try_from(coverage).map_err(|_| MethDiffError::InvalidInput {
            reason: format!("pooled coverage at {}:{} overflows", chromosome, position),
        })?;
        out.push(SiteRecord {
            chromosome: chromosome.to_string(),
            position,
            strand,
            context,
            coverage,
            methylated: methylated as u32,
            sample_id: group.to_string(),
            group,
        });
    }

    // Total counts are preserved by pooling
    let original_total: u64 = records.iter().map(|r| r.coverage as u64).sum();
    let pooled_total: u64 = out.iter().map(|r| r.coverage as u64).sum();
    if original_total != pooled_total {
        return Err(MethDiffError::InvalidInput {
            reason: format!(
                "Total coverage mismatch after pooling: original={}, pooled={}",
                original_total, pooled_total
            ),
        });
    }

    log::debug!(
        "Pooled {} records from {} samples into {} records",
        records.len(),
        layout.n_samples(),
        out.len()
    );

    let pooled_layout = SampleLayout::new(
        Group::ALL
            .iter()
            .map(|&group| SampleInfo {
                sample_id: group.to_string(),
                group,
            })
            .collect(),
    )?;

    Ok((out, pooled_layout))
}
