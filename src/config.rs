//! Run configuration

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::classify::ClassifyParams;
use crate::data::Context;
use crate::error::Result;
use crate::filter::FilterParams;
use crate::normalization::NormalizeParams;
use crate::testing::DiffTestParams;
use crate::tiling::TilingParams;

/// Every parameter of a differential methylation run
///
/// Missing fields in a JSON configuration take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Cytosine context analysed
    pub context: Context,
    pub filter: FilterParams,
    pub normalize: NormalizeParams,
    /// Merge replicates of each group into one pseudo-sample before tiling
    pub pool: bool,
    pub tiling: TilingParams,
    pub test: DiffTestParams,
    pub classify: ClassifyParams,
    /// Worker threads (0 uses the global rayon pool)
    pub threads: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            context: Context::CpG,
            filter: FilterParams::default(),
            normalize: NormalizeParams::default(),
            pool: false,
            tiling: TilingParams::default(),
            test: DiffTestParams::default(),
            classify: ClassifyParams::default(),
            threads: 0,
        }
    }
}

impl PipelineConfig {
    /// Load a configuration from a JSON file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let config: PipelineConfig = serde_json::from_reader(BufReader::new(file))?;
        Ok(config)
    }

    /// Check every parameter before any data is touched
    pub fn validate(&self) -> Result<()> {
        self.filter.validate()?;
        self.tiling.validate()?;
        self.classify.validate()?;
        Ok(())
    }
}
