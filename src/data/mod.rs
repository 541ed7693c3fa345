//! Data structures for differential methylation calling

mod pool;
mod samples;
mod site;
mod window;

pub use pool::pool_replicates;
pub use samples::{SampleInfo, SampleLayout};
pub use site::{validate_records, Context, Group, SiteRecord, Strand};
pub use window::{UnitedWindow, WindowAggregate, WindowExclusions, WindowKey};
