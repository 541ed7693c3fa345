//! Input/Output: sample sheets, cytosine reports and result tables

mod csv;
mod output;
mod report;
mod results;

pub use self::csv::{write_diff_results, write_json, write_united_windows};
pub use output::OutputSet;
pub use report::{read_cytosine_report, read_sample_sheet, SampleEntry};
pub use results::{ClassifiedResults, DiffResult, Direction, ResultsSummary};
