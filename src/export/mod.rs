pub mod encoder;
pub mod output_manager;

pub use encoder::TabularEncoder;
pub use output_manager::{ConfigSnapshot, InputInfo, MergeReport, MergeSummary, OutputManager};
