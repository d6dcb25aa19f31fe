pub mod entry_filter;
pub mod reader;

pub use entry_filter::EntryFilter;
pub use reader::{ArchiveEntry, ArchiveReader, EntryRef};
