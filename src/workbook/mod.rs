pub mod parser;
pub mod row;

pub use parser::WorkbookParser;
pub use row::{Row, Scalar};
