pub mod records;
pub mod run_report;

pub use records::*;
pub use run_report::*;
