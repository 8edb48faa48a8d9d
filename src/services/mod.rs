pub mod report;
pub mod scanner;

pub use report::{MatchGroup, ReportFormat};
pub use scanner::scan_directory;
