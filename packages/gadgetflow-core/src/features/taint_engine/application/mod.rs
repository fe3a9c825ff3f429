pub mod scanner;

pub use scanner::{CancellationToken, ScanOutcome, ScanReport, TaintScanner};
