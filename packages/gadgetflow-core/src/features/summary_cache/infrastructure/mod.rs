pub mod cache;
pub mod fingerprint;

pub use cache::SummaryCache;
pub use fingerprint::summary_fingerprint;
