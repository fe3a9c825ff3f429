pub mod entry_point;
pub mod session;
pub mod statistics;

pub use entry_point::EntryPoint;
pub use session::AnalysisSession;
pub use statistics::EngineStatistics;
