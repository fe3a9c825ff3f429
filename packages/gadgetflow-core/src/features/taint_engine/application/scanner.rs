//! Entry-point scanning
//!
//! Runs one [`SymbolicEngine`] per entry point. Engines never share state,
//! so entry points can be analyzed on a rayon pool; only the read-only
//! call index is shared. Cancellation is cooperative and checked between
//! entry points.

use crate::config::EngineConfig;
use crate::errors::Result;
use crate::features::analysis_result::DataFlowAnalysisResult;
use crate::features::taint_engine::domain::{EngineStatistics, EntryPoint};
use crate::features::taint_engine::infrastructure::SymbolicEngine;
use crate::shared::models::MethodSignature;
use crate::shared::ports::CallIndex;
use rayon::prelude::*;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info};

/// Shared stop flag for a running scan
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Result of one entry point
#[derive(Debug, Clone, Serialize)]
pub struct ScanOutcome {
    pub entry: MethodSignature,
    pub result: Option<DataFlowAnalysisResult>,
    pub error: Option<String>,
    pub statistics: EngineStatistics,
}

impl ScanOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_some()
    }

    pub fn pattern_count(&self) -> usize {
        self.result.as_ref().map_or(0, |r| r.pattern_count())
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanReport {
    /// In entry-point order; entries skipped after cancellation are absent
    pub outcomes: Vec<ScanOutcome>,
    pub cancelled: bool,
}

impl ScanReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    pub fn total_patterns(&self) -> usize {
        self.outcomes.iter().map(ScanOutcome::pattern_count).sum()
    }

    /// Counters summed over all entry points
    pub fn statistics(&self) -> EngineStatistics {
        let mut total = EngineStatistics::new();
        for outcome in &self.outcomes {
            total.merge(&outcome.statistics);
        }
        total
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

pub struct TaintScanner<'a, C: CallIndex + ?Sized> {
    index: &'a C,
    config: EngineConfig,
    token: CancellationToken,
}

impl<'a, C: CallIndex + ?Sized> TaintScanner<'a, C> {
    pub fn new(index: &'a C, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            index,
            config,
            token: CancellationToken::new(),
        })
    }

    /// Builder: Use an externally owned cancellation token
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.token = token;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Analyze one entry point with a fresh engine
    pub fn scan_entry(&self, entry: &EntryPoint) -> ScanOutcome {
        let mut engine = match SymbolicEngine::with_config(self.index, self.config.clone()) {
            Ok(engine) => engine,
            Err(err) => {
                return ScanOutcome {
                    entry: entry.method.clone(),
                    result: None,
                    error: Some(err.to_string()),
                    statistics: EngineStatistics::new(),
                }
            }
        };

        let outcome = engine.try_execute_forward(&entry.method, &entry.required_argument_types);
        let (result, error) = match outcome {
            Ok(result) => (Some(result), None),
            Err(err) => {
                error!(entry = %entry.method, error = %err, "Entry point analysis failed");
                (None, Some(err.to_string()))
            }
        };

        ScanOutcome {
            entry: entry.method.clone(),
            result,
            error,
            statistics: engine.statistics().clone(),
        }
    }

    /// Analyze entry points one after another
    pub fn scan(&self, entries: &[EntryPoint]) -> ScanReport {
        info!(entries = entries.len(), "Scan started");
        let mut report = ScanReport::default();

        for (position, entry) in entries.iter().enumerate() {
            if self.token.is_cancelled() {
                info!(completed = position, remaining = entries.len() - position, "Scan cancelled");
                report.cancelled = true;
                break;
            }
            debug!(entry = %entry.method, position, "Scanning entry point");
            report.outcomes.push(self.scan_entry(entry));
        }

        info!(
            succeeded = report.succeeded(),
            failed = report.failed(),
            patterns = report.total_patterns(),
            "Scan finished"
        );
        report
    }
}

impl<'a, C: CallIndex + Sync + ?Sized> TaintScanner<'a, C> {
    /// Analyze entry points on the rayon pool. Outcomes keep entry order.
    pub fn scan_parallel(&self, entries: &[EntryPoint]) -> ScanReport {
        info!(entries = entries.len(), threads = rayon::current_num_threads(), "Parallel scan started");

        let outcomes: Vec<Option<ScanOutcome>> = entries
            .par_iter()
            .map(|entry| {
                if self.token.is_cancelled() {
                    None
                } else {
                    Some(self.scan_entry(entry))
                }
            })
            .collect();

        let cancelled = outcomes.iter().any(Option::is_none);
        let report = ScanReport {
            outcomes: outcomes.into_iter().flatten().collect(),
            cancelled,
        };

        info!(
            succeeded = report.succeeded(),
            failed = report.failed(),
            patterns = report.total_patterns(),
            cancelled = report.cancelled,
            "Parallel scan finished"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancellation_token_is_shared() {
        let token = CancellationToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn test_report_counts() {
        let ok = ScanOutcome {
            entry: MethodSignature::new("System.Void A::M()"),
            result: Some(DataFlowAnalysisResult::new()),
            error: None,
            statistics: EngineStatistics {
                analyzed_methods: 2,
                ..EngineStatistics::default()
            },
        };
        let failed = ScanOutcome {
            entry: MethodSignature::new("System.Void A::N()"),
            result: None,
            error: Some("Method System.Void A::N() has no body".into()),
            statistics: EngineStatistics {
                analyzed_methods: 1,
                ..EngineStatistics::default()
            },
        };
        let report = ScanReport {
            outcomes: vec![ok, failed],
            cancelled: false,
        };

        assert_eq!(report.succeeded(), 1);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.total_patterns(), 0);
        assert_eq!(report.statistics().analyzed_methods, 3);
        assert!(report.to_json().unwrap().contains("has no body"));
    }
}
