//! Custom assertions for analysis results

use gadgetflow_core::DataFlowAnalysisResult;

/// Call depths of every recorded trigger, sorted
pub fn trigger_depths(result: &DataFlowAnalysisResult) -> Vec<usize> {
    let mut depths: Vec<usize> = result
        .attack_triggers()
        .map(|(_, trigger)| trigger.call_depth())
        .collect();
    depths.sort_unstable();
    depths
}

/// Exactly one pattern, reached at `depth`
pub fn assert_single_pattern(result: &DataFlowAnalysisResult, depth: usize) {
    assert_eq!(
        result.pattern_count(),
        1,
        "Expected one pattern, got triggers: {:?}",
        result.attack_triggers().collect::<Vec<_>>()
    );
    assert!(result.has_pattern());
    assert_eq!(trigger_depths(result), vec![depth]);
}

pub fn assert_no_pattern(result: &DataFlowAnalysisResult) {
    assert_eq!(
        result.pattern_count(),
        0,
        "Expected no pattern, got triggers: {:?}",
        result.attack_triggers().collect::<Vec<_>>()
    );
    assert!(!result.has_pattern());
}
