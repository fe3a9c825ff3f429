//! Recursion loop bookkeeping
//!
//! A loop is opened when a summary key is requested while an activation
//! for the same key is still on the stack. The deepest such activation is
//! the loop head; everything above it participates. The head is
//! re-analyzed with its previous summary as a provisional answer until the
//! summary fingerprint stops changing.

use super::summary::Summary;
use crate::shared::models::SummaryKey;
use rustc_hash::FxHashSet;
use std::rc::Rc;

#[derive(Debug, Clone)]
pub struct RecursionLoop {
    pub head: SummaryKey,
    pub participants: FxHashSet<SummaryKey>,
    iteration: u32,
    provisional: Option<Rc<Summary>>,
    fingerprint: Option<u64>,
    /// Participant summaries computed in the current iteration
    pending: Vec<(SummaryKey, Rc<Summary>)>,
}

impl RecursionLoop {
    pub fn new(head: SummaryKey) -> Self {
        Self {
            head,
            participants: FxHashSet::default(),
            iteration: 1,
            provisional: None,
            fingerprint: None,
            pending: Vec::new(),
        }
    }

    pub fn add_participants<I: IntoIterator<Item = SummaryKey>>(&mut self, keys: I) {
        self.participants.extend(keys);
    }

    #[inline]
    pub fn iteration(&self) -> u32 {
        self.iteration
    }

    /// Answer for a recursive request in the current iteration
    pub fn provisional(&self) -> Option<Rc<Summary>> {
        self.provisional.clone()
    }

    /// Record the head summary of the finished iteration. Returns true when
    /// it matches the previous iteration.
    pub fn is_stable(&self, fingerprint: u64) -> bool {
        self.fingerprint == Some(fingerprint)
    }

    /// Start the next iteration with `summary` as the provisional answer
    pub fn advance(&mut self, summary: Rc<Summary>, fingerprint: u64) {
        self.iteration += 1;
        self.provisional = Some(summary);
        self.fingerprint = Some(fingerprint);
        self.pending.clear();
    }

    pub fn defer(&mut self, key: SummaryKey, summary: Rc<Summary>) {
        self.pending.push((key, summary));
    }

    pub fn take_pending(&mut self) -> Vec<(SummaryKey, Rc<Summary>)> {
        std::mem::take(&mut self.pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::models::MethodSignature;

    #[test]
    fn test_iterations_and_pending() {
        let head = SummaryKey::concrete(&MethodSignature::new("System.Void A::M()"));
        let other = SummaryKey::concrete(&MethodSignature::new("System.Void B::M()"));
        let mut lp = RecursionLoop::new(head);
        lp.add_participants([other.clone()]);

        assert_eq!(lp.iteration(), 1);
        assert!(lp.provisional().is_none());
        assert!(!lp.is_stable(7));

        lp.defer(other.clone(), Rc::new(Summary::Empty));
        lp.advance(Rc::new(Summary::Empty), 7);
        assert_eq!(lp.iteration(), 2);
        assert!(lp.is_stable(7));
        assert!(lp.take_pending().is_empty());

        lp.defer(other, Rc::new(Summary::Empty));
        assert_eq!(lp.take_pending().len(), 1);
        assert!(lp.participants.len() == 1);
    }
}
