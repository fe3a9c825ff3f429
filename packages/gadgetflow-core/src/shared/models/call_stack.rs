//! Persistent call stack
//!
//! Immutable cons-list of summary keys. Pushing shares the tail, so every
//! taint mark, target call and activation can hold its own snapshot for
//! the price of one pointer.

use super::method::MethodSignature;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::sync::Arc;

/// How a call is resolved: a concrete body (`C:`) or a virtual dispatch (`V:`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CallKind {
    Concrete,
    Virtual,
}

impl CallKind {
    pub fn prefix(&self) -> &'static str {
        match self {
            CallKind::Concrete => "C:",
            CallKind::Virtual => "V:",
        }
    }
}

/// Summary cache key: call-kind prefix + unique method signature
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SummaryKey(Arc<str>);

impl SummaryKey {
    pub fn new(kind: CallKind, signature: &MethodSignature) -> Self {
        Self(Arc::from(format!("{}{}", kind.prefix(), signature.as_str())))
    }

    pub fn concrete(signature: &MethodSignature) -> Self {
        Self::new(CallKind::Concrete, signature)
    }

    pub fn virtual_call(signature: &MethodSignature) -> Self {
        Self::new(CallKind::Virtual, signature)
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn kind(&self) -> CallKind {
        if self.0.starts_with("V:") {
            CallKind::Virtual
        } else {
            CallKind::Concrete
        }
    }

    pub fn signature(&self) -> MethodSignature {
        MethodSignature::new(&self.0[2..])
    }
}

impl fmt::Display for SummaryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for SummaryKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

#[derive(Debug)]
struct Frame {
    key: SummaryKey,
    parent: CallStack,
    depth: usize,
}

/// Immutable call stack (top = most recent activation)
#[derive(Debug, Clone, Default)]
pub struct CallStack(Option<Arc<Frame>>);

impl CallStack {
    pub fn new() -> Self {
        Self(None)
    }

    #[must_use]
    pub fn push(&self, key: SummaryKey) -> CallStack {
        let depth = self.depth() + 1;
        CallStack(Some(Arc::new(Frame {
            key,
            parent: self.clone(),
            depth,
        })))
    }

    /// Stack without its top frame
    pub fn pop(&self) -> CallStack {
        match &self.0 {
            Some(frame) => frame.parent.clone(),
            None => CallStack::new(),
        }
    }

    pub fn top(&self) -> Option<&SummaryKey> {
        self.0.as_ref().map(|f| &f.key)
    }

    #[inline]
    pub fn depth(&self) -> usize {
        self.0.as_ref().map_or(0, |f| f.depth)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_none()
    }

    /// Iterate from the top frame down to the root
    pub fn iter(&self) -> CallStackIter<'_> {
        CallStackIter {
            current: self.0.as_deref(),
        }
    }

    pub fn contains(&self, key: &SummaryKey) -> bool {
        self.iter().any(|k| k == key)
    }

    /// Keys from the root to the top
    pub fn to_vec(&self) -> Vec<SummaryKey> {
        let mut keys: Vec<SummaryKey> = self.iter().cloned().collect();
        keys.reverse();
        keys
    }

    pub fn to_strings(&self) -> Vec<String> {
        self.to_vec().iter().map(|k| k.as_str().to_string()).collect()
    }

    /// Frames above the deepest occurrence of `key`, root-most first.
    ///
    /// For a stack `A B C D` and key `B` this yields `[C, D]`: the methods
    /// participating in a cycle that re-enters `B`.
    pub fn frames_above(&self, key: &SummaryKey) -> Option<Vec<SummaryKey>> {
        let mut above = Vec::new();
        for k in self.iter() {
            if k == key {
                above.reverse();
                return Some(above);
            }
            above.push(k.clone());
        }
        None
    }

    /// Re-root a snapshot taken inside a callee analysis.
    ///
    /// `self` was captured while the callee sat at depth `callee_depth`;
    /// the frames below that depth are replaced with `new_base`, which
    /// already ends with the callee key.
    pub fn rebase(&self, callee_depth: usize, new_base: &CallStack) -> CallStack {
        if self.depth() < callee_depth {
            return new_base.clone();
        }
        let tail = self.to_vec().split_off(callee_depth);
        tail.into_iter().fold(new_base.clone(), |acc, k| acc.push(k))
    }

    pub fn same_frames(&self, other: &CallStack) -> bool {
        self.depth() == other.depth() && self.iter().zip(other.iter()).all(|(a, b)| a == b)
    }
}

/// Stacks are equal when their frames are, whether or not they share nodes
impl PartialEq for CallStack {
    fn eq(&self, other: &Self) -> bool {
        self.same_frames(other)
    }
}

impl Eq for CallStack {}

impl fmt::Display for CallStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keys: Vec<String> = self.to_strings();
        write!(f, "[{}]", keys.join(" -> "))
    }
}

impl Serialize for CallStack {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_strings().serialize(serializer)
    }
}

pub struct CallStackIter<'a> {
    current: Option<&'a Frame>,
}

impl<'a> Iterator for CallStackIter<'a> {
    type Item = &'a SummaryKey;

    fn next(&mut self) -> Option<Self::Item> {
        let frame = self.current?;
        self.current = frame.parent.0.as_deref();
        Some(&frame.key)
    }
}
