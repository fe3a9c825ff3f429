//! Call index port
//!
//! Maps method signatures to definitions, call sites and override
//! implementations. Produced by the binary loader; consumed read-only.

use crate::shared::models::{CallKind, MethodBody, MethodRef, MethodSignature};
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

/// Loaded method with its (optional) body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MethodDefinition {
    pub reference: MethodRef,
    pub assembly: String,
    pub module: String,
    #[serde(default)]
    pub is_public: bool,
    #[serde(default)]
    pub is_virtual: bool,
    #[serde(default)]
    pub is_abstract: bool,

    /// `None` for abstract, extern, internal-call and P/Invoke methods
    #[serde(default)]
    pub body: Option<MethodBody>,
}

impl MethodDefinition {
    pub fn signature(&self) -> MethodSignature {
        self.reference.signature()
    }

    #[inline]
    pub fn has_body(&self) -> bool {
        self.body.is_some()
    }

    /// Boundary with no available body that is not resolved by dispatch:
    /// extern/native/internal-call methods.
    #[inline]
    pub fn is_native(&self) -> bool {
        self.body.is_none() && !self.is_abstract
    }
}

/// Call site of a method
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallSite {
    pub caller: MethodSignature,
    pub kind: CallKind,
    pub assembly: String,
    pub assembly_version: String,
    /// Signatures the call target overrides (base/interface methods)
    #[serde(default)]
    pub override_signatures: Vec<MethodSignature>,
}

/// Narrows override lookups to implementations the analysis can reach
#[derive(Debug, Clone, Copy, Default)]
pub struct ImplementationFilter<'a> {
    /// Only implementations declared by one of these (constructed) types
    pub created_types: Option<&'a FxHashSet<String>>,

    /// Only implementations living in one of these assemblies
    pub assemblies: Option<&'a FxHashSet<String>>,
}

impl<'a> ImplementationFilter<'a> {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn accepts(&self, declaring_type: &str, assembly: &str) -> bool {
        if let Some(types) = self.created_types {
            if !types.contains(declaring_type) {
                return false;
            }
        }
        if let Some(assemblies) = self.assemblies {
            if !assemblies.contains(assembly) {
                return false;
            }
        }
        true
    }
}

pub trait CallIndex {
    /// Definition of a method, if it was loaded
    fn method(&self, signature: &MethodSignature) -> Option<&MethodDefinition>;

    /// Call sites whose target matches `signature`
    fn get_calls(&self, signature: &MethodSignature) -> Vec<CallSite>;

    /// Concrete overriders of a virtual/interface method
    fn get_implementations(
        &self,
        signature: &MethodSignature,
        filter: &ImplementationFilter<'_>,
    ) -> Vec<MethodRef>;

    fn get_implementations_count(
        &self,
        signature: &MethodSignature,
        filter: &ImplementationFilter<'_>,
    ) -> usize {
        self.get_implementations(signature, filter).len()
    }

    /// Transitive reference closure of an assembly
    fn assembly_references(&self, assembly: &str) -> Option<&FxHashSet<String>>;

    /// Modules excluded from analysis
    fn skipped_modules(&self) -> &FxHashSet<String>;
}
