//! In-memory call index
//!
//! Hash-map backed [`CallIndex`]. Bodies are normalised with
//! `simplify_macros` on insertion unless `keep_short_forms` is set.

use super::call_index::{CallIndex, CallSite, ImplementationFilter, MethodDefinition};
use crate::shared::models::{MethodRef, MethodSignature};
use rustc_hash::{FxHashMap, FxHashSet};

#[derive(Debug, Clone)]
struct Implementation {
    method: MethodRef,
    assembly: String,
}

#[derive(Debug, Default, Clone)]
pub struct InMemoryCallIndex {
    methods: FxHashMap<MethodSignature, MethodDefinition>,
    calls: FxHashMap<MethodSignature, Vec<CallSite>>,
    implementations: FxHashMap<MethodSignature, Vec<Implementation>>,
    assembly_references: FxHashMap<String, FxHashSet<String>>,
    skipped_modules: FxHashSet<String>,
    keep_short_forms: bool,
}

impl InMemoryCallIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store bodies exactly as given (interpreter rejects short forms)
    pub fn keep_short_forms(mut self) -> Self {
        self.keep_short_forms = true;
        self
    }

    pub fn add_method(&mut self, mut definition: MethodDefinition) -> &mut Self {
        if !self.keep_short_forms {
            if let Some(body) = definition.body.as_mut() {
                body.simplify_macros();
            }
        }
        self.methods.insert(definition.signature(), definition);
        self
    }

    pub fn add_call_site(&mut self, target: MethodSignature, site: CallSite) -> &mut Self {
        self.calls.entry(target).or_default().push(site);
        self
    }

    /// Register `method` (declared in `assembly`) as an override of `base`
    pub fn add_implementation(
        &mut self,
        base: MethodSignature,
        method: MethodRef,
        assembly: impl Into<String>,
    ) -> &mut Self {
        let implementations = self.implementations.entry(base).or_default();
        if !implementations.iter().any(|i| i.method == method) {
            implementations.push(Implementation {
                method,
                assembly: assembly.into(),
            });
        }
        self
    }

    /// Record that `from` references `to`. The closure is kept transitive.
    pub fn add_assembly_reference(
        &mut self,
        from: impl Into<String>,
        to: impl Into<String>,
    ) -> &mut Self {
        let from = from.into();
        let to = to.into();

        let mut reached: FxHashSet<String> = self
            .assembly_references
            .get(&to)
            .cloned()
            .unwrap_or_default();
        reached.insert(to.clone());
        // An assembly always reaches itself
        self.assembly_references
            .entry(to.clone())
            .or_default()
            .insert(to);

        for (name, closure) in self.assembly_references.iter_mut() {
            if *name == from || closure.contains(&from) {
                closure.extend(reached.iter().cloned());
            }
        }
        let own = self.assembly_references.entry(from.clone()).or_default();
        own.insert(from);
        own.extend(reached);
        self
    }

    pub fn skip_module(&mut self, module: impl Into<String>) -> &mut Self {
        self.skipped_modules.insert(module.into());
        self
    }

    pub fn method_count(&self) -> usize {
        self.methods.len()
    }
}

impl CallIndex for InMemoryCallIndex {
    fn method(&self, signature: &MethodSignature) -> Option<&MethodDefinition> {
        self.methods.get(signature)
    }

    fn get_calls(&self, signature: &MethodSignature) -> Vec<CallSite> {
        self.calls.get(signature).cloned().unwrap_or_default()
    }

    fn get_implementations(
        &self,
        signature: &MethodSignature,
        filter: &ImplementationFilter<'_>,
    ) -> Vec<MethodRef> {
        let Some(implementations) = self.implementations.get(signature) else {
            return Vec::new();
        };
        implementations
            .iter()
            .filter(|i| filter.accepts(&i.method.declaring_type.full_name, &i.assembly))
            .map(|i| i.method.clone())
            .collect()
    }

    fn get_implementations_count(
        &self,
        signature: &MethodSignature,
        filter: &ImplementationFilter<'_>,
    ) -> usize {
        self.implementations.get(signature).map_or(0, |list| {
            list.iter()
                .filter(|i| filter.accepts(&i.method.declaring_type.full_name, &i.assembly))
                .count()
        })
    }

    fn assembly_references(&self, assembly: &str) -> Option<&FxHashSet<String>> {
        self.assembly_references.get(assembly)
    }

    fn skipped_modules(&self) -> &FxHashSet<String> {
        &self.skipped_modules
    }
}
