//! Symbolic taint engine
//!
//! Drives the interpreter over an explicit stack of method activations.
//! Every call instruction is resolved here: the sensitive sink mints a
//! fresh taint id, analyzable callees are summarized (or served from the
//! cache) and applied back into the caller graph, everything else gets a
//! conservative input-propagating summary and, for external methods, an
//! attack-trigger candidate on each input.
//!
//! Recursion never grows the native stack. A request for a key that is
//! still being analyzed opens a [`RecursionLoop`] on the existing
//! activation; the head is then re-analyzed until its summary fingerprint
//! is stable or the iteration budget runs out.

use super::activation::{Activation, ActivationKind, CallRequest, CallTarget};
use super::provenance::ProvenanceHooks;
use crate::config::EngineConfig;
use crate::errors::{AnalysisError, Result};
use crate::features::analysis_result::DataFlowAnalysisResult;
use crate::features::interpreter::{CallEffect, CallEffectKind};
use crate::features::summary_cache::{
    summary_fingerprint, MethodSummary, RecursionLoop, Summary, SummaryCache,
};
use crate::features::symbolic_graph::{
    ApplyContext, ApplyHooks, ApplyMode, EntityId, IdentityHooks, PossibleTaint, SinkCall,
    SymbolicGraph, TaintId, TargetCall,
};
use crate::features::taint_engine::domain::{AnalysisSession, EngineStatistics};
use crate::shared::models::{CallStack, MethodRef, MethodSignature, SummaryKey};
use crate::shared::ports::{CallIndex, ImplementationFilter, MethodDefinition};
use regex::Regex;
use rustc_hash::FxHashSet;
use std::rc::Rc;
use tracing::{debug, error, info, trace, warn};

/// Outcome of advancing the top activation
enum Advance<'a> {
    /// Suspend the activation until this callee is summarized
    Call(CallRequest<'a>),
    Done,
}

enum Next {
    Effect(CallEffect),
    Implementation(MethodRef, ApplyMode),
    Done,
}

/// Forward taint analysis over one call index.
///
/// One instance analyzes one entry point; create a fresh engine (or call
/// [`SymbolicEngine::reset_summary_cache`]) for the next one.
pub struct SymbolicEngine<'a, C: CallIndex + ?Sized> {
    index: &'a C,
    config: EngineConfig,
    sink: MethodSignature,
    external_methods: Vec<Regex>,
    cache: SummaryCache,
    session: AnalysisSession,
    result: DataFlowAnalysisResult,
    statistics: EngineStatistics,
    /// Assemblies reachable from the entry assembly
    scope: Option<&'a FxHashSet<String>>,
    used: bool,
}

impl<'a, C: CallIndex + ?Sized> SymbolicEngine<'a, C> {
    pub fn new(
        index: &'a C,
        sensitive_sink: impl Into<String>,
        virtual_calls_limit: u32,
        enable_static_fields: bool,
        input_tainted_mode: bool,
    ) -> Self {
        let config = EngineConfig::default()
            .sensitive_sink(sensitive_sink)
            .virtual_calls_limit(virtual_calls_limit)
            .enable_static_fields(enable_static_fields)
            .input_tainted_mode(input_tainted_mode);
        let external_methods = match config.compile_external_methods() {
            Ok(patterns) => patterns,
            Err(err) => {
                warn!(error = %err, "Ignoring invalid external method patterns");
                Vec::new()
            }
        };
        Self::build(index, config, external_methods)
    }

    /// Engine for a validated configuration
    pub fn with_config(index: &'a C, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let external_methods = config.compile_external_methods()?;
        Ok(Self::build(index, config, external_methods))
    }

    fn build(index: &'a C, config: EngineConfig, external_methods: Vec<Regex>) -> Self {
        Self {
            index,
            sink: MethodSignature::new(&config.sensitive_sink),
            external_methods,
            cache: SummaryCache::new(config.summary_cache_capacity),
            session: AnalysisSession::new(),
            result: DataFlowAnalysisResult::new(),
            statistics: EngineStatistics::new(),
            scope: None,
            used: false,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn statistics(&self) -> &EngineStatistics {
        &self.statistics
    }

    pub fn summary_cache(&self) -> &SummaryCache {
        &self.cache
    }

    /// Drop every summary and all per-run state so the instance can
    /// analyze another entry point
    pub fn reset_summary_cache(&mut self) {
        self.cache.reset();
        self.session = AnalysisSession::new();
        self.result = DataFlowAnalysisResult::new();
        self.statistics = EngineStatistics::new();
        self.scope = None;
        self.used = false;
    }

    /// Analyze `entry`, treating formals of `required_argument_types` (all
    /// non-simple formals when empty) as attacker input. Returns `None` on
    /// an analysis error, which is logged.
    pub fn execute_forward(
        &mut self,
        entry: &MethodSignature,
        required_argument_types: &[String],
    ) -> Option<DataFlowAnalysisResult> {
        match self.try_execute_forward(entry, required_argument_types) {
            Ok(result) => Some(result),
            Err(err) => {
                error!(entry = %entry, error = %err, "Forward analysis aborted");
                None
            }
        }
    }

    pub fn try_execute_forward(
        &mut self,
        entry: &MethodSignature,
        required_argument_types: &[String],
    ) -> Result<DataFlowAnalysisResult> {
        if self.used {
            return Err(AnalysisError::EngineAlreadyUsed);
        }
        self.used = true;

        let index = self.index;
        let definition = index
            .method(entry)
            .filter(|d| d.has_body())
            .ok_or_else(|| AnalysisError::MissingMethodBody(entry.clone()))?;

        self.scope = if self.config.scope_to_entry_assembly {
            index.assembly_references(&definition.assembly)
        } else {
            None
        };

        info!(entry = %entry, sink = %self.sink, "Forward analysis started");
        self.run(definition, required_argument_types)?;
        info!(
            entry = %entry,
            tainted_objects = self.result.tainted_object_count(),
            patterns = self.result.pattern_count(),
            analyzed_methods = self.statistics.analyzed_methods,
            cache = %self.cache.stats(),
            "Forward analysis finished"
        );

        Ok(std::mem::take(&mut self.result))
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Activation stack
    // ═══════════════════════════════════════════════════════════════════════

    fn run(&mut self, entry: &'a MethodDefinition, required_argument_types: &[String]) -> Result<()> {
        let key = SummaryKey::concrete(&entry.signature());
        let stack = CallStack::new().push(key.clone());
        let mut root = Activation::start(
            key,
            entry.reference.clone(),
            stack,
            CallTarget::Method(entry),
            self.config.enable_static_fields,
        )?;
        self.statistics.analyzed_methods += 1;
        self.mark_entry_inputs(&mut root, required_argument_types);

        let mut activations = vec![root];
        while let Some(top) = activations.last_mut() {
            match self.advance(top)? {
                Advance::Call(request) => self.enter(request, &mut activations)?,
                Advance::Done => {
                    if let Some(finished) = activations.pop() {
                        self.complete(finished, &mut activations)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn mark_entry_inputs(&mut self, act: &mut Activation<'a>, required: &[String]) {
        let formals = act.method.formal_types();
        for (position, ty) in formals.iter().enumerate() {
            let Some(formal) = act.ctx.arguments.formal(position) else {
                continue;
            };
            let selected = required.is_empty()
                || required
                    .iter()
                    .any(|r| *r == ty.full_name || *r == ty.element_type().full_name);
            if selected {
                debug!(position, ty = %ty, "Entry argument marked as input");
                act.ctx.graph.mark_input(formal);
            }
        }
        self.settle(act);
    }

    fn advance(&mut self, act: &mut Activation<'a>) -> Result<Advance<'a>> {
        loop {
            let next = match &mut act.kind {
                ActivationKind::Method(interpreter) => {
                    let before = act.ctx.instruction_count();
                    let effect = interpreter.step(&mut act.ctx)?;
                    let executed = act.ctx.instruction_count().saturating_sub(before);
                    self.statistics.instructions += u64::from(executed);
                    match effect {
                        Some(effect) => Next::Effect(effect),
                        None => Next::Done,
                    }
                }
                ActivationKind::Virtual {
                    implementations,
                    next,
                } => match implementations.get(*next).cloned() {
                    Some(method) => {
                        let mode = if *next == 0 {
                            ApplyMode::Replace
                        } else {
                            ApplyMode::Merge
                        };
                        *next += 1;
                        Next::Implementation(method, mode)
                    }
                    None => Next::Done,
                },
            };

            match next {
                Next::Done => {
                    self.settle(act);
                    return Ok(Advance::Done);
                }
                Next::Effect(effect) => {
                    self.settle(act);
                    if let Some(request) = self.dispatch(act, effect) {
                        return Ok(Advance::Call(request));
                    }
                }
                Next::Implementation(method, mode) => {
                    let effect = CallEffect {
                        kind: CallEffectKind::Call,
                        parameters: act.ctx.arguments.formals().to_vec(),
                        output: act.ctx.return_entity(),
                        offset: 0,
                        method,
                    };
                    let index = self.index;
                    let definition = index.method(&effect.signature());
                    if let Some(request) = self.dispatch_concrete(act, effect, definition, mode) {
                        return Ok(Advance::Call(request));
                    }
                }
            }
        }
    }

    /// Serve `request` from the cache, answer it provisionally (recursion),
    /// or push a new activation for it
    fn enter(&mut self, request: CallRequest<'a>, activations: &mut Vec<Activation<'a>>) -> Result<()> {
        if let Some(summary) = self.cache.get(&request.key) {
            self.statistics.cache_hits += 1;
            debug!(key = %request.key, "Summary served from cache");
            if let Some(top) = activations.last_mut() {
                self.apply_summary(top, &request, &summary, false);
            }
            return Ok(());
        }

        if let Some(head) = activations.iter().position(|a| a.key == request.key) {
            let provisional = self.open_loop(head, activations);
            if let Some(top) = activations.last_mut() {
                self.apply_summary(top, &request, &provisional, true);
            }
            return Ok(());
        }

        let Some(parent) = activations.last_mut() else {
            return Ok(());
        };
        let stack = parent.stack.push(request.key.clone());
        let method = match &request.target {
            CallTarget::Method(definition) => definition.reference.clone(),
            CallTarget::Virtual(_) => request.effect.method.clone(),
        };
        let child = Activation::start(
            request.key.clone(),
            method,
            stack,
            request.target.clone(),
            self.config.enable_static_fields,
        )?;
        if child.is_method() {
            self.statistics.analyzed_methods += 1;
        }
        debug!(key = %request.key, depth = child.stack.depth(), "Analyzing callee");

        parent.waiting = Some(request);
        activations.push(child);
        Ok(())
    }

    /// Open (or extend) the recursion loop headed by `activations[head]` and
    /// return the summary to use for the recursive request
    fn open_loop(&mut self, head: usize, activations: &mut [Activation<'a>]) -> Rc<Summary> {
        let participants: Vec<SummaryKey> =
            activations[head + 1..].iter().map(|a| a.key.clone()).collect();
        for act in &mut activations[head + 1..] {
            act.depend_on(head);
        }

        let head_act = &mut activations[head];
        if head_act.recursion.is_none() {
            self.statistics.recursion_loops += 1;
            info!(head = %head_act.key, participants = participants.len(), "Recursion loop detected");
            head_act.recursion = Some(RecursionLoop::new(head_act.key.clone()));
        }

        let provisional = head_act.recursion.as_mut().and_then(|lp| {
            lp.add_participants(participants);
            lp.provisional()
        });
        provisional.unwrap_or_else(|| self.cache.empty())
    }

    /// Summarize a finished activation, re-run it if it heads an unstable
    /// loop, and apply the summary to the suspended caller
    fn complete(&mut self, finished: Activation<'a>, activations: &mut Vec<Activation<'a>>) -> Result<()> {
        let position = activations.len();
        let Activation {
            key,
            method,
            stack,
            ctx,
            target,
            dependency,
            recursion,
            ..
        } = finished;

        let summary = Rc::new(Summary::from_frozen(ctx.freeze(), stack.clone()));
        let mut entries = Vec::new();

        if let Some(mut lp) = recursion {
            let fingerprint = summary_fingerprint(&summary, |t| self.result.resolve(t));
            let stable = lp.is_stable(fingerprint);
            if !stable && lp.iteration() < self.config.max_recursion_iterations {
                debug!(head = %key, iteration = lp.iteration(), "Recursion loop not stable, re-analyzing head");
                lp.advance(Rc::clone(&summary), fingerprint);
                let mut restarted = Activation::start(
                    key,
                    method,
                    stack,
                    target,
                    self.config.enable_static_fields,
                )?;
                if restarted.is_method() {
                    self.statistics.analyzed_methods += 1;
                }
                restarted.recursion = Some(lp);
                restarted.dependency = dependency;
                activations.push(restarted);
                return Ok(());
            }

            if stable {
                debug!(head = %key, iterations = lp.iteration(), "Recursion loop converged");
            } else {
                warn!(
                    head = %key,
                    iterations = lp.iteration(),
                    "Recursion loop did not converge, keeping last summary"
                );
            }
            entries = lp.take_pending();
        }
        entries.push((key, Rc::clone(&summary)));

        match dependency.filter(|d| *d < position) {
            // Still built on a provisional answer of an open loop
            Some(head) => {
                if let Some(lp) = activations.get_mut(head).and_then(|a| a.recursion.as_mut()) {
                    for (k, s) in entries {
                        lp.defer(k, s);
                    }
                }
                if head + 1 < position {
                    if let Some(parent) = activations.last_mut() {
                        parent.depend_on(head);
                    }
                }
            }
            None => {
                for (k, s) in entries {
                    self.cache.put(k, s);
                }
            }
        }

        if let Some(parent) = activations.last_mut() {
            if let Some(request) = parent.waiting.take() {
                self.apply_summary(parent, &request, &summary, false);
            }
        }
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Call dispatch
    // ═══════════════════════════════════════════════════════════════════════

    fn dispatch(&mut self, act: &mut Activation<'a>, effect: CallEffect) -> Option<CallRequest<'a>> {
        let signature = effect.signature();

        if signature == self.sink {
            self.intercept_sink(act, &effect);
            return None;
        }

        if effect.is_constructor()
            && self
                .cache
                .register_created_type(&effect.method.declaring_type.full_name)
        {
            debug!(ty = %effect.method.declaring_type, "Type constructed");
        }

        let index = self.index;
        let definition = index.method(&signature);
        if effect.kind == CallEffectKind::CallVirt {
            if let Some(definition) = definition.filter(|d| d.is_virtual || d.is_abstract) {
                return self.dispatch_virtual(act, effect, definition);
            }
        }
        self.dispatch_concrete(act, effect, definition, ApplyMode::Replace)
    }

    fn dispatch_virtual(
        &mut self,
        act: &mut Activation<'a>,
        effect: CallEffect,
        definition: &'a MethodDefinition,
    ) -> Option<CallRequest<'a>> {
        let signature = effect.signature();
        let implementations = {
            let filter = ImplementationFilter {
                created_types: self
                    .config
                    .use_created_types
                    .then(|| self.cache.created_types()),
                assemblies: self.scope,
            };
            let mut implementations = self.index.get_implementations(&signature, &filter);
            let own = &definition.reference;
            if definition.has_body()
                && filter.accepts(&own.declaring_type.full_name, &definition.assembly)
                && !implementations.contains(own)
            {
                implementations.insert(0, own.clone());
            }
            implementations
        };

        let limit = self.config.virtual_calls_limit as usize;
        if implementations.is_empty() || implementations.len() > limit {
            self.statistics.unresolved_virtual_calls += 1;
            debug!(
                method = %signature,
                implementations = implementations.len(),
                limit,
                "Virtual call left unresolved"
            );
            self.conservative(act, &effect);
            return None;
        }

        Some(CallRequest {
            key: SummaryKey::virtual_call(&signature),
            effect,
            mode: ApplyMode::Replace,
            target: CallTarget::Virtual(implementations),
        })
    }

    fn dispatch_concrete(
        &mut self,
        act: &mut Activation<'a>,
        effect: CallEffect,
        definition: Option<&'a MethodDefinition>,
        mode: ApplyMode,
    ) -> Option<CallRequest<'a>> {
        let Some(definition) = definition else {
            self.external_call(act, &effect);
            return None;
        };

        if self.index.skipped_modules().contains(&definition.module) {
            debug!(method = %effect.method, module = %definition.module, "Callee in skipped module");
            self.conservative(act, &effect);
            return None;
        }

        let signature = definition.signature();
        if !definition.has_body() || self.is_external(&signature) {
            self.external_call(act, &effect);
            return None;
        }

        Some(CallRequest {
            key: SummaryKey::concrete(&signature),
            effect,
            mode,
            target: CallTarget::Method(definition),
        })
    }

    fn is_external(&self, signature: &MethodSignature) -> bool {
        self.external_methods
            .iter()
            .any(|pattern| pattern.is_match(signature.as_str()))
    }

    /// Boundary call: every input becomes a trigger candidate
    fn external_call(&mut self, act: &mut Activation<'a>, effect: &CallEffect) {
        let signature = effect.signature();
        for input in effect.inputs() {
            act.ctx.graph.add_target_call(
                input,
                TargetCall {
                    signature: signature.clone(),
                    call_stack: act.stack.clone(),
                },
            );
        }
        self.result.record_external_call();
        self.conservative(act, effect);
    }

    /// Outputs (return value, constructed object, by-ref arguments) become
    /// input as soon as any input is
    fn conservative(&mut self, act: &mut Activation<'a>, effect: &CallEffect) {
        self.statistics.conservative_calls += 1;

        let mut outputs = effect.outputs();
        for parameter in effect.by_ref_parameters() {
            if !outputs.contains(&parameter) {
                outputs.push(parameter);
            }
        }
        let inputs = effect.inputs();

        let graph = &mut act.ctx.graph;
        if inputs.iter().any(|i| graph.taint(*i).is_input()) {
            for output in &outputs {
                graph.mark_input(*output);
            }
        } else {
            for input in &inputs {
                for output in &outputs {
                    graph.add_possible_input(*input, *output);
                }
            }
        }
        self.settle(act);
    }

    fn intercept_sink(&mut self, act: &mut Activation<'a>, effect: &CallEffect) {
        let mut outputs = effect.outputs();
        for parameter in effect.by_ref_parameters() {
            if !outputs.contains(&parameter) {
                outputs.push(parameter);
            }
        }
        let inputs = effect.inputs();

        let deferred = self.config.input_tainted_mode
            && !inputs.iter().any(|i| act.ctx.graph.taint(*i).is_input());
        if deferred {
            let sink = SinkCall {
                signature: effect.signature(),
                call_stack: act.stack.clone(),
                offset: effect.offset,
            };
            debug!(offset = effect.offset, stack = %act.stack, "Sink call deferred until input reaches it");
            for input in &inputs {
                for output in &outputs {
                    act.ctx.graph.add_possible_tainted(
                        *input,
                        PossibleTaint {
                            target: *output,
                            sink: sink.clone(),
                        },
                    );
                }
            }
        } else {
            let source = self.mint_source(&act.stack, effect.offset);
            for output in &outputs {
                act.ctx
                    .graph
                    .raise_taint(*output, source, Some(act.stack.clone()));
            }
        }
        self.settle(act);
    }

    /// Taint id for the sink call at (`stack`, `offset`); minted once per run
    fn mint_source(&mut self, stack: &CallStack, offset: u32) -> TaintId {
        if let Some(id) = self.session.source_for(stack, offset) {
            return self.result.resolve(id);
        }
        let method = stack
            .top()
            .map(SummaryKey::signature)
            .unwrap_or_else(|| self.sink.clone());
        let id = self.result.add_tainted_method_call(method, stack.clone());
        self.session.remember_source(stack, offset, id);
        self.statistics.sink_interceptions += 1;
        info!(taint = %id, stack = %stack, offset, "Sensitive sink intercepted");
        id
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Summary application
    // ═══════════════════════════════════════════════════════════════════════

    fn apply_summary(
        &mut self,
        act: &mut Activation<'a>,
        request: &CallRequest<'a>,
        summary: &Summary,
        provisional: bool,
    ) {
        let Some(callee) = summary.as_computed() else {
            self.settle(act);
            return;
        };

        let application = self.session.next_application();
        trace!(application, key = %request.key, provisional, "Applying summary");
        let mut context = ApplyContext::new(&callee.graph, request.mode);
        let static_root = act.ctx.statics.root();
        if provisional {
            apply_roots(
                &mut context,
                &mut act.ctx.graph,
                callee,
                &request.effect,
                static_root,
                &mut IdentityHooks,
            );
        } else {
            let base = act.stack.push(request.key.clone());
            let mut hooks = ProvenanceHooks::new(
                &mut self.result,
                callee.stack.depth(),
                base,
                act.key.clone(),
            );
            apply_roots(
                &mut context,
                &mut act.ctx.graph,
                callee,
                &request.effect,
                static_root,
                &mut hooks,
            );
        }

        match request.mode {
            ApplyMode::Replace => act
                .ctx
                .add_counts(callee.method_call_count, callee.instruction_count),
            ApplyMode::Merge => act
                .ctx
                .max_counts(callee.method_call_count, callee.instruction_count),
        }
        self.settle(act);
    }

    /// Fire deferred edges and attack triggers of every entity whose taint
    /// changed, until nothing changes
    fn settle(&mut self, act: &mut Activation<'a>) {
        loop {
            let changed = act.ctx.graph.drain_transitions();
            if changed.is_empty() {
                break;
            }
            for id in changed {
                let taint = act.ctx.graph.taint(id);
                if !taint.is_input() {
                    continue;
                }

                for edge in act.ctx.graph.take_possible_tainted(id) {
                    let source = self.mint_source(&edge.sink.call_stack, edge.sink.offset);
                    act.ctx
                        .graph
                        .raise_taint(edge.target, source, Some(edge.sink.call_stack));
                }
                for target in act.ctx.graph.take_possible_input(id) {
                    act.ctx.graph.mark_input(target);
                }

                if taint.is_tainted() {
                    let calls = act.ctx.graph.entity(id).target_calls().to_vec();
                    for call in calls {
                        self.result
                            .add_attack_trigger_call(taint, call.signature, call.call_stack);
                    }
                }
            }
        }
    }
}

/// Match the summary roots against the call site
fn apply_roots<H: ApplyHooks>(
    context: &mut ApplyContext<'_>,
    graph: &mut SymbolicGraph,
    callee: &MethodSummary,
    effect: &CallEffect,
    static_root: Option<EntityId>,
    hooks: &mut H,
) {
    if let (Some(from), Some(to)) = (callee.static_entity, static_root) {
        context.apply(graph, from, to, hooks);
    }
    for (formal, actual) in callee.arguments.iter().zip(effect.parameters.iter()) {
        if let (Some(formal), Some(actual)) = (formal, actual) {
            context.apply(graph, *formal, *actual, hooks);
        }
    }
    if let (Some(from), Some(to)) = (callee.return_entity, effect.output) {
        context.apply(graph, from, to, hooks);
    }
}
