//! End-to-end gadget scenarios
//!
//! Each test builds a small program over the in-memory call index, runs the
//! engine from one entry point and checks the recorded patterns.

mod common;

use common::*;
use gadgetflow_core::shared::models::TypeRef;
use gadgetflow_core::{AnalysisError, EngineConfig, SymbolicEngine};
use pretty_assertions::assert_eq;

fn bar_run() -> gadgetflow_core::shared::models::MethodRef {
    instance_method("Test.Bar", "Run", vec![], TypeRef::void())
}

fn bar_copy() -> gadgetflow_core::shared::models::MethodRef {
    instance_method("Test.Bar", "Copy", vec![], TypeRef::void())
}

/// this.f2 = new MyValue(); Copy(); Log(this.f1) where Copy does f1 = f2
fn bar_program() -> gadgetflow_core::InMemoryCallIndex {
    ProgramBuilder::new()
        .method(
            bar_run(),
            BodyBuilder::new()
                .ldarg(0)
                .newobj(sink_ctor())
                .stfld(field("Test.Bar", "f2"))
                .ldarg(0)
                .call(bar_copy())
                .ldarg(0)
                .ldfld(field("Test.Bar", "f1"))
                .boxed()
                .log_top()
                .ret(),
        )
        .method(
            bar_copy(),
            BodyBuilder::new()
                .ldarg(0)
                .ldarg(0)
                .ldfld(field("Test.Bar", "f2"))
                .stfld(field("Test.Bar", "f1"))
                .ret(),
        )
        .build()
}

#[test]
fn test_field_copy_through_callee() {
    let index = bar_program();
    let mut engine = engine(&index);
    let result = engine
        .execute_forward(&bar_run().signature(), &[])
        .expect("analysis succeeds");

    assert_single_pattern(&result, 2);
    assert_eq!(result.tainted_object_count(), 1);
    assert_eq!(engine.statistics().sink_interceptions, 1);
    assert_eq!(engine.statistics().analyzed_methods, 2);
}

#[test]
fn test_trigger_stack_and_source_stack() {
    let index = bar_program();
    let result = engine(&index)
        .execute_forward(&bar_run().signature(), &[])
        .unwrap();

    let (taint, trigger) = result.attack_triggers().next().unwrap();
    assert_eq!(trigger.signature, log_method().signature());
    assert_eq!(
        trigger.call_stack.to_strings(),
        vec![format!("C:{}", bar_run().signature())]
    );

    let source = result.source(taint).unwrap();
    assert_eq!(source.method, bar_run().signature());
    assert_eq!(source.forward_stack.depth(), 1);
}

#[test]
fn test_store_through_alias_is_seen_by_other_alias() {
    // a = this.myClass; b = this.myClass; a.cl = new MyValue(); Log(b.cl)
    let run = instance_method("Test.Alias", "Run", vec![], TypeRef::void());
    let index = ProgramBuilder::new()
        .method(
            run.clone(),
            BodyBuilder::new()
                .local(object())
                .local(object())
                .ldarg(0)
                .ldfld(field("Test.Alias", "myClass"))
                .stloc(0)
                .ldarg(0)
                .ldfld(field("Test.Alias", "myClass"))
                .stloc(1)
                .ldloc(0)
                .newobj(sink_ctor())
                .boxed()
                .stfld(field("Test.MyClass", "cl"))
                .ldloc(1)
                .ldfld(field("Test.MyClass", "cl"))
                .log_top()
                .ret(),
        )
        .build();

    let result = engine(&index)
        .execute_forward(&run.signature(), &[])
        .unwrap();
    assert_single_pattern(&result, 2);
}

#[test]
fn test_static_field_access_path() {
    // Run: Holder.s = new MyValue(); Relay();  Relay: Log(Holder.s)
    let run = static_method("Test.Statics", "Run", vec![], TypeRef::void());
    let relay = static_method("Test.Statics", "Relay", vec![], TypeRef::void());
    let index = ProgramBuilder::new()
        .method(
            run.clone(),
            BodyBuilder::new()
                .newobj(sink_ctor())
                .stsfld(field("Test.Holder", "s"))
                .call(relay.clone())
                .ret(),
        )
        .method(
            relay,
            BodyBuilder::new()
                .ldsfld(field("Test.Holder", "s"))
                .log_top()
                .ret(),
        )
        .build();

    let with_statics = SymbolicEngine::new(&index, SINK, 16, true, false)
        .execute_forward(&run.signature(), &[])
        .unwrap();
    assert_single_pattern(&with_statics, 3);

    let without_statics = SymbolicEngine::new(&index, SINK, 16, false, false)
        .execute_forward(&run.signature(), &[])
        .unwrap();
    assert_no_pattern(&without_statics);
    assert_eq!(without_statics.tainted_object_count(), 1);
}

#[test]
fn test_instance_field_bridged_through_static_across_helpers() {
    // Foo.Run:  this.myClass.cl = new MyValue(); Bar(); Baz();
    // Foo.Bar:  Statics.s = this.myClass;
    // Foo.Baz:  Log(Statics.s.cl);
    let run = instance_method("Test.Foo", "Run", vec![], TypeRef::void());
    let bar = instance_method("Test.Foo", "Bar", vec![], TypeRef::void());
    let baz = instance_method("Test.Foo", "Baz", vec![], TypeRef::void());
    let index = ProgramBuilder::new()
        .method(
            run.clone(),
            BodyBuilder::new()
                .ldarg(0)
                .ldfld(field("Test.Foo", "myClass"))
                .newobj(sink_ctor())
                .boxed()
                .stfld(field("Test.MyClass", "cl"))
                .ldarg(0)
                .call(bar.clone())
                .ldarg(0)
                .call(baz.clone())
                .ret(),
        )
        .method(
            bar,
            BodyBuilder::new()
                .ldarg(0)
                .ldfld(field("Test.Foo", "myClass"))
                .stsfld(field("Test.Statics", "s"))
                .ret(),
        )
        .method(
            baz,
            BodyBuilder::new()
                .ldsfld(field("Test.Statics", "s"))
                .ldfld(field("Test.MyClass", "cl"))
                .log_top()
                .ret(),
        )
        .build();

    let with_statics = SymbolicEngine::new(&index, SINK, 16, true, false)
        .execute_forward(&run.signature(), &[])
        .unwrap();
    assert_single_pattern(&with_statics, 3);

    let without_statics = SymbolicEngine::new(&index, SINK, 16, false, false)
        .execute_forward(&run.signature(), &[])
        .unwrap();
    assert_no_pattern(&without_statics);
    assert_eq!(without_statics.tainted_object_count(), 1);
}

fn runner_run() -> gadgetflow_core::shared::models::MethodRef {
    instance_method("Test.IRunner", "Run", vec![object()], TypeRef::void())
}

fn impl_run(ty: &str) -> gadgetflow_core::shared::models::MethodRef {
    instance_method(ty, "Run", vec![object()], TypeRef::void())
}

/// `IRunner r = new <types[0]>(); ... ; r.Run(new MyValue())`
fn virtual_program(types: &[&str]) -> (gadgetflow_core::InMemoryCallIndex, gadgetflow_core::shared::models::MethodRef) {
    let entry = static_method("Test.Virtual", "Run", vec![], TypeRef::void());
    let mut body = BodyBuilder::new()
        .local(TypeRef::new("Test.IRunner"))
        .local(object());
    for ty in types {
        body = body.newobj(ctor(ty)).stloc(0);
    }
    body = body
        .newobj(sink_ctor())
        .boxed()
        .stloc(1)
        .ldloc(0)
        .ldloc(1)
        .callvirt(runner_run())
        .ret();

    let mut program = ProgramBuilder::new()
        .method(entry.clone(), body)
        .abstract_method(runner_run());
    for ty in types {
        program = program.implementation(
            &runner_run(),
            impl_run(ty),
            BodyBuilder::new().ldarg(1).log_top().ret(),
        );
    }
    (program.build(), entry)
}

#[test]
fn test_virtual_call_through_dispatch() {
    let (index, entry) = virtual_program(&["Test.Impl"]);
    let mut engine = engine(&index);
    let result = engine.execute_forward(&entry.signature(), &[]).unwrap();

    // Run -> V:IRunner::Run -> C:Impl::Run -> Log
    assert_single_pattern(&result, 4);
    let (_, trigger) = result.attack_triggers().next().unwrap();
    assert!(trigger.call_stack.to_strings()[1].starts_with("V:"));
    assert_eq!(engine.statistics().unresolved_virtual_calls, 0);
}

#[test]
fn test_virtual_call_over_limit_is_unresolved() {
    let (index, entry) = virtual_program(&["Test.ImplA", "Test.ImplB"]);
    let mut engine = SymbolicEngine::new(&index, SINK, 1, true, false);
    let result = engine.execute_forward(&entry.signature(), &[]).unwrap();

    assert_no_pattern(&result);
    assert_eq!(engine.statistics().unresolved_virtual_calls, 1);
}

#[test]
fn test_virtual_call_merges_all_implementations() {
    let (index, entry) = virtual_program(&["Test.ImplA", "Test.ImplB"]);
    let result = engine(&index)
        .execute_forward(&entry.signature(), &[])
        .unwrap();

    // One source, one trigger per implementation stack
    assert_eq!(result.pattern_count(), 1);
    assert_eq!(trigger_depths(&result), vec![4, 4]);
}

#[test]
fn test_virtual_call_without_constructed_type() {
    // Implementation exists but its type is never constructed
    let (index, entry) = virtual_program(&[]);
    let index = {
        let mut index = index;
        index.add_method(gadgetflow_core::MethodDefinition {
            reference: impl_run("Test.Impl"),
            assembly: ASSEMBLY.to_string(),
            module: "Test.dll".into(),
            is_public: true,
            is_virtual: true,
            is_abstract: false,
            body: Some(BodyBuilder::new().ldarg(1).log_top().ret().build()),
        });
        index.add_implementation(runner_run().signature(), impl_run("Test.Impl"), ASSEMBLY);
        index
    };

    let mut engine = engine(&index);
    let result = engine.execute_forward(&entry.signature(), &[]).unwrap();
    assert_no_pattern(&result);
    assert_eq!(engine.statistics().unresolved_virtual_calls, 1);

    let config = EngineConfig::default()
        .sensitive_sink(SINK)
        .use_created_types(false);
    let mut unfiltered = SymbolicEngine::with_config(&index, config).unwrap();
    let result = unfiltered.execute_forward(&entry.signature(), &[]).unwrap();
    assert_single_pattern(&result, 4);
}

#[test]
fn test_return_from_out_parameter() {
    // Create(out object o) { o = new MyValue(); }  Run: Create(out x); Log(x)
    let create = static_method(
        "Test.Out",
        "Create",
        vec![object().by_ref()],
        TypeRef::void(),
    );
    let run = static_method("Test.Out", "Run", vec![], TypeRef::void());
    let index = ProgramBuilder::new()
        .method(
            run.clone(),
            BodyBuilder::new()
                .local(object())
                .ldloca(0)
                .call(create.clone())
                .ldloc(0)
                .log_top()
                .ret(),
        )
        .method(
            create,
            BodyBuilder::new()
                .ldarg(0)
                .newobj(sink_ctor())
                .boxed()
                .stind_ref()
                .ret(),
        )
        .build();

    let result = engine(&index).execute_forward(&run.signature(), &[]).unwrap();
    assert_single_pattern(&result, 2);
}

#[test]
fn test_reassigned_parameter_does_not_flow_back() {
    // Reassign(object o) { o = new MyValue(); }  Run: x = new Plain(); Reassign(x); Log(x)
    let reassign = static_method("Test.Param", "Reassign", vec![object()], TypeRef::void());
    let run = static_method("Test.Param", "Run", vec![], TypeRef::void());
    let index = ProgramBuilder::new()
        .method(
            run.clone(),
            BodyBuilder::new()
                .local(object())
                .newobj(ctor("Test.Plain"))
                .stloc(0)
                .ldloc(0)
                .call(reassign.clone())
                .ldloc(0)
                .log_top()
                .ret(),
        )
        .method(
            reassign,
            BodyBuilder::new()
                .newobj(sink_ctor())
                .boxed()
                .starg(0)
                .ret(),
        )
        .build();

    let result = engine(&index).execute_forward(&run.signature(), &[]).unwrap();
    assert_no_pattern(&result);
    assert_eq!(result.tainted_object_count(), 1);
}

#[test]
fn test_field_written_on_reassigned_parameter_stays_local() {
    // Reassign(o) { o = new MyClass(); o.cl = new MyValue(); }
    // Run: x = new MyClass(); Reassign(x); Log(x.cl)
    let reassign = static_method("Test.Param", "Reassign", vec![object()], TypeRef::void());
    let run = static_method("Test.Param", "Run", vec![], TypeRef::void());
    let index = ProgramBuilder::new()
        .method(
            run.clone(),
            BodyBuilder::new()
                .local(object())
                .newobj(ctor("Test.MyClass"))
                .stloc(0)
                .ldloc(0)
                .call(reassign.clone())
                .ldloc(0)
                .ldfld(field("Test.MyClass", "cl"))
                .log_top()
                .ret(),
        )
        .method(
            reassign,
            BodyBuilder::new()
                .newobj(ctor("Test.MyClass"))
                .starg(0)
                .ldarg(0)
                .newobj(sink_ctor())
                .boxed()
                .stfld(field("Test.MyClass", "cl"))
                .ret(),
        )
        .build();

    let result = engine(&index).execute_forward(&run.signature(), &[]).unwrap();
    assert_no_pattern(&result);
    assert_eq!(result.tainted_object_count(), 1);
}

#[test]
fn test_returned_value_reaches_trigger() {
    // Make() returns new MyValue(); Run: Log(Make())
    let make = static_method("Test.Ret", "Make", vec![], object());
    let run = static_method("Test.Ret", "Run", vec![], TypeRef::void());
    let index = ProgramBuilder::new()
        .method(
            run.clone(),
            BodyBuilder::new().call(make.clone()).log_top().ret(),
        )
        .method(
            make,
            BodyBuilder::new().newobj(sink_ctor()).boxed().ret(),
        )
        .build();

    let result = engine(&index).execute_forward(&run.signature(), &[]).unwrap();
    assert_single_pattern(&result, 2);
    // Source minted in Make, observed in Run
    let source = result.sources().next().unwrap();
    assert_eq!(source.forward_stack.depth(), 2);
    assert_eq!(source.backward_stack.len(), 1);
}

#[test]
fn test_cached_summary_reused_at_second_site() {
    // Run: Log(Make()); Log(Make())
    let make = static_method("Test.Ret", "Make", vec![], object());
    let run = static_method("Test.Ret", "Run", vec![], TypeRef::void());
    let index = ProgramBuilder::new()
        .method(
            run.clone(),
            BodyBuilder::new()
                .call(make.clone())
                .log_top()
                .call(make.clone())
                .log_top()
                .ret(),
        )
        .method(make, BodyBuilder::new().newobj(sink_ctor()).boxed().ret())
        .build();

    let mut engine = engine(&index);
    let result = engine.execute_forward(&run.signature(), &[]).unwrap();
    assert_eq!(engine.statistics().cache_hits, 1);
    assert_eq!(engine.statistics().analyzed_methods, 2);
    assert_eq!(engine.statistics().sink_interceptions, 1);
    assert!(result.has_pattern());
}

#[test]
fn test_external_pattern_is_not_analyzed() {
    let index = bar_program();
    let config = EngineConfig::default()
        .sensitive_sink(SINK)
        .external_method(r"::Copy\(");
    let mut engine = SymbolicEngine::with_config(&index, config).unwrap();
    let result = engine.execute_forward(&bar_run().signature(), &[]).unwrap();

    // Copy is a boundary now: f1 is never assigned
    assert_no_pattern(&result);
    assert_eq!(engine.statistics().analyzed_methods, 1);
    assert_eq!(result.external_call_count(), 2);
}

#[test]
fn test_skipped_module_gets_conservative_summary() {
    let index = {
        let mut index = bar_program();
        index.skip_module("Test.dll");
        index
    };
    let mut engine = engine(&index);
    let result = engine.execute_forward(&bar_run().signature(), &[]).unwrap();
    assert_no_pattern(&result);
    assert!(engine.statistics().conservative_calls >= 1);
}

#[test]
fn test_input_argument_reaches_trigger_without_source() {
    // Run(object data) { Log(data) }: input only, no tainted source
    let run = static_method("Test.Input", "Run", vec![object()], TypeRef::void());
    let index = ProgramBuilder::new()
        .method(run.clone(), BodyBuilder::new().ldarg(0).log_top().ret())
        .build();

    let result = engine(&index).execute_forward(&run.signature(), &[]).unwrap();
    assert_no_pattern(&result);
    assert_eq!(result.tainted_object_count(), 0);
    assert_eq!(result.external_call_count(), 1);
}

#[test]
fn test_sink_inside_loop_mints_once() {
    // 0: newobj MyValue; 1: box; 2: ldnull; 3: call Log; 4: ldnull; 5: brtrue 0; 6: ret
    let run = static_method("Test.Loop", "Run", vec![], TypeRef::void());
    let index = ProgramBuilder::new()
        .method(
            run.clone(),
            BodyBuilder::new()
                .newobj(sink_ctor())
                .boxed()
                .log_top()
                .ldnull()
                .brtrue(0)
                .ret(),
        )
        .build();

    let mut engine = engine(&index);
    let result = engine.execute_forward(&run.signature(), &[]).unwrap();
    assert_eq!(result.tainted_object_count(), 1);
    assert_eq!(engine.statistics().sink_interceptions, 1);
    assert_single_pattern(&result, 2);
}

#[test]
fn test_short_forms_abort_analysis() {
    use gadgetflow_core::shared::models::OpCode;

    let run = static_method("Test.Short", "Run", vec![object()], TypeRef::void());
    let index = ProgramBuilder::new()
        .keep_short_forms()
        .method(
            run.clone(),
            BodyBuilder::new().op(OpCode::Ldarg0).log_top().ret(),
        )
        .build();

    assert!(engine(&index).execute_forward(&run.signature(), &[]).is_none());

    let err = engine(&index)
        .try_execute_forward(&run.signature(), &[])
        .unwrap_err();
    assert!(matches!(err, AnalysisError::UnsupportedOpcode { .. }));
    assert!(err.is_bytecode_error());
}

#[test]
fn test_engine_instance_is_single_use() {
    let index = bar_program();
    let mut engine = engine(&index);
    assert!(engine.execute_forward(&bar_run().signature(), &[]).is_some());

    let err = engine
        .try_execute_forward(&bar_run().signature(), &[])
        .unwrap_err();
    assert!(matches!(err, AnalysisError::EngineAlreadyUsed));

    engine.reset_summary_cache();
    let again = engine
        .execute_forward(&bar_run().signature(), &[])
        .unwrap();
    assert_single_pattern(&again, 2);
}

#[test]
fn test_missing_entry_body() {
    let index = ProgramBuilder::new().native_method(log_method()).build();
    let err = engine(&index)
        .try_execute_forward(&log_method().signature(), &[])
        .unwrap_err();
    assert!(matches!(err, AnalysisError::MissingMethodBody(_)));
}

#[test]
fn test_result_serializes_to_json() {
    let index = bar_program();
    let result = engine(&index)
        .execute_forward(&bar_run().signature(), &[])
        .unwrap();

    let json: serde_json::Value = serde_json::from_str(&result.to_json().unwrap()).unwrap();
    assert_eq!(json["has_pattern"], serde_json::Value::Bool(true));
    assert!(json["sources"]["2"]["attack_triggers"].is_array());
}
