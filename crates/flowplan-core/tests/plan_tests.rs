// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
#![allow(missing_docs)]
#![allow(clippy::unwrap_used, clippy::panic)]

use flowplan_codec::DecodeOptions;
use flowplan_core::{
    bind_functions, validate_restored, CompileOptions, CompiledPlan, EmptyCatalog, PlanError,
    PlanErrorKind, RestoreOptions,
};
use flowplan_dry_tests::scenarios::session;
use flowplan_dry_tests::{
    fixture_catalog, parallel_union, session_window_pipeline, table_id, udf_pipeline,
    FakeTranslator, InMemoryCatalog, RecordingRegistry, TableMode, DEFAULT_SESSION_GAP_MS,
};
use flowplan_model::{
    CatalogObjectRef, Distribution, EngineVersion, NodeKind, PlanGraph, PlanNode, TypeDescriptor,
};
use serde_json::Value;

fn compile(graph: &PlanGraph) -> CompiledPlan {
    CompiledPlan::compile(graph, &CompileOptions::new()).unwrap()
}

fn session_plan(mode: TableMode) -> CompiledPlan {
    compile(&session_window_pipeline(DEFAULT_SESSION_GAP_MS, mode))
}

fn rebuild(graph: &PlanGraph, f: impl Fn(PlanNode) -> PlanNode) -> PlanGraph {
    let (version, nodes, edges) = graph.clone().into_parts();
    PlanGraph::new(version, nodes.into_iter().map(f).collect(), edges).unwrap()
}

fn edit_document(plan: &CompiledPlan, f: impl FnOnce(&mut Value)) -> String {
    let mut doc: Value = serde_json::from_str(&plan.as_json_string().unwrap()).unwrap();
    f(&mut doc);
    serde_json::to_string(&doc).unwrap()
}

fn restore(text: &str, catalog: &dyn flowplan_core::Catalog) -> Result<CompiledPlan, PlanError> {
    CompiledPlan::restore_from_str(text, catalog, &RestoreOptions::new())
}

#[test]
fn compile_gives_every_node_of_the_pipeline_a_stable_id() {
    let plan = session_plan(TableMode::Persisted);
    assert_eq!(plan.engine_version(), EngineVersion::CURRENT);
    assert_eq!(plan.stable_ids().len(), 7);
    assert!(plan.stable_ids()[&session::WINDOW].starts_with("group-window-aggregate_"));
}

#[test]
fn session_pipeline_document_has_the_expected_shape() {
    let plan = session_plan(TableMode::Persisted);
    let doc: Value = serde_json::from_str(&plan.as_json_string().unwrap()).unwrap();

    let nodes = doc["nodes"].as_array().unwrap();
    let kinds: Vec<&str> = nodes.iter().map(|n| n["kind"].as_str().unwrap()).collect();
    assert_eq!(
        kinds,
        [
            "table-source-scan",
            "calc",
            "watermark-assigner",
            "calc",
            "exchange",
            "group-window-aggregate",
            "sink",
        ]
    );
    for node in nodes {
        let stable_id = node["stableId"].as_str().unwrap_or_default();
        assert!(!stable_id.trim().is_empty(), "node {} has no stable id", node["id"]);
    }

    let edges = doc["edges"].as_array().unwrap();
    assert_eq!(edges.len(), 6);
    let into_window = edges
        .iter()
        .find(|e| e["source"] == session::EXCHANGE && e["target"] == session::WINDOW)
        .unwrap();
    assert_eq!(
        into_window["distribution"],
        serde_json::json!({"type": "hash", "keys": [0]})
    );

    let window = &nodes[5];
    assert_eq!(window["id"], session::WINDOW);
    assert_eq!(
        window["windowSpec"]["kind"],
        serde_json::json!({"type": "session", "gapMs": 10_000})
    );
}

#[test]
fn persisted_plan_restores_without_a_catalog() {
    let plan = session_plan(TableMode::Persisted);
    let restored = restore(&plan.as_json_string().unwrap(), &EmptyCatalog).unwrap();
    assert_eq!(restored.graph(), plan.graph());
    assert_eq!(restored.stable_ids(), plan.stable_ids());
}

#[test]
fn upgraded_engine_reattaches_to_aggregate_state() {
    let graph = session_window_pipeline(DEFAULT_SESSION_GAP_MS, TableMode::Persisted);
    let old = CompiledPlan::compile(
        &graph,
        &CompileOptions::new().with_engine_version(EngineVersion::new(1, 1, 0)),
    )
    .unwrap();

    let restored = restore(&old.as_json_string().unwrap(), &EmptyCatalog).unwrap();
    assert_eq!(restored.engine_version(), EngineVersion::new(1, 1, 0));

    let fresh = compile(&graph);
    assert_eq!(
        restored.stable_ids()[&session::WINDOW],
        fresh.stable_ids()[&session::WINDOW]
    );
    assert!(flowplan_ident::rederive(restored.graph()).unwrap().is_empty());
}

#[test]
fn changing_the_session_gap_detaches_the_aggregate_only() {
    let base = session_plan(TableMode::Persisted);
    let wider = compile(&session_window_pipeline(20_000, TableMode::Persisted));
    assert_ne!(
        base.stable_ids()[&session::WINDOW],
        wider.stable_ids()[&session::WINDOW]
    );
    assert_eq!(
        base.stable_ids()[&session::EXCHANGE],
        wider.stable_ids()[&session::EXCHANGE]
    );
}

#[test]
fn live_tables_resolve_against_the_catalog() {
    let plan = session_plan(TableMode::Live);
    let text = plan.as_json_string().unwrap();
    restore(&text, &fixture_catalog()).unwrap();

    let err = restore(&text, &fixture_catalog().without_table(&table_id("S"))).unwrap_err();
    match err {
        PlanError::CatalogObjectUnresolved { node, object, .. } => {
            assert_eq!(node, session::SINK);
            assert_eq!(object, table_id("S"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn live_schema_may_reorder_and_grow_but_not_change_types() {
    let text = session_plan(TableMode::Live).as_json_string().unwrap();
    let window_schema = flowplan_dry_tests::scenarios::window_row();
    let reordered = InMemoryCatalog::new()
        .with_table(
            table_id("T"),
            TypeDescriptor::row([
                ("c", TypeDescriptor::string()),
                ("extra", TypeDescriptor::int()),
                ("b", TypeDescriptor::bigint().not_null()),
                ("a", TypeDescriptor::int()),
            ])
            .unwrap(),
        )
        .with_table(table_id("S"), window_schema.clone());
    restore(&text, &reordered).unwrap();

    let retyped = InMemoryCatalog::new()
        .with_table(
            table_id("T"),
            TypeDescriptor::row([
                ("a", TypeDescriptor::int()),
                ("b", TypeDescriptor::string()),
                ("c", TypeDescriptor::string()),
            ])
            .unwrap(),
        )
        .with_table(table_id("S"), window_schema);
    let err = restore(&text, &retyped).unwrap_err();
    assert_eq!(err.kind(), PlanErrorKind::TypeInconsistency);
    assert!(err.to_string().contains("field `b`"), "{err}");
}

#[test]
fn missing_identity_is_reported_before_anything_else() {
    let plan = session_plan(TableMode::Live);
    let stripped = rebuild(plan.graph(), |n| {
        if n.id() == session::WINDOW {
            n.with_stable_id(None)
        } else {
            n
        }
    })
    .with_version(EngineVersion::new(9, 0, 0));

    let err = validate_restored(&stripped, &EmptyCatalog, EngineVersion::CURRENT).unwrap_err();
    match err {
        PlanError::MissingStableIdentity { node, kind } => {
            assert_eq!(node, session::WINDOW);
            assert_eq!(kind, NodeKind::GroupWindowAggregate);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn stateless_nodes_need_ids_too() {
    let plan = session_plan(TableMode::Persisted);
    let text = edit_document(&plan, |doc| {
        doc["nodes"][1]
            .as_object_mut()
            .unwrap()
            .remove("stableId");
    });
    let err = restore(&text, &EmptyCatalog).unwrap_err();
    assert_eq!(err.kind(), PlanErrorKind::MissingStableIdentity);
}

#[test]
fn relay_nodes_restore_without_ids() {
    let plan = compile(&parallel_union(TableMode::Persisted));
    let union = plan
        .graph()
        .nodes()
        .iter()
        .find(|n| n.kind() == NodeKind::Union)
        .unwrap();
    assert!(union.stable_id().is_none());
    restore(&plan.as_json_string().unwrap(), &EmptyCatalog).unwrap();
}

#[test]
fn newer_plans_are_rejected() {
    let plan = session_plan(TableMode::Persisted);
    let graph = plan.graph().with_version(EngineVersion::new(9, 0, 0));
    let err = validate_restored(&graph, &EmptyCatalog, EngineVersion::CURRENT).unwrap_err();
    assert!(matches!(err, PlanError::UnsupportedPlanVersion { .. }));

    let text = edit_document(&plan, |doc| doc["engineVersion"] = Value::from("9.0.0"));
    let err = restore(&text, &EmptyCatalog).unwrap_err();
    assert_eq!(err.kind(), PlanErrorKind::UnsupportedPlanVersion);
}

#[test]
fn exchange_edges_must_carry_the_exchange_distribution() {
    let (version, nodes, mut edges) =
        session_window_pipeline(DEFAULT_SESSION_GAP_MS, TableMode::Persisted).into_parts();
    for edge in &mut edges {
        if edge.source == session::EXCHANGE {
            edge.distribution = Distribution::Forward;
        }
    }
    let graph = PlanGraph::new(version, nodes, edges).unwrap();
    let err = CompiledPlan::compile(&graph, &CompileOptions::new()).unwrap_err();
    match err {
        PlanError::TypeInconsistency { node, reason, .. } => {
            assert_eq!(node, session::EXCHANGE);
            assert!(reason.contains("hash[0]"), "{reason}");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn aggregate_output_must_cover_keys_calls_and_properties() {
    let graph = rebuild(
        &session_window_pipeline(DEFAULT_SESSION_GAP_MS, TableMode::Persisted),
        |n| {
            if n.id() == session::WINDOW {
                let short = TypeDescriptor::row([
                    ("b", TypeDescriptor::bigint()),
                    ("cnt", TypeDescriptor::bigint().not_null()),
                ])
                .unwrap();
                PlanNode::new(n.id(), n.attrs().clone(), short)
            } else {
                n
            }
        },
    );
    let err = CompiledPlan::compile(&graph, &CompileOptions::new()).unwrap_err();
    match err {
        PlanError::TypeInconsistency { node, reason, .. } => {
            assert_eq!(node, session::WINDOW);
            assert!(reason.contains("expected 5"), "{reason}");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn persisted_ids_win_over_rederived_ones() {
    let plan = session_plan(TableMode::Persisted);
    let text = edit_document(&plan, |doc| {
        doc["nodes"][5]["stableId"] = Value::from("group-window-aggregate_legacy");
    });
    let options = RestoreOptions::new().with_identity_drift_check(true);
    let restored = CompiledPlan::restore_from_str(&text, &EmptyCatalog, &options).unwrap();
    assert_eq!(
        restored.stable_ids()[&session::WINDOW],
        "group-window-aggregate_legacy"
    );
}

#[test]
fn explain_renders_the_tree_and_the_id_table() {
    let plan = session_plan(TableMode::Persisted);
    let text = plan.explain();
    assert!(text.starts_with(&format!(
        "== Compiled Plan (engine {}) ==\nSink(table=[",
        EngineVersion::CURRENT
    )));
    assert!(text.contains("\n+- GroupWindowAggregate(groupBy=[$0]"));
    assert!(text.contains("\n   +- Exchange(distribution=[hash[0]])\n"));
    assert!(text.contains("\n               +- TableSourceScan(table=["));
    assert!(text.contains("== Stable Ids ==\n[1] table-source-scan: table-source-scan_"));

    let union = compile(&parallel_union(TableMode::Persisted)).explain();
    assert!(union.contains("\n+- Union(all=[true], union=[a, cnt])\n   :- GroupAggregate("));
    assert!(union.contains("\n   :  +- TableSourceScan("));
    assert!(union.contains("\n   +- GroupAggregate("));
    assert!(union.contains("[5] union: (relay)"));
}

#[test]
fn plan_files_are_never_overwritten() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("plan.json");
    let plan = session_plan(TableMode::Persisted);
    plan.write_to_file(&path, false).unwrap();

    let other = compile(&session_window_pipeline(1, TableMode::Persisted));
    let err = other.write_to_file(&path, false).unwrap_err();
    assert_eq!(err.kind(), PlanErrorKind::PlanFileExists);
    other.write_to_file(&path, true).unwrap();

    let restored =
        CompiledPlan::restore_from_file(&path, &EmptyCatalog, &RestoreOptions::new()).unwrap();
    assert_eq!(restored.graph(), plan.graph());
}

#[test]
fn runtime_units_must_use_stable_ids() {
    let plan = session_plan(TableMode::Persisted);
    assert_eq!(plan.translate(&FakeTranslator::new()).unwrap().len(), 7);

    let renamed = FakeTranslator::new().with_uid(session::WINDOW, Some("window-op-7"));
    match plan.translate(&renamed).unwrap_err() {
        PlanError::RuntimeUidMismatch { node, found, .. } => {
            assert_eq!(node, session::WINDOW);
            assert_eq!(found, "window-op-7");
        }
        other => panic!("unexpected error: {other}"),
    }

    let anonymous = FakeTranslator::new().with_uid(session::PARSE, None);
    assert_eq!(
        plan.translate(&anonymous).unwrap_err().kind(),
        PlanErrorKind::MissingStableIdentity
    );
}

#[test]
fn relay_units_are_not_checked() {
    let plan = compile(&parallel_union(TableMode::Persisted));
    let union = plan
        .graph()
        .nodes()
        .iter()
        .find(|n| n.kind() == NodeKind::Union)
        .unwrap()
        .id();
    plan.translate(&FakeTranslator::new().with_uid(union, Some("anything")))
        .unwrap();
}

#[test]
fn function_payloads_reach_the_registry_unchanged() {
    let body = [0x00, 0x9f, 0x92, 0x96, b'\n'];
    let plan = compile(&udf_pipeline(Some(&body[..])));
    let restored = restore(&plan.as_json_string().unwrap(), &EmptyCatalog).unwrap();

    let mut registry = RecordingRegistry::new();
    assert_eq!(bind_functions(restored.graph(), &mut registry).unwrap(), 1);
    let registration = &registry.registered[0];
    assert_eq!(registration.name, "NORMALIZE");
    assert_eq!(registration.payload, body);
    assert_eq!(
        registration.function,
        Some(flowplan_dry_tests::scenarios::udf_id())
    );

    let mut refusing = RecordingRegistry::refusing("class not found");
    let err = bind_functions(restored.graph(), &mut refusing).unwrap_err();
    assert_eq!(err.kind(), PlanErrorKind::FunctionBinding);
    assert!(err.to_string().contains("class not found"));
}

#[test]
fn functions_resolve_under_their_mode() {
    let live = compile(&udf_pipeline(None)).as_json_string().unwrap();
    let err = restore(&live, &fixture_catalog()).unwrap_err();
    assert_eq!(err.kind(), PlanErrorKind::CatalogObjectUnresolved);
    let catalog = fixture_catalog().with_function(flowplan_dry_tests::scenarios::udf_id());
    restore(&live, &catalog).unwrap();

    let persisted = compile(&udf_pipeline(Some(b"body".as_slice())));
    let text = edit_document(&persisted, |doc| {
        doc["nodes"][1]["projection"][0]["operator"]
            .as_object_mut()
            .unwrap()
            .remove("payload");
    });
    let err = restore(&text, &EmptyCatalog).unwrap_err();
    assert!(err.to_string().contains("no payload"), "{err}");
}

#[test]
fn aggregate_functions_resolve_under_their_mode() {
    let plan = session_plan(TableMode::Persisted);
    let with_agg_ref = |reference: CatalogObjectRef| {
        edit_document(&plan, |doc| {
            doc["nodes"][5]["aggregateCalls"][0]["function"]["function"] =
                serde_json::to_value(&reference).unwrap();
        })
    };
    let my_agg = table_id("my_agg");

    let persisted = with_agg_ref(CatalogObjectRef::persisted_function(my_agg.clone()));
    let err = restore(&persisted, &fixture_catalog()).unwrap_err();
    assert_eq!(err.kind(), PlanErrorKind::CatalogObjectUnresolved);
    assert!(err.to_string().contains("persisted function has no payload"), "{err}");
    assert!(err.to_string().starts_with("[CATALOG_OBJECT_UNRESOLVED] node 6"), "{err}");

    let live = with_agg_ref(CatalogObjectRef::live(my_agg.clone()));
    let err = restore(&live, &fixture_catalog()).unwrap_err();
    assert!(err.to_string().contains("not registered"), "{err}");
    restore(&live, &fixture_catalog().with_function(my_agg)).unwrap();
}

#[test]
fn skip_optional_policy_flows_through_restore() {
    let plan = session_plan(TableMode::Persisted);
    let text = edit_document(&plan, |doc| {
        doc["nodes"].as_array_mut().unwrap().push(serde_json::json!({
            "id": 99,
            "kind": "python-calc",
            "optional": true,
            "outputType": {"type": "row", "fields": []}
        }));
    });
    assert_eq!(
        restore(&text, &EmptyCatalog).unwrap_err().kind(),
        PlanErrorKind::UnknownNodeKind
    );
    let options = RestoreOptions::new().with_decode_options(
        DecodeOptions::new().with_unknown_nodes(flowplan_codec::UnknownNodePolicy::SkipOptional),
    );
    let restored = CompiledPlan::restore_from_str(&text, &EmptyCatalog, &options).unwrap();
    assert_eq!(restored.graph(), plan.graph());
}
