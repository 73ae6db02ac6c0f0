//! Diagnostic snapshot contents under each host.

use std::sync::Arc;

use dispatch_host::diagnostics::{DiagnosticSnapshot, LastRequestRecord, RequestInfoHandler, SnapshotAssembler};
use dispatch_host::dispatch::AsyncTaskDispatcher;
use dispatch_host::host::RegistryKind;

mod common;
use common::*;

#[tokio::test]
async fn listener_snapshot_omits_pipeline_fields() {
    let host = builder(debug_config())
        .handler("GetFoo", RecordingHandler::default())
        .build()
        .unwrap();
    let ctx = listener_context("/requestinfo?verbose=1");

    let snapshot = SnapshotAssembler::new(&host).assemble(ctx.request(), ctx.response());
    let json = serde_json::to_value(&snapshot).unwrap();

    for absent in [
        "GetLeftPath",
        "Path",
        "ApplicationPath",
        "ApplicationVirtualPath",
        "VirtualAbsolutePathRoot",
        "VirtualAppRelativePathRoot",
    ] {
        assert!(json.get(absent).is_none(), "{absent} should be absent");
    }
    assert!(snapshot.host.starts_with("hyper-listener_v"));
    assert!(snapshot.host.ends_with("_dispatch-host"));
    assert_eq!(snapshot.debug_string, "");
    assert_eq!(snapshot.stats.len(), RegistryKind::ALL.len() + 1);
    assert_eq!(snapshot.stats["RequestTypes"], "1");
    assert_eq!(snapshot.stats["ResponseTypes"], "1");
    assert_eq!(snapshot.stats["ContentTypes"], "2");
    assert_eq!(snapshot.stats["RawHttpHandlers"], "0");
    assert_eq!(snapshot.operation_names, vec!["GetFoo"]);
    assert_eq!(snapshot.all_operation_names, vec!["GetFoo", "RequestInfoHandler"]);
    assert_eq!(snapshot.request_response_map["GetFoo"], "GetFooResponse");
    assert_eq!(snapshot.url, "http://localhost/requestinfo?verbose=1");
    assert_eq!(snapshot.get_path_url, "http://localhost/requestinfo");
    assert_eq!(snapshot.application_base_url, "http://localhost/");
    assert!(snapshot.error_code.is_none());
    assert_eq!(snapshot.query_string["verbose"], "1");
}

#[tokio::test]
async fn pipeline_snapshot_reports_virtual_roots() {
    let host = builder(debug_config()).build().unwrap();
    let ctx = pipeline_context("/requestinfo");

    let snapshot = SnapshotAssembler::new(&host).assemble(ctx.request(), ctx.response());
    assert!(snapshot.host.starts_with("axum-pipeline_v"));
    assert_eq!(snapshot.get_left_path.as_deref(), Some("http://localhost"));
    assert_eq!(snapshot.virtual_absolute_path_root.as_deref(), Some("/"));
    assert_eq!(snapshot.virtual_app_relative_path_root.as_deref(), Some("~/"));
    assert_eq!(snapshot.resolve_absolute_url, "http://localhost/resolve");
    assert!(!snapshot.debug_string.is_empty());
}

#[tokio::test]
async fn configured_environment_overrides_host_name() {
    let mut config = debug_config();
    config.host_environment = Some("staging".into());
    config.service_name = "orders".into();
    let host = builder(config).build().unwrap();
    let ctx = listener_context("/requestinfo");

    let snapshot = SnapshotAssembler::new(&host).assemble(ctx.request(), ctx.response());
    assert_eq!(
        snapshot.host,
        format!("staging_v{}_orders", env!("CARGO_PKG_VERSION"))
    );
}

#[tokio::test]
async fn snapshot_round_trips_stats_and_startup_errors() {
    let host = builder(debug_config()).build().unwrap();
    host.record_startup_error("PluginLoadFailed", "plugin x missing");
    host.registries().register(RegistryKind::GlobalRequestFilters, "auth");
    let ctx = listener_context("/requestinfo");

    let snapshot = SnapshotAssembler::new(&host).assemble(ctx.request(), ctx.response());
    let json = serde_json::to_string(&snapshot).unwrap();
    let parsed: DiagnosticSnapshot = serde_json::from_str(&json).unwrap();

    assert_eq!(parsed.stats, snapshot.stats);
    assert_eq!(parsed.stats["GlobalRequestFilters"], "1");
    assert_eq!(parsed.stats["EnableFeatures"], "json, metadata");
    assert_eq!(parsed.start_up_errors.len(), 1);
    assert_eq!(parsed.start_up_errors[0].error_code, "PluginLoadFailed");
    assert_eq!(parsed.start_up_errors[0].message, "plugin x missing");
    assert_eq!(parsed.enable_features, vec!["json", "metadata"]);
    assert_eq!(parsed.plugins_loaded, vec!["json", "metadata"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn snapshot_reports_latest_dispatch() {
    let host = builder(debug_config()).build().unwrap();
    let dispatcher = AsyncTaskDispatcher::new(host.clone(), Arc::new(RecordingHandler::default()));
    for path in ["/A", "/B"] {
        let dispatcher = dispatcher.clone();
        tokio::task::spawn_blocking(move || dispatcher.process_request_blocking(listener_context(path)))
            .await
            .unwrap()
            .unwrap();
    }

    let ctx = listener_context("/requestinfo");
    let snapshot = SnapshotAssembler::new(&host).assemble(ctx.request(), ctx.response());
    assert_eq!(
        snapshot.last_request_info,
        Some(LastRequestRecord {
            handler_type: "RecordingHandler".into(),
            operation_name: "B".into(),
            path_info: "/B".into(),
        })
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn requestinfo_call_overwrites_last_request() {
    let host = builder(debug_config()).build().unwrap();
    let recording = AsyncTaskDispatcher::new(host.clone(), Arc::new(RecordingHandler::default()));
    tokio::task::spawn_blocking(move || recording.process_request_blocking(listener_context("/A")))
        .await
        .unwrap()
        .unwrap();

    let diagnostic = AsyncTaskDispatcher::new(host.clone(), Arc::new(RequestInfoHandler::new(host.clone())));
    let ctx = listener_context("/requestinfo");
    let response = ctx.response().clone();
    tokio::task::spawn_blocking(move || diagnostic.process_request_blocking(ctx))
        .await
        .unwrap()
        .unwrap();

    let expected = LastRequestRecord {
        handler_type: "RequestInfoHandler".into(),
        operation_name: "RequestInfoHandler".into(),
        path_info: "/requestinfo".into(),
    };
    assert_eq!(host.last_request().get(), Some(expected.clone()));
    let written: DiagnosticSnapshot = serde_json::from_slice(&response.body()).unwrap();
    assert_eq!(written.last_request_info, Some(expected));
}
