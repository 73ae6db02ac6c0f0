//! End-to-end dispatcher behaviour over every completion contract.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use dispatch_host::diagnostics::LastRequestRecord;
use dispatch_host::dispatch::error::HandlerPanic;
use dispatch_host::dispatch::{AsyncTaskDispatcher, CompletionCallback, DispatchError, PendingWork, WorkStatus};

mod common;
use common::*;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn sync_handler_completes_through_callback_contract() {
    let handler = RecordingHandler::default();
    let hooks = HookRecorder::default();
    let host = builder(debug_config())
        .uncaught_exception_hook(hooks.hook(false))
        .build()
        .unwrap();
    let dispatcher = AsyncTaskDispatcher::new(host, Arc::new(handler.clone()));

    let ctx = listener_context("/GetFoo");
    let response = ctx.response().clone();
    let callbacks = Arc::new(AtomicUsize::new(0));
    let counter = callbacks.clone();
    let callback: CompletionCallback = Box::new(move |work: &PendingWork| {
        assert!(work.is_completed());
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let work = dispatcher.begin_process_request(ctx, Some(callback)).unwrap();
    assert!(work.join().await.is_ok());
    assert!(dispatcher.end_process_request(&work).is_ok());

    assert_eq!(work.status(), WorkStatus::Completed);
    assert_eq!(callbacks.load(Ordering::SeqCst), 1);
    assert_eq!(handler.calls(), 1);
    assert_eq!(response.end_calls(), 1);
    assert_eq!(response.body(), "GetFoo".as_bytes());
    assert_eq!(hooks.count(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn native_async_handler_is_already_running() {
    let handler = AsyncRecordingHandler::default();
    let host = builder(debug_config()).build().unwrap();
    let dispatcher = AsyncTaskDispatcher::new(host, Arc::new(handler.clone()));

    let ctx = pipeline_context("/GetBar");
    let response = ctx.response().clone();
    let work = dispatcher.process_request_async(ctx);
    assert!(work.is_started());
    assert!(work.join().await.is_ok());
    assert_eq!(handler.calls.load(Ordering::SeqCst), 1);
    assert_eq!(response.body(), "async:GetBar".as_bytes());
    assert_eq!(response.end_calls(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn empty_operation_name_short_circuits() {
    let handler = RecordingHandler::default();
    let host = builder(debug_config()).build().unwrap();
    let previous = LastRequestRecord {
        handler_type: "Earlier".into(),
        operation_name: "Earlier".into(),
        path_info: "/Earlier".into(),
    };
    host.last_request().remember(previous.clone());
    let dispatcher = AsyncTaskDispatcher::new(host.clone(), Arc::new(handler.clone()));

    let ctx = listener_context("/");
    let response = ctx.response().clone();
    let work = dispatcher.process_request_async(ctx);

    assert_eq!(work.status(), WorkStatus::Completed);
    assert!(work.wait().is_ok());
    assert_eq!(handler.calls(), 0);
    assert_eq!(response.end_calls(), 0);
    assert_eq!(host.last_request().get(), Some(previous));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn default_handled_predicate_short_circuits() {
    let handler = RecordingHandler::default();
    let host = builder(debug_config())
        .default_handled(|ctx| ctx.request().path_info.ends_with("/Static"))
        .build()
        .unwrap();
    let dispatcher = AsyncTaskDispatcher::new(host.clone(), Arc::new(handler.clone()));

    let work = dispatcher.process_request_async(listener_context("/files/Static"));
    assert_eq!(work.status(), WorkStatus::Completed);
    assert_eq!(handler.calls(), 0);
    assert!(host.last_request().get().is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn handler_fault_recovered_by_hook() {
    let hooks = HookRecorder::default();
    let host = builder(debug_config())
        .uncaught_exception_hook(hooks.hook(false))
        .build()
        .unwrap();
    let dispatcher = AsyncTaskDispatcher::new(host, Arc::new(FailingHandler));

    let ctx = listener_context("/Explode");
    let response = ctx.response().clone();
    let outcome = tokio::task::spawn_blocking(move || dispatcher.process_request_blocking(ctx))
        .await
        .unwrap();

    assert!(outcome.is_ok());
    assert_eq!(hooks.messages.lock().as_slice(), ["boom".to_string()]);
    assert_eq!(response.end_calls(), 1);
    assert_eq!(response.body(), "partial outputhandled".as_bytes());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn hook_failure_reraises_original_error() {
    let hooks = HookRecorder::default();
    let host = builder(debug_config())
        .uncaught_exception_hook(hooks.hook(true))
        .build()
        .unwrap();
    let dispatcher = AsyncTaskDispatcher::new(host, Arc::new(FailingHandler));

    let ctx = listener_context("/Explode");
    let response = ctx.response().clone();
    let outcome = tokio::task::spawn_blocking(move || dispatcher.process_listener_request(ctx))
        .await
        .unwrap();

    let err = outcome.unwrap_err();
    assert!(matches!(err, DispatchError::Handler(_)));
    assert_eq!(err.downcast_ref::<Boom>().map(|b| b.0.as_str()), Some("boom"));
    assert_eq!(hooks.count(), 1);
    assert_eq!(response.end_calls(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn native_async_fault_recovered_by_hook() {
    let hooks = HookRecorder::default();
    let host = builder(debug_config())
        .uncaught_exception_hook(hooks.hook(false))
        .build()
        .unwrap();
    let dispatcher = AsyncTaskDispatcher::new(host, Arc::new(AsyncFailingHandler));

    let ctx = pipeline_context("/Explode");
    let response = ctx.response().clone();
    let work = dispatcher.process_request_async(ctx);
    assert!(work.is_started());

    assert!(work.join().await.is_ok());
    assert_eq!(hooks.messages.lock().as_slice(), ["boom".to_string()]);
    assert_eq!(response.end_calls(), 1);
    assert_eq!(response.body(), "partial outputhandled".as_bytes());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn native_async_hook_failure_reraises_original_error() {
    let hooks = HookRecorder::default();
    let host = builder(debug_config())
        .uncaught_exception_hook(hooks.hook(true))
        .build()
        .unwrap();
    let dispatcher = AsyncTaskDispatcher::new(host, Arc::new(AsyncFailingHandler));

    let ctx = pipeline_context("/Explode");
    let response = ctx.response().clone();
    let err = dispatcher.process_request_async(ctx).join().await.unwrap_err();

    assert!(matches!(err, DispatchError::Handler(_)));
    assert_eq!(err.downcast_ref::<Boom>().map(|b| b.0.as_str()), Some("boom"));
    assert_eq!(hooks.count(), 1);
    assert_eq!(response.end_calls(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn native_async_panic_takes_the_fault_path() {
    let hooks = HookRecorder::default();
    let host = builder(debug_config())
        .uncaught_exception_hook(hooks.hook(true))
        .build()
        .unwrap();
    let dispatcher = AsyncTaskDispatcher::new(host, Arc::new(AsyncPanickingHandler));

    let ctx = listener_context("/Explode");
    let response = ctx.response().clone();
    let err = dispatcher.process_request_async(ctx).join().await.unwrap_err();

    assert_eq!(
        err.downcast_ref::<HandlerPanic>().map(|p| p.message.as_str()),
        Some("async handler exploded")
    );
    assert_eq!(hooks.count(), 1);
    assert_eq!(response.end_calls(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn default_hook_writes_error_document() {
    let host = builder(debug_config()).build().unwrap();
    let dispatcher = AsyncTaskDispatcher::new(host, Arc::new(FailingHandler));

    let ctx = listener_context("/Explode");
    let response = ctx.response().clone();
    let work = dispatcher.process_request_async(ctx);
    work.start(&tokio::runtime::Handle::current());
    assert!(work.join().await.is_ok());

    assert_eq!(response.status(), axum::http::StatusCode::INTERNAL_SERVER_ERROR);
    let json: serde_json::Value = serde_json::from_slice(&response.body()).unwrap();
    assert_eq!(json["ResponseStatus"]["Message"], "boom");
    assert_eq!(json["ResponseStatus"]["ErrorCode"], "InternalServerError");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn panics_take_the_fault_path() {
    let hooks = HookRecorder::default();
    let host = builder(debug_config())
        .uncaught_exception_hook(hooks.hook(true))
        .build()
        .unwrap();
    let dispatcher = AsyncTaskDispatcher::new(host, Arc::new(PanickingHandler));

    let ctx = listener_context("/Explode");
    let response = ctx.response().clone();
    let outcome = tokio::task::spawn_blocking(move || dispatcher.process_request_blocking(ctx))
        .await
        .unwrap();

    let err = outcome.unwrap_err();
    assert_eq!(
        err.downcast_ref::<HandlerPanic>().map(|p| p.message.as_str()),
        Some("handler exploded")
    );
    assert_eq!(hooks.count(), 1);
    assert_eq!(response.end_calls(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn last_request_reflects_latest_write() {
    let host = builder(debug_config()).build().unwrap();
    let dispatcher = AsyncTaskDispatcher::new(host.clone(), Arc::new(RecordingHandler::default()));

    let first = dispatcher.clone();
    tokio::task::spawn_blocking(move || first.process_request_blocking(listener_context("/A")))
        .await
        .unwrap()
        .unwrap();
    let second = dispatcher.clone();
    tokio::task::spawn_blocking(move || second.process_request_blocking(listener_context("/B")))
        .await
        .unwrap()
        .unwrap();

    let record = host.last_request().get().unwrap();
    assert_eq!(record.operation_name, "B");
    assert_eq!(record.path_info, "/B");
    assert_eq!(record.handler_type, "RecordingHandler");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_dispatches_keep_one_record() {
    let host = builder(debug_config()).build().unwrap();
    let dispatcher = AsyncTaskDispatcher::new(host.clone(), Arc::new(RecordingHandler::default()));

    let mut tasks = Vec::new();
    for i in 0..32 {
        let dispatcher = dispatcher.clone();
        tasks.push(tokio::task::spawn_blocking(move || {
            dispatcher.process_request_blocking(listener_context(&format!("/Op{i}")))
        }));
    }
    for task in tasks {
        assert!(task.await.unwrap().is_ok());
    }

    let record = host.last_request().get().unwrap();
    assert!(record.operation_name.starts_with("Op"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn debug_mode_off_leaves_record_untouched() {
    let host = builder(Default::default()).build().unwrap();
    let dispatcher = AsyncTaskDispatcher::new(host.clone(), Arc::new(RecordingHandler::default()));
    tokio::task::spawn_blocking(move || dispatcher.process_request_blocking(listener_context("/A")))
        .await
        .unwrap()
        .unwrap();
    assert!(host.last_request().get().is_none());
}
