//! End-to-end dispatch tests for scoped interceptor routing.

use grpcmw_core::{
    stream_fn, stream_handler_fn, unary_fn, unary_handler_fn, ChannelStream, Code, Level,
    MessageStream, NamedRegistry, Router, Status, StreamCall, StreamHandler, StreamInterceptor,
    UnaryCall, UnaryHandler, UnaryInterceptor, UnaryNext,
};
use parking_lot::Mutex;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

type Log = Arc<Mutex<Vec<String>>>;

fn recording(label: &'static str, log: &Log) -> Arc<dyn UnaryInterceptor> {
    let log = log.clone();
    unary_fn(move |call, next| {
        let log = log.clone();
        async move {
            log.lock().push(label.to_string());
            let result = next.run(call).await;
            log.lock().push(label.to_string());
            result
        }
    })
}

fn recording_stream(label: &'static str, log: &Log) -> Arc<dyn StreamInterceptor> {
    let log = log.clone();
    stream_fn(move |call, next| {
        let log = log.clone();
        async move {
            log.lock().push(label.to_string());
            let result = next.run(call).await;
            log.lock().push(label.to_string());
            result
        }
    })
}

fn handler(log: &Log) -> Arc<dyn UnaryHandler> {
    let log = log.clone();
    unary_handler_fn(move |call: UnaryCall| {
        let log = log.clone();
        async move {
            log.lock().push("handler".to_string());
            Ok::<_, Status>(call.request)
        }
    })
}

fn stream_handler(log: &Log) -> Arc<dyn StreamHandler> {
    let log = log.clone();
    stream_handler_fn(move |mut call: StreamCall| {
        let log = log.clone();
        async move {
            log.lock().push("handler".to_string());
            while let Some(message) = call.stream.recv().await? {
                call.stream.send(message).await?;
            }
            Ok::<_, Status>(())
        }
    })
}

fn take(log: &Log) -> Vec<String> {
    std::mem::take(&mut *log.lock())
}

fn scoped_router(log: &Log) -> Router {
    let router = Router::server();
    router.global().unary().push(recording("G", log));
    router.add_unary_interceptor("/pkg", [recording("P", log)]).unwrap();
    router.add_unary_interceptor("/pkg.Svc", [recording("S", log)]).unwrap();
    router
        .add_unary_interceptor("/pkg.Svc/Method", [recording("M", log)])
        .unwrap();
    router
}

#[tokio::test]
async fn test_scopes_nest_global_to_method() {
    let log = Log::default();
    let router = scoped_router(&log);

    let response = router
        .handle_unary(UnaryCall::new("/pkg.Svc/Method", json!({"id": 1})), handler(&log))
        .await
        .unwrap();
    assert_eq!(response, json!({"id": 1}));
    assert_eq!(
        take(&log),
        vec!["G", "P", "S", "M", "handler", "M", "S", "P", "G"]
    );

    router
        .handle_unary(UnaryCall::new("/pkg.Svc/Other", json!(null)), handler(&log))
        .await
        .unwrap();
    assert_eq!(take(&log), vec!["G", "P", "S", "handler", "S", "P", "G"]);
}

#[tokio::test]
async fn test_registration_order_does_not_matter() {
    let log = Log::default();
    let router = Router::server();
    router
        .add_unary_interceptor("/pkg.Svc/Method", [recording("M", &log)])
        .unwrap();
    router.add_unary_interceptor("/pkg.Svc", [recording("S", &log)]).unwrap();
    router.add_unary_interceptor("/pkg", [recording("P", &log)]).unwrap();
    router.global().unary().push(recording("G", &log));

    router
        .handle_unary(UnaryCall::new("/pkg.Svc/Method", json!(null)), handler(&log))
        .await
        .unwrap();
    assert_eq!(
        take(&log),
        vec!["G", "P", "S", "M", "handler", "M", "S", "P", "G"]
    );
}

#[tokio::test]
async fn test_disjoint_routes_are_not_invoked() {
    let log = Log::default();
    let router = scoped_router(&log);

    router
        .handle_unary(UnaryCall::new("/other.Svc/Method", json!(null)), handler(&log))
        .await
        .unwrap();
    assert_eq!(take(&log), vec!["G", "handler", "G"]);

    router
        .handle_unary(UnaryCall::new("/pkg.Other/Method", json!(null)), handler(&log))
        .await
        .unwrap();
    assert_eq!(take(&log), vec!["G", "P", "handler", "P", "G"]);
}

#[tokio::test]
async fn test_sibling_isolation() {
    let log = Log::default();
    let router = Router::server();
    router
        .add_unary_interceptor("/pkg.Svc/Method", [recording("M", &log)])
        .unwrap();
    router
        .add_unary_interceptor("/pkg.Svc/Other", [recording("O", &log)])
        .unwrap();

    let method = router.lookup("/pkg.Svc/Method").unwrap().unwrap();
    assert_eq!(method.unary().len(), 1);

    router
        .handle_unary(UnaryCall::new("/pkg.Svc/Method", json!(null)), handler(&log))
        .await
        .unwrap();
    assert_eq!(take(&log), vec!["M", "handler", "M"]);
}

#[tokio::test]
async fn test_resolved_interceptor_sees_later_registrations() {
    let log = Log::default();
    let router = Router::server();
    let installed = router.resolved_unary_interceptor();

    router
        .add_unary_interceptor("/pkg.Svc/Method", [recording("M", &log)])
        .unwrap();

    installed
        .intercept(
            UnaryCall::new("/pkg.Svc/Method", json!(null)),
            UnaryNext::new(handler(&log)),
        )
        .await
        .unwrap();
    assert_eq!(take(&log), vec!["M", "handler", "M"]);
}

#[tokio::test]
async fn test_stream_scopes_nest_global_to_method() {
    let log = Log::default();
    let router = Router::server();
    router.global().stream().push(recording_stream("G", &log));
    router
        .add_stream_interceptor("/pkg", [recording_stream("P", &log)])
        .unwrap();
    router
        .add_stream_interceptor("/pkg.Svc", [recording_stream("S", &log)])
        .unwrap();
    router
        .add_stream_interceptor("/pkg.Svc/Chat", [recording_stream("M", &log)])
        .unwrap();
    // Unary registrations never run for streams.
    router
        .add_unary_interceptor("/pkg.Svc/Chat", [recording("U", &log)])
        .unwrap();

    let (server_end, mut client_end) = ChannelStream::pair(8);
    client_end.send(json!("one")).await.unwrap();
    client_end.send(json!("two")).await.unwrap();
    let (mut inbound, outbound) = client_end.into_parts();
    drop(outbound);

    router
        .handle_stream(StreamCall::new("/pkg.Svc/Chat", server_end), stream_handler(&log))
        .await
        .unwrap();

    assert_eq!(inbound.recv().await, Some(json!("one")));
    assert_eq!(inbound.recv().await, Some(json!("two")));
    assert_eq!(
        take(&log),
        vec!["G", "P", "S", "M", "handler", "M", "S", "P", "G"]
    );
}

#[tokio::test]
async fn test_unparsable_method_is_internal() {
    let log = Log::default();
    let router = scoped_router(&log);

    for method in ["pkg.Svc/Method", "/pkg.Svc/", "/Svc/Method"] {
        let err = router
            .handle_unary(UnaryCall::new(method, json!(null)), handler(&log))
            .await
            .unwrap_err();
        assert_eq!(err.code(), Code::Internal, "{method}");
    }
    assert!(take(&log).is_empty());
}

#[tokio::test]
async fn test_structural_mismatch_is_internal() {
    let log = Log::default();
    let router = Router::server();
    router.global().unary().push(recording("G", &log));
    if let Some(children) = router.global().as_register() {
        children.register(Level::leaf("pkg"));
    }

    let err = router
        .handle_unary(UnaryCall::new("/pkg.Svc/Method", json!(null)), handler(&log))
        .await
        .unwrap_err();
    assert_eq!(err.code(), Code::Internal);
    assert!(err.message().contains("not a register"));
    assert!(take(&log).is_empty());

    let (server_end, _client_end) = ChannelStream::pair(1);
    let err = router
        .handle_stream(StreamCall::new("/pkg.Svc/Chat", server_end), stream_handler(&log))
        .await
        .unwrap_err();
    assert_eq!(err.code(), Code::Internal);
}

#[tokio::test]
async fn test_named_bundles_merge_in_order() {
    let log = Log::default();
    let registry = NamedRegistry::new();
    registry.get("audit").unary().push(recording("audit", &log));
    registry.get("auth").unary().push(recording("auth", &log));

    let router = Router::server();
    router
        .add_unary_interceptor("/pkg.Svc", [recording("S", &log)])
        .unwrap();
    router
        .merge_tags("/pkg.Svc", &registry, ["auth", "audit"])
        .unwrap();
    router
        .merge_tags("/pkg.Svc/Method", &registry, ["audit"])
        .unwrap();

    router
        .handle_unary(UnaryCall::new("/pkg.Svc/Method", json!(null)), handler(&log))
        .await
        .unwrap();
    assert_eq!(
        take(&log),
        vec!["S", "auth", "audit", "audit", "handler", "audit", "audit", "auth", "S"]
    );

    // Later changes to a bundle do not reach routes it was merged into.
    registry.get("audit").unary().push(recording("late", &log));
    assert_eq!(router.unary_chain_for("/pkg.Svc/Method").unwrap().len(), 4);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_registration_and_dispatch() {
    const ROUTES: usize = 1_000;
    const THREADS: usize = 8;

    let router = Router::server();
    let counters: Arc<Vec<AtomicUsize>> =
        Arc::new((0..ROUTES).map(|_| AtomicUsize::new(0)).collect());
    let route = |i: usize| format!("/pkg{}.Svc{}/Method{}", i % 10, i % 7, i);

    let registrations: Vec<_> = (0..THREADS)
        .map(|thread| {
            let router = router.clone();
            let counters = counters.clone();
            std::thread::spawn(move || {
                for i in (thread..ROUTES).step_by(THREADS) {
                    let counters = counters.clone();
                    let counter = unary_fn(move |call, next| {
                        counters[i].fetch_add(1, Ordering::SeqCst);
                        next.run(call)
                    });
                    router.add_unary_interceptor(&route(i), [counter]).unwrap();
                }
            })
        })
        .collect();
    for registration in registrations {
        registration.join().unwrap();
    }

    for i in 0..ROUTES {
        assert!(router.lookup(&route(i)).unwrap().is_some(), "route {i} lost");
    }

    let echo: Arc<dyn UnaryHandler> =
        unary_handler_fn(|call: UnaryCall| async move { Ok::<_, Status>(call.request) });
    let calls = (0..ROUTES).map(|i| {
        let router = router.clone();
        let echo = echo.clone();
        let method = route(i);
        tokio::spawn(async move {
            router
                .handle_unary(UnaryCall::new(method, json!(i)), echo)
                .await
        })
    });
    let responses = futures::future::join_all(calls).await;

    for (i, response) in responses.into_iter().enumerate() {
        assert_eq!(response.unwrap().unwrap(), json!(i));
    }
    for (i, counter) in counters.iter().enumerate() {
        assert_eq!(counter.load(Ordering::SeqCst), 1, "interceptor for route {i}");
    }
}
