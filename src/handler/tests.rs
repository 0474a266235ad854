use super::*;
use crate::common::{Body, Handler, Invocation, Method, Request, Response};
use crate::error::{Error, HttpError};
use crate::registry::{Dependencies, Services};
use crate::worker::WorkerPool;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct TestRequest {
    name: String,
    value: i32,
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct TestResponse {
    message: String,
    value: i32,
}

fn call(req: Request) -> Invocation {
    Invocation::new(req, WorkerPool::new(2))
}

#[tokio::test]
async fn test_fn_handler_returns_structured_value() {
    let handler = handler_fn(|_req, _ctx, _services| async {
        DispatchResult::json(&TestResponse {
            message: "Hello from GET".to_string(),
            value: 42,
        })
    });

    let result = handler
        .handle(call(Request::new(Method::GET, "/test")))
        .await
        .unwrap();

    assert_eq!(result, DispatchResult::Value(json!({"message": "Hello from GET", "value": 42})));
    assert_eq!(result.status(), 200);
}

#[tokio::test]
async fn test_fn_handler_reads_json_body() {
    let handler = handler_fn(|req: Request, _ctx, _services| async move {
        let body: TestRequest = req.json()?;
        Ok::<_, Error>(format!("Hello, {} ({})", body.name, body.value * 2))
    });

    let payload = serde_json::to_vec(&TestRequest {
        name: "Test User".to_string(),
        value: 21,
    })
    .unwrap();
    let req = Request::new(Method::POST, "/users")
        .with_header("Content-Type", "application/json; charset=utf-8")
        .with_body(payload);

    let result = handler.handle(call(req)).await.unwrap();
    assert_eq!(result, DispatchResult::Text("Hello, Test User (42)".to_string()));
}

#[tokio::test]
async fn test_fn_handler_propagates_invalid_body() {
    let handler = handler_fn(|req: Request, _ctx, _services| async move {
        let body: TestRequest = req.json()?;
        Ok::<_, Error>(body.name)
    });

    let req = Request::new(Method::POST, "/users").with_body(b"not json".to_vec());
    let err = handler.handle(call(req)).await.unwrap_err();
    assert!(matches!(err, Error::InvalidRequestBody(_)));
    assert_eq!(err.into_http_error().status, 500);
}

#[tokio::test]
async fn test_fn_handler_sees_context_and_services() {
    let handler = handler_fn(|_req, ctx: crate::common::Context, services: Services| async move {
        let user = ctx.get("user").cloned().unwrap_or_default();
        let greeting = services
            .get::<String>("greeting")
            .map(|g| g.as_str().to_string())
            .unwrap_or_default();
        Ok::<_, Error>(json!({"user": user, "greeting": greeting}))
    });

    let mut call = call(Request::new(Method::GET, "/"))
        .with_context(crate::common::Context::new().with("user", "alice"));
    call.services
        .insert("greeting", Arc::new(String::from("hello")));

    let result = handler.handle(call).await.unwrap();
    assert_eq!(result, DispatchResult::Value(json!({"user": "alice", "greeting": "hello"})));
}

// カスタムヘッダーを返すハンドラー
#[tokio::test]
async fn test_fn_handler_typed_response() {
    let handler = handler_fn(|_req, _ctx, _services| async {
        Response::new(201)
            .with_header("X-Custom-Header", "CustomValue")
            .json(&json!({"created": true}))
    });

    let result = handler
        .handle(call(Request::new(Method::POST, "/items")))
        .await
        .unwrap();

    match result {
        DispatchResult::Response(res) => {
            assert_eq!(res.status, 201);
            assert_eq!(res.header("x-custom-header"), Some("CustomValue"));
            assert_eq!(res.body, Body::Json(json!({"created": true})));
        }
        other => panic!("unexpected result: {:?}", other),
    }
}

#[test]
fn test_depends_on_accumulates_names() {
    let handler = handler_fn(|_req, _ctx, _services| async { Ok::<_, Error>("ok") })
        .depends_on(["db"])
        .depends_on(vec!["cache".to_string()]);

    let deps = handler.dependencies();
    assert!(deps.wants("db"));
    assert!(deps.wants("cache"));
    assert!(!deps.wants("mailer"));

    let all = handler_fn(|_req, _ctx, _services| async { Ok::<_, Error>("ok") })
        .accepts_all_services();
    assert_eq!(all.dependencies(), Dependencies::All);
}

#[test]
fn test_plain_handler_has_no_dependencies() {
    let handler = handler_fn(|_req, _ctx, _services| async { Ok::<_, Error>(Vec::<u8>::new()) });
    assert!(handler.dependencies().is_empty());
}

#[tokio::test]
async fn test_blocking_handler_runs_on_worker_pool() {
    let handler = blocking_fn(|req: Request, _ctx, _services| {
        let n: u64 = req
            .query_params
            .get("n")
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);
        Ok::<_, Error>(format!("sum={}", (1..=n).sum::<u64>()))
    })
    .depends_on(["db"]);

    assert!(handler.dependencies().wants("db"));
    let result = handler
        .handle(call(Request::from_target(Method::GET, "/sum?n=10")))
        .await
        .unwrap();
    assert_eq!(result, DispatchResult::Text("sum=55".to_string()));
}

#[tokio::test]
async fn test_blocking_handler_panic_becomes_error() {
    let handler = blocking_fn(|_req, _ctx, _services| -> Result<String, Error> {
        panic!("worker exploded");
    });

    let err = handler
        .handle(call(Request::new(Method::GET, "/")))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::BlockingTaskFailed(_)));
}

#[tokio::test]
async fn test_boxed_handler_delegates() {
    let handler: Arc<dyn Handler> = handler_fn(|_req, _ctx, _services| async { Ok::<_, Error>("boxed") })
        .depends_on(["db"])
        .boxed();

    assert!(handler.dependencies().wants("db"));
    let result = handler
        .handle(call(Request::new(Method::GET, "/")))
        .await
        .unwrap();
    assert_eq!(result, DispatchResult::Text("boxed".to_string()));
}

#[test]
fn test_into_dispatch_result_variants() {
    assert_eq!("hi".into_dispatch_result(), DispatchResult::Text("hi".to_string()));
    assert_eq!(vec![1u8, 2].into_dispatch_result(), DispatchResult::Bytes(vec![1, 2]));
    assert_eq!(json!(1).into_dispatch_result(), DispatchResult::Value(json!(1)));
    assert_eq!(
        HttpError::new(409, "conflict").into_dispatch_result(),
        DispatchResult::Error(HttpError::new(409, "conflict"))
    );
    assert_eq!(Response::not_found().into_dispatch_result().status(), 404);
}

#[test]
fn test_with_status_wraps_plain_results() {
    let wrapped = DispatchResult::Text("missing".to_string()).with_status(404);
    assert_eq!(wrapped.status(), 404);
    match wrapped {
        DispatchResult::Response(res) => assert_eq!(res.body, Body::Text("missing".to_string())),
        other => panic!("unexpected result: {:?}", other),
    }

    let value = DispatchResult::Value(json!({"a": 1})).with_status(404);
    assert_eq!(value.status(), 404);

    let overridden = DispatchResult::Response(Response::new(200).with_header("X-A", "1")).with_status(404);
    match overridden {
        DispatchResult::Response(res) => {
            assert_eq!(res.status, 404);
            assert_eq!(res.header("x-a"), Some("1"));
        }
        other => panic!("unexpected result: {:?}", other),
    }
}

#[test]
fn test_with_status_keeps_typed_error() {
    let err = DispatchResult::Error(HttpError::new(402, "pay up")).with_status(404);
    assert_eq!(err, DispatchResult::Error(HttpError::new(402, "pay up")));
}
