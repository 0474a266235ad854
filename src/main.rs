use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use log::{error, info};
use serde::{Deserialize, Serialize};
use serde_json::json;

use routebridge::{
    blocking_fn, handler_fn, init_logging, App, Config, Context, Error, HandlerExt, HeaderAuth,
    HttpError, Method, Middleware, QueryKind, QueryParam, QueryValidation, Request,
    RequestLogger, Router, ServiceDef, Services,
};

#[derive(Serialize, Deserialize, Clone)]
struct Item {
    id: String,
    name: String,
    description: Option<String>,
}

/// 呼び出し回数を数えるサービス
#[derive(Default)]
struct VisitCounter {
    visits: AtomicUsize,
}

fn build_app(config: Config) -> Result<App, Error> {
    let mut app = App::with_config(config);
    app.middleware(RequestLogger::new());

    app.inject(ServiceDef::of::<VisitCounter>())?;

    // サンプルのヘルスチェック
    app.get(
        "/",
        handler_fn(|_req, _ctx, services: Services| async move {
            let visits = services
                .get::<VisitCounter>("visitcounter")
                .map(|c| c.visits.fetch_add(1, Ordering::SeqCst) + 1)
                .unwrap_or(0);
            Ok::<_, Error>(json!({
                "status": "ok",
                "version": env!("CARGO_PKG_VERSION"),
                "visits": visits,
            }))
        })
        .depends_on(["visitcounter"]),
    )?;

    // アイテムAPIはサブルーターにまとめる
    let mut items = Router::new();
    let items_id = items.id();
    items
        .get(
            "/",
            app.cached(handler_fn(|_req, _ctx, _services| async {
                let items = vec![
                    Item {
                        id: "1".to_string(),
                        name: "Item 1".to_string(),
                        description: Some("Description for item 1".to_string()),
                    },
                    Item {
                        id: "2".to_string(),
                        name: "Item 2".to_string(),
                        description: None,
                    },
                ];
                routebridge::DispatchResult::json(&json!({ "items": items }))
            })),
        )?
        .get(
            "/:id",
            handler_fn(|req: Request, _ctx, _services| async move {
                match req.path_param("id") {
                    Some("1") => Ok(json!({"id": "1", "name": "Item 1"})),
                    Some(id) => Err(Error::from(HttpError::not_found(format!("item {} not found", id)))),
                    None => Err(Error::InternalServerError("missing id".to_string())),
                }
            }),
        )?
        .post(
            "/",
            handler_fn(|req: Request, ctx: Context, _services| async move {
                let item: Item = req.json()?;
                info!("Creating new item: {} (auth: {:?})", item.name, ctx.get("auth"));
                Ok::<_, Error>(json!(item))
            })
            .with_middleware(vec![
                Arc::new(HeaderAuth::new("x-auth-token", "demo-token")) as Arc<dyn Middleware>,
            ]),
        )?;
    app.mount("/items", items);
    app.inject_into(items_id, ServiceDef::instance(String::from("items-router")).named("router_label"))?;

    // 重い処理はワーカープールで実行
    app.get(
        "/report",
        blocking_fn(|req: Request, ctx: Context, _services| {
            let limit = ctx
                .get("query")
                .and_then(|q| q.get("limit"))
                .and_then(|v| v.as_i64())
                .unwrap_or(10);
            let total: i64 = (1..=limit).sum();
            Ok::<_, Error>(format!("report for {}: {}", req.path, total))
        })
        .with_middleware(vec![Arc::new(QueryValidation::new([
            QueryParam::new("limit", QueryKind::Int).optional(),
        ])) as Arc<dyn Middleware>]),
    )?;

    Ok(app)
}

#[tokio::main]
async fn main() {
    let config = Config::from_env();
    // ロガーの初期化
    if let Err(e) = init_logging(&config) {
        eprintln!("{}", e);
    }

    let app = match build_app(config) {
        Ok(app) => app,
        Err(e) => {
            error!("Failed to build app: {}", e);
            std::process::exit(1);
        }
    };

    info!("Dispatching sample requests");
    let samples = vec![
        Request::new(Method::GET, "/"),
        Request::new(Method::GET, "/items"),
        Request::new(Method::GET, "/items/1"),
        Request::new(Method::GET, "/items/9"),
        Request::new(Method::POST, "/items")
            .with_header("X-Auth-Token", "demo-token")
            .with_body(br#"{"id":"3","name":"Item 3","description":null}"#.to_vec()),
        Request::new(Method::POST, "/items"),
        Request::from_target(Method::GET, "/report?limit=100"),
        Request::from_target(Method::GET, "/report?limit=lots"),
        Request::new(Method::DELETE, "/nowhere"),
    ];

    for req in samples {
        let label = format!("{} {}", req.method, req.path);
        let res = app.handle(req).await;
        println!("{} -> {} {}", label, res.status, res.text());
    }
}
