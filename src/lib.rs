//! RouteBridge: HTTP形式のリクエストを処理するディスパッチパイプライン
//!
//! ルート照合・サブルーター・ミドルウェアチェーン・スコープ付き依存性注入を
//! 組み合わせ、ハンドラーの戻り値をワイヤ形式のレスポンスに変換する。
//! ネットワークのリスナーは持たず、トランスポート側から [`App::handle`] を呼び出す。

pub mod cache;
pub mod common;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod format;
pub mod handler;
pub mod middleware;
pub mod registry;
pub mod routing;
pub mod worker;

use env_logger::Env;

pub use cache::{Cached, MemoryCache};
pub use common::{Body, Context, Handler, Invocation, Method, Middleware, Next, Request, Response};
pub use config::Config;
pub use dispatcher::App;
pub use error::{Error, HttpError};
pub use format::{format_error, format_response, RawResponse};
pub use handler::{blocking_fn, handler_fn, BlockingHandler, DispatchResult, FnHandler, HandlerExt, IntoDispatchResult};
pub use middleware::{ChainOutcome, HeaderAuth, MiddlewareChain, QueryKind, QueryParam, QueryValidation, RequestLogger, StaticFiles};
pub use registry::{Dependencies, Registry, Scope, ServiceDef, ServiceDeps, Services};
pub use routing::{PathPattern, Router, RouterId};
pub use worker::WorkerPool;

/// env_loggerを初期化（`RUST_LOG` が無ければ設定のフィルターを使う）
pub fn init_logging(config: &Config) -> Result<(), Error> {
    env_logger::Builder::from_env(Env::default().default_filter_or(config.log_level.as_str()))
        .target(env_logger::Target::Stderr)
        .try_init()
        .map_err(|e| Error::ConfigurationError(format!("failed to initialise logger: {}", e)))
}
