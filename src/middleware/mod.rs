//! ミドルウェアチェーンの実行
//!
//! ミドルウェアは登録順に一つずつ実行される。各段は続行（部分コンテキストを
//! マージ）か応答（ショートサーキット）を返す。エラーやpanicはその場で500の
//! 結果に変換され、以降の段もハンドラーも実行されない。

pub mod auth;
pub mod logging;
pub mod static_files;
pub mod validation;

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use log::{debug, error, warn};

use crate::common::{Body, Context, Handler, Invocation, Middleware, Next, Request, Response};
use crate::error::Error;
use crate::handler::DispatchResult;
use crate::registry::Dependencies;

pub use auth::HeaderAuth;
pub use logging::RequestLogger;
pub use static_files::StaticFiles;
pub use validation::{QueryKind, QueryParam, QueryValidation};

/// ミドルウェア失敗時のボディの接頭辞
pub const MIDDLEWARE_ERROR_PREFIX: &str = "Internal server error: ";

/// チェーン実行の結果
#[derive(Debug)]
pub enum ChainOutcome {
    /// 全段が続行した（最終リクエストとマージ済みコンテキスト）
    Completed(Request, Context),
    /// いずれかの段が応答を返した
    ShortCircuited(DispatchResult),
    /// いずれかの段が失敗した
    Failed(DispatchResult),
}

impl ChainOutcome {
    /// ハンドラーまで到達しなかった場合の結果
    pub fn into_result(self) -> Option<DispatchResult> {
        match self {
            ChainOutcome::Completed(..) => None,
            ChainOutcome::ShortCircuited(result) | ChainOutcome::Failed(result) => Some(result),
        }
    }
}

/// ミドルウェア失敗を表す500の結果
pub fn failure_result(message: &str) -> DispatchResult {
    DispatchResult::Response(Response {
        status: 500,
        headers: Vec::new(),
        body: Body::Bytes(format!("{}{}", MIDDLEWARE_ERROR_PREFIX, message).into_bytes()),
    })
}

/// panicのペイロードからメッセージを取り出す
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic".to_string()
    }
}

/// 順序付きのミドルウェア列
#[derive(Clone, Default)]
pub struct MiddlewareChain {
    middlewares: Vec<Arc<dyn Middleware>>,
}

impl MiddlewareChain {
    pub fn new<I>(middlewares: I) -> Self
    where
        I: IntoIterator<Item = Arc<dyn Middleware>>,
    {
        Self {
            middlewares: middlewares.into_iter().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.middlewares.len()
    }

    pub fn is_empty(&self) -> bool {
        self.middlewares.is_empty()
    }

    /// 初期コンテキストからチェーンを実行
    pub async fn run(&self, req: Request, ctx: Context) -> ChainOutcome {
        let mut req = req;
        let mut ctx = ctx;

        for (i, middleware) in self.middlewares.iter().enumerate() {
            debug!("Running middleware {} of {} for {}", i + 1, self.middlewares.len(), req.path);

            let step = AssertUnwindSafe(middleware.intercept(req, &ctx))
                .catch_unwind()
                .await;

            match step {
                Ok(Ok(Next::Continue(next_req, partial))) => {
                    ctx.merge(partial);
                    req = next_req;
                }
                Ok(Ok(Next::Respond(result))) => {
                    warn!("Middleware {} short-circuited the chain", i + 1);
                    return ChainOutcome::ShortCircuited(result);
                }
                Ok(Err(err)) => {
                    error!("Middleware {} failed: {}", i + 1, err);
                    return ChainOutcome::Failed(failure_result(&err.to_string()));
                }
                Err(payload) => {
                    let message = panic_message(payload.as_ref());
                    error!("Middleware {} panicked: {}", i + 1, message);
                    return ChainOutcome::Failed(failure_result(&message));
                }
            }
        }

        ChainOutcome::Completed(req, ctx)
    }
}

/// ハンドラー単位のチェーンで包んだハンドラー
pub struct Chained {
    chain: MiddlewareChain,
    inner: Arc<dyn Handler>,
}

impl Chained {
    pub fn new(chain: MiddlewareChain, inner: Arc<dyn Handler>) -> Self {
        Self { chain, inner }
    }
}

#[async_trait]
impl Handler for Chained {
    async fn handle(&self, call: Invocation) -> Result<DispatchResult, Error> {
        let Invocation {
            request,
            context,
            services,
            workers,
        } = call;

        match self.chain.run(request, context).await {
            ChainOutcome::Completed(request, context) => {
                self.inner
                    .handle(Invocation {
                        request,
                        context,
                        services,
                        workers,
                    })
                    .await
            }
            ChainOutcome::ShortCircuited(result) | ChainOutcome::Failed(result) => Ok(result),
        }
    }

    fn dependencies(&self) -> Dependencies {
        self.inner.dependencies()
    }
}
