use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::cache::{Cached, MemoryCache};
use crate::common::{Context, Handler, Middleware, Request};
use crate::error::Error;
use crate::middleware::{Chained, MiddlewareChain};
use crate::registry::Services;

use super::core::{BlockingHandler, FnHandler};
use super::response::IntoDispatchResult;

/// 非同期クロージャーからハンドラーを作成
pub fn handler_fn<F, Fut, R>(handler: F) -> FnHandler<F, Fut, R>
where
    F: Fn(Request, Context, Services) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, Error>> + Send + 'static,
    R: IntoDispatchResult + Send + 'static,
{
    FnHandler::new(handler)
}

/// ワーカープールで実行される同期ハンドラーを作成
pub fn blocking_fn<F, R>(handler: F) -> BlockingHandler<F, R>
where
    F: Fn(Request, Context, Services) -> Result<R, Error> + Send + Sync + 'static,
    R: IntoDispatchResult + Send + 'static,
{
    BlockingHandler::new(handler)
}

/// ハンドラーを登録時に装飾するための拡張トレイト
pub trait HandlerExt: Handler + Sized + 'static {
    /// ハンドラー単位のミドルウェアチェーンで包む
    fn with_middleware<I>(self, middlewares: I) -> Chained
    where
        I: IntoIterator<Item = Arc<dyn Middleware>>,
    {
        Chained::new(MiddlewareChain::new(middlewares), Arc::new(self))
    }

    /// 成功した結果をキャッシュする
    fn cached(self, cache: MemoryCache, ttl: Duration) -> Cached<Self> {
        Cached::new(self, cache, ttl)
    }

    /// 共有可能なトレイトオブジェクトに変換
    fn boxed(self) -> Arc<dyn Handler> {
        Arc::new(self)
    }
}

impl<H: Handler + 'static> HandlerExt for H {}
