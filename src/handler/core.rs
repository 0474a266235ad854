use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use log::debug;

use crate::common::{Context, Handler, Invocation, Request};
use crate::error::Error;
use crate::registry::{Dependencies, Services};

use super::response::{DispatchResult, IntoDispatchResult};

/// 非同期クロージャーによるハンドラー
pub struct FnHandler<F, Fut, R> {
    /// ハンドラー関数
    pub handler_fn: F,
    /// 注入を要求するサービス
    pub dependencies: Dependencies,
    _marker: PhantomData<fn() -> (Fut, R)>,
}

impl<F, Fut, R> FnHandler<F, Fut, R>
where
    F: Fn(Request, Context, Services) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, Error>> + Send + 'static,
    R: IntoDispatchResult + Send + 'static,
{
    /// 新しいFnHandlerを作成
    pub fn new(handler_fn: F) -> Self {
        Self {
            handler_fn,
            dependencies: Dependencies::None,
            _marker: PhantomData,
        }
    }

    /// 指定した名前のサービスを要求する
    pub fn depends_on<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies = self.dependencies.and(Dependencies::named(names));
        self
    }

    /// スコープ内の全サービスを受け取る
    pub fn accepts_all_services(mut self) -> Self {
        self.dependencies = Dependencies::All;
        self
    }
}

#[async_trait]
impl<F, Fut, R> Handler for FnHandler<F, Fut, R>
where
    F: Fn(Request, Context, Services) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, Error>> + Send + 'static,
    R: IntoDispatchResult + Send + 'static,
{
    async fn handle(&self, call: Invocation) -> Result<DispatchResult, Error> {
        let Invocation {
            request,
            context,
            services,
            ..
        } = call;
        let result = (self.handler_fn)(request, context, services).await?;
        Ok(result.into_dispatch_result())
    }

    fn dependencies(&self) -> Dependencies {
        self.dependencies.clone()
    }
}

/// ワーカープール上で実行される同期ハンドラー
pub struct BlockingHandler<F, R> {
    /// ハンドラー関数（ワーカースレッドへ渡すため共有）
    pub handler_fn: Arc<F>,
    /// 注入を要求するサービス
    pub dependencies: Dependencies,
    _marker: PhantomData<fn() -> R>,
}

impl<F, R> BlockingHandler<F, R>
where
    F: Fn(Request, Context, Services) -> Result<R, Error> + Send + Sync + 'static,
    R: IntoDispatchResult + Send + 'static,
{
    /// 新しいBlockingHandlerを作成
    pub fn new(handler_fn: F) -> Self {
        Self {
            handler_fn: Arc::new(handler_fn),
            dependencies: Dependencies::None,
            _marker: PhantomData,
        }
    }

    /// 指定した名前のサービスを要求する
    pub fn depends_on<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies = self.dependencies.and(Dependencies::named(names));
        self
    }

    /// スコープ内の全サービスを受け取る
    pub fn accepts_all_services(mut self) -> Self {
        self.dependencies = Dependencies::All;
        self
    }
}

#[async_trait]
impl<F, R> Handler for BlockingHandler<F, R>
where
    F: Fn(Request, Context, Services) -> Result<R, Error> + Send + Sync + 'static,
    R: IntoDispatchResult + Send + 'static,
{
    async fn handle(&self, call: Invocation) -> Result<DispatchResult, Error> {
        let Invocation {
            request,
            context,
            services,
            workers,
        } = call;
        let handler_fn = Arc::clone(&self.handler_fn);

        debug!(
            "Offloading {} {} to worker pool",
            request.method, request.path
        );
        let result = workers
            .run(move || handler_fn(request, context, services))
            .await??;
        Ok(result.into_dispatch_result())
    }

    fn dependencies(&self) -> Dependencies {
        self.dependencies.clone()
    }
}

/// 共有ハンドラーへの委譲
#[async_trait]
impl<H> Handler for Arc<H>
where
    H: Handler + ?Sized,
{
    async fn handle(&self, call: Invocation) -> Result<DispatchResult, Error> {
        (**self).handle(call).await
    }

    fn dependencies(&self) -> Dependencies {
        (**self).dependencies()
    }
}
