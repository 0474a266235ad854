//! ディスパッチャー（ルート解決・注入・ミドルウェア・ハンドラー呼び出し）

use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;

use futures::FutureExt;
use log::{debug, error, info, warn};

use crate::cache::{Cached, MemoryCache};
use crate::common::{Body, Context, Handler, Invocation, Method, Middleware, Request, Response};
use crate::config::Config;
use crate::error::{Error, HttpError};
use crate::format::{format_response, RawResponse};
use crate::handler::{DispatchResult, HandlerExt};
use crate::middleware::{panic_message, ChainOutcome, MiddlewareChain, StaticFiles};
use crate::registry::{Registry, Scope, ServiceDef};
use crate::routing::{Router, RouterId};
use crate::worker::WorkerPool;

/// 一致するルートも not-found ハンドラーも無い場合のボディ
pub const NOT_FOUND_BODY: &[u8] = b"Not found";

/// 汎用の404結果
pub fn not_found_result() -> DispatchResult {
    DispatchResult::Response(Response {
        status: 404,
        headers: Vec::new(),
        body: Body::Bytes(NOT_FOUND_BODY.to_vec()),
    })
}

/// アプリケーション本体
pub struct App {
    router: Router,
    registry: Arc<Registry>,
    workers: WorkerPool,
    cache: MemoryCache,
    config: Config,
}

impl App {
    /// 既定の設定でAppを作成
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    /// 環境変数の設定でAppを作成
    pub fn from_env() -> Self {
        Self::with_config(Config::from_env())
    }

    pub fn with_config(config: Config) -> Self {
        info!(
            "Creating app with {} workers and {} default headers",
            config.max_workers,
            config.default_headers.len()
        );
        Self {
            router: Router::new(),
            registry: Arc::new(Registry::new()),
            workers: WorkerPool::new(config.max_workers),
            cache: MemoryCache::new(),
            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// ルートルーター
    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn router_mut(&mut self) -> &mut Router {
        &mut self.router
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// レジストリの共有ハンドル
    pub fn shared_registry(&self) -> Arc<Registry> {
        Arc::clone(&self.registry)
    }

    pub fn workers(&self) -> &WorkerPool {
        &self.workers
    }

    /// Appで共有するレスポンスキャッシュ
    pub fn cache(&self) -> &MemoryCache {
        &self.cache
    }

    /// 設定の既定TTLと共有キャッシュでハンドラーを包む
    pub fn cached<H: Handler + 'static>(&self, handler: H) -> Cached<H> {
        handler.cached(self.cache.clone(), self.config.cache_ttl)
    }

    /// ルートを登録
    pub fn route<H: Handler + 'static>(&mut self, method: Method, template: &str, handler: H) -> Result<&mut Self, Error> {
        self.router.route(method, template, handler)?;
        Ok(self)
    }

    pub fn get<H: Handler + 'static>(&mut self, template: &str, handler: H) -> Result<&mut Self, Error> {
        self.route(Method::GET, template, handler)
    }

    pub fn post<H: Handler + 'static>(&mut self, template: &str, handler: H) -> Result<&mut Self, Error> {
        self.route(Method::POST, template, handler)
    }

    pub fn put<H: Handler + 'static>(&mut self, template: &str, handler: H) -> Result<&mut Self, Error> {
        self.route(Method::PUT, template, handler)
    }

    pub fn delete<H: Handler + 'static>(&mut self, template: &str, handler: H) -> Result<&mut Self, Error> {
        self.route(Method::DELETE, template, handler)
    }

    /// サブルーターをマウント
    pub fn mount(&mut self, prefix: &str, router: Router) -> &mut Self {
        self.router.mount(prefix, router);
        self
    }

    /// ルートルーターにミドルウェアを追加
    pub fn middleware<M: Middleware + 'static>(&mut self, middleware: M) -> &mut Self {
        self.router.middleware(middleware);
        self
    }

    /// 静的ファイル配信をミドルウェアとして追加
    pub fn static_files(&mut self, dir: impl Into<PathBuf>, prefix: &str) -> &mut Self {
        self.middleware(StaticFiles::new(dir, prefix))
    }

    /// 一致しなかったリクエストのハンドラーを設定
    pub fn not_found<H: Handler + 'static>(&mut self, handler: H) -> &mut Self {
        self.router.not_found(handler);
        self
    }

    /// Appスコープにサービスを登録
    pub fn inject(&self, def: ServiceDef) -> Result<String, Error> {
        self.registry.register(Scope::App, def).map(|(_, name)| name)
    }

    /// Appスコープに複数のサービスを登録
    pub fn inject_all<I>(&self, defs: I) -> Result<Vec<String>, Error>
    where
        I: IntoIterator<Item = ServiceDef>,
    {
        self.registry.register_all(Scope::App, defs)
    }

    /// ルータースコープにサービスを登録
    pub fn inject_into(&self, router: RouterId, def: ServiceDef) -> Result<String, Error> {
        self.registry
            .register(Scope::Router(router), def)
            .map(|(_, name)| name)
    }

    /// Funcスコープにサービスを登録してハンドラーを装飾
    pub fn inject_handler<H: Handler + 'static>(&self, def: ServiceDef, handler: H) -> Result<Arc<dyn Handler>, Error> {
        self.registry.inject(def, Arc::new(handler))
    }

    /// リクエストをディスパッチする（エラーは結果として返り、外へは出ない）
    pub async fn dispatch(&self, method: Method, path: &str, mut req: Request) -> DispatchResult {
        debug!("Dispatching {} {}", method, path);

        let found = match self.router.find(method, path) {
            Some(found) => found,
            None => return self.dispatch_unmatched(method, path, req).await,
        };

        req.path_params = found.params;
        let owner = found.router;
        let handler = self
            .registry
            .decorate(found.handler, Scope::Router(owner.id()));
        let handler = self.registry.decorate(handler, Scope::App);

        let chain = MiddlewareChain::new(owner.middleware_list().iter().cloned());
        match chain.run(req, Context::new()).await {
            ChainOutcome::Completed(req, ctx) => self.invoke(handler, req, ctx).await,
            ChainOutcome::ShortCircuited(result) | ChainOutcome::Failed(result) => result,
        }
    }

    async fn dispatch_unmatched(&self, method: Method, path: &str, req: Request) -> DispatchResult {
        let chain = MiddlewareChain::new(self.router.middleware_list().iter().cloned());
        let (req, ctx) = match chain.run(req, Context::new()).await {
            ChainOutcome::Completed(req, ctx) => (req, ctx),
            ChainOutcome::ShortCircuited(result) | ChainOutcome::Failed(result) => return result,
        };

        warn!("No route for {} {}", method, path);
        match self.router.not_found_for(path) {
            Some((handler, owner)) => {
                let handler = self
                    .registry
                    .decorate(Arc::clone(handler), Scope::Router(owner.id()));
                let handler = self.registry.decorate(handler, Scope::App);
                self.invoke(handler, req, ctx).await.with_status(404)
            }
            None => not_found_result(),
        }
    }

    /// ハンドラーを呼び出し、エラーとpanicを型付きHTTPエラーに変換
    async fn invoke(&self, handler: Arc<dyn Handler>, req: Request, ctx: Context) -> DispatchResult {
        let call = Invocation::new(req, self.workers.clone()).with_context(ctx);

        match AssertUnwindSafe(handler.handle(call)).catch_unwind().await {
            Ok(Ok(result)) => result,
            Ok(Err(Error::Http(err))) => {
                debug!("Handler returned HTTP error {}: {}", err.status, err.message);
                DispatchResult::Error(err)
            }
            Ok(Err(err)) => {
                error!("Handler failed: {}", err);
                DispatchResult::Error(err.into_http_error())
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!("Handler panicked: {}", message);
                DispatchResult::Error(HttpError::internal(message))
            }
        }
    }

    /// ディスパッチして既定ヘッダー付きのワイヤ形式に変換する
    pub async fn handle(&self, req: Request) -> RawResponse {
        let method = req.method;
        let path = req.path.clone();
        let result = self.dispatch(method, &path, req).await;
        format_response(result, &self.config.default_headers)
    }
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}
