//! コアトレイト定義（Handler、Middleware）

use async_trait::async_trait;

use super::context::Context;
use super::http::Request;
use crate::error::Error;
use crate::handler::DispatchResult;
use crate::registry::{Dependencies, Services};
use crate::worker::WorkerPool;

/// ハンドラー呼び出し時の入力一式
#[derive(Debug, Clone)]
pub struct Invocation {
    /// ミドルウェア通過後のリクエスト
    pub request: Request,
    /// ミドルウェアが蓄積したコンテキスト
    pub context: Context,
    /// 注入済みサービス
    pub services: Services,
    /// ブロッキング処理用ワーカープール
    pub workers: WorkerPool,
}

impl Invocation {
    /// 新しいInvocationを作成（コンテキスト・サービスは空）
    pub fn new(request: Request, workers: WorkerPool) -> Self {
        Self {
            request,
            context: Context::new(),
            services: Services::default(),
            workers,
        }
    }

    pub fn with_context(mut self, context: Context) -> Self {
        self.context = context;
        self
    }
}

/// ハンドラーの特性
#[async_trait]
pub trait Handler: Send + Sync {
    /// リクエストを処理
    async fn handle(&self, call: Invocation) -> Result<DispatchResult, Error>;

    /// 注入を要求するサービス名
    fn dependencies(&self) -> Dependencies {
        Dependencies::None
    }
}

/// ミドルウェアの戻り値
#[derive(Debug)]
pub enum Next {
    /// 次のミドルウェアへ進む（部分コンテキストはマージされる）
    Continue(Request, Context),
    /// ハンドラーを呼ばずにこの結果を返す
    Respond(DispatchResult),
}

impl Next {
    /// コンテキストを追加せずに次へ進む
    pub fn proceed(req: Request) -> Self {
        Next::Continue(req, Context::new())
    }
}

/// ミドルウェアの特性
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Middleware: Send + Sync {
    /// リクエストを検査し、続行するか応答を返すかを決める
    async fn intercept(&self, req: Request, ctx: &Context) -> Result<Next, Error>;
}
