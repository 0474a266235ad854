//! エラー型の定義

use thiserror::Error;

/// ハンドラーが明示的に返すHTTPエラー（ステータスを保持したまま伝搬される）
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct HttpError {
    /// HTTPステータスコード
    pub status: u16,
    /// エラーメッセージ（レスポンスボディになる）
    pub message: String,
}

impl HttpError {
    /// 新しいHttpErrorを作成
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// 500 Internal Server Error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(500, message)
    }

    /// 401 Unauthorized
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(401, message)
    }

    /// 404 Not Found
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(404, message)
    }
}

/// アプリケーションのエラー型
#[derive(Error, Debug)]
pub enum Error {
    /// ハンドラーが宣言したHTTPエラー
    #[error(transparent)]
    Http(#[from] HttpError),

    /// ルートテンプレートが不正
    #[error("Invalid route pattern: {0}")]
    InvalidRoutePattern(String),

    /// サービスの依存関係が未登録
    #[error("Service '{service}' requires '{dependency}', which is not registered in this scope")]
    MissingDependency { service: String, dependency: String },

    /// 無効なリクエストボディ
    #[error("Invalid request body: {0}")]
    InvalidRequestBody(String),

    /// レスポンスのシリアライズエラー
    #[error("Failed to serialize response: {0}")]
    ResponseSerializationError(String),

    /// ミドルウェアエラー
    #[error("{0}")]
    MiddlewareError(String),

    /// 内部サーバーエラー
    #[error("{0}")]
    InternalServerError(String),

    /// ワーカープールでの実行失敗
    #[error("Blocking task failed: {0}")]
    BlockingTaskFailed(String),

    /// 設定エラー
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
}

impl Error {
    /// ハンドラー境界で型付きHTTPエラーへ変換する（HttpError以外は500）
    pub fn into_http_error(self) -> HttpError {
        match self {
            Error::Http(e) => e,
            other => HttpError::internal(other.to_string()),
        }
    }
}
