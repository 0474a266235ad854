use serde::Serialize;
use serde_json::Value;

use crate::common::{Body, Response};
use crate::error::{Error, HttpError};

/// ハンドラー・ミドルウェア・ディスパッチャー共通の結果型
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchResult {
    /// シリアライズされる構造化データ
    Value(Value),
    /// テキスト
    Text(String),
    /// 生のバイト列
    Bytes(Vec<u8>),
    /// ステータス・ヘッダーを明示したレスポンス
    Response(Response),
    /// 型付きHTTPエラー
    Error(HttpError),
}

impl DispatchResult {
    /// シリアライズ可能な値から構造化結果を作成
    pub fn json<T: Serialize>(value: &T) -> Result<Self, Error> {
        serde_json::to_value(value)
            .map(DispatchResult::Value)
            .map_err(|e| Error::ResponseSerializationError(e.to_string()))
    }

    /// 最終的なHTTPステータス
    pub fn status(&self) -> u16 {
        match self {
            DispatchResult::Response(res) => res.status,
            DispatchResult::Error(err) => err.status,
            _ => 200,
        }
    }

    /// ステータスを上書きしたレスポンスに包む（型付きエラーはそのまま）
    pub fn with_status(self, status: u16) -> Self {
        let res = Response::new(status);
        match self {
            DispatchResult::Value(value) => DispatchResult::Response(Response {
                body: Body::Json(value),
                ..res
            }),
            DispatchResult::Text(text) => DispatchResult::Response(res.with_text(text)),
            DispatchResult::Bytes(bytes) => DispatchResult::Response(res.with_body(bytes)),
            DispatchResult::Response(inner) => DispatchResult::Response(Response { status, ..inner }),
            DispatchResult::Error(err) => DispatchResult::Error(err),
        }
    }
}

/// ハンドラーの戻り値をDispatchResultに変換するトレイト
pub trait IntoDispatchResult {
    fn into_dispatch_result(self) -> DispatchResult;
}

impl IntoDispatchResult for DispatchResult {
    fn into_dispatch_result(self) -> DispatchResult {
        self
    }
}

impl IntoDispatchResult for Value {
    fn into_dispatch_result(self) -> DispatchResult {
        DispatchResult::Value(self)
    }
}

impl IntoDispatchResult for String {
    fn into_dispatch_result(self) -> DispatchResult {
        DispatchResult::Text(self)
    }
}

impl IntoDispatchResult for &'static str {
    fn into_dispatch_result(self) -> DispatchResult {
        DispatchResult::Text(self.to_string())
    }
}

impl IntoDispatchResult for Vec<u8> {
    fn into_dispatch_result(self) -> DispatchResult {
        DispatchResult::Bytes(self)
    }
}

impl IntoDispatchResult for Response {
    fn into_dispatch_result(self) -> DispatchResult {
        DispatchResult::Response(self)
    }
}

impl IntoDispatchResult for HttpError {
    fn into_dispatch_result(self) -> DispatchResult {
        DispatchResult::Error(self)
    }
}
