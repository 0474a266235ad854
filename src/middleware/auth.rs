use async_trait::async_trait;
use log::warn;

use crate::common::{Context, Middleware, Next, Request};
use crate::error::{Error, HttpError};
use crate::handler::DispatchResult;

/// 指定ヘッダーの値がトークンと一致するリクエストだけを通すミドルウェア
#[derive(Debug, Clone)]
pub struct HeaderAuth {
    header: String,
    token: String,
}

impl HeaderAuth {
    /// 新しいHeaderAuthを作成（ヘッダー名は大文字小文字を区別しない）
    pub fn new(header: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            header: header.into(),
            token: token.into(),
        }
    }
}

#[async_trait]
impl Middleware for HeaderAuth {
    async fn intercept(&self, req: Request, _ctx: &Context) -> Result<Next, Error> {
        if req.header(&self.header) == Some(self.token.as_str()) {
            return Ok(Next::Continue(req, Context::new().with("auth", "authorized")));
        }

        warn!("Rejected {} {}: missing or invalid '{}'", req.method, req.path, self.header);
        Ok(Next::Respond(DispatchResult::Error(HttpError::unauthorized(
            "Unauthorized",
        ))))
    }
}
