use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use log::info;

use crate::common::{Context, Middleware, Next, Request};
use crate::error::Error;

/// リクエスト開始時刻をコンテキストに記録するキー
pub const REQUEST_STARTED_AT: &str = "request_started_at";

/// リクエストをログに出力するミドルウェア（常に続行する）
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestLogger;

impl RequestLogger {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Middleware for RequestLogger {
    async fn intercept(&self, req: Request, _ctx: &Context) -> Result<Next, Error> {
        let now = Utc::now();
        info!("[{}] Received request: {} {}", now.format("%Y-%m-%d %H:%M:%S%.3f"), req.method, req.path);

        let partial = Context::new().with(
            REQUEST_STARTED_AT,
            now.to_rfc3339_opts(SecondsFormat::Millis, true),
        );
        Ok(Next::Continue(req, partial))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Method;
    use chrono::DateTime;

    #[tokio::test]
    async fn test_logger_records_start_time() {
        let req = Request::new(Method::GET, "/health");
        let next = RequestLogger::new().intercept(req, &Context::new()).await.unwrap();

        match next {
            Next::Continue(req, ctx) => {
                assert_eq!(req.path, "/health");
                let stamp: String = ctx.get_as(REQUEST_STARTED_AT).unwrap();
                assert!(DateTime::parse_from_rfc3339(&stamp).is_ok());
            }
            other => panic!("unexpected: {:?}", other),
        }
    }
}
