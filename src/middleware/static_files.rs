use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use log::{debug, warn};

use crate::common::{Context, Middleware, Next, Request, Response};
use crate::error::Error;
use crate::handler::DispatchResult;

/// 拡張子からContent-Typeを決定
pub fn content_type_for(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("css") => "text/css",
        Some("js") => "application/javascript",
        Some("html") => "text/html",
        _ => "text/plain",
    }
}

fn not_found() -> Next {
    Next::Respond(DispatchResult::Response(
        Response::not_found().with_text("Not found"),
    ))
}

/// プレフィックス配下のパスをディレクトリ内のファイルで応答するミドルウェア
#[derive(Debug, Clone)]
pub struct StaticFiles {
    root: PathBuf,
    prefix: String,
}

impl StaticFiles {
    pub fn new(root: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            prefix: prefix.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl Middleware for StaticFiles {
    async fn intercept(&self, req: Request, _ctx: &Context) -> Result<Next, Error> {
        let relative = match req.path.strip_prefix(self.prefix.as_str()) {
            Some(rest) if rest.is_empty() || rest.starts_with('/') => rest.trim_start_matches('/'),
            _ => return Ok(Next::proceed(req)),
        };

        if relative.is_empty() || relative.split('/').any(|segment| segment == "..") {
            warn!("Rejected static path {}", req.path);
            return Ok(not_found());
        }

        let file = self.root.join(relative);
        match tokio::fs::metadata(&file).await {
            Ok(meta) if meta.is_file() => {}
            Ok(_) => return Ok(not_found()),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("Static file not found: {}", file.display());
                return Ok(not_found());
            }
            Err(e) => return Err(read_error(&file, e)),
        }

        let bytes = tokio::fs::read(&file)
            .await
            .map_err(|e| read_error(&file, e))?;
        debug!("Serving static file {}", file.display());
        let res = Response::ok()
            .with_header("content-type", content_type_for(&file))
            .with_body(bytes);
        Ok(Next::Respond(DispatchResult::Response(res)))
    }
}

fn read_error(file: &Path, e: std::io::Error) -> Error {
    Error::InternalServerError(format!("failed to read {}: {}", file.display(), e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type_for() {
        assert_eq!(content_type_for(Path::new("a/site.css")), "text/css");
        assert_eq!(content_type_for(Path::new("app.js")), "application/javascript");
        assert_eq!(content_type_for(Path::new("index.html")), "text/html");
        assert_eq!(content_type_for(Path::new("README")), "text/plain");
    }
}
