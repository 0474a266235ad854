//! 共通の抽象化レイヤーとトレイト定義

pub mod context;
pub mod http;
pub mod traits;
pub mod utils;

pub use context::Context;
pub use http::{Body, Method, Request, Response};
pub use traits::{Handler, Invocation, Middleware, Next};
pub use utils::{is_header_value_valid, parse_query_string, percent_decode};

#[cfg(test)]
pub use traits::MockMiddleware;
