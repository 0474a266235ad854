//! ハンドラーの実装（分割モジュール）

pub mod builders;
pub mod core;
pub mod response;

pub use builders::{blocking_fn, handler_fn, HandlerExt};
pub use core::{BlockingHandler, FnHandler};
pub use response::{DispatchResult, IntoDispatchResult};

#[cfg(test)]
mod tests;
