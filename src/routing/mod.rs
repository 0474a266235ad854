//! ルーティング（パス照合とルートテーブル）

pub mod matcher;
pub mod router;

use std::fmt;

use uuid::Uuid;

pub use matcher::{normalize_path, PathPattern};
pub use router::{Route, RouteMatch, Router};

/// ルーターの識別子
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RouterId(Uuid);

impl RouterId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RouterId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RouterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
