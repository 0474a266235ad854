//! リクエストコンテキストの実装

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// リクエストコンテキスト（ミドルウェアからハンドラーへ渡される挿入順付きマップ）
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Context {
    values: Map<String, Value>,
}

impl Context {
    /// 新しい空のContextを作成
    pub fn new() -> Self {
        Self { values: Map::new() }
    }

    /// 値を設定（同じキーは上書き）
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(key.into(), value.into());
    }

    /// ビルダー形式で値を設定
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(key, value);
        self
    }

    /// 値を取得
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// 値を任意の型として取得
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.values
            .get(key)
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }

    /// 値を削除して返却
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.values.remove(key)
    }

    /// 指定されたキーが存在するかチェック
    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// 全てのキーを挿入順で取得
    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.values.keys()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// コンテキストが空かどうか
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// 部分コンテキストを後勝ちでマージ
    pub fn merge(&mut self, partial: Context) {
        for (key, value) in partial.values {
            self.values.insert(key, value);
        }
    }

    /// JSONマップとして取り出す
    pub fn into_map(self) -> Map<String, Value> {
        self.values
    }
}

impl From<Map<String, Value>> for Context {
    fn from(values: Map<String, Value>) -> Self {
        Self { values }
    }
}

impl FromIterator<(String, Value)> for Context {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}
