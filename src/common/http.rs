//! HTTP関連の基本型とユーティリティ

use std::collections::HashMap;
use std::fmt;

use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::utils::{is_header_value_valid, parse_query_string};
use crate::error::Error;

/// HTTPメソッド（ディスパッチ対象の4種のみ）
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub enum Method {
    GET,
    POST,
    PUT,
    DELETE,
}

impl Method {
    /// 全メソッド（ルートテーブルの初期化順）
    pub const ALL: [Method; 4] = [Method::GET, Method::POST, Method::PUT, Method::DELETE];

    /// 文字列からMethodに変換
    pub fn from_str(method: &str) -> Option<Self> {
        match method.to_uppercase().as_str() {
            "GET" => Some(Method::GET),
            "POST" => Some(Method::POST),
            "PUT" => Some(Method::PUT),
            "DELETE" => Some(Method::DELETE),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::GET => "GET",
            Method::POST => "POST",
            Method::PUT => "PUT",
            Method::DELETE => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// HTTPリクエスト
#[derive(Debug, Clone)]
pub struct Request {
    /// HTTPメソッド
    pub method: Method,
    /// リクエストパス
    pub path: String,
    /// クエリパラメータ
    pub query_params: HashMap<String, String>,
    /// パスパラメータ（ディスパッチ時に設定される）
    pub path_params: HashMap<String, String>,
    /// HTTPヘッダー（キーは小文字）
    pub headers: HashMap<String, String>,
    /// リクエストボディ
    pub body: Option<Vec<u8>>,
}

impl Request {
    /// 新しいリクエストを作成
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query_params: HashMap::new(),
            path_params: HashMap::new(),
            headers: HashMap::new(),
            body: None,
        }
    }

    /// `path?query` 形式のターゲットからリクエストを作成
    pub fn from_target(method: Method, target: &str) -> Self {
        let (path, query) = match target.split_once('?') {
            Some((path, query)) => (path, query),
            None => (target, ""),
        };
        let mut req = Self::new(method, path);
        req.query_params = parse_query_string(query);
        req
    }

    /// クエリパラメータを追加
    pub fn with_query_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query_params.insert(key.into(), value.into());
        self
    }

    /// ヘッダーを追加（キーは小文字に正規化、不正な値は破棄）
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into().to_ascii_lowercase();
        let value = value.into();
        if is_header_value_valid(&value) {
            self.headers.insert(key, value);
        } else {
            warn!("Dropping request header '{}' with invalid value", key);
        }
        self
    }

    /// ボディを追加
    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        self.body = Some(body);
        self
    }

    /// ヘッダー値を取得（大文字小文字を区別しない）
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers
            .get(&key.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// パスパラメータを取得
    pub fn path_param(&self, name: &str) -> Option<&str> {
        self.path_params.get(name).map(String::as_str)
    }

    /// ボディをJSONとしてパース
    pub fn json<T: for<'de> Deserialize<'de>>(&self) -> Result<T, Error> {
        if let Some(body) = &self.body {
            serde_json::from_slice(body).map_err(|e| Error::InvalidRequestBody(e.to_string()))
        } else {
            Err(Error::InvalidRequestBody("No request body".to_string()))
        }
    }
}

/// 型付きレスポンスのボディ
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    Empty,
    Bytes(Vec<u8>),
    Text(String),
    Json(Value),
}

impl Body {
    /// ボディの形からContent-Typeを推定
    pub fn content_type(&self) -> Option<&'static str> {
        match self {
            Body::Empty => None,
            Body::Bytes(_) | Body::Text(_) => Some("text/plain"),
            Body::Json(_) => Some("application/json"),
        }
    }

    /// ワイヤ用のバイト列に変換
    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            Body::Empty => Vec::new(),
            Body::Bytes(bytes) => bytes,
            Body::Text(text) => text.into_bytes(),
            Body::Json(value) => value.to_string().into_bytes(),
        }
    }
}

/// 型付きHTTPレスポンス（ステータス・ヘッダー・ボディを明示する）
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    /// HTTPステータスコード
    pub status: u16,
    /// HTTPヘッダー（登録順）
    pub headers: Vec<(String, String)>,
    /// レスポンスボディ
    pub body: Body,
}

impl Response {
    /// 新しいレスポンスを作成
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Body::Empty,
        }
    }

    /// ヘッダーを追加（不正な値は破棄）
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into();
        let value = value.into();
        if is_header_value_valid(&value) {
            self.headers.push((key, value));
        } else {
            warn!("Dropping response header '{}' with invalid value", key);
        }
        self
    }

    /// バイト列ボディを設定
    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        self.body = Body::Bytes(body);
        self
    }

    /// テキストボディを設定
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.body = Body::Text(text.into());
        self
    }

    /// JSONをボディとして設定
    pub fn json<T: Serialize>(mut self, value: &T) -> Result<Self, Error> {
        let json = serde_json::to_value(value)
            .map_err(|e| Error::ResponseSerializationError(e.to_string()))?;
        self.body = Body::Json(json);
        Ok(self)
    }

    /// ヘッダー値を取得（大文字小文字を区別しない）
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// 200 OKレスポンスを作成
    pub fn ok() -> Self {
        Self::new(200)
    }

    /// 404 Not Foundレスポンスを作成
    pub fn not_found() -> Self {
        Self::new(404)
    }
}
