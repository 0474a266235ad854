//! クエリパラメータの検証ミドルウェア

use std::fmt;

use async_trait::async_trait;
use log::debug;
use serde_json::{json, Map, Value};

use crate::common::{Context, Middleware, Next, Request, Response};
use crate::error::Error;
use crate::handler::DispatchResult;

/// 検証済みの値を格納するコンテキストキー
pub const VALIDATED_QUERY: &str = "query";

/// クエリパラメータの期待型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    Str,
    Int,
    Float,
    Bool,
}

impl QueryKind {
    /// 文字列を期待型の値へ変換
    pub fn parse(&self, raw: &str) -> Option<Value> {
        match self {
            QueryKind::Str => Some(Value::String(raw.to_string())),
            QueryKind::Int => raw.trim().parse::<i64>().ok().map(Value::from),
            QueryKind::Float => raw
                .trim()
                .parse::<f64>()
                .ok()
                .and_then(|f| serde_json::Number::from_f64(f).map(Value::Number)),
            QueryKind::Bool => match raw.trim().to_ascii_lowercase().as_str() {
                "true" | "1" => Some(Value::Bool(true)),
                "false" | "0" => Some(Value::Bool(false)),
                _ => None,
            },
        }
    }
}

impl fmt::Display for QueryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            QueryKind::Str => "str",
            QueryKind::Int => "int",
            QueryKind::Float => "float",
            QueryKind::Bool => "bool",
        };
        f.write_str(name)
    }
}

/// 検証対象のクエリパラメータ
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryParam {
    pub name: String,
    pub kind: QueryKind,
    pub required: bool,
}

impl QueryParam {
    /// 必須パラメータを作成
    pub fn new(name: impl Into<String>, kind: QueryKind) -> Self {
        Self {
            name: name.into(),
            kind,
            required: true,
        }
    }

    /// 省略可能にする
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }
}

/// 宣言されたクエリパラメータを検証するミドルウェア
#[derive(Debug, Clone)]
pub struct QueryValidation {
    params: Vec<QueryParam>,
}

impl QueryValidation {
    pub fn new<I>(params: I) -> Self
    where
        I: IntoIterator<Item = QueryParam>,
    {
        Self {
            params: params.into_iter().collect(),
        }
    }

    /// 検証済みの値、またはパラメータごとのエラーを返す
    pub fn validate(&self, req: &Request) -> Result<Map<String, Value>, Map<String, Value>> {
        let mut validated = Map::new();
        let mut errors = Map::new();

        for param in &self.params {
            match req.query_params.get(&param.name) {
                None if param.required => {
                    errors.insert(param.name.clone(), json!("Missing required query parameter"));
                }
                None => {}
                Some(raw) => match param.kind.parse(raw) {
                    Some(value) => {
                        validated.insert(param.name.clone(), value);
                    }
                    None => {
                        errors.insert(
                            param.name.clone(),
                            json!(format!("Invalid type for {}, expected {}", param.name, param.kind)),
                        );
                    }
                },
            }
        }

        if errors.is_empty() {
            Ok(validated)
        } else {
            Err(errors)
        }
    }
}

#[async_trait]
impl Middleware for QueryValidation {
    async fn intercept(&self, req: Request, _ctx: &Context) -> Result<Next, Error> {
        match self.validate(&req) {
            Ok(validated) => Ok(Next::Continue(
                req,
                Context::new().with(VALIDATED_QUERY, Value::Object(validated)),
            )),
            Err(errors) => {
                debug!("Query validation failed for {}: {:?}", req.path, errors);
                let res = Response::new(400).json(&json!({ "errors": errors }))?;
                Ok(Next::Respond(DispatchResult::Response(res)))
            }
        }
    }
}
