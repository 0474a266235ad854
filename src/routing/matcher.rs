//! ルートテンプレートのコンパイルとパス照合
//!
//! `:name` で始まるセグメントはパラメータとして一つのパスセグメントを捕捉する。
//! それ以外のセグメントは完全一致。末尾のスラッシュは無視される。

use std::collections::HashMap;
use std::fmt;

use log::debug;
use regex::Regex;

#[cfg(debug_assertions)]
use log::warn;
#[cfg(debug_assertions)]
use std::time::{Duration, Instant};

use crate::error::Error;

/// 末尾のスラッシュを取り除く（ルート `/` はそのまま）
pub fn normalize_path(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/"
    } else {
        trimmed
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// コンパイル済みのルートテンプレート
#[derive(Clone)]
pub struct PathPattern {
    template: String,
    regex: Regex,
    params: Vec<String>,
}

impl PathPattern {
    /// テンプレートをアンカー付き正規表現へコンパイル
    pub fn compile(template: &str) -> Result<Self, Error> {
        if template.is_empty() {
            return Err(Error::InvalidRoutePattern("empty route template".to_string()));
        }

        let normalized = normalize_path(template);
        let mut params: Vec<String> = Vec::new();
        let mut source = String::with_capacity(normalized.len() + 8);
        source.push('^');

        if normalized == "/" {
            source.push('/');
        } else {
            for (i, segment) in normalized.split('/').enumerate() {
                if i > 0 {
                    source.push('/');
                }
                match segment.strip_prefix(':') {
                    Some(name) => {
                        if name.is_empty() || !name.chars().all(is_word_char) {
                            return Err(Error::InvalidRoutePattern(format!(
                                "parameter in '{}' needs a name made of word characters",
                                template
                            )));
                        }
                        if params.iter().any(|p| p == name) {
                            return Err(Error::InvalidRoutePattern(format!(
                                "duplicate parameter '{}' in '{}'",
                                name, template
                            )));
                        }
                        params.push(name.to_string());
                        source.push_str("([^/]+)");
                    }
                    None => source.push_str(&regex::escape(segment)),
                }
            }
        }
        source.push('$');

        let regex = Regex::new(&source)
            .map_err(|e| Error::InvalidRoutePattern(format!("{}: {}", template, e)))?;
        debug!("Compiled route template '{}' to {}", template, source);

        Ok(Self {
            template: normalized.to_string(),
            regex,
            params,
        })
    }

    /// パスを照合し、一致すればパラメータを返す
    pub fn matches(&self, path: &str) -> Option<HashMap<String, String>> {
        let path = normalize_path(path);

        #[cfg(debug_assertions)]
        let start_time = Instant::now();

        let captures = self.regex.captures(path);

        #[cfg(debug_assertions)]
        {
            let elapsed = start_time.elapsed();
            if elapsed > Duration::from_millis(100) {
                warn!(
                    "Slow route matching detected: template '{}' took {:?} for path '{}'",
                    self.template, elapsed, path
                );
            }
        }

        let captures = captures?;
        let params = self
            .params
            .iter()
            .enumerate()
            .filter_map(|(i, name)| {
                captures
                    .get(i + 1)
                    .map(|m| (name.clone(), m.as_str().to_string()))
            })
            .collect();
        Some(params)
    }

    /// 正規化済みのテンプレート
    pub fn template(&self) -> &str {
        &self.template
    }

    /// パラメータ名（宣言順）
    pub fn param_names(&self) -> &[String] {
        &self.params
    }
}

impl fmt::Debug for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PathPattern")
            .field("template", &self.template)
            .field("regex", &self.regex.as_str())
            .finish()
    }
}
