//! 環境変数による設定

use std::env;
use std::time::Duration;

use log::warn;

use crate::common::is_header_value_valid;

/// ワーカープールの既定サイズ
pub const DEFAULT_MAX_WORKERS: usize = 5;
/// キャッシュの既定TTL（秒）
pub const DEFAULT_CACHE_TTL_SECS: u64 = 60;
/// 既定のログフィルター
pub const DEFAULT_LOG_LEVEL: &str = "info";

pub const ENV_MAX_WORKERS: &str = "ROUTEBRIDGE_MAX_WORKERS";
pub const ENV_DEFAULT_HEADERS: &str = "ROUTEBRIDGE_DEFAULT_HEADERS";
pub const ENV_LOG: &str = "ROUTEBRIDGE_LOG";
pub const ENV_CACHE_TTL_SECS: &str = "ROUTEBRIDGE_CACHE_TTL_SECS";

/// ディスパッチャーの設定
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// ブロッキングハンドラーの同時実行数
    pub max_workers: usize,
    /// 全レスポンスの末尾に付与するヘッダー
    pub default_headers: Vec<(String, String)>,
    /// env_loggerのフィルター
    pub log_level: String,
    /// Cachedの既定TTL
    pub cache_ttl: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_workers: DEFAULT_MAX_WORKERS,
            default_headers: Vec::new(),
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            cache_ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
        }
    }
}

impl Config {
    /// 環境変数から設定を読み込む（不正な値は既定値にフォールバック）
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let max_workers = match env::var(ENV_MAX_WORKERS) {
            Ok(raw) => match raw.trim().parse::<usize>() {
                Ok(n) if n >= 1 => n,
                _ => {
                    warn!("Invalid {}='{}', using {}", ENV_MAX_WORKERS, raw, defaults.max_workers);
                    defaults.max_workers
                }
            },
            Err(_) => defaults.max_workers,
        };

        let default_headers = match env::var(ENV_DEFAULT_HEADERS) {
            Ok(raw) => parse_header_list(&raw).unwrap_or_else(|| {
                warn!("Invalid {}='{}', using no default headers", ENV_DEFAULT_HEADERS, raw);
                Vec::new()
            }),
            Err(_) => defaults.default_headers,
        };

        let log_level = env::var(ENV_LOG)
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or(defaults.log_level);

        let cache_ttl = match env::var(ENV_CACHE_TTL_SECS) {
            Ok(raw) => match raw.trim().parse::<u64>() {
                Ok(secs) => Duration::from_secs(secs),
                Err(_) => {
                    warn!("Invalid {}='{}', using {:?}", ENV_CACHE_TTL_SECS, raw, defaults.cache_ttl);
                    defaults.cache_ttl
                }
            },
            Err(_) => defaults.cache_ttl,
        };

        Self {
            max_workers,
            default_headers,
            log_level,
            cache_ttl,
        }
    }

    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers.max(1);
        self
    }

    /// 既定ヘッダーを追加（不正な値は無視）
    pub fn with_default_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        let value = value.into();
        if is_header_value_valid(&value) {
            self.default_headers.push((name, value));
        } else {
            warn!("Ignoring default header '{}' with invalid value", name);
        }
        self
    }

    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }
}

/// `name:value,name:value` 形式を解析する
fn parse_header_list(raw: &str) -> Option<Vec<(String, String)>> {
    let mut headers = Vec::new();
    for pair in raw.split(',') {
        let pair = pair.trim();
        if pair.is_empty() {
            continue;
        }
        let (name, value) = pair.split_once(':')?;
        let name = name.trim();
        let value = value.trim();
        if name.is_empty() || !is_header_value_valid(value) {
            return None;
        }
        headers.push((name.to_string(), value.to_string()));
    }
    Some(headers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use temp_env::with_vars;

    #[test]
    fn test_from_env_defaults() {
        with_vars(
            [
                (ENV_MAX_WORKERS, None::<&str>),
                (ENV_DEFAULT_HEADERS, None),
                (ENV_LOG, None),
                (ENV_CACHE_TTL_SECS, None),
            ],
            || {
                assert_eq!(Config::from_env(), Config::default());
            },
        );
    }

    #[test]
    fn test_from_env_custom() {
        with_vars(
            [
                (ENV_MAX_WORKERS, Some("8")),
                (ENV_DEFAULT_HEADERS, Some("X-Powered-By: routebridge, X-Frame-Options:DENY")),
                (ENV_LOG, Some("debug")),
                (ENV_CACHE_TTL_SECS, Some("5")),
            ],
            || {
                let config = Config::from_env();
                assert_eq!(config.max_workers, 8);
                assert_eq!(
                    config.default_headers,
                    vec![
                        ("X-Powered-By".to_string(), "routebridge".to_string()),
                        ("X-Frame-Options".to_string(), "DENY".to_string()),
                    ]
                );
                assert_eq!(config.log_level, "debug");
                assert_eq!(config.cache_ttl, Duration::from_secs(5));
            },
        );
    }

    #[test]
    fn test_from_env_invalid_values_fall_back() {
        with_vars(
            [
                (ENV_MAX_WORKERS, Some("0")),
                (ENV_DEFAULT_HEADERS, Some("missing-separator")),
                (ENV_LOG, Some("  ")),
                (ENV_CACHE_TTL_SECS, Some("soon")),
            ],
            || {
                assert_eq!(Config::from_env(), Config::default());
            },
        );
    }

    #[test]
    fn test_builder_setters() {
        let config = Config::default()
            .with_max_workers(0)
            .with_default_header("X-A", "1")
            .with_default_header("X-Bad", "a\r\nb")
            .with_cache_ttl(Duration::from_secs(1));

        assert_eq!(config.max_workers, 1);
        assert_eq!(config.default_headers, vec![("X-A".to_string(), "1".to_string())]);
        assert_eq!(config.cache_ttl, Duration::from_secs(1));
    }
}
