//! DispatchResultをワイヤ形式のレスポンスへ変換する

use log::error;

use crate::error::Error;
use crate::handler::DispatchResult;

const CONTENT_TYPE: &str = "content-type";
const TEXT_PLAIN: &str = "text/plain";
const APPLICATION_JSON: &str = "application/json";

/// 送信直前のレスポンス
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    /// ヘッダー（順序を保持、キーによるマージはしない）
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl RawResponse {
    /// ヘッダー値を取得（最初に見つかったもの）
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// ボディをUTF-8文字列として取得
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

fn content_type(value: &str) -> (String, String) {
    (CONTENT_TYPE.to_string(), value.to_string())
}

/// 結果の種類に応じてステータス・ヘッダー・ボディを決め、既定ヘッダーを末尾に追加する
pub fn format_response(result: DispatchResult, default_headers: &[(String, String)]) -> RawResponse {
    let mut raw = match result {
        DispatchResult::Bytes(bytes) => RawResponse {
            status: 200,
            headers: vec![content_type(TEXT_PLAIN)],
            body: bytes,
        },
        DispatchResult::Text(text) => RawResponse {
            status: 200,
            headers: vec![content_type(TEXT_PLAIN)],
            body: text.into_bytes(),
        },
        DispatchResult::Value(value) => RawResponse {
            status: 200,
            headers: vec![content_type(APPLICATION_JSON)],
            body: value.to_string().into_bytes(),
        },
        DispatchResult::Response(res) => {
            let mut headers = res.headers;
            let has_content_type = headers
                .iter()
                .any(|(k, _)| k.eq_ignore_ascii_case(CONTENT_TYPE));
            if !has_content_type {
                if let Some(inferred) = res.body.content_type() {
                    headers.push(content_type(inferred));
                }
            }
            RawResponse {
                status: res.status,
                headers,
                body: res.body.into_bytes(),
            }
        }
        DispatchResult::Error(err) => RawResponse {
            status: err.status,
            headers: vec![content_type(APPLICATION_JSON)],
            body: err.message.into_bytes(),
        },
    };

    raw.headers.extend(default_headers.iter().cloned());
    raw
}

/// 捕捉されなかったエラーの汎用レスポンス
pub fn format_error(err: &Error) -> RawResponse {
    error!("Unhandled error reached the formatter: {}", err);
    RawResponse {
        status: 500,
        headers: vec![content_type(TEXT_PLAIN)],
        body: b"Internal Server Error".to_vec(),
    }
}
