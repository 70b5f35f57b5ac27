//! 비콘 쿼리 문자열 직렬화
//!
//! 키와 값 모두 RFC 3986 unreserved 집합 밖의 문자를 퍼센트 인코딩합니다.
//! GET이면 URL 쿼리로, POST 계열이면 form-encoded 본문으로 그대로 쓰입니다.

use tidemark_core::beacon::BeaconSnapshot;

/// 스냅샷을 `key=value&...` 형식으로 직렬화합니다. 삽입 순서를 유지합니다.
pub fn serialize(snapshot: &BeaconSnapshot) -> String {
    let mut out = String::new();
    for (idx, (key, value)) in snapshot.iter().enumerate() {
        if idx > 0 {
            out.push('&');
        }
        out.push_str(&urlencoding::encode(key));
        out.push('=');
        out.push_str(&urlencoding::encode(&value.to_string()));
    }
    out
}

/// 엔드포인트 URL에 쿼리 문자열을 붙입니다.
pub fn append_query(url: &str, query: &str) -> String {
    if query.is_empty() {
        return url.to_owned();
    }
    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{url}{separator}{query}")
}
