//! 세션 쿠키 값 인코딩/디코딩
//!
//! 쿠키 값 형식:
//!
//! ```text
//! si*<id>&ss*<start36>&sl*<len>&se*<exp36>[&r*<hash>][&nu*<hash>]
//! ```
//!
//! - 필드 구분자는 `&`, 키/값 구분자는 `*`
//! - 값은 RFC 3986 unreserved 집합 밖의 문자를 퍼센트 인코딩하므로
//!   구분자가 값 안에 나타나지 않습니다.
//! - `ss`는 세션 시작(에포크 밀리초)의 base 36
//! - `se`는 `floor(ss / 1000)`부터 만료 시각(에포크 초)까지의 초 수, base 36.
//!   만료 시각은 `floor(ss / 1000)`보다 이를 수 없습니다. [`Session::mint`]와
//!   [`Session::refresh_expiry`]는 이 조건을 지키며, 어긴 세션은 시작 초에
//!   만료되는 값으로 인코딩됩니다.
//! - 알 수 없는 키는 무시하고, `r`/`nu`는 선택 필드입니다.

use tracing::debug;
use uuid::Uuid;

use crate::base36;
use crate::error::SessionError;

/// 세션 상태
///
/// 같은 퍼스트 파티 오리진의 모든 페이지가 쿠키를 통해 공유합니다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// 불투명 세션 식별자
    pub session_id: String,
    /// 세션 생성 시각 (에포크 밀리초)
    pub session_start: u64,
    /// 지금까지 전송된 비콘 수
    pub session_length: u32,
    /// 만료 시각 (에포크 초)
    pub session_expiry: u64,
    /// 참조 URL 지문
    pub referrer_hash: Option<String>,
    /// 현재 문서 URL 지문
    pub navigation_hash: Option<String>,
}

impl Session {
    /// 새 세션을 발급합니다.
    ///
    /// 길이는 0에서 시작하며 첫 비콘이 전송될 때 1이 됩니다.
    pub fn mint(now_ms: u64, expiry_secs: u64) -> Self {
        let session = Self {
            session_id: Uuid::new_v4().simple().to_string(),
            session_start: now_ms,
            session_length: 0,
            session_expiry: now_ms / 1000 + expiry_secs,
            referrer_hash: None,
            navigation_hash: None,
        };
        debug!(session_id = %session.session_id, "minted session");
        session
    }

    /// `now_ms` 시점에 만료되었는지 확인합니다.
    pub fn is_expired(&self, now_ms: u64) -> bool {
        now_ms / 1000 > self.session_expiry
    }

    /// 만료 시각을 `now_ms` 기준으로 연장합니다.
    ///
    /// 시계가 세션 시작보다 뒤로 가 있으면 시작 시각을 기준으로 삼습니다.
    pub fn refresh_expiry(&mut self, now_ms: u64, expiry_secs: u64) {
        self.session_expiry = now_ms.max(self.session_start) / 1000 + expiry_secs;
    }

    /// 쿠키 값 문자열로 인코딩합니다.
    ///
    /// 만료 시각이 시작 초보다 이르면 `se*0`(시작 초에 만료)으로 기록합니다.
    pub fn encode(&self) -> String {
        let start_secs = self.session_start / 1000;
        let mut out = format!(
            "si*{}&ss*{}&sl*{}&se*{}",
            urlencoding::encode(&self.session_id),
            base36::encode(self.session_start),
            self.session_length,
            base36::encode(self.session_expiry.saturating_sub(start_secs)),
        );
        if let Some(r) = &self.referrer_hash {
            out.push_str("&r*");
            out.push_str(&urlencoding::encode(r));
        }
        if let Some(nu) = &self.navigation_hash {
            out.push_str("&nu*");
            out.push_str(&urlencoding::encode(nu));
        }
        out
    }

    /// 쿠키 값 문자열을 디코딩합니다.
    ///
    /// 값 전체를 감싼 큰따옴표는 허용합니다.
    pub fn decode(raw: &str) -> Result<Self, SessionError> {
        let trimmed = raw.trim();
        let value = trimmed
            .strip_prefix('"')
            .and_then(|s| s.strip_suffix('"'))
            .unwrap_or(trimmed);

        let mut id = None;
        let mut start = None;
        let mut length = None;
        let mut expiry_delta = None;
        let mut referrer_hash = None;
        let mut navigation_hash = None;

        for segment in value.split('&').filter(|s| !s.is_empty()) {
            let (key, raw_val) = segment
                .split_once('*')
                .ok_or_else(|| SessionError::MalformedSegment(segment.to_owned()))?;
            let val = urlencoding::decode(raw_val).map_err(|e| invalid(key, e.to_string()))?;

            match key {
                "si" => id = Some(val.into_owned()),
                "ss" => {
                    start = Some(base36::decode(&val).ok_or_else(|| invalid(key, "not base 36"))?)
                }
                "sl" => {
                    length = Some(
                        val.parse::<u32>()
                            .map_err(|e| invalid(key, e.to_string()))?,
                    )
                }
                "se" => {
                    expiry_delta =
                        Some(base36::decode(&val).ok_or_else(|| invalid(key, "not base 36"))?)
                }
                "r" => referrer_hash = Some(val.into_owned()),
                "nu" => navigation_hash = Some(val.into_owned()),
                _ => {}
            }
        }

        let session_id = id.ok_or(SessionError::MissingField("si"))?;
        if session_id.is_empty() {
            return Err(invalid("si", "empty session id"));
        }
        let session_start = start.ok_or(SessionError::MissingField("ss"))?;
        let session_length = length.ok_or(SessionError::MissingField("sl"))?;
        let delta = expiry_delta.ok_or(SessionError::MissingField("se"))?;
        let session_expiry = (session_start / 1000)
            .checked_add(delta)
            .ok_or_else(|| invalid("se", "expiry overflows"))?;

        Ok(Self {
            session_id,
            session_start,
            session_length,
            session_expiry,
            referrer_hash,
            navigation_hash,
        })
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> SessionError {
    SessionError::InvalidField {
        field: field.to_owned(),
        reason: reason.into(),
    }
}
