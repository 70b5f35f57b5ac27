//! 세션 쿠키 에러 타입
//!
//! 파싱 실패는 오케스트레이터가 새 세션을 발급하는 것으로 복구하므로
//! 호스트까지 올라가지 않습니다. CLI처럼 직접 디코딩하는 경우에만 노출됩니다.

use tidemark_core::error::{StorageError, TidemarkError};

/// 세션 도메인 에러
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// 필수 필드 누락
    #[error("missing session field '{0}'")]
    MissingField(&'static str),

    /// 필드 값이 올바르지 않음
    #[error("invalid session field '{field}': {reason}")]
    InvalidField {
        /// 필드 키 (si, ss, sl, se, r, nu)
        field: String,
        /// 실패 사유
        reason: String,
    },

    /// `key*value` 구분자가 없는 조각
    #[error("malformed segment '{0}'")]
    MalformedSegment(String),
}

impl From<SessionError> for TidemarkError {
    fn from(err: SessionError) -> Self {
        TidemarkError::Storage(StorageError::InvalidCookie(err.to_string()))
    }
}
