//! 에이전트 에러 타입
//!
//! 호스트까지 올라가는 에러는 [`AgentError`] (초기화 단계)뿐입니다.
//! 생명주기 진입점은 에러 대신 [`BeaconOutcome`](crate::orchestrator::BeaconOutcome)을 반환합니다.

use tidemark_core::error::{ConfigError, TidemarkError};

/// 에이전트 초기화 에러
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    /// 설정 로딩/검증 실패
    #[error("configuration error: {0}")]
    Config(#[from] TidemarkError),

    /// 페이지 그룹 정규식 컴파일 실패
    #[error("invalid page group pattern '{pattern}': {reason}")]
    PageGroup {
        /// 문제가 된 패턴
        pattern: String,
        /// 컴파일 실패 사유
        reason: String,
    },
}

impl From<AgentError> for TidemarkError {
    fn from(err: AgentError) -> Self {
        match err {
            AgentError::Config(inner) => inner,
            AgentError::PageGroup { pattern, reason } => {
                TidemarkError::Config(ConfigError::InvalidValue {
                    field: "page_groups".to_owned(),
                    reason: format!("'{pattern}': {reason}"),
                })
            }
        }
    }
}

/// 페이로드 기록 에러
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PayloadError {
    /// 오케스트레이터 전용 키 (`rt.*`)
    #[error("key '{0}' is reserved")]
    ReservedKey(String),

    /// 빈 키
    #[error("key must not be empty")]
    EmptyKey,
}
