//! 에러 타입: 도메인별 에러 정의
//!
//! 페이지를 호스팅하는 쪽으로 전파되는 에러는 설정 단계의 에러뿐입니다.
//! 나머지는 각 컴포넌트 안에서 "이번 주기에는 비콘 없음"으로 강등됩니다.

use crate::beacon::TransportKind;

/// Tidemark 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum TidemarkError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 압축 코덱 디코딩 에러
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// 쿠키 저장소 에러
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// 전송 에러
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 압축 코덱 디코딩 에러
///
/// 디코딩은 fail-closed 입니다. 부분적으로 해석된 레코드는 절대 반환하지 않습니다.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    /// 문법 오류
    #[error("malformed input at offset {offset}: {reason}")]
    Malformed { offset: usize, reason: String },

    /// 알 수 없는 레코드 키
    #[error("unknown record key '{key}'")]
    UnknownKey { key: String },

    /// 필수 필드 누락
    #[error("missing required field '{field}'")]
    MissingField { field: &'static str },

    /// 필드 타입 불일치 또는 범위 초과
    #[error("invalid value for field '{field}': {reason}")]
    InvalidField { field: &'static str, reason: String },

    /// 입력 크기 초과
    #[error("input too large: {size} bytes (max: {max})")]
    TooLarge { size: usize, max: usize },
}

/// 쿠키 저장소 에러
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// 쿠키 기록이 플랫폼에서 거부됨
    #[error("cookie write rejected: {0}")]
    Rejected(String),

    /// 쿠키 문자열 형식 오류
    #[error("invalid cookie string: {0}")]
    InvalidCookie(String),
}

/// 전송 에러
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// 해당 전송 수단을 사용할 수 없음
    #[error("transport {0} unavailable")]
    Unavailable(TransportKind),

    /// 전송 수단이 핸드오프를 거부함
    #[error("transport {transport} rejected beacon: {reason}")]
    Rejected {
        transport: TransportKind,
        reason: String,
    },

    /// 모든 전송 수단 소진
    #[error("all transports exhausted after {attempts} attempts")]
    Exhausted { attempts: usize },
}
