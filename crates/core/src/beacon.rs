//! 비콘 타입: 전송 단위와 그 값을 정의합니다.
//!
//! [`BeaconSnapshot`]은 finalize 이후의 불변 페이로드입니다.
//! 한 번 만들어지면 어떤 협력자도 수정할 수 없으므로, 동의 대기 중
//! 큐에 보관했다가 그대로 전송할 수 있습니다.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// 비콘 값: 문자열, 정수, 실수 중 하나
///
/// null 변형은 없습니다. "값 없음"은 키가 없는 것으로 표현합니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BeaconValue {
    /// 문자열 값
    Str(String),
    /// 정수 값
    Int(i64),
    /// 실수 값
    Float(f64),
}

impl BeaconValue {
    /// 문자열 값이면 참조를 반환합니다.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// 정수 값이면 반환합니다.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for BeaconValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => f.write_str(s),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
        }
    }
}

impl From<&str> for BeaconValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_owned())
    }
}

impl From<String> for BeaconValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<i64> for BeaconValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for BeaconValue {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<u32> for BeaconValue {
    fn from(value: u32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<u64> for BeaconValue {
    fn from(value: u64) -> Self {
        Self::Int(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

impl From<usize> for BeaconValue {
    fn from(value: usize) -> Self {
        Self::Int(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

impl From<f64> for BeaconValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for BeaconValue {
    fn from(value: bool) -> Self {
        Self::Int(i64::from(value))
    }
}

/// 비콘 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BeaconKind {
    /// 페이지 로드 완료 비콘
    PageLoad,
    /// 로드 완료 전 중간(early) 비콘
    Early,
    /// SPA 소프트 내비게이션 비콘
    Spa,
    /// 에러 배치 비콘
    Error,
    /// 주기적 연속성(continuity) 비콘
    Interval,
    /// API 호출로 수동 트리거된 비콘
    Manual,
    /// 페이지 언로드 비콘
    Unload,
}

impl BeaconKind {
    /// 로그와 메트릭 레이블에 쓰는 이름
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PageLoad => "page_load",
            Self::Early => "early",
            Self::Spa => "spa",
            Self::Error => "error",
            Self::Interval => "interval",
            Self::Manual => "manual",
            Self::Unload => "unload",
        }
    }
}

impl fmt::Display for BeaconKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 전송 수단
///
/// 선언 순서가 곧 폴백 우선순위입니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    /// 이미지 픽셀 GET
    Image,
    /// 언로드에도 살아남는 단방향 전송 (`navigator.sendBeacon` 계열)
    SendBeacon,
    /// 숨겨진 폼 POST
    FormPost,
    /// 비동기 요청(XHR 계열) POST
    Xhr,
}

impl TransportKind {
    /// 우선순위 순서의 전체 목록
    pub const PRIORITY: [TransportKind; 4] = [
        TransportKind::Image,
        TransportKind::SendBeacon,
        TransportKind::FormPost,
        TransportKind::Xhr,
    ];

    /// 로그와 메트릭 레이블에 쓰는 이름
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::SendBeacon => "send_beacon",
            Self::FormPost => "form_post",
            Self::Xhr => "xhr",
        }
    }

    /// 페이로드를 요청 본문에 싣는 수단인지 여부
    pub fn carries_body(&self) -> bool {
        !matches!(self, Self::Image)
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// finalize가 끝난 불변 비콘
///
/// 내부 파라미터는 `Arc`로 공유되므로 복제 비용이 낮습니다.
#[derive(Debug, Clone, PartialEq)]
pub struct BeaconSnapshot {
    kind: BeaconKind,
    params: Arc<[(String, BeaconValue)]>,
}

impl BeaconSnapshot {
    /// 삽입 순서가 보존된 파라미터 목록으로 스냅샷을 만듭니다.
    pub fn new(kind: BeaconKind, params: Vec<(String, BeaconValue)>) -> Self {
        Self {
            kind,
            params: params.into(),
        }
    }

    /// 비콘 종류
    pub fn kind(&self) -> BeaconKind {
        self.kind
    }

    /// 키에 해당하는 값을 반환합니다.
    pub fn get(&self, key: &str) -> Option<&BeaconValue> {
        self.params.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// 키 존재 여부
    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// 주어진 접두어로 시작하는 키가 하나라도 있는지 확인합니다.
    pub fn has_prefix(&self, prefix: &str) -> bool {
        self.params.iter().any(|(k, _)| k.starts_with(prefix))
    }

    /// 삽입 순서대로 파라미터를 순회합니다.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &BeaconValue)> {
        self.params.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// 파라미터 수
    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// 파라미터가 없는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}

/// 전송 수단에 넘기는 요청
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BeaconRequest {
    /// 사용할 전송 수단
    pub transport: TransportKind,
    /// 요청 URL (GET이면 쿼리 문자열 포함)
    pub url: String,
    /// form-encoded 본문 (POST 계열만)
    pub body: Option<String>,
}
