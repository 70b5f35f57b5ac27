//! 에러 버퍼
//!
//! 한 전송 창 동안 발생한 에러를 모읍니다. 메시지, 파일, 줄, 열이 같은 에러는
//! 하나의 레코드로 합쳐 `count`만 올립니다. 용량에 도달하면 새로운 에러는
//! 버리지만, 이미 있는 에러의 카운트는 계속 올라갑니다.
//!
//! 드레인은 항상 버퍼를 비웁니다 (최대 한 번 전달).

use metrics::counter;
use serde::{Deserialize, Serialize};
use tidemark_core::metrics as m;
use tracing::{debug, warn};

use crate::codec;

/// 에러가 수집된 경로
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorVia {
    /// 애플리케이션이 직접 보고
    #[default]
    App,
    /// 전역 에러 핸들러
    GlobalErrorHandler,
    /// 네트워크 요청 실패
    Network,
    /// 콘솔 에러 출력
    Console,
    /// 이벤트 핸들러 안에서 발생
    EventHandler,
    /// 타이머 콜백 안에서 발생
    Timeout,
}

impl ErrorVia {
    /// 코덱에서 쓰는 숫자 코드
    pub fn code(&self) -> i64 {
        match self {
            Self::App => 1,
            Self::GlobalErrorHandler => 2,
            Self::Network => 3,
            Self::Console => 4,
            Self::EventHandler => 5,
            Self::Timeout => 6,
        }
    }

    /// 숫자 코드에서 변환합니다.
    pub fn from_code(code: i64) -> Option<Self> {
        Some(match code {
            1 => Self::App,
            2 => Self::GlobalErrorHandler,
            3 => Self::Network,
            4 => Self::Console,
            5 => Self::EventHandler,
            6 => Self::Timeout,
            _ => return None,
        })
    }
}

fn default_count() -> u32 {
    1
}

/// 에러 레코드
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorRecord {
    /// 에러 메시지
    pub message: String,
    /// 발생 파일
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// 줄 번호
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    /// 열 번호
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,
    /// 스택 트레이스
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
    /// 전송 창 안에서의 발생 횟수
    #[serde(default = "default_count")]
    pub count: u32,
    /// 수집 경로
    #[serde(default)]
    pub via: ErrorVia,
    /// 에러 타입 이름 (TypeError 등)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,
    /// 처음 발생한 시각 (에포크 밀리초)
    #[serde(default)]
    pub timestamp: u64,
}

impl ErrorRecord {
    /// 메시지만 있는 레코드를 만듭니다.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
            line: None,
            column: None,
            stack: None,
            count: 1,
            via: ErrorVia::App,
            type_name: None,
            timestamp: 0,
        }
    }

    /// 발생 위치를 지정합니다.
    pub fn at(mut self, source: impl Into<String>, line: u32, column: u32) -> Self {
        self.source = Some(source.into());
        self.line = Some(line);
        self.column = Some(column);
        self
    }

    /// 수집 경로를 지정합니다.
    pub fn via(mut self, via: ErrorVia) -> Self {
        self.via = via;
        self
    }

    /// 스택 트레이스를 지정합니다.
    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }

    /// 타입 이름을 지정합니다.
    pub fn with_type_name(mut self, type_name: impl Into<String>) -> Self {
        self.type_name = Some(type_name.into());
        self
    }

    /// 발생 시각을 지정합니다.
    pub fn with_timestamp(mut self, timestamp: u64) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// 같은 에러인지 판정합니다 (메시지 + 파일 + 줄 + 열).
    pub fn same_identity(&self, other: &Self) -> bool {
        self.message == other.message
            && self.source == other.source
            && self.line == other.line
            && self.column == other.column
    }
}

/// 플랫폼 에러 원천
pub trait ErrorSource: Send {
    /// 마지막 호출 이후 관찰된 에러를 꺼냅니다.
    fn drain_errors(&mut self) -> Vec<ErrorRecord>;
}

/// [`ErrorBuffer::record`] 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    /// 새 레코드로 추가됨
    Appended,
    /// 기존 레코드의 카운트가 올라감 (현재 카운트)
    Incremented(u32),
    /// 용량 초과로 버려짐
    Dropped,
}

/// 에러 버퍼
#[derive(Debug)]
pub struct ErrorBuffer {
    records: Vec<ErrorRecord>,
    max_errors: usize,
    dropped_count: u64,
}

impl ErrorBuffer {
    /// 새 버퍼를 만듭니다.
    pub fn new(max_errors: usize) -> Self {
        Self {
            records: Vec::with_capacity(max_errors.min(64)),
            max_errors,
            dropped_count: 0,
        }
    }

    /// 에러를 기록합니다.
    pub fn record(&mut self, record: ErrorRecord) -> RecordOutcome {
        if let Some(existing) = self.records.iter_mut().find(|r| r.same_identity(&record)) {
            existing.count = existing.count.saturating_add(record.count.max(1));
            debug!(count = existing.count, "duplicate error incremented");
            return RecordOutcome::Incremented(existing.count);
        }

        if self.records.len() >= self.max_errors {
            self.dropped_count += 1;
            counter!(m::ERRORS_DROPPED_TOTAL).increment(1);
            warn!(
                dropped = self.dropped_count,
                max_errors = self.max_errors,
                "error buffer full, dropped new error"
            );
            return RecordOutcome::Dropped;
        }

        let mut record = record;
        record.count = record.count.max(1);
        self.records.push(record);
        RecordOutcome::Appended
    }

    /// 버퍼 내용을 압축해 반환하고 비웁니다. 비어 있으면 `None`.
    pub fn drain_and_encode(&mut self) -> Option<String> {
        if self.records.is_empty() {
            return None;
        }
        let records = std::mem::take(&mut self.records);
        let encoded = codec::compress(&records);
        debug!(records = records.len(), bytes = encoded.len(), "error buffer drained");
        Some(encoded)
    }

    /// 현재 레코드
    pub fn records(&self) -> &[ErrorRecord] {
        &self.records
    }

    /// 현재 레코드 수
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// 비어 있는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// 지금까지 버려진 에러 수
    pub fn dropped_count(&self) -> u64 {
        self.dropped_count
    }
}
