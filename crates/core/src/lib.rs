#![doc = include_str!("../README.md")]
//!
//! # 모듈 구성
//!
//! - [`beacon`]: 비콘 값, 종류, 불변 스냅샷, 전송 요청
//! - [`capability`]: 쿠키/시계/전송 채널 capability trait과 인메모리 구현
//! - [`config`]: `tidemark.toml` 설정
//! - [`error`]: 도메인 에러 타입
//! - [`event`]: 타입이 지정된 생명주기 이벤트 버스
//! - [`metrics`]: 진단 카운터 이름
//! - [`types`]: 동의 상태, 페이지 컨텍스트 등 공유 타입

pub mod beacon;
pub mod capability;
pub mod config;
pub mod error;
pub mod event;
pub mod metrics;
pub mod types;

// --- 주요 타입 re-export ---
// 각 모듈의 핵심 타입을 크레이트 루트에서 바로 사용할 수 있도록 합니다.

// 에러
pub use error::{CodecError, ConfigError, StorageError, TidemarkError, TransportError};

// 설정
pub use config::TidemarkConfig;

// 비콘
pub use beacon::{BeaconKind, BeaconRequest, BeaconSnapshot, BeaconValue, TransportKind};

// capability
pub use capability::{
    BeaconChannel, Clock, CookieJar, ManualClock, MemoryCookieJar, RecordingChannel, SystemClock,
};

// 이벤트
pub use event::{AgentEvent, EventBus, EventKind, SubscriptionId};

// 도메인 타입
pub use types::{BeaconMethod, ConsentMode, ConsentState, PageContext, SameSiteMode};
