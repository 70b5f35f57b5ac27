#![doc = include_str!("../README.md")]
//!
//! # 모듈 구성
//!
//! - [`agent`]: 에이전트 진입점과 플랫폼 capability 묶음
//! - [`consent`]: 동의 게이트
//! - [`driver`]: tokio 기반 비동기 드라이버
//! - [`error`]: 에이전트 에러 타입
//! - [`orchestrator`]: 오케스트레이터 상태와 동의 대기 큐
//! - [`page_group`]: URL 기반 페이지 그룹 분류
//! - [`payload`]: 페이로드 누적기

pub mod agent;
pub mod consent;
pub mod driver;
pub mod error;
pub mod orchestrator;
pub mod page_group;
pub mod payload;

// 주요 타입 re-export
pub use agent::{Agent, Platform};
pub use consent::ConsentGate;
pub use driver::{DriverSummary, LifecycleSignal, apply_signal, run};
pub use error::{AgentError, PayloadError};
pub use orchestrator::{BeaconOutcome, OrchestratorState};
pub use page_group::PageGroups;
pub use payload::{PayloadAccumulator, VarScope};
