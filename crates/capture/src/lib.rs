#![doc = include_str!("../README.md")]
//!
//! # 모듈 구성
//!
//! - [`resource`]: 리소스 타이밍 버퍼와 플랫폼 타임라인 trait
//! - [`errors`]: 에러 레코드, 에러 버퍼, 에러 원천 trait
//! - [`codec`]: URL 안전 압축 코덱

pub mod codec;
pub mod errors;
pub mod resource;

// --- 주요 타입 re-export ---

pub use codec::{compress, decompress};
pub use errors::{ErrorBuffer, ErrorRecord, ErrorSource, ErrorVia, RecordOutcome};
pub use resource::{
    DrainPolicy, NetworkActivityObserver, PerformanceTimeline, ResourceBuffer, ResourceEntry,
    ResourceMark,
};
