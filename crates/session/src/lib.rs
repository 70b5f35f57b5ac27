#![doc = include_str!("../README.md")]
//!
//! # 모듈 구성
//!
//! - [`cookie`]: 세션 상태와 쿠키 값 인코딩/디코딩
//! - [`store`]: 쿠키 저장소 위의 로드/저장/삭제
//! - [`hash`]: URL 지문
//! - [`base36`]: base 36 정수 표현
//! - [`error`]: 도메인 에러 타입

pub mod base36;
pub mod cookie;
pub mod error;
pub mod hash;
pub mod store;

// --- 주요 타입 re-export ---

pub use cookie::Session;
pub use error::SessionError;
pub use hash::navigation_hash;
pub use store::{SessionLoad, SessionStore};
