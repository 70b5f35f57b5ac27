#![doc = include_str!("../README.md")]
//!
//! # 모듈 구성
//!
//! - [`query`]: 비콘 쿼리 문자열 직렬화
//! - [`negotiator`]: 전송 수단 선택과 폴백

pub mod negotiator;
pub mod query;

pub use negotiator::TransportNegotiator;
