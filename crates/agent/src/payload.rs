//! 페이로드 누적기
//!
//! 삽입 순서를 보존하는 평면 key/value 맵입니다. 각 키에는 수명 범위가 있습니다.
//!
//! | 범위 | finalize 후 | 새 페이지 로드 |
//! |------|-------------|----------------|
//! | `Beacon` | 제거 | 제거 |
//! | `PageLoad` | 제거 | 제거 (전송 전이라도) |
//! | `Session` | 유지 | 유지 |
//!
//! `rt.*` 키는 오케스트레이터 전용이며 협력자의 기록은 거부됩니다.

use indexmap::IndexMap;
use tidemark_core::beacon::{BeaconKind, BeaconSnapshot, BeaconValue};

use crate::error::PayloadError;

/// 오케스트레이터 전용 키 접두어
pub const RESERVED_PREFIX: &str = "rt.";

/// 키 수명 범위
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum VarScope {
    /// 다음 비콘 finalize까지
    #[default]
    Beacon,
    /// 다음 비콘 finalize 또는 다음 페이지 로드까지
    PageLoad,
    /// 명시적으로 제거할 때까지
    Session,
}

/// 페이로드 누적기
#[derive(Debug, Default)]
pub struct PayloadAccumulator {
    vars: IndexMap<String, (BeaconValue, VarScope)>,
}

impl PayloadAccumulator {
    /// 빈 누적기를 만듭니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 값을 기록합니다. 같은 키가 있으면 값과 범위를 덮어쓰고 위치는 유지합니다.
    pub fn set(
        &mut self,
        key: impl Into<String>,
        value: impl Into<BeaconValue>,
        scope: VarScope,
    ) -> Result<(), PayloadError> {
        let key = key.into();
        if key.is_empty() {
            return Err(PayloadError::EmptyKey);
        }
        if key.starts_with(RESERVED_PREFIX) {
            return Err(PayloadError::ReservedKey(key));
        }
        self.vars.insert(key, (value.into(), scope));
        Ok(())
    }

    /// 오케스트레이터 전용 기록. 범위는 항상 `Beacon`입니다.
    pub(crate) fn set_reserved(&mut self, key: &str, value: impl Into<BeaconValue>) {
        self.vars
            .insert(key.to_owned(), (value.into(), VarScope::Beacon));
    }

    /// 값을 조회합니다.
    pub fn get(&self, key: &str) -> Option<&BeaconValue> {
        self.vars.get(key).map(|(v, _)| v)
    }

    /// 키 존재 여부
    pub fn has(&self, key: &str) -> bool {
        self.vars.contains_key(key)
    }

    /// 키를 제거하고 값을 반환합니다. 나머지 순서는 유지됩니다.
    pub fn remove(&mut self, key: &str) -> Option<BeaconValue> {
        self.vars.shift_remove(key).map(|(v, _)| v)
    }

    /// 키 수
    pub fn len(&self) -> usize {
        self.vars.len()
    }

    /// 비어 있는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// 새 페이지 로드: 전송되지 않은 `Beacon`/`PageLoad` 범위 키를 버립니다.
    pub fn begin_page_load(&mut self) {
        self.vars
            .retain(|_, (_, scope)| *scope == VarScope::Session);
    }

    /// 불변 스냅샷을 만들고 `Session` 범위가 아닌 키를 모두 제거합니다.
    pub fn finalize(&mut self, kind: BeaconKind) -> BeaconSnapshot {
        let params = self
            .vars
            .iter()
            .map(|(k, (v, _))| (k.clone(), v.clone()))
            .collect();
        self.vars
            .retain(|_, (_, scope)| *scope == VarScope::Session);
        BeaconSnapshot::new(kind, params)
    }
}
