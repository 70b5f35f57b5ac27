//! 비콘 오케스트레이터 상태
//!
//! ```text
//! Idle ──page load / SPA──▶ Collecting ──trigger──▶ Finalizing ──▶ Sending ──▶ Idle
//!                                                        │
//!                                     consent ≠ opted-in └──▶ Suppressed (큐 보관)
//! ```
//!
//! 이 모듈은 상태, 결과 타입, 페이지 생명주기 플래그, 동의 대기 큐를 담습니다.
//! 흐름 자체는 [`Agent`](crate::agent::Agent)가 구동합니다.

use std::collections::VecDeque;
use std::fmt;

use metrics::counter;
use tidemark_capture::resource::ResourceMark;
use tidemark_core::beacon::{BeaconKind, BeaconSnapshot, TransportKind};
use tidemark_core::metrics as m;
use tracing::{debug, warn};

/// 동의 대기 큐 최대 길이
pub const MAX_PENDING_BEACONS: usize = 32;

/// 오케스트레이터 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrchestratorState {
    /// 대기
    Idle,
    /// 페이지 로드 또는 SPA 내비게이션 데이터 수집 중
    Collecting,
    /// 페이로드 확정 중
    Finalizing,
    /// 전송 수단에 넘기는 중
    Sending,
    /// 동의가 없어 전송이 멈춤
    Suppressed,
}

impl fmt::Display for OrchestratorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Collecting => "collecting",
            Self::Finalizing => "finalizing",
            Self::Sending => "sending",
            Self::Suppressed => "suppressed",
        };
        f.write_str(name)
    }
}

/// 생명주기 진입점의 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BeaconOutcome {
    /// 전송 수단에 넘겨짐
    Sent(TransportKind),
    /// 동의 대기로 큐에 보관됨
    Queued,
    /// 모든 전송 수단이 거부해 버려짐
    Dropped,
    /// 동의 거부 상태라 만들지 않음
    Suppressed,
    /// 해당 비콘 종류가 비활성화되었거나 보낼 것이 없음
    Skipped,
}

impl BeaconOutcome {
    /// 전송 수단에 넘겨졌는지 확인합니다.
    pub fn is_sent(&self) -> bool {
        matches!(self, Self::Sent(_))
    }
}

/// 한 페이지 로드 동안의 생명주기 플래그
#[derive(Debug, Clone, Default)]
pub struct PageLifecycle {
    /// 내비게이션(또는 SPA 라우트) 시작 시각
    pub start_ms: u64,
    /// 문서 로드 완료 여부
    pub load_complete: bool,
    /// 이번 페이지 로드에서 `nt_*`를 이미 실었는지 여부
    pub nt_sent: bool,
    /// 로드 이후 에러 비콘 예정 시각
    pub error_beacon_due: Option<u64>,
    /// 마지막 비콘 finalize 시각
    pub last_beacon_ms: Option<u64>,
    /// 마지막 연속성 비콘 시각
    pub last_interval_ms: Option<u64>,
}

impl PageLifecycle {
    /// 새 페이지 로드를 시작합니다. `nt_sent`는 여기서만 초기화됩니다.
    pub fn begin_page_load(&mut self, now_ms: u64) {
        *self = Self {
            start_ms: now_ms,
            ..Self::default()
        };
    }

    /// SPA 내비게이션을 시작합니다. 로드 완료와 `nt_sent` 상태는 유지됩니다.
    pub fn begin_spa_navigation(&mut self, now_ms: u64) {
        self.start_ms = now_ms;
    }

    /// 이번 비콘에 `nt_*`를 실을지 결정하고, 싣는다면 플래그를 세웁니다.
    ///
    /// finalize 시점에만 호출해야 합니다.
    pub fn claim_navigation_timing(&mut self, kind: BeaconKind) -> bool {
        let eligible = match kind {
            BeaconKind::PageLoad => true,
            BeaconKind::Early => self.load_complete,
            _ => false,
        };
        if eligible && !self.nt_sent {
            self.nt_sent = true;
            true
        } else {
            false
        }
    }
}

/// 동의 대기 중인 비콘
#[derive(Debug, Clone)]
pub struct PendingBeacon {
    /// finalize된 스냅샷
    pub snapshot: BeaconSnapshot,
    /// finalize 당시 언로드 중이었는지 여부
    pub unloading: bool,
    /// finalize 때 예약한 세션 길이
    pub reserved_length: u32,
    /// finalize 때 예약한 리소스 타이밍 엔트리
    pub resources: ResourceMark,
}

/// 동의 대기 큐
#[derive(Debug, Default)]
pub struct PendingQueue {
    items: VecDeque<PendingBeacon>,
}

impl PendingQueue {
    /// 비콘을 보관합니다. 가득 차면 가장 오래된 비콘을 버리고 돌려줍니다.
    pub fn push(&mut self, beacon: PendingBeacon) -> Option<PendingBeacon> {
        let evicted = if self.items.len() >= MAX_PENDING_BEACONS {
            counter!(m::BEACONS_DISCARDED_TOTAL).increment(1);
            warn!(capacity = MAX_PENDING_BEACONS, "pending beacon queue full, discarded oldest");
            self.items.pop_front()
        } else {
            None
        };
        counter!(m::BEACONS_QUEUED_TOTAL).increment(1);
        debug!(kind = beacon.snapshot.kind().as_str(), "beacon queued pending consent");
        self.items.push_back(beacon);
        evicted
    }

    /// 보관된 비콘을 순서대로 꺼냅니다.
    pub fn take_all(&mut self) -> Vec<PendingBeacon> {
        self.items.drain(..).collect()
    }

    /// 보관된 비콘을 모두 버리고 돌려줍니다.
    pub fn discard(&mut self) -> Vec<PendingBeacon> {
        let discarded: Vec<PendingBeacon> = self.items.drain(..).collect();
        if !discarded.is_empty() {
            counter!(m::BEACONS_DISCARDED_TOTAL).increment(discarded.len() as u64);
            debug!(count = discarded.len(), "pending beacons discarded");
        }
        discarded
    }

    /// 보관된 비콘 수
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// 비어 있는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
