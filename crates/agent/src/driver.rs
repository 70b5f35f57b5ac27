//! 비동기 드라이버: 채널 신호와 주기 tick으로 에이전트를 구동합니다.
//!
//! 호스트 어댑터는 페이지 생명주기 신호를 [`LifecycleSignal`]로 보내고,
//! 드라이버는 단일 태스크 안에서 신호 처리와 [`Agent::tick`]을 번갈아 수행합니다.
//! 에이전트는 이 태스크만 소유하므로 잠금이 필요 없습니다.
//!
//! 종료 조건:
//! - `CancellationToken` 취소
//! - 신호 채널의 모든 송신자가 drop됨

use std::time::Duration;

use tidemark_capture::errors::ErrorRecord;
use tidemark_capture::resource::ResourceEntry;
use tidemark_core::beacon::BeaconValue;
use tidemark_core::types::{ConsentState, PageContext};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::agent::Agent;
use crate::orchestrator::BeaconOutcome;
use crate::payload::VarScope;

/// 호스트가 보내는 생명주기 신호
#[derive(Debug, Clone)]
pub enum LifecycleSignal {
    /// 새 페이지 로드 시작
    PageLoadStarted(PageContext),
    /// 문서 로드 완료
    LoadEvent,
    /// 페이지 준비 완료 (페이지 로드 비콘)
    PageReady,
    /// SPA 내비게이션 시작 (새 URL)
    SpaNavigationStarted(String),
    /// SPA 내비게이션 완료
    SpaNavigationComplete,
    /// 중간 비콘 요청
    Early,
    /// 수동 비콘 요청
    Manual,
    /// 페이지 언로드
    Unload,
    /// 에러 발생
    Error(ErrorRecord),
    /// 리소스 타이밍 엔트리 도착
    Resources(Vec<ResourceEntry>),
    /// 동의 상태 변경
    Consent(ConsentState),
    /// 페이로드 값 추가
    AddVar {
        /// 키
        key: String,
        /// 값
        value: BeaconValue,
        /// 수명 범위
        scope: VarScope,
    },
}

/// 드라이버 종료 시 집계
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DriverSummary {
    /// 처리한 신호 수
    pub signals: usize,
    /// 수행한 tick 수
    pub ticks: usize,
    /// 전송 수단에 넘겨진 비콘 수
    pub beacons_sent: usize,
}

impl DriverSummary {
    fn record(&mut self, outcomes: &[BeaconOutcome]) {
        self.beacons_sent += outcomes.iter().filter(|o| o.is_sent()).count();
    }
}

/// 신호 하나를 에이전트에 적용하고 발생한 비콘 결과를 반환합니다.
pub fn apply_signal(agent: &mut Agent, signal: LifecycleSignal) -> Vec<BeaconOutcome> {
    match signal {
        LifecycleSignal::PageLoadStarted(page) => {
            agent.page_load_started(page);
            Vec::new()
        }
        LifecycleSignal::LoadEvent => {
            agent.load_event();
            Vec::new()
        }
        LifecycleSignal::PageReady => vec![agent.page_ready()],
        LifecycleSignal::SpaNavigationStarted(url) => {
            agent.spa_navigation_started(url);
            Vec::new()
        }
        LifecycleSignal::SpaNavigationComplete => vec![agent.spa_navigation_complete()],
        LifecycleSignal::Early => vec![agent.early_beacon()],
        LifecycleSignal::Manual => vec![agent.send_beacon()],
        LifecycleSignal::Unload => vec![agent.unload()],
        LifecycleSignal::Error(record) => {
            agent.record_error(record);
            Vec::new()
        }
        LifecycleSignal::Resources(entries) => {
            agent.add_resource_entries(entries);
            Vec::new()
        }
        LifecycleSignal::Consent(state) => agent.set_consent(state),
        LifecycleSignal::AddVar { key, value, scope } => {
            if let Err(e) = agent.add_var_scoped(key, value, scope) {
                warn!(error = %e, "rejected payload variable");
            }
            Vec::new()
        }
    }
}

/// 에이전트를 구동합니다.
///
/// 첫 tick은 즉시 실행됩니다. 밀린 tick은 건너뜁니다.
pub async fn run(
    agent: &mut Agent,
    mut signals: mpsc::Receiver<LifecycleSignal>,
    tick_every: Duration,
    cancel: CancellationToken,
) -> DriverSummary {
    let mut summary = DriverSummary::default();
    let mut interval = tokio::time::interval(tick_every);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!(tick_ms = tick_every.as_millis() as u64, "agent driver started");

    loop {
        tokio::select! {
            signal = signals.recv() => {
                match signal {
                    Some(signal) => {
                        summary.signals += 1;
                        let outcomes = apply_signal(agent, signal);
                        summary.record(&outcomes);
                    }
                    None => {
                        debug!("signal channel closed, stopping driver");
                        break;
                    }
                }
            }
            _ = interval.tick() => {
                summary.ticks += 1;
                if let Some(outcome) = agent.tick() {
                    summary.record(&[outcome]);
                }
            }
            _ = cancel.cancelled() => {
                info!("agent driver received shutdown signal");
                break;
            }
        }
    }

    info!(
        signals = summary.signals,
        ticks = summary.ticks,
        beacons_sent = summary.beacons_sent,
        "agent driver stopped"
    );
    summary
}
