//! 이벤트 버스: 에이전트 생명주기 알림
//!
//! 문자열 이벤트 이름 대신 고정된 [`EventKind`] 열거형을 사용합니다.
//! 리스너는 등록 순서대로, 동기적으로 호출됩니다.

use std::fmt;

use crate::beacon::{BeaconKind, BeaconSnapshot, TransportKind};
use crate::types::ConsentState;

/// 구독 가능한 이벤트 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// 비콘 finalize 직전
    BeforeBeacon,
    /// 비콘이 전송 수단에 넘겨진 직후
    OnBeacon,
    /// 에러가 기록된 직후
    OnError,
    /// 동의 상태가 바뀐 직후
    ConsentChanged,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::BeforeBeacon => "before_beacon",
            Self::OnBeacon => "on_beacon",
            Self::OnError => "on_error",
            Self::ConsentChanged => "consent_changed",
        };
        f.write_str(name)
    }
}

/// 리스너에 전달되는 이벤트
#[derive(Debug, Clone)]
pub enum AgentEvent {
    /// 비콘 finalize 직전
    BeforeBeacon {
        /// 비콘 종류
        kind: BeaconKind,
    },
    /// 비콘 핸드오프 완료
    Beacon {
        /// 전송된 스냅샷
        snapshot: BeaconSnapshot,
        /// 사용된 전송 수단
        transport: TransportKind,
    },
    /// 에러 기록
    Error {
        /// 에러 메시지
        message: String,
        /// 현재 전송 창에서의 누적 발생 횟수
        count: u32,
    },
    /// 동의 상태 변경
    ConsentChanged {
        /// 이전 상태
        from: ConsentState,
        /// 새 상태
        to: ConsentState,
    },
}

impl AgentEvent {
    /// 이벤트 종류
    pub fn kind(&self) -> EventKind {
        match self {
            Self::BeforeBeacon { .. } => EventKind::BeforeBeacon,
            Self::Beacon { .. } => EventKind::OnBeacon,
            Self::Error { .. } => EventKind::OnError,
            Self::ConsentChanged { .. } => EventKind::ConsentChanged,
        }
    }
}

/// 리스너 타입
pub type Listener = Box<dyn FnMut(&AgentEvent) + Send>;

/// 구독 해제에 쓰는 식별자
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// 타입이 지정된 동기 이벤트 버스
#[derive(Default)]
pub struct EventBus {
    listeners: Vec<(SubscriptionId, EventKind, Listener)>,
    next_id: u64,
}

impl EventBus {
    /// 빈 버스를 만듭니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 리스너를 등록합니다.
    pub fn subscribe(&mut self, kind: EventKind, listener: Listener) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.listeners.push((id, kind, listener));
        tracing::debug!(event = %kind, "listener subscribed");
        id
    }

    /// 리스너를 해제합니다. 해제되었으면 `true`를 반환합니다.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(sid, _, _)| *sid != id);
        self.listeners.len() != before
    }

    /// 이벤트를 해당 종류의 리스너들에게 등록 순서대로 전달합니다.
    pub fn emit(&mut self, event: &AgentEvent) {
        let kind = event.kind();
        for (_, _, listener) in self.listeners.iter_mut().filter(|(_, k, _)| *k == kind) {
            listener(event);
        }
    }

    /// 해당 종류의 리스너 수
    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.listeners.iter().filter(|(_, k, _)| *k == kind).count()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
