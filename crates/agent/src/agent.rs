//! 에이전트: 비콘 생명주기 엔진의 진입점
//!
//! [`Agent`]는 세션 저장소, 동의 게이트, 페이로드 누적기, 캡처 버퍼,
//! 전송 협상기를 소유하고 페이지 생명주기 신호에 따라 비콘을 만들어 보냅니다.
//!
//! 모든 메서드는 동기적이며 단일 스레드에서 순서대로 호출된다고 가정합니다.
//! 생명주기 진입점은 에러를 반환하지 않고 [`BeaconOutcome`]을 반환합니다.
//!
//! # 사용 예시
//! ```ignore
//! let platform = Platform::new(jar, SystemClock, channel, PageContext::new(url));
//! let mut agent = Agent::init(config, platform)?;
//!
//! agent.add_var("t_done", 1234)?;
//! agent.set_consent(ConsentState::OptedIn);
//! let outcome = agent.page_ready();
//! ```

use indexmap::IndexMap;
use metrics::counter;
use tidemark_capture::errors::{ErrorBuffer, ErrorRecord, ErrorSource, RecordOutcome};
use tidemark_capture::resource::{
    self, DrainPolicy, NetworkActivityObserver, PerformanceTimeline, ResourceBuffer, ResourceEntry,
    ResourceMark,
};
use tidemark_core::beacon::{BeaconKind, BeaconValue};
use tidemark_core::capability::{BeaconChannel, Clock, CookieJar};
use tidemark_core::config::TidemarkConfig;
use tidemark_core::event::{AgentEvent, EventBus, EventKind, SubscriptionId};
use tidemark_core::metrics as m;
use tidemark_core::types::{ConsentState, PageContext};
use tidemark_session::{Session, SessionLoad, SessionStore, navigation_hash};
use tidemark_transport::TransportNegotiator;
use tracing::{debug, info};

use crate::consent::ConsentGate;
use crate::error::{AgentError, PayloadError};
use crate::orchestrator::{
    BeaconOutcome, OrchestratorState, PageLifecycle, PendingBeacon, PendingQueue,
};
use crate::page_group::PageGroups;
use crate::payload::{PayloadAccumulator, VarScope};

/// 내비게이션 타이밍 키 접두어
pub const NAVIGATION_TIMING_PREFIX: &str = "nt_";

// ─── Platform ────────────────────────────────────────────────────────

/// 에이전트에 주입되는 플랫폼 capability 묶음
pub struct Platform {
    cookies: Box<dyn CookieJar>,
    clock: Box<dyn Clock>,
    channel: Box<dyn BeaconChannel>,
    page: PageContext,
    timeline: Option<Box<dyn PerformanceTimeline>>,
    error_source: Option<Box<dyn ErrorSource>>,
    network: Option<Box<dyn NetworkActivityObserver>>,
}

impl Platform {
    /// 필수 capability로 플랫폼을 만듭니다.
    pub fn new(
        cookies: impl CookieJar + 'static,
        clock: impl Clock + 'static,
        channel: impl BeaconChannel + 'static,
        page: PageContext,
    ) -> Self {
        Self {
            cookies: Box::new(cookies),
            clock: Box::new(clock),
            channel: Box::new(channel),
            page,
            timeline: None,
            error_source: None,
            network: None,
        }
    }

    /// 리소스 타이밍 타임라인을 연결합니다.
    pub fn with_timeline(mut self, timeline: impl PerformanceTimeline + 'static) -> Self {
        self.timeline = Some(Box::new(timeline));
        self
    }

    /// 에러 원천을 연결합니다.
    pub fn with_error_source(mut self, source: impl ErrorSource + 'static) -> Self {
        self.error_source = Some(Box::new(source));
        self
    }

    /// 네트워크 활동 관찰자를 연결합니다.
    pub fn with_network_observer(mut self, observer: impl NetworkActivityObserver + 'static) -> Self {
        self.network = Some(Box::new(observer));
        self
    }
}

impl std::fmt::Debug for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Platform")
            .field("page", &self.page)
            .field("timeline", &self.timeline.is_some())
            .field("error_source", &self.error_source.is_some())
            .field("network", &self.network.is_some())
            .finish()
    }
}

// ─── Agent ───────────────────────────────────────────────────────────

/// 비콘 생명주기 엔진
#[derive(Debug)]
pub struct Agent {
    config: TidemarkConfig,
    platform: Platform,
    state: OrchestratorState,
    consent: ConsentGate,
    sessions: SessionStore,
    /// 메모리상의 현재 세션 (동의 전에도 길이를 이어가기 위해 유지)
    session: Option<Session>,
    payload: PayloadAccumulator,
    /// 페이지 로드당 한 번만 실리는 `nt_*` 값
    navigation_timing: IndexMap<String, BeaconValue>,
    resources: ResourceBuffer,
    errors: ErrorBuffer,
    negotiator: TransportNegotiator,
    page_groups: PageGroups,
    lifecycle: PageLifecycle,
    pending: PendingQueue,
    bus: EventBus,
    init_ms: u64,
}

impl Agent {
    /// 설정을 검증하고 에이전트를 만듭니다.
    ///
    /// 호스트로 에러가 전파되는 유일한 지점입니다.
    /// 복원된 동의 상태가 `opted-out`이면 남아 있는 세션 쿠키를 지웁니다.
    pub fn init(config: TidemarkConfig, mut platform: Platform) -> Result<Self, AgentError> {
        config.validate()?;
        let page_groups = PageGroups::compile(&config.page_groups)?;

        let consent = ConsentGate::init(&config.consent, &config.session, platform.cookies.as_ref());
        let sessions = SessionStore::new(&config.session);
        if consent.state() == ConsentState::OptedOut
            && platform.cookies.read(sessions.cookie_name()).is_some()
        {
            sessions.remove(platform.cookies.as_mut());
        }
        let init_ms = platform.clock.now_ms();
        let mut lifecycle = PageLifecycle::default();
        lifecycle.begin_page_load(init_ms);

        let state = if consent.permits_activity() {
            OrchestratorState::Idle
        } else {
            OrchestratorState::Suppressed
        };

        info!(
            url = %platform.page.url,
            consent = %consent.state(),
            page_groups = page_groups.len(),
            "agent initialized"
        );

        Ok(Self {
            sessions,
            resources: ResourceBuffer::new(config.resource_timing.buffer_size),
            errors: ErrorBuffer::new(config.errors.max_errors),
            negotiator: TransportNegotiator::new(&config.beacon),
            config,
            platform,
            state,
            consent,
            session: None,
            payload: PayloadAccumulator::new(),
            navigation_timing: IndexMap::new(),
            page_groups,
            lifecycle,
            pending: PendingQueue::default(),
            bus: EventBus::new(),
            init_ms,
        })
    }

    // ─── 조회 ────────────────────────────────────────────────────────

    /// 오케스트레이터 상태
    pub fn state(&self) -> OrchestratorState {
        self.state
    }

    /// 동의 상태
    pub fn consent(&self) -> ConsentState {
        self.consent.state()
    }

    /// 메모리상의 현재 세션
    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// 현재 페이지 컨텍스트
    pub fn page(&self) -> &PageContext {
        &self.platform.page
    }

    /// 설정
    pub fn config(&self) -> &TidemarkConfig {
        &self.config
    }

    /// 동의 대기 중인 비콘 수
    pub fn pending_beacons(&self) -> usize {
        self.pending.len()
    }

    /// 리소스 버퍼 엔트리 수
    pub fn resource_buffer_len(&self) -> usize {
        self.resources.len()
    }

    /// 에러 버퍼 레코드 수
    pub fn error_buffer_len(&self) -> usize {
        self.errors.len()
    }

    // ─── 협력자 API ──────────────────────────────────────────────────

    /// 다음 비콘에 실릴 값을 추가합니다.
    pub fn add_var(
        &mut self,
        key: impl Into<String>,
        value: impl Into<BeaconValue>,
    ) -> Result<(), PayloadError> {
        self.add_var_scoped(key, value, VarScope::Beacon)
    }

    /// 범위를 지정해 값을 추가합니다.
    ///
    /// `nt_*` 키는 범위와 관계없이 페이지 로드당 한 번만 전송됩니다.
    pub fn add_var_scoped(
        &mut self,
        key: impl Into<String>,
        value: impl Into<BeaconValue>,
        scope: VarScope,
    ) -> Result<(), PayloadError> {
        let key = key.into();
        if key.starts_with(NAVIGATION_TIMING_PREFIX) {
            self.navigation_timing.insert(key, value.into());
            return Ok(());
        }
        self.payload.set(key, value, scope)
    }

    /// 여러 값을 순서대로 추가합니다. 첫 에러에서 멈춥니다.
    pub fn add_vars<K, V>(&mut self, vars: impl IntoIterator<Item = (K, V)>) -> Result<(), PayloadError>
    where
        K: Into<String>,
        V: Into<BeaconValue>,
    {
        vars.into_iter()
            .try_for_each(|(key, value)| self.add_var(key, value))
    }

    /// 값을 제거합니다.
    pub fn remove_var(&mut self, key: &str) -> Option<BeaconValue> {
        if key.starts_with(NAVIGATION_TIMING_PREFIX) {
            return self.navigation_timing.shift_remove(key);
        }
        self.payload.remove(key)
    }

    /// 이벤트 리스너를 등록합니다.
    pub fn subscribe(
        &mut self,
        kind: EventKind,
        listener: impl FnMut(&AgentEvent) + Send + 'static,
    ) -> SubscriptionId {
        self.bus.subscribe(kind, Box::new(listener))
    }

    /// 이벤트 리스너를 해제합니다.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.bus.unsubscribe(id)
    }

    /// 에러를 기록합니다.
    ///
    /// 로드 이전의 에러는 페이지 로드 비콘에 실리고, 로드 이후의 에러는
    /// `errors.send_interval_ms` 단위로 모아 에러 비콘으로 보냅니다.
    pub fn record_error(&mut self, mut record: ErrorRecord) -> RecordOutcome {
        if !self.config.errors.enabled {
            debug!("error capture disabled, ignoring error");
            return RecordOutcome::Dropped;
        }
        let now = self.now();
        if record.timestamp == 0 {
            record.timestamp = now;
        }
        let message = record.message.clone();

        let outcome = self.errors.record(record);
        let count = match outcome {
            RecordOutcome::Appended => 1,
            RecordOutcome::Incremented(count) => count,
            RecordOutcome::Dropped => return outcome,
        };
        self.bus.emit(&AgentEvent::Error { message, count });

        if self.lifecycle.load_complete
            && self.config.errors.send_after_onload
            && self.lifecycle.error_beacon_due.is_none()
        {
            let due = now.saturating_add(self.config.errors.send_interval_ms);
            self.lifecycle.error_beacon_due = Some(due);
            debug!(due, "error beacon scheduled");
        }
        outcome
    }

    /// 리소스 타이밍 엔트리를 추가합니다. 추가된 개수를 반환합니다.
    pub fn add_resource_entries(&mut self, entries: impl IntoIterator<Item = ResourceEntry>) -> usize {
        if !self.config.resource_timing.enabled {
            return 0;
        }
        self.resources.ingest(entries)
    }

    /// 연결된 에러 원천과 네트워크 관찰자에서 데이터를 가져옵니다.
    ///
    /// 가져온 항목 수를 반환합니다.
    pub fn poll_capabilities(&mut self) -> usize {
        let errors = self
            .platform
            .error_source
            .as_mut()
            .map(|source| source.drain_errors())
            .unwrap_or_default();
        let resources = self
            .platform
            .network
            .as_mut()
            .map(|observer| observer.drain_completed())
            .unwrap_or_default();

        let polled = errors.len() + resources.len();
        for record in errors {
            self.record_error(record);
        }
        self.add_resource_entries(resources);
        polled
    }

    // ─── 동의 ────────────────────────────────────────────────────────

    /// 동의 상태를 바꿉니다.
    ///
    /// - `opted-in`: 대기 중인 비콘을 그대로 전송
    /// - `opted-out`: 세션 쿠키를 지우고 대기 중인 비콘을 폐기
    ///
    /// 대기 비콘 전송 결과를 순서대로 반환합니다.
    pub fn set_consent(&mut self, state: ConsentState) -> Vec<BeaconOutcome> {
        let Some(previous) = self.consent.set_state(
            state,
            self.platform.cookies.as_mut(),
            self.platform.page.is_secure(),
        ) else {
            return Vec::new();
        };
        self.bus.emit(&AgentEvent::ConsentChanged {
            from: previous,
            to: state,
        });

        match state {
            ConsentState::OptedIn => {
                self.transition(OrchestratorState::Idle);
                let pending = self.pending.take_all();
                if !pending.is_empty() {
                    info!(count = pending.len(), "sending beacons queued before consent");
                }
                pending.into_iter().map(|p| self.dispatch(p)).collect()
            }
            ConsentState::OptedOut => {
                self.sessions.remove(self.platform.cookies.as_mut());
                self.session = None;
                for beacon in self.pending.discard() {
                    self.resources.release(beacon.resources);
                }
                self.transition(OrchestratorState::Suppressed);
                Vec::new()
            }
            ConsentState::Undecided => {
                self.transition(OrchestratorState::Suppressed);
                Vec::new()
            }
        }
    }

    // ─── 생명주기 진입점 ─────────────────────────────────────────────

    /// 새 페이지 로드가 시작되었습니다.
    pub fn page_load_started(&mut self, page: PageContext) {
        let now = self.now();
        self.platform.page = page;
        self.lifecycle.begin_page_load(now);
        self.payload.begin_page_load();
        self.navigation_timing.clear();
        self.transition(OrchestratorState::Collecting);
    }

    /// 문서 로드가 끝났습니다 (비콘은 보내지 않음).
    pub fn load_event(&mut self) {
        self.lifecycle.load_complete = true;
        debug!("document load complete");
    }

    /// 페이지가 준비되었습니다. 페이지 로드 비콘을 보냅니다.
    pub fn page_ready(&mut self) -> BeaconOutcome {
        self.lifecycle.load_complete = true;
        self.fire(BeaconKind::PageLoad)
    }

    /// SPA 소프트 내비게이션이 시작되었습니다.
    pub fn spa_navigation_started(&mut self, url: impl Into<String>) {
        let now = self.now();
        self.platform.page.url = url.into();
        self.lifecycle.begin_spa_navigation(now);
        self.payload.begin_page_load();
        self.transition(OrchestratorState::Collecting);
    }

    /// SPA 소프트 내비게이션이 끝났습니다. SPA 비콘을 보냅니다.
    pub fn spa_navigation_complete(&mut self) -> BeaconOutcome {
        self.fire(BeaconKind::Spa)
    }

    /// 로드 완료 전 중간 비콘을 보냅니다.
    pub fn early_beacon(&mut self) -> BeaconOutcome {
        if !self.config.early.enabled {
            return BeaconOutcome::Skipped;
        }
        self.fire(BeaconKind::Early)
    }

    /// API 호출로 비콘을 보냅니다.
    pub fn send_beacon(&mut self) -> BeaconOutcome {
        self.fire(BeaconKind::Manual)
    }

    /// 페이지가 언로드됩니다. 언로드 비콘을 보냅니다.
    pub fn unload(&mut self) -> BeaconOutcome {
        self.platform.page.unloading = true;
        if !self.config.unload.enabled {
            return BeaconOutcome::Skipped;
        }
        self.fire(BeaconKind::Unload)
    }

    /// 주기 평가: capability 폴링, 예정된 에러 비콘, 연속성 비콘.
    ///
    /// 한 번에 최대 한 개의 비콘만 보냅니다.
    pub fn tick(&mut self) -> Option<BeaconOutcome> {
        self.poll_capabilities();
        let now = self.now();

        if let Some(due) = self.lifecycle.error_beacon_due
            && now >= due
        {
            self.lifecycle.error_beacon_due = None;
            return Some(self.fire(BeaconKind::Error));
        }

        if self.continuity_due(now) {
            self.lifecycle.last_interval_ms = Some(now);
            return Some(self.fire(BeaconKind::Interval));
        }
        None
    }

    // ─── 내부 흐름 ───────────────────────────────────────────────────

    fn now(&self) -> u64 {
        self.platform.clock.now_ms()
    }

    fn transition(&mut self, next: OrchestratorState) {
        if self.state != next {
            debug!(from = %self.state, to = %next, "orchestrator state changed");
            self.state = next;
        }
    }

    fn continuity_due(&self, now: u64) -> bool {
        let continuity = &self.config.continuity;
        if !continuity.enabled || !self.lifecycle.load_complete {
            return false;
        }
        let anchor = self
            .lifecycle
            .last_interval_ms
            .unwrap_or(self.lifecycle.start_ms);
        let interval_elapsed = now.saturating_sub(anchor) >= continuity.interval_ms;
        let quiet = self
            .lifecycle
            .last_beacon_ms
            .is_none_or(|last| now.saturating_sub(last) >= continuity.min_wait_ms);
        interval_elapsed && quiet
    }

    fn fire(&mut self, kind: BeaconKind) -> BeaconOutcome {
        if self.consent.state() == ConsentState::OptedOut {
            debug!(kind = kind.as_str(), "consent opted out, beacon suppressed");
            self.transition(OrchestratorState::Suppressed);
            return BeaconOutcome::Suppressed;
        }
        if kind == BeaconKind::Error && self.errors.is_empty() {
            return BeaconOutcome::Skipped;
        }

        self.bus.emit(&AgentEvent::BeforeBeacon { kind });
        self.transition(OrchestratorState::Finalizing);
        let now = self.now();
        let beacon = self.finalize(kind, now);

        if !self.consent.permits_activity() {
            if let Some(evicted) = self.pending.push(beacon) {
                self.resources.release(evicted.resources);
            }
            self.transition(OrchestratorState::Suppressed);
            return BeaconOutcome::Queued;
        }
        self.dispatch(beacon)
    }

    /// 세션 확보, `rt.*` 기록, 버퍼 드레인과 예약, 스냅샷 확정
    fn finalize(&mut self, kind: BeaconKind, now: u64) -> PendingBeacon {
        let page_hash = navigation_hash(&self.platform.page.url);
        let referrer_hash = if self.platform.page.navigation_timing_supported {
            None
        } else {
            self.platform.page.referrer.as_deref().map(navigation_hash)
        };
        let expiry_secs = self.sessions.expiry_secs();

        let session = self.ensure_session(now);
        session.session_length = session.session_length.saturating_add(1);
        session.refresh_expiry(now, expiry_secs);
        session.navigation_hash = Some(page_hash);
        session.referrer_hash = referrer_hash;
        let session_id = session.session_id.clone();
        let session_start = session.session_start;
        let session_length = session.session_length;
        let session_expiry = session.session_expiry;

        let payload = &mut self.payload;
        payload.set_reserved("rt.si", session_id);
        payload.set_reserved("rt.ss", session_start);
        payload.set_reserved("rt.sl", session_length);
        payload.set_reserved("rt.se", session_expiry);
        payload.set_reserved("rt.tstart", self.lifecycle.start_ms);
        payload.set_reserved("rt.end", now);
        if kind == BeaconKind::Unload {
            payload.set_reserved("rt.quit", "");
        }

        payload.set_reserved("h.t", self.init_ms);
        if !self.config.beacon.crumb.is_empty() {
            payload.set_reserved("h.cr", self.config.beacon.crumb.as_str());
        }
        if let Some(group) = self.page_groups.classify(&self.platform.page.url) {
            payload.set_reserved("h.pg", group);
        }

        match kind {
            BeaconKind::Early => payload.set_reserved("early", 1_i64),
            BeaconKind::Spa => payload.set_reserved("http.initiator", "spa"),
            BeaconKind::Error => payload.set_reserved("http.initiator", "error"),
            BeaconKind::Interval => payload.set_reserved("http.initiator", "interval"),
            BeaconKind::Manual => payload.set_reserved("api", 1_i64),
            BeaconKind::PageLoad | BeaconKind::Unload => {}
        }

        if self.lifecycle.claim_navigation_timing(kind) {
            for (key, value) in self.navigation_timing.drain(..) {
                payload.set_reserved(&key, value);
            }
        }

        if self.config.errors.enabled {
            if let Some(encoded) = self.errors.drain_and_encode() {
                payload.set_reserved("err", encoded);
            }
            self.lifecycle.error_beacon_due = None;
        }

        let mut resources = ResourceMark::default();
        if self.config.resource_timing.enabled {
            let (entries, mark) = self.resources.reserve();
            if let Some(json) = resource::encode_entries(&entries) {
                payload.set_reserved("restiming", json);
            }
            resources = mark;
        }

        self.lifecycle.last_beacon_ms = Some(now);
        let snapshot = payload.finalize(kind);
        debug!(
            kind = kind.as_str(),
            params = snapshot.len(),
            session_length,
            "beacon finalized"
        );
        PendingBeacon {
            snapshot,
            unloading: self.platform.page.unloading,
            reserved_length: session_length,
            resources,
        }
    }

    /// 쿠키와 메모리의 세션 중 사용할 것을 고르거나 새로 발급합니다.
    fn ensure_session(&mut self, now: u64) -> &mut Session {
        let loaded = self.sessions.load(self.platform.cookies.as_ref(), now);
        let in_memory_valid = self.session.as_ref().is_some_and(|s| !s.is_expired(now));

        let replacement = match loaded {
            SessionLoad::Present(stored) => {
                let keep_memory = self.session.as_ref().is_some_and(|mem| {
                    mem.session_id == stored.session_id
                        && mem.session_length >= stored.session_length
                });
                (!keep_memory).then_some(stored)
            }
            other if in_memory_valid => {
                debug!(cookie = ?other.mint_reason(), "using in-memory session");
                None
            }
            other => {
                let reason = if self.session.is_some() {
                    "expired"
                } else {
                    other.mint_reason().unwrap_or("absent")
                };
                counter!(m::SESSIONS_MINTED_TOTAL, m::LABEL_REASON => reason).increment(1);
                info!(reason, "starting new session");
                Some(Session::mint(now, self.sessions.expiry_secs()))
            }
        };

        if let Some(session) = replacement {
            self.session = Some(session);
        }
        self.session
            .get_or_insert_with(|| Session::mint(now, self.sessions.expiry_secs()))
    }

    fn dispatch(&mut self, beacon: PendingBeacon) -> BeaconOutcome {
        let PendingBeacon {
            snapshot,
            unloading,
            reserved_length,
            resources,
        } = beacon;

        self.transition(OrchestratorState::Sending);
        let result = self
            .negotiator
            .send(&snapshot, unloading, self.platform.channel.as_mut());

        let outcome = match result {
            Ok(transport) => {
                self.commit_resources(resources);
                self.persist_session();
                self.bus.emit(&AgentEvent::Beacon {
                    snapshot,
                    transport,
                });
                BeaconOutcome::Sent(transport)
            }
            Err(_) => {
                self.rollback_session(reserved_length);
                self.resources.release(resources);
                BeaconOutcome::Dropped
            }
        };
        self.transition(OrchestratorState::Idle);
        outcome
    }

    /// 전송된 리소스 엔트리를 정책에 따라 정리합니다.
    fn commit_resources(&mut self, mark: ResourceMark) {
        if !self.config.resource_timing.enabled {
            return;
        }
        let policy = DrainPolicy::from_clear_on_beacon(self.config.resource_timing.clear_on_beacon);
        let timeline = self
            .platform
            .timeline
            .as_mut()
            .map(|t| &mut **t as &mut dyn PerformanceTimeline);
        self.resources.commit(mark, policy, timeline);
    }

    fn persist_session(&mut self) {
        if let Some(session) = &self.session {
            self.sessions.save(
                self.platform.cookies.as_mut(),
                session,
                self.consent.state(),
                &self.platform.page,
            );
        }
    }

    /// 버려진 비콘이 가장 최근 예약이면 세션 길이를 되돌립니다.
    fn rollback_session(&mut self, reserved_length: u32) {
        if let Some(session) = self.session.as_mut()
            && session.session_length == reserved_length
        {
            session.session_length -= 1;
            debug!(length = session.session_length, "session length reservation rolled back");
        }
    }
}
