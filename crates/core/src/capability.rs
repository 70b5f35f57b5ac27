//! Capability trait: 플랫폼 기능에 대한 추상 경계
//!
//! 코어는 브라우저 내부에 직접 접근하지 않습니다. 쿠키, 시계, 전송 수단은
//! 모두 이 모듈의 trait을 통해 주입되며, 플랫폼별 어댑터가 구현합니다.
//!
//! 호스트 없이도 동작을 재현할 수 있도록 인메모리 구현
//! ([`MemoryCookieJar`], [`ManualClock`], [`RecordingChannel`])을 함께 제공합니다.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::beacon::{BeaconRequest, TransportKind};
use crate::error::{StorageError, TransportError};

// ─── Clock ───────────────────────────────────────────────────────────

/// 현재 시각(에포크 밀리초)을 제공하는 trait
pub trait Clock: Send {
    /// 에포크 기준 밀리초
    fn now_ms(&self) -> u64;
}

/// 시스템 시계
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
            .unwrap_or(0)
    }
}

/// 수동으로 진행시키는 시계
///
/// 복제본끼리 같은 시각을 공유합니다.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    /// 주어진 시각에서 시작하는 시계를 만듭니다.
    pub fn new(start_ms: u64) -> Self {
        Self {
            now: Arc::new(AtomicU64::new(start_ms)),
        }
    }

    /// 시각을 앞으로 진행시킵니다.
    pub fn advance(&self, ms: u64) {
        self.now.fetch_add(ms, Ordering::SeqCst);
    }

    /// 시각을 지정합니다.
    pub fn set(&self, ms: u64) {
        self.now.store(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

// ─── CookieJar ───────────────────────────────────────────────────────

/// 퍼스트 파티 쿠키 저장소
///
/// 여러 탭/프레임이 같은 저장소를 공유할 수 있으며 잠금은 없습니다.
/// 마지막 기록이 이깁니다.
pub trait CookieJar: Send {
    /// 이름에 해당하는 쿠키 값을 읽습니다.
    fn read(&self, name: &str) -> Option<String>;

    /// `document.cookie` 대입 형식의 문자열을 기록합니다.
    ///
    /// 예: `RT=si*abc&sl*1; Path=/; SameSite=None; Secure`
    fn write(&mut self, cookie: &str) -> Result<(), StorageError>;
}

#[derive(Debug, Default)]
struct JarState {
    cookies: BTreeMap<String, String>,
    writes: Vec<String>,
}

/// 인메모리 쿠키 저장소
///
/// 복제본끼리 내용을 공유하므로, 에이전트에 넘긴 뒤에도
/// 다른 핸들로 기록 이력을 검사할 수 있습니다.
#[derive(Debug, Clone, Default)]
pub struct MemoryCookieJar {
    inner: Arc<Mutex<JarState>>,
}

impl MemoryCookieJar {
    /// 빈 저장소를 만듭니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 기록 이력 없이 쿠키를 미리 채웁니다.
    pub fn with_cookie(self, name: &str, value: &str) -> Self {
        self.lock()
            .cookies
            .insert(name.to_owned(), value.to_owned());
        self
    }

    /// 지금까지 기록된 원본 문자열 목록
    pub fn writes(&self) -> Vec<String> {
        self.lock().writes.clone()
    }

    /// 특정 쿠키 이름으로 기록된 문자열 목록
    pub fn writes_for(&self, name: &str) -> Vec<String> {
        let prefix = format!("{name}=");
        self.lock()
            .writes
            .iter()
            .filter(|w| w.starts_with(&prefix))
            .cloned()
            .collect()
    }

    /// 현재 저장된 쿠키 값
    pub fn get(&self, name: &str) -> Option<String> {
        self.lock().cookies.get(name).cloned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, JarState> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl CookieJar for MemoryCookieJar {
    fn read(&self, name: &str) -> Option<String> {
        self.get(name)
    }

    fn write(&mut self, cookie: &str) -> Result<(), StorageError> {
        let mut parts = cookie.split(';');
        let pair = parts.next().unwrap_or_default().trim();
        let (name, value) = pair
            .split_once('=')
            .ok_or_else(|| StorageError::InvalidCookie(format!("missing '=' in '{pair}'")))?;
        if name.is_empty() {
            return Err(StorageError::InvalidCookie("empty cookie name".to_owned()));
        }

        let expired = parts.any(|attr| {
            attr.trim()
                .strip_prefix("Max-Age=")
                .and_then(|v| v.parse::<i64>().ok())
                .is_some_and(|age| age <= 0)
        });

        let mut state = self.lock();
        state.writes.push(cookie.to_owned());
        if expired {
            state.cookies.remove(name);
        } else {
            state.cookies.insert(name.to_owned(), value.to_owned());
        }
        Ok(())
    }
}

// ─── BeaconChannel ───────────────────────────────────────────────────

/// 실제 네트워크 전송을 수행하는 채널
///
/// 성공은 "브라우저가 전달을 수락함"을 뜻하며 서버 수신 확인이 아닙니다.
pub trait BeaconChannel: Send {
    /// 해당 전송 수단을 지금 사용할 수 있는지 확인합니다.
    fn is_available(&self, transport: TransportKind) -> bool;

    /// 요청을 전송 수단에 넘깁니다.
    fn send(&mut self, request: &BeaconRequest) -> Result<(), TransportError>;
}

#[derive(Debug, Default)]
struct ChannelState {
    unavailable: BTreeSet<TransportKind>,
    rejecting: BTreeSet<TransportKind>,
    sent: Vec<BeaconRequest>,
    attempts: Vec<TransportKind>,
}

/// 요청을 기록만 하는 인메모리 전송 채널
///
/// 기본적으로 모든 전송 수단을 사용할 수 있고 모든 핸드오프를 수락합니다.
/// 복제본끼리 상태를 공유합니다.
#[derive(Debug, Clone, Default)]
pub struct RecordingChannel {
    inner: Arc<Mutex<ChannelState>>,
}

impl RecordingChannel {
    /// 모든 전송 수단을 쓸 수 있는 채널을 만듭니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 전송 수단의 사용 가능 여부를 지정합니다.
    pub fn set_available(&self, transport: TransportKind, available: bool) {
        let mut state = self.lock();
        if available {
            state.unavailable.remove(&transport);
        } else {
            state.unavailable.insert(transport);
        }
    }

    /// 전송 수단이 핸드오프를 거부하도록 지정합니다.
    pub fn set_rejecting(&self, transport: TransportKind, rejecting: bool) {
        let mut state = self.lock();
        if rejecting {
            state.rejecting.insert(transport);
        } else {
            state.rejecting.remove(&transport);
        }
    }

    /// 수락된 요청 목록
    pub fn sent(&self) -> Vec<BeaconRequest> {
        self.lock().sent.clone()
    }

    /// 거부를 포함한 모든 시도의 전송 수단 목록
    pub fn attempts(&self) -> Vec<TransportKind> {
        self.lock().attempts.clone()
    }

    /// 기록을 비웁니다.
    pub fn clear(&self) {
        let mut state = self.lock();
        state.sent.clear();
        state.attempts.clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ChannelState> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl BeaconChannel for RecordingChannel {
    fn is_available(&self, transport: TransportKind) -> bool {
        !self.lock().unavailable.contains(&transport)
    }

    fn send(&mut self, request: &BeaconRequest) -> Result<(), TransportError> {
        let mut state = self.lock();
        state.attempts.push(request.transport);
        if state.unavailable.contains(&request.transport) {
            return Err(TransportError::Unavailable(request.transport));
        }
        if state.rejecting.contains(&request.transport) {
            return Err(TransportError::Rejected {
                transport: request.transport,
                reason: "rejected by recording channel".to_owned(),
            });
        }
        state.sent.push(request.clone());
        Ok(())
    }
}
