//! 동의 게이트
//!
//! 3가지 상태(`undecided`, `opted-in`, `opted-out`)를 관리하고, 결정을
//! 마커 쿠키에 기록해 다음 페이지 로드에서 복원합니다.
//! 세션 쿠키 기록과 네트워크 전송은 `opted-in`에서만 허용됩니다.
//! 마커 쿠키는 세션 쿠키와 같은 `Path`, `Domain`, `SameSite`, `Secure` 속성을 씁니다.

use tidemark_core::capability::CookieJar;
use tidemark_core::config::{ConsentConfig, SessionConfig};
use tidemark_core::types::{ConsentState, SameSiteMode};
use tracing::{debug, warn};

/// 마커 쿠키 유지 기간 (초)
const MARKER_MAX_AGE_SECS: u64 = 365 * 24 * 3600;

/// 동의 게이트
#[derive(Debug, Clone)]
pub struct ConsentGate {
    state: ConsentState,
    marker_cookie: String,
    path: String,
    domain: Option<String>,
    same_site: SameSiteMode,
}

impl ConsentGate {
    /// 설정과 마커 쿠키로 초기 상태를 정합니다.
    ///
    /// 마커 쿠키에 기록된 결정이 설정 모드보다 우선합니다.
    /// 쿠키 속성은 세션 쿠키 설정을 따릅니다.
    pub fn init(config: &ConsentConfig, session: &SessionConfig, jar: &dyn CookieJar) -> Self {
        let persisted = jar
            .read(&config.cookie_name)
            .and_then(|raw| match raw.parse::<ConsentState>() {
                Ok(ConsentState::Undecided) => None,
                Ok(state) => Some(state),
                Err(e) => {
                    warn!(cookie = %config.cookie_name, error = %e, "ignoring consent marker");
                    None
                }
            });
        let state = persisted.unwrap_or_else(|| config.mode.initial_state());
        debug!(state = %state, restored = persisted.is_some(), "consent initialized");

        Self {
            state,
            marker_cookie: config.cookie_name.clone(),
            path: session.cookie_path.clone(),
            domain: (!session.cookie_domain.is_empty()).then(|| session.cookie_domain.clone()),
            same_site: session.same_site,
        }
    }

    /// 현재 상태
    pub fn state(&self) -> ConsentState {
        self.state
    }

    /// 쿠키 기록과 전송이 허용되는지 확인합니다.
    pub fn permits_activity(&self) -> bool {
        self.state.permits_activity()
    }

    /// 상태를 바꾸고 마커 쿠키를 갱신합니다.
    ///
    /// 상태가 실제로 바뀌었으면 이전 상태를 반환합니다.
    /// `secure`이면 마커 쿠키에 `Secure` 속성을 붙입니다.
    pub fn set_state(
        &mut self,
        state: ConsentState,
        jar: &mut dyn CookieJar,
        secure: bool,
    ) -> Option<ConsentState> {
        if state == self.state {
            return None;
        }
        let previous = std::mem::replace(&mut self.state, state);

        let cookie = self.marker_cookie_string(state, secure);
        if let Err(e) = jar.write(&cookie) {
            warn!(error = %e, "failed to persist consent marker");
        }

        debug!(from = %previous, to = %state, "consent changed");
        Some(previous)
    }

    fn marker_cookie_string(&self, state: ConsentState, secure: bool) -> String {
        let domain = self
            .domain
            .as_deref()
            .map(|d| format!("; Domain={d}"))
            .unwrap_or_default();

        let mut cookie = match state {
            ConsentState::Undecided => format!(
                "{}=; Path={}{}; Max-Age=0",
                self.marker_cookie, self.path, domain
            ),
            ConsentState::OptedIn | ConsentState::OptedOut => format!(
                "{}={}; Path={}{}; Max-Age={}; SameSite={}",
                self.marker_cookie,
                state.as_str(),
                self.path,
                domain,
                MARKER_MAX_AGE_SECS,
                self.same_site.as_attribute()
            ),
        };
        if secure {
            cookie.push_str("; Secure");
        }
        cookie
    }
}
