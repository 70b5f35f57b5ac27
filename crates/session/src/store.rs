//! 세션 저장소: 쿠키 저장소 위의 세션 로드/저장/삭제
//!
//! 저장은 동의 상태가 `OptedIn`일 때만 수행됩니다. 그 외 상태에서의
//! 저장 요청은 아무 일도 하지 않고 `false`를 반환합니다.

use chrono::DateTime;
use metrics::counter;
use tidemark_core::capability::CookieJar;
use tidemark_core::config::SessionConfig;
use tidemark_core::metrics as m;
use tidemark_core::types::{ConsentState, PageContext, SameSiteMode};
use tracing::{debug, warn};

use crate::cookie::Session;
use crate::error::SessionError;

/// 쿠키에서 세션을 읽은 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionLoad {
    /// 유효한 세션
    Present(Session),
    /// 쿠키 없음
    Absent,
    /// 만료된 세션
    Expired(Session),
    /// 해석할 수 없는 쿠키
    Malformed(SessionError),
}

impl SessionLoad {
    /// 새 세션 발급 사유 (메트릭 레이블). 유효한 세션이면 `None`.
    pub fn mint_reason(&self) -> Option<&'static str> {
        match self {
            Self::Present(_) => None,
            Self::Absent => Some("absent"),
            Self::Expired(_) => Some("expired"),
            Self::Malformed(_) => Some("malformed"),
        }
    }
}

/// 세션 쿠키 저장소
#[derive(Debug, Clone)]
pub struct SessionStore {
    cookie_name: String,
    path: String,
    domain: Option<String>,
    same_site: SameSiteMode,
    expiry_secs: u64,
}

impl SessionStore {
    /// 설정으로 저장소를 만듭니다.
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            cookie_name: config.cookie_name.clone(),
            path: config.cookie_path.clone(),
            domain: (!config.cookie_domain.is_empty()).then(|| config.cookie_domain.clone()),
            same_site: config.same_site,
            expiry_secs: config.expiry_secs,
        }
    }

    /// 쿠키 이름
    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    /// 마지막 비콘 이후 세션 유지 시간 (초)
    pub fn expiry_secs(&self) -> u64 {
        self.expiry_secs
    }

    /// 쿠키 저장소에서 세션을 읽습니다.
    pub fn load(&self, jar: &dyn CookieJar, now_ms: u64) -> SessionLoad {
        let Some(raw) = jar.read(&self.cookie_name) else {
            return SessionLoad::Absent;
        };
        if raw.trim().is_empty() {
            return SessionLoad::Absent;
        }

        match Session::decode(&raw) {
            Ok(session) if session.is_expired(now_ms) => {
                debug!(session_id = %session.session_id, "session cookie expired");
                SessionLoad::Expired(session)
            }
            Ok(session) => SessionLoad::Present(session),
            Err(e) => {
                warn!(cookie = %self.cookie_name, error = %e, "malformed session cookie");
                SessionLoad::Malformed(e)
            }
        }
    }

    /// 세션을 쿠키로 저장합니다.
    ///
    /// 동의 상태가 `OptedIn`이 아니거나 저장소가 기록을 거부하면 `false`입니다.
    pub fn save(
        &self,
        jar: &mut dyn CookieJar,
        session: &Session,
        consent: ConsentState,
        page: &PageContext,
    ) -> bool {
        if !consent.permits_activity() {
            counter!(m::COOKIE_WRITES_REFUSED_TOTAL).increment(1);
            debug!(consent = %consent, "session cookie write refused");
            return false;
        }

        let cookie = self.cookie_string(session, page.is_secure());
        match jar.write(&cookie) {
            Ok(()) => {
                debug!(
                    session_id = %session.session_id,
                    length = session.session_length,
                    "session cookie written"
                );
                true
            }
            Err(e) => {
                warn!(error = %e, "session cookie write failed");
                false
            }
        }
    }

    /// 세션 쿠키를 삭제합니다.
    pub fn remove(&self, jar: &mut dyn CookieJar) -> bool {
        let cookie = format!(
            "{}=; Path={}{}; Max-Age=0",
            self.cookie_name,
            self.path,
            self.domain_attribute()
        );
        match jar.write(&cookie) {
            Ok(()) => {
                debug!(cookie = %self.cookie_name, "session cookie removed");
                true
            }
            Err(e) => {
                warn!(error = %e, "session cookie removal failed");
                false
            }
        }
    }

    /// 속성을 포함한 `Set-Cookie` 형식 문자열을 만듭니다.
    pub fn cookie_string(&self, session: &Session, secure: bool) -> String {
        let mut cookie = format!(
            "{}={}; Path={}{}",
            self.cookie_name,
            session.encode(),
            self.path,
            self.domain_attribute()
        );

        let expires = i64::try_from(session.session_expiry)
            .ok()
            .and_then(|secs| DateTime::from_timestamp(secs, 0));
        if let Some(at) = expires {
            cookie.push_str("; Expires=");
            cookie.push_str(&at.format("%a, %d %b %Y %H:%M:%S GMT").to_string());
        }

        cookie.push_str("; SameSite=");
        cookie.push_str(self.same_site.as_attribute());
        if secure {
            cookie.push_str("; Secure");
        }
        cookie
    }

    fn domain_attribute(&self) -> String {
        self.domain
            .as_deref()
            .map(|d| format!("; Domain={d}"))
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use tidemark_core::capability::MemoryCookieJar;

    use super::*;

    const NOW_MS: u64 = 1_700_000_000_000;

    fn store() -> SessionStore {
        SessionStore::new(&SessionConfig::default())
    }

    fn session() -> Session {
        Session {
            session_id: "abc".to_owned(),
            session_start: NOW_MS,
            session_length: 1,
            session_expiry: NOW_MS / 1000 + 1800,
            referrer_hash: None,
            navigation_hash: None,
        }
    }

    #[test]
    fn load_absent_when_no_cookie() {
        let jar = MemoryCookieJar::new();
        assert_eq!(store().load(&jar, NOW_MS), SessionLoad::Absent);
    }

    #[test]
    fn load_present_and_expired() {
        let jar = MemoryCookieJar::new().with_cookie("RT", &session().encode());
        assert_eq!(store().load(&jar, NOW_MS), SessionLoad::Present(session()));

        let later = NOW_MS + 1801 * 1000;
        assert!(matches!(
            store().load(&jar, later),
            SessionLoad::Expired(_)
        ));
    }

    #[test]
    fn load_malformed() {
        let jar = MemoryCookieJar::new().with_cookie("RT", "garbage");
        let load = store().load(&jar, NOW_MS);
        assert!(matches!(load, SessionLoad::Malformed(_)));
        assert_eq!(load.mint_reason(), Some("malformed"));
    }

    #[test]
    fn save_refused_without_consent() {
        let mut jar = MemoryCookieJar::new();
        let page = PageContext::new("https://www.example.com/");
        for consent in [ConsentState::Undecided, ConsentState::OptedOut] {
            assert!(!store().save(&mut jar, &session(), consent, &page));
        }
        assert!(jar.writes().is_empty());
    }

    #[test]
    fn save_writes_attributes() {
        let mut jar = MemoryCookieJar::new();
        let page = PageContext::new("https://www.example.com/");
        assert!(store().save(&mut jar, &session(), ConsentState::OptedIn, &page));

        let writes = jar.writes_for("RT");
        assert_eq!(writes.len(), 1);
        let cookie = &writes[0];
        assert!(cookie.contains("; Path=/"));
        assert!(cookie.contains("; Expires=Tue, 14 Nov 2023 22:43:20 GMT"));
        assert!(cookie.contains("; SameSite=None"));
        assert!(cookie.ends_with("; Secure"));
        assert!(!cookie.contains("Domain="));
    }

    #[test]
    fn insecure_page_omits_secure_and_domain_is_written() {
        let config = SessionConfig {
            cookie_domain: "example.com".to_owned(),
            same_site: SameSiteMode::Strict,
            ..SessionConfig::default()
        };
        let cookie = SessionStore::new(&config).cookie_string(&session(), false);
        assert!(cookie.contains("; Domain=example.com"));
        assert!(cookie.contains("; SameSite=Strict"));
        assert!(!cookie.contains("Secure"));
    }

    #[test]
    fn remove_deletes_cookie() {
        let mut jar = MemoryCookieJar::new().with_cookie("RT", &session().encode());
        assert!(store().remove(&mut jar));
        assert_eq!(jar.get("RT"), None);
        assert!(jar.writes()[0].contains("Max-Age=0"));
    }
}
