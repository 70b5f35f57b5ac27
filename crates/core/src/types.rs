//! 도메인 타입: 여러 크레이트가 공유하는 상태와 설정 값
//!
//! 문자열 표현은 설정 파일, 환경변수, 동의 마커 쿠키에 그대로 쓰입니다.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// 동의 상태
///
/// 쿠키 기록과 네트워크 전송은 `OptedIn`일 때만 허용됩니다.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConsentState {
    /// 아직 결정되지 않음
    #[default]
    Undecided,
    /// 동의함
    OptedIn,
    /// 거부함
    OptedOut,
}

impl ConsentState {
    /// 쿠키 기록과 전송이 허용되는 상태인지 확인합니다.
    pub fn permits_activity(&self) -> bool {
        matches!(self, Self::OptedIn)
    }

    /// 문자열 표현
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Undecided => "undecided",
            Self::OptedIn => "opted-in",
            Self::OptedOut => "opted-out",
        }
    }
}

impl fmt::Display for ConsentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConsentState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "undecided" => Ok(Self::Undecided),
            "opted-in" => Ok(Self::OptedIn),
            "opted-out" => Ok(Self::OptedOut),
            other => Err(format!("unknown consent state '{other}'")),
        }
    }
}

/// 세션 쿠키의 SameSite 속성
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SameSiteMode {
    /// `SameSite=None`
    #[default]
    None,
    /// `SameSite=Strict`
    Strict,
}

impl SameSiteMode {
    /// 쿠키 속성 값
    pub fn as_attribute(&self) -> &'static str {
        match self {
            Self::None => "None",
            Self::Strict => "Strict",
        }
    }
}

impl FromStr for SameSiteMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "strict" => Ok(Self::Strict),
            other => Err(format!("must be one of: none, strict (got '{other}')")),
        }
    }
}

/// 비콘 HTTP 메서드 정책
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BeaconMethod {
    /// 길이 임계값으로 GET/POST 선택
    #[default]
    Auto,
    /// 항상 이미지 GET 우선
    Get,
    /// GET을 사용하지 않음
    Post,
}

impl FromStr for BeaconMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "get" => Ok(Self::Get),
            "post" => Ok(Self::Post),
            other => Err(format!("must be one of: auto, get, post (got '{other}')")),
        }
    }
}

/// 동의 초기화 모드
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsentMode {
    /// 명시적 동의 전까지 `Undecided`로 시작
    #[default]
    OptInRequired,
    /// `OptedIn`으로 시작
    Implicit,
}

impl ConsentMode {
    /// 마커 쿠키가 없을 때의 초기 상태
    pub fn initial_state(&self) -> ConsentState {
        match self {
            Self::OptInRequired => ConsentState::Undecided,
            Self::Implicit => ConsentState::OptedIn,
        }
    }
}

impl FromStr for ConsentMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "opt_in_required" => Ok(Self::OptInRequired),
            "implicit" => Ok(Self::Implicit),
            other => Err(format!(
                "must be one of: opt_in_required, implicit (got '{other}')"
            )),
        }
    }
}

/// 현재 페이지 정보
///
/// 호스트 어댑터가 채워 넣으며 비콘 조립과 전송 선택에 쓰입니다.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageContext {
    /// 현재 문서 URL
    pub url: String,
    /// 참조 문서 URL
    pub referrer: Option<String>,
    /// 언로드 진행 중 여부
    pub unloading: bool,
    /// 이번 로드에 navigation timing 데이터가 있는지 여부
    pub navigation_timing_supported: bool,
}

impl PageContext {
    /// 주어진 URL로 페이지 컨텍스트를 만듭니다.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            referrer: None,
            unloading: false,
            navigation_timing_supported: true,
        }
    }

    /// 참조 URL을 지정합니다.
    pub fn with_referrer(mut self, referrer: impl Into<String>) -> Self {
        self.referrer = Some(referrer.into());
        self
    }

    /// 보안 스킴(`https`)으로 로드된 페이지인지 확인합니다.
    pub fn is_secure(&self) -> bool {
        url::Url::parse(&self.url)
            .map(|u| u.scheme() == "https")
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consent_state_string_round_trip() {
        for state in [
            ConsentState::Undecided,
            ConsentState::OptedIn,
            ConsentState::OptedOut,
        ] {
            assert_eq!(state.as_str().parse::<ConsentState>(), Ok(state));
        }
        assert!("maybe".parse::<ConsentState>().is_err());
    }

    #[test]
    fn only_opted_in_permits_activity() {
        assert!(ConsentState::OptedIn.permits_activity());
        assert!(!ConsentState::Undecided.permits_activity());
        assert!(!ConsentState::OptedOut.permits_activity());
    }

    #[test]
    fn same_site_parses_case_insensitively() {
        assert_eq!("Strict".parse::<SameSiteMode>(), Ok(SameSiteMode::Strict));
        assert_eq!("none".parse::<SameSiteMode>(), Ok(SameSiteMode::None));
        assert!("lax".parse::<SameSiteMode>().is_err());
    }

    #[test]
    fn secure_scheme_detection() {
        assert!(PageContext::new("https://www.example.com/").is_secure());
        assert!(!PageContext::new("http://www.example.com/").is_secure());
        assert!(!PageContext::new("not a url").is_secure());
    }

    #[test]
    fn consent_mode_initial_state() {
        assert_eq!(
            ConsentMode::OptInRequired.initial_state(),
            ConsentState::Undecided
        );
        assert_eq!(ConsentMode::Implicit.initial_state(), ConsentState::OptedIn);
    }
}
