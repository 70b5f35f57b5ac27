//! 설정 관리: tidemark.toml 파싱 및 런타임 설정
//!
//! [`TidemarkConfig`]는 에이전트의 모든 컴포넌트 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. 환경변수 (`TIDEMARK_SESSION_SAME_SITE=strict` 형식)
//! 2. 설정 파일 (`tidemark.toml`)
//! 3. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), tidemark_core::error::TidemarkError> {
//! use tidemark_core::config::TidemarkConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = TidemarkConfig::load("tidemark.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = TidemarkConfig::parse("[session]\nsame_site = \"strict\"")?;
//! # Ok(())
//! # }
//! ```

use std::fmt::Display;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, TidemarkError};
use crate::types::{BeaconMethod, ConsentMode, SameSiteMode};

/// 기본 GET 길이 임계값 (문자 수)
pub const DEFAULT_MAX_GET_LENGTH: usize = 2000;

/// 기본 에러 버퍼 용량
pub const DEFAULT_MAX_ERRORS: usize = 10;

/// Tidemark 통합 설정
///
/// `tidemark.toml` 파일의 최상위 구조를 나타냅니다.
/// 각 컴포넌트는 자기 섹션만 읽어 사용합니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TidemarkConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 비콘 엔드포인트 및 전송 설정
    #[serde(default)]
    pub beacon: BeaconConfig,
    /// 세션 쿠키 설정
    #[serde(default)]
    pub session: SessionConfig,
    /// 동의 설정
    #[serde(default)]
    pub consent: ConsentConfig,
    /// 리소스 타이밍 버퍼 설정
    #[serde(default)]
    pub resource_timing: ResourceTimingConfig,
    /// 에러 버퍼 설정
    #[serde(default)]
    pub errors: ErrorsConfig,
    /// 주기적 연속성 비콘 설정
    #[serde(default)]
    pub continuity: ContinuityConfig,
    /// 언로드 비콘 설정
    #[serde(default)]
    pub unload: UnloadConfig,
    /// 중간(early) 비콘 설정
    #[serde(default)]
    pub early: EarlyConfig,
    /// 페이지 그룹 규칙 (순서대로 평가, 첫 매칭 우선)
    #[serde(default)]
    pub page_groups: Vec<PageGroupRule>,
}

impl TidemarkConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, TidemarkError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, TidemarkError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                TidemarkError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                TidemarkError::Io(e)
            }
        })?;
        let config = Self::parse(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, TidemarkError> {
        toml::from_str(toml_str).map_err(|e| {
            TidemarkError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `TIDEMARK_{SECTION}_{FIELD}`
    /// 예: `TIDEMARK_BEACON_SEND_BEACON_ENABLED=false`
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "TIDEMARK_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "TIDEMARK_GENERAL_LOG_FORMAT");

        // Beacon
        override_string(&mut self.beacon.url, "TIDEMARK_BEACON_URL");
        override_parsed(&mut self.beacon.method, "TIDEMARK_BEACON_METHOD");
        override_parsed(
            &mut self.beacon.max_get_length,
            "TIDEMARK_BEACON_MAX_GET_LENGTH",
        );
        override_parsed(
            &mut self.beacon.send_beacon_enabled,
            "TIDEMARK_BEACON_SEND_BEACON_ENABLED",
        );
        override_parsed(
            &mut self.beacon.form_post_enabled,
            "TIDEMARK_BEACON_FORM_POST_ENABLED",
        );
        override_string(&mut self.beacon.crumb, "TIDEMARK_BEACON_CRUMB");

        // Session
        override_string(
            &mut self.session.cookie_name,
            "TIDEMARK_SESSION_COOKIE_NAME",
        );
        override_string(
            &mut self.session.cookie_path,
            "TIDEMARK_SESSION_COOKIE_PATH",
        );
        override_string(
            &mut self.session.cookie_domain,
            "TIDEMARK_SESSION_COOKIE_DOMAIN",
        );
        override_parsed(&mut self.session.same_site, "TIDEMARK_SESSION_SAME_SITE");
        override_parsed(&mut self.session.expiry_secs, "TIDEMARK_SESSION_EXPIRY_SECS");

        // Consent
        override_parsed(&mut self.consent.mode, "TIDEMARK_CONSENT_MODE");
        override_string(
            &mut self.consent.cookie_name,
            "TIDEMARK_CONSENT_COOKIE_NAME",
        );

        // Resource timing
        override_parsed(
            &mut self.resource_timing.enabled,
            "TIDEMARK_RESOURCE_TIMING_ENABLED",
        );
        override_parsed(
            &mut self.resource_timing.clear_on_beacon,
            "TIDEMARK_RESOURCE_TIMING_CLEAR_ON_BEACON",
        );
        override_parsed(
            &mut self.resource_timing.buffer_size,
            "TIDEMARK_RESOURCE_TIMING_BUFFER_SIZE",
        );

        // Errors
        override_parsed(&mut self.errors.enabled, "TIDEMARK_ERRORS_ENABLED");
        override_parsed(&mut self.errors.max_errors, "TIDEMARK_ERRORS_MAX_ERRORS");
        override_parsed(
            &mut self.errors.send_interval_ms,
            "TIDEMARK_ERRORS_SEND_INTERVAL_MS",
        );
        override_parsed(
            &mut self.errors.send_after_onload,
            "TIDEMARK_ERRORS_SEND_AFTER_ONLOAD",
        );

        // Continuity / unload / early
        override_parsed(&mut self.continuity.enabled, "TIDEMARK_CONTINUITY_ENABLED");
        override_parsed(
            &mut self.continuity.interval_ms,
            "TIDEMARK_CONTINUITY_INTERVAL_MS",
        );
        override_parsed(
            &mut self.continuity.min_wait_ms,
            "TIDEMARK_CONTINUITY_MIN_WAIT_MS",
        );
        override_parsed(&mut self.unload.enabled, "TIDEMARK_UNLOAD_ENABLED");
        override_parsed(&mut self.early.enabled, "TIDEMARK_EARLY_ENABLED");
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), TidemarkError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(invalid(
                "general.log_level",
                format!("must be one of: {}", valid_levels.join(", ")),
            ));
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(invalid(
                "general.log_format",
                format!("must be one of: {}", valid_formats.join(", ")),
            ));
        }

        self.beacon.validate()?;
        self.session.validate()?;

        if !is_cookie_token(&self.consent.cookie_name) {
            return Err(invalid(
                "consent.cookie_name",
                "must be a non-empty cookie token",
            ));
        }
        if self.consent.cookie_name == self.session.cookie_name {
            return Err(invalid(
                "consent.cookie_name",
                "must differ from session.cookie_name",
            ));
        }

        if self.resource_timing.enabled && self.resource_timing.buffer_size == 0 {
            return Err(invalid(
                "resource_timing.buffer_size",
                "must be greater than 0 when resource timing is enabled",
            ));
        }

        const MAX_ERRORS_LIMIT: usize = 1000;
        if self.errors.enabled {
            if self.errors.max_errors == 0 || self.errors.max_errors > MAX_ERRORS_LIMIT {
                return Err(invalid(
                    "errors.max_errors",
                    format!("must be 1-{MAX_ERRORS_LIMIT}"),
                ));
            }
            if self.errors.send_interval_ms == 0 {
                return Err(invalid(
                    "errors.send_interval_ms",
                    "must be greater than 0",
                ));
            }
        }

        if self.continuity.enabled && self.continuity.interval_ms == 0 {
            return Err(invalid(
                "continuity.interval_ms",
                "must be greater than 0 when continuity is enabled",
            ));
        }

        for (idx, rule) in self.page_groups.iter().enumerate() {
            if rule.pattern.is_empty() {
                return Err(invalid(
                    &format!("page_groups[{idx}].pattern"),
                    "must not be empty",
                ));
            }
            if rule.label.is_empty() {
                return Err(invalid(
                    &format!("page_groups[{idx}].label"),
                    "must not be empty",
                ));
            }
        }

        Ok(())
    }
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "json".to_owned(),
        }
    }
}

/// 비콘 엔드포인트 및 전송 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BeaconConfig {
    /// 비콘 수집 엔드포인트 (절대 URL 또는 `/`로 시작하는 경로)
    pub url: String,
    /// HTTP 메서드 정책 (auto, get, post)
    pub method: BeaconMethod,
    /// 이미지 GET을 허용하는 최대 직렬화 길이
    pub max_get_length: usize,
    /// 언로드 시 sendBeacon 사용 허용 여부
    pub send_beacon_enabled: bool,
    /// 숨겨진 폼 POST 사용 허용 여부
    pub form_post_enabled: bool,
    /// 위조 방지 크럼 (`h.cr`), 비어 있으면 생략
    pub crumb: String,
}

impl Default for BeaconConfig {
    fn default() -> Self {
        Self {
            url: "/beacon".to_owned(),
            method: BeaconMethod::Auto,
            max_get_length: DEFAULT_MAX_GET_LENGTH,
            send_beacon_enabled: true,
            form_post_enabled: true,
            crumb: String::new(),
        }
    }
}

impl BeaconConfig {
    fn validate(&self) -> Result<(), TidemarkError> {
        const MAX_GET_LENGTH_LIMIT: usize = 65_536;

        if self.url.is_empty() {
            return Err(invalid("beacon.url", "must not be empty"));
        }
        if !self.url.starts_with('/') {
            let parsed = url::Url::parse(&self.url)
                .map_err(|e| invalid("beacon.url", format!("invalid url: {e}")))?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(invalid("beacon.url", "scheme must be http or https"));
            }
        }
        if self.max_get_length == 0 || self.max_get_length > MAX_GET_LENGTH_LIMIT {
            return Err(invalid(
                "beacon.max_get_length",
                format!("must be 1-{MAX_GET_LENGTH_LIMIT}"),
            ));
        }
        Ok(())
    }
}

/// 세션 쿠키 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// 쿠키 이름
    pub cookie_name: String,
    /// 쿠키 Path 속성
    pub cookie_path: String,
    /// 쿠키 Domain 속성, 비어 있으면 생략
    pub cookie_domain: String,
    /// SameSite 속성 (none, strict)
    pub same_site: SameSiteMode,
    /// 마지막 비콘 이후 세션 유지 시간 (초)
    pub expiry_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: "RT".to_owned(),
            cookie_path: "/".to_owned(),
            cookie_domain: String::new(),
            same_site: SameSiteMode::None,
            expiry_secs: 1800,
        }
    }
}

impl SessionConfig {
    fn validate(&self) -> Result<(), TidemarkError> {
        const MAX_EXPIRY_SECS: u64 = 365 * 24 * 3600;

        if !is_cookie_token(&self.cookie_name) {
            return Err(invalid(
                "session.cookie_name",
                "must be a non-empty cookie token",
            ));
        }
        if !self.cookie_path.starts_with('/') {
            return Err(invalid("session.cookie_path", "must start with '/'"));
        }
        if self.expiry_secs == 0 || self.expiry_secs > MAX_EXPIRY_SECS {
            return Err(invalid(
                "session.expiry_secs",
                format!("must be 1-{MAX_EXPIRY_SECS}"),
            ));
        }
        Ok(())
    }
}

/// 동의 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsentConfig {
    /// 초기화 모드 (opt_in_required, implicit)
    pub mode: ConsentMode,
    /// 동의 결정을 기록하는 마커 쿠키 이름
    pub cookie_name: String,
}

impl Default for ConsentConfig {
    fn default() -> Self {
        Self {
            mode: ConsentMode::OptInRequired,
            cookie_name: "TM_CONSENT".to_owned(),
        }
    }
}

/// 리소스 타이밍 버퍼 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceTimingConfig {
    /// 활성화 여부
    pub enabled: bool,
    /// 비콘 전송 후 버퍼와 플랫폼 타임라인을 비울지 여부
    pub clear_on_beacon: bool,
    /// 버퍼 최대 엔트리 수
    pub buffer_size: usize,
}

impl Default for ResourceTimingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            clear_on_beacon: false,
            buffer_size: 400,
        }
    }
}

/// 에러 버퍼 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ErrorsConfig {
    /// 활성화 여부
    pub enabled: bool,
    /// 한 전송 창에서 보관하는 서로 다른 에러의 최대 수
    pub max_errors: usize,
    /// 로드 이후 에러 비콘 배치 간격 (밀리초)
    pub send_interval_ms: u64,
    /// 로드 이후에도 에러 비콘을 보낼지 여부
    pub send_after_onload: bool,
}

impl Default for ErrorsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_errors: DEFAULT_MAX_ERRORS,
            send_interval_ms: 1000,
            send_after_onload: true,
        }
    }
}

/// 주기적 연속성 비콘 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContinuityConfig {
    /// 활성화 여부
    pub enabled: bool,
    /// 비콘 간격 (밀리초)
    pub interval_ms: u64,
    /// 다른 비콘 직후 연속성 비콘을 건너뛰는 최소 대기 (밀리초)
    pub min_wait_ms: u64,
}

impl Default for ContinuityConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_ms: 60_000,
            min_wait_ms: 5_000,
        }
    }
}

/// 언로드 비콘 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UnloadConfig {
    /// 활성화 여부
    pub enabled: bool,
}

impl Default for UnloadConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// 중간(early) 비콘 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EarlyConfig {
    /// 활성화 여부
    pub enabled: bool,
}

/// 페이지 그룹 규칙
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageGroupRule {
    /// URL에 대해 평가할 정규식
    pub pattern: String,
    /// 매칭 시 부여할 그룹 이름
    pub label: String,
}

// --- 검증 헬퍼 ---

fn invalid(field: &str, reason: impl Into<String>) -> TidemarkError {
    ConfigError::InvalidValue {
        field: field.to_owned(),
        reason: reason.into(),
    }
    .into()
}

/// RFC 6265 token 문자로만 이루어진 이름인지 확인합니다.
fn is_cookie_token(name: &str) -> bool {
    !name.is_empty()
        && name.bytes().all(|b| {
            b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b)
        })
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_parsed<T>(target: &mut T, env_key: &str)
where
    T: FromStr,
    T::Err: Display,
{
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<T>() {
            Ok(parsed) => *target = parsed,
            Err(e) => warn!(
                env_key,
                value = val.as_str(),
                error = %e,
                "failed to parse env var, ignoring"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_sane_values() {
        let config = TidemarkConfig::default();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.beacon.max_get_length, 2000);
        assert_eq!(config.session.cookie_name, "RT");
        assert_eq!(config.session.same_site, SameSiteMode::None);
        assert_eq!(config.errors.max_errors, 10);
        assert!(!config.resource_timing.clear_on_beacon);
        assert!(config.page_groups.is_empty());
    }

    #[test]
    fn default_config_passes_validation() {
        let config = TidemarkConfig::default();
        config.validate().expect("defaults should validate");
    }

    #[test]
    fn empty_toml_uses_defaults() {
        let config = TidemarkConfig::parse("").expect("empty toml should parse");
        assert_eq!(config.beacon.url, "/beacon");
        assert_eq!(config.consent.mode, ConsentMode::OptInRequired);
    }

    #[test]
    fn partial_toml_merges_with_defaults() {
        let toml = r#"
[session]
same_site = "strict"

[beacon]
send_beacon_enabled = false
"#;
        let config = TidemarkConfig::parse(toml).expect("should parse");
        assert_eq!(config.session.same_site, SameSiteMode::Strict);
        assert_eq!(config.session.cookie_name, "RT");
        assert!(!config.beacon.send_beacon_enabled);
        assert!(config.beacon.form_post_enabled);
    }

    #[test]
    fn page_groups_parse_in_order() {
        let toml = r#"
[[page_groups]]
pattern = "/checkout"
label = "checkout"

[[page_groups]]
pattern = ".*"
label = "other"
"#;
        let config = TidemarkConfig::parse(toml).expect("should parse");
        assert_eq!(config.page_groups.len(), 2);
        assert_eq!(config.page_groups[0].label, "checkout");
        assert_eq!(config.page_groups[1].label, "other");
    }

    #[test]
    fn unknown_same_site_is_parse_error() {
        let err = TidemarkConfig::parse("[session]\nsame_site = \"lax\"")
            .expect_err("lax is not supported");
        assert!(matches!(
            err,
            TidemarkError::Config(ConfigError::ParseFailed { .. })
        ));
    }

    #[test]
    fn validate_rejects_bad_log_level() {
        let mut config = TidemarkConfig::default();
        config.general.log_level = "verbose".to_owned();
        let err = config.validate().expect_err("should reject");
        assert!(err.to_string().contains("general.log_level"));
    }

    #[test]
    fn validate_rejects_relative_url_without_slash() {
        let mut config = TidemarkConfig::default();
        config.beacon.url = "beacon".to_owned();
        assert!(config.validate().is_err());

        config.beacon.url = "ftp://example.com/beacon".to_owned();
        assert!(config.validate().is_err());

        config.beacon.url = "https://collector.example.com/beacon".to_owned();
        config.validate().expect("https url should validate");
    }

    #[test]
    fn validate_rejects_zero_max_errors() {
        let mut config = TidemarkConfig::default();
        config.errors.max_errors = 0;
        let err = config.validate().expect_err("should reject");
        assert!(err.to_string().contains("errors.max_errors"));

        config.errors.enabled = false;
        config.validate().expect("disabled errors skip the check");
    }

    #[test]
    fn validate_rejects_colliding_cookie_names() {
        let mut config = TidemarkConfig::default();
        config.consent.cookie_name = "RT".to_owned();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_cookie_name_with_separator() {
        let mut config = TidemarkConfig::default();
        config.session.cookie_name = "R T".to_owned();
        assert!(config.validate().is_err());
        config.session.cookie_name = "RT;".to_owned();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_empty_page_group_label() {
        let mut config = TidemarkConfig::default();
        config.page_groups.push(PageGroupRule {
            pattern: "/".to_owned(),
            label: String::new(),
        });
        let err = config.validate().expect_err("should reject");
        assert!(err.to_string().contains("page_groups[0].label"));
    }

    #[test]
    fn config_serializes_back_to_toml() {
        let config = TidemarkConfig::default();
        let text = toml::to_string(&config).expect("should serialize");
        let reparsed = TidemarkConfig::parse(&text).expect("should reparse");
        assert_eq!(reparsed.session.expiry_secs, config.session.expiry_secs);
        assert_eq!(reparsed.beacon.method, config.beacon.method);
    }
}
