//! 메트릭 상수 및 설명 등록
//!
//! 모든 진단 카운터의 이름과 설명을 중앙에서 정의합니다.
//! 각 크레이트는 이 상수로 `metrics::counter!()`를 호출합니다.
//! 라이브러리는 레코더를 설치하지 않으므로, 호스트가 설치하지 않으면
//! 카운터 호출은 아무 일도 하지 않습니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `tidemark_`
//! - 접미어: `_total` (counter)
//!
//! # 사용 예시
//!
//! ```ignore
//! use metrics::counter;
//!
//! counter!(tidemark_core::metrics::BEACONS_DROPPED_TOTAL).increment(1);
//! ```

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 전송 수단 레이블 키 (image, send_beacon, form_post, xhr)
pub const LABEL_TRANSPORT: &str = "transport";

/// 비콘 종류 레이블 키 (page_load, early, spa, error, interval, manual, unload)
pub const LABEL_KIND: &str = "kind";

/// 세션 발급 사유 레이블 키 (absent, expired, malformed)
pub const LABEL_REASON: &str = "reason";

// ─── Beacon 메트릭 ────────────────────────────────────────────────

/// 전송 수단에 넘겨진 비콘 수 (counter, labels: transport, kind)
pub const BEACONS_SENT_TOTAL: &str = "tidemark_beacons_sent_total";

/// 모든 전송 수단이 소진되어 버려진 비콘 수 (counter)
pub const BEACONS_DROPPED_TOTAL: &str = "tidemark_beacons_dropped_total";

/// 동의 거부로 폐기된 대기 비콘 수 (counter)
pub const BEACONS_DISCARDED_TOTAL: &str = "tidemark_beacons_discarded_total";

/// 동의 대기로 큐에 보관된 비콘 수 (counter)
pub const BEACONS_QUEUED_TOTAL: &str = "tidemark_beacons_queued_total";

/// 전송 수단 폴백 횟수 (counter, label: transport = 거부한 수단)
pub const TRANSPORT_FALLBACKS_TOTAL: &str = "tidemark_transport_fallbacks_total";

// ─── Capture 메트릭 ───────────────────────────────────────────────

/// 용량 초과로 버려진 에러 수 (counter)
pub const ERRORS_DROPPED_TOTAL: &str = "tidemark_errors_dropped_total";

/// 용량 초과로 버려진 리소스 엔트리 수 (counter)
pub const RESOURCES_DROPPED_TOTAL: &str = "tidemark_resources_dropped_total";

/// 플랫폼 리소스 타임라인 정리 실패 수 (counter)
pub const RESOURCE_CLEAR_FAILURES_TOTAL: &str = "tidemark_resource_clear_failures_total";

// ─── Session 메트릭 ───────────────────────────────────────────────

/// 새로 발급된 세션 수 (counter, label: reason)
pub const SESSIONS_MINTED_TOTAL: &str = "tidemark_sessions_minted_total";

/// 동의 상태 때문에 거부된 쿠키 기록 수 (counter)
pub const COOKIE_WRITES_REFUSED_TOTAL: &str = "tidemark_cookie_writes_refused_total";

// ─── 설명 등록 함수 ─────────────────────────────────────────────────

/// 모든 메트릭의 설명(description)을 등록합니다.
///
/// 호스트가 전역 레코더를 설치한 뒤 한 번만 호출해야 합니다.
pub fn describe_all() {
    use metrics::describe_counter;

    describe_counter!(
        BEACONS_SENT_TOTAL,
        "Beacons accepted by a transport for delivery"
    );
    describe_counter!(
        BEACONS_DROPPED_TOTAL,
        "Beacons dropped after every transport was exhausted"
    );
    describe_counter!(
        BEACONS_DISCARDED_TOTAL,
        "Queued beacons discarded because consent was revoked"
    );
    describe_counter!(
        BEACONS_QUEUED_TOTAL,
        "Beacons queued while consent was not granted"
    );
    describe_counter!(
        TRANSPORT_FALLBACKS_TOTAL,
        "Transport handoffs rejected and retried one priority lower"
    );
    describe_counter!(
        ERRORS_DROPPED_TOTAL,
        "Distinct errors dropped because the error buffer was full"
    );
    describe_counter!(
        RESOURCES_DROPPED_TOTAL,
        "Resource timing entries dropped because the buffer was full"
    );
    describe_counter!(
        RESOURCE_CLEAR_FAILURES_TOTAL,
        "Failed attempts to clear the platform resource timing timeline"
    );
    describe_counter!(SESSIONS_MINTED_TOTAL, "Sessions minted by reason");
    describe_counter!(
        COOKIE_WRITES_REFUSED_TOTAL,
        "Session cookie writes refused because consent was not granted"
    );
}
