//! 전송 수단 협상
//!
//! 비콘 하나마다 후보 전송 수단을 우선순위 순으로 정하고, 앞에서부터 핸드오프를
//! 시도합니다. 거부되면 다음(더 낮은 우선순위) 후보로만 넘어가며 같은 수단을
//! 다시 시도하지 않습니다.
//!
//! 후보 결정 규칙:
//! 1. GET이 허용되고 (`auto`이면서 쿼리 길이 ≤ `max_get_length`, 또는 `get`)
//!    이미지를 쓸 수 있으면 이미지 GET
//! 2. 언로드 중이고 sendBeacon을 쓸 수 있고 설정에서 허용되면 sendBeacon
//! 3. 폼 POST를 쓸 수 있고 허용되면 폼 POST
//! 4. XHR POST

use metrics::counter;
use tidemark_core::beacon::{BeaconRequest, BeaconSnapshot, TransportKind};
use tidemark_core::capability::BeaconChannel;
use tidemark_core::config::BeaconConfig;
use tidemark_core::error::TransportError;
use tidemark_core::metrics as m;
use tidemark_core::types::BeaconMethod;
use tracing::{debug, info, warn};

use crate::query;

/// 전송 수단 협상기
#[derive(Debug, Clone)]
pub struct TransportNegotiator {
    url: String,
    method: BeaconMethod,
    max_get_length: usize,
    send_beacon_enabled: bool,
    form_post_enabled: bool,
}

impl TransportNegotiator {
    /// 비콘 설정으로 협상기를 만듭니다.
    pub fn new(config: &BeaconConfig) -> Self {
        Self {
            url: config.url.clone(),
            method: config.method,
            max_get_length: config.max_get_length,
            send_beacon_enabled: config.send_beacon_enabled,
            form_post_enabled: config.form_post_enabled,
        }
    }

    /// 엔드포인트 URL
    pub fn url(&self) -> &str {
        &self.url
    }

    /// 직렬화 길이와 언로드 여부, 채널 상태로 후보 목록을 정합니다.
    ///
    /// 반환 목록은 항상 우선순위 내림차순입니다.
    pub fn plan(
        &self,
        query_len: usize,
        unloading: bool,
        channel: &dyn BeaconChannel,
    ) -> Vec<TransportKind> {
        let get_allowed = match self.method {
            BeaconMethod::Auto => query_len <= self.max_get_length,
            BeaconMethod::Get => true,
            BeaconMethod::Post => false,
        };

        TransportKind::PRIORITY
            .into_iter()
            .filter(|kind| {
                let permitted = match kind {
                    TransportKind::Image => get_allowed,
                    TransportKind::SendBeacon => unloading && self.send_beacon_enabled,
                    TransportKind::FormPost => self.form_post_enabled,
                    TransportKind::Xhr => true,
                };
                permitted && channel.is_available(*kind)
            })
            .collect()
    }

    /// 스냅샷을 직렬화해 전송 수단 하나에 넘깁니다.
    ///
    /// 성공하면 실제로 사용된 전송 수단을 반환합니다.
    /// 모든 후보가 거부하면 `TransportError::Exhausted`이며 비콘은 버려집니다.
    pub fn send(
        &self,
        snapshot: &BeaconSnapshot,
        unloading: bool,
        channel: &mut dyn BeaconChannel,
    ) -> Result<TransportKind, TransportError> {
        let query = query::serialize(snapshot);
        let candidates = self.plan(query.len(), unloading, channel);
        let kind = snapshot.kind();

        for (attempt, transport) in candidates.iter().copied().enumerate() {
            let request = self.request(transport, &query);
            match channel.send(&request) {
                Ok(()) => {
                    counter!(
                        m::BEACONS_SENT_TOTAL,
                        m::LABEL_TRANSPORT => transport.as_str(),
                        m::LABEL_KIND => kind.as_str()
                    )
                    .increment(1);
                    info!(
                        transport = %transport,
                        kind = kind.as_str(),
                        bytes = query.len(),
                        attempt,
                        "beacon handed off"
                    );
                    return Ok(transport);
                }
                Err(e) => {
                    counter!(m::TRANSPORT_FALLBACKS_TOTAL, m::LABEL_TRANSPORT => transport.as_str())
                        .increment(1);
                    debug!(transport = %transport, error = %e, "transport rejected beacon, falling back");
                }
            }
        }

        counter!(m::BEACONS_DROPPED_TOTAL, m::LABEL_KIND => kind.as_str()).increment(1);
        warn!(
            kind = kind.as_str(),
            attempts = candidates.len(),
            bytes = query.len(),
            "all transports exhausted, beacon dropped"
        );
        Err(TransportError::Exhausted {
            attempts: candidates.len(),
        })
    }

    fn request(&self, transport: TransportKind, query: &str) -> BeaconRequest {
        if transport.carries_body() {
            BeaconRequest {
                transport,
                url: self.url.clone(),
                body: Some(query.to_owned()),
            }
        } else {
            BeaconRequest {
                transport,
                url: query::append_query(&self.url, query),
                body: None,
            }
        }
    }
}
