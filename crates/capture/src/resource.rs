//! 리소스 타이밍 버퍼
//!
//! [`ResourceBuffer`]는 플랫폼에서 받은 리소스 타이밍 엔트리를 비콘 전까지 보관합니다.
//!
//! # 드레인 정책
//! 전송이 성공한 뒤에만 적용됩니다.
//! - [`DrainPolicy::Clear`]: 보낸 엔트리를 버리고 플랫폼 타임라인을 비움
//! - [`DrainPolicy::Keep`]: 보낸 엔트리를 표시만 하고 버퍼는 유지
//!
//! 버퍼가 가득 차면 새 엔트리를 거부하고 드롭 카운터를 올립니다.

use metrics::counter;
use serde::{Deserialize, Serialize};
use tidemark_core::metrics as m;
use tracing::{debug, warn};

/// 리소스 타이밍 엔트리
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceEntry {
    /// 리소스 URL
    #[serde(rename = "n")]
    pub name: String,
    /// 요청 주체 (img, script, xmlhttprequest 등)
    #[serde(rename = "i")]
    pub initiator_type: String,
    /// 내비게이션 시작 기준 시작 시각 (밀리초)
    #[serde(rename = "s")]
    pub start_time: f64,
    /// 소요 시간 (밀리초)
    #[serde(rename = "d")]
    pub duration: f64,
    /// 전송 바이트 수
    #[serde(rename = "t", default)]
    pub transfer_size: u64,
}

impl ResourceEntry {
    /// 엔트리를 만듭니다.
    pub fn new(name: impl Into<String>, initiator_type: impl Into<String>, start_time: f64) -> Self {
        Self {
            name: name.into(),
            initiator_type: initiator_type.into(),
            start_time,
            duration: 0.0,
            transfer_size: 0,
        }
    }

    /// 소요 시간을 지정합니다.
    pub fn with_duration(mut self, duration: f64) -> Self {
        self.duration = duration;
        self
    }

    /// 전송 바이트 수를 지정합니다.
    pub fn with_transfer_size(mut self, transfer_size: u64) -> Self {
        self.transfer_size = transfer_size;
        self
    }

    /// 음수/비유한 시각을 0으로 맞추고 이름의 공백을 제거합니다.
    fn normalized(mut self) -> Self {
        let clamp = |v: f64| if v.is_finite() && v > 0.0 { v } else { 0.0 };
        self.start_time = clamp(self.start_time);
        self.duration = clamp(self.duration);
        let trimmed = self.name.trim();
        if trimmed.len() != self.name.len() {
            self.name = trimmed.to_owned();
        }
        if self.initiator_type.is_empty() {
            self.initiator_type = "other".to_owned();
        }
        self
    }
}

/// 플랫폼 리소스 타이밍 타임라인
pub trait PerformanceTimeline: Send {
    /// 플랫폼 타임라인의 리소스 엔트리를 비웁니다.
    fn clear_resource_timings(&mut self) -> Result<(), String>;
}

/// 완료된 네트워크 요청을 관찰하는 어댑터
pub trait NetworkActivityObserver: Send {
    /// 마지막 호출 이후 완료된 요청을 꺼냅니다.
    fn drain_completed(&mut self) -> Vec<ResourceEntry>;
}

/// 드레인 정책
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainPolicy {
    /// 전송 후 엔트리를 버리고 플랫폼 타임라인을 비움
    Clear,
    /// 전송 후에도 엔트리를 보관하되 다시 보내지 않음
    Keep,
}

impl DrainPolicy {
    /// `clear_on_beacon` 설정값에서 정책을 고릅니다.
    pub fn from_clear_on_beacon(clear: bool) -> Self {
        if clear { Self::Clear } else { Self::Keep }
    }
}

/// 비콘 하나에 예약된 엔트리 목록
///
/// [`ResourceBuffer::reserve`]가 돌려주며, 전송 결과에 따라
/// [`ResourceBuffer::commit`] 또는 [`ResourceBuffer::release`]로 되돌려줍니다.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceMark {
    seqs: Vec<u64>,
}

impl ResourceMark {
    /// 예약된 엔트리 수
    pub fn len(&self) -> usize {
        self.seqs.len()
    }

    /// 예약된 엔트리가 없는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.seqs.is_empty()
    }

    fn contains(&self, seq: u64) -> bool {
        self.seqs.binary_search(&seq).is_ok()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlotState {
    Unsent,
    Reserved,
    Sent,
}

#[derive(Debug)]
struct Slot {
    seq: u64,
    entry: ResourceEntry,
    state: SlotState,
}

/// 리소스 타이밍 버퍼
///
/// 엔트리는 `Unsent -> Reserved -> Sent` 순으로 움직입니다. 예약은 비콘
/// finalize 시점에, 확정은 전송 성공 후에 일어나며, 전송되지 못한 비콘의
/// 예약은 해제되어 다음 비콘에 다시 실립니다.
#[derive(Debug)]
pub struct ResourceBuffer {
    slots: Vec<Slot>,
    capacity: usize,
    next_seq: u64,
    dropped_count: u64,
}

impl ResourceBuffer {
    /// 새 버퍼를 만듭니다.
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity.min(1024)),
            capacity,
            next_seq: 0,
            dropped_count: 0,
        }
    }

    /// 엔트리를 정규화해 추가합니다. 추가된 개수를 반환합니다.
    pub fn ingest(&mut self, entries: impl IntoIterator<Item = ResourceEntry>) -> usize {
        let mut accepted = 0;
        let mut rejected = 0_u64;

        for entry in entries {
            if self.slots.len() >= self.capacity {
                rejected += 1;
                continue;
            }
            self.slots.push(Slot {
                seq: self.next_seq,
                entry: entry.normalized(),
                state: SlotState::Unsent,
            });
            self.next_seq += 1;
            accepted += 1;
        }

        if rejected > 0 {
            self.dropped_count += rejected;
            counter!(m::RESOURCES_DROPPED_TOTAL).increment(rejected);
            warn!(
                rejected,
                dropped = self.dropped_count,
                capacity = self.capacity,
                "resource buffer full, rejected new entries"
            );
        }
        accepted
    }

    /// 아직 보내지 않은 엔트리를 예약하고 꺼냅니다.
    ///
    /// 버퍼 내용은 [`commit`](Self::commit) 전까지 바뀌지 않습니다.
    pub fn reserve(&mut self) -> (Vec<ResourceEntry>, ResourceMark) {
        let mut entries = Vec::new();
        let mut seqs = Vec::new();
        for slot in self.slots.iter_mut().filter(|s| s.state == SlotState::Unsent) {
            slot.state = SlotState::Reserved;
            entries.push(slot.entry.clone());
            seqs.push(slot.seq);
        }
        debug!(count = entries.len(), "resource entries reserved");
        (entries, ResourceMark { seqs })
    }

    /// 전송에 성공한 비콘의 예약을 확정합니다.
    ///
    /// `Clear`일 때 플랫폼 타임라인 정리 실패는 로그와 카운터로만 남깁니다.
    pub fn commit(
        &mut self,
        mark: ResourceMark,
        policy: DrainPolicy,
        timeline: Option<&mut dyn PerformanceTimeline>,
    ) {
        match policy {
            DrainPolicy::Clear => {
                self.slots.retain(|slot| !mark.contains(slot.seq));
                if let Some(timeline) = timeline
                    && let Err(reason) = timeline.clear_resource_timings()
                {
                    counter!(m::RESOURCE_CLEAR_FAILURES_TOTAL).increment(1);
                    warn!(reason = %reason, "failed to clear platform resource timeline");
                }
                debug!(sent = mark.len(), left = self.slots.len(), "resource buffer cleared");
            }
            DrainPolicy::Keep => {
                for slot in self.slots.iter_mut().filter(|s| mark.contains(s.seq)) {
                    slot.state = SlotState::Sent;
                }
                debug!(sent = mark.len(), kept = self.slots.len(), "resource entries marked sent");
            }
        }
    }

    /// 전송되지 못한 비콘의 예약을 해제합니다.
    pub fn release(&mut self, mark: ResourceMark) {
        if mark.is_empty() {
            return;
        }
        for slot in self
            .slots
            .iter_mut()
            .filter(|s| s.state == SlotState::Reserved && mark.contains(s.seq))
        {
            slot.state = SlotState::Unsent;
        }
        debug!(count = mark.len(), "resource reservation released");
    }

    /// 현재 엔트리 수
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// 비어 있는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// 아직 보내지 않은 엔트리 수 (예약 포함)
    pub fn unsent_len(&self) -> usize {
        self.slots
            .iter()
            .filter(|s| s.state != SlotState::Sent)
            .count()
    }

    /// 최대 용량
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// 지금까지 거부된 엔트리 수
    pub fn dropped_count(&self) -> u64 {
        self.dropped_count
    }

    /// 버퍼를 비웁니다 (플랫폼 타임라인은 건드리지 않음).
    pub fn reset(&mut self) {
        self.slots.clear();
    }
}

/// 엔트리 목록을 `restiming` 값으로 쓸 압축 JSON으로 인코딩합니다.
pub fn encode_entries(entries: &[ResourceEntry]) -> Option<String> {
    if entries.is_empty() {
        return None;
    }
    match serde_json::to_string(entries) {
        Ok(json) => Some(json),
        Err(e) => {
            warn!(error = %e, "failed to encode resource timing entries");
            None
        }
    }
}
