//! 에이전트 생명주기 통합 테스트
//!
//! 인메모리 capability(쿠키, 시계, 전송 채널)로 페이지 로드부터 언로드까지의
//! 비콘 흐름을 검증합니다.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tidemark_agent::{Agent, BeaconOutcome, OrchestratorState, Platform, VarScope};
use tidemark_capture::errors::{ErrorRecord, ErrorSource};
use tidemark_capture::resource::{NetworkActivityObserver, PerformanceTimeline, ResourceEntry};
use tidemark_core::beacon::{BeaconKind, BeaconSnapshot, TransportKind};
use tidemark_core::capability::{ManualClock, MemoryCookieJar, RecordingChannel};
use tidemark_core::config::{PageGroupRule, TidemarkConfig};
use tidemark_core::event::{AgentEvent, EventKind};
use tidemark_core::types::{ConsentMode, ConsentState, PageContext};
use tidemark_session::Session;

const T0: u64 = 1_700_000_000_000;
const PAGE_URL: &str = "https://www.example.com/test-click.html";

// ─── 테스트 헬퍼 ────────────────────────────────────────────────────

struct Harness {
    agent: Agent,
    channel: RecordingChannel,
    jar: MemoryCookieJar,
    clock: ManualClock,
    beacons: Arc<Mutex<Vec<BeaconSnapshot>>>,
}

impl Harness {
    fn new(config: TidemarkConfig) -> Self {
        Self::with_jar(config, MemoryCookieJar::new())
    }

    fn with_jar(config: TidemarkConfig, jar: MemoryCookieJar) -> Self {
        Self::build(config, jar, |platform| platform)
    }

    fn build(
        config: TidemarkConfig,
        jar: MemoryCookieJar,
        extend: impl FnOnce(Platform) -> Platform,
    ) -> Self {
        let channel = RecordingChannel::new();
        let clock = ManualClock::new(T0);
        let platform = Platform::new(
            jar.clone(),
            clock.clone(),
            channel.clone(),
            PageContext::new(PAGE_URL),
        );
        let mut agent = Agent::init(config, extend(platform)).expect("agent should init");

        let beacons = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&beacons);
        agent.subscribe(EventKind::OnBeacon, move |event| {
            if let AgentEvent::Beacon { snapshot, .. } = event {
                sink.lock().expect("lock").push(snapshot.clone());
            }
        });

        Self {
            agent,
            channel,
            jar,
            clock,
            beacons,
        }
    }

    fn beacons(&self) -> Vec<BeaconSnapshot> {
        self.beacons.lock().expect("lock").clone()
    }

    fn last(&self) -> BeaconSnapshot {
        self.beacons().last().cloned().expect("at least one beacon")
    }

    fn stored_session(&self) -> Option<Session> {
        self.jar
            .get("RT")
            .map(|raw| Session::decode(&raw).expect("stored cookie should decode"))
    }
}

fn implicit() -> TidemarkConfig {
    let mut config = TidemarkConfig::default();
    config.consent.mode = ConsentMode::Implicit;
    config
}

fn int(snapshot: &BeaconSnapshot, key: &str) -> i64 {
    snapshot
        .get(key)
        .and_then(|v| v.as_i64())
        .unwrap_or_else(|| panic!("{key} should be an integer"))
}

fn text(snapshot: &BeaconSnapshot, key: &str) -> String {
    snapshot
        .get(key)
        .map(ToString::to_string)
        .unwrap_or_else(|| panic!("{key} should be present"))
}

#[derive(Clone, Default)]
struct CountingTimeline {
    clears: Arc<AtomicUsize>,
}

impl PerformanceTimeline for CountingTimeline {
    fn clear_resource_timings(&mut self) -> Result<(), String> {
        self.clears.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ─── 세션 ────────────────────────────────────────────────────────────

#[test]
fn session_length_counts_sent_beacons() {
    let mut h = Harness::new(implicit());
    assert!(h.agent.page_ready().is_sent());
    h.clock.advance(1_000);
    assert!(h.agent.send_beacon().is_sent());
    h.clock.advance(1_000);
    assert!(h.agent.send_beacon().is_sent());

    let lengths: Vec<i64> = h.beacons().iter().map(|b| int(b, "rt.sl")).collect();
    assert_eq!(lengths, vec![1, 2, 3]);

    let ids: Vec<String> = h.beacons().iter().map(|b| text(b, "rt.si")).collect();
    assert!(ids.windows(2).all(|w| w[0] == w[1]));

    let stored = h.stored_session().expect("session cookie should be written");
    assert_eq!(stored.session_length, 3);
    assert_eq!(stored.session_id, ids[0]);
}

#[test]
fn existing_cookie_session_continues() {
    let mut previous = Session::mint(T0 - 10_000, 1_800);
    previous.session_length = 4;
    let jar = MemoryCookieJar::new().with_cookie("RT", &previous.encode());

    let mut h = Harness::with_jar(implicit(), jar);
    h.agent.page_ready();

    let beacon = h.last();
    assert_eq!(text(&beacon, "rt.si"), previous.session_id);
    assert_eq!(int(&beacon, "rt.sl"), 5);
    assert_eq!(int(&beacon, "rt.ss"), i64::try_from(previous.session_start).expect("fits"));
}

#[test]
fn expired_cookie_starts_new_session() {
    let mut previous = Session::mint(T0 - 3_600_000, 1_800);
    previous.session_length = 9;
    let jar = MemoryCookieJar::new().with_cookie("RT", &previous.encode());

    let mut h = Harness::with_jar(implicit(), jar);
    h.agent.page_ready();

    let beacon = h.last();
    assert_ne!(text(&beacon, "rt.si"), previous.session_id);
    assert_eq!(int(&beacon, "rt.sl"), 1);
    assert_eq!(int(&beacon, "rt.ss"), i64::try_from(T0).expect("fits"));
}

#[test]
fn malformed_cookie_starts_new_session() {
    let jar = MemoryCookieJar::new().with_cookie("RT", "garbage-without-separators");
    let mut h = Harness::with_jar(implicit(), jar);
    assert!(h.agent.page_ready().is_sent());
    assert_eq!(int(&h.last(), "rt.sl"), 1);
}

#[test]
fn dropped_beacon_releases_reserved_length() {
    let mut h = Harness::new(implicit());
    for transport in TransportKind::PRIORITY {
        h.channel.set_rejecting(transport, true);
    }
    assert_eq!(h.agent.page_ready(), BeaconOutcome::Dropped);
    assert!(h.channel.sent().is_empty());
    assert!(h.jar.writes_for("RT").is_empty());

    for transport in TransportKind::PRIORITY {
        h.channel.set_rejecting(transport, false);
    }
    assert!(h.agent.send_beacon().is_sent());
    assert_eq!(int(&h.last(), "rt.sl"), 1);
}

#[test]
fn session_cookie_expiry_moves_forward() {
    let mut h = Harness::new(implicit());
    h.agent.page_ready();
    let first = h.stored_session().expect("cookie");

    h.clock.advance(600_000);
    h.agent.send_beacon();
    let second = h.stored_session().expect("cookie");

    assert_eq!(first.session_id, second.session_id);
    assert_eq!(second.session_expiry, first.session_expiry + 600);
}

// ─── 페이로드 ────────────────────────────────────────────────────────

#[test]
fn beacon_carries_timing_and_host_fields() {
    let mut config = implicit();
    config.beacon.crumb = "c0ffee".to_owned();
    config.page_groups.push(PageGroupRule {
        pattern: r"/test-\w+\.html$".to_owned(),
        label: "tests".to_owned(),
    });
    let mut h = Harness::new(config);

    h.clock.advance(250);
    h.agent.add_var("t_done", 250).expect("add var");
    h.agent.page_ready();

    let beacon = h.last();
    assert_eq!(beacon.kind(), BeaconKind::PageLoad);
    assert_eq!(int(&beacon, "rt.tstart"), i64::try_from(T0).expect("fits"));
    assert_eq!(int(&beacon, "rt.end"), i64::try_from(T0 + 250).expect("fits"));
    assert_eq!(int(&beacon, "h.t"), i64::try_from(T0).expect("fits"));
    assert_eq!(text(&beacon, "h.cr"), "c0ffee");
    assert_eq!(text(&beacon, "h.pg"), "tests");
    assert_eq!(int(&beacon, "t_done"), 250);
    assert!(!beacon.contains("rt.quit"));
}

#[test]
fn scoped_vars_follow_their_lifetime() {
    let mut h = Harness::new(implicit());
    h.agent
        .add_var_scoped("user", "u-1", VarScope::Session)
        .expect("add");
    h.agent
        .add_var_scoped("route", "/a", VarScope::PageLoad)
        .expect("add");
    h.agent.add_var("once", 1).expect("add");

    h.agent.page_ready();
    let first = h.last();
    assert!(first.contains("user") && first.contains("route") && first.contains("once"));

    h.agent.send_beacon();
    let second = h.last();
    assert!(second.contains("user"));
    assert!(!second.contains("route"));
    assert!(!second.contains("once"));
}

#[test]
fn page_scoped_vars_are_discarded_on_navigation() {
    let mut h = Harness::new(implicit());
    h.agent
        .add_var_scoped("route", "/a", VarScope::PageLoad)
        .expect("add");
    h.agent.spa_navigation_started("https://www.example.com/b");
    h.agent.spa_navigation_complete();
    assert!(!h.last().contains("route"));
}

// ─── 내비게이션 타이밍 ──────────────────────────────────────────────

#[test]
fn navigation_timing_rides_only_on_page_load_beacon() {
    let mut config = implicit();
    config.early.enabled = true;
    let mut h = Harness::new(config);
    h.agent.add_var("nt_load_end", 900).expect("add");

    assert!(h.agent.early_beacon().is_sent());
    let early = h.last();
    assert_eq!(int(&early, "early"), 1);
    assert!(!early.has_prefix("nt_"));

    h.agent.page_ready();
    assert_eq!(int(&h.last(), "nt_load_end"), 900);

    h.agent.spa_navigation_started("https://www.example.com/next");
    h.agent.add_var("nt_load_end", 950).expect("add");
    h.agent.spa_navigation_complete();
    let spa = h.last();
    assert_eq!(text(&spa, "http.initiator"), "spa");
    assert!(!spa.has_prefix("nt_"));
}

#[test]
fn early_beacon_after_load_claims_navigation_timing() {
    let mut config = implicit();
    config.early.enabled = true;
    let mut h = Harness::new(config);
    h.agent.add_var("nt_load_end", 900).expect("add");

    h.agent.load_event();
    h.agent.early_beacon();
    assert!(h.last().has_prefix("nt_"));

    h.agent.page_ready();
    assert!(!h.last().has_prefix("nt_"));
}

#[test]
fn new_page_load_resets_navigation_timing_flag() {
    let mut h = Harness::new(implicit());
    h.agent.add_var("nt_load_end", 1).expect("add");
    h.agent.page_ready();
    assert!(h.last().has_prefix("nt_"));

    h.agent.page_load_started(PageContext::new("https://www.example.com/second"));
    h.agent.add_var("nt_load_end", 2).expect("add");
    h.agent.page_ready();
    assert_eq!(int(&h.last(), "nt_load_end"), 2);
}

#[test]
fn referrer_hash_only_without_navigation_timing() {
    let mut h = Harness::new(implicit());
    let mut page = PageContext::new(PAGE_URL).with_referrer("https://www.example.com/");
    page.navigation_timing_supported = false;
    h.agent.page_load_started(page);
    h.agent.page_ready();

    let stored = h.stored_session().expect("cookie");
    assert_eq!(stored.referrer_hash.as_deref(), Some("16ar3nk"));
    assert_eq!(stored.navigation_hash.as_deref(), Some("1fkbsnw"));

    h.agent
        .page_load_started(PageContext::new(PAGE_URL).with_referrer("https://www.example.com/"));
    h.agent.page_ready();
    assert_eq!(h.stored_session().expect("cookie").referrer_hash, None);
}

// ─── 리소스 타이밍 ──────────────────────────────────────────────────

#[test]
fn clear_on_beacon_empties_buffer_and_timeline() {
    let mut config = implicit();
    config.resource_timing.clear_on_beacon = true;
    let timeline = CountingTimeline::default();
    let clears = Arc::clone(&timeline.clears);
    let mut h = Harness::build(config, MemoryCookieJar::new(), |p| p.with_timeline(timeline));

    let added = h.agent.add_resource_entries([
        ResourceEntry::new("https://cdn.example.com/a.js", "script", 10.0),
        ResourceEntry::new("https://cdn.example.com/b.css", "link", 20.0),
    ]);
    assert_eq!(added, 2);

    h.agent.page_ready();
    assert!(h.last().contains("restiming"));
    assert_eq!(h.agent.resource_buffer_len(), 0);
    assert_eq!(clears.load(Ordering::SeqCst), 1);
}

#[test]
fn keep_policy_leaves_buffer_and_sends_entries_once() {
    let mut h = Harness::new(implicit());
    h.agent.add_resource_entries([
        ResourceEntry::new("https://cdn.example.com/a.js", "script", 10.0),
        ResourceEntry::new("https://cdn.example.com/b.css", "link", 20.0),
    ]);

    h.agent.page_ready();
    assert!(h.last().contains("restiming"));
    assert_eq!(h.agent.resource_buffer_len(), 2);

    h.agent.send_beacon();
    assert!(!h.last().contains("restiming"));
    assert_eq!(h.agent.resource_buffer_len(), 2);
}

#[test]
fn disabled_resource_timing_ignores_entries() {
    let mut config = implicit();
    config.resource_timing.enabled = false;
    let mut h = Harness::new(config);
    assert_eq!(
        h.agent
            .add_resource_entries([ResourceEntry::new("https://a.example/x", "img", 1.0)]),
        0
    );
    h.agent.page_ready();
    assert!(!h.last().contains("restiming"));
}

fn reject_all(channel: &RecordingChannel, rejecting: bool) {
    for transport in TransportKind::PRIORITY {
        channel.set_rejecting(transport, rejecting);
    }
}

#[test]
fn dropped_beacon_keeps_resources_for_next_beacon() {
    let mut config = implicit();
    config.resource_timing.clear_on_beacon = true;
    let timeline = CountingTimeline::default();
    let clears = Arc::clone(&timeline.clears);
    let mut h = Harness::build(config, MemoryCookieJar::new(), |p| p.with_timeline(timeline));
    h.agent
        .add_resource_entries([ResourceEntry::new("https://cdn.example.com/a.js", "script", 10.0)]);

    reject_all(&h.channel, true);
    assert_eq!(h.agent.page_ready(), BeaconOutcome::Dropped);
    assert_eq!(h.agent.resource_buffer_len(), 1);
    assert_eq!(clears.load(Ordering::SeqCst), 0);

    reject_all(&h.channel, false);
    assert!(h.agent.send_beacon().is_sent());
    assert!(text(&h.last(), "restiming").contains("a.js"));
    assert_eq!(h.agent.resource_buffer_len(), 0);
    assert_eq!(clears.load(Ordering::SeqCst), 1);
}

#[test]
fn dropped_beacon_under_keep_policy_resends_entries() {
    let mut h = Harness::new(implicit());
    h.agent
        .add_resource_entries([ResourceEntry::new("https://cdn.example.com/a.js", "script", 10.0)]);

    reject_all(&h.channel, true);
    assert_eq!(h.agent.page_ready(), BeaconOutcome::Dropped);

    reject_all(&h.channel, false);
    assert!(h.agent.send_beacon().is_sent());
    assert!(text(&h.last(), "restiming").contains("a.js"));

    h.agent.send_beacon();
    assert!(!h.last().contains("restiming"));
}

#[test]
fn queued_beacon_discarded_on_opt_out_leaves_timeline_alone() {
    let mut config = TidemarkConfig::default();
    config.resource_timing.clear_on_beacon = true;
    let timeline = CountingTimeline::default();
    let clears = Arc::clone(&timeline.clears);
    let mut h = Harness::build(config, MemoryCookieJar::new(), |p| p.with_timeline(timeline));
    h.agent
        .add_resource_entries([ResourceEntry::new("https://cdn.example.com/a.js", "script", 10.0)]);

    assert_eq!(h.agent.page_ready(), BeaconOutcome::Queued);
    assert_eq!(clears.load(Ordering::SeqCst), 0);
    assert_eq!(h.agent.resource_buffer_len(), 1);

    h.agent.set_consent(ConsentState::OptedOut);
    assert_eq!(clears.load(Ordering::SeqCst), 0);
    assert_eq!(h.agent.resource_buffer_len(), 1);
}

#[test]
fn queued_beacons_carry_each_entry_once_after_opt_in() {
    let mut config = TidemarkConfig::default();
    config.resource_timing.clear_on_beacon = true;
    let timeline = CountingTimeline::default();
    let clears = Arc::clone(&timeline.clears);
    let mut h = Harness::build(config, MemoryCookieJar::new(), |p| p.with_timeline(timeline));

    h.agent
        .add_resource_entries([ResourceEntry::new("https://cdn.example.com/a.js", "script", 10.0)]);
    assert_eq!(h.agent.page_ready(), BeaconOutcome::Queued);
    h.agent
        .add_resource_entries([ResourceEntry::new("https://cdn.example.com/b.js", "script", 30.0)]);
    assert_eq!(h.agent.send_beacon(), BeaconOutcome::Queued);
    assert_eq!(clears.load(Ordering::SeqCst), 0);

    let outcomes = h.agent.set_consent(ConsentState::OptedIn);
    assert!(outcomes.iter().all(BeaconOutcome::is_sent));

    let beacons = h.beacons();
    let first = text(&beacons[0], "restiming");
    let second = text(&beacons[1], "restiming");
    assert!(first.contains("a.js") && !first.contains("b.js"));
    assert!(second.contains("b.js") && !second.contains("a.js"));
    assert_eq!(h.agent.resource_buffer_len(), 0);
    assert_eq!(clears.load(Ordering::SeqCst), 2);
}

#[test]
fn keep_policy_sends_resource_that_started_earlier_but_finished_later() {
    let mut h = Harness::new(implicit());
    h.agent
        .add_resource_entries([ResourceEntry::new("https://cdn.example.com/fast.js", "script", 50.0)]);
    h.agent.page_ready();
    assert!(text(&h.last(), "restiming").contains("fast.js"));

    h.agent
        .add_resource_entries([ResourceEntry::new("https://cdn.example.com/slow.js", "script", 10.0)]);
    h.agent.send_beacon();
    let restiming = text(&h.last(), "restiming");
    assert!(restiming.contains("slow.js"));
    assert!(!restiming.contains("fast.js"));
}

// ─── 동의 ────────────────────────────────────────────────────────────

#[test]
fn undecided_consent_queues_without_side_effects() {
    let mut h = Harness::new(TidemarkConfig::default());
    assert_eq!(h.agent.consent(), ConsentState::Undecided);

    assert_eq!(h.agent.page_ready(), BeaconOutcome::Queued);
    assert_eq!(h.agent.send_beacon(), BeaconOutcome::Queued);
    assert_eq!(h.agent.state(), OrchestratorState::Suppressed);
    assert_eq!(h.agent.pending_beacons(), 2);
    assert!(h.channel.attempts().is_empty());
    assert!(h.jar.writes().is_empty());

    let outcomes = h.agent.set_consent(ConsentState::OptedIn);
    assert_eq!(outcomes.len(), 2);
    assert!(outcomes.iter().all(BeaconOutcome::is_sent));
    assert_eq!(h.agent.pending_beacons(), 0);
    assert_eq!(h.agent.state(), OrchestratorState::Idle);

    let lengths: Vec<i64> = h.beacons().iter().map(|b| int(b, "rt.sl")).collect();
    assert_eq!(lengths, vec![1, 2]);
    assert_eq!(h.stored_session().expect("cookie").session_length, 2);
    assert_eq!(h.jar.get("TM_CONSENT").as_deref(), Some("opted-in"));
}

#[test]
fn opt_out_discards_queue_and_session() {
    let mut previous = Session::mint(T0 - 10_000, 1_800);
    previous.session_length = 3;
    let jar = MemoryCookieJar::new().with_cookie("RT", &previous.encode());
    let mut h = Harness::with_jar(TidemarkConfig::default(), jar);

    assert_eq!(h.agent.page_ready(), BeaconOutcome::Queued);
    assert!(h.agent.set_consent(ConsentState::OptedOut).is_empty());

    assert_eq!(h.agent.pending_beacons(), 0);
    assert!(h.agent.session().is_none());
    assert_eq!(h.jar.get("RT"), None);
    assert_eq!(h.jar.get("TM_CONSENT").as_deref(), Some("opted-out"));

    assert_eq!(h.agent.send_beacon(), BeaconOutcome::Suppressed);
    assert!(h.channel.attempts().is_empty());
    assert!(h.beacons().is_empty());
}

#[test]
fn consent_marker_restores_previous_decision() {
    let jar = MemoryCookieJar::new().with_cookie("TM_CONSENT", "opted-in");
    let mut h = Harness::with_jar(TidemarkConfig::default(), jar);
    assert_eq!(h.agent.consent(), ConsentState::OptedIn);
    assert!(h.agent.page_ready().is_sent());
}

#[test]
fn restored_opt_out_removes_leftover_session_cookie() {
    let previous = Session::mint(T0 - 10_000, 1_800);
    let jar = MemoryCookieJar::new()
        .with_cookie("TM_CONSENT", "opted-out")
        .with_cookie("RT", &previous.encode());
    let h = Harness::with_jar(implicit(), jar);

    assert_eq!(h.agent.consent(), ConsentState::OptedOut);
    assert_eq!(h.agent.state(), OrchestratorState::Suppressed);
    assert_eq!(h.jar.get("RT"), None);
    assert_eq!(h.jar.writes_for("RT").len(), 1);
}

#[test]
fn consent_marker_is_secure_on_https_pages() {
    let mut config = TidemarkConfig::default();
    config.session.cookie_domain = "example.com".to_owned();
    let mut h = Harness::new(config);

    h.agent.set_consent(ConsentState::OptedIn);
    let marker = h.jar.writes_for("TM_CONSENT");
    assert_eq!(marker.len(), 1);
    assert!(marker[0].contains("; Domain=example.com"));
    assert!(marker[0].ends_with("; Secure"));
}

#[test]
fn consent_change_emits_event_once() {
    let mut h = Harness::new(TidemarkConfig::default());
    let changes = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&changes);
    h.agent.subscribe(EventKind::ConsentChanged, move |event| {
        if let AgentEvent::ConsentChanged { from, to } = event {
            sink.lock().expect("lock").push((*from, *to));
        }
    });

    h.agent.set_consent(ConsentState::OptedIn);
    h.agent.set_consent(ConsentState::OptedIn);
    assert_eq!(
        *changes.lock().expect("lock"),
        vec![(ConsentState::Undecided, ConsentState::OptedIn)]
    );
}

// ─── 에러 ────────────────────────────────────────────────────────────

#[test]
fn errors_before_load_ride_on_page_load_beacon() {
    let mut h = Harness::new(implicit());
    h.agent.record_error(ErrorRecord::new("early failure"));
    h.agent.page_ready();

    let records = tidemark_capture::decompress(&text(&h.last(), "err")).expect("err decodes");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].message, "early failure");
    assert_eq!(h.agent.error_buffer_len(), 0);
}

#[test]
fn errors_after_load_are_batched_into_one_beacon() {
    let mut h = Harness::new(implicit());
    h.agent.page_ready();
    let sent_before = h.beacons().len();

    let boom = ErrorRecord::new("boom").at("https://www.example.com/app.js", 10, 5);
    h.agent.record_error(boom.clone());
    h.clock.advance(200);
    h.agent.record_error(boom);
    h.agent.record_error(ErrorRecord::new("other"));

    assert_eq!(h.agent.tick(), None);
    h.clock.advance(800);
    assert!(h.agent.tick().expect("error beacon due").is_sent());
    assert_eq!(h.beacons().len(), sent_before + 1);

    let beacon = h.last();
    assert_eq!(beacon.kind(), BeaconKind::Error);
    assert_eq!(text(&beacon, "http.initiator"), "error");
    let records = tidemark_capture::decompress(&text(&beacon, "err")).expect("err decodes");
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].count, 2);
    assert_eq!(records[1].message, "other");

    h.clock.advance(5_000);
    assert_eq!(h.agent.tick(), None);
}

#[test]
fn error_listeners_see_running_count() {
    let mut h = Harness::new(implicit());
    let counts = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&counts);
    h.agent.subscribe(EventKind::OnError, move |event| {
        if let AgentEvent::Error { count, .. } = event {
            sink.lock().expect("lock").push(*count);
        }
    });

    h.agent.record_error(ErrorRecord::new("x"));
    h.agent.record_error(ErrorRecord::new("x"));
    assert_eq!(*counts.lock().expect("lock"), vec![1, 2]);
}

struct QueueSource(Vec<ErrorRecord>);

impl ErrorSource for QueueSource {
    fn drain_errors(&mut self) -> Vec<ErrorRecord> {
        std::mem::take(&mut self.0)
    }
}

struct QueueObserver(Vec<ResourceEntry>);

impl NetworkActivityObserver for QueueObserver {
    fn drain_completed(&mut self) -> Vec<ResourceEntry> {
        std::mem::take(&mut self.0)
    }
}

#[test]
fn tick_polls_platform_capabilities() {
    let mut h = Harness::build(implicit(), MemoryCookieJar::new(), |p| {
        p.with_error_source(QueueSource(vec![ErrorRecord::new("polled")]))
            .with_network_observer(QueueObserver(vec![ResourceEntry::new(
                "https://api.example.com/x",
                "xmlhttprequest",
                5.0,
            )]))
    });

    assert_eq!(h.agent.tick(), None);
    assert_eq!(h.agent.error_buffer_len(), 1);
    assert_eq!(h.agent.resource_buffer_len(), 1);
    assert_eq!(h.agent.poll_capabilities(), 0);
}

// ─── 연속성과 언로드 ────────────────────────────────────────────────

#[test]
fn continuity_beacons_respect_interval_and_quiet_period() {
    let mut config = implicit();
    config.continuity.enabled = true;
    config.continuity.interval_ms = 60_000;
    config.continuity.min_wait_ms = 5_000;
    let mut h = Harness::new(config);

    h.agent.page_ready();
    h.clock.advance(59_999);
    assert_eq!(h.agent.tick(), None);

    h.clock.advance(1);
    assert!(h.agent.tick().expect("interval due").is_sent());
    let beacon = h.last();
    assert_eq!(beacon.kind(), BeaconKind::Interval);
    assert_eq!(text(&beacon, "http.initiator"), "interval");
    assert_eq!(h.agent.tick(), None);

    h.clock.advance(58_000);
    h.agent.send_beacon();
    h.clock.advance(2_000);
    assert_eq!(h.agent.tick(), None, "recent beacon should hold off interval");

    h.clock.advance(3_000);
    assert!(h.agent.tick().is_some());
}

#[test]
fn continuity_waits_for_load() {
    let mut config = implicit();
    config.continuity.enabled = true;
    let mut h = Harness::new(config);
    h.clock.advance(120_000);
    assert_eq!(h.agent.tick(), None);
}

#[test]
fn unload_beacon_marks_quit() {
    let mut h = Harness::new(implicit());
    h.agent.page_ready();
    assert_eq!(h.agent.unload(), BeaconOutcome::Sent(TransportKind::Image));
    let beacon = h.last();
    assert_eq!(beacon.kind(), BeaconKind::Unload);
    assert!(beacon.contains("rt.quit"));
    assert!(h.agent.page().unloading);
}

#[test]
fn large_unload_beacon_uses_send_beacon() {
    let mut h = Harness::new(implicit());
    h.agent.page_ready();
    h.agent.add_var("blob", "x".repeat(3_000)).expect("add");
    assert_eq!(
        h.agent.unload(),
        BeaconOutcome::Sent(TransportKind::SendBeacon)
    );
}

#[test]
fn before_beacon_fires_ahead_of_on_beacon() {
    let mut h = Harness::new(implicit());
    let order = Arc::new(Mutex::new(Vec::new()));
    for kind in [EventKind::BeforeBeacon, EventKind::OnBeacon] {
        let sink = Arc::clone(&order);
        h.agent.subscribe(kind, move |event| {
            sink.lock().expect("lock").push(event.kind());
        });
    }

    h.agent.page_ready();
    assert_eq!(
        *order.lock().expect("lock"),
        vec![EventKind::BeforeBeacon, EventKind::OnBeacon]
    );
}

#[test]
fn long_payload_falls_back_to_post() {
    let mut h = Harness::new(implicit());
    h.agent.add_var("blob", "x".repeat(3_000)).expect("add");
    assert_eq!(
        h.agent.page_ready(),
        BeaconOutcome::Sent(TransportKind::FormPost)
    );
    let request = h.channel.sent().pop().expect("request");
    assert!(request.body.is_some());
    assert_eq!(request.url, "/beacon");
}
