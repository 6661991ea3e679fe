mod support;

use quartz_engine::{
    Broadcaster, CycleOutcome, DropReason, LoopEvent, Sampler, SessionId, Transport,
};
use quartz_ring::{BroadcastRing, CommandRing, Message, RingConfig};
use std::sync::Arc;
use std::time::Duration;
use support::{CountingSensors, CountingWaker, LoopbackTransport};

type TestSampler = Sampler<CountingSensors, Arc<CountingWaker>>;

fn rig(capacity: usize) -> (TestSampler, Broadcaster, Arc<CountingWaker>) {
    let ring = Arc::new(BroadcastRing::new(RingConfig::new(capacity)));
    let commands = Arc::new(CommandRing::new(RingConfig::new(capacity)));
    let waker = Arc::new(CountingWaker::default());
    let sampler = Sampler::new(
        CountingSensors::default(),
        Arc::clone(&ring),
        Arc::clone(&waker),
        Duration::from_millis(250),
    );
    (sampler, Broadcaster::new(ring, commands), waker)
}

fn temperature_of(json: &str) -> String {
    // {"temp":{"value":"N.000",...
    let start = json.find(r#""value":""#).unwrap() + 9;
    let end = start + json[start..].find('"').unwrap();
    json[start..end].to_string()
}

#[test]
fn no_subscribers_means_no_sampling() {
    let (mut sampler, broadcaster, waker) = rig(8);
    for _ in 0..20 {
        assert_eq!(sampler.run_cycle(), CycleOutcome::Skipped);
    }
    let stats = sampler.stats();
    assert_eq!(stats.cycles, 20);
    assert_eq!(stats.skipped, 20);
    assert_eq!(stats.published, 0);
    assert_eq!(stats.dropped, 0);
    assert_eq!(broadcaster.ring().head(), 0);
    assert_eq!(waker.count(), 0);
}

#[test]
fn late_subscriber_drains_backlog_in_order() {
    let (mut sampler, mut broadcaster, _) = rig(8);
    let mut transport = LoopbackTransport::default();
    let holder = SessionId(1);
    let late = SessionId(2);

    // The holder never gets a writable turn, so it pins the backlog.
    broadcaster.handle(&mut transport, LoopEvent::Connected(holder));
    for _ in 0..5 {
        assert_eq!(sampler.run_cycle(), CycleOutcome::Published);
    }
    assert_eq!(broadcaster.ring().len(), 5);

    broadcaster.handle(&mut transport, LoopEvent::Connected(late));
    assert_eq!(
        broadcaster.ring().cursor(broadcaster.sessions().get(late).unwrap().cursor),
        Some(broadcaster.ring().oldest_tail())
    );

    for _ in 0..2 {
        sampler.run_cycle();
    }
    transport.request_writable(late);
    transport.pump(&mut broadcaster);

    let temps: Vec<_> = transport.messages(late).iter().map(|m| temperature_of(m)).collect();
    assert_eq!(
        temps,
        ["1.000", "2.000", "3.000", "4.000", "5.000", "6.000", "7.000"]
    );
    assert!(transport.messages(holder).is_empty());
}

#[test]
fn wake_reaches_every_session() {
    let (mut sampler, mut broadcaster, waker) = rig(8);
    let mut transport = LoopbackTransport::default();
    for id in 1..=3 {
        broadcaster.handle(&mut transport, LoopEvent::Connected(SessionId(id)));
    }
    sampler.run_cycle();
    assert_eq!(waker.count(), 1);

    broadcaster.handle(&mut transport, LoopEvent::Wake);
    transport.pump(&mut broadcaster);
    for id in 1..=3 {
        assert_eq!(transport.messages(SessionId(id)).len(), 1);
    }
    assert!(broadcaster.ring().is_empty());
}

#[test]
fn stalled_subscriber_causes_drops_until_it_leaves() {
    let (mut sampler, mut broadcaster, _) = rig(4);
    let mut transport = LoopbackTransport::default();
    let stalled = SessionId(9);
    broadcaster.handle(&mut transport, LoopEvent::Connected(stalled));

    for _ in 0..4 {
        assert_eq!(sampler.run_cycle(), CycleOutcome::Published);
    }
    assert_eq!(
        sampler.run_cycle(),
        CycleOutcome::Dropped(DropReason::RingFull)
    );
    assert_eq!(sampler.stats().dropped, 1);

    broadcaster.handle(&mut transport, LoopEvent::Disconnected(stalled));
    assert_eq!(broadcaster.ring().free_slots(), 4);

    // Nobody left to publish to.
    assert_eq!(sampler.run_cycle(), CycleOutcome::Skipped);
}

#[test]
fn partial_sensor_failure_still_publishes() {
    let (mut sampler, mut broadcaster, _) = rig(4);
    let mut transport = LoopbackTransport::default();
    let id = SessionId(1);
    broadcaster.handle(&mut transport, LoopEvent::Connected(id));

    sampler.run_cycle();
    transport.request_writable(id);
    transport.pump(&mut broadcaster);
    let msgs = transport.messages(id);
    assert!(msgs[0].contains(r#""light":{"value":"300","isActive":"1"}"#));
    assert!(msgs[0].contains(r#""temp":{"value":"1.000","isActive":"1"}"#));

    let (mut failing, mut broadcaster, _) = rig(4);
    broadcaster.handle(&mut transport, LoopEvent::Connected(SessionId(2)));
    failing.sample();
    failing.source_mut().light_fails = true;
    assert_eq!(failing.run_cycle(), CycleOutcome::Published);
    transport.request_writable(SessionId(2));
    transport.pump(&mut broadcaster);
    let msgs = transport.messages(SessionId(2));
    assert!(msgs[0].contains(r#""light":{"value":"300","isActive":"0"}"#));
    assert!(msgs[0].contains(r#""proximity":{"value":"12","isActive":"1"}"#));
}

#[test]
fn received_commands_land_in_the_command_ring() {
    let ring = Arc::new(BroadcastRing::new(RingConfig::new(2)));
    let commands = Arc::new(CommandRing::new(RingConfig::new(2)));
    let mut broadcaster = Broadcaster::new(ring, Arc::clone(&commands));
    let mut transport = LoopbackTransport::default();

    broadcaster.handle(
        &mut transport,
        LoopEvent::Received(SessionId(1), br#"{"led":"on"}"#),
    );
    let msg: Message = commands.try_dequeue().unwrap();
    assert_eq!(msg.payload(), br#"{"led":"on"}"#);
}
