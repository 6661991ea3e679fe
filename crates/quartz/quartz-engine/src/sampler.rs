//! Producer thread: samples the sensors on a fixed period and publishes
//! encoded readings into the broadcast ring.

use crate::shutdown::Shutdown;
use crate::wake::LoopWaker;
use quartz_events::{Field, Reading, SensorSource, encode_reading};
use quartz_ring::{BroadcastRing, Message};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SamplerStats {
    pub cycles: u64,
    /// Cycles skipped because nobody was subscribed.
    pub skipped: u64,
    pub published: u64,
    pub dropped: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    RingFull,
    Encode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    Skipped,
    Published,
    Dropped(DropReason),
}

pub struct Sampler<S, W> {
    source: S,
    ring: Arc<BroadcastRing<Message>>,
    waker: W,
    interval: Duration,
    last: Reading,
    stats: SamplerStats,
}

impl<S: SensorSource, W: LoopWaker> Sampler<S, W> {
    /// `interval` is used as given; the floor is applied by configuration.
    pub fn new(source: S, ring: Arc<BroadcastRing<Message>>, waker: W, interval: Duration) -> Self {
        Self {
            source,
            ring,
            waker,
            interval,
            last: Reading::default(),
            stats: SamplerStats::default(),
        }
    }

    /// Runs cycles until `shutdown` fires, sleeping `interval - elapsed`
    /// between them so the period does not drift.
    pub fn run(&mut self, shutdown: &Shutdown) -> SamplerStats {
        info!(interval_ms = self.interval.as_millis() as u64, "sampler started");
        while !shutdown.is_triggered() {
            let started = Instant::now();
            self.run_cycle();
            let remaining = self.interval.saturating_sub(started.elapsed());
            if !remaining.is_zero() && shutdown.sleep(remaining) {
                break;
            }
        }
        let stats = self.stats;
        info!(
            cycles = stats.cycles,
            published = stats.published,
            dropped = stats.dropped,
            "sampler stopped"
        );
        stats
    }

    pub fn run_cycle(&mut self) -> CycleOutcome {
        self.stats.cycles += 1;

        if self.ring.consumer_count() == 0 {
            self.stats.skipped += 1;
            return CycleOutcome::Skipped;
        }
        if self.ring.free_slots() == 0 {
            return self.drop_cycle(DropReason::RingFull);
        }

        let reading = self.sample();
        let payload = match encode_reading(&reading) {
            Ok(payload) => payload,
            Err(error) => {
                warn!(%error, "failed to encode reading");
                return self.drop_cycle(DropReason::Encode);
            }
        };
        let len = payload.len();
        match self.ring.try_insert(Message::from(payload)) {
            Ok(()) => {
                self.stats.published += 1;
                debug!(len, "reading published");
                self.waker.wake();
                CycleOutcome::Published
            }
            Err(_) => self.drop_cycle(DropReason::RingFull),
        }
    }

    fn drop_cycle(&mut self, reason: DropReason) -> CycleOutcome {
        self.stats.dropped += 1;
        if reason == DropReason::RingFull {
            warn!(
                capacity = self.ring.capacity(),
                dropped = self.stats.dropped,
                "broadcast ring full, dropping reading"
            );
        }
        CycleOutcome::Dropped(reason)
    }

    /// Reads every channel. A failed channel keeps its last good value and is
    /// flagged inactive for this cycle only.
    pub fn sample(&mut self) -> Reading {
        let last = self.last;
        let mut reading = Reading {
            temperature: Field::inactive(last.temperature.value),
            humidity: Field::inactive(last.humidity.value),
            light: Field::inactive(last.light.value),
            proximity: Field::inactive(last.proximity.value),
        };

        match self.source.read_climate() {
            Ok(climate) => {
                reading.temperature = Field::active(climate.temperature_c);
                reading.humidity = Field::active(climate.humidity_pct);
            }
            Err(error) => warn!(%error, "temperature/humidity read failed"),
        }
        match self.source.read_light() {
            Ok(lux) => reading.light = Field::active(lux),
            Err(error) => warn!(%error, "light read failed"),
        }
        match self.source.read_proximity() {
            Ok(p) => reading.proximity = Field::active(p),
            Err(error) => warn!(%error, "proximity read failed"),
        }

        self.last = reading;
        reading
    }

    pub fn stats(&self) -> SamplerStats {
        self.stats
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quartz_events::{Climate, SensorError};
    use quartz_ring::RingConfig;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingWaker(AtomicUsize);

    impl LoopWaker for CountingWaker {
        fn wake(&self) {
            self.0.fetch_add(1, Ordering::Relaxed);
        }
    }

    struct Scripted {
        fail_light_after: u32,
        reads: u32,
    }

    impl SensorSource for Scripted {
        fn read_climate(&mut self) -> Result<Climate, SensorError> {
            self.reads += 1;
            Ok(Climate {
                temperature_c: 20.0 + self.reads as f32,
                humidity_pct: 50.0,
            })
        }

        fn read_light(&mut self) -> Result<u32, SensorError> {
            if self.reads > self.fail_light_after {
                Err(SensorError::Injected("light"))
            } else {
                Ok(100 * self.reads)
            }
        }

        fn read_proximity(&mut self) -> Result<u32, SensorError> {
            Ok(5)
        }
    }

    fn sampler(cap: usize, fail_light_after: u32) -> Sampler<Scripted, Arc<CountingWaker>> {
        Sampler::new(
            Scripted {
                fail_light_after,
                reads: 0,
            },
            Arc::new(BroadcastRing::new(RingConfig::new(cap))),
            Arc::new(CountingWaker::default()),
            Duration::from_millis(250),
        )
    }

    #[test]
    fn failed_channel_keeps_last_value_but_goes_inactive() {
        let mut s = sampler(4, 1);
        let first = s.sample();
        assert_eq!(first.light, Field::active(100));

        let second = s.sample();
        assert_eq!(second.light, Field::inactive(100));
        assert_eq!(second.temperature, Field::active(22.0));
        assert!(second.proximity.active);
    }

    #[test]
    fn activity_recovers_on_next_good_read() {
        let mut s = sampler(4, 0);
        assert!(!s.sample().light.active);
        s.source.fail_light_after = u32::MAX;
        assert!(s.sample().light.active);
    }

    #[test]
    fn publish_wakes_the_loop() {
        let mut s = sampler(4, u32::MAX);
        let _consumer = s.ring.register_consumer();
        assert_eq!(s.run_cycle(), CycleOutcome::Published);
        assert_eq!(s.waker.0.load(Ordering::Relaxed), 1);
        assert_eq!(s.ring.len(), 1);
    }

    #[test]
    fn full_ring_drops_without_sampling() {
        let mut s = sampler(2, u32::MAX);
        let _consumer = s.ring.register_consumer();
        s.run_cycle();
        s.run_cycle();
        let reads = s.source.reads;
        assert_eq!(
            s.run_cycle(),
            CycleOutcome::Dropped(DropReason::RingFull)
        );
        assert_eq!(s.source.reads, reads);
        assert_eq!(s.stats().dropped, 1);
        assert_eq!(s.waker.0.load(Ordering::Relaxed), 2);
    }
}
