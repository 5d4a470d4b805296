//! Time-scaled replay of recorded event slices.
//!
//! An [`EventReplayer`] wraps a buffer of events in insertion order and a
//! cursor. [`EventReplayer::replay`] re-delivers events to a callback,
//! sleeping between them so that relative wall-clock spacing equals the
//! original inter-arrival spacing divided by `speed_multiplier` (when
//! `respect_timestamps` is on). [`EventReplayer::replay_next`] steps one
//! event at a time with no sleeping.
//!
//! The replayer assumes monotonic input timestamps; a backwards jump
//! clamps to a zero sleep rather than reordering anything.

use crate::event::Event;
use crate::filter::FilterExpr;
use std::time::{Duration, Instant};

/// Replay pacing and filtering.
#[derive(Debug, Clone)]
pub struct ReplayConfig {
    /// Time compression factor: 2.0 replays twice as fast.
    pub speed_multiplier: f64,
    /// Sleep to reproduce original inter-arrival spacing.
    pub respect_timestamps: bool,
    /// Deliver only matching events; non-matching events still advance
    /// the cursor.
    pub filter: Option<FilterExpr>,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            speed_multiplier: 1.0,
            respect_timestamps: true,
            filter: None,
        }
    }
}

impl ReplayConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_speed_multiplier(mut self, multiplier: f64) -> Self {
        self.speed_multiplier = multiplier;
        self
    }

    pub fn with_respect_timestamps(mut self, respect: bool) -> Self {
        self.respect_timestamps = respect;
        self
    }

    pub fn with_filter(mut self, filter: FilterExpr) -> Self {
        self.filter = Some(filter);
        self
    }
}

/// Cursor over a recorded event buffer; see the module docs.
#[derive(Debug)]
pub struct EventReplayer {
    events: Vec<Event>,
    config: ReplayConfig,
    cursor: usize,
}

impl EventReplayer {
    pub fn new(events: Vec<Event>, config: ReplayConfig) -> Self {
        Self {
            events,
            config,
            cursor: 0,
        }
    }

    /// Replay every remaining matching event through the callback,
    /// sleeping between deliveries per the config. Returns how many
    /// events were delivered.
    pub async fn replay<F>(&mut self, mut callback: F) -> usize
    where
        F: FnMut(&Event),
    {
        let started = Instant::now();
        let mut baseline_ts: Option<u64> = None;
        let mut delivered = 0;

        while self.cursor < self.events.len() {
            let event = &self.events[self.cursor];
            self.cursor += 1;

            if let Some(filter) = &self.config.filter {
                if !filter.matches(event) {
                    continue;
                }
            }

            if self.config.respect_timestamps {
                let first = *baseline_ts.get_or_insert(event.metadata.timestamp);
                // Backwards timestamps clamp to zero delay.
                let delta_ms = event.metadata.timestamp.saturating_sub(first);
                let speed = if self.config.speed_multiplier > 0.0 {
                    self.config.speed_multiplier
                } else {
                    1.0
                };
                let target = Duration::from_secs_f64(delta_ms as f64 / 1000.0 / speed);
                let elapsed = started.elapsed();
                if target > elapsed {
                    tokio::time::sleep(target - elapsed).await;
                }
            }

            callback(event);
            delivered += 1;
        }
        delivered
    }

    /// Return the next matching event and advance past it. No sleeping.
    pub fn replay_next(&mut self) -> Option<&Event> {
        while self.cursor < self.events.len() {
            let index = self.cursor;
            self.cursor += 1;
            let matches = match &self.config.filter {
                Some(filter) => filter.matches(&self.events[index]),
                None => true,
            };
            if matches {
                return self.events.get(index);
            }
        }
        None
    }

    /// Rewind the cursor to the start of the buffer.
    pub fn reset(&mut self) {
        self.cursor = 0;
    }

    /// Position the cursor at the first event with `timestamp >= ts`.
    pub fn seek_to_time(&mut self, timestamp_ms: u64) {
        self.cursor = self
            .events
            .partition_point(|e| e.metadata.timestamp < timestamp_ms);
    }

    /// Events (matching or not) still ahead of the cursor.
    pub fn remaining(&self) -> usize {
        self.events.len() - self.cursor
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EventCategory, Severity};
    use serde_json::Value;

    fn event_at(name: &str, timestamp: u64) -> Event {
        let mut event = Event::new(
            name,
            EventCategory::System,
            Severity::Info,
            "replay-test",
            Value::Null,
        );
        event.metadata.timestamp = timestamp;
        event
    }

    #[tokio::test]
    async fn test_replay_delivers_in_order() {
        let events = vec![
            event_at("a", 1_000),
            event_at("b", 1_010),
            event_at("c", 1_020),
        ];
        let mut replayer = EventReplayer::new(
            events,
            ReplayConfig::new().with_respect_timestamps(false),
        );
        let mut seen = Vec::new();
        let delivered = replayer.replay(|e| seen.push(e.name.clone())).await;
        assert_eq!(delivered, 3);
        assert_eq!(seen, ["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_replay_scales_time() {
        // 400ms of original spacing at 100x ⇒ ~4ms of wall clock
        let events = vec![event_at("a", 0), event_at("b", 400)];
        let mut replayer = EventReplayer::new(
            events,
            ReplayConfig::new().with_speed_multiplier(100.0),
        );
        let started = Instant::now();
        let delivered = replayer.replay(|_| {}).await;
        let elapsed = started.elapsed();
        assert_eq!(delivered, 2);
        assert!(elapsed >= Duration::from_millis(3), "elapsed {elapsed:?}");
        assert!(elapsed < Duration::from_millis(200), "elapsed {elapsed:?}");
    }

    #[tokio::test]
    async fn test_replay_clamps_backwards_timestamps() {
        let events = vec![event_at("a", 5_000), event_at("b", 1_000)];
        let mut replayer = EventReplayer::new(events, ReplayConfig::default());
        let started = Instant::now();
        let delivered = replayer.replay(|_| {}).await;
        assert_eq!(delivered, 2);
        assert!(started.elapsed() < Duration::from_millis(100));
    }

    #[test]
    fn test_replay_next_and_reset() {
        let events = vec![event_at("a", 1), event_at("b", 2)];
        let mut replayer = EventReplayer::new(
            events,
            ReplayConfig::new().with_respect_timestamps(false),
        );
        assert_eq!(replayer.replay_next().unwrap().name, "a");
        assert_eq!(replayer.replay_next().unwrap().name, "b");
        assert!(replayer.replay_next().is_none());

        replayer.reset();
        assert_eq!(replayer.remaining(), 2);
        assert_eq!(replayer.replay_next().unwrap().name, "a");
    }

    #[test]
    fn test_replay_next_applies_filter() {
        let mut low = event_at("low", 1);
        low.severity = Severity::Debug;
        let mut high = event_at("high", 2);
        high.severity = Severity::Error;

        let mut replayer = EventReplayer::new(
            vec![low, high],
            ReplayConfig::new()
                .with_respect_timestamps(false)
                .with_filter(FilterExpr::severity_at_least(Severity::Warning)),
        );
        assert_eq!(replayer.replay_next().unwrap().name, "high");
        assert!(replayer.replay_next().is_none());
    }

    #[test]
    fn test_seek_to_time() {
        let events = vec![
            event_at("a", 1_000),
            event_at("b", 2_000),
            event_at("c", 3_000),
        ];
        let mut replayer = EventReplayer::new(
            events,
            ReplayConfig::new().with_respect_timestamps(false),
        );

        replayer.seek_to_time(2_000);
        assert_eq!(replayer.replay_next().unwrap().name, "b");

        replayer.seek_to_time(2_500);
        assert_eq!(replayer.replay_next().unwrap().name, "c");

        replayer.seek_to_time(9_000);
        assert!(replayer.replay_next().is_none());
    }
}
