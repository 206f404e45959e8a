//! Per sentence type throttling of recorded events.

use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::clock::Clock;
use crate::config::{ThrottleConfig, ThrottleRule};

/// Sentence identifier → instant of the last recorded event.
///
/// Holds at most one entry per sentence type ever recorded and is never
/// pruned.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ThrottleState {
    last: HashMap<String, DateTime<Utc>>,
}

impl ThrottleState {
    pub fn new() -> Self {
        ThrottleState {
            last: HashMap::new(),
        }
    }

    #[inline]
    pub fn last_update(&self, sentence_id: &str) -> Option<DateTime<Utc>> {
        self.last.get(sentence_id).cloned()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.last.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.last.is_empty()
    }
}

/// Decides whether an event of a sentence type may be recorded now.
///
/// Not synchronized; give each thread its own timer.
#[derive(Debug)]
pub struct EventTimer<C> {
    config: ThrottleConfig,
    state: ThrottleState,
    clock: C,
}

impl<C: Clock> EventTimer<C> {
    pub fn new(config: ThrottleConfig, clock: C) -> Self {
        EventTimer {
            config,
            state: ThrottleState::new(),
            clock,
        }
    }

    /// `false` for unconfigured sentence types, `true` for the first event of
    /// a type, and afterwards `true` only once strictly more than the
    /// configured interval has passed.
    pub fn should_update(&self, sentence_id: &str) -> bool {
        let rule = match self.config.get(sentence_id) {
            Some(rule) => rule,
            None => return false,
        };

        match self.state.last_update(sentence_id) {
            None => true,
            Some(last) => self.clock.now() - last > rule.interval,
        }
    }

    /// Marks an event of `sentence_id` as recorded now. Call this only when
    /// the event is actually recorded.
    pub fn record_update(&mut self, sentence_id: &str) {
        let now = self.clock.now();
        match self.state.last.get_mut(sentence_id) {
            Some(last) => *last = now,
            None => {
                self.state.last.insert(sentence_id.to_owned(), now);
            }
        }
    }

    #[inline]
    pub fn rule(&self, sentence_id: &str) -> Option<&ThrottleRule> {
        self.config.get(sentence_id)
    }

    #[inline]
    pub fn state(&self) -> &ThrottleState {
        &self.state
    }

    #[inline]
    pub fn clock(&self) -> &C {
        &self.clock
    }
}
