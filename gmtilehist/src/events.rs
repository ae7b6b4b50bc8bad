//! The anomaly feed's data side: ordered insertion, aging under a decay
//! clock, eviction once fully decayed. How the banners are drawn is someone
//! else's problem.

use crate::detect::AnomalyKind;
use serde::Serialize;
use std::slice;

/// One anomaly occurrence. The identifying fields never change after
/// insertion; only the decay clock moves `age` and `height`.
#[derive(Clone, Debug, Serialize)]
pub struct AnomalyEvent {
    pub kind: AnomalyKind,
    /// 0-based position in the concatenated tiles-then-objects sequence at
    /// which the check fired.
    pub index: usize,
    pub room: i32,
    #[serde(skip)]
    pub age: f64,
    #[serde(skip)]
    pub height: f64,
}

/// Banner decay shape: grow at `rise_rate` up to `full_height`, hold until
/// `max_age`, shrink at `fall_rate`, evict once flat. Values are a
/// configuration concern, not semantics.
#[derive(Clone, Copy, Debug)]
pub struct DecayPolicy {
    pub full_height: f64,
    pub rise_rate: f64,
    pub fall_rate: f64,
    pub max_age: f64,
}

impl Default for DecayPolicy {
    fn default() -> DecayPolicy {
        // 48px banner, half a second to show, a second to hide, a minute hold
        DecayPolicy { full_height: 48.0, rise_rate: 96.0, fall_rate: 48.0, max_age: 60.0 }
    }
}

#[derive(Debug, Default)]
pub struct EventLog {
    policy: DecayPolicy,
    events: Vec<AnomalyEvent>,
}

impl EventLog {
    pub fn new(policy: DecayPolicy) -> EventLog {
        EventLog { policy, events: Vec::new() }
    }

    pub fn set_policy(&mut self, policy: DecayPolicy) {
        self.policy = policy;
    }

    pub fn push(&mut self, kind: AnomalyKind, index: usize, room: i32) {
        self.events.push(AnomalyEvent { kind, index, room, age: 0.0, height: 0.0 });
    }

    /// Advances the decay clock. An event is evicted on the first tick that
    /// finds it past `max_age` with its banner fully retracted.
    pub fn tick(&mut self, dt: f64) {
        let policy = self.policy;
        self.events.retain_mut(|event| {
            if event.age >= policy.max_age {
                if event.height <= 0.0 {
                    return false
                }
                event.height -= policy.fall_rate * dt;
            } else {
                event.height = (event.height + policy.rise_rate * dt).min(policy.full_height);
                event.age += dt;
            }
            true
        });
    }

    /// Drops everything. Anomalies are room-scoped, so this runs on every
    /// room change.
    pub fn clear(&mut self) {
        self.events.clear();
    }

    pub fn iter(&self) -> slice::Iter<AnomalyEvent> {
        self.events.iter()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
