//! Per-location lighting decision: motion turns the light on, idle time
//! plus enough daylight turns it off.

use std::fmt;

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};

use crate::envelope::Reading;
use crate::time::{self, Timestamp};

/// Current actuation state of a location's lighting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Decision {
    On,
    #[default]
    Off,
}

/// A transition the engine asks the dispatcher to carry out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    TurnOn,
    TurnOff,
}

impl Command {
    /// Device status written on the wire and into the directory.
    #[must_use]
    pub fn status(self) -> &'static str {
        match self {
            Self::TurnOn => "ON",
            Self::TurnOff => "OFF",
        }
    }

    /// The decision this command leads to.
    #[must_use]
    pub fn decision(self) -> Decision {
        match self {
            Self::TurnOn => Decision::On,
            Self::TurnOff => Decision::Off,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.status())
    }
}

/// Thresholds of the correlation rule.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightingPolicy {
    /// Idle time after which the light may go off.
    pub motion_timeout: TimeDelta,
    /// Ambient lux above which artificial light is unnecessary.
    pub brightness_threshold: f64,
}

impl Default for LightingPolicy {
    fn default() -> Self {
        Self {
            motion_timeout: time::secs(30),
            brightness_threshold: 400.0,
        }
    }
}

/// Correlated state of one location.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationState {
    pub last_motion_at: Option<Timestamp>,
    pub last_light_lux: Option<f64>,
    pub decision: Decision,
}

impl LocationState {
    /// Fold one reading into the state.
    ///
    /// Only a detected motion can change the decision. `lastMotionAt` never
    /// moves backwards when readings arrive out of order.
    pub fn apply(&mut self, reading: &Reading, observed_at: Timestamp) -> Option<Command> {
        match *reading {
            Reading::Motion { detected: false } => None,
            Reading::Motion { detected: true } => {
                self.last_motion_at = Some(
                    self.last_motion_at
                        .map_or(observed_at, |prev| prev.max(observed_at)),
                );
                self.transition(Decision::On)
            }
            Reading::Light { lux } => {
                self.last_light_lux = Some(lux);
                None
            }
        }
    }

    /// Time since the last detected motion, `None` when never seen.
    #[must_use]
    pub fn idle(&self, now: Timestamp) -> Option<TimeDelta> {
        self.last_motion_at.map(|at| now.signed_duration_since(at))
    }

    /// Apply the switch-off rule at `now`.
    ///
    /// Both comparisons are strict, so ties keep the light on. A location
    /// that never reported light counts as dark.
    pub fn evaluate(&mut self, now: Timestamp, policy: &LightingPolicy) -> Option<Command> {
        if self.decision != Decision::On {
            return None;
        }
        let idle_long_enough = self
            .idle(now)
            .is_none_or(|idle| idle > policy.motion_timeout);
        let bright_enough = self.last_light_lux.unwrap_or(0.0) > policy.brightness_threshold;
        if idle_long_enough && bright_enough {
            self.transition(Decision::Off)
        } else {
            None
        }
    }

    /// Apply a reading then evaluate, returning the commands in order.
    pub fn handle(
        &mut self,
        reading: &Reading,
        observed_at: Timestamp,
        now: Timestamp,
        policy: &LightingPolicy,
    ) -> Vec<Command> {
        self.apply(reading, observed_at)
            .into_iter()
            .chain(self.evaluate(now, policy))
            .collect()
    }

    /// Force the decision off, whatever the readings say.
    pub fn reset(&mut self) -> Option<Command> {
        self.transition(Decision::Off)
    }

    fn transition(&mut self, to: Decision) -> Option<Command> {
        if self.decision == to {
            return None;
        }
        self.decision = to;
        Some(match to {
            Decision::On => Command::TurnOn,
            Decision::Off => Command::TurnOff,
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    fn at(secs: i64) -> Timestamp {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn motion() -> Reading {
        Reading::Motion { detected: true }
    }

    fn light(lux: f64) -> Reading {
        Reading::Light { lux }
    }

    #[test]
    fn should_turn_on_once_per_transition() {
        let policy = LightingPolicy::default();
        let mut state = LocationState::default();

        assert_eq!(
            state.handle(&motion(), at(0), at(0), &policy),
            vec![Command::TurnOn]
        );
        assert!(state.handle(&motion(), at(5), at(5), &policy).is_empty());
        assert_eq!(state.decision, Decision::On);
    }

    #[test]
    fn should_ignore_motion_not_detected() {
        let mut state = LocationState::default();
        assert_eq!(state.apply(&Reading::Motion { detected: false }, at(0)), None);
        assert_eq!(state, LocationState::default());
    }

    #[test]
    fn should_never_turn_on_from_light_alone() {
        let policy = LightingPolicy::default();
        let mut state = LocationState::default();
        assert!(state.handle(&light(10.0), at(0), at(0), &policy).is_empty());
        assert_eq!(state.decision, Decision::Off);
    }

    #[test]
    fn should_turn_off_when_idle_and_bright() {
        let policy = LightingPolicy::default();
        let mut state = LocationState::default();
        state.handle(&motion(), at(0), at(0), &policy);

        let commands = state.handle(&light(500.0), at(31), at(31), &policy);

        assert_eq!(commands, vec![Command::TurnOff]);
        assert_eq!(state.decision, Decision::Off);
    }

    #[test]
    fn should_stay_on_when_too_dark() {
        let policy = LightingPolicy::default();
        let mut state = LocationState::default();
        state.handle(&motion(), at(0), at(0), &policy);

        assert!(state.handle(&light(200.0), at(31), at(31), &policy).is_empty());
        assert_eq!(state.evaluate(at(3600), &policy), None);
        assert_eq!(state.decision, Decision::On);
    }

    #[test]
    fn should_favor_on_at_exact_thresholds() {
        let policy = LightingPolicy::default();
        let mut state = LocationState::default();
        state.handle(&motion(), at(0), at(0), &policy);
        state.apply(&light(400.0), at(1));

        assert_eq!(state.evaluate(at(30), &policy), None);
        assert_eq!(state.evaluate(at(100), &policy), None);
        state.apply(&light(400.5), at(101));
        assert_eq!(state.evaluate(at(30), &policy), None);
        assert_eq!(state.evaluate(at(31), &policy), Some(Command::TurnOff));
    }

    #[test]
    fn should_stay_on_without_light_sensor_until_reset() {
        let policy = LightingPolicy::default();
        let mut state = LocationState::default();
        state.handle(&motion(), at(0), at(0), &policy);

        assert_eq!(state.evaluate(at(10_000), &policy), None);
        assert_eq!(state.reset(), Some(Command::TurnOff));
        assert_eq!(state.reset(), None);
    }

    #[test]
    fn should_keep_latest_motion_when_events_arrive_out_of_order() {
        let mut state = LocationState::default();
        state.apply(&motion(), at(20));
        state.apply(&motion(), at(5));
        assert_eq!(state.last_motion_at, Some(at(20)));
    }

    /// Replays event sequences against a direct reading of the rule and
    /// checks the decision after every step.
    #[test]
    fn should_match_reference_model_over_event_sequences() {
        let policy = LightingPolicy::default();
        let sequences: &[&[(i64, Option<Reading>)]] = &[
            &[(0, Some(motion())), (10, Some(light(900.0))), (20, None), (40, None)],
            &[(0, Some(light(900.0))), (1, Some(motion())), (31, None), (32, None)],
            &[(0, Some(motion())), (31, Some(light(401.0))), (32, Some(motion())), (70, None)],
            &[(0, Some(motion())), (5, Some(light(50.0))), (100, None), (101, Some(light(450.0)))],
            &[(0, None), (50, Some(light(1000.0))), (60, Some(motion())), (95, None)],
        ];

        for (case, events) in sequences.iter().enumerate() {
            let mut state = LocationState::default();
            let mut model_on = false;
            let mut model_motion: Option<i64> = None;
            let mut model_lux = 0.0_f64;

            for (secs, reading) in *events {
                let commands = match reading {
                    Some(reading) => state.handle(reading, at(*secs), at(*secs), &policy),
                    None => state.evaluate(at(*secs), &policy).into_iter().collect(),
                };

                match reading {
                    Some(Reading::Motion { detected: true }) => {
                        model_motion = Some(*secs);
                        model_on = true;
                    }
                    Some(Reading::Light { lux }) => model_lux = *lux,
                    _ => {}
                }
                let idle = model_motion.is_none_or(|m| secs - m > 30);
                if model_on && idle && model_lux > 400.0 {
                    model_on = false;
                }

                let expected = if model_on { Decision::On } else { Decision::Off };
                assert_eq!(state.decision, expected, "case {case} at t={secs}");
                assert!(commands.len() <= 2);
            }
        }
    }
}
